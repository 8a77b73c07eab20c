//! Sparse stereo correspondence over census-transformed images.
//!
//! For each query feature of the left image, the matcher restricts right-image
//! candidates to a geometrically valid window (epipolar row band, disparity
//! column range), scores them by summed Hamming distance between census
//! descriptors, and keeps the best-scoring candidate if it passes the quality
//! filter.

use census_core::{Feature, FeatureList, Image, Match};
use rayon::prelude::*;

pub mod config;
mod error;
mod hamming;

pub use config::MatcherConfig;
pub use error::{MatchError, MatchResult};
pub use hamming::{popcount_nibble, popcount_swar, summed_hamming_dist};

/// Candidate-window geometry. Only stereo (rectified, non-negative disparity)
/// is implemented; flow-mode search is an explicit unsupported configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MatchingMode {
    Stereo,
    Flow,
}

/// Correlation-window shapes for the SHD sampling pattern.
///
/// Unlike the transform's neighbor pattern, these index bytes of the already
/// packed descriptor image: one entry per sampled descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CorrelationWindow {
    /// 16 descriptors on the odd lattice of a 7x7 window.
    SparseCw16,
    /// Full 5x5 window minus the center, 24 descriptors.
    DenseCw5,
}

impl CorrelationWindow {
    /// Half-width of the window; doubles as the default border margin for
    /// query rejection.
    pub fn radius(&self) -> i32 {
        match self {
            CorrelationWindow::SparseCw16 => 3,
            CorrelationWindow::DenseCw5 => 2,
        }
    }

    /// The ordered `(dy, dx)` descriptor sample positions.
    pub fn samples(&self) -> &'static [(i32, i32)] {
        match self {
            CorrelationWindow::SparseCw16 => &[
                (-3, -3), (-3, -1), (-3, 1), (-3, 3),
                (-1, -3), (-1, -1), (-1, 1), (-1, 3),
                (1, -3), (1, -1), (1, 1), (1, 3),
                (3, -3), (3, -1), (3, 1), (3, 3),
            ],
            CorrelationWindow::DenseCw5 => &[
                (-2, -2), (-2, -1), (-2, 0), (-2, 1), (-2, 2),
                (-1, -2), (-1, -1), (-1, 0), (-1, 1), (-1, 2),
                (0, -2), (0, -1), (0, 1), (0, 2),
                (1, -2), (1, -1), (1, 0), (1, 1), (1, 2),
                (2, -2), (2, -1), (2, 0), (2, 1), (2, 2),
            ],
        }
    }
}

/// Parameters of one matching configuration, bound to the census image
/// geometry through the precomputed byte-offset pattern.
#[derive(Debug, Clone)]
pub struct MatchingParams {
    pub mode: MatchingMode,
    /// Correlation window the byte-offset pattern was generated from.
    pub window: CorrelationWindow,
    /// Largest accepted horizontal offset between corresponding points.
    pub max_disparity: i32,
    /// Height of the vertical search band around the query row.
    pub epipolar_range: i32,
    /// Border margin for query rejection, independent of the transform's own
    /// edge. Defaults to the correlation-window radius.
    pub edge_size: i32,
    /// Acceptance threshold: a best candidate is kept only if its SHD is
    /// strictly below this.
    pub filter_dist: u32,
    /// Byte offsets into the packed descriptor image, one per sample.
    pub pattern: Vec<i32>,
    /// Descriptor width of the census images this configuration matches.
    pub px_step: i32,
}

impl MatchingParams {
    /// Build parameters for the given mode and correlation window over census
    /// images of the given stride and descriptor width.
    ///
    /// `filter_dist` starts permissive (`u32::MAX`, accept any best
    /// candidate); tune it with [`with_filter_dist`](Self::with_filter_dist).
    pub fn new(
        mode: MatchingMode,
        window: CorrelationWindow,
        max_disparity: i32,
        epipolar_range: i32,
        census_stride: i32,
        census_px_step: i32,
    ) -> MatchResult<Self> {
        if census_px_step != 1 && census_px_step != 2 {
            return Err(MatchError::UnsupportedPxStep(census_px_step));
        }
        let samples = window.samples();
        if census_px_step == 1 && samples.len() % 4 != 0 {
            return Err(MatchError::PatternLength(samples.len()));
        }
        let pattern = samples
            .iter()
            .map(|&(dy, dx)| dy * census_stride + dx * census_px_step)
            .collect();
        Ok(Self {
            mode,
            window,
            max_disparity,
            epipolar_range,
            edge_size: window.radius(),
            filter_dist: u32::MAX,
            pattern,
            px_step: census_px_step,
        })
    }

    pub fn with_filter_dist(mut self, filter_dist: u32) -> Self {
        self.filter_dist = filter_dist;
        self
    }

    /// Widen the border margin. Values below the correlation window's radius
    /// are clamped to it; the SHD reads descriptors up to one radius away
    /// from every candidate, so a smaller margin would read out of bounds.
    pub fn with_edge_size(mut self, edge_size: i32) -> Self {
        self.edge_size = edge_size.max(self.window.radius());
        self
    }
}

/// A contiguous run of right-image features on one row whose columns fall
/// inside the current query's window: a half-open index range into
/// `all_features`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KpRow {
    pub begin: usize,
    pub end: usize,
}

/// The sparse correspondence engine.
pub struct Matcher {
    params: MatchingParams,
    img_rows: i32,
    img_cols: i32,
}

impl Matcher {
    pub fn new(params: MatchingParams, img_rows: i32, img_cols: i32) -> MatchResult<Self> {
        if img_rows <= 0 || img_cols <= 0 {
            return Err(MatchError::InvalidDimensions { rows: img_rows, cols: img_cols });
        }
        Ok(Self { params, img_rows, img_cols })
    }

    pub fn params(&self) -> &MatchingParams {
        &self.params
    }

    pub fn dimensions(&self) -> (i32, i32) {
        (self.img_rows, self.img_cols)
    }

    /// Match each suppression survivor of `kps1` against the geometrically
    /// valid candidates of `kps2`.
    ///
    /// Queries are processed independently (in parallel, order-preserving):
    /// a query near the border, with an empty candidate window, or whose best
    /// candidate fails the quality filter simply yields no match. Output
    /// order equals query order in `kps1.nonmax_features`.
    pub fn match_sparse(
        &self,
        census1: &Image,
        census2: &Image,
        kps1: &FeatureList,
        kps2: &FeatureList,
    ) -> MatchResult<Vec<Match>> {
        if self.params.mode != MatchingMode::Stereo {
            return Err(MatchError::UnsupportedMode(self.params.mode));
        }
        for im in [census1, census2] {
            if im.px_step != self.params.px_step {
                return Err(MatchError::DescriptorWidthMismatch {
                    expected: self.params.px_step,
                    actual: im.px_step,
                });
            }
        }

        let edge = self.params.edge_size;
        let matches = kps1
            .nonmax_features
            .par_iter()
            .filter_map(|kp1| {
                if kp1.y < edge
                    || kp1.y >= self.img_rows - edge
                    || kp1.x < edge
                    || kp1.x >= self.img_cols - edge
                {
                    return None;
                }
                let pot = self.potential_matches(kp1, kps2);
                let best = self.match_feature(census1, kp1, census2, kps2, &pot)?;
                (best.dist < self.params.filter_dist).then_some(best)
            })
            .collect();
        Ok(matches)
    }

    /// Dense (full-image) disparity via the moving-window technique is a
    /// planned extension; the engine reports the missing capability instead
    /// of running empty logic.
    pub fn match_dense(&self, _census1: &Image, _census2: &Image) -> MatchResult<Vec<Match>> {
        Err(MatchError::Unimplemented("dense matching"))
    }

    /// Collect the candidate runs for one query: an epipolar row band of
    /// half-height `epipolar_range / 2`, columns `[x - max_disparity, x]`
    /// (equal-or-lower disparity only), both clamped to
    /// `[edge_size, dim - edge_size)` so every descriptor later read by the
    /// SHD stays inside valid bounds.
    pub fn potential_matches(&self, kp1: &Feature, kps2: &FeatureList) -> Vec<KpRow> {
        let edge = self.params.edge_size;
        let epipolar = self.params.epipolar_range / 2;
        let first_row = (kp1.y - epipolar).max(edge);
        let last_row = (kp1.y + epipolar).min(self.img_rows - edge - 1);
        let first_col = (kp1.x - self.params.max_disparity).max(edge);
        let last_col = kp1.x.min(self.img_cols - edge - 1);

        let mut pot = Vec::with_capacity((last_row - first_row + 1).max(0) as usize);
        for row in first_row..=last_row {
            let slice = kps2.row(row);
            if slice.is_empty() {
                continue;
            }
            let row_start = kps2.row_idxs[row as usize];
            let begin = slice.partition_point(|f| f.x < first_col);
            let end = slice.partition_point(|f| f.x <= last_col);
            if begin < end {
                pot.push(KpRow {
                    begin: row_start + begin,
                    end: row_start + end,
                });
            }
        }
        pot
    }

    /// Score every candidate and keep the minimum-distance one; ties keep the
    /// first candidate seen (rows in band order, left to right within a row).
    fn match_feature(
        &self,
        census1: &Image,
        kp1: &Feature,
        census2: &Image,
        kps2: &FeatureList,
        pot: &[KpRow],
    ) -> Option<Match> {
        let mut best: Option<Match> = None;
        for row in pot {
            for kp2 in &kps2.all_features[row.begin..row.end] {
                // Opposite corner polarity cannot correspond; reject before
                // paying for the SHD.
                if (kp1.score < 0 && kp2.score > 0) || (kp1.score > 0 && kp2.score < 0) {
                    continue;
                }
                let dist = summed_hamming_dist(
                    census1,
                    census2,
                    kp1,
                    kp2,
                    &self.params.pattern,
                    self.params.px_step,
                );
                if best.as_ref().map_or(true, |b| dist < b.dist) {
                    best = Some(Match {
                        feature1_idx: kp1.idx,
                        feature2_idx: kp2.idx,
                        dist,
                    });
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use census_core::Pt;

    const ROWS: i32 = 32;
    const COLS: i32 = 48;

    fn lcg_census(px_step: i32, mut seed: u32) -> Image<'static> {
        let mut im = Image::alloc(ROWS, COLS, px_step, Pt::default()).unwrap();
        let data = im.data_mut().unwrap();
        for b in data.iter_mut() {
            seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
            *b = (seed >> 24) as u8;
        }
        im
    }

    fn feature_list(positions: &[(i32, i32, i32)]) -> FeatureList {
        let features = positions
            .iter()
            .map(|&(x, y, score)| Feature::new(x, y, score))
            .collect();
        FeatureList::from_sorted(features, ROWS).unwrap().all_nonmax()
    }

    fn stereo_params(census: &Image, max_disparity: i32, epipolar_range: i32) -> MatchingParams {
        MatchingParams::new(
            MatchingMode::Stereo,
            CorrelationWindow::SparseCw16,
            max_disparity,
            epipolar_range,
            census.stride,
            census.px_step,
        )
        .unwrap()
    }

    /// Write the same descriptor bytes around two positions so their SHD is 0.
    fn copy_neighborhood(dst: &mut Image, src: &Image, (dx, dy): (i32, i32), (sx, sy): (i32, i32)) {
        let radius = 3;
        let px = src.px_step;
        let stride = src.stride as usize;
        let src_data: Vec<u8> = src.data().to_vec();
        let dst_data = dst.data_mut().unwrap();
        for oy in -radius..=radius {
            for ox in -radius..=radius {
                let s = ((sy + oy) * stride as i32 + (sx + ox) * px) as usize;
                let d = ((dy + oy) * stride as i32 + (dx + ox) * px) as usize;
                for b in 0..px as usize {
                    dst_data[d + b] = src_data[s + b];
                }
            }
        }
    }

    #[test]
    fn test_params_reject_unsupported_px_step() {
        assert!(matches!(
            MatchingParams::new(MatchingMode::Stereo, CorrelationWindow::SparseCw16, 8, 3, 96, 3),
            Err(MatchError::UnsupportedPxStep(3))
        ));
    }

    #[test]
    fn test_flow_mode_fails_fast() {
        let census = lcg_census(2, 1);
        let params = MatchingParams::new(
            MatchingMode::Flow,
            CorrelationWindow::SparseCw16,
            8,
            3,
            census.stride,
            2,
        )
        .unwrap();
        let matcher = Matcher::new(params, ROWS, COLS).unwrap();
        let kps = feature_list(&[(10, 10, 1)]);
        assert!(matches!(
            matcher.match_sparse(&census, &census, &kps, &kps),
            Err(MatchError::UnsupportedMode(MatchingMode::Flow))
        ));
    }

    #[test]
    fn test_descriptor_width_mismatch_is_rejected() {
        let census2b = lcg_census(2, 1);
        let census1b = lcg_census(1, 1);
        let params = stereo_params(&census2b, 8, 3);
        let matcher = Matcher::new(params, ROWS, COLS).unwrap();
        let kps = feature_list(&[(10, 10, 1)]);
        assert!(matches!(
            matcher.match_sparse(&census2b, &census1b, &kps, &kps),
            Err(MatchError::DescriptorWidthMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_dense_matching_is_unimplemented() {
        let census = lcg_census(2, 1);
        let params = stereo_params(&census, 8, 3);
        let matcher = Matcher::new(params, ROWS, COLS).unwrap();
        assert!(matches!(
            matcher.match_dense(&census, &census),
            Err(MatchError::Unimplemented(_))
        ));
    }

    #[test]
    fn test_stereo_window_correctness() {
        let census = lcg_census(2, 7);
        let params = stereo_params(&census, 6, 4); // band half-height 2
        let matcher = Matcher::new(params, ROWS, COLS).unwrap();

        // A grid of candidates all over the image
        let mut positions = Vec::new();
        for y in (4..ROWS - 4).step_by(2) {
            for x in (4..COLS - 4).step_by(3) {
                positions.push((x, y, 1));
            }
        }
        let kps2 = feature_list(&positions);

        let query = Feature { x: 24, y: 16, score: 1, idx: 0 };
        let pot = matcher.potential_matches(&query, &kps2);
        assert!(!pot.is_empty());

        for row in &pot {
            for f in &kps2.all_features[row.begin..row.end] {
                assert!(f.y >= query.y - 2 && f.y <= query.y + 2, "row {} outside band", f.y);
                assert!(f.x >= query.x - 6 && f.x <= query.x, "col {} outside window", f.x);
            }
        }

        // Every in-window grid candidate must be covered
        let expected = positions
            .iter()
            .filter(|&&(x, y, _)| y >= 14 && y <= 18 && x >= 18 && x <= 24)
            .count();
        let collected: usize = pot.iter().map(|r| r.end - r.begin).sum();
        assert_eq!(collected, expected);
    }

    #[test]
    fn test_window_clamps_to_margins() {
        let census = lcg_census(2, 7);
        let params = stereo_params(&census, 100, 200); // window wider than the image
        let edge = params.edge_size;
        let matcher = Matcher::new(params, ROWS, COLS).unwrap();

        let mut positions = Vec::new();
        for y in 0..ROWS {
            positions.push((1, y, 1));
            positions.push((COLS - 2, y, 1));
            positions.push((COLS / 2, y, 1));
        }
        positions.sort_by_key(|&(x, y, _)| (y, x));
        let kps2 = feature_list(&positions);

        let query = Feature { x: COLS - edge - 1, y: ROWS / 2, score: 1, idx: 0 };
        let pot = matcher.potential_matches(&query, &kps2);
        for row in &pot {
            for f in &kps2.all_features[row.begin..row.end] {
                assert!(f.y >= edge && f.y < ROWS - edge);
                assert!(f.x >= edge && f.x < COLS - edge);
            }
        }
    }

    #[test]
    fn test_zero_disparity_candidate_is_reachable() {
        // Identical images, candidate at the query position: the column
        // window [x - d, x] includes x itself.
        let census = lcg_census(2, 12);
        let params = stereo_params(&census, 8, 1).with_filter_dist(1);
        let matcher = Matcher::new(params, ROWS, COLS).unwrap();
        let kps = feature_list(&[(20, 15, 5)]);

        let matches = matcher.match_sparse(&census, &census, &kps, &kps).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].dist, 0);
        assert_eq!(matches[0].feature1_idx, 0);
        assert_eq!(matches[0].feature2_idx, 0);
    }

    #[test]
    fn test_identical_images_match_at_distance_zero() {
        let census = lcg_census(2, 99);
        let params = stereo_params(&census, 10, 3).with_filter_dist(1);
        let matcher = Matcher::new(params, ROWS, COLS).unwrap();

        let positions: Vec<(i32, i32, i32)> =
            vec![(8, 6, 3), (30, 6, -2), (15, 12, 7), (25, 20, 1), (40, 27, -5)];
        let kps = feature_list(&positions);

        let matches = matcher.match_sparse(&census, &census, &kps, &kps).unwrap();
        assert_eq!(matches.len(), positions.len());
        for (i, m) in matches.iter().enumerate() {
            assert_eq!(m.dist, 0);
            assert_eq!(m.feature1_idx, i);
            assert_eq!(m.feature2_idx, i);
        }
    }

    #[test]
    fn test_border_query_yields_no_match() {
        let census = lcg_census(2, 4);
        let params = stereo_params(&census, 8, 3);
        let edge = params.edge_size;
        let matcher = Matcher::new(params, ROWS, COLS).unwrap();

        let queries = feature_list(&[
            (10, edge - 1, 1),     // top border
            (1, 10, 1),            // left border
            (COLS - 1, 20, 1),     // right border
            (10, ROWS - edge, 1),  // bottom border
        ]);
        let kps2 = feature_list(&[(10, 10, 1), (10, 20, 1)]);

        let matches = matcher.match_sparse(&census, &census, &queries, &kps2).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_empty_candidate_window_yields_no_match() {
        let census = lcg_census(2, 4);
        let params = stereo_params(&census, 4, 1);
        let matcher = Matcher::new(params, ROWS, COLS).unwrap();

        let queries = feature_list(&[(20, 10, 1)]);
        // Candidates exist, but none in the row band or column range
        let kps2 = feature_list(&[(40, 10, 1), (20, 25, 1)]);

        let matches = matcher.match_sparse(&census, &census, &queries, &kps2).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_filter_dist_rejects_weak_best() {
        let census1 = lcg_census(2, 31);
        let census2 = lcg_census(2, 77); // unrelated descriptors, large SHD
        let params = stereo_params(&census1, 8, 3).with_filter_dist(1);
        let matcher = Matcher::new(params, ROWS, COLS).unwrap();

        let queries = feature_list(&[(20, 15, 1)]);
        let kps2 = feature_list(&[(18, 15, 1)]);

        let matches = matcher.match_sparse(&census1, &census2, &queries, &kps2).unwrap();
        assert!(matches.is_empty());

        // The same best candidate passes once the filter allows it
        let params = stereo_params(&census1, 8, 3);
        let matcher = Matcher::new(params, ROWS, COLS).unwrap();
        let matches = matcher.match_sparse(&census1, &census2, &queries, &kps2).unwrap();
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_sign_prefilter_rejects_opposite_polarity() {
        let census1 = lcg_census(2, 55);
        let mut census2 = lcg_census(2, 56);
        // The opposite-sign candidate at (20, 15) gets a perfect descriptor
        // copy; the same-sign candidate at (18, 15) keeps unrelated bytes.
        copy_neighborhood(&mut census2, &census1, (20, 15), (20, 15));

        let params = stereo_params(&census1, 8, 1);
        let matcher = Matcher::new(params, ROWS, COLS).unwrap();

        let queries = feature_list(&[(20, 15, 10)]);
        let kps2 = feature_list(&[(18, 15, 10), (20, 15, -10)]);

        let matches = matcher.match_sparse(&census1, &census2, &queries, &kps2).unwrap();
        assert_eq!(matches.len(), 1);
        // idx 0 is the same-sign candidate despite its larger distance
        assert_eq!(matches[0].feature2_idx, 0);
        assert!(matches[0].dist > 0);
    }

    #[test]
    fn test_ties_keep_first_seen_candidate() {
        let census1 = lcg_census(2, 8);
        let mut census2 = lcg_census(2, 9);
        // Two candidates with identical (perfect) descriptors, far enough
        // apart that the copied neighborhoods stay disjoint
        copy_neighborhood(&mut census2, &census1, (14, 15), (22, 15));
        copy_neighborhood(&mut census2, &census1, (22, 15), (22, 15));

        let params = stereo_params(&census1, 8, 1).with_filter_dist(1);
        let matcher = Matcher::new(params, ROWS, COLS).unwrap();

        let queries = feature_list(&[(22, 15, 1)]);
        let kps2 = feature_list(&[(14, 15, 1), (22, 15, 1)]);

        let matches = matcher.match_sparse(&census1, &census2, &queries, &kps2).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].dist, 0);
        assert_eq!(matches[0].feature2_idx, 0, "tie must keep the first-seen candidate");
    }

    #[test]
    fn test_edge_size_never_shrinks_below_window_radius() {
        let census = lcg_census(2, 21);
        let radius = CorrelationWindow::SparseCw16.radius();

        let params = stereo_params(&census, 8, 3).with_edge_size(0);
        assert_eq!(params.edge_size, radius);

        // A corner-hugging feature stays rejected instead of driving the
        // SHD outside the descriptor image
        let matcher = Matcher::new(params, ROWS, COLS).unwrap();
        let kps = feature_list(&[(1, 1, 1)]);
        let matches = matcher.match_sparse(&census, &census, &kps, &kps).unwrap();
        assert!(matches.is_empty());

        // Widening beyond the radius is still allowed
        let params = stereo_params(&census, 8, 3).with_edge_size(5);
        assert_eq!(params.edge_size, 5);
    }

    #[test]
    fn test_output_order_follows_query_order() {
        let census = lcg_census(2, 3);
        let params = stereo_params(&census, 10, 3).with_filter_dist(1);
        let matcher = Matcher::new(params, ROWS, COLS).unwrap();

        let positions: Vec<(i32, i32, i32)> =
            (0..8).map(|i| (8 + 4 * i, 6 + 2 * i, 1)).collect();
        let kps = feature_list(&positions);

        let matches = matcher.match_sparse(&census, &census, &kps, &kps).unwrap();
        let idxs: Vec<usize> = matches.iter().map(|m| m.feature1_idx).collect();
        let mut sorted = idxs.clone();
        sorted.sort_unstable();
        assert_eq!(idxs, sorted);
    }
}
