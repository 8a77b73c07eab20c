use census_core::{CoreError, Feature, FeatureList, Image, Match, Pt};
use census_match::{Matcher, MatchError};
use census_transform::{census_transform, CensusCfg, CensusError, SamplingWindow};

pub use census_core::{self, Image as CensusImage, Match as StereoMatch};
pub use census_match::MatcherConfig as Config;

#[derive(Debug)]
pub enum PipelineError {
    Census(CensusError),
    Match(MatchError),
    Core(CoreError),
    ThreadPool(rayon::ThreadPoolBuildError),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Census(e) => write!(f, "Census transform error: {}", e),
            PipelineError::Match(e) => write!(f, "Matching error: {}", e),
            PipelineError::Core(e) => write!(f, "Image error: {}", e),
            PipelineError::ThreadPool(e) => write!(f, "Thread pool error: {}", e),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<CensusError> for PipelineError {
    fn from(err: CensusError) -> Self {
        PipelineError::Census(err)
    }
}

impl From<MatchError> for PipelineError {
    fn from(err: MatchError) -> Self {
        PipelineError::Match(err)
    }
}

impl From<CoreError> for PipelineError {
    fn from(err: CoreError) -> Self {
        PipelineError::Core(err)
    }
}

impl From<rayon::ThreadPoolBuildError> for PipelineError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        PipelineError::ThreadPool(err)
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// High-level stereo pipeline that combines the census transform with sparse
/// summed-Hamming-distance matching.
///
/// The census images are allocated once and reused across calls, so a
/// pipeline bound to one geometry can process a whole sequence without
/// re-allocating.
pub struct StereoPipeline {
    census_cfg: CensusCfg,
    matcher: Matcher,
    census_left: Image<'static>,
    census_right: Image<'static>,
}

impl StereoPipeline {
    /// Create a pipeline for grayscale inputs of the configured dimensions
    /// with the given row stride.
    pub fn new(
        window: SamplingWindow,
        config: &Config,
        input_stride: i32,
    ) -> PipelineResult<Self> {
        let census_cfg =
            CensusCfg::new(window, config.img_rows, config.img_cols, input_stride, 1)?;
        let desc = census_cfg.descriptor_bytes();
        let census_left = Image::alloc(config.img_rows, config.img_cols, desc, Pt::default())?;
        let census_right = Image::alloc(config.img_rows, config.img_cols, desc, Pt::default())?;
        let matcher = config.build(census_left.stride, desc)?;
        Ok(Self {
            census_cfg,
            matcher,
            census_left,
            census_right,
        })
    }

    /// Transform both images and match each left query against the right
    /// candidates. Output order follows `kps_left.nonmax_features`.
    pub fn process(
        &mut self,
        left: &Image,
        right: &Image,
        kps_left: &FeatureList,
        kps_right: &FeatureList,
    ) -> PipelineResult<Vec<Match>> {
        census_transform(left, &self.census_cfg, &mut self.census_left)?;
        census_transform(right, &self.census_cfg, &mut self.census_right)?;
        Ok(self
            .matcher
            .match_sparse(&self.census_left, &self.census_right, kps_left, kps_right)?)
    }

    pub fn census_cfg(&self) -> &CensusCfg {
        &self.census_cfg
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn dimensions(&self) -> (i32, i32) {
        self.matcher.dimensions()
    }
}

/// Minimal center-surround corner detector for driving the pipeline from raw
/// images: scores each interior pixel by its contrast against the 3x3
/// neighborhood, keeps those above `threshold` in magnitude, and suppresses
/// non-maxima. The score keeps its sign (bright-on-dark positive,
/// dark-on-bright negative) so the matcher's polarity pre-filter applies.
pub fn detect_features(im: &Image, threshold: i32) -> PipelineResult<FeatureList> {
    if im.px_step != 1 {
        return Err(PipelineError::Core(CoreError::InvalidPxStep(im.px_step)));
    }
    let rows = im.rows as usize;
    let cols = im.cols as usize;
    let stride = im.stride as usize;
    let data = im.data();

    let mut scores = vec![0i32; rows * cols];
    for y in 1..rows - 1 {
        for x in 1..cols - 1 {
            let center = data[y * stride + x] as i32;
            let mut surround = 0i32;
            for dy in 0..3usize {
                for dx in 0..3usize {
                    surround += data[(y + dy - 1) * stride + (x + dx - 1)] as i32;
                }
            }
            surround -= center;
            scores[y * cols + x] = 8 * center - surround;
        }
    }

    let mut features = Vec::new();
    for y in 1..rows - 1 {
        for x in 1..cols - 1 {
            let s = scores[y * cols + x];
            if s.abs() <= threshold {
                continue;
            }
            let mut is_max = true;
            'nms: for dy in 0..3usize {
                for dx in 0..3usize {
                    if dy == 1 && dx == 1 {
                        continue;
                    }
                    if scores[(y + dy - 1) * cols + (x + dx - 1)].abs() > s.abs() {
                        is_max = false;
                        break 'nms;
                    }
                }
            }
            if is_max {
                features.push(Feature::new(x as i32, y as i32, s));
            }
        }
    }

    Ok(FeatureList::from_sorted(features, im.rows)?.all_nonmax())
}
