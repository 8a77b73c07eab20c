//! Census transform: dense per-pixel binary descriptors from grayscale
//! images.
//!
//! A pixel's descriptor is built by comparing a fixed pattern of neighbors
//! against the center intensity; bit `k` is set iff neighbor `k` is strictly
//! brighter. Bits are packed LSB-first, 8 per byte, in pattern order. Two
//! engines are provided, a scalar reference and a vectorized one, and they
//! produce byte-identical output.

use census_core::Image;
use rayon::prelude::*;

mod error;
mod pattern;
mod simd;

pub use error::{CensusError, CensusResult};
pub use pattern::SamplingWindow;

/// Widest descriptor the matching engine can consume (2 bytes = 16 samples).
pub(crate) const MAX_DESCRIPTOR_BYTES: usize = 2;

/// Descriptor pattern bound to a concrete image geometry.
///
/// The pattern is an ordered list of signed byte offsets relative to the
/// center pixel, precomputed from a [`SamplingWindow`] shape and the image's
/// stride. Its length is a multiple of 8; each group of 8 offsets fills one
/// byte of the output descriptor.
#[derive(Debug, Clone)]
pub struct CensusCfg {
    pub window_size: i32,
    pub pattern: Vec<i32>,
    pub img_rows: i32,
    pub img_cols: i32,
    pub stride: i32,
    pub px_step: i32,
}

impl CensusCfg {
    /// Build the configuration for a named sampling window over an image of
    /// the given geometry.
    pub fn new(
        window: SamplingWindow,
        img_rows: i32,
        img_cols: i32,
        stride: i32,
        px_step: i32,
    ) -> CensusResult<Self> {
        Self::from_samples(window.window_size(), window.samples(), img_rows, img_cols, stride, px_step)
    }

    /// Build from explicit `(dy, dx)` sample positions. The sample count must
    /// be a multiple of 8 and fit the supported descriptor width.
    pub fn from_samples(
        window_size: i32,
        samples: &[(i32, i32)],
        img_rows: i32,
        img_cols: i32,
        stride: i32,
        px_step: i32,
    ) -> CensusResult<Self> {
        if px_step != 1 {
            return Err(CensusError::InputPxStep(px_step));
        }
        if img_rows <= 0 || img_cols <= 0 || stride < img_cols * px_step {
            return Err(CensusError::InputGeometry { rows: img_rows, cols: img_cols, stride });
        }
        if samples.is_empty() || samples.len() % 8 != 0 {
            return Err(CensusError::PatternLength(samples.len()));
        }
        let bytes = samples.len() / 8;
        if bytes > MAX_DESCRIPTOR_BYTES {
            return Err(CensusError::DescriptorTooWide { bytes, max: MAX_DESCRIPTOR_BYTES });
        }
        let pattern = samples
            .iter()
            .map(|&(dy, dx)| dy * stride + dx * px_step)
            .collect();
        Ok(Self {
            window_size,
            pattern,
            img_rows,
            img_cols,
            stride,
            px_step,
        })
    }

    /// Border margin: pixels closer than this to any edge get no descriptor.
    #[inline]
    pub fn edge_size(&self) -> i32 {
        self.window_size / 2
    }

    /// Packed descriptor width in bytes, equal to the output image's pixel
    /// step.
    #[inline]
    pub fn descriptor_bytes(&self) -> i32 {
        (self.pattern.len() / 8) as i32
    }
}

fn check_geometry(im: &Image, cfg: &CensusCfg, out: &Image) -> CensusResult<()> {
    if im.px_step != cfg.px_step {
        return Err(CensusError::InputPxStep(im.px_step));
    }
    if im.rows != cfg.img_rows || im.cols != cfg.img_cols || im.stride != cfg.stride {
        return Err(CensusError::InputGeometry {
            rows: im.rows,
            cols: im.cols,
            stride: im.stride,
        });
    }
    if out.rows != im.rows || out.cols != im.cols {
        return Err(CensusError::OutputGeometry { rows: out.rows, cols: out.cols });
    }
    let desc = cfg.descriptor_bytes();
    if out.px_step != desc {
        return Err(CensusError::OutputPxStep { expected: desc, actual: out.px_step });
    }
    Ok(())
}

/// Descriptor for a single center pixel: compare each pattern neighbor
/// against the center, packing one bit per comparison.
#[inline]
pub(crate) fn census_pixel(src: &[u8], center: usize, pattern: &[i32], dst: &mut [u8]) {
    let c = src[center];
    dst.fill(0);
    for (k, &off) in pattern.iter().enumerate() {
        let n = src[(center as isize + off as isize) as usize];
        if n > c {
            dst[k >> 3] |= 1 << (k & 7);
        }
    }
}

/// Scalar reference engine: pixel by pixel, pattern entry by pattern entry.
///
/// Writes a descriptor for every pixel `(i, j)` with
/// `edge <= i < rows - edge` and `edge <= j < cols - edge`; border pixels are
/// left untouched. The caller allocates the output image; it is never
/// resized.
pub fn census_transform_scalar(im: &Image, cfg: &CensusCfg, out: &mut Image) -> CensusResult<()> {
    check_geometry(im, cfg, out)?;

    let edge = cfg.edge_size();
    let desc = cfg.descriptor_bytes() as usize;
    let in_stride = im.stride as usize;
    let out_stride = out.stride as usize;
    let (rows, cols) = (im.rows, im.cols);
    let src = im.data();
    let dst = out.data_mut()?;

    for i in edge..rows - edge {
        let row_base = i as usize * in_stride;
        let out_base = i as usize * out_stride;
        for j in edge..cols - edge {
            let o = out_base + j as usize * desc;
            census_pixel(src, row_base + j as usize, &cfg.pattern, &mut dst[o..o + desc]);
        }
    }
    Ok(())
}

/// Vectorized engine: 16 adjacent center pixels per iteration, row-parallel.
///
/// Bit-identical to [`census_transform_scalar`] for every valid pixel, with
/// the same border exclusion. Rows are processed as disjoint output chunks,
/// so the parallel schedule cannot affect the result.
pub fn census_transform(im: &Image, cfg: &CensusCfg, out: &mut Image) -> CensusResult<()> {
    check_geometry(im, cfg, out)?;

    let edge = cfg.edge_size() as usize;
    let desc = cfg.descriptor_bytes() as usize;
    let in_stride = im.stride as usize;
    let out_stride = out.stride as usize;
    let rows = im.rows as usize;
    let cols = im.cols as usize;
    if rows <= 2 * edge || cols <= 2 * edge {
        return Ok(());
    }

    let src = im.data();
    let pattern = cfg.pattern.as_slice();
    let dst = out.data_mut()?;

    dst.par_chunks_mut(out_stride)
        .enumerate()
        .skip(edge)
        .take(rows - 2 * edge)
        .for_each(|(i, out_row)| {
            simd::census_row(src, in_stride, i, edge, cols, pattern, desc, out_row);
        });
    Ok(())
}
