/// Byte width of the vector lanes used by the census transform. Row strides
/// are always a multiple of this, so every row start is suitably aligned.
pub const VECTOR_WIDTH: usize = 16;

/// Integer pixel coordinate, also used as an image origin offset when an
/// `Image` describes a sub-region of a larger capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pt {
    pub x: i32,
    pub y: i32,
}

impl Pt {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone)]
pub enum CoreError {
    InvalidDimensions { rows: i32, cols: i32 },
    InvalidPxStep(i32),
    InvalidStride { stride: i32, min: i32 },
    BufferTooSmall { expected_len: usize, actual_len: usize },
    BorrowedBuffer,
    UnsortedFeatures { index: usize },
    RowOutOfRange { row: i32, rows: i32 },
}

impl std::fmt::Display for CoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreError::InvalidDimensions { rows, cols } => {
                write!(f, "Invalid image dimensions: {}x{} (must be > 0)", cols, rows)
            }
            CoreError::InvalidPxStep(s) => {
                write!(f, "Invalid pixel step: {} (must be > 0)", s)
            }
            CoreError::InvalidStride { stride, min } => {
                write!(
                    f,
                    "Invalid stride: {} (must be >= {} and a multiple of {})",
                    stride, min, VECTOR_WIDTH
                )
            }
            CoreError::BufferTooSmall { expected_len, actual_len } => {
                write!(f, "Pixel buffer too small: expected {}, got {}", expected_len, actual_len)
            }
            CoreError::BorrowedBuffer => {
                write!(f, "Cannot mutate a borrowed pixel buffer")
            }
            CoreError::UnsortedFeatures { index } => {
                write!(f, "Feature list not sorted by (row, col) at index {}", index)
            }
            CoreError::RowOutOfRange { row, rows } => {
                write!(f, "Feature row {} outside image with {} rows", row, rows)
            }
        }
    }
}

impl std::error::Error for CoreError {}

pub type CoreResult<T> = Result<T, CoreError>;

/// Pixel storage: allocated for output, or wrapping externally supplied data
/// (e.g. the raw buffer of an image decoder).
#[derive(Debug, Clone)]
pub enum PixelBuffer<'a> {
    Owned(Vec<u8>),
    Borrowed(&'a [u8]),
}

/// Row-major pixel buffer with explicit row pitch.
///
/// `px_step` is the per-pixel byte width: 1 for raw intensity images, or the
/// packed descriptor width for a census image. `stride` is bytes per row and
/// is always a multiple of [`VECTOR_WIDTH`].
#[derive(Debug, Clone)]
pub struct Image<'a> {
    pub rows: i32,
    pub cols: i32,
    pub stride: i32,
    pub px_step: i32,
    pub origin: Pt,
    buf: PixelBuffer<'a>,
}

impl<'a> Image<'a> {
    /// Allocate an owned, zero-initialized image. The stride is rounded up to
    /// the vector width.
    pub fn alloc(rows: i32, cols: i32, px_step: i32, origin: Pt) -> CoreResult<Image<'static>> {
        if rows <= 0 || cols <= 0 {
            return Err(CoreError::InvalidDimensions { rows, cols });
        }
        if px_step <= 0 {
            return Err(CoreError::InvalidPxStep(px_step));
        }
        let row_bytes = cols as usize * px_step as usize;
        let stride = (row_bytes + VECTOR_WIDTH - 1) / VECTOR_WIDTH * VECTOR_WIDTH;
        Ok(Image {
            rows,
            cols,
            stride: stride as i32,
            px_step,
            origin,
            buf: PixelBuffer::Owned(vec![0u8; stride * rows as usize]),
        })
    }

    /// Wrap an externally supplied buffer without copying. The supplier must
    /// honor the stride contract: a multiple of the vector width, covering
    /// every pixel of the row.
    pub fn from_buffer(
        rows: i32,
        cols: i32,
        px_step: i32,
        stride: i32,
        origin: Pt,
        data: &'a [u8],
    ) -> CoreResult<Image<'a>> {
        if rows <= 0 || cols <= 0 {
            return Err(CoreError::InvalidDimensions { rows, cols });
        }
        if px_step <= 0 {
            return Err(CoreError::InvalidPxStep(px_step));
        }
        let min = cols * px_step;
        if stride < min || stride as usize % VECTOR_WIDTH != 0 {
            return Err(CoreError::InvalidStride { stride, min });
        }
        let expected_len = rows as usize * stride as usize;
        if data.len() < expected_len {
            return Err(CoreError::BufferTooSmall {
                expected_len,
                actual_len: data.len(),
            });
        }
        Ok(Image {
            rows,
            cols,
            stride,
            px_step,
            origin,
            buf: PixelBuffer::Borrowed(data),
        })
    }

    /// Byte offset of pixel `(row, col)` into the buffer.
    #[inline]
    pub fn offset(&self, row: i32, col: i32) -> usize {
        (row * self.stride + col * self.px_step) as usize
    }

    /// The bytes of one pixel.
    #[inline]
    pub fn at(&self, row: i32, col: i32) -> &[u8] {
        let o = self.offset(row, col);
        &self.data()[o..o + self.px_step as usize]
    }

    /// One full row, including stride padding.
    #[inline]
    pub fn row(&self, row: i32) -> &[u8] {
        let start = row as usize * self.stride as usize;
        &self.data()[start..start + self.stride as usize]
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        match &self.buf {
            PixelBuffer::Owned(v) => v,
            PixelBuffer::Borrowed(s) => s,
        }
    }

    /// Mutable access to the pixel bytes. Only owned buffers can be written;
    /// the engines never reallocate.
    pub fn data_mut(&mut self) -> CoreResult<&mut [u8]> {
        match &mut self.buf {
            PixelBuffer::Owned(v) => Ok(v.as_mut_slice()),
            PixelBuffer::Borrowed(_) => Err(CoreError::BorrowedBuffer),
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self.buf, PixelBuffer::Owned(_))
    }
}

/// Keypoint with a signed corner-response score. The sign is used by the
/// matcher as a cheap candidate pre-filter. `idx` is the stable identity
/// reported in matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feature {
    pub x: i32,
    pub y: i32,
    pub score: i32,
    pub idx: usize,
}

impl Feature {
    pub fn new(x: i32, y: i32, score: i32) -> Self {
        Self { x, y, score, idx: 0 }
    }
}

/// Detected keypoints of one image, sorted by row then by ascending column
/// within a row, with a per-row index for fast windowed scanning.
///
/// `nonmax_features` is the subset surviving non-maximum suppression; that
/// subset is what the matcher actually queries.
#[derive(Debug, Clone, Default)]
pub struct FeatureList {
    pub all_features: Vec<Feature>,
    /// `row_idxs[y]..row_idxs[y + 1]` is the contiguous run of features on
    /// row `y` within `all_features` (length `rows + 1`, sentinel at the end).
    pub row_idxs: Vec<usize>,
    pub nonmax_features: Vec<Feature>,
}

impl FeatureList {
    /// Build from a (row, col)-sorted feature sequence. Assigns `idx` by
    /// position and builds the row index table. `nonmax_features` starts
    /// empty; select it with [`set_nonmax`](Self::set_nonmax) or
    /// [`all_nonmax`](Self::all_nonmax).
    pub fn from_sorted(mut features: Vec<Feature>, img_rows: i32) -> CoreResult<Self> {
        for (i, f) in features.iter().enumerate() {
            if f.y < 0 || f.y >= img_rows {
                return Err(CoreError::RowOutOfRange { row: f.y, rows: img_rows });
            }
            if i > 0 {
                let prev = &features[i - 1];
                if f.y < prev.y || (f.y == prev.y && f.x < prev.x) {
                    return Err(CoreError::UnsortedFeatures { index: i });
                }
            }
        }
        for (i, f) in features.iter_mut().enumerate() {
            f.idx = i;
        }
        let mut row_idxs = vec![0usize; img_rows as usize + 1];
        for f in &features {
            row_idxs[f.y as usize + 1] += 1;
        }
        for i in 1..row_idxs.len() {
            row_idxs[i] += row_idxs[i - 1];
        }
        Ok(Self {
            all_features: features,
            row_idxs,
            nonmax_features: Vec::new(),
        })
    }

    /// Features on row `y`, in ascending column order. Empty for rows outside
    /// the indexed range.
    #[inline]
    pub fn row(&self, y: i32) -> &[Feature] {
        if y < 0 || (y as usize + 1) >= self.row_idxs.len() {
            return &[];
        }
        &self.all_features[self.row_idxs[y as usize]..self.row_idxs[y as usize + 1]]
    }

    /// Select the non-maximum-suppression survivors by index into
    /// `all_features`.
    pub fn set_nonmax(&mut self, idxs: &[usize]) {
        self.nonmax_features = idxs.iter().map(|&i| self.all_features[i]).collect();
    }

    /// Treat every feature as a suppression survivor.
    pub fn all_nonmax(mut self) -> Self {
        self.nonmax_features = self.all_features.clone();
        self
    }

    pub fn len(&self) -> usize {
        self.all_features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all_features.is_empty()
    }
}

/// An accepted correspondence between a left and a right feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub feature1_idx: usize,
    pub feature2_idx: usize,
    pub dist: u32,
}

/// Default worker count for the parallel engines.
pub fn default_thread_count() -> usize {
    num_cpus::get().max(1)
}

/// Initialize the Rayon thread pool with the specified number of threads.
pub fn init_thread_pool(n_threads: usize) -> Result<(), rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build_global()
}
