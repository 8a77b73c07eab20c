use census_core::CoreError;

#[derive(Debug, Clone)]
pub enum CensusError {
    PatternLength(usize),
    DescriptorTooWide { bytes: usize, max: usize },
    InputGeometry { rows: i32, cols: i32, stride: i32 },
    InputPxStep(i32),
    OutputPxStep { expected: i32, actual: i32 },
    OutputGeometry { rows: i32, cols: i32 },
    Core(CoreError),
}

impl std::fmt::Display for CensusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CensusError::PatternLength(len) => {
                write!(f, "Sampling pattern length {} is not a multiple of 8", len)
            }
            CensusError::DescriptorTooWide { bytes, max } => {
                write!(f, "Descriptor width {} bytes exceeds supported maximum of {}", bytes, max)
            }
            CensusError::InputGeometry { rows, cols, stride } => {
                write!(
                    f,
                    "Input image {}x{} (stride {}) does not match the transform configuration",
                    cols, rows, stride
                )
            }
            CensusError::InputPxStep(s) => {
                write!(f, "Input pixel step {} (census input must be 1 byte/pixel)", s)
            }
            CensusError::OutputPxStep { expected, actual } => {
                write!(f, "Output pixel step {} does not hold a {}-byte descriptor", actual, expected)
            }
            CensusError::OutputGeometry { rows, cols } => {
                write!(f, "Output image {}x{} does not match the input dimensions", cols, rows)
            }
            CensusError::Core(e) => write!(f, "Image error: {}", e),
        }
    }
}

impl std::error::Error for CensusError {}

impl From<CoreError> for CensusError {
    fn from(err: CoreError) -> Self {
        CensusError::Core(err)
    }
}

pub type CensusResult<T> = Result<T, CensusError>;
