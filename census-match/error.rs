use crate::MatchingMode;
use census_core::CoreError;

#[derive(Debug, Clone)]
pub enum MatchError {
    UnsupportedMode(MatchingMode),
    Unimplemented(&'static str),
    UnsupportedPxStep(i32),
    DescriptorWidthMismatch { expected: i32, actual: i32 },
    PatternLength(usize),
    InvalidDimensions { rows: i32, cols: i32 },
    InvalidDisparity { max_disparity: i32, cols: i32 },
    Core(CoreError),
}

impl std::fmt::Display for MatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchError::UnsupportedMode(mode) => {
                write!(f, "Matching mode {:?} is not supported by sparse matching", mode)
            }
            MatchError::Unimplemented(what) => {
                write!(f, "{} is not implemented", what)
            }
            MatchError::UnsupportedPxStep(s) => {
                write!(f, "Census pixel step {} (summed Hamming distance supports 1 or 2)", s)
            }
            MatchError::DescriptorWidthMismatch { expected, actual } => {
                write!(
                    f,
                    "Census image has {}-byte descriptors but the matcher was configured for {}",
                    actual, expected
                )
            }
            MatchError::PatternLength(len) => {
                write!(
                    f,
                    "Correlation pattern length {} is not a multiple of 4 (required by the 1-byte path)",
                    len
                )
            }
            MatchError::InvalidDimensions { rows, cols } => {
                write!(f, "Invalid image dimensions: {}x{} (must be > 0)", cols, rows)
            }
            MatchError::InvalidDisparity { max_disparity, cols } => {
                write!(
                    f,
                    "Maximum disparity {} is outside the image's {} columns",
                    max_disparity, cols
                )
            }
            MatchError::Core(e) => write!(f, "Image error: {}", e),
        }
    }
}

impl std::error::Error for MatchError {}

impl From<CoreError> for MatchError {
    fn from(err: CoreError) -> Self {
        MatchError::Core(err)
    }
}

pub type MatchResult<T> = Result<T, MatchError>;
