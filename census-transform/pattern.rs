/// Named sampling-window shapes for the census transform.
///
/// Each shape is an ordered list of `(dy, dx)` neighbor positions relative to
/// the center pixel; every 8 samples fill one byte of the packed descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SamplingWindow {
    /// Full 3x3 neighborhood, 8 samples, 1-byte descriptor.
    Dense3,
    /// Ring of radius 2 on a 5x5 window, 8 samples, 1-byte descriptor.
    Sparse8,
    /// Radius-3 ring plus the inner 3x3 ring on a 7x7 window, 16 samples,
    /// 2-byte descriptor.
    Sparse16,
}

impl SamplingWindow {
    /// Diameter of the sampling neighborhood.
    pub fn window_size(&self) -> i32 {
        match self {
            SamplingWindow::Dense3 => 3,
            SamplingWindow::Sparse8 => 5,
            SamplingWindow::Sparse16 => 7,
        }
    }

    /// The ordered `(dy, dx)` sample positions.
    pub fn samples(&self) -> &'static [(i32, i32)] {
        match self {
            SamplingWindow::Dense3 => &[
                (-1, -1), (-1, 0), (-1, 1),
                (0, -1), (0, 1),
                (1, -1), (1, 0), (1, 1),
            ],
            SamplingWindow::Sparse8 => &[
                (-2, -2), (-2, 0), (-2, 2),
                (0, -2), (0, 2),
                (2, -2), (2, 0), (2, 2),
            ],
            SamplingWindow::Sparse16 => &[
                (-3, -3), (-3, 0), (-3, 3),
                (0, -3), (0, 3),
                (3, -3), (3, 0), (3, 3),
                (-1, -1), (-1, 0), (-1, 1),
                (0, -1), (0, 1),
                (1, -1), (1, 0), (1, 1),
            ],
        }
    }
}
