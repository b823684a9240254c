//! EXIF orientation handling.

use image::imageops;

use crate::document::Surface;

/// EXIF Orientation values, named by where row 0 and column 0 sit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    TopLeft = 1,
    TopRight = 2,
    BottomRight = 3,
    BottomLeft = 4,
    LeftTop = 5,
    RightTop = 6,
    RightBottom = 7,
    LeftBottom = 8,
}

impl Orientation {
    pub fn from_tag_value(value: u16) -> Option<Self> {
        Some(match value {
            1 => Self::TopLeft,
            2 => Self::TopRight,
            3 => Self::BottomRight,
            4 => Self::BottomLeft,
            5 => Self::LeftTop,
            6 => Self::RightTop,
            7 => Self::RightBottom,
            8 => Self::LeftBottom,
            _ => return None,
        })
    }

    /// `true` when upright output has width and height swapped.
    pub fn swaps_dimensions(self) -> bool {
        matches!(self, Self::LeftTop | Self::RightTop | Self::RightBottom | Self::LeftBottom)
    }
}

/// Rotate and/or mirror `surface` so it displays upright.
pub fn apply_orientation(surface: Surface, orientation: Orientation) -> Surface {
    match orientation {
        Orientation::TopLeft => surface,
        Orientation::TopRight => imageops::flip_horizontal(&surface),
        Orientation::BottomRight => imageops::rotate180(&surface),
        Orientation::BottomLeft => imageops::flip_vertical(&surface),
        Orientation::LeftTop => imageops::flip_horizontal(&imageops::rotate90(&surface)),
        Orientation::RightTop => imageops::rotate90(&surface),
        Orientation::RightBottom => imageops::flip_horizontal(&imageops::rotate270(&surface)),
        Orientation::LeftBottom => imageops::rotate270(&surface),
    }
}
