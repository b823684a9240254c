//! The in-memory image a load produces and a save consumes.

use serde::{Deserialize, Serialize};

use crate::exif::{MetadataMap, Rational, ResolutionTags, TagPath, TagValue};
use crate::xmp::XmpPacket;

/// 8-bit RGBA pixels, row-major, no padding.
pub type Surface = image::RgbaImage;

/// Physical unit of the document resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeasurementUnit {
    Inch,
    Centimeter,
}

impl MeasurementUnit {
    /// EXIF ResolutionUnit value.
    pub fn exif_unit(self) -> u16 {
        match self {
            Self::Inch => 2,
            Self::Centimeter => 3,
        }
    }

    pub fn from_exif_unit(unit: u16) -> Option<Self> {
        match unit {
            2 => Some(Self::Inch),
            3 => Some(Self::Centimeter),
            _ => None,
        }
    }
}

/// Dots per unit on each axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub unit: MeasurementUnit,
    pub x: f64,
    pub y: f64,
}

impl Default for Resolution {
    fn default() -> Self {
        Self { unit: MeasurementUnit::Inch, x: 96.0, y: 96.0 }
    }
}

impl Resolution {
    /// Translate EXIF resolution fields. Zero, undecodable or unknown-unit
    /// values yield `None` so the caller keeps its default.
    pub fn from_tags(tags: &ResolutionTags) -> Option<Self> {
        let unit = MeasurementUnit::from_exif_unit(tags.unit)?;
        let x = tags.x.to_f64()?;
        let y = tags.y.to_f64()?;
        (x > 0.0 && y > 0.0).then_some(Self { unit, x, y })
    }

    pub fn to_tags(self) -> ResolutionTags {
        ResolutionTags {
            x: Rational::from_f64(self.x),
            y: Rational::from_f64(self.y),
            unit: self.unit.exif_unit(),
        }
    }
}

/// Raw metadata blobs supplied by the caller.
///
/// When present these are embedded verbatim on save, bypassing
/// re-derivation from [`Document::properties`] and [`Document::xmp`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMetadata {
    pub icc_profile: Option<Vec<u8>>,
    pub exif: Option<Vec<u8>>,
    pub xmp: Option<Vec<u8>>,
}

/// A single-layer image with its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    surface: Surface,
    pub resolution: Resolution,
    /// EXIF-style property items. An embedded ICC profile lives here under
    /// [`crate::exif::tags::ICC_PROFILE`].
    pub properties: MetadataMap,
    pub xmp: Option<XmpPacket>,
    pub raw: RawMetadata,
}

impl Document {
    pub fn new(surface: Surface) -> Self {
        Self {
            surface,
            resolution: Resolution::default(),
            properties: MetadataMap::new(),
            xmp: None,
            raw: RawMetadata::default(),
        }
    }

    pub fn width(&self) -> u32 {
        self.surface.width()
    }

    pub fn height(&self) -> u32 {
        self.surface.height()
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut Surface {
        &mut self.surface
    }

    pub fn into_surface(self) -> Surface {
        self.surface
    }

    pub fn set_property(&mut self, path: TagPath, value: TagValue) -> Option<TagValue> {
        self.properties.insert(path, value)
    }

    /// Flatten the document into `scratch`, resizing it if needed.
    pub fn render_into(&self, scratch: &mut Surface) {
        if scratch.dimensions() != self.surface.dimensions() {
            *scratch = Surface::new(self.width(), self.height());
        }
        scratch.copy_from_slice(self.surface.as_raw());
    }
}
