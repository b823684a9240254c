//! Well-known tag ids and display names.

use super::model::{Section, TagPath};

// ── IFD0 ─────────────────────────────────────────────────────────────

pub const IMAGE_WIDTH: TagPath = TagPath::new(Section::Image, 0x0100);
pub const IMAGE_LENGTH: TagPath = TagPath::new(Section::Image, 0x0101);
pub const ORIENTATION: TagPath = TagPath::new(Section::Image, 0x0112);
pub const X_RESOLUTION: TagPath = TagPath::new(Section::Image, 0x011A);
pub const Y_RESOLUTION: TagPath = TagPath::new(Section::Image, 0x011B);
pub const RESOLUTION_UNIT: TagPath = TagPath::new(Section::Image, 0x0128);
/// Embedded ICC profile (InterColorProfile).
pub const ICC_PROFILE: TagPath = TagPath::new(Section::Image, 0x8773);

// ── Exif sub-IFD ─────────────────────────────────────────────────────

pub const EXIF_VERSION: TagPath = TagPath::new(Section::Photo, 0x9000);
pub const COLOR_SPACE: TagPath = TagPath::new(Section::Photo, 0xA001);
pub const PIXEL_X_DIMENSION: TagPath = TagPath::new(Section::Photo, 0xA002);
pub const PIXEL_Y_DIMENSION: TagPath = TagPath::new(Section::Photo, 0xA003);

// ── Interop sub-IFD ──────────────────────────────────────────────────

pub const INTEROPERABILITY_INDEX: TagPath = TagPath::new(Section::Interop, 0x0001);
pub const INTEROPERABILITY_VERSION: TagPath = TagPath::new(Section::Interop, 0x0002);

// ── GPS sub-IFD ──────────────────────────────────────────────────────

pub const GPS_VERSION_ID: TagPath = TagPath::new(Section::Gps, 0x0000);

// ── Sub-IFD pointers ─────────────────────────────────────────────────

/// IFD0 → Exif sub-IFD.
pub const EXIF_IFD_POINTER: u16 = 0x8769;
/// IFD0 → GPS sub-IFD.
pub const GPS_IFD_POINTER: u16 = 0x8825;
/// Exif sub-IFD → Interop sub-IFD.
pub const INTEROP_IFD_POINTER: u16 = 0xA005;

/// Tags describing where a TIFF stores its own strips or thumbnail.
/// They are meaningless once the pixels live in a WebP bitstream.
pub const IMAGE_LAYOUT_TAGS: &[u16] = &[
    0x0111, // StripOffsets
    0x0116, // RowsPerStrip
    0x0117, // StripByteCounts
    0x014A, // SubIFDs
    0x0201, // JPEGInterchangeFormat
    0x0202, // JPEGInterchangeFormatLength
];

/// EXIF ColorSpace values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Srgb,
    AdobeRgb,
    Uncalibrated,
}

impl ColorSpace {
    pub fn from_tag_value(value: u16) -> Option<Self> {
        match value {
            1 => Some(Self::Srgb),
            2 => Some(Self::AdobeRgb),
            0xFFFF => Some(Self::Uncalibrated),
            _ => None,
        }
    }

    /// The value written to the ColorSpace tag. Adobe RGB is not an EXIF
    /// baseline value, so it is reported as uncalibrated.
    pub fn tag_value(self) -> u16 {
        match self {
            Self::Srgb => 1,
            Self::AdobeRgb | Self::Uncalibrated => 0xFFFF,
        }
    }
}

/// Resolve a display name for a tag.
pub fn tag_name(path: TagPath) -> Option<&'static str> {
    let table: &[(u16, &str)] = match path.section {
        Section::Image => IMAGE_NAMES,
        Section::Photo => PHOTO_NAMES,
        Section::Interop => INTEROP_NAMES,
        Section::Gps => GPS_NAMES,
    };
    table
        .binary_search_by_key(&path.tag_id, |&(id, _)| id)
        .ok()
        .map(|idx| table[idx].1)
}

// Sorted by id for binary search.
const IMAGE_NAMES: &[(u16, &str)] = &[
    (0x00FE, "NewSubfileType"),
    (0x0100, "ImageWidth"),
    (0x0101, "ImageLength"),
    (0x0102, "BitsPerSample"),
    (0x0103, "Compression"),
    (0x0106, "PhotometricInterpretation"),
    (0x010E, "ImageDescription"),
    (0x010F, "Make"),
    (0x0110, "Model"),
    (0x0112, "Orientation"),
    (0x0115, "SamplesPerPixel"),
    (0x011A, "XResolution"),
    (0x011B, "YResolution"),
    (0x011C, "PlanarConfiguration"),
    (0x0128, "ResolutionUnit"),
    (0x012D, "TransferFunction"),
    (0x0131, "Software"),
    (0x0132, "DateTime"),
    (0x013B, "Artist"),
    (0x013E, "WhitePoint"),
    (0x013F, "PrimaryChromaticities"),
    (0x0211, "YCbCrCoefficients"),
    (0x0212, "YCbCrSubSampling"),
    (0x0213, "YCbCrPositioning"),
    (0x0214, "ReferenceBlackWhite"),
    (0x02BC, "XMLPacket"),
    (0x8298, "Copyright"),
    (0x8773, "InterColorProfile"),
    (0x9C9B, "XPTitle"),
    (0x9C9C, "XPComment"),
    (0x9C9D, "XPAuthor"),
    (0x9C9E, "XPKeywords"),
    (0x9C9F, "XPSubject"),
];

const PHOTO_NAMES: &[(u16, &str)] = &[
    (0x829A, "ExposureTime"),
    (0x829D, "FNumber"),
    (0x8822, "ExposureProgram"),
    (0x8827, "ISOSpeedRatings"),
    (0x9000, "ExifVersion"),
    (0x9003, "DateTimeOriginal"),
    (0x9004, "DateTimeDigitized"),
    (0x9010, "OffsetTime"),
    (0x9011, "OffsetTimeOriginal"),
    (0x9101, "ComponentsConfiguration"),
    (0x9201, "ShutterSpeedValue"),
    (0x9202, "ApertureValue"),
    (0x9204, "ExposureBiasValue"),
    (0x9205, "MaxApertureValue"),
    (0x9207, "MeteringMode"),
    (0x9208, "LightSource"),
    (0x9209, "Flash"),
    (0x920A, "FocalLength"),
    (0x927C, "MakerNote"),
    (0x9286, "UserComment"),
    (0x9290, "SubSecTime"),
    (0x9291, "SubSecTimeOriginal"),
    (0x9292, "SubSecTimeDigitized"),
    (0xA000, "FlashpixVersion"),
    (0xA001, "ColorSpace"),
    (0xA002, "PixelXDimension"),
    (0xA003, "PixelYDimension"),
    (0xA217, "SensingMethod"),
    (0xA300, "FileSource"),
    (0xA301, "SceneType"),
    (0xA401, "CustomRendered"),
    (0xA402, "ExposureMode"),
    (0xA403, "WhiteBalance"),
    (0xA404, "DigitalZoomRatio"),
    (0xA405, "FocalLengthIn35mmFilm"),
    (0xA406, "SceneCaptureType"),
    (0xA420, "ImageUniqueID"),
    (0xA430, "CameraOwnerName"),
    (0xA431, "BodySerialNumber"),
    (0xA432, "LensSpecification"),
    (0xA433, "LensMake"),
    (0xA434, "LensModel"),
    (0xA435, "LensSerialNumber"),
];

const INTEROP_NAMES: &[(u16, &str)] = &[
    (0x0001, "InteroperabilityIndex"),
    (0x0002, "InteroperabilityVersion"),
    (0x1000, "RelatedImageFileFormat"),
    (0x1001, "RelatedImageWidth"),
    (0x1002, "RelatedImageLength"),
];

const GPS_NAMES: &[(u16, &str)] = &[
    (0x0000, "GPSVersionID"),
    (0x0001, "GPSLatitudeRef"),
    (0x0002, "GPSLatitude"),
    (0x0003, "GPSLongitudeRef"),
    (0x0004, "GPSLongitude"),
    (0x0005, "GPSAltitudeRef"),
    (0x0006, "GPSAltitude"),
    (0x0007, "GPSTimeStamp"),
    (0x0008, "GPSSatellites"),
    (0x0009, "GPSStatus"),
    (0x000A, "GPSMeasureMode"),
    (0x000B, "GPSDOP"),
    (0x000C, "GPSSpeedRef"),
    (0x000D, "GPSSpeed"),
    (0x0010, "GPSImgDirectionRef"),
    (0x0011, "GPSImgDirection"),
    (0x0012, "GPSMapDatum"),
    (0x001D, "GPSDateStamp"),
];
