//! EXIF tag model, parsing and serialization.
//!
//! - [`model`] — [`TagPath`], [`TagValue`] and the [`MetadataMap`] keyed by them
//! - [`tags`] — well-known tag ids, [`ColorSpace`] and display names
//! - [`parse_exif`] — TIFF/EXIF block → [`MetadataMap`] (either byte order)
//! - [`ExifWriter`] — [`MetadataMap`] → little-endian TIFF/EXIF block

pub mod model;
pub mod tags;

mod reader;
mod writer;

pub use model::{MetadataMap, Rational, ResolutionTags, Section, TagPath, TagValue, ValueKind};
pub use reader::parse_exif;
pub use tags::ColorSpace;
pub use writer::ExifWriter;
