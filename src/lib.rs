//! # webp-filetype
//!
//! WebP load/save core with metadata round-tripping: EXIF properties, ICC
//! profiles and XMP packets survive a load → edit → save cycle, orientation
//! is applied on load, and physical resolution maps to document DPI.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use webp_filetype::codec::EncoderOptions;
//! use webp_filetype::pipeline;
//!
//! fn main() -> anyhow::Result<()> {
//!     // Accepts WebP, and JPEG/PNG/GIF/TIFF files that were given a .webp name
//!     let data = std::fs::read("photo.webp")?;
//!     let doc = pipeline::load(&data)?;
//!
//!     for (path, value) in doc.properties.iter() {
//!         println!("{path} = {}", value.display_value());
//!     }
//!
//!     let mut out = std::fs::File::create("copy.webp")?;
//!     pipeline::save(&doc, &mut out, &EncoderOptions::default(), None)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Progress and Cancellation
//!
//! ```rust,no_run
//! use std::ops::ControlFlow;
//! use webp_filetype::codec::EncoderOptions;
//! use webp_filetype::document::{Document, Surface};
//! use webp_filetype::pipeline;
//!
//! let doc = Document::new(Surface::new(4096, 4096));
//! let mut out = Vec::new();
//! let result = pipeline::save(&doc, &mut out, &EncoderOptions::default(), Some(&mut |percent| {
//!     println!("{percent}%");
//!     if percent >= 50 { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
//! }));
//! assert!(result.unwrap_err().is_cancelled());
//! ```
//!
//! ## Modules
//!
//! - [`format`] — container signature detection
//! - [`exif`] — tag model, EXIF parsing and serialization
//! - [`metadata`] — WebP chunks ↔ document metadata
//! - [`codec`] — the [`codec::WebPCodec`] boundary and its libwebp implementation
//! - [`riff`] — RIFF chunk walking and VP8X muxing
//! - [`document`], [`xmp`], [`transform`] — the in-memory image
//! - [`sink`] — output destinations
//! - [`pipeline`] — load and save orchestration
//! - [`config`], [`batch`] — settings and the batch converter behind the CLI

pub mod batch;
pub mod codec;
pub mod config;
pub mod document;
pub mod error;
pub mod exif;
pub mod format;
pub mod metadata;
pub mod pipeline;
pub mod riff;
pub mod sink;
pub mod transform;
pub mod xmp;

pub use document::Document;
pub use error::{Result, WebPError};
