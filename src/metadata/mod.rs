//! Moving metadata between WebP chunks and a [`crate::document::Document`].

mod decoder;
mod encoder;

pub use decoder::{DecodedMetadata, decode_metadata};
pub use encoder::create_encoder_metadata;
