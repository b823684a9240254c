use std::io;

use thiserror::Error;

/// Result alias used throughout the load/save core.
pub type Result<T> = std::result::Result<T, WebPError>;

/// Every way a load or save can end early.
///
/// Codec statuses, container problems and sink failures are all translated
/// into one of these variants at the boundary where they are observed, so
/// callers only ever match on this enum.
///
/// [`WebPError::UserCancelled`] is not a failure: it is the outcome of a
/// progress callback asking the encoder to stop. Use
/// [`WebPError::is_cancelled`] to tell it apart from real errors.
#[derive(Debug, Error)]
pub enum WebPError {
    /// Neither a WebP signature nor any other recognized image signature.
    #[error("the file is not a WebP image or any other supported image format")]
    InvalidImageFormat,

    /// The RIFF structure disagrees with the chunk sizes it declares.
    #[error("corrupt WebP container: {0}")]
    CorruptContainer(String),

    /// The signature is fine but the codec rejected the bitstream.
    #[error("the WebP image is invalid or truncated")]
    InvalidWebPImage,

    #[error("the image uses a feature that is not supported: {0}")]
    UnsupportedFeature(String),

    /// Valid WebP with animation, which cannot be loaded into a single surface.
    #[error("animated WebP images are not supported")]
    AnimatedNotSupported,

    #[error("the image is {width}x{height}, WebP is limited to {max}x{max}")]
    ImageTooLarge { width: u32, height: u32, max: u32 },

    #[error("insufficient memory to process the image")]
    OutOfMemory,

    /// Bad encode parameters or a mismatched libwebp. Always a programming error.
    #[error("encoder configuration error: {0}")]
    EncoderConfig(String),

    /// The encoder failed for a reason other than memory or configuration.
    #[error("the WebP encoder failed: {0}")]
    EncodeFailed(String),

    #[error("unable to embed metadata: {0}")]
    MetadataEncoding(String),

    #[error("failed to write the encoded image")]
    WriteFailure(#[source] io::Error),

    #[error("the operation was cancelled")]
    UserCancelled,
}

impl WebPError {
    /// `true` when the operation stopped because the caller asked it to.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::UserCancelled)
    }

    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Self::CorruptContainer(reason.into())
    }

    /// Translate a failure from the `image` crate's decoders.
    pub(crate) fn from_decode(err: image::ImageError) -> Self {
        use image::ImageError;

        match err {
            ImageError::Limits(_) => Self::OutOfMemory,
            ImageError::Unsupported(e) => Self::UnsupportedFeature(e.to_string()),
            other => Self::CorruptContainer(other.to_string()),
        }
    }
}
