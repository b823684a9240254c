//! Container signature detection.
//!
//! Classification is a fixed-offset byte comparison against a static table.
//! Buffers shorter than a signature simply do not match it.

use serde::Serialize;

/// An image container recognized by its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FormatTag {
    WebP,
    Jpeg,
    Png,
    Gif,
    Tiff,
}

impl FormatTag {
    pub fn name(self) -> &'static str {
        match self {
            Self::WebP => "WebP",
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::Gif => "GIF",
            Self::Tiff => "TIFF",
        }
    }

    /// The matching `image` crate format, used to hand foreign files to their decoder.
    pub fn image_format(self) -> image::ImageFormat {
        match self {
            Self::WebP => image::ImageFormat::WebP,
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Png => image::ImageFormat::Png,
            Self::Gif => image::ImageFormat::Gif,
            Self::Tiff => image::ImageFormat::Tiff,
        }
    }
}

/// A signature is one or more byte runs that must all match at their offsets.
struct Signature {
    format: FormatTag,
    parts: &'static [(usize, &'static [u8])],
}

impl Signature {
    fn matches(&self, data: &[u8]) -> bool {
        self.parts.iter().all(|&(offset, bytes)| {
            data.get(offset..offset + bytes.len()) == Some(bytes)
        })
    }
}

// Checked in order; the first match wins.
static SIGNATURES: &[Signature] = &[
    Signature { format: FormatTag::WebP, parts: &[(0, b"RIFF"), (8, b"WEBP")] },
    Signature { format: FormatTag::Jpeg, parts: &[(0, &[0xFF, 0xD8, 0xFF])] },
    Signature {
        format: FormatTag::Png,
        parts: &[(0, &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A])],
    },
    Signature { format: FormatTag::Gif, parts: &[(0, b"GIF87a")] },
    Signature { format: FormatTag::Gif, parts: &[(0, b"GIF89a")] },
    Signature { format: FormatTag::Tiff, parts: &[(0, &[0x4D, 0x4D, 0x00, 0x2A])] },
    Signature { format: FormatTag::Tiff, parts: &[(0, &[0x49, 0x49, 0x2A, 0x00])] },
];

/// Classify a buffer by its leading bytes.
///
/// # Example
///
/// ```rust
/// use webp_filetype::format::{classify, FormatTag};
///
/// assert_eq!(classify(b"GIF89a\x01\x00"), Some(FormatTag::Gif));
/// assert_eq!(classify(b"RIFF"), None);
/// ```
pub fn classify(data: &[u8]) -> Option<FormatTag> {
    SIGNATURES.iter().find(|sig| sig.matches(data)).map(|sig| sig.format)
}

/// `true` for a RIFF container whose form type is `WEBP`.
pub fn has_webp_signature(data: &[u8]) -> bool {
    classify(data) == Some(FormatTag::WebP)
}

/// The non-WebP format a buffer carries, if any.
pub fn foreign_format(data: &[u8]) -> Option<FormatTag> {
    classify(data).filter(|&tag| tag != FormatTag::WebP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_webp() {
        let data = b"RIFF\x24\x00\x00\x00WEBPVP8L";
        assert_eq!(classify(data), Some(FormatTag::WebP));
        assert!(has_webp_signature(data));
        assert_eq!(foreign_format(data), None);
    }

    #[test]
    fn riff_with_other_form_type_is_not_webp() {
        assert_eq!(classify(b"RIFF\x24\x00\x00\x00WAVEfmt "), None);
    }

    #[test]
    fn detects_foreign_formats() {
        assert_eq!(classify(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(FormatTag::Jpeg));
        assert_eq!(
            classify(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0]),
            Some(FormatTag::Png)
        );
        assert_eq!(classify(b"GIF87a"), Some(FormatTag::Gif));
        assert_eq!(classify(b"GIF89a"), Some(FormatTag::Gif));
        assert_eq!(classify(b"MM\x00\x2a\x00\x00\x00\x08"), Some(FormatTag::Tiff));
        assert_eq!(classify(b"II\x2a\x00\x08\x00\x00\x00"), Some(FormatTag::Tiff));
        assert_eq!(foreign_format(&[0xFF, 0xD8, 0xFF]), Some(FormatTag::Jpeg));
    }

    #[test]
    fn short_buffers_never_match() {
        let full: Vec<u8> = b"RIFF\x00\x00\x00\x00WEBP".to_vec();
        for len in 0..full.len() {
            assert_eq!(classify(&full[..len]), None, "prefix of length {len}");
        }
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        for len in 0..png.len() {
            assert_eq!(classify(&png[..len]), None);
        }
        assert_eq!(classify(&[0xFF, 0xD8]), None);
        assert_eq!(classify(b"GIF89"), None);
        assert_eq!(classify(&[]), None);
    }

    #[test]
    fn unknown_bytes_are_rejected() {
        assert_eq!(classify(b"BM\x00\x00\x00\x00"), None);
        assert_eq!(classify(b"not an image at all"), None);
    }
}
