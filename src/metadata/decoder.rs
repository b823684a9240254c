use crate::codec::{MetadataKind, WebPCodec};
use crate::error::Result;
use crate::exif::{self, MetadataMap, ResolutionTags, TagValue, tags};
use crate::transform::Orientation;

/// Metadata pulled out of one file during a load.
///
/// Accessors named `take_*` move a piece out so that whatever is left in
/// [`DecodedMetadata::exif`] can be copied to the document verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedMetadata {
    icc_profile: Option<Vec<u8>>,
    exif: Option<MetadataMap>,
    xmp: Option<Vec<u8>>,
    color_space: Option<u16>,
}

impl DecodedMetadata {
    /// Assemble from raw blobs. A present EXIF blob is parsed and its
    /// ColorSpace tag popped; an unparseable blob is treated as absent.
    pub fn from_blobs(icc_profile: Option<Vec<u8>>, exif: Option<Vec<u8>>, xmp: Option<Vec<u8>>) -> Self {
        let mut exif = exif.and_then(|block| {
            let parsed = exif::parse_exif(&block);
            if parsed.is_none() {
                log::warn!("ignoring EXIF block without a valid TIFF header ({} bytes)", block.len());
            }
            parsed
        });

        let color_space = exif
            .as_mut()
            .and_then(|map| map.remove(tags::COLOR_SPACE))
            .and_then(|value| value.as_short());

        Self { icc_profile, exif, xmp, color_space }
    }

    pub fn icc_profile(&self) -> Option<&[u8]> {
        self.icc_profile.as_deref()
    }

    pub fn exif(&self) -> Option<&MetadataMap> {
        self.exif.as_ref()
    }

    pub fn xmp(&self) -> Option<&[u8]> {
        self.xmp.as_deref()
    }

    /// The EXIF ColorSpace value that was in the block, if it decoded as a short.
    pub fn color_space(&self) -> Option<u16> {
        self.color_space
    }

    pub fn is_empty(&self) -> bool {
        self.icc_profile.is_none() && self.exif.is_none() && self.xmp.is_none()
    }

    /// Pop the Orientation tag. The tag is removed even when its value is
    /// not a valid orientation.
    pub fn take_orientation(&mut self) -> Option<Orientation> {
        self.exif
            .as_mut()?
            .remove(tags::ORIENTATION)
            .and_then(|value| value.as_short())
            .and_then(Orientation::from_tag_value)
    }

    /// Pop XResolution, YResolution and ResolutionUnit. Returns them only
    /// when all three were present with the expected types.
    pub fn take_resolution(&mut self) -> Option<ResolutionTags> {
        let map = self.exif.as_mut()?;
        let x = map.remove(tags::X_RESOLUTION);
        let y = map.remove(tags::Y_RESOLUTION);
        let unit = map.remove(tags::RESOLUTION_UNIT);

        Some(ResolutionTags {
            x: x.as_ref().and_then(TagValue::as_rational)?,
            y: y.as_ref().and_then(TagValue::as_rational)?,
            unit: unit.as_ref().and_then(TagValue::as_short)?,
        })
    }

    pub fn take_icc_profile(&mut self) -> Option<Vec<u8>> {
        self.icc_profile.take()
    }

    pub fn take_exif(&mut self) -> Option<MetadataMap> {
        self.exif.take()
    }

    pub fn take_xmp(&mut self) -> Option<Vec<u8>> {
        self.xmp.take()
    }
}

/// Read the ICC, EXIF and XMP chunks of a WebP file.
///
/// Fails with [`crate::error::WebPError::CorruptContainer`] if the chunk
/// structure is inconsistent. Problems inside the EXIF block itself are
/// not fatal; see [`exif::parse_exif`].
pub fn decode_metadata(codec: &dyn WebPCodec, data: &[u8]) -> Result<DecodedMetadata> {
    let icc_profile = read_chunk(codec, data, MetadataKind::ColorProfile)?;
    let exif = read_chunk(codec, data, MetadataKind::Exif)?;
    let xmp = read_chunk(codec, data, MetadataKind::Xmp)?;

    Ok(DecodedMetadata::from_blobs(icc_profile, exif, xmp))
}

fn read_chunk(codec: &dyn WebPCodec, data: &[u8], kind: MetadataKind) -> Result<Option<Vec<u8>>> {
    let size = codec.metadata_chunk_size(data, kind)?;
    if size == 0 {
        return Ok(None);
    }
    let mut chunk = vec![0u8; size];
    codec.extract_metadata_chunk(data, kind, &mut chunk)?;
    log::debug!("read {} chunk: {size} bytes", kind.name());
    Ok(Some(chunk))
}
