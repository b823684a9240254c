use crate::codec::EncoderMetadata;
use crate::document::Document;
use crate::exif::{ColorSpace, ExifWriter, TagValue, tags};

/// Build the metadata chunks for a save, or `None` when the document has
/// nothing to embed.
///
/// Raw blobs in [`Document::raw`] are used verbatim. Otherwise the ICC
/// profile comes from the [`tags::ICC_PROFILE`] property, EXIF is
/// serialized from the remaining properties and XMP from
/// [`Document::xmp`]. When both a raw ICC blob and the property exist, the
/// raw blob wins and the property is discarded.
///
/// EXIF is written whenever the document has any property items, even if
/// only the ICC profile or ColorSpace were among them, so the resolved
/// color space is always declared.
pub fn create_encoder_metadata(doc: &Document) -> Option<EncoderMetadata> {
    let has_properties = !doc.properties.is_empty();
    let mut properties = doc.properties.clone();
    let legacy_profile = properties.remove(tags::ICC_PROFILE).map(TagValue::into_data);

    let icc_profile = match (&doc.raw.icc_profile, legacy_profile) {
        (Some(raw), _) => Some(raw.clone()),
        (None, Some(legacy)) => {
            log::debug!("using the embedded ICC profile property ({} bytes)", legacy.len());
            Some(legacy)
        }
        (None, None) => None,
    };

    let exif = match &doc.raw.exif {
        Some(raw) => Some(raw.clone()),
        None => {
            let explicit = properties.remove(tags::COLOR_SPACE);
            let color_space = if icc_profile.is_some() {
                for interop in [tags::INTEROPERABILITY_INDEX, tags::INTEROPERABILITY_VERSION] {
                    properties.remove(interop);
                }
                ColorSpace::Uncalibrated
            } else {
                explicit
                    .as_ref()
                    .and_then(TagValue::as_short)
                    .and_then(ColorSpace::from_tag_value)
                    .unwrap_or(ColorSpace::Srgb)
            };

            has_properties.then(|| {
                ExifWriter::new(properties, color_space, (doc.width(), doc.height()))
                    .with_resolution(doc.resolution.to_tags())
                    .create_exif_blob()
            })
        }
    };

    let xmp = doc.raw.xmp.clone().or_else(|| doc.xmp.as_ref().map(|packet| packet.to_bytes()));

    if icc_profile.is_none() && exif.is_none() && xmp.is_none() {
        return None;
    }
    Some(EncoderMetadata { icc_profile, exif, xmp })
}
