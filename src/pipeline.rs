//! Load and save orchestration.
//!
//! ```text
//! load: detect container → WebP branch | foreign branch | reject → populate document
//! save: validate dimensions → render to scratch → build metadata → encode → sink
//! ```

use img_parts::{Bytes, ImageEXIF, ImageICC};

use crate::codec::{EncoderOptions, ProgressCallback, WebPCodec, default_codec};
use crate::document::{Document, Resolution, Surface};
use crate::error::{Result, WebPError};
use crate::exif::{TagValue, tags};
use crate::format::{self, FormatTag};
use crate::metadata::{DecodedMetadata, create_encoder_metadata, decode_metadata};
use crate::sink::{self, ImageSink};
use crate::transform::apply_orientation;
use crate::xmp::XmpPacket;

/// Largest width or height a WebP image can have.
pub const MAX_DIMENSION: u32 = 16383;

/// A non-WebP image decoded by its own format's loader.
#[derive(Debug, Clone)]
pub struct ForeignImage {
    pub surface: Surface,
    pub metadata: DecodedMetadata,
}

/// Loads the other image formats a `.webp` file may actually contain.
pub trait ForeignLoader: Send + Sync {
    fn load(&self, data: &[u8], format: FormatTag) -> Result<ForeignImage>;
}

/// Decodes foreign files with the `image` crate and recovers their ICC
/// profile and EXIF block with `img-parts` (JPEG and PNG only).
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCrateLoader;

impl ForeignLoader for ImageCrateLoader {
    fn load(&self, data: &[u8], format: FormatTag) -> Result<ForeignImage> {
        let surface = image::load_from_memory_with_format(data, format.image_format())
            .map_err(WebPError::from_decode)?
            .into_rgba8();
        let (icc_profile, exif) = embedded_metadata(data, format);
        Ok(ForeignImage {
            surface,
            metadata: DecodedMetadata::from_blobs(icc_profile, exif, None),
        })
    }
}

fn embedded_metadata(data: &[u8], format: FormatTag) -> (Option<Vec<u8>>, Option<Vec<u8>>) {
    let bytes = Bytes::copy_from_slice(data);
    let parsed = match format {
        FormatTag::Jpeg => img_parts::jpeg::Jpeg::from_bytes(bytes)
            .map(|jpeg| (jpeg.icc_profile(), jpeg.exif())),
        FormatTag::Png => img_parts::png::Png::from_bytes(bytes)
            .map(|png| (png.icc_profile(), png.exif())),
        _ => return (None, None),
    };
    match parsed {
        Ok((icc, exif)) => (icc.map(|b| b.to_vec()), exif.map(|b| b.to_vec())),
        Err(e) => {
            log::debug!("could not read {} metadata segments: {e}", format.name());
            (None, None)
        }
    }
}

/// Load a file into a [`Document`] using the default codec.
///
/// WebP files are decoded directly. Files that are really JPEG, PNG, GIF or
/// TIFF are handed to their own decoder. Anything else fails with
/// [`WebPError::InvalidImageFormat`].
///
/// # Example
///
/// ```rust,no_run
/// use webp_filetype::pipeline;
///
/// let data = std::fs::read("photo.webp")?;
/// let doc = pipeline::load(&data)?;
/// println!("{}x{} at {} dpi", doc.width(), doc.height(), doc.resolution.x);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn load(data: &[u8]) -> Result<Document> {
    load_with(data, default_codec(), &ImageCrateLoader)
}

/// [`load`] with an explicit codec and foreign-format loader.
pub fn load_with(data: &[u8], codec: &dyn WebPCodec, foreign: &dyn ForeignLoader) -> Result<Document> {
    if format::has_webp_signature(data) {
        return load_webp(data, codec);
    }

    let Some(tag) = format::foreign_format(data) else {
        return Err(WebPError::InvalidImageFormat);
    };
    log::info!("not a WebP file, loading it as {}", tag.name());
    let image = foreign.load(data, tag)?;
    Ok(populate(image.surface, image.metadata))
}

fn load_webp(data: &[u8], codec: &dyn WebPCodec) -> Result<Document> {
    let info = codec.image_info(data)?;
    if info.has_animation {
        return Err(WebPError::AnimatedNotSupported);
    }

    let mut surface = Surface::new(info.width, info.height);
    codec.decode_pixels(data, &mut surface)?;
    let metadata = decode_metadata(codec, data)?;
    Ok(populate(surface, metadata))
}

/// Turn decoded pixels and metadata into a document. Shared by both branches.
fn populate(surface: Surface, mut metadata: DecodedMetadata) -> Document {
    let surface = match metadata.take_orientation() {
        Some(orientation) => {
            log::debug!("applying EXIF orientation {orientation:?}");
            apply_orientation(surface, orientation)
        }
        None => surface,
    };
    let mut doc = Document::new(surface);

    if let Some(fields) = metadata.take_resolution() {
        match Resolution::from_tags(&fields) {
            Some(resolution) => doc.resolution = resolution,
            None => log::debug!("ignoring degenerate resolution {fields:?}"),
        }
    }

    if let Some(icc) = metadata.take_icc_profile() {
        doc.set_property(tags::ICC_PROFILE, TagValue::undefined(icc));
    }
    if let Some(exif) = metadata.take_exif() {
        for (path, value) in exif {
            doc.properties.insert_if_absent(path, value);
        }
    }
    if let Some(xmp) = metadata.take_xmp() {
        doc.xmp = XmpPacket::try_parse(&xmp);
        if doc.xmp.is_none() {
            log::warn!("ignoring malformed XMP packet ({} bytes)", xmp.len());
        }
    }
    doc
}

/// Encode `doc` as WebP into `sink` using the default codec.
///
/// Nothing reaches the sink unless encoding succeeds. A progress callback
/// that returns `ControlFlow::Break` ends the save with
/// [`WebPError::UserCancelled`].
///
/// # Example
///
/// ```rust,no_run
/// use webp_filetype::codec::EncoderOptions;
/// use webp_filetype::document::{Document, Surface};
/// use webp_filetype::pipeline;
///
/// let doc = Document::new(Surface::new(64, 64));
/// let mut out = std::fs::File::create("blank.webp")?;
/// pipeline::save(&doc, &mut out, &EncoderOptions::default(), None)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn save<S: ImageSink + ?Sized>(
    doc: &Document,
    sink: &mut S,
    options: &EncoderOptions,
    progress: Option<ProgressCallback<'_>>,
) -> Result<()> {
    save_with(default_codec(), doc, sink, options, progress)
}

/// [`save`] with an explicit codec.
pub fn save_with<S: ImageSink + ?Sized>(
    codec: &dyn WebPCodec,
    doc: &Document,
    sink: &mut S,
    options: &EncoderOptions,
    progress: Option<ProgressCallback<'_>>,
) -> Result<()> {
    let (width, height) = (doc.width(), doc.height());
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(WebPError::ImageTooLarge { width, height, max: MAX_DIMENSION });
    }

    let options = EncoderOptions {
        quality: if options.lossless { 100 } else { options.quality.min(100) },
        ..*options
    };

    let mut scratch = Surface::new(width, height);
    doc.render_into(&mut scratch);

    let metadata = create_encoder_metadata(doc);
    codec.encode(
        &scratch,
        &options,
        metadata.as_ref(),
        &mut |bytes: &[u8]| sink::write_image(sink, bytes),
        progress,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{EncoderMetadata, ImageInfo, LibWebPCodec, WriteCallback};
    use crate::document::MeasurementUnit;
    use crate::exif::{ColorSpace, ExifWriter, MetadataMap, Rational, ResolutionTags, Section, TagPath};
    use crate::riff;
    use image::Rgba;
    use std::ops::ControlFlow;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const MAKE: TagPath = TagPath::new(Section::Image, 0x010F);
    const EXPOSURE_TIME: TagPath = TagPath::new(Section::Photo, 0x829A);
    const GPS_LATITUDE_REF: TagPath = TagPath::new(Section::Gps, 0x0001);

    /// Records what the pipeline asks of the codec.
    struct MockCodec {
        info: ImageInfo,
        decodes: AtomicUsize,
        encodes: AtomicUsize,
        last_options: Mutex<Option<EncoderOptions>>,
    }

    impl MockCodec {
        fn new(width: u32, height: u32, has_animation: bool) -> Self {
            Self {
                info: ImageInfo { width, height, has_animation },
                decodes: AtomicUsize::new(0),
                encodes: AtomicUsize::new(0),
                last_options: Mutex::new(None),
            }
        }
    }

    impl WebPCodec for MockCodec {
        fn image_info(&self, _data: &[u8]) -> Result<ImageInfo> {
            Ok(self.info)
        }

        fn decode_pixels(&self, _data: &[u8], output: &mut Surface) -> Result<()> {
            self.decodes.fetch_add(1, Ordering::SeqCst);
            for pixel in output.pixels_mut() {
                *pixel = Rgba([10, 20, 30, 255]);
            }
            Ok(())
        }

        fn encode(
            &self,
            _surface: &Surface,
            options: &EncoderOptions,
            _metadata: Option<&EncoderMetadata>,
            write: WriteCallback<'_>,
            _progress: Option<ProgressCallback<'_>>,
        ) -> Result<()> {
            self.encodes.fetch_add(1, Ordering::SeqCst);
            *self.last_options.lock().unwrap() = Some(*options);
            write(b"encoded")
        }
    }

    fn gradient(width: u32, height: u32) -> Surface {
        Surface::from_fn(width, height, |x, y| Rgba([(x * 40) as u8, (y * 40) as u8, 99, 255]))
    }

    /// Lossless WebP with caller-chosen metadata chunks.
    fn webp_with(surface: &Surface, metadata: &EncoderMetadata) -> Vec<u8> {
        let options = EncoderOptions { quality: 100, lossless: true, ..EncoderOptions::default() };
        let mut out = Vec::new();
        LibWebPCodec
            .encode(surface, &options, Some(metadata), &mut |bytes: &[u8]| {
                out.extend_from_slice(bytes);
                Ok(())
            }, None)
            .unwrap();
        out
    }

    fn lossless() -> EncoderOptions {
        EncoderOptions { lossless: true, ..EncoderOptions::default() }
    }

    // ── format dispatch ──────────────────────────────────────────────

    #[test]
    fn unknown_signature_is_rejected() {
        let codec = MockCodec::new(1, 1, false);
        assert!(matches!(
            load_with(b"not an image at all", &codec, &ImageCrateLoader),
            Err(WebPError::InvalidImageFormat)
        ));
        assert!(matches!(load(&[]), Err(WebPError::InvalidImageFormat)));
    }

    #[test]
    fn animated_webp_is_rejected_before_decode() {
        let codec = MockCodec::new(4, 4, true);
        let data = riff::tests::simple_vp8l(&[0x2F, 0, 0]);
        assert!(matches!(
            load_with(&data, &codec, &ImageCrateLoader),
            Err(WebPError::AnimatedNotSupported)
        ));
        assert_eq!(codec.decodes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn webp_branch_uses_codec() {
        let codec = MockCodec::new(3, 2, false);
        let data = riff::tests::simple_vp8l(&[0x2F, 0, 0]);
        let doc = load_with(&data, &codec, &ImageCrateLoader).unwrap();
        assert_eq!((doc.width(), doc.height()), (3, 2));
        assert_eq!(doc.surface().get_pixel(2, 1), &Rgba([10, 20, 30, 255]));
        assert_eq!(codec.decodes.load(Ordering::SeqCst), 1);
        assert!(doc.properties.is_empty());
    }

    #[test]
    fn jpeg_named_webp_loads_like_jpeg() {
        let rgb = image::RgbImage::from_fn(16, 8, |x, y| image::Rgb([(x * 16) as u8, (y * 32) as u8, 128]));
        let mut jpeg = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, 90)
            .encode_image(&rgb)
            .unwrap();

        let mut exif = MetadataMap::new();
        exif.insert(MAKE, TagValue::ascii("Olympus"));
        let blob = ExifWriter::new(exif, ColorSpace::Srgb, (16, 8))
            .with_resolution(ResolutionTags { x: Rational::new(240, 1), y: Rational::new(240, 1), unit: 2 })
            .create_exif_blob();
        let mut parts = img_parts::jpeg::Jpeg::from_bytes(Bytes::from(jpeg)).unwrap();
        parts.set_exif(Some(Bytes::from(blob)));
        let mut data = Vec::new();
        parts.encoder().write_to(&mut data).unwrap();

        let doc = load(&data).unwrap();

        let direct = image::load_from_memory_with_format(&data, image::ImageFormat::Jpeg)
            .unwrap()
            .into_rgba8();
        assert_eq!(doc.surface(), &direct);
        assert_eq!(doc.resolution, Resolution { unit: MeasurementUnit::Inch, x: 240.0, y: 240.0 });
        assert_eq!(doc.properties.get(MAKE).and_then(TagValue::as_ascii), Some("Olympus"));
        assert!(!doc.properties.contains(tags::ORIENTATION));
        assert!(!doc.properties.contains(tags::COLOR_SPACE));
    }

    #[test]
    fn png_named_webp_loads_like_png() {
        let surface = gradient(5, 5);
        let mut png = Vec::new();
        surface
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let doc = load(&png).unwrap();
        assert_eq!(doc.surface(), &surface);
        assert_eq!(doc.resolution, Resolution::default());
    }

    #[test]
    fn truncated_foreign_file_is_an_error() {
        let data = [0xFF, 0xD8, 0xFF, 0xE0, 0x00];
        assert!(load(&data).is_err());
    }

    // ── WebP load ────────────────────────────────────────────────────

    #[test]
    fn orientation_is_applied_and_consumed() {
        // IFD0 holding only Orientation = 6
        let exif = vec![
            b'I', b'I', 0x2A, 0x00, 0x08, 0x00, 0x00, 0x00, // header
            0x01, 0x00, // one entry
            0x12, 0x01, 0x03, 0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, // no next IFD
        ];
        let data = webp_with(&gradient(3, 2), &EncoderMetadata { exif: Some(exif), ..Default::default() });

        let doc = load(&data).unwrap();
        assert_eq!((doc.width(), doc.height()), (2, 3));
        assert!(!doc.properties.contains(tags::ORIENTATION));
    }

    #[test]
    fn zero_resolution_keeps_default_dpi() {
        let mut exif = MetadataMap::new();
        exif.insert(MAKE, TagValue::ascii("Pentax"));
        let blob = ExifWriter::new(exif, ColorSpace::Srgb, (2, 2))
            .with_resolution(ResolutionTags { x: Rational::new(0, 1), y: Rational::new(72, 1), unit: 2 })
            .create_exif_blob();
        let data = webp_with(&gradient(2, 2), &EncoderMetadata { exif: Some(blob), ..Default::default() });

        let doc = load(&data).unwrap();
        assert_eq!(doc.resolution, Resolution::default());
        assert!(!doc.properties.contains(tags::X_RESOLUTION));
        assert_eq!(doc.properties.get(MAKE).and_then(TagValue::as_ascii), Some("Pentax"));
    }

    #[test]
    fn malformed_xmp_is_dropped() {
        let data = webp_with(&gradient(2, 2), &EncoderMetadata {
            xmp: Some(b"<x:xmpmeta><broken".to_vec()),
            ..Default::default()
        });
        let doc = load(&data).unwrap();
        assert_eq!(doc.xmp, None);
    }

    #[test]
    fn icc_chunk_becomes_property() {
        let data = webp_with(&gradient(2, 2), &EncoderMetadata {
            icc_profile: Some(b"fake icc profile".to_vec()),
            ..Default::default()
        });
        let doc = load(&data).unwrap();
        assert_eq!(
            doc.properties.get(tags::ICC_PROFILE).map(TagValue::data),
            Some(&b"fake icc profile"[..])
        );
    }

    // ── save ─────────────────────────────────────────────────────────

    #[test]
    fn oversized_document_is_rejected_before_encode() {
        let codec = MockCodec::new(0, 0, false);
        let mut out = Vec::new();
        for (width, height) in [(MAX_DIMENSION + 1, 1), (1, MAX_DIMENSION + 1)] {
            let doc = Document::new(Surface::new(width, height));
            let err = save_with(&codec, &doc, &mut out, &EncoderOptions::default(), None).unwrap_err();
            assert!(matches!(err, WebPError::ImageTooLarge { max: MAX_DIMENSION, .. }));
        }
        assert_eq!(codec.encodes.load(Ordering::SeqCst), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn maximum_dimension_is_accepted() {
        let codec = MockCodec::new(0, 0, false);
        let doc = Document::new(Surface::new(MAX_DIMENSION, 1));
        let mut out = Vec::new();
        save_with(&codec, &doc, &mut out, &EncoderOptions::default(), None).unwrap();
        assert_eq!(out, b"encoded");
    }

    #[test]
    fn lossless_forces_full_quality() {
        let codec = MockCodec::new(0, 0, false);
        let doc = Document::new(gradient(2, 2));
        let options = EncoderOptions { quality: 10, lossless: true, ..EncoderOptions::default() };
        save_with(&codec, &doc, &mut Vec::new(), &options, None).unwrap();
        assert_eq!(codec.last_options.lock().unwrap().map(|o| o.quality), Some(100));

        let lossy = EncoderOptions { quality: 10, ..EncoderOptions::default() };
        save_with(&codec, &doc, &mut Vec::new(), &lossy, None).unwrap();
        assert_eq!(codec.last_options.lock().unwrap().map(|o| o.quality), Some(10));
    }

    #[test]
    fn cancelling_reports_user_cancelled_and_leaves_sink_alone() {
        let doc = Document::new(gradient(8, 8));
        let mut out = b"untouched".to_vec();
        let err = save(&doc, &mut out, &EncoderOptions::default(), Some(&mut |_| ControlFlow::Break(())))
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(out, b"untouched");
    }

    #[test]
    fn document_without_metadata_saves_plain_webp() {
        let doc = Document::new(gradient(4, 4));
        let mut out = Vec::new();
        save(&doc, &mut out, &lossless(), None).unwrap();

        let container = riff::WebPContainer::parse(&out).unwrap();
        assert!(container.find(riff::VP8X).is_none());
        assert_eq!(load(&out).unwrap().surface(), doc.surface());
    }

    // ── round trip ───────────────────────────────────────────────────

    #[test]
    fn save_then_load_round_trips_metadata() {
        let mut doc = Document::new(gradient(6, 4));
        doc.resolution = Resolution { unit: MeasurementUnit::Inch, x: 300.0, y: 300.0 };
        doc.set_property(MAKE, TagValue::ascii("Hasselblad"));
        doc.set_property(EXPOSURE_TIME, TagValue::rational(Rational::new(1, 125)));
        doc.set_property(GPS_LATITUDE_REF, TagValue::ascii("S"));
        doc.set_property(tags::ORIENTATION, TagValue::short(1));
        doc.set_property(tags::INTEROPERABILITY_INDEX, TagValue::ascii("R98"));
        doc.set_property(tags::ICC_PROFILE, TagValue::undefined(b"embedded profile".to_vec()));
        doc.xmp = XmpPacket::try_parse(b"<x:xmpmeta xmlns:x=\"adobe:ns:meta/\"/>");

        let mut out = Vec::new();
        save(&doc, &mut out, &lossless(), None).unwrap();
        let loaded = load(&out).unwrap();

        let mut expected = doc.properties.clone();
        expected.remove(tags::ORIENTATION);
        expected.remove(tags::INTEROPERABILITY_INDEX);
        expected.insert(tags::EXIF_VERSION, TagValue::undefined(b"0230".to_vec()));
        expected.insert(tags::PIXEL_X_DIMENSION, TagValue::long(6));
        expected.insert(tags::PIXEL_Y_DIMENSION, TagValue::long(4));
        expected.insert(tags::GPS_VERSION_ID, TagValue::bytes(vec![2, 3, 0, 0]));
        assert_eq!(loaded.properties, expected);
        assert_eq!(loaded.resolution, doc.resolution);
        assert_eq!(loaded.xmp, doc.xmp);
        assert_eq!(loaded.surface(), doc.surface());

        // ICC present, so the block declared an uncalibrated color space.
        let exif = riff::WebPContainer::parse(&out).unwrap().find(riff::EXIF).unwrap().to_vec();
        let decoded = DecodedMetadata::from_blobs(None, Some(exif), None);
        assert_eq!(decoded.color_space(), Some(0xFFFF));
    }

    #[test]
    fn unchanged_exif_block_survives_load_and_save() {
        let mut exif = MetadataMap::new();
        exif.insert(MAKE, TagValue::ascii("Sigma"));
        exif.insert(EXPOSURE_TIME, TagValue::rational(Rational::new(1, 60)));
        exif.insert(GPS_LATITUDE_REF, TagValue::ascii("N"));
        exif.insert(tags::INTEROPERABILITY_INDEX, TagValue::ascii("R98"));
        let source = ExifWriter::new(exif, ColorSpace::Srgb, (5, 3))
            .with_resolution(ResolutionTags { x: Rational::new(300, 1), y: Rational::new(300, 1), unit: 2 })
            .create_exif_blob();
        let data = webp_with(&gradient(5, 3), &EncoderMetadata { exif: Some(source.clone()), ..Default::default() });

        let resave = |data: &[u8]| {
            let mut out = Vec::new();
            save(&load(data).unwrap(), &mut out, &lossless(), None).unwrap();
            out
        };
        let exif_of = |data: &[u8]| riff::WebPContainer::parse(data).unwrap().find(riff::EXIF).map(<[u8]>::to_vec);

        let first = resave(&data);
        let second = resave(&first);
        assert_eq!(exif_of(&first), Some(source));
        assert_eq!(exif_of(&second), exif_of(&first));
    }

    #[test]
    fn raw_blobs_are_embedded_verbatim() {
        let mut doc = Document::new(gradient(2, 2));
        doc.raw.xmp = Some(b"<x:xmpmeta xmlns:x=\"adobe:ns:meta/\"/>".to_vec());
        doc.raw.icc_profile = Some(b"raw profile".to_vec());

        let mut out = Vec::new();
        save(&doc, &mut out, &lossless(), None).unwrap();
        let container = riff::WebPContainer::parse(&out).unwrap();
        assert_eq!(container.find(riff::ICCP), Some(&b"raw profile"[..]));
        assert_eq!(container.find(riff::XMP), doc.raw.xmp.as_deref());
        assert_eq!(container.find(riff::EXIF), None);
    }

    #[test]
    fn file_sink_receives_whole_image() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out.webp");
        let doc = Document::new(gradient(5, 3));

        let mut file = std::fs::File::create(&path).unwrap();
        save(&doc, &mut file, &lossless(), None).unwrap();
        drop(file);

        let data = std::fs::read(&path).unwrap();
        assert_eq!(load(&data).unwrap().surface(), doc.surface());
    }
}
