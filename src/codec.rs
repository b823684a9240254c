//! Boundary to the WebP compression library.
//!
//! Everything above this module talks to a [`WebPCodec`]; the compression
//! itself is delegated. [`LibWebPCodec`] decodes through the `image` crate's
//! WebP decoder and encodes through libwebp (`libwebp-sys`), muxing metadata
//! chunks into the container itself.

use std::any::Any;
use std::ffi::{c_int, c_void};
use std::io::Cursor;
use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};

use image::codecs::webp::WebPDecoder;
use image::{DynamicImage, ImageDecoder, ImageError};
use libwebp_sys::{WebPConfig, WebPEncodingError, WebPPicture};
use serde::{Deserialize, Serialize};

use crate::document::Surface;
use crate::error::{Result, WebPError};
use crate::riff::{self, WebPContainer};

/// Called with percent complete (0..=100). Returning `Break` aborts the encode.
pub type ProgressCallback<'a> = &'a mut dyn FnMut(u32) -> ControlFlow<()>;

/// Receives the encoded file. Called once per successful encode.
pub type WriteCallback<'a> = &'a mut dyn FnMut(&[u8]) -> Result<()>;

/// Basic facts about a WebP bitstream, read without decoding pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub has_animation: bool,
}

/// The metadata chunks a WebP container can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    ColorProfile,
    Exif,
    Xmp,
}

impl MetadataKind {
    pub fn fourcc(self) -> [u8; 4] {
        match self {
            Self::ColorProfile => riff::ICCP,
            Self::Exif => riff::EXIF,
            Self::Xmp => riff::XMP,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::ColorProfile => "ICC profile",
            Self::Exif => "EXIF",
            Self::Xmp => "XMP",
        }
    }
}

/// libwebp encoder presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum WebPPreset {
    /// No content-specific tuning.
    Default,
    /// Digital picture, like a portrait or an indoor shot.
    Picture,
    /// Outdoor photograph with natural lighting.
    #[default]
    Photo,
    /// Hand or line drawing with high-contrast details.
    Drawing,
    /// Small-sized colorful image.
    Icon,
    /// Text-like content.
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderOptions {
    /// 0..=100. In lossless mode this is compression effort.
    pub quality: u8,
    pub preset: WebPPreset,
    pub lossless: bool,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self { quality: 95, preset: WebPPreset::Photo, lossless: false }
    }
}

/// Metadata to embed during an encode.
///
/// `None` means the chunk is absent; it is never conflated with an empty payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncoderMetadata {
    pub icc_profile: Option<Vec<u8>>,
    pub exif: Option<Vec<u8>>,
    pub xmp: Option<Vec<u8>>,
}

/// Encode/decode capability.
///
/// Implementations must be reentrant: every call works only on its own
/// arguments. The progress callback is borrowed for the duration of
/// [`WebPCodec::encode`] and is never invoked after it returns.
pub trait WebPCodec: Send + Sync {
    fn image_info(&self, data: &[u8]) -> Result<ImageInfo>;

    /// Decode into `output`, which must already have the image's dimensions.
    fn decode_pixels(&self, data: &[u8], output: &mut Surface) -> Result<()>;

    /// Payload size of a metadata chunk, 0 when it is absent.
    fn metadata_chunk_size(&self, data: &[u8], kind: MetadataKind) -> Result<usize> {
        let container = WebPContainer::parse(data)?;
        Ok(container.find(kind.fourcc()).map_or(0, <[u8]>::len))
    }

    /// Copy a metadata chunk into `output`, which must be exactly its size.
    fn extract_metadata_chunk(&self, data: &[u8], kind: MetadataKind, output: &mut [u8]) -> Result<()> {
        let container = WebPContainer::parse(data)?;
        let payload = container
            .find(kind.fourcc())
            .ok_or_else(|| WebPError::corrupt(format!("no {} chunk", kind.name())))?;
        if payload.len() != output.len() {
            return Err(WebPError::corrupt(format!(
                "{} chunk is {} bytes, expected {}",
                kind.name(),
                payload.len(),
                output.len()
            )));
        }
        output.copy_from_slice(payload);
        Ok(())
    }

    fn encode(
        &self,
        surface: &Surface,
        options: &EncoderOptions,
        metadata: Option<&EncoderMetadata>,
        write: WriteCallback<'_>,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<()>;
}

/// The codec used by [`crate::pipeline::load`] and [`crate::pipeline::save`].
pub fn default_codec() -> &'static dyn WebPCodec {
    static CODEC: LibWebPCodec = LibWebPCodec;
    &CODEC
}

/// libwebp-backed codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibWebPCodec;

impl WebPCodec for LibWebPCodec {
    fn image_info(&self, data: &[u8]) -> Result<ImageInfo> {
        let has_animation = WebPContainer::parse(data)?.is_animated();
        let decoder = WebPDecoder::new(Cursor::new(data)).map_err(decode_error)?;
        let (width, height) = decoder.dimensions();
        Ok(ImageInfo { width, height, has_animation })
    }

    fn decode_pixels(&self, data: &[u8], output: &mut Surface) -> Result<()> {
        let decoder = WebPDecoder::new(Cursor::new(data)).map_err(decode_error)?;
        let image = DynamicImage::from_decoder(decoder).map_err(decode_error)?.into_rgba8();
        if image.dimensions() != output.dimensions() {
            log::debug!(
                "decoded {:?} but the output surface is {:?}",
                image.dimensions(),
                output.dimensions()
            );
            return Err(WebPError::InvalidWebPImage);
        }
        output.copy_from_slice(image.as_raw());
        Ok(())
    }

    fn encode(
        &self,
        surface: &Surface,
        options: &EncoderOptions,
        metadata: Option<&EncoderMetadata>,
        write: WriteCallback<'_>,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<()> {
        let mut progress = Progress::new(progress);
        progress.check(0)?;

        let config = encoder_config(options)?;
        let (width, height) = surface.dimensions();
        let has_alpha = surface.pixels().any(|p| p.0[3] != u8::MAX);

        let encoded = encode_bitstream(surface, &config, has_alpha, &mut progress)?;
        let output = match metadata {
            Some(metadata) => riff::mux(&encoded, width, height, has_alpha, metadata)?,
            None => encoded,
        };
        progress.check(100)?;

        write(&output)
    }
}

/// Forwards percent-complete to the caller, dropping repeats of the last value.
struct Progress<'a> {
    callback: Option<ProgressCallback<'a>>,
    last: Option<u32>,
    /// A panic caught inside libwebp's hook, resumed once `WebPEncode` returns.
    panic: Option<Box<dyn Any + Send>>,
}

impl<'a> Progress<'a> {
    fn new(callback: Option<ProgressCallback<'a>>) -> Self {
        Self { callback, last: None, panic: None }
    }

    fn report(&mut self, percent: u32) -> ControlFlow<()> {
        let Some(callback) = self.callback.as_deref_mut() else {
            return ControlFlow::Continue(());
        };
        if self.last == Some(percent) {
            return ControlFlow::Continue(());
        }
        self.last = Some(percent);
        callback(percent)
    }

    fn check(&mut self, percent: u32) -> Result<()> {
        match self.report(percent) {
            ControlFlow::Continue(()) => Ok(()),
            ControlFlow::Break(()) => Err(WebPError::UserCancelled),
        }
    }
}

/// libwebp progress hook. Returning 0 aborts the encode with
/// `VP8_ENC_ERROR_USER_ABORT`.
unsafe extern "C" fn progress_hook(percent: c_int, picture: *const WebPPicture) -> c_int {
    // SAFETY: `user_data` points at the `Progress` owned by `encode_bitstream`,
    // which outlives the `WebPEncode` call that invokes this hook.
    let progress = unsafe { &mut *((*picture).user_data as *mut Progress<'_>) };
    if progress.panic.is_some() {
        return 0;
    }
    let percent = percent.clamp(0, 100) as u32;
    match panic::catch_unwind(AssertUnwindSafe(|| progress.report(percent))) {
        Ok(ControlFlow::Continue(())) => 1,
        Ok(ControlFlow::Break(())) => 0,
        Err(payload) => {
            progress.panic = Some(payload);
            0
        }
    }
}

/// libwebp writer that appends to the `Vec<u8>` in `custom_ptr`.
unsafe extern "C" fn collect_output(data: *const u8, data_size: usize, picture: *const WebPPicture) -> c_int {
    if data_size == 0 {
        return 1;
    }
    // SAFETY: `custom_ptr` points at the output buffer owned by
    // `encode_bitstream`, and libwebp passes `data_size` readable bytes.
    unsafe {
        let output = &mut *((*picture).custom_ptr as *mut Vec<u8>);
        output.extend_from_slice(std::slice::from_raw_parts(data, data_size));
    }
    1
}

/// Run `WebPEncode` with the progress hook attached.
fn encode_bitstream(
    surface: &Surface,
    config: &WebPConfig,
    has_alpha: bool,
    progress: &mut Progress<'_>,
) -> Result<Vec<u8>> {
    let (width, height) = surface.dimensions();
    let mut picture =
        WebPPicture::new().map_err(|_| WebPError::EncoderConfig("libwebp version mismatch".into()))?;
    picture.use_argb = config.lossless;
    picture.width = width as c_int;
    picture.height = height as c_int;

    // SAFETY: the pixel buffers hold `stride * height` bytes; libwebp copies them.
    let imported = unsafe {
        if has_alpha {
            libwebp_sys::WebPPictureImportRGBA(&mut picture, surface.as_ptr(), (width * 4) as c_int)
        } else {
            let rgb: Vec<u8> = surface.pixels().flat_map(|p| [p.0[0], p.0[1], p.0[2]]).collect();
            libwebp_sys::WebPPictureImportRGB(&mut picture, rgb.as_ptr(), (width * 3) as c_int)
        }
    };
    if imported == 0 {
        // SAFETY: `picture` was initialised by `WebPPicture::new`.
        unsafe { libwebp_sys::WebPPictureFree(&mut picture) };
        return Err(WebPError::OutOfMemory);
    }

    let mut output = Vec::new();
    picture.writer = Some(collect_output);
    picture.custom_ptr = (&mut output as *mut Vec<u8>).cast::<c_void>();
    picture.progress_hook = Some(progress_hook);
    picture.user_data = (progress as *mut Progress<'_>).cast::<c_void>();

    // SAFETY: `config` and `picture` are initialised, and both pointers stored
    // in `picture` stay valid until `WebPPictureFree`.
    let encoded = unsafe { libwebp_sys::WebPEncode(config, &mut picture) };
    let status = picture.error_code;
    unsafe { libwebp_sys::WebPPictureFree(&mut picture) };

    if let Some(payload) = progress.panic.take() {
        panic::resume_unwind(payload);
    }
    if encoded == 0 {
        return Err(encoding_error(status));
    }
    Ok(output)
}

fn encoder_config(options: &EncoderOptions) -> Result<WebPConfig> {
    let mut config =
        WebPConfig::new().map_err(|_| WebPError::EncoderConfig("libwebp version mismatch".into()))?;

    config.quality = f32::from(options.quality.min(100));
    config.method = 6;
    config.thread_level = 0;
    apply_preset(&mut config, options.preset);

    if options.lossless {
        config.lossless = 1;
        config.exact = 1;
    }
    Ok(config)
}

/// Same tuning as libwebp's `WebPConfigPreset`.
fn apply_preset(config: &mut WebPConfig, preset: WebPPreset) {
    match preset {
        WebPPreset::Default => {}
        WebPPreset::Picture => {
            config.sns_strength = 80;
            config.filter_sharpness = 4;
            config.filter_strength = 35;
            config.preprocessing &= !2;
        }
        WebPPreset::Photo => {
            config.sns_strength = 80;
            config.filter_sharpness = 3;
            config.filter_strength = 30;
            config.preprocessing |= 2;
        }
        WebPPreset::Drawing => {
            config.sns_strength = 25;
            config.filter_sharpness = 6;
            config.filter_strength = 10;
        }
        WebPPreset::Icon => {
            config.sns_strength = 0;
            config.filter_strength = 0;
            config.preprocessing &= !2;
        }
        WebPPreset::Text => {
            config.sns_strength = 0;
            config.filter_strength = 0;
            config.preprocessing &= !2;
            config.segments = 2;
        }
    }
}

fn decode_error(err: ImageError) -> WebPError {
    log::debug!("WebP decoder error: {err}");
    match err {
        ImageError::Limits(_) => WebPError::OutOfMemory,
        ImageError::Unsupported(e) => WebPError::UnsupportedFeature(e.to_string()),
        _ => WebPError::InvalidWebPImage,
    }
}

/// Translate a libwebp `VP8_ENC_*` status.
fn encoding_error(status: WebPEncodingError) -> WebPError {
    match status {
        WebPEncodingError::VP8_ENC_ERROR_OUT_OF_MEMORY
        | WebPEncodingError::VP8_ENC_ERROR_BITSTREAM_OUT_OF_MEMORY => WebPError::OutOfMemory,
        WebPEncodingError::VP8_ENC_ERROR_NULL_PARAMETER
        | WebPEncodingError::VP8_ENC_ERROR_INVALID_CONFIGURATION => {
            WebPError::EncoderConfig(format!("{status:?}"))
        }
        WebPEncodingError::VP8_ENC_ERROR_USER_ABORT => WebPError::UserCancelled,
        other => WebPError::EncodeFailed(format!("{other:?}")),
    }
}
