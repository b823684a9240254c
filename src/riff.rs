//! RIFF/WebP chunk walking and extended-container assembly.

use crate::codec::EncoderMetadata;
use crate::error::{Result, WebPError};
use crate::format;

pub const VP8X: [u8; 4] = *b"VP8X";
pub const VP8: [u8; 4] = *b"VP8 ";
pub const VP8L: [u8; 4] = *b"VP8L";
pub const ALPH: [u8; 4] = *b"ALPH";
pub const ANIM: [u8; 4] = *b"ANIM";
pub const ANMF: [u8; 4] = *b"ANMF";
pub const ICCP: [u8; 4] = *b"ICCP";
pub const EXIF: [u8; 4] = *b"EXIF";
pub const XMP: [u8; 4] = *b"XMP ";

// VP8X feature flags
const FLAG_ICC: u8 = 0x20;
const FLAG_ALPHA: u8 = 0x10;
const FLAG_EXIF: u8 = 0x08;
const FLAG_XMP: u8 = 0x04;
const FLAG_ANIMATION: u8 = 0x02;

const RIFF_HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;
const VP8X_PAYLOAD_LEN: usize = 10;

/// A chunk borrowed from a container buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub fourcc: [u8; 4],
    pub payload: &'a [u8],
}

/// The validated chunk list of a WebP file.
#[derive(Debug)]
pub struct WebPContainer<'a> {
    chunks: Vec<Chunk<'a>>,
}

impl<'a> WebPContainer<'a> {
    /// Walk every top-level chunk.
    ///
    /// Fails with [`WebPError::CorruptContainer`] when the RIFF size or any
    /// chunk size points past the data actually present. A missing pad byte
    /// after the final odd-sized chunk is tolerated.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if !format::has_webp_signature(data) {
            return Err(WebPError::corrupt("missing RIFF/WEBP header"));
        }
        let riff_size = read_u32(data, 4) as usize;
        if riff_size < 4 {
            return Err(WebPError::corrupt(format!("RIFF size {riff_size} is too small")));
        }
        let end = riff_size
            .checked_add(8)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| {
                WebPError::corrupt(format!(
                    "RIFF size {riff_size} exceeds the {} bytes available",
                    data.len().saturating_sub(8)
                ))
            })?;

        let mut chunks = Vec::new();
        let mut pos = RIFF_HEADER_LEN;
        while pos < end {
            if end - pos < CHUNK_HEADER_LEN {
                return Err(WebPError::corrupt(format!("truncated chunk header at offset {pos}")));
            }
            let fourcc = [data[pos], data[pos + 1], data[pos + 2], data[pos + 3]];
            let size = read_u32(data, pos + 4) as usize;
            let start = pos + CHUNK_HEADER_LEN;
            let payload_end = start
                .checked_add(size)
                .filter(|&payload_end| payload_end <= end)
                .ok_or_else(|| {
                    WebPError::corrupt(format!(
                        "chunk '{}' declares {size} bytes but only {} remain",
                        String::from_utf8_lossy(&fourcc),
                        end - start
                    ))
                })?;
            chunks.push(Chunk { fourcc, payload: &data[start..payload_end] });
            pos = payload_end + (size & 1);
        }

        Ok(Self { chunks })
    }

    pub fn chunks(&self) -> &[Chunk<'a>] {
        &self.chunks
    }

    /// Payload of the first chunk with this id.
    pub fn find(&self, fourcc: [u8; 4]) -> Option<&'a [u8]> {
        self.chunks.iter().find(|c| c.fourcc == fourcc).map(|c| c.payload)
    }

    pub fn vp8x_flags(&self) -> Option<u8> {
        self.find(VP8X).and_then(|payload| payload.first().copied())
    }

    pub fn is_animated(&self) -> bool {
        self.vp8x_flags().is_some_and(|flags| flags & FLAG_ANIMATION != 0)
            || self.chunks.iter().any(|c| c.fourcc == ANIM || c.fourcc == ANMF)
    }
}

/// A metadata payload worth a chunk: present and not empty.
fn non_empty(blob: &Option<Vec<u8>>) -> Option<&[u8]> {
    blob.as_deref().filter(|data| !data.is_empty())
}

/// Wrap an encoded still image in an extended (VP8X) container together
/// with its metadata chunks.
///
/// Chunks are ordered VP8X, ICCP, image data (ALPH, VP8/VP8L), EXIF, XMP.
/// Metadata payloads of zero length are left out.
pub fn mux(
    bitstream: &[u8],
    width: u32,
    height: u32,
    has_alpha: bool,
    metadata: &EncoderMetadata,
) -> Result<Vec<u8>> {
    let encoded = WebPContainer::parse(bitstream)?;

    let image_chunks: Vec<&Chunk> = encoded
        .chunks()
        .iter()
        .filter(|c| ![VP8X, ICCP, EXIF, XMP].contains(&c.fourcc))
        .collect();
    if !image_chunks.iter().any(|c| c.fourcc == VP8 || c.fourcc == VP8L) {
        return Err(WebPError::MetadataEncoding("encoder output has no image chunk".into()));
    }
    if width == 0 || height == 0 || width > 1 << 24 || height > 1 << 24 {
        return Err(WebPError::MetadataEncoding(format!("invalid canvas size {width}x{height}")));
    }

    let icc = non_empty(&metadata.icc_profile);
    let exif = non_empty(&metadata.exif);
    let xmp = non_empty(&metadata.xmp);

    let mut flags = 0u8;
    if has_alpha
        || image_chunks.iter().any(|c| c.fourcc == ALPH)
        || encoded.vp8x_flags().is_some_and(|f| f & FLAG_ALPHA != 0)
    {
        flags |= FLAG_ALPHA;
    }
    if icc.is_some() {
        flags |= FLAG_ICC;
    }
    if exif.is_some() {
        flags |= FLAG_EXIF;
    }
    if xmp.is_some() {
        flags |= FLAG_XMP;
    }

    let mut vp8x = [0u8; VP8X_PAYLOAD_LEN];
    vp8x[0] = flags;
    vp8x[4..7].copy_from_slice(&(width - 1).to_le_bytes()[..3]);
    vp8x[7..10].copy_from_slice(&(height - 1).to_le_bytes()[..3]);

    let mut body = Vec::with_capacity(bitstream.len() + 64);
    body.extend_from_slice(b"WEBP");
    write_chunk(&mut body, VP8X, &vp8x)?;
    if let Some(icc) = icc {
        write_chunk(&mut body, ICCP, icc)?;
    }
    for chunk in &image_chunks {
        write_chunk(&mut body, chunk.fourcc, chunk.payload)?;
    }
    if let Some(exif) = exif {
        write_chunk(&mut body, EXIF, exif)?;
    }
    if let Some(xmp) = xmp {
        write_chunk(&mut body, XMP, xmp)?;
    }

    let riff_size = u32::try_from(body.len())
        .map_err(|_| WebPError::MetadataEncoding("container exceeds 4 GiB".into()))?;
    log::debug!(
        "muxed WebP container: flags {flags:#04x}, icc {} B, exif {} B, xmp {} B",
        icc.map_or(0, <[u8]>::len),
        exif.map_or(0, <[u8]>::len),
        xmp.map_or(0, <[u8]>::len)
    );

    let mut out = Vec::with_capacity(body.len() + 8);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&riff_size.to_le_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

fn write_chunk(out: &mut Vec<u8>, fourcc: [u8; 4], payload: &[u8]) -> Result<()> {
    let size = u32::try_from(payload.len())
        .ok()
        .filter(|&size| size < u32::MAX)
        .ok_or_else(|| {
            WebPError::MetadataEncoding(format!(
                "'{}' chunk is too large",
                String::from_utf8_lossy(&fourcc)
            ))
        })?;
    out.extend_from_slice(&fourcc);
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 != 0 {
        out.push(0);
    }
    Ok(())
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A simple-format file holding a single VP8L chunk with a dummy payload.
    pub(crate) fn simple_vp8l(payload: &[u8]) -> Vec<u8> {
        let mut body = b"WEBP".to_vec();
        write_chunk(&mut body, VP8L, payload).unwrap();
        let mut out = b"RIFF".to_vec();
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(&body);
        out
    }

    fn metadata(icc: Option<&[u8]>, exif: Option<&[u8]>, xmp: Option<&[u8]>) -> EncoderMetadata {
        EncoderMetadata {
            icc_profile: icc.map(<[u8]>::to_vec),
            exif: exif.map(<[u8]>::to_vec),
            xmp: xmp.map(<[u8]>::to_vec),
        }
    }

    // ── parse ────────────────────────────────────────────────────────

    #[test]
    fn parses_simple_file() {
        let data = simple_vp8l(&[0x2F, 1, 2]);
        let container = WebPContainer::parse(&data).unwrap();
        assert_eq!(container.chunks().len(), 1);
        assert_eq!(container.find(VP8L), Some(&[0x2F, 1, 2][..]));
        assert_eq!(container.vp8x_flags(), None);
        assert!(!container.is_animated());
    }

    #[test]
    fn tolerates_missing_final_pad_byte() {
        let mut data = simple_vp8l(&[0x2F, 1, 2]);
        data.pop();
        let riff_size = data.len() as u32 - 8;
        data[4..8].copy_from_slice(&riff_size.to_le_bytes());
        assert!(WebPContainer::parse(&data).is_ok());
    }

    #[test]
    fn rejects_riff_size_past_end() {
        let mut data = simple_vp8l(&[0x2F, 1]);
        data[4..8].copy_from_slice(&1000u32.to_le_bytes());
        assert!(matches!(WebPContainer::parse(&data), Err(WebPError::CorruptContainer(_))));
    }

    #[test]
    fn rejects_chunk_size_past_end() {
        let mut data = simple_vp8l(&[0x2F, 1]);
        data[16..20].copy_from_slice(&64u32.to_le_bytes());
        assert!(matches!(WebPContainer::parse(&data), Err(WebPError::CorruptContainer(_))));
    }

    #[test]
    fn rejects_truncated_chunk_header() {
        let mut data = simple_vp8l(&[0x2F, 1]);
        data.extend_from_slice(b"EXI");
        let riff_size = data.len() as u32 - 8;
        data[4..8].copy_from_slice(&riff_size.to_le_bytes());
        assert!(matches!(WebPContainer::parse(&data), Err(WebPError::CorruptContainer(_))));
    }

    #[test]
    fn rejects_non_webp() {
        assert!(WebPContainer::parse(b"RIFF\x04\x00\x00\x00WAVE").is_err());
    }

    #[test]
    fn detects_animation_flag() {
        let mut body = b"WEBP".to_vec();
        write_chunk(&mut body, VP8X, &[FLAG_ANIMATION, 0, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        write_chunk(&mut body, ANIM, &[0; 6]).unwrap();
        let mut data = b"RIFF".to_vec();
        data.extend_from_slice(&(body.len() as u32).to_le_bytes());
        data.extend_from_slice(&body);
        assert!(WebPContainer::parse(&data).unwrap().is_animated());
    }

    // ── mux ──────────────────────────────────────────────────────────

    #[test]
    fn mux_orders_chunks_and_sets_flags() {
        let bitstream = simple_vp8l(&[0x2F, 9, 9, 9]);
        let meta = metadata(Some(&b"icc"[..]), Some(&b"II*\0"[..]), Some(&b"<x/>"[..]));
        let out = mux(&bitstream, 300, 200, false, &meta).unwrap();

        let container = WebPContainer::parse(&out).unwrap();
        let ids: Vec<[u8; 4]> = container.chunks().iter().map(|c| c.fourcc).collect();
        assert_eq!(ids, vec![VP8X, ICCP, VP8L, EXIF, XMP]);

        let vp8x = container.find(VP8X).unwrap();
        assert_eq!(vp8x[0], FLAG_ICC | FLAG_EXIF | FLAG_XMP);
        assert_eq!(&vp8x[4..7], &299u32.to_le_bytes()[..3]);
        assert_eq!(&vp8x[7..10], &199u32.to_le_bytes()[..3]);
        assert_eq!(container.find(ICCP), Some(&b"icc"[..]));
        assert_eq!(container.find(XMP), Some(&b"<x/>"[..]));
    }

    #[test]
    fn mux_skips_empty_payloads_and_keeps_alpha() {
        let bitstream = simple_vp8l(&[0x2F]);
        let meta = metadata(Some(&[][..]), Some(&b"II*\0"[..]), None);
        let out = mux(&bitstream, 1, 1, true, &meta).unwrap();

        let container = WebPContainer::parse(&out).unwrap();
        assert_eq!(container.find(ICCP), None);
        assert_eq!(container.vp8x_flags(), Some(FLAG_ALPHA | FLAG_EXIF));
    }

    #[test]
    fn non_empty_borrows_only_real_payloads() {
        let present = Some(b"xmp".to_vec());
        assert_eq!(non_empty(&present), Some(&b"xmp"[..]));
        assert_eq!(non_empty(&Some(Vec::new())), None);
        assert_eq!(non_empty(&None), None);
    }

    #[test]
    fn mux_replaces_existing_vp8x() {
        let mut body = b"WEBP".to_vec();
        write_chunk(&mut body, VP8X, &[FLAG_ALPHA, 0, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        write_chunk(&mut body, ALPH, &[0, 1]).unwrap();
        write_chunk(&mut body, VP8, &[0; 10]).unwrap();
        let mut bitstream = b"RIFF".to_vec();
        bitstream.extend_from_slice(&(body.len() as u32).to_le_bytes());
        bitstream.extend_from_slice(&body);

        let out = mux(&bitstream, 1, 1, false, &metadata(None, None, Some(&b"<x/>"[..]))).unwrap();
        let container = WebPContainer::parse(&out).unwrap();
        let ids: Vec<[u8; 4]> = container.chunks().iter().map(|c| c.fourcc).collect();
        assert_eq!(ids, vec![VP8X, ALPH, VP8, XMP]);
        assert_eq!(container.vp8x_flags(), Some(FLAG_ALPHA | FLAG_XMP));
    }

    #[test]
    fn mux_requires_image_chunk() {
        let mut body = b"WEBP".to_vec();
        write_chunk(&mut body, EXIF, &[0; 4]).unwrap();
        let mut bitstream = b"RIFF".to_vec();
        bitstream.extend_from_slice(&(body.len() as u32).to_le_bytes());
        bitstream.extend_from_slice(&body);
        assert!(matches!(
            mux(&bitstream, 1, 1, false, &EncoderMetadata::default()),
            Err(WebPError::MetadataEncoding(_))
        ));
    }
}
