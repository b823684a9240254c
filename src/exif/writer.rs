use std::collections::BTreeMap;

use super::model::{MetadataMap, ResolutionTags, Section, TagValue};
use super::tags::{
    self, ColorSpace, EXIF_IFD_POINTER, GPS_IFD_POINTER, IMAGE_LAYOUT_TAGS, INTEROP_IFD_POINTER,
};

const TIFF_HEADER: [u8; 8] = [b'I', b'I', 0x2A, 0x00, 0x08, 0x00, 0x00, 0x00];
const IFD_ENTRY_LEN: u32 = 12;

const EXIF_VERSION_2_3: &[u8; 4] = b"0230";
const GPS_VERSION_2_3: [u8; 4] = [2, 3, 0, 0];
const INTEROP_VERSION_1_0: &[u8; 4] = b"0100";

/// Serializes a [`MetadataMap`] into a little-endian TIFF/EXIF block.
///
/// The output is deterministic: IFDs are laid out Image, Photo, Interop, GPS,
/// entries are sorted by tag id, and values longer than four bytes follow
/// their IFD at word-aligned offsets.
///
/// Because pixels are always saved upright, Orientation is written as 1. The
/// ColorSpace tag is taken from the writer's resolved color space rather
/// than from the map.
///
/// The image size always comes from `size`. Sources that carried
/// ImageWidth/ImageLength (uncompressed TIFF) keep that pair, everything else
/// gets PixelXDimension/PixelYDimension. ExifVersion, GPSVersionID and
/// InteroperabilityVersion are filled in when their IFD is written without one.
pub struct ExifWriter {
    entries: MetadataMap,
    color_space: ColorSpace,
    size: (u32, u32),
    resolution: Option<ResolutionTags>,
}

impl ExifWriter {
    pub fn new(entries: MetadataMap, color_space: ColorSpace, size: (u32, u32)) -> Self {
        Self { entries, color_space, size, resolution: None }
    }

    /// Write XResolution, YResolution and ResolutionUnit, replacing any in the map.
    pub fn with_resolution(mut self, resolution: ResolutionTags) -> Self {
        self.resolution = Some(resolution);
        self
    }

    pub fn create_exif_blob(&self) -> Vec<u8> {
        let mut image = self.section_tags(Section::Image);
        image.retain(|id, _| {
            !IMAGE_LAYOUT_TAGS.contains(id) && *id != EXIF_IFD_POINTER && *id != GPS_IFD_POINTER
        });
        image.insert(tags::ORIENTATION.tag_id, TagValue::short(1));
        if let Some(res) = self.resolution {
            image.insert(tags::X_RESOLUTION.tag_id, TagValue::rational(res.x));
            image.insert(tags::Y_RESOLUTION.tag_id, TagValue::rational(res.y));
            image.insert(tags::RESOLUTION_UNIT.tag_id, TagValue::short(res.unit));
        }

        let mut photo = self.section_tags(Section::Photo);
        photo.remove(&INTEROP_IFD_POINTER);
        photo.insert(tags::COLOR_SPACE.tag_id, TagValue::short(self.color_space.tag_value()));
        photo
            .entry(tags::EXIF_VERSION.tag_id)
            .or_insert_with(|| TagValue::undefined(EXIF_VERSION_2_3.to_vec()));

        let (width, height) = self.size;
        if self.entries.contains(tags::IMAGE_WIDTH) {
            image.insert(tags::IMAGE_WIDTH.tag_id, TagValue::long(width));
            image.insert(tags::IMAGE_LENGTH.tag_id, TagValue::long(height));
            photo.remove(&tags::PIXEL_X_DIMENSION.tag_id);
            photo.remove(&tags::PIXEL_Y_DIMENSION.tag_id);
        } else {
            photo.insert(tags::PIXEL_X_DIMENSION.tag_id, TagValue::long(width));
            photo.insert(tags::PIXEL_Y_DIMENSION.tag_id, TagValue::long(height));
            image.remove(&tags::IMAGE_WIDTH.tag_id);
            image.remove(&tags::IMAGE_LENGTH.tag_id);
        }

        let mut interop = self.section_tags(Section::Interop);
        if !interop.is_empty() {
            interop
                .entry(tags::INTEROPERABILITY_VERSION.tag_id)
                .or_insert_with(|| TagValue::undefined(INTEROP_VERSION_1_0.to_vec()));
        }
        let mut gps = self.section_tags(Section::Gps);
        if !gps.is_empty() {
            gps.entry(tags::GPS_VERSION_ID.tag_id)
                .or_insert_with(|| TagValue::bytes(GPS_VERSION_2_3.to_vec()));
        }

        // Pointer placeholders; patched once the layout is known.
        image.insert(EXIF_IFD_POINTER, TagValue::long(0));
        if !gps.is_empty() {
            image.insert(GPS_IFD_POINTER, TagValue::long(0));
        }
        if !interop.is_empty() {
            photo.insert(INTEROP_IFD_POINTER, TagValue::long(0));
        }

        let mut image_ifd = Ifd::new(image, TIFF_HEADER.len() as u32);
        let mut photo_ifd = Ifd::new(photo, image_ifd.end());
        let mut next = photo_ifd.end();
        let interop_ifd = (!interop.is_empty()).then(|| {
            let ifd = Ifd::new(interop, next);
            next = ifd.end();
            ifd
        });
        let gps_ifd = (!gps.is_empty()).then(|| Ifd::new(gps, next));

        image_ifd.set_pointer(EXIF_IFD_POINTER, photo_ifd.start);
        if let Some(ifd) = &gps_ifd {
            image_ifd.set_pointer(GPS_IFD_POINTER, ifd.start);
        }
        if let Some(ifd) = &interop_ifd {
            photo_ifd.set_pointer(INTEROP_IFD_POINTER, ifd.start);
        }

        let total = gps_ifd
            .as_ref()
            .or(interop_ifd.as_ref())
            .unwrap_or(&photo_ifd)
            .end();
        let mut out = Vec::with_capacity(total as usize);
        out.extend_from_slice(&TIFF_HEADER);
        for ifd in [Some(&image_ifd), Some(&photo_ifd), interop_ifd.as_ref(), gps_ifd.as_ref()]
            .into_iter()
            .flatten()
        {
            ifd.write_to(&mut out);
        }
        debug_assert_eq!(out.len(), total as usize);
        out
    }

    fn section_tags(&self, section: Section) -> BTreeMap<u16, TagValue> {
        self.entries
            .section(section)
            .map(|(id, value)| (id, value.clone()))
            .collect()
    }
}

/// One IFD with its start offset fixed.
struct Ifd {
    start: u32,
    entries: BTreeMap<u16, TagValue>,
}

impl Ifd {
    fn new(entries: BTreeMap<u16, TagValue>, start: u32) -> Self {
        Self { start, entries }
    }

    fn data_start(&self) -> u32 {
        self.start + 2 + self.entries.len() as u32 * IFD_ENTRY_LEN + 4
    }

    fn end(&self) -> u32 {
        let data: u32 = self
            .entries
            .values()
            .map(|value| value.data().len() as u32)
            .filter(|&len| len > 4)
            .map(padded)
            .sum();
        self.data_start() + data
    }

    fn set_pointer(&mut self, tag_id: u16, offset: u32) {
        self.entries.insert(tag_id, TagValue::long(offset));
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        debug_assert_eq!(out.len(), self.start as usize);

        let encode_u16 = |val: u16| val.to_le_bytes();
        let encode_u32 = |val: u32| val.to_le_bytes();

        out.extend_from_slice(&encode_u16(self.entries.len() as u16));

        let mut data_offset = self.data_start();
        for (&tag_id, value) in &self.entries {
            let data = value.data();
            out.extend_from_slice(&encode_u16(tag_id));
            out.extend_from_slice(&encode_u16(value.kind().type_code()));
            out.extend_from_slice(&encode_u32(value.count()));
            if data.len() <= 4 {
                let mut inline = [0u8; 4];
                inline[..data.len()].copy_from_slice(data);
                out.extend_from_slice(&inline);
            } else {
                out.extend_from_slice(&encode_u32(data_offset));
                data_offset += padded(data.len() as u32);
            }
        }

        // No IFD1: thumbnails are never written.
        out.extend_from_slice(&encode_u32(0));

        for value in self.entries.values() {
            let data = value.data();
            if data.len() > 4 {
                out.extend_from_slice(data);
                if data.len() % 2 != 0 {
                    out.push(0);
                }
            }
        }
    }
}

fn padded(len: u32) -> u32 {
    len + (len & 1)
}
