use std::collections::VecDeque;

use super::model::{MetadataMap, Section, TagPath, TagValue, ValueKind};
use super::tags::{EXIF_IFD_POINTER, GPS_IFD_POINTER, IMAGE_LAYOUT_TAGS, INTEROP_IFD_POINTER};

/// Some writers keep the JPEG APP1 identifier in front of the TIFF header.
const EXIF_IDENTIFIER: &[u8] = b"Exif\0\0";
const TIFF_MAGIC: u16 = 42;
const IFD_ENTRY_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

impl Endian {
    fn read_u16(self, data: &[u8], offset: usize) -> Option<u16> {
        let bytes: [u8; 2] = data.get(offset..offset.checked_add(2)?)?.try_into().ok()?;
        Some(match self {
            Self::Little => u16::from_le_bytes(bytes),
            Self::Big => u16::from_be_bytes(bytes),
        })
    }

    fn read_u32(self, data: &[u8], offset: usize) -> Option<u32> {
        let bytes: [u8; 4] = data.get(offset..offset.checked_add(4)?)?.try_into().ok()?;
        Some(match self {
            Self::Little => u32::from_le_bytes(bytes),
            Self::Big => u32::from_be_bytes(bytes),
        })
    }
}

/// Parse a TIFF-structured EXIF block into a [`MetadataMap`].
///
/// Returns `None` when the block has no valid TIFF header. Individual entries
/// that are truncated, point outside the block or use an unknown field type
/// are dropped; everything else is kept, including unknown tag ids.
///
/// Only IFD0 and the Exif, GPS and Interop sub-IFDs are read. Thumbnail IFDs
/// and the tags locating strips or thumbnails are ignored.
pub fn parse_exif(block: &[u8]) -> Option<MetadataMap> {
    let data = block.strip_prefix(EXIF_IDENTIFIER).unwrap_or(block);

    let endian = match data.get(0..2)? {
        b"II" => Endian::Little,
        b"MM" => Endian::Big,
        _ => return None,
    };
    if endian.read_u16(data, 2)? != TIFF_MAGIC {
        return None;
    }
    let ifd0 = endian.read_u32(data, 4)?;

    let mut map = MetadataMap::new();
    let mut queue = VecDeque::from([(Section::Image, ifd0)]);
    let (mut seen_exif, mut seen_gps, mut seen_interop) = (false, false, false);

    while let Some((section, offset)) = queue.pop_front() {
        let offset = offset as usize;
        if offset >= data.len() {
            log::debug!("EXIF {} IFD offset {offset} is past the end", section.name());
            continue;
        }
        let Some(count) = endian.read_u16(data, offset) else {
            continue;
        };

        for index in 0..count as usize {
            let entry_offset = offset + 2 + index * IFD_ENTRY_LEN;
            let Some(entry) = RawEntry::read(data, entry_offset, endian) else {
                log::debug!(
                    "EXIF {} IFD truncated after {index} of {count} entries",
                    section.name()
                );
                break;
            };

            match (section, entry.tag_id) {
                (Section::Image, EXIF_IFD_POINTER) => {
                    if !seen_exif {
                        seen_exif = true;
                        queue.push_back((Section::Photo, entry.value_field_u32(endian)));
                    }
                    continue;
                }
                (Section::Image, GPS_IFD_POINTER) => {
                    if !seen_gps {
                        seen_gps = true;
                        queue.push_back((Section::Gps, entry.value_field_u32(endian)));
                    }
                    continue;
                }
                (Section::Photo, INTEROP_IFD_POINTER) => {
                    if !seen_interop {
                        seen_interop = true;
                        queue.push_back((Section::Interop, entry.value_field_u32(endian)));
                    }
                    continue;
                }
                _ => {}
            }

            if IMAGE_LAYOUT_TAGS.contains(&entry.tag_id) {
                continue;
            }

            match entry.value(data, endian) {
                Some(value) => {
                    map.insert_if_absent(TagPath::new(section, entry.tag_id), value);
                }
                None => log::debug!(
                    "dropping EXIF tag {} (type {}, count {})",
                    TagPath::new(section, entry.tag_id),
                    entry.type_code,
                    entry.count
                ),
            }
        }
    }

    Some(map)
}

/// One 12-byte IFD entry, before its value has been resolved.
struct RawEntry {
    tag_id: u16,
    type_code: u16,
    count: u32,
    value_field: [u8; 4],
}

impl RawEntry {
    fn read(data: &[u8], offset: usize, endian: Endian) -> Option<Self> {
        let value_field: [u8; 4] = data.get(offset + 8..offset + IFD_ENTRY_LEN)?.try_into().ok()?;
        Some(Self {
            tag_id: endian.read_u16(data, offset)?,
            type_code: endian.read_u16(data, offset + 2)?,
            count: endian.read_u32(data, offset + 4)?,
            value_field,
        })
    }

    fn value_field_u32(&self, endian: Endian) -> u32 {
        match endian {
            Endian::Little => u32::from_le_bytes(self.value_field),
            Endian::Big => u32::from_be_bytes(self.value_field),
        }
    }

    /// Resolve the entry's value as little-endian data.
    fn value(&self, data: &[u8], endian: Endian) -> Option<TagValue> {
        let kind = ValueKind::from_type_code(self.type_code)?;

        let raw = if kind.fits_in_value_field(self.count) {
            let len = self.count as usize * kind.unit_size();
            self.value_field[..len].to_vec()
        } else {
            let len = (self.count as usize).checked_mul(kind.unit_size())?;
            if len > i32::MAX as usize {
                return None;
            }
            let start = self.value_field_u32(endian) as usize;
            data.get(start..start.checked_add(len)?)?.to_vec()
        };

        let data = match endian {
            Endian::Little => raw,
            Endian::Big => to_little_endian(raw, kind.swap_width()),
        };
        TagValue::new(kind, data)
    }
}

fn to_little_endian(mut data: Vec<u8>, width: usize) -> Vec<u8> {
    if width > 1 {
        for unit in data.chunks_exact_mut(width) {
            unit.reverse();
        }
    }
    data
}
