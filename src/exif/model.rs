use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// The EXIF directory a tag lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Section {
    /// IFD0, the primary image directory.
    Image,
    /// The Exif sub-IFD (camera and capture settings).
    Photo,
    /// The interoperability sub-IFD.
    Interop,
    /// The GPS sub-IFD.
    Gps,
}

impl Section {
    pub fn name(self) -> &'static str {
        match self {
            Self::Image => "Image",
            Self::Photo => "Photo",
            Self::Interop => "Interop",
            Self::Gps => "GPS",
        }
    }
}

/// Identifies a single metadata field: a section plus the tag id inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TagPath {
    pub section: Section,
    pub tag_id: u16,
}

impl TagPath {
    pub const fn new(section: Section, tag_id: u16) -> Self {
        Self { section, tag_id }
    }
}

impl fmt::Display for TagPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:0x{:04X}", self.section.name(), self.tag_id)
    }
}

/// TIFF field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValueKind {
    Byte,
    Ascii,
    Short,
    Long,
    Rational,
    SByte,
    Undefined,
    SShort,
    SLong,
    SRational,
    Float,
    Double,
    Ifd,
}

impl ValueKind {
    /// Map a TIFF type code to a kind. Unknown codes have no known width.
    pub fn from_type_code(code: u16) -> Option<Self> {
        Some(match code {
            1 => Self::Byte,
            2 => Self::Ascii,
            3 => Self::Short,
            4 => Self::Long,
            5 => Self::Rational,
            6 => Self::SByte,
            7 => Self::Undefined,
            8 => Self::SShort,
            9 => Self::SLong,
            10 => Self::SRational,
            11 => Self::Float,
            12 => Self::Double,
            13 => Self::Ifd,
            _ => return None,
        })
    }

    pub fn type_code(self) -> u16 {
        match self {
            Self::Byte => 1,
            Self::Ascii => 2,
            Self::Short => 3,
            Self::Long => 4,
            Self::Rational => 5,
            Self::SByte => 6,
            Self::Undefined => 7,
            Self::SShort => 8,
            Self::SLong => 9,
            Self::SRational => 10,
            Self::Float => 11,
            Self::Double => 12,
            Self::Ifd => 13,
        }
    }

    /// Size in bytes of one value of this kind.
    pub fn unit_size(self) -> usize {
        match self {
            Self::Byte | Self::Ascii | Self::SByte | Self::Undefined => 1,
            Self::Short | Self::SShort => 2,
            Self::Long | Self::SLong | Self::Float | Self::Ifd => 4,
            Self::Rational | Self::SRational | Self::Double => 8,
        }
    }

    /// Width of the byte-swappable element. Rationals swap each half separately.
    pub(crate) fn swap_width(self) -> usize {
        match self {
            Self::Rational | Self::SRational => 4,
            other => other.unit_size(),
        }
    }

    /// Whether `count` values fit in the 4-byte value field of an IFD entry.
    /// An empty value (count 0) always fits.
    pub fn fits_in_value_field(self, count: u32) -> bool {
        u64::from(count) * self.unit_size() as u64 <= 4
    }
}

/// An unsigned rational, as used by resolution and GPS fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rational {
    pub numerator: u32,
    pub denominator: u32,
}

impl Rational {
    pub fn new(numerator: u32, denominator: u32) -> Self {
        Self { numerator, denominator }
    }

    /// Approximate a non-negative float, keeping four decimal places.
    pub fn from_f64(value: f64) -> Self {
        if value.fract() == 0.0 && value >= 0.0 && value <= u32::MAX as f64 {
            Self::new(value as u32, 1)
        } else {
            let scaled = (value * 10_000.0).round().clamp(0.0, u32::MAX as f64);
            Self::new(scaled as u32, 10_000)
        }
    }

    /// `None` when the denominator is zero.
    pub fn to_f64(self) -> Option<f64> {
        if self.denominator == 0 {
            None
        } else {
            Some(self.numerator as f64 / self.denominator as f64)
        }
    }
}

/// The three IFD0 fields that describe physical resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionTags {
    pub x: Rational,
    pub y: Rational,
    /// ResolutionUnit: 2 = inch, 3 = centimetre.
    pub unit: u16,
}

/// A typed EXIF value.
///
/// `data` is always little-endian, whatever the byte order of the block it
/// was read from, and its length is a whole number of `kind` units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagValue {
    kind: ValueKind,
    data: Vec<u8>,
}

impl TagValue {
    /// Build a value from little-endian data. Fails when `data` is not a
    /// whole number of `kind` units.
    pub fn new(kind: ValueKind, data: Vec<u8>) -> Option<Self> {
        (data.len() % kind.unit_size() == 0).then_some(Self { kind, data })
    }

    pub fn short(value: u16) -> Self {
        Self { kind: ValueKind::Short, data: value.to_le_bytes().to_vec() }
    }

    pub fn long(value: u32) -> Self {
        Self { kind: ValueKind::Long, data: value.to_le_bytes().to_vec() }
    }

    pub fn rational(value: Rational) -> Self {
        let mut data = value.numerator.to_le_bytes().to_vec();
        data.extend_from_slice(&value.denominator.to_le_bytes());
        Self { kind: ValueKind::Rational, data }
    }

    /// NUL-terminated ASCII text.
    pub fn ascii(text: &str) -> Self {
        let mut data = text.as_bytes().to_vec();
        data.push(0);
        Self { kind: ValueKind::Ascii, data }
    }

    pub fn undefined(data: Vec<u8>) -> Self {
        Self { kind: ValueKind::Undefined, data }
    }

    pub fn bytes(data: Vec<u8>) -> Self {
        Self { kind: ValueKind::Byte, data }
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Number of `kind` units held.
    pub fn count(&self) -> u32 {
        (self.data.len() / self.kind.unit_size()) as u32
    }

    /// A single Short. Any other kind or length is rejected.
    pub fn as_short(&self) -> Option<u16> {
        match (self.kind, self.data.as_slice()) {
            (ValueKind::Short, &[lo, hi]) => Some(u16::from_le_bytes([lo, hi])),
            _ => None,
        }
    }

    /// A single Long.
    pub fn as_long(&self) -> Option<u32> {
        match (self.kind, self.data.as_slice()) {
            (ValueKind::Long, &[a, b, c, d]) => Some(u32::from_le_bytes([a, b, c, d])),
            _ => None,
        }
    }

    /// A single unsigned Rational. The denominator may still be zero.
    pub fn as_rational(&self) -> Option<Rational> {
        if self.kind != ValueKind::Rational || self.data.len() != 8 {
            return None;
        }
        let numerator = u32::from_le_bytes([self.data[0], self.data[1], self.data[2], self.data[3]]);
        let denominator = u32::from_le_bytes([self.data[4], self.data[5], self.data[6], self.data[7]]);
        Some(Rational::new(numerator, denominator))
    }

    /// ASCII content up to the first NUL.
    pub fn as_ascii(&self) -> Option<&str> {
        if self.kind != ValueKind::Ascii {
            return None;
        }
        let end = self.data.iter().position(|&b| b == 0).unwrap_or(self.data.len());
        std::str::from_utf8(&self.data[..end]).ok()
    }

    /// Human-readable rendering for reports.
    pub fn display_value(&self) -> String {
        fn join<T: ToString>(items: impl Iterator<Item = T>) -> String {
            items.map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
        }

        let data = &self.data;
        match self.kind {
            ValueKind::Ascii => self.as_ascii().unwrap_or_default().to_string(),
            ValueKind::Short => join(data.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]]))),
            ValueKind::SShort => join(data.chunks_exact(2).map(|c| i16::from_le_bytes([c[0], c[1]]))),
            ValueKind::Long | ValueKind::Ifd => {
                join(data.chunks_exact(4).map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]])))
            }
            ValueKind::SLong => {
                join(data.chunks_exact(4).map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]])))
            }
            ValueKind::Float => {
                join(data.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])))
            }
            ValueKind::Double => join(data.chunks_exact(8).map(|c| {
                f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]])
            })),
            ValueKind::Rational => join(data.chunks_exact(8).map(|c| {
                let n = u32::from_le_bytes([c[0], c[1], c[2], c[3]]);
                let d = u32::from_le_bytes([c[4], c[5], c[6], c[7]]);
                format!("{n}/{d}")
            })),
            ValueKind::SRational => join(data.chunks_exact(8).map(|c| {
                let n = i32::from_le_bytes([c[0], c[1], c[2], c[3]]);
                let d = i32::from_le_bytes([c[4], c[5], c[6], c[7]]);
                format!("{n}/{d}")
            })),
            ValueKind::Byte | ValueKind::SByte | ValueKind::Undefined => {
                if data.len() <= 8 {
                    join(data.iter())
                } else {
                    format!("({} bytes)", data.len())
                }
            }
        }
    }
}

/// Metadata keyed by [`TagPath`], each key at most once.
///
/// Entries iterate in (section, tag id) order, which is also the order the
/// EXIF writer lays them out in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataMap {
    entries: BTreeMap<TagPath, TagValue>,
}

impl MetadataMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: TagPath) -> Option<&TagValue> {
        self.entries.get(&path)
    }

    pub fn contains(&self, path: TagPath) -> bool {
        self.entries.contains_key(&path)
    }

    /// Insert or replace, returning the previous value.
    pub fn insert(&mut self, path: TagPath, value: TagValue) -> Option<TagValue> {
        self.entries.insert(path, value)
    }

    /// Insert only when the key is free. Returns `false` if a value was already present.
    pub fn insert_if_absent(&mut self, path: TagPath, value: TagValue) -> bool {
        match self.entries.entry(path) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
            std::collections::btree_map::Entry::Occupied(_) => false,
        }
    }

    /// Pop a value out of the map.
    pub fn remove(&mut self, path: TagPath) -> Option<TagValue> {
        self.entries.remove(&path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TagPath, &TagValue)> {
        self.entries.iter().map(|(path, value)| (*path, value))
    }

    /// Entries of one section as (tag id, value), ordered by tag id.
    pub fn section(&self, section: Section) -> impl Iterator<Item = (u16, &TagValue)> {
        self.entries
            .iter()
            .filter(move |(path, _)| path.section == section)
            .map(|(path, value)| (path.tag_id, value))
    }

    pub fn has_section(&self, section: Section) -> bool {
        self.entries.keys().any(|path| path.section == section)
    }
}

impl FromIterator<(TagPath, TagValue)> for MetadataMap {
    fn from_iter<I: IntoIterator<Item = (TagPath, TagValue)>>(iter: I) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

impl IntoIterator for MetadataMap {
    type Item = (TagPath, TagValue);
    type IntoIter = std::collections::btree_map::IntoIter<TagPath, TagValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
