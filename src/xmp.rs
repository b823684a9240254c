//! XMP packets attached to a document.

use quick_xml::Reader;
use quick_xml::events::Event;

/// A well-formed XMP packet, kept as the UTF-8 text it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmpPacket {
    text: String,
}

impl XmpPacket {
    /// Accept `data` if it is UTF-8, well-formed XML, and contains an
    /// `x:xmpmeta` or `rdf:RDF` element.
    ///
    /// # Example
    ///
    /// ```rust
    /// use webp_filetype::xmp::XmpPacket;
    ///
    /// let packet = XmpPacket::try_parse(b"<x:xmpmeta xmlns:x=\"adobe:ns:meta/\"/>");
    /// assert!(packet.is_some());
    /// assert!(XmpPacket::try_parse(b"<html></html>").is_none());
    /// ```
    pub fn try_parse(data: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(data).ok()?;
        Self::from_text(text.trim_start_matches('\u{FEFF}').to_string())
    }

    pub fn from_text(text: String) -> Option<Self> {
        is_xmp(&text).then_some(Self { text })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Serialized UTF-8 bytes, as embedded in an `XMP ` chunk.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.text.as_bytes().to_vec()
    }
}

fn is_xmp(text: &str) -> bool {
    let mut reader = Reader::from_reader(text.as_bytes());
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut found_root = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let local_name = e.local_name();
                if matches!(local_name.as_ref(), b"xmpmeta" | b"RDF") {
                    found_root = true;
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                log::debug!("XMP packet is not well-formed: {e}");
                return false;
            }
        }
        buf.clear();
    }
    found_root
}
