//! Output destinations for encoded images.

use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};

use crate::error::{Result, WebPError};

/// Largest single write handed to a sink.
pub const MAX_WRITE_SIZE: usize = 81920;

/// A destination that is sized up front and then filled sequentially.
///
/// [`crate::pipeline::save`] calls [`ImageSink::set_length`] once with the
/// final size and then [`ImageSink::write_chunk`] until exactly that many
/// bytes have been written. It does so only after encoding succeeded, so a
/// failed or cancelled save never touches the sink. Removing a partially
/// written destination after an I/O error is the sink owner's job.
pub trait ImageSink {
    fn set_length(&mut self, len: u64) -> io::Result<()>;
    fn write_chunk(&mut self, data: &[u8]) -> io::Result<()>;
}

impl ImageSink for Vec<u8> {
    fn set_length(&mut self, len: u64) -> io::Result<()> {
        self.clear();
        let len = usize::try_from(len).map_err(|e| io::Error::new(io::ErrorKind::OutOfMemory, e))?;
        self.reserve_exact(len);
        Ok(())
    }

    fn write_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        self.extend_from_slice(data);
        Ok(())
    }
}

impl ImageSink for File {
    fn set_length(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)?;
        self.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    fn write_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        self.write_all(data)
    }
}

/// Size the sink and copy `data` into it in bounded chunks.
pub fn write_image<S: ImageSink + ?Sized>(sink: &mut S, data: &[u8]) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    sink.set_length(data.len() as u64).map_err(WebPError::WriteFailure)?;
    for chunk in data.chunks(MAX_WRITE_SIZE) {
        sink.write_chunk(chunk).map_err(WebPError::WriteFailure)?;
    }
    Ok(())
}
