//! File-backed constructors for readers and writers.
//!
//! Every constructor reports open and codec-initialisation failures as
//! `Err`, so a stream that exists is always usable.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::debug;
use zwrap_core::{Reader, Result, StreamError, Writer};

use crate::format::{Format, SNIFF_LEN};
use crate::level::CompressionLevel;

/// Open `path` for decompression as `format`.
pub fn open<P: AsRef<Path>>(path: P, format: Format) -> Result<Reader<File>> {
    let file = File::open(path.as_ref())?;
    debug!("opened {} for reading as {}", path.as_ref().display(), format);
    Ok(Reader::new(file, format.decoder()?))
}

/// Open `path` for decompression, identifying the format from its leading
/// bytes and falling back to the file extension.
pub fn open_auto<P: AsRef<Path>>(path: P) -> Result<(Format, Reader<File>)> {
    let path = path.as_ref();
    let mut file = File::open(path)?;
    let header = sniff(&mut file)?;
    file.seek(SeekFrom::Start(0))?;

    let format = Format::detect(&header).or_else(|| Format::from_path(path)).ok_or_else(|| {
        StreamError::codec("detect", format!("cannot identify the compression format of {}", path.display()))
    })?;
    debug!("opened {} for reading, detected {}", path.display(), format);
    Ok((format, Reader::new(file, format.decoder()?)))
}

/// Create (or truncate) `path` and compress into it as `format`.
pub fn create<P: AsRef<Path>>(path: P, format: Format, level: CompressionLevel) -> Result<Writer<File>> {
    let file = File::create(path.as_ref())?;
    debug!("created {} for writing as {} (level {})", path.as_ref().display(), format, level);
    Ok(Writer::new(file, format.encoder(level)?))
}

/// Wrap an already open handle for decompression, starting at its current
/// position so virtual offsets match the underlying file.
pub fn reader_from<R: Read + Seek>(mut inner: R, format: Format) -> Result<Reader<R>> {
    let start = inner.stream_position()?;
    Ok(Reader::new(inner, format.decoder()?).with_start_position(start))
}

/// Wrap an already open handle for compression, starting at its current
/// position so virtual offsets match the underlying file.
pub fn writer_from<W: Write + Seek>(mut inner: W, format: Format, level: CompressionLevel) -> Result<Writer<W>> {
    let start = inner.stream_position()?;
    Ok(Writer::new(inner, format.encoder(level)?).with_start_position(start))
}

/// Read up to [`SNIFF_LEN`] bytes, fewer only at end of file.
fn sniff<R: Read>(inner: &mut R) -> Result<Vec<u8>> {
    let mut header = Vec::with_capacity(SNIFF_LEN);
    inner.take(SNIFF_LEN as u64).read_to_end(&mut header)?;
    Ok(header)
}
