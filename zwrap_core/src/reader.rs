use std::io::{self, BufRead, Read, Seek, SeekFrom};

use log::{debug, trace};

use crate::buffer::Window;
use crate::codec::{CodecState, Decoder, Progress};
use crate::error::{Result, StreamError};
use crate::format::{VirtualOffset, DEFAULT_BUFFER_SIZE};

/// Pull-based decompressing reader.
///
/// # Read loop
/// Each request is served from the decompressed window. When it runs dry:
/// 1. Refill the compressed window from `inner` if it is empty (short reads
///    are fine; a zero-length read marks end of file).
/// 2. If the previous member ended and compressed bytes remain, reset the
///    decoder and record where the new member starts.
/// 3. Run one decode step into the decompressed window.
/// 4. Skip bytes still owed to a pending seek.
///
/// The loop stops once bytes are available, the decoder has failed, or the
/// file is exhausted.
///
/// # Random access
/// For formats whose decoder reports [`Decoder::supports_seek`], the reader
/// tracks the member it is in and converts between its position and a
/// [`VirtualOffset`]. Other formats reject every positioning request with
/// [`StreamError::SeekUnsupported`].
pub struct Reader<R> {
    inner: R,
    decoder: Box<dyn Decoder>,
    compressed: Window,
    decompressed: Window,
    state: CodecState,
    /// `inner` returned a zero-length read.
    eof: bool,
    /// Physical position of `inner`: bytes pulled from it since its start.
    position: u64,
    /// Compressed offset where the current member began.
    block_position: u64,
    /// Decompressed bytes produced since the current member began.
    block_offset: u64,
    /// Decompressed bytes still to skip after a seek.
    discard: u64,
    members_seen: u64,
    last_error: Option<String>,
}

impl<R: Read> Reader<R> {
    /// Wrap `inner` with 64 KB windows.
    pub fn new(inner: R, decoder: Box<dyn Decoder>) -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE, inner, decoder)
    }

    /// Wrap `inner`, sizing both windows to `capacity` bytes (at least one).
    pub fn with_capacity(capacity: usize, inner: R, decoder: Box<dyn Decoder>) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner,
            decoder,
            compressed: Window::with_capacity(capacity),
            decompressed: Window::with_capacity(capacity),
            state: CodecState::Ready,
            eof: false,
            position: 0,
            block_position: 0,
            block_offset: 0,
            discard: 0,
            members_seen: 0,
            last_error: None,
        }
    }

    /// Declare that `inner` is already `position` bytes into the file, so
    /// that virtual offsets stay file-relative for pre-positioned handles.
    pub fn with_start_position(mut self, position: u64) -> Self {
        self.position = position;
        self.block_position = position;
        self
    }

    /// Pull the next decompressed byte, `None` at end of data.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        self.fill_decompressed()?;
        let byte = self.decompressed.filled().first().copied();
        if byte.is_some() {
            self.decompressed.consume(1);
        }
        Ok(byte)
    }

    /// Run the refill/decode loop until decompressed bytes are available or
    /// the stream has ended. An empty window on return means end of data.
    fn fill_decompressed(&mut self) -> Result<()> {
        while self.decompressed.is_empty() {
            if self.state == CodecState::Error {
                return Ok(());
            }

            if self.compressed.is_empty() && !self.eof {
                let n = self.compressed.refill(&mut self.inner)?;
                self.position += n as u64;
                if n == 0 {
                    self.eof = true;
                }
                trace!("{}: refilled {} compressed bytes (position {})", self.decoder.name(), n, self.position);
            }

            if self.state == CodecState::AtMemberEnd {
                if self.compressed.is_empty() {
                    // Clean end: the last member finished exactly at end of file.
                    return Ok(());
                }
                self.begin_member()?;
            }

            let step = match self.decoder.decode(self.compressed.filled(), self.decompressed.storage_mut()) {
                Ok(step) => step,
                Err(e) => return Err(self.fail(e)),
            };
            self.compressed.consume(step.consumed);
            self.decompressed.set_filled(step.produced);
            self.block_offset += step.produced as u64;

            if step.progress == Progress::MemberEnd {
                self.state = CodecState::AtMemberEnd;
            }

            if self.discard > 0 {
                let skipped = self.decompressed.consume(self.discard as usize);
                self.discard -= skipped as u64;
            }

            if step.consumed == 0 && step.produced == 0 && step.progress != Progress::MemberEnd {
                if self.compressed.is_empty() && self.eof {
                    // Truncated or not-yet-finished member: whatever decoded is all there is.
                    debug!("{}: input exhausted inside a member", self.decoder.name());
                    return Ok(());
                }
                if !self.compressed.is_empty() {
                    let e = StreamError::codec(self.decoder.name(), "decoder made no progress");
                    return Err(self.fail(e));
                }
            }
        }
        Ok(())
    }

    /// Virtual offset of the next byte [`read`](Read::read) would return.
    ///
    /// When the window is drained mid-member the decoder is advanced until it
    /// produces more output or settles the member trailer, so a member whose
    /// last byte was just delivered reports the next member start.
    pub fn virtual_position(&mut self) -> Result<VirtualOffset> {
        self.ensure_seekable()?;
        if self.decompressed.is_empty() && self.state == CodecState::Ready && self.block_offset > 0 {
            self.fill_decompressed()?;
        }
        if self.decompressed.is_empty() && self.state == CodecState::AtMemberEnd {
            let next_member = self.position - self.compressed.remaining() as u64;
            return VirtualOffset::new(next_member, 0);
        }
        let delivered = self.block_offset - self.decompressed.remaining() as u64 + self.discard;
        VirtualOffset::from_parts(self.block_position, delivered)
    }

    /// Reset the decoder for the member starting at the next unconsumed
    /// compressed byte.
    fn begin_member(&mut self) -> Result<()> {
        if let Err(e) = self.decoder.reset() {
            return Err(self.fail(e));
        }
        self.state = CodecState::Ready;
        self.block_position = self.position - self.compressed.remaining() as u64;
        self.block_offset = 0;
        self.members_seen += 1;
        debug!("{}: member begins at compressed offset {}", self.decoder.name(), self.block_position);
        Ok(())
    }
}

impl<R> Reader<R> {
    fn fail(&mut self, err: StreamError) -> StreamError {
        self.state = CodecState::Error;
        self.last_error = Some(err.to_string());
        err
    }

    fn ensure_seekable(&self) -> Result<()> {
        if self.decoder.supports_seek() {
            Ok(())
        } else {
            Err(StreamError::SeekUnsupported { codec: self.decoder.name() })
        }
    }

    /// Compressed offset where the current member began.
    pub fn block_position(&self) -> u64 {
        self.block_position
    }

    /// Number of member boundaries crossed while reading sequentially.
    pub fn members_seen(&self) -> u64 {
        self.members_seen
    }

    pub fn codec_state(&self) -> CodecState {
        self.state
    }

    /// The decode failure that put the reader into [`CodecState::Error`].
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Codec name, e.g. "gzip".
    pub fn codec_name(&self) -> &'static str {
        self.decoder.name()
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Release the file handle. Buffered data is discarded.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> Reader<R> {
    /// Jump to `voff`, which must come from a prior
    /// [`virtual_position`](Self::virtual_position) or an index of this file.
    /// A block position that is not a member start desynchronizes decoding.
    pub fn seek_virtual(&mut self, voff: VirtualOffset) -> Result<VirtualOffset> {
        self.ensure_seekable()?;
        let block = voff.block_position();
        self.inner.seek(SeekFrom::Start(block))?;

        self.position = block;
        self.eof = false;
        self.compressed.clear();
        self.decompressed.clear();
        if let Err(e) = self.decoder.reset() {
            return Err(self.fail(e));
        }
        self.state = CodecState::Ready;
        self.last_error = None;
        self.block_position = block;
        self.block_offset = 0;
        self.discard = voff.offset() as u64;

        debug!("{}: seek to virtual offset {}", self.decoder.name(), voff);
        Ok(voff)
    }
}

impl<R: Read> Read for Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let available = self.fill_buf()?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl<R: Read> BufRead for Reader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.fill_decompressed()?;
        Ok(self.decompressed.filled())
    }

    fn consume(&mut self, amt: usize) {
        self.decompressed.consume(amt);
    }
}

/// Absolute positions are virtual offsets; `SeekFrom::Current(0)` reports
/// the current one. Relative and end-relative seeks are unsupported.
impl<R: Read + Seek> Seek for Reader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match pos {
            SeekFrom::Start(raw) => Ok(self.seek_virtual(VirtualOffset::from(raw))?.into()),
            SeekFrom::Current(0) => Ok(self.virtual_position()?.into()),
            _ => {
                self.ensure_seekable()?;
                Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "only absolute virtual offsets can be sought",
                ))
            }
        }
    }
}
