use std::io::{self, Write};

use log::{debug, trace, warn};

use crate::buffer::Window;
use crate::codec::{CodecState, Encoder, Flush, Progress};
use crate::error::{Result, StreamError};
use crate::format::{VirtualOffset, DEFAULT_BUFFER_SIZE};

/// Push-based compressing writer.
///
/// # Write contract
/// Call [`write`](Write::write) (or [`write_byte`](Self::write_byte)) any
/// number of times. Bytes accumulate in a fixed window; when the window is
/// full it is handed to the encoder and every chunk the encoder emits is
/// written to `inner` before the new bytes are stored.
///
/// [`sync`](Self::sync) (also `Write::flush`) pushes everything accepted so
/// far to `inner` as decodable output without ending the member, so another
/// reader can consume a complete prefix while this writer stays open.
///
/// [`close`](Self::close) ends the member with its trailer, appends the
/// format's end-of-stream marker if it has one, and releases both `inner`
/// and the encoder. It is idempotent and runs implicitly on drop.
///
/// # Failure
/// Any encoder or write failure poisons the writer: every later operation
/// fails and the output must be treated as invalid. Close is never retried
/// after a failure, so nothing is written twice.
pub struct Writer<W: Write> {
    /// `None` once closed.
    inner: Option<W>,
    /// `None` once closed.
    encoder: Option<Box<dyn Encoder>>,
    codec_name: &'static str,
    seekable: bool,
    /// Accumulation window of bytes not yet encoded.
    pending: Window,
    /// Chunk buffer the encoder writes compressed bytes into.
    out: Vec<u8>,
    state: CodecState,
    /// Bytes have gone into the encoder since its last member ended.
    member_open: bool,
    /// Compressed bytes written to `inner`.
    position: u64,
    members_written: u64,
    poisoned: Option<String>,
}

impl<W: Write> Writer<W> {
    /// Wrap `inner` with 64 KB windows.
    pub fn new(inner: W, encoder: Box<dyn Encoder>) -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE, inner, encoder)
    }

    /// Wrap `inner` with `capacity`-byte windows (at least one byte). The
    /// accumulation window is further capped by the encoder's
    /// [`max_block_len`](Encoder::max_block_len).
    pub fn with_capacity(capacity: usize, inner: W, encoder: Box<dyn Encoder>) -> Self {
        let capacity = capacity.max(1);
        let block = encoder.max_block_len().map_or(capacity, |max| max.clamp(1, capacity));
        Self {
            inner: Some(inner),
            codec_name: encoder.name(),
            seekable: encoder.supports_seek(),
            encoder: Some(encoder),
            pending: Window::with_capacity(block),
            out: vec![0; capacity],
            state: CodecState::Ready,
            member_open: false,
            position: 0,
            members_written: 0,
            poisoned: None,
        }
    }

    /// Declare that `inner` is already `position` bytes into the file.
    pub fn with_start_position(mut self, position: u64) -> Self {
        self.position = position;
        self
    }

    /// Insert a single byte.
    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.insert(&[byte]).map(|_| ())
    }

    /// Store `data`, draining the accumulation window each time it fills.
    fn insert(&mut self, mut data: &[u8]) -> Result<usize> {
        self.check_usable()?;
        let total = data.len();
        while !data.is_empty() {
            if self.pending.is_full() {
                self.drain(Flush::Full)?;
            }
            let n = self.pending.extend_from(data);
            data = &data[n..];
        }
        Ok(total)
    }

    /// Make every byte accepted so far decodable from `inner`, without ending
    /// the current member.
    pub fn sync(&mut self) -> Result<()> {
        self.check_usable()?;
        if !self.pending.is_empty() || self.member_open {
            self.drain(Flush::Sync)?;
        }
        let flushed = match self.inner.as_mut() {
            Some(inner) => inner.flush(),
            None => return Err(StreamError::Closed),
        };
        flushed.map_err(|e| self.poison(e.into()))
    }

    /// Finish the stream and release `inner` and the encoder. Safe to call
    /// more than once; both are released even when finishing fails.
    pub fn close(&mut self) -> Result<()> {
        let result = self.try_finish();
        self.inner = None;
        self.encoder = None;
        result
    }

    /// Finish the stream and hand back `inner`. On failure `inner` is
    /// dropped without another attempt to finish.
    pub fn finish(mut self) -> Result<W> {
        let result = self.try_finish();
        let inner = self.inner.take();
        self.encoder = None;
        result?;
        inner.ok_or(StreamError::Closed)
    }

    fn try_finish(&mut self) -> Result<()> {
        if self.inner.is_none() {
            return Ok(());
        }
        if let Some(reason) = &self.poisoned {
            return Err(StreamError::Poisoned(reason.clone()));
        }

        let marker = self.encoder.as_ref().and_then(|e| e.end_of_stream_marker());
        // An empty stream still gets one (empty) member unless the format's
        // end marker already makes it a valid file.
        let empty_stream = self.members_written == 0 && marker.is_none();
        if !self.pending.is_empty() || self.member_open || empty_stream {
            self.drain(Flush::Finish)?;
        }
        if let Err(e) = self.write_trailer(marker) {
            return Err(self.poison(e));
        }

        debug!("{}: closed after {} members, {} compressed bytes", self.codec_name, self.members_written, self.position);
        Ok(())
    }

    /// Append the end-of-stream marker, if any, and flush `inner`.
    fn write_trailer(&mut self, marker: Option<&'static [u8]>) -> Result<()> {
        let inner = self.inner.as_mut().ok_or(StreamError::Closed)?;
        if let Some(marker) = marker {
            inner.write_all(marker)?;
            self.position += marker.len() as u64;
        }
        inner.flush()?;
        Ok(())
    }

    fn drain(&mut self, flush: Flush) -> Result<()> {
        match self.drain_inner(flush) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.poison(e)),
        }
    }

    /// Hand the accumulation window to the encoder and write every chunk it
    /// emits until the directive is satisfied.
    fn drain_inner(&mut self, flush: Flush) -> Result<()> {
        let inner = self.inner.as_mut().ok_or(StreamError::Closed)?;
        let encoder = self.encoder.as_mut().ok_or(StreamError::Closed)?;
        let fed = self.pending.remaining();
        if fed > 0 {
            self.member_open = true;
        }

        loop {
            let step = encoder.encode(self.pending.filled(), &mut self.out, flush)?;
            self.pending.consume(step.consumed);
            if step.produced > 0 {
                inner.write_all(&self.out[..step.produced])?;
                self.position += step.produced as u64;
            }

            match step.progress {
                Progress::Pending => {
                    if step.consumed == 0 && step.produced == 0 {
                        return Err(StreamError::codec(self.codec_name, "encoder made no progress"));
                    }
                }
                Progress::Flushed => break,
                Progress::MemberEnd => {
                    self.members_written += 1;
                    self.member_open = false;
                    if flush == Flush::Finish {
                        break;
                    }
                    encoder.reset()?;
                    if self.pending.is_empty() {
                        break;
                    }
                    self.member_open = true;
                }
            }
        }

        self.pending.clear();
        trace!("{}: drained {} bytes ({:?}), position {}", self.codec_name, fed, flush, self.position);
        Ok(())
    }

    fn poison(&mut self, err: StreamError) -> StreamError {
        self.state = CodecState::Error;
        self.poisoned = Some(err.to_string());
        err
    }

    fn check_usable(&self) -> Result<()> {
        if self.inner.is_none() {
            return Err(StreamError::Closed);
        }
        match &self.poisoned {
            Some(reason) => Err(StreamError::Poisoned(reason.clone())),
            None => Ok(()),
        }
    }

    /// Virtual offset the next inserted byte will be readable at.
    ///
    /// Only block-indexed encoders support this: they end a member on every
    /// drain, so the compressed bytes written so far end on a member boundary.
    pub fn virtual_position(&self) -> Result<VirtualOffset> {
        if !self.seekable {
            return Err(StreamError::SeekUnsupported { codec: self.codec_name });
        }
        VirtualOffset::from_parts(self.position, self.pending.remaining() as u64)
    }

    /// Compressed bytes written to `inner` so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn members_written(&self) -> u64 {
        self.members_written
    }

    pub fn codec_state(&self) -> CodecState {
        self.state
    }

    pub fn codec_name(&self) -> &'static str {
        self.codec_name
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// The underlying handle, `None` after close.
    pub fn get_ref(&self) -> Option<&W> {
        self.inner.as_ref()
    }
}

impl<W: Write> Write for Writer<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.insert(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(self.sync()?)
    }
}

impl<W: Write> Drop for Writer<W> {
    fn drop(&mut self) {
        if self.inner.is_some() {
            if let Err(e) = self.close() {
                warn!("{}: failed to close stream on drop: {}", self.codec_name, e);
            }
        }
    }
}
