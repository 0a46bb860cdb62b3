//! A toy member format for exercising the stream loops without a real codec:
//! each member is a little-endian `u32` payload length followed by the
//! payload, stored verbatim.

use crate::codec::{Decoder, Encoder, Flush, Progress, Step};
use crate::error::{Result, StreamError};

const MAX_MEMBER: u32 = 1 << 16;

pub fn frame_members(members: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for m in members {
        out.extend_from_slice(&(m.len() as u32).to_le_bytes());
        out.extend_from_slice(m);
    }
    out
}

/// Streaming decoder: copes with headers and payloads split across calls.
pub struct FrameDecoder {
    seekable: bool,
    header: [u8; 4],
    header_len: usize,
    remaining: Option<u32>,
}

impl FrameDecoder {
    pub fn new(seekable: bool) -> Self {
        Self { seekable, header: [0; 4], header_len: 0, remaining: None }
    }
}

impl Decoder for FrameDecoder {
    fn name(&self) -> &'static str {
        "frame"
    }

    fn reset(&mut self) -> Result<()> {
        self.header_len = 0;
        self.remaining = None;
        Ok(())
    }

    fn decode(&mut self, input: &[u8], output: &mut [u8]) -> Result<Step> {
        let mut consumed = 0;
        let mut produced = 0;
        loop {
            match self.remaining {
                None => {
                    while self.header_len < 4 && consumed < input.len() {
                        self.header[self.header_len] = input[consumed];
                        self.header_len += 1;
                        consumed += 1;
                    }
                    if self.header_len < 4 {
                        return Ok(Step { consumed, produced, progress: Progress::Pending });
                    }
                    let len = u32::from_le_bytes(self.header);
                    if len > MAX_MEMBER {
                        return Err(StreamError::codec("frame", format!("oversized member of {len} bytes")));
                    }
                    self.remaining = Some(len);
                }
                Some(0) => {
                    return Ok(Step { consumed, produced, progress: Progress::MemberEnd });
                }
                Some(left) => {
                    let n = (left as usize).min(input.len() - consumed).min(output.len() - produced);
                    if n == 0 {
                        return Ok(Step { consumed, produced, progress: Progress::Pending });
                    }
                    output[produced..produced + n].copy_from_slice(&input[consumed..consumed + n]);
                    consumed += n;
                    produced += n;
                    self.remaining = Some(left - n as u32);
                }
            }
        }
    }

    fn supports_seek(&self) -> bool {
        self.seekable
    }
}

/// Ends a member on every drain, like a block-indexed encoder.
pub struct FrameEncoder {
    pub max_block_len: Option<usize>,
    pub marker: Option<&'static [u8]>,
    payload: Vec<u8>,
    staged: Vec<u8>,
    staged_pos: usize,
}

impl FrameEncoder {
    pub fn new(max_block_len: Option<usize>, marker: Option<&'static [u8]>) -> Self {
        Self { max_block_len, marker, payload: Vec::new(), staged: Vec::new(), staged_pos: 0 }
    }
}

impl Encoder for FrameEncoder {
    fn name(&self) -> &'static str {
        "frame"
    }

    fn reset(&mut self) -> Result<()> {
        self.payload.clear();
        self.staged.clear();
        self.staged_pos = 0;
        Ok(())
    }

    fn encode(&mut self, input: &[u8], output: &mut [u8], _flush: Flush) -> Result<Step> {
        self.payload.extend_from_slice(input);
        if self.staged.is_empty() {
            self.staged = frame_members(&[&self.payload]);
        }
        let n = (self.staged.len() - self.staged_pos).min(output.len());
        output[..n].copy_from_slice(&self.staged[self.staged_pos..self.staged_pos + n]);
        self.staged_pos += n;
        let progress = if self.staged_pos == self.staged.len() { Progress::MemberEnd } else { Progress::Pending };
        Ok(Step { consumed: input.len(), produced: n, progress })
    }

    fn max_block_len(&self) -> Option<usize> {
        self.max_block_len
    }

    fn end_of_stream_marker(&self) -> Option<&'static [u8]> {
        self.marker
    }

    fn supports_seek(&self) -> bool {
        true
    }
}
