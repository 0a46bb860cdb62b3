//! Block-indexed gzip (BGZF).
//!
//! A BGZF file is ordinary multi-member gzip where every member carries at
//! most [`BGZF_MAX_BLOCK_LEN`] decompressed bytes and records its own
//! compressed size in a `BC` extra subfield. Any gzip tool can read it, and
//! every member start is a valid seek target for a virtual offset.

use flate2::{Compress, Compression, Crc, FlushCompress, Status};
use log::trace;
use zwrap_core::codec::{Decoder, Encoder, Flush, Progress, Step};
use zwrap_core::{Result, StreamError};

use crate::gzip_codec::GzipDecoder;

/// Maximum decompressed payload of one block.
pub const BGZF_MAX_BLOCK_LEN: usize = 65280;

/// Size of the block header, including the `BC` subfield.
pub const BGZF_HEADER_SIZE: usize = 18;

/// Size of the block footer (CRC32 + ISIZE).
pub const BGZF_FOOTER_SIZE: usize = 8;

/// Empty block that terminates a BGZF file.
pub const BGZF_EOF: [u8; 28] = [
    0x1f, 0x8b, 0x08, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x06, 0x00, 0x42, 0x43, 0x02, 0x00,
    0x1b, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

const NAME: &str = "bgzf";

/// Largest complete block BSIZE can describe.
const MAX_BLOCK_SIZE: usize = 1 << 16;

/// Decodes BGZF blocks as gzip members and advertises seek support.
pub struct BgzfDecoder {
    inner: GzipDecoder,
}

impl BgzfDecoder {
    pub fn new() -> Self {
        Self { inner: GzipDecoder::new() }
    }
}

impl Default for BgzfDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for BgzfDecoder {
    fn name(&self) -> &'static str {
        NAME
    }

    fn reset(&mut self) -> Result<()> {
        self.inner.reset()
    }

    fn decode(&mut self, input: &[u8], output: &mut [u8]) -> Result<Step> {
        self.inner.decode(input, output).map_err(|e| match e {
            StreamError::Codec { message, .. } => StreamError::Codec { codec: NAME, message },
            other => other,
        })
    }

    fn supports_seek(&self) -> bool {
        true
    }
}

/// Writes every drain as one complete BGZF block.
///
/// The whole block is assembled on the first `encode` call of a drain and
/// then copied out across as many calls as the output chunk requires.
pub struct BgzfEncoder {
    deflate: Compress,
    staged: Vec<u8>,
    staged_pos: usize,
}

impl BgzfEncoder {
    pub fn new(level: Compression) -> Self {
        Self { deflate: Compress::new(level, false), staged: Vec::new(), staged_pos: 0 }
    }

    fn build_block(&mut self, data: &[u8]) -> Result<()> {
        if data.len() > BGZF_MAX_BLOCK_LEN {
            return Err(StreamError::codec(NAME, format!("block payload of {} bytes exceeds {BGZF_MAX_BLOCK_LEN}", data.len())));
        }

        self.deflate.reset();
        let start = self.deflate.total_in();
        let mut deflated = Vec::with_capacity(data.len() + data.len() / 8 + 64);
        loop {
            let read = (self.deflate.total_in() - start) as usize;
            let status = self
                .deflate
                .compress_vec(&data[read..], &mut deflated, FlushCompress::Finish)
                .map_err(|e| StreamError::codec(NAME, e))?;
            if matches!(status, Status::StreamEnd) {
                break;
            }
            deflated.reserve(deflated.capacity().max(64));
        }

        let block_size = BGZF_HEADER_SIZE + deflated.len() + BGZF_FOOTER_SIZE;
        if block_size > MAX_BLOCK_SIZE {
            return Err(StreamError::codec(NAME, format!("compressed block of {block_size} bytes does not fit BSIZE")));
        }
        let bsize = (block_size - 1) as u16;

        let mut crc = Crc::new();
        crc.update(data);

        self.staged.clear();
        self.staged.reserve(block_size);
        self.staged.extend_from_slice(&[
            0x1f, 0x8b, // ID1, ID2
            0x08, // CM = deflate
            0x04, // FLG = FEXTRA
            0x00, 0x00, 0x00, 0x00, // MTIME
            0x00, // XFL
            0xff, // OS = unknown
            0x06, 0x00, // XLEN
            0x42, 0x43, // SI1, SI2
            0x02, 0x00, // SLEN
        ]);
        self.staged.extend_from_slice(&bsize.to_le_bytes());
        self.staged.extend_from_slice(&deflated);
        self.staged.extend_from_slice(&crc.sum().to_le_bytes());
        self.staged.extend_from_slice(&(data.len() as u32).to_le_bytes());
        self.staged_pos = 0;

        trace!("bgzf: block of {} bytes deflated to {}", data.len(), block_size);
        Ok(())
    }
}

impl Default for BgzfEncoder {
    fn default() -> Self {
        Self::new(Compression::default())
    }
}

impl Encoder for BgzfEncoder {
    fn name(&self) -> &'static str {
        NAME
    }

    fn reset(&mut self) -> Result<()> {
        self.staged.clear();
        self.staged_pos = 0;
        Ok(())
    }

    // Every directive ends the block: a partially emitted block is not
    // decodable, and each block start must stay addressable.
    fn encode(&mut self, input: &[u8], output: &mut [u8], _flush: Flush) -> Result<Step> {
        if self.staged.is_empty() {
            self.build_block(input)?;
        } else if !input.is_empty() {
            return Err(StreamError::codec(NAME, "new input while a block is still being emitted"));
        }

        let n = (self.staged.len() - self.staged_pos).min(output.len());
        output[..n].copy_from_slice(&self.staged[self.staged_pos..self.staged_pos + n]);
        self.staged_pos += n;

        let progress = if self.staged_pos == self.staged.len() {
            self.staged.clear();
            self.staged_pos = 0;
            Progress::MemberEnd
        } else {
            Progress::Pending
        };
        Ok(Step { consumed: input.len(), produced: n, progress })
    }

    fn max_block_len(&self) -> Option<usize> {
        Some(BGZF_MAX_BLOCK_LEN)
    }

    fn end_of_stream_marker(&self) -> Option<&'static [u8]> {
        Some(&BGZF_EOF)
    }

    fn supports_seek(&self) -> bool {
        true
    }
}
