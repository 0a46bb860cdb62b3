use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use zwrap_core::codec::{Decoder, Encoder, Flush, Progress, Step};
use zwrap_core::{Result, StreamError};

/// Deflate window size used for every gzip member.
pub(crate) const WINDOW_BITS: u8 = 15;

const NAME: &str = "gzip";

fn step_counts(before: (u64, u64), after: (u64, u64)) -> (usize, usize) {
    ((after.0 - before.0) as usize, (after.1 - before.1) as usize)
}

/// Gzip member decoder.
///
/// Decodes one gzip member at a time and stops at its trailer, so
/// concatenated members (`cat a.gz b.gz`) and BGZF blocks surface as
/// separate members to the reader.
pub struct GzipDecoder {
    inflate: Decompress,
}

impl GzipDecoder {
    pub fn new() -> Self {
        Self { inflate: Decompress::new_gzip(WINDOW_BITS) }
    }
}

impl Default for GzipDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for GzipDecoder {
    fn name(&self) -> &'static str {
        NAME
    }

    fn reset(&mut self) -> Result<()> {
        // `Decompress::reset` would drop the gzip wrapper; start over instead.
        self.inflate = Decompress::new_gzip(WINDOW_BITS);
        Ok(())
    }

    fn decode(&mut self, input: &[u8], output: &mut [u8]) -> Result<Step> {
        let before = (self.inflate.total_in(), self.inflate.total_out());
        let status = self
            .inflate
            .decompress(input, output, FlushDecompress::None)
            .map_err(|e| StreamError::codec(NAME, e))?;
        let (consumed, produced) = step_counts(before, (self.inflate.total_in(), self.inflate.total_out()));

        let progress = match status {
            Status::StreamEnd => Progress::MemberEnd,
            Status::Ok | Status::BufError => Progress::Pending,
        };
        Ok(Step { consumed, produced, progress })
    }
}

/// Gzip member encoder.
///
/// A full accumulation window is pushed through with a sync flush, so the
/// compressed output always ends on a byte boundary a reader can decode up
/// to. The member is only terminated on close.
pub struct GzipEncoder {
    deflate: Compress,
}

impl GzipEncoder {
    pub fn new(level: Compression) -> Self {
        Self { deflate: Compress::new_gzip(level, WINDOW_BITS) }
    }
}

impl Default for GzipEncoder {
    fn default() -> Self {
        Self::new(Compression::default())
    }
}

impl Encoder for GzipEncoder {
    fn name(&self) -> &'static str {
        NAME
    }

    fn reset(&mut self) -> Result<()> {
        self.deflate.reset();
        Ok(())
    }

    fn encode(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<Step> {
        let mode = match flush {
            Flush::Full | Flush::Sync => FlushCompress::Sync,
            Flush::Finish => FlushCompress::Finish,
        };
        let before = (self.deflate.total_in(), self.deflate.total_out());
        let status = self
            .deflate
            .compress(input, output, mode)
            .map_err(|e| StreamError::codec(NAME, e))?;
        let (consumed, produced) = step_counts(before, (self.deflate.total_in(), self.deflate.total_out()));

        // zlib has finished a flush once it consumed everything and still had
        // output space left over. A repeated flush with nothing new to emit
        // reports BufError.
        let progress = match (flush, status) {
            (Flush::Finish, Status::StreamEnd) => Progress::MemberEnd,
            (Flush::Finish, _) => Progress::Pending,
            (_, Status::BufError) if consumed == 0 && produced == 0 => Progress::Flushed,
            _ if consumed == input.len() && produced < output.len() => Progress::Flushed,
            _ => Progress::Pending,
        };
        Ok(Step { consumed, produced, progress })
    }
}
