use zstd::stream::raw::{self, Operation, OutBuffer};
use zwrap_core::codec::{Decoder, Encoder, Flush, Progress, Step};
use zwrap_core::{Result, StreamError};

const NAME: &str = "zstd";

/// Zstandard level used when none is given.
pub const DEFAULT_LEVEL: i32 = 3;

fn codec_err(e: std::io::Error) -> StreamError {
    StreamError::codec(NAME, e)
}

/// Zstandard frame decoder.
///
/// Each frame is one member; a `zstd` file made by concatenating frames
/// decodes as their concatenation.
pub struct ZstdDecoder {
    raw: raw::Decoder<'static>,
}

impl ZstdDecoder {
    pub fn new() -> Result<Self> {
        let raw = raw::Decoder::new().map_err(codec_err)?;
        Ok(Self { raw })
    }
}

impl Decoder for ZstdDecoder {
    fn name(&self) -> &'static str {
        NAME
    }

    fn reset(&mut self) -> Result<()> {
        self.raw.reinit().map_err(codec_err)
    }

    fn decode(&mut self, input: &[u8], output: &mut [u8]) -> Result<Step> {
        let status = self.raw.run_on_buffers(input, output).map_err(codec_err)?;
        // A zero size hint means the frame is complete and fully flushed.
        let progress = if status.remaining == 0 { Progress::MemberEnd } else { Progress::Pending };
        Ok(Step { consumed: status.bytes_read, produced: status.bytes_written, progress })
    }
}

/// Zstandard frame encoder.
///
/// The frame stays open across window drains and explicit flushes; only
/// close writes the frame epilogue.
pub struct ZstdEncoder {
    raw: raw::Encoder<'static>,
}

impl ZstdEncoder {
    pub fn new(level: i32) -> Result<Self> {
        let raw = raw::Encoder::new(level).map_err(codec_err)?;
        Ok(Self { raw })
    }
}

impl Encoder for ZstdEncoder {
    fn name(&self) -> &'static str {
        NAME
    }

    fn reset(&mut self) -> Result<()> {
        self.raw.reinit().map_err(codec_err)
    }

    fn encode(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<Step> {
        let status = self.raw.run_on_buffers(input, output).map_err(codec_err)?;
        let consumed = status.bytes_read;
        let mut produced = status.bytes_written;
        if consumed < input.len() {
            return Ok(Step { consumed, produced, progress: Progress::Pending });
        }

        let progress = match flush {
            Flush::Full => Progress::Flushed,
            Flush::Sync | Flush::Finish => {
                let mut dst = OutBuffer::around(&mut output[produced..]);
                let left = if flush == Flush::Sync {
                    self.raw.flush(&mut dst)
                } else {
                    self.raw.finish(&mut dst, true)
                }
                .map_err(codec_err)?;
                produced += dst.pos();

                match (flush, left) {
                    (_, l) if l > 0 => Progress::Pending,
                    (Flush::Finish, _) => Progress::MemberEnd,
                    _ => Progress::Flushed,
                }
            }
        };
        Ok(Step { consumed, produced, progress })
    }
}
