pub mod buffer;
pub mod codec;
pub mod error;
pub mod format;
pub mod reader;
pub mod writer;

#[cfg(test)]
mod testutil;

pub use codec::{CodecState, Decoder, Encoder, Flush, Progress, Step};
pub use error::{Result, StreamError};
pub use format::{VirtualOffset, DEFAULT_BUFFER_SIZE};
pub use reader::Reader;
pub use writer::Writer;
