//! Codec bindings for zwrap: gzip, BGZF and zstd, plus constructors that
//! pair them with files.

pub mod bgzf_codec;
mod format;
mod gzip_codec;
mod level;
mod open;
mod zstd_codec;

pub use bgzf_codec::{BgzfDecoder, BgzfEncoder, BGZF_EOF, BGZF_MAX_BLOCK_LEN};
pub use format::{Format, SNIFF_LEN};
pub use gzip_codec::{GzipDecoder, GzipEncoder};
pub use level::CompressionLevel;
pub use open::{create, open, open_auto, reader_from, writer_from};
pub use zstd_codec::{ZstdDecoder, ZstdEncoder};
