use std::fmt;
use std::path::Path;
use std::str::FromStr;

use zwrap_core::{Decoder, Encoder, Result};

use crate::bgzf_codec::{BgzfDecoder, BgzfEncoder, BGZF_HEADER_SIZE};
use crate::gzip_codec::{GzipDecoder, GzipEncoder};
use crate::level::CompressionLevel;
use crate::zstd_codec::{ZstdDecoder, ZstdEncoder};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];
const FLG_FEXTRA: u8 = 0x04;

/// Bytes [`Format::detect`] needs to tell every format apart.
pub const SNIFF_LEN: usize = BGZF_HEADER_SIZE;

/// Compressed file formats zwrap can read and write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    /// Plain (possibly multi-member) gzip.
    Gzip,
    /// Block-indexed gzip with virtual-offset seeking.
    Bgzf,
    /// Zstandard frames.
    Zstd,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::Gzip, Format::Bgzf, Format::Zstd];

    pub fn name(self) -> &'static str {
        match self {
            Format::Gzip => "gzip",
            Format::Bgzf => "bgzf",
            Format::Zstd => "zstd",
        }
    }

    /// Conventional file extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Format::Gzip => "gz",
            Format::Bgzf => "bgz",
            Format::Zstd => "zst",
        }
    }

    /// Whether readers of this format accept virtual-offset seeks.
    pub fn supports_seek(self) -> bool {
        matches!(self, Format::Bgzf)
    }

    /// Identify a format from the first bytes of a file.
    ///
    /// BGZF is recognised by the `BC` extra subfield in the first member
    /// header, so pass at least [`SNIFF_LEN`] bytes to distinguish it from
    /// plain gzip.
    pub fn detect(header: &[u8]) -> Option<Format> {
        if header.starts_with(&ZSTD_MAGIC) {
            return Some(Format::Zstd);
        }
        if !header.starts_with(&GZIP_MAGIC) {
            return None;
        }
        let is_bgzf = header.len() >= SNIFF_LEN
            && header[3] & FLG_FEXTRA != 0
            && u16::from_le_bytes([header[10], header[11]]) >= 6
            && &header[12..14] == b"BC"
            && u16::from_le_bytes([header[14], header[15]]) == 2;
        Some(if is_bgzf { Format::Bgzf } else { Format::Gzip })
    }

    /// Guess a format from a file extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Format> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "gz" | "gzip" => Some(Format::Gzip),
            "bgz" | "bgzf" => Some(Format::Bgzf),
            "zst" | "zstd" => Some(Format::Zstd),
            _ => None,
        }
    }

    /// A fresh decoder for this format.
    pub fn decoder(self) -> Result<Box<dyn Decoder>> {
        Ok(match self {
            Format::Gzip => Box::new(GzipDecoder::new()),
            Format::Bgzf => Box::new(BgzfDecoder::new()),
            Format::Zstd => Box::new(ZstdDecoder::new()?),
        })
    }

    /// A fresh encoder for this format at `level`.
    pub fn encoder(self, level: CompressionLevel) -> Result<Box<dyn Encoder>> {
        Ok(match self {
            Format::Gzip => Box::new(GzipEncoder::new(level.to_gzip())),
            Format::Bgzf => Box::new(BgzfEncoder::new(level.to_gzip())),
            Format::Zstd => Box::new(ZstdEncoder::new(level.to_zstd())?),
        })
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gzip" | "gz" => Ok(Format::Gzip),
            "bgzf" | "bgz" => Ok(Format::Bgzf),
            "zstd" | "zst" => Ok(Format::Zstd),
            _ => Err(format!("unknown format '{s}': expected gzip, bgzf or zstd")),
        }
    }
}
