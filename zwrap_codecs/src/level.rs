use std::fmt;
use std::str::FromStr;

use flate2::Compression;

use crate::zstd_codec::DEFAULT_LEVEL;

/// Compression effort, mapped onto each codec's own scale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompressionLevel {
    /// Fastest compression, larger output
    Fast,
    /// Balanced compression/speed trade-off
    #[default]
    Default,
    /// Best compression, slower
    Best,
    /// Codec-specific level, clamped to the codec's range
    Custom(i32),
}

impl CompressionLevel {
    /// Deflate level for gzip and BGZF (0-9).
    pub fn to_gzip(self) -> Compression {
        match self {
            CompressionLevel::Fast => Compression::fast(),
            CompressionLevel::Default => Compression::default(),
            CompressionLevel::Best => Compression::best(),
            CompressionLevel::Custom(level) => Compression::new(level.clamp(0, 9) as u32),
        }
    }

    /// zstd level (1-22; negative levels trade ratio for speed).
    pub fn to_zstd(self) -> i32 {
        match self {
            CompressionLevel::Fast => 1,
            CompressionLevel::Default => DEFAULT_LEVEL,
            CompressionLevel::Best => 19,
            CompressionLevel::Custom(level) => level.min(22),
        }
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionLevel::Fast => f.write_str("fast"),
            CompressionLevel::Default => f.write_str("default"),
            CompressionLevel::Best => f.write_str("best"),
            CompressionLevel::Custom(level) => write!(f, "{level}"),
        }
    }
}

impl FromStr for CompressionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(CompressionLevel::Fast),
            "default" => Ok(CompressionLevel::Default),
            "best" => Ok(CompressionLevel::Best),
            other => other
                .parse::<i32>()
                .map(CompressionLevel::Custom)
                .map_err(|_| format!("invalid compression level '{s}': expected fast, default, best or an integer")),
        }
    }
}
