//! Error types for zwrap stream operations.

use std::io;

use thiserror::Error;

/// Result type alias for zwrap stream operations.
pub type Result<T> = std::result::Result<T, StreamError>;

/// Error type for stream construction, decoding, encoding and positioning.
#[derive(Error, Debug)]
pub enum StreamError {
    /// The underlying file handle failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The codec rejected its input or could not be initialised.
    #[error("{codec} codec error: {message}")]
    Codec {
        /// Codec name, e.g. "gzip"
        codec: &'static str,
        /// What the codec reported
        message: String,
    },

    /// Positioning was requested on a format without virtual offsets.
    #[error("{codec} streams do not support random access")]
    SeekUnsupported {
        /// Codec name of the stream that rejected the seek
        codec: &'static str,
    },

    /// A virtual offset could not be built from its two coordinates.
    #[error("invalid virtual offset: block {block_position}, intra-block offset {offset}")]
    InvalidOffset {
        /// Compressed byte offset of the member start
        block_position: u64,
        /// Decompressed offset inside the member
        offset: u64,
    },

    /// The stream was already closed.
    #[error("stream is closed")]
    Closed,

    /// An earlier write failure left the output in an undefined state.
    #[error("stream is unusable after an earlier failure: {0}")]
    Poisoned(String),
}

impl StreamError {
    /// Build a codec error from anything displayable.
    pub fn codec(codec: &'static str, message: impl std::fmt::Display) -> Self {
        StreamError::Codec { codec, message: message.to_string() }
    }

    /// The `io::ErrorKind` this error surfaces as through `Read`/`Write`/`Seek`.
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            StreamError::Io(e) => e.kind(),
            StreamError::Codec { .. } => io::ErrorKind::InvalidData,
            StreamError::SeekUnsupported { .. } => io::ErrorKind::Unsupported,
            StreamError::InvalidOffset { .. } => io::ErrorKind::InvalidInput,
            StreamError::Closed => io::ErrorKind::BrokenPipe,
            StreamError::Poisoned(_) => io::ErrorKind::Other,
        }
    }
}

impl From<StreamError> for io::Error {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::Io(e) => e,
            other => io::Error::new(other.kind(), other),
        }
    }
}
