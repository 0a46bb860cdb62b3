use crate::error::Result;

/// Lifecycle of the codec behind a stream.
///
/// A compressed file is a sequence of independently decodable *members*
/// (gzip members, zstd frames). The reader and writer loops move between
/// these states:
///
/// ```text
/// Ready ──(member's final bytes)──► AtMemberEnd ──(reset)──► Ready
///   │                                   │
///   └──────────(codec failure)──────────┴──► Error   (left only by a seek)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecState {
    /// Accepts more input or yields more output.
    Ready,
    /// The current member is complete; the codec must be reset before the
    /// next member is touched.
    AtMemberEnd,
    /// Reads report end-of-data and writes fail. Only a reader seek leaves it.
    Error,
}

/// Encode directive passed to [`Encoder::encode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flush {
    /// The accumulation buffer is full. All input must be consumed; the codec
    /// chooses how much to emit.
    Full,
    /// Explicit flush. Everything consumed so far must be decodable by a
    /// reader once the emitted bytes reach the file.
    Sync,
    /// Terminate the member with its trailer.
    Finish,
}

/// How far a codec step got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// More calls are needed (input left, or output space ran out).
    Pending,
    /// All input consumed and the flush directive satisfied.
    Flushed,
    /// The member was completed by this step.
    MemberEnd,
}

/// Result of one decode or encode step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Input bytes the codec took.
    pub consumed: usize,
    /// Output bytes the codec wrote.
    pub produced: usize,
    pub progress: Progress,
}

/// Decompressing half of a codec binding.
///
/// Implementations wrap the format's native decoder state. They never read
/// from the file themselves; the [`Reader`](crate::Reader) feeds them.
pub trait Decoder: Send {
    /// Human-readable codec name for errors and logs.
    fn name(&self) -> &'static str;

    /// Prepare for a fresh member. Called at member boundaries and after seeks.
    fn reset(&mut self) -> Result<()>;

    /// Feed compressed `input`, write decompressed bytes into `output`.
    ///
    /// Returns [`Progress::MemberEnd`] once the member's trailer has been
    /// consumed; bytes after it belong to the next member and are left
    /// unconsumed.
    fn decode(&mut self, input: &[u8], output: &mut [u8]) -> Result<Step>;

    /// Whether member start offsets are meaningful seek targets.
    fn supports_seek(&self) -> bool {
        false
    }
}

/// Compressing half of a codec binding.
pub trait Encoder: Send {
    fn name(&self) -> &'static str;

    /// Begin a new member after [`Progress::MemberEnd`].
    fn reset(&mut self) -> Result<()>;

    /// Feed uncompressed `input`, write compressed bytes into `output`.
    fn encode(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<Step>;

    /// Upper bound on decompressed bytes per member, if the format has one.
    fn max_block_len(&self) -> Option<usize> {
        None
    }

    /// Bytes appended once after the final member on close.
    fn end_of_stream_marker(&self) -> Option<&'static [u8]> {
        None
    }

    /// Whether the writer should report virtual offsets.
    fn supports_seek(&self) -> bool {
        false
    }
}
