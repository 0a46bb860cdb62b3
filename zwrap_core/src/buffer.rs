//! Fixed-capacity byte windows with a read cursor and a fill mark.
//!
//! Every stream owns its windows for its whole lifetime; they are rewound,
//! never reallocated, when a member ends or a seek happens.

use std::io::{self, Read};

/// A byte window: `buf[pos..end]` holds bytes not yet consumed.
///
/// Invariant: `pos <= end <= buf.len()`.
#[derive(Debug)]
pub struct Window {
    buf: Vec<u8>,
    pos: usize,
    end: usize,
}

impl Window {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { buf: vec![0; capacity], pos: 0, end: 0 }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Unconsumed bytes.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.end - self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos == self.end
    }

    /// Free space after the fill mark.
    #[inline]
    pub fn room(&self) -> usize {
        self.buf.len() - self.end
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.end == self.buf.len()
    }

    /// The unconsumed bytes.
    #[inline]
    pub fn filled(&self) -> &[u8] {
        &self.buf[self.pos..self.end]
    }

    /// Advance the read cursor by up to `n` bytes, returning how far it moved.
    pub fn consume(&mut self, n: usize) -> usize {
        let step = n.min(self.remaining());
        self.pos += step;
        step
    }

    /// Drop everything and rewind both marks.
    pub fn clear(&mut self) {
        self.pos = 0;
        self.end = 0;
    }

    /// The whole backing storage, for a codec to decode into.
    /// Follow with [`set_filled`](Self::set_filled).
    pub fn storage_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Mark `buf[..n]` as fresh, unconsumed data.
    pub fn set_filled(&mut self, n: usize) {
        assert!(n <= self.buf.len(), "fill mark {} beyond capacity {}", n, self.buf.len());
        self.pos = 0;
        self.end = n;
    }

    /// Append as much of `data` as fits, returning the count copied.
    pub fn extend_from(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.room());
        self.buf[self.end..self.end + n].copy_from_slice(&data[..n]);
        self.end += n;
        n
    }

    /// Replace the contents with a single read from `src`.
    ///
    /// Short reads are fine; `Ok(0)` means `src` is exhausted.
    pub fn refill<R: Read>(&mut self, src: &mut R) -> io::Result<usize> {
        self.clear();
        let n = loop {
            match src.read(&mut self.buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };
        self.end = n;
        Ok(n)
    }
}
