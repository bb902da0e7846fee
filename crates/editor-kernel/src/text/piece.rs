//! Pieces: spans of the two backing buffers.

/// Which backing buffer a piece points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferSource {
    /// Read-only bytes the document was opened with
    Original,
    /// Append-only buffer holding all inserted bytes
    Add,
}

/// A byte span `start..start + len` of one backing buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    /// Buffer the span belongs to
    pub source: BufferSource,
    /// Start position in the buffer (byte offset)
    pub start: usize,
    /// Byte length of the span
    pub len: usize,
    /// Number of `\n` bytes inside the span
    pub newlines: usize,
}

impl Piece {
    /// Create a piece over `bytes`, which must be the exact span it references.
    pub fn new(source: BufferSource, start: usize, bytes: &[u8]) -> Self {
        Self {
            source,
            start,
            len: bytes.len(),
            newlines: count_newlines(bytes),
        }
    }

    /// Split at `at` bytes into the piece. `bytes` is the span this piece references.
    pub fn split(&self, at: usize, bytes: &[u8]) -> (Piece, Piece) {
        let left = Piece::new(self.source, self.start, &bytes[..at]);
        let right = Piece {
            source: self.source,
            start: self.start + at,
            len: self.len - at,
            newlines: self.newlines - left.newlines,
        };
        (left, right)
    }

    /// Whether `next` continues this piece in the same buffer.
    pub fn is_followed_by(&self, next: &Piece) -> bool {
        self.source == BufferSource::Add
            && next.source == BufferSource::Add
            && self.start + self.len == next.start
    }

    /// Merge with a piece for which [`Piece::is_followed_by`] holds.
    pub fn merged(&self, next: &Piece) -> Piece {
        Piece {
            source: self.source,
            start: self.start,
            len: self.len + next.len,
            newlines: self.newlines + next.newlines,
        }
    }
}

pub(crate) fn count_newlines(bytes: &[u8]) -> usize {
    memchr::memchr_iter(b'\n', bytes).count()
}
