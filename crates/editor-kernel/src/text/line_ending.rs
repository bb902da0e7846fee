//! Line ending helpers.
//!
//! Text is stored exactly as loaded; `\r\n` stays `\r\n` in the buffers.
//! The dominant style is detected on open and a [`LineEndingPolicy`] is
//! applied only when bytes are materialized for saving.

use serde::{Deserialize, Serialize};

/// A newline sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// Unix-style LF (`'\n'`).
    #[default]
    Lf,
    /// Windows-style CRLF (`"\r\n"`).
    Crlf,
}

impl LineEnding {
    /// Detect the dominant line ending of `bytes`.
    ///
    /// Policy: [`LineEnding::Crlf`] only if CRLF terminators outnumber bare LF ones,
    /// otherwise [`LineEnding::Lf`] (including for text with no newlines).
    pub fn detect(bytes: &[u8]) -> Self {
        let mut crlf = 0usize;
        let mut lf = 0usize;
        for index in memchr::memchr_iter(b'\n', bytes) {
            if index > 0 && bytes[index - 1] == b'\r' {
                crlf += 1;
            } else {
                lf += 1;
            }
        }
        if crlf > lf { Self::Crlf } else { Self::Lf }
    }

    /// The byte sequence for this ending.
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            Self::Lf => b"\n",
            Self::Crlf => b"\r\n",
        }
    }

    /// Rewrite every line terminator in `bytes` (`\n` or `\r\n`) to this ending.
    pub fn apply(self, bytes: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(bytes.len() + bytes.len() / 32);
        let mut last = 0;
        for index in memchr::memchr_iter(b'\n', bytes) {
            let content_end = if index > last && bytes[index - 1] == b'\r' {
                index - 1
            } else {
                index
            };
            out.extend_from_slice(&bytes[last..content_end]);
            out.extend_from_slice(self.as_bytes());
            last = index + 1;
        }
        out.extend_from_slice(&bytes[last..]);
        out
    }
}

/// How line endings are written when bytes are materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEndingPolicy {
    /// Write terminators exactly as stored.
    #[default]
    Preserve,
    /// Normalize every terminator to the style detected on open.
    Detected,
    /// Normalize every terminator to the given style.
    Force(LineEnding),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_dominant_style() {
        assert_eq!(LineEnding::detect(b"no newline"), LineEnding::Lf);
        assert_eq!(LineEnding::detect(b"a\nb\n"), LineEnding::Lf);
        assert_eq!(LineEnding::detect(b"a\r\nb\r\n"), LineEnding::Crlf);
        assert_eq!(LineEnding::detect(b"a\r\nb\r\nc\n"), LineEnding::Crlf);
        assert_eq!(LineEnding::detect(b"a\r\nb\nc\n"), LineEnding::Lf);
        // A tie keeps LF.
        assert_eq!(LineEnding::detect(b"a\r\nb\n"), LineEnding::Lf);
    }

    #[test]
    fn test_apply_normalizes_mixed_endings() {
        let mixed = b"a\r\nb\nc";
        assert_eq!(LineEnding::Lf.apply(mixed), b"a\nb\nc".to_vec());
        assert_eq!(LineEnding::Crlf.apply(mixed), b"a\r\nb\r\nc".to_vec());
        assert_eq!(LineEnding::Crlf.apply(b"\n\n"), b"\r\n\r\n".to_vec());
    }

    #[test]
    fn test_lone_carriage_return_is_content() {
        assert_eq!(LineEnding::Lf.apply(b"a\rb\r\n"), b"a\rb\n".to_vec());
    }
}
