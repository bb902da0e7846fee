//! Line iteration.

use std::ops::Range;

use super::store::{TextState, TextStore};

/// Byte span of one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSpan {
    /// Zero-based line index
    pub index: usize,
    /// Offset of the first byte of the line
    pub start: usize,
    /// End of the line content, before `\n` or `\r\n`
    pub end: usize,
    /// End including the terminator (equals `end` on the last line)
    pub end_with_newline: usize,
}

impl LineSpan {
    /// Range of the line content.
    pub fn content(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Whether the line has a terminator.
    pub fn has_newline(&self) -> bool {
        self.end_with_newline > self.end
    }
}

/// Lazy iterator over [`LineSpan`]s, created by [`TextStore::lines`].
#[derive(Debug, Clone)]
pub struct Lines<'a> {
    store: &'a TextStore,
    state: TextState,
    next: usize,
}

impl<'a> Lines<'a> {
    pub(crate) fn new(store: &'a TextStore, state: TextState, from_line: usize) -> Self {
        Self {
            store,
            state,
            next: from_line,
        }
    }
}

impl Iterator for Lines<'_> {
    type Item = LineSpan;

    fn next(&mut self) -> Option<LineSpan> {
        if self.next >= self.state.line_count() {
            return None;
        }
        let span = self.store.line_span(&self.state, self.next).ok()?;
        self.next += 1;
        Some(span)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.state.line_count().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_from_middle() {
        let (store, state) = TextStore::open("a\r\nbb\n\nccc");
        let spans: Vec<_> = store.lines(&state, 1).collect();
        assert_eq!(
            spans,
            vec![
                LineSpan { index: 1, start: 3, end: 5, end_with_newline: 6 },
                LineSpan { index: 2, start: 6, end: 6, end_with_newline: 7 },
                LineSpan { index: 3, start: 7, end: 10, end_with_newline: 10 },
            ]
        );
        assert!(spans[0].has_newline());
        assert!(!spans[2].has_newline());
        assert_eq!(store.lines(&state, 9).count(), 0);
    }

    #[test]
    fn test_trailing_newline_yields_empty_last_line() {
        let (store, state) = TextStore::open("x\n");
        let spans: Vec<_> = store.lines(&state, 0).map(|span| span.content()).collect();
        assert_eq!(spans, vec![0..1, 2..2]);
    }
}
