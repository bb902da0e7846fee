//! Read access to one text version: chunk iteration and a regex haystack.

use std::cell::Cell;
use std::ops::Range;

use monster_regex::Haystack;
use monster_regex::haystack::{decode_last_utf8, decode_utf8};

use super::store::{TextState, TextStore};
use super::tree::{Arena, Buffers, NodeId};

/// Iterator over borrowed piece slices covering a byte range.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    arena: &'a Arena,
    buffers: &'a Buffers,
    root: Option<NodeId>,
    pos: usize,
    end: usize,
}

impl<'a> Chunks<'a> {
    pub(crate) fn new(
        arena: &'a Arena,
        buffers: &'a Buffers,
        root: Option<NodeId>,
        range: Range<usize>,
    ) -> Self {
        Self {
            arena,
            buffers,
            root,
            pos: range.start,
            end: range.end.min(arena.len(root)),
        }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.end {
            return None;
        }
        let (start, piece) = self.arena.piece_at(self.root, self.pos)?;
        let bytes = self.buffers.bytes(&piece);
        let from = self.pos - start;
        let to = piece.len.min(self.end - start);
        self.pos = start + to;
        Some(&bytes[from..to])
    }
}

/// A [`TextState`] borrowed together with its store.
///
/// Implements [`Haystack`] so the regex engine can search the piece tree
/// directly. The most recently visited piece is cached, which keeps the
/// mostly-forward access pattern of a search close to O(1) per character.
#[derive(Debug, Clone)]
pub struct TextView<'a> {
    store: &'a TextStore,
    state: TextState,
    cache: Cell<Option<(usize, &'a [u8])>>,
}

impl<'a> TextView<'a> {
    pub(crate) fn new(store: &'a TextStore, state: TextState) -> Self {
        Self {
            store,
            state,
            cache: Cell::new(None),
        }
    }

    /// The viewed state.
    pub fn state(&self) -> TextState {
        self.state
    }

    fn chunk(&self, pos: usize) -> Option<(usize, &'a [u8])> {
        if let Some((start, bytes)) = self.cache.get()
            && (start..start + bytes.len()).contains(&pos)
        {
            return Some((start, bytes));
        }
        let found = self.store.chunk_at(&self.state, pos)?;
        self.cache.set(Some(found));
        Some(found)
    }

    /// Copy up to four bytes of `range` into a small buffer, crossing pieces.
    fn gather(&self, range: Range<usize>) -> ([u8; 4], usize) {
        let mut buf = [0u8; 4];
        let mut filled = 0;
        let mut pos = range.start;
        while pos < range.end && filled < buf.len() {
            let Some((start, bytes)) = self.chunk(pos) else {
                break;
            };
            let take = (bytes.len() - (pos - start))
                .min(range.end - pos)
                .min(buf.len() - filled);
            buf[filled..filled + take].copy_from_slice(&bytes[pos - start..pos - start + take]);
            filled += take;
            pos += take;
        }
        (buf, filled)
    }
}

impl Haystack for TextView<'_> {
    fn len(&self) -> usize {
        self.state.len()
    }

    fn char_at(&self, pos: usize) -> Option<(char, usize)> {
        let (start, bytes) = self.chunk(pos)?;
        let local = &bytes[pos - start..];
        if local[0] < 0x80 {
            return Some((local[0] as char, 1));
        }
        if local.len() >= 4 {
            return decode_utf8(local);
        }
        let (buf, filled) = self.gather(pos..(pos + 4).min(self.state.len()));
        decode_utf8(&buf[..filled])
    }

    fn char_before(&self, pos: usize) -> Option<(char, usize)> {
        if pos == 0 || pos > self.state.len() {
            return None;
        }
        let (start, bytes) = self.chunk(pos - 1)?;
        if bytes[pos - 1 - start] < 0x80 {
            return Some((bytes[pos - 1 - start] as char, 1));
        }
        let (buf, filled) = self.gather(pos.saturating_sub(4)..pos);
        decode_last_utf8(&buf[..filled])
    }

    fn line_of(&self, pos: usize) -> usize {
        let pos = pos.min(self.state.len());
        self.store.line_of_offset(&self.state, pos).unwrap_or(0)
    }

    fn line_start(&self, pos: usize) -> usize {
        let line = self.line_of(pos);
        self.store.line_start(&self.state, line).unwrap_or(0)
    }

    fn raw_bytes(&self, range: Range<usize>) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(range.len());
        for chunk in self.store.chunks(&self.state, range) {
            bytes.extend_from_slice(chunk);
        }
        bytes
    }

    fn text(&self, range: Range<usize>) -> String {
        String::from_utf8_lossy(&self.raw_bytes(range)).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a store whose text is split into many single-byte pieces.
    fn fragmented(text: &str) -> (TextStore, TextState) {
        let (mut store, mut state) = TextStore::open("");
        // Inserting in reverse order at offset 0 keeps pieces from merging.
        for (index, byte) in text.bytes().enumerate().rev() {
            state = store.insert(state, 0, &[byte]).unwrap();
            assert_eq!(state.len(), text.len() - index);
        }
        (store, state)
    }

    #[test]
    fn test_chars_across_piece_boundaries() {
        let (store, state) = fragmented("a你👋\nz");
        let view = store.view(state);
        assert_eq!(view.char_at(0), Some(('a', 1)));
        assert_eq!(view.char_at(1), Some(('你', 3)));
        assert_eq!(view.char_at(4), Some(('👋', 4)));
        assert_eq!(view.char_before(8), Some(('👋', 4)));
        assert_eq!(view.char_before(4), Some(('你', 3)));
        assert_eq!(view.char_at(10), None);
        assert_eq!(view.char_before(0), None);
    }

    #[test]
    fn test_line_helpers_use_tree() {
        let (store, state) = TextStore::open("one\ntwo\nthree");
        let view = store.view(state);
        assert_eq!(view.line_of(10), 2);
        assert_eq!(view.line_start(10), 8);
        assert_eq!(view.column_of(10), 2);
        assert_eq!(view.text(4..7), "two");
    }

    #[test]
    fn test_chunks_cover_range() {
        let (store, state) = fragmented("hello");
        let chunks: Vec<&[u8]> = store.chunks(&state, 1..4).collect();
        assert_eq!(chunks, vec![&b"e"[..], &b"l"[..], &b"l"[..]]);
        assert_eq!(store.chunks(&state, 3..3).count(), 0);
    }

    #[test]
    fn test_regex_searches_view() {
        let (store, state) = fragmented("foo bar baz");
        let view = store.view(state);
        let re = monster_regex::Regex::with_flags("ba.", "g").unwrap();
        let found: Vec<_> = re
            .find_iter(&view, monster_regex::MatchContext::default())
            .map(|m| m.unwrap().range())
            .collect();
        assert_eq!(found, vec![4..7, 8..11]);
    }
}
