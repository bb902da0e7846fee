//! The text store: two append-only buffers plus a persistent piece tree.

use std::ops::Range;

use crate::error::TextError;

use super::grapheme::{self, GraphemeCell};
use super::line_ending::{LineEnding, LineEndingPolicy};
use super::lines::{LineSpan, Lines};
use super::piece::{BufferSource, Piece};
use super::tree::{Arena, Buffers, NodeId};
use super::view::{Chunks, TextView};

/// An immutable version of the text.
///
/// States are cheap `Copy` handles into their [`TextStore`]; edits return new
/// states and never invalidate old ones. Only [`TextStore::compact`] does,
/// for every state it was not handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextState {
    pub(crate) root: Option<NodeId>,
    generation: u32,
    len: usize,
    newlines: usize,
}

impl TextState {
    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the text is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of lines (newlines + 1).
    pub fn line_count(&self) -> usize {
        self.newlines + 1
    }

    /// Whether two states share the same root, meaning they are the same version.
    pub fn same_version(&self, other: &TextState) -> bool {
        self.root == other.root && self.generation == other.generation
    }
}

/// Position in the text (line and column, zero-based).
///
/// `column` counts Unicode scalar values from the start of the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Position {
    /// Zero-based line index
    pub line: usize,
    /// Zero-based character column
    pub column: usize,
}

impl Position {
    /// Create a new position
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Owner of all text versions of one document.
#[derive(Debug, Default)]
pub struct TextStore {
    buffers: Buffers,
    arena: Arena,
    /// Bumped by every compaction
    generation: u32,
    line_ending: LineEnding,
}

impl TextStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `bytes` as a single original piece, detecting the dominant line ending.
    ///
    /// Content is not normalized; `\r\n` stays in the buffer.
    pub fn open(bytes: impl Into<Vec<u8>>) -> (Self, TextState) {
        let original = bytes.into();
        let line_ending = LineEnding::detect(&original);
        let (arena, root) = if original.is_empty() {
            (Arena::default(), None)
        } else {
            let (arena, root) = Arena::single(Piece::new(BufferSource::Original, 0, &original));
            (arena, Some(root))
        };
        let store = Self {
            buffers: Buffers {
                original,
                add: Vec::new(),
            },
            arena,
            generation: 0,
            line_ending,
        };
        let state = store.state_from(root);
        tracing::debug!(len = state.len, ?line_ending, "opened text");
        (store, state)
    }

    fn state_from(&self, root: Option<NodeId>) -> TextState {
        TextState {
            root,
            generation: self.generation,
            len: self.arena.len(root),
            newlines: self.arena.newlines(root),
        }
    }

    /// Tree root of `state`.
    fn root(&self, state: &TextState) -> Option<NodeId> {
        debug_assert!(
            state.root.is_none() || state.generation == self.generation,
            "text state used after the store was compacted"
        );
        state.root
    }

    /// The empty state.
    pub fn empty_state(&self) -> TextState {
        self.state_from(None)
    }

    /// Line ending detected when the store was opened.
    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    /// Number of tree nodes currently held.
    pub fn node_count(&self) -> usize {
        self.arena.node_count()
    }

    /// Drop every tree node not reachable from `live`, rewriting those states
    /// to point into the compacted arena. Returns the number of nodes freed.
    ///
    /// Every state of this store that is not in `live` becomes invalid. The
    /// backing buffers are left alone.
    pub fn compact<'s>(&mut self, live: impl IntoIterator<Item = &'s mut TextState>) -> usize {
        let mut live: Vec<&mut TextState> = live.into_iter().collect();
        let (arena, remap) = self.arena.compact(live.iter().map(|state| &state.root));
        let freed = self.arena.node_count() - arena.node_count();
        self.arena = arena;
        self.generation = self.generation.wrapping_add(1);
        for state in live.iter_mut() {
            state.root = state.root.and_then(|id| remap[id.index()]);
            state.generation = self.generation;
        }
        tracing::debug!(freed, kept = self.arena.node_count(), "compacted text nodes");
        freed
    }

    /// Size of the add buffer in bytes.
    pub fn add_buffer_len(&self) -> usize {
        self.buffers.add.len()
    }

    fn check_offset(state: &TextState, offset: usize) -> Result<(), TextError> {
        if offset > state.len {
            return Err(TextError::OffsetOutOfRange {
                offset,
                len: state.len,
            });
        }
        Ok(())
    }

    fn check_range(state: &TextState, range: &Range<usize>) -> Result<(), TextError> {
        if range.start > range.end || range.end > state.len {
            return Err(TextError::InvalidRange {
                start: range.start,
                end: range.end,
                len: state.len,
            });
        }
        Ok(())
    }

    /// Insert `bytes` at `offset`, returning the new state.
    pub fn insert(
        &mut self,
        state: TextState,
        offset: usize,
        bytes: &[u8],
    ) -> Result<TextState, TextError> {
        Self::check_offset(&state, offset)?;
        if bytes.is_empty() {
            return Ok(state);
        }
        let start = self.buffers.add.len();
        self.buffers.add.extend_from_slice(bytes);
        let piece = Piece::new(BufferSource::Add, start, bytes);
        let (left, right) = self.arena.split(self.root(&state), offset, &self.buffers)?;
        let root = self.arena.insert_between(left, piece, right)?;
        Ok(self.state_from(Some(root)))
    }

    /// Delete `range`, returning the new state and the removed bytes.
    pub fn delete(
        &mut self,
        state: TextState,
        range: Range<usize>,
    ) -> Result<(TextState, Vec<u8>), TextError> {
        Self::check_range(&state, &range)?;
        if range.is_empty() {
            return Ok((state, Vec::new()));
        }
        let removed = self.slice(&state, range.clone())?;
        let (left, rest) = self.arena.split(self.root(&state), range.start, &self.buffers)?;
        let (_, right) = self.arena.split(rest, range.end - range.start, &self.buffers)?;
        let root = self.arena.concat(left, right)?;
        Ok((self.state_from(root), removed))
    }

    /// Replace `range` with `bytes`, returning the new state and the removed bytes.
    pub fn replace(
        &mut self,
        state: TextState,
        range: Range<usize>,
        bytes: &[u8],
    ) -> Result<(TextState, Vec<u8>), TextError> {
        let start = range.start;
        let (state, removed) = self.delete(state, range)?;
        let state = self.insert(state, start, bytes)?;
        Ok((state, removed))
    }

    /// Length in bytes.
    pub fn length(&self, state: &TextState) -> usize {
        state.len
    }

    /// Number of lines.
    pub fn line_count(&self, state: &TextState) -> usize {
        state.line_count()
    }

    fn check_line(state: &TextState, line: usize) -> Result<(), TextError> {
        if line >= state.line_count() {
            return Err(TextError::LineOutOfRange {
                line,
                line_count: state.line_count(),
            });
        }
        Ok(())
    }

    /// Byte offset of the start of `line`.
    pub fn line_start(&self, state: &TextState, line: usize) -> Result<usize, TextError> {
        Self::check_line(state, line)?;
        if line == 0 {
            return Ok(0);
        }
        let newline = self
            .arena
            .nth_newline(self.root(state), line, &self.buffers)
            .ok_or(TextError::LineOutOfRange {
                line,
                line_count: state.line_count(),
            })?;
        Ok(newline + 1)
    }

    /// Byte offset of the end of `line`'s content, excluding `\n` or `\r\n`.
    pub fn line_end(&self, state: &TextState, line: usize) -> Result<usize, TextError> {
        Ok(self.line_bounds(state, line)?.1)
    }

    /// `(start, content_end, end_with_newline)` of `line`.
    pub(crate) fn line_bounds(
        &self,
        state: &TextState,
        line: usize,
    ) -> Result<(usize, usize, usize), TextError> {
        let start = self.line_start(state, line)?;
        if line + 1 == state.line_count() {
            return Ok((start, state.len, state.len));
        }
        let newline = self
            .arena
            .nth_newline(self.root(state), line + 1, &self.buffers)
            .ok_or(TextError::LineOutOfRange {
                line,
                line_count: state.line_count(),
            })?;
        let content_end = if newline > start && self.byte_at(state, newline - 1) == Some(b'\r') {
            newline - 1
        } else {
            newline
        };
        Ok((start, content_end, newline + 1))
    }

    /// Zero-based line containing byte `offset`.
    pub fn line_of_offset(&self, state: &TextState, offset: usize) -> Result<usize, TextError> {
        Self::check_offset(state, offset)?;
        Ok(self.arena.newlines_before(self.root(state), offset, &self.buffers))
    }

    /// Snap `offset` back to the start of the UTF-8 sequence containing it.
    pub fn floor_char_boundary(&self, state: &TextState, offset: usize) -> usize {
        let mut offset = offset.min(state.len);
        let floor = offset.saturating_sub(3);
        while offset > floor && matches!(self.byte_at(state, offset), Some(b) if b & 0xC0 == 0x80) {
            offset -= 1;
        }
        offset
    }

    /// Convert a byte offset to a line/column position.
    ///
    /// Offsets inside a multi-byte sequence resolve to that character.
    pub fn offset_to_line_col(&self, state: &TextState, offset: usize) -> Result<Position, TextError> {
        Self::check_offset(state, offset)?;
        let offset = self.floor_char_boundary(state, offset);
        let line = self.line_of_offset(state, offset)?;
        let start = self.line_start(state, line)?;
        let column = self.char_count(state, start..offset);
        Ok(Position::new(line, column))
    }

    /// Convert a line/column position to a byte offset.
    ///
    /// The column clamps to the line's content; a line past the end is an error.
    pub fn line_col_to_offset(
        &self,
        state: &TextState,
        line: usize,
        column: usize,
    ) -> Result<usize, TextError> {
        let (start, content_end, _) = self.line_bounds(state, line)?;
        let view = self.view(*state);
        let mut offset = start;
        for _ in 0..column {
            if offset >= content_end {
                break;
            }
            match monster_regex::Haystack::char_at(&view, offset) {
                Some((_, width)) => offset += width,
                None => break,
            }
        }
        Ok(offset.min(content_end))
    }

    fn char_count(&self, state: &TextState, range: Range<usize>) -> usize {
        let mut count = 0;
        for chunk in self.chunks(state, range) {
            count += chunk.iter().filter(|&&b| b & 0xC0 != 0x80).count();
        }
        count
    }

    /// The byte at `offset`.
    pub fn byte_at(&self, state: &TextState, offset: usize) -> Option<u8> {
        let (start, piece) = self.arena.piece_at(self.root(state), offset)?;
        self.buffers.bytes(&piece).get(offset - start).copied()
    }

    /// The piece-sized chunk containing `offset`, with its absolute start.
    pub(crate) fn chunk_at(&self, state: &TextState, offset: usize) -> Option<(usize, &[u8])> {
        let (start, piece) = self.arena.piece_at(self.root(state), offset)?;
        Some((start, self.buffers.bytes(&piece)))
    }

    /// Borrowed slices covering `range`, in order.
    pub fn chunks(&self, state: &TextState, range: Range<usize>) -> Chunks<'_> {
        Chunks::new(&self.arena, &self.buffers, self.root(state), range)
    }

    /// Copy `range` out of the text.
    pub fn slice(&self, state: &TextState, range: Range<usize>) -> Result<Vec<u8>, TextError> {
        Self::check_range(state, &range)?;
        let mut out = Vec::with_capacity(range.len());
        for chunk in self.chunks(state, range) {
            out.extend_from_slice(chunk);
        }
        Ok(out)
    }

    /// Materialize the whole text, applying `policy` to line terminators.
    pub fn bytes(&self, state: &TextState, policy: LineEndingPolicy) -> Vec<u8> {
        let mut raw = Vec::with_capacity(state.len);
        for chunk in self.chunks(state, 0..state.len) {
            raw.extend_from_slice(chunk);
        }
        match policy {
            LineEndingPolicy::Preserve => raw,
            LineEndingPolicy::Detected => self.line_ending.apply(&raw),
            LineEndingPolicy::Force(ending) => ending.apply(&raw),
        }
    }

    /// The whole text as a `String`, replacing invalid UTF-8.
    pub fn to_string_lossy(&self, state: &TextState) -> String {
        String::from_utf8_lossy(&self.bytes(state, LineEndingPolicy::Preserve)).into_owned()
    }

    /// Lazy iterator over line spans starting at `from_line`.
    pub fn lines(&self, state: &TextState, from_line: usize) -> Lines<'_> {
        Lines::new(self, *state, from_line)
    }

    /// Span of a single line.
    pub fn line_span(&self, state: &TextState, line: usize) -> Result<LineSpan, TextError> {
        let (start, end, end_with_newline) = self.line_bounds(state, line)?;
        Ok(LineSpan {
            index: line,
            start,
            end,
            end_with_newline,
        })
    }

    /// Content of `line` (without terminator) as a `String`.
    pub fn line_text(&self, state: &TextState, line: usize) -> Result<String, TextError> {
        let (start, end, _) = self.line_bounds(state, line)?;
        Ok(String::from_utf8_lossy(&self.slice(state, start..end)?).into_owned())
    }

    /// Grapheme cells of `line`, with absolute byte offsets.
    ///
    /// Each byte of an invalid UTF-8 sequence is a cell of its own.
    pub fn graphemes(&self, state: &TextState, line: usize) -> Result<Vec<GraphemeCell>, TextError> {
        let (start, end, _) = self.line_bounds(state, line)?;
        Ok(grapheme::cells(self.slice(state, start..end)?, start))
    }

    /// Start of the grapheme cluster after the one containing `offset`.
    pub fn next_grapheme_boundary(&self, state: &TextState, offset: usize) -> Result<usize, TextError> {
        Self::check_offset(state, offset)?;
        let line = self.line_of_offset(state, offset)?;
        let (_, content_end, end_with_newline) = self.line_bounds(state, line)?;
        if offset >= content_end {
            return Ok(end_with_newline.max(offset));
        }
        let cells = self.graphemes(state, line)?;
        Ok(cells
            .iter()
            .map(|cell| cell.offset + cell.len)
            .find(|&end| end > offset)
            .unwrap_or(content_end))
    }

    /// Start of the grapheme cluster before `offset`.
    pub fn prev_grapheme_boundary(&self, state: &TextState, offset: usize) -> Result<usize, TextError> {
        Self::check_offset(state, offset)?;
        let line = self.line_of_offset(state, offset)?;
        let start = self.line_start(state, line)?;
        if offset == start {
            return match line {
                0 => Ok(0),
                _ => self.line_end(state, line - 1),
            };
        }
        let cells = self.graphemes(state, line)?;
        Ok(cells
            .iter()
            .map(|cell| cell.offset)
            .take_while(|&cell_start| cell_start < offset)
            .last()
            .unwrap_or(start))
    }

    /// Display column of `offset` within its line, expanding tabs to `tab_width`.
    pub fn display_column(
        &self,
        state: &TextState,
        offset: usize,
        tab_width: usize,
    ) -> Result<usize, TextError> {
        let line = self.line_of_offset(state, offset)?;
        let (start, end, _) = self.line_bounds(state, line)?;
        let bytes = self.slice(state, start..end)?;
        Ok(grapheme::display_column(bytes, offset.min(end) - start, tab_width))
    }

    /// Borrowed read view of `state`, usable as a regex haystack.
    pub fn view(&self, state: TextState) -> TextView<'_> {
        TextView::new(self, state)
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self, state: &TextState) {
        self.arena.check(state.root);
        let pieces = self.arena.pieces(state.root);
        assert!(pieces.iter().all(|(_, piece)| piece.len > 0), "empty piece in tree");
    }
}
