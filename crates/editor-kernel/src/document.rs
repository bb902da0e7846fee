//! The editing core of one buffer.
//!
//! A [`Document`] owns the [`TextStore`], its [`UndoTree`] and the
//! [`CoreConfig`]. Every mutation goes through it, so each edit is recorded
//! exactly once and the current text is always the current history node.
//!
//! # Example
//!
//! ```rust
//! use editor_kernel::Document;
//!
//! let mut doc = Document::from_str("Hello");
//! doc.insert(5, b", World").unwrap();
//! doc.transaction("wrap", |tx| {
//!     tx.insert(0, b"<")?;
//!     let end = tx.state().len();
//!     tx.insert(end, b">")
//! })
//! .unwrap();
//! assert_eq!(doc.text_lossy(), "<Hello, World>");
//!
//! doc.undo().unwrap();
//! assert_eq!(doc.text_lossy(), "Hello, World");
//! ```

use std::ops::Range;

use crate::config::CoreConfig;
use crate::error::{ConfigError, TextError, UndoError};
use crate::history::{Change, Edit, HistoryEntry, UndoNodeId, UndoTree};
use crate::text::{LineEnding, LineEndingPolicy, Position, TextState, TextStore, TextView};

/// Node count below which the text store is never compacted automatically.
const COMPACT_MIN_NODES: usize = 1 << 16;

/// Text, history and configuration of one buffer.
///
/// Text states returned by a document stay readable until the next
/// compaction. Compaction runs on [`Document::compact`],
/// [`Document::clear_history`], and automatically once the store has doubled
/// in size since the last one. The states held by the history are kept.
#[derive(Debug)]
pub struct Document {
    store: TextStore,
    history: UndoTree,
    config: CoreConfig,
    compact_at: usize,
}

impl Document {
    /// Open `bytes` with `config`.
    pub fn open(bytes: impl Into<Vec<u8>>, config: CoreConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let (store, state) = TextStore::open(bytes);
        let history = UndoTree::new(state, config.undo.clone());
        Ok(Self {
            store,
            history,
            config,
            compact_at: COMPACT_MIN_NODES,
        })
    }

    /// An empty document.
    pub fn new(config: CoreConfig) -> Result<Self, ConfigError> {
        Self::open(Vec::new(), config)
    }

    /// Open `text` with the default configuration.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(text: &str) -> Self {
        let config = CoreConfig::default();
        let (store, state) = TextStore::open(text);
        let history = UndoTree::new(state, config.undo.clone());
        Self {
            store,
            history,
            config,
            compact_at: COMPACT_MIN_NODES,
        }
    }

    /// Current text state.
    pub fn state(&self) -> TextState {
        self.history.current_state()
    }

    /// Read view of the current text, usable as a regex haystack.
    pub fn view(&self) -> TextView<'_> {
        self.store.view(self.state())
    }

    /// The backing store, for queries on any state.
    pub fn store(&self) -> &TextStore {
        &self.store
    }

    /// The undo history.
    pub fn history(&self) -> &UndoTree {
        &self.history
    }

    /// Active configuration.
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Line ending detected on open.
    pub fn line_ending(&self) -> LineEnding {
        self.store.line_ending()
    }

    /// Current text as a `String`, replacing invalid UTF-8.
    pub fn text_lossy(&self) -> String {
        self.store.to_string_lossy(&self.state())
    }

    /// Current text for saving.
    pub fn bytes(&self, policy: LineEndingPolicy) -> Vec<u8> {
        self.store.bytes(&self.state(), policy)
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.state().len()
    }

    /// Whether the document is empty.
    pub fn is_empty(&self) -> bool {
        self.state().is_empty()
    }

    /// Number of lines.
    pub fn line_count(&self) -> usize {
        self.state().line_count()
    }

    /// Line/column of `offset` in the current text.
    pub fn position(&self, offset: usize) -> Result<Position, TextError> {
        self.store.offset_to_line_col(&self.state(), offset)
    }

    /// Display column of `offset`, using the configured tab width.
    pub fn display_column(&self, offset: usize) -> Result<usize, TextError> {
        self.store
            .display_column(&self.state(), offset, self.config.tab_width)
    }

    /// Insert `bytes` at `offset` as one undo step.
    pub fn insert(&mut self, offset: usize, bytes: &[u8]) -> Result<TextState, TextError> {
        self.transaction_inner(None, |tx| tx.insert(offset, bytes))?;
        Ok(self.state())
    }

    /// Delete `range` as one undo step, returning the removed bytes.
    pub fn delete(&mut self, range: Range<usize>) -> Result<Vec<u8>, TextError> {
        self.transaction_inner(None, |tx| tx.delete(range))
    }

    /// Replace `range` with `bytes` as one undo step.
    pub fn replace(&mut self, range: Range<usize>, bytes: &[u8]) -> Result<TextState, TextError> {
        self.transaction_inner(None, |tx| tx.replace(range, bytes))?;
        Ok(self.state())
    }

    /// Run `f` as a single undo step labelled `label`.
    ///
    /// Nothing is recorded if `f` makes no edits. If `f` fails, the document
    /// stays at the state it had before the call.
    pub fn transaction<T, E>(
        &mut self,
        label: &str,
        f: impl FnOnce(&mut Transaction<'_>) -> Result<T, E>,
    ) -> Result<T, E> {
        self.transaction_inner(Some(label), f)
    }

    fn transaction_inner<T, E>(
        &mut self,
        label: Option<&str>,
        f: impl FnOnce(&mut Transaction<'_>) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut tx = Transaction {
            store: &mut self.store,
            state: self.history.current_state(),
            edits: Vec::new(),
        };
        let value = f(&mut tx)?;
        let Transaction { state, edits, .. } = tx;
        if !edits.is_empty() {
            let change = Change {
                edits,
                label: label.map(str::to_string),
            };
            self.history.record(change, state);
            self.maybe_compact();
        }
        Ok(value)
    }

    /// Record a prepared change, applying it to the current text.
    pub(crate) fn apply_change(&mut self, change: Change) -> Result<TextState, TextError> {
        let current = self.state();
        let state = change.apply(&mut self.store, current)?;
        if !change.is_empty() {
            self.history.record(change, state);
            self.maybe_compact();
        }
        Ok(self.state())
    }

    /// Free text nodes no longer reachable from the history.
    ///
    /// Returns the number of nodes freed. States obtained earlier from this
    /// document, other than through the history, become invalid.
    pub fn compact(&mut self) -> usize {
        let freed = self.store.compact(self.history.states_mut());
        self.compact_at = COMPACT_MIN_NODES.max(self.store.node_count() * 2);
        freed
    }

    fn maybe_compact(&mut self) {
        if self.store.node_count() >= self.compact_at {
            self.compact();
        }
    }

    /// Step back to the parent history node.
    pub fn undo(&mut self) -> Result<TextState, UndoError> {
        self.history.undo(&mut self.store)?;
        self.maybe_compact();
        Ok(self.state())
    }

    /// Step forward along the redo pointer.
    pub fn redo(&mut self) -> Result<TextState, UndoError> {
        self.history
            .redo(&mut self.store)?
            .ok_or(UndoError::NothingToRedo)?;
        self.maybe_compact();
        Ok(self.state())
    }

    /// Choose which branch the next redo follows.
    pub fn goto_branch(&mut self, index: usize) -> Result<(), UndoError> {
        self.history.goto_branch(index)
    }

    /// Jump to any history node.
    pub fn goto(&mut self, node: UndoNodeId) -> Result<TextState, UndoError> {
        self.history.goto(node, &mut self.store)?;
        self.maybe_compact();
        Ok(self.state())
    }

    /// Rebuild the text of any history node without moving to it.
    pub fn state_at(&mut self, node: UndoNodeId) -> Result<TextState, UndoError> {
        self.history.state_at(node, &mut self.store)
    }

    /// Flattened history for visualization.
    pub fn history_snapshot(&self) -> Vec<HistoryEntry> {
        self.history.history_snapshot()
    }

    /// Drop all history, keeping the current text, and free the text nodes
    /// only the old history used.
    pub fn clear_history(&mut self) {
        let state = self.state();
        self.history.clear(state);
        self.compact();
    }
}

/// Edits collected into one undo step by [`Document::transaction`].
#[derive(Debug)]
pub struct Transaction<'a> {
    store: &'a mut TextStore,
    state: TextState,
    edits: Vec<Edit>,
}

impl Transaction<'_> {
    /// Text state after the edits made so far.
    pub fn state(&self) -> TextState {
        self.state
    }

    /// Insert `bytes` at `offset`.
    pub fn insert(&mut self, offset: usize, bytes: &[u8]) -> Result<TextState, TextError> {
        self.state = self.store.insert(self.state, offset, bytes)?;
        if !bytes.is_empty() {
            self.edits.push(Edit::Insert {
                offset,
                text: bytes.to_vec(),
            });
        }
        Ok(self.state)
    }

    /// Delete `range`, returning the removed bytes.
    pub fn delete(&mut self, range: Range<usize>) -> Result<Vec<u8>, TextError> {
        let offset = range.start;
        let (state, removed) = self.store.delete(self.state, range)?;
        self.state = state;
        if !removed.is_empty() {
            self.edits.push(Edit::Delete {
                offset,
                removed: removed.clone(),
            });
        }
        Ok(removed)
    }

    /// Replace `range` with `bytes`.
    pub fn replace(&mut self, range: Range<usize>, bytes: &[u8]) -> Result<TextState, TextError> {
        let offset = range.start;
        self.delete(range)?;
        self.insert(offset, bytes)
    }

    /// Read view of the transaction's current text.
    pub fn view(&self) -> TextView<'_> {
        self.store.view(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_edit_is_one_undo_step() {
        let mut doc = Document::from_str("abc");
        doc.insert(3, b"def").unwrap();
        assert_eq!(doc.delete(0..2).unwrap(), b"ab");
        doc.replace(0..1, b"C").unwrap();
        assert_eq!(doc.text_lossy(), "Cdef");
        assert_eq!(doc.history().node_count(), 4);

        doc.undo().unwrap();
        assert_eq!(doc.text_lossy(), "cdef");
        doc.undo().unwrap();
        assert_eq!(doc.text_lossy(), "abcdef");
        doc.undo().unwrap();
        assert_eq!(doc.text_lossy(), "abc");
        assert_eq!(doc.undo(), Err(UndoError::NothingToUndo));
        doc.redo().unwrap();
        assert_eq!(doc.text_lossy(), "abcdef");
    }

    #[test]
    fn test_noop_edits_record_nothing() {
        let mut doc = Document::from_str("abc");
        doc.insert(1, b"").unwrap();
        doc.delete(2..2).unwrap();
        doc.transaction("empty", |_| Ok::<_, TextError>(())).unwrap();
        assert_eq!(doc.history().node_count(), 1);
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let mut doc = Document::from_str("abc");
        let result = doc.transaction("broken", |tx| {
            tx.insert(0, b"xyz")?;
            tx.delete(10..20)
        });
        assert!(result.is_err());
        assert_eq!(doc.text_lossy(), "abc");
        assert_eq!(doc.history().node_count(), 1);
    }

    #[test]
    fn test_transaction_undoes_as_a_unit() {
        let mut doc = Document::from_str("one two");
        doc.transaction("swap", |tx| {
            tx.replace(4..7, b"one")?;
            tx.replace(0..3, b"two")
        })
        .unwrap();
        assert_eq!(doc.text_lossy(), "two one");
        assert_eq!(doc.history_snapshot()[1].summary, "swap");
        doc.undo().unwrap();
        assert_eq!(doc.text_lossy(), "one two");
        assert_eq!(doc.redo().unwrap().len(), 7);
        assert_eq!(doc.text_lossy(), "two one");
        assert_eq!(doc.redo(), Err(UndoError::NothingToRedo));
    }

    #[test]
    fn test_clear_history_frees_text_nodes() {
        let mut doc = Document::from_str("base text\n");
        for i in 0..200 {
            doc.insert(i % 7, b"xy").unwrap();
            doc.delete(0..1).unwrap();
        }
        for _ in 0..50 {
            doc.undo().unwrap();
        }
        let text = doc.text_lossy();
        let before = doc.store().node_count();

        doc.clear_history();
        assert!(doc.store().node_count() < before / 4);
        assert_eq!(doc.text_lossy(), text);

        // The compacted store keeps working.
        doc.insert(0, b">").unwrap();
        doc.undo().unwrap();
        assert_eq!(doc.text_lossy(), text);
    }

    #[test]
    fn test_compact_keeps_history_states() {
        let mut doc = Document::from_str("one");
        doc.insert(3, b" two").unwrap();
        doc.insert(7, b" three").unwrap();
        doc.undo().unwrap();
        doc.undo().unwrap();
        assert!(doc.compact() > 0);
        assert_eq!(doc.text_lossy(), "one");
        doc.redo().unwrap();
        let first = doc.history().current();
        doc.redo().unwrap();
        assert_eq!(doc.text_lossy(), "one two three");
        let state = doc.state_at(first).unwrap();
        assert_eq!(doc.store().to_string_lossy(&state), "one two");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = CoreConfig::default();
        config.tab_width = 0;
        assert!(Document::new(config).is_err());
    }

    #[test]
    fn test_display_column_uses_tab_width() {
        let mut config = CoreConfig::default();
        config.tab_width = 8;
        let doc = Document::open("\tx", config).unwrap();
        assert_eq!(doc.display_column(1), Ok(8));
        assert_eq!(doc.position(1), Ok(Position::new(0, 1)));
    }
}
