//! Reversible edit records.

use crate::error::TextError;
use crate::text::{TextState, TextStore};

/// Summaries quote the payload when it is at most this many characters.
const SUMMARY_CHARS: usize = 20;

/// A single reversible change to the text.
///
/// A delete stores the bytes it removed, so every edit can be inverted
/// without consulting the text it was applied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    /// `text` was inserted at `offset`.
    Insert {
        /// Byte offset of the insertion
        offset: usize,
        /// Inserted bytes
        text: Vec<u8>,
    },
    /// `removed` was deleted starting at `offset`.
    Delete {
        /// Byte offset of the deletion
        offset: usize,
        /// Removed bytes
        removed: Vec<u8>,
    },
}

impl Edit {
    /// Byte offset the edit starts at.
    pub fn offset(&self) -> usize {
        match self {
            Edit::Insert { offset, .. } | Edit::Delete { offset, .. } => *offset,
        }
    }

    /// Apply the edit to `state`.
    pub fn apply(&self, store: &mut TextStore, state: TextState) -> Result<TextState, TextError> {
        match self {
            Edit::Insert { offset, text } => store.insert(state, *offset, text),
            Edit::Delete { offset, removed } => {
                let (state, _) = store.delete(state, *offset..*offset + removed.len())?;
                Ok(state)
            }
        }
    }

    /// The edit that undoes this one.
    pub fn inverse(&self) -> Edit {
        match self {
            Edit::Insert { offset, text } => Edit::Delete {
                offset: *offset,
                removed: text.clone(),
            },
            Edit::Delete { offset, removed } => Edit::Insert {
                offset: *offset,
                text: removed.clone(),
            },
        }
    }

    /// Number of bytes inserted or removed.
    pub fn changed_bytes(&self) -> usize {
        match self {
            Edit::Insert { text, .. } => text.len(),
            Edit::Delete { removed, .. } => removed.len(),
        }
    }

    /// One-line description, e.g. `Insert "foo"` or `Delete 42 chars`.
    pub fn summary(&self) -> String {
        let (verb, bytes) = match self {
            Edit::Insert { text, .. } => ("Insert", text),
            Edit::Delete { removed, .. } => ("Delete", removed),
        };
        let text = String::from_utf8_lossy(bytes);
        let chars = text.chars().count();
        if chars <= SUMMARY_CHARS {
            format!("{verb} {text:?}")
        } else {
            format!("{verb} {chars} chars")
        }
    }
}

/// The payload of one undo node: edits applied in order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Change {
    /// Edits, each relative to the text produced by the previous one
    pub edits: Vec<Edit>,
    /// Optional description shown in history views
    pub label: Option<String>,
}

impl Change {
    /// A change holding one edit.
    pub fn single(edit: Edit) -> Self {
        Self {
            edits: vec![edit],
            label: None,
        }
    }

    /// A labelled change holding `edits`.
    pub fn labelled(label: impl Into<String>, edits: Vec<Edit>) -> Self {
        Self {
            edits,
            label: Some(label.into()),
        }
    }

    /// Whether the change holds no edits.
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Apply every edit in order.
    pub fn apply(&self, store: &mut TextStore, state: TextState) -> Result<TextState, TextError> {
        self.edits
            .iter()
            .try_fold(state, |state, edit| edit.apply(store, state))
    }

    /// Undo every edit, last first.
    pub fn revert(&self, store: &mut TextStore, state: TextState) -> Result<TextState, TextError> {
        self.edits
            .iter()
            .rev()
            .try_fold(state, |state, edit| edit.inverse().apply(store, state))
    }

    /// Total bytes inserted or removed.
    pub fn changed_bytes(&self) -> usize {
        self.edits.iter().map(Edit::changed_bytes).sum()
    }

    /// One-line description for history views.
    pub fn summary(&self) -> String {
        match (&self.label, self.edits.as_slice()) {
            (Some(label), _) => label.clone(),
            (None, [edit]) => edit.summary(),
            (None, edits) => format!("{} edits", edits.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverse_round_trip() {
        let (mut store, v0) = TextStore::open("hello world");
        let insert = Edit::Insert { offset: 5, text: b",".to_vec() };
        let v1 = insert.apply(&mut store, v0).unwrap();
        assert_eq!(store.to_string_lossy(&v1), "hello, world");
        let v2 = insert.inverse().apply(&mut store, v1).unwrap();
        assert_eq!(store.to_string_lossy(&v2), "hello world");
    }

    #[test]
    fn test_change_revert_runs_backwards() {
        let (mut store, v0) = TextStore::open("aa bb aaa");
        // Replacements recorded last-to-first so earlier offsets stay valid.
        let change = Change::labelled(
            "replace 2 matches",
            vec![
                Edit::Delete { offset: 6, removed: b"aaa".to_vec() },
                Edit::Insert { offset: 6, text: b"X".to_vec() },
                Edit::Delete { offset: 0, removed: b"aa".to_vec() },
                Edit::Insert { offset: 0, text: b"X".to_vec() },
            ],
        );
        let v1 = change.apply(&mut store, v0).unwrap();
        assert_eq!(store.to_string_lossy(&v1), "X bb X");
        let v2 = change.revert(&mut store, v1).unwrap();
        assert_eq!(store.to_string_lossy(&v2), "aa bb aaa");
        assert_eq!(change.changed_bytes(), 7);
        assert_eq!(change.summary(), "replace 2 matches");
    }

    #[test]
    fn test_summaries() {
        let short = Edit::Insert { offset: 0, text: b"a\nb".to_vec() };
        assert_eq!(short.summary(), r#"Insert "a\nb""#);
        let long = Edit::Delete { offset: 0, removed: vec![b'x'; 42] };
        assert_eq!(long.summary(), "Delete 42 chars");
        let change = Change { edits: vec![short.clone(), long], label: None };
        assert_eq!(change.summary(), "2 edits");
        assert_eq!(Change::single(short).summary(), r#"Insert "a\nb""#);
    }

    #[test]
    fn test_invalid_delete_is_reported() {
        let (mut store, v0) = TextStore::open("abc");
        let edit = Edit::Delete { offset: 2, removed: b"cd".to_vec() };
        assert!(edit.apply(&mut store, v0).is_err());
    }
}
