//! Error types for the editing kernel.

use monster_regex::{MatchError, PatternError};
use thiserror::Error;

use crate::history::UndoNodeId;

/// Text storage errors. Most indicate a caller passed a position outside the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TextError {
    #[error("offset {offset} is past the end of the text (length {len})")]
    /// A byte offset past the logical length.
    OffsetOutOfRange {
        /// Offending offset.
        offset: usize,
        /// Text length at the time of the call.
        len: usize,
    },
    #[error("invalid range {start}..{end} for text of length {len}")]
    /// A range whose end precedes its start or exceeds the length.
    InvalidRange {
        /// Range start.
        start: usize,
        /// Range end.
        end: usize,
        /// Text length at the time of the call.
        len: usize,
    },
    #[error("line {line} is out of range (line count {line_count})")]
    /// A line index at or past the line count.
    LineOutOfRange {
        /// Offending line index.
        line: usize,
        /// Number of lines in the text.
        line_count: usize,
    },
    #[error("text storage is full ({nodes} tree nodes)")]
    /// The node arena cannot address another node.
    StorageFull {
        /// Nodes held when the edit was refused.
        nodes: usize,
    },
}

/// Undo tree errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UndoError {
    #[error("nothing to undo")]
    /// The current node is the root.
    NothingToUndo,
    #[error("nothing to redo")]
    /// The current node has no children.
    NothingToRedo,
    #[error("undo node {0:?} does not exist")]
    /// A node id that does not belong to this tree.
    InvalidNode(UndoNodeId),
    #[error("branch {index} does not exist (node has {branches} branches)")]
    /// A branch index past the current node's child count.
    InvalidBranch {
        /// Requested branch.
        index: usize,
        /// Number of children of the current node.
        branches: usize,
    },
    #[error(transparent)]
    /// Replaying a recorded edit failed; the tree no longer matches the text.
    Text(#[from] TextError),
}

/// Search and replace errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("invalid pattern: {0}")]
    /// The pattern failed to compile.
    Pattern(#[from] PatternError),
    #[error(transparent)]
    /// The matcher exhausted its backtracking budget.
    TooComplex(#[from] MatchError),
    #[error(transparent)]
    /// Applying a replacement failed.
    Text(#[from] TextError),
    #[error("no previous search to repeat")]
    /// `repeat` was called before any search.
    NoPreviousSearch,
}

impl SearchError {
    /// Whether this error should be shown to the user who typed the pattern.
    ///
    /// Pattern syntax and budget errors are user-facing; the rest indicate a caller bug.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::Pattern(_) | Self::TooComplex(_) | Self::NoPreviousSearch
        )
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    /// The TOML source is malformed or has mistyped fields.
    Parse(#[from] toml::de::Error),
    #[error("invalid value for `{field}`: {reason}")]
    /// A field has an out-of-range value.
    Invalid {
        /// Dotted field path, e.g. `undo.checkpoint_interval`.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}
