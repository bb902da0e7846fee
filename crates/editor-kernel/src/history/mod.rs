//! Undo history.
//!
//! Every change is stored as a delta ([`Change`]) on a node of an
//! [`UndoTree`]; periodic checkpoints keep whole [`TextState`](crate::text::TextState)
//! handles so rebuilding any node replays a bounded number of deltas.
//! Because text states share structure, a checkpoint costs one handle, not
//! a copy of the text.

mod edit;
mod tree;

pub use edit::{Change, Edit};
pub use tree::{HistoryEntry, UndoNode, UndoNodeId, UndoTree};
