//! Text storage.
//!
//! A [`TextStore`] owns two byte buffers: the original file contents, which
//! are never modified, and an append-only add buffer that receives every
//! inserted byte. A version of the text is a [`TextState`]: a root in a
//! persistent, balanced tree of pieces referencing those buffers. Each node
//! caches the byte and newline counts of its subtree, so offset and line
//! lookups are O(log n), and edits copy only the path they touch.
//!
//! ```
//! use editor_kernel::text::TextStore;
//!
//! let (mut store, v0) = TextStore::open("hello\nworld");
//! let v1 = store.insert(v0, 5, b",").unwrap();
//! assert_eq!(store.to_string_lossy(&v1), "hello,\nworld");
//! assert_eq!(store.to_string_lossy(&v0), "hello\nworld");
//! assert_eq!(store.line_start(&v1, 1), Ok(7));
//! ```

pub mod grapheme;
mod line_ending;
mod lines;
mod piece;
mod store;
mod tree;
mod view;

pub use grapheme::GraphemeCell;
pub use line_ending::{LineEnding, LineEndingPolicy};
pub use lines::{LineSpan, Lines};
pub use store::{Position, TextState, TextStore};
pub use view::{Chunks, TextView};
