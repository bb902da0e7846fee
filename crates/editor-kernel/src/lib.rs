#![warn(missing_docs)]
//! Editing kernel for a modal terminal editor.
//!
//! # Overview
//!
//! - [`text`]: a persistent rope over a piece table. Every edit yields a new
//!   [`TextState`] that shares unchanged subtrees with the old one.
//! - [`history`]: a branching undo tree of reversible deltas with periodic
//!   checkpoints.
//! - [`search`]: find/replace driven by the `monster-regex` engine, with
//!   replacements recorded as single undo steps.
//! - [`Document`]: the object that ties one buffer's text, history and
//!   configuration together.
//!
//! The crate is synchronous and single-threaded. It logs through `tracing`
//! and never installs a subscriber.
//!
//! # Example
//!
//! ```rust
//! use editor_kernel::{Document, MatchContext, SearchConfig, SearchController};
//!
//! let mut doc = Document::from_str("let x = 1;\nlet y = 2;\n");
//! let mut search = SearchController::new(SearchConfig::default());
//! let re = search.compile("\\<let\\>", "").unwrap();
//!
//! let hit = search
//!     .find_next(&doc.view(), &re, 1, &MatchContext::default())
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(hit.matched.range(), 11..14);
//!
//! doc.replace(hit.matched.range(), b"const").unwrap();
//! assert_eq!(doc.text_lossy(), "let x = 1;\nconst y = 2;\n");
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod history;
pub mod search;
pub mod text;

pub use config::{CoreConfig, SearchConfig, UndoConfig};
pub use document::{Document, Transaction};
pub use error::{ConfigError, SearchError, TextError, UndoError};
pub use history::{Change, Edit, HistoryEntry, UndoNodeId, UndoTree};
pub use monster_regex::{Match, MatchContext, Regex};
pub use search::{Direction, ReplaceOutcome, SearchController, SearchHit};
pub use text::{LineEnding, LineEndingPolicy, LineSpan, Position, TextState, TextStore, TextView};
