#![warn(missing_docs)]
//! Monster Regex - Vim-flavoured backtracking pattern matcher
//!
//! # Overview
//!
//! `monster-regex` compiles Vim-style search patterns into a backtracking
//! program and runs it over any [`Haystack`], a random-access UTF-8 character
//! source. Strings implement it directly; editor buffers implement it over
//! their own storage so searches never have to materialize the text.
//!
//! # Syntax
//!
//! - Literals, `.` (newline only with flag `s`), `* + ? {n} {n,m} {n,} {,m}` and lazy forms
//! - `\d \w \s` plus Vim classes `\l \u \x \o \h \p \a`; uppercase forms are complements
//! - Sets `[...]`, `[^...]`; `]` is literal first in the set or as `\]`
//! - Anchors `^ $ \< \> \b`, match-span markers `\zs` / `\ze`
//! - Position anchors `\%23l`, `\%<5c`, `\%>2l`, `\%.l`, `\%.c`, `\%#` (need a [`MatchContext`])
//! - Groups `(...)`, `(?<name>...)`, `(?:...)`, backreferences `\0`..`\9`
//! - Lookaround `(?>=...)`, `(?>!...)`, `(?<=...)`, `(?<!...)`
//!
//! Flags (`i c m s x g u`, see [`Flags`]) default to smartcase: a pattern
//! without uppercase literals ignores case.
//!
//! # Quick Start
//!
//! ```rust
//! use monster_regex::{expand, Regex};
//!
//! let re = Regex::with_flags("(\\w+)@(\\w+)", "g").unwrap();
//! let m = re.find("mail bob@example now").unwrap().unwrap();
//! assert_eq!(m.range(), 5..16);
//! assert_eq!(expand("\\2:\\1", &m, "mail bob@example now"), "example:bob");
//! ```
//!
//! Matching is bounded: each attempt may backtrack at most
//! [`RegexBuilder::backtrack_limit`] times before failing with
//! [`MatchError::BacktrackLimitExceeded`].

pub mod ast;
mod compile;
pub mod error;
mod exec;
pub mod flags;
pub mod haystack;
mod matcher;
pub mod parse;
pub mod replace;

pub use error::{MatchError, PatternError, PatternErrorKind};
pub use flags::Flags;
pub use haystack::Haystack;
pub use matcher::{DEFAULT_BACKTRACK_LIMIT, FindIter, Match, MatchContext, Regex, RegexBuilder};
pub use replace::{expand, expand_bytes};
