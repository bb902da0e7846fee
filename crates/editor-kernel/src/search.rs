//! Find and replace over a [`Document`].
//!
//! Searches run the `monster-regex` engine directly on the piece tree
//! through [`TextView`](crate::text::TextView). Replacements are recorded as
//! one [`Change`] so a single undo reverts them.
//!
//! ```
//! use editor_kernel::{Document, SearchConfig, SearchController};
//!
//! let mut doc = Document::from_str("aa bb aaa");
//! let mut search = SearchController::new(SearchConfig::default());
//! let re = search.compile("a+", "g").unwrap();
//! let outcome = search.replace_all(&mut doc, &re, "X").unwrap();
//! assert_eq!(outcome.count, 2);
//! assert_eq!(doc.text_lossy(), "X bb X");
//!
//! doc.undo().unwrap();
//! assert_eq!(doc.text_lossy(), "aa bb aaa");
//! ```

use monster_regex::{Flags, Haystack, Match, MatchContext, Regex, RegexBuilder};

use crate::config::SearchConfig;
use crate::document::Document;
use crate::error::SearchError;
use crate::history::{Change, Edit};
use crate::text::TextState;

/// Search direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Toward the end of the text
    #[default]
    Forward,
    /// Toward the start of the text
    Backward,
}

impl Direction {
    /// The opposite direction.
    pub fn reversed(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

/// A match found by [`SearchController::find_next`] or [`SearchController::find_prev`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// The match
    pub matched: Match,
    /// Whether the search wrapped around an end of the text to find it
    pub wrapped: bool,
}

/// Result of a replace operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaceOutcome {
    /// Document state after the replacement
    pub state: TextState,
    /// Number of matches replaced
    pub count: usize,
}

#[derive(Debug, Clone)]
struct LastSearch {
    regex: Regex,
    direction: Direction,
}

/// Stateful find/replace driver.
///
/// Remembers the last pattern and direction so `n`/`N` style repeats can be
/// served by [`SearchController::repeat`].
#[derive(Debug, Clone, Default)]
pub struct SearchController {
    config: SearchConfig,
    last: Option<LastSearch>,
}

impl SearchController {
    /// A controller with no search history.
    pub fn new(config: SearchConfig) -> Self {
        Self { config, last: None }
    }

    /// Active configuration.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// The pattern used by the last search or replace.
    pub fn last_pattern(&self) -> Option<&Regex> {
        self.last.as_ref().map(|last| &last.regex)
    }

    /// Compile `pattern` with the given flag letters and the configured budget.
    pub fn compile(&self, pattern: &str, flags: &str) -> Result<Regex, SearchError> {
        let flags = Flags::parse(flags)?;
        Ok(RegexBuilder::new(pattern)
            .flags(flags)
            .backtrack_limit(self.config.backtrack_limit)
            .build()?)
    }

    fn remember(&mut self, regex: &Regex, direction: Direction) {
        self.last = Some(LastSearch {
            regex: regex.clone(),
            direction,
        });
    }

    /// First match starting at or after `from`.
    ///
    /// With `wrap_scan`, a search that reaches the end without a match
    /// continues from the start of the text and reports `wrapped`.
    pub fn find_next<H: Haystack + ?Sized>(
        &mut self,
        haystack: &H,
        regex: &Regex,
        from: usize,
        ctx: &MatchContext,
    ) -> Result<Option<SearchHit>, SearchError> {
        self.remember(regex, Direction::Forward);
        self.forward(haystack, regex, from, ctx)
    }

    /// Nearest match starting before `from`, scanning backward.
    ///
    /// With `wrap_scan`, a search that reaches the start without a match
    /// continues from the end of the text and reports `wrapped`.
    pub fn find_prev<H: Haystack + ?Sized>(
        &mut self,
        haystack: &H,
        regex: &Regex,
        from: usize,
        ctx: &MatchContext,
    ) -> Result<Option<SearchHit>, SearchError> {
        self.remember(regex, Direction::Backward);
        self.backward(haystack, regex, from, ctx)
    }

    /// Repeat the last search from `from`; `reverse` flips its direction once.
    pub fn repeat<H: Haystack + ?Sized>(
        &self,
        haystack: &H,
        from: usize,
        reverse: bool,
        ctx: &MatchContext,
    ) -> Result<Option<SearchHit>, SearchError> {
        let last = self.last.as_ref().ok_or(SearchError::NoPreviousSearch)?;
        let direction = if reverse {
            last.direction.reversed()
        } else {
            last.direction
        };
        match direction {
            Direction::Forward => self.forward(haystack, &last.regex, from, ctx),
            Direction::Backward => self.backward(haystack, &last.regex, from, ctx),
        }
    }

    fn forward<H: Haystack + ?Sized>(
        &self,
        haystack: &H,
        regex: &Regex,
        from: usize,
        ctx: &MatchContext,
    ) -> Result<Option<SearchHit>, SearchError> {
        let from = from.min(haystack.len());
        if let Some(matched) = regex.find_at(haystack, from, ctx)? {
            return Ok(Some(SearchHit {
                matched,
                wrapped: false,
            }));
        }
        if !self.config.wrap_scan || from == 0 {
            return Ok(None);
        }
        let found = regex.find_at(haystack, 0, ctx)?;
        if found.is_some() {
            tracing::debug!(pattern = regex.as_str(), from, "search wrapped to start");
        }
        Ok(found.map(|matched| SearchHit {
            matched,
            wrapped: true,
        }))
    }

    fn backward<H: Haystack + ?Sized>(
        &self,
        haystack: &H,
        regex: &Regex,
        from: usize,
        ctx: &MatchContext,
    ) -> Result<Option<SearchHit>, SearchError> {
        let from = from.min(haystack.len());
        if let Some(matched) = scan_back(haystack, regex, from, 0, ctx)? {
            return Ok(Some(SearchHit {
                matched,
                wrapped: false,
            }));
        }
        if !self.config.wrap_scan {
            return Ok(None);
        }
        // Attempts at `haystack.len()` are allowed so an empty match at the end is found.
        let found = match regex.match_at(haystack, haystack.len(), ctx)? {
            Some(matched) => Some(matched),
            None => scan_back(haystack, regex, haystack.len(), from, ctx)?,
        };
        if found.is_some() {
            tracing::debug!(pattern = regex.as_str(), from, "search wrapped to end");
        }
        Ok(found.map(|matched| SearchHit {
            matched,
            wrapped: true,
        }))
    }

    /// Every non-overlapping match, left to right.
    pub fn find_all<H: Haystack + ?Sized>(
        &self,
        haystack: &H,
        regex: &Regex,
        ctx: &MatchContext,
    ) -> Result<Vec<Match>, SearchError> {
        Ok(regex.find_iter(haystack, *ctx).collect::<Result<Vec<_>, _>>()?)
    }

    /// Replace matches of `regex` throughout the document.
    ///
    /// With the `g` flag every match is replaced, otherwise only the first
    /// match on each line. `template` is expanded per match (`&`, `\0`-`\9`).
    /// All replacements form one undo step; zero matches record nothing.
    pub fn replace_all(
        &mut self,
        doc: &mut Document,
        regex: &Regex,
        template: &str,
    ) -> Result<ReplaceOutcome, SearchError> {
        self.remember(regex, Direction::Forward);
        let edits = {
            let view = doc.view();
            let mut matches = Vec::new();
            let mut last_line = None;
            for found in regex.find_iter(&view, MatchContext::default()) {
                let found = found?;
                if !regex.flags().global {
                    let line = view.line_of(found.start);
                    if last_line == Some(line) {
                        continue;
                    }
                    last_line = Some(line);
                }
                matches.push(found);
            }
            replacement_edits(&view, &matches, template)
        };
        let count = edits.len();
        if count == 0 {
            return Ok(ReplaceOutcome {
                state: doc.state(),
                count,
            });
        }
        let label = format!("replace {count} {}", if count == 1 { "match" } else { "matches" });
        let state = doc.apply_change(Change::labelled(label, edits.into_iter().flatten().collect()))?;
        tracing::debug!(pattern = regex.as_str(), count, "replaced all matches");
        Ok(ReplaceOutcome { state, count })
    }

    /// Replace the match at `at`, or the next match after it, as one undo step.
    pub fn replace_current(
        &mut self,
        doc: &mut Document,
        regex: &Regex,
        template: &str,
        at: usize,
        ctx: &MatchContext,
    ) -> Result<ReplaceOutcome, SearchError> {
        self.remember(regex, Direction::Forward);
        let edits = {
            let view = doc.view();
            let found = match regex.match_at(&view, at, ctx)? {
                Some(found) => Some(found),
                None => self
                    .forward(&view, regex, at, ctx)?
                    .map(|hit| hit.matched),
            };
            match found {
                Some(found) => replacement_edits(&view, &[found], template),
                None => Vec::new(),
            }
        };
        let count = edits.len();
        if count == 0 {
            return Ok(ReplaceOutcome {
                state: doc.state(),
                count,
            });
        }
        let change = Change::labelled("replace 1 match", edits.into_iter().flatten().collect());
        let state = doc.apply_change(change)?;
        Ok(ReplaceOutcome { state, count })
    }
}

/// Try anchored matches at each character position in `lo..hi`, nearest to `hi` first.
fn scan_back<H: Haystack + ?Sized>(
    haystack: &H,
    regex: &Regex,
    hi: usize,
    lo: usize,
    ctx: &MatchContext,
) -> Result<Option<Match>, SearchError> {
    let mut pos = hi;
    while pos > lo {
        let Some((_, width)) = haystack.char_before(pos) else {
            break;
        };
        pos -= width;
        if let Some(found) = regex.match_at(haystack, pos, ctx)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// Edits for each match, last match first, so offsets computed against the
/// original text stay valid while they are applied.
fn replacement_edits<H: Haystack + ?Sized>(
    haystack: &H,
    matches: &[Match],
    template: &str,
) -> Vec<Vec<Edit>> {
    matches
        .iter()
        .rev()
        .map(|found| {
            let replacement = monster_regex::expand_bytes(template, found, haystack);
            let mut edits = Vec::with_capacity(2);
            if !found.is_empty() {
                edits.push(Edit::Delete {
                    offset: found.start,
                    removed: haystack.raw_bytes(found.range()),
                });
            }
            if !replacement.is_empty() {
                edits.push(Edit::Insert {
                    offset: found.start,
                    text: replacement,
                });
            }
            edits
        })
        .collect()
}
