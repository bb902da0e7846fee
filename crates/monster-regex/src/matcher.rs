//! The public matcher API.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::compile::{compile, Program};
use crate::error::{MatchError, PatternError};
use crate::exec::{Executor, Slots};
use crate::flags::Flags;
use crate::haystack::Haystack;
use crate::parse::parse;

/// Default number of backtracking steps allowed per match attempt.
pub const DEFAULT_BACKTRACK_LIMIT: u64 = 1_000_000;

/// Cursor information needed by the `\%#`, `\%.l` and `\%.c` anchors.
///
/// All fields are zero-based; `current_column` counts characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchContext {
    /// Line the cursor is on.
    pub current_line: usize,
    /// Character column of the cursor.
    pub current_column: usize,
    /// Byte offset of the cursor.
    pub cursor_offset: usize,
}

/// A compiled pattern.
///
/// Cloning is cheap; the compiled program is shared.
#[derive(Clone)]
pub struct Regex {
    pattern: String,
    flags: Flags,
    backtrack_limit: u64,
    program: Arc<Program>,
}

/// Configures and compiles a [`Regex`].
#[derive(Debug, Clone)]
pub struct RegexBuilder {
    pattern: String,
    flags: Flags,
    backtrack_limit: u64,
}

impl RegexBuilder {
    /// Start building `pattern` with default flags.
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            flags: Flags::default(),
            backtrack_limit: DEFAULT_BACKTRACK_LIMIT,
        }
    }

    /// Set the flags.
    pub fn flags(&mut self, flags: Flags) -> &mut Self {
        self.flags = flags;
        self
    }

    /// Set the per-attempt backtracking budget.
    pub fn backtrack_limit(&mut self, limit: u64) -> &mut Self {
        self.backtrack_limit = limit;
        self
    }

    /// Compile the pattern.
    pub fn build(&self) -> Result<Regex, PatternError> {
        let ast = parse(&self.pattern, self.flags.verbose)?;
        let ignore_case = self.flags.resolve_ignore_case(ast.root.has_uppercase_literal());
        let program = compile(ast, &self.flags, ignore_case)?;
        Ok(Regex {
            pattern: self.pattern.clone(),
            flags: self.flags,
            backtrack_limit: self.backtrack_limit,
            program: Arc::new(program),
        })
    }
}

impl Regex {
    /// Compile `pattern` with default flags (smartcase).
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        RegexBuilder::new(pattern).build()
    }

    /// Compile `pattern` with a flags segment such as `"gi"`.
    pub fn with_flags(pattern: &str, flags: &str) -> Result<Self, PatternError> {
        RegexBuilder::new(pattern).flags(Flags::parse(flags)?).build()
    }

    /// The source pattern.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// The flags the pattern was compiled with.
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Whether matching ignores case after smartcase resolution.
    pub fn is_case_insensitive(&self) -> bool {
        self.program.ignore_case
    }

    /// Number of capture groups, including group 0.
    pub fn captures_len(&self) -> usize {
        self.program.group_count + 1
    }

    /// Named groups and their indices.
    pub fn group_names(&self) -> impl Iterator<Item = (&str, usize)> {
        self.program.names.iter().map(|(name, index)| (name.as_str(), *index))
    }

    /// The per-attempt backtracking budget.
    pub fn backtrack_limit(&self) -> u64 {
        self.backtrack_limit
    }

    /// Leftmost match starting at or after `start`.
    pub fn find_at<H: Haystack + ?Sized>(
        &self,
        haystack: &H,
        start: usize,
        ctx: &MatchContext,
    ) -> Result<Option<Match>, MatchError> {
        let len = haystack.len();
        if start > len {
            return Ok(None);
        }
        let mut exec = Executor::new(&self.program, haystack, ctx, self.backtrack_limit);
        let mut pos = start;
        loop {
            if exec.viable_start(pos) {
                match exec.attempt(pos) {
                    Ok(Some(slots)) => return Ok(Some(self.make_match(slots))),
                    Ok(None) => {}
                    Err(err) => {
                        tracing::debug!(pattern = %self.pattern, pos, "backtrack budget exhausted");
                        return Err(err);
                    }
                }
            } else if self.program.anchored_start && pos > 0 {
                return Ok(None);
            }
            match haystack.char_at(pos) {
                Some((_, width)) => pos += width,
                None => return Ok(None),
            }
        }
    }

    /// Leftmost match in the whole haystack.
    pub fn find<H: Haystack + ?Sized>(&self, haystack: &H) -> Result<Option<Match>, MatchError> {
        self.find_at(haystack, 0, &MatchContext::default())
    }

    /// Whether the pattern matches anywhere.
    pub fn is_match<H: Haystack + ?Sized>(&self, haystack: &H) -> Result<bool, MatchError> {
        Ok(self.find(haystack)?.is_some())
    }

    /// A single anchored attempt at `pos`; no other start positions are tried.
    pub fn match_at<H: Haystack + ?Sized>(
        &self,
        haystack: &H,
        pos: usize,
        ctx: &MatchContext,
    ) -> Result<Option<Match>, MatchError> {
        if pos > haystack.len() {
            return Ok(None);
        }
        let mut exec = Executor::new(&self.program, haystack, ctx, self.backtrack_limit);
        if !exec.viable_start(pos) {
            return Ok(None);
        }
        match exec.attempt(pos) {
            Ok(found) => Ok(found.map(|slots| self.make_match(slots))),
            Err(err) => {
                tracing::debug!(pattern = %self.pattern, pos, "backtrack budget exhausted");
                Err(err)
            }
        }
    }

    /// Successive non-overlapping matches, left to right.
    pub fn find_iter<'r, 'h, H: Haystack + ?Sized>(
        &'r self,
        haystack: &'h H,
        ctx: MatchContext,
    ) -> FindIter<'r, 'h, H> {
        FindIter {
            regex: self,
            haystack,
            ctx,
            pos: 0,
            done: false,
        }
    }

    fn make_match(&self, slots: Slots) -> Match {
        let prog = &self.program;
        let attempt_start = slots[0].unwrap_or(0);
        let attempt_end = slots[1].unwrap_or(attempt_start);
        let start = slots[prog.match_start_slot].unwrap_or(attempt_start);
        let end = slots[prog.match_end_slot].unwrap_or(attempt_end).max(start);
        let mut groups = Vec::with_capacity(prog.group_count + 1);
        groups.push(Some(start..end));
        for group in 1..=prog.group_count {
            groups.push(match (slots[2 * group], slots[2 * group + 1]) {
                (Some(s), Some(e)) if s <= e => Some(s..e),
                _ => None,
            });
        }
        Match {
            start,
            end,
            attempt: attempt_start..attempt_end,
            groups,
            names: Arc::clone(&prog.names),
        }
    }
}

impl fmt::Debug for Regex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Regex")
            .field("pattern", &self.pattern)
            .field("flags", &self.flags.to_string())
            .field("ignore_case", &self.program.ignore_case)
            .finish()
    }
}

impl fmt::Display for Regex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.pattern, self.flags)
    }
}

/// One successful match.
///
/// `start..end` is the reported span after `\zs`/`\ze` adjustment. The span
/// the matcher actually consumed is available as [`Match::attempt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Start byte offset.
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
    attempt: Range<usize>,
    groups: Vec<Option<Range<usize>>>,
    names: Arc<[(String, usize)]>,
}

impl Match {
    /// The reported span.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Length of the reported span in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the reported span is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The span consumed by the matcher, ignoring `\zs`/`\ze`.
    pub fn attempt(&self) -> Range<usize> {
        self.attempt.clone()
    }

    /// Span of group `index`; group 0 is the reported span.
    pub fn get(&self, index: usize) -> Option<Range<usize>> {
        self.groups.get(index).cloned().flatten()
    }

    /// Span of the group called `name`.
    pub fn name(&self, name: &str) -> Option<Range<usize>> {
        let index = self.names.iter().find(|(n, _)| n == name)?.1;
        self.get(index)
    }

    /// Number of groups including group 0.
    pub fn groups_len(&self) -> usize {
        self.groups.len()
    }

    /// Text of the reported span.
    pub fn text<H: Haystack + ?Sized>(&self, haystack: &H) -> String {
        haystack.text(self.range())
    }
}

/// Iterator returned by [`Regex::find_iter`].
///
/// After each match the search resumes at its end, or one character past
/// its start when the match is empty, so iteration always makes progress.
pub struct FindIter<'r, 'h, H: Haystack + ?Sized> {
    regex: &'r Regex,
    haystack: &'h H,
    ctx: MatchContext,
    pos: usize,
    done: bool,
}

impl<H: Haystack + ?Sized> FindIter<'_, '_, H> {
    fn step_past(&self, pos: usize) -> Option<usize> {
        self.haystack.char_at(pos).map(|(_, width)| pos + width)
    }
}

impl<H: Haystack + ?Sized> Iterator for FindIter<'_, '_, H> {
    type Item = Result<Match, MatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let m = match self.regex.find_at(self.haystack, self.pos, &self.ctx) {
            Ok(Some(m)) => m,
            Ok(None) => {
                self.done = true;
                return None;
            }
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        };
        let resume = if m.is_empty() || m.end <= self.pos {
            self.step_past(m.end.max(self.pos))
        } else {
            Some(m.end)
        };
        match resume {
            Some(next) => self.pos = next,
            None => self.done = true,
        }
        Some(Ok(m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn spans(pattern: &str, flags: &str, text: &str) -> Vec<(usize, usize)> {
        let re = Regex::with_flags(pattern, flags).unwrap();
        re.find_iter(text, MatchContext::default())
            .map(|m| {
                let m = m.unwrap();
                (m.start, m.end)
            })
            .collect()
    }

    #[test]
    fn test_star_on_non_matching_text_yields_empty_matches() {
        assert_eq!(spans("a*", "", "bbb"), vec![(0, 0), (1, 1), (2, 2), (3, 3)]);
        let re = Regex::new("a*").unwrap();
        assert_eq!(re.find("aaa").unwrap().unwrap().range(), 0..3);
    }

    #[test]
    fn test_empty_match_after_match_is_reported() {
        assert_eq!(spans("a*", "", "baaac"), vec![(0, 0), (1, 4), (4, 4), (5, 5)]);
    }

    #[test]
    fn test_match_start_and_end_markers() {
        let re = Regex::new("foo\\zsbar\\zebaz").unwrap();
        let m = re.find("xxfoobarbaz").unwrap().unwrap();
        assert_eq!(m.range(), 5..8);
        assert_eq!(m.attempt(), 2..11);
    }

    #[test]
    fn test_named_groups() {
        let re = Regex::new("(?<key>\\w+)=(?<value>\\w+)").unwrap();
        let m = re.find("a key=value").unwrap().unwrap();
        assert_eq!(m.name("key"), Some(2..5));
        assert_eq!(m.name("value"), Some(6..11));
        assert_eq!(m.get(1), m.name("key"));
        assert_eq!(re.group_names().collect::<Vec<_>>(), vec![("key", 1), ("value", 2)]);
        assert_eq!(re.captures_len(), 3);
    }

    #[test]
    fn test_match_at_is_anchored() {
        let re = Regex::new("b").unwrap();
        let ctx = MatchContext::default();
        assert!(re.match_at("ab", 0, &ctx).unwrap().is_none());
        assert_eq!(re.match_at("ab", 1, &ctx).unwrap().unwrap().range(), 1..2);
    }

    #[test]
    fn test_display_includes_flags() {
        let re = Regex::with_flags("a+", "gi").unwrap();
        assert_eq!(re.to_string(), "/a+/ig");
        assert!(re.is_case_insensitive());
    }
}
