//! Error types for pattern compilation and matching.

use thiserror::Error;

/// The reason a pattern failed to compile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternErrorKind {
    /// A `(` was never closed.
    #[error("unbalanced group: missing ')'")]
    UnbalancedGroup,
    /// A `)` has no matching `(`.
    #[error("unmatched ')'")]
    UnmatchedParen,
    /// A `[` was never closed.
    #[error("unterminated character class: missing ']'")]
    UnterminatedClass,
    /// A class range whose start is greater than its end, or whose endpoint is a class.
    #[error("invalid character class range")]
    InvalidRange,
    /// A `{...}` quantifier with malformed or inverted bounds.
    #[error("invalid quantifier bound")]
    InvalidQuantifier,
    /// A quantifier with no preceding atom (or following another quantifier).
    #[error("quantifier has nothing to repeat")]
    NothingToRepeat,
    /// A repetition count (or the expanded program) is too large.
    #[error("repetition count too large")]
    RepetitionTooLarge,
    /// An alphanumeric escape with no defined meaning.
    #[error("unknown escape '\\{0}'")]
    UnknownEscape(char),
    /// The pattern ends in a lone backslash.
    #[error("pattern ends with a trailing backslash")]
    TrailingBackslash,
    /// A `(?<name>` group name that is empty or contains invalid characters.
    #[error("invalid group name")]
    InvalidGroupName,
    /// Two named groups share the same name.
    #[error("duplicate group name '{0}'")]
    DuplicateGroupName(String),
    /// A `(?` prefix that is not a known group form.
    #[error("unknown group syntax")]
    UnknownGroupSyntax,
    /// A backreference to a group that does not exist.
    #[error("backreference \\{0} refers to a group that does not exist")]
    InvalidBackreference(usize),
    /// A malformed `\%` position anchor.
    #[error("invalid position anchor")]
    InvalidPositionAnchor,
    /// An unrecognized character in the flags segment.
    #[error("unknown flag '{0}'")]
    UnknownFlag(char),
}

/// A pattern failed to compile.
///
/// `offset` is the byte offset into the pattern (or flags string, for
/// [`PatternErrorKind::UnknownFlag`]) of the offending character.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at offset {offset}")]
pub struct PatternError {
    /// Byte offset of the offending character.
    pub offset: usize,
    /// What went wrong.
    pub kind: PatternErrorKind,
}

impl PatternError {
    pub(crate) fn new(offset: usize, kind: PatternErrorKind) -> Self {
        Self { offset, kind }
    }
}

/// A search failed at match time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MatchError {
    /// The matcher performed more backtracking steps than its budget allows.
    #[error("pattern too complex: exceeded backtrack limit of {limit} steps")]
    BacktrackLimitExceeded {
        /// The configured budget.
        limit: u64,
    },
}
