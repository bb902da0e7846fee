//! Search flags parsed from the trailing `/flags` segment of a query.

use crate::error::{PatternError, PatternErrorKind};

/// Flags that modify how a pattern is compiled and matched.
///
/// | flag | field |
/// |------|-------|
/// | `i`  | [`Flags::ignore_case`] |
/// | `c`  | [`Flags::case_sensitive`] |
/// | `m`  | [`Flags::multiline`] |
/// | `s`  | [`Flags::dot_all`] |
/// | `x`  | [`Flags::verbose`] |
/// | `g`  | [`Flags::global`] |
/// | `u`  | [`Flags::unicode`] |
///
/// When neither `i` nor `c` is set, case sensitivity follows smartcase: the
/// pattern is case-insensitive unless it contains an uppercase literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags {
    /// Force case-insensitive matching.
    pub ignore_case: bool,
    /// Force case-sensitive matching.
    pub case_sensitive: bool,
    /// `^` and `$` match at line boundaries instead of only at buffer boundaries.
    pub multiline: bool,
    /// `.` also matches `\n`.
    pub dot_all: bool,
    /// Unescaped whitespace and `#` comments are ignored outside brackets.
    pub verbose: bool,
    /// Replace/match every occurrence rather than the first per line.
    pub global: bool,
    /// Character classes and word boundaries use Unicode definitions.
    pub unicode: bool,
}

impl Flags {
    /// Parse a flags segment such as `"gi"`.
    ///
    /// When both `i` and `c` are present the later one wins.
    pub fn parse(flags: &str) -> Result<Self, PatternError> {
        let mut out = Flags::default();
        for (offset, ch) in flags.char_indices() {
            match ch {
                'i' => {
                    out.ignore_case = true;
                    out.case_sensitive = false;
                }
                'c' => {
                    out.case_sensitive = true;
                    out.ignore_case = false;
                }
                'm' => out.multiline = true,
                's' => out.dot_all = true,
                'x' => out.verbose = true,
                'g' => out.global = true,
                'u' => out.unicode = true,
                other => {
                    return Err(PatternError::new(
                        offset,
                        PatternErrorKind::UnknownFlag(other),
                    ));
                }
            }
        }
        Ok(out)
    }

    /// Resolve the effective case-insensitivity for a pattern.
    ///
    /// `has_uppercase` reports whether the pattern contains an uppercase literal.
    pub fn resolve_ignore_case(&self, has_uppercase: bool) -> bool {
        if self.case_sensitive {
            false
        } else if self.ignore_case {
            true
        } else {
            !has_uppercase
        }
    }
}

impl std::fmt::Display for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pairs = [
            (self.ignore_case, 'i'),
            (self.case_sensitive, 'c'),
            (self.multiline, 'm'),
            (self.dot_all, 's'),
            (self.verbose, 'x'),
            (self.global, 'g'),
            (self.unicode, 'u'),
        ];
        for (set, ch) in pairs {
            if set {
                write!(f, "{ch}")?;
            }
        }
        Ok(())
    }
}
