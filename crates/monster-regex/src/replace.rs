//! Replacement template expansion.

use crate::haystack::Haystack;
use crate::matcher::Match;

/// Expand a replacement `template` for match `m` in `haystack`.
///
/// | token | expands to |
/// |-------|------------|
/// | `&`, `\0` | the whole match |
/// | `\1`..`\9` | capture group (empty if unset) |
/// | `\n`, `\t` | newline, tab |
/// | `\\`, `\&` | literal `\`, `&` |
///
/// Any other escaped character is inserted literally. Invalid UTF-8 copied
/// from the haystack is replaced; use [`expand_bytes`] to keep it.
pub fn expand<H: Haystack + ?Sized>(template: &str, m: &Match, haystack: &H) -> String {
    String::from_utf8_lossy(&expand_bytes(template, m, haystack)).into_owned()
}

/// [`expand`], copying matched text byte for byte.
pub fn expand_bytes<H: Haystack + ?Sized>(template: &str, m: &Match, haystack: &H) -> Vec<u8> {
    let mut out = Vec::with_capacity(template.len());
    let mut chars = template.chars();
    let mut utf8 = [0u8; 4];
    while let Some(ch) = chars.next() {
        let literal = match ch {
            '&' => {
                out.extend(haystack.raw_bytes(m.range()));
                continue;
            }
            '\\' => match chars.next() {
                Some(digit @ '0'..='9') => {
                    let group = digit as usize - '0' as usize;
                    if let Some(span) = m.get(group) {
                        out.extend(haystack.raw_bytes(span));
                    }
                    continue;
                }
                Some('n') => '\n',
                Some('t') => '\t',
                Some(other) => other,
                None => '\\',
            },
            other => other,
        };
        out.extend_from_slice(literal.encode_utf8(&mut utf8).as_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Regex;

    fn expand_first(pattern: &str, text: &str, template: &str) -> String {
        let re = Regex::new(pattern).unwrap();
        let m = re.find(text).unwrap().unwrap();
        expand(template, &m, text)
    }

    #[test]
    fn test_whole_match_tokens() {
        assert_eq!(expand_first("b+", "abbc", "[&]"), "[bb]");
        assert_eq!(expand_first("b+", "abbc", "<\\0>"), "<bb>");
        assert_eq!(expand_first("b+", "abbc", "\\&\\\\"), "&\\");
    }

    #[test]
    fn test_groups_and_control_escapes() {
        assert_eq!(expand_first("(\\w+) (\\w+)", "hello world", "\\2\\t\\1\\n"), "world\thello\n");
        assert_eq!(expand_first("(x)?y", "y", "[\\1]"), "[]");
        assert_eq!(expand_first("(a)", "a", "\\5"), "");
    }

    #[test]
    fn test_invalid_bytes_are_copied_verbatim() {
        let text: &[u8] = b"k=\xFF\xFE;";
        let re = Regex::new("=(.+);").unwrap();
        let m = re.find(text).unwrap().unwrap();
        assert_eq!(expand_bytes("<\\1>", &m, text), b"<\xFF\xFE>");
        assert_eq!(expand("<\\1>", &m, text), "<\u{FFFD}\u{FFFD}>");
    }
}
