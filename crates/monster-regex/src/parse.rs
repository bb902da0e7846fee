//! Recursive-descent pattern parser.

use crate::ast::{Assertion, Ast, CharSet, ClassEscape, ClassKind, Cmp, Node, SetItem};
use crate::error::{PatternError, PatternErrorKind};

/// Largest count accepted in a `{n,m}` quantifier.
pub const MAX_REPEAT: u32 = 1000;

/// Parse `pattern` into an [`Ast`].
///
/// With `verbose`, unescaped whitespace and `#` comments outside brackets are skipped.
pub fn parse(pattern: &str, verbose: bool) -> Result<Ast, PatternError> {
    let mut parser = Parser {
        pattern,
        pos: 0,
        verbose,
        group_count: 0,
        names: Vec::new(),
        backrefs: Vec::new(),
    };
    let root = parser.parse_alternation()?;
    if parser.pos < pattern.len() {
        return Err(PatternError::new(parser.pos, PatternErrorKind::UnmatchedParen));
    }
    for &(group, offset) in &parser.backrefs {
        if group > parser.group_count {
            return Err(PatternError::new(
                offset,
                PatternErrorKind::InvalidBackreference(group),
            ));
        }
    }
    Ok(Ast {
        root,
        group_count: parser.group_count,
        names: parser.names,
    })
}

struct Parser<'p> {
    pattern: &'p str,
    pos: usize,
    verbose: bool,
    group_count: usize,
    names: Vec<(String, usize)>,
    /// `(group, offset)` for every backreference, validated once all groups are known.
    backrefs: Vec<(usize, usize)>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.pattern[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.pattern[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn error(&self, offset: usize, kind: PatternErrorKind) -> PatternError {
        PatternError::new(offset, kind)
    }

    fn skip_trivia(&mut self) {
        if !self.verbose {
            return;
        }
        loop {
            match self.peek() {
                Some(ch) if ch.is_whitespace() => {
                    self.bump();
                }
                Some('#') => {
                    while let Some(ch) = self.bump() {
                        if ch == '\n' {
                            break;
                        }
                    }
                }
                _ => return,
            }
        }
    }

    fn parse_alternation(&mut self) -> Result<Node, PatternError> {
        let first = self.parse_concat()?;
        if self.peek() != Some('|') {
            return Ok(first);
        }
        let mut branches = vec![first];
        while self.eat('|') {
            branches.push(self.parse_concat()?);
        }
        Ok(Node::Alternate(branches))
    }

    fn parse_concat(&mut self) -> Result<Node, PatternError> {
        let mut items: Vec<Node> = Vec::new();
        loop {
            self.skip_trivia();
            let offset = self.pos;
            let (min, max) = match self.peek() {
                None | Some('|') | Some(')') => break,
                Some('*') => {
                    self.bump();
                    (0, None)
                }
                Some('+') => {
                    self.bump();
                    (1, None)
                }
                Some('?') => {
                    self.bump();
                    (0, Some(1))
                }
                Some('{') => self.parse_bounds()?,
                Some(_) => {
                    let atom = self.parse_atom()?;
                    items.push(atom);
                    continue;
                }
            };
            let greedy = !self.eat('?');
            let target = match items.pop() {
                Some(node) if is_repeatable(&node) => node,
                _ => return Err(self.error(offset, PatternErrorKind::NothingToRepeat)),
            };
            items.push(Node::Repeat {
                node: Box::new(target),
                min,
                max,
                greedy,
                offset,
            });
        }
        Ok(match items.len() {
            0 => Node::Empty,
            1 => items.pop().unwrap_or(Node::Empty),
            _ => Node::Concat(items),
        })
    }

    /// Parse `{n}`, `{n,m}`, `{n,}`, `{,m}` or `{,}`. The cursor is on `{`.
    fn parse_bounds(&mut self) -> Result<(u32, Option<u32>), PatternError> {
        let open = self.pos;
        self.bump();
        let min = self.parse_count(open)?;
        let (min, max) = if self.eat(',') {
            let max = self.parse_count(open)?;
            (min.unwrap_or(0), max)
        } else {
            match min {
                Some(n) => (n, Some(n)),
                None => return Err(self.error(open, PatternErrorKind::InvalidQuantifier)),
            }
        };
        if !self.eat('}') {
            return Err(self.error(open, PatternErrorKind::InvalidQuantifier));
        }
        if max.is_some_and(|max| max < min) {
            return Err(self.error(open, PatternErrorKind::InvalidQuantifier));
        }
        Ok((min, max))
    }

    fn parse_count(&mut self, open: usize) -> Result<Option<u32>, PatternError> {
        let mut value: Option<u32> = None;
        while let Some(digit) = self.peek().and_then(|ch| ch.to_digit(10)) {
            self.bump();
            let next = value.unwrap_or(0).saturating_mul(10).saturating_add(digit);
            value = Some(next);
        }
        match value {
            Some(n) if n > MAX_REPEAT => {
                Err(self.error(open, PatternErrorKind::RepetitionTooLarge))
            }
            other => Ok(other),
        }
    }

    fn parse_atom(&mut self) -> Result<Node, PatternError> {
        let offset = self.pos;
        let Some(ch) = self.bump() else {
            return Ok(Node::Empty);
        };
        match ch {
            '(' => self.parse_group(offset),
            '[' => self.parse_set(offset).map(Node::Set),
            '.' => Ok(Node::Dot),
            '^' => Ok(Node::Assert(Assertion::Start)),
            '$' => Ok(Node::Assert(Assertion::End)),
            '\\' => self.parse_escape(offset),
            other => Ok(Node::Literal(other)),
        }
    }

    fn parse_group(&mut self, open: usize) -> Result<Node, PatternError> {
        enum Kind {
            Capture(Option<String>),
            NonCapture,
            Look { behind: bool, negated: bool },
        }

        let kind = if self.eat('?') {
            match self.bump() {
                Some(':') => Kind::NonCapture,
                Some('=') => Kind::Look { behind: false, negated: false },
                Some('!') => Kind::Look { behind: false, negated: true },
                Some('>') => match self.bump() {
                    Some('=') => Kind::Look { behind: false, negated: false },
                    Some('!') => Kind::Look { behind: false, negated: true },
                    _ => return Err(self.error(open, PatternErrorKind::UnknownGroupSyntax)),
                },
                Some('<') => match self.peek() {
                    Some('=') => {
                        self.bump();
                        Kind::Look { behind: true, negated: false }
                    }
                    Some('!') => {
                        self.bump();
                        Kind::Look { behind: true, negated: true }
                    }
                    _ => Kind::Capture(Some(self.parse_group_name()?)),
                },
                _ => return Err(self.error(open, PatternErrorKind::UnknownGroupSyntax)),
            }
        } else {
            Kind::Capture(None)
        };

        let index = match &kind {
            Kind::Capture(name) => {
                self.group_count += 1;
                if let Some(name) = name {
                    self.names.push((name.clone(), self.group_count));
                }
                Some(self.group_count)
            }
            _ => None,
        };

        let body = self.parse_alternation()?;
        if !self.eat(')') {
            return Err(self.error(open, PatternErrorKind::UnbalancedGroup));
        }

        Ok(match kind {
            Kind::Capture(name) => Node::Group {
                index,
                name,
                node: Box::new(body),
            },
            Kind::NonCapture => Node::Group {
                index: None,
                name: None,
                node: Box::new(body),
            },
            Kind::Look { behind, negated } => Node::Look {
                behind,
                negated,
                node: Box::new(body),
            },
        })
    }

    fn parse_group_name(&mut self) -> Result<String, PatternError> {
        let start = self.pos;
        let mut name = String::new();
        loop {
            match self.bump() {
                Some('>') => break,
                Some(ch) if ch == '_' || ch.is_ascii_alphanumeric() => {
                    if name.is_empty() && ch.is_ascii_digit() {
                        return Err(self.error(start, PatternErrorKind::InvalidGroupName));
                    }
                    name.push(ch);
                }
                _ => return Err(self.error(start, PatternErrorKind::InvalidGroupName)),
            }
        }
        if name.is_empty() {
            return Err(self.error(start, PatternErrorKind::InvalidGroupName));
        }
        if self.names.iter().any(|(existing, _)| *existing == name) {
            return Err(self.error(start, PatternErrorKind::DuplicateGroupName(name)));
        }
        Ok(name)
    }

    /// Parse the escape after a `\` at `offset`.
    fn parse_escape(&mut self, offset: usize) -> Result<Node, PatternError> {
        let Some(ch) = self.bump() else {
            return Err(self.error(offset, PatternErrorKind::TrailingBackslash));
        };
        if let Some(literal) = control_escape(ch) {
            return Ok(Node::Literal(literal));
        }
        if let Some((kind, negated)) = ClassKind::from_escape(ch) {
            return Ok(Node::Class(ClassEscape { kind, negated }));
        }
        match ch {
            '<' => Ok(Node::Assert(Assertion::WordStart)),
            '>' => Ok(Node::Assert(Assertion::WordEnd)),
            'b' => Ok(Node::Assert(Assertion::WordBoundary)),
            'z' => match self.bump() {
                Some('s') => Ok(Node::MatchStart),
                Some('e') => Ok(Node::MatchEnd),
                _ => Err(self.error(offset, PatternErrorKind::UnknownEscape('z'))),
            },
            '%' => self.parse_position_anchor(offset).map(Node::Assert),
            '0'..='9' => {
                let group = ch as usize - '0' as usize;
                self.backrefs.push((group, offset));
                Ok(Node::Backref(group))
            }
            other if other.is_alphanumeric() => {
                Err(self.error(offset, PatternErrorKind::UnknownEscape(other)))
            }
            other => Ok(Node::Literal(other)),
        }
    }

    /// Parse the anchor after `\%`.
    fn parse_position_anchor(&mut self, offset: usize) -> Result<Assertion, PatternError> {
        let invalid = || PatternError::new(offset, PatternErrorKind::InvalidPositionAnchor);
        match self.peek() {
            Some('#') => {
                self.bump();
                return Ok(Assertion::Cursor);
            }
            Some('.') => {
                self.bump();
                return match self.bump() {
                    Some('l') => Ok(Assertion::CursorLine),
                    Some('c') => Ok(Assertion::CursorColumn),
                    _ => Err(invalid()),
                };
            }
            _ => {}
        }
        let cmp = if self.eat('<') {
            Cmp::Lt
        } else if self.eat('>') {
            Cmp::Gt
        } else {
            Cmp::Eq
        };
        let mut value: Option<usize> = None;
        while let Some(digit) = self.peek().and_then(|ch| ch.to_digit(10)) {
            self.bump();
            value = Some(value.unwrap_or(0).saturating_mul(10).saturating_add(digit as usize));
        }
        let value = value.ok_or_else(invalid)?;
        match self.bump() {
            Some('l') => Ok(Assertion::Line(cmp, value)),
            Some('c') => Ok(Assertion::Column(cmp, value)),
            _ => Err(invalid()),
        }
    }

    /// Parse a bracketed set. The cursor is just past `[` at `open`.
    fn parse_set(&mut self, open: usize) -> Result<CharSet, PatternError> {
        let negated = self.eat('^');
        let mut items = Vec::new();
        if self.eat(']') {
            items.push(SetItem::Char(']'));
        }
        loop {
            let item_offset = self.pos;
            let item = match self.bump() {
                None => return Err(self.error(open, PatternErrorKind::UnterminatedClass)),
                Some(']') => break,
                Some('\\') => self.parse_set_escape(item_offset)?,
                Some(ch) => SetItem::Char(ch),
            };
            if self.peek() == Some('-') && !matches!(self.peek_second(), Some(']') | None) {
                self.bump();
                let hi_offset = self.pos;
                let hi = match self.bump() {
                    Some('\\') => self.parse_set_escape(hi_offset)?,
                    Some(ch) => SetItem::Char(ch),
                    None => return Err(self.error(open, PatternErrorKind::UnterminatedClass)),
                };
                match (item, hi) {
                    (SetItem::Char(lo), SetItem::Char(hi)) if lo <= hi => {
                        items.push(SetItem::Range(lo, hi));
                    }
                    _ => return Err(self.error(item_offset, PatternErrorKind::InvalidRange)),
                }
            } else {
                items.push(item);
            }
        }
        Ok(CharSet { negated, items })
    }

    fn parse_set_escape(&mut self, offset: usize) -> Result<SetItem, PatternError> {
        let Some(ch) = self.bump() else {
            return Err(self.error(offset, PatternErrorKind::UnterminatedClass));
        };
        if let Some(literal) = control_escape(ch) {
            return Ok(SetItem::Char(literal));
        }
        if let Some((kind, negated)) = ClassKind::from_escape(ch) {
            return Ok(SetItem::Class(ClassEscape { kind, negated }));
        }
        if ch.is_alphanumeric() {
            return Err(self.error(offset, PatternErrorKind::UnknownEscape(ch)));
        }
        Ok(SetItem::Char(ch))
    }
}

fn control_escape(ch: char) -> Option<char> {
    Some(match ch {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        'f' => '\x0c',
        'v' => '\x0b',
        'e' => '\x1b',
        _ => return None,
    })
}

fn is_repeatable(node: &Node) -> bool {
    !matches!(
        node,
        Node::Empty | Node::Assert(_) | Node::MatchStart | Node::MatchEnd | Node::Repeat { .. }
    )
}
