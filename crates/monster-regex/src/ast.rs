//! Pattern syntax tree.

/// Named character classes (`\d`, `\w`, `\l`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    /// `\d` digits.
    Digit,
    /// `\w` word characters.
    Word,
    /// `\s` whitespace.
    Space,
    /// `\l` lowercase letters.
    Lower,
    /// `\u` uppercase letters.
    Upper,
    /// `\x` hexadecimal digits.
    Hex,
    /// `\o` octal digits.
    Octal,
    /// `\h` head-of-word characters (letters and `_`).
    Head,
    /// `\p` printable characters.
    Printable,
    /// `\a` alphabetic characters.
    Alpha,
}

impl ClassKind {
    pub(crate) fn from_escape(ch: char) -> Option<(Self, bool)> {
        let kind = match ch.to_ascii_lowercase() {
            'd' => Self::Digit,
            'w' => Self::Word,
            's' => Self::Space,
            'l' => Self::Lower,
            'u' => Self::Upper,
            'x' => Self::Hex,
            'o' => Self::Octal,
            'h' => Self::Head,
            'p' => Self::Printable,
            'a' => Self::Alpha,
            _ => return None,
        };
        Some((kind, ch.is_ascii_uppercase()))
    }

    /// Whether `ch` belongs to the class. `unicode` selects the Unicode definition.
    pub fn matches(self, ch: char, unicode: bool) -> bool {
        match self {
            Self::Digit if unicode => ch.is_numeric(),
            Self::Digit => ch.is_ascii_digit(),
            Self::Word => is_word_char(ch, unicode),
            Self::Space if unicode => ch.is_whitespace(),
            Self::Space => matches!(ch, ' ' | '\t' | '\n' | '\r' | '\x0b' | '\x0c'),
            Self::Lower if unicode => ch.is_lowercase(),
            Self::Lower => ch.is_ascii_lowercase(),
            Self::Upper if unicode => ch.is_uppercase(),
            Self::Upper => ch.is_ascii_uppercase(),
            Self::Hex => ch.is_ascii_hexdigit(),
            Self::Octal => matches!(ch, '0'..='7'),
            Self::Head if unicode => ch == '_' || ch.is_alphabetic(),
            Self::Head => ch == '_' || ch.is_ascii_alphabetic(),
            Self::Printable if unicode => !ch.is_control(),
            Self::Printable => matches!(ch, ' '..='~'),
            Self::Alpha if unicode => ch.is_alphabetic(),
            Self::Alpha => ch.is_ascii_alphabetic(),
        }
    }
}

/// The `\w` definition shared by classes and word-boundary anchors.
pub fn is_word_char(ch: char, unicode: bool) -> bool {
    if unicode {
        ch == '_' || ch.is_alphanumeric()
    } else {
        ch == '_' || ch.is_ascii_alphanumeric()
    }
}

/// A class escape, possibly complemented (`\D`, `\W`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassEscape {
    /// The class.
    pub kind: ClassKind,
    /// `true` for the uppercase (complement) form.
    pub negated: bool,
}

impl ClassEscape {
    pub(crate) fn matches(self, ch: char, unicode: bool) -> bool {
        self.kind.matches(ch, unicode) != self.negated
    }
}

/// One member of a bracketed set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetItem {
    /// A single character.
    Char(char),
    /// An inclusive range.
    Range(char, char),
    /// A class escape inside the brackets.
    Class(ClassEscape),
}

/// A bracketed set `[...]` or `[^...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharSet {
    /// `true` for `[^...]`.
    pub negated: bool,
    /// Members in source order.
    pub items: Vec<SetItem>,
}

/// Comparison used by `\%<23l` style anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    /// Exactly at the given line/column.
    Eq,
    /// Before the given line/column.
    Lt,
    /// After the given line/column.
    Gt,
}

impl Cmp {
    pub(crate) fn holds(self, actual: usize, expected: usize) -> bool {
        match self {
            Self::Eq => actual == expected,
            Self::Lt => actual < expected,
            Self::Gt => actual > expected,
        }
    }
}

/// Zero-width assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assertion {
    /// `^`
    Start,
    /// `$`
    End,
    /// `\<`
    WordStart,
    /// `\>`
    WordEnd,
    /// `\b`
    WordBoundary,
    /// `\%23l` (1-based line)
    Line(Cmp, usize),
    /// `\%5c` (1-based character column)
    Column(Cmp, usize),
    /// `\%.l`
    CursorLine,
    /// `\%.c`
    CursorColumn,
    /// `\%#`
    Cursor,
}

/// A parsed pattern node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Matches the empty string.
    Empty,
    /// A literal character.
    Literal(char),
    /// `.`
    Dot,
    /// A class escape.
    Class(ClassEscape),
    /// A bracketed set.
    Set(CharSet),
    /// A zero-width assertion.
    Assert(Assertion),
    /// `\zs`
    MatchStart,
    /// `\ze`
    MatchEnd,
    /// A group. `index` is `None` for `(?:...)`.
    Group {
        /// Capture index (1-based), if capturing.
        index: Option<usize>,
        /// Name for `(?<name>...)`.
        name: Option<String>,
        /// Group body.
        node: Box<Node>,
    },
    /// `\0`..`\9`
    Backref(usize),
    /// A quantified node.
    Repeat {
        /// Repeated node.
        node: Box<Node>,
        /// Minimum repetitions.
        min: u32,
        /// Maximum repetitions, `None` for unbounded.
        max: Option<u32>,
        /// `false` for the lazy `?` form.
        greedy: bool,
        /// Byte offset of the quantifier in the pattern.
        offset: usize,
    },
    /// A sequence.
    Concat(Vec<Node>),
    /// Ordered choice.
    Alternate(Vec<Node>),
    /// Lookahead / lookbehind.
    Look {
        /// `true` for lookbehind.
        behind: bool,
        /// `true` for the negative form.
        negated: bool,
        /// Asserted body.
        node: Box<Node>,
    },
}

impl Node {
    /// Whether the pattern contains an uppercase literal character.
    ///
    /// Class escapes like `\W` do not count; only characters the user typed
    /// as text participate in smartcase.
    pub fn has_uppercase_literal(&self) -> bool {
        match self {
            Node::Literal(ch) => ch.is_uppercase(),
            Node::Set(set) => set.items.iter().any(|item| match item {
                SetItem::Char(ch) => ch.is_uppercase(),
                SetItem::Range(lo, hi) => lo.is_uppercase() || hi.is_uppercase(),
                SetItem::Class(_) => false,
            }),
            Node::Group { node, .. } | Node::Repeat { node, .. } | Node::Look { node, .. } => {
                node.has_uppercase_literal()
            }
            Node::Concat(nodes) | Node::Alternate(nodes) => {
                nodes.iter().any(Node::has_uppercase_literal)
            }
            _ => false,
        }
    }

    /// Minimum and maximum width in characters. `None` means unbounded.
    pub fn char_width(&self) -> (usize, Option<usize>) {
        match self {
            Node::Empty
            | Node::Assert(_)
            | Node::MatchStart
            | Node::MatchEnd
            | Node::Look { .. } => (0, Some(0)),
            Node::Literal(_) | Node::Dot | Node::Class(_) | Node::Set(_) => (1, Some(1)),
            Node::Backref(_) => (0, None),
            Node::Group { node, .. } => node.char_width(),
            Node::Repeat { node, min, max, .. } => {
                let (lo, hi) = node.char_width();
                let lo = lo.saturating_mul(*min as usize);
                let hi = match (hi, max) {
                    (Some(0), _) => Some(0),
                    (Some(h), Some(m)) => Some(h.saturating_mul(*m as usize)),
                    _ => None,
                };
                (lo, hi)
            }
            Node::Concat(nodes) => nodes.iter().fold((0, Some(0)), |(lo, hi), node| {
                let (l, h) = node.char_width();
                (lo + l, hi.zip(h).map(|(a, b)| a + b))
            }),
            Node::Alternate(nodes) => {
                let mut lo = usize::MAX;
                let mut hi = Some(0);
                for node in nodes {
                    let (l, h) = node.char_width();
                    lo = lo.min(l);
                    hi = hi.zip(h).map(|(a, b): (usize, usize)| a.max(b));
                }
                (if nodes.is_empty() { 0 } else { lo }, hi)
            }
        }
    }
}

/// A parsed pattern with its group table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ast {
    /// Root node.
    pub root: Node,
    /// Number of capturing groups (not counting the whole match).
    pub group_count: usize,
    /// Named groups and their indices, in order of appearance.
    pub names: Vec<(String, usize)>,
}
