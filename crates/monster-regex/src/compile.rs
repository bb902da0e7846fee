//! Lowering from [`Ast`] to a backtracking program.

use std::sync::Arc;

use crate::ast::{Assertion, Ast, CharSet, ClassEscape, Node};
use crate::error::{PatternError, PatternErrorKind};
use crate::flags::Flags;

/// Upper bound on program length; counted repetition can otherwise explode.
const MAX_PROGRAM_LEN: usize = 200_000;

#[derive(Debug, Clone)]
pub(crate) enum Inst {
    Char(char),
    /// Case-folded literal; compares against the folded input character.
    CharFold(char),
    Any,
    AnyExceptNewline,
    Class(ClassEscape),
    Set(usize),
    Assert(Assertion),
    Save(usize),
    /// Try the first target, fall back to the second.
    Split(usize, usize),
    Jmp(usize),
    Backref(usize),
    /// Record the loop-entry position in a register.
    LoopMark(usize),
    /// Fail if the loop body consumed nothing since the matching `LoopMark`.
    LoopCheck(usize),
    /// Zero-width sub-match; the body starts at the next instruction and ends with `SubMatch`.
    Look {
        behind: bool,
        negated: bool,
        next: usize,
        min_width: usize,
        max_width: Option<usize>,
    },
    SubMatch,
    Match,
}

#[derive(Debug)]
pub(crate) struct Program {
    pub insts: Vec<Inst>,
    pub sets: Vec<CharSet>,
    pub slot_count: usize,
    pub reg_count: usize,
    pub group_count: usize,
    pub match_start_slot: usize,
    pub match_end_slot: usize,
    pub names: Arc<[(String, usize)]>,
    pub ignore_case: bool,
    pub multiline: bool,
    pub unicode: bool,
    /// A literal every match must begin with, used to skip hopeless start positions.
    pub first_char: Option<char>,
    /// The pattern can only match at offset 0.
    pub anchored_start: bool,
}

pub(crate) fn compile(ast: Ast, flags: &Flags, ignore_case: bool) -> Result<Program, PatternError> {
    let group_slots = 2 * (ast.group_count + 1);
    let mut compiler = Compiler {
        insts: Vec::new(),
        sets: Vec::new(),
        reg_count: 0,
        ignore_case,
        dot_all: flags.dot_all,
        match_start_slot: group_slots,
        match_end_slot: group_slots + 1,
    };
    compiler.node(&ast.root, 0)?;
    compiler.push(Inst::Save(1), 0)?;
    compiler.push(Inst::Match, 0)?;

    let first_char = if ignore_case { None } else { first_char(&ast.root) };
    let anchored_start = !flags.multiline && starts_with_start_anchor(&ast.root);

    Ok(Program {
        insts: compiler.insts,
        sets: compiler.sets,
        slot_count: group_slots + 2,
        reg_count: compiler.reg_count,
        group_count: ast.group_count,
        match_start_slot: compiler.match_start_slot,
        match_end_slot: compiler.match_end_slot,
        names: ast.names.into(),
        ignore_case,
        multiline: flags.multiline,
        unicode: flags.unicode,
        first_char,
        anchored_start,
    })
}

/// Simple case fold used for case-insensitive comparison.
pub(crate) fn fold(ch: char) -> char {
    if ch.is_ascii() {
        return ch.to_ascii_lowercase();
    }
    let mut lower = ch.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(single), None) => single,
        _ => ch,
    }
}

struct Compiler {
    insts: Vec<Inst>,
    sets: Vec<CharSet>,
    reg_count: usize,
    ignore_case: bool,
    dot_all: bool,
    match_start_slot: usize,
    match_end_slot: usize,
}

impl Compiler {
    fn pc(&self) -> usize {
        self.insts.len()
    }

    /// Append an instruction; `offset` is reported if the program grows too large.
    fn push(&mut self, inst: Inst, offset: usize) -> Result<usize, PatternError> {
        if self.insts.len() >= MAX_PROGRAM_LEN {
            return Err(PatternError::new(offset, PatternErrorKind::RepetitionTooLarge));
        }
        self.insts.push(inst);
        Ok(self.insts.len() - 1)
    }

    fn patch(&mut self, at: usize, target: usize) {
        match &mut self.insts[at] {
            Inst::Split(_, second) => *second = target,
            Inst::Jmp(dest) => *dest = target,
            Inst::Look { next, .. } => *next = target,
            _ => {}
        }
    }

    fn node(&mut self, node: &Node, offset: usize) -> Result<(), PatternError> {
        match node {
            Node::Empty => {}
            Node::Literal(ch) => {
                let inst = if self.ignore_case {
                    Inst::CharFold(fold(*ch))
                } else {
                    Inst::Char(*ch)
                };
                self.push(inst, offset)?;
            }
            Node::Dot => {
                let inst = if self.dot_all { Inst::Any } else { Inst::AnyExceptNewline };
                self.push(inst, offset)?;
            }
            Node::Class(class) => {
                self.push(Inst::Class(*class), offset)?;
            }
            Node::Set(set) => {
                self.sets.push(set.clone());
                self.push(Inst::Set(self.sets.len() - 1), offset)?;
            }
            Node::Assert(assertion) => {
                self.push(Inst::Assert(*assertion), offset)?;
            }
            Node::MatchStart => {
                self.push(Inst::Save(self.match_start_slot), offset)?;
            }
            Node::MatchEnd => {
                self.push(Inst::Save(self.match_end_slot), offset)?;
            }
            Node::Group { index, node, .. } => match index {
                Some(index) => {
                    self.push(Inst::Save(2 * index), offset)?;
                    self.node(node, offset)?;
                    self.push(Inst::Save(2 * index + 1), offset)?;
                }
                None => self.node(node, offset)?,
            },
            Node::Backref(group) => {
                self.push(Inst::Backref(*group), offset)?;
            }
            Node::Repeat { node, min, max, greedy, offset } => {
                self.repeat(node, *min, *max, *greedy, *offset)?;
            }
            Node::Concat(nodes) => {
                for node in nodes {
                    self.node(node, offset)?;
                }
            }
            Node::Alternate(branches) => self.alternate(branches, offset)?,
            Node::Look { behind, negated, node } => {
                let (min_width, max_width) = node.char_width();
                let look = self.push(
                    Inst::Look {
                        behind: *behind,
                        negated: *negated,
                        next: 0,
                        min_width,
                        max_width,
                    },
                    offset,
                )?;
                self.node(node, offset)?;
                self.push(Inst::SubMatch, offset)?;
                let next = self.pc();
                self.patch(look, next);
            }
        }
        Ok(())
    }

    fn alternate(&mut self, branches: &[Node], offset: usize) -> Result<(), PatternError> {
        let mut exits = Vec::with_capacity(branches.len());
        for (i, branch) in branches.iter().enumerate() {
            if i + 1 == branches.len() {
                self.node(branch, offset)?;
                break;
            }
            let split = self.push(Inst::Split(0, 0), offset)?;
            let body = self.pc();
            if let Inst::Split(first, _) = &mut self.insts[split] {
                *first = body;
            }
            self.node(branch, offset)?;
            exits.push(self.push(Inst::Jmp(0), offset)?);
            let next = self.pc();
            self.patch(split, next);
        }
        let end = self.pc();
        for exit in exits {
            self.patch(exit, end);
        }
        Ok(())
    }

    fn repeat(
        &mut self,
        node: &Node,
        min: u32,
        max: Option<u32>,
        greedy: bool,
        offset: usize,
    ) -> Result<(), PatternError> {
        for _ in 0..min {
            self.node(node, offset)?;
        }
        match max {
            None => {
                let reg = self.reg_count;
                self.reg_count += 1;
                let split = self.push(Inst::Split(0, 0), offset)?;
                let body = self.pc();
                self.push(Inst::LoopMark(reg), offset)?;
                self.node(node, offset)?;
                self.push(Inst::LoopCheck(reg), offset)?;
                self.push(Inst::Jmp(split), offset)?;
                let exit = self.pc();
                self.insts[split] = split_for(greedy, body, exit);
            }
            Some(max) => {
                let mut splits = Vec::new();
                for _ in min..max {
                    let split = self.push(Inst::Split(0, 0), offset)?;
                    splits.push((split, self.pc()));
                    self.node(node, offset)?;
                }
                let exit = self.pc();
                for (split, body) in splits {
                    self.insts[split] = split_for(greedy, body, exit);
                }
            }
        }
        Ok(())
    }
}

fn split_for(greedy: bool, body: usize, exit: usize) -> Inst {
    if greedy {
        Inst::Split(body, exit)
    } else {
        Inst::Split(exit, body)
    }
}

fn first_char(node: &Node) -> Option<char> {
    match node {
        Node::Literal(ch) => Some(*ch),
        Node::Group { node, .. } => first_char(node),
        Node::Repeat { node, min, .. } if *min >= 1 => first_char(node),
        Node::Concat(nodes) => nodes.first().and_then(first_char),
        _ => None,
    }
}

fn starts_with_start_anchor(node: &Node) -> bool {
    match node {
        Node::Assert(Assertion::Start) => true,
        Node::Group { node, .. } => starts_with_start_anchor(node),
        Node::Concat(nodes) => nodes.first().is_some_and(starts_with_start_anchor),
        Node::Alternate(branches) => branches.iter().all(starts_with_start_anchor),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    fn program(pattern: &str) -> Program {
        let ast = parse(pattern, false).unwrap();
        compile(ast, &Flags::default(), false).unwrap()
    }

    #[test]
    fn test_fold() {
        assert_eq!(fold('A'), 'a');
        assert_eq!(fold('Ä'), 'ä');
        assert_eq!(fold('7'), '7');
    }

    #[test]
    fn test_slots_include_match_start_and_end() {
        let prog = program("(a)(b)");
        assert_eq!(prog.group_count, 2);
        assert_eq!(prog.slot_count, 8);
        assert_eq!(prog.match_start_slot, 6);
        assert_eq!(prog.match_end_slot, 7);
    }

    #[test]
    fn test_prefilter_and_anchor_detection() {
        assert_eq!(program("foo|bar").first_char, None);
        assert_eq!(program("(f)oo").first_char, Some('f'));
        assert!(program("^abc").anchored_start);
        assert!(!program("a^").anchored_start);
    }

    #[test]
    fn test_program_size_is_capped() {
        let ast = parse("(a{1000}){1000}", false).unwrap();
        let err = compile(ast, &Flags::default(), false).unwrap_err();
        assert_eq!(err.kind, PatternErrorKind::RepetitionTooLarge);
    }
}
