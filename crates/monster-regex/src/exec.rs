//! Backtracking interpreter for compiled programs.
//!
//! The interpreter keeps an explicit stack of frames instead of recursing, so
//! deep inputs cannot overflow the call stack. Only lookaround recurses, and
//! that depth is bounded by the pattern's nesting.

use crate::ast::{is_word_char, Assertion, CharSet, SetItem};
use crate::compile::{fold, Inst, Program};
use crate::error::MatchError;
use crate::haystack::Haystack;
use crate::matcher::MatchContext;

enum Frame {
    Try { pc: usize, pos: usize },
    RestoreSlot { slot: usize, old: Option<usize> },
    RestoreReg { reg: usize, old: usize },
}

pub(crate) type Slots = Vec<Option<usize>>;

pub(crate) struct Executor<'a, H: Haystack + ?Sized> {
    prog: &'a Program,
    hay: &'a H,
    ctx: &'a MatchContext,
    limit: u64,
    steps: u64,
    attempt_start: usize,
    regs: Vec<usize>,
    slots: Slots,
    spare: Vec<Vec<Frame>>,
}

impl<'a, H: Haystack + ?Sized> Executor<'a, H> {
    pub(crate) fn new(prog: &'a Program, hay: &'a H, ctx: &'a MatchContext, limit: u64) -> Self {
        Self {
            prog,
            hay,
            ctx,
            limit,
            steps: 0,
            attempt_start: 0,
            regs: vec![usize::MAX; prog.reg_count],
            slots: vec![None; prog.slot_count],
            spare: Vec::new(),
        }
    }

    /// Whether an attempt at `pos` can possibly succeed.
    pub(crate) fn viable_start(&self, pos: usize) -> bool {
        if self.prog.anchored_start && pos != 0 {
            return false;
        }
        match self.prog.first_char {
            Some(first) => matches!(self.hay.char_at(pos), Some((ch, _)) if ch == first),
            None => true,
        }
    }

    /// Run one anchored attempt at `start`, returning the capture slots on success.
    ///
    /// The backtracking budget is per attempt.
    pub(crate) fn attempt(&mut self, start: usize) -> Result<Option<Slots>, MatchError> {
        self.steps = 0;
        self.attempt_start = start;
        self.regs.fill(usize::MAX);
        let mut slots = std::mem::take(&mut self.slots);
        slots.fill(None);
        slots[0] = Some(start);
        let outcome = self.run(0, start, &mut slots, None);
        let result = match outcome {
            Ok(Some(_)) => Ok(Some(slots.clone())),
            Ok(None) => Ok(None),
            Err(err) => Err(err),
        };
        self.slots = slots;
        result
    }

    fn tick(&mut self) -> Result<(), MatchError> {
        self.steps += 1;
        if self.steps > self.limit {
            return Err(MatchError::BacktrackLimitExceeded { limit: self.limit });
        }
        Ok(())
    }

    fn run(
        &mut self,
        pc: usize,
        pos: usize,
        slots: &mut [Option<usize>],
        target_end: Option<usize>,
    ) -> Result<Option<usize>, MatchError> {
        let mut stack = self.spare.pop().unwrap_or_default();
        stack.push(Frame::Try { pc, pos });
        let result = self.drive(&mut stack, slots, target_end);
        stack.clear();
        self.spare.push(stack);
        result
    }

    fn drive(
        &mut self,
        stack: &mut Vec<Frame>,
        slots: &mut [Option<usize>],
        target_end: Option<usize>,
    ) -> Result<Option<usize>, MatchError> {
        let prog = self.prog;
        let mut initial = true;
        while let Some(frame) = stack.pop() {
            let (mut pc, mut pos) = match frame {
                Frame::Try { pc, pos } => {
                    if !std::mem::take(&mut initial) {
                        self.tick()?;
                    }
                    (pc, pos)
                }
                Frame::RestoreSlot { slot, old } => {
                    slots[slot] = old;
                    continue;
                }
                Frame::RestoreReg { reg, old } => {
                    self.regs[reg] = old;
                    continue;
                }
            };
            loop {
                match &prog.insts[pc] {
                    inst @ (Inst::Char(_)
                    | Inst::CharFold(_)
                    | Inst::Any
                    | Inst::AnyExceptNewline
                    | Inst::Class(_)
                    | Inst::Set(_)) => match self.consume(inst, pos) {
                        Some(next) => {
                            pos = next;
                            pc += 1;
                        }
                        None => break,
                    },
                    Inst::Assert(assertion) => {
                        if !self.assert(*assertion, pos) {
                            break;
                        }
                        pc += 1;
                    }
                    Inst::Save(slot) => {
                        stack.push(Frame::RestoreSlot { slot: *slot, old: slots[*slot] });
                        slots[*slot] = Some(pos);
                        pc += 1;
                    }
                    Inst::Split(first, second) => {
                        stack.push(Frame::Try { pc: *second, pos });
                        pc = *first;
                    }
                    Inst::Jmp(target) => pc = *target,
                    Inst::Backref(group) => match self.backref(*group, pos, slots) {
                        Some(next) => {
                            pos = next;
                            pc += 1;
                        }
                        None => break,
                    },
                    Inst::LoopMark(reg) => {
                        stack.push(Frame::RestoreReg { reg: *reg, old: self.regs[*reg] });
                        self.regs[*reg] = pos;
                        pc += 1;
                    }
                    Inst::LoopCheck(reg) => {
                        if self.regs[*reg] == pos {
                            break;
                        }
                        pc += 1;
                    }
                    Inst::Look { behind, negated, next, min_width, max_width } => {
                        let found = self.look(pc + 1, pos, *behind, *min_width, *max_width, slots)?;
                        match found {
                            Some(sub) if !*negated => {
                                for (slot, value) in sub.into_iter().enumerate() {
                                    if slots[slot] != value {
                                        stack.push(Frame::RestoreSlot { slot, old: slots[slot] });
                                        slots[slot] = value;
                                    }
                                }
                                pc = *next;
                            }
                            None if *negated => pc = *next,
                            _ => break,
                        }
                    }
                    Inst::SubMatch => {
                        if target_end.is_none_or(|end| end == pos) {
                            return Ok(Some(pos));
                        }
                        break;
                    }
                    Inst::Match => return Ok(Some(pos)),
                }
            }
        }
        Ok(None)
    }

    fn consume(&self, inst: &Inst, pos: usize) -> Option<usize> {
        let (ch, len) = self.hay.char_at(pos)?;
        let ok = match inst {
            Inst::Char(expected) => ch == *expected,
            Inst::CharFold(expected) => fold(ch) == *expected,
            Inst::Any => true,
            Inst::AnyExceptNewline => ch != '\n',
            Inst::Class(class) => class.matches(ch, self.prog.unicode),
            Inst::Set(index) => self.set_matches(&self.prog.sets[*index], ch),
            _ => false,
        };
        ok.then_some(pos + len)
    }

    fn set_matches(&self, set: &CharSet, ch: char) -> bool {
        let ignore_case = self.prog.ignore_case;
        let folded = fold(ch);
        let upper = ch.to_uppercase().next().unwrap_or(ch);
        let hit = set.items.iter().any(|item| match *item {
            SetItem::Char(c) => c == ch || (ignore_case && fold(c) == folded),
            SetItem::Range(lo, hi) => {
                let within = |c: char| lo <= c && c <= hi;
                within(ch) || (ignore_case && (within(folded) || within(upper)))
            }
            SetItem::Class(class) => class.matches(ch, self.prog.unicode),
        });
        hit != set.negated
    }

    fn is_word_at(&self, pos: usize) -> bool {
        matches!(self.hay.char_at(pos), Some((ch, _)) if is_word_char(ch, self.prog.unicode))
    }

    fn is_word_before(&self, pos: usize) -> bool {
        matches!(self.hay.char_before(pos), Some((ch, _)) if is_word_char(ch, self.prog.unicode))
    }

    fn assert(&self, assertion: Assertion, pos: usize) -> bool {
        let hay = self.hay;
        match assertion {
            Assertion::Start => {
                pos == 0 || (self.prog.multiline && matches!(hay.char_before(pos), Some(('\n', _))))
            }
            Assertion::End => {
                pos == hay.len()
                    || (self.prog.multiline
                        && match hay.char_at(pos) {
                            Some(('\n', _)) => true,
                            Some(('\r', len)) => matches!(hay.char_at(pos + len), Some(('\n', _))),
                            _ => false,
                        })
            }
            Assertion::WordStart => !self.is_word_before(pos) && self.is_word_at(pos),
            Assertion::WordEnd => self.is_word_before(pos) && !self.is_word_at(pos),
            Assertion::WordBoundary => self.is_word_before(pos) != self.is_word_at(pos),
            Assertion::Line(cmp, line) => cmp.holds(hay.line_of(pos) + 1, line),
            Assertion::Column(cmp, column) => cmp.holds(hay.column_of(pos) + 1, column),
            Assertion::CursorLine => hay.line_of(pos) == self.ctx.current_line,
            Assertion::CursorColumn => hay.column_of(pos) == self.ctx.current_column,
            Assertion::Cursor => pos == self.ctx.cursor_offset,
        }
    }

    fn backref(&self, group: usize, pos: usize, slots: &[Option<usize>]) -> Option<usize> {
        let (start, end) = if group == 0 {
            (self.attempt_start, pos)
        } else {
            match (slots[2 * group], slots[2 * group + 1]) {
                (Some(start), Some(end)) if start <= end => (start, end),
                // An unset group matches the empty string.
                _ => return Some(pos),
            }
        };
        let mut src = start;
        let mut cur = pos;
        while src < end {
            let (expected, expected_len) = self.hay.char_at(src)?;
            let (actual, actual_len) = self.hay.char_at(cur)?;
            if expected != actual && !(self.prog.ignore_case && fold(expected) == fold(actual)) {
                return None;
            }
            src += expected_len;
            cur += actual_len;
        }
        Some(cur)
    }

    /// Evaluate a lookaround body starting at `body`.
    ///
    /// Lookbehind tries every start position whose distance from `pos` fits
    /// the body's character width, requiring the body to end exactly at `pos`.
    /// Each body run and each step back costs one unit of the budget.
    fn look(
        &mut self,
        body: usize,
        pos: usize,
        behind: bool,
        min_width: usize,
        max_width: Option<usize>,
        slots: &[Option<usize>],
    ) -> Result<Option<Slots>, MatchError> {
        let mut sub = slots.to_vec();
        if !behind {
            self.tick()?;
            return Ok(self.run(body, pos, &mut sub, None)?.map(|_| sub));
        }
        let mut start = pos;
        let mut width = 0;
        loop {
            self.tick()?;
            if width >= min_width {
                sub.copy_from_slice(slots);
                if self.run(body, start, &mut sub, Some(pos))?.is_some() {
                    return Ok(Some(sub));
                }
            }
            if max_width.is_some_and(|max| width >= max) {
                break;
            }
            match self.hay.char_before(start) {
                Some((_, len)) => {
                    start -= len;
                    width += 1;
                }
                None => break,
            }
        }
        Ok(None)
    }
}
