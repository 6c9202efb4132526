//! The loop-control state machine.
//!
//! Each target run owns one machine, so `break`/`continue` can never
//! escape the target that contains them. Active loops form a flat list;
//! the ordinal of a loop is its index in that list (outer loops have
//! smaller ordinals). A `break` or `continue` records the ordinal of its
//! target loop; after every statement an enclosing block decides whether
//! to exit its body, and the loop driver decides whether to stop
//! iterating, consuming the indices once the targeted loop is reached.

use crate::error::ErrorKind;

#[derive(Debug, Default)]
pub struct LoopMachine {
    /// Labels of active loops, indexed by ordinal; unlabeled loops hold
    /// `None`.
    loops: Vec<Option<String>>,
    break_to: Option<usize>,
    continue_to: Option<usize>,
    /// Ordinals of the loops currently executing their body, innermost
    /// last.
    stack: Vec<usize>,
}

impl LoopMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a loop, returning its ordinal.
    pub fn register(&mut self, label: Option<&str>) -> usize {
        self.loops.push(label.map(str::to_string));
        self.loops.len() - 1
    }

    pub fn unregister(&mut self, index: usize) {
        debug_assert!(index < self.loops.len(), "loop index out of range");
        self.loops.remove(index);
    }

    pub fn enter(&mut self, index: usize) {
        self.stack.push(index);
    }

    pub fn exit(&mut self) {
        self.stack.pop();
    }

    /// The ordinal of the innermost loop currently executing, if any.
    pub fn current(&self) -> Option<usize> {
        self.stack.last().copied()
    }

    fn find(&self, label: &str) -> Result<usize, ErrorKind> {
        self.loops
            .iter()
            .position(|l| l.as_deref() == Some(label))
            .ok_or_else(|| ErrorKind::UnknownLabel(label.to_string()))
    }

    pub fn break_with(&mut self, label: Option<&str>) -> Result<(), ErrorKind> {
        self.break_to = Some(match label {
            Some(l) => self.find(l)?,
            None => match self.loops.len() {
                0 => return Err(ErrorKind::NotInLoop("break")),
                n => n - 1,
            },
        });
        Ok(())
    }

    pub fn continue_with(&mut self, label: Option<&str>) -> Result<(), ErrorKind> {
        self.continue_to = Some(match label {
            Some(l) => self.find(l)?,
            None => match self.loops.len() {
                0 => return Err(ErrorKind::NotInLoop("continue")),
                n => n - 1,
            },
        });
        Ok(())
    }

    /// Whether the loop with this ordinal must stop iterating: a break
    /// targets it or an outer loop, or a continue targets an outer loop.
    pub fn should_break(&self, index: usize) -> bool {
        self.break_to.is_some_and(|b| b <= index)
            || self.continue_to.is_some_and(|c| c < index)
    }

    /// Whether a statement block inside the loop with this ordinal must
    /// return early: any break out of it, or a continue targeting it or an
    /// outer loop.
    pub fn should_exit_block(&self, index: usize) -> bool {
        self.should_break(index) || self.continue_to == Some(index)
    }

    /// True when the pending break targets exactly this loop, meaning the
    /// loop consumes it rather than propagating outward.
    pub fn break_consumed_by(&self, index: usize) -> bool {
        self.break_to == Some(index)
    }

    pub fn reset(&mut self) {
        self.break_to = None;
        self.continue_to = None;
    }
}
