//! Statement execution.
//!
//! Blocks run statements in order. When a block belongs to a loop, every
//! statement is followed by the loop-control check: if a pending break or
//! continue targets this loop or an outer one, the block returns early,
//! otherwise stale indices are reset. Loop drivers then decide whether to
//! stop iterating, consuming a break that targets them exactly.

use cook_types::{Key, Kind, Value};
use tracing::trace;

use crate::ast::{Block, ElseArm, Expr, ExprKind, ForKind, ForStmt, IfStmt, Stmt, StmtKind};
use crate::error::{ErrorKind, EvalError};
use crate::token::Token;

use super::coerce;
use super::invoke::OutputMode;
use super::Interpreter;

/// Non-error control flow out of a statement.
#[derive(Debug)]
pub(crate) enum Flow {
    Normal,
    Return(Value),
}

impl<'p> Interpreter<'p> {
    pub(crate) fn exec_block(&mut self, block: &Block) -> Result<Flow, EvalError> {
        for stmt in block {
            match self.exec_stmt(stmt)? {
                Flow::Return(v) => return Ok(Flow::Return(v)),
                Flow::Normal => {}
            }
            if let Some(machine) = self.machine() {
                if let Some(current) = machine.current() {
                    if machine.should_exit_block(current) {
                        return Ok(Flow::Normal);
                    }
                    self.machine_mut().expect("machine exists").reset();
                }
            }
        }
        Ok(Flow::Normal)
    }

    pub(crate) fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Flow, EvalError> {
        self.set_pos(&stmt.pos);
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                // a bare invocation streams its output instead of
                // capturing it
                match &expr.kind {
                    ExprKind::Pipeline(calls) => {
                        self.set_pos(&expr.pos);
                        self.eval_pipeline(calls, OutputMode::Stream)?;
                    }
                    _ => {
                        self.eval(expr)?;
                    }
                }
                Ok(Flow::Normal)
            }

            StmtKind::Assign { name, op, value } => {
                self.exec_assign(name, *op, value)?;
                Ok(Flow::Normal)
            }

            StmtKind::If(ifs) => self.exec_if(ifs),

            StmtKind::For(fs) => self.exec_for(fs),

            StmtKind::Break { label } => {
                let machine = self
                    .machines
                    .last_mut()
                    .ok_or_else(|| EvalError::new(stmt.pos.position(), ErrorKind::NotInLoop("break")))?;
                machine
                    .break_with(label.as_deref())
                    .map_err(|k| EvalError::new(stmt.pos.position(), k))?;
                Ok(Flow::Normal)
            }

            StmtKind::Continue { label } => {
                let machine = self.machines.last_mut().ok_or_else(|| {
                    EvalError::new(stmt.pos.position(), ErrorKind::NotInLoop("continue"))
                })?;
                machine
                    .continue_with(label.as_deref())
                    .map_err(|k| EvalError::new(stmt.pos.position(), k))?;
                Ok(Flow::Normal)
            }

            StmtKind::Return(expr) => {
                let v = match expr {
                    Some(e) => self.eval(e)?,
                    None => Value::Nil,
                };
                Ok(Flow::Return(v))
            }

            StmtKind::Exit(expr) => {
                let v = self.eval(expr)?;
                let code = coerce::to_int(&v).map_err(|k| self.err(k))?;
                Err(self.err(ErrorKind::Exit(code as i32)))
            }

            StmtKind::Delete { name, indexes, end } => {
                self.exec_delete(name, indexes, end.as_ref())?;
                Ok(Flow::Normal)
            }

            StmtKind::Redirect {
                call,
                files,
                append,
            } => {
                self.exec_redirect(call, files, *append)?;
                Ok(Flow::Normal)
            }
        }
    }

    fn exec_assign(&mut self, name: &str, op: Token, value: &Expr) -> Result<(), EvalError> {
        // invocation results are captured into the binding, not streamed
        let rhs = self.eval(value)?;
        trace!(name, %rhs, "assign");
        match op.assign_op() {
            None => self.scope.assign(name, rhs).map_err(|k| self.err(k)),
            Some(bin) => {
                let current = match self.scope.lookup(name) {
                    Some((v, _)) if !v.is_nil() => v,
                    _ => {
                        return Err(
                            self.err(ErrorKind::UnboundVariable(name.to_string()))
                        )
                    }
                };
                let combined = match bin {
                    Token::Add => coerce::add(current, rhs),
                    other => coerce::arithmetic(other, current, rhs),
                }
                .map_err(|k| self.err(k))?;
                self.scope.assign(name, combined).map_err(|k| self.err(k))
            }
        }
    }

    fn exec_if(&mut self, ifs: &IfStmt) -> Result<Flow, EvalError> {
        let cond = self.eval(&ifs.cond)?;
        let chosen = match cond {
            Value::Bool(true) => Some(&ifs.body),
            Value::Bool(false) => match &ifs.otherwise {
                Some(ElseArm::If(next)) => return self.exec_if(next),
                Some(ElseArm::Block(b)) => Some(b),
                None => None,
            },
            other => {
                return Err(self.err(ErrorKind::TypeMismatch(format!(
                    "{other} is not a boolean expression"
                ))))
            }
        };
        match chosen {
            Some(block) => {
                self.scope.push_frame();
                let flow = self.exec_block(block);
                self.scope.pop_frame();
                flow
            }
            None => Ok(Flow::Normal),
        }
    }

    fn exec_for(&mut self, fs: &ForStmt) -> Result<Flow, EvalError> {
        if self.machines.is_empty() {
            return Err(self.err(ErrorKind::NotInLoop("for")));
        }
        let machine = self.machine_mut().expect("checked");
        let index = machine.register(fs.label.as_deref());
        machine.enter(index);
        self.scope.push_frame();

        let result = self.run_for_kind(fs, index);

        self.scope.pop_frame();
        let machine = self.machine_mut().expect("checked");
        machine.exit();
        machine.unregister(index);
        result
    }

    fn run_for_kind(&mut self, fs: &ForStmt, index: usize) -> Result<Flow, EvalError> {
        match &fs.kind {
            ForKind::Loop => loop {
                if let Flow::Return(v) = self.exec_block(&fs.body)? {
                    return Ok(Flow::Return(v));
                }
                if self.loop_finished(index) {
                    return Ok(Flow::Normal);
                }
            },

            ForKind::Range { var, interval } => self.run_range_loop(fs, var, interval, index),

            ForKind::Collection { key, value, expr } => {
                let coll = self.eval(expr)?;
                match coll {
                    Value::List(items) => {
                        for (i, item) in items.into_iter().enumerate() {
                            self.scope.insert_local(key.clone(), Value::Int(i as i64));
                            if let Some(v) = value {
                                self.scope.insert_local(v.clone(), item);
                            }
                            if let Flow::Return(v) = self.exec_block(&fs.body)? {
                                return Ok(Flow::Return(v));
                            }
                            if self.loop_finished(index) {
                                break;
                            }
                        }
                        Ok(Flow::Normal)
                    }
                    Value::Map(map) => {
                        for (k, item) in map {
                            self.scope.insert_local(key.clone(), k.to_value());
                            if let Some(v) = value {
                                self.scope.insert_local(v.clone(), item);
                            }
                            if let Flow::Return(v) = self.exec_block(&fs.body)? {
                                return Ok(Flow::Return(v));
                            }
                            if self.loop_finished(index) {
                                break;
                            }
                        }
                        Ok(Flow::Normal)
                    }
                    other => Err(self.err(ErrorKind::NotIterable(other.to_string()))),
                }
            }
        }
    }

    /// A range loop pins its induction variable to `int64` and re-reads it
    /// after every iteration, so the body can reassign it to skip ahead.
    fn run_range_loop(
        &mut self,
        fs: &ForStmt,
        var: &str,
        interval: &Expr,
        index: usize,
    ) -> Result<Flow, EvalError> {
        let ExprKind::Interval {
            a,
            b,
            incl_a,
            incl_b,
        } = &interval.kind
        else {
            return Err(self.err(ErrorKind::TypeMismatch(
                "range loop requires an interval".into(),
            )));
        };
        let av = self.eval(a)?;
        let bv = self.eval(b)?;
        let (Value::Int(a), Value::Int(b)) = (&av, &bv) else {
            return Err(self.err(ErrorKind::TypeMismatch(format!(
                "unsupported range value {av}..{bv}, endpoints must be integers"
            ))));
        };
        let (a, b) = (*a, *b);
        let descending = a > b;
        let step: i64 = if descending { -1 } else { 1 };
        let first = if *incl_a { a } else { a + step };
        let last = if *incl_b { b } else { b - step };

        let previous_pin = self.scope.restrict(var, Kind::Int);
        let result = self.drive_range_loop(fs, var, index, first, last, step, descending);
        self.scope.unrestrict(var, previous_pin);
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn drive_range_loop(
        &mut self,
        fs: &ForStmt,
        var: &str,
        index: usize,
        first: i64,
        last: i64,
        step: i64,
        descending: bool,
    ) -> Result<Flow, EvalError> {
        let mut cur = first;
        loop {
            if (descending && cur < last) || (!descending && cur > last) {
                return Ok(Flow::Normal);
            }
            self.scope.insert_local(var.to_string(), Value::Int(cur));
            if let Flow::Return(v) = self.exec_block(&fs.body)? {
                return Ok(Flow::Return(v));
            }
            if self.loop_finished(index) {
                return Ok(Flow::Normal);
            }
            // a reassigned induction variable resumes iteration from its
            // new value
            cur = match self.scope.lookup(var) {
                Some((Value::Int(i), _)) => i + step,
                _ => cur + step,
            };
        }
    }

    /// After one iteration: stop when a pending break/continue targets
    /// this loop or an outer one; a break for exactly this loop is
    /// consumed here. Otherwise clear the indices for the next iteration.
    fn loop_finished(&mut self, index: usize) -> bool {
        let machine = self.machine_mut().expect("inside a target");
        if machine.should_break(index) {
            if machine.break_consumed_by(index) {
                machine.reset();
            }
            true
        } else {
            machine.reset();
            false
        }
    }

    fn exec_delete(
        &mut self,
        name: &str,
        indexes: &[Expr],
        end: Option<&Expr>,
    ) -> Result<(), EvalError> {
        let (current, _) = self
            .scope
            .lookup(name)
            .ok_or_else(|| self.err(ErrorKind::UnboundVariable(name.to_string())))?;
        let updated = match current {
            Value::List(mut items) => {
                if let Some(end) = end {
                    let from = coerce::to_int(&self.eval(&indexes[0])?).map_err(|k| self.err(k))?;
                    let to = coerce::to_int(&self.eval(end)?).map_err(|k| self.err(k))?;
                    let from = from.max(0) as usize;
                    let to = (to.max(0) as usize).min(items.len().saturating_sub(1));
                    if from < items.len() && from <= to {
                        items.drain(from..=to);
                    }
                } else {
                    let mut targets = Vec::with_capacity(indexes.len());
                    for ix in indexes {
                        let v = self.eval(ix)?;
                        targets.push(coerce::to_int(&v).map_err(|k| self.err(k))?);
                    }
                    targets.sort_unstable();
                    targets.dedup();
                    for &i in targets.iter().rev() {
                        if i >= 0 && (i as usize) < items.len() {
                            items.remove(i as usize);
                        }
                    }
                }
                Value::List(items)
            }
            Value::Map(mut map) => {
                if end.is_some() {
                    return Err(self.err(ErrorKind::TypeMismatch(
                        "delete range is only supported on arrays".into(),
                    )));
                }
                for ix in indexes {
                    let kv = self.eval(ix)?;
                    if let Some(key) = Key::from_value(&kv) {
                        map.shift_remove(&key);
                    }
                }
                Value::Map(map)
            }
            other => {
                return Err(self.err(ErrorKind::TypeMismatch(format!(
                    "delete is not supported for value {other}"
                ))))
            }
        };
        self.scope.assign(name, updated).map_err(|k| self.err(k))
    }
}
