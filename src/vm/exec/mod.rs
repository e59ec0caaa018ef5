//! The fetch-decode-dispatch loop.
//!
//! `execute` runs one code block over the shared value stack. It
//! recurses for user-call bodies and `for`-`in` bodies; everything else
//! is a flat loop. Control transfers that cross block boundaries come
//! back as [`Flow`] values checked by the callers — they are state
//! transitions, not errors, and never unwind past `Vm::run`.
//!
//! Branch operands are relative to the instruction after the branch, so
//! any sub-slice of a block executes correctly from index zero — which
//! is exactly how `for`-`in` bodies run.

mod call;
mod io;

use std::cmp::Ordering;

use crate::ast::{AugOp, SpecialVar};
use crate::vm::instr::Instr;
use crate::vm::stack::StackOps;
use crate::vm::value::Value;
use crate::vm::{Vm, VmError};

/// Result of executing a code block.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Flow {
    Normal,
    /// `break` directly inside a for-in body.
    Break,
    Next,
    NextFile,
    Exit,
    Return,
}

/// The loop variable destination of a for-in opcode.
enum ForInVar {
    Global(usize),
    Local(usize),
    Special(SpecialVar),
}

fn jump(ip: usize, off: i32) -> usize {
    (ip as i64 + off as i64) as usize
}

pub(super) fn arith(op: AugOp, l: f64, r: f64) -> Result<f64, VmError> {
    Ok(match op {
        AugOp::Add => l + r,
        AugOp::Subtract => l - r,
        AugOp::Multiply => l * r,
        AugOp::Divide => {
            if r == 0.0 {
                return Err(VmError::DivisionByZero);
            }
            l / r
        }
        AugOp::Modulo => {
            if r == 0.0 {
                return Err(VmError::DivisionByZeroMod);
            }
            l % r
        }
        AugOp::Power => l.powf(r),
    })
}

impl Vm<'_> {
    pub(crate) fn execute(&mut self, code: &[Instr]) -> Result<Flow, VmError> {
        let mut ip = 0usize;
        while ip < code.len() {
            let instr = &code[ip];
            ip += 1;
            match instr {
                // ── constants ────────────────────────────────────────────
                Instr::Num(i) => self.stack.push(Value::num(self.program.nums[*i])),
                Instr::Str(i) => self.stack.push(Value::str(self.program.strs[*i].clone())),
                Instr::Regex(i) => {
                    let line = self.record.line(&self.ofs).as_str(&self.convfmt);
                    let matched = self.regex_pool[*i].is_match(&line);
                    self.push_bool(matched);
                }
                Instr::Nulls(n) => {
                    for _ in 0..*n {
                        self.stack.push(Value::Null);
                    }
                }

                // ── scalars ──────────────────────────────────────────────
                Instr::Global(g) => self.stack.push(self.globals[*g].clone()),
                Instr::Local(l) => {
                    let slot = self.local_slot(*l)?;
                    let v = self.stack[slot].clone();
                    self.stack.push(v);
                }
                Instr::Special(sv) => {
                    let v = self.get_special(*sv)?;
                    self.stack.push(v);
                }
                Instr::AssignGlobal(g) => {
                    self.globals[*g] = self.stack.pop_value()?;
                }
                Instr::AssignLocal(l) => {
                    let v = self.stack.pop_value()?;
                    let slot = self.local_slot(*l)?;
                    self.stack[slot] = v;
                }
                Instr::AssignSpecial(sv) => {
                    let v = self.stack.pop_value()?;
                    self.set_special(*sv, v)?;
                }
                Instr::AugGlobal(op, g) => {
                    let r = self.stack.pop_num()?;
                    let l = self.globals[*g].as_num();
                    self.globals[*g] = Value::num(arith(*op, l, r)?);
                }
                Instr::AugLocal(op, l) => {
                    let r = self.stack.pop_num()?;
                    let slot = self.local_slot(*l)?;
                    let cur = self.stack[slot].as_num();
                    self.stack[slot] = Value::num(arith(*op, cur, r)?);
                }
                Instr::AugSpecial(op, sv) => {
                    let r = self.stack.pop_num()?;
                    let l = self.get_special(*sv)?.as_num();
                    self.set_special(*sv, Value::num(arith(*op, l, r)?))?;
                }
                Instr::IncrGlobal(by, g) => {
                    let n = self.globals[*g].as_num() + *by as f64;
                    self.globals[*g] = Value::num(n);
                }
                Instr::IncrLocal(by, l) => {
                    let slot = self.local_slot(*l)?;
                    let n = self.stack[slot].as_num() + *by as f64;
                    self.stack[slot] = Value::num(n);
                }
                Instr::IncrSpecial(by, sv) => {
                    let n = self.get_special(*sv)?.as_num() + *by as f64;
                    self.set_special(*sv, Value::num(n))?;
                }

                // ── fields ───────────────────────────────────────────────
                Instr::Field => {
                    let idx = Self::field_index(&self.stack.pop_value()?)?;
                    let v = self.get_field(idx)?;
                    self.stack.push(v);
                }
                Instr::FieldNum(k) => {
                    let v = self.get_field(*k as i64)?;
                    self.stack.push(v);
                }
                Instr::AssignField => {
                    let idx = Self::field_index(&self.stack.pop_value()?)?;
                    let v = self.stack.pop_value()?;
                    self.set_field_value(idx, v)?;
                }
                Instr::AugField(op) => {
                    let r = self.stack.pop_num()?;
                    let idx = Self::field_index(&self.stack.pop_value()?)?;
                    let l = self.get_field(idx)?.as_num();
                    self.set_field_value(idx, Value::num(arith(*op, l, r)?))?;
                }
                Instr::IncrField(by) => {
                    let idx = Self::field_index(&self.stack.pop_value()?)?;
                    let n = self.get_field(idx)?.as_num() + *by as f64;
                    self.set_field_value(idx, Value::num(n))?;
                }

                // ── arrays ───────────────────────────────────────────────
                Instr::ArrayGlobal(a) => self.array_get(crate::ast::Array::Global(*a))?,
                Instr::ArrayLocal(a) => self.array_get(crate::ast::Array::Local(*a))?,
                Instr::AssignArrayGlobal(a) => {
                    self.array_assign(crate::ast::Array::Global(*a))?
                }
                Instr::AssignArrayLocal(a) => self.array_assign(crate::ast::Array::Local(*a))?,
                Instr::AugArrayGlobal(op, a) => {
                    self.array_aug(*op, crate::ast::Array::Global(*a))?
                }
                Instr::AugArrayLocal(op, a) => self.array_aug(*op, crate::ast::Array::Local(*a))?,
                Instr::IncrArrayGlobal(by, a) => {
                    self.array_incr(*by, crate::ast::Array::Global(*a))?
                }
                Instr::IncrArrayLocal(by, a) => {
                    self.array_incr(*by, crate::ast::Array::Local(*a))?
                }
                Instr::InGlobal(a) => self.array_in(crate::ast::Array::Global(*a))?,
                Instr::InLocal(a) => self.array_in(crate::ast::Array::Local(*a))?,
                Instr::DeleteGlobal(a) => self.array_delete(crate::ast::Array::Global(*a))?,
                Instr::DeleteLocal(a) => self.array_delete(crate::ast::Array::Local(*a))?,
                Instr::DeleteAllGlobal(a) => {
                    let id = self.resolve_array(crate::ast::Array::Global(*a))?;
                    self.arrays[id].clear();
                }
                Instr::DeleteAllLocal(a) => {
                    let id = self.resolve_array(crate::ast::Array::Local(*a))?;
                    self.arrays[id].clear();
                }
                Instr::MultiIndex(n) => {
                    let parts = self.stack.pop_n(*n)?;
                    let joined = parts
                        .iter()
                        .map(|v| v.as_str(&self.convfmt))
                        .collect::<Vec<_>>()
                        .join(&self.subsep);
                    self.stack.push(Value::str(joined));
                }

                // ── operators ────────────────────────────────────────────
                Instr::Add => self.binary_num(AugOp::Add)?,
                Instr::Subtract => self.binary_num(AugOp::Subtract)?,
                Instr::Multiply => self.binary_num(AugOp::Multiply)?,
                Instr::Divide => self.binary_num(AugOp::Divide)?,
                Instr::Modulo => self.binary_num(AugOp::Modulo)?,
                Instr::Power => self.binary_num(AugOp::Power)?,
                Instr::Concat => {
                    let r = self.pop_str()?;
                    let mut l = self.pop_str()?;
                    l.push_str(&r);
                    self.stack.push(Value::str(l));
                }
                Instr::Equals => self.compare_op(|o| o == Ordering::Equal)?,
                Instr::NotEquals => self.compare_op(|o| o != Ordering::Equal)?,
                Instr::Less => self.compare_op(|o| o == Ordering::Less)?,
                Instr::LessOrEqual => self.compare_op(|o| o != Ordering::Greater)?,
                Instr::Greater => self.compare_op(|o| o == Ordering::Greater)?,
                Instr::GreaterOrEqual => self.compare_op(|o| o != Ordering::Less)?,
                Instr::Match => self.match_op(false)?,
                Instr::NotMatch => self.match_op(true)?,
                Instr::Negate => {
                    let n = self.stack.pop_num()?;
                    self.stack.push(Value::num(-n));
                }
                Instr::UnaryPlus => {
                    let n = self.stack.pop_num()?;
                    self.stack.push(Value::num(n));
                }
                Instr::Not => {
                    let v = self.stack.pop_value()?;
                    self.push_bool(!v.is_true());
                }
                Instr::Boolean => {
                    let v = self.stack.pop_value()?;
                    self.push_bool(v.is_true());
                }

                // ── control flow ─────────────────────────────────────────
                Instr::Jump(off) => ip = jump(ip, *off),
                Instr::JumpTrue(off) => {
                    if self.stack.pop_value()?.is_true() {
                        ip = jump(ip, *off);
                    }
                }
                Instr::JumpFalse(off) => {
                    if !self.stack.pop_value()?.is_true() {
                        ip = jump(ip, *off);
                    }
                }
                Instr::JumpEquals(off) => ip = self.fused_jump(ip, *off, |o| o == Ordering::Equal)?,
                Instr::JumpNotEquals(off) => {
                    ip = self.fused_jump(ip, *off, |o| o != Ordering::Equal)?
                }
                Instr::JumpLess(off) => ip = self.fused_jump(ip, *off, |o| o == Ordering::Less)?,
                Instr::JumpLessOrEqual(off) => {
                    ip = self.fused_jump(ip, *off, |o| o != Ordering::Greater)?
                }
                Instr::JumpGreater(off) => {
                    ip = self.fused_jump(ip, *off, |o| o == Ordering::Greater)?
                }
                Instr::JumpGreaterOrEqual(off) => {
                    ip = self.fused_jump(ip, *off, |o| o != Ordering::Less)?
                }

                Instr::ForInGlobal {
                    var,
                    array,
                    body_len,
                } => {
                    let body = &code[ip..ip + *body_len];
                    match self.exec_for_in(ForInVar::Global(*var), *array, body)? {
                        Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                    ip += *body_len;
                }
                Instr::ForInLocal {
                    var,
                    array,
                    body_len,
                } => {
                    let body = &code[ip..ip + *body_len];
                    match self.exec_for_in(ForInVar::Local(*var), *array, body)? {
                        Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                    ip += *body_len;
                }
                Instr::ForInSpecial {
                    var,
                    array,
                    body_len,
                } => {
                    let body = &code[ip..ip + *body_len];
                    match self.exec_for_in(ForInVar::Special(*var), *array, body)? {
                        Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                    ip += *body_len;
                }
                Instr::BreakForIn => return Ok(Flow::Break),

                // ── calls ────────────────────────────────────────────────
                Instr::CallUser { func, array_args } => {
                    match self.exec_call_user(*func, array_args)? {
                        Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
                Instr::CallNative { func, num_args } => {
                    self.exec_call_native(*func, *num_args)?
                }
                Instr::CallBuiltin { func, num_args } => self.call_builtin(*func, *num_args)?,
                Instr::CallSplitGlobal(a) => {
                    self.exec_split(crate::ast::Array::Global(*a), false)?
                }
                Instr::CallSplitLocal(a) => self.exec_split(crate::ast::Array::Local(*a), false)?,
                Instr::CallSplitSepGlobal(a) => {
                    self.exec_split(crate::ast::Array::Global(*a), true)?
                }
                Instr::CallSplitSepLocal(a) => {
                    self.exec_split(crate::ast::Array::Local(*a), true)?
                }
                Instr::CallSprintf(n) => self.exec_sprintf(*n)?,
                Instr::CallSub { target } => self.exec_subst(*target, false)?,
                Instr::CallGsub { target } => self.exec_subst(*target, true)?,

                // ── I/O ──────────────────────────────────────────────────
                Instr::Print { num_args, redirect } => self.exec_print(*num_args, *redirect)?,
                Instr::Printf { num_args, redirect } => self.exec_printf(*num_args, *redirect)?,
                Instr::Getline { source, target } => self.exec_getline(*source, *target)?,

                // ── stack / meta ─────────────────────────────────────────
                Instr::Dup => {
                    let v = self
                        .stack
                        .last()
                        .cloned()
                        .ok_or_else(|| VmError::Internal("dup on empty stack".to_string()))?;
                    self.stack.push(v);
                }
                Instr::Drop => {
                    self.stack.pop_value()?;
                }
                Instr::Return => {
                    self.return_value = self.stack.pop_value()?;
                    return Ok(Flow::Return);
                }
                Instr::ReturnNull => {
                    self.return_value = Value::Null;
                    return Ok(Flow::Return);
                }
                Instr::Exit => return Ok(Flow::Exit),
                Instr::ExitStatus => {
                    self.exit_status = self.stack.pop_num()? as i32;
                    return Ok(Flow::Exit);
                }
                Instr::Next => return Ok(Flow::Next),
                Instr::NextFile => return Ok(Flow::NextFile),
                Instr::Nop => {}
            }
        }
        Ok(Flow::Normal)
    }

    // ── small helpers ────────────────────────────────────────────────────

    pub(crate) fn push_bool(&mut self, b: bool) {
        self.stack.push(Value::num(if b { 1.0 } else { 0.0 }));
    }

    pub(crate) fn pop_str(&mut self) -> Result<String, VmError> {
        let v = self.stack.pop_value()?;
        Ok(v.as_str(&self.convfmt))
    }

    fn local_slot(&self, l: usize) -> Result<usize, VmError> {
        self.frames
            .last()
            .map(|f| f.base + l)
            .ok_or_else(|| VmError::Internal("local access outside a call".to_string()))
    }

    fn binary_num(&mut self, op: AugOp) -> Result<(), VmError> {
        let r = self.stack.pop_num()?;
        let l = self.stack.pop_num()?;
        self.stack.push(Value::num(arith(op, l, r)?));
        Ok(())
    }

    fn compare_op(&mut self, test: impl Fn(Ordering) -> bool) -> Result<(), VmError> {
        let r = self.stack.pop_value()?;
        let l = self.stack.pop_value()?;
        let ord = l.compare(&r, &self.convfmt);
        self.push_bool(test(ord));
        Ok(())
    }

    fn fused_jump(
        &mut self,
        ip: usize,
        off: i32,
        test: impl Fn(Ordering) -> bool,
    ) -> Result<usize, VmError> {
        let r = self.stack.pop_value()?;
        let l = self.stack.pop_value()?;
        let ord = l.compare(&r, &self.convfmt);
        Ok(if test(ord) { jump(ip, off) } else { ip })
    }

    fn match_op(&mut self, negate: bool) -> Result<(), VmError> {
        let pattern = self.pop_str()?;
        let target = self.pop_str()?;
        let re = self.cached_regex(&pattern)?;
        let matched = re.is_match(&target);
        self.push_bool(matched != negate);
        Ok(())
    }

    // ── array helpers ────────────────────────────────────────────────────

    fn array_key(&mut self) -> Result<String, VmError> {
        self.pop_str()
    }

    /// Element read; POSIX requires the reference to materialize a null
    /// element for a missing key.
    fn array_get(&mut self, array: crate::ast::Array) -> Result<(), VmError> {
        let key = self.array_key()?;
        let id = self.resolve_array(array)?;
        let v = self.arrays[id].entry(key).or_insert(Value::Null).clone();
        self.stack.push(v);
        Ok(())
    }

    fn array_assign(&mut self, array: crate::ast::Array) -> Result<(), VmError> {
        let key = self.array_key()?;
        let v = self.stack.pop_value()?;
        let id = self.resolve_array(array)?;
        self.arrays[id].insert(key, v);
        Ok(())
    }

    fn array_aug(&mut self, op: AugOp, array: crate::ast::Array) -> Result<(), VmError> {
        let r = self.stack.pop_num()?;
        let key = self.array_key()?;
        let id = self.resolve_array(array)?;
        let l = self.arrays[id].get(&key).map(Value::as_num).unwrap_or(0.0);
        self.arrays[id].insert(key, Value::num(arith(op, l, r)?));
        Ok(())
    }

    fn array_incr(&mut self, by: i32, array: crate::ast::Array) -> Result<(), VmError> {
        let key = self.array_key()?;
        let id = self.resolve_array(array)?;
        let n = self.arrays[id].get(&key).map(Value::as_num).unwrap_or(0.0);
        self.arrays[id].insert(key, Value::num(n + by as f64));
        Ok(())
    }

    /// Membership test; must NOT materialize.
    fn array_in(&mut self, array: crate::ast::Array) -> Result<(), VmError> {
        let key = self.array_key()?;
        let id = self.resolve_array(array)?;
        let found = self.arrays[id].contains_key(&key);
        self.push_bool(found);
        Ok(())
    }

    fn array_delete(&mut self, array: crate::ast::Array) -> Result<(), VmError> {
        let key = self.array_key()?;
        let id = self.resolve_array(array)?;
        self.arrays[id].remove(&key);
        Ok(())
    }

    /// Iterate a snapshot of the array's keys. Keys added during the
    /// loop are not visited; deleted keys still are, reading as null.
    fn exec_for_in(
        &mut self,
        var: ForInVar,
        array: crate::ast::Array,
        body: &[Instr],
    ) -> Result<Flow, VmError> {
        let id = self.resolve_array(array)?;
        let keys: Vec<String> = self.arrays[id].keys().cloned().collect();
        for key in keys {
            let v = Value::num_str(key);
            match &var {
                ForInVar::Global(g) => self.globals[*g] = v,
                ForInVar::Local(l) => {
                    let slot = self.local_slot(*l)?;
                    self.stack[slot] = v;
                }
                ForInVar::Special(sv) => self.set_special(*sv, v)?,
            }
            match self.execute(body)? {
                Flow::Normal => {}
                Flow::Break => break,
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }
}
