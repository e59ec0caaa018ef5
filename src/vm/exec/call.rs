//! User, native, and lvalue-bound built-in calls.

use crate::ast::Array;
use crate::config::{NativeValue, ParamKind};
use crate::record::{self, SplitMode};
use crate::vm::builtins::substitute;
use crate::vm::frame::Frame;
use crate::vm::instr::SubstTarget;
use crate::vm::stack::StackOps;
use crate::vm::value::Value;
use crate::vm::{Vm, VmError};

use super::Flow;

impl Vm<'_> {
    /// `CallUser`: scalar arguments are already on the stack (padded to
    /// the declared count); array arguments share the caller's backing
    /// maps through resolved arena IDs, and unpassed array parameters
    /// get temporaries freed on return.
    pub(super) fn exec_call_user(
        &mut self,
        func: usize,
        array_args: &[Array],
    ) -> Result<Flow, VmError> {
        if self.frames.len() >= self.max_call_depth {
            return Err(VmError::CallDepthExceeded(self.max_call_depth));
        }
        let f = &self.program.functions[func];
        let base = self.stack.len() - f.num_scalar_params;
        let arena_mark = self.arrays.len();

        // Resolve against the caller's frame before pushing the new one.
        let mut arrays = Vec::with_capacity(f.num_array_params);
        for i in 0..f.num_array_params {
            match array_args.get(i) {
                Some(arg) => arrays.push(self.resolve_array(*arg)?),
                None => {
                    self.arrays.push(Default::default());
                    arrays.push(self.arrays.len() - 1);
                }
            }
        }

        self.frames.push(Frame {
            base,
            arrays,
            arena_mark,
        });
        let flow = self.execute(&f.body)?;
        let frame = self.frames.pop().expect("frame pushed above");
        self.stack.truncate(frame.base);
        self.arrays.truncate(frame.arena_mark);

        match flow {
            Flow::Return => {
                let v = std::mem::take(&mut self.return_value);
                self.stack.push(v);
                Ok(Flow::Normal)
            }
            Flow::Normal => {
                // Falling off the end of a function returns null.
                self.stack.push(Value::Null);
                Ok(Flow::Normal)
            }
            // next/nextfile/exit keep unwinding through the call.
            flow => Ok(flow),
        }
    }

    pub(super) fn exec_call_native(&mut self, func: usize, num_args: usize) -> Result<(), VmError> {
        let args = self.stack.pop_n(num_args)?;
        let convfmt = self.convfmt.clone();
        let native = &mut self.natives[func];
        let coerced: Vec<NativeValue> = native
            .params
            .iter()
            .enumerate()
            .map(|(i, kind)| {
                let v = args.get(i).unwrap_or(&Value::Null);
                match kind {
                    ParamKind::Bool => NativeValue::Bool(v.is_true()),
                    ParamKind::Int => NativeValue::Int(v.as_num() as i64),
                    ParamKind::Float => NativeValue::Float(v.as_num()),
                    ParamKind::Str => NativeValue::Str(v.as_str(&convfmt)),
                }
            })
            .collect();
        let result = (native.func)(&coerced).map_err(|message| VmError::NativeCall {
            name: self.program.native_names[func].clone(),
            message,
        })?;
        self.stack.push(match result {
            NativeValue::Null => Value::Null,
            NativeValue::Bool(b) => Value::num(if b { 1.0 } else { 0.0 }),
            NativeValue::Int(i) => Value::num(i as f64),
            NativeValue::Float(f) => Value::num(f),
            NativeValue::Str(s) => Value::Str(s),
        });
        Ok(())
    }

    /// `split(s, a[, fs])`: reset the array, store 1-based indices as
    /// numeric strings, push the field count.
    pub(super) fn exec_split(&mut self, array: Array, has_sep: bool) -> Result<(), VmError> {
        let sep = if has_sep {
            self.pop_str()?
        } else {
            self.fs.clone()
        };
        let s = self.pop_str()?;
        let parts = match SplitMode::from_fs(&sep) {
            SplitMode::Whitespace => record::split_whitespace(&s),
            SplitMode::Char(c) => record::split_char(&s, c),
            SplitMode::PerChar => record::split_per_char(&s),
            SplitMode::Regex(src) => {
                let re = self.cached_regex(&src)?;
                record::split_regex(&s, &re)
            }
        };
        let id = self.resolve_array(array)?;
        let map = &mut self.arrays[id];
        map.clear();
        let n = parts.len();
        for (i, part) in parts.into_iter().enumerate() {
            map.insert((i + 1).to_string(), Value::num_str(part));
        }
        self.stack.push(Value::num(n as f64));
        Ok(())
    }

    pub(super) fn exec_sprintf(&mut self, num_args: usize) -> Result<(), VmError> {
        let args = self.stack.pop_n(num_args)?;
        let format = args
            .first()
            .ok_or_else(|| VmError::Internal("sprintf with no format".to_string()))?
            .as_str(&self.convfmt);
        let out = self
            .formatter
            .sprintf(&format, &args[1..], &self.convfmt, self.bytes)
            .map_err(VmError::Format)?;
        self.stack.push(Value::str(out));
        Ok(())
    }

    /// `sub`/`gsub`: the target l-value is fixed at compile time; its
    /// index or key (if any) sits on top of the replacement and pattern.
    pub(super) fn exec_subst(&mut self, target: SubstTarget, global: bool) -> Result<(), VmError> {
        enum Aux {
            None,
            Field(i64),
            Key(String),
        }
        let aux = match target {
            SubstTarget::Field => Aux::Field(Self::field_index(&self.stack.pop_value()?)?),
            SubstTarget::ArrayGlobal(_) | SubstTarget::ArrayLocal(_) => Aux::Key(self.pop_str()?),
            _ => Aux::None,
        };
        let replacement = self.pop_str()?;
        let pattern = self.pop_str()?;
        let re = self.cached_regex(&pattern)?;

        let current = match (&target, &aux) {
            (SubstTarget::Record, _) => self.record.line(&self.ofs).as_str(&self.convfmt),
            (SubstTarget::Field, Aux::Field(idx)) => {
                self.get_field(*idx)?.as_str(&self.convfmt)
            }
            (SubstTarget::Global(g), _) => self.globals[*g].as_str(&self.convfmt),
            (SubstTarget::Local(l), _) => {
                let slot = self
                    .frames
                    .last()
                    .map(|f| f.base + l)
                    .ok_or_else(|| VmError::Internal("local sub outside a call".to_string()))?;
                self.stack[slot].as_str(&self.convfmt)
            }
            (SubstTarget::Special(sv), _) => self.get_special(*sv)?.as_str(&self.convfmt),
            (SubstTarget::ArrayGlobal(a), Aux::Key(key)) => {
                let id = self.resolve_array(Array::Global(*a))?;
                self.arrays[id]
                    .entry(key.clone())
                    .or_insert(Value::Null)
                    .as_str(&self.convfmt)
            }
            (SubstTarget::ArrayLocal(a), Aux::Key(key)) => {
                let id = self.resolve_array(Array::Local(*a))?;
                self.arrays[id]
                    .entry(key.clone())
                    .or_insert(Value::Null)
                    .as_str(&self.convfmt)
            }
            _ => return Err(VmError::Internal("sub target/operand mismatch".to_string())),
        };

        let (out, count) = substitute(&re, &current, &replacement, global);
        if count > 0 {
            let v = Value::str(out);
            match (&target, &aux) {
                (SubstTarget::Record, _) => {
                    let s = v.as_str(&self.convfmt);
                    self.record.set_record(s, true);
                }
                (SubstTarget::Field, Aux::Field(idx)) => self.set_field_value(*idx, v)?,
                (SubstTarget::Global(g), _) => self.globals[*g] = v,
                (SubstTarget::Local(l), _) => {
                    let slot = self.frames.last().map(|f| f.base + l).expect("checked above");
                    self.stack[slot] = v;
                }
                (SubstTarget::Special(sv), _) => self.set_special(*sv, v)?,
                (SubstTarget::ArrayGlobal(a), Aux::Key(key)) => {
                    let id = self.resolve_array(Array::Global(*a))?;
                    self.arrays[id].insert(key.clone(), v);
                }
                (SubstTarget::ArrayLocal(a), Aux::Key(key)) => {
                    let id = self.resolve_array(Array::Local(*a))?;
                    self.arrays[id].insert(key.clone(), v);
                }
                _ => unreachable!(),
            }
        }
        self.stack.push(Value::num(count as f64));
        Ok(())
    }
}
