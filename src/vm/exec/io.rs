//! `Print`, `Printf`, and the six `getline` forms.

use crate::ast::RedirMode;
use crate::vm::instr::{IoSource, IoTarget};
use crate::vm::stack::StackOps;
use crate::vm::value::Value;
use crate::vm::{Vm, VmError};

impl Vm<'_> {
    /// `print`: zero arguments prints `$0`; values are joined with `OFS`
    /// and terminated with `ORS`. Numbers convert with `OFMT` here (and
    /// only here).
    pub(super) fn exec_print(
        &mut self,
        num_args: usize,
        redirect: Option<RedirMode>,
    ) -> Result<(), VmError> {
        let dest = self.pop_redirect(redirect)?;
        let mut line = if num_args == 0 {
            self.record.line(&self.ofs).as_str(&self.convfmt)
        } else {
            let args = self.stack.pop_n(num_args)?;
            args.iter()
                .map(|v| v.as_str(&self.ofmt))
                .collect::<Vec<_>>()
                .join(&self.ofs)
        };
        line.push_str(&self.ors);
        self.write_bytes(dest, line.as_bytes())
    }

    pub(super) fn exec_printf(
        &mut self,
        num_args: usize,
        redirect: Option<RedirMode>,
    ) -> Result<(), VmError> {
        let dest = self.pop_redirect(redirect)?;
        let args = self.stack.pop_n(num_args)?;
        let format = args
            .first()
            .ok_or_else(|| VmError::Internal("printf with no format".to_string()))?
            .as_str(&self.convfmt);
        let out = self
            .formatter
            .sprintf(&format, &args[1..], &self.convfmt, self.bytes)
            .map_err(VmError::Format)?;
        self.write_bytes(dest, out.as_bytes())
    }

    fn pop_redirect(
        &mut self,
        redirect: Option<RedirMode>,
    ) -> Result<Option<(RedirMode, String)>, VmError> {
        match redirect {
            Some(mode) => {
                let name = self.pop_str()?;
                Ok(Some((mode, name)))
            }
            None => Ok(None),
        }
    }

    fn write_bytes(
        &mut self,
        dest: Option<(RedirMode, String)>,
        bytes: &[u8],
    ) -> Result<(), VmError> {
        match dest {
            None => self.io.write_output(bytes),
            Some((mode, name)) => {
                let sink = self
                    .io
                    .redirect(mode, &name, self.no_file_writes, self.no_exec)?;
                use std::io::Write;
                sink.write_all(bytes)
                    .map_err(|e| VmError::io(&format!("write error on {:?}", name), e))
            }
        }
    }

    /// `getline` in all its forms. Pushes 1 on success, 0 at EOF, -1
    /// when a file or command can't be opened. `NR`/`FNR` advance only
    /// for main-input reads.
    pub(super) fn exec_getline(&mut self, source: IoSource, target: IoTarget) -> Result<(), VmError> {
        // The target index/key (if any) is above the source operand.
        enum Aux {
            None,
            Field(i64),
            Key(String),
        }
        let aux = match target {
            IoTarget::Field => Aux::Field(Self::field_index(&self.stack.pop_value()?)?),
            IoTarget::ArrayGlobal(_) | IoTarget::ArrayLocal(_) => Aux::Key(self.pop_str()?),
            _ => Aux::None,
        };

        // Reading flushes the standard sinks first so prompts printed
        // before a read actually appear.
        self.io.flush(None)?;

        let line = match source {
            IoSource::Main => match self.next_main_record()? {
                Some(line) => Some(line),
                None => {
                    self.stack.push(Value::num(0.0));
                    return Ok(());
                }
            },
            IoSource::File | IoSource::Command => {
                let name = self.pop_str()?;
                let command = source == IoSource::Command;
                match self.read_stream_record(&name, command)? {
                    None => {
                        self.stack.push(Value::num(-1.0));
                        return Ok(());
                    }
                    Some(None) => {
                        self.stack.push(Value::num(0.0));
                        return Ok(());
                    }
                    Some(Some(line)) => Some(line),
                }
            }
        };
        let line = line.expect("handled above");

        match (target, aux) {
            (IoTarget::Record, _) => self.record.set_record(line, false),
            (IoTarget::Global(g), _) => self.globals[g] = Value::num_str(line),
            (IoTarget::Local(l), _) => {
                let slot = self
                    .frames
                    .last()
                    .map(|f| f.base + l)
                    .ok_or_else(|| VmError::Internal("getline local outside a call".to_string()))?;
                self.stack[slot] = Value::num_str(line);
            }
            (IoTarget::Special(sv), _) => self.set_special(sv, Value::num_str(line))?,
            (IoTarget::Field, Aux::Field(idx)) => {
                self.set_field_value(idx, Value::num_str(line))?
            }
            (IoTarget::ArrayGlobal(a), Aux::Key(key)) => {
                let id = self.resolve_array(crate::ast::Array::Global(a))?;
                self.arrays[id].insert(key, Value::num_str(line));
            }
            (IoTarget::ArrayLocal(a), Aux::Key(key)) => {
                let id = self.resolve_array(crate::ast::Array::Local(a))?;
                self.arrays[id].insert(key, Value::num_str(line));
            }
            _ => return Err(VmError::Internal("getline target/operand mismatch".to_string())),
        }
        self.stack.push(Value::num(1.0));
        Ok(())
    }
}
