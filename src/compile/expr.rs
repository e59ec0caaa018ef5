//! Expression compilation.
//!
//! Every `compile_expr` leaves exactly one value on the stack. Conditions
//! consumed by a branch go through `compile_branch`, which fuses binary
//! comparisons into the `Jump<Cmp>` opcodes instead of materializing a
//! boolean.

use crate::ast::{
    Array, AugOp, BinOp, BuiltinFn, CallArg, Expr, GetlineSource, GetlineTarget, LValue, Scalar,
    UnaryOp,
};
use crate::vm::instr::{Instr, IoSource, IoTarget, SubstTarget};

use super::compiler::Compiler;
use super::types::{err, CResult};

impl Compiler<'_> {
    pub fn compile_expr(&mut self, e: &Expr) -> CResult<()> {
        match e {
            Expr::Num(n) => {
                let idx = self.pools.intern_num(*n);
                self.emit(Instr::Num(idx));
            }
            Expr::Str(s) => {
                let idx = self.pools.intern_str(s);
                self.emit(Instr::Str(idx));
            }
            Expr::Regex(src) => {
                // A regex literal in value position matches against $0.
                let idx = self.pools.intern_regex(src)?;
                self.emit(Instr::Regex(idx));
            }
            Expr::Var(scalar) => {
                self.emit(load_scalar(*scalar));
            }
            Expr::Field(idx) => self.compile_field_index(idx)?,
            Expr::Index(array, index) => {
                self.compile_index(index)?;
                self.emit(match array {
                    Array::Global(a) => Instr::ArrayGlobal(*a),
                    Array::Local(a) => Instr::ArrayLocal(*a),
                });
            }
            Expr::Assign { target, value } => {
                self.compile_expr(value)?;
                self.emit(Instr::Dup);
                self.compile_assign(target)?;
            }
            Expr::AugAssign { target, op, value } => {
                // Expression position needs the updated value on the
                // stack, so fields and array elements go through an
                // explicit read-modify-write.
                match target {
                    LValue::Var(scalar) => {
                        self.compile_expr(value)?;
                        self.emit(aug_scalar(*op, *scalar));
                        self.emit(load_scalar(*scalar));
                    }
                    LValue::Field(idx) => {
                        self.compile_expr(idx)?;
                        self.emit(Instr::Field);
                        self.compile_expr(value)?;
                        self.emit(binop_for(*op));
                        self.emit(Instr::Dup);
                        self.compile_expr(idx)?;
                        self.emit(Instr::AssignField);
                    }
                    LValue::Index(array, index) => {
                        self.compile_index(index)?;
                        self.emit(array_load(*array));
                        self.compile_expr(value)?;
                        self.emit(binop_for(*op));
                        self.emit(Instr::Dup);
                        self.compile_index(index)?;
                        self.emit(array_assign(*array));
                    }
                }
            }
            Expr::Incr { pre, by, target } => self.compile_incr_expr(*pre, *by, target)?,
            Expr::Binary { op, left, right } => self.compile_binary(*op, left, right)?,
            Expr::Unary { op, value } => {
                self.compile_expr(value)?;
                self.emit(match op {
                    UnaryOp::Negate => Instr::Negate,
                    UnaryOp::Plus => Instr::UnaryPlus,
                    UnaryOp::Not => Instr::Not,
                });
            }
            Expr::Cond { cond, yes, no } => {
                let to_else = self.compile_branch(cond, false)?;
                self.compile_expr(yes)?;
                let to_end = self.emit(Instr::Jump(0));
                let else_pos = self.here();
                self.patch(to_else, else_pos);
                self.compile_expr(no)?;
                let end = self.here();
                self.patch(to_end, end);
            }
            Expr::And(left, right) => {
                self.compile_expr(left)?;
                let short = self.emit(Instr::JumpFalse(0));
                self.compile_expr(right)?;
                self.emit(Instr::Boolean);
                let to_end = self.emit(Instr::Jump(0));
                let false_pos = self.here();
                self.patch(short, false_pos);
                let zero = self.pools.intern_num(0.0);
                self.emit(Instr::Num(zero));
                let end = self.here();
                self.patch(to_end, end);
            }
            Expr::Or(left, right) => {
                self.compile_expr(left)?;
                let short = self.emit(Instr::JumpTrue(0));
                self.compile_expr(right)?;
                self.emit(Instr::Boolean);
                let to_end = self.emit(Instr::Jump(0));
                let true_pos = self.here();
                self.patch(short, true_pos);
                let one = self.pools.intern_num(1.0);
                self.emit(Instr::Num(one));
                let end = self.here();
                self.patch(to_end, end);
            }
            Expr::In { index, array } => {
                self.compile_index(index)?;
                self.emit(match array {
                    Array::Global(a) => Instr::InGlobal(*a),
                    Array::Local(a) => Instr::InLocal(*a),
                });
            }
            Expr::Builtin { func, args } => {
                for (i, arg) in args.iter().enumerate() {
                    // match(s, r) takes its pattern as regex-or-string.
                    if *func == BuiltinFn::Match && i == 1 {
                        self.compile_regex_arg(arg)?;
                    } else {
                        self.compile_expr(arg)?;
                    }
                }
                self.emit(Instr::CallBuiltin {
                    func: *func,
                    num_args: args.len(),
                });
            }
            Expr::Split { string, array, sep } => {
                self.compile_expr(string)?;
                match (sep, array) {
                    (None, Array::Global(a)) => self.emit(Instr::CallSplitGlobal(*a)),
                    (None, Array::Local(a)) => self.emit(Instr::CallSplitLocal(*a)),
                    (Some(sep), Array::Global(a)) => {
                        self.compile_regex_arg(sep)?;
                        self.emit(Instr::CallSplitSepGlobal(*a))
                    }
                    (Some(sep), Array::Local(a)) => {
                        self.compile_regex_arg(sep)?;
                        self.emit(Instr::CallSplitSepLocal(*a))
                    }
                };
            }
            Expr::Subst {
                global,
                regex,
                replacement,
                target,
            } => self.compile_subst(*global, regex, replacement, target.as_ref())?,
            Expr::Sprintf { args } => {
                for arg in args {
                    self.compile_expr(arg)?;
                }
                self.emit(Instr::CallSprintf(args.len()));
            }
            Expr::CallUser { func, args } => self.compile_call_user(*func, args)?,
            Expr::CallNative { func, args } => {
                for arg in args {
                    self.compile_expr(arg)?;
                }
                self.emit(Instr::CallNative {
                    func: *func,
                    num_args: args.len(),
                });
            }
            Expr::Getline { source, target } => {
                let source_mode = match source {
                    GetlineSource::Main => IoSource::Main,
                    GetlineSource::File(name) => {
                        self.compile_expr(name)?;
                        IoSource::File
                    }
                    GetlineSource::Command(cmd) => {
                        self.compile_expr(cmd)?;
                        IoSource::Command
                    }
                };
                let target_mode = match target {
                    GetlineTarget::Record => IoTarget::Record,
                    GetlineTarget::Var(Scalar::Global(g)) => IoTarget::Global(*g),
                    GetlineTarget::Var(Scalar::Local(l)) => IoTarget::Local(*l),
                    GetlineTarget::Var(Scalar::Special(sv)) => IoTarget::Special(*sv),
                    GetlineTarget::Field(idx) => {
                        self.compile_expr(idx)?;
                        IoTarget::Field
                    }
                    GetlineTarget::Index(Array::Global(a), index) => {
                        self.compile_index(index)?;
                        IoTarget::ArrayGlobal(*a)
                    }
                    GetlineTarget::Index(Array::Local(a), index) => {
                        self.compile_index(index)?;
                        IoTarget::ArrayLocal(*a)
                    }
                };
                self.emit(Instr::Getline {
                    source: source_mode,
                    target: target_mode,
                });
            }
        }
        Ok(())
    }

    /// Compile a condition consumed by a single conditional branch,
    /// fusing comparisons. Returns the branch index to patch; the branch
    /// is taken when the condition's truth equals `branch_when`.
    pub fn compile_branch(&mut self, cond: &Expr, branch_when: bool) -> CResult<usize> {
        match cond {
            Expr::Binary { op, left, right } if op.is_comparison() => {
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                let fused = if branch_when { *op } else { negate_cmp(*op) };
                Ok(self.emit(match fused {
                    BinOp::Equals => Instr::JumpEquals(0),
                    BinOp::NotEquals => Instr::JumpNotEquals(0),
                    BinOp::Less => Instr::JumpLess(0),
                    BinOp::LessOrEqual => Instr::JumpLessOrEqual(0),
                    BinOp::Greater => Instr::JumpGreater(0),
                    BinOp::GreaterOrEqual => Instr::JumpGreaterOrEqual(0),
                    _ => unreachable!(),
                }))
            }
            Expr::Unary {
                op: UnaryOp::Not,
                value,
            } => self.compile_branch(value, !branch_when),
            _ => {
                self.compile_expr(cond)?;
                Ok(self.emit(if branch_when {
                    Instr::JumpTrue(0)
                } else {
                    Instr::JumpFalse(0)
                }))
            }
        }
    }

    /// A regex in argument position is interned (eager validation) but
    /// passed as its source text; the VM's regex cache compiles it on
    /// first use, the same as a dynamically built pattern.
    pub fn compile_regex_arg(&mut self, e: &Expr) -> CResult<()> {
        if let Expr::Regex(src) = e {
            self.pools.intern_regex(src)?;
            let idx = self.pools.intern_str(src);
            self.emit(Instr::Str(idx));
            Ok(())
        } else {
            self.compile_expr(e)
        }
    }

    /// Store the value on top of the stack into `target`.
    pub fn compile_assign(&mut self, target: &LValue) -> CResult<()> {
        match target {
            LValue::Var(scalar) => {
                self.emit(assign_scalar(*scalar));
            }
            LValue::Field(idx) => {
                self.compile_expr(idx)?;
                self.emit(Instr::AssignField);
            }
            LValue::Index(array, index) => {
                self.compile_index(index)?;
                self.emit(array_assign(*array));
            }
        }
        Ok(())
    }

    fn compile_field_index(&mut self, idx: &Expr) -> CResult<()> {
        // $k with a non-negative integral literal gets the immediate form.
        if let Expr::Num(n) = idx {
            if *n >= 0.0 && n.fract() == 0.0 && *n <= u32::MAX as f64 {
                self.emit(Instr::FieldNum(*n as usize));
                return Ok(());
            }
        }
        self.compile_expr(idx)?;
        self.emit(Instr::Field);
        Ok(())
    }

    fn compile_binary(&mut self, op: BinOp, left: &Expr, right: &Expr) -> CResult<()> {
        self.compile_expr(left)?;
        match op {
            BinOp::Match | BinOp::NotMatch => {
                self.compile_regex_arg(right)?;
            }
            _ => self.compile_expr(right)?,
        }
        self.emit(match op {
            BinOp::Add => Instr::Add,
            BinOp::Subtract => Instr::Subtract,
            BinOp::Multiply => Instr::Multiply,
            BinOp::Divide => Instr::Divide,
            BinOp::Modulo => Instr::Modulo,
            BinOp::Power => Instr::Power,
            BinOp::Concat => Instr::Concat,
            BinOp::Equals => Instr::Equals,
            BinOp::NotEquals => Instr::NotEquals,
            BinOp::Less => Instr::Less,
            BinOp::LessOrEqual => Instr::LessOrEqual,
            BinOp::Greater => Instr::Greater,
            BinOp::GreaterOrEqual => Instr::GreaterOrEqual,
            BinOp::Match => Instr::Match,
            BinOp::NotMatch => Instr::NotMatch,
        });
        Ok(())
    }

    fn compile_incr_expr(&mut self, pre: bool, by: i32, target: &LValue) -> CResult<()> {
        if pre {
            // ++x: update, then load the stored (numeric) value.
            match target {
                LValue::Var(scalar) => {
                    self.emit(incr_scalar(by, *scalar));
                    self.emit(load_scalar(*scalar));
                }
                LValue::Field(idx) => {
                    self.compile_expr(idx)?;
                    self.emit(Instr::IncrField(by));
                    self.compile_expr(idx)?;
                    self.emit(Instr::Field);
                    self.emit(Instr::UnaryPlus);
                }
                LValue::Index(array, index) => {
                    self.compile_index(index)?;
                    self.emit(array_incr(by, *array));
                    self.compile_index(index)?;
                    self.emit(array_load(*array));
                    self.emit(Instr::UnaryPlus);
                }
            }
        } else {
            // x++: the expression value is the old numeric value.
            match target {
                LValue::Var(scalar) => {
                    self.emit(load_scalar(*scalar));
                    self.emit(Instr::UnaryPlus);
                    self.emit(incr_scalar(by, *scalar));
                }
                LValue::Field(idx) => {
                    self.compile_expr(idx)?;
                    self.emit(Instr::Field);
                    self.emit(Instr::UnaryPlus);
                    self.compile_expr(idx)?;
                    self.emit(Instr::IncrField(by));
                }
                LValue::Index(array, index) => {
                    self.compile_index(index)?;
                    self.emit(array_load(*array));
                    self.emit(Instr::UnaryPlus);
                    self.compile_index(index)?;
                    self.emit(array_incr(by, *array));
                }
            }
        }
        Ok(())
    }

    fn compile_subst(
        &mut self,
        global: bool,
        regex: &Expr,
        replacement: &Expr,
        target: Option<&LValue>,
    ) -> CResult<()> {
        self.compile_regex_arg(regex)?;
        self.compile_expr(replacement)?;
        let target = match target {
            None => SubstTarget::Record,
            Some(LValue::Var(Scalar::Global(g))) => SubstTarget::Global(*g),
            Some(LValue::Var(Scalar::Local(l))) => SubstTarget::Local(*l),
            Some(LValue::Var(Scalar::Special(sv))) => SubstTarget::Special(*sv),
            Some(LValue::Field(idx)) => {
                self.compile_expr(idx)?;
                SubstTarget::Field
            }
            Some(LValue::Index(Array::Global(a), index)) => {
                self.compile_index(index)?;
                SubstTarget::ArrayGlobal(*a)
            }
            Some(LValue::Index(Array::Local(a), index)) => {
                self.compile_index(index)?;
                SubstTarget::ArrayLocal(*a)
            }
        };
        self.emit(if global {
            Instr::CallGsub { target }
        } else {
            Instr::CallSub { target }
        });
        Ok(())
    }

    fn compile_call_user(&mut self, func: usize, args: &[CallArg]) -> CResult<()> {
        let functions = self.functions;
        let f = match functions.get(func) {
            Some(f) => f,
            None => return err(format!("call to unknown function index {}", func)),
        };
        if args.len() > f.params.len() {
            return err(format!(
                "function {} called with {} args, declares {}",
                f.name,
                args.len(),
                f.params.len()
            ));
        }
        let mut array_args = Vec::new();
        let mut scalar_count = 0usize;
        for (arg, is_array) in args.iter().zip(f.params.iter()) {
            match (arg, *is_array) {
                (CallArg::Scalar(e), false) => {
                    self.compile_expr(e)?;
                    scalar_count += 1;
                }
                (CallArg::Array(a), true) => array_args.push(*a),
                (CallArg::Scalar(_), true) => {
                    return err(format!("function {} expects an array argument", f.name))
                }
                (CallArg::Array(_), false) => {
                    return err(format!("function {} expects a scalar argument", f.name))
                }
            }
        }
        let missing = f.num_scalar_params() - scalar_count;
        if missing > 0 {
            self.emit(Instr::Nulls(missing));
        }
        self.emit(Instr::CallUser { func, array_args });
        Ok(())
    }
}

fn load_scalar(scalar: Scalar) -> Instr {
    match scalar {
        Scalar::Global(g) => Instr::Global(g),
        Scalar::Local(l) => Instr::Local(l),
        Scalar::Special(sv) => Instr::Special(sv),
    }
}

fn assign_scalar(scalar: Scalar) -> Instr {
    match scalar {
        Scalar::Global(g) => Instr::AssignGlobal(g),
        Scalar::Local(l) => Instr::AssignLocal(l),
        Scalar::Special(sv) => Instr::AssignSpecial(sv),
    }
}

pub(super) fn aug_scalar(op: AugOp, scalar: Scalar) -> Instr {
    match scalar {
        Scalar::Global(g) => Instr::AugGlobal(op, g),
        Scalar::Local(l) => Instr::AugLocal(op, l),
        Scalar::Special(sv) => Instr::AugSpecial(op, sv),
    }
}

pub(super) fn incr_scalar(by: i32, scalar: Scalar) -> Instr {
    match scalar {
        Scalar::Global(g) => Instr::IncrGlobal(by, g),
        Scalar::Local(l) => Instr::IncrLocal(by, l),
        Scalar::Special(sv) => Instr::IncrSpecial(by, sv),
    }
}

fn array_load(array: Array) -> Instr {
    match array {
        Array::Global(a) => Instr::ArrayGlobal(a),
        Array::Local(a) => Instr::ArrayLocal(a),
    }
}

pub(super) fn array_assign(array: Array) -> Instr {
    match array {
        Array::Global(a) => Instr::AssignArrayGlobal(a),
        Array::Local(a) => Instr::AssignArrayLocal(a),
    }
}

pub(super) fn array_aug(op: AugOp, array: Array) -> Instr {
    match array {
        Array::Global(a) => Instr::AugArrayGlobal(op, a),
        Array::Local(a) => Instr::AugArrayLocal(op, a),
    }
}

pub(super) fn array_incr(by: i32, array: Array) -> Instr {
    match array {
        Array::Global(a) => Instr::IncrArrayGlobal(by, a),
        Array::Local(a) => Instr::IncrArrayLocal(by, a),
    }
}

pub(super) fn binop_for(op: AugOp) -> Instr {
    match op {
        AugOp::Add => Instr::Add,
        AugOp::Subtract => Instr::Subtract,
        AugOp::Multiply => Instr::Multiply,
        AugOp::Divide => Instr::Divide,
        AugOp::Modulo => Instr::Modulo,
        AugOp::Power => Instr::Power,
    }
}

fn negate_cmp(op: BinOp) -> BinOp {
    match op {
        BinOp::Equals => BinOp::NotEquals,
        BinOp::NotEquals => BinOp::Equals,
        BinOp::Less => BinOp::GreaterOrEqual,
        BinOp::LessOrEqual => BinOp::Greater,
        BinOp::Greater => BinOp::LessOrEqual,
        BinOp::GreaterOrEqual => BinOp::Less,
        _ => unreachable!("not a comparison: {:?}", op),
    }
}
