//! Statement compilation.
//!
//! A compiled statement leaves the stack exactly as it found it.
//! Assignment-shaped expression statements skip the `Dup`/`Drop` traffic
//! the expression forms need.

use crate::ast::{Array, Expr, LValue, RedirMode, Scalar, Stmt};
use crate::vm::Instr;

use super::compiler::{Compiler, LoopContext};
use super::expr::{array_aug, array_incr, aug_scalar, incr_scalar};
use super::types::CResult;

impl Compiler<'_> {
    pub fn compile_stmts(&mut self, stmts: &[Stmt]) -> CResult<()> {
        for stmt in stmts {
            self.compile_stmt(stmt)?;
        }
        Ok(())
    }

    pub fn compile_stmt(&mut self, stmt: &Stmt) -> CResult<()> {
        match stmt {
            Stmt::Expr(e) => self.compile_expr_stmt(e)?,
            Stmt::Print { args, redirect } => {
                for arg in args {
                    self.compile_expr(arg)?;
                }
                let redirect = self.compile_redirect(redirect)?;
                self.emit(Instr::Print {
                    num_args: args.len(),
                    redirect,
                });
            }
            Stmt::Printf { args, redirect } => {
                for arg in args {
                    self.compile_expr(arg)?;
                }
                let redirect = self.compile_redirect(redirect)?;
                self.emit(Instr::Printf {
                    num_args: args.len(),
                    redirect,
                });
            }
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                let to_else = self.compile_branch(cond, false)?;
                self.compile_stmts(then_body)?;
                if else_body.is_empty() {
                    let end = self.here();
                    self.patch(to_else, end);
                } else {
                    let skip_else = self.emit(Instr::Jump(0));
                    let else_pos = self.here();
                    self.patch(to_else, else_pos);
                    self.compile_stmts(else_body)?;
                    let end = self.here();
                    self.patch(skip_else, end);
                }
            }
            Stmt::While { cond, body } => {
                let start = self.here();
                let to_end = self.compile_branch(cond, false)?;
                self.loop_stack.push(LoopContext::new(false));
                self.compile_stmts(body)?;
                let back = self.emit(Instr::Jump(0));
                self.patch(back, start);
                let end = self.here();
                self.patch(to_end, end);
                let ctx = self.loop_stack.pop().expect("loop context");
                self.patch_all(ctx.exit_patches, end);
                self.patch_all(ctx.continue_patches, start);
            }
            Stmt::DoWhile { body, cond } => {
                let start = self.here();
                self.loop_stack.push(LoopContext::new(false));
                self.compile_stmts(body)?;
                let cond_pos = self.here();
                let again = self.compile_branch(cond, true)?;
                self.patch(again, start);
                let end = self.here();
                let ctx = self.loop_stack.pop().expect("loop context");
                self.patch_all(ctx.exit_patches, end);
                self.patch_all(ctx.continue_patches, cond_pos);
            }
            Stmt::For {
                init,
                cond,
                step,
                body,
            } => {
                if let Some(init) = init {
                    self.compile_stmt(init)?;
                }
                let start = self.here();
                let to_end = match cond {
                    Some(cond) => Some(self.compile_branch(cond, false)?),
                    None => None,
                };
                self.loop_stack.push(LoopContext::new(false));
                self.compile_stmts(body)?;
                // continue in a C-style for targets the post statement.
                let post_pos = self.here();
                if let Some(step) = step {
                    self.compile_stmt(step)?;
                }
                let back = self.emit(Instr::Jump(0));
                self.patch(back, start);
                let end = self.here();
                if let Some(to_end) = to_end {
                    self.patch(to_end, end);
                }
                let ctx = self.loop_stack.pop().expect("loop context");
                self.patch_all(ctx.exit_patches, end);
                self.patch_all(ctx.continue_patches, post_pos);
            }
            Stmt::ForIn { var, array, body } => {
                let head = self.emit(match var {
                    Scalar::Global(g) => Instr::ForInGlobal {
                        var: *g,
                        array: *array,
                        body_len: 0,
                    },
                    Scalar::Local(l) => Instr::ForInLocal {
                        var: *l,
                        array: *array,
                        body_len: 0,
                    },
                    Scalar::Special(sv) => Instr::ForInSpecial {
                        var: *sv,
                        array: *array,
                        body_len: 0,
                    },
                });
                self.loop_stack.push(LoopContext::new(true));
                self.compile_stmts(body)?;
                let end = self.here();
                let ctx = self.loop_stack.pop().expect("loop context");
                // continue jumps past the body; the VM then advances to
                // the next key.
                self.patch_all(ctx.continue_patches, end);
                debug_assert!(ctx.exit_patches.is_empty());
                let len = end - (head + 1);
                match &mut self.code[head] {
                    Instr::ForInGlobal { body_len, .. }
                    | Instr::ForInLocal { body_len, .. }
                    | Instr::ForInSpecial { body_len, .. } => *body_len = len,
                    _ => unreachable!(),
                }
            }
            Stmt::Break => self.compile_break()?,
            Stmt::Continue => self.compile_continue()?,
            Stmt::Next => {
                self.emit(Instr::Next);
            }
            Stmt::NextFile => {
                self.emit(Instr::NextFile);
            }
            Stmt::Exit(status) => {
                match status {
                    Some(e) => {
                        self.compile_expr(e)?;
                        self.emit(Instr::ExitStatus);
                    }
                    None => {
                        self.emit(Instr::Exit);
                    }
                };
            }
            Stmt::Return(value) => {
                match value {
                    Some(e) => {
                        self.compile_expr(e)?;
                        self.emit(Instr::Return);
                    }
                    None => {
                        self.emit(Instr::ReturnNull);
                    }
                };
            }
            Stmt::Delete { array, index } => {
                if index.is_empty() {
                    self.emit(match array {
                        Array::Global(a) => Instr::DeleteAllGlobal(*a),
                        Array::Local(a) => Instr::DeleteAllLocal(*a),
                    });
                } else {
                    self.compile_index(index)?;
                    self.emit(match array {
                        Array::Global(a) => Instr::DeleteGlobal(*a),
                        Array::Local(a) => Instr::DeleteLocal(*a),
                    });
                }
            }
            Stmt::Block(stmts) => self.compile_stmts(stmts)?,
        }
        Ok(())
    }

    /// Expression statements: assignment shapes store directly with no
    /// stack residue; anything else evaluates and drops.
    fn compile_expr_stmt(&mut self, e: &Expr) -> CResult<()> {
        match e {
            Expr::Assign { target, value } => {
                self.compile_expr(value)?;
                self.compile_assign(target)?;
            }
            Expr::AugAssign { target, op, value } => match target {
                LValue::Var(scalar) => {
                    self.compile_expr(value)?;
                    self.emit(aug_scalar(*op, *scalar));
                }
                LValue::Field(idx) => {
                    self.compile_expr(idx)?;
                    self.compile_expr(value)?;
                    self.emit(Instr::AugField(*op));
                }
                LValue::Index(array, index) => {
                    self.compile_index(index)?;
                    self.compile_expr(value)?;
                    self.emit(array_aug(*op, *array));
                }
            },
            Expr::Incr { by, target, .. } => match target {
                LValue::Var(scalar) => {
                    self.emit(incr_scalar(*by, *scalar));
                }
                LValue::Field(idx) => {
                    self.compile_expr(idx)?;
                    self.emit(Instr::IncrField(*by));
                }
                LValue::Index(array, index) => {
                    self.compile_index(index)?;
                    self.emit(array_incr(*by, *array));
                }
            },
            _ => {
                self.compile_expr(e)?;
                self.emit(Instr::Drop);
            }
        }
        Ok(())
    }

    fn compile_redirect(
        &mut self,
        redirect: &Option<(RedirMode, Expr)>,
    ) -> CResult<Option<RedirMode>> {
        match redirect {
            Some((mode, dest)) => {
                self.compile_expr(dest)?;
                Ok(Some(*mode))
            }
            None => Ok(None),
        }
    }
}
