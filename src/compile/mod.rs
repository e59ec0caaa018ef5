//! Compiler: resolved AST → bytecode.
//!
//! One code block is emitted per BEGIN, per END, per pattern endpoint,
//! per action body, and per user function. All blocks share the three
//! deduplicated constant pools. The output [`CompiledProgram`] is pure
//! data and serialization-ready.
//!
//! # Module organization
//!
//! - `compiler.rs`: the `Compiler` struct, emission, jump patching, and
//!   the `LoopContext` break/continue patch lists
//! - `expr.rs`: expression compilation and comparison/branch fusion
//! - `stmt.rs`: statement compilation
//! - `constants.rs`: constant pools with dedup interning
//! - `program.rs`: the compiled artifact
//! - `types.rs`: `CompileError` and result helpers

mod compiler;
mod constants;
mod expr;
mod program;
mod stmt;
mod types;

pub use program::{CompiledAction, CompiledFunction, CompiledPattern, CompiledProgram};
pub use types::{err, CResult, CompileError};

use compiler::Compiler;
use constants::Pools;

use crate::ast::{self, Pattern};
use crate::vm::Instr;

/// Compile a resolved AST into a [`CompiledProgram`].
pub fn compile_program(prog: &ast::Program) -> CResult<CompiledProgram> {
    let mut pools = Pools::new();

    let begin = compile_block(&mut pools, prog, |c| c.compile_stmts(&prog.begin))?;
    let end = compile_block(&mut pools, prog, |c| c.compile_stmts(&prog.end))?;

    let mut actions = Vec::with_capacity(prog.actions.len());
    for action in &prog.actions {
        let pattern = match &action.pattern {
            Pattern::Always => CompiledPattern::Always,
            Pattern::Expr(e) => {
                CompiledPattern::Expr(compile_block(&mut pools, prog, |c| c.compile_expr(e))?)
            }
            Pattern::Range(start, stop) => CompiledPattern::Range(
                compile_block(&mut pools, prog, |c| c.compile_expr(start))?,
                compile_block(&mut pools, prog, |c| c.compile_expr(stop))?,
            ),
        };
        let body = match &action.body {
            Some(stmts) => compile_block(&mut pools, prog, |c| c.compile_stmts(stmts))?,
            // A pattern with no action body prints the record.
            None => vec![Instr::Print {
                num_args: 0,
                redirect: None,
            }],
        };
        actions.push(CompiledAction { pattern, body });
    }

    let mut functions = Vec::with_capacity(prog.functions.len());
    for f in &prog.functions {
        let body = compile_block(&mut pools, prog, |c| c.compile_stmts(&f.body))?;
        functions.push(CompiledFunction {
            name: f.name.clone(),
            num_scalar_params: f.num_scalar_params(),
            num_array_params: f.num_array_params(),
            body,
        });
    }

    Ok(CompiledProgram {
        begin,
        actions,
        end,
        functions,
        nums: pools.nums,
        strs: pools.strs,
        regexes: pools.regexes,
        scalar_names: prog.scalar_names.clone(),
        array_names: prog.array_names.clone(),
        native_names: prog.native_names.clone(),
    })
}

fn compile_block(
    pools: &mut Pools,
    prog: &ast::Program,
    f: impl FnOnce(&mut Compiler<'_>) -> CResult<()>,
) -> CResult<Vec<Instr>> {
    let mut c = Compiler::new(pools, &prog.functions);
    f(&mut c)?;
    debug_assert!(c.loop_stack.is_empty());
    Ok(c.code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;

    fn empty_program() -> ast::Program {
        ast::Program::default()
    }

    #[test]
    fn test_empty_program_compiles() {
        let p = compile_program(&empty_program()).unwrap();
        assert!(p.begin.is_empty());
        assert!(p.actions.is_empty());
        assert!(p.end.is_empty());
    }

    #[test]
    fn test_constant_interning_across_blocks() {
        let prog = ast::Program {
            begin: vec![Stmt::Print {
                args: vec![Expr::Num(7.0)],
                redirect: None,
            }],
            end: vec![Stmt::Print {
                args: vec![Expr::Num(7.0)],
                redirect: None,
            }],
            ..empty_program()
        };
        let p = compile_program(&prog).unwrap();
        assert_eq!(p.nums, vec![7.0]);
        assert_eq!(p.begin, p.end);
    }

    #[test]
    fn test_pattern_only_action_prints_record() {
        let prog = ast::Program {
            actions: vec![Action {
                pattern: Pattern::Expr(Expr::Num(1.0)),
                body: None,
            }],
            ..empty_program()
        };
        let p = compile_program(&prog).unwrap();
        assert_eq!(
            p.actions[0].body,
            vec![Instr::Print {
                num_args: 0,
                redirect: None
            }]
        );
    }

    #[test]
    fn test_bad_regex_is_compile_error() {
        let prog = ast::Program {
            begin: vec![Stmt::Expr(Expr::Regex("[".to_string()))],
            ..empty_program()
        };
        assert!(matches!(
            compile_program(&prog),
            Err(CompileError::Regex { .. })
        ));
    }

    #[test]
    fn test_if_branch_is_fused_and_relative() {
        // if (1 < 2) print "y"  — the comparison fuses into one branch.
        let prog = ast::Program {
            begin: vec![Stmt::If {
                cond: Expr::Binary {
                    op: BinOp::Less,
                    left: Box::new(Expr::Num(1.0)),
                    right: Box::new(Expr::Num(2.0)),
                },
                then_body: vec![Stmt::Print {
                    args: vec![Expr::Str("y".to_string())],
                    redirect: None,
                }],
                else_body: vec![],
            }],
            ..empty_program()
        };
        let p = compile_program(&prog).unwrap();
        // Num, Num, JumpGreaterOrEqual(+2), Str, Print
        assert_eq!(p.begin.len(), 5);
        assert_eq!(p.begin[2], Instr::JumpGreaterOrEqual(2));
    }

    #[test]
    fn test_while_loop_shape() {
        // while (x) x = 0
        let prog = ast::Program {
            begin: vec![Stmt::While {
                cond: Expr::Var(Scalar::Global(0)),
                body: vec![Stmt::Expr(Expr::Assign {
                    target: LValue::Var(Scalar::Global(0)),
                    value: Box::new(Expr::Num(0.0)),
                })],
            }],
            scalar_names: vec!["x".to_string()],
            ..empty_program()
        };
        let p = compile_program(&prog).unwrap();
        // Global, JumpFalse(+3), Num, AssignGlobal, Jump(-5)
        assert_eq!(
            p.begin,
            vec![
                Instr::Global(0),
                Instr::JumpFalse(3),
                Instr::Num(0),
                Instr::AssignGlobal(0),
                Instr::Jump(-5),
            ]
        );
    }

    #[test]
    fn test_for_in_body_length() {
        // for (k in a) print k
        let prog = ast::Program {
            begin: vec![Stmt::ForIn {
                var: Scalar::Global(0),
                array: Array::Global(0),
                body: vec![Stmt::Print {
                    args: vec![Expr::Var(Scalar::Global(0))],
                    redirect: None,
                }],
            }],
            scalar_names: vec!["k".to_string()],
            array_names: vec!["a".to_string()],
            ..empty_program()
        };
        let p = compile_program(&prog).unwrap();
        assert_eq!(
            p.begin[0],
            Instr::ForInGlobal {
                var: 0,
                array: Array::Global(0),
                body_len: 2
            }
        );
        assert_eq!(p.begin.len(), 3);
    }

    #[test]
    fn test_missing_scalar_args_padded_with_nulls() {
        let prog = ast::Program {
            functions: vec![Function {
                name: "f".to_string(),
                params: vec![false, false],
                body: vec![Stmt::Return(None)],
            }],
            begin: vec![Stmt::Expr(Expr::CallUser {
                func: 0,
                args: vec![CallArg::Scalar(Expr::Num(1.0))],
            })],
            ..empty_program()
        };
        let p = compile_program(&prog).unwrap();
        assert!(p.begin.contains(&Instr::Nulls(1)));
    }
}
