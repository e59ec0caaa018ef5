//! Shared helpers: AST builders (the crate consumes a resolved AST from
//! an external parser, so tests construct programs directly) and a
//! capture-everything runner.

#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Cursor, Write};
use std::rc::Rc;

use awk_vm::ast::*;
use awk_vm::{compile_program, Config, Vm, VmError};

/// An output sink the test keeps a handle to after the VM takes the
/// writer.
#[derive(Clone, Default)]
pub struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).expect("test output is UTF-8")
    }
}

/// Compile and run, returning (stdout, exit status).
pub fn run_prog(prog: &Program, input: &str) -> (String, i32) {
    run_with_config(prog, input, |_| {})
}

pub fn run_with_config(
    prog: &Program,
    input: &str,
    configure: impl FnOnce(&mut Config),
) -> (String, i32) {
    try_run_with_config(prog, input, configure).expect("program failed")
}

/// Like `run_prog` but surfaces runtime errors.
pub fn try_run(prog: &Program, input: &str) -> Result<(String, i32), VmError> {
    try_run_with_config(prog, input, |_| {})
}

pub fn try_run_with_config(
    prog: &Program,
    input: &str,
    configure: impl FnOnce(&mut Config),
) -> Result<(String, i32), VmError> {
    let compiled = compile_program(prog).expect("compile failed");
    let out = SharedBuf::default();
    let mut config = Config {
        stdin: Box::new(Cursor::new(input.to_string().into_bytes())),
        output: Box::new(out.clone()),
        error: Box::new(io::sink()),
        ..Config::default()
    };
    configure(&mut config);
    let mut vm = Vm::new(&compiled, config).expect("setup failed");
    let status = vm.run()?;
    Ok((out.contents(), status))
}

// ── expression builders ──────────────────────────────────────────────────

pub fn num(n: f64) -> Expr {
    Expr::Num(n)
}

pub fn s(v: &str) -> Expr {
    Expr::Str(v.to_string())
}

pub fn g(i: usize) -> Expr {
    Expr::Var(Scalar::Global(i))
}

pub fn local(i: usize) -> Expr {
    Expr::Var(Scalar::Local(i))
}

pub fn sp(sv: SpecialVar) -> Expr {
    Expr::Var(Scalar::Special(sv))
}

pub fn field(e: Expr) -> Expr {
    Expr::Field(Box::new(e))
}

pub fn bin(op: BinOp, l: Expr, r: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(l),
        right: Box::new(r),
    }
}

pub fn concat(l: Expr, r: Expr) -> Expr {
    bin(BinOp::Concat, l, r)
}

pub fn index_g(a: usize, keys: Vec<Expr>) -> Expr {
    Expr::Index(Array::Global(a), keys)
}

pub fn index_l(a: usize, keys: Vec<Expr>) -> Expr {
    Expr::Index(Array::Local(a), keys)
}

pub fn assign(target: LValue, value: Expr) -> Expr {
    Expr::Assign {
        target,
        value: Box::new(value),
    }
}

pub fn lv_g(i: usize) -> LValue {
    LValue::Var(Scalar::Global(i))
}

pub fn lv_sp(sv: SpecialVar) -> LValue {
    LValue::Var(Scalar::Special(sv))
}

pub fn lv_field(e: Expr) -> LValue {
    LValue::Field(Box::new(e))
}

pub fn lv_index_g(a: usize, keys: Vec<Expr>) -> LValue {
    LValue::Index(Array::Global(a), keys)
}

// ── statement builders ───────────────────────────────────────────────────

pub fn expr(e: Expr) -> Stmt {
    Stmt::Expr(e)
}

pub fn print(args: Vec<Expr>) -> Stmt {
    Stmt::Print {
        args,
        redirect: None,
    }
}

pub fn printf(args: Vec<Expr>) -> Stmt {
    Stmt::Printf {
        args,
        redirect: None,
    }
}

/// A program with one Always action.
pub fn main_action(body: Vec<Stmt>) -> Program {
    Program {
        actions: vec![Action {
            pattern: Pattern::Always,
            body: Some(body),
        }],
        ..Program::default()
    }
}

/// A BEGIN-only program.
pub fn begin(stmts: Vec<Stmt>) -> Program {
    Program {
        begin: stmts,
        ..Program::default()
    }
}
