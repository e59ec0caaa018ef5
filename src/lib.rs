//! Bytecode compiler and stack-based virtual machine for POSIX AWK.
//!
//! The crate consumes a resolved AST (scopes and indices already bound
//! by an external parser), lowers it to a compact scope-specialized
//! bytecode, and executes it against a stream of input records with
//! AWK's dual number/string value semantics.
//!
//! ```no_run
//! use awk_vm::{ast, compile_program, Config, Vm};
//!
//! // A parser produced this resolved AST: BEGIN { print "hello" }
//! let prog = ast::Program {
//!     begin: vec![ast::Stmt::Print {
//!         args: vec![ast::Expr::Str("hello".to_string())],
//!         redirect: None,
//!     }],
//!     ..ast::Program::default()
//! };
//! let compiled = compile_program(&prog).unwrap();
//! let mut vm = Vm::new(&compiled, Config::from_stdio()).unwrap();
//! let status = vm.run().unwrap();
//! ```

// Core modules
pub mod ast;
pub mod compile;
pub mod config;
pub mod vm;

// Record/field engine
pub mod record;

// External I/O facade
mod runtime;

// Formatting, RNG
pub mod fmt;
pub mod rand;

// Diagnostics and the bytecode file format
pub mod bytecode;
pub mod disasm;

// Rust API for programmatic use
pub mod api;
pub use api::{compile_json, run_ast, run_program, Error};

pub use compile::{compile_program, CompileError, CompiledProgram};
pub use config::{Config, NativeFunction, NativeValue, ParamKind};
pub use vm::{Instr, SetupError, Value, Vm, VmError};
