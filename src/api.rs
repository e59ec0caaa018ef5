//! Programmatic entry points.
//!
//! The typical embedding compiles a resolved AST once and runs it against
//! one or more configs. Parsers living in another process can ship the
//! AST as JSON.

use crate::ast;
use crate::compile::{compile_program, CompileError, CompiledProgram};
use crate::config::Config;
use crate::vm::{SetupError, Vm, VmError};

/// Unified error for the one-call helpers.
#[derive(Debug)]
pub enum Error {
    /// The AST JSON didn't parse.
    Json(String),
    Compile(CompileError),
    Setup(SetupError),
    Runtime(VmError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Json(msg) => write!(f, "invalid program JSON: {}", msg),
            Error::Compile(e) => write!(f, "{}", e),
            Error::Setup(e) => write!(f, "{}", e),
            Error::Runtime(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<CompileError> for Error {
    fn from(e: CompileError) -> Error {
        Error::Compile(e)
    }
}

impl From<SetupError> for Error {
    fn from(e: SetupError) -> Error {
        Error::Setup(e)
    }
}

impl From<VmError> for Error {
    fn from(e: VmError) -> Error {
        Error::Runtime(e)
    }
}

/// Compile a resolved AST delivered as JSON (see [`crate::ast`] for the
/// schema; serde's derived representation is the wire format).
pub fn compile_json(json: &str) -> Result<CompiledProgram, Error> {
    let prog: ast::Program = serde_json::from_str(json).map_err(|e| Error::Json(e.to_string()))?;
    Ok(compile_program(&prog)?)
}

/// Run a compiled program under `config`, returning the exit status.
pub fn run_program(program: &CompiledProgram, config: Config) -> Result<i32, Error> {
    let mut vm = Vm::new(program, config)?;
    Ok(vm.run()?)
}

/// Compile and run in one call.
pub fn run_ast(prog: &ast::Program, config: Config) -> Result<i32, Error> {
    let program = compile_program(prog)?;
    run_program(&program, config)
}
