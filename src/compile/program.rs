//! The compiled program artifact.
//!
//! Pure data: instruction vectors, constant pools, and name tables. No
//! live handles, so a program can round-trip through the bytecode file
//! format (see [`crate::bytecode`]) and be handed to any number of VMs.

use serde::{Deserialize, Serialize};

use crate::vm::Instr;

/// A compiled pattern deciding whether an action body runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CompiledPattern {
    /// No pattern: every record.
    Always,
    /// An expression block leaving one truth value on the stack.
    Expr(Vec<Instr>),
    /// Range endpoints, compiled as two independent expression blocks.
    Range(Vec<Instr>, Vec<Instr>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledAction {
    pub pattern: CompiledPattern,
    pub body: Vec<Instr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledFunction {
    pub name: String,
    pub num_scalar_params: usize,
    pub num_array_params: usize,
    pub body: Vec<Instr>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompiledProgram {
    pub begin: Vec<Instr>,
    pub actions: Vec<CompiledAction>,
    pub end: Vec<Instr>,
    pub functions: Vec<CompiledFunction>,
    /// Numeric constant pool.
    pub nums: Vec<f64>,
    /// String constant pool.
    pub strs: Vec<String>,
    /// Regex constant pool, as canonical source text; compiled at VM
    /// setup (and already validated during interning).
    pub regexes: Vec<String>,
    pub scalar_names: Vec<String>,
    pub array_names: Vec<String>,
    pub native_names: Vec<String>,
}

impl CompiledProgram {
    pub fn num_globals(&self) -> usize {
        self.scalar_names.len()
    }

    pub fn num_global_arrays(&self) -> usize {
        self.array_names.len()
    }

    /// Look up a global array ID by name. Used to locate `ARGV`,
    /// `ENVIRON`, and command-line assignment targets at setup time.
    pub fn array_id(&self, name: &str) -> Option<usize> {
        self.array_names.iter().position(|n| n == name)
    }

    pub fn scalar_id(&self, name: &str) -> Option<usize> {
        self.scalar_names.iter().position(|n| n == name)
    }
}
