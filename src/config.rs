//! VM configuration: streams, arguments, safety flags, and the native
//! function table.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Declared parameter kind of a native function; arguments are coerced
/// to the declared kind before the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Bool,
    Int,
    Float,
    Str,
}

/// Values crossing the native-call boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

pub type NativeFn = Box<dyn FnMut(&[NativeValue]) -> Result<NativeValue, String>>;

/// A host function callable from AWK code. A returned `Err` terminates
/// execution as a runtime error.
pub struct NativeFunction {
    pub params: Vec<ParamKind>,
    pub func: NativeFn,
}

impl NativeFunction {
    pub fn new(
        params: Vec<ParamKind>,
        func: impl FnMut(&[NativeValue]) -> Result<NativeValue, String> + 'static,
    ) -> NativeFunction {
        NativeFunction {
            params,
            func: Box::new(func),
        }
    }
}

impl std::fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFunction")
            .field("params", &self.params)
            .finish()
    }
}

/// Everything a VM needs besides the compiled program.
pub struct Config {
    pub stdin: Box<dyn Read>,
    pub output: Box<dyn Write>,
    pub error: Box<dyn Write>,
    /// The script's own name, seeded as `ARGV[0]`.
    pub argv0: String,
    /// Command-line operands: file names and `name=value` assignments.
    pub args: Vec<String>,
    /// Flat `name, value, …` pairs assigned before BEGIN runs.
    pub vars: Vec<String>,
    /// Flat `name, value, …` pairs seeding the `ENVIRON` array.
    pub environ: Vec<String>,
    /// Native functions by AWK-visible name.
    pub funcs: HashMap<String, NativeFunction>,
    /// Refuse `system()`, pipes, and command getline.
    pub no_exec: bool,
    /// Refuse `getline < file`.
    pub no_file_reads: bool,
    /// Refuse `print > file` and friends.
    pub no_file_writes: bool,
    /// Shell prefix for `system()` and pipes.
    pub shell: Vec<String>,
    pub max_call_depth: usize,
    /// Byte-indexed (instead of character-indexed) `substr`, `length`,
    /// `index`, `match`, and numeric `%c`.
    pub bytes: bool,
    /// Cooperative cancellation: the host sets the flag, the VM checks
    /// it between records and surfaces it as the exit transition.
    pub stop: Option<Arc<AtomicBool>>,
}

impl Default for Config {
    /// A quiet default: empty input, discarded output. Real front-ends
    /// plug in process streams via [`Config::from_stdio`].
    fn default() -> Config {
        Config {
            stdin: Box::new(io::empty()),
            output: Box::new(io::sink()),
            error: Box::new(io::sink()),
            argv0: "awk".to_string(),
            args: Vec::new(),
            vars: Vec::new(),
            environ: Vec::new(),
            funcs: HashMap::new(),
            no_exec: false,
            no_file_reads: false,
            no_file_writes: false,
            shell: vec!["/bin/sh".to_string(), "-c".to_string()],
            max_call_depth: 1000,
            bytes: false,
            stop: None,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("argv0", &self.argv0)
            .field("args", &self.args)
            .field("vars", &self.vars)
            .field("no_exec", &self.no_exec)
            .field("no_file_reads", &self.no_file_reads)
            .field("no_file_writes", &self.no_file_writes)
            .field("shell", &self.shell)
            .field("max_call_depth", &self.max_call_depth)
            .field("bytes", &self.bytes)
            .finish()
    }
}

impl Config {
    /// A config wired to the process's standard streams, with `ENVIRON`
    /// seeded from the process environment.
    pub fn from_stdio() -> Config {
        let mut environ = Vec::new();
        for (k, v) in std::env::vars() {
            environ.push(k);
            environ.push(v);
        }
        Config {
            stdin: Box::new(io::stdin()),
            output: Box::new(io::stdout()),
            error: Box::new(io::stderr()),
            environ,
            ..Config::default()
        }
    }
}
