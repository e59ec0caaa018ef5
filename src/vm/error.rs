//! Runtime and setup errors.
//!
//! Control-flow transfers (`break`, `next`, `return`, `exit`) are not
//! errors; they are VM state transitions (see `exec::Flow`) and never
//! appear here.

/// Errors raised while the VM is executing bytecode. All are fatal to
/// the current program run and unwind to the host verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum VmError {
    DivisionByZero,
    DivisionByZeroMod,
    /// Negative or absurdly large field index.
    FieldIndex(i64),
    NfNegative(i64),
    /// A regex built at runtime failed to compile.
    InvalidRegex(String, String),
    CallDepthExceeded(usize),
    /// `printf`/`sprintf` format trouble.
    Format(String),
    /// A native function returned an error.
    NativeCall { name: String, message: String },
    /// An operation refused by a safety flag.
    Sandbox(String),
    /// Fatal I/O on a standard or named stream.
    Io(String),
    /// `next` outside the main record loop.
    NextOutsideAction,
    /// `nextfile` outside the main record loop.
    NextFileOutsideAction,
    /// A bytecode-level invariant broke; always a compiler bug.
    Internal(String),
}

impl VmError {
    pub(crate) fn io(context: &str, err: std::io::Error) -> VmError {
        VmError::Io(format!("{}: {}", context, err))
    }
}

impl std::fmt::Display for VmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VmError::DivisionByZero => write!(f, "division by zero"),
            VmError::DivisionByZeroMod => write!(f, "division by zero in %"),
            VmError::FieldIndex(i) => {
                if *i < 0 {
                    write!(f, "field index negative: {}", i)
                } else {
                    write!(f, "field index too large: {}", i)
                }
            }
            VmError::NfNegative(n) => write!(f, "NF set to negative value: {}", n),
            VmError::InvalidRegex(pattern, msg) => {
                write!(f, "invalid regex \"{}\": {}", pattern, msg)
            }
            VmError::CallDepthExceeded(limit) => {
                write!(f, "call depth exceeded (limit {})", limit)
            }
            VmError::Format(msg) => write!(f, "{}", msg),
            VmError::NativeCall { name, message } => {
                write!(f, "error in native function {}: {}", name, message)
            }
            VmError::Sandbox(what) => write!(f, "sandbox mode prohibits {}", what),
            VmError::Io(msg) => write!(f, "{}", msg),
            VmError::NextOutsideAction => write!(f, "next used outside of action"),
            VmError::NextFileOutsideAction => write!(f, "nextfile used outside of action"),
            VmError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for VmError {}

/// Errors raised while constructing a VM, before the first opcode runs.
#[derive(Debug)]
pub enum SetupError {
    /// The flat `name, value, …` variable list has odd length.
    OddVars(usize),
    /// The flat environment list has odd length.
    OddEnviron(usize),
    /// A regex pool entry failed to compile (possible when a program is
    /// loaded from a bytecode file rather than freshly compiled).
    InvalidRegex { pattern: String, message: String },
    /// The program calls a native function the config does not provide.
    UnknownNativeFunction(String),
    /// A pre-assignment from the config failed to apply.
    Var { name: String, message: String },
}

impl std::fmt::Display for SetupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetupError::OddVars(n) => {
                write!(f, "variable list must have even length, got {}", n)
            }
            SetupError::OddEnviron(n) => {
                write!(f, "environment list must have even length, got {}", n)
            }
            SetupError::InvalidRegex { pattern, message } => {
                write!(f, "invalid regex /{}/ in constant pool: {}", pattern, message)
            }
            SetupError::UnknownNativeFunction(name) => {
                write!(f, "program calls undefined function {}()", name)
            }
            SetupError::Var { name, message } => {
                write!(f, "can't pre-assign {}: {}", name, message)
            }
        }
    }
}

impl std::error::Error for SetupError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_division_by_zero_message() {
        assert_eq!(VmError::DivisionByZero.to_string(), "division by zero");
        assert_eq!(VmError::DivisionByZeroMod.to_string(), "division by zero in %");
    }

    #[test]
    fn test_field_index_messages() {
        assert_eq!(
            VmError::FieldIndex(-1).to_string(),
            "field index negative: -1"
        );
        assert_eq!(
            VmError::FieldIndex(2_000_000).to_string(),
            "field index too large: 2000000"
        );
    }

    #[test]
    fn test_setup_error_display() {
        let e = SetupError::UnknownNativeFunction("frob".to_string());
        assert_eq!(e.to_string(), "program calls undefined function frob()");
    }
}
