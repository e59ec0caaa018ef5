//! Compile-time error type and result helpers.

#[derive(Debug)]
pub enum CompileError {
    Msg(String),
    /// A regex literal failed to compile while filling the constant pool.
    Regex { pattern: String, message: String },
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::Msg(msg) => write!(f, "{}", msg),
            CompileError::Regex { pattern, message } => {
                write!(f, "invalid regex /{}/: {}", pattern, message)
            }
        }
    }
}

impl std::error::Error for CompileError {}

pub type CResult<T> = Result<T, CompileError>;

pub fn err<T>(m: impl Into<String>) -> CResult<T> {
    Err(CompileError::Msg(m.into()))
}
