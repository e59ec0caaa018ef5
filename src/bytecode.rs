//! Bytecode file format.
//!
//! A compiled program is pure data, so it serializes directly. The file
//! layout is a small header followed by a bincode payload:
//!
//! ```text
//! +-------------------+
//! | Magic (4 bytes)   |  "AWKB"
//! +-------------------+
//! | Version (4 bytes) |  u32, little endian
//! +-------------------+
//! | Length (4 bytes)  |  u32 payload length
//! +-------------------+
//! | Payload (N bytes) |  bincode-serialized CompiledProgram
//! +-------------------+
//! ```
//!
//! Regexes travel as canonical source text; a loading VM recompiles them
//! at setup, so a corrupt pool entry surfaces as a setup error rather
//! than a panic mid-run.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::compile::CompiledProgram;

/// Magic bytes identifying a compiled AWK program file.
pub const MAGIC: &[u8; 4] = b"AWKB";

/// Current format version.
pub const VERSION: u32 = 1;

const HEADER_LEN: usize = 12;

#[derive(Debug)]
pub enum BytecodeError {
    Io(std::io::Error),
    /// Not a bytecode file.
    InvalidMagic,
    UnsupportedVersion(u32),
    Serialize(String),
    Deserialize(String),
}

impl std::fmt::Display for BytecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BytecodeError::Io(e) => write!(f, "I/O error: {}", e),
            BytecodeError::InvalidMagic => {
                write!(f, "invalid magic bytes - not a compiled AWK program")
            }
            BytecodeError::UnsupportedVersion(v) => {
                write!(f, "unsupported bytecode version: {} (current: {})", v, VERSION)
            }
            BytecodeError::Serialize(e) => write!(f, "failed to serialize: {}", e),
            BytecodeError::Deserialize(e) => write!(f, "failed to deserialize: {}", e),
        }
    }
}

impl std::error::Error for BytecodeError {}

impl From<std::io::Error> for BytecodeError {
    fn from(e: std::io::Error) -> Self {
        BytecodeError::Io(e)
    }
}

/// Serialize a program to bytes (for in-memory use).
pub fn save_to_bytes(program: &CompiledProgram) -> Result<Vec<u8>, BytecodeError> {
    let payload =
        bincode::serialize(program).map_err(|e| BytecodeError::Serialize(e.to_string()))?;
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Deserialize a program from bytes.
pub fn load_from_bytes(data: &[u8]) -> Result<CompiledProgram, BytecodeError> {
    if data.len() < HEADER_LEN || &data[0..4] != MAGIC {
        return Err(BytecodeError::InvalidMagic);
    }
    let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if version > VERSION {
        return Err(BytecodeError::UnsupportedVersion(version));
    }
    let len = u32::from_le_bytes([data[8], data[9], data[10], data[11]]) as usize;
    if data.len() < HEADER_LEN + len {
        return Err(BytecodeError::Deserialize("truncated data".to_string()));
    }
    bincode::deserialize(&data[HEADER_LEN..HEADER_LEN + len])
        .map_err(|e| BytecodeError::Deserialize(e.to_string()))
}

/// Save a program to a bytecode file.
pub fn save<P: AsRef<Path>>(program: &CompiledProgram, path: P) -> Result<(), BytecodeError> {
    let bytes = save_to_bytes(program)?;
    let mut file = File::create(path)?;
    file.write_all(&bytes)?;
    Ok(())
}

/// Load a program from a bytecode file.
pub fn load<P: AsRef<Path>>(path: P) -> Result<CompiledProgram, BytecodeError> {
    let mut data = Vec::new();
    File::open(path)?.read_to_end(&mut data)?;
    load_from_bytes(&data)
}
