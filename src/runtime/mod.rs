//! External I/O: the standard sinks, the per-name stream registry, and
//! child processes for pipes and `system()`.
//!
//! Streams are opened lazily on first use by name (file path or command
//! string) and closed by `close(name)` or at program end. At most one
//! stream is open per name in each direction.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::process::{Child, Command, Stdio};

use crate::ast::RedirMode;
use crate::record::RecordReader;
use crate::vm::error::VmError;

pub(crate) enum OutputStream {
    File(File),
    Command(Child),
}

pub(crate) enum InputStream {
    File(RecordReader),
    Command { child: Child, reader: RecordReader },
}

pub(crate) struct Streams {
    pub output: Box<dyn Write>,
    pub error: Box<dyn Write>,
    outputs: HashMap<String, OutputStream>,
    inputs: HashMap<String, InputStream>,
    shell: Vec<String>,
}

impl std::fmt::Debug for Streams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Streams")
            .field("outputs", &self.outputs.keys().collect::<Vec<_>>())
            .field("inputs", &self.inputs.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Streams {
    pub fn new(output: Box<dyn Write>, error: Box<dyn Write>, shell: Vec<String>) -> Streams {
        Streams {
            output,
            error,
            outputs: HashMap::new(),
            inputs: HashMap::new(),
            shell,
        }
    }

    fn command(&self, cmd: &str) -> Command {
        let mut c = Command::new(&self.shell[0]);
        c.args(&self.shell[1..]);
        c.arg(cmd);
        c
    }

    /// Write `bytes` to the standard sink. Errors here end execution.
    pub fn write_output(&mut self, bytes: &[u8]) -> Result<(), VmError> {
        self.output
            .write_all(bytes)
            .map_err(|e| VmError::io("write error on output", e))
    }

    /// The sink for a redirected `print`/`printf`, opening it on first
    /// use. `>` truncates only at open time; later writes append.
    pub fn redirect(
        &mut self,
        mode: RedirMode,
        name: &str,
        no_file_writes: bool,
        no_exec: bool,
    ) -> Result<&mut dyn Write, VmError> {
        if !self.outputs.contains_key(name) {
            let stream = match mode {
                RedirMode::File | RedirMode::Append => {
                    if no_file_writes {
                        return Err(VmError::Sandbox("writing to a file".to_string()));
                    }
                    let file = OpenOptions::new()
                        .write(true)
                        .create(true)
                        .truncate(mode == RedirMode::File)
                        .append(mode == RedirMode::Append)
                        .open(name)
                        .map_err(|e| VmError::io(&format!("can't open {:?}", name), e))?;
                    OutputStream::File(file)
                }
                RedirMode::Command => {
                    if no_exec {
                        return Err(VmError::Sandbox("executing a command".to_string()));
                    }
                    // Flush so piped output interleaves sensibly.
                    let _ = self.output.flush();
                    let child = self
                        .command(name)
                        .stdin(Stdio::piped())
                        .spawn()
                        .map_err(|e| VmError::io(&format!("can't spawn {:?}", name), e))?;
                    OutputStream::Command(child)
                }
            };
            self.outputs.insert(name.to_string(), stream);
        }
        match self.outputs.get_mut(name).expect("just inserted") {
            OutputStream::File(f) => Ok(f),
            OutputStream::Command(child) => match child.stdin.as_mut() {
                Some(stdin) => Ok(stdin),
                None => Err(VmError::Io(format!("pipe to {:?} is closed", name))),
            },
        }
    }

    /// The reader for `getline < file` or `cmd | getline`, opening it on
    /// first use. Returns `Ok(None)` when the file can't be opened
    /// (getline then yields -1 rather than an error).
    pub fn input(
        &mut self,
        name: &str,
        command: bool,
        no_file_reads: bool,
        no_exec: bool,
    ) -> Result<Option<&mut RecordReader>, VmError> {
        if !self.inputs.contains_key(name) {
            let stream = if command {
                if no_exec {
                    return Err(VmError::Sandbox("executing a command".to_string()));
                }
                let _ = self.output.flush();
                let _ = self.error.flush();
                let spawned = self
                    .command(name)
                    .stdout(Stdio::piped())
                    .spawn();
                match spawned {
                    Ok(mut child) => {
                        let stdout = child.stdout.take();
                        match stdout {
                            Some(out) => InputStream::Command {
                                child,
                                reader: RecordReader::new(Box::new(out)),
                            },
                            None => return Ok(None),
                        }
                    }
                    Err(_) => return Ok(None),
                }
            } else {
                if no_file_reads {
                    return Err(VmError::Sandbox("reading from a file".to_string()));
                }
                match File::open(name) {
                    Ok(f) => InputStream::File(RecordReader::new(Box::new(f))),
                    Err(_) => return Ok(None),
                }
            };
            self.inputs.insert(name.to_string(), stream);
        }
        Ok(Some(match self.inputs.get_mut(name).expect("just inserted") {
            InputStream::File(r) => r,
            InputStream::Command { reader, .. } => reader,
        }))
    }

    /// `close(name)`: close both directions under the name. Returns the
    /// command's exit status, 0 for files, -1 for unknown names.
    pub fn close(&mut self, name: &str) -> f64 {
        let mut status: Option<f64> = None;
        if let Some(stream) = self.outputs.remove(name) {
            status = Some(match stream {
                OutputStream::File(mut f) => {
                    let _ = f.flush();
                    0.0
                }
                OutputStream::Command(mut child) => {
                    drop(child.stdin.take());
                    wait_status(&mut child)
                }
            });
        }
        if let Some(stream) = self.inputs.remove(name) {
            status = Some(match stream {
                InputStream::File(_) => 0.0,
                InputStream::Command { mut child, reader } => {
                    drop(reader);
                    wait_status(&mut child)
                }
            });
        }
        status.unwrap_or(-1.0)
    }

    /// `fflush()` / `fflush(name)`. Returns 0, or -1 for unknown names.
    pub fn flush(&mut self, name: Option<&str>) -> Result<f64, VmError> {
        match name {
            None => {
                self.output
                    .flush()
                    .map_err(|e| VmError::io("write error on output", e))?;
                let _ = self.error.flush();
                let names: Vec<String> = self.outputs.keys().cloned().collect();
                for name in names {
                    self.flush_named(&name)?;
                }
                Ok(0.0)
            }
            Some(name) => {
                if self.outputs.contains_key(name) {
                    self.flush_named(name)?;
                    Ok(0.0)
                } else {
                    Ok(-1.0)
                }
            }
        }
    }

    fn flush_named(&mut self, name: &str) -> Result<(), VmError> {
        if let Some(OutputStream::File(f)) = self.outputs.get_mut(name) {
            f.flush()
                .map_err(|e| VmError::io(&format!("write error on {:?}", name), e))?;
        }
        Ok(())
    }

    /// `system(cmd)`: flush, run through the shell, copy captured output
    /// to the standard sinks, return the exit status.
    pub fn system(&mut self, cmd: &str, no_exec: bool) -> Result<f64, VmError> {
        if no_exec {
            return Err(VmError::Sandbox("executing a command".to_string()));
        }
        self.output
            .flush()
            .map_err(|e| VmError::io("write error on output", e))?;
        let _ = self.error.flush();
        let out = self.command(cmd).output();
        match out {
            Ok(out) => {
                self.write_output(&out.stdout)?;
                let _ = self.error.write_all(&out.stderr);
                Ok(out.status.code().unwrap_or(-1) as f64)
            }
            Err(_) => Ok(-1.0),
        }
    }

    /// Flush and close everything at program end.
    pub fn finish(&mut self) -> Result<(), VmError> {
        let names: Vec<String> = self
            .outputs
            .keys()
            .chain(self.inputs.keys())
            .cloned()
            .collect();
        for name in names {
            self.close(&name);
        }
        self.output
            .flush()
            .map_err(|e| VmError::io("write error on output", e))?;
        let _ = self.error.flush();
        Ok(())
    }
}

fn wait_status(child: &mut Child) -> f64 {
    match child.wait() {
        Ok(status) => status.code().unwrap_or(-1) as f64,
        Err(_) => -1.0,
    }
}
