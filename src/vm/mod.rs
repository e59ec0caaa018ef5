//! The virtual machine.
//!
//! A `Vm` bundles every piece of mutable interpreter state — globals,
//! value stack, call frames, the array arena, the record/field engine,
//! stream registries, RNG, and the bounded regex/format caches — behind
//! one owned object. There is no process-wide state; independent VMs
//! never share anything mutable.
//!
//! `run()` drives the per-record state machine: BEGIN, then for each
//! input record each action's pattern and (on match) its body, then END.
//! Control sentinels (`next`, `nextfile`, `exit`, `break`, `return`) are
//! the `Flow` result of `exec::execute`, checked at the boundaries the
//! language defines; they never escape this module.

pub mod error;
pub mod instr;
pub mod value;

mod builtins;
mod exec;
mod frame;
mod stack;

pub use error::{SetupError, VmError};
pub use instr::Instr;
pub use value::Value;

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;

use regex::Regex;

use crate::ast::SpecialVar;
use crate::compile::CompiledProgram;
use crate::config::{Config, NativeFunction};
use crate::fmt::Formatter;
use crate::rand::Xoshiro;
use crate::record::{Record, RecordReader, RecordSep};
use crate::runtime::Streams;
use exec::Flow;
use frame::Frame;

const REGEX_CACHE_CAPACITY: usize = 100;
const MAX_FIELD_INDEX: i64 = 1_000_000;

/// A record separator that owns its compiled regex, so reads don't
/// borrow the VM's cache.
enum OwnedSep {
    Newline,
    Paragraph,
    Char(char),
    Regex(Regex),
}

impl OwnedSep {
    fn as_sep(&self) -> RecordSep<'_> {
        match self {
            OwnedSep::Newline => RecordSep::Newline,
            OwnedSep::Paragraph => RecordSep::Paragraph,
            OwnedSep::Char(c) => RecordSep::Char(*c),
            OwnedSep::Regex(re) => RecordSep::Regex(re),
        }
    }
}

pub struct Vm<'p> {
    pub(crate) program: &'p CompiledProgram,
    /// Regex pool compiled from the program's canonical source text.
    pub(crate) regex_pool: Vec<Regex>,

    pub(crate) globals: Vec<Value>,
    pub(crate) stack: Vec<Value>,
    pub(crate) frames: Vec<Frame>,
    /// Array arena: global arrays first, call temporaries above.
    pub(crate) arrays: Vec<HashMap<String, Value>>,
    pub(crate) return_value: Value,

    pub(crate) record: Record,
    pub(crate) io: Streams,
    pub(crate) natives: Vec<NativeFunction>,
    pub(crate) formatter: Formatter,
    regex_cache: HashMap<String, Regex>,
    pub(crate) rng: Xoshiro,
    pub(crate) rng_seed: f64,

    // Special variables not owned by the record engine.
    pub(crate) nr: i64,
    pub(crate) fnr: i64,
    pub(crate) filename: String,
    pub(crate) argc: f64,
    pub(crate) rstart: f64,
    pub(crate) rlength: f64,
    pub(crate) rt: String,
    pub(crate) fs: String,
    pub(crate) rs: String,
    pub(crate) ofs: String,
    pub(crate) ors: String,
    pub(crate) convfmt: String,
    pub(crate) ofmt: String,
    pub(crate) subsep: String,

    // Main input iteration.
    stdin: Option<Box<dyn Read>>,
    current_input: Option<RecordReader>,
    arg_index: usize,
    read_file_args: bool,
    stdin_consumed: bool,
    args_fallback: Vec<String>,
    argv0: String,
    argv_array: Option<usize>,

    range_active: Vec<bool>,
    stop: Option<std::sync::Arc<std::sync::atomic::AtomicBool>>,
    pub(crate) exiting: bool,
    pub(crate) exit_status: i32,

    pub(crate) max_call_depth: usize,
    pub(crate) bytes: bool,
    pub(crate) no_exec: bool,
    pub(crate) no_file_reads: bool,
    pub(crate) no_file_writes: bool,
}

impl std::fmt::Debug for Vm<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vm")
            .field("nr", &self.nr)
            .field("frames", &self.frames.len())
            .field("stack", &self.stack.len())
            .field("exiting", &self.exiting)
            .finish()
    }
}

impl<'p> Vm<'p> {
    /// Build a VM for `program`. Setup errors (malformed config, unbound
    /// native functions, a bad regex pool entry) surface here, before
    /// the first opcode runs.
    pub fn new(program: &'p CompiledProgram, config: Config) -> Result<Vm<'p>, SetupError> {
        if config.vars.len() % 2 != 0 {
            return Err(SetupError::OddVars(config.vars.len()));
        }
        if config.environ.len() % 2 != 0 {
            return Err(SetupError::OddEnviron(config.environ.len()));
        }

        let mut regex_pool = Vec::with_capacity(program.regexes.len());
        for src in &program.regexes {
            let re = Regex::new(src).map_err(|e| SetupError::InvalidRegex {
                pattern: src.clone(),
                message: e.to_string(),
            })?;
            regex_pool.push(re);
        }

        let mut funcs = config.funcs;
        let mut natives = Vec::with_capacity(program.native_names.len());
        for name in &program.native_names {
            match funcs.remove(name) {
                Some(f) => natives.push(f),
                None => return Err(SetupError::UnknownNativeFunction(name.clone())),
            }
        }

        let mut arrays: Vec<HashMap<String, Value>> =
            vec![HashMap::new(); program.num_global_arrays()];

        if let Some(id) = program.array_id("ENVIRON") {
            for pair in config.environ.chunks(2) {
                arrays[id].insert(pair[0].clone(), Value::num_str(pair[1].clone()));
            }
        }
        let argv_array = program.array_id("ARGV");
        if let Some(id) = argv_array {
            arrays[id].insert("0".to_string(), Value::num_str(config.argv0.clone()));
            for (i, arg) in config.args.iter().enumerate() {
                arrays[id].insert((i + 1).to_string(), Value::num_str(arg.clone()));
            }
        }

        let mut vm = Vm {
            program,
            regex_pool,
            globals: vec![Value::Null; program.num_globals()],
            stack: Vec::with_capacity(64),
            frames: Vec::new(),
            arrays,
            return_value: Value::Null,
            record: Record::new(),
            io: Streams::new(config.output, config.error, config.shell),
            natives,
            formatter: Formatter::new(),
            regex_cache: HashMap::new(),
            rng: Xoshiro::new(0),
            rng_seed: 0.0,
            nr: 0,
            fnr: 0,
            filename: String::new(),
            argc: 1.0 + config.args.len() as f64,
            rstart: 0.0,
            rlength: -1.0,
            rt: String::new(),
            fs: " ".to_string(),
            rs: "\n".to_string(),
            ofs: " ".to_string(),
            ors: "\n".to_string(),
            convfmt: "%.6g".to_string(),
            ofmt: "%.6g".to_string(),
            subsep: "\x1c".to_string(),
            stdin: Some(config.stdin),
            current_input: None,
            arg_index: 1,
            read_file_args: false,
            stdin_consumed: false,
            args_fallback: config.args,
            argv0: config.argv0,
            argv_array,
            range_active: vec![false; program.actions.len()],
            stop: config.stop,
            exiting: false,
            exit_status: 0,
            max_call_depth: config.max_call_depth,
            bytes: config.bytes,
            no_exec: config.no_exec,
            no_file_reads: config.no_file_reads,
            no_file_writes: config.no_file_writes,
        };

        for pair in config.vars.chunks(2) {
            vm.assign_by_name(&pair[0], &pair[1])
                .map_err(|e| SetupError::Var {
                    name: pair[0].clone(),
                    message: e.to_string(),
                })?;
        }

        Ok(vm)
    }

    /// Run the program to completion, returning the exit status (the
    /// last value passed to `exit`, default 0).
    pub fn run(&mut self) -> Result<i32, VmError> {
        let program = self.program;

        match self.execute(&program.begin)? {
            Flow::Normal => {}
            Flow::Exit => {
                self.stack.clear();
                self.exiting = true;
            }
            Flow::Next => return Err(VmError::NextOutsideAction),
            Flow::NextFile => return Err(VmError::NextFileOutsideAction),
            flow => {
                return Err(VmError::Internal(format!(
                    "control flow {:?} escaped BEGIN",
                    flow
                )))
            }
        }

        // Only consume input when something will look at records.
        if !self.exiting && (!program.actions.is_empty() || !program.end.is_empty()) {
            'records: loop {
                // Cooperative cancellation, checked between records.
                if let Some(stop) = &self.stop {
                    if stop.load(std::sync::atomic::Ordering::Relaxed) {
                        break;
                    }
                }
                let line = match self.next_main_record()? {
                    Some(line) => line,
                    None => break,
                };
                self.record.set_record(line, false);
                for i in 0..program.actions.len() {
                    let action = &program.actions[i];
                    if !self.pattern_matches(i, action)? {
                        continue;
                    }
                    match self.execute(&action.body)? {
                        Flow::Normal => {}
                        // next/nextfile/exit may unwind mid-expression;
                        // drop any temporaries (frames are already gone).
                        Flow::Next => {
                            self.stack.clear();
                            continue 'records;
                        }
                        Flow::NextFile => {
                            self.stack.clear();
                            self.current_input = None;
                            continue 'records;
                        }
                        Flow::Exit => {
                            self.stack.clear();
                            break 'records;
                        }
                        flow => {
                            return Err(VmError::Internal(format!(
                                "control flow {:?} escaped action",
                                flow
                            )))
                        }
                    }
                }
            }
        }

        match self.execute(&program.end)? {
            Flow::Normal | Flow::Exit => {}
            Flow::Next => return Err(VmError::NextOutsideAction),
            Flow::NextFile => return Err(VmError::NextFileOutsideAction),
            flow => {
                return Err(VmError::Internal(format!(
                    "control flow {:?} escaped END",
                    flow
                )))
            }
        }

        self.io.finish()?;
        Ok(self.exit_status)
    }

    fn pattern_matches(
        &mut self,
        index: usize,
        action: &crate::compile::CompiledAction,
    ) -> Result<bool, VmError> {
        use crate::compile::CompiledPattern;
        match &action.pattern {
            CompiledPattern::Always => Ok(true),
            CompiledPattern::Expr(block) => self.eval_pattern(block),
            CompiledPattern::Range(start, stop) => {
                if self.range_active[index] {
                    if self.eval_pattern(stop)? {
                        self.range_active[index] = false;
                    }
                    Ok(true)
                } else if self.eval_pattern(start)? {
                    self.range_active[index] = !self.eval_pattern(stop)?;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    /// Execute a pattern's expression block and pop its truth value.
    fn eval_pattern(&mut self, block: &[Instr]) -> Result<bool, VmError> {
        use stack::StackOps;
        match self.execute(block)? {
            Flow::Normal => {}
            flow => {
                return Err(VmError::Internal(format!(
                    "control flow {:?} escaped pattern",
                    flow
                )))
            }
        }
        Ok(self.stack.pop_value()?.is_true())
    }

    // ── special variables ────────────────────────────────────────────────

    pub(crate) fn paragraph_mode(&self) -> bool {
        self.rs.is_empty()
    }

    pub(crate) fn get_special(&mut self, sv: SpecialVar) -> Result<Value, VmError> {
        Ok(match sv {
            SpecialVar::Nf => {
                let par = self.paragraph_mode();
                Value::num(self.record.nf(&self.fs, par)? as f64)
            }
            SpecialVar::Nr => Value::num(self.nr as f64),
            SpecialVar::Fnr => Value::num(self.fnr as f64),
            SpecialVar::Fs => Value::str(self.fs.clone()),
            SpecialVar::Rs => Value::str(self.rs.clone()),
            SpecialVar::Ofs => Value::str(self.ofs.clone()),
            SpecialVar::Ors => Value::str(self.ors.clone()),
            SpecialVar::Convfmt => Value::str(self.convfmt.clone()),
            SpecialVar::Ofmt => Value::str(self.ofmt.clone()),
            SpecialVar::Subsep => Value::str(self.subsep.clone()),
            SpecialVar::Filename => Value::str(self.filename.clone()),
            SpecialVar::Argc => Value::num(self.argc),
            SpecialVar::Rstart => Value::num(self.rstart),
            SpecialVar::Rlength => Value::num(self.rlength),
            SpecialVar::Rt => Value::str(self.rt.clone()),
        })
    }

    /// Assignments to special variables take effect immediately; `FS`
    /// and `RS` affect the next split/read, `NF` resizes the record.
    pub(crate) fn set_special(&mut self, sv: SpecialVar, v: Value) -> Result<(), VmError> {
        match sv {
            SpecialVar::Nf => {
                let nf = v.as_num() as i64;
                let par = self.paragraph_mode();
                let (fs, ofs) = (self.fs.clone(), self.ofs.clone());
                self.record.set_nf(nf, &fs, par, &ofs)?;
            }
            SpecialVar::Nr => self.nr = v.as_num() as i64,
            SpecialVar::Fnr => self.fnr = v.as_num() as i64,
            SpecialVar::Fs => self.fs = v.as_str(&self.convfmt),
            SpecialVar::Rs => self.rs = v.as_str(&self.convfmt),
            SpecialVar::Ofs => self.ofs = v.as_str(&self.convfmt),
            SpecialVar::Ors => self.ors = v.as_str(&self.convfmt),
            SpecialVar::Convfmt => self.convfmt = v.as_str(&self.convfmt),
            SpecialVar::Ofmt => self.ofmt = v.as_str(&self.convfmt),
            SpecialVar::Subsep => self.subsep = v.as_str(&self.convfmt),
            SpecialVar::Filename => self.filename = v.as_str(&self.convfmt),
            SpecialVar::Argc => self.argc = v.as_num(),
            SpecialVar::Rstart => self.rstart = v.as_num(),
            SpecialVar::Rlength => self.rlength = v.as_num(),
            SpecialVar::Rt => self.rt = v.as_str(&self.convfmt),
        }
        Ok(())
    }

    // ── fields ───────────────────────────────────────────────────────────

    pub(crate) fn field_index(v: &Value) -> Result<i64, VmError> {
        let f = v.as_num();
        let i = f as i64;
        if i > MAX_FIELD_INDEX {
            return Err(VmError::FieldIndex(i));
        }
        Ok(i)
    }

    pub(crate) fn get_field(&mut self, index: i64) -> Result<Value, VmError> {
        let par = self.paragraph_mode();
        self.record.field(index, &self.fs, par, &self.ofs)
    }

    pub(crate) fn set_field_value(&mut self, index: i64, v: Value) -> Result<(), VmError> {
        let s = v.as_str(&self.convfmt);
        let is_str = v.is_true_str();
        let par = self.paragraph_mode();
        let (fs, ofs) = (self.fs.clone(), self.ofs.clone());
        self.record.set_field(index, s, is_str, &fs, par, &ofs)
    }

    // ── regexes ──────────────────────────────────────────────────────────

    /// Compile (or fetch) a dynamic regex. The cache is bounded and
    /// insert-until-full: a program rarely has more than a handful of
    /// distinct patterns, and the rare overflow just recompiles.
    pub(crate) fn cached_regex(&mut self, pattern: &str) -> Result<Regex, VmError> {
        if let Some(re) = self.regex_cache.get(pattern) {
            return Ok(re.clone());
        }
        let re = Regex::new(pattern)
            .map_err(|e| VmError::InvalidRegex(pattern.to_string(), e.to_string()))?;
        if self.regex_cache.len() < REGEX_CACHE_CAPACITY {
            self.regex_cache.insert(pattern.to_string(), re.clone());
        }
        Ok(re)
    }

    // ── arrays ───────────────────────────────────────────────────────────

    pub(crate) fn resolve_array(&self, array: crate::ast::Array) -> Result<usize, VmError> {
        match array {
            crate::ast::Array::Global(a) => Ok(a),
            crate::ast::Array::Local(l) => self
                .frames
                .last()
                .and_then(|f| f.arrays.get(l).copied())
                .ok_or_else(|| VmError::Internal("local array outside a call".to_string())),
        }
    }

    // ── main input ───────────────────────────────────────────────────────

    fn make_sep(&mut self) -> Result<OwnedSep, VmError> {
        if self.rs == "\n" {
            return Ok(OwnedSep::Newline);
        }
        if self.rs.is_empty() {
            return Ok(OwnedSep::Paragraph);
        }
        let mut chars = self.rs.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Ok(OwnedSep::Char(c));
        }
        let rs = self.rs.clone();
        Ok(OwnedSep::Regex(self.cached_regex(&rs)?))
    }

    /// The next record from the main input, advancing `NR`/`FNR`, `RT`,
    /// and `FILENAME` and applying `name=value` operands along the way.
    pub(crate) fn next_main_record(&mut self) -> Result<Option<String>, VmError> {
        loop {
            if self.current_input.is_some() {
                let sep = self.make_sep()?;
                let read = self
                    .current_input
                    .as_mut()
                    .expect("input checked above")
                    .read_record(&sep.as_sep())
                    .map_err(|e| VmError::io("read error on input", e))?;
                if let Some((line, rt)) = read {
                    self.rt = rt;
                    self.nr += 1;
                    self.fnr += 1;
                    return Ok(Some(line));
                }
                self.current_input = None;
                continue;
            }
            if !self.open_next_input()? {
                return Ok(None);
            }
        }
    }

    /// Open the next input source per `ARGV`; returns false when inputs
    /// are exhausted.
    fn open_next_input(&mut self) -> Result<bool, VmError> {
        loop {
            if (self.arg_index as f64) < self.argc {
                let i = self.arg_index;
                self.arg_index += 1;
                let arg = self.argv_value(i);
                if arg.is_empty() {
                    continue;
                }
                if let Some((name, value)) = parse_operand_assignment(&arg) {
                    self.assign_by_name(name, value)?;
                    continue;
                }
                self.read_file_args = true;
                self.filename = arg.clone();
                self.fnr = 0;
                let reader = if arg == "-" {
                    match self.stdin.take() {
                        Some(r) => RecordReader::new(r),
                        None => continue,
                    }
                } else {
                    let file = File::open(&arg)
                        .map_err(|e| VmError::io(&format!("can't open file {:?}", arg), e))?;
                    RecordReader::new(Box::new(file))
                };
                self.current_input = Some(reader);
                return Ok(true);
            }
            // No file operands at all: read standard input once.
            if !self.read_file_args && !self.stdin_consumed {
                self.stdin_consumed = true;
                if let Some(r) = self.stdin.take() {
                    self.filename = String::new();
                    self.fnr = 0;
                    self.current_input = Some(RecordReader::new(r));
                    return Ok(true);
                }
            }
            return Ok(false);
        }
    }

    /// `ARGV[i]`, honoring runtime mutation when the program references
    /// the array, else falling back to the config's operand list.
    fn argv_value(&self, i: usize) -> String {
        if let Some(id) = self.argv_array {
            return self.arrays[id]
                .get(&i.to_string())
                .map(|v| v.as_str(&self.convfmt))
                .unwrap_or_default();
        }
        if i == 0 {
            self.argv0.clone()
        } else {
            self.args_fallback.get(i - 1).cloned().unwrap_or_default()
        }
    }

    /// Assign a variable by source name (command-line operand or config
    /// pre-assignment) with numeric-string semantics. Names the program
    /// never mentions are ignored.
    fn assign_by_name(&mut self, name: &str, value: &str) -> Result<(), VmError> {
        let v = Value::num_str(value.to_string());
        if let Some(sv) = SpecialVar::from_name(name) {
            return self.set_special(sv, v);
        }
        if let Some(id) = self.program.scalar_id(name) {
            self.globals[id] = v;
        }
        Ok(())
    }

    // ── getline stream reads ─────────────────────────────────────────────

    /// Read one record from a named file or command, for getline. Ok
    /// values mirror getline's contract: `Some(line)`, or `None` for
    /// EOF; the outer Option is `None` when the stream can't be opened.
    pub(crate) fn read_stream_record(
        &mut self,
        name: &str,
        command: bool,
    ) -> Result<Option<Option<String>>, VmError> {
        let sep = self.make_sep()?;
        let reader = match self
            .io
            .input(name, command, self.no_file_reads, self.no_exec)?
        {
            Some(r) => r,
            None => return Ok(None),
        };
        match reader.read_record(&sep.as_sep()) {
            Ok(Some((line, rt))) => {
                self.rt = rt;
                Ok(Some(Some(line)))
            }
            Ok(None) => Ok(Some(None)),
            Err(_) => Ok(None),
        }
    }
}

/// `name=value` command-line operand, per POSIX: the name must look like
/// an identifier for the operand to count as an assignment.
fn parse_operand_assignment(arg: &str) -> Option<(&str, &str)> {
    let eq = arg.find('=')?;
    let name = &arg[..eq];
    let mut chars = name.chars();
    let first = chars.next()?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    Some((name, &arg[eq + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_operand_assignment() {
        assert_eq!(parse_operand_assignment("x=1"), Some(("x", "1")));
        assert_eq!(parse_operand_assignment("_a1=b=c"), Some(("_a1", "b=c")));
        assert_eq!(parse_operand_assignment("file.txt"), None);
        assert_eq!(parse_operand_assignment("1x=2"), None);
        assert_eq!(parse_operand_assignment("=v"), None);
    }

    #[test]
    fn test_setup_rejects_odd_vars() {
        let program = CompiledProgram::default();
        let config = Config {
            vars: vec!["FS".to_string()],
            ..Config::default()
        };
        assert!(matches!(
            Vm::new(&program, config),
            Err(SetupError::OddVars(1))
        ));
    }

    #[test]
    fn test_setup_rejects_bad_pool_regex() {
        let program = CompiledProgram {
            regexes: vec!["[".to_string()],
            ..CompiledProgram::default()
        };
        assert!(matches!(
            Vm::new(&program, Config::default()),
            Err(SetupError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn test_setup_rejects_unknown_native() {
        let program = CompiledProgram {
            native_names: vec!["frob".to_string()],
            ..CompiledProgram::default()
        };
        assert!(matches!(
            Vm::new(&program, Config::default()),
            Err(SetupError::UnknownNativeFunction(_))
        ));
    }

    #[test]
    fn test_special_defaults() {
        let program = CompiledProgram::default();
        let mut vm = Vm::new(&program, Config::default()).unwrap();
        assert_eq!(vm.get_special(SpecialVar::Fs).unwrap(), Value::str(" "));
        assert_eq!(vm.get_special(SpecialVar::Rs).unwrap(), Value::str("\n"));
        assert_eq!(vm.get_special(SpecialVar::Ofs).unwrap(), Value::str(" "));
        assert_eq!(vm.get_special(SpecialVar::Ors).unwrap(), Value::str("\n"));
        assert_eq!(
            vm.get_special(SpecialVar::Subsep).unwrap(),
            Value::str("\x1c")
        );
        assert_eq!(
            vm.get_special(SpecialVar::Convfmt).unwrap(),
            Value::str("%.6g")
        );
        assert_eq!(vm.get_special(SpecialVar::Rlength).unwrap(), Value::num(-1.0));
    }

    #[test]
    fn test_pre_assignment_applies() {
        let program = CompiledProgram {
            scalar_names: vec!["x".to_string()],
            ..CompiledProgram::default()
        };
        let config = Config {
            vars: vec!["x".to_string(), "42".to_string(), "FS".to_string(), ",".to_string()],
            ..Config::default()
        };
        let vm = Vm::new(&program, config).unwrap();
        assert_eq!(vm.globals[0], Value::num_str("42"));
        assert_eq!(vm.fs, ",");
    }
}
