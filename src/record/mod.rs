//! The record/field engine.
//!
//! Holds the current input record and its lazily split fields. After any
//! mutation exactly one of the line and the field vector is canonical;
//! the other is recomputed on demand (`$0` reads rejoin, field reads
//! split). Mutating a field or `NF` rejoins eagerly with the current
//! `OFS`, because `OFS` may change before the next read.

mod reader;

pub use reader::{RecordReader, RecordSep};

use regex::Regex;

use crate::vm::error::VmError;
use crate::vm::value::Value;

/// Field-splitting mode derived from an `FS` (or `split()` separator)
/// value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitMode {
    /// `FS == " "`: runs of blanks separate fields, leading and trailing
    /// blanks are stripped.
    Whitespace,
    /// Single-character `FS` other than space: literal.
    Char(char),
    /// Empty `FS`: one field per character.
    PerChar,
    /// Anything longer: a regex.
    Regex(String),
}

impl SplitMode {
    pub fn from_fs(fs: &str) -> SplitMode {
        if fs == " " {
            return SplitMode::Whitespace;
        }
        if fs.is_empty() {
            return SplitMode::PerChar;
        }
        let mut chars = fs.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return SplitMode::Char(c);
        }
        SplitMode::Regex(fs.to_string())
    }
}

/// Split with AWK's whitespace rule: collapse runs of space/tab/newline,
/// strip leading and trailing runs.
pub fn split_whitespace(s: &str) -> Vec<String> {
    s.split(|c| c == ' ' || c == '\t' || c == '\n')
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn split_char(s: &str, c: char) -> Vec<String> {
    if s.is_empty() {
        return Vec::new();
    }
    s.split(c).map(str::to_string).collect()
}

pub fn split_regex(s: &str, re: &Regex) -> Vec<String> {
    if s.is_empty() {
        return Vec::new();
    }
    re.split(s).map(str::to_string).collect()
}

pub fn split_per_char(s: &str) -> Vec<String> {
    s.chars().map(String::from).collect()
}

#[derive(Debug, Default)]
pub struct Record {
    line: String,
    /// A directly assigned `$0` is a true string; input records and
    /// rejoined lines are numeric strings.
    line_is_str: bool,
    line_current: bool,
    fields: Vec<String>,
    /// Fields assigned with `$i = …` are true strings; split fields are
    /// numeric strings.
    field_is_str: Vec<bool>,
    have_fields: bool,
    /// Memoized compiled splitter, keyed by `(FS, paragraph)`.
    fs_memo: Option<(String, bool, Regex)>,
}

impl Record {
    pub fn new() -> Record {
        Record {
            line_current: true,
            ..Record::default()
        }
    }

    /// Install a new record, invalidating the field split.
    pub fn set_record(&mut self, line: String, is_true_str: bool) {
        self.line = line;
        self.line_is_str = is_true_str;
        self.line_current = true;
        self.have_fields = false;
        self.fields.clear();
        self.field_is_str.clear();
    }

    /// `$0` as a value.
    pub fn line(&mut self, ofs: &str) -> Value {
        if !self.line_current {
            self.rejoin(ofs);
        }
        if self.line_is_str {
            Value::str(self.line.clone())
        } else {
            Value::num_str(self.line.clone())
        }
    }

    /// `NF`, splitting first if needed.
    pub fn nf(&mut self, fs: &str, paragraph: bool) -> Result<usize, VmError> {
        self.ensure_fields(fs, paragraph)?;
        Ok(self.fields.len())
    }

    /// Read `$index`. Out-of-range fields are null; negative indexes are
    /// a runtime error.
    pub fn field(&mut self, index: i64, fs: &str, paragraph: bool, ofs: &str) -> Result<Value, VmError> {
        if index < 0 {
            return Err(VmError::FieldIndex(index));
        }
        if index == 0 {
            return Ok(self.line(ofs));
        }
        self.ensure_fields(fs, paragraph)?;
        let i = index as usize - 1;
        match self.fields.get(i) {
            Some(f) if self.field_is_str[i] => Ok(Value::str(f.clone())),
            Some(f) => Ok(Value::num_str(f.clone())),
            None => Ok(Value::Null),
        }
    }

    /// Write `$index`, growing and rejoining as needed. `is_true_str`
    /// records whether the assigned value was an explicit string (a
    /// numeric assignment keeps the field numerically comparable).
    pub fn set_field(
        &mut self,
        index: i64,
        value: String,
        is_true_str: bool,
        fs: &str,
        paragraph: bool,
        ofs: &str,
    ) -> Result<(), VmError> {
        if index < 0 {
            return Err(VmError::FieldIndex(index));
        }
        if index == 0 {
            // An assigned $0 re-splits on next access.
            self.set_record(value, is_true_str);
            return Ok(());
        }
        self.ensure_fields(fs, paragraph)?;
        let i = index as usize - 1;
        if i >= self.fields.len() {
            self.fields.resize(i + 1, String::new());
            self.field_is_str.resize(i + 1, true);
        }
        self.fields[i] = value;
        self.field_is_str[i] = is_true_str;
        self.rejoin(ofs);
        Ok(())
    }

    /// Assign `NF`: resize (padding with empty strings) and rejoin.
    pub fn set_nf(&mut self, nf: i64, fs: &str, paragraph: bool, ofs: &str) -> Result<(), VmError> {
        if nf < 0 {
            return Err(VmError::NfNegative(nf));
        }
        self.ensure_fields(fs, paragraph)?;
        self.fields.resize(nf as usize, String::new());
        self.field_is_str.resize(nf as usize, true);
        self.rejoin(ofs);
        Ok(())
    }

    fn rejoin(&mut self, ofs: &str) {
        self.line = self.fields.join(ofs);
        self.line_is_str = false;
        self.line_current = true;
    }

    fn ensure_fields(&mut self, fs: &str, paragraph: bool) -> Result<(), VmError> {
        if self.have_fields {
            return Ok(());
        }
        debug_assert!(self.line_current);
        let fields = match SplitMode::from_fs(fs) {
            SplitMode::Whitespace => split_whitespace(&self.line),
            SplitMode::PerChar => split_per_char(&self.line),
            SplitMode::Char(c) if !paragraph => split_char(&self.line, c),
            mode => {
                let re = self.fs_splitter(fs, paragraph, &mode)?;
                let line = std::mem::take(&mut self.line);
                let fields = split_regex(&line, &re);
                self.line = line;
                fields
            }
        };
        self.field_is_str = vec![false; fields.len()];
        self.fields = fields;
        self.have_fields = true;
        Ok(())
    }

    /// The memoized field-splitting regex; recompiled when `FS` (or
    /// paragraph mode, which adds newline as a separator) changes.
    fn fs_splitter(
        &mut self,
        fs: &str,
        paragraph: bool,
        mode: &SplitMode,
    ) -> Result<Regex, VmError> {
        if let Some((memo_fs, memo_par, re)) = &self.fs_memo {
            if memo_fs == fs && *memo_par == paragraph {
                return Ok(re.clone());
            }
        }
        let pattern = match mode {
            SplitMode::Char(c) => {
                let esc = regex::escape(&c.to_string());
                if paragraph {
                    format!("(?:{})|\n", esc)
                } else {
                    esc
                }
            }
            SplitMode::Regex(src) => {
                if paragraph {
                    format!("(?:{})|\n", src)
                } else {
                    src.clone()
                }
            }
            _ => unreachable!("whitespace and per-char modes never compile"),
        };
        let re = Regex::new(&pattern)
            .map_err(|e| VmError::InvalidRegex(fs.to_string(), e.to_string()))?;
        self.fs_memo = Some((fs.to_string(), paragraph, re.clone()));
        Ok(re)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_split_strips_and_collapses() {
        assert_eq!(split_whitespace("  a\t b  c "), vec!["a", "b", "c"]);
        assert!(split_whitespace("   ").is_empty());
    }

    #[test]
    fn test_char_split_keeps_empties() {
        assert_eq!(split_char(":a::b:", ':'), vec!["", "a", "", "b", ""]);
        assert!(split_char("", ':').is_empty());
    }

    #[test]
    fn test_lazy_split_and_nf() {
        let mut r = Record::new();
        r.set_record("a b c".to_string(), false);
        assert_eq!(r.nf(" ", false).unwrap(), 3);
        assert_eq!(r.field(1, " ", false, " ").unwrap(), Value::num_str("a"));
        assert_eq!(r.field(3, " ", false, " ").unwrap(), Value::num_str("c"));
        assert_eq!(r.field(4, " ", false, " ").unwrap(), Value::Null);
    }

    #[test]
    fn test_negative_field_errors() {
        let mut r = Record::new();
        r.set_record("x".to_string(), false);
        assert!(r.field(-1, " ", false, " ").is_err());
        assert!(r.set_field(-1, "v".to_string(), true, " ", false, " ").is_err());
    }

    #[test]
    fn test_set_field_rejoins_with_ofs() {
        let mut r = Record::new();
        r.set_record("a,b,c".to_string(), false);
        r.set_field(1, "a".to_string(), true, ",", false, ":").unwrap();
        assert_eq!(r.line(":").as_str("%.6g"), "a:b:c");
    }

    #[test]
    fn test_set_field_beyond_nf_grows() {
        let mut r = Record::new();
        r.set_record("a b".to_string(), false);
        r.set_field(4, "d".to_string(), true, " ", false, " ").unwrap();
        assert_eq!(r.nf(" ", false).unwrap(), 4);
        assert_eq!(r.line(" ").as_str("%.6g"), "a b  d");
    }

    #[test]
    fn test_set_nf_truncates_and_clears() {
        let mut r = Record::new();
        r.set_record("a b c".to_string(), false);
        r.set_nf(2, " ", false, " ").unwrap();
        assert_eq!(r.line(" ").as_str("%.6g"), "a b");
        r.set_nf(0, " ", false, " ").unwrap();
        assert_eq!(r.line(" ").as_str("%.6g"), "");
        assert!(r.set_nf(-1, " ", false, " ").is_err());
    }

    #[test]
    fn test_assigned_field_is_true_string() {
        let mut r = Record::new();
        r.set_record("10 20".to_string(), false);
        assert_eq!(r.field(1, " ", false, " ").unwrap(), Value::num_str("10"));
        r.set_field(1, "10".to_string(), true, " ", false, " ").unwrap();
        assert_eq!(r.field(1, " ", false, " ").unwrap(), Value::str("10"));
    }

    #[test]
    fn test_regex_fs() {
        let mut r = Record::new();
        r.set_record("a12b345c".to_string(), false);
        assert_eq!(r.nf("[0-9]+", false).unwrap(), 3);
        assert_eq!(r.field(2, "[0-9]+", false, " ").unwrap(), Value::num_str("b"));
    }

    #[test]
    fn test_paragraph_mode_newline_always_splits() {
        let mut r = Record::new();
        r.set_record("a:b\nc".to_string(), false);
        assert_eq!(r.nf(":", true).unwrap(), 3);
    }

    #[test]
    fn test_record_invariant_after_write() {
        // After any field write, $0 == join(fields, OFS).
        let mut r = Record::new();
        r.set_record("x y z".to_string(), false);
        r.set_field(2, "Q".to_string(), true, " ", false, "-").unwrap();
        assert_eq!(r.line("-").as_str("%.6g"), "x-Q-z");
        assert_eq!(r.nf(" ", false).unwrap(), 3);
    }
}
