//! Constant pools with dedup interning.
//!
//! Numbers are keyed by bit pattern, strings and regexes by value. Regex
//! source text is the canonical pool entry — the pool must stay pure data
//! so a compiled program can be serialized — but each pattern is compiled
//! once here so that a bad literal fails at compile time rather than at
//! the first match.

use std::collections::HashMap;

use super::types::{CResult, CompileError};

#[derive(Debug, Default)]
pub(super) struct Pools {
    pub nums: Vec<f64>,
    pub strs: Vec<String>,
    pub regexes: Vec<String>,
    num_index: HashMap<u64, usize>,
    str_index: HashMap<String, usize>,
    regex_index: HashMap<String, usize>,
}

impl Pools {
    pub fn new() -> Pools {
        Pools::default()
    }

    pub fn intern_num(&mut self, n: f64) -> usize {
        let key = n.to_bits();
        if let Some(&idx) = self.num_index.get(&key) {
            return idx;
        }
        let idx = self.nums.len();
        self.nums.push(n);
        self.num_index.insert(key, idx);
        idx
    }

    pub fn intern_str(&mut self, s: &str) -> usize {
        if let Some(&idx) = self.str_index.get(s) {
            return idx;
        }
        let idx = self.strs.len();
        self.strs.push(s.to_string());
        self.str_index.insert(s.to_string(), idx);
        idx
    }

    /// Intern a regex literal, compiling it eagerly to validate.
    pub fn intern_regex(&mut self, pattern: &str) -> CResult<usize> {
        if let Some(&idx) = self.regex_index.get(pattern) {
            return Ok(idx);
        }
        regex::Regex::new(pattern).map_err(|e| CompileError::Regex {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        let idx = self.regexes.len();
        self.regexes.push(pattern.to_string());
        self.regex_index.insert(pattern.to_string(), idx);
        Ok(idx)
    }
}
