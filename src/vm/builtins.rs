//! Stateless built-in functions and the substitution helper shared by
//! `sub`/`gsub`.

use regex::Regex;

use crate::ast::BuiltinFn;
use crate::rand::Xoshiro;
use crate::vm::stack::StackOps;
use crate::vm::value::Value;
use crate::vm::{Vm, VmError};

impl Vm<'_> {
    pub(crate) fn call_builtin(&mut self, func: BuiltinFn, num_args: usize) -> Result<(), VmError> {
        match func {
            BuiltinFn::Atan2 => {
                let x = self.stack.pop_num()?;
                let y = self.stack.pop_num()?;
                self.stack.push(Value::num(y.atan2(x)));
            }
            BuiltinFn::Cos => self.unary_math(f64::cos)?,
            BuiltinFn::Sin => self.unary_math(f64::sin)?,
            BuiltinFn::Exp => self.unary_math(f64::exp)?,
            // Negative arguments follow the host's math (NaN), as do
            // log(0) and friends.
            BuiltinFn::Log => self.unary_math(f64::ln)?,
            BuiltinFn::Sqrt => self.unary_math(f64::sqrt)?,
            BuiltinFn::Int => self.unary_math(f64::trunc)?,
            BuiltinFn::Rand => {
                let r = self.rng.next_f64();
                self.stack.push(Value::num(r));
            }
            BuiltinFn::Srand => {
                let prev = self.rng_seed;
                let seed = if num_args == 1 {
                    self.stack.pop_num()?
                } else {
                    use std::time::{SystemTime, UNIX_EPOCH};
                    SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .map(|d| d.as_secs() as f64)
                        .unwrap_or(0.0)
                };
                self.rng = Xoshiro::new(seed.to_bits());
                self.rng_seed = seed;
                self.stack.push(Value::num(prev));
            }
            BuiltinFn::Length => {
                let s = if num_args == 0 {
                    self.record.line(&self.ofs).as_str(&self.convfmt)
                } else {
                    self.pop_str()?
                };
                let len = if self.bytes { s.len() } else { s.chars().count() };
                self.stack.push(Value::num(len as f64));
            }
            BuiltinFn::Substr => {
                let n = if num_args == 3 {
                    Some(self.stack.pop_num()?)
                } else {
                    None
                };
                let m = self.stack.pop_num()?;
                let s = self.pop_str()?;
                self.stack.push(Value::str(substr(&s, m, n, self.bytes)));
            }
            BuiltinFn::Index => {
                let t = self.pop_str()?;
                let s = self.pop_str()?;
                let pos = match s.find(&t) {
                    None => 0,
                    Some(b) if self.bytes => b + 1,
                    Some(b) => s[..b].chars().count() + 1,
                };
                self.stack.push(Value::num(pos as f64));
            }
            BuiltinFn::Match => {
                let pattern = self.pop_str()?;
                let s = self.pop_str()?;
                let re = self.cached_regex(&pattern)?;
                match re.find(&s) {
                    Some(m) => {
                        self.rstart = if self.bytes {
                            (m.start() + 1) as f64
                        } else {
                            (s[..m.start()].chars().count() + 1) as f64
                        };
                        self.rlength = if self.bytes {
                            m.len() as f64
                        } else {
                            m.as_str().chars().count() as f64
                        };
                    }
                    None => {
                        self.rstart = 0.0;
                        self.rlength = -1.0;
                    }
                }
                self.stack.push(Value::num(self.rstart));
            }
            BuiltinFn::Tolower => {
                let s = self.pop_str()?;
                self.stack.push(Value::str(s.to_lowercase()));
            }
            BuiltinFn::Toupper => {
                let s = self.pop_str()?;
                self.stack.push(Value::str(s.to_uppercase()));
            }
            BuiltinFn::System => {
                let cmd = self.pop_str()?;
                let status = self.io.system(&cmd, self.no_exec)?;
                self.stack.push(Value::num(status));
            }
            BuiltinFn::Fflush => {
                let name = if num_args == 1 {
                    Some(self.pop_str()?)
                } else {
                    None
                };
                let status = self.io.flush(name.as_deref())?;
                self.stack.push(Value::num(status));
            }
            BuiltinFn::Close => {
                let name = self.pop_str()?;
                let status = self.io.close(&name);
                self.stack.push(Value::num(status));
            }
        }
        Ok(())
    }

    fn unary_math(&mut self, f: impl Fn(f64) -> f64) -> Result<(), VmError> {
        let v = self.stack.pop_num()?;
        self.stack.push(Value::num(f(v)));
        Ok(())
    }
}

/// `substr(s, m[, n])` with POSIX clamping: the start is clamped to 1
/// with the requested length measured from the original `m`.
pub(crate) fn substr(s: &str, m: f64, n: Option<f64>, bytes: bool) -> String {
    let len = if bytes { s.len() } else { s.chars().count() } as i64;
    let m_i = m.trunc() as i64;
    let start = m_i.max(1);
    let end = match n {
        None => len + 1,
        Some(n) => m_i.saturating_add(n.trunc() as i64),
    }
    .min(len + 1);
    if end <= start {
        return String::new();
    }
    let (skip, take) = ((start - 1) as usize, (end - start) as usize);
    if bytes {
        String::from_utf8_lossy(&s.as_bytes()[skip..skip + take]).into_owned()
    } else {
        s.chars().skip(skip).take(take).collect()
    }
}

/// Substitute the first (or all non-overlapping) matches of `re` in `s`.
/// In the replacement `&` is the matched text, `\&` a literal ampersand,
/// and `\\` a single backslash. Returns the new string and the count.
pub(crate) fn substitute(re: &Regex, s: &str, replacement: &str, global: bool) -> (String, usize) {
    let mut out = String::with_capacity(s.len());
    let mut count = 0usize;
    let mut last = 0usize;
    for m in re.find_iter(s) {
        out.push_str(&s[last..m.start()]);
        out.push_str(&expand_replacement(replacement, m.as_str()));
        last = m.end();
        count += 1;
        if !global {
            break;
        }
    }
    if count == 0 {
        return (s.to_string(), 0);
    }
    out.push_str(&s[last..]);
    (out, count)
}

fn expand_replacement(replacement: &str, matched: &str) -> String {
    let mut out = String::with_capacity(replacement.len());
    let mut chars = replacement.chars();
    while let Some(c) = chars.next() {
        match c {
            '&' => out.push_str(matched),
            '\\' => match chars.next() {
                Some('&') => out.push('&'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            },
            other => out.push(other),
        }
    }
    out
}
