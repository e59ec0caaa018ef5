//! `printf`-style formatting.
//!
//! `sprintf`, `printf`, and the `CONVFMT`/`OFMT` conversions all funnel
//! through here. Format strings are parsed into segments once and memoized
//! in a bounded cache (a program rarely uses more than a handful of
//! distinct formats, so the cache is insert-until-full, not LRU).
//!
//! Supported verbs: `%d %i %o %x %X %c %s %e %E %f %g %G %%` with the
//! `-`, `+`, space, `#`, and `0` flags, numeric or `*` width and
//! precision.

use std::collections::HashMap;

use crate::vm::value::Value;

const FORMAT_CACHE_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verb {
    Int,
    Oct,
    Hex { upper: bool },
    Char,
    Str,
    Sci { upper: bool },
    Float,
    General { upper: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Width {
    Fixed(usize),
    Star,
}

#[derive(Debug, Clone)]
struct Spec {
    minus: bool,
    plus: bool,
    space: bool,
    zero: bool,
    alt: bool,
    width: Option<Width>,
    prec: Option<Width>,
    verb: Verb,
}

#[derive(Debug, Clone)]
enum Seg {
    Lit(String),
    Spec(Spec),
}

/// Parsed-format cache plus the formatting entry points. One lives inside
/// each VM; the cache is reset with the VM.
#[derive(Debug, Default)]
pub struct Formatter {
    cache: HashMap<String, Vec<Seg>>,
}

impl Formatter {
    pub fn new() -> Formatter {
        Formatter::default()
    }

    /// Format `args` according to `format`. `convfmt` renders string
    /// arguments that are numbers; `bytes` selects byte semantics for
    /// numeric `%c` arguments.
    pub fn sprintf(
        &mut self,
        format: &str,
        args: &[Value],
        convfmt: &str,
        bytes: bool,
    ) -> Result<String, String> {
        if !self.cache.contains_key(format) {
            let segs = parse_format(format)?;
            if self.cache.len() < FORMAT_CACHE_CAPACITY {
                self.cache.insert(format.to_string(), segs);
            } else {
                return format_segments(&segs, args, convfmt, bytes);
            }
        }
        let segs = &self.cache[format];
        format_segments(segs, args, convfmt, bytes)
    }
}

/// Render a single number through a one-verb format such as `CONVFMT`.
/// Malformed formats fall back to `%.6g` rather than erroring, since the
/// conversion sites have no way to surface a format error.
pub fn format_num(format: &str, n: f64) -> String {
    if format == "%.6g" {
        return fmt_g(n, 6, false, false);
    }
    match parse_format(format) {
        Ok(segs) => format_segments(&segs, &[Value::Num(n)], "%.6g", false)
            .unwrap_or_else(|_| fmt_g(n, 6, false, false)),
        Err(_) => fmt_g(n, 6, false, false),
    }
}

fn parse_format(format: &str) -> Result<Vec<Seg>, String> {
    let mut segs = Vec::new();
    let mut lit = String::new();
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            lit.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            lit.push('%');
            continue;
        }
        if !lit.is_empty() {
            segs.push(Seg::Lit(std::mem::take(&mut lit)));
        }

        let mut spec = Spec {
            minus: false,
            plus: false,
            space: false,
            zero: false,
            alt: false,
            width: None,
            prec: None,
            verb: Verb::Str,
        };
        loop {
            match chars.peek() {
                Some('-') => spec.minus = true,
                Some('+') => spec.plus = true,
                Some(' ') => spec.space = true,
                Some('0') => spec.zero = true,
                Some('#') => spec.alt = true,
                _ => break,
            }
            chars.next();
        }
        spec.width = parse_width(&mut chars);
        if chars.peek() == Some(&'.') {
            chars.next();
            spec.prec = Some(parse_width(&mut chars).unwrap_or(Width::Fixed(0)));
        }
        spec.verb = match chars.next() {
            Some('d') | Some('i') => Verb::Int,
            Some('o') => Verb::Oct,
            Some('x') => Verb::Hex { upper: false },
            Some('X') => Verb::Hex { upper: true },
            Some('c') => Verb::Char,
            Some('s') => Verb::Str,
            Some('e') => Verb::Sci { upper: false },
            Some('E') => Verb::Sci { upper: true },
            Some('f') | Some('F') => Verb::Float,
            Some('g') => Verb::General { upper: false },
            Some('G') => Verb::General { upper: true },
            Some(other) => return Err(format!("invalid format conversion %{}", other)),
            None => return Err("format string ends mid-conversion".to_string()),
        };
        segs.push(Seg::Spec(spec));
    }
    if !lit.is_empty() {
        segs.push(Seg::Lit(lit));
    }
    Ok(segs)
}

fn parse_width(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<Width> {
    if chars.peek() == Some(&'*') {
        chars.next();
        return Some(Width::Star);
    }
    let mut n: usize = 0;
    let mut any = false;
    while let Some(c) = chars.peek() {
        if let Some(d) = c.to_digit(10) {
            n = n * 10 + d as usize;
            any = true;
            chars.next();
        } else {
            break;
        }
    }
    if any {
        Some(Width::Fixed(n))
    } else {
        None
    }
}

fn format_segments(
    segs: &[Seg],
    args: &[Value],
    convfmt: &str,
    bytes: bool,
) -> Result<String, String> {
    fn take<'a>(args: &'a [Value], next: &mut usize) -> Result<&'a Value, String> {
        let v = args.get(*next).ok_or_else(|| {
            format!("not enough arguments ({}) for format string", args.len())
        })?;
        *next += 1;
        Ok(v)
    }

    let mut out = String::new();
    let mut next = 0usize;

    for seg in segs {
        let spec = match seg {
            Seg::Lit(s) => {
                out.push_str(s);
                continue;
            }
            Seg::Spec(spec) => spec,
        };

        let mut minus = spec.minus;
        let width = match spec.width {
            Some(Width::Fixed(w)) => Some(w),
            Some(Width::Star) => {
                let w = take(args, &mut next)?.as_num() as i64;
                if w < 0 {
                    minus = true;
                    Some(-w as usize)
                } else {
                    Some(w as usize)
                }
            }
            None => None,
        };
        let prec = match spec.prec {
            Some(Width::Fixed(p)) => Some(p),
            Some(Width::Star) => {
                let p = take(args, &mut next)?.as_num() as i64;
                if p < 0 {
                    None
                } else {
                    Some(p as usize)
                }
            }
            None => None,
        };

        let arg = take(args, &mut next)?;
        let body = match spec.verb {
            Verb::Int => fmt_int(arg.as_num() as i64, 10, false, spec, prec),
            Verb::Oct => fmt_int(arg.as_num() as i64, 8, false, spec, prec),
            Verb::Hex { upper } => fmt_int(arg.as_num() as i64, 16, upper, spec, prec),
            Verb::Char => fmt_char(arg, bytes),
            Verb::Str => {
                let mut s = arg.as_str(convfmt);
                if let Some(p) = prec {
                    s = s.chars().take(p).collect();
                }
                s
            }
            Verb::Sci { upper } => {
                with_sign(spec, arg.as_num(), |v| fmt_e(v, prec.unwrap_or(6), upper))
            }
            Verb::Float => with_sign(spec, arg.as_num(), |v| {
                if v.is_nan() {
                    return "nan".to_string();
                }
                if v.is_infinite() {
                    return "inf".to_string();
                }
                let p = prec.unwrap_or(6);
                let mut s = format!("{:.*}", p, v);
                if p == 0 && spec.alt {
                    s.push('.');
                }
                s
            }),
            Verb::General { upper } => {
                with_sign(spec, arg.as_num(), |v| fmt_g(v, prec.unwrap_or(6), upper, spec.alt))
            }
        };

        let zero = spec.zero
            && !(prec.is_some()
                && matches!(spec.verb, Verb::Int | Verb::Oct | Verb::Hex { .. }));
        pad(&mut out, &body, width, minus, zero, spec.verb);
    }
    Ok(out)
}

/// Apply sign/space flags to a non-negative rendering of `v`.
fn with_sign(spec: &Spec, v: f64, body: impl Fn(f64) -> String) -> String {
    if v < 0.0 {
        format!("-{}", body(-v))
    } else if spec.plus {
        format!("+{}", body(v))
    } else if spec.space {
        format!(" {}", body(v))
    } else {
        body(v)
    }
}

fn fmt_int(v: i64, base: u32, upper: bool, spec: &Spec, prec: Option<usize>) -> String {
    let neg = v < 0;
    let mag = v.unsigned_abs();
    let mut digits = match base {
        8 => format!("{:o}", mag),
        16 => {
            if upper {
                format!("{:X}", mag)
            } else {
                format!("{:x}", mag)
            }
        }
        _ => format!("{}", mag),
    };
    if let Some(p) = prec {
        while digits.len() < p {
            digits.insert(0, '0');
        }
    }
    if spec.alt {
        match base {
            8 => {
                if !digits.starts_with('0') {
                    digits.insert(0, '0');
                }
            }
            16 => {
                if mag != 0 {
                    digits.insert_str(0, if upper { "0X" } else { "0x" });
                }
            }
            _ => {}
        }
    }
    if neg {
        format!("-{}", digits)
    } else if spec.plus && base == 10 {
        format!("+{}", digits)
    } else if spec.space && base == 10 {
        format!(" {}", digits)
    } else {
        digits
    }
}

fn fmt_char(arg: &Value, bytes: bool) -> String {
    // Numeric arguments (including numeric strings) are character codes;
    // anything else contributes its first character.
    let code = match arg {
        Value::Num(_) | Value::Null => Some(arg.as_num() as i64),
        Value::NumStr(s) => crate::vm::value::parse_num_full(s).map(|n| n as i64),
        Value::Str(_) => None,
    };
    match (code, arg) {
        (Some(c), _) => {
            if bytes {
                ((c as u8) as char).to_string()
            } else {
                char::from_u32(c as u32).map(String::from).unwrap_or_default()
            }
        }
        (None, Value::Str(s)) | (None, Value::NumStr(s)) => {
            s.chars().next().map(String::from).unwrap_or_default()
        }
        (None, _) => String::new(),
    }
}

/// `%e` for a non-negative value.
fn fmt_e(v: f64, prec: usize, upper: bool) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return "inf".to_string();
    }
    let (mantissa, exp) = if v == 0.0 {
        (0.0, 0)
    } else {
        let mut exp = v.abs().log10().floor() as i32;
        let mut m = v / 10f64.powi(exp);
        // log10 can land one off near powers of ten.
        if m >= 10.0 {
            m /= 10.0;
            exp += 1;
        } else if m < 1.0 {
            m *= 10.0;
            exp -= 1;
        }
        (m, exp)
    };
    let mut body = format!("{:.*}", prec, mantissa);
    let mut exp = exp;
    if body.starts_with("10") {
        // Rounding pushed the mantissa to 10.x.
        body = format!("{:.*}", prec, mantissa / 10.0);
        exp += 1;
    }
    let e = if upper { 'E' } else { 'e' };
    format!("{}{}{}{:02}", body, e, if exp < 0 { '-' } else { '+' }, exp.abs())
}

/// `%g` for a non-negative value: `%e` when the exponent is < -4 or >=
/// the precision, `%f` otherwise; trailing zeros stripped unless `alt`.
pub(crate) fn fmt_g(v: f64, prec: usize, upper: bool, alt: bool) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v < 0.0 { "-inf" } else { "inf" }.to_string();
    }
    if v < 0.0 {
        return format!("-{}", fmt_g(-v, prec, upper, alt));
    }
    let p = prec.max(1);
    // Determine the decimal exponent after rounding to p digits.
    let rounded = fmt_e(v, p - 1, false);
    let exp: i32 = rounded[rounded.find('e').map(|i| i + 1).unwrap_or(0)..]
        .parse()
        .unwrap_or(0);
    let mut s = if exp < -4 || exp >= p as i32 {
        let mut s = fmt_e(v, p - 1, upper);
        if !alt {
            s = strip_g_zeros(s, upper);
        }
        s
    } else {
        let decimals = (p as i32 - 1 - exp).max(0) as usize;
        let mut s = format!("{:.*}", decimals, v);
        if !alt && s.contains('.') {
            s = s.trim_end_matches('0').trim_end_matches('.').to_string();
        }
        s
    };
    if s.is_empty() {
        s = "0".to_string();
    }
    s
}

/// Strip trailing zeros from the mantissa of an e-style rendering.
fn strip_g_zeros(s: String, upper: bool) -> String {
    let e = if upper { 'E' } else { 'e' };
    if let Some(pos) = s.find(e) {
        let (mant, exp) = s.split_at(pos);
        if mant.contains('.') {
            let mant = mant.trim_end_matches('0').trim_end_matches('.');
            return format!("{}{}", mant, exp);
        }
    }
    s
}

fn pad(out: &mut String, body: &str, width: Option<usize>, minus: bool, zero: bool, verb: Verb) {
    let width = match width {
        Some(w) => w,
        None => {
            out.push_str(body);
            return;
        }
    };
    let len = body.chars().count();
    if len >= width {
        out.push_str(body);
        return;
    }
    let fill = width - len;
    if minus {
        out.push_str(body);
        out.extend(std::iter::repeat(' ').take(fill));
    } else if zero && !matches!(verb, Verb::Str | Verb::Char) {
        // Zero padding goes after any sign or prefix.
        let sign_len = body
            .chars()
            .take_while(|c| matches!(c, '-' | '+' | ' '))
            .count();
        let (sign, rest) = body.split_at(
            body.char_indices()
                .nth(sign_len)
                .map(|(i, _)| i)
                .unwrap_or(body.len()),
        );
        out.push_str(sign);
        out.extend(std::iter::repeat('0').take(fill));
        out.push_str(rest);
    } else {
        out.extend(std::iter::repeat(' ').take(fill));
        out.push_str(body);
    }
}
