//! Record scanning over a byte stream.
//!
//! `RS` selects the separator mode per read, so a reader holds no
//! separator state of its own: the VM derives a [`RecordSep`] from the
//! current `RS` for every call. The reader returns the record together
//! with the terminator text that ended it (`RT`).

use std::io::{self, Read};

use regex::Regex;

/// Separator mode derived from the current `RS` value.
#[derive(Debug)]
pub enum RecordSep<'a> {
    /// Default `RS="\n"`: one line, stripping a trailing `\r`.
    Newline,
    /// Empty `RS`: paragraph mode, records separated by blank-line runs.
    Paragraph,
    /// Single byte or rune.
    Char(char),
    /// Multi-character `RS`: a regex; the matched text becomes `RT`.
    Regex(&'a Regex),
}

impl<'a> RecordSep<'a> {
    /// Classify an `RS` string. Multi-character separators need a
    /// compiled regex, which the caller supplies through `compile`.
    pub fn from_rs<E>(
        rs: &'a str,
        compile: impl FnOnce(&str) -> Result<&'a Regex, E>,
    ) -> Result<RecordSep<'a>, E> {
        if rs == "\n" {
            return Ok(RecordSep::Newline);
        }
        if rs.is_empty() {
            return Ok(RecordSep::Paragraph);
        }
        let mut chars = rs.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Ok(RecordSep::Char(c));
        }
        Ok(RecordSep::Regex(compile(rs)?))
    }
}

const CHUNK: usize = 64 * 1024;

/// Buffered scanner producing `(record, terminator)` pairs.
pub struct RecordReader {
    inner: Box<dyn Read>,
    buf: Vec<u8>,
    pos: usize,
    eof: bool,
}

impl std::fmt::Debug for RecordReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordReader")
            .field("buffered", &(self.buf.len() - self.pos))
            .field("eof", &self.eof)
            .finish()
    }
}

impl RecordReader {
    pub fn new(inner: Box<dyn Read>) -> RecordReader {
        RecordReader {
            inner,
            buf: Vec::new(),
            pos: 0,
            eof: false,
        }
    }

    /// Read one chunk; returns false at end of input.
    fn fill(&mut self) -> io::Result<bool> {
        if self.eof {
            return Ok(false);
        }
        // Compact consumed bytes before growing.
        if self.pos > CHUNK {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
        let start = self.buf.len();
        self.buf.resize(start + CHUNK, 0);
        let n = self.inner.read(&mut self.buf[start..])?;
        self.buf.truncate(start + n);
        if n == 0 {
            self.eof = true;
        }
        Ok(n > 0)
    }

    fn rest(&self) -> &[u8] {
        &self.buf[self.pos..]
    }

    /// Read the next record, or `None` at end of input.
    pub fn read_record(&mut self, sep: &RecordSep<'_>) -> io::Result<Option<(String, String)>> {
        match sep {
            RecordSep::Newline => self.read_until_bytes(b"\n", true),
            RecordSep::Char(c) => {
                let mut enc = [0u8; 4];
                let pat = c.encode_utf8(&mut enc).as_bytes().to_vec();
                self.read_until_bytes(&pat, false)
            }
            RecordSep::Paragraph => self.read_paragraph(),
            RecordSep::Regex(re) => self.read_regex(re),
        }
    }

    fn read_until_bytes(
        &mut self,
        pat: &[u8],
        strip_cr: bool,
    ) -> io::Result<Option<(String, String)>> {
        let mut search_from = 0;
        loop {
            if let Some(i) = find_bytes(&self.rest()[search_from..], pat) {
                let at = search_from + i;
                let mut end = self.pos + at;
                let rt = String::from_utf8_lossy(pat).into_owned();
                if strip_cr && end > self.pos && self.buf[end - 1] == b'\r' {
                    end -= 1;
                }
                let record = String::from_utf8_lossy(&self.buf[self.pos..end]).into_owned();
                self.pos += at + pat.len();
                return Ok(Some((record, rt)));
            }
            // Keep a window so a separator split across chunks is found.
            search_from = self.rest().len().saturating_sub(pat.len() - 1);
            if !self.fill()? {
                if self.rest().is_empty() {
                    return Ok(None);
                }
                let record = String::from_utf8_lossy(self.rest()).into_owned();
                self.pos = self.buf.len();
                return Ok(Some((record, String::new())));
            }
        }
    }

    fn read_paragraph(&mut self) -> io::Result<Option<(String, String)>> {
        // Skip blank lines before the record.
        loop {
            while self.pos < self.buf.len() && self.buf[self.pos] == b'\n' {
                self.pos += 1;
            }
            if self.pos < self.buf.len() || !self.fill()? {
                break;
            }
        }
        if self.rest().is_empty() {
            return Ok(None);
        }
        loop {
            if let Some(i) = find_bytes(self.rest(), b"\n\n") {
                let record = String::from_utf8_lossy(&self.buf[self.pos..self.pos + i]).into_owned();
                self.pos += i;
                let rt = self.consume_newline_run()?;
                return Ok(Some((record, rt)));
            }
            if !self.fill()? {
                // Final record: trailing newlines become the terminator.
                let rest = self.rest();
                let mut end = rest.len();
                while end > 0 && rest[end - 1] == b'\n' {
                    end -= 1;
                }
                let rt = "\n".repeat(rest.len() - end);
                let record = String::from_utf8_lossy(&rest[..end]).into_owned();
                self.pos = self.buf.len();
                return Ok(Some((record, rt)));
            }
        }
    }

    /// Consume the full newline run terminating a paragraph, crossing
    /// chunk boundaries, and return it.
    fn consume_newline_run(&mut self) -> io::Result<String> {
        let mut count = 0usize;
        loop {
            while self.pos < self.buf.len() && self.buf[self.pos] == b'\n' {
                self.pos += 1;
                count += 1;
            }
            if self.pos < self.buf.len() || !self.fill()? {
                break;
            }
        }
        Ok("\n".repeat(count))
    }

    fn read_regex(&mut self, re: &Regex) -> io::Result<Option<(String, String)>> {
        loop {
            let text = String::from_utf8_lossy(self.rest()).into_owned();
            let m = re.find_iter(&text).find(|m| m.end() > m.start());
            if let Some(m) = m {
                // A match flush against the buffer end may extend with
                // more input (the regex could be greedy across chunks).
                if m.end() == text.len() && !self.eof {
                    if self.fill()? {
                        continue;
                    }
                }
                let record = text[..m.start()].to_string();
                let rt = m.as_str().to_string();
                self.pos += m.end();
                return Ok(Some((record, rt)));
            }
            if !self.fill()? {
                if text.is_empty() {
                    return Ok(None);
                }
                self.pos = self.buf.len();
                return Ok(Some((text, String::new())));
            }
        }
    }
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|w| w == needle)
}
