//! Line-oriented reader for the game's text definitions.
//!
//! Every room, object, script and conversation file is a sequence of
//! `command arguments` lines. A `;` starts a comment, blank lines are skipped
//! and the reader supports pushing back the most recently read line so block
//! parsers can stop on the first line that belongs to the next block.

use anyhow::{Context, Result, bail};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static REPEAT_GROUP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(-?\d+)\((\d+),(-?\d+)\)$").expect("repeat group pattern compiles")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextLine {
    /// 1-based line number in the source file.
    pub line: usize,
    pub cmd: String,
    pub args: String,
}

impl TextLine {
    pub fn is(&self, keyword: &str) -> bool {
        self.cmd.eq_ignore_ascii_case(keyword)
    }

    pub fn arg_list(&self) -> Vec<String> {
        split_args(&self.args)
    }

    /// Integer arguments with `N(count,step)` groups expanded in place.
    pub fn numbers(&self) -> Result<Vec<i32>> {
        expand_numbers(&self.arg_list())
            .with_context(|| format!("line {}: {} {}", self.line, self.cmd, self.args))
    }
}

/// Splits an argument string on runs of blanks, never inside parentheses,
/// and strips trailing commas from each piece.
pub fn split_args(args: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for ch in args.chars() {
        match ch {
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ' ' | '\t' if depth == 0 => flush_arg(&mut current, &mut out),
            _ => current.push(ch),
        }
    }
    flush_arg(&mut current, &mut out);
    out
}

fn flush_arg(current: &mut String, out: &mut Vec<String>) {
    let trimmed = current.trim_end_matches(',');
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
    current.clear();
}

/// Largest count a single repeat group may expand to.
pub const MAX_REPEAT_COUNT: usize = 4096;

/// Parses integer tokens, expanding `N(count,step)` into `count` values
/// starting at `N` and increasing by `step`.
pub fn expand_numbers<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<i32>> {
    let mut values = Vec::with_capacity(tokens.len());
    for token in tokens {
        let token = token.as_ref();
        if let Some(caps) = REPEAT_GROUP.captures(token) {
            let start: i32 = caps[1].parse()?;
            let count: usize = caps[2].parse()?;
            if count > MAX_REPEAT_COUNT {
                bail!("repeat group {token:?} exceeds {MAX_REPEAT_COUNT} values");
            }
            let step: i32 = caps[3].parse()?;
            let mut value = start;
            for _ in 0..count {
                values.push(value);
                value = value.wrapping_add(step);
            }
            continue;
        }
        match token.parse::<i32>() {
            Ok(value) => values.push(value),
            Err(_) => bail!("expected integer, found {token:?}"),
        }
    }
    Ok(values)
}

#[derive(Debug, Clone)]
pub struct TextParser {
    name: String,
    lines: Vec<TextLine>,
    cursor: usize,
    last_read: Option<usize>,
}

impl TextParser {
    pub fn from_bytes(name: impl Into<String>, input: &[u8]) -> Self {
        let text = String::from_utf8_lossy(input);
        Self::from_str(name, &text)
    }

    pub fn from_str(name: impl Into<String>, text: &str) -> Self {
        let normalized = text.replace("\r\n", "\n");
        let mut lines = Vec::new();
        for (idx, raw_line) in normalized.lines().enumerate() {
            let without_comment = match raw_line.find(';') {
                Some(pos) => &raw_line[..pos],
                None => raw_line,
            };
            let trimmed = without_comment.trim();
            if trimmed.is_empty() {
                continue;
            }
            let (cmd, args) = match trimmed.find(|c: char| c == ' ' || c == '\t') {
                Some(pos) => (&trimmed[..pos], trimmed[pos..].trim()),
                None => (trimmed, ""),
            };
            lines.push(TextLine {
                line: idx + 1,
                cmd: cmd.to_string(),
                args: args.to_string(),
            });
        }

        TextParser {
            name: name.into(),
            lines,
            cursor: 0,
            last_read: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn next_line(&mut self) -> Option<TextLine> {
        let line = self.lines.get(self.cursor)?.clone();
        self.last_read = Some(self.cursor);
        self.cursor += 1;
        Some(line)
    }

    pub fn peek(&self) -> Option<&TextLine> {
        self.lines.get(self.cursor)
    }

    /// Un-reads the last line returned by [`TextParser::next_line`]. Only one
    /// line of push-back is kept; a second call is a no-op.
    pub fn push_back(&mut self) -> bool {
        match self.last_read.take() {
            Some(index) => {
                self.cursor = index;
                true
            }
            None => false,
        }
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
        self.last_read = None;
    }

    pub fn is_eof(&self) -> bool {
        self.cursor >= self.lines.len()
    }

    /// Source line of the most recently read line, or 0 before the first read.
    pub fn line_number(&self) -> usize {
        self.last_read
            .and_then(|index| self.lines.get(index))
            .map(|line| line.line)
            .unwrap_or(0)
    }

    pub fn lines(&self) -> &[TextLine] {
        &self.lines
    }
}
