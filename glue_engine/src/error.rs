use std::fmt;

use glue_formats::{TextLine, TextParser};
use thiserror::Error;

/// Source position of a parse failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub line: usize,
}

impl Location {
    pub fn of(parser: &TextParser, line: &TextLine) -> Self {
        Location {
            file: parser.name().to_string(),
            line: line.line,
        }
    }

    /// Position of the most recently read line (or the file start).
    pub fn current(parser: &TextParser) -> Self {
        Location {
            file: parser.name().to_string(),
            line: parser.line_number(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Malformed room, object, script or conversation text. Always fatal to the
/// enclosing load; nothing parsed before the failure is kept.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("{at}: unexpected end of input while reading {context}")]
    UnexpectedEof { at: Location, context: &'static str },
    #[error("{at}: action {action} is not preceded by a Cond line")]
    MissingCondition { at: Location, action: String },
    #[error("{at}: {cmd} expects {expected} argument(s), found {found}")]
    ArgumentCount {
        at: Location,
        cmd: String,
        expected: usize,
        found: usize,
    },
    #[error("{at}: unknown section marker {marker}")]
    UnknownSection { at: Location, marker: String },
    #[error("{at}: {cmd} has an invalid number {value:?}")]
    BadNumber {
        at: Location,
        cmd: String,
        value: String,
    },
    #[error("{at}: expected {expected}, found {found}")]
    Unexpected {
        at: Location,
        expected: &'static str,
        found: String,
    },
    #[error("{at}: container declares {declared} objects but only {parsed} are present")]
    ShortContainer {
        at: Location,
        declared: usize,
        parsed: usize,
    },
}

impl ParseError {
    pub(crate) fn argument_count(
        parser: &TextParser,
        line: &TextLine,
        expected: usize,
        found: usize,
    ) -> Self {
        ParseError::ArgumentCount {
            at: Location::of(parser, line),
            cmd: line.cmd.clone(),
            expected,
            found,
        }
    }

    pub(crate) fn bad_number(parser: &TextParser, line: &TextLine, value: &str) -> Self {
        ParseError::BadNumber {
            at: Location::of(parser, line),
            cmd: line.cmd.clone(),
            value: value.to_string(),
        }
    }

    pub(crate) fn unexpected(parser: &TextParser, line: &TextLine, expected: &'static str) -> Self {
        ParseError::Unexpected {
            at: Location::of(parser, line),
            expected,
            found: format!("{} {}", line.cmd, line.args).trim().to_string(),
        }
    }

    pub(crate) fn unknown_section(parser: &TextParser, line: &TextLine) -> Self {
        ParseError::UnknownSection {
            at: Location::of(parser, line),
            marker: line.cmd.clone(),
        }
    }

    pub(crate) fn eof(parser: &TextParser, context: &'static str) -> Self {
        ParseError::UnexpectedEof {
            at: Location::current(parser),
            context,
        }
    }
}

/// Parses a single integer argument of `line` into `T`.
pub(crate) fn parse_number<T: std::str::FromStr>(
    parser: &TextParser,
    line: &TextLine,
    value: &str,
) -> Result<T, ParseError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ParseError::bad_number(parser, line, value))
}
