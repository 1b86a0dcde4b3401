//! Condition-gated action lists parsed from the script line format.
//!
//! ```text
//! Cond !Locked        ; opens a chunk; empty condition always passes
//! Cond2 Crowbar       ; alternative condition (OR)
//! From 1202           ; only when arriving from room 1202
//! Once                ; retire after the first complete run
//! Talk 0 It opens.
//! Set Opened
//! ```
//!
//! A chunk runs until the next `Cond` line or a block keyword.

use glue_formats::{TextLine, TextParser};
use serde::Serialize;

use super::opcodes::Action;
use crate::error::{parse_number, Location, ParseError};
use crate::variables::Variables;

/// Keywords that close the current chunk without belonging to it.
pub const BLOCK_KEYWORDS: &[&str] = &[
    "Object", "Objects", "End", "Go", "Look", "Use", "Enter", "Local", "Random", "WalkMap",
];

pub fn is_block_keyword(line: &TextLine) -> bool {
    BLOCK_KEYWORDS.iter().any(|keyword| line.is(keyword))
}

#[derive(Debug, Clone, Serialize)]
pub struct ScriptChunk {
    signature: String,
    conditions: Vec<String>,
    actions: Vec<Action>,
    position: usize,
    from_room: u16,
    once: bool,
    #[serde(skip)]
    retired: bool,
}

impl ScriptChunk {
    pub fn new(signature: impl Into<String>, conditions: Vec<String>, actions: Vec<Action>) -> Self {
        ScriptChunk {
            signature: signature.into(),
            conditions,
            actions,
            position: 0,
            from_room: 0,
            once: false,
            retired: false,
        }
    }

    /// Reads one chunk starting at a `Cond` line. Returns `Ok(None)` at EOF
    /// or when the next line starts another block.
    pub fn parse(parser: &mut TextParser) -> Result<Option<ScriptChunk>, ParseError> {
        let Some(head) = parser.next_line() else {
            return Ok(None);
        };
        if is_block_keyword(&head) {
            parser.push_back();
            return Ok(None);
        }
        if !head.is("Cond") {
            return Err(ParseError::MissingCondition {
                at: Location::of(parser, &head),
                action: head.cmd.clone(),
            });
        }

        let signature = Location::of(parser, &head).to_string();
        let mut chunk = ScriptChunk::new(signature, vec![head.args.clone()], Vec::new());

        while let Some(line) = parser.next_line() {
            if line.is("Cond") || is_block_keyword(&line) {
                parser.push_back();
                break;
            }
            if line.is("Cond2") {
                chunk.conditions.push(line.args.clone());
            } else if line.is("From") {
                let args = line.arg_list();
                let [room] = args.as_slice() else {
                    return Err(ParseError::argument_count(parser, &line, 1, args.len()));
                };
                chunk.from_room = parse_number(parser, &line, room)?;
            } else if line.is("Once") {
                chunk.once = true;
            } else {
                chunk.actions.push(Action::new(&line.cmd, &line.args));
            }
        }

        Ok(Some(chunk))
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn conditions_met(&self, vars: &Variables) -> bool {
        vars.eval_conditions(&self.conditions)
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn from_room(&self) -> u16 {
        self.from_room
    }

    pub fn is_once(&self) -> bool {
        self.once
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }

    pub(crate) fn retire(&mut self) {
        self.retired = true;
        self.position = self.actions.len();
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.actions.len()
    }

    pub fn current_action(&self) -> Option<&Action> {
        self.actions.get(self.position)
    }

    pub fn next(&mut self) {
        if !self.is_finished() {
            self.position += 1;
        }
    }

    pub fn rewind(&mut self) {
        self.position = 0;
    }

    pub fn seek_to_end(&mut self) {
        self.position = self.actions.len();
    }

    /// Moves to action `target` by stepping forward only; a target behind
    /// the current position starts over from action 0. Clamps at the end.
    pub fn seek_to(&mut self, target: usize) {
        if target < self.position {
            self.rewind();
        }
        while self.position < target && !self.is_finished() {
            self.next();
        }
    }
}

/// Reads consecutive chunks until EOF or a block keyword.
pub fn parse_chunks(parser: &mut TextParser) -> Result<Vec<ScriptChunk>, ParseError> {
    let mut chunks = Vec::new();
    while let Some(chunk) = ScriptChunk::parse(parser)? {
        chunks.push(chunk);
    }
    Ok(chunks)
}
