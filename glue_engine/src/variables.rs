//! Game variable store and the condition/change mini-language evaluated
//! against it.
//!
//! Conditions and changes are whitespace-separated token lists. A token is
//! `NAME` (truthy), `!NAME` (zero), `=NAME,VALUE` (equality / assignment) or
//! one of the reserved prefixes `*`, `+`, `@`, which the data uses as
//! placeholders and which always pass.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

fn variable_key(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomVariable {
    pub name: String,
    pub max: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Truthy(&'a str),
    Negated(&'a str),
    Equals { name: &'a str, value: &'a str },
    Reserved(char, &'a str),
}

impl<'a> Token<'a> {
    fn parse(raw: &'a str) -> Self {
        match raw.chars().next() {
            Some('!') => Token::Negated(&raw[1..]),
            Some('=') => {
                let body = &raw[1..];
                match body.split_once(',') {
                    Some((name, value)) => Token::Equals { name, value },
                    None => Token::Equals {
                        name: body,
                        value: "",
                    },
                }
            }
            Some(prefix @ ('*' | '+' | '@')) => Token::Reserved(prefix, &raw[1..]),
            _ => Token::Truthy(raw),
        }
    }
}

fn parse_literal(name: &str, value: &str) -> Option<u8> {
    match value.trim().parse::<i64>().ok().and_then(|v| u8::try_from(v).ok()) {
        Some(parsed) => Some(parsed),
        None => {
            warn!("variable {name}: literal {value:?} is not a value in 0..=255");
            None
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSnapshot {
    pub globals: Vec<(String, u8)>,
    pub locals: Vec<(String, u8)>,
    pub local_names: Vec<String>,
    pub randoms: Vec<RandomVariable>,
    pub last_changed: u32,
}

/// Case-insensitive `name -> u8` store with a global scope and a room-local
/// scope. Undeclared names read as 0.
#[derive(Debug, Default, Clone)]
pub struct Variables {
    globals: BTreeMap<String, u8>,
    locals: BTreeMap<String, u8>,
    local_names: BTreeSet<String>,
    randoms: Vec<RandomVariable>,
    last_changed: u32,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> u8 {
        let key = variable_key(name);
        let table = if self.local_names.contains(&key) {
            &self.locals
        } else {
            &self.globals
        };
        table.get(&key).copied().unwrap_or(0)
    }

    pub fn set(&mut self, name: &str, value: u8) {
        let key = variable_key(name);
        if key.is_empty() {
            warn!("ignoring write of {value} to an empty variable name");
            return;
        }
        if self.local_names.contains(&key) {
            self.locals.insert(key, value);
        } else {
            self.globals.insert(key, value);
        }
        self.last_changed = self.last_changed.wrapping_add(1);
    }

    /// Bumped on every write; callers cache derived results against it.
    pub fn last_changed(&self) -> u32 {
        self.last_changed
    }

    pub fn declare_local(&mut self, name: &str) {
        let key = variable_key(name);
        if !key.is_empty() {
            self.local_names.insert(key);
        }
    }

    pub fn is_local(&self, name: &str) -> bool {
        self.local_names.contains(&variable_key(name))
    }

    /// Drops the room-local scope, including the room's random variables.
    pub fn clear_locals(&mut self) {
        self.locals.clear();
        self.local_names.clear();
        self.randoms.clear();
        self.last_changed = self.last_changed.wrapping_add(1);
    }

    pub fn declare_random(&mut self, name: &str, max: u8) {
        let key = variable_key(name);
        if let Some(existing) = self.randoms.iter_mut().find(|r| r.name == key) {
            existing.max = max;
            return;
        }
        self.randoms.push(RandomVariable { name: key, max });
    }

    /// Assigns every declared random variable a fresh value in `1..=max`.
    pub fn reroll<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let randoms = self.randoms.clone();
        for random in randoms {
            if random.max == 0 {
                continue;
            }
            let value = rng.gen_range(1..=random.max);
            self.set(&random.name, value);
        }
    }

    /// AND of every whitespace-separated token; an empty condition passes.
    pub fn eval_condition(&self, text: &str) -> bool {
        text.split_whitespace().all(|raw| self.eval_token(raw))
    }

    /// OR across alternatives; an empty list passes.
    pub fn eval_conditions<S: AsRef<str>>(&self, alternatives: &[S]) -> bool {
        alternatives.is_empty()
            || alternatives
                .iter()
                .any(|alternative| self.eval_condition(alternative.as_ref()))
    }

    fn eval_token(&self, raw: &str) -> bool {
        match Token::parse(raw) {
            Token::Truthy(name) => self.get(name) != 0,
            Token::Negated(name) => self.get(name) == 0,
            Token::Equals { name, value } => match parse_literal(name, value) {
                Some(expected) => self.get(name) == expected,
                None => false,
            },
            Token::Reserved(prefix, body) => {
                debug!("reserved condition token {prefix}{body} treated as true");
                true
            }
        }
    }

    pub fn eval_change(&mut self, text: &str) {
        for raw in text.split_whitespace() {
            match Token::parse(raw) {
                Token::Truthy(name) => self.set(name, 1),
                Token::Negated(name) => self.set(name, 0),
                Token::Equals { name, value } => {
                    if let Some(parsed) = parse_literal(name, value) {
                        self.set(name, parsed);
                    }
                }
                Token::Reserved(prefix, body) => {
                    debug!("reserved change token {prefix}{body} ignored");
                }
            }
        }
    }

    pub fn snapshot(&self) -> VariableSnapshot {
        VariableSnapshot {
            globals: self
                .globals
                .iter()
                .map(|(name, value)| (name.clone(), *value))
                .collect(),
            locals: self
                .locals
                .iter()
                .map(|(name, value)| (name.clone(), *value))
                .collect(),
            local_names: self.local_names.iter().cloned().collect(),
            randoms: self.randoms.clone(),
            last_changed: self.last_changed,
        }
    }

    pub fn restore(&mut self, snapshot: VariableSnapshot) {
        self.globals = snapshot.globals.into_iter().collect();
        self.locals = snapshot.locals.into_iter().collect();
        self.local_names = snapshot.local_names.into_iter().collect();
        self.randoms = snapshot.randoms;
        // Anything cached against the old counter must be recomputed.
        self.last_changed = snapshot.last_changed.wrapping_add(1);
    }
}
