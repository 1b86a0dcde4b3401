//! Dialogue trees (`NAME.cnv`).
//!
//! ```text
//! Node start
//! Fallthrough 1 farewell
//! Entry drink
//! Text What are you pouring?
//! Reply 1 Whiskey, mostly.
//! Hide drink_again
//! Goto gossip !Angry
//! Set AskedDrink
//! Entry leave
//! Text Never mind.
//! Goto exit
//! ```
//!
//! Nodes and entries live in flat vectors; every link is an index.

use glue_formats::{TextLine, TextParser};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{parse_number, ParseError};
use crate::variables::Variables;

/// Goto operand that ends the conversation.
pub const EXIT_TARGET: &str = "exit";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GotoAction {
    pub target: String,
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub name: String,
    pub gotos: Vec<GotoAction>,
    pub fallthrough: Option<String>,
    pub fallthrough_num: usize,
    pub entries: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub name: String,
    pub text: String,
    pub visible: bool,
    /// Parsed and kept, but `reset` restores `initial` regardless.
    pub persist: bool,
    pub initial: bool,
    pub destroyed: bool,
    pub node: usize,
    pub replies: Vec<(u8, String)>,
    pub hides: Vec<String>,
    pub unhides: Vec<String>,
    pub destroys: Vec<String>,
    pub gotos: Vec<GotoAction>,
    pub changes: Vec<String>,
}

impl Entry {
    fn is_shown(&self) -> bool {
        self.visible && !self.destroyed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DialogueLine {
    pub entry: String,
    pub speaker: u8,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSnapshot {
    pub name: String,
    pub current: Option<u32>,
    pub visible: Vec<bool>,
    pub destroyed: Vec<bool>,
}

#[derive(Debug, Clone)]
pub struct Conversation {
    name: String,
    nodes: Vec<Node>,
    entries: Vec<Entry>,
    current: Option<usize>,
}

fn parse_goto(parser: &TextParser, line: &TextLine) -> Result<GotoAction, ParseError> {
    let mut parts = line.args.splitn(2, |c: char| c.is_ascii_whitespace());
    let target = parts.next().unwrap_or_default().trim_end_matches(',');
    if target.is_empty() {
        return Err(ParseError::argument_count(parser, line, 1, 0));
    }
    Ok(GotoAction {
        target: target.to_string(),
        condition: parts.next().unwrap_or_default().trim().to_string(),
    })
}

impl Conversation {
    pub fn resource_name(name: &str) -> String {
        format!("{name}.cnv")
    }

    pub fn parse(name: &str, parser: &mut TextParser) -> Result<Conversation, ParseError> {
        let mut nodes: Vec<Node> = Vec::new();
        let mut entries: Vec<Entry> = Vec::new();

        while let Some(line) = parser.next_line() {
            if line.is("Node") {
                if line.args.is_empty() {
                    return Err(ParseError::argument_count(parser, &line, 1, 0));
                }
                nodes.push(Node {
                    name: line.args.clone(),
                    gotos: Vec::new(),
                    fallthrough: None,
                    fallthrough_num: 0,
                    entries: Vec::new(),
                });
                continue;
            }

            let Some(node_index) = nodes.len().checked_sub(1) else {
                return Err(ParseError::unexpected(parser, &line, "Node NAME"));
            };
            let node_has_entries = !nodes[node_index].entries.is_empty();

            if line.is("Entry") {
                if line.args.is_empty() {
                    return Err(ParseError::argument_count(parser, &line, 1, 0));
                }
                nodes[node_index].entries.push(entries.len());
                entries.push(Entry {
                    name: line.args.clone(),
                    text: String::new(),
                    visible: true,
                    persist: false,
                    initial: true,
                    destroyed: false,
                    node: node_index,
                    replies: Vec::new(),
                    hides: Vec::new(),
                    unhides: Vec::new(),
                    destroys: Vec::new(),
                    gotos: Vec::new(),
                    changes: Vec::new(),
                });
            } else if line.is("Fallthrough") {
                let args = line.arg_list();
                let node = &mut nodes[node_index];
                match args.as_slice() {
                    [num] => node.fallthrough_num = parse_number(parser, &line, num)?,
                    [num, target] => {
                        node.fallthrough_num = parse_number(parser, &line, num)?;
                        node.fallthrough = Some(target.clone());
                    }
                    _ => return Err(ParseError::argument_count(parser, &line, 2, args.len())),
                }
            } else if line.is("Goto") && !node_has_entries {
                let goto = parse_goto(parser, &line)?;
                nodes[node_index].gotos.push(goto);
            } else {
                let Some(entry) = entries.last_mut().filter(|_| node_has_entries) else {
                    return Err(ParseError::unexpected(parser, &line, "Entry NAME"));
                };
                if line.is("Text") {
                    entry.text = line.args.clone();
                } else if line.is("Hidden") {
                    entry.initial = false;
                    entry.visible = false;
                } else if line.is("Persist") {
                    entry.persist = true;
                } else if line.is("Reply") {
                    let Some((speaker, text)) =
                        line.args.split_once(|c: char| c.is_ascii_whitespace())
                    else {
                        let found = line.arg_list().len();
                        return Err(ParseError::argument_count(parser, &line, 2, found));
                    };
                    let speaker = parse_number(parser, &line, speaker)?;
                    entry.replies.push((speaker, text.trim().to_string()));
                } else if line.is("Hide") {
                    entry.hides.extend(line.arg_list());
                } else if line.is("Unhide") {
                    entry.unhides.extend(line.arg_list());
                } else if line.is("Destroy") {
                    entry.destroys.extend(line.arg_list());
                } else if line.is("Goto") {
                    entry.gotos.push(parse_goto(parser, &line)?);
                } else if line.is("Set") {
                    entry.changes.push(line.args.clone());
                } else {
                    return Err(ParseError::unknown_section(parser, &line));
                }
            }
        }

        if nodes.is_empty() {
            return Err(ParseError::eof(parser, "conversation node"));
        }
        for node in &nodes {
            if !node.gotos.is_empty() && !node.entries.is_empty() {
                warn!(
                    "{name}: node {} has both entries and gotos; entries take precedence",
                    node.name
                );
            }
        }

        Ok(Conversation {
            name: name.to_string(),
            nodes,
            entries,
            current: Some(0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    pub fn current_node(&self) -> Option<&str> {
        self.current.map(|index| self.nodes[index].name.as_str())
    }

    pub fn entry(&self, name: &str) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
    }

    /// Back to the start node with every entry at its authored visibility.
    pub fn reset(&mut self) {
        for entry in &mut self.entries {
            entry.visible = entry.initial;
            entry.destroyed = false;
        }
        self.current = Some(0);
    }

    pub fn end(&mut self) {
        self.current = None;
    }

    /// Prompts for the visible entries of the current node, after any
    /// automatic advancing.
    pub fn current_lines(&mut self, vars: &Variables) -> Vec<DialogueLine> {
        self.settle(vars);
        let Some(node) = self.current else {
            return Vec::new();
        };
        self.nodes[node]
            .entries
            .iter()
            .map(|&index| &self.entries[index])
            .filter(|entry| entry.is_shown())
            .map(|entry| DialogueLine {
                entry: entry.name.clone(),
                speaker: 0,
                text: entry.text.clone(),
            })
            .collect()
    }

    pub fn replies(&self, entry: &str) -> Vec<DialogueLine> {
        let Some(found) = self.entry(entry) else {
            return Vec::new();
        };
        found
            .replies
            .iter()
            .map(|(speaker, text)| DialogueLine {
                entry: found.name.clone(),
                speaker: *speaker,
                text: text.clone(),
            })
            .collect()
    }

    /// Selects a visible entry of the current node. Anything else is a
    /// logged no-op and returns `false`.
    pub fn pick(&mut self, entry: &str, vars: &mut Variables) -> bool {
        let Some(node) = self.current else {
            warn!("{}: pick {entry:?} after the conversation ended", self.name);
            return false;
        };
        let picked = self.nodes[node]
            .entries
            .iter()
            .copied()
            .find(|&index| self.entries[index].name.eq_ignore_ascii_case(entry));
        let Some(picked) = picked.filter(|&index| self.entries[index].is_shown()) else {
            warn!("{}: entry {entry:?} is not selectable in node {}", self.name, self.nodes[node].name);
            return false;
        };

        self.entries[picked].visible = false;
        let chosen = self.entries[picked].clone();
        for change in &chosen.changes {
            vars.eval_change(change);
        }
        for name in &chosen.hides {
            if let Some(index) = self.resolve(node, name) {
                self.entries[index].visible = false;
            }
        }
        for name in &chosen.unhides {
            if let Some(index) = self.resolve(node, name) {
                self.entries[index].visible = true;
            }
        }
        for name in &chosen.destroys {
            if let Some(index) = self.resolve(node, name) {
                let target = &mut self.entries[index];
                target.destroyed = true;
                target.visible = false;
            }
        }
        self.go_to(&chosen.gotos, vars);
        self.settle(vars);
        true
    }

    /// Entry by name, preferring the given node.
    fn resolve(&self, node: usize, name: &str) -> Option<usize> {
        let matches = |index: &usize| self.entries[*index].name.eq_ignore_ascii_case(name);
        let found = self.nodes[node]
            .entries
            .iter()
            .copied()
            .find(|index| matches(index))
            .or_else(|| (0..self.entries.len()).find(|index| matches(index)));
        if found.is_none() {
            warn!("{}: no entry named {name:?}", self.name);
        }
        found
    }

    /// Follows the first goto whose condition holds. Returns whether one
    /// fired.
    fn go_to(&mut self, actions: &[GotoAction], vars: &Variables) -> bool {
        let Some(action) = actions
            .iter()
            .find(|action| vars.eval_condition(&action.condition))
        else {
            return false;
        };
        self.land(&action.target);
        true
    }

    fn land(&mut self, target: &str) {
        if target.eq_ignore_ascii_case(EXIT_TARGET) {
            debug!("{}: exit", self.name);
            self.current = None;
            return;
        }
        self.current = self
            .nodes
            .iter()
            .position(|node| node.name.eq_ignore_ascii_case(target));
        if self.current.is_none() {
            warn!("{}: goto unknown node {target:?}; ending", self.name);
        }
    }

    fn visible_count(&self, node: usize) -> usize {
        self.nodes[node]
            .entries
            .iter()
            .filter(|&&index| self.entries[index].is_shown())
            .count()
    }

    /// Advances through empty and fallen-through nodes until the current
    /// node has enough visible entries or the conversation ends.
    fn settle(&mut self, vars: &Variables) {
        let mut visited = 0usize;
        while let Some(node) = self.current {
            if visited > self.nodes.len() {
                warn!("{}: node cycle at {}; ending", self.name, self.nodes[node].name);
                self.current = None;
                return;
            }
            visited += 1;

            let visible = self.visible_count(node);
            if visible == 0 && !self.nodes[node].gotos.is_empty() {
                let gotos = self.nodes[node].gotos.clone();
                if self.go_to(&gotos, vars) {
                    continue;
                }
            }
            if visible <= self.nodes[node].fallthrough_num {
                match self.nodes[node].fallthrough.clone() {
                    Some(target) => self.land(&target),
                    None => self.current = None,
                }
                continue;
            }
            return;
        }
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            name: self.name.clone(),
            current: self.current.map(|index| index as u32),
            visible: self.entries.iter().map(|entry| entry.visible).collect(),
            destroyed: self.entries.iter().map(|entry| entry.destroyed).collect(),
        }
    }

    /// Applies saved indices to a freshly parsed copy of the same file.
    pub fn restore(&mut self, snapshot: &ConversationSnapshot) {
        if snapshot.visible.len() != self.entries.len()
            || snapshot.destroyed.len() != self.entries.len()
        {
            warn!(
                "{}: saved state has {} entries, file has {}; resetting",
                self.name,
                snapshot.visible.len(),
                self.entries.len()
            );
            self.reset();
            return;
        }
        for ((entry, visible), destroyed) in self
            .entries
            .iter_mut()
            .zip(&snapshot.visible)
            .zip(&snapshot.destroyed)
        {
            entry.visible = *visible;
            entry.destroyed = *destroyed;
        }
        self.current = snapshot
            .current
            .map(|index| index as usize)
            .filter(|index| *index < self.nodes.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BAR: &str = "\
Node start
Fallthrough 0 farewell
Entry drink
Text What are you pouring?
Reply 1 Whiskey, mostly.
Reply 0 I'll pass.
Set AskedDrink
Goto gossip !Angry
Entry rumour
Text Heard anything?
Hidden
Persist
Entry leave
Text Never mind.
Unhide rumour
Destroy drink
Goto exit
Node gossip
Fallthrough 2 start
Entry mayor
Text About the mayor...
Entry smuggler
Text About the docks...
Hide mayor
Entry harbour
Text About the harbour...
Node farewell
Entry bye
Text Bye.
Goto exit
";

    fn bar() -> Conversation {
        let mut parser = TextParser::from_str("bar.cnv", BAR);
        Conversation::parse("bar", &mut parser).unwrap()
    }

    fn names(lines: &[DialogueLine]) -> Vec<&str> {
        lines.iter().map(|line| line.entry.as_str()).collect()
    }

    #[test]
    fn parses_nodes_and_entries_into_arenas() {
        let conv = bar();
        assert_eq!(conv.nodes().len(), 3);
        assert_eq!(conv.entries().len(), 7);
        assert_eq!(conv.nodes()[1].fallthrough.as_deref(), Some("start"));
        assert_eq!(conv.nodes()[1].fallthrough_num, 2);
        let rumour = conv.entry("rumour").unwrap();
        assert!(!rumour.visible && !rumour.initial && rumour.persist);
        assert_eq!(rumour.node, 0);
        let drink = conv.entry("DRINK").unwrap();
        assert_eq!(
            drink.gotos,
            vec![GotoAction {
                target: "gossip".into(),
                condition: "!Angry".into()
            }]
        );
        assert_eq!(conv.current_node(), Some("start"));
    }

    #[test]
    fn current_lines_are_visible_prompts_from_speaker_zero() {
        let mut conv = bar();
        let lines = conv.current_lines(&Variables::new());
        assert_eq!(names(&lines), vec!["drink", "leave"]);
        assert!(lines.iter().all(|line| line.speaker == 0));
        assert_eq!(lines[0].text, "What are you pouring?");
    }

    #[test]
    fn replies_carry_their_own_speakers() {
        let conv = bar();
        let replies = conv.replies("drink");
        assert_eq!(
            replies.iter().map(|r| (r.speaker, r.text.as_str())).collect::<Vec<_>>(),
            vec![(1, "Whiskey, mostly."), (0, "I'll pass.")]
        );
        assert!(conv.replies("nobody").is_empty());
    }

    #[test]
    fn picking_a_hidden_entry_changes_nothing() {
        let mut conv = bar();
        let mut vars = Variables::new();
        let before = conv.snapshot();
        let stamp = vars.last_changed();
        assert!(!conv.pick("rumour", &mut vars));
        assert!(!conv.pick("mayor", &mut vars));
        assert!(!conv.pick("missing", &mut vars));
        assert_eq!(conv.snapshot(), before);
        assert_eq!(vars.last_changed(), stamp);
    }

    #[test]
    fn pick_applies_side_effects_then_follows_goto() {
        let mut conv = bar();
        let mut vars = Variables::new();
        assert!(conv.pick("drink", &mut vars));
        assert_eq!(vars.get("AskedDrink"), 1);
        assert!(!conv.entry("drink").unwrap().visible);
        assert_eq!(conv.current_node(), Some("gossip"));
    }

    #[test]
    fn no_goto_firing_stays_on_the_node() {
        let mut conv = bar();
        let mut vars = Variables::new();
        vars.set("Angry", 1);
        assert!(conv.pick("drink", &mut vars));
        assert_eq!(conv.current_node(), Some("start"));
        assert_eq!(names(&conv.current_lines(&vars)), vec!["leave"]);
    }

    #[test]
    fn unhide_and_destroy_apply_before_the_goto() {
        let mut conv = bar();
        let mut vars = Variables::new();
        assert!(conv.pick("leave", &mut vars));
        assert!(!conv.is_active());
        assert!(conv.entry("rumour").unwrap().visible);
        let drink = conv.entry("drink").unwrap();
        assert!(drink.destroyed && !drink.visible);
    }

    #[test]
    fn fallthrough_threshold_advances_without_a_pick() {
        let mut conv = bar();
        let mut vars = Variables::new();
        conv.pick("drink", &mut vars);
        assert_eq!(conv.current_node(), Some("gossip"));

        for name in ["mayor", "harbour"] {
            conv.entries
                .iter_mut()
                .find(|entry| entry.name == name)
                .unwrap()
                .visible = false;
        }
        let lines = conv.current_lines(&vars);
        assert_eq!(conv.current_node(), Some("start"));
        assert_eq!(names(&lines), vec!["leave"]);
    }

    #[test]
    fn empty_nodes_chain_into_their_gotos() {
        let text = "\
Node hub
Goto deep Ready
Goto exit
Node deep
Entry hello
Text Hello.
";
        let mut parser = TextParser::from_str("chain.cnv", text);
        let mut conv = Conversation::parse("chain", &mut parser).unwrap();
        let mut vars = Variables::new();
        vars.set("Ready", 1);
        assert_eq!(names(&conv.current_lines(&vars)), vec!["hello"]);
        assert_eq!(conv.current_node(), Some("deep"));

        conv.reset();
        vars.set("Ready", 0);
        assert!(conv.current_lines(&vars).is_empty());
        assert!(!conv.is_active());
    }

    #[test]
    fn unknown_goto_targets_end_the_conversation() {
        let text = "Node a\nEntry go\nText Go.\nGoto nowhere\n";
        let mut parser = TextParser::from_str("x.cnv", text);
        let mut conv = Conversation::parse("x", &mut parser).unwrap();
        assert!(conv.pick("go", &mut Variables::new()));
        assert!(!conv.is_active());
        assert_eq!(conv.current_node(), None);
    }

    #[test]
    fn fallthrough_cycles_are_broken() {
        let text = "Node a\nFallthrough 0 b\nNode b\nFallthrough 0 a\n";
        let mut parser = TextParser::from_str("loop.cnv", text);
        let mut conv = Conversation::parse("loop", &mut parser).unwrap();
        assert!(conv.current_lines(&Variables::new()).is_empty());
        assert!(!conv.is_active());
    }

    #[test]
    fn reset_restores_authored_visibility_even_for_persistent_entries() {
        let mut conv = bar();
        let mut vars = Variables::new();
        conv.pick("leave", &mut vars);
        assert!(conv.entry("rumour").unwrap().visible);
        conv.reset();
        let rumour = conv.entry("rumour").unwrap();
        assert!(rumour.persist);
        assert!(!rumour.visible);
        assert!(!conv.entry("drink").unwrap().destroyed);
        assert_eq!(conv.current_node(), Some("start"));
    }

    #[test]
    fn entry_names_resolve_within_the_node_first() {
        let text = "\
Node a
Entry x
Text A x.
Entry pick
Text Pick.
Hide x
Node b
Entry x
Text B x.
";
        let mut parser = TextParser::from_str("dup.cnv", text);
        let mut conv = Conversation::parse("dup", &mut parser).unwrap();
        let mut vars = Variables::new();
        conv.pick("pick", &mut vars);
        assert!(!conv.entries()[0].visible);
        assert!(conv.entries()[2].visible);
    }

    #[test]
    fn snapshot_round_trips_into_a_fresh_parse() {
        let mut conv = bar();
        let mut vars = Variables::new();
        conv.pick("drink", &mut vars);
        let saved = conv.snapshot();

        let mut reloaded = bar();
        reloaded.restore(&saved);
        assert_eq!(reloaded.snapshot(), saved);
        assert_eq!(reloaded.current_node(), Some("gossip"));
    }

    #[test]
    fn malformed_conversations_are_rejected() {
        for (text, expected) in [
            ("Entry a\n", "Unexpected"),
            ("Node a\nText orphan\n", "Unexpected"),
            ("Node a\nEntry b\nReply x hi\n", "BadNumber"),
            ("Node a\nEntry b\nReply 1\n", "ArgumentCount"),
            ("Node a\nFallthrough 1 b c\n", "ArgumentCount"),
            ("Node a\nEntry b\nWhisper\n", "UnknownSection"),
            ("; nothing\n", "UnexpectedEof"),
        ] {
            let mut parser = TextParser::from_str("bad.cnv", text);
            let err = Conversation::parse("bad", &mut parser).unwrap_err();
            assert!(format!("{err:?}").starts_with(expected), "{text:?} -> {err:?}");
        }
    }
}
