//! Rectangular hotspots and the containers (rooms, inventory) that own them.
//!
//! ```text
//! Objects 1
//! Object Door
//! Rect 100 40 160 200
//! Look
//! Cond
//! Talk 0 A heavy oak door.
//! Use
//! Cond !Locked
//! Move 1204 20 180
//! ```

use std::cell::Cell;
use std::fmt;
use std::str::FromStr;

use glue_formats::TextParser;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{parse_number, Location, ParseError};
use crate::script::{is_block_keyword, parse_chunks, ChunkId, ChunkStore, ScriptChunk, ScriptRegister};
use crate::variables::Variables;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verb {
    Go,
    Look,
    Use,
}

impl Verb {
    pub const ALL: [Verb; 3] = [Verb::Go, Verb::Look, Verb::Use];

    pub fn keyword(self) -> &'static str {
        match self {
            Verb::Go => "Go",
            Verb::Look => "Look",
            Verb::Use => "Use",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl FromStr for Verb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Verb::ALL
            .into_iter()
            .find(|verb| verb.keyword().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown verb {s:?} (expected go, look or use)"))
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Rect {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Rect { x1, y1, x2, y2 }
    }

    /// Edges are inclusive.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        (self.x1..=self.x2).contains(&x) && (self.y1..=self.y2).contains(&y)
    }
}

/// A parsed object whose chunks are not yet registered.
#[derive(Debug, Clone)]
pub struct ObjectDef {
    pub name: String,
    pub rect: Rect,
    pub verbs: [Vec<ScriptChunk>; 3],
}

impl ObjectDef {
    pub fn parse(parser: &mut TextParser) -> Result<ObjectDef, ParseError> {
        let head = parser
            .next_line()
            .ok_or_else(|| ParseError::eof(parser, "object"))?;
        if !head.is("Object") {
            return Err(ParseError::unexpected(parser, &head, "Object NAME"));
        }
        if head.args.is_empty() {
            return Err(ParseError::argument_count(parser, &head, 1, 0));
        }

        let mut def = ObjectDef {
            name: head.args.clone(),
            rect: Rect::default(),
            verbs: Default::default(),
        };

        while let Some(line) = parser.next_line() {
            if line.is("Rect") {
                let args = line.arg_list();
                if args.len() != 4 {
                    return Err(ParseError::argument_count(parser, &line, 4, args.len()));
                }
                let mut coords = [0i32; 4];
                for (slot, value) in coords.iter_mut().zip(&args) {
                    *slot = parse_number(parser, &line, value)?;
                }
                def.rect = Rect::new(coords[0], coords[1], coords[2], coords[3]);
            } else if let Some(verb) = Verb::ALL.into_iter().find(|verb| line.is(verb.keyword())) {
                let chunks = parse_chunks(parser)?;
                def.verbs[verb.index()].extend(chunks);
            } else if line.is("End") {
                break;
            } else if is_block_keyword(&line) {
                parser.push_back();
                break;
            } else {
                return Err(ParseError::unknown_section(parser, &line));
            }
        }
        Ok(def)
    }
}

#[derive(Debug)]
pub struct Object {
    name: String,
    rect: Rect,
    chunks: [Vec<ChunkId>; 3],
    /// Per verb: `(last_changed, active)` from the previous query.
    active_cache: Cell<[Option<(u32, bool)>; 3]>,
}

impl Object {
    /// Registers the definition's chunks; chunks the register marks removed
    /// are dropped.
    pub fn install(def: ObjectDef, store: &mut ChunkStore, register: &mut ScriptRegister) -> Object {
        let ObjectDef { name, rect, verbs } = def;
        let chunks = verbs.map(|list| {
            list.into_iter()
                .filter_map(|chunk| register.adopt(store, chunk))
                .collect()
        });
        Object {
            name,
            rect,
            chunks,
            active_cache: Cell::new([None; 3]),
        }
    }

    pub fn parse(
        parser: &mut TextParser,
        store: &mut ChunkStore,
        register: &mut ScriptRegister,
    ) -> Result<Object, ParseError> {
        let def = ObjectDef::parse(parser)?;
        Ok(Object::install(def, store, register))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.rect.contains(x, y)
    }

    pub fn chunks(&self, verb: Verb) -> &[ChunkId] {
        &self.chunks[verb.index()]
    }

    /// Whether any chunk for `verb` would currently pass its conditions.
    /// Cached until the next variable write.
    pub fn has_active_verb(&self, verb: Verb, store: &ChunkStore, vars: &Variables) -> bool {
        let mut cache = self.active_cache.get();
        if let Some((stamp, active)) = cache[verb.index()] {
            if stamp == vars.last_changed() {
                return active;
            }
        }
        let active = self.chunks(verb).iter().any(|id| {
            store
                .get(*id)
                .is_some_and(|chunk| !chunk.is_retired() && chunk.conditions_met(vars))
        });
        cache[verb.index()] = Some((vars.last_changed(), active));
        self.active_cache.set(cache);
        active
    }

    pub fn destroy(self, store: &mut ChunkStore, register: &mut ScriptRegister) {
        for id in self.chunks.into_iter().flatten() {
            register.release(store, id);
        }
    }
}

/// Ordered objects of a room or the inventory.
#[derive(Debug, Default)]
pub struct ObjectContainer {
    objects: Vec<Object>,
}

impl ObjectContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `Objects N` followed by exactly `N` objects. Nothing is
    /// registered unless the whole container parses.
    pub fn parse_defs(parser: &mut TextParser) -> Result<Vec<ObjectDef>, ParseError> {
        let head = parser
            .next_line()
            .ok_or_else(|| ParseError::eof(parser, "object container"))?;
        if !head.is("Objects") {
            return Err(ParseError::unexpected(parser, &head, "Objects COUNT"));
        }
        let args = head.arg_list();
        let [count] = args.as_slice() else {
            return Err(ParseError::argument_count(parser, &head, 1, args.len()));
        };
        let declared: usize = parse_number(parser, &head, count)?;

        let mut defs = Vec::with_capacity(declared);
        while defs.len() < declared {
            if !parser.peek().is_some_and(|line| line.is("Object")) {
                return Err(ParseError::ShortContainer {
                    at: Location::current(parser),
                    declared,
                    parsed: defs.len(),
                });
            }
            defs.push(ObjectDef::parse(parser)?);
        }
        Ok(defs)
    }

    pub fn install(
        defs: Vec<ObjectDef>,
        store: &mut ChunkStore,
        register: &mut ScriptRegister,
    ) -> ObjectContainer {
        let objects = defs
            .into_iter()
            .map(|def| Object::install(def, store, register))
            .collect::<Vec<_>>();
        debug!("installed {} objects", objects.len());
        ObjectContainer { objects }
    }

    pub fn parse(
        parser: &mut TextParser,
        store: &mut ChunkStore,
        register: &mut ScriptRegister,
    ) -> Result<ObjectContainer, ParseError> {
        let defs = Self::parse_defs(parser)?;
        Ok(Self::install(defs, store, register))
    }

    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// First object with this name, ignoring case.
    pub fn find(&self, name: &str) -> Option<&Object> {
        self.objects
            .iter()
            .find(|object| object.name.eq_ignore_ascii_case(name))
    }

    /// First object whose rectangle contains the point.
    pub fn object_at(&self, x: i32, y: i32) -> Option<&Object> {
        self.objects.iter().find(|object| object.contains(x, y))
    }

    /// Removes and destroys the first object with this name.
    pub fn remove(&mut self, name: &str, store: &mut ChunkStore, register: &mut ScriptRegister) -> bool {
        let Some(index) = self
            .objects
            .iter()
            .position(|object| object.name.eq_ignore_ascii_case(name))
        else {
            return false;
        };
        self.objects.remove(index).destroy(store, register);
        true
    }

    pub fn destroy(self, store: &mut ChunkStore, register: &mut ScriptRegister) {
        for object in self.objects {
            object.destroy(store, register);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::RegisterSlot;

    const ROOM_OBJECTS: &str = "\
Objects 2
Object Door
Rect 100 40 160 200
Look
Cond
Talk 0 A heavy oak door.
Use
Cond !Locked
Move 1204 20 180
Cond Locked
Talk 0 It's locked.
Object Window
Rect 150 30 220 90
Look
Cond
Talk 0 Rain.
Enter
";

    fn load(text: &str) -> Result<(ObjectContainer, ChunkStore, ScriptRegister), ParseError> {
        let mut store = ChunkStore::new();
        let mut register = ScriptRegister::new();
        let mut parser = TextParser::from_str("1203.rom", text);
        let container = ObjectContainer::parse(&mut parser, &mut store, &mut register)?;
        Ok((container, store, register))
    }

    #[test]
    fn parses_objects_and_verb_sections() {
        let (container, store, register) = load(ROOM_OBJECTS).unwrap();
        assert_eq!(container.len(), 2);
        let door = container.find("door").unwrap();
        assert_eq!(door.rect(), Rect::new(100, 40, 160, 200));
        assert_eq!(door.chunks(Verb::Look).len(), 1);
        assert_eq!(door.chunks(Verb::Use).len(), 2);
        assert!(door.chunks(Verb::Go).is_empty());
        assert_eq!(store.len(), 4);
        assert!(matches!(register.slot("1203.rom:8"), Some(RegisterSlot::Live(_))));
    }

    #[test]
    fn hit_testing_is_inclusive_and_first_match_wins() {
        let (container, _, _) = load(ROOM_OBJECTS).unwrap();
        assert_eq!(container.object_at(100, 40).map(Object::name), Some("Door"));
        assert_eq!(container.object_at(160, 200).map(Object::name), Some("Door"));
        assert_eq!(container.object_at(155, 50).map(Object::name), Some("Door"));
        assert_eq!(container.object_at(200, 50).map(Object::name), Some("Window"));
        assert!(container.object_at(99, 40).is_none());
    }

    #[test]
    fn short_container_fails_without_registering_anything() {
        let text = ROOM_OBJECTS.replacen("Objects 2", "Objects 3", 1);
        let mut store = ChunkStore::new();
        let mut register = ScriptRegister::new();
        let mut parser = TextParser::from_str("1203.rom", &text);
        let err = ObjectContainer::parse(&mut parser, &mut store, &mut register).unwrap_err();
        assert!(matches!(
            err,
            ParseError::ShortContainer { declared: 3, parsed: 2, .. }
        ));
        assert!(store.is_empty());
        assert!(register.is_empty());
    }

    #[test]
    fn malformed_objects_fail_the_container() {
        for (text, expected) in [
            ("Objects 1\nObject Box\nRect 1 2 3\n", "ArgumentCount"),
            ("Objects 1\nObject Box\nRect 1 2 x 4\n", "BadNumber"),
            ("Objects 1\nObject Box\nSmell\nCond\n", "UnknownSection"),
            ("Objects 1\nObject Box\nUse\nTalk 0 hi\n", "MissingCondition"),
            ("Objects many\n", "BadNumber"),
            ("Object Box\n", "Unexpected"),
        ] {
            let err = load(text).unwrap_err();
            assert!(format!("{err:?}").starts_with(expected), "{text:?} -> {err:?}");
        }
    }

    #[test]
    fn active_verb_tracks_variable_changes() {
        let (container, store, _) = load(ROOM_OBJECTS).unwrap();
        let door = container.find("Door").unwrap();
        let mut vars = Variables::new();
        assert!(door.has_active_verb(Verb::Use, &store, &vars));
        assert!(!door.has_active_verb(Verb::Go, &store, &vars));

        let window = container.find("Window").unwrap();
        assert!(!window.has_active_verb(Verb::Use, &store, &vars));
        vars.set("Locked", 1);
        assert!(door.has_active_verb(Verb::Use, &store, &vars));
    }

    #[test]
    fn destroy_releases_every_chunk() {
        let (mut container, mut store, mut register) = load(ROOM_OBJECTS).unwrap();
        assert!(container.remove("WINDOW", &mut store, &mut register));
        assert!(!container.remove("Window", &mut store, &mut register));
        assert_eq!(store.len(), 3);
        container.destroy(&mut store, &mut register);
        assert!(store.is_empty());
        assert!(register.is_empty());
    }

    #[test]
    fn verbs_parse_from_cli_words() {
        assert_eq!("use".parse::<Verb>(), Ok(Verb::Use));
        assert_eq!("LOOK".parse::<Verb>(), Ok(Verb::Look));
        assert!("smell".parse::<Verb>().is_err());
    }
}
