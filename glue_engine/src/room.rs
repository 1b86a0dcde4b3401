//! One room definition file (`NNNN.rom`).
//!
//! ```text
//! Local Lamp Drawer
//! Random Dice 6
//! WalkMap 1203.wlk
//! Objects 1
//! Object Door
//! ...
//! Enter
//! Cond
//! IfFrom 1202 40 180 1
//! ```

use glue_formats::TextParser;

use crate::error::{parse_number, ParseError};
use crate::object::{ObjectContainer, ObjectDef};
use crate::script::{parse_chunks, ChunkId, ChunkStore, ScriptChunk, ScriptRegister};
use crate::variables::Variables;

#[derive(Debug)]
pub struct Room {
    id: u16,
    locals: Vec<String>,
    randoms: Vec<(String, u8)>,
    walk_map: Option<String>,
    objects: ObjectContainer,
    enter: Vec<ChunkId>,
}

impl Room {
    pub fn resource_name(id: u16) -> String {
        format!("{id:04}.rom")
    }

    /// Parses a whole room; chunks are registered only if every section
    /// parses.
    pub fn parse(
        id: u16,
        parser: &mut TextParser,
        store: &mut ChunkStore,
        register: &mut ScriptRegister,
    ) -> Result<Room, ParseError> {
        let mut locals = Vec::new();
        let mut randoms = Vec::new();
        let mut walk_map = None;
        let mut object_defs: Vec<ObjectDef> = Vec::new();
        let mut enter: Vec<ScriptChunk> = Vec::new();

        while let Some(line) = parser.next_line() {
            if line.is("Local") {
                locals.extend(line.arg_list());
            } else if line.is("Random") {
                let args = line.arg_list();
                let [name, max] = args.as_slice() else {
                    return Err(ParseError::argument_count(parser, &line, 2, args.len()));
                };
                randoms.push((name.clone(), parse_number::<u8>(parser, &line, max)?));
            } else if line.is("WalkMap") {
                let args = line.arg_list();
                let [name] = args.as_slice() else {
                    return Err(ParseError::argument_count(parser, &line, 1, args.len()));
                };
                walk_map = Some(name.clone());
            } else if line.is("Objects") {
                parser.push_back();
                object_defs.extend(ObjectContainer::parse_defs(parser)?);
            } else if line.is("Enter") {
                enter.extend(parse_chunks(parser)?);
            } else {
                return Err(ParseError::unknown_section(parser, &line));
            }
        }

        let objects = ObjectContainer::install(object_defs, store, register);
        let enter = enter
            .into_iter()
            .filter_map(|chunk| register.adopt(store, chunk))
            .collect();
        Ok(Room {
            id,
            locals,
            randoms,
            walk_map,
            objects,
            enter,
        })
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn locals(&self) -> &[String] {
        &self.locals
    }

    pub fn randoms(&self) -> &[(String, u8)] {
        &self.randoms
    }

    pub fn walk_map(&self) -> Option<&str> {
        self.walk_map.as_deref()
    }

    pub fn objects(&self) -> &ObjectContainer {
        &self.objects
    }

    pub fn enter_chunks(&self) -> &[ChunkId] {
        &self.enter
    }

    /// Declares the room's local and random variables.
    pub fn declare_variables(&self, vars: &mut Variables) {
        for name in &self.locals {
            vars.declare_local(name);
        }
        for (name, max) in &self.randoms {
            vars.declare_local(name);
            vars.declare_random(name, *max);
        }
    }

    pub fn destroy(self, store: &mut ChunkStore, register: &mut ScriptRegister) {
        self.objects.destroy(store, register);
        for id in self.enter {
            register.release(store, id);
        }
    }
}
