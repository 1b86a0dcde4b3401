//! Drives the playback core for one player: room changes, verb dispatch,
//! the per-frame tick, conversations and save/load.

use anyhow::{anyhow, Context, Result};
use glue_formats::{ResourceSource, TextParser, WalkMap};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::conversation::{Conversation, DialogueLine};
use crate::host::Host;
use crate::object::{Object, ObjectContainer, Rect, Verb};
use crate::pathfinder::{
    Pathfinder, Point, DEFAULT_CELL_SIZE, DEFAULT_EXPANSION_FACTOR, DEFAULT_SCREEN_HEIGHT,
    DEFAULT_SCREEN_WIDTH,
};
use crate::room::Room;
use crate::script::{
    ChunkId, ChunkStore, Request, RoomTransition, ScriptContext, ScriptInterpreter,
    ScriptRegister, DEFAULT_DRAIN_TICKS,
};
use crate::state::SaveState;
use crate::variables::Variables;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub screen_width: u32,
    pub screen_height: u32,
    pub cell_size: u32,
    /// Tiles one path search iteration may reach, per grid cell.
    pub path_expansion_factor: usize,
    pub drain_ticks: u32,
    pub seed: u64,
    /// Resource holding the inventory object container.
    pub inventory: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            screen_width: DEFAULT_SCREEN_WIDTH,
            screen_height: DEFAULT_SCREEN_HEIGHT,
            cell_size: DEFAULT_CELL_SIZE,
            path_expansion_factor: DEFAULT_EXPANSION_FACTOR,
            drain_ticks: DEFAULT_DRAIN_TICKS,
            seed: 0,
            inventory: "inv.txt".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hotspot {
    pub name: String,
    pub rect: Rect,
    pub active_verbs: Vec<Verb>,
}

pub struct Session<H: Host> {
    config: SessionConfig,
    resources: Box<dyn ResourceSource>,
    host: H,
    vars: Variables,
    store: ChunkStore,
    register: ScriptRegister,
    interpreter: ScriptInterpreter,
    pathfinder: Pathfinder,
    rooms: RoomTransition,
    room: Option<Room>,
    inventory: ObjectContainer,
    conversation: Option<Conversation>,
}

impl<H: Host> Session<H> {
    pub fn new(config: SessionConfig, resources: Box<dyn ResourceSource>, host: H) -> Self {
        let interpreter = ScriptInterpreter::with_drain_ticks(config.seed, config.drain_ticks);
        let mut pathfinder =
            Pathfinder::new(config.screen_width, config.screen_height, config.cell_size);
        pathfinder.set_expansion_factor(config.path_expansion_factor);
        Session {
            config,
            resources,
            host,
            vars: Variables::new(),
            store: ChunkStore::new(),
            register: ScriptRegister::new(),
            interpreter,
            pathfinder,
            rooms: RoomTransition::default(),
            room: None,
            inventory: ObjectContainer::new(),
            conversation: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn variables(&self) -> &Variables {
        &self.vars
    }

    pub fn variables_mut(&mut self) -> &mut Variables {
        &mut self.vars
    }

    pub fn interpreter(&self) -> &ScriptInterpreter {
        &self.interpreter
    }

    pub fn chunks(&self) -> &ChunkStore {
        &self.store
    }

    pub fn register(&self) -> &ScriptRegister {
        &self.register
    }

    pub fn rooms(&self) -> RoomTransition {
        self.rooms
    }

    pub fn room(&self) -> Option<&Room> {
        self.room.as_ref()
    }

    pub fn inventory(&self) -> &ObjectContainer {
        &self.inventory
    }

    pub fn conversation(&self) -> Option<&Conversation> {
        self.conversation.as_ref()
    }

    fn read_text(&self, name: &str) -> Result<TextParser> {
        let bytes = self
            .resources
            .open(name)
            .with_context(|| format!("opening {name}"))?;
        Ok(TextParser::from_bytes(name, &bytes))
    }

    /// Loads the inventory container. A missing resource leaves it empty.
    pub fn load_inventory(&mut self) -> Result<()> {
        let name = self.config.inventory.clone();
        let old = std::mem::take(&mut self.inventory);
        old.destroy(&mut self.store, &mut self.register);
        if !self.resources.contains(&name) {
            debug!("no inventory resource {name}");
            return Ok(());
        }
        let mut parser = self.read_text(&name)?;
        match ObjectContainer::parse(&mut parser, &mut self.store, &mut self.register) {
            Ok(container) => {
                self.inventory = container;
                Ok(())
            }
            Err(err) => {
                error!("{err}");
                Err(anyhow!(err).context(format!("parsing inventory {name}")))
            }
        }
    }

    fn leave_room(&mut self) {
        self.interpreter.clear();
        self.conversation = None;
        if let Some(room) = self.room.take() {
            debug!("leaving room {:04}", room.id());
            room.destroy(&mut self.store, &mut self.register);
        }
        self.vars.clear_locals();
    }

    fn load_room(&mut self, id: u16) -> Result<()> {
        let name = Room::resource_name(id);
        let mut parser = self.read_text(&name)?;
        let room = match Room::parse(id, &mut parser, &mut self.store, &mut self.register) {
            Ok(room) => room,
            Err(err) => {
                error!("{err}");
                return Err(anyhow!(err).context(format!("parsing room {name}")));
            }
        };
        room.declare_variables(&mut self.vars);
        self.load_walk_map(room.walk_map());
        self.host.change_room(id);
        self.room = Some(room);
        Ok(())
    }

    fn load_walk_map(&mut self, name: Option<&str>) {
        let Some(name) = name else {
            self.pathfinder.clear_walk_map();
            return;
        };
        let loaded = self
            .resources
            .open(name)
            .and_then(|bytes| WalkMap::parse(&bytes))
            .and_then(|map| self.pathfinder.set_walk_map(&map));
        if let Err(err) = loaded {
            warn!("walk map {name}: {err:#}");
            self.pathfinder.clear_walk_map();
        }
    }

    /// Leaves the current room, loads `id` and queues its entry scripts.
    pub fn enter_room(&mut self, id: u16) -> Result<()> {
        self.leave_room();
        self.rooms.previous = self.rooms.current;
        self.rooms.current = id;
        info!("entering room {id:04} from {:04}", self.rooms.previous);
        self.load_room(id)?;

        let enter: Vec<ChunkId> = self
            .room
            .as_ref()
            .map(|room| room.enter_chunks().to_vec())
            .unwrap_or_default();
        for chunk in enter {
            self.interpreter
                .interpret(&[chunk], &self.store, &mut self.vars, self.rooms.previous);
        }
        Ok(())
    }

    fn find_object(&self, name: &str) -> Option<&Object> {
        self.room
            .as_ref()
            .and_then(|room| room.objects().find(name))
            .or_else(|| self.inventory.find(name))
    }

    /// Queues the first applicable `verb` script of the named room or
    /// inventory object.
    pub fn dispatch_verb(&mut self, verb: Verb, object: &str) -> bool {
        let Some(candidates) = self
            .find_object(object)
            .map(|found| found.chunks(verb).to_vec())
        else {
            warn!("{verb} {object}: no such object");
            return false;
        };
        let queued = self.interpreter.interpret(
            &candidates,
            &self.store,
            &mut self.vars,
            self.rooms.previous,
        );
        if queued.is_none() {
            debug!("{verb} {object}: no script applies");
        }
        queued.is_some()
    }

    pub fn hotspot_at(&self, x: i32, y: i32) -> Option<Hotspot> {
        let object = self.room.as_ref()?.objects().object_at(x, y)?;
        Some(Hotspot {
            name: object.name().to_string(),
            rect: object.rect(),
            active_verbs: Verb::ALL
                .into_iter()
                .filter(|verb| object.has_active_verb(*verb, &self.store, &self.vars))
                .collect(),
        })
    }

    /// One frame: advance the scripts, then act on what they requested.
    pub fn tick(&mut self) -> bool {
        let conversation_active = self
            .conversation
            .as_ref()
            .is_some_and(Conversation::is_active);
        let mut ctx = ScriptContext::new(&mut self.vars, &mut self.host, self.rooms);
        ctx.conversation_active = conversation_active;
        let changed = self
            .interpreter
            .update_status(&mut self.store, &mut self.register, &mut ctx);
        let requests = std::mem::take(&mut ctx.requests);

        for request in requests {
            match request {
                Request::StartConversation(name) => {
                    if let Err(err) = self.start_conversation(&name) {
                        warn!("{err:#}");
                    }
                }
                Request::ChangeRoom { room, position } => {
                    if let Err(err) = self.enter_room(room) {
                        warn!("{err:#}");
                        continue;
                    }
                    if let Some((x, y, facing)) = position {
                        self.host.move_actor(x, y, facing);
                    }
                }
            }
        }
        changed
    }

    /// Ticks until the interpreter reports drained or `max_ticks` pass.
    /// Returns the number of ticks run.
    pub fn run_until_drained(&mut self, max_ticks: usize) -> usize {
        for tick in 0..max_ticks {
            if self.interpreter.is_drained() {
                return tick;
            }
            self.tick();
        }
        max_ticks
    }

    /// Starts `NAME.cnv`. Returns `Ok(false)` when the resource is missing.
    pub fn start_conversation(&mut self, name: &str) -> Result<bool> {
        let resource = Conversation::resource_name(name);
        if !self.resources.contains(&resource) {
            warn!("conversation {resource} not found; not started");
            return Ok(false);
        }
        let mut parser = self.read_text(&resource)?;
        match Conversation::parse(name, &mut parser) {
            Ok(conversation) => {
                info!("conversation {name} started");
                self.conversation = Some(conversation);
                Ok(true)
            }
            Err(err) => {
                error!("{err}");
                Err(anyhow!(err).context(format!("parsing conversation {resource}")))
            }
        }
    }

    pub fn conversation_lines(&mut self) -> Vec<DialogueLine> {
        let Some(conversation) = self.conversation.as_mut() else {
            return Vec::new();
        };
        let lines = conversation.current_lines(&self.vars);
        if !conversation.is_active() {
            debug!("conversation {} ended", conversation.name());
            self.conversation = None;
        }
        lines
    }

    /// Speaks the entry's replies, then picks it.
    pub fn pick(&mut self, entry: &str) -> bool {
        let Some(conversation) = self.conversation.as_mut() else {
            warn!("pick {entry:?} with no conversation running");
            return false;
        };
        let selectable = conversation
            .current_lines(&self.vars)
            .iter()
            .any(|line| line.entry.eq_ignore_ascii_case(entry));
        if selectable {
            for reply in conversation.replies(entry) {
                self.host.talk(reply.speaker, &reply.text);
            }
        }
        let picked = conversation.pick(entry, &mut self.vars);
        if !conversation.is_active() {
            debug!("conversation {} ended", conversation.name());
            self.conversation = None;
        }
        picked
    }

    pub fn find_path(&mut self, from: Point, to: Point) -> Option<Vec<Point>> {
        self.pathfinder.find_path(from, to)
    }

    pub fn pathfinder(&self) -> &Pathfinder {
        &self.pathfinder
    }

    pub fn save(&self) -> Result<Vec<u8>> {
        let state = SaveState {
            rooms: self.rooms,
            variables: self.vars.snapshot(),
            script_lines: self.register.snapshot(&self.store),
            interpreter: self.interpreter.snapshot(&self.store, self.host.now_ms()),
            conversation: self.conversation.as_ref().map(Conversation::snapshot),
        };
        state.to_bytes().context("encoding save record")
    }

    /// Replaces the whole session state. Room entry scripts are not re-run;
    /// queued scripts resume where they were saved.
    pub fn load(&mut self, bytes: &[u8]) -> Result<()> {
        let state = SaveState::from_bytes(bytes).context("decoding save record")?;

        self.leave_room();
        let inventory = std::mem::take(&mut self.inventory);
        inventory.destroy(&mut self.store, &mut self.register);

        self.vars.restore(state.variables);
        self.register.restore(state.script_lines);
        self.rooms = state.rooms;

        self.load_inventory()?;
        if self.rooms.current != 0 {
            self.load_room(self.rooms.current)?;
        }
        self.interpreter
            .restore(state.interpreter, &self.register, self.host.now_ms());

        if let Some(snapshot) = state.conversation {
            if self.start_conversation(&snapshot.name)? {
                if let Some(conversation) = self.conversation.as_mut() {
                    conversation.restore(&snapshot);
                }
            }
        }
        info!(
            "restored room {:04} with {} queued scripts",
            self.rooms.current,
            self.interpreter.len()
        );
        Ok(())
    }
}
