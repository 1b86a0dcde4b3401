//! Cooperative scheduler for queued script chunks.
//!
//! Every call to [`ScriptInterpreter::update_status`] executes at most one
//! action per queued script, in queue order. Scripts block in place while a
//! wait reason is pending; a blocked script never stalls the others.

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use super::register::ScriptRegister;
use super::store::{ChunkId, ChunkStore};
use crate::host::Host;
use crate::variables::Variables;

/// Consecutive no-change ticks after which the queue counts as drained.
pub const DEFAULT_DRAIN_TICKS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitReason {
    None,
    WaitingForConversationEnd,
    WaitingForMovieEnd,
    Delay { until_ms: u64 },
}

/// Result of executing one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    /// Malformed or unknown action; the chunk is aborted.
    Invalid,
    /// The chunk ends here.
    Stop,
    /// Advance, then block until the reason clears.
    Wait(WaitReason),
    /// Retry the same action next tick.
    Hold,
}

/// Work scripts hand back to the session instead of performing directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    StartConversation(String),
    ChangeRoom {
        room: u16,
        position: Option<(i32, i32, u8)>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomTransition {
    pub current: u16,
    pub previous: u16,
}

/// Sets `variable` to 1 once sound `id` stops playing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundBinding {
    pub id: u32,
    pub variable: String,
}

/// Everything an action handler may touch during one tick.
pub struct ScriptContext<'a> {
    pub vars: &'a mut Variables,
    pub host: &'a mut dyn Host,
    pub rooms: RoomTransition,
    pub conversation_active: bool,
    pub requests: Vec<Request>,
}

impl<'a> ScriptContext<'a> {
    pub fn new(vars: &'a mut Variables, host: &'a mut dyn Host, rooms: RoomTransition) -> Self {
        ScriptContext {
            vars,
            host,
            rooms,
            conversation_active: false,
            requests: Vec::new(),
        }
    }

    fn wait_pending(&self, wait: WaitReason) -> bool {
        match wait {
            WaitReason::None => false,
            WaitReason::WaitingForConversationEnd => self.conversation_active,
            WaitReason::WaitingForMovieEnd => self.host.is_movie_playing(),
            WaitReason::Delay { until_ms } => self.host.now_ms() < until_ms,
        }
    }
}

/// One queued run of a chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub chunk: ChunkId,
    pub wait: WaitReason,
    /// Ticks spent blocked or holding; diagnostic only.
    pub held_ticks: u32,
}

impl Script {
    fn new(chunk: ChunkId) -> Self {
        Script {
            chunk,
            wait: WaitReason::None,
            held_ticks: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum WaitTag {
    None = 0,
    Conversation = 1,
    Movie = 2,
    Delay = 3,
}

/// Save-record form of a queued script. Delays are stored relative to the
/// clock at save time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedScript {
    pub signature: String,
    pub wait: WaitTag,
    pub delay_remaining_ms: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpreterState {
    pub queue: Vec<QueuedScript>,
    pub sound_bindings: Vec<SoundBinding>,
}

#[derive(Debug, Clone)]
pub struct ScriptInterpreter {
    queue: Vec<Script>,
    sound_bindings: Vec<SoundBinding>,
    idle_ticks: u32,
    drain_ticks: u32,
    rng: StdRng,
}

impl ScriptInterpreter {
    pub fn new(seed: u64) -> Self {
        Self::with_drain_ticks(seed, DEFAULT_DRAIN_TICKS)
    }

    pub fn with_drain_ticks(seed: u64, drain_ticks: u32) -> Self {
        ScriptInterpreter {
            queue: Vec::new(),
            sound_bindings: Vec::new(),
            idle_ticks: 0,
            drain_ticks,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Rerolls random variables, then enqueues the first candidate whose
    /// conditions hold and whose `From` tag matches `previous_room`.
    /// Already-queued chunks are not filtered out.
    pub fn interpret(
        &mut self,
        candidates: &[ChunkId],
        store: &ChunkStore,
        vars: &mut Variables,
        previous_room: u16,
    ) -> Option<ChunkId> {
        vars.reroll(&mut self.rng);
        let chosen = candidates.iter().copied().find(|id| {
            store.get(*id).is_some_and(|chunk| {
                !chunk.is_retired()
                    && !chunk.actions().is_empty()
                    && (chunk.from_room() == 0 || chunk.from_room() == previous_room)
                    && chunk.conditions_met(vars)
            })
        })?;
        if let Some(chunk) = store.get(chosen) {
            debug!("queued {}", chunk.signature());
        }
        self.queue.push(Script::new(chosen));
        self.idle_ticks = 0;
        Some(chosen)
    }

    /// Enqueues a chunk without consulting its conditions.
    pub fn enqueue(&mut self, id: ChunkId) {
        self.queue.push(Script::new(id));
        self.idle_ticks = 0;
    }

    /// Runs one tick. Returns whether anything observable changed.
    pub fn update_status(
        &mut self,
        store: &mut ChunkStore,
        register: &mut ScriptRegister,
        ctx: &mut ScriptContext<'_>,
    ) -> bool {
        let mut changed = self.poll_sound_bindings(ctx);

        for script in &mut self.queue {
            if script.wait != WaitReason::None {
                if ctx.wait_pending(script.wait) {
                    script.held_ticks += 1;
                    continue;
                }
                script.wait = WaitReason::None;
                changed = true;
            }

            let Some(chunk) = store.get_mut(script.chunk) else {
                continue;
            };
            let Some(action) = chunk.current_action().cloned() else {
                continue;
            };
            let outcome = (action.kind.handler())(&action, ctx, &mut self.sound_bindings);
            match outcome {
                Outcome::Ok => chunk.next(),
                Outcome::Invalid | Outcome::Stop => chunk.seek_to_end(),
                Outcome::Wait(reason) => {
                    chunk.next();
                    script.wait = reason;
                }
                Outcome::Hold => {
                    script.held_ticks += 1;
                    continue;
                }
            }
            changed = true;
        }

        if self.sweep_finished(store, register) {
            changed = true;
        }

        if changed {
            self.idle_ticks = 0;
        } else {
            self.idle_ticks = self.idle_ticks.saturating_add(1);
        }
        changed
    }

    fn poll_sound_bindings(&mut self, ctx: &mut ScriptContext<'_>) -> bool {
        let mut changed = false;
        let host = &*ctx.host;
        let (stopped, playing): (Vec<_>, Vec<_>) = std::mem::take(&mut self.sound_bindings)
            .into_iter()
            .partition(|binding| !host.is_sound_playing(binding.id));
        self.sound_bindings = playing;
        for binding in stopped {
            ctx.vars.set(&binding.variable, 1);
            changed = true;
        }
        changed
    }

    /// Drops finished scripts. Each chunk is rewound, or retired when marked
    /// `Once`, after its last queued run leaves.
    fn sweep_finished(&mut self, store: &mut ChunkStore, register: &mut ScriptRegister) -> bool {
        let done = |script: &Script| {
            script.wait == WaitReason::None
                && store
                    .get(script.chunk)
                    .map_or(true, |chunk| chunk.is_finished())
        };
        let mut finished: Vec<ChunkId> = self
            .queue
            .iter()
            .filter(|script| done(script))
            .map(|script| script.chunk)
            .collect();
        if finished.is_empty() {
            return false;
        }
        self.queue.retain(|script| !done(script));
        finished.sort();
        finished.dedup();

        for id in finished {
            if self.queue.iter().any(|script| script.chunk == id) {
                continue;
            }
            let once = match store.get(id) {
                Some(chunk) => chunk.is_once(),
                None => continue,
            };
            if once {
                register.retire(store, id);
            } else if let Some(chunk) = store.get_mut(id) {
                chunk.rewind();
            }
        }
        true
    }

    pub fn is_drained(&self) -> bool {
        self.idle_ticks >= self.drain_ticks
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn queue(&self) -> &[Script] {
        &self.queue
    }

    pub fn is_queued(&self, id: ChunkId) -> bool {
        self.queue.iter().any(|script| script.chunk == id)
    }

    /// Cancels every queued script without completing its chunk.
    pub fn clear(&mut self) {
        if !self.queue.is_empty() {
            debug!("cancelling {} queued scripts", self.queue.len());
        }
        self.queue.clear();
        self.sound_bindings.clear();
        self.idle_ticks = 0;
    }

    pub fn snapshot(&self, store: &ChunkStore, now_ms: u64) -> InterpreterState {
        let queue = self
            .queue
            .iter()
            .filter_map(|script| {
                let chunk = store.get(script.chunk)?;
                let (wait, delay_remaining_ms) = match script.wait {
                    WaitReason::None => (WaitTag::None, 0),
                    WaitReason::WaitingForConversationEnd => (WaitTag::Conversation, 0),
                    WaitReason::WaitingForMovieEnd => (WaitTag::Movie, 0),
                    WaitReason::Delay { until_ms } => {
                        (WaitTag::Delay, until_ms.saturating_sub(now_ms))
                    }
                };
                Some(QueuedScript {
                    signature: chunk.signature().to_string(),
                    wait,
                    delay_remaining_ms,
                })
            })
            .collect();
        InterpreterState {
            queue,
            sound_bindings: self.sound_bindings.clone(),
        }
    }

    /// Re-queues saved scripts against chunks already adopted by `register`.
    pub fn restore(&mut self, state: InterpreterState, register: &ScriptRegister, now_ms: u64) {
        self.clear();
        for queued in state.queue {
            let Some(id) = register.live(&queued.signature) else {
                warn!("{}: queued script has no loaded chunk", queued.signature);
                continue;
            };
            let wait = match queued.wait {
                WaitTag::None => WaitReason::None,
                WaitTag::Conversation => WaitReason::WaitingForConversationEnd,
                WaitTag::Movie => WaitReason::WaitingForMovieEnd,
                WaitTag::Delay => WaitReason::Delay {
                    until_ms: now_ms.saturating_add(queued.delay_remaining_ms),
                },
            };
            self.queue.push(Script {
                chunk: id,
                wait,
                held_ticks: 0,
            });
        }
        self.sound_bindings = state.sound_bindings;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostEvent, RecordingHost};
    use crate::script::chunk::ScriptChunk;
    use crate::script::opcodes::Action;
    use glue_save::{decode_record, encode_record, RecordKind};

    struct Fixture {
        store: ChunkStore,
        register: ScriptRegister,
        vars: Variables,
        host: RecordingHost,
        interpreter: ScriptInterpreter,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                store: ChunkStore::new(),
                register: ScriptRegister::new(),
                vars: Variables::new(),
                host: RecordingHost::new(),
                interpreter: ScriptInterpreter::new(1),
            }
        }

        fn add(&mut self, signature: &str, condition: &str, actions: &[(&str, &str)]) -> ChunkId {
            let actions = actions
                .iter()
                .map(|(keyword, args)| Action::new(keyword, args))
                .collect();
            let chunk = ScriptChunk::new(signature, vec![condition.to_string()], actions);
            self.register.adopt(&mut self.store, chunk).unwrap()
        }

        fn tick_with(&mut self, conversation_active: bool) -> (bool, Vec<Request>) {
            let mut ctx = ScriptContext::new(
                &mut self.vars,
                &mut self.host,
                RoomTransition {
                    current: 1203,
                    previous: 1202,
                },
            );
            ctx.conversation_active = conversation_active;
            let changed = self
                .interpreter
                .update_status(&mut self.store, &mut self.register, &mut ctx);
            (changed, ctx.requests)
        }

        fn tick(&mut self) -> bool {
            self.tick_with(false).0
        }

        fn position(&self, id: ChunkId) -> usize {
            self.store.get(id).unwrap().position()
        }
    }

    #[test]
    fn interpret_enqueues_only_the_first_met_candidate() {
        let mut fx = Fixture::new();
        fx.vars.set("Second", 1);
        fx.vars.set("Third", 1);
        let a = fx.add("r.rom:1", "First", &[("Set", "A")]);
        let b = fx.add("r.rom:3", "Second", &[("Set", "B")]);
        let c = fx.add("r.rom:5", "Third", &[("Set", "C")]);
        let ids = [a, b, c];
        assert_eq!(
            fx.interpreter.interpret(&ids, &fx.store, &mut fx.vars, 0),
            Some(b)
        );
        assert_eq!(fx.interpreter.len(), 1);
        assert_eq!(fx.interpreter.queue()[0].chunk, b);
    }

    #[test]
    fn interpret_respects_came_from_tags() {
        let mut fx = Fixture::new();
        let tagged = {
            let mut parser =
                glue_formats::TextParser::from_str("r.rom", "Cond\nFrom 1202\nSet Arrived\n");
            let chunk = ScriptChunk::parse(&mut parser).unwrap().unwrap();
            fx.register.adopt(&mut fx.store, chunk).unwrap()
        };
        let fallback = fx.add("r.rom:9", "", &[("Set", "Elsewhere")]);
        let ids = [tagged, fallback];
        assert_eq!(
            fx.interpreter.interpret(&ids, &fx.store, &mut fx.vars, 1100),
            Some(fallback)
        );
        assert_eq!(
            fx.interpreter.interpret(&ids, &fx.store, &mut fx.vars, 1202),
            Some(tagged)
        );
    }

    #[test]
    fn interpreting_the_same_verb_twice_queues_it_twice() {
        let mut fx = Fixture::new();
        let door = fx.add("door.rom:2", "!Locked", &[("Set", "Opened"), ("Set", "Walked")]);
        fx.interpreter.interpret(&[door], &fx.store, &mut fx.vars, 0);
        fx.interpreter.interpret(&[door], &fx.store, &mut fx.vars, 0);
        assert_eq!(fx.interpreter.len(), 2);

        // Both runs share one chunk, so a single tick consumes both actions.
        fx.tick();
        assert!(fx.interpreter.is_empty());
        assert_eq!(fx.vars.get("Opened"), 1);
        assert_eq!(fx.vars.get("Walked"), 1);
        assert_eq!(fx.position(door), 0);
    }

    #[test]
    fn one_action_per_script_per_tick() {
        let mut fx = Fixture::new();
        let a = fx.add("r.rom:1", "", &[("Set", "=A,1"), ("Set", "=A,2"), ("Set", "=A,3")]);
        let b = fx.add("r.rom:5", "", &[("Set", "=B,1"), ("Set", "=B,2")]);
        fx.interpreter.enqueue(a);
        fx.interpreter.enqueue(b);

        fx.tick();
        assert_eq!((fx.vars.get("A"), fx.vars.get("B")), (1, 1));
        fx.tick();
        assert_eq!((fx.vars.get("A"), fx.vars.get("B")), (2, 2));
        assert_eq!(fx.interpreter.len(), 1);
        fx.tick();
        assert_eq!(fx.vars.get("A"), 3);
        assert!(fx.interpreter.is_empty());
    }

    #[test]
    fn unknown_opcode_aborts_only_its_own_chunk_after_one_tick() {
        let mut fx = Fixture::new();
        let broken = fx.add("r.rom:1", "", &[("Dance", "wildly"), ("Set", "Never")]);
        let healthy = fx.add("r.rom:4", "", &[("Set", "=H,1"), ("Set", "=H,2")]);
        fx.interpreter.enqueue(broken);
        fx.interpreter.enqueue(healthy);

        fx.tick();
        assert_eq!(fx.interpreter.len(), 1);
        assert_eq!(fx.interpreter.queue()[0].chunk, healthy);
        assert_eq!(fx.vars.get("Never"), 0);
        assert_eq!(fx.vars.get("H"), 1);
        assert_eq!(fx.position(broken), 0);
    }

    #[test]
    fn malformed_arguments_are_invalid() {
        let mut fx = Fixture::new();
        let id = fx.add("r.rom:1", "", &[("Move", "here there"), ("Set", "Never")]);
        fx.interpreter.enqueue(id);
        fx.tick();
        assert!(fx.interpreter.is_empty());
        assert_eq!(fx.vars.get("Never"), 0);
    }

    #[test]
    fn came_from_mismatch_stops_the_chunk() {
        let mut fx = Fixture::new();
        let id = fx.add(
            "r.rom:1",
            "",
            &[("IfFrom", "1100 5 5"), ("Set", "Never")],
        );
        fx.interpreter.enqueue(id);
        fx.tick();
        assert!(fx.interpreter.is_empty());
        assert_eq!(fx.vars.get("Never"), 0);

        let matching = fx.add("r.rom:7", "", &[("IfFrom", "1202 5 6 2")]);
        fx.interpreter.enqueue(matching);
        fx.tick();
        assert_eq!(
            fx.host.events(),
            &[HostEvent::MoveActor { x: 5, y: 6, facing: 2 }]
        );
    }

    #[test]
    fn wait_until_holds_position_without_blocking_others() {
        let mut fx = Fixture::new();
        let waiter = fx.add("r.rom:1", "", &[("Wait", "Ready"), ("Set", "Done")]);
        let other = fx.add("r.rom:4", "", &[("Set", "=Count,1"), ("Set", "=Count,2")]);
        fx.interpreter.enqueue(waiter);
        fx.interpreter.enqueue(other);

        fx.tick();
        fx.tick();
        assert_eq!(fx.position(waiter), 0);
        assert_eq!(fx.vars.get("Count"), 2);
        assert!(fx.interpreter.queue()[0].held_ticks >= 2);

        fx.vars.set("Ready", 1);
        fx.tick();
        fx.tick();
        assert_eq!(fx.vars.get("Done"), 1);
        assert!(fx.interpreter.is_empty());
    }

    #[test]
    fn movie_wait_blocks_until_the_host_finishes() {
        let mut fx = Fixture::new();
        let id = fx.add("r.rom:1", "", &[("AnimWait", "intro"), ("Set", "AfterMovie")]);
        fx.interpreter.enqueue(id);
        fx.tick();
        assert_eq!(fx.interpreter.queue()[0].wait, WaitReason::WaitingForMovieEnd);
        fx.tick();
        assert_eq!(fx.vars.get("AfterMovie"), 0);

        fx.host.finish_movie();
        fx.tick();
        assert_eq!(fx.vars.get("AfterMovie"), 1);
        assert!(fx.interpreter.is_empty());
    }

    #[test]
    fn conversation_wait_requests_a_start_and_blocks_while_active() {
        let mut fx = Fixture::new();
        let id = fx.add("r.rom:1", "", &[("ConvWait", "bartender"), ("Set", "Talked")]);
        fx.interpreter.enqueue(id);
        let (_, requests) = fx.tick_with(false);
        assert_eq!(requests, vec![Request::StartConversation("bartender".into())]);

        fx.tick_with(true);
        fx.tick_with(true);
        assert_eq!(fx.vars.get("Talked"), 0);
        fx.tick_with(false);
        assert_eq!(fx.vars.get("Talked"), 1);
    }

    #[test]
    fn delay_waits_on_the_host_clock() {
        let mut fx = Fixture::new();
        let id = fx.add("r.rom:1", "", &[("Delay", "500"), ("Set", "Late")]);
        fx.interpreter.enqueue(id);
        fx.tick();
        fx.host.advance_clock(499);
        fx.tick();
        assert_eq!(fx.vars.get("Late"), 0);
        fx.host.advance_clock(1);
        fx.tick();
        assert_eq!(fx.vars.get("Late"), 1);
    }

    #[test]
    fn sound_bindings_fire_when_the_sound_stops() {
        let mut fx = Fixture::new();
        let id = fx.add("r.rom:1", "", &[("Sound", "bell.wav 7"), ("SoundVar", "7 BellDone")]);
        fx.interpreter.enqueue(id);
        fx.tick();
        fx.tick();
        assert!(fx.interpreter.is_empty());
        fx.tick();
        assert_eq!(fx.vars.get("BellDone"), 0);

        fx.host.finish_sound(7);
        assert!(fx.tick());
        assert_eq!(fx.vars.get("BellDone"), 1);
    }

    #[test]
    fn move_to_another_room_becomes_a_request() {
        let mut fx = Fixture::new();
        let id = fx.add("r.rom:1", "", &[("Move", "1300 40 50"), ("Move", "0 1 2 3")]);
        fx.interpreter.enqueue(id);
        let (_, requests) = fx.tick_with(false);
        assert_eq!(
            requests,
            vec![Request::ChangeRoom {
                room: 1300,
                position: Some((40, 50, 0))
            }]
        );
        fx.tick();
        assert_eq!(
            fx.host.events(),
            &[HostEvent::MoveActor { x: 1, y: 2, facing: 3 }]
        );
    }

    #[test]
    fn once_chunks_retire_and_others_rewind() {
        let mut fx = Fixture::new();
        let repeat = fx.add("r.rom:20", "", &[("Set", "Repeat")]);
        let once = {
            let mut parser =
                glue_formats::TextParser::from_str("r.rom", "Cond\nOnce\nSet Single\n");
            let chunk = ScriptChunk::parse(&mut parser).unwrap().unwrap();
            fx.register.adopt(&mut fx.store, chunk).unwrap()
        };
        fx.interpreter.enqueue(repeat);
        fx.interpreter.enqueue(once);
        fx.tick();

        assert_eq!(fx.position(repeat), 0);
        assert!(fx.store.get(once).unwrap().is_retired());
        assert_eq!(
            fx.register.line_of(&fx.store, "r.rom:1"),
            Some(crate::script::register::REMOVED_LINE)
        );
        assert_eq!(fx.interpreter.interpret(&[once], &fx.store, &mut fx.vars, 0), None);
    }

    #[test]
    fn drains_after_ten_quiet_ticks() {
        let mut fx = Fixture::new();
        let id = fx.add("r.rom:1", "", &[("Wait", "Never")]);
        fx.interpreter.enqueue(id);
        for _ in 0..9 {
            assert!(!fx.tick());
            assert!(!fx.interpreter.is_drained());
        }
        fx.tick();
        assert!(fx.interpreter.is_drained());

        fx.interpreter.clear();
        assert!(fx.interpreter.is_empty());
        assert!(!fx.interpreter.is_drained());
    }

    #[test]
    fn save_and_reload_resumes_mid_chunk() {
        let mut fx = Fixture::new();
        let steps: Vec<(&str, String)> = (0..7).map(|i| ("Set", format!("=Step,{i}"))).collect();
        let steps: Vec<(&str, &str)> = steps.iter().map(|(k, a)| (*k, a.as_str())).collect();
        let id = fx.add("long.rom:12", "", &steps);
        fx.interpreter.enqueue(id);
        for _ in 0..3 {
            fx.tick();
        }
        assert_eq!(fx.position(id), 3);

        let state = fx.interpreter.snapshot(&fx.store, fx.host.now_ms());
        let lines = fx.register.snapshot(&fx.store);
        let bytes = encode_record(RecordKind::Interpreter, &(state, lines)).unwrap();

        let (state, lines): (InterpreterState, Vec<(String, u32)>) =
            decode_record(RecordKind::Interpreter, &bytes).unwrap();
        let mut store = ChunkStore::new();
        let mut register = ScriptRegister::new();
        register.restore(lines);
        let actions = steps.iter().map(|(k, a)| Action::new(k, a)).collect();
        let reparsed = ScriptChunk::new("long.rom:12", vec![String::new()], actions);
        let id = register.adopt(&mut store, reparsed).unwrap();
        assert_eq!(store.get(id).unwrap().position(), 3);

        let mut interpreter = ScriptInterpreter::new(1);
        interpreter.restore(state, &register, 0);
        assert_eq!(interpreter.len(), 1);

        let mut vars = Variables::new();
        let mut host = RecordingHost::new();
        let mut ctx = ScriptContext::new(&mut vars, &mut host, RoomTransition::default());
        interpreter.update_status(&mut store, &mut register, &mut ctx);
        assert_eq!(vars.get("Step"), 3);
    }

    #[test]
    fn snapshot_keeps_wait_reasons() {
        let mut fx = Fixture::new();
        let id = fx.add("r.rom:1", "", &[("Delay", "300"), ("Set", "Late")]);
        fx.interpreter.enqueue(id);
        fx.tick();
        fx.host.advance_clock(100);
        let state = fx.interpreter.snapshot(&fx.store, fx.host.now_ms());
        assert_eq!(
            state.queue,
            vec![QueuedScript {
                signature: "r.rom:1".into(),
                wait: WaitTag::Delay,
                delay_remaining_ms: 200,
            }]
        );

        let mut restored = ScriptInterpreter::new(1);
        restored.restore(state, &fx.register, 5_000);
        assert_eq!(
            restored.queue()[0].wait,
            WaitReason::Delay { until_ms: 5_200 }
        );
    }
}
