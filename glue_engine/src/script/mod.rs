pub mod chunk;
pub mod interpreter;
pub mod opcodes;
pub mod register;
pub mod store;

pub use chunk::{is_block_keyword, parse_chunks, ScriptChunk, BLOCK_KEYWORDS};
pub use interpreter::{
    InterpreterState, Outcome, QueuedScript, Request, RoomTransition, Script, ScriptContext,
    ScriptInterpreter, SoundBinding, WaitReason, WaitTag, DEFAULT_DRAIN_TICKS,
};
pub use opcodes::{Action, ActionKind};
pub use register::{RegisterSlot, ScriptRegister, REMOVED_LINE};
pub use store::{ChunkId, ChunkStore};
