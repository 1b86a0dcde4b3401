//! Signature-keyed progress table for every script chunk.
//!
//! Loaded chunks are tracked by handle and report their own position. After
//! a restore the table only holds cached positions until the owning files
//! are parsed again; chunks that ran to completion under `Once` stay marked
//! removed forever.

use std::collections::BTreeMap;

use log::debug;

use super::chunk::ScriptChunk;
use super::store::{ChunkId, ChunkStore};

/// Line value recorded for chunks that must never run again.
pub const REMOVED_LINE: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterSlot {
    Live(ChunkId),
    Cached(u32),
    Removed,
}

#[derive(Debug, Default, Clone)]
pub struct ScriptRegister {
    entries: BTreeMap<String, RegisterSlot>,
}

impl ScriptRegister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of a freshly parsed chunk. A chunk whose signature is
    /// marked removed is dropped and `None` returned; a cached line
    /// fast-forwards the chunk before it becomes the live owner.
    pub fn adopt(&mut self, store: &mut ChunkStore, mut chunk: ScriptChunk) -> Option<ChunkId> {
        match self.entries.get(chunk.signature()).copied() {
            Some(RegisterSlot::Removed) => {
                debug!("{}: loaded but will not run", chunk.signature());
                return None;
            }
            Some(RegisterSlot::Cached(line)) => chunk.seek_to(line as usize),
            Some(RegisterSlot::Live(previous)) => {
                debug!("{}: replacing live chunk {previous:?}", chunk.signature());
            }
            None => {}
        }
        let signature = chunk.signature().to_string();
        let id = store.insert(chunk);
        self.entries.insert(signature, RegisterSlot::Live(id));
        Some(id)
    }

    /// Destroys a chunk with its owner. Progress is forgotten unless the
    /// chunk was retired.
    pub fn release(&mut self, store: &mut ChunkStore, id: ChunkId) {
        let Some(chunk) = store.remove(id) else {
            return;
        };
        if self.entries.get(chunk.signature()) == Some(&RegisterSlot::Live(id)) {
            self.entries.remove(chunk.signature());
        }
    }

    /// Marks a completed `Once` chunk as never runnable again.
    pub fn retire(&mut self, store: &mut ChunkStore, id: ChunkId) {
        if let Some(chunk) = store.get_mut(id) {
            chunk.retire();
            self.entries
                .insert(chunk.signature().to_string(), RegisterSlot::Removed);
        }
    }

    pub fn slot(&self, signature: &str) -> Option<RegisterSlot> {
        self.entries.get(signature).copied()
    }

    pub fn live(&self, signature: &str) -> Option<ChunkId> {
        match self.slot(signature)? {
            RegisterSlot::Live(id) => Some(id),
            _ => None,
        }
    }

    pub fn line_of(&self, store: &ChunkStore, signature: &str) -> Option<u32> {
        match self.slot(signature)? {
            RegisterSlot::Live(id) => store.get(id).map(|chunk| chunk.position() as u32),
            RegisterSlot::Cached(line) => Some(line),
            RegisterSlot::Removed => Some(REMOVED_LINE),
        }
    }

    /// `(signature, line)` pairs worth saving: chunks in progress and
    /// retired chunks.
    pub fn snapshot(&self, store: &ChunkStore) -> Vec<(String, u32)> {
        self.entries
            .keys()
            .filter_map(|signature| {
                let line = self.line_of(store, signature)?;
                (line != 0).then(|| (signature.clone(), line))
            })
            .collect()
    }

    /// Replaces the table with cached lines. Chunks loaded afterwards pick
    /// their positions up through [`ScriptRegister::adopt`].
    pub fn restore(&mut self, lines: Vec<(String, u32)>) {
        self.entries = lines
            .into_iter()
            .map(|(signature, line)| {
                let slot = if line == REMOVED_LINE {
                    RegisterSlot::Removed
                } else {
                    RegisterSlot::Cached(line)
                };
                (signature, slot)
            })
            .collect();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
