use serde::{Deserialize, Serialize};

use super::chunk::ScriptChunk;

/// Generational handle into a [`ChunkStore`]. A handle outlives its chunk
/// safely: lookups through a stale handle return `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkId {
    index: u32,
    generation: u32,
}

#[derive(Debug, Default, Clone)]
struct Slot {
    generation: u32,
    chunk: Option<ScriptChunk>,
}

/// Arena owning every loaded script chunk.
#[derive(Debug, Default, Clone)]
pub struct ChunkStore {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, chunk: ScriptChunk) -> ChunkId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.chunk = Some(chunk);
            return ChunkId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            chunk: Some(chunk),
        });
        ChunkId {
            index,
            generation: 0,
        }
    }

    pub fn remove(&mut self, id: ChunkId) -> Option<ScriptChunk> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let chunk = slot.chunk.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Some(chunk)
    }

    pub fn get(&self, id: ChunkId) -> Option<&ScriptChunk> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.chunk.as_ref())
    }

    pub fn get_mut(&mut self, id: ChunkId) -> Option<&mut ScriptChunk> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.chunk.as_mut())
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
