//! Services the surrounding runtime provides to the playback core.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::object::Rect;

/// Side-effecting calls issued by scripts and conversations. The host owns
/// audio, video, the actor sprite and the screen; the core only asks.
pub trait Host {
    fn play_sound(&mut self, name: &str, id: u32);
    fn is_sound_playing(&self, id: u32) -> bool;
    fn play_midi(&mut self, name: &str);
    fn play_movie(&mut self, name: &str, blocking: bool);
    fn is_movie_playing(&self) -> bool;
    fn change_room(&mut self, room: u16);
    fn move_actor(&mut self, x: i32, y: i32, facing: u8);
    fn set_cursor(&mut self, name: &str);
    fn talk(&mut self, speaker: u8, text: &str);
    fn set_palette(&mut self, name: &str);
    fn screen_effect(&mut self, name: &str);
    fn request_redraw(&mut self, rect: Rect);
    /// Monotonic milliseconds.
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostEvent {
    Sound { name: String, id: u32 },
    Midi { name: String },
    Movie { name: String, blocking: bool },
    ChangeRoom { room: u16 },
    MoveActor { x: i32, y: i32, facing: u8 },
    Cursor { name: String },
    Talk { speaker: u8, text: String },
    Palette { name: String },
    Effect { name: String },
    Redraw { rect: Rect },
}

/// Host stand-in that records every request. Sounds and movies keep playing
/// until finished explicitly, unless the host was built with
/// [`RecordingHost::instant`].
#[derive(Debug, Default, Clone)]
pub struct RecordingHost {
    events: Vec<HostEvent>,
    playing_sounds: BTreeSet<u32>,
    movie_playing: bool,
    instant_media: bool,
    clock_ms: u64,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instant() -> Self {
        RecordingHost {
            instant_media: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> &[HostEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<HostEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn finish_sound(&mut self, id: u32) {
        self.playing_sounds.remove(&id);
    }

    pub fn finish_movie(&mut self) {
        self.movie_playing = false;
    }

    pub fn advance_clock(&mut self, ms: u64) {
        self.clock_ms = self.clock_ms.saturating_add(ms);
    }

    pub fn talked_lines(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                HostEvent::Talk { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Host for RecordingHost {
    fn play_sound(&mut self, name: &str, id: u32) {
        self.events.push(HostEvent::Sound {
            name: name.to_string(),
            id,
        });
        if !self.instant_media {
            self.playing_sounds.insert(id);
        }
    }

    fn is_sound_playing(&self, id: u32) -> bool {
        self.playing_sounds.contains(&id)
    }

    fn play_midi(&mut self, name: &str) {
        self.events.push(HostEvent::Midi {
            name: name.to_string(),
        });
    }

    fn play_movie(&mut self, name: &str, blocking: bool) {
        self.events.push(HostEvent::Movie {
            name: name.to_string(),
            blocking,
        });
        self.movie_playing = !self.instant_media;
    }

    fn is_movie_playing(&self) -> bool {
        self.movie_playing
    }

    fn change_room(&mut self, room: u16) {
        self.events.push(HostEvent::ChangeRoom { room });
    }

    fn move_actor(&mut self, x: i32, y: i32, facing: u8) {
        self.events.push(HostEvent::MoveActor { x, y, facing });
    }

    fn set_cursor(&mut self, name: &str) {
        self.events.push(HostEvent::Cursor {
            name: name.to_string(),
        });
    }

    fn talk(&mut self, speaker: u8, text: &str) {
        self.events.push(HostEvent::Talk {
            speaker,
            text: text.to_string(),
        });
    }

    fn set_palette(&mut self, name: &str) {
        self.events.push(HostEvent::Palette {
            name: name.to_string(),
        });
    }

    fn screen_effect(&mut self, name: &str) {
        self.events.push(HostEvent::Effect {
            name: name.to_string(),
        });
    }

    fn request_redraw(&mut self, rect: Rect) {
        self.events.push(HostEvent::Redraw { rect });
    }

    fn now_ms(&self) -> u64 {
        self.clock_ms
    }
}
