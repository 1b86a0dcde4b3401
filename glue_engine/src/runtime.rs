use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use glue_formats::DirectorySource;
use log::info;
use serde::Serialize;

use crate::cli::{RunArgs, Start};
use crate::host::{HostEvent, RecordingHost};
use crate::session::{Session, SessionConfig};

/// Simulated frame length used to advance the host clock.
pub const FRAME_MS: u64 = 50;

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub sequence: u32,
    pub tick: usize,
    #[serde(flatten)]
    pub event: HostEvent,
}

#[derive(Debug, Serialize)]
pub struct EventLog {
    pub room: u16,
    pub ticks: usize,
    pub events: Vec<EventLogEntry>,
}

struct Recorder {
    tick: usize,
    verbose: bool,
    entries: Vec<EventLogEntry>,
}

impl Recorder {
    fn collect(&mut self, session: &mut Session<RecordingHost>) {
        for event in session.host_mut().take_events() {
            if self.verbose {
                println!("  [{:>4}] {}", self.tick, describe_event(&event));
            }
            self.entries.push(EventLogEntry {
                sequence: self.entries.len() as u32,
                tick: self.tick,
                event,
            });
        }
    }

    /// Ticks until the scripts go quiet or `max_ticks` pass.
    fn drive(&mut self, session: &mut Session<RecordingHost>, max_ticks: usize) -> usize {
        self.collect(session);
        let mut ran = 0;
        while ran < max_ticks && !session.interpreter().is_drained() {
            session.tick();
            session.host_mut().advance_clock(FRAME_MS);
            self.tick += 1;
            ran += 1;
            self.collect(session);
        }
        ran
    }
}

pub fn execute(args: RunArgs) -> Result<()> {
    let RunArgs {
        data_root,
        start,
        ticks,
        verbs,
        seed,
        inventory,
        event_log_json,
        save_out,
        verbose,
    } = args;

    let resources = DirectorySource::from_root(&data_root)
        .with_context(|| format!("indexing data directory {}", data_root.display()))?;
    info!("{} resources under {}", resources.len(), data_root.display());
    let config = SessionConfig {
        seed,
        inventory,
        ..SessionConfig::default()
    };
    let mut session = Session::new(config, Box::new(resources), RecordingHost::instant());
    let mut recorder = Recorder {
        tick: 0,
        verbose,
        entries: Vec::new(),
    };

    match &start {
        Start::Room(room) => {
            session.load_inventory()?;
            session.enter_room(*room)?;
        }
        Start::Save(path) => {
            let bytes =
                fs::read(path).with_context(|| format!("reading save {}", path.display()))?;
            session.load(&bytes)?;
        }
    }
    let settled = recorder.drive(&mut session, ticks);
    println!(
        "Room {:04} settled after {settled} ticks",
        session.rooms().current
    );

    for (verb, object) in &verbs {
        if session.dispatch_verb(*verb, object) {
            let ran = recorder.drive(&mut session, ticks);
            println!("{verb} {object}: ran for {ran} ticks");
        } else {
            println!("{verb} {object}: nothing to do");
        }
    }

    print_summary(&mut session);

    if let Some(path) = event_log_json.as_ref() {
        let log = EventLog {
            room: session.rooms().current,
            ticks: recorder.tick,
            events: recorder.entries,
        };
        write_event_log(path, &log)?;
        println!("Saved event log to {}", path.display());
    }

    if let Some(path) = save_out.as_ref() {
        let bytes = session.save()?;
        fs::write(path, bytes).with_context(|| format!("writing save to {}", path.display()))?;
        println!("Saved session to {}", path.display());
    }

    Ok(())
}

fn print_summary(session: &mut Session<RecordingHost>) {
    let rooms = session.rooms();
    println!(
        "\nCurrent room: {:04} (previous {:04})",
        rooms.current, rooms.previous
    );
    if let Some(room) = session.room() {
        let objects = room.objects().objects();
        if !objects.is_empty() {
            println!("Objects:");
            for object in objects {
                let rect = object.rect();
                println!(
                    "  - {:<16} ({}, {})-({}, {})",
                    object.name(),
                    rect.x1,
                    rect.y1,
                    rect.x2,
                    rect.y2
                );
            }
        }
    }
    if !session.inventory().is_empty() {
        println!("Inventory: {} objects", session.inventory().len());
    }
    if !session.interpreter().is_empty() {
        println!("Scripts still queued: {}", session.interpreter().len());
    }

    let lines = session.conversation_lines();
    if let Some(conversation) = session.conversation() {
        println!("\nConversation {} waiting for a choice:", conversation.name());
        for line in &lines {
            println!("  - {:<12} {}", line.entry, line.text);
        }
    }
}

fn write_event_log(path: &Path, log: &EventLog) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(log).context("serializing event log to JSON")?;
    fs::write(path, json).with_context(|| format!("writing event log to {}", path.display()))
}

fn describe_event(event: &HostEvent) -> String {
    match event {
        HostEvent::Sound { name, id } => format!("sound {name} #{id}"),
        HostEvent::Midi { name } => format!("midi {name}"),
        HostEvent::Movie { name, blocking } => {
            format!("movie {name}{}", if *blocking { " (blocking)" } else { "" })
        }
        HostEvent::ChangeRoom { room } => format!("room {room:04}"),
        HostEvent::MoveActor { x, y, facing } => format!("move ({x}, {y}) facing {facing}"),
        HostEvent::Cursor { name } => format!("cursor {name}"),
        HostEvent::Talk { speaker, text } => format!("talk {speaker}: {text}"),
        HostEvent::Palette { name } => format!("palette {name}"),
        HostEvent::Effect { name } => format!("effect {name}"),
        HostEvent::Redraw { rect } => format!(
            "redraw ({}, {})-({}, {})",
            rect.x1, rect.y1, rect.x2, rect.y2
        ),
    }
}
