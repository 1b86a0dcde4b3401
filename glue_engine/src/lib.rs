pub mod cli;
pub mod conversation;
pub mod error;
pub mod host;
pub mod object;
pub mod pathfinder;
pub mod room;
pub mod runtime;
pub mod script;
pub mod session;
pub mod state;
pub mod variables;

pub use conversation::{Conversation, DialogueLine};
pub use error::{Location, ParseError};
pub use host::{Host, HostEvent, RecordingHost};
pub use object::{Object, ObjectContainer, Rect, Verb};
pub use pathfinder::{Pathfinder, Point};
pub use room::Room;
pub use session::{Hotspot, Session, SessionConfig};
pub use state::SaveState;
pub use variables::Variables;
