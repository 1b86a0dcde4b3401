use glue_save::{decode_record, encode_record, RecordKind, SaveError};
use serde::{Deserialize, Serialize};

use crate::conversation::ConversationSnapshot;
use crate::script::{InterpreterState, RoomTransition};
use crate::variables::VariableSnapshot;

/// Everything needed to resume a session: the variable store, where the
/// player is, the progress of every script and the open conversation.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveState {
    pub rooms: RoomTransition,
    pub variables: VariableSnapshot,
    /// `(signature, line)` pairs; removed chunks carry `REMOVED_LINE`.
    pub script_lines: Vec<(String, u32)>,
    pub interpreter: InterpreterState,
    pub conversation: Option<ConversationSnapshot>,
}

impl SaveState {
    pub fn to_bytes(&self) -> Result<Vec<u8>, SaveError> {
        encode_record(RecordKind::Session, self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SaveError> {
        decode_record(RecordKind::Session, bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{QueuedScript, WaitTag};

    #[test]
    fn session_record_round_trips_through_the_frame() {
        let state = SaveState {
            rooms: RoomTransition {
                current: 1203,
                previous: 1202,
            },
            script_lines: vec![("1203.rom:9".into(), 2), ("inv.txt:4".into(), u32::MAX)],
            interpreter: InterpreterState {
                queue: vec![QueuedScript {
                    signature: "1203.rom:9".into(),
                    wait: WaitTag::Movie,
                    delay_remaining_ms: 0,
                }],
                sound_bindings: Vec::new(),
            },
            ..SaveState::default()
        };
        let bytes = state.to_bytes().unwrap();
        assert_eq!(&bytes[..4], b"GLUE");
        assert_eq!(SaveState::from_bytes(&bytes).unwrap(), state);
    }

    #[test]
    fn other_record_kinds_are_refused() {
        let bytes = encode_record(RecordKind::Interpreter, &InterpreterState::default()).unwrap();
        assert!(matches!(
            SaveState::from_bytes(&bytes),
            Err(SaveError::WrongRecordKind { .. })
        ));
    }
}
