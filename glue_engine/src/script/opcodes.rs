//! Action kinds and the table that maps each kind to its handler.
//!
//! Keywords are resolved to an [`ActionKind`] once at parse time; execution
//! goes straight from the kind to a handler function.

use glue_formats::{expand_numbers, split_args};
use log::warn;
use serde::{Deserialize, Serialize};

use super::interpreter::{Outcome, Request, ScriptContext, SoundBinding, WaitReason};
use crate::object::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    MoveActor,
    SetCursor,
    ChangeVariables,
    Speak,
    PlayMidi,
    PlayAnimation,
    PlayAnimationWait,
    PositionIfCameFrom,
    PaletteChange,
    StartConversation,
    StartConversationWait,
    PlaySound,
    BindSoundVariable,
    WaitUntil,
    ScreenEffect,
    Delay,
    RequestRedraw,
    Unknown,
}

pub(crate) type Handler = fn(&Action, &mut ScriptContext<'_>, &mut Vec<SoundBinding>) -> Outcome;

const OPCODES: &[(ActionKind, &str, Handler)] = &[
    (ActionKind::MoveActor, "Move", op_move_actor),
    (ActionKind::SetCursor, "Cursor", op_set_cursor),
    (ActionKind::ChangeVariables, "Set", op_change_variables),
    (ActionKind::Speak, "Talk", op_speak),
    (ActionKind::PlayMidi, "Midi", op_play_midi),
    (ActionKind::PlayAnimation, "Anim", op_play_animation),
    (ActionKind::PlayAnimationWait, "AnimWait", op_play_animation_wait),
    (ActionKind::PositionIfCameFrom, "IfFrom", op_position_if_came_from),
    (ActionKind::PaletteChange, "Palette", op_palette_change),
    (ActionKind::StartConversation, "Conv", op_start_conversation),
    (
        ActionKind::StartConversationWait,
        "ConvWait",
        op_start_conversation_wait,
    ),
    (ActionKind::PlaySound, "Sound", op_play_sound),
    (ActionKind::BindSoundVariable, "SoundVar", op_bind_sound_variable),
    (ActionKind::WaitUntil, "Wait", op_wait_until),
    (ActionKind::ScreenEffect, "Effect", op_screen_effect),
    (ActionKind::Delay, "Delay", op_delay),
    (ActionKind::RequestRedraw, "Redraw", op_request_redraw),
];

impl ActionKind {
    pub fn from_keyword(keyword: &str) -> ActionKind {
        OPCODES
            .iter()
            .find(|(_, name, _)| name.eq_ignore_ascii_case(keyword))
            .map(|(kind, _, _)| *kind)
            .unwrap_or(ActionKind::Unknown)
    }

    pub fn keyword(self) -> Option<&'static str> {
        OPCODES
            .iter()
            .find(|(kind, _, _)| *kind == self)
            .map(|(_, name, _)| *name)
    }

    pub(crate) fn handler(self) -> Handler {
        OPCODES
            .iter()
            .find(|(kind, _, _)| *kind == self)
            .map(|(_, _, handler)| *handler)
            .unwrap_or(op_unknown)
    }
}

/// One step of a script chunk: the resolved kind plus its raw arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    pub keyword: String,
    pub args: String,
}

impl Action {
    pub fn new(keyword: &str, args: &str) -> Self {
        Action {
            kind: ActionKind::from_keyword(keyword),
            keyword: keyword.to_string(),
            args: args.trim().to_string(),
        }
    }

    fn numbers(&self) -> Option<Vec<i32>> {
        expand_numbers(&split_args(&self.args)).ok()
    }
}

fn invalid(action: &Action, reason: &str) -> Outcome {
    warn!("invalid action {} {:?}: {reason}", action.keyword, action.args);
    Outcome::Invalid
}

fn name_arg<'a>(action: &'a Action) -> Option<&'a str> {
    let name = action.args.trim();
    (!name.is_empty()).then_some(name)
}

/// `room x y [facing]`, with facing defaulting to 0.
fn placement(action: &Action) -> Option<(u16, i32, i32, u8)> {
    let numbers = action.numbers()?;
    let (room, x, y, facing) = match numbers.as_slice() {
        [room, x, y] => (*room, *x, *y, 0),
        [room, x, y, facing] => (*room, *x, *y, *facing),
        _ => return None,
    };
    Some((u16::try_from(room).ok()?, x, y, u8::try_from(facing).ok()?))
}

fn op_unknown(action: &Action, _: &mut ScriptContext<'_>, _: &mut Vec<SoundBinding>) -> Outcome {
    invalid(action, "unknown opcode")
}

fn op_move_actor(action: &Action, ctx: &mut ScriptContext<'_>, _: &mut Vec<SoundBinding>) -> Outcome {
    let Some((room, x, y, facing)) = placement(action) else {
        return invalid(action, "expected room x y [facing]");
    };
    if room == 0 || room == ctx.rooms.current {
        ctx.host.move_actor(x, y, facing);
    } else {
        ctx.requests.push(Request::ChangeRoom {
            room,
            position: Some((x, y, facing)),
        });
    }
    Outcome::Ok
}

fn op_set_cursor(action: &Action, ctx: &mut ScriptContext<'_>, _: &mut Vec<SoundBinding>) -> Outcome {
    match name_arg(action) {
        Some(name) => {
            ctx.host.set_cursor(name);
            Outcome::Ok
        }
        None => invalid(action, "missing cursor name"),
    }
}

fn op_change_variables(
    action: &Action,
    ctx: &mut ScriptContext<'_>,
    _: &mut Vec<SoundBinding>,
) -> Outcome {
    if action.args.is_empty() {
        return invalid(action, "empty change set");
    }
    ctx.vars.eval_change(&action.args);
    Outcome::Ok
}

fn op_speak(action: &Action, ctx: &mut ScriptContext<'_>, _: &mut Vec<SoundBinding>) -> Outcome {
    let Some((speaker, text)) = action.args.split_once(|c: char| c.is_ascii_whitespace()) else {
        return invalid(action, "expected speaker and text");
    };
    let Ok(speaker) = speaker.parse::<u8>() else {
        return invalid(action, "speaker is not a number");
    };
    let text = text.trim();
    if text.is_empty() {
        return invalid(action, "missing text");
    }
    ctx.host.talk(speaker, text);
    Outcome::Ok
}

fn op_play_midi(action: &Action, ctx: &mut ScriptContext<'_>, _: &mut Vec<SoundBinding>) -> Outcome {
    match name_arg(action) {
        Some(name) => {
            ctx.host.play_midi(name);
            Outcome::Ok
        }
        None => invalid(action, "missing midi name"),
    }
}

fn op_play_animation(
    action: &Action,
    ctx: &mut ScriptContext<'_>,
    _: &mut Vec<SoundBinding>,
) -> Outcome {
    match name_arg(action) {
        Some(name) => {
            ctx.host.play_movie(name, false);
            Outcome::Ok
        }
        None => invalid(action, "missing animation name"),
    }
}

fn op_play_animation_wait(
    action: &Action,
    ctx: &mut ScriptContext<'_>,
    _: &mut Vec<SoundBinding>,
) -> Outcome {
    match name_arg(action) {
        Some(name) => {
            ctx.host.play_movie(name, true);
            Outcome::Wait(WaitReason::WaitingForMovieEnd)
        }
        None => invalid(action, "missing animation name"),
    }
}

fn op_position_if_came_from(
    action: &Action,
    ctx: &mut ScriptContext<'_>,
    _: &mut Vec<SoundBinding>,
) -> Outcome {
    let Some((room, x, y, facing)) = placement(action) else {
        return invalid(action, "expected room x y [facing]");
    };
    if ctx.rooms.previous != room {
        return Outcome::Stop;
    }
    ctx.host.move_actor(x, y, facing);
    Outcome::Ok
}

fn op_palette_change(
    action: &Action,
    ctx: &mut ScriptContext<'_>,
    _: &mut Vec<SoundBinding>,
) -> Outcome {
    match name_arg(action) {
        Some(name) => {
            ctx.host.set_palette(name);
            Outcome::Ok
        }
        None => invalid(action, "missing palette name"),
    }
}

fn op_start_conversation(
    action: &Action,
    ctx: &mut ScriptContext<'_>,
    _: &mut Vec<SoundBinding>,
) -> Outcome {
    match name_arg(action) {
        Some(name) => {
            ctx.requests.push(Request::StartConversation(name.to_string()));
            Outcome::Ok
        }
        None => invalid(action, "missing conversation name"),
    }
}

fn op_start_conversation_wait(
    action: &Action,
    ctx: &mut ScriptContext<'_>,
    _: &mut Vec<SoundBinding>,
) -> Outcome {
    match name_arg(action) {
        Some(name) => {
            ctx.requests.push(Request::StartConversation(name.to_string()));
            Outcome::Wait(WaitReason::WaitingForConversationEnd)
        }
        None => invalid(action, "missing conversation name"),
    }
}

fn op_play_sound(action: &Action, ctx: &mut ScriptContext<'_>, _: &mut Vec<SoundBinding>) -> Outcome {
    let args = split_args(&action.args);
    let (name, id) = match args.as_slice() {
        [name] => (name.as_str(), 0),
        [name, id] => match id.parse::<u32>() {
            Ok(id) => (name.as_str(), id),
            Err(_) => return invalid(action, "sound id is not a number"),
        },
        _ => return invalid(action, "expected name [id]"),
    };
    ctx.host.play_sound(name, id);
    Outcome::Ok
}

fn op_bind_sound_variable(
    action: &Action,
    _: &mut ScriptContext<'_>,
    bindings: &mut Vec<SoundBinding>,
) -> Outcome {
    let args = split_args(&action.args);
    let [id, variable] = args.as_slice() else {
        return invalid(action, "expected id variable");
    };
    let Ok(id) = id.parse::<u32>() else {
        return invalid(action, "sound id is not a number");
    };
    bindings.push(SoundBinding {
        id,
        variable: variable.clone(),
    });
    Outcome::Ok
}

fn op_wait_until(action: &Action, ctx: &mut ScriptContext<'_>, _: &mut Vec<SoundBinding>) -> Outcome {
    if ctx.vars.eval_condition(&action.args) {
        Outcome::Ok
    } else {
        Outcome::Hold
    }
}

fn op_screen_effect(
    action: &Action,
    ctx: &mut ScriptContext<'_>,
    _: &mut Vec<SoundBinding>,
) -> Outcome {
    match name_arg(action) {
        Some(name) => {
            ctx.host.screen_effect(name);
            Outcome::Ok
        }
        None => invalid(action, "missing effect name"),
    }
}

fn op_delay(action: &Action, ctx: &mut ScriptContext<'_>, _: &mut Vec<SoundBinding>) -> Outcome {
    match action.numbers().as_deref() {
        Some([ms]) if *ms >= 0 => {
            let until_ms = ctx.host.now_ms().saturating_add(*ms as u64);
            Outcome::Wait(WaitReason::Delay { until_ms })
        }
        _ => invalid(action, "expected a non-negative millisecond count"),
    }
}

fn op_request_redraw(
    action: &Action,
    ctx: &mut ScriptContext<'_>,
    _: &mut Vec<SoundBinding>,
) -> Outcome {
    match action.numbers().as_deref() {
        Some([x1, y1, x2, y2]) => {
            ctx.host.request_redraw(Rect::new(*x1, *y1, *x2, *y2));
            Outcome::Ok
        }
        _ => invalid(action, "expected x1 y1 x2 y2"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_resolve_case_insensitively() {
        assert_eq!(ActionKind::from_keyword("move"), ActionKind::MoveActor);
        assert_eq!(ActionKind::from_keyword("CONVWAIT"), ActionKind::StartConversationWait);
        assert_eq!(ActionKind::from_keyword("Dance"), ActionKind::Unknown);
        assert_eq!(ActionKind::Unknown.keyword(), None);
    }

    #[test]
    fn every_known_kind_has_a_keyword() {
        for (kind, keyword, _) in OPCODES {
            assert_eq!(ActionKind::from_keyword(keyword), *kind);
            assert_eq!(kind.keyword(), Some(*keyword));
        }
    }

    #[test]
    fn placement_defaults_facing_and_rejects_garbage() {
        assert_eq!(
            placement(&Action::new("Move", "1203 100 150")),
            Some((1203, 100, 150, 0))
        );
        assert_eq!(
            placement(&Action::new("Move", "0, 10, 20, 3")),
            Some((0, 10, 20, 3))
        );
        assert_eq!(placement(&Action::new("Move", "1203 x 150")), None);
        assert_eq!(placement(&Action::new("Move", "1203 1 2 300")), None);
        assert_eq!(placement(&Action::new("Move", "-4 1 2")), None);
    }

    #[test]
    fn oversized_repeat_groups_make_the_action_invalid() {
        use crate::host::{HostEvent, RecordingHost};
        use crate::script::RoomTransition;
        use crate::variables::Variables;

        let mut vars = Variables::new();
        let mut host = RecordingHost::new();
        let mut ctx = ScriptContext::new(&mut vars, &mut host, RoomTransition::default());
        let mut bindings = Vec::new();
        let action = Action::new("Redraw", "0(4000000000,1) 0 0 0");
        assert_eq!(
            (action.kind.handler())(&action, &mut ctx, &mut bindings),
            Outcome::Invalid
        );
        let action = Action::new("Redraw", "0(2,10) 5 5");
        assert_eq!(
            (action.kind.handler())(&action, &mut ctx, &mut bindings),
            Outcome::Ok
        );
        assert_eq!(
            host.events(),
            &[HostEvent::Redraw {
                rect: Rect::new(0, 10, 5, 5)
            }]
        );
    }
}
