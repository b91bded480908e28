//! Builders for the command messages sent after the handshake
//!
//! Every builder returns a complete [`IpcMessage`] with a fresh nonce. They
//! do no I/O, so the same builders back the blocking and async clients.

use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::activity::Activity;
use crate::error::Result;
use crate::ipc::{Command, Event, IpcMessage};
use crate::voice::{UserVoiceSettings, VoiceSettings};

/// Recursively drop `null` values and empty objects from `value`
///
/// Arrays are left alone apart from cleaning the objects inside them.
pub fn remove_none(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for child in map.values_mut() {
                remove_none(child);
            }
            map.retain(|_, child| match child {
                Value::Null => false,
                Value::Object(inner) => !inner.is_empty(),
                _ => true,
            });
        }
        Value::Array(items) => items.iter_mut().for_each(remove_none),
        _ => {}
    }
}

/// Fresh nonce for `cmd`, e.g. `set-activity-<uuid v4>`
///
/// The command prefix only makes nonces readable in logs; uniqueness comes
/// from the UUID.
pub fn nonce_for(cmd: Command) -> String {
    let prefix = match serde_json::to_value(cmd) {
        Ok(Value::String(name)) => name.to_ascii_lowercase().replace('_', "-"),
        _ => "request".to_string(),
    };
    format!("{}-{}", prefix, Uuid::new_v4())
}

/// Build a message for `cmd`, cleaning `args` of unset values
///
/// The `args` object itself is always present, even when empty.
fn message(cmd: Command, mut args: Value, evt: Option<Event>) -> IpcMessage {
    remove_none(&mut args);
    if !args.is_object() {
        args = Value::Object(Map::new());
    }
    raw_message(cmd, args, evt)
}

fn raw_message(cmd: Command, args: Value, evt: Option<Event>) -> IpcMessage {
    IpcMessage {
        cmd,
        args,
        evt,
        nonce: nonce_for(cmd),
    }
}

/// `SET_ACTIVITY` for the process `pid`
pub fn set_activity(pid: u32, activity: &Activity) -> Result<IpcMessage> {
    let activity = serde_json::to_value(activity)?;
    Ok(message(
        Command::SetActivity,
        json!({ "pid": pid, "activity": activity }),
        None,
    ))
}

/// `SET_ACTIVITY` with an explicit `"activity": null`, which clears the presence
pub fn clear_activity(pid: u32) -> IpcMessage {
    raw_message(
        Command::SetActivity,
        json!({ "pid": pid, "activity": Value::Null }),
        None,
    )
}

pub fn authorize<S: AsRef<str>>(client_id: &str, scopes: &[S]) -> IpcMessage {
    let scopes: Vec<&str> = scopes.iter().map(AsRef::as_ref).collect();
    message(
        Command::Authorize,
        json!({ "client_id": client_id, "scopes": scopes }),
        None,
    )
}

pub fn authenticate(access_token: &str) -> IpcMessage {
    message(
        Command::Authenticate,
        json!({ "access_token": access_token }),
        None,
    )
}

pub fn get_guilds() -> IpcMessage {
    message(Command::GetGuilds, json!({}), None)
}

pub fn get_guild(guild_id: &str) -> IpcMessage {
    message(Command::GetGuild, json!({ "guild_id": guild_id }), None)
}

pub fn get_channels(guild_id: &str) -> IpcMessage {
    message(Command::GetChannels, json!({ "guild_id": guild_id }), None)
}

pub fn get_channel(channel_id: &str) -> IpcMessage {
    message(Command::GetChannel, json!({ "channel_id": channel_id }), None)
}

/// Join a voice channel, or leave the current one with `None`
///
/// Leaving needs an explicit `"channel_id": null`, so these args are not
/// cleaned.
pub fn select_voice_channel(channel_id: Option<&str>) -> IpcMessage {
    raw_message(
        Command::SelectVoiceChannel,
        json!({ "channel_id": channel_id }),
        None,
    )
}

pub fn get_selected_voice_channel() -> IpcMessage {
    message(Command::GetSelectedVoiceChannel, json!({}), None)
}

/// Select a text channel, or deselect with `None`
pub fn select_text_channel(channel_id: Option<&str>) -> IpcMessage {
    raw_message(
        Command::SelectTextChannel,
        json!({ "channel_id": channel_id }),
        None,
    )
}

pub fn set_user_voice_settings(settings: &UserVoiceSettings) -> Result<IpcMessage> {
    let args = serde_json::to_value(settings)?;
    Ok(message(Command::SetUserVoiceSettings, args, None))
}

pub fn get_voice_settings() -> IpcMessage {
    message(Command::GetVoiceSettings, json!({}), None)
}

pub fn set_voice_settings(settings: &VoiceSettings) -> Result<IpcMessage> {
    let args = serde_json::to_value(settings)?;
    Ok(message(Command::SetVoiceSettings, args, None))
}

/// `SUBSCRIBE` to `event`; `args` scopes the subscription (e.g. a `guild_id`)
pub fn subscribe(event: &Event, args: Option<Value>) -> IpcMessage {
    message(
        Command::Subscribe,
        args.unwrap_or_else(|| json!({})),
        Some(event.clone()),
    )
}

pub fn unsubscribe(event: &Event, args: Option<Value>) -> IpcMessage {
    message(
        Command::Unsubscribe,
        args.unwrap_or_else(|| json!({})),
        Some(event.clone()),
    )
}

/// Start or stop (`"start"` / `"stop"`) capturing a keyboard shortcut
pub fn capture_shortcut(action: &str) -> IpcMessage {
    message(
        Command::CaptureShortcut,
        json!({ "action": action.to_uppercase() }),
        None,
    )
}

pub fn send_activity_join_invite(user_id: &str) -> IpcMessage {
    message(
        Command::SendActivityJoinInvite,
        json!({ "user_id": user_id }),
        None,
    )
}

pub fn close_activity_request(user_id: &str) -> IpcMessage {
    message(
        Command::CloseActivityRequest,
        json!({ "user_id": user_id }),
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ActivityBuilder, ActivityTimestamps};

    #[test]
    fn remove_none_strips_nested_nulls_and_empty_objects() {
        let mut value = json!({
            "pid": 1,
            "activity": {
                "state": null,
                "timestamps": {"start": null, "end": null},
                "party": {"id": "p", "size": null},
                "buttons": [{"label": "a", "url": null}]
            }
        });
        remove_none(&mut value);
        assert_eq!(
            value,
            json!({"pid": 1, "activity": {"party": {"id": "p"}, "buttons": [{"label": "a"}]}})
        );
    }

    #[test]
    fn empty_args_object_is_kept() {
        let msg = get_guilds();
        assert_eq!(msg.args, json!({}));
        let wire = serde_json::to_value(&msg).unwrap();
        assert!(wire.get("args").is_some());
        assert!(wire.get("evt").is_none());
    }

    #[test]
    fn clear_activity_sends_explicit_null() {
        let wire = serde_json::to_value(clear_activity(42)).unwrap();
        assert_eq!(wire["args"], json!({"pid": 42, "activity": null}));
        assert_eq!(wire["cmd"], "SET_ACTIVITY");
    }

    #[test]
    fn set_activity_without_assets_has_no_assets_key() {
        let activity = ActivityBuilder::new().state("s").details("d").build();
        let msg = set_activity(7, &activity).unwrap();
        assert_eq!(msg.args, json!({"pid": 7, "activity": {"state": "s", "details": "d"}}));
    }

    #[test]
    fn set_activity_sends_struct_timestamps_in_milliseconds() {
        let activity = Activity {
            timestamps: Some(ActivityTimestamps {
                start: Some(1_700_000_000),
                end: None,
            }),
            ..Activity::default()
        };
        let msg = set_activity(1, &activity).unwrap();
        assert_eq!(
            msg.args["activity"]["timestamps"],
            json!({"start": 1_700_000_000_000u64})
        );
    }

    #[test]
    fn repeated_builds_differ_only_in_nonce() {
        let activity = ActivityBuilder::new()
            .state("s")
            .details("d")
            .large_image("logo")
            .party("p", 1, 4)
            .build();
        let mut first = serde_json::to_value(set_activity(7, &activity).unwrap()).unwrap();
        let mut second = serde_json::to_value(set_activity(7, &activity).unwrap()).unwrap();
        assert_ne!(first["nonce"], second["nonce"]);

        first["nonce"].take();
        second["nonce"].take();
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );

        let mut args = first["args"].clone();
        remove_none(&mut args);
        assert_eq!(args, first["args"]);
    }

    #[test]
    fn capture_shortcut_upper_cases_action() {
        assert_eq!(capture_shortcut("start").args["action"], "START");
    }

    #[test]
    fn subscribe_carries_event() {
        let msg = subscribe(&Event::ActivityJoin, None);
        let wire = serde_json::to_value(&msg).unwrap();
        assert_eq!(wire["evt"], "ACTIVITY_JOIN");
        assert_eq!(wire["cmd"], "SUBSCRIBE");
        assert!(msg.nonce.starts_with("subscribe-"));
    }

    #[test]
    fn nonces_are_prefixed_and_unique() {
        let first = nonce_for(Command::SetActivity);
        let second = nonce_for(Command::SetActivity);
        assert!(first.starts_with("set-activity-"));
        assert_eq!(first.len(), "set-activity-".len() + 36);
        assert_ne!(first, second);
    }

    #[test]
    fn leaving_voice_channel_keeps_null_id() {
        let msg = select_voice_channel(None);
        assert_eq!(msg.args, json!({"channel_id": null}));
    }
}
