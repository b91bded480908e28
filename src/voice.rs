//! Argument types for the voice settings commands

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Left/right balance for one user, each side in `0.0..=1.0`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pan {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<f32>,
}

/// Per-user voice overrides sent with `SET_USER_VOICE_SETTINGS`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserVoiceSettings {
    pub user_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pan: Option<Pan>,

    /// 0 to 200, where 100 is unchanged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mute: Option<bool>,
}

impl UserVoiceSettings {
    pub fn new<S: Into<String>>(user_id: S) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    pub fn pan(mut self, left: f32, right: f32) -> Self {
        self.pan = Some(Pan {
            left: Some(left),
            right: Some(right),
        });
        self
    }

    pub fn volume(mut self, volume: u16) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn mute(mut self, mute: bool) -> Self {
        self.mute = Some(mute);
        self
    }
}

/// An input or output device selection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceIo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f32>,

    /// Only present in responses
    #[serde(default, skip_serializing)]
    pub available_devices: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoiceModeType {
    VoiceActivity,
    PushToTalk,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceMode {
    #[serde(rename = "type")]
    pub mode_type: VoiceModeType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_threshold: Option<bool>,

    /// Voice activity threshold in dB, `-100.0..=0.0`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub shortcut: Option<Value>,

    /// Push-to-talk release delay in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<f32>,
}

/// Client-wide voice settings, as read by `GET_VOICE_SETTINGS` and
/// written by `SET_VOICE_SETTINGS`
///
/// Fields left as `None` are not sent and keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<VoiceIo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<VoiceIo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<VoiceMode>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub automatic_gain_control: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub echo_cancellation: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub noise_suppression: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub qos: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub silence_warning: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deaf: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mute: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unset_fields_are_omitted() {
        let settings = VoiceSettings {
            deaf: Some(true),
            input: Some(VoiceIo {
                volume: Some(50.0),
                ..VoiceIo::default()
            }),
            ..VoiceSettings::default()
        };
        assert_eq!(
            serde_json::to_value(&settings).unwrap(),
            json!({"deaf": true, "input": {"volume": 50.0}})
        );
    }

    #[test]
    fn response_settings_deserialize() {
        let settings: VoiceSettings = serde_json::from_value(json!({
            "input": {"device_id": "default", "volume": 100.0, "available_devices": [{"id": "default"}]},
            "mode": {"type": "PUSH_TO_TALK", "delay": 20.0},
            "mute": false
        }))
        .unwrap();
        assert_eq!(settings.input.unwrap().available_devices.len(), 1);
        assert_eq!(settings.mode.unwrap().mode_type, VoiceModeType::PushToTalk);
    }
}
