use serde::{Deserialize, Serialize, Serializer};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::error::{DiscordIpcError, Result};

/// Timestamps below this are taken to be in seconds rather than milliseconds
pub const MILLISECOND_THRESHOLD: u64 = 100_000_000_000;

const MAX_TEXT_LEN: usize = 128;
const MAX_ASSET_KEY_LEN: usize = 256;
const MAX_BUTTONS: usize = 2;
const MAX_BUTTON_LABEL_LEN: usize = 32;

/// Kind of activity shown in the profile ("Playing", "Listening to", ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum ActivityType {
    Playing = 0,
    Listening = 2,
    Watching = 3,
    Competing = 5,
}

impl TryFrom<u8> for ActivityType {
    type Error = DiscordIpcError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(ActivityType::Playing),
            2 => Ok(ActivityType::Listening),
            3 => Ok(ActivityType::Watching),
            5 => Ok(ActivityType::Competing),
            other => Err(DiscordIpcError::InvalidArgument(format!(
                "{} is not a valid activity type (expected 0, 2, 3 or 5)",
                other
            ))),
        }
    }
}

/// Which field Discord shows in the member list status line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum StatusDisplayType {
    Name = 0,
    State = 1,
    Details = 2,
}

impl TryFrom<u8> for StatusDisplayType {
    type Error = DiscordIpcError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(StatusDisplayType::Name),
            1 => Ok(StatusDisplayType::State),
            2 => Ok(StatusDisplayType::Details),
            other => Err(DiscordIpcError::InvalidArgument(format!(
                "{} is not a valid status display type (expected 0, 1 or 2)",
                other
            ))),
        }
    }
}

/// Rich Presence Activity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub activity_type: Option<ActivityType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_display_type: Option<StatusDisplayType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<ActivityTimestamps>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets: Option<ActivityAssets>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub party: Option<ActivityParty>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub secrets: Option<ActivitySecrets>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub buttons: Option<Vec<ActivityButton>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<bool>,
}

/// Activity timestamps since the Unix epoch
///
/// Values in seconds are accepted and go out on the wire as milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityTimestamps {
    #[serde(
        serialize_with = "serialize_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub start: Option<u64>,

    #[serde(
        serialize_with = "serialize_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub end: Option<u64>,
}

fn serialize_millis<S>(value: &Option<u64>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    value.map(normalize_timestamp).serialize(serializer)
}

/// Convert a timestamp in seconds or milliseconds to milliseconds
pub fn normalize_timestamp(timestamp: u64) -> u64 {
    if timestamp < MILLISECOND_THRESHOLD {
        timestamp.saturating_mul(1000)
    } else {
        timestamp
    }
}

/// Activity assets (images)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityAssets {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_image: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub small_image: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub small_text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub small_url: Option<String>,
}

/// Activity party information
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityParty {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<[u32; 2]>, // [current, max]
}

/// Activity secrets for join/spectate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySecrets {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub spectate: Option<String>,

    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_secret: Option<String>,
}

/// Activity button
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityButton {
    pub label: String,
    pub url: String,
}

fn check_len(field: &str, value: &Option<String>, max: usize) -> Result<()> {
    match value {
        Some(value) if value.chars().count() > max => Err(DiscordIpcError::InvalidActivity(
            format!("{} must be at most {} characters", field, max),
        )),
        _ => Ok(()),
    }
}

fn check_url(field: &str, value: &str) -> Result<()> {
    if value.starts_with("https://") || value.starts_with("http://") {
        Ok(())
    } else {
        Err(DiscordIpcError::InvalidActivity(format!(
            "{} must be an http(s) URL, got {:?}",
            field, value
        )))
    }
}

fn check_optional_url(field: &str, value: &Option<String>) -> Result<()> {
    value.as_deref().map_or(Ok(()), |url| check_url(field, url))
}

impl Activity {
    /// Check the limits Discord enforces before the activity is sent
    pub fn validate(&self) -> Result<()> {
        check_len("name", &self.name, MAX_TEXT_LEN)?;
        check_len("state", &self.state, MAX_TEXT_LEN)?;
        check_len("details", &self.details, MAX_TEXT_LEN)?;
        check_optional_url("state_url", &self.state_url)?;
        check_optional_url("details_url", &self.details_url)?;

        if let Some(assets) = &self.assets {
            check_len("large_image", &assets.large_image, MAX_ASSET_KEY_LEN)?;
            check_len("small_image", &assets.small_image, MAX_ASSET_KEY_LEN)?;
            check_len("large_text", &assets.large_text, MAX_TEXT_LEN)?;
            check_len("small_text", &assets.small_text, MAX_TEXT_LEN)?;
            check_optional_url("large_url", &assets.large_url)?;
            check_optional_url("small_url", &assets.small_url)?;
        }

        if let Some(ActivityTimestamps {
            start: Some(start),
            end: Some(end),
        }) = &self.timestamps
        {
            if normalize_timestamp(*start) > normalize_timestamp(*end) {
                return Err(DiscordIpcError::InvalidActivity(
                    "start timestamp is after end timestamp".to_string(),
                ));
            }
        }

        if let Some([current, max]) = self.party.as_ref().and_then(|party| party.size) {
            if current > max {
                return Err(DiscordIpcError::InvalidActivity(format!(
                    "party size {} exceeds maximum {}",
                    current, max
                )));
            }
        }

        if let Some(buttons) = &self.buttons {
            if buttons.len() > MAX_BUTTONS {
                return Err(DiscordIpcError::InvalidActivity(format!(
                    "at most {} buttons are allowed, got {}",
                    MAX_BUTTONS,
                    buttons.len()
                )));
            }
            for button in buttons {
                if button.label.is_empty() || button.label.chars().count() > MAX_BUTTON_LABEL_LEN {
                    return Err(DiscordIpcError::InvalidActivity(format!(
                        "button label must be 1 to {} characters",
                        MAX_BUTTON_LABEL_LEN
                    )));
                }
                check_url("button url", &button.url)?;
            }
        }

        Ok(())
    }
}
