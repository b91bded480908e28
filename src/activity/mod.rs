mod builder;
mod types;

pub use builder::ActivityBuilder;
pub use types::{
    normalize_timestamp, Activity, ActivityAssets, ActivityButton, ActivityParty,
    ActivitySecrets, ActivityTimestamps, ActivityType, StatusDisplayType,
    MILLISECOND_THRESHOLD,
};
