use presence_ipc::{
    payload, Activity, ActivityAssets, ActivityBuilder, ActivityParty, ActivityType,
    StatusDisplayType,
};
use serde_json::Value;

fn activity_to_value(activity: &Activity) -> Value {
    serde_json::to_value(activity).expect("activity should serialize")
}

#[test]
fn builder_produces_serializable_activity() {
    let activity = ActivityBuilder::new()
        .name("Campaign")
        .activity_type(ActivityType::Competing)
        .status_display_type(StatusDisplayType::State)
        .state("Playing campaign")
        .details("Mission 5")
        .start_timestamp(1234)
        .end_timestamp(5678)
        .large_image("cover-art")
        .large_text("Cover Art")
        .small_image("icon")
        .small_text("Icon Text")
        .party("party-id", 2, 4)
        .button("Join", "https://example.com/join")
        .build();

    let value = activity_to_value(&activity);

    assert_eq!(value["name"], "Campaign");
    assert_eq!(value["type"], 5);
    assert_eq!(value["status_display_type"], 1);
    assert_eq!(value["state"], "Playing campaign");
    assert_eq!(value["details"], "Mission 5");

    let timestamps = value
        .get("timestamps")
        .and_then(Value::as_object)
        .expect("timestamps serialized");
    assert_eq!(timestamps["start"], 1_234_000);
    assert_eq!(timestamps["end"], 5_678_000);

    let assets = value
        .get("assets")
        .and_then(Value::as_object)
        .expect("assets serialized");
    assert_eq!(assets["large_image"], "cover-art");
    assert_eq!(assets["small_text"], "Icon Text");
    assert!(!assets.contains_key("large_url"));

    let party = value
        .get("party")
        .and_then(Value::as_object)
        .expect("party serialized");
    let size = party["size"].as_array().expect("party size array");
    assert_eq!(size[0], 2);
    assert_eq!(size[1], 4);

    let buttons = value["buttons"].as_array().expect("buttons serialize");
    assert_eq!(buttons.len(), 1);
    assert_eq!(buttons[0]["label"], "Join");
}

#[test]
fn unset_fields_are_not_serialized() {
    let value = activity_to_value(&ActivityBuilder::new().state("Idle").build());
    let object = value.as_object().expect("activity is an object");
    assert_eq!(object.len(), 1);
    assert!(object.get("assets").is_none());
    assert!(object.get("type").is_none());
}

#[test]
fn manual_activity_validation_matches_serialization() {
    let activity = Activity {
        state: Some("Multiplayer".to_string()),
        party: Some(ActivityParty {
            id: Some("group".into()),
            size: Some([1, 4]),
        }),
        assets: Some(ActivityAssets {
            large_image: Some("hero".into()),
            large_text: Some("Hero".into()),
            ..ActivityAssets::default()
        }),
        ..Activity::default()
    };

    activity.validate().expect("activity should be valid");

    let value = activity_to_value(&activity);
    assert_eq!(value["state"], "Multiplayer");
    assert!(value.get("assets").is_some());
}

#[test]
fn set_activity_message_carries_pid_and_activity() {
    let activity = ActivityBuilder::new().state("Editing").build();
    let message = payload::set_activity(4242, &activity).expect("message builds");
    let value = serde_json::to_value(&message).expect("message serializes");

    assert_eq!(value["cmd"], "SET_ACTIVITY");
    assert_eq!(value["args"]["pid"], 4242);
    assert_eq!(value["args"]["activity"]["state"], "Editing");
    assert!(value["nonce"].as_str().is_some_and(|n| !n.is_empty()));
}

#[test]
fn clear_activity_sends_explicit_null() {
    let message = payload::clear_activity(7);
    let value = serde_json::to_value(&message).expect("message serializes");

    assert_eq!(value["args"]["pid"], 7);
    assert!(value["args"]
        .as_object()
        .is_some_and(|args| args.get("activity") == Some(&Value::Null)));
}
