use presence_ipc::{ActivityBuilder, ActivityType, DiscordIpcError, StatusDisplayType};

#[test]
fn default_activity_valid() {
    let activity = ActivityBuilder::new().build();
    assert!(activity.validate().is_ok());
}

#[test]
fn set_state_and_details() {
    let activity = ActivityBuilder::new()
        .state("Playing")
        .details("In game")
        .build();
    assert_eq!(activity.state.as_deref(), Some("Playing"));
    assert_eq!(activity.details.as_deref(), Some("In game"));
    assert!(activity.validate().is_ok());
}

#[test]
fn state_length_exceeds_limit() {
    let activity = ActivityBuilder::new().state("a".repeat(129)).build();
    assert!(matches!(
        activity.validate(),
        Err(DiscordIpcError::InvalidActivity(_))
    ));
}

#[test]
fn button_limit_exceeded() {
    let result = ActivityBuilder::new()
        .button("label1", "http://example.com/1")
        .button("label2", "http://example.com/2")
        .button("label3", "http://example.com/3")
        .build_validated();
    assert!(result.is_err());
}

#[test]
fn invalid_button_url_scheme() {
    let activity = ActivityBuilder::new()
        .button("Play", "ftp://example.com")
        .build();
    assert!(activity.validate().is_err());
}

#[test]
fn invalid_details_url_scheme() {
    let activity = ActivityBuilder::new()
        .details("Reading")
        .details_url("javascript:alert(1)")
        .build();
    assert!(activity.validate().is_err());
}

#[test]
fn large_image_key_too_long() {
    let activity = ActivityBuilder::new().large_image("x".repeat(257)).build();
    assert!(activity.validate().is_err());
}

#[test]
fn valid_party_and_buttons_pass_validation() {
    let activity = ActivityBuilder::new()
        .state("Raiding")
        .party("raid-123", 3, 6)
        .button("Join", "https://example.com/join")
        .button("Watch", "https://example.com/watch")
        .build();

    assert!(activity.validate().is_ok());
}

#[test]
fn party_size_invalid() {
    let activity = ActivityBuilder::new().party("id", 5, 4).build();
    assert!(activity.validate().is_err());
}

#[test]
fn end_before_start_is_rejected() {
    let activity = ActivityBuilder::new()
        .start_timestamp(1_700_000_100)
        .end_timestamp(1_700_000_000)
        .build();
    assert!(activity.validate().is_err());
}

#[test]
fn second_timestamps_are_stored_as_milliseconds() {
    let activity = ActivityBuilder::new()
        .start_timestamp(1_700_000_000)
        .end_timestamp(1_700_000_000_500)
        .build();
    let timestamps = activity.timestamps.expect("timestamps set");
    assert_eq!(timestamps.start, Some(1_700_000_000_000));
    assert_eq!(timestamps.end, Some(1_700_000_000_500));
}

#[test]
fn start_timestamp_now_is_in_milliseconds() {
    let activity = ActivityBuilder::new()
        .start_timestamp_now()
        .expect("clock after epoch")
        .build();
    let start = activity.timestamps.and_then(|t| t.start).expect("start set");
    assert!(start >= presence_ipc::activity::MILLISECOND_THRESHOLD);
}

#[test]
fn activity_and_display_types_from_integers() {
    assert_eq!(ActivityType::try_from(2).unwrap(), ActivityType::Listening);
    assert!(ActivityType::try_from(1).is_err());
    assert!(ActivityType::try_from(4).is_err());
    assert_eq!(
        StatusDisplayType::try_from(2).unwrap(),
        StatusDisplayType::Details
    );
    assert!(StatusDisplayType::try_from(3).is_err());
}
