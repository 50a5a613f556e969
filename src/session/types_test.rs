use super::*;

// =============================================================================
// ProfileSnapshot
// =============================================================================

#[test]
fn default_profile_is_not_loaded() {
    assert!(!ProfileSnapshot::default().loaded());
}

#[test]
fn profile_with_user_id_is_loaded() {
    let profile = ProfileSnapshot { user_id: 7, ..Default::default() };
    assert!(profile.loaded());
}

#[test]
fn profile_deserializes_camel_case() {
    let json = serde_json::json!({
        "userId": 12,
        "displayName": "Ines",
        "avatarRef": "avatars/12.png",
        "role": "ADMIN",
        "adminShelterId": 3
    });
    let profile: ProfileSnapshot = serde_json::from_value(json).unwrap();
    assert_eq!(profile.user_id, 12);
    assert_eq!(profile.display_name, "Ines");
    assert_eq!(profile.avatar_ref.as_deref(), Some("avatars/12.png"));
    assert_eq!(profile.role, Some(Role::Admin));
    assert_eq!(profile.admin_shelter_id, Some(3));
}

#[test]
fn profile_tolerates_missing_fields() {
    let profile: ProfileSnapshot = serde_json::from_value(serde_json::json!({})).unwrap();
    assert_eq!(profile, ProfileSnapshot::default());
}

#[test]
fn profile_serialize_round_trip() {
    let profile = ProfileSnapshot {
        user_id: 5,
        display_name: "Momo".to_owned(),
        email: Some("momo@example.com".to_owned()),
        ..Default::default()
    };
    let json = serde_json::to_value(&profile).unwrap();
    assert_eq!(json["userId"], 5);
    assert_eq!(json["displayName"], "Momo");
    let back: ProfileSnapshot = serde_json::from_value(json).unwrap();
    assert_eq!(back, profile);
}

// =============================================================================
// ProfileUpdate
// =============================================================================

#[test]
fn profile_update_skips_unset_fields() {
    let update = ProfileUpdate { bio: Some("likes cats".to_owned()), ..Default::default() };
    let json = serde_json::to_value(&update).unwrap();
    assert_eq!(json, serde_json::json!({ "bio": "likes cats" }));
}

// =============================================================================
// unix_ms_now
// =============================================================================

#[test]
fn unix_ms_now_is_plausible() {
    let now = unix_ms_now();
    // After 2020-01-01 and before 2100-01-01, in milliseconds.
    assert!(now > 1_577_836_800_000);
    assert!(now < 4_102_444_800_000);
}
