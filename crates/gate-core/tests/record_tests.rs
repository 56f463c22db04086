//! Record and credential parsing tests — the wire format every tier of the
//! cache agrees on.

use std::net::IpAddr;

use gate_core::{Credential, CredentialError, RejectKind, WorkspaceRecord};

#[test]
fn record_with_current_field_resolves() {
    let record: WorkspaceRecord = serde_json::from_str(
        r#"{"username":"alice","ip":"10.0.0.5","credential":"pub1:sec1"}"#,
    )
    .unwrap();

    assert_eq!(record.username, "alice");
    assert_eq!(record.ip, Some("10.0.0.5".parse::<IpAddr>().unwrap()));

    let cred = record.resolve_credential().unwrap();
    assert_eq!(cred.public, "pub1");
    assert_eq!(cred.secret, "sec1");
    assert_eq!(cred.combined(), "pub1:sec1");
}

#[test]
fn record_falls_back_to_legacy_field() {
    let record: WorkspaceRecord =
        serde_json::from_str(r#"{"username":"bob","ip":null,"auth":"abc:123"}"#).unwrap();

    assert!(!record.is_provisioned());
    let cred = record.resolve_credential().unwrap();
    assert_eq!(cred.combined(), "abc:123");
}

#[test]
fn record_with_both_fields_is_ambiguous() {
    let record: WorkspaceRecord = serde_json::from_str(
        r#"{"username":"eve","credential":"a:b","auth":"c:d"}"#,
    )
    .unwrap();

    assert_eq!(record.resolve_credential(), Err(CredentialError::Ambiguous));
}

#[test]
fn record_with_no_credential_is_missing() {
    let record: WorkspaceRecord =
        serde_json::from_str(r#"{"username":"mallory","ip":"10.0.0.9"}"#).unwrap();

    assert_eq!(record.resolve_credential(), Err(CredentialError::Missing));
}

#[test]
fn empty_credential_string_counts_as_absent() {
    let record: WorkspaceRecord =
        serde_json::from_str(r#"{"username":"carol","credential":"","auth":"x:y"}"#).unwrap();

    // The empty current field must not shadow the populated legacy one.
    assert_eq!(record.resolve_credential().unwrap().combined(), "x:y");
}

#[test]
fn credential_wire_form_is_strict() {
    assert_eq!(Credential::parse("nocolon"), Err(CredentialError::Malformed));
    assert_eq!(Credential::parse(":sec"), Err(CredentialError::Malformed));
    assert_eq!(Credential::parse("pub:"), Err(CredentialError::Malformed));

    // Secrets may contain further colons; only the first splits.
    let cred = Credential::parse("pub:se:cret").unwrap();
    assert_eq!(cred.public, "pub");
    assert_eq!(cred.secret, "se:cret");
}

#[test]
fn credential_comparison_is_exact_and_case_sensitive() {
    let cred = Credential::parse("abc:123").unwrap();
    assert!(cred.matches("abc:123"));
    assert!(!cred.matches("abc:124"));
    assert!(!cred.matches("ABC:123"));
}

#[test]
fn record_round_trips_through_json() {
    let record = WorkspaceRecord::new("alice", Some("10.0.0.5".parse().unwrap()), "pub1:sec1");
    let raw = serde_json::to_string(&record).unwrap();
    let back: WorkspaceRecord = serde_json::from_str(&raw).unwrap();
    assert_eq!(back, record);
}

#[test]
fn only_resolution_failures_are_severe() {
    assert!(RejectKind::ResolutionFailed.severe());
    for kind in [
        RejectKind::AuthMissing,
        RejectKind::AuthInvalid,
        RejectKind::WorkspaceUnprovisioned,
        RejectKind::BackendUnavailable,
    ] {
        assert!(!kind.severe(), "{kind:?} must be routine");
    }
}
