use crate::{ApiErrorCode, Envelope};

use serde_json::json;

/// **VALUE**: Verifies that only bodies with a boolean `success` flag or an `error`
/// object are treated as envelopes.
///
/// **WHY THIS MATTERS**: Legacy endpoints return bare payloads. Treating an arbitrary
/// object with a `data` key as an envelope would unwrap the wrong level.
///
/// **BUG THIS CATCHES**: Would catch detection keyed on `data` instead of `success`.
#[test]
fn given_various_bodies_when_detect_called_then_only_envelopes_match() {
    assert!(Envelope::detect(&json!({"success": true, "data": {}})).is_some());
    assert!(Envelope::detect(&json!({"error": {"code": "X"}})).is_some());
    assert!(Envelope::detect(&json!({"data": {"id": 1}})).is_none());
    assert!(Envelope::detect(&json!({"success": "yes"})).is_none());
    assert!(Envelope::detect(&json!([1, 2, 3])).is_none());
}

/// **VALUE**: Verifies that malformed `details` do not poison the rest of the envelope.
///
/// **WHY THIS MATTERS**: If `details` is an object instead of an array, the error message
/// must still be recoverable for the user.
///
/// **BUG THIS CATCHES**: Would catch a strict `Vec<ErrorDetail>` deserializer.
#[test]
fn given_non_array_details_when_detect_called_then_keeps_message() {
    let body = json!({
        "success": false,
        "error": {"code": "VALIDATION_ERROR", "message": "bad input", "details": {"q": "x"}}
    });

    let envelope = Envelope::detect(&body).expect("should be an envelope");

    assert!(envelope.is_failure());
    assert!(envelope.details().is_empty());
    assert_eq!(envelope.error_code(), Some("VALIDATION_ERROR"));
    assert_eq!(
        envelope.error.and_then(|error| error.message).as_deref(),
        Some("bad input")
    );
}

/// **VALUE**: Verifies that detection never rejects a marked envelope over a
/// mistyped field.
///
/// **WHY THIS MATTERS**: A `success: false` body that fails to parse would be
/// delivered to the caller as if it were a legacy success payload.
///
/// **BUG THIS CATCHES**: Would catch strict `Option<String>` fields for `code`
/// and `message`, or a strict `error` object.
#[test]
fn given_marked_body_with_mistyped_fields_when_detect_called_then_envelope_is_lenient() {
    // GIVEN
    let numeric_codes = json!({"success": false, "code": 1001, "error": {"code": 42, "message": ["x"]}});
    let error_not_object = json!({"success": false, "error": "boom", "message": 7});

    // WHEN
    let first = Envelope::detect(&numeric_codes).expect("should be an envelope");
    let second = Envelope::detect(&error_not_object).expect("should be an envelope");

    // THEN
    assert!(first.is_failure());
    assert_eq!(first.error_code(), Some("42"));
    assert_eq!(first.code.as_deref(), Some("1001"));
    assert!(first.error.and_then(|error| error.message).is_none());

    assert!(second.is_failure());
    assert!(second.error.is_none());
    assert_eq!(second.message.as_deref(), Some("7"));
}

#[test]
fn given_detail_with_blank_msg_when_text_called_then_falls_back_to_message() {
    let body = json!({
        "success": false,
        "error": {"details": [{"msg": "  ", "message": "question too long", "param": "question"}]}
    });

    let envelope = Envelope::detect(&body).unwrap();
    let detail = &envelope.details()[0];

    assert_eq!(detail.text(), Some("question too long"));
    assert_eq!(detail.field.as_deref(), Some("question"));
}

#[test]
fn given_top_level_code_when_error_code_called_then_uses_fallback() {
    let envelope = Envelope::detect(&json!({"success": false, "code": "FREE_QUOTA_EXCEEDED"})).unwrap();

    assert_eq!(envelope.error_code(), Some("FREE_QUOTA_EXCEEDED"));
}

#[test]
fn given_known_and_unknown_codes_when_parsed_then_maps_to_variants() {
    assert_eq!(ApiErrorCode::parse("TOKEN_INVALID"), ApiErrorCode::TokenInvalid);
    assert_eq!(
        ApiErrorCode::parse("SOMETHING_NEW"),
        ApiErrorCode::Other(String::from("SOMETHING_NEW"))
    );
    assert!(ApiErrorCode::parse("SOMETHING_NEW").description().is_none());
    assert_eq!(ApiErrorCode::FreeQuotaExceeded.as_str(), "FREE_QUOTA_EXCEEDED");
}
