// Unit tests for error module
// Tests error serialization (errors are printed as JSON)

use crate::error::CliError;

use fortune_core::error::PipelineError;

/// **VALUE**: Pipeline failures keep their structured parts on the way out.
///
/// **WHY THIS MATTERS**: Scripts driving the CLI branch on `requiresLogin`
/// and `code`, not on message text.
///
/// **BUG THIS CATCHES**: Flattening the pipeline error into a bare string.
#[test]
fn given_auth_required_when_converted_then_requires_login_serialized() {
    // GIVEN: A pipeline error asking for a fresh sign-in
    let error: CliError = PipelineError::auth_required("refresh rejected").into();

    // WHEN: Serializing to JSON
    let json = serde_json::to_value(&error).expect("serializable");

    // THEN: Variant and flags are preserved
    assert_eq!(json["type"], "Request");
    assert_eq!(json["data"]["requires_login"], true);
    assert!(json["data"]["location"]["file"].is_string());
}

#[test]
fn given_input_error_when_formatted_then_includes_location() {
    let error = CliError::input("Ratings must be 1-5, got 9");

    let rendered = error.to_string();

    assert!(rendered.contains("Input Error"));
    assert!(rendered.contains("error.rs"));
}
