use crate::ErrorLocation;
use std::panic::Location;

/// **VALUE**: Verifies that `ErrorLocation::from()` captures the file it was created in.
///
/// **WHY THIS MATTERS**: Every pipeline error carries a location. If capture breaks,
/// errors surfaced from the retry or refresh paths can no longer be traced.
///
/// **BUG THIS CATCHES**: Would catch if file/line capture stops propagating.
#[test]
fn given_location_caller_when_error_location_created_then_captures_file_line_column() {
    // GIVEN/WHEN: A location captured right here
    let location = ErrorLocation::from(Location::caller());

    // THEN: File, line and column are populated
    assert!(location.line > 0, "Should capture line number");
    assert!(location.column > 0, "Should capture column number");
    assert!(!location.file.is_empty(), "Should capture file path");
}

/// **VALUE**: Verifies the `[file:line:column]` Display format.
///
/// **WHY THIS MATTERS**: Error messages append the location verbatim; tests across the
/// workspace match on the file name inside it.
///
/// **BUG THIS CATCHES**: Would catch a format change that drops brackets or fields.
#[test]
fn given_error_location_when_formatted_then_produces_bracketed_format() {
    let location = ErrorLocation {
        file: "backend/fortune-core/src/pipeline/mod.rs",
        line: 42,
        column: 7,
    };

    assert_eq!(
        location.to_string(),
        "[backend/fortune-core/src/pipeline/mod.rs:42:7]"
    );
}

/// **VALUE**: Verifies `file_name()` strips directories on both separator styles.
///
/// **BUG THIS CATCHES**: Would catch Windows paths leaking whole directories into assertions.
#[test]
fn given_nested_paths_when_file_name_called_then_returns_last_segment() {
    let unix = ErrorLocation {
        file: "src/pipeline/refresh.rs",
        line: 1,
        column: 1,
    };
    let windows = ErrorLocation {
        file: "src\\pipeline\\retry.rs",
        line: 1,
        column: 1,
    };

    assert_eq!(unix.file_name(), "refresh.rs");
    assert_eq!(windows.file_name(), "retry.rs");
}
