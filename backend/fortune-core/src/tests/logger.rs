use crate::logger::{LOG_FILE_NAME, initialize};

use log::LevelFilter;
use tempfile::TempDir;

/// **VALUE**: Initializing twice is not an error.
///
/// **WHY THIS MATTERS**: Both the CLI and tests call `initialize`; a second
/// call must not fail because a global logger already exists.
#[test]
fn given_logger_when_initialized_twice_then_both_calls_succeed() {
    let dir = TempDir::new().expect("temp dir");

    initialize(dir.path(), LevelFilter::Debug).expect("first initialization");
    initialize(dir.path(), LevelFilter::Debug).expect("second initialization");

    log::info!("logger test line");
    assert!(dir.path().join(LOG_FILE_NAME).exists());
}
