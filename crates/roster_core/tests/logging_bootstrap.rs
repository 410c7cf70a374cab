use roster_core::{default_log_level, init_logging, logging_status};

// Logging state is process-wide, so the whole lifecycle is exercised in a
// single test function.
#[test]
fn init_is_idempotent_per_directory_and_rejects_switching() {
    let log_dir = tempfile::tempdir().unwrap();
    let dir_text = log_dir.path().to_string_lossy().to_string();

    assert!(init_logging("info", &dir_text).is_ok());
    assert!(init_logging("info", &dir_text).is_ok());

    let (level, active_dir) = logging_status().unwrap();
    assert_eq!(level, "info");
    assert_eq!(active_dir, log_dir.path());

    let other_dir = tempfile::tempdir().unwrap();
    let err = init_logging("info", &other_dir.path().to_string_lossy()).unwrap_err();
    assert!(err.contains("already initialized"));

    let err = init_logging("debug", &dir_text).unwrap_err();
    assert!(err.contains("refusing to switch"));

    assert!(init_logging("verbose", &dir_text).is_err());
    assert!(init_logging("info", "relative/logs").is_err());

    assert!(matches!(default_log_level(), "debug" | "info"));
}
