use weave_logger::{LevelFilter, Logger};

#[test]
fn console_only_logger_has_no_log_dir() {
    let logger = Logger::builder()
        .name("integration-console-only")
        .level(LevelFilter::WARN)
        .init()
        .expect("logger should initialize");

    assert!(logger.log_dir().is_none());
    tracing::warn!("console only");
}
