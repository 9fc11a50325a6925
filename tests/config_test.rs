use std::path::Path;

use admitq::config::Config;
use admitq::error::Error;

// Env-var tests share process state, so they run in one test body.
#[test]
fn config_from_env() {
    unsafe {
        std::env::set_var("ADMITQ_PROCESSING_WINDOW", "12");
        std::env::remove_var("LOG_LEVEL");
        std::env::remove_var("OTEL_SERVICE_NAME");
    }
    let config = Config::from_env().unwrap();
    assert_eq!(config.processing_window, 12);
    assert_eq!(config.log_level, "info");
    assert_eq!(config.service_name, "admitq");

    unsafe {
        std::env::set_var("ADMITQ_PROCESSING_WINDOW", "lots");
    }
    assert!(matches!(Config::from_env(), Err(Error::Config(_))));

    unsafe {
        std::env::remove_var("ADMITQ_PROCESSING_WINDOW");
    }
    assert!(matches!(Config::from_env(), Err(Error::Config(_))));
}

#[test]
fn config_from_toml_applies_defaults() {
    let config = Config::from_toml_str("processing_window = 3\n").unwrap();
    assert_eq!(config.processing_window, 3);
    assert_eq!(config.otel_endpoint, None);
    assert_eq!(config.log_level, "info");
}

#[test]
fn config_from_toml_reads_all_fields() {
    let config = Config::from_toml_str(
        r#"
processing_window = 8
otel_endpoint = "http://localhost:4317"
log_level = "admitq=debug"
service_name = "pipeline-queue"
"#,
    )
    .unwrap();
    assert_eq!(config.otel_endpoint.as_deref(), Some("http://localhost:4317"));
    assert_eq!(config.log_level, "admitq=debug");
    assert_eq!(config.service_name, "pipeline-queue");
}

#[test]
fn config_from_toml_rejects_bad_input() {
    assert!(matches!(
        Config::from_toml_str("processing_window = -2\n"),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        Config::from_toml_str("log_level = \"info\"\n"),
        Err(Error::Toml(_))
    ));
}

#[test]
fn config_from_missing_file_is_io_error() {
    let result = Config::from_toml_file("/nonexistent/admitq.toml");
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn explicit_config_file_errors_are_not_swallowed() {
    let missing = Path::new("/nonexistent/admitq.toml");
    assert!(matches!(Config::resolve(Some(missing)), Err(Error::Io(_))));

    let path = std::env::temp_dir().join(format!("admitq-bad-{}.toml", std::process::id()));
    std::fs::write(&path, "processing_window = \"many\"\n").unwrap();
    let result = Config::resolve(Some(&path));
    std::fs::remove_file(&path).ok();
    assert!(matches!(result, Err(Error::Toml(_))));
}

#[test]
fn explicit_config_file_is_loaded() {
    let path = std::env::temp_dir().join(format!("admitq-good-{}.toml", std::process::id()));
    std::fs::write(&path, "processing_window = 5\n").unwrap();
    let result = Config::resolve(Some(&path));
    std::fs::remove_file(&path).ok();

    let config = result.unwrap().expect("file was given");
    assert_eq!(config.processing_window, 5);
}
