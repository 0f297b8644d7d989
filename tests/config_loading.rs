// tests/config_loading.rs

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use livehls::config::{load_and_validate, parse_duration};
use livehls::errors::LivehlsError;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

const MINIMAL: &str = r#"
[output]
base_path = "/srv/live"

[control_plane]
base_url = "https://api.example.com"
cdn_base_url = "https://cdn.example.com"
"#;

#[test]
fn minimal_config_gets_defaults() {
    let file = write_config(MINIMAL);

    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.output.base_path, std::path::Path::new("/srv/live"));
    assert_eq!(cfg.segmenter.program, "ffmpeg");
    assert_eq!(cfg.segment_duration(), Duration::from_secs(2));
    assert_eq!(cfg.segmenter.max_segment_window, 6);
    assert!(cfg.segmenter.user_agent.starts_with("livehls/"));
    assert_eq!(cfg.retry.max_init_attempts, 80);
    assert_eq!(cfg.retry.init_interval, Duration::from_secs(3));
    assert_eq!(cfg.retry.max_process_attempts, 10);
    assert_eq!(cfg.retry.process_interval, Duration::from_secs(3));
    assert_eq!(cfg.retry.status_poll_default_delay, Duration::from_secs(10));
    assert_eq!(cfg.retry.http_timeout, Duration::from_secs(10));
}

#[test]
fn explicit_values_override_defaults() {
    let file = write_config(&format!(
        r#"{MINIMAL}
[segmenter]
program = "/opt/ffmpeg/bin/ffmpeg"
segment_duration = 4
max_segment_window = 10

[retry]
max_init_attempts = 5
init_interval = "500ms"
status_poll_default_delay = "1m"
"#
    ));

    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.segmenter.program, "/opt/ffmpeg/bin/ffmpeg");
    assert_eq!(cfg.segment_duration(), Duration::from_secs(4));
    assert_eq!(cfg.segmenter.max_segment_window, 10);
    assert_eq!(cfg.retry.max_init_attempts, 5);
    assert_eq!(cfg.retry.init_interval, Duration::from_millis(500));
    assert_eq!(cfg.retry.status_poll_default_delay, Duration::from_secs(60));
    assert_eq!(cfg.retry.process_interval, Duration::from_secs(3));
}

#[test]
fn zero_segment_duration_is_a_config_error() {
    let file = write_config(&format!("{MINIMAL}\n[segmenter]\nsegment_duration = 0\n"));

    match load_and_validate(file.path()) {
        Err(LivehlsError::ConfigError(msg)) => assert!(msg.contains("segment_duration")),
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn zero_retry_cap_is_a_config_error() {
    let file = write_config(&format!("{MINIMAL}\n[retry]\nmax_process_attempts = 0\n"));

    match load_and_validate(file.path()) {
        Err(LivehlsError::ConfigError(msg)) => assert!(msg.contains("max_process_attempts")),
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn non_http_control_plane_is_a_config_error() {
    let file = write_config(
        r#"
[output]
base_path = "/srv/live"

[control_plane]
base_url = "api.example.com"
cdn_base_url = "https://cdn.example.com"
"#,
    );

    match load_and_validate(file.path()) {
        Err(LivehlsError::ConfigError(msg)) => assert!(msg.contains("base_url")),
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn bad_duration_names_the_key() {
    let file = write_config(&format!("{MINIMAL}\n[retry]\ninit_interval = \"3 fortnights\"\n"));

    match load_and_validate(file.path()) {
        Err(LivehlsError::ConfigError(msg)) => {
            assert!(msg.contains("init_interval"));
            assert!(msg.contains("unsupported duration unit"));
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn missing_control_plane_is_a_toml_error() {
    let file = write_config("[output]\nbase_path = \"/srv/live\"\n");

    assert!(matches!(
        load_and_validate(file.path()),
        Err(LivehlsError::TomlError(_))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    assert!(matches!(
        load_and_validate("/definitely/not/here/livehls.toml"),
        Err(LivehlsError::IoError(_))
    ));
}

#[test]
fn durations_parse_with_units() {
    assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
    assert_eq!(parse_duration(" 3s "), Ok(Duration::from_secs(3)));
    assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
    assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    assert!(parse_duration("").is_err());
    assert!(parse_duration("10").is_err());
    assert!(parse_duration("s").is_err());
}

#[test]
fn oversized_duration_is_rejected_not_wrapped() {
    assert!(parse_duration("18446744073709551615s").is_ok());
    let err = parse_duration("18446744073709551615h").unwrap_err();
    assert!(err.contains("too large"), "error: {err}");
    assert!(parse_duration("307445734561825861m").is_err());
}

#[test]
fn oversized_retry_interval_is_a_config_error() {
    let file = write_config(&format!(
        "{MINIMAL}\n[retry]\nprocess_interval = \"18446744073709551615h\"\n"
    ));

    match load_and_validate(file.path()) {
        Err(LivehlsError::ConfigError(msg)) => {
            assert!(msg.contains("process_interval"));
            assert!(msg.contains("too large"));
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}
