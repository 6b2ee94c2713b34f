//! Integration tests for configuration loading

use lot_hub::infra::Config;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

#[test]
fn test_load_config_from_file() {
    let temp_file = write_config(
        r#"
[site]
carpark_code = "KLCC-B2"

[camera]
bind_ip = "192.168.1.20"
port = 8899

[central]
host = "central.example.com"
port = 8443
username = "hub"
password = "secret"
connect_timeout_secs = 15
io_timeout_secs = 5

[timers]
filter_snapshot_secs = 3
device_status_secs = 120
heartbeat_secs = 45

[runtime]
worker_threads = 2

[device]
ip = "192.168.1.21"

[logging]
dir = "/tmp/lot-hub-logs"
"#,
    );

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.carpark_code(), "KLCC-B2");
    assert_eq!(config.camera_bind_ip(), "192.168.1.20");
    assert_eq!(config.camera_port(), 8899);
    assert_eq!(config.central_host(), "central.example.com");
    assert_eq!(config.central_port(), 8443);
    assert_eq!(config.credentials().username, "hub");
    assert_eq!(config.credentials().password, "secret");
    assert_eq!(config.connect_timeout(), Duration::from_secs(15));
    assert_eq!(config.io_timeout(), Duration::from_secs(5));
    assert_eq!(config.filter_snapshot_interval(), Duration::from_secs(3));
    assert_eq!(config.device_status_interval(), Duration::from_secs(120));
    assert_eq!(config.heartbeat_interval(), Duration::from_secs(45));
    assert_eq!(config.worker_threads(), 2);
    assert_eq!(config.device_ip(), Some("192.168.1.21"));
    assert_eq!(config.log_dir(), Some("/tmp/lot-hub-logs"));
    assert_eq!(config.config_file(), temp_file.path().display().to_string());
}

#[test]
fn test_optional_sections_use_defaults() {
    let temp_file = write_config(
        r#"
[site]
carpark_code = "CP01"

[camera]
bind_ip = "0.0.0.0"

[central]
host = "10.0.0.1"
port = 8080

[timers]
filter_snapshot_secs = 5
device_status_secs = 60
heartbeat_secs = 30
"#,
    );

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.camera_port(), 9999);
    assert_eq!(config.credentials().username, "testuser");
    assert_eq!(config.credentials().password, "testpassword");
    assert_eq!(config.connect_timeout(), Duration::from_secs(30));
    assert_eq!(config.io_timeout(), Duration::from_secs(10));
    assert_eq!(config.worker_threads(), 6);
    assert_eq!(config.device_ip(), None);
    assert_eq!(config.log_dir(), None);
}

#[test]
fn test_missing_required_key_is_error() {
    // No [timers] section
    let temp_file = write_config(
        r#"
[site]
carpark_code = "CP01"

[camera]
bind_ip = "0.0.0.0"

[central]
host = "10.0.0.1"
port = 8080
"#,
    );

    let err = Config::from_file(temp_file.path()).unwrap_err();
    assert!(format!("{err:#}").contains("Failed to parse config file"));
}

#[test]
fn test_zero_interval_is_error() {
    let temp_file = write_config(
        r#"
[site]
carpark_code = "CP01"

[camera]
bind_ip = "0.0.0.0"

[central]
host = "10.0.0.1"
port = 8080

[timers]
filter_snapshot_secs = 5
device_status_secs = 0
heartbeat_secs = 30
"#,
    );

    let err = Config::from_file(temp_file.path()).unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("Invalid config file"));
    assert!(message.contains("timers.device_status_secs"));
}

#[test]
fn test_missing_file_is_error() {
    let err = Config::from_file("/nonexistent/config.toml").unwrap_err();
    assert!(format!("{err:#}").contains("Failed to read config file"));
}

#[test]
fn test_dev_config_is_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/dev.toml");
    let config = Config::from_file(path).unwrap();
    assert_eq!(config.carpark_code(), "CP01");
    assert_eq!(config.central_port(), 8080);
}
