//! Configuration loading from TOML files
//!
//! Config file is selected via `--config <path>` (default: config/dev.toml).
//! Unlike optional tuning knobs, the carpark code, camera bind address,
//! central address and the three timer intervals are required; a missing or
//! invalid value is a startup error.

use crate::domain::payload::Credentials;
use anyhow::{bail, Context};
use serde::Deserialize;
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Parking lot location code sent as `carpark_code`
    pub carpark_code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    /// Local address the camera-facing HTTP endpoint binds to
    pub bind_ip: String,
    #[serde(default = "default_camera_port")]
    pub port: u16,
}

fn default_camera_port() -> u16 {
    9999
}

#[derive(Debug, Clone, Deserialize)]
pub struct CentralConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Per write/read/shutdown step
    #[serde(default = "default_io_timeout_secs")]
    pub io_timeout_secs: u64,
}

fn default_username() -> String {
    "testuser".to_string()
}

fn default_password() -> String {
    "testpassword".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_io_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimersConfig {
    /// Debounce window for park-in/park-out snapshots
    pub filter_snapshot_secs: u64,
    /// Period of the device-status push to central
    pub device_status_secs: u64,
    /// Period of the central heartbeat
    pub heartbeat_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { worker_threads: default_worker_threads() }
    }
}

fn default_worker_threads() -> usize {
    6
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DeviceConfig {
    /// IP reported as `device_ip`; discovered from the routing table if unset
    #[serde(default)]
    pub ip: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Directory for the daily rolling log file (stdout only if unset)
    #[serde(default)]
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    pub site: SiteConfig,
    pub camera: CameraConfig,
    pub central: CentralConfig,
    pub timers: TimersConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    carpark_code: String,
    camera_bind_ip: String,
    camera_port: u16,
    central_host: String,
    central_port: u16,
    credentials: Credentials,
    connect_timeout_secs: u64,
    io_timeout_secs: u64,
    filter_snapshot_secs: u64,
    device_status_secs: u64,
    heartbeat_secs: u64,
    worker_threads: usize,
    device_ip: Option<String>,
    log_dir: Option<String>,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            carpark_code: "CP01".to_string(),
            camera_bind_ip: "127.0.0.1".to_string(),
            camera_port: 9999,
            central_host: "127.0.0.1".to_string(),
            central_port: 8080,
            credentials: Credentials::default(),
            connect_timeout_secs: 30,
            io_timeout_secs: 10,
            filter_snapshot_secs: 5,
            device_status_secs: 60,
            heartbeat_secs: 30,
            worker_threads: 6,
            device_ip: None,
            log_dir: None,
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        let config = Self {
            carpark_code: toml_config.site.carpark_code,
            camera_bind_ip: toml_config.camera.bind_ip,
            camera_port: toml_config.camera.port,
            central_host: toml_config.central.host,
            central_port: toml_config.central.port,
            credentials: Credentials {
                username: toml_config.central.username,
                password: toml_config.central.password,
            },
            connect_timeout_secs: toml_config.central.connect_timeout_secs,
            io_timeout_secs: toml_config.central.io_timeout_secs,
            filter_snapshot_secs: toml_config.timers.filter_snapshot_secs,
            device_status_secs: toml_config.timers.device_status_secs,
            heartbeat_secs: toml_config.timers.heartbeat_secs,
            worker_threads: toml_config.runtime.worker_threads,
            device_ip: toml_config.device.ip,
            log_dir: toml_config.logging.dir,
            config_file: path.display().to_string(),
        };

        config
            .validate()
            .with_context(|| format!("Invalid config file {}", path.display()))?;

        Ok(config)
    }

    /// Reject values the hub cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.carpark_code.trim().is_empty() {
            bail!("site.carpark_code must not be empty");
        }
        if self.camera_bind_ip.parse::<IpAddr>().is_err() {
            bail!("camera.bind_ip '{}' is not an IP address", self.camera_bind_ip);
        }
        if self.central_host.trim().is_empty() {
            bail!("central.host must not be empty");
        }
        if self.central_port == 0 {
            bail!("central.port must not be 0");
        }
        for (name, secs) in [
            ("timers.filter_snapshot_secs", self.filter_snapshot_secs),
            ("timers.device_status_secs", self.device_status_secs),
            ("timers.heartbeat_secs", self.heartbeat_secs),
            ("central.connect_timeout_secs", self.connect_timeout_secs),
            ("central.io_timeout_secs", self.io_timeout_secs),
        ] {
            if secs == 0 {
                bail!("{} must be greater than 0", name);
            }
        }
        if self.worker_threads == 0 {
            bail!("runtime.worker_threads must be greater than 0");
        }
        Ok(())
    }

    pub fn carpark_code(&self) -> &str {
        &self.carpark_code
    }

    pub fn camera_bind_ip(&self) -> &str {
        &self.camera_bind_ip
    }

    pub fn camera_port(&self) -> u16 {
        self.camera_port
    }

    pub fn central_host(&self) -> &str {
        &self.central_host
    }

    pub fn central_port(&self) -> u16 {
        self.central_port
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }

    pub fn filter_snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.filter_snapshot_secs)
    }

    pub fn device_status_interval(&self) -> Duration {
        Duration::from_secs(self.device_status_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn device_ip(&self) -> Option<&str> {
        self.device_ip.as_deref()
    }

    pub fn log_dir(&self) -> Option<&str> {
        self.log_dir.as_deref()
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method to point the hub at a specific central server
    pub fn with_central(mut self, host: &str, port: u16) -> Self {
        self.central_host = host.to_string();
        self.central_port = port;
        self
    }

    /// Builder method to override the central timeouts
    pub fn with_central_timeouts(mut self, connect_secs: u64, io_secs: u64) -> Self {
        self.connect_timeout_secs = connect_secs;
        self.io_timeout_secs = io_secs;
        self
    }

    pub fn with_carpark_code(mut self, code: &str) -> Self {
        self.carpark_code = code.to_string();
        self
    }

    pub fn with_device_ip(mut self, ip: &str) -> Self {
        self.device_ip = Some(ip.to_string());
        self
    }

    /// Builder method to set the filter, device-status and heartbeat intervals
    pub fn with_timers(mut self, filter_secs: u64, device_status_secs: u64, heartbeat_secs: u64) -> Self {
        self.filter_snapshot_secs = filter_secs;
        self.device_status_secs = device_status_secs;
        self.heartbeat_secs = heartbeat_secs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.carpark_code(), "CP01");
        assert_eq!(config.camera_port(), 9999);
        assert_eq!(config.worker_threads(), 6);
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
        assert_eq!(config.io_timeout(), Duration::from_secs(10));
        assert_eq!(config.credentials().username, "testuser");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = Config::default().with_timers(0, 60, 30);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("filter_snapshot_secs"));
    }

    #[test]
    fn test_validate_rejects_empty_carpark_code() {
        let config = Config::default().with_carpark_code("  ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_bind_ip() {
        let mut config = Config::default();
        config.camera_bind_ip = "camera.local".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builders() {
        let config = Config::default()
            .with_central("10.1.1.1", 8443)
            .with_device_ip("10.0.0.5")
            .with_timers(1, 2, 3);
        assert_eq!(config.central_host(), "10.1.1.1");
        assert_eq!(config.central_port(), 8443);
        assert_eq!(config.device_ip(), Some("10.0.0.5"));
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(3));
    }
}
