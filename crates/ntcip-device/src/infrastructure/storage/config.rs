//! TOML configuration for the device.
//!
//! The file is read from the path given on the command line, or from the
//! platform-appropriate config directory:
//! - Windows:  `%APPDATA%\NtcipDevice\device.toml`
//! - Linux:    `~/.config/ntcip-device/device.toml`
//! - macOS:    `~/Library/Application Support/NtcipDevice/device.toml`
//!
//! ```toml
//! [device]
//! address = 1
//!
//! [network]
//! bind_address = "0.0.0.0"
//! port = 5000
//!
//! [security]
//! allowed_centers = ["192.168.1.10"]
//! allow_any = false
//!
//! [session]
//! ack_timeout_ms = 5000
//! assembly_gap_ms = 200
//! ```
//!
//! Every field has a serde default, so a missing file or a file with only
//! some sections still yields a complete configuration.  The values are
//! read once at startup and never change while the device runs.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use ntcip_core::session::AddressCheck;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// An address field does not parse.
    #[error("invalid {field}: {value:?}")]
    InvalidAddress { field: &'static str, value: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level device configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceConfig {
    #[serde(default)]
    pub device: DeviceSection,
    #[serde(default)]
    pub network: NetworkSection,
    #[serde(default)]
    pub security: SecuritySection,
    #[serde(default)]
    pub session: SessionSection,
}

/// Identity of this device on the link.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceSection {
    /// The address this device answers to.
    #[serde(default = "default_device_address")]
    pub address: u16,
    /// Answer Data frames for any address except the invalid sentinel.
    #[serde(default)]
    pub accept_any_address: bool,
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Listening socket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkSection {
    /// IP address to bind.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Which control centers may connect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecuritySection {
    /// IP addresses of control centers allowed to connect.
    #[serde(default = "default_allowed_centers")]
    pub allowed_centers: Vec<String>,
    /// Test mode: accept connections from any address.
    #[serde(default)]
    pub allow_any: bool,
}

/// Protocol timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSection {
    /// How long to wait for the center's final Ack, in milliseconds.
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,
    /// How long a partial frame may stall before it is Nak'ed, in milliseconds.
    #[serde(default = "default_assembly_gap_ms")]
    pub assembly_gap_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_device_address() -> u16 {
    1
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5000
}
fn default_allowed_centers() -> Vec<String> {
    vec!["127.0.0.1".to_string()]
}
fn default_ack_timeout_ms() -> u64 {
    5000
}
fn default_assembly_gap_ms() -> u64 {
    200
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            address: default_device_address(),
            accept_any_address: false,
            log_level: default_log_level(),
        }
    }
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            allowed_centers: default_allowed_centers(),
            allow_any: false,
        }
    }
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            ack_timeout_ms: default_ack_timeout_ms(),
            assembly_gap_ms: default_assembly_gap_ms(),
        }
    }
}

// ── Resolved values ───────────────────────────────────────────────────────────

impl DeviceConfig {
    /// The socket address to listen on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] if `bind_address` is not an IP.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = parse_ip("network.bind_address", &self.network.bind_address)?;
        Ok(SocketAddr::new(ip, self.network.port))
    }

    /// The parsed control-center allow-list.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] for the first entry that is
    /// not an IP address.
    pub fn allowed_centers(&self) -> Result<Vec<IpAddr>, ConfigError> {
        self.security
            .allowed_centers
            .iter()
            .map(|s| parse_ip("security.allowed_centers", s))
            .collect()
    }

    /// Which Data frame addresses sessions answer.
    pub fn address_check(&self) -> AddressCheck {
        if self.device.accept_any_address {
            AddressCheck::Any
        } else {
            AddressCheck::Device(self.device.address)
        }
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.session.ack_timeout_ms)
    }

    pub fn assembly_gap(&self) -> Duration {
        Duration::from_millis(self.session.assembly_gap_ms)
    }
}

fn parse_ip(field: &'static str, value: &str) -> Result<IpAddr, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("device.toml"))
}

/// Loads the config from `path`, or from the platform default when `None`.
/// A file that does not exist yields `DeviceConfig::default()`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: Option<&Path>) -> Result<DeviceConfig, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };

    match std::fs::read_to_string(&path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(DeviceConfig::default()),
        Err(e) => Err(ConfigError::Io { path, source: e }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(config: &DeviceConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("NtcipDevice"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("ntcip-device"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("NtcipDevice")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("ntcip-device-{}", uuid::Uuid::new_v4()))
            .join("device.toml")
    }

    #[test]
    fn test_default_config_listens_on_port_5000() {
        // Arrange / Act
        let cfg = DeviceConfig::default();

        // Assert
        assert_eq!(cfg.bind_addr().unwrap(), "0.0.0.0:5000".parse().unwrap());
    }

    #[test]
    fn test_default_session_timing() {
        let cfg = DeviceConfig::default();
        assert_eq!(cfg.ack_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.assembly_gap(), Duration::from_millis(200));
    }

    #[test]
    fn test_default_security_allows_only_loopback() {
        let cfg = DeviceConfig::default();
        assert!(!cfg.security.allow_any);
        assert_eq!(
            cfg.allowed_centers().unwrap(),
            vec!["127.0.0.1".parse::<IpAddr>().unwrap()]
        );
    }

    #[test]
    fn test_address_check_follows_device_section() {
        let mut cfg = DeviceConfig::default();
        assert_eq!(cfg.address_check(), AddressCheck::Device(1));

        cfg.device.accept_any_address = true;
        assert_eq!(cfg.address_check(), AddressCheck::Any);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        // Arrange
        let text = r#"
            [network]
            port = 6000

            [security]
            allowed_centers = ["10.0.0.5", "10.0.0.6"]
        "#;

        // Act
        let cfg: DeviceConfig = toml::from_str(text).unwrap();

        // Assert
        assert_eq!(cfg.network.port, 6000);
        assert_eq!(cfg.network.bind_address, "0.0.0.0");
        assert_eq!(cfg.allowed_centers().unwrap().len(), 2);
        assert_eq!(cfg.session, SessionSection::default());
        assert_eq!(cfg.device.address, 1);
    }

    #[test]
    fn test_invalid_allow_list_entry_is_reported() {
        let mut cfg = DeviceConfig::default();
        cfg.security.allowed_centers.push("not-an-ip".to_string());

        let err = cfg.allowed_centers().unwrap_err();

        assert!(matches!(
            err,
            ConfigError::InvalidAddress { field: "security.allowed_centers", .. }
        ));
    }

    #[test]
    fn test_malformed_toml_is_a_parse_error() {
        let result: Result<DeviceConfig, _> = toml::from_str("[network\nport = ");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let cfg = load_config(Some(&temp_path())).unwrap();
        assert_eq!(cfg, DeviceConfig::default());
    }

    #[test]
    fn test_save_then_load_preserves_values() {
        // Arrange
        let path = temp_path();
        let mut cfg = DeviceConfig::default();
        cfg.device.address = 42;
        cfg.security.allow_any = true;
        cfg.session.ack_timeout_ms = 750;

        // Act
        save_config(&cfg, &path).unwrap();
        let loaded = load_config(Some(&path)).unwrap();

        // Assert
        assert_eq!(loaded, cfg);
        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}
