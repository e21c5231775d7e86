//! # Admin Settings
//!
//! `AdminSettings` is the validated runtime configuration. It is produced by
//! [`SettingsBuilder`], either directly or from an [`AdminConfigFile`].
//!
//! # Config File Format
//!
//! ```toml
//! register_url = "http://register:9020"
//! admin_key = "<64 hex chars>"
//! admin_key_version = 1
//!
//! [transport]
//! connect_timeout_ms = 10000
//! write_timeout_ms = 5000
//! response_timeout_ms = 1000
//! idle_timeout_secs = 300
//! max_frame_len = 1048576
//! ```
//!
//! `GATEWAY_ADMIN_KEY`, `GATEWAY_ADMIN_KEY_VERSION` and
//! `GATEWAY_REGISTER_URL` override the file.

use crate::adapters::tcp::DEFAULT_MAX_FRAME_LEN;
use crate::domain::{AdminError, KeyMaterial};
use crate::protocol::ProtocolConfig;
use crate::registry::RegistryConfig;
use serde::Deserialize;
use shared_crypto::{Ed25519KeyPair, KeyVersion};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Environment variable holding the hex admin key.
pub const ENV_ADMIN_KEY: &str = "GATEWAY_ADMIN_KEY";
/// Environment variable holding the admin key version.
pub const ENV_ADMIN_KEY_VERSION: &str = "GATEWAY_ADMIN_KEY_VERSION";
/// Environment variable holding the register service URL.
pub const ENV_REGISTER_URL: &str = "GATEWAY_REGISTER_URL";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

// ============================================================================
// AdminSettings - validated runtime settings
// ============================================================================

/// Transport deadlines and limits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportSettings {
    /// Bound on establishing a connection.
    pub connect_timeout: Duration,
    /// Bound on writing a request.
    pub write_timeout: Duration,
    /// Bound on waiting for a response.
    pub response_timeout: Duration,
    /// Pooled connections idle longer are replaced. `None` disables.
    pub idle_timeout: Option<Duration>,
    /// Largest frame accepted from a gateway.
    pub max_frame_len: usize,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

/// Validated admin client settings.
#[derive(Clone, Debug)]
pub struct AdminSettings {
    admin_key: KeyMaterial,
    register_url: Option<String>,
    transport: TransportSettings,
}

impl AdminSettings {
    /// Start building settings.
    #[must_use]
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::new()
    }

    /// The operator's signing key.
    pub fn admin_key(&self) -> &KeyMaterial {
        &self.admin_key
    }

    /// Register service base URL, if registrations are persisted.
    pub fn register_url(&self) -> Option<&str> {
        self.register_url.as_deref()
    }

    /// Transport settings.
    pub fn transport(&self) -> &TransportSettings {
        &self.transport
    }

    /// Registry tuning derived from the transport settings.
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            connect_timeout: self.transport.connect_timeout,
            idle_timeout: self.transport.idle_timeout,
        }
    }

    /// Protocol deadlines derived from the transport settings.
    pub fn protocol_config(&self) -> ProtocolConfig {
        ProtocolConfig {
            write_timeout: self.transport.write_timeout,
            response_timeout: self.transport.response_timeout,
        }
    }
}

/// Builder for [`AdminSettings`].
#[derive(Debug, Default)]
pub struct SettingsBuilder {
    admin_key: Option<KeyMaterial>,
    register_url: Option<String>,
    transport: TransportSettings,
}

impl SettingsBuilder {
    /// Builder with default transport settings and no admin key.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sign requests with `key`.
    #[must_use]
    pub fn admin_key(mut self, key: KeyMaterial) -> Self {
        self.admin_key = Some(key);
        self
    }

    /// Persist registrations at `url`.
    #[must_use]
    pub fn register_url(mut self, url: impl Into<String>) -> Self {
        self.register_url = Some(url.into());
        self
    }

    /// Connect deadline.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.transport.connect_timeout = timeout;
        self
    }

    /// Write deadline.
    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.transport.write_timeout = timeout;
        self
    }

    /// Response deadline.
    #[must_use]
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.transport.response_timeout = timeout;
        self
    }

    /// Idle limit for pooled connections. `None` keeps them forever.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.transport.idle_timeout = timeout;
        self
    }

    /// Largest accepted frame.
    #[must_use]
    pub fn max_frame_len(mut self, len: usize) -> Self {
        self.transport.max_frame_len = len;
        self
    }

    /// Validate and produce settings.
    ///
    /// # Errors
    ///
    /// `Configuration` if the admin key is missing, a timeout or the frame
    /// limit is zero, or the register URL is not http(s).
    pub fn build(self) -> Result<AdminSettings, AdminError> {
        let admin_key = self
            .admin_key
            .ok_or_else(|| AdminError::Configuration("admin key is required".to_string()))?;

        let t = &self.transport;
        for (name, value) in [
            ("connect_timeout", t.connect_timeout),
            ("write_timeout", t.write_timeout),
            ("response_timeout", t.response_timeout),
        ] {
            if value.is_zero() {
                return Err(AdminError::Configuration(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }
        if t.max_frame_len == 0 {
            return Err(AdminError::Configuration(
                "max_frame_len must be greater than zero".to_string(),
            ));
        }

        let register_url = match self.register_url {
            Some(url) if url.trim().is_empty() => None,
            Some(url) => {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(AdminError::Configuration(format!(
                        "register_url must be an http(s) URL, got {:?}",
                        url
                    )));
                }
                Some(url)
            }
            None => None,
        };

        Ok(AdminSettings {
            admin_key,
            register_url,
            transport: self.transport,
        })
    }
}

// ============================================================================
// AdminConfigFile - on-disk form
// ============================================================================

/// TOML configuration file.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdminConfigFile {
    /// Register service base URL.
    pub register_url: Option<String>,
    /// Hex-encoded admin private key.
    pub admin_key: Option<String>,
    /// Admin key version (defaults to 1).
    pub admin_key_version: Option<u32>,
    /// Transport section.
    #[serde(default)]
    pub transport: TransportSection,
}

/// `[transport]` section. Missing values take the defaults.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportSection {
    /// Connect deadline in milliseconds.
    pub connect_timeout_ms: Option<u64>,
    /// Write deadline in milliseconds.
    pub write_timeout_ms: Option<u64>,
    /// Response deadline in milliseconds.
    pub response_timeout_ms: Option<u64>,
    /// Idle limit in seconds; 0 disables.
    pub idle_timeout_secs: Option<u64>,
    /// Largest accepted frame in bytes.
    pub max_frame_len: Option<usize>,
}

impl AdminConfigFile {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// `Configuration` if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AdminError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            AdminError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, AdminError> {
        toml::from_str(content).map_err(|e| AdminError::Configuration(e.to_string()))
    }

    /// Apply `GATEWAY_*` environment overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, AdminError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, AdminError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_ADMIN_KEY) {
            self.admin_key = Some(key);
        }
        if let Some(raw) = lookup(ENV_ADMIN_KEY_VERSION) {
            let version = raw.trim().parse::<u32>().map_err(|_| {
                AdminError::Configuration(format!(
                    "{} is not a number: {:?}",
                    ENV_ADMIN_KEY_VERSION, raw
                ))
            })?;
            self.admin_key_version = Some(version);
        }
        if let Some(url) = lookup(ENV_REGISTER_URL) {
            self.register_url = Some(url);
        }
        Ok(self)
    }

    /// Validate into runtime settings.
    ///
    /// # Errors
    ///
    /// `Configuration` for a malformed key or version, or anything
    /// [`SettingsBuilder::build`] rejects.
    pub fn into_settings(self) -> Result<AdminSettings, AdminError> {
        let mut builder = SettingsBuilder::new();

        if let Some(encoded) = self.admin_key.as_deref() {
            let key_pair = Ed25519KeyPair::decode_private_key(encoded)
                .map_err(|e| AdminError::Configuration(format!("admin_key: {}", e)))?;
            let version = KeyVersion::decode(
                self.admin_key_version.unwrap_or(KeyVersion::INITIAL.encode()),
            )
            .map_err(|e| AdminError::Configuration(format!("admin_key_version: {}", e)))?;
            builder = builder.admin_key(KeyMaterial::new(key_pair, version));
        }
        if let Some(url) = self.register_url {
            builder = builder.register_url(url);
        }

        let t = self.transport;
        if let Some(ms) = t.connect_timeout_ms {
            builder = builder.connect_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = t.write_timeout_ms {
            builder = builder.write_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = t.response_timeout_ms {
            builder = builder.response_timeout(Duration::from_millis(ms));
        }
        if let Some(secs) = t.idle_timeout_secs {
            builder = builder.idle_timeout((secs > 0).then(|| Duration::from_secs(secs)));
        }
        if let Some(len) = t.max_frame_len {
            builder = builder.max_frame_len(len);
        }

        builder.build()
    }
}
