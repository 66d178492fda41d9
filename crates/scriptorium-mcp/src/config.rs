//! Transport configuration.
//!
//! Loaded from `$XDG_CONFIG_HOME/scriptorium/config.ron` when present, then
//! overridden by the environment and finally by CLI flags:
//!
//! ```ron
//! (
//!     mode: "http",
//!     http: (
//!         url: "https://localhost:5000",
//!         mcp_path: "/mcp",
//!         api_key: "change-me",
//!         idle_timeout_secs: 1800,
//!         certificate: Some((
//!             path: "/etc/scriptorium/cert.pem",
//!             key_path: Some("/etc/scriptorium/key.pem"),
//!             password: None,
//!         )),
//!     ),
//! )
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

/// Environment variable that supplies the HTTP API key.
pub const API_KEY_ENV: &str = "SCRIPTORIUM_API_KEY";

pub const DEFAULT_URL: &str = "https://localhost:5000";
pub const DEFAULT_MCP_PATH: &str = "/mcp";
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 30 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Which listener to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TransportMode {
    #[default]
    Stdio,
    Http,
}

impl FromStr for TransportMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Self::Stdio),
            "http" => Ok(Self::Http),
            other => Err(ConfigError::Invalid(format!("unknown transport mode '{other}'"))),
        }
    }
}

impl TransportMode {
    /// Parse a mode, falling back to stdio with a warning on unknown values.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_else(|e| {
            tracing::warn!("{e}, defaulting to stdio");
            Self::Stdio
        })
    }
}

impl<'de> Deserialize<'de> for TransportMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse_lenient(&raw))
    }
}

/// Certificate for the HTTPS listener. PEM encoded.
#[derive(Clone, Deserialize, Serialize)]
pub struct CertificateConfig {
    /// Certificate chain.
    pub path: PathBuf,
    /// Private key. Defaults to `path` when the key is bundled with the chain.
    #[serde(default)]
    pub key_path: Option<PathBuf>,
    /// Passphrase for an encrypted PKCS#8 key.
    #[serde(default)]
    pub password: Option<String>,
}

impl std::fmt::Debug for CertificateConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateConfig")
            .field("path", &self.path)
            .field("key_path", &self.key_path)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl CertificateConfig {
    pub fn key_path(&self) -> &Path {
        self.key_path.as_deref().unwrap_or(&self.path)
    }
}

#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// `http://` or `https://` URL whose host and port select the bind address.
    pub url: String,
    /// The single path the MCP endpoint is served on.
    pub mcp_path: String,
    /// Bearer credential. Empty disables authentication.
    pub api_key: String,
    /// Sessions idle longer than this are dropped.
    pub idle_timeout_secs: u64,
    pub certificate: Option<CertificateConfig>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            mcp_path: DEFAULT_MCP_PATH.to_string(),
            api_key: String::new(),
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            certificate: None,
        }
    }
}

impl std::fmt::Debug for HttpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpConfig")
            .field("url", &self.url)
            .field("mcp_path", &self.mcp_path)
            .field("api_key", &if self.api_key.is_empty() { "<empty>" } else { "<redacted>" })
            .field("idle_timeout_secs", &self.idle_timeout_secs)
            .field("certificate", &self.certificate)
            .finish()
    }
}

impl HttpConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// The MCP path with a leading slash and no trailing slash (except `/`).
    pub fn normalized_path(&self) -> String {
        let trimmed = self.mcp_path.trim().trim_matches('/');
        format!("/{trimmed}")
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    pub mode: TransportMode,
    pub http: HttpConfig,
}

/// Overrides supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub mode: Option<String>,
    pub url: Option<String>,
    pub mcp_path: Option<String>,
}

impl TransportConfig {
    /// `$XDG_CONFIG_HOME/scriptorium/config.ron`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("scriptorium").join("config.ron"))
    }

    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                tracing::debug!(path = %path.display(), "Loaded config");
                Self::from_ron(&text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Apply environment overrides through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var(API_KEY_ENV) {
            self.http.api_key = key;
        }
    }

    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(mode) = overrides.mode {
            self.mode = TransportMode::parse_lenient(&mode);
        }
        if let Some(url) = overrides.url {
            self.http.url = url;
        }
        if let Some(path) = overrides.mcp_path {
            self.http.mcp_path = path;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransportConfig::default();
        assert_eq!(config.mode, TransportMode::Stdio);
        assert_eq!(config.http.url, "https://localhost:5000");
        assert_eq!(config.http.mcp_path, "/mcp");
        assert!(config.http.api_key.is_empty());
        assert_eq!(config.http.idle_timeout(), Duration::from_secs(1800));
        assert!(config.http.certificate.is_none());
    }

    #[test]
    fn test_mode_is_case_insensitive() {
        assert_eq!("HTTP".parse::<TransportMode>().unwrap(), TransportMode::Http);
        assert_eq!(" Stdio ".parse::<TransportMode>().unwrap(), TransportMode::Stdio);
        assert!("websocket".parse::<TransportMode>().is_err());
        assert_eq!(TransportMode::parse_lenient("websocket"), TransportMode::Stdio);
    }

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config = TransportConfig::from_ron(
            r#"(
                mode: "Http",
                http: (
                    url: "http://127.0.0.1:8080",
                    certificate: Some((path: "/tmp/cert.pem")),
                ),
            )"#,
        )
        .unwrap();
        assert_eq!(config.mode, TransportMode::Http);
        assert_eq!(config.http.url, "http://127.0.0.1:8080");
        assert_eq!(config.http.mcp_path, "/mcp");
        let cert = config.http.certificate.unwrap();
        assert_eq!(cert.key_path(), Path::new("/tmp/cert.pem"));
        assert!(cert.password.is_none());
    }

    #[test]
    fn test_unknown_mode_in_file_falls_back() {
        let config = TransportConfig::from_ron(r#"(mode: "carrier-pigeon")"#).unwrap();
        assert_eq!(config.mode, TransportMode::Stdio);
    }

    #[test]
    fn test_bad_ron_is_error() {
        assert!(matches!(
            TransportConfig::from_ron("(mode: "),
            Err(ConfigError::Ron(_))
        ));
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = TransportConfig::load(&dir.path().join("absent.ron")).unwrap();
        assert_eq!(config.mode, TransportMode::Stdio);
    }

    #[test]
    fn test_env_then_cli_overrides() {
        let mut config = TransportConfig::default();
        config.apply_env(|key| (key == API_KEY_ENV).then(|| "from-env".to_string()));
        config.apply_overrides(Overrides {
            mode: Some("http".into()),
            url: Some("http://localhost:9000".into()),
            mcp_path: None,
        });
        assert_eq!(config.http.api_key, "from-env");
        assert_eq!(config.mode, TransportMode::Http);
        assert_eq!(config.http.url, "http://localhost:9000");
        assert_eq!(config.http.mcp_path, "/mcp");
    }

    #[test]
    fn test_normalized_path() {
        let mut http = HttpConfig::default();
        assert_eq!(http.normalized_path(), "/mcp");
        http.mcp_path = "editor/".into();
        assert_eq!(http.normalized_path(), "/editor");
        http.mcp_path = "/".into();
        assert_eq!(http.normalized_path(), "/");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut config = TransportConfig::default();
        config.http.api_key = "topsecret".into();
        config.http.certificate = Some(CertificateConfig {
            path: "/c.pem".into(),
            key_path: None,
            password: Some("hunter2".into()),
        });
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("topsecret"));
        assert!(!rendered.contains("hunter2"));
    }
}
