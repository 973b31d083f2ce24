use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;
use url::Url;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
    #[serde(default)]
    pub liveness: LivenessConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConnectionConfig {
    #[serde(default = "default_uri")]
    pub uri: String,
    /// Access token appended to the URI as a query parameter
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AccessConfig {
    #[serde(default)]
    pub private_ids: HashSet<i64>,
    #[serde(default)]
    pub group_ids: HashSet<i64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MaintenanceConfig {
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
    #[serde(default = "default_maintenance_interval_secs")]
    pub interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LivenessConfig {
    #[serde(default = "default_liveness_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_probe_url")]
    pub probe_url: String,
    #[serde(default = "default_expected_status")]
    pub expected_status: u16,
    /// Status code sent with `set_online_status` (10 = online)
    #[serde(default = "default_online_status")]
    pub online_status: u32,
}

fn default_uri() -> String {
    "ws://napcat:3001/".to_string()
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("./tmp")
}

fn default_maintenance_interval_secs() -> u64 {
    6 * 60 * 60
}

fn default_liveness_interval_secs() -> u64 {
    15 * 60
}

fn default_probe_url() -> String {
    "http://connectivitycheck.gstatic.com/generate_204".to_string()
}

fn default_expected_status() -> u16 {
    204
}

fn default_online_status() -> u32 {
    10
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            token: None,
            reconnect_delay_secs: default_reconnect_delay_secs(),
        }
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
            interval_secs: default_maintenance_interval_secs(),
        }
    }
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_liveness_interval_secs(),
            probe_url: default_probe_url(),
            expected_status: default_expected_status(),
            online_status: default_online_status(),
        }
    }
}

impl ConnectionConfig {
    /// The URI to dial, with the access token attached when one is configured.
    pub fn connect_url(&self) -> Result<Url> {
        let mut url = parse_ws_uri(&self.uri)?;
        if let Some(token) = self.token.as_deref().filter(|t| !t.is_empty()) {
            url.query_pairs_mut().append_pair("access_token", token);
        }
        Ok(url)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

impl MaintenanceConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl LivenessConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Config {
    /// Load the config file, or fall back to defaults when it does not exist.
    ///
    /// Defaults carry empty whitelists, so a bot started without a config
    /// connects but never answers anyone.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                "Config file {} not found, using defaults (no sender is whitelisted)",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        if !config.maintenance.temp_dir.exists() {
            std::fs::create_dir_all(&config.maintenance.temp_dir).with_context(|| {
                format!(
                    "Failed to create temp directory: {}",
                    config.maintenance.temp_dir.display()
                )
            })?;
        }

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        parse_ws_uri(&self.connection.uri)?;
        if self.connection.reconnect_delay_secs == 0 {
            bail!("connection.reconnect_delay_secs must be greater than zero");
        }
        if self.maintenance.interval_secs == 0 {
            bail!("maintenance.interval_secs must be greater than zero");
        }
        if self.liveness.interval_secs == 0 {
            bail!("liveness.interval_secs must be greater than zero");
        }
        Ok(())
    }
}

fn parse_ws_uri(uri: &str) -> Result<Url> {
    let url = Url::parse(uri).with_context(|| format!("Invalid connection.uri '{}'", uri))?;
    if !matches!(url.scheme(), "ws" | "wss") {
        bail!("connection.uri must be a ws:// or wss:// URI, got '{}'", uri);
    }
    if url.host().is_none() {
        bail!("connection.uri has no host: '{}'", uri);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.connection.uri, "ws://napcat:3001/");
        assert!(config.connection.token.is_none());
        assert!(config.access.private_ids.is_empty());
        assert!(config.access.group_ids.is_empty());
        assert_eq!(config.maintenance.interval(), Duration::from_secs(21600));
        assert_eq!(config.liveness.interval(), Duration::from_secs(900));
        assert_eq!(config.liveness.expected_status, 204);
    }

    #[test]
    fn test_full_config() {
        let config = Config::parse(
            r#"
            [connection]
            uri = "ws://127.0.0.1:3001"
            token = "secret"
            reconnect_delay_secs = 2

            [access]
            private_ids = [10001, 10002]
            group_ids = [20001]

            [maintenance]
            temp_dir = "/var/tmp/napbot"
            interval_secs = 60
            "#,
        )
        .unwrap();

        assert!(config.access.private_ids.contains(&10002));
        assert!(config.access.group_ids.contains(&20001));
        assert_eq!(config.connection.reconnect_delay(), Duration::from_secs(2));
        assert_eq!(
            config.maintenance.temp_dir,
            PathBuf::from("/var/tmp/napbot")
        );
        assert_eq!(config.liveness.online_status, 10);
    }

    #[test]
    fn test_connect_url_with_token() {
        let connection = ConnectionConfig {
            uri: "ws://napcat:3001/".to_string(),
            token: Some("abc".to_string()),
            ..Default::default()
        };
        assert_eq!(
            connection.connect_url().unwrap().as_str(),
            "ws://napcat:3001/?access_token=abc"
        );
    }

    #[test]
    fn test_connect_url_encodes_token() {
        let connection = ConnectionConfig {
            token: Some("a&b#c d".to_string()),
            ..Default::default()
        };
        let url = connection.connect_url().unwrap();
        assert_eq!(url.fragment(), None);
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![("access_token".to_string(), "a&b#c d".to_string())]
        );
    }

    #[test]
    fn test_connect_url_without_token() {
        let connection = ConnectionConfig::default();
        assert_eq!(connection.connect_url().unwrap().as_str(), "ws://napcat:3001/");

        let empty = ConnectionConfig {
            token: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(empty.connect_url().unwrap().as_str(), "ws://napcat:3001/");
    }

    #[test]
    fn test_rejects_non_websocket_uri() {
        let err = Config::parse("[connection]\nuri = \"http://napcat:3001\"").unwrap_err();
        assert!(format!("{:#}", err).contains("ws://"));
    }

    #[test]
    fn test_rejects_uri_without_host() {
        assert!(Config::parse("[connection]\nuri = \"ws://\"").is_err());
        assert!(Config::parse("[connection]\nuri = \"napcat:3001\"").is_err());
    }

    #[test]
    fn test_rejects_zero_reconnect_delay() {
        let err = Config::parse("[connection]\nreconnect_delay_secs = 0").unwrap_err();
        assert!(format!("{:#}", err).contains("reconnect_delay_secs"));
    }

    #[test]
    fn test_rejects_zero_interval() {
        assert!(Config::parse("[maintenance]\ninterval_secs = 0").is_err());
        assert!(Config::parse("[liveness]\ninterval_secs = 0").is_err());
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        assert!(Config::parse("[access]\nprivate_ids = \"nope\"").is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = Config::load(Path::new("/definitely/not/here/config.toml")).unwrap();
        assert!(config.access.private_ids.is_empty());
        assert_eq!(config.connection.uri, "ws://napcat:3001/");
    }
}
