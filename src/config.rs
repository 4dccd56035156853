use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 10_000;
pub const DEFAULT_DATABASE_PATH: &str = "database.db";
pub const DEFAULT_STATIC_DIR: &str = "static";
pub const DEFAULT_REPLY_TEXT: &str = "✅ รับข้อมูลแล้ว";
pub const DEFAULT_API_BASE: &str = "https://api.line.me";
pub const DEFAULT_DATA_API_BASE: &str = "https://api-data.line.me";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Images live in this subdirectory of `static_dir`.
pub const IMAGES_SUBDIR: &str = "images";

/// Runtime configuration, resolved once at startup and handed to the
/// gateway, platform client and media fetcher.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub channel_secret: String,
    pub channel_access_token: String,
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub static_dir: PathBuf,
    pub reply_text: String,
    pub api_base: String,
    pub data_api_base: String,
    pub fetch_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel_secret: String::new(),
            channel_access_token: String::new(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            reply_text: DEFAULT_REPLY_TEXT.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            data_api_base: DEFAULT_DATA_API_BASE.to_string(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }
}

// Secrets never reach logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("channel_secret", &mask(&self.channel_secret))
            .field("channel_access_token", &mask(&self.channel_access_token))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_path", &self.database_path)
            .field("static_dir", &self.static_dir)
            .field("reply_text", &self.reply_text)
            .field("api_base", &self.api_base)
            .field("data_api_base", &self.data_api_base)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .finish()
    }
}

fn mask(value: &str) -> &'static str {
    if value.is_empty() {
        "<unset>"
    } else {
        "***"
    }
}

impl Config {
    /// Defaults, then the optional TOML file, then the process environment.
    /// Fails when the LINE credentials are missing.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = Self::resolve(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Same resolution as [`Config::load`] without credential checks, for
    /// commands that only touch local storage.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get("CHANNEL_SECRET") {
            self.channel_secret = v;
        }
        if let Some(v) = get("CHANNEL_ACCESS_TOKEN") {
            self.channel_access_token = v;
        }
        if let Some(v) = get("LINELOG_HOST") {
            self.host = v;
        }
        if let Some(port) = get("LINELOG_PORT")
            .or_else(|| get("PORT"))
            .and_then(|v| v.parse::<u16>().ok())
        {
            self.port = port;
        }
        if let Some(v) = get("LINELOG_DATABASE") {
            self.database_path = PathBuf::from(v);
        }
        if let Some(v) = get("LINELOG_STATIC_DIR") {
            self.static_dir = PathBuf::from(v);
        }
        if let Some(v) = get("LINELOG_REPLY_TEXT") {
            self.reply_text = v;
        }
        if let Some(v) = get("LINELOG_API_BASE") {
            self.api_base = v;
        }
        if let Some(v) = get("LINELOG_DATA_API_BASE") {
            self.data_api_base = v;
        }
        if let Some(secs) = get("LINELOG_FETCH_TIMEOUT_SECS").and_then(|v| v.parse::<u64>().ok()) {
            self.fetch_timeout_secs = secs;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.channel_secret.trim().is_empty() {
            anyhow::bail!("CHANNEL_SECRET is not set");
        }
        if self.channel_access_token.trim().is_empty() {
            anyhow::bail!("CHANNEL_ACCESS_TOKEN is not set");
        }
        if self.fetch_timeout_secs == 0 {
            anyhow::bail!("fetch_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn images_dir(&self) -> PathBuf {
        self.static_dir.join(IMAGES_SUBDIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_match_reference_deployment() {
        let config = Config::default();
        assert_eq!(config.port, 10_000);
        assert_eq!(config.database_path, PathBuf::from("database.db"));
        assert_eq!(config.images_dir(), PathBuf::from("static").join("images"));
        assert_eq!(config.reply_text, DEFAULT_REPLY_TEXT);
    }

    #[test]
    fn env_overrides_credentials_and_paths() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[
            ("CHANNEL_SECRET", " secret "),
            ("CHANNEL_ACCESS_TOKEN", "token"),
            ("PORT", "8080"),
            ("LINELOG_DATABASE", "/tmp/records.db"),
        ]));

        assert_eq!(config.channel_secret, "secret");
        assert_eq!(config.channel_access_token, "token");
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_path, PathBuf::from("/tmp/records.db"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn linelog_port_wins_over_generic_port() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[("PORT", "8080"), ("LINELOG_PORT", "9090")]));
        assert_eq!(config.port, 9090);
    }

    #[test]
    fn blank_and_unparsable_env_values_are_ignored() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[("LINELOG_HOST", "   "), ("PORT", "not-a-port")]));
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn validate_requires_secret_and_token() {
        let mut config = Config::default();
        assert!(config.validate().is_err());

        config.channel_secret = "secret".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("CHANNEL_ACCESS_TOKEN"));
    }

    #[test]
    fn toml_file_fills_missing_fields_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linelog.toml");
        std::fs::write(
            &path,
            "channel_secret = \"s\"\nchannel_access_token = \"t\"\nport = 3000\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn debug_output_masks_secrets() {
        let config = Config {
            channel_secret: "super-secret".into(),
            channel_access_token: "super-token".into(),
            ..Config::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("super-token"));
        assert!(rendered.contains("***"));
    }
}
