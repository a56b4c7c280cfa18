//! Client configuration and the persisted session.
//!
//! Settings come from, highest first: command-line flags, environment,
//! `<data dir>/config.toml`, built-in defaults. The data directory also
//! holds the session cookie and the TUI log.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_API_URL: &str = "http://localhost:5211";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const API_URL_ENV: &str = "TASKDECK_API_URL";

const CONFIG_FILE: &str = "config.toml";
const SESSION_FILE: &str = "session";
const LOG_FILE: &str = "taskdeck.log";

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Effective settings after every source has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub api_url: String,
    pub timeout: Duration,
}

/// `$HOME/.taskdeck`, or `./.taskdeck` when `HOME` is unset.
pub fn default_data_dir() -> PathBuf {
    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".taskdeck")
}

pub fn load_file_config(data_dir: &Path) -> Result<FileConfig> {
    let path = data_dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str::<FileConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

fn resolve_api_url(flag: Option<String>, env_value: Option<String>, file: Option<String>) -> String {
    [flag, env_value, file]
        .into_iter()
        .flatten()
        .map(|url| url.trim().to_string())
        .find(|url| !url.is_empty())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string())
}

impl Config {
    /// Resolve settings from flags, environment and the config file.
    ///
    /// Creates the data directory if it does not exist yet.
    pub fn resolve(data_dir: Option<PathBuf>, api_url: Option<String>) -> Result<Self> {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
        let file = load_file_config(&data_dir)?;
        Ok(Self::from_sources(data_dir, api_url, env::var(API_URL_ENV).ok(), file))
    }

    fn from_sources(
        data_dir: PathBuf,
        flag_url: Option<String>,
        env_url: Option<String>,
        file: FileConfig,
    ) -> Self {
        let api_url = resolve_api_url(flag_url, env_url, file.api_url);
        let timeout = Duration::from_secs(file.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS).max(1));
        debug!(%api_url, ?timeout, data_dir = %data_dir.display(), "configuration resolved");
        Self {
            data_dir,
            api_url,
            timeout,
        }
    }

    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join(SESSION_FILE)
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE)
    }

    /// The saved `Cookie` header value, if a session was stored.
    pub fn load_session(&self) -> Result<Option<String>> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let raw = raw.trim();
        Ok((!raw.is_empty()).then(|| raw.to_string()))
    }

    pub fn save_session(&self, cookie_header: &str) -> Result<()> {
        let path = self.session_path();
        fs::write(&path, cookie_header)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        restrict_permissions(&path)
    }

    /// Remove the stored session. Returns whether one existed.
    pub fn clear_session(&self) -> Result<bool> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).with_context(|| format!("Failed to remove {}", path.display()))?;
        Ok(true)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("Failed to set permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn make_temp_dir(label: &str) -> PathBuf {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = env::temp_dir().join(format!("taskdeck-config-test-{label}-{}-{id}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("temp dir must be created");
        dir
    }

    #[test]
    fn api_url_precedence() {
        let file = || Some("http://file:1".to_string());
        assert_eq!(
            resolve_api_url(Some("http://flag:1".into()), Some("http://env:1".into()), file()),
            "http://flag:1"
        );
        assert_eq!(resolve_api_url(None, Some("http://env:1".into()), file()), "http://env:1");
        assert_eq!(resolve_api_url(None, None, file()), "http://file:1");
        assert_eq!(resolve_api_url(None, Some("  ".into()), None), DEFAULT_API_URL);
    }

    #[test]
    fn missing_config_file_uses_defaults() {
        let dir = make_temp_dir("defaults");
        let config = Config::from_sources(dir.clone(), None, None, load_file_config(&dir).unwrap());
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn config_file_is_read() {
        let dir = make_temp_dir("file");
        fs::write(
            dir.join(CONFIG_FILE),
            "api_url = \"https://todo.example.com\"\ntimeout_secs = 5\n",
        )
        .unwrap();
        let file = load_file_config(&dir).unwrap();
        let config = Config::from_sources(dir, None, None, file);
        assert_eq!(config.api_url, "https://todo.example.com");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn malformed_config_file_is_an_error() {
        let dir = make_temp_dir("bad");
        fs::write(dir.join(CONFIG_FILE), "api_url = [").unwrap();
        let err = load_file_config(&dir).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn session_save_load_clear() {
        let dir = make_temp_dir("session");
        let config = Config::from_sources(dir, None, None, FileConfig::default());
        assert_eq!(config.load_session().unwrap(), None);

        config.save_session(".AspNetCore.Identity.Application=abc").unwrap();
        assert_eq!(
            config.load_session().unwrap().as_deref(),
            Some(".AspNetCore.Identity.Application=abc")
        );

        assert!(config.clear_session().unwrap());
        assert!(!config.clear_session().unwrap());
        assert_eq!(config.load_session().unwrap(), None);
    }
}
