use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const BACKEND_ENV: &str = "GRAPH_PLAYGROUND_BACKEND";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    // Root of the graph-data REST service
    #[serde(default = "AppSettings::default_backend_url")]
    pub backend_base_url: String,
    // Protocol preselected in the connect form of new tabs
    #[serde(default = "AppSettings::default_protocol")]
    pub default_protocol: String,
    #[serde(default = "AppSettings::default_timeout_secs")]
    pub request_timeout_secs: u64,
    // How long fetch-failure toasts stay up
    #[serde(default = "AppSettings::default_toast_secs")]
    pub toast_seconds: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            backend_base_url: Self::default_backend_url(),
            default_protocol: Self::default_protocol(),
            request_timeout_secs: Self::default_timeout_secs(),
            toast_seconds: Self::default_toast_secs(),
        }
    }
}

static SETTINGS_OVERRIDE: OnceLock<AppSettings> = OnceLock::new();

pub fn set_settings_override(settings: AppSettings) {
    let _ = SETTINGS_OVERRIDE.set(settings);
}

impl AppSettings {
    fn config_dir() -> PathBuf {
        // Cross-platform user config dir
        #[cfg(target_os = "macos")]
        {
            // ~/Library/Application Support/Graph-Playground
            let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("~"));
            return home.join("Library").join("Application Support").join("Graph-Playground");
        }
        #[cfg(target_os = "windows")]
        {
            // %APPDATA%\Graph-Playground
            if let Ok(appdata) = std::env::var("APPDATA") {
                return PathBuf::from(appdata).join("Graph-Playground");
            }
            return PathBuf::from("Graph-Playground");
        }
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            // $XDG_CONFIG_HOME/Graph-Playground or ~/.config/Graph-Playground
            if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
                return PathBuf::from(xdg).join("Graph-Playground");
            }
            let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("~"));
            return home.join(".config").join("Graph-Playground");
        }
    }

    /// Effective settings: the process override if one was set, else the
    /// settings file (or defaults), with the backend env var applied last.
    pub fn current() -> Self {
        if let Some(s) = SETTINGS_OVERRIDE.get() {
            return s.clone();
        }
        let mut s = match Self::load() {
            Ok(s) => s,
            Err(e) => {
                log::warn!("could not read settings, using defaults: {:#}", e);
                Self::default()
            }
        };
        s.apply_env();
        s
    }

    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(BACKEND_ENV)
            && !url.trim().is_empty()
        {
            self.backend_base_url = url.trim().to_string();
        }
    }

    pub fn load() -> anyhow::Result<Self> {
        let json_path = Self::config_dir().join("settings.json");
        if json_path.exists() {
            let mut f = std::fs::File::open(json_path)?;
            let mut s = String::new();
            f.read_to_string(&mut s)?;
            let v: Self = serde_json::from_str(&s)?;
            return Ok(v);
        }
        Ok(Self::default())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let dir = Self::config_dir();
        fs::create_dir_all(&dir)?;
        let path = dir.join("settings.json");
        let s = serde_json::to_string_pretty(self)?;
        let mut f = std::fs::File::create(path)?;
        f.write_all(s.as_bytes())?;
        Ok(())
    }

    /// Return the directory where the settings file (settings.json) is stored.
    pub fn settings_dir() -> PathBuf {
        Self::config_dir()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn toast_duration(&self) -> Duration {
        Duration::from_secs(self.toast_seconds)
    }

    pub(crate) fn default_backend_url() -> String { "http://localhost:8000".to_string() }
    pub(crate) fn default_protocol() -> String { crate::session::record::DEFAULT_PROTOCOL.to_string() }
    pub(crate) fn default_timeout_secs() -> u64 { 30 }
    pub(crate) fn default_toast_secs() -> u64 { 3 }
}
