use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_SETTINGS_FILE: &str = "console.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    pub login_path: String,
    pub redirect_delay_ms: u64,
    pub session_file: PathBuf,
    pub default_page_size: u64,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:6808/".into(),
            timeout_secs: 30,
            login_path: "/login".into(),
            redirect_delay_ms: 1500,
            session_file: PathBuf::from("./data/session.token"),
            default_page_size: 10,
        }
    }
}

impl ConsoleSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn redirect_delay(&self) -> Duration {
        Duration::from_millis(self.redirect_delay_ms)
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    login_path: Option<String>,
    redirect_delay_ms: Option<u64>,
    session_file: Option<PathBuf>,
    default_page_size: Option<u64>,
}

/// Defaults, then the settings file, then environment overrides.
///
/// A missing default file is fine; a missing explicitly requested file is not.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<ConsoleSettings> {
    let mut settings = ConsoleSettings::default();

    let (path, required) = match path {
        Some(path) => (path, true),
        None => (Path::new(DEFAULT_SETTINGS_FILE), false),
    };
    match fs::read_to_string(path) {
        Ok(raw) => {
            let file_cfg: FileSettings = toml::from_str(&raw)
                .with_context(|| format!("invalid settings file '{}'", path.display()))?;
            apply_file_settings(&mut settings, file_cfg);
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound && !required => {}
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read settings file '{}'", path.display()));
        }
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings.base_url = normalize_base_url(&settings.base_url);
    Ok(settings)
}

fn apply_file_settings(settings: &mut ConsoleSettings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.base_url {
        settings.base_url = v;
    }
    if let Some(v) = file_cfg.timeout_secs {
        settings.timeout_secs = v;
    }
    if let Some(v) = file_cfg.login_path {
        settings.login_path = v;
    }
    if let Some(v) = file_cfg.redirect_delay_ms {
        settings.redirect_delay_ms = v;
    }
    if let Some(v) = file_cfg.session_file {
        settings.session_file = v;
    }
    if let Some(v) = file_cfg.default_page_size {
        settings.default_page_size = v;
    }
}

fn apply_env_overrides(settings: &mut ConsoleSettings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("CONSOLE_BASE_URL") {
        settings.base_url = v;
    }
    if let Some(v) = var("APP__BASE_URL") {
        settings.base_url = v;
    }

    if let Some(parsed) = var("APP__TIMEOUT_SECS").and_then(|v| v.parse::<u64>().ok()) {
        settings.timeout_secs = parsed;
    }

    if let Some(v) = var("APP__LOGIN_PATH") {
        settings.login_path = v;
    }

    if let Some(parsed) = var("APP__REDIRECT_DELAY_MS").and_then(|v| v.parse::<u64>().ok()) {
        settings.redirect_delay_ms = parsed;
    }

    if let Some(v) = var("APP__SESSION_FILE") {
        settings.session_file = PathBuf::from(v);
    }

    if let Some(parsed) = var("APP__PAGE_SIZE").and_then(|v| v.parse::<u64>().ok()) {
        settings.default_page_size = parsed;
    }
}

/// Ensures a scheme and a trailing slash so relative resource paths join under it.
pub fn normalize_base_url(raw_base_url: &str) -> String {
    let raw_base_url = raw_base_url.trim();

    if raw_base_url.is_empty() {
        return ConsoleSettings::default().base_url;
    }

    let mut base_url = if raw_base_url.contains("://") {
        raw_base_url.to_string()
    } else {
        format!("http://{raw_base_url}")
    };
    if !base_url.ends_with('/') {
        base_url.push('/');
    }
    base_url
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
