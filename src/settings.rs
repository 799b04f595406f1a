use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

pub const DB_FILE: &str = "emitrack.db";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    /// User id remembered by `emitrack login`.
    #[serde(default)]
    pub active_user_id: Option<i64>,
    #[serde(default = "default_currency")]
    pub default_currency: String,
    #[serde(default = "default_upcoming_window_days")]
    pub upcoming_window_days: u32,
    #[serde(default = "default_forecast_months")]
    pub forecast_months: u32,
}

fn default_currency() -> String {
    "INR".to_string()
}

fn default_upcoming_window_days() -> u32 {
    30
}

fn default_forecast_months() -> u32 {
    6
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            active_user_id: None,
            default_currency: default_currency(),
            upcoming_window_days: default_upcoming_window_days(),
            forecast_months: default_forecast_months(),
        }
    }
}

impl Settings {
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(DB_FILE)
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("emitrack")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("emitrack")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("ignoring unreadable settings at {}: {e}", path.display());
                Settings::default()
            }
        }
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| AppError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    log::debug!("saved settings to {}", settings_path().display());
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            data_dir: "/tmp/test".to_string(),
            active_user_id: Some(4),
            default_currency: "USD".to_string(),
            upcoming_window_days: 14,
            forecast_months: 12,
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(&path, &json).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: Settings = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.active_user_id, Some(4));
        assert_eq!(loaded.data_dir, "/tmp/test");
        assert_eq!(loaded.default_currency, "USD");
        assert_eq!(loaded.upcoming_window_days, 14);
    }

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert!(s.active_user_id.is_none());
        assert_eq!(s.default_currency, "INR");
        assert_eq!(s.forecast_months, 6);
        assert!(s.db_path().ends_with("emitrack.db"));
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/test"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.upcoming_window_days, 30);
        assert_eq!(s.default_currency, "INR");
        assert!(s.active_user_id.is_none());
    }

    #[test]
    fn test_shellexpand_keeps_plain_missing_path() {
        assert_eq!(shellexpand_path("/definitely/not/here"), "/definitely/not/here");
    }
}
