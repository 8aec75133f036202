use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::buffer::DEFAULT_BATCH_SIZE;
use crate::error::{Result, ScanError};
use crate::pattern_index::DEFAULT_SUBJECT_KEY_LEN;
use crate::scanner::{ScanOptions, DEFAULT_PAGE_SIZE, DEFAULT_RECOGNIZED_TABLE, DEFAULT_UNRECOGNIZED_TABLE};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data_dir: String,
    /// Directory of `.eml` files. Empty means `<data_dir>/inbox`.
    pub mail_dir: String,
    pub query: String,
    pub page_size: usize,
    pub batch_size: usize,
    pub subject_key_len: usize,
    pub recognized_table: String,
    pub unrecognized_table: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            mail_dir: String::new(),
            query: String::new(),
            page_size: DEFAULT_PAGE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            subject_key_len: DEFAULT_SUBJECT_KEY_LEN,
            recognized_table: DEFAULT_RECOGNIZED_TABLE.to_string(),
            unrecognized_table: DEFAULT_UNRECOGNIZED_TABLE.to_string(),
        }
    }
}

impl Settings {
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn mail_dir(&self) -> PathBuf {
        if self.mail_dir.is_empty() {
            self.data_dir().join("inbox")
        } else {
            PathBuf::from(&self.mail_dir)
        }
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            query: self.query.clone(),
            page_size: self.page_size,
            batch_size: self.batch_size,
            subject_key_len: self.subject_key_len,
            recognized_table: self.recognized_table.clone(),
            unrecognized_table: self.unrecognized_table.clone(),
            archive: false,
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("txnscan")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("txnscan")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| ScanError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn get_data_dir() -> PathBuf {
    load_settings().data_dir()
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
