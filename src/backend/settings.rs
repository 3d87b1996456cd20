use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::cache::{clamp_capacity, DEFAULT_CAPACITY};
use super::navigator::CoreConfig;

pub const DEFAULT_ENDPOINT: &str = "https://www.acy.moe/api/r18";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub endpoint: String,
    pub capacity: usize,
    pub download_dir: PathBuf,
    pub theme: Theme,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            capacity: DEFAULT_CAPACITY,
            download_dir: default_download_dir(),
            theme: Theme::Dark,
        }
    }
}

fn default_download_dir() -> PathBuf {
    dirs::picture_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn get_settings_path() -> PathBuf {
    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("acy-viewer");

    fs::create_dir_all(&config_dir).ok();
    config_dir.join("settings.json")
}

impl Settings {
    pub fn load() -> Self {
        Self::load_from(&get_settings_path())
    }

    /// Reads settings from `path`, falling back to defaults for a missing or
    /// malformed file and for individual missing fields.
    pub fn load_from(path: &Path) -> Self {
        let settings = match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                log::warn!("ignoring malformed settings in {}: {}", path.display(), e);
                Settings::default()
            }),
            Err(_) => Settings::default(),
        };
        settings.normalized()
    }

    pub fn save(&self) -> io::Result<()> {
        self.save_to(&get_settings_path())
    }

    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
    }

    fn normalized(mut self) -> Self {
        self.capacity = clamp_capacity(self.capacity);
        if !self.download_dir.is_dir() {
            self.download_dir = default_download_dir();
        }
        self
    }

    pub fn core(&self) -> CoreConfig {
        CoreConfig::new(self.endpoint.clone(), self.capacity)
    }
}
