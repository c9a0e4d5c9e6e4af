//! User configuration (`config.toml`).

use cellflow_engine::EngineConfig;
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Settings read from `config.toml`. Every field is optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub rows: usize,
    pub columns: usize,
    pub engine: EngineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            rows: 100,
            columns: 26,
            engine: EngineConfig::default(),
        }
    }
}

/// Load configuration from `explicit`, or from the user config dir.
///
/// Problems are reported as warnings and fall back to defaults; only a
/// missing file that was asked for explicitly is mentioned, the default
/// location is allowed to be absent.
pub fn load_config(explicit: Option<&Path>) -> (AppConfig, Vec<String>) {
    let mut warnings: Vec<String> = Vec::new();
    let Some(path) = explicit.map(Path::to_path_buf).or_else(user_config_path) else {
        return (AppConfig::default(), warnings);
    };

    if !path.exists() {
        if explicit.is_some() {
            warnings.push(format!("Config file not found: {}", path.display()));
        }
        return (AppConfig::default(), warnings);
    }

    let config = match std::fs::read_to_string(&path) {
        Ok(content) => match parse_config(&content) {
            Ok(config) => config,
            Err(err) => {
                warnings.push(format!("Failed to parse {}: {}", path.display(), err));
                AppConfig::default()
            }
        },
        Err(err) => {
            warnings.push(format!("Failed to read {}: {}", path.display(), err));
            AppConfig::default()
        }
    };
    (config, warnings)
}

pub(crate) fn parse_config(content: &str) -> Result<AppConfig, toml::de::Error> {
    toml::from_str::<AppConfig>(content)
}

fn user_config_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("", "", "cellflow")?;
    let mut path = proj.config_dir().to_path_buf();
    path.push("config.toml");
    Some(path)
}
