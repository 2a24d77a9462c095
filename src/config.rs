use crate::filter::MatchType;
use crate::model::history::DEFAULT_HISTORY_LIMIT;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Filter document loaded when none is given on the command line.
    /// Relative paths are resolved against the config file's directory.
    pub default_document: Option<PathBuf>,
    /// Name of the implicit root Union.
    pub root_name: String,
    /// Maximum number of undo steps kept.
    pub history_limit: usize,
    pub new_filters: NewFilterDefaults,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            default_document: None,
            root_name: "root".to_string(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            new_filters: NewFilterDefaults::default(),
        }
    }
}

/// Settings for filters created by the add actions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewFilterDefaults {
    pub union_name: String,
    pub intersection_name: String,
    pub match_name: String,
    pub match_type: MatchType,
    pub match_key: String,
    pub match_value: String,
}

impl Default for NewFilterDefaults {
    fn default() -> Self {
        Self {
            union_name: "New Union".to_string(),
            intersection_name: "New Intersection".to_string(),
            match_name: "New Match".to_string(),
            match_type: MatchType::Exact,
            match_key: "foo".to_string(),
            match_value: "bar".to_string(),
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<EditorConfig, ConfigError> {
    if let Some(path) = path {
        load_config_from_path(path)
    } else {
        Ok(default_config().clone())
    }
}

pub fn load_config_from_path(path: &Path) -> Result<EditorConfig, ConfigError> {
    let path_display = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path_display.clone(),
        source,
    })?;

    let mut config =
        toml::from_str::<EditorConfig>(&raw).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })?;

    if let Some(document) = &config.default_document
        && document.is_relative()
        && let Some(dir) = path.parent()
    {
        config.default_document = Some(dir.join(document));
    }

    Ok(config)
}

pub fn default_config() -> &'static EditorConfig {
    static DEFAULT_CONFIG: LazyLock<EditorConfig> = LazyLock::new(EditorConfig::default);
    &DEFAULT_CONFIG
}
