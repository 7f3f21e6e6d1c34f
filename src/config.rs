//! Project File - `tedi.yml`
//!
//! Declares project facts, named asset sets and the ordered images.
//! Facts stay as raw YAML here so that type checking happens with
//! factset semantics when the project is assembled.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_yaml_ng::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::assetset::AssetTemplate;

pub const PROJECT_FILE: &str = "tedi.yml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No {} found in {}", PROJECT_FILE, .0.display())]
    NotFound(PathBuf),

    #[error("Could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml_ng::Error,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default)]
    pub facts: Value,
    #[serde(default)]
    pub asset_sets: IndexMap<String, Vec<AssetTemplate>>,
    #[serde(default)]
    pub images: IndexMap<String, ImageConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageConfig {
    #[serde(default)]
    pub facts: Value,
    #[serde(default)]
    pub asset_sets: Vec<String>,
    /// Image source directory, relative to the project. Defaults to the
    /// image name.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Tag template. Defaults to the image name.
    #[serde(default)]
    pub tag: Option<String>,
}

impl ProjectConfig {
    pub fn from_yaml(source: &str) -> Result<Self, serde_yaml_ng::Error> {
        serde_yaml_ng::from_str(source)
    }

    /// Load `tedi.yml` from a project directory.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(PROJECT_FILE);
        let content = fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(dir.to_path_buf())
            } else {
                ConfigError::Io {
                    path: path.clone(),
                    source,
                }
            }
        })?;
        Self::from_yaml(&content).map_err(|source| ConfigError::Parse { path, source })
    }
}
