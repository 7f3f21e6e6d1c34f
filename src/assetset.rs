//! Asset Sets - Named, Ordered Asset Templates
//!
//! Templates are expanded against a merged factset as a whole before
//! anything is acquired: one undefined fact rejects the entire set.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::asset::{Acquired, Asset, AssetError, Fetcher};
use crate::factset::Factset;
use crate::template::{self, TemplateError};

#[derive(Debug, Error)]
pub enum AssetsetError {
    #[error("Asset set \"{asset_set}\" references undefined facts: {}", facts.join(", "))]
    UndefinedFact {
        asset_set: String,
        facts: Vec<String>,
    },

    #[error("Asset set \"{asset_set}\": {source}")]
    Template {
        asset_set: String,
        source: TemplateError,
    },

    #[error("Asset set \"{asset_set}\": {source}")]
    Asset {
        asset_set: String,
        source: AssetError,
    },
}

/// An unexpanded asset declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssetTemplate {
    pub filename: String,
    pub source: String,
}

impl AssetTemplate {
    pub fn new(filename: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            source: source.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assetset {
    name: String,
    templates: Vec<AssetTemplate>,
}

impl Assetset {
    pub fn new(name: impl Into<String>, templates: Vec<AssetTemplate>) -> Self {
        Self {
            name: name.into(),
            templates,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn templates(&self) -> &[AssetTemplate] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    fn template_error(&self, source: TemplateError) -> AssetsetError {
        AssetsetError::Template {
            asset_set: self.name.clone(),
            source,
        }
    }

    /// Expand every template against `facts`, in declared order.
    pub fn expand(&self, facts: &Factset) -> Result<Vec<Asset>, AssetsetError> {
        let mut undefined: Vec<String> = Vec::new();
        for entry in &self.templates {
            for field in [&entry.filename, &entry.source] {
                let names = template::placeholders(field).map_err(|e| self.template_error(e))?;
                for name in names {
                    if !facts.contains(&name) && !undefined.contains(&name) {
                        undefined.push(name);
                    }
                }
            }
        }
        if !undefined.is_empty() {
            return Err(AssetsetError::UndefinedFact {
                asset_set: self.name.clone(),
                facts: undefined,
            });
        }

        self.templates
            .iter()
            .map(|entry| {
                Ok(Asset::new(
                    template::expand(&entry.filename, facts).map_err(|e| self.template_error(e))?,
                    template::expand(&entry.source, facts).map_err(|e| self.template_error(e))?,
                ))
            })
            .collect()
    }

    /// Expand, then acquire every asset into `target_dir` in declared order.
    /// Relative local sources are read from `base_dir`.
    pub fn acquire_all(
        &self,
        base_dir: &Path,
        target_dir: &Path,
        facts: &Factset,
        fetcher: &dyn Fetcher,
    ) -> Result<Vec<Acquired>, AssetsetError> {
        let assets = self.expand(facts)?;
        debug!(asset_set = %self.name, count = assets.len(), "Acquiring asset set");

        assets
            .iter()
            .map(|asset| {
                asset
                    .relative_to(base_dir)
                    .acquire(target_dir, fetcher)
                    .map_err(|source| AssetsetError::Asset {
                        asset_set: self.name.clone(),
                        source,
                    })
            })
            .collect()
    }
}
