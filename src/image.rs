//! Images - One Buildable Unit
//!
//! An image owns its merged facts and refers to the project's asset sets
//! by name. Render and build both acquire assets before delegating to the
//! build tool.

use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, info_span};

use crate::asset::{Acquired, Fetcher};
use crate::assetset::{Assetset, AssetsetError};
use crate::build_tool::{BuildContext, BuildTool, BuildToolError};
use crate::factset::Factset;
use crate::template::{self, TemplateError};

/// Asset sets shared by every image of a project.
pub type AssetsetRegistry = Rc<IndexMap<String, Assetset>>;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image \"{image}\" references undeclared asset set \"{asset_set}\"")]
    AssetsetNotFound { image: String, asset_set: String },

    #[error("Image \"{image}\": {source}")]
    Assets {
        image: String,
        source: AssetsetError,
    },

    #[error("Image \"{image}\" tag: {source}")]
    Tag {
        image: String,
        source: TemplateError,
    },

    #[error("Image \"{image}\": {source}")]
    BuildTool {
        image: String,
        source: BuildToolError,
    },
}

/// Where an image reads its sources and keeps its working files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDirs {
    /// Relative local asset sources are read from here.
    pub base: PathBuf,
    pub source: PathBuf,
    pub assets: PathBuf,
    pub render: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Image {
    name: String,
    facts: Factset,
    asset_set_names: Vec<String>,
    tag_template: String,
    dirs: ImageDirs,
    registry: AssetsetRegistry,
}

impl Image {
    pub fn new(
        name: impl Into<String>,
        facts: Factset,
        asset_set_names: Vec<String>,
        tag_template: impl Into<String>,
        dirs: ImageDirs,
        registry: AssetsetRegistry,
    ) -> Self {
        Self {
            name: name.into(),
            facts,
            asset_set_names,
            tag_template: tag_template.into(),
            dirs,
            registry,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Project facts overridden by this image's declarations.
    pub fn facts(&self) -> &Factset {
        &self.facts
    }

    pub fn asset_set_names(&self) -> &[String] {
        &self.asset_set_names
    }

    pub fn dirs(&self) -> &ImageDirs {
        &self.dirs
    }

    pub fn source_dir(&self) -> &Path {
        &self.dirs.source
    }

    pub fn tag(&self) -> Result<String, ImageError> {
        template::expand(&self.tag_template, &self.facts).map_err(|source| ImageError::Tag {
            image: self.name.clone(),
            source,
        })
    }

    /// Look up every referenced asset set, failing on the first unknown name.
    pub fn asset_sets(&self) -> Result<Vec<&Assetset>, ImageError> {
        self.asset_set_names
            .iter()
            .map(|name| {
                self.registry
                    .get(name)
                    .ok_or_else(|| ImageError::AssetsetNotFound {
                        image: self.name.clone(),
                        asset_set: name.clone(),
                    })
            })
            .collect()
    }

    /// Acquire the assets of every referenced set into this image's asset
    /// directory.
    pub fn acquire_assets(&self, fetcher: &dyn Fetcher) -> Result<Vec<Acquired>, ImageError> {
        let sets = self.asset_sets()?;
        let mut acquired = Vec::new();
        for set in sets {
            let assets = set
                .acquire_all(&self.dirs.base, &self.dirs.assets, &self.facts, fetcher)
                .map_err(|source| ImageError::Assets {
                    image: self.name.clone(),
                    source,
                })?;
            acquired.extend(assets);
        }
        debug!(image = %self.name, count = acquired.len(), "Assets ready");
        Ok(acquired)
    }

    fn context(&self, fetcher: &dyn Fetcher) -> Result<BuildContext, ImageError> {
        let tag = self.tag()?;
        let assets = self.acquire_assets(fetcher)?;
        Ok(BuildContext {
            image: self.name.clone(),
            tag,
            source_dir: self.dirs.source.clone(),
            asset_dir: self.dirs.assets.clone(),
            render_dir: self.dirs.render.clone(),
            facts: self.facts.clone(),
            assets,
        })
    }

    fn tool_error(&self, source: BuildToolError) -> ImageError {
        ImageError::BuildTool {
            image: self.name.clone(),
            source,
        }
    }

    pub fn render(&self, tool: &dyn BuildTool, fetcher: &dyn Fetcher) -> Result<(), ImageError> {
        let _span = info_span!("render", image = %self.name).entered();
        let context = self.context(fetcher)?;
        tool.render(&context).map_err(|e| self.tool_error(e))
    }

    pub fn build(&self, tool: &dyn BuildTool, fetcher: &dyn Fetcher) -> Result<(), ImageError> {
        let _span = info_span!("build", image = %self.name).entered();
        let context = self.context(fetcher)?;
        tool.build(&context).map_err(|e| self.tool_error(e))
    }
}
