//! Project - Root Aggregate
//!
//! Facts resolve strictly downwards: environment, then project
//! declarations, then image declarations, then command-line overrides.
//! Images are processed one at a time in declaration order and the first
//! failure stops the run.

use indexmap::IndexMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;
use tracing::{info, warn};

use crate::asset::Fetcher;
use crate::assetset::Assetset;
use crate::build_tool::BuildTool;
use crate::config::{ConfigError, ProjectConfig};
use crate::factset::{FactError, Factset};
use crate::image::{AssetsetRegistry, Image, ImageDirs, ImageError};

/// Working directory inside a project, holding asset caches and renders.
pub const WORK_DIR: &str = ".tedi";

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid facts for {scope}: {source}")]
    Facts { scope: String, source: FactError },

    #[error("Invalid image name \"{0}\"")]
    InvalidImageName(String),

    #[error("No image named \"{0}\"")]
    ImageNotFound(String),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ProjectOptions {
    /// Environment snapshot to seed facts from. `None` reads the process
    /// environment.
    pub env: Option<Vec<(String, String)>>,
    /// Facts that win over every declaration.
    pub fact_overrides: Factset,
    /// Acquire every image's assets into one directory.
    pub shared_asset_cache: bool,
}

#[derive(Debug)]
pub struct Project {
    path: PathBuf,
    facts: Factset,
    asset_sets: AssetsetRegistry,
    images: Vec<Image>,
}

fn valid_image_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

impl Project {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ProjectError> {
        Self::open_with(path, ProjectOptions::default())
    }

    pub fn open_with(path: impl Into<PathBuf>, options: ProjectOptions) -> Result<Self, ProjectError> {
        let path = path.into();
        let config = ProjectConfig::load(&path)?;
        Self::from_config(path, config, options)
    }

    pub fn from_config(
        path: PathBuf,
        config: ProjectConfig,
        options: ProjectOptions,
    ) -> Result<Self, ProjectError> {
        let mut facts = match options.env {
            Some(env) => Factset::from_environment(env),
            None => Factset::from_process_env(),
        };
        facts
            .update_raw(&config.facts)
            .map_err(|source| ProjectError::Facts {
                scope: "project".to_string(),
                source,
            })?;
        let facts = Factset::merge(&facts, &options.fact_overrides);

        let asset_sets: IndexMap<String, Assetset> = config
            .asset_sets
            .into_iter()
            .map(|(name, templates)| (name.clone(), Assetset::new(name, templates)))
            .collect();
        let asset_sets = Rc::new(asset_sets);

        let work_dir = path.join(WORK_DIR);
        let mut images = Vec::with_capacity(config.images.len());
        for (name, declared) in config.images {
            if !valid_image_name(&name) {
                return Err(ProjectError::InvalidImageName(name));
            }

            let mut image_facts = facts.copy();
            image_facts
                .update_raw(&declared.facts)
                .map_err(|source| ProjectError::Facts {
                    scope: format!("image \"{name}\""),
                    source,
                })?;
            let image_facts = Factset::merge(&image_facts, &options.fact_overrides);

            let assets = if options.shared_asset_cache {
                work_dir.join("assets")
            } else {
                work_dir.join("assets").join(&name)
            };
            let dirs = ImageDirs {
                base: path.clone(),
                source: path.join(declared.path.as_deref().unwrap_or(Path::new(&name))),
                assets,
                render: work_dir.join("render").join(&name),
            };

            let tag = declared.tag.unwrap_or_else(|| name.clone());
            images.push(Image::new(
                name,
                image_facts,
                declared.asset_sets,
                tag,
                dirs,
                Rc::clone(&asset_sets),
            ));
        }

        info!(project = %path.display(), images = images.len(), "Loaded project");
        Ok(Self {
            path,
            facts,
            asset_sets,
            images,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn work_dir(&self) -> PathBuf {
        self.path.join(WORK_DIR)
    }

    pub fn facts(&self) -> &Factset {
        &self.facts
    }

    pub fn asset_sets(&self) -> &IndexMap<String, Assetset> {
        &self.asset_sets
    }

    pub fn asset_set(&self, name: &str) -> Option<&Assetset> {
        self.asset_sets.get(name)
    }

    pub fn images(&self) -> &[Image] {
        &self.images
    }

    pub fn image(&self, name: &str) -> Result<&Image, ProjectError> {
        self.images
            .iter()
            .find(|image| image.name() == name)
            .ok_or_else(|| ProjectError::ImageNotFound(name.to_string()))
    }

    /// Acquire assets for every image without rendering.
    pub fn acquire(&self, fetcher: &dyn Fetcher) -> Result<(), ProjectError> {
        for image in &self.images {
            image.acquire_assets(fetcher)?;
        }
        Ok(())
    }

    pub fn render(&self, tool: &dyn BuildTool, fetcher: &dyn Fetcher) -> Result<(), ProjectError> {
        for image in &self.images {
            info!(image = %image.name(), "Rendering image");
            image.render(tool, fetcher)?;
        }
        Ok(())
    }

    pub fn build(&self, tool: &dyn BuildTool, fetcher: &dyn Fetcher) -> Result<(), ProjectError> {
        for image in &self.images {
            info!(image = %image.name(), "Building image");
            image.build(tool, fetcher)?;
        }
        Ok(())
    }

    /// Remove rendered output, and the asset cache too when `assets` is set.
    pub fn clean(&self, assets: bool) -> Result<(), ProjectError> {
        let work_dir = self.work_dir();
        let targets = if assets {
            vec![work_dir.clone()]
        } else {
            vec![work_dir.join("render")]
        };

        for target in targets {
            if target.exists() {
                info!(dir = %target.display(), "Removing");
                fs::remove_dir_all(&target).map_err(|source| ProjectError::Io {
                    path: target.clone(),
                    source,
                })?;
            } else {
                warn!(dir = %target.display(), "Nothing to clean");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ProjectOptions {
        ProjectOptions {
            env: Some(vec![("TEDI_FACT_bird".into(), "emu".into())]),
            ..ProjectOptions::default()
        }
    }

    fn project(yaml: &str, options: ProjectOptions) -> Result<Project, ProjectError> {
        let config = ProjectConfig::from_yaml(yaml).unwrap();
        Project::from_config(PathBuf::from("/work/zoo"), config, options)
    }

    #[test]
    fn image_facts_override_project_facts() {
        let project = project(
            "facts: {animal: cow, sound: moo}\nimages: {a: {facts: {sound: baa}}, b: {}}",
            options(),
        )
        .unwrap();

        let a = project.image("a").unwrap();
        assert_eq!(a.facts().get("animal"), Some("cow"));
        assert_eq!(a.facts().get("sound"), Some("baa"));
        assert_eq!(a.facts().get("bird"), Some("emu"));
        assert_eq!(project.image("b").unwrap().facts().get("sound"), Some("moo"));
        assert_eq!(project.facts().get("sound"), Some("moo"));
    }

    #[test]
    fn image_null_removes_inherited_fact() {
        let project = project("facts: {animal: cow}\nimages: {a: {facts: {animal: ~}}}", options()).unwrap();
        assert!(!project.image("a").unwrap().facts().contains("animal"));
        assert!(project.facts().contains("animal"));
    }

    #[test]
    fn declared_facts_beat_environment_and_overrides_beat_everything() {
        let mut opts = options();
        opts.fact_overrides = Factset::empty().with("animal", "yak").unwrap();
        let project = project(
            "facts: {bird: kiwi, animal: cow}\nimages: {a: {facts: {animal: gnu}}}",
            opts,
        )
        .unwrap();

        assert_eq!(project.facts().get("bird"), Some("kiwi"));
        assert_eq!(project.facts().get("animal"), Some("yak"));
        assert_eq!(project.image("a").unwrap().facts().get("animal"), Some("yak"));
    }

    #[test]
    fn invalid_fact_types_name_their_scope() {
        let err = project("images: {a: {facts: {count: 3}}}", options()).unwrap_err();
        assert!(matches!(
            &err,
            ProjectError::Facts { source: FactError::InvalidValueType { .. }, .. }
        ));
        assert!(err.to_string().contains("image \"a\""));

        let err = project("facts: {5: five}", options()).unwrap_err();
        assert!(matches!(
            err,
            ProjectError::Facts { source: FactError::InvalidKeyType(_), .. }
        ));
    }

    #[test]
    fn image_directories() {
        let project = project("images: {a: {}, b: {path: src/b}}", options()).unwrap();
        let a = project.image("a").unwrap().dirs();
        assert_eq!(a.base, Path::new("/work/zoo"));
        assert_eq!(a.source, Path::new("/work/zoo/a"));
        assert_eq!(a.assets, Path::new("/work/zoo/.tedi/assets/a"));
        assert_eq!(a.render, Path::new("/work/zoo/.tedi/render/a"));
        assert_eq!(project.image("b").unwrap().source_dir(), Path::new("/work/zoo/src/b"));
    }

    #[test]
    fn shared_asset_cache() {
        let mut opts = options();
        opts.shared_asset_cache = true;
        let project = project("images: {a: {}, b: {}}", opts).unwrap();
        for image in project.images() {
            assert_eq!(image.dirs().assets, Path::new("/work/zoo/.tedi/assets"));
        }
    }

    #[test]
    fn rejects_path_like_image_names() {
        for name in ["'../up'", "'a/b'", "'.'"] {
            let err = project(&format!("images: {{{name}: {{}}}}"), options()).unwrap_err();
            assert!(matches!(err, ProjectError::InvalidImageName(_)), "{name}");
        }
    }

    #[test]
    fn tag_defaults_to_image_name() {
        let project = project("images: {a: {}, b: {tag: 'b:{bird}'}}", options()).unwrap();
        assert_eq!(project.image("a").unwrap().tag().unwrap(), "a");
        assert_eq!(project.image("b").unwrap().tag().unwrap(), "b:emu");
    }

    #[test]
    fn missing_image_lookup() {
        let project = project("{}", options()).unwrap();
        assert!(matches!(project.image("x"), Err(ProjectError::ImageNotFound(_))));
    }
}
