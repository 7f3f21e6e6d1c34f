//! Build Tool - Render and Build Seam
//!
//! The engine only ever calls `render` and `build`. What those do is up to
//! the implementation; `DockerBuildTool` lays out a build context and runs
//! `docker build` on it.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use thiserror::Error;
use tracing::{debug, info};

use crate::asset::Acquired;
use crate::factset::Factset;
use crate::template::{self, TemplateError};

/// Files with this suffix have their facts expanded during rendering and
/// lose the suffix.
pub const TEMPLATE_SUFFIX: &str = ".tmpl";

#[derive(Debug, Error)]
pub enum BuildToolError {
    #[error("{} has not been rendered", .0.display())]
    NotRendered(PathBuf),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Rendering {}: {source}", path.display())]
    Template {
        path: PathBuf,
        source: TemplateError,
    },

    #[error("Could not run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with {status}")]
    CommandFailed { program: String, status: ExitStatus },
}

/// Everything a build tool gets to see of one image.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub image: String,
    pub tag: String,
    pub source_dir: PathBuf,
    pub asset_dir: PathBuf,
    pub render_dir: PathBuf,
    pub facts: Factset,
    pub assets: Vec<Acquired>,
}

pub trait BuildTool {
    fn render(&self, context: &BuildContext) -> Result<(), BuildToolError>;
    fn build(&self, context: &BuildContext) -> Result<(), BuildToolError>;
}

pub struct DockerBuildTool {
    program: String,
}

impl DockerBuildTool {
    pub fn new() -> Self {
        Self {
            program: "docker".to_string(),
        }
    }

    /// Use another docker-compatible binary (e.g. `podman`).
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for DockerBuildTool {
    fn default() -> Self {
        Self::new()
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> BuildToolError + '_ {
    move |source| BuildToolError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn render_tree(from: &Path, to: &Path, facts: &Factset) -> Result<(), BuildToolError> {
    fs::create_dir_all(to).map_err(io_error(to))?;
    for entry in fs::read_dir(from).map_err(io_error(from))? {
        let entry = entry.map_err(io_error(from))?;
        let path = entry.path();
        let file_name = entry.file_name();
        let file_type = entry.file_type().map_err(io_error(&path))?;

        if file_type.is_dir() {
            // the render dir may live inside the sources
            if to.starts_with(&path) {
                continue;
            }
            render_tree(&path, &to.join(&file_name), facts)?;
            continue;
        }

        let name = file_name.to_string_lossy();
        match name.strip_suffix(TEMPLATE_SUFFIX) {
            Some(rendered) if !rendered.is_empty() => {
                let content = fs::read_to_string(&path).map_err(io_error(&path))?;
                let expanded = template::expand(&content, facts).map_err(|source| {
                    BuildToolError::Template {
                        path: path.clone(),
                        source,
                    }
                })?;
                let target = to.join(rendered);
                fs::write(&target, expanded).map_err(io_error(&target))?;
            }
            _ => {
                let target = to.join(&file_name);
                fs::copy(&path, &target).map_err(io_error(&target))?;
            }
        }
    }
    Ok(())
}

impl BuildTool for DockerBuildTool {
    /// Recreate the render directory from the image sources, then place
    /// the acquired assets beside them.
    fn render(&self, context: &BuildContext) -> Result<(), BuildToolError> {
        let render_dir = &context.render_dir;
        if render_dir.exists() {
            fs::remove_dir_all(render_dir).map_err(io_error(render_dir))?;
        }

        if context.source_dir.is_dir() {
            render_tree(&context.source_dir, render_dir, &context.facts)?;
        } else {
            debug!(image = %context.image, dir = %context.source_dir.display(), "No image sources");
            fs::create_dir_all(render_dir).map_err(io_error(render_dir))?;
        }

        for asset in &context.assets {
            let relative = asset
                .path()
                .strip_prefix(&context.asset_dir)
                .unwrap_or(asset.path());
            let target = render_dir.join(relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(io_error(parent))?;
            }
            if fs::hard_link(asset.path(), &target).is_err() {
                fs::copy(asset.path(), &target).map_err(io_error(&target))?;
            }
        }

        info!(image = %context.image, dir = %render_dir.display(), "Rendered");
        Ok(())
    }

    fn build(&self, context: &BuildContext) -> Result<(), BuildToolError> {
        if !context.render_dir.is_dir() {
            return Err(BuildToolError::NotRendered(context.render_dir.clone()));
        }

        info!(image = %context.image, tag = %context.tag, "Building");
        let status = Command::new(&self.program)
            .arg("build")
            .arg("--tag")
            .arg(&context.tag)
            .arg(&context.render_dir)
            .status()
            .map_err(|source| BuildToolError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(BuildToolError::CommandFailed {
                program: self.program.clone(),
                status,
            })
        }
    }
}
