//! Tedi Core - Fact Resolution and Asset Acquisition
//!
//! Turns a project's declared facts, asset sets and images into concrete,
//! cached build inputs, then hands each image to a build tool.
//!
//! # Resolution Order
//! 1. Process environment (`ENV_*`, `TEDI_FACT_*`)
//! 2. Project facts
//! 3. Image facts
//! 4. Command-line overrides

pub mod factset;
pub mod template;
pub mod asset;
pub mod assetset;
pub mod config;
pub mod build_tool;
pub mod image;
pub mod project;
pub mod logging;

pub use factset::{Factset, FactError};
pub use template::{expand, TemplateError};
pub use asset::{Acquired, Asset, AssetError, FetchError, Fetcher, SourceFetcher};
pub use assetset::{AssetTemplate, Assetset, AssetsetError};
pub use config::{ConfigError, ImageConfig, ProjectConfig};
pub use build_tool::{BuildContext, BuildTool, BuildToolError, DockerBuildTool};
pub use image::{Image, ImageDirs, ImageError};
pub use project::{Project, ProjectError, ProjectOptions};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
