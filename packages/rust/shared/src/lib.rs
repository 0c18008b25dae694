//! Shared types, error model, and configuration for apidiagram.
//!
//! This crate is the foundation depended on by all other apidiagram crates.
//! It provides:
//! - The unified error type ([`DiagramError`])
//! - Domain types ([`SourceDocument`], [`DocumentFormat`])
//! - The path mapper ([`OutputLocator`]) shared by both output trees
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod locator;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CONFIG_FILE_NAME, FailurePolicy, GeneratorConfig, InputMode, PathsConfig,
    PipelineSection, RendererConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from, resolve_config,
};
pub use error::{DiagramError, Result};
pub use locator::{OutputLocator, mirror_image_path, to_slash};
pub use types::{
    DIAGRAM_EXTENSION, DIAGRAM_EXTENSIONS, DocumentFormat, IMAGE_EXTENSION, SourceDocument,
    is_diagram_file,
};
