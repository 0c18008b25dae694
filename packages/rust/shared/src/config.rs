//! Application configuration for apidiagram.
//!
//! Config is looked up at an explicit `--config` path, then `./apidiagram.toml`,
//! then `~/.apidiagram/apidiagram.toml`. CLI flags override config file values,
//! which override defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DiagramError, Result};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "apidiagram.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".apidiagram";

// ---------------------------------------------------------------------------
// Config structs (matching apidiagram.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Input and output locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// External document → diagram transformation.
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// External diagram → image renderer.
    #[serde(default)]
    pub renderer: RendererConfig,

    /// Run-level behaviour.
    #[serde(default)]
    pub pipeline: PipelineSection,
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of the YAML/JSON document tree.
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// Root of the mirrored diagram-description tree.
    #[serde(default = "default_diagram_dir")]
    pub diagram_dir: PathBuf,

    /// Root of the mirrored image tree.
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,

    /// Where YAML documents are converted to temporary JSON.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            diagram_dir: default_diagram_dir(),
            image_dir: default_image_dir(),
            temp_dir: default_temp_dir(),
        }
    }
}

fn default_source_dir() -> PathBuf {
    "yaml_source".into()
}
fn default_diagram_dir() -> PathBuf {
    "yaml_output/mmd".into()
}
fn default_image_dir() -> PathBuf {
    "yaml_output/svg".into()
}
fn default_temp_dir() -> PathBuf {
    ".tmp/openapi-json".into()
}

/// `[generator]` section.
///
/// `args` may contain `{input}`, `{output_dir}` and `{name}` placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_generator_command")]
    pub command: String,

    #[serde(default = "default_generator_args")]
    pub args: Vec<String>,

    /// Whether the transform takes a local file path or needs a URL.
    #[serde(default)]
    pub input_mode: InputMode,

    #[serde(default = "default_generator_timeout")]
    pub timeout_secs: u64,

    /// Extra attempts after a failed or timed-out run.
    #[serde(default)]
    pub retries: u32,

    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            command: default_generator_command(),
            args: default_generator_args(),
            input_mode: InputMode::default(),
            timeout_secs: default_generator_timeout(),
            retries: 0,
            retry_delay_ms: default_retry_delay(),
        }
    }
}

fn default_generator_command() -> String {
    "npx".into()
}
fn default_generator_args() -> Vec<String> {
    [
        "--yes",
        "openapi-mermaid",
        "--input",
        "{input}",
        "--output",
        "{output_dir}",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_generator_timeout() -> u64 {
    300
}
fn default_retry_delay() -> u64 {
    1000
}

/// `[renderer]` section.
///
/// `args` may contain `{input}` and `{output}` placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    #[serde(default = "default_renderer_command")]
    pub command: String,

    #[serde(default = "default_renderer_args")]
    pub args: Vec<String>,

    /// Passed as `--puppeteerConfigFile <path>` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub puppeteer_config: Option<PathBuf>,

    #[serde(default = "default_renderer_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_renderer_retries")]
    pub retries: u32,

    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            command: default_renderer_command(),
            args: default_renderer_args(),
            puppeteer_config: None,
            timeout_secs: default_renderer_timeout(),
            retries: default_renderer_retries(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

fn default_renderer_command() -> String {
    "npx".into()
}
fn default_renderer_args() -> Vec<String> {
    ["--yes", "@mermaid-js/mermaid-cli", "-i", "{input}", "-o", "{output}"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_renderer_timeout() -> u64 {
    120
}
fn default_renderer_retries() -> u32 {
    1
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineSection {
    /// What to do when one document fails.
    #[serde(default)]
    pub on_failure: FailurePolicy,
}

// ---------------------------------------------------------------------------
// Enumerated settings
// ---------------------------------------------------------------------------

/// How the generator receives its input document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// A local file path; YAML is converted to a temporary JSON file.
    #[default]
    Path,
    /// An `http://127.0.0.1` URL served by an ephemeral content server.
    Url,
}

impl FromStr for InputMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "path" => Ok(Self::Path),
            "url" => Ok(Self::Url),
            other => Err(format!("invalid input mode '{other}': expected 'path' or 'url'")),
        }
    }
}

/// What the driver does when a document fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the whole run at the first failure.
    #[default]
    Abort,
    /// Record the failure, keep going, and fail the run at the end.
    Continue,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "abort" => Ok(Self::Abort),
            "continue" => Ok(Self::Continue),
            other => Err(format!(
                "invalid failure policy '{other}': expected 'abort' or 'continue'"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the user config directory (`~/.apidiagram/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DiagramError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the user config file (`~/.apidiagram/apidiagram.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the user config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DiagramError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DiagramError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Resolve the effective config file.
///
/// An explicit path must exist. Otherwise `./apidiagram.toml` wins over the
/// user config, and defaults apply when neither exists.
pub fn resolve_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(DiagramError::config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        return load_config_from(path);
    }

    let local = Path::new(CONFIG_FILE_NAME);
    if local.exists() {
        tracing::debug!(path = %local.display(), "using project config");
        return load_config_from(local);
    }

    load_config()
}

/// Write a default config file at `path`. Refuses to overwrite.
pub fn init_config(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Err(DiagramError::config(format!(
            "{} already exists",
            path.display()
        )));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| DiagramError::io(parent, e))?;
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| DiagramError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| DiagramError::io(path, e))?;
    tracing::info!(path = %path.display(), "created default config file");

    Ok(path.to_path_buf())
}
