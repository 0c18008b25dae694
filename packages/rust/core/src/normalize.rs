//! Format normalizer: source document → transformation-ready input.
//!
//! JSON documents pass through untouched. YAML documents are decoded and
//! written as pretty-printed JSON to a temporary file whose name is derived
//! from a SHA-256 of the source path, so repeated runs reuse the same name.
//! The temporary file is owned by a [`TempInput`] guard and removed when the
//! guard drops, on success and on error alike.
//!
//! For transforms that only accept URLs, [`Normalizer::served`] hands out
//! document URLs on an ephemeral [`crate::serve::ContentServer`] instead.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use url::Url;

use apidiagram_shared::{DiagramError, DocumentFormat, Result, SourceDocument};

use crate::serve::SERVE_PREFIX;

/// Characters that are not safe in a temporary file name.
static UNSAFE_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9._-]+").expect("valid regex"));

/// Length of the hex hash prefix used in temporary file names.
const HASH_PREFIX_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Transform input
// ---------------------------------------------------------------------------

/// What the generator is pointed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformInput {
    /// A local JSON file.
    Path(PathBuf),
    /// A document served over HTTP.
    Url(Url),
}

impl std::fmt::Display for TransformInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Url(url) => write!(f, "{url}"),
        }
    }
}

/// A prepared input plus whatever temporary resource backs it.
///
/// Keep this alive for the duration of the generation step only.
#[derive(Debug)]
pub struct PreparedInput {
    input: TransformInput,
    temp: Option<TempInput>,
}

impl PreparedInput {
    pub fn input(&self) -> &TransformInput {
        &self.input
    }

    /// Path of the temporary JSON file, if one was written.
    pub fn temp_path(&self) -> Option<&Path> {
        self.temp.as_ref().map(TempInput::path)
    }
}

/// Temporary JSON file removed (best-effort) on drop.
#[derive(Debug)]
pub struct TempInput {
    path: PathBuf,
}

impl TempInput {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempInput {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed temporary input"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to remove temporary input");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

/// Strategy for turning a [`SourceDocument`] into a [`TransformInput`].
#[derive(Debug, Clone)]
pub enum Normalizer {
    /// Local-path-capable transform; YAML goes through `temp_root`.
    LocalPath { temp_root: PathBuf },
    /// URL-only transform; documents are served under `base_url`.
    ServedUrl { base_url: Url },
}

impl Normalizer {
    pub fn local(temp_root: impl Into<PathBuf>) -> Self {
        Self::LocalPath {
            temp_root: temp_root.into(),
        }
    }

    pub fn served(base_url: Url) -> Self {
        Self::ServedUrl { base_url }
    }

    /// Produce the transform input for one document.
    pub fn prepare(&self, document: &SourceDocument) -> Result<PreparedInput> {
        match self {
            Self::LocalPath { temp_root } => prepare_local(temp_root, document),
            Self::ServedUrl { base_url } => Ok(PreparedInput {
                input: TransformInput::Url(document_url(base_url, document)?),
                temp: None,
            }),
        }
    }
}

fn prepare_local(temp_root: &Path, document: &SourceDocument) -> Result<PreparedInput> {
    if document.format == DocumentFormat::Json {
        return Ok(PreparedInput {
            input: TransformInput::Path(document.path.clone()),
            temp: None,
        });
    }

    let raw = std::fs::read_to_string(&document.path)
        .map_err(|e| DiagramError::io(&document.path, e))?;
    let json = yaml_to_json_string(&raw).map_err(|e| match e {
        DiagramError::Parse { message } => {
            DiagramError::parse(format!("{}: {message}", document.path.display()))
        }
        other => other,
    })?;

    std::fs::create_dir_all(temp_root).map_err(|e| DiagramError::io(temp_root, e))?;
    let path = temp_root.join(temp_file_name(document));
    std::fs::write(&path, json).map_err(|e| DiagramError::io(&path, e))?;

    debug!(
        document = %document.relative_display(),
        temp = %path.display(),
        "converted YAML to temporary JSON"
    );

    Ok(PreparedInput {
        input: TransformInput::Path(path.clone()),
        temp: Some(TempInput { path }),
    })
}

/// `{safe-stem}-{sha256(relative path)[..16]}.json`
pub fn temp_file_name(document: &SourceDocument) -> String {
    let relative = document.relative_display();

    let mut hasher = Sha256::new();
    hasher.update(relative.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    let stem = document
        .relative
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let safe = UNSAFE_SEGMENT.replace_all(&stem, "_");

    format!("{safe}-{}.json", &hash[..HASH_PREFIX_LEN])
}

/// URL of a document on the content server, percent-encoded per segment.
fn document_url(base_url: &Url, document: &SourceDocument) -> Result<Url> {
    let mut url = base_url.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|()| DiagramError::Server(format!("cannot extend base URL {base_url}")))?;
        segments.pop_if_empty().push(SERVE_PREFIX);
        for part in document.relative.iter() {
            segments.push(&part.to_string_lossy());
        }
    }
    Ok(url)
}

// ---------------------------------------------------------------------------
// YAML → JSON
// ---------------------------------------------------------------------------

/// Decode YAML and re-encode it as pretty JSON.
///
/// Merge keys (`<<: *anchor`) are resolved and mapping order is kept.
pub fn yaml_to_json_string(raw: &str) -> Result<String> {
    let mut yaml: serde_yaml::Value =
        serde_yaml::from_str(raw).map_err(|e| DiagramError::parse(format!("invalid YAML: {e}")))?;
    yaml.apply_merge()
        .map_err(|e| DiagramError::parse(format!("invalid YAML merge key: {e}")))?;
    let json = yaml_to_json(yaml)?;
    serde_json::to_string_pretty(&json)
        .map_err(|e| DiagramError::parse(format!("JSON serialization failed: {e}")))
}

/// Convert a YAML value to JSON. Non-string mapping keys (OpenAPI status codes
/// such as `200:`) become their string form.
fn yaml_to_json(value: serde_yaml::Value) -> Result<serde_json::Value> {
    use serde_json::Value as Json;
    use serde_yaml::Value as Yaml;

    Ok(match value {
        Yaml::Null => Json::Null,
        Yaml::Bool(b) => Json::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Json::from(i)
            } else if let Some(u) = n.as_u64() {
                Json::from(u)
            } else {
                let f = n.as_f64().unwrap_or(f64::NAN);
                serde_json::Number::from_f64(f).map(Json::Number).ok_or_else(|| {
                    DiagramError::parse(format!("number {n} cannot be represented in JSON"))
                })?
            }
        }
        Yaml::String(s) => Json::String(s),
        Yaml::Sequence(items) => Json::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<Vec<_>>>()?,
        ),
        Yaml::Mapping(mapping) => {
            let mut object = serde_json::Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                object.insert(mapping_key(key)?, yaml_to_json(value)?);
            }
            Json::Object(object)
        }
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

fn mapping_key(key: serde_yaml::Value) -> Result<String> {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Null => Ok("null".into()),
        Yaml::Tagged(tagged) => mapping_key(tagged.value),
        other => Err(DiagramError::parse(format!(
            "unsupported mapping key: {other:?}"
        ))),
    }
}
