//! Core domain types for apidiagram.

use std::path::{Path, PathBuf};

/// Extension given to every reconciled diagram-description artifact.
pub const DIAGRAM_EXTENSION: &str = "mmd";

/// Extensions recognised as diagram-like output of the generator.
pub const DIAGRAM_EXTENSIONS: &[&str] = &["mmd", "mermaid"];

/// Extension of rendered image artifacts.
pub const IMAGE_EXTENSION: &str = "svg";

// ---------------------------------------------------------------------------
// DocumentFormat
// ---------------------------------------------------------------------------

/// Serialization format of a source document, inferred from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    Yaml,
    Json,
}

impl DocumentFormat {
    /// Infer the format from a path's extension (case-insensitive).
    ///
    /// Returns `None` for anything other than `.yaml`, `.yml` or `.json`.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// MIME type used when the document is served over HTTP.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Yaml => "application/yaml",
            Self::Json => "application/json",
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Yaml => f.write_str("yaml"),
            Self::Json => f.write_str("json"),
        }
    }
}

// ---------------------------------------------------------------------------
// SourceDocument
// ---------------------------------------------------------------------------

/// An input API description discovered under the source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// Path relative to the source root (e.g. `teamB/core/api.yaml`).
    pub relative: PathBuf,
    /// Full path on disk (source root joined with `relative`).
    pub path: PathBuf,
    /// Declared format.
    pub format: DocumentFormat,
}

impl SourceDocument {
    /// Build a document from its source root and relative path.
    ///
    /// Returns `None` when the extension is not a document extension.
    pub fn new(source_root: &Path, relative: impl Into<PathBuf>) -> Option<Self> {
        let relative = relative.into();
        let format = DocumentFormat::from_path(&relative)?;
        Some(Self {
            path: source_root.join(&relative),
            relative,
            format,
        })
    }

    /// Forward-slash form of the relative path, stable across platforms.
    pub fn relative_display(&self) -> String {
        crate::locator::to_slash(&self.relative)
    }
}

/// Whether `path` has a diagram-like extension (case-insensitive).
pub fn is_diagram_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            DIAGRAM_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension_is_case_insensitive() {
        assert_eq!(
            DocumentFormat::from_path(Path::new("a/b.yaml")),
            Some(DocumentFormat::Yaml)
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("a/b.YML")),
            Some(DocumentFormat::Yaml)
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("Spec.Json")),
            Some(DocumentFormat::Json)
        );
        assert_eq!(DocumentFormat::from_path(Path::new("notes.txt")), None);
        assert_eq!(DocumentFormat::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn source_document_joins_root() {
        let doc = SourceDocument::new(Path::new("/src"), "teamB/api.yml").unwrap();
        assert_eq!(doc.path, Path::new("/src/teamB/api.yml"));
        assert_eq!(doc.format, DocumentFormat::Yaml);
        assert_eq!(doc.relative_display(), "teamB/api.yml");

        assert!(SourceDocument::new(Path::new("/src"), "readme.md").is_none());
    }

    #[test]
    fn diagram_files_are_recognised() {
        assert!(is_diagram_file(Path::new("out/api.mmd")));
        assert!(is_diagram_file(Path::new("out/API.MMD")));
        assert!(is_diagram_file(Path::new("out/api.mermaid")));
        assert!(!is_diagram_file(Path::new("out/api.svg")));
        assert!(!is_diagram_file(Path::new("out/mmd")));
    }
}
