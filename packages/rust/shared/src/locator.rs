//! Path mapper: source-relative path → mirrored output location.
//!
//! The same [`OutputLocator`] is applied under the diagram root and under the
//! image root, so both output trees are structurally isomorphic to the source
//! tree. [`mirror_image_path`] relies on that to find an image slot from a
//! diagram path alone.

use std::path::{Component, Path, PathBuf};

use crate::error::{DiagramError, Result};
use crate::types::{DIAGRAM_EXTENSION, DocumentFormat, IMAGE_EXTENSION};

/// Where the artifacts of one source document live, relative to an output root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputLocator {
    /// Mirrored subdirectory; empty for documents at the source root.
    pub directory: PathBuf,
    /// File name of the document with its document extension stripped.
    pub base_name: String,
}

impl OutputLocator {
    /// Derive the locator for a document path relative to the source root.
    pub fn for_document(relative: &Path) -> Result<Self> {
        let mut directory = PathBuf::new();
        let mut components = relative.components().peekable();
        let mut file_name = None;

        while let Some(component) = components.next() {
            match component {
                Component::CurDir => {}
                Component::Normal(part) if components.peek().is_none() => {
                    file_name = Some(part);
                }
                Component::Normal(part) => directory.push(part),
                _ => {
                    return Err(DiagramError::validation(format!(
                        "document path must be relative and inside the source root: {}",
                        relative.display()
                    )));
                }
            }
        }

        let file_name = file_name
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                DiagramError::validation(format!(
                    "document path has no usable file name: {}",
                    relative.display()
                ))
            })?;

        if DocumentFormat::from_path(Path::new(file_name)).is_none() {
            return Err(DiagramError::validation(format!(
                "not a YAML/JSON document: {}",
                relative.display()
            )));
        }

        // `from_path` succeeded, so there is an extension to strip.
        let base_name = match file_name.rfind('.') {
            Some(dot) => file_name[..dot].to_string(),
            None => file_name.to_string(),
        };

        Ok(Self {
            directory,
            base_name,
        })
    }

    /// The mirrored directory under `root`.
    pub fn directory_in(&self, root: &Path) -> PathBuf {
        if self.directory.as_os_str().is_empty() {
            root.to_path_buf()
        } else {
            root.join(&self.directory)
        }
    }

    /// `{directory}/{base_name}.{extension}` relative to an output root.
    pub fn relative_artifact(&self, extension: &str) -> PathBuf {
        self.directory
            .join(format!("{}.{extension}", self.base_name))
    }

    /// Full path of an artifact with `extension` under `root`.
    pub fn artifact_path(&self, root: &Path, extension: &str) -> PathBuf {
        self.directory_in(root)
            .join(format!("{}.{extension}", self.base_name))
    }

    /// Canonical diagram-description artifact under the diagram root.
    pub fn diagram_path(&self, diagram_root: &Path) -> PathBuf {
        self.artifact_path(diagram_root, DIAGRAM_EXTENSION)
    }

    /// Image artifact under the image root.
    pub fn image_path(&self, image_root: &Path) -> PathBuf {
        self.artifact_path(image_root, IMAGE_EXTENSION)
    }

    /// Forward-slash, output-relative path for console output (`a/b.mmd`).
    pub fn display(&self, extension: &str) -> String {
        to_slash(&self.relative_artifact(extension))
    }
}

/// Map a diagram artifact to its image slot through the mirrored layout.
pub fn mirror_image_path(
    diagram_root: &Path,
    image_root: &Path,
    diagram_path: &Path,
) -> Result<PathBuf> {
    let relative = diagram_path.strip_prefix(diagram_root).map_err(|_| {
        DiagramError::validation(format!(
            "{} is not under the diagram root {}",
            diagram_path.display(),
            diagram_root.display()
        ))
    })?;

    if relative.file_name().is_none() {
        return Err(DiagramError::validation(format!(
            "diagram path has no file name: {}",
            diagram_path.display()
        )));
    }

    Ok(image_root.join(relative).with_extension(IMAGE_EXTENSION))
}

/// Render a relative path with `/` separators regardless of platform.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
