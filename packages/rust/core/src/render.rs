//! Diagram → SVG rendering.

use std::future::Future;
use std::path::Path;

use tracing::{debug, instrument, warn};

use apidiagram_shared::{DiagramError, RendererConfig, Result};

use crate::process::{CommandSpec, OutputMode, run_with_retry};

/// Renders one diagram file to one image file.
pub trait ImageRenderer: Send + Sync {
    fn render(&self, diagram: &Path, image: &Path) -> impl Future<Output = Result<()>> + Send;
}

/// Renderer backed by an external command sharing the pipeline's streams.
///
/// Placeholders: `{input}`, `{output}`.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    spec: CommandSpec,
}

impl CommandRenderer {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }

    pub fn from_config(config: &RendererConfig) -> Self {
        Self::new(CommandSpec::from_renderer(config))
    }
}

impl ImageRenderer for CommandRenderer {
    async fn render(&self, diagram: &Path, image: &Path) -> Result<()> {
        let input = diagram.to_string_lossy();
        let output = image.to_string_lossy();
        let args = self
            .spec
            .expand(&[("input", input.as_ref()), ("output", output.as_ref())]);
        run_with_retry(&self.spec, &args, OutputMode::Inherit).await
    }
}

/// Render `diagram` to `image`, creating the image's parent directory.
///
/// Failures name the diagram, and any partial image is removed.
#[instrument(skip_all, fields(diagram = %diagram.display()))]
pub async fn render_image<R: ImageRenderer>(renderer: &R, diagram: &Path, image: &Path) -> Result<()> {
    if let Some(parent) = image.parent() {
        std::fs::create_dir_all(parent).map_err(|e| DiagramError::io(parent, e))?;
    }

    if let Err(e) = renderer.render(diagram, image).await {
        remove_partial(image);
        return Err(e.in_diagram(diagram));
    }

    if !image.is_file() {
        return Err(DiagramError::validation(format!(
            "renderer reported success but wrote no image at {}",
            image.display()
        ))
        .in_diagram(diagram));
    }

    debug!(image = %image.display(), "rendered image");
    Ok(())
}

fn remove_partial(image: &Path) {
    match std::fs::remove_file(image) {
        Ok(()) => debug!(image = %image.display(), "removed partial image"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(image = %image.display(), error = %e, "failed to remove partial image"),
    }
}
