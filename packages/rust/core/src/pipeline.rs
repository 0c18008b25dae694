//! Batch pipeline: documents → diagrams → images.
//!
//! Per document: discover → normalize → generate + reconcile → render. Every
//! locator is computed and collision-checked before any output directory is
//! created.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use apidiagram_discovery::{discover_diagrams, discover_documents};
use apidiagram_shared::{
    AppConfig, DIAGRAM_EXTENSION, DiagramError, FailurePolicy, IMAGE_EXTENSION, InputMode,
    OutputLocator, Result, SourceDocument, mirror_image_path, to_slash,
};

use crate::generate::{DiagramGenerator, generate_diagram};
use crate::normalize::Normalizer;
use crate::render::{ImageRenderer, render_image};
use crate::serve::ContentServer;

/// Resolved settings for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root of the YAML/JSON document tree.
    pub source_root: PathBuf,
    /// Root of the mirrored `.mmd` tree.
    pub diagram_root: PathBuf,
    /// Root of the mirrored `.svg` tree.
    pub image_root: PathBuf,
    /// Scratch directory for YAML → JSON conversion.
    pub temp_root: PathBuf,
    pub input_mode: InputMode,
    pub on_failure: FailurePolicy,
}

impl PipelineConfig {
    pub fn from_app(app: &AppConfig) -> Self {
        Self {
            source_root: app.paths.source_dir.clone(),
            diagram_root: app.paths.diagram_dir.clone(),
            image_root: app.paths.image_dir.clone(),
            temp_root: app.paths.temp_dir.clone(),
            input_mode: app.generator.input_mode,
            on_failure: app.pipeline.on_failure,
        }
    }
}

/// A document that failed under [`FailurePolicy::Continue`].
#[derive(Debug)]
pub struct DocumentFailure {
    /// Source-relative document (or diagram-relative, for render-only runs).
    pub document: String,
    pub error: DiagramError,
}

/// Result of a pipeline run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Inputs considered (documents, or diagrams for render-only runs).
    pub inputs: usize,
    /// Diagram files written.
    pub diagrams: Vec<PathBuf>,
    /// Image files written.
    pub images: Vec<PathBuf>,
    pub failures: Vec<DocumentFailure>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase or starting a new input.
    fn phase(&self, name: &str);
    /// Called with the diagram-root-relative path of each diagram written.
    fn diagram_written(&self, relative: &str);
    /// Called with the image-root-relative path of each image written.
    fn image_written(&self, relative: &str);
    /// Called when an input fails and the run continues.
    fn document_failed(&self, document: &str, error: &DiagramError);
    /// Called when the run completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn diagram_written(&self, _relative: &str) {}
    fn image_written(&self, _relative: &str) {}
    fn document_failed(&self, _document: &str, _error: &DiagramError) {}
    fn done(&self, _summary: &RunSummary) {}
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Run both stages for every document under the source root.
#[instrument(skip_all, fields(source = %config.source_root.display()))]
pub async fn run_pipeline<G: DiagramGenerator, R: ImageRenderer>(
    config: &PipelineConfig,
    generator: &G,
    renderer: &R,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    process_documents(config, generator, Some(renderer), progress).await
}

/// Run the generation stage only.
#[instrument(skip_all, fields(source = %config.source_root.display()))]
pub async fn generate_only<G: DiagramGenerator>(
    config: &PipelineConfig,
    generator: &G,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    process_documents::<G, NoRender>(config, generator, None, progress).await
}

/// Render every `.mmd` already under the diagram root into the image root.
#[instrument(skip_all, fields(diagrams = %config.diagram_root.display()))]
pub async fn render_only<R: ImageRenderer>(
    config: &PipelineConfig,
    renderer: &R,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    let start = Instant::now();

    progress.phase("Discovering diagrams");
    let diagrams = discover_diagrams(&config.diagram_root)?;
    let images = diagrams
        .iter()
        .map(|d| mirror_image_path(&config.diagram_root, &config.image_root, d))
        .collect::<Result<Vec<_>>>()?;

    create_root(&config.image_root)?;

    let mut summary = RunSummary {
        inputs: diagrams.len(),
        ..Default::default()
    };
    let total = diagrams.len();

    for (index, (diagram, image)) in diagrams.iter().zip(images).enumerate() {
        let label = relative_label(&config.diagram_root, diagram);
        progress.phase(&format!("[{}/{total}] Rendering {label}", index + 1));

        match render_image(renderer, diagram, &image).await {
            Ok(()) => {
                let shown = relative_label(&config.image_root, &image);
                info!(image = %shown, "image written");
                progress.image_written(&shown);
                summary.images.push(image);
            }
            Err(e) => {
                let err = e.in_document(diagram, &image);
                record_failure(config.on_failure, &mut summary, progress, label, err)?;
            }
        }
    }

    summary.elapsed = start.elapsed();
    log_summary(&summary);
    progress.done(&summary);
    Ok(summary)
}

// ---------------------------------------------------------------------------
// Document processing
// ---------------------------------------------------------------------------

/// A document together with its precomputed output slot.
struct Planned {
    document: SourceDocument,
    locator: OutputLocator,
}

async fn process_documents<G: DiagramGenerator, R: ImageRenderer>(
    config: &PipelineConfig,
    generator: &G,
    renderer: Option<&R>,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    let start = Instant::now();

    progress.phase("Discovering documents");
    let documents = discover_documents(&config.source_root)?;
    let planned = plan(documents)?;

    create_root(&config.diagram_root)?;
    if renderer.is_some() {
        create_root(&config.image_root)?;
    }

    let server = match config.input_mode {
        InputMode::Url => Some(ContentServer::start(&config.source_root).await?),
        InputMode::Path => None,
    };
    let normalizer = match &server {
        Some(server) => Normalizer::served(server.base_url().clone()),
        None => Normalizer::local(&config.temp_root),
    };

    let mut summary = RunSummary {
        inputs: planned.len(),
        ..Default::default()
    };
    let total = planned.len();
    let mut outcome = Ok(());

    for (index, item) in planned.iter().enumerate() {
        let label = item.document.relative_display();
        progress.phase(&format!("[{}/{total}] {label}", index + 1));

        let result =
            process_one(config, &normalizer, generator, renderer, item, progress, &mut summary).await;

        if let Err(err) = result {
            outcome = record_failure(config.on_failure, &mut summary, progress, label, err);
            if outcome.is_err() {
                break;
            }
        }
    }

    if let Some(server) = server {
        server.shutdown().await;
    }
    outcome?;

    summary.elapsed = start.elapsed();
    log_summary(&summary);
    progress.done(&summary);
    Ok(summary)
}

/// Compute every locator and reject two documents mapping to one artifact.
fn plan(documents: Vec<SourceDocument>) -> Result<Vec<Planned>> {
    let mut claimed: HashMap<PathBuf, String> = HashMap::with_capacity(documents.len());
    let mut planned = Vec::with_capacity(documents.len());

    for document in documents {
        let locator = OutputLocator::for_document(&document.relative)?;
        let slot = locator.relative_artifact(DIAGRAM_EXTENSION);

        if let Some(first) = claimed.get(&slot) {
            return Err(DiagramError::config(format!(
                "{first} and {} both map to {}",
                document.relative_display(),
                to_slash(&slot)
            )));
        }
        claimed.insert(slot, document.relative_display());
        planned.push(Planned { document, locator });
    }

    Ok(planned)
}

async fn process_one<G: DiagramGenerator, R: ImageRenderer>(
    config: &PipelineConfig,
    normalizer: &Normalizer,
    generator: &G,
    renderer: Option<&R>,
    item: &Planned,
    progress: &dyn ProgressReporter,
    summary: &mut RunSummary,
) -> Result<()> {
    let source = &item.document.path;
    let expected_diagram = item.locator.diagram_path(&config.diagram_root);

    // The prepared input (and any temporary JSON) lives only for this block.
    let diagram = {
        let prepared = normalizer
            .prepare(&item.document)
            .map_err(|e| e.in_document(source, &expected_diagram))?;
        let output_dir = item.locator.directory_in(&config.diagram_root);
        generate_diagram(generator, prepared.input(), &output_dir, &item.locator.base_name)
            .await
            .map_err(|e| e.in_document(source, &expected_diagram))?
    };

    let shown = item.locator.display(DIAGRAM_EXTENSION);
    info!(diagram = %shown, "diagram written");
    progress.diagram_written(&shown);
    summary.diagrams.push(diagram.clone());

    let Some(renderer) = renderer else {
        return Ok(());
    };

    let image = item.locator.image_path(&config.image_root);
    render_image(renderer, &diagram, &image)
        .await
        .map_err(|e| e.in_document(source, &image))?;

    let shown = item.locator.display(IMAGE_EXTENSION);
    info!(image = %shown, "image written");
    progress.image_written(&shown);
    summary.images.push(image);

    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Apply the failure policy: `Err` aborts the run, `Ok` records and continues.
fn record_failure(
    policy: FailurePolicy,
    summary: &mut RunSummary,
    progress: &dyn ProgressReporter,
    document: String,
    error: DiagramError,
) -> Result<()> {
    match policy {
        FailurePolicy::Abort => Err(error),
        FailurePolicy::Continue => {
            warn!(%document, error = %error, "document failed, continuing");
            progress.document_failed(&document, &error);
            summary.failures.push(DocumentFailure { document, error });
            Ok(())
        }
    }
}

fn create_root(root: &Path) -> Result<()> {
    std::fs::create_dir_all(root).map_err(|e| DiagramError::io(root, e))
}

fn relative_label(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map(to_slash)
        .unwrap_or_else(|_| path.display().to_string())
}

fn log_summary(summary: &RunSummary) {
    info!(
        inputs = summary.inputs,
        diagrams = summary.diagrams.len(),
        images = summary.images.len(),
        failures = summary.failures.len(),
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "pipeline complete"
    );
}

/// Renderer type for runs without a render stage; cannot be constructed.
enum NoRender {}

impl ImageRenderer for NoRender {
    async fn render(&self, _diagram: &Path, _image: &Path) -> Result<()> {
        match *self {}
    }
}
