//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use apidiagram_core::generate::CommandGenerator;
use apidiagram_core::pipeline::{
    PipelineConfig, ProgressReporter, RunSummary, generate_only, render_only, run_pipeline,
};
use apidiagram_core::render::CommandRenderer;
use apidiagram_shared::{
    AppConfig, CONFIG_FILE_NAME, DiagramError, FailurePolicy, InputMode, init_config,
    resolve_config,
};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// apidiagram: turn a tree of OpenAPI documents into Mermaid diagrams and SVGs.
#[derive(Parser)]
#[command(
    name = "apidiagram",
    version,
    about = "Convert a tree of OpenAPI YAML/JSON documents into mirrored Mermaid (.mmd) and SVG trees.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ./apidiagram.toml, then ~/.apidiagram/apidiagram.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Source directory of YAML/JSON documents.
    #[arg(long, global = true)]
    pub source: Option<PathBuf>,

    /// Output directory for .mmd diagrams.
    #[arg(long, global = true)]
    pub diagram_out: Option<PathBuf>,

    /// Output directory for .svg images.
    #[arg(long, global = true)]
    pub image_out: Option<PathBuf>,

    /// Scratch directory for YAML → JSON conversion.
    #[arg(long, global = true)]
    pub temp_dir: Option<PathBuf>,

    /// How the generator receives documents: path or url.
    #[arg(long, global = true)]
    pub input_mode: Option<InputMode>,

    /// What to do when a document fails: abort or continue.
    #[arg(long, global = true)]
    pub on_failure: Option<FailurePolicy>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Defaults to `run`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Generate diagrams and render images for every document.
    Run,
    /// Generate .mmd diagrams only.
    Generate,
    /// Render .svg images from the existing diagram tree.
    Render,
    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a default config file (at --config, or ./apidiagram.toml).
    Init,
    /// Show the resolved configuration, including flag overrides.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr; stdout carries
/// the per-artifact lines.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "apidiagram=info",
        1 => "apidiagram=debug",
        _ => "apidiagram=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Which stages a pipeline command runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Both,
    GenerateOnly,
    RenderOnly,
}

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        None | Some(Command::Run) => cmd_pipeline(&cli, Stage::Both).await,
        Some(Command::Generate) => cmd_pipeline(&cli, Stage::GenerateOnly).await,
        Some(Command::Render) => cmd_pipeline(&cli, Stage::RenderOnly).await,
        Some(Command::Config { action }) => match action {
            ConfigAction::Init => cmd_config_init(&cli),
            ConfigAction::Show => cmd_config_show(&cli),
        },
    }
}

/// Load the config file and layer the CLI flags over it.
fn effective_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = resolve_config(cli.config.as_deref())?;
    apply_overrides(cli, &mut config);
    Ok(config)
}

fn apply_overrides(cli: &Cli, config: &mut AppConfig) {
    if let Some(source) = &cli.source {
        config.paths.source_dir = source.clone();
    }
    if let Some(out) = &cli.diagram_out {
        config.paths.diagram_dir = out.clone();
    }
    if let Some(out) = &cli.image_out {
        config.paths.image_dir = out.clone();
    }
    if let Some(temp) = &cli.temp_dir {
        config.paths.temp_dir = temp.clone();
    }
    if let Some(mode) = cli.input_mode {
        config.generator.input_mode = mode;
    }
    if let Some(policy) = cli.on_failure {
        config.pipeline.on_failure = policy;
    }
}

async fn cmd_pipeline(cli: &Cli, stage: Stage) -> Result<()> {
    let config = effective_config(cli)?;
    let pipeline = PipelineConfig::from_app(&config);

    info!(
        source = %pipeline.source_root.display(),
        diagrams = %pipeline.diagram_root.display(),
        images = %pipeline.image_root.display(),
        ?stage,
        "starting pipeline"
    );

    let generator = CommandGenerator::from_config(&config.generator);
    let renderer = CommandRenderer::from_config(&config.renderer);
    let reporter = CliProgress::new();

    let result = match stage {
        Stage::Both => run_pipeline(&pipeline, &generator, &renderer, &reporter).await,
        Stage::GenerateOnly => generate_only(&pipeline, &generator, &reporter).await,
        Stage::RenderOnly => render_only(&pipeline, &renderer, &reporter).await,
    };
    reporter.finish();

    summary_result(&result?)
}

/// A run with recorded failures still exits non-zero.
fn summary_result(summary: &RunSummary) -> Result<()> {
    if summary.is_success() {
        return Ok(());
    }

    let failed: Vec<&str> = summary
        .failures
        .iter()
        .map(|f| f.document.as_str())
        .collect();
    Err(eyre!(
        "{} of {} inputs failed: {}",
        failed.len(),
        summary.inputs,
        failed.join(", ")
    ))
}

/// `config init` writes to `--config` when given, else `./apidiagram.toml`.
fn config_target(cli: &Cli) -> PathBuf {
    cli.config
        .as_deref()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

fn cmd_config_init(cli: &Cli) -> Result<()> {
    let path = init_config(&config_target(cli))?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(cli: &Cli) -> Result<()> {
    let config = effective_config(cli)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter: a spinner on stderr, artifact lines on stdout.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn println(&self, line: String) {
        self.spinner.suspend(|| println!("{line}"));
    }

    fn finish(&self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn diagram_written(&self, relative: &str) {
        self.println(format!("MMD: {relative}"));
    }

    fn image_written(&self, relative: &str) {
        self.println(format!("SVG: {relative}"));
    }

    fn document_failed(&self, document: &str, error: &DiagramError) {
        self.spinner
            .suspend(|| eprintln!("FAILED: {document}: {error}"));
    }

    fn done(&self, summary: &RunSummary) {
        self.spinner.finish_and_clear();
        println!("Done.");
        info!(elapsed_s = summary.elapsed.as_secs_f64(), "finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apidiagram_core::pipeline::DocumentFailure;

    #[test]
    fn no_subcommand_defaults_to_run() {
        let cli = Cli::try_parse_from(["apidiagram"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn global_flags_override_config_values() {
        let cli = Cli::try_parse_from([
            "apidiagram",
            "generate",
            "--source",
            "specs",
            "--diagram-out",
            "out/mmd",
            "--input-mode",
            "url",
            "--on-failure",
            "continue",
            "-vv",
        ])
        .unwrap();
        assert!(matches!(cli.command, Some(Command::Generate)));
        assert_eq!(cli.verbose, 2);

        let mut config = AppConfig::default();
        apply_overrides(&cli, &mut config);
        assert_eq!(config.paths.source_dir, PathBuf::from("specs"));
        assert_eq!(config.paths.diagram_dir, PathBuf::from("out/mmd"));
        assert_eq!(config.paths.image_dir, PathBuf::from("yaml_output/svg"));
        assert_eq!(config.generator.input_mode, InputMode::Url);
        assert_eq!(config.pipeline.on_failure, FailurePolicy::Continue);
    }

    #[test]
    fn invalid_enum_flags_are_rejected() {
        assert!(Cli::try_parse_from(["apidiagram", "--input-mode", "ftp"]).is_err());
        assert!(Cli::try_parse_from(["apidiagram", "--on-failure", "ignore"]).is_err());
    }

    #[test]
    fn clean_summary_is_success() {
        let summary = RunSummary {
            inputs: 3,
            ..Default::default()
        };
        assert!(summary_result(&summary).is_ok());
    }

    #[test]
    fn recorded_failures_fail_the_run() {
        let summary = RunSummary {
            inputs: 3,
            failures: vec![
                DocumentFailure {
                    document: "a/b.yaml".into(),
                    error: DiagramError::config("broken"),
                },
                DocumentFailure {
                    document: "c.json".into(),
                    error: DiagramError::Timeout {
                        program: "npx".into(),
                        seconds: 300,
                    },
                },
            ],
            ..Default::default()
        };

        let msg = summary_result(&summary).unwrap_err().to_string();
        assert!(msg.contains("2 of 3 inputs failed"), "unexpected message: {msg}");
        assert!(msg.contains("a/b.yaml"));
        assert!(msg.contains("c.json"));
    }

    #[test]
    fn config_init_targets_explicit_path_or_local_file() {
        let cli = Cli::try_parse_from(["apidiagram", "config", "init"]).unwrap();
        assert_eq!(config_target(&cli), PathBuf::from(CONFIG_FILE_NAME));

        let cli =
            Cli::try_parse_from(["apidiagram", "config", "init", "--config", "x/y.toml"]).unwrap();
        assert_eq!(config_target(&cli), PathBuf::from("x/y.toml"));
    }
}
