//! External process invocation with a time budget and bounded retry.
//!
//! Both external collaborators (the diagram generator and the renderer) run
//! through [`run_with_retry`]. A child that outlives its timeout is killed;
//! non-zero exits and timeouts are retried up to the configured count with a
//! linear backoff. Spawn failures are never retried.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};

use apidiagram_shared::{DiagramError, GeneratorConfig, RendererConfig, Result};

/// A configured external command, before placeholder expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program to execute (looked up on `PATH`).
    pub program: String,
    /// Argument template; `{key}` placeholders are expanded per call.
    pub args: Vec<String>,
    /// Per-attempt time budget; `None` waits forever.
    pub timeout: Option<Duration>,
    /// Extra attempts after a transient failure.
    pub retries: u32,
    /// Base delay between attempts, multiplied by the attempt number.
    pub retry_delay: Duration,
}

impl CommandSpec {
    /// Build a spec for a program with literal arguments and no retry.
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
            timeout: None,
            retries: 0,
            retry_delay: Duration::ZERO,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.retries = retries;
        self.retry_delay = delay;
        self
    }

    /// Spec for the document → diagram transformation.
    pub fn from_generator(config: &GeneratorConfig) -> Self {
        Self {
            program: config.command.clone(),
            args: config.args.clone(),
            timeout: timeout_from_secs(config.timeout_secs),
            retries: config.retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    /// Spec for the diagram → image renderer.
    pub fn from_renderer(config: &RendererConfig) -> Self {
        let mut args = config.args.clone();
        if let Some(puppeteer) = &config.puppeteer_config {
            args.push("--puppeteerConfigFile".into());
            args.push(puppeteer.to_string_lossy().into_owned());
        }

        Self {
            program: config.command.clone(),
            args,
            timeout: timeout_from_secs(config.timeout_secs),
            retries: config.retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    /// Substitute `{key}` placeholders in every argument.
    pub fn expand(&self, vars: &[(&str, &str)]) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                vars.iter().fold(arg.clone(), |acc, (key, value)| {
                    acc.replace(&format!("{{{key}}}"), value)
                })
            })
            .collect()
    }
}

/// A zero timeout in the config file means "no timeout".
fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// How the child's standard streams are wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Share the pipeline's stdin/stdout/stderr.
    Inherit,
    /// Null stdin, stdout captured into debug logs, stderr inherited.
    Capture,
}

/// Run `spec` with already-expanded `args`, retrying transient failures.
pub async fn run_with_retry(spec: &CommandSpec, args: &[String], mode: OutputMode) -> Result<()> {
    let mut attempt: u32 = 0;

    loop {
        match run_once(spec, args, mode).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_transient() && attempt < spec.retries => {
                attempt += 1;
                let delay = spec.retry_delay * attempt;
                warn!(
                    program = %spec.program,
                    attempt,
                    max_retries = spec.retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "external process failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// One attempt: spawn, wait under the timeout, check the exit status.
async fn run_once(spec: &CommandSpec, args: &[String], mode: OutputMode) -> Result<()> {
    debug!(program = %spec.program, ?args, "spawning external process");

    let mut command = Command::new(&spec.program);
    command.args(args).kill_on_drop(true);

    match mode {
        OutputMode::Inherit => {
            command
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit());
        }
        OutputMode::Capture => {
            command
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::inherit());
        }
    }

    let child = command.spawn().map_err(|source| DiagramError::Spawn {
        program: spec.program.clone(),
        source,
    })?;

    // Dropping the wait future on timeout drops the child, which kills it.
    let wait = child.wait_with_output();
    let output = match spec.timeout {
        Some(limit) => match tokio::time::timeout(limit, wait).await {
            Ok(result) => result,
            Err(_) => {
                return Err(DiagramError::Timeout {
                    program: spec.program.clone(),
                    seconds: limit.as_secs(),
                });
            }
        },
        None => wait.await,
    }
    .map_err(|e| DiagramError::ExternalProcess {
        program: spec.program.clone(),
        status: format!("wait failed: {e}"),
    })?;

    if mode == OutputMode::Capture {
        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            debug!(program = %spec.program, "{line}");
        }
    }

    if !output.status.success() {
        return Err(DiagramError::ExternalProcess {
            program: spec.program.clone(),
            status: output.status.to_string(),
        });
    }

    info!(program = %spec.program, "external process finished");
    Ok(())
}
