//! Document → diagram generation.
//!
//! The generator writes into an output directory under a name of its own
//! choosing; [`generate_diagram`] reconciles whatever it produced to the
//! deterministic `{base}.mmd` name.

use std::future::Future;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use apidiagram_shared::{DIAGRAM_EXTENSION, DiagramError, GeneratorConfig, Result};

use crate::normalize::TransformInput;
use crate::process::{CommandSpec, OutputMode, run_with_retry};
use crate::reconcile::{DirectorySnapshot, identify_produced};

/// Turns a transform input into one diagram file inside `output_dir`.
pub trait DiagramGenerator: Send + Sync {
    fn generate(
        &self,
        input: &TransformInput,
        output_dir: &Path,
        base_name: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Generator backed by an external command.
///
/// Placeholders: `{input}`, `{output_dir}`, `{name}`.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    spec: CommandSpec,
}

impl CommandGenerator {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }

    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self::new(CommandSpec::from_generator(config))
    }
}

impl DiagramGenerator for CommandGenerator {
    async fn generate(&self, input: &TransformInput, output_dir: &Path, base_name: &str) -> Result<()> {
        let input = input.to_string();
        let output_dir = output_dir.to_string_lossy();
        let args = self.spec.expand(&[
            ("input", input.as_str()),
            ("output_dir", output_dir.as_ref()),
            ("name", base_name),
        ]);
        run_with_retry(&self.spec, &args, OutputMode::Capture).await
    }
}

/// Run `generator` and rename its output to `{output_dir}/{base_name}.mmd`.
///
/// Files other than the chosen one are left untouched.
#[instrument(skip_all, fields(output_dir = %output_dir.display(), base = base_name))]
pub async fn generate_diagram<G: DiagramGenerator>(
    generator: &G,
    input: &TransformInput,
    output_dir: &Path,
    base_name: &str,
) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir).map_err(|e| DiagramError::io(output_dir, e))?;

    let before = DirectorySnapshot::capture(output_dir)?;
    generator.generate(input, output_dir, base_name).await?;
    let after = DirectorySnapshot::capture(output_dir)?;

    let produced =
        identify_produced(&before, &after).ok_or_else(|| DiagramError::ArtifactIdentification {
            directory: output_dir.to_path_buf(),
        })?;
    debug!(file = %produced.file_name, selection = ?produced.selection, "identified generated diagram");

    let target = output_dir.join(format!("{base_name}.{DIAGRAM_EXTENSION}"));
    let source = output_dir.join(&produced.file_name);
    if source != target {
        std::fs::rename(&source, &target).map_err(|e| DiagramError::io(&source, e))?;
    }

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "apidiagram-generate-test-{}",
            uuid::Uuid::now_v7()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Writes the listed files with fixed modification times.
    struct FakeGenerator {
        files: Vec<(&'static str, u64)>,
    }

    impl DiagramGenerator for FakeGenerator {
        async fn generate(&self, _input: &TransformInput, output_dir: &Path, _base: &str) -> Result<()> {
            for (name, secs) in &self.files {
                let path = output_dir.join(name);
                std::fs::write(&path, format!("graph TD\n%% {name}\n")).unwrap();
                let file = std::fs::File::options().write(true).open(&path).unwrap();
                file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(*secs))
                    .unwrap();
            }
            Ok(())
        }
    }

    fn input() -> TransformInput {
        TransformInput::Path("/tmp/api.json".into())
    }

    #[tokio::test]
    async fn single_output_is_renamed_to_base_name() {
        let tmp = temp_dir();
        let out = tmp.join("mmd/a");
        let generator = FakeGenerator {
            files: vec![("output.mmd", 1_000)],
        };

        let path = generate_diagram(&generator, &input(), &out, "b").await.unwrap();
        assert_eq!(path, out.join("b.mmd"));
        assert!(path.exists());
        assert!(!out.join("output.mmd").exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn newest_of_multiple_outputs_wins_and_others_stay() {
        let tmp = temp_dir();
        let out = tmp.join("mmd");
        let generator = FakeGenerator {
            files: vec![("x.mmd", 1_000), ("y.mmd", 2_000)],
        };

        let path = generate_diagram(&generator, &input(), &out, "api").await.unwrap();
        assert_eq!(path, out.join("api.mmd"));
        assert!(std::fs::read_to_string(&path).unwrap().contains("y.mmd"));
        assert!(out.join("x.mmd").exists());
        assert!(!out.join("y.mmd").exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn in_place_overwrite_keeps_the_name() {
        let tmp = temp_dir();
        let out = tmp.join("mmd");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("api.mmd"), "stale").unwrap();

        let generator = FakeGenerator {
            files: vec![("api.mmd", 5_000)],
        };
        let path = generate_diagram(&generator, &input(), &out, "api").await.unwrap();
        assert_eq!(path, out.join("api.mmd"));
        assert!(std::fs::read_to_string(&path).unwrap().contains("graph TD"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn nothing_produced_is_an_identification_error() {
        let tmp = temp_dir();
        let out = tmp.join("mmd");
        let generator = FakeGenerator { files: vec![] };

        let err = generate_diagram(&generator, &input(), &out, "api")
            .await
            .unwrap_err();
        match err {
            DiagramError::ArtifactIdentification { directory } => assert_eq!(directory, out),
            other => panic!("expected ArtifactIdentification, got {other:?}"),
        }

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_generator_expands_placeholders() {
        let tmp = temp_dir();
        let out = tmp.join("mmd");
        let spec = CommandSpec::new(
            "sh",
            &[
                "-c",
                r#"printf 'graph TD\n%%%% %s\n' "$1" > "$2/generated.mmd""#,
                "sh",
                "{input}",
                "{output_dir}",
            ],
        );
        let generator = CommandGenerator::new(spec);

        let path = generate_diagram(&generator, &input(), &out, "api").await.unwrap();
        assert_eq!(path, out.join("api.mmd"));
        assert!(std::fs::read_to_string(&path).unwrap().contains("/tmp/api.json"));

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
