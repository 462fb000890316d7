//! Writes run artifacts to a timestamped directory.

use super::{ResultSink, SinkReceipt};
use crate::core::StageStatus;
use crate::errors::BddflowError;
use crate::pipeline::{PipelineDefinition, PipelineRun};
use crate::utils::{directory_stamp, short_id};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

/// Name of the combined report.
pub const REPORT_FILE: &str = "result.md";
/// Name of the run manifest.
pub const MANIFEST_FILE: &str = "run.json";

/// One artifact listed in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    /// Stage that produced it.
    pub stage_id: String,
    /// File name inside the run directory.
    pub file: String,
    /// Size in bytes.
    pub bytes: usize,
    /// Hex SHA-256 of the content.
    pub sha256: String,
}

/// Contents of `run.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// The serialized run.
    pub run: PipelineRun,
    /// Artifacts written for succeeded stages.
    pub artifacts: Vec<ArtifactEntry>,
}

/// Persists each run into `<root>/<YYYYmmdd_HHMMSS>_<run id prefix>/`.
///
/// Writes one artifact per succeeded stage, a combined `result.md` and a
/// `run.json` manifest with checksums.
#[derive(Debug, Clone)]
pub struct FileResultSink {
    root: PathBuf,
}

impl FileResultSink {
    /// Creates a sink rooted at `root`. The directory is created on demand.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory a run is written to.
    #[must_use]
    pub fn run_dir(&self, run: &PipelineRun) -> PathBuf {
        self.root.join(format!(
            "{}_{}",
            directory_stamp(&run.started_at),
            short_id(&run.run_id)
        ))
    }
}

fn sha256_hex(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Renders the combined Markdown report.
#[must_use]
pub fn render_report(run: &PipelineRun, definition: &PipelineDefinition) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}\n", definition.name());
    let _ = writeln!(out, "- Run: `{}`", run.run_id);
    let _ = writeln!(out, "- Status: {}", run.status);
    let _ = writeln!(out, "- Started: {}", run.started_at.to_rfc3339());
    if let Some(reason) = &run.cancellation_reason {
        let _ = writeln!(out, "- Cancelled: {reason}");
    }

    for result in &run.stages {
        let title = definition
            .stage(&result.stage_id)
            .map_or(result.stage_id.as_str(), |s| s.display_title());
        let _ = write!(out, "\n## {title}\n\n");

        match result.status() {
            StageStatus::Succeeded => {
                let _ = writeln!(out, "{}", result.output().unwrap_or_default().trim_end());
            }
            StageStatus::Failed => {
                if let Some(error) = result.error() {
                    let _ = writeln!(out, "**Failed** ({}): {}", error.kind, error.message);
                }
            }
            status => {
                let _ = writeln!(
                    out,
                    "_{status}: {}_",
                    result.reason().unwrap_or("not executed")
                );
            }
        }
    }
    out
}

#[async_trait]
impl ResultSink for FileResultSink {
    async fn persist(
        &self,
        run: &PipelineRun,
        definition: &PipelineDefinition,
    ) -> Result<SinkReceipt, BddflowError> {
        let dir = self.run_dir(run);
        tokio::fs::create_dir_all(&dir).await?;

        let mut files = Vec::new();
        let mut artifacts = Vec::new();

        for result in &run.stages {
            let Some(output) = result.output() else {
                continue;
            };
            let file = definition
                .stage(&result.stage_id)
                .map_or_else(|| format!("{}.md", result.stage_id), |s| s.artifact_file_name());
            let path = dir.join(&file);
            tokio::fs::write(&path, output).await?;

            artifacts.push(ArtifactEntry {
                stage_id: result.stage_id.clone(),
                file,
                bytes: output.len(),
                sha256: sha256_hex(output.as_bytes()),
            });
            files.push(path);
        }

        let report_path = dir.join(REPORT_FILE);
        tokio::fs::write(&report_path, render_report(run, definition)).await?;
        files.push(report_path);

        let manifest = RunManifest {
            run: run.clone(),
            artifacts,
        };
        let manifest_path = dir.join(MANIFEST_FILE);
        tokio::fs::write(&manifest_path, serde_json::to_vec_pretty(&manifest)?).await?;
        files.push(manifest_path);

        info!(run_id = %run.run_id, dir = %dir.display(), files = files.len(), "Run persisted");

        Ok(SinkReceipt {
            location: Some(dir),
            files,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ErrorKind, RunStatus};
    use crate::errors::ErrorDetail;
    use crate::pipeline::{bdd_pipeline, stage_ids, PipelineRunner};
    use crate::testing::StubExecutor;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    async fn partial_run() -> (PipelineRun, PipelineDefinition) {
        let executor = StubExecutor::new()
            .with_output(stage_ids::DOMAIN_STORY, "# Domain")
            .with_output(stage_ids::USER_STORIES, "As a baker")
            .fail_on(
                stage_ids::SCENARIOS,
                ErrorDetail::new(ErrorKind::RateLimited, "quota exhausted"),
            );
        let runner = PipelineRunner::new(bdd_pipeline().unwrap(), Arc::new(executor));
        let run = runner.run("A bakery sells bread.").await.unwrap();
        (run, bdd_pipeline().unwrap())
    }

    #[tokio::test]
    async fn test_file_sink_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = FileResultSink::new(tmp.path());
        let (run, definition) = partial_run().await;

        let receipt = sink.persist(&run, &definition).await.unwrap();

        let dir = receipt.location.unwrap();
        assert_eq!(dir, sink.run_dir(&run));
        let name = dir.file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.ends_with(&format!("_{}", short_id(&run.run_id))));
        assert_eq!(name.len(), "YYYYmmdd_HHMMSS_".len() + 8);

        assert_eq!(
            std::fs::read_to_string(dir.join("domain_storytelling.md")).unwrap(),
            "# Domain"
        );
        assert_eq!(
            std::fs::read_to_string(dir.join("user_stories.md")).unwrap(),
            "As a baker"
        );
        assert!(!dir.join("scenarios.feature").exists());
        assert_eq!(receipt.files.len(), 4);
    }

    #[tokio::test]
    async fn test_report_and_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = FileResultSink::new(tmp.path());
        let (run, definition) = partial_run().await;

        let dir = sink.persist(&run, &definition).await.unwrap().location.unwrap();

        let report = std::fs::read_to_string(dir.join(REPORT_FILE)).unwrap();
        assert!(report.contains("## Domain Storytelling\n\n# Domain"));
        assert!(report.contains("## BDD Scenarios\n\n**Failed** (rate_limited): quota exhausted"));
        assert!(report.contains("## Code Review\n\n_skipped:"));

        let manifest: RunManifest =
            serde_json::from_slice(&std::fs::read(dir.join(MANIFEST_FILE)).unwrap()).unwrap();
        assert_eq!(manifest.run.run_id, run.run_id);
        assert_eq!(manifest.run.status, RunStatus::PartiallyFailed);
        assert_eq!(manifest.artifacts.len(), 2);
        assert_eq!(manifest.artifacts[0].file, "domain_storytelling.md");
        assert_eq!(manifest.artifacts[0].sha256, sha256_hex(b"# Domain"));
        assert_eq!(manifest.artifacts[0].bytes, 8);
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
