//! Processing engine delegating to an external executable.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::Context;
use async_trait::async_trait;
use ccx_pipeline_consumer::{Engine, EngineWatcher};
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs `<program> [args...] <archive> <extraction dir>` and takes its
/// standard output as the JSON-encoded report.
///
/// The extraction directory is created fresh for every archive and removed
/// once the command has finished and the watchers have been notified.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandEngine {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl Engine for CommandEngine {
    async fn process(&self, archive: &Path, watcher: &dyn EngineWatcher) -> anyhow::Result<String> {
        let extract_dir = tempfile::Builder::new()
            .prefix("ccx-archive-")
            .tempdir()
            .context("unable to create the extraction directory")?;

        debug!(
            program = %self.program.display(),
            archive = %archive.display(),
            "Running the processing engine"
        );
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(archive)
            .arg(extract_dir.path())
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("unable to run {}", self.program.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            );
        }
        if !output.stderr.is_empty() {
            warn!("{}", String::from_utf8_lossy(&output.stderr).trim());
        }

        watcher.on_extract(extract_dir.path());

        let report = String::from_utf8(output.stdout).context("engine output is not UTF-8")?;
        Ok(report.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ExtractRecorder {
        ids: Mutex<Vec<String>>,
    }

    impl EngineWatcher for ExtractRecorder {
        fn on_extract(&self, root: &Path) {
            let id = std::fs::read_to_string(root.join("config").join("id")).unwrap_or_default();
            self.ids.lock().unwrap().push(id);
        }
    }

    fn shell(script: &str) -> CommandEngine {
        CommandEngine::new("sh", vec!["-c".to_string(), script.to_string(), "engine".to_string()])
    }

    #[tokio::test]
    async fn test_stdout_is_the_report() {
        let engine = shell(r#"mkdir "$2/config" && printf cluster-id > "$2/config/id" && echo "{\"archive\":\"$1\"}""#);
        let watcher = ExtractRecorder::default();

        let report = engine
            .process(Path::new("/tmp/archive.tar.gz"), &watcher)
            .await
            .unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&report).unwrap();
        assert_eq!(parsed["archive"], "/tmp/archive.tar.gz");
        assert_eq!(*watcher.ids.lock().unwrap(), vec!["cluster-id".to_string()]);
    }

    #[tokio::test]
    async fn test_failing_command_is_an_error() {
        let watcher = ExtractRecorder::default();

        let err = shell("echo broken archive >&2; exit 3")
            .process(Path::new("archive.tar.gz"), &watcher)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("broken archive"));
        assert!(watcher.ids.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let engine = CommandEngine::new("/nonexistent/ccx-engine", Vec::new());
        let err = engine
            .process(Path::new("archive.tar.gz"), &ExtractRecorder::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unable to run"));
    }
}
