//! Archive retrieval from the local filesystem.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use ccx_pipeline_consumer::Downloader;
use tracing::debug;

/// Resolves `file://` or plain path locators to existing local files.
///
/// Relative paths are taken relative to `root` when one is configured.
#[derive(Debug, Clone, Default)]
pub struct LocalDownloader {
    root: Option<PathBuf>,
}

impl LocalDownloader {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    fn resolve(&self, url: &str) -> anyhow::Result<PathBuf> {
        let path = match url.split_once("://") {
            Some(("file", rest)) => Path::new(rest),
            Some((scheme, _)) => anyhow::bail!("unsupported locator scheme '{scheme}': {url}"),
            None => Path::new(url),
        };

        Ok(match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        })
    }
}

#[async_trait]
impl Downloader for LocalDownloader {
    async fn download(&self, url: &str) -> anyhow::Result<PathBuf> {
        let path = self.resolve(url)?;
        let metadata = tokio::fs::metadata(&path)
            .await
            .with_context(|| format!("archive {} is not accessible", path.display()))?;
        if !metadata.is_file() {
            anyhow::bail!("archive {} is not a regular file", path.display());
        }

        debug!(archive = %path.display(), size = metadata.len(), "Archive located");
        Ok(path)
    }
}
