//! Question feeds
//!
//! The source `republish_all` reads batches from. The production feed is a
//! directory of JSON files, one batch per file, published in file-name order.

use async_trait::async_trait;
use hunt_common::db::QuestionGroupInput;
use hunt_common::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

#[async_trait]
pub trait QuestionFeed: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Fetch every batch, in publication order
    async fn fetch_batches(&self) -> Result<Vec<QuestionGroupInput>>;
}

/// Reads `*.json` batch files from a directory
#[derive(Debug, Clone)]
pub struct DirectoryFeed {
    dir: PathBuf,
}

impl DirectoryFeed {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl QuestionFeed for DirectoryFeed {
    fn name(&self) -> &str {
        "directory"
    }

    async fn fetch_batches(&self) -> Result<Vec<QuestionGroupInput>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(|e| {
            Error::Config(format!("Cannot read feed directory {}: {}", self.dir.display(), e))
        })?;

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut batches = Vec::with_capacity(paths.len());
        for path in paths {
            debug!(file = %path.display(), "Reading question batch");
            batches.push(read_batch_file(&path).await?);
        }

        Ok(batches)
    }
}

/// Batches held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticFeed {
    batches: Vec<QuestionGroupInput>,
}

impl StaticFeed {
    pub fn new(batches: Vec<QuestionGroupInput>) -> Self {
        Self { batches }
    }
}

#[async_trait]
impl QuestionFeed for StaticFeed {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch_batches(&self) -> Result<Vec<QuestionGroupInput>> {
        Ok(self.batches.clone())
    }
}

/// Parse a single batch file
pub async fn read_batch_file(path: &Path) -> Result<QuestionGroupInput> {
    let content = tokio::fs::read_to_string(path).await?;
    serde_json::from_str(&content)
        .map_err(|e| Error::InvalidInput(format!("{}: {}", path.display(), e)))
}
