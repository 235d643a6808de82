//! Writing generated artifacts

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

/// Writes artifacts under an output directory, or prints them on a dry run
pub struct OutputWriter {
    root: PathBuf,
    dry_run: bool,
}

impl OutputWriter {
    pub fn new(root: impl Into<PathBuf>, dry_run: bool) -> Self {
        Self {
            root: root.into(),
            dry_run,
        }
    }

    /// Write `content` to `relative` under the output directory
    pub async fn write(&self, relative: impl AsRef<Path>, content: &str) -> Result<PathBuf> {
        let path = self.root.join(relative);

        if self.dry_run {
            println!("\n--- {} ---", path.display());
            println!("{}", content);
            return Ok(path);
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write file {}", path.display()))?;

        info!("Wrote {}", path.display());
        Ok(path)
    }
}
