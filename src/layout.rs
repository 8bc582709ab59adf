//! On-disk output tree for one run, partitioned by track so no path is ever
//! written by both.
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const QIIME_TRACK: &str = "qiime";
pub const DADA2_TRACK: &str = "dada2";

#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: PathBuf) -> Self {
        OutputLayout { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn track_dir(&self, track: &str) -> PathBuf {
        self.root.join(track)
    }

    pub fn log_dir(&self, track: &str) -> PathBuf {
        self.root.join("logs").join(track)
    }

    pub fn report_path(&self) -> PathBuf {
        self.root.join("run_report.json")
    }

    /// Create the per-track directories up front so stage output paths have
    /// existing parents.
    pub fn create(&self) -> Result<()> {
        for track in [QIIME_TRACK, DADA2_TRACK] {
            let dir = self.track_dir(track);
            fs::create_dir_all(&dir)
                .with_context(|| format!("create output dir {}", dir.display()))?;
            let logs = self.log_dir(track);
            fs::create_dir_all(&logs)
                .with_context(|| format!("create log dir {}", logs.display()))?;
        }
        Ok(())
    }
}
