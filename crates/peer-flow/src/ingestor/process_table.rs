use crate::{Error, Result};
use mockall::automock;
use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};
use tracing::debug;

/// Source of the raw, newline-separated process listing.
#[automock]
pub trait ProcessTable {
    fn snapshot(&self) -> Result<String>;
}

/// Live listing from `ps -ef`
#[derive(Debug, Clone, Copy, Default)]
pub struct PsProcessTable;

impl ProcessTable for PsProcessTable {
    fn snapshot(&self) -> Result<String> {
        let output = Command::new("ps")
            .arg("-ef")
            .output()
            .map_err(|e| Error::ProcessTable(format!("failed to run ps: {e}")))?;

        if !output.status.success() {
            return Err(Error::ProcessTable(format!(
                "ps exited with {}",
                output.status
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(lines = text.lines().count(), "read process table");
        Ok(text)
    }
}

/// A listing captured to a file earlier
#[derive(Debug, Clone)]
pub struct FileProcessTable {
    path: PathBuf,
}

impl FileProcessTable {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ProcessTable for FileProcessTable {
    fn snapshot(&self) -> Result<String> {
        Ok(fs::read_to_string(&self.path)?)
    }
}
