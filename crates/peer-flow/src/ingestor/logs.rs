use crate::Result;
use mockall::automock;
use std::{fs, io::ErrorKind, path::Path};

/// Read access to rebalance job logs.
#[automock]
pub trait LogReader {
    /// Last non-empty line of the log at `path`, `None` when the file does
    /// not exist or holds only blank lines.
    fn last_line(&self, path: &Path) -> Result<Option<String>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FsLogReader;

impl LogReader for FsLogReader {
    fn last_line(&self, path: &Path) -> Result<Option<String>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Ok(String::from_utf8_lossy(&bytes)
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_last_non_empty_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "starting rebalance\nprobing route 1\n  evaluating 250 ppm  \n\n\n").unwrap();

        let line = FsLogReader.last_line(file.path()).unwrap();
        assert_eq!(line.as_deref(), Some("evaluating 250 ppm"));
    }

    #[test]
    fn test_blank_and_missing_logs() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(FsLogReader.last_line(file.path()).unwrap(), None);

        let missing = Path::new("/nonexistent/peer-flow/rebalance_a_b.log");
        assert_eq!(FsLogReader.last_line(missing).unwrap(), None);
    }
}
