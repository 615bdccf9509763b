//! Generated File Output
//!
//! Every artifact goes through [`OutputWriter`]: files whose content is
//! unchanged are left alone, and in validate mode nothing is written at all.
//! Any difference is reported as a unified diff and fails the run instead.

use std::fs;
use std::path::{Path, PathBuf};

use similar::TextDiff;
use tracing::{error, info, warn};

use crate::error::{Result, SchemaGenError};

/// What happened to one output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Unchanged,
    Wrote,
    /// The write failed; the error was logged and generation continued.
    Failed,
}

#[derive(Debug, Default)]
pub struct OutputWriter {
    validate: bool,
    outcomes: Vec<(PathBuf, WriteOutcome)>,
}

impl OutputWriter {
    pub fn new(validate: bool) -> Self {
        Self {
            validate,
            outcomes: Vec::new(),
        }
    }

    pub fn is_validating(&self) -> bool {
        self.validate
    }

    /// Per-file results in write order.
    pub fn outcomes(&self) -> &[(PathBuf, WriteOutcome)] {
        &self.outcomes
    }

    pub fn outcome(&self, path: &Path) -> Option<WriteOutcome> {
        self.outcomes
            .iter()
            .rev()
            .find(|(p, _)| p == path)
            .map(|(_, o)| *o)
    }

    /// Write `content` to `path` unless it already holds exactly that text.
    ///
    /// A trailing newline is appended to non-empty content that lacks one.
    pub fn write(&mut self, path: &Path, content: &str) -> Result<WriteOutcome> {
        let mut content = content.to_string();
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }

        let outcome = if path.exists() {
            let existing = fs::read_to_string(path)?;
            if existing == content {
                info!("unchanged {}", path.display());
                WriteOutcome::Unchanged
            } else if self.validate {
                let diff = TextDiff::from_lines(&existing, &content);
                warn!(
                    "Diff:\n{}",
                    diff.unified_diff()
                        .header(&path.display().to_string(), &path.display().to_string())
                );
                return Err(SchemaGenError::ValidationFailed {
                    path: path.to_path_buf(),
                    reason: "diffs found".to_string(),
                });
            } else {
                self.write_file(path, &content)
            }
        } else if self.validate {
            let name = path.file_name().map(PathBuf::from).unwrap_or_default();
            return Err(SchemaGenError::ValidationFailed {
                path: name,
                reason: "file does not exist".to_string(),
            });
        } else {
            self.write_file(path, &content)
        };

        self.outcomes.push((path.to_path_buf(), outcome));
        Ok(outcome)
    }

    fn write_file(&self, path: &Path, content: &str) -> WriteOutcome {
        match fs::write(path, content) {
            Ok(()) => {
                info!("    wrote {}", path.display());
                WriteOutcome::Wrote
            }
            Err(e) => {
                error!("Unable to write {}: {}", path.display(), e);
                WriteOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_then_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tokens.h");
        let mut writer = OutputWriter::new(false);

        assert_eq!(writer.write(&path, "abc").unwrap(), WriteOutcome::Wrote);
        assert_eq!(fs::read_to_string(&path).unwrap(), "abc\n");
        assert_eq!(writer.write(&path, "abc\n").unwrap(), WriteOutcome::Unchanged);
        assert_eq!(writer.outcome(&path), Some(WriteOutcome::Unchanged));
        assert_eq!(writer.outcomes().len(), 2);
    }

    #[test]
    fn test_validate_reports_diff_without_writing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("api.h");
        fs::write(&path, "old\n").unwrap();

        let mut writer = OutputWriter::new(true);
        let err = writer.write(&path, "new\n").unwrap_err();
        assert!(err.to_string().starts_with("validation failed, diffs found"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "old\n");
        assert_eq!(writer.write(&path, "old").unwrap(), WriteOutcome::Unchanged);
    }

    #[test]
    fn test_validate_missing_file() {
        let dir = tempdir().unwrap();
        let mut writer = OutputWriter::new(true);
        let err = writer.write(&dir.path().join("plugInfo.json"), "{}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "validation failed, file does not exist: plugInfo.json. Please rerun schemagen."
        );
    }

    #[test]
    fn test_unwritable_path_is_not_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("foo.h");
        let mut writer = OutputWriter::new(false);
        assert_eq!(writer.write(&path, "x").unwrap(), WriteOutcome::Failed);
    }
}
