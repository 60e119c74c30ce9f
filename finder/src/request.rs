use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::enumerate::NamePattern;
use crate::errors::{FinderError, FinderResult};
use crate::search::matcher::NeedleMatcher;

/// The four inputs of a scan. Immutable once handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    /// Directory to walk
    pub root_path: PathBuf,
    /// Glob matched against each file's base name
    pub name_pattern: String,
    /// Text to look for, compared case-insensitively
    pub needle: String,
    /// Upper bound on concurrently processed files
    pub max_parallelism: usize,
}

/// A request that passed validation, with its pattern and needle compiled.
#[derive(Debug, Clone)]
pub(crate) struct ValidatedRequest {
    pub root_path: PathBuf,
    pub pattern: NamePattern,
    pub matcher: NeedleMatcher,
    pub max_parallelism: usize,
}

impl ScanRequest {
    pub fn new(
        root_path: impl Into<PathBuf>,
        name_pattern: impl Into<String>,
        needle: impl Into<String>,
        max_parallelism: usize,
    ) -> Self {
        Self {
            root_path: root_path.into(),
            name_pattern: name_pattern.into(),
            needle: needle.into(),
            max_parallelism,
        }
    }

    /// Checks every field without touching the filesystem.
    pub fn validate(&self) -> FinderResult<()> {
        self.compile().map(|_| ())
    }

    pub(crate) fn compile(&self) -> FinderResult<ValidatedRequest> {
        if self.root_path.as_os_str().is_empty() {
            return Err(FinderError::validation("root path must not be empty"));
        }
        if self.name_pattern.is_empty() {
            return Err(FinderError::validation("name pattern must not be empty"));
        }
        if self.needle.is_empty() {
            return Err(FinderError::validation("needle must not be empty"));
        }
        if self.max_parallelism == 0 {
            return Err(FinderError::validation(
                "max parallelism must be at least 1",
            ));
        }

        Ok(ValidatedRequest {
            root_path: self.root_path.clone(),
            pattern: NamePattern::new(&self.name_pattern)?,
            matcher: NeedleMatcher::new(&self.needle),
            max_parallelism: self.max_parallelism,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ScanRequest {
        ScanRequest::new("/does/not/matter", "*.txt", "log4net", 4)
    }

    #[test]
    fn test_valid_request() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_empty_fields_rejected() {
        let cases = [
            ScanRequest {
                root_path: PathBuf::new(),
                ..valid()
            },
            ScanRequest {
                name_pattern: String::new(),
                ..valid()
            },
            ScanRequest {
                needle: String::new(),
                ..valid()
            },
            ScanRequest {
                max_parallelism: 0,
                ..valid()
            },
        ];

        for request in cases {
            let err = request.validate().unwrap_err();
            assert!(
                matches!(err, FinderError::Validation(_)),
                "unexpected error for {request:?}: {err}"
            );
        }
    }

    #[test]
    fn test_malformed_glob_rejected() {
        let request = ScanRequest {
            name_pattern: "[*.txt".to_string(),
            ..valid()
        };
        assert!(matches!(
            request.validate(),
            Err(FinderError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_nonexistent_root_is_not_a_validation_error() {
        // Existence is the enumerator's concern, not the validator's.
        let request = ScanRequest::new("/definitely/not/here", "*", "x", 1);
        assert!(request.validate().is_ok());
    }
}
