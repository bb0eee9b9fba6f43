//! Error taxonomy for binding derivation.
//!
//! Path-level and line-level failures are recovered where they occur (the
//! offending record is skipped). Artifact- and language-level failures are
//! collected into the run summary. Aggregation and output failures abort the
//! run.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BindingError {
    /// The raw path could not be normalized (empty, NUL byte, ...).
    #[error("invalid path {raw:?}: {reason}")]
    InvalidPath { raw: String, reason: &'static str },

    /// An expected log or `.paths` artifact is absent or unreadable.
    #[error("missing artifact {}: {source}", path.display())]
    MissingArtifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No language produced a single artifact; emitting an empty policy
    /// would look deceptively safe.
    #[error("no language produced any binding artifacts")]
    NoData,

    /// The external probing harness exited unsuccessfully for a language.
    #[error("probe for {lang} failed: {detail}")]
    ProbeFailure { lang: String, detail: String },

    /// Output destination could not be written.
    #[error("cannot write {}: {source}", path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Caller supplied an identifier that cannot be used in a file name.
    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),

    #[error("malformed artifact record {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl BindingError {
    pub(crate) fn invalid_path(raw: &str, reason: &'static str) -> Self {
        Self::InvalidPath {
            raw: raw.to_string(),
            reason,
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::WriteFailure {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn missing(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::MissingArtifact {
            path: path.into(),
            source,
        }
    }

    /// Whether this error must abort the whole run rather than a single
    /// exercise or language.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NoData | Self::WriteFailure { .. })
    }
}

pub type Result<T> = std::result::Result<T, BindingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification() {
        assert!(BindingError::NoData.is_fatal());
        assert!(
            BindingError::write("/x", std::io::Error::other("ro")).is_fatal()
        );
        assert!(!BindingError::invalid_path("", "empty").is_fatal());
        assert!(
            !BindingError::ProbeFailure {
                lang: "java".into(),
                detail: "rc=1".into()
            }
            .is_fatal()
        );
    }

    #[test]
    fn messages_name_the_subject() {
        let err = BindingError::missing("/logs/java/ex1", std::io::Error::other("gone"));
        assert!(err.to_string().contains("/logs/java/ex1"));

        let err = BindingError::invalid_path("  ", "empty path");
        assert!(err.to_string().contains("empty path"));
    }
}
