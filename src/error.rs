use std::path::PathBuf;

use thiserror::Error;

use crate::locator::SetRole;

/// Error taxonomy surfaced by the comparison pipeline.
///
/// Only root-level and output failures abort a run. `DimensionMismatch` and
/// `ArtifactDecode` are absorbed per key by the alignment engine.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("{role} root {} cannot be read: {source}", .path.display())]
    InputRootUnreadable {
        role: SetRole,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "dimension mismatch: source {}x{}, reference {}x{}",
        .source_dims.0,
        .source_dims.1,
        .reference_dims.0,
        .reference_dims.1
    )]
    DimensionMismatch {
        source_dims: (u32, u32),
        reference_dims: (u32, u32),
    },

    #[error("failed to decode artifact {}: {source}", .path.display())]
    ArtifactDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("emulator version {version:?} not found under {}", .root.display())]
    UnknownEmulatorVersion { version: String, root: PathBuf },

    #[error("known issues file {} is unusable: {message}", .path.display())]
    KnownIssuesUnreadable { path: PathBuf, message: String },

    #[error("threshold {0} is outside [0, 1]")]
    InvalidThreshold(f64),

    #[error("failed to write {}: {message}", .path.display())]
    OutputWrite { path: PathBuf, message: String },
}

impl ReportError {
    /// Stable code handed to the invoking collaborator.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InputRootUnreadable { .. } => "INPUT_ROOT_UNREADABLE",
            Self::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            Self::ArtifactDecode { .. } => "ARTIFACT_DECODE_ERROR",
            Self::UnknownEmulatorVersion { .. } => "UNKNOWN_EMULATOR_VERSION",
            Self::KnownIssuesUnreadable { .. } => "KNOWN_ISSUES_UNREADABLE",
            Self::InvalidThreshold(_) => "INVALID_THRESHOLD",
            Self::OutputWrite { .. } => "OUTPUT_WRITE_FAILED",
        }
    }

    /// Whether the error aborts the whole run.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::DimensionMismatch { .. } | Self::ArtifactDecode { .. }
        )
    }

    pub(crate) fn output_write(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::OutputWrite {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

pub type Result<T, E = ReportError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_key_errors_are_not_fatal() {
        let mismatch = ReportError::DimensionMismatch {
            source_dims: (64, 64),
            reference_dims: (128, 128),
        };
        assert!(!mismatch.is_fatal());
        assert_eq!(mismatch.code(), "DIMENSION_MISMATCH");
        assert_eq!(
            mismatch.to_string(),
            "dimension mismatch: source 64x64, reference 128x128"
        );

        let unreadable = ReportError::InputRootUnreadable {
            role: SetRole::Source,
            path: PathBuf::from("/nope"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(unreadable.is_fatal());
        assert_eq!(unreadable.code(), "INPUT_ROOT_UNREADABLE");

        let unknown = ReportError::UnknownEmulatorVersion {
            version: "typo".to_string(),
            root: PathBuf::from("/goldens"),
        };
        assert!(unknown.is_fatal());
        assert_eq!(unknown.code(), "UNKNOWN_EMULATOR_VERSION");
    }
}
