//! Errors raised by stages and by the pipeline's result accessors.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::ModelKind;

/// Errors that can occur while building or running a pipeline.
///
/// Accessor errors ([`UnknownStageReference`](Self::UnknownStageReference),
/// [`MissingExpectedResult`](Self::MissingExpectedResult),
/// [`ResultTypeMismatch`](Self::ResultTypeMismatch)) are returned to the
/// calling stage. When a stage propagates any error with `?`, the pipeline
/// records it wrapped in [`StageExecutionFailure`](Self::StageExecutionFailure)
/// against that stage.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A referenced stage name is not defined in the pipeline.
    #[error("no stage named '{name}' in the pipeline")]
    UnknownStageReference {
        /// The referenced name.
        name: String,
    },

    /// A hard dependency produced no result this run.
    #[error("stage '{name}' produced no result")]
    MissingExpectedResult {
        /// The referenced stage name.
        name: String,
    },

    /// A model was retrieved as a different logical type than was stored.
    #[error("stage '{stage}' holds a {found} model, expected a {expected}")]
    ResultTypeMismatch {
        /// The stage whose model was retrieved.
        stage: String,
        /// The caller-asserted type.
        expected: ModelKind,
        /// The stored type.
        found: ModelKind,
    },

    /// A stage failed during its turn.
    #[error("stage '{stage}' failed")]
    StageExecutionFailure {
        /// Name of the failing stage.
        stage: String,
        /// What went wrong.
        #[source]
        source: Box<PipelineError>,
    },

    /// Context or an external resource is not available this run.
    ///
    /// Non-fatal: stages resolve this by producing no result.
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// A stage option holds a malformed value.
    #[error("invalid stage configuration: {0}")]
    InvalidConfig(String),

    /// Two stages were registered under the same name.
    #[error("a stage named '{0}' already exists")]
    DuplicateStageName(String),

    /// The stage needs a working image and none is present.
    #[error("no working image")]
    NoWorkingImage,

    /// The working image has a layout the stage cannot handle.
    #[error("unsupported image: {0}")]
    UnsupportedImage(String),

    /// A model holds geometry the stage cannot handle.
    #[error("unsupported model: {0}")]
    UnsupportedModel(String),

    /// Failed to decode an image file.
    #[error("failed to decode image")]
    ImageDecode(#[from] image::ImageError),

    /// Failed to access a file.
    #[error("failed to read {path}")]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// Wrap `cause` as the recorded failure of `stage`.
    #[must_use]
    pub fn stage_failure(stage: impl Into<String>, cause: Self) -> Self {
        Self::StageExecutionFailure {
            stage: stage.into(),
            source: Box::new(cause),
        }
    }

    /// The innermost cause, unwrapping nested stage failures.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        let mut current = self;
        while let Self::StageExecutionFailure { source, .. } = current {
            current = source;
        }
        current
    }

    /// This error followed by each underlying cause, joined with `": "`.
    ///
    /// `Display` shows only the outermost error; reports use this to show
    /// the whole chain on one line.
    #[must_use]
    pub fn chain_message(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }

    /// Whether this error means "no result" rather than a failure.
    #[must_use]
    pub const fn is_soft(&self) -> bool {
        matches!(self, Self::ResourceUnavailable(_))
    }
}

/// Serializable summary of a [`PipelineError`].
///
/// `image::ImageError` and `std::io::Error` do not implement serde traits,
/// so reports carry the error's kind name and `Display` text instead of the
/// typed error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSummary {
    /// Variant name of the root cause.
    pub kind: String,
    /// Full message including the stage chain and underlying causes.
    pub message: String,
}

impl From<&PipelineError> for ErrorSummary {
    fn from(err: &PipelineError) -> Self {
        let kind = match err.root_cause() {
            PipelineError::UnknownStageReference { .. } => "UnknownStageReference",
            PipelineError::MissingExpectedResult { .. } => "MissingExpectedResult",
            PipelineError::ResultTypeMismatch { .. } => "ResultTypeMismatch",
            PipelineError::StageExecutionFailure { .. } => "StageExecutionFailure",
            PipelineError::ResourceUnavailable(_) => "ResourceUnavailable",
            PipelineError::InvalidConfig(_) => "InvalidConfig",
            PipelineError::DuplicateStageName(_) => "DuplicateStageName",
            PipelineError::NoWorkingImage => "NoWorkingImage",
            PipelineError::UnsupportedImage(_) => "UnsupportedImage",
            PipelineError::UnsupportedModel(_) => "UnsupportedModel",
            PipelineError::ImageDecode(_) => "ImageDecode",
            PipelineError::Io { .. } => "Io",
        };
        Self {
            kind: kind.to_string(),
            message: err.chain_message(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn root_cause_unwraps_nested_failures() {
        let err = PipelineError::stage_failure(
            "draw",
            PipelineError::MissingExpectedResult {
                name: "detect".to_string(),
            },
        );
        assert!(matches!(
            err.root_cause(),
            PipelineError::MissingExpectedResult { name } if name == "detect"
        ));
    }

    #[test]
    fn stage_failure_cause_is_shown_once() {
        let err = PipelineError::stage_failure(
            "draw",
            PipelineError::UnknownStageReference {
                name: "nope".to_string(),
            },
        );
        assert_eq!(err.to_string(), "stage 'draw' failed");
        let cause = std::error::Error::source(&err).unwrap();
        assert_eq!(cause.to_string(), "no stage named 'nope' in the pipeline");
        assert_eq!(
            err.chain_message(),
            "stage 'draw' failed: no stage named 'nope' in the pipeline"
        );
    }

    #[test]
    fn chain_message_includes_io_cause() {
        let err = PipelineError::stage_failure(
            "read",
            PipelineError::Io {
                path: PathBuf::from("missing.png"),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            },
        );
        assert_eq!(
            err.chain_message(),
            "stage 'read' failed: failed to read missing.png: not found"
        );
    }

    #[test]
    fn type_mismatch_display() {
        let err = PipelineError::ResultTypeMismatch {
            stage: "detect".to_string(),
            expected: ModelKind::Circles,
            found: ModelKind::RotatedRect,
        };
        assert_eq!(
            err.to_string(),
            "stage 'detect' holds a rotated rect model, expected a list of circles"
        );
    }

    #[test]
    fn summary_names_root_cause() {
        let err = PipelineError::stage_failure("t", PipelineError::NoWorkingImage);
        let summary = ErrorSummary::from(&err);
        assert_eq!(summary.kind, "NoWorkingImage");
        assert_eq!(summary.message, "stage 't' failed: no working image");
    }

    #[test]
    fn only_resource_unavailable_is_soft() {
        assert!(PipelineError::ResourceUnavailable("no part".to_string()).is_soft());
        assert!(!PipelineError::NoWorkingImage.is_soft());
    }
}
