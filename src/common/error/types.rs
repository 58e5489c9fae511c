//! Unified error types for the copy pipeline.
//!
//! Every stage of the pipeline reports failures through this enum so that the
//! orchestrator can decide whether a failure degrades a single segment, is
//! recorded as a diagnostic, or aborts the request.
use std::time::Duration;
use thiserror::Error;

/// Main error type for officeclip operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Neither HTML nor plain text was selected
    #[error("Nothing is selected")]
    NoSelection,

    /// Selection could not be captured or is structurally unusable
    #[error("Invalid selection: {0}")]
    SelectionInvalid(String),

    /// Selected nodes were detached while the request was in flight
    #[error("Selection was lost before copying finished")]
    SelectionLost,

    /// A math conversion backend failed for one segment
    #[error("Conversion backend '{backend}' failed: {reason}")]
    ConversionBackendFailure { backend: String, reason: String },

    /// MathML could not be rewritten into OMML
    #[error("MathML to OMML transformation failed: {0}")]
    TransformationFailure(String),

    /// One or more anchor tokens could not be restored after translation
    #[error("Anchor restore anomaly: {0}")]
    AnchorRestoreAnomaly(String),

    /// A clipboard delivery stage is not available in this context
    #[error("Clipboard delivery unavailable via {stage}: {reason}")]
    DeliveryUnavailable { stage: String, reason: String },

    /// A suspend point exceeded its time budget
    #[error("Timed out after {}ms while {operation}", .elapsed.as_millis())]
    Timeout { operation: String, elapsed: Duration },

    /// XML parsing error
    #[error("XML error: {0}")]
    Xml(String),

    /// Configuration could not be loaded or stored
    #[error("Configuration error: {0}")]
    Config(String),

    /// External normalization engine is missing for the requested mode
    #[error("Normalization engine unavailable: {0}")]
    EngineUnavailable(String),

    /// External normalization engine exports an unexpected API version
    #[error("Normalization engine API version {found} is not supported (expected {expected})")]
    EngineVersion { expected: u32, found: u32 },

    /// Translation service failed
    #[error("Translation failed: {0}")]
    Translation(String),

    /// A document package could not be written
    #[error("Document export failed: {0}")]
    Export(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a timeout on a named operation.
    pub fn timeout(operation: impl Into<String>, elapsed: Duration) -> Self {
        Error::Timeout {
            operation: operation.into(),
            elapsed,
        }
    }

    /// Shorthand for a backend failure.
    pub fn backend(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::ConversionBackendFailure {
            backend: backend.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for an unavailable delivery stage.
    pub fn delivery(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::DeliveryUnavailable {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// Whether this failure only affects one segment and may degrade to literal text.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::ConversionBackendFailure { .. }
                | Error::TransformationFailure(_)
                | Error::AnchorRestoreAnomaly(_)
                | Error::Timeout { .. }
        )
    }

    /// Short human-readable reason suitable for a failure notification.
    pub fn user_message(&self) -> String {
        match self {
            Error::NoSelection => "Select some text first.".to_string(),
            Error::SelectionInvalid(_) => "The selection could not be read.".to_string(),
            Error::SelectionLost => {
                "The selection changed while copying. Please select and copy again.".to_string()
            },
            Error::DeliveryUnavailable { .. } => "The clipboard is not available here.".to_string(),
            Error::Timeout { operation, .. } => format!("Copy timed out while {}.", operation),
            Error::EngineUnavailable(_) | Error::EngineVersion { .. } => {
                "The conversion engine is not available.".to_string()
            },
            Error::Translation(_) => "Translation failed.".to_string(),
            other => other.to_string(),
        }
    }
}

/// Result type for officeclip operations.
pub type Result<T> = std::result::Result<T, Error>;
