//! Error taxonomy and the fixed error structure carried across the message
//! boundary.
//!
//! Inside the assembly algorithm errors travel as `anyhow::Error` with a
//! [`BundleFailure`] classifying the ones we raise ourselves. At the message
//! boundary everything is converted into [`ErrorInfo`]; a response never
//! carries a rejected state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Version of the [`ErrorInfo`] structure.
pub const ERROR_INFO_VERSION: u32 = 1;

/// Classification of bundle failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// An import could not be resolved.
    Resolution,
    /// The component compiler rejected a source file.
    Compile,
    /// A remote module fetch failed.
    Network,
    /// Any other failure while building the module graph.
    Graph,
    /// A failure during code generation.
    Generate,
}

/// The serializable error attached to a failed [`crate::BundleResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub version: u32,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorInfo {
    /// Converts an assembly error into the fixed structure. Errors we raised
    /// ourselves keep their classification; anything else is a graph failure.
    pub fn from_error(err: &anyhow::Error) -> Self {
        let (kind, message, detail) = match err.downcast_ref::<BundleFailure>() {
            Some(failure) => (failure.kind, failure.message.clone(), failure.detail.clone()),
            None => (ErrorKind::Graph, err.to_string(), None),
        };
        let causes: Vec<String> = err.chain().skip(1).map(|cause| cause.to_string()).collect();
        let stack = if causes.is_empty() {
            None
        } else {
            Some(causes.join("\n"))
        };
        Self {
            version: ERROR_INFO_VERSION,
            kind,
            message,
            stack,
            detail,
        }
    }
}

/// A classified failure raised inside the resolve/load/transform hooks or the
/// generation passes.
#[derive(Debug)]
pub struct BundleFailure {
    pub kind: ErrorKind,
    pub message: String,
    pub detail: Option<String>,
}

impl BundleFailure {
    pub fn resolution(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Resolution,
            message: message.into(),
            detail: None,
        }
    }

    pub fn compile(message: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Compile,
            message: message.into(),
            detail: Some(filename.into()),
        }
    }

    pub fn network(message: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Network,
            message: message.into(),
            detail: Some(url.into()),
        }
    }

    pub fn generate(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Generate,
            message: message.into(),
            detail: None,
        }
    }
}

impl fmt::Display for BundleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for BundleFailure {}

/// Errors surfaced by the [`crate::Bundler`] facade itself, as opposed to
/// bundle failures reported inside a [`crate::BundleResult`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// The facade was destroyed (or the request explicitly cancelled) while
    /// the request was pending.
    Cancelled,
    /// A facade-level timeout wrapper expired before the response arrived.
    TimedOut,
    /// The worker's request channel is gone, e.g. after `destroy()`.
    WorkerUnavailable,
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Cancelled => write!(f, "bundle request was cancelled"),
            SubmitError::TimedOut => write!(f, "bundle request timed out"),
            SubmitError::WorkerUnavailable => {
                write!(f, "bundle worker is no longer accepting requests")
            }
        }
    }
}

impl std::error::Error for SubmitError {}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn classified_failures_keep_kind_and_detail() {
        let err = anyhow::Error::new(BundleFailure::compile(
            "Unexpected token (1:4)",
            "App.hamber",
        ));
        let info = ErrorInfo::from_error(&err);
        assert_eq!(info.version, ERROR_INFO_VERSION);
        assert_eq!(info.kind, ErrorKind::Compile);
        assert_eq!(info.message, "Unexpected token (1:4)");
        assert_eq!(info.detail.as_deref(), Some("App.hamber"));
    }

    #[test]
    fn unclassified_errors_fall_back_to_graph_kind() {
        let err = anyhow!("circular dependency").context("graph build failed");
        let info = ErrorInfo::from_error(&err);
        assert_eq!(info.kind, ErrorKind::Graph);
        assert_eq!(info.message, "graph build failed");
        assert_eq!(info.stack.as_deref(), Some("circular dependency"));
    }
}
