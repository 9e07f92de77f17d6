//! error kinds of the reconciliation pipeline
//!
//! Every kind is fatal to the delivery it occurs in. The receiver reports
//! the error to the webhook caller; no retries, no compensation of writes
//! that already happened. Later deliveries for the same identity converge
//! whatever state a partial delivery left behind.
use http::StatusCode;
use thiserror::Error;

use crate::github::client::TrackerError;

#[derive(Debug, Error)]
pub enum NotifyError {
    /// identity, title or body rendering failed
    #[error("failed to render template: {0}")]
    Template(#[from] tera::Error),

    /// the search api answered with a non-2xx status
    #[error("issue search returned status {0}")]
    Search(StatusCode),

    /// an issue create or edit answered with a non-2xx status
    #[error("issue write returned status {0}")]
    Write(StatusCode),

    /// the tracker could not be reached at all
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    /// the alert group carries a status the engine does not know
    #[error("invalid alert status {0:?}")]
    InvalidStatus(String),

    /// the target repository could not be resolved from query parameters and
    /// override labels
    #[error("could not resolve target repository: missing {0}")]
    Resolution(&'static str),
}
