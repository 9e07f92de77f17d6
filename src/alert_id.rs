//! stable identity correlating an alert group with its tracked issue
use std::fmt;

use sha2::{Digest, Sha256};

use crate::{alert, renderer::Renderer};

/// hex-encoded digest of the rendered identity template
///
/// Embedded verbatim in every issue body the receiver writes, and the sole
/// correlation key between alert groups and issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertId(String);

impl AlertId {
    /// derive the identity of an alert group
    ///
    /// Deterministic: the same rendered identity string always yields the
    /// same id. The identity template must not consult time or randomness.
    pub fn derive(renderer: &Renderer, payload: &alert::Data) -> Result<Self, tera::Error> {
        let rendered = renderer.render_alert_id(payload)?;

        Ok(Self(hex::encode(Sha256::digest(rendered.as_bytes()))))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
