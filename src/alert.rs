//! data structures for deserializing incoming alert group notifications
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// group status of a firing alert group
pub const STATUS_FIRING: &str = "firing";
/// group status of a resolved alert group
pub const STATUS_RESOLVED: &str = "resolved";

/// annotation key disabling auto-close for a single delivery
const SKIP_AUTO_CLOSE_ANNOTATION_KEY: &str = "atg-skip-auto-close";
/// annotation value disabling auto-close for a single delivery
const SKIP_AUTO_CLOSE_ANNOTATION_VALUE: &str = "true";

/// common label overriding the target repository owner
pub const OWNER_OVERRIDE_LABEL: &str = "atg_owner";
/// common label overriding the target repository name
pub const REPO_OVERRIDE_LABEL: &str = "atg_repo";

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all(deserialize = "camelCase"))]
/// alert group received by the alertmanager webhook receiver
///
/// `status` is kept as the raw string so that an unknown value is rejected by
/// the reconciler before any tracker write, not by serde at the transport
/// boundary.
pub struct Data {
    pub version: String,
    pub group_key: String,
    #[serde(default)]
    pub truncated_alerts: u64,

    pub receiver: String,
    pub status: String,
    pub alerts: Vec<Alert>,
    pub group_labels: HashMap<String, String>,
    pub common_labels: HashMap<String, String>,
    pub common_annotations: HashMap<String, String>,
    #[serde(rename(deserialize = "externalURL"))]
    pub external_url: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all(deserialize = "camelCase"))]
/// a single alert inside an alert group
pub struct Alert {
    pub status: String,
    pub labels: HashMap<String, String>,
    pub annotations: HashMap<String, String>,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(rename(deserialize = "generatorURL"), default)]
    pub generator_url: String,
}

impl Data {
    /// label keys appearing on individual alerts but not in the common labels,
    /// sorted for stable template output
    pub fn label_keys_except_common(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .alerts
            .iter()
            .flat_map(|alert| alert.labels.keys())
            .filter(|key| !self.common_labels.contains_key(*key))
            .map(String::as_str)
            .collect();

        keys.sort_unstable();
        keys.dedup();

        keys
    }

    /// annotation keys appearing on individual alerts but not in the common
    /// annotations, sorted for stable template output
    pub fn annotation_keys_except_common(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .alerts
            .iter()
            .flat_map(|alert| alert.annotations.keys())
            .filter(|key| !self.common_annotations.contains_key(*key))
            .map(String::as_str)
            .collect();

        keys.sort_unstable();
        keys.dedup();

        keys
    }

    /// true if any alert of the group opts out of auto-close via the
    /// `atg-skip-auto-close: "true"` annotation
    pub fn has_skip_auto_close_annotation(&self) -> bool {
        self.alerts.iter().any(|alert| {
            alert
                .annotations
                .get(SKIP_AUTO_CLOSE_ANNOTATION_KEY)
                .map(String::as_str)
                == Some(SKIP_AUTO_CLOSE_ANNOTATION_VALUE)
        })
    }
}
