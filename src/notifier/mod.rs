//! Issue reconciliation engine.
//!
//! One webhook delivery runs [Notifier::notify] once, synchronously: derive
//! the alert identity, locate tracked issues, decide, write, clean up
//! duplicates. The tracker is the sole source of truth, rediscovered on
//! every delivery; concurrent deliveries converge through the cleanup pass
//! instead of locking.

mod dedup;
mod error;
mod locate;
mod reconcile;
mod write;

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use serde::Deserialize;

use crate::{
    alert,
    alert_id::AlertId,
    github::{client::IssueTracker, issue::Repo, metrics::ApiMetrics},
    renderer::Renderer,
    settings::Settings,
};

pub use error::NotifyError;

/// query parameters of a webhook delivery
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RepoParams {
    pub owner: Option<String>,
    pub repo: Option<String>,
    /// comma-separated issue labels overriding the configured default list
    pub labels: Option<String>,
}

/// the reconciliation engine
pub struct Notifier {
    tracker: Arc<dyn IssueTracker>,
    renderer: Renderer,
    metrics: ApiMetrics,
    labels: Vec<String>,
    auto_close_resolved_issues: bool,
    reopen_window: Option<Duration>,
}

impl Notifier {
    pub fn new(
        tracker: Arc<dyn IssueTracker>,
        renderer: Renderer,
        metrics: ApiMetrics,
        labels: Vec<String>,
        auto_close_resolved_issues: bool,
        reopen_window: Option<Duration>,
    ) -> Self {
        Self {
            tracker,
            renderer,
            metrics,
            labels,
            auto_close_resolved_issues,
            reopen_window,
        }
    }

    /// wire the engine from the loaded settings, recording metrics into the
    /// process-wide default registry
    pub fn from_settings(
        tracker: Arc<dyn IssueTracker>,
        settings: &Settings,
    ) -> anyhow::Result<Self> {
        let renderer = Renderer::from_settings(settings)?;
        let metrics = ApiMetrics::new(prometheus::default_registry())?;

        Ok(Self::new(
            tracker,
            renderer,
            metrics,
            settings.labels.clone(),
            settings.auto_close_resolved_issues,
            settings.reopen_window,
        ))
    }

    /// process one alert-group delivery to completion or first error
    pub async fn notify(
        &self,
        payload: &alert::Data,
        params: &RepoParams,
    ) -> Result<(), NotifyError> {
        let repo = resolve_repository(params, payload)?;
        let labels = self.resolve_labels(params);
        let alert_id = AlertId::derive(&self.renderer, payload)?;

        tracing::debug!(
            repo = %repo,
            alert_id = %alert_id,
            status = %payload.status,
            "processing alert group"
        );

        let located = self.locate(&repo, &alert_id).await?;
        let decision = self.reconcile(payload, &alert_id, labels, located, Utc::now())?;
        let issue = self.write(&repo, &decision).await?;

        tracing::info!(repo = %repo, number = issue.number, "reconciled issue");

        self.cleanup(&repo, &alert_id).await?;

        Ok(())
    }

    /// labels for this delivery: query-parameter override or configured
    /// default list
    fn resolve_labels(&self, params: &RepoParams) -> Vec<String> {
        match &params.labels {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|label| !label.is_empty())
                .map(String::from)
                .collect(),
            None => self.labels.clone(),
        }
    }
}

/// resolve the target repository, override labels on the payload taking
/// precedence over query parameters
fn resolve_repository(params: &RepoParams, payload: &alert::Data) -> Result<Repo, NotifyError> {
    let owner = payload
        .common_labels
        .get(alert::OWNER_OVERRIDE_LABEL)
        .cloned()
        .or_else(|| params.owner.clone())
        .ok_or(NotifyError::Resolution("owner"))?;

    let name = payload
        .common_labels
        .get(alert::REPO_OVERRIDE_LABEL)
        .cloned()
        .or_else(|| params.repo.clone())
        .ok_or(NotifyError::Resolution("repo"))?;

    Ok(Repo::new(owner, name))
}
