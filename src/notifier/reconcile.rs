//! the decision core: create, reuse, reopen or leave the tracked issue alone

use chrono::{DateTime, Utc};
use indexmap::IndexSet;

use super::{Notifier, NotifyError};
use crate::{
    alert,
    alert_id::AlertId,
    github::issue::{Issue, IssueState},
};

/// what one delivery intends to do to the tracker, computed once and used
/// read-only for the rest of the delivery
#[derive(Debug)]
pub(super) struct Decision {
    /// issue to edit, `None` to create a new one
    pub target: Option<Issue>,
    /// discarded or second-newest issue, template context only
    pub previous: Option<Issue>,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    /// state to converge the issue to, `None` to leave the state untouched
    pub state: Option<IssueState>,
}

impl Notifier {
    /// decide what to do for one delivery
    ///
    /// `located` must be ordered newest first (the [locate](Notifier::locate)
    /// contract). `now` is passed in so the reopen-window policy stays
    /// testable.
    pub(super) fn reconcile(
        &self,
        payload: &alert::Data,
        alert_id: &AlertId,
        labels_override: Vec<String>,
        located: Vec<Issue>,
        now: DateTime<Utc>,
    ) -> Result<Decision, NotifyError> {
        let desired = match payload.status.as_str() {
            alert::STATUS_FIRING => IssueState::Open,
            alert::STATUS_RESOLVED => IssueState::Closed,
            other => return Err(NotifyError::InvalidStatus(other.to_string())),
        };

        if located.len() > 1 && self.reopen_window.is_none() {
            tracing::warn!(
                group_key = %payload.group_key,
                matches = located.len(),
                "search returned more than one issue for one alert identity"
            );
        }

        let mut located = located.into_iter();
        let mut target = located.next();
        let mut previous = located.next();

        // a closed issue past the reopen window is abandoned in favor of a
        // fresh one, and handed to the templates as the previous issue
        if let (Some(window), Some(issue)) = (self.reopen_window, target.as_ref()) {
            if issue.state == IssueState::Closed && desired == IssueState::Open {
                let closed_at = issue.closed_at.unwrap_or(issue.created_at);
                let expired = chrono::Duration::from_std(window)
                    .ok()
                    .and_then(|window| closed_at.checked_add_signed(window))
                    .map_or(false, |deadline| now > deadline);

                if expired {
                    previous = target.take();
                }
            }
        }

        let mut body = self.renderer.render_body(payload, previous.as_ref())?;
        body.push_str(&format!("\n---\n(DO NOT MODIFY: {alert_id} )\n"));

        // trackers reject titles with surrounding whitespace
        let title = self
            .renderer
            .render_title(payload, previous.as_ref())?
            .trim()
            .to_string();

        let labels = match &target {
            Some(issue) => {
                let mut merged: IndexSet<String> =
                    issue.label_names().map(String::from).collect();
                merged.extend(labels_override);
                merged.into_iter().collect()
            }
            None => labels_override,
        };

        let auto_close =
            self.auto_close_resolved_issues && !payload.has_skip_auto_close_annotation();
        let current = target.as_ref().map_or(IssueState::Open, |issue| issue.state);
        let state = (desired != current && (desired == IssueState::Open || auto_close))
            .then(|| desired);

        Ok(Decision {
            target,
            previous,
            title,
            body,
            labels,
            state,
        })
    }
}
