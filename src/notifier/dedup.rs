//! convergence pass closing duplicate issues for one alert identity
//!
//! The search index backing [locate](super::Notifier::locate) can be stale
//! at decision time, so two interleaved deliveries may each create an issue.
//! After the primary write every delivery re-queries and closes everything
//! but the newest issue, pointing the duplicates at it.

use super::{locate::sort_oldest_first, Notifier, NotifyError};
use crate::{
    alert_id::AlertId,
    github::{
        issue::{IssuePatch, IssueState, Repo},
        metrics::API_ISSUES,
    },
};

impl Notifier {
    pub(super) async fn cleanup(
        &self,
        repo: &Repo,
        alert_id: &AlertId,
    ) -> Result<(), NotifyError> {
        let mut issues = self.locate(repo, alert_id).await?;
        if issues.len() < 2 {
            return Ok(());
        }

        sort_oldest_first(&mut issues);

        let canonical = match issues.pop() {
            Some(issue) => issue,
            None => return Ok(()),
        };

        for issue in issues {
            // with a reopen window, older closed issues are history, not
            // duplicates
            if self.reopen_window.is_some() && issue.state == IssueState::Closed {
                continue;
            }

            let patch = IssuePatch {
                body: Some(format!("Superseded by {}.", canonical.html_url)),
                state: Some(IssueState::Closed),
                ..IssuePatch::default()
            };

            let reply = self.tracker.edit_issue(repo, issue.number, &patch).await?;
            self.metrics
                .record(API_ISSUES, reply.status, reply.rate.as_ref());
            reply.into_body().map_err(NotifyError::Write)?;

            tracing::info!(
                repo = %repo,
                number = issue.number,
                canonical = canonical.number,
                "closed duplicate issue"
            );
        }

        Ok(())
    }
}
