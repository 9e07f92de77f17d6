//! applies a reconciliation decision to the tracker

use super::{reconcile::Decision, Notifier, NotifyError};
use crate::github::{
    issue::{Issue, IssuePatch, NewIssue, Repo},
    metrics::API_ISSUES,
};

impl Notifier {
    /// create or edit the target issue, then converge its state if the
    /// decision asks for a transition
    ///
    /// Errors propagate to the caller; writes that already happened are not
    /// rolled back.
    pub(super) async fn write(
        &self,
        repo: &Repo,
        decision: &Decision,
    ) -> Result<Issue, NotifyError> {
        let issue = match &decision.target {
            None => {
                let reply = self
                    .tracker
                    .create_issue(
                        repo,
                        &NewIssue {
                            title: decision.title.clone(),
                            body: decision.body.clone(),
                            labels: decision.labels.clone(),
                        },
                    )
                    .await?;
                self.metrics
                    .record(API_ISSUES, reply.status, reply.rate.as_ref());

                let issue = reply.into_body().map_err(NotifyError::Write)?;
                tracing::info!(repo = %repo, number = issue.number, "created issue");
                issue
            }
            Some(target) => {
                let patch = IssuePatch {
                    title: Some(decision.title.clone()),
                    body: Some(decision.body.clone()),
                    labels: Some(decision.labels.clone()),
                    state: None,
                };

                let reply = self.tracker.edit_issue(repo, target.number, &patch).await?;
                self.metrics
                    .record(API_ISSUES, reply.status, reply.rate.as_ref());

                let issue = reply.into_body().map_err(NotifyError::Write)?;
                tracing::info!(repo = %repo, number = issue.number, "edited issue");
                issue
            }
        };

        let desired = match decision.state {
            Some(desired) if issue.state != desired => desired,
            _ => return Ok(issue),
        };

        let patch = IssuePatch {
            state: Some(desired),
            ..IssuePatch::default()
        };

        let reply = self.tracker.edit_issue(repo, issue.number, &patch).await?;
        self.metrics
            .record(API_ISSUES, reply.status, reply.rate.as_ref());

        let issue = reply.into_body().map_err(NotifyError::Write)?;
        tracing::info!(repo = %repo, number = issue.number, state = %desired, "updated issue state");

        Ok(issue)
    }
}
