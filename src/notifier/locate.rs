//! full-text search for issues carrying an alert identity

use super::{Notifier, NotifyError};
use crate::{
    alert_id::AlertId,
    github::{
        issue::{Issue, Repo},
        metrics::API_SEARCH,
    },
};

impl Notifier {
    /// all tracked issues for an identity, newest first
    ///
    /// The search index is eventually consistent; results may miss recent
    /// writes or arrive out of order, so the server-side ordering is never
    /// trusted on its own.
    pub(super) async fn locate(
        &self,
        repo: &Repo,
        alert_id: &AlertId,
    ) -> Result<Vec<Issue>, NotifyError> {
        let query = format!(r#"repo:{} "{}""#, repo, alert_id);

        let reply = self.tracker.search_issues(&query).await?;
        self.metrics
            .record(API_SEARCH, reply.status, reply.rate.as_ref());

        let mut issues = reply.into_body().map_err(NotifyError::Search)?;
        sort_newest_first(&mut issues);

        Ok(issues)
    }
}

/// newest first; ties on creation time break on the higher issue number
pub(super) fn sort_newest_first(issues: &mut [Issue]) {
    issues.sort_by(|a, b| (b.created_at, b.number).cmp(&(a.created_at, a.number)));
}

/// oldest first; ties on creation time break on the lower issue number
pub(super) fn sort_oldest_first(issues: &mut [Issue]) {
    issues.sort_by(|a, b| (a.created_at, a.number).cmp(&(b.created_at, b.number)));
}
