//! shared fixtures for unit tests
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::StatusCode;
use prometheus::Registry;
use sha2::{Digest, Sha256};

use crate::{
    alert,
    alert_id::AlertId,
    github::{
        client::{ApiReply, IssueTracker, TrackerError},
        issue::{Issue, IssuePatch, IssueState, Label, NewIssue, Repo},
        metrics::ApiMetrics,
    },
    notifier::Notifier,
    renderer::Renderer,
};

pub(crate) fn sample_payload() -> alert::Data {
    serde_json::from_str(include_str!("../samples/payload.json")).unwrap()
}

pub(crate) fn alert_id(payload: &alert::Data) -> AlertId {
    AlertId::derive(&Renderer::with_default_templates().unwrap(), payload).unwrap()
}

pub(crate) fn issue(number: u64, state: IssueState, created_at: &str) -> Issue {
    let created_at: DateTime<Utc> = created_at.parse().unwrap();

    Issue {
        number,
        title: format!("issue {number}"),
        body: Some("body".to_string()),
        labels: vec![],
        state,
        created_at,
        closed_at: (state == IssueState::Closed).then(|| created_at),
        html_url: format!("https://github.com/acme/infra/issues/{number}")
            .parse()
            .unwrap(),
    }
}

pub(crate) fn labeled_issue(
    number: u64,
    state: IssueState,
    created_at: &str,
    labels: &[&str],
) -> Issue {
    let mut issue = issue(number, state, created_at);
    issue.labels = labels
        .iter()
        .map(|name| Label {
            name: (*name).to_string(),
        })
        .collect();

    issue
}

pub(crate) fn notifier(
    tracker: Arc<FakeTracker>,
    auto_close_resolved_issues: bool,
    reopen_window: Option<Duration>,
) -> Notifier {
    Notifier::new(
        tracker,
        Renderer::with_default_templates().unwrap(),
        ApiMetrics::new(&Registry::new()).unwrap(),
        vec!["alert".to_string()],
        auto_close_resolved_issues,
        reopen_window,
    )
}

/// the identity marker the engine embeds for a group key
fn marker_for_group_key(group_key: &str) -> String {
    format!(
        "\n---\n(DO NOT MODIFY: {} )\n",
        hex::encode(Sha256::digest(group_key.as_bytes()))
    )
}

/// in-memory [IssueTracker] double
///
/// Search matches issues whose body contains the quoted query token, the
/// same containment contract the real full-text search provides for the
/// identity marker.
pub(crate) struct FakeTracker {
    issues: Mutex<Vec<Issue>>,
    next_number: AtomicU64,
    writes: AtomicU64,
    search_failure: Mutex<Option<StatusCode>>,
    write_failure: Mutex<Option<StatusCode>>,
}

impl FakeTracker {
    pub(crate) fn new() -> Self {
        Self {
            issues: Mutex::new(Vec::new()),
            next_number: AtomicU64::new(1),
            writes: AtomicU64::new(0),
            search_failure: Mutex::new(None),
            write_failure: Mutex::new(None),
        }
    }

    pub(crate) fn issues(&self) -> Vec<Issue> {
        self.issues.lock().unwrap().clone()
    }

    /// number of create/edit calls the engine issued
    pub(crate) fn write_calls(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_searches_with(&self, status: StatusCode) {
        *self.search_failure.lock().unwrap() = Some(status);
    }

    pub(crate) fn fail_writes_with(&self, status: StatusCode) {
        *self.write_failure.lock().unwrap() = Some(status);
    }

    pub(crate) fn insert_open_issue_for_group_key(&self, group_key: &str, created_at: &str) {
        self.insert_issue_for_group_key(group_key, created_at, IssueState::Open);
    }

    pub(crate) fn insert_closed_issue_for_group_key(&self, group_key: &str, created_at: &str) {
        self.insert_issue_for_group_key(group_key, created_at, IssueState::Closed);
    }

    fn insert_issue_for_group_key(&self, group_key: &str, created_at: &str, state: IssueState) {
        let number = self.next_number.fetch_add(1, Ordering::SeqCst);
        let created_at: DateTime<Utc> = created_at.parse().unwrap();

        self.issues.lock().unwrap().push(Issue {
            number,
            title: format!("issue {number}"),
            body: Some(format!("details{}", marker_for_group_key(group_key))),
            labels: vec![],
            state,
            created_at,
            closed_at: (state == IssueState::Closed).then(|| created_at),
            html_url: format!("https://github.com/acme/infra/issues/{number}")
                .parse()
                .unwrap(),
        });
    }

    fn ok<T>(body: T) -> ApiReply<T> {
        ApiReply {
            status: StatusCode::OK,
            rate: None,
            body: Some(body),
        }
    }

    fn failure<T>(status: StatusCode) -> ApiReply<T> {
        ApiReply {
            status,
            rate: None,
            body: None,
        }
    }
}

#[async_trait]
impl IssueTracker for FakeTracker {
    async fn search_issues(&self, query: &str) -> Result<ApiReply<Vec<Issue>>, TrackerError> {
        if let Some(status) = *self.search_failure.lock().unwrap() {
            return Ok(Self::failure(status));
        }

        let token = query.split('"').nth(1).unwrap_or_default();
        let issues = self
            .issues
            .lock()
            .unwrap()
            .iter()
            .filter(|issue| {
                issue
                    .body
                    .as_deref()
                    .map_or(false, |body| body.contains(token))
            })
            .cloned()
            .collect();

        Ok(Self::ok(issues))
    }

    async fn create_issue(
        &self,
        _repo: &Repo,
        new_issue: &NewIssue,
    ) -> Result<ApiReply<Issue>, TrackerError> {
        self.writes.fetch_add(1, Ordering::SeqCst);

        if let Some(status) = *self.write_failure.lock().unwrap() {
            return Ok(Self::failure(status));
        }

        let number = self.next_number.fetch_add(1, Ordering::SeqCst);
        // strictly newer than any fixture timestamp
        let created_at = "2023-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap()
            + chrono::Duration::seconds(number as i64);

        let issue = Issue {
            number,
            title: new_issue.title.clone(),
            body: Some(new_issue.body.clone()),
            labels: new_issue
                .labels
                .iter()
                .map(|name| Label { name: name.clone() })
                .collect(),
            state: IssueState::Open,
            created_at,
            closed_at: None,
            html_url: format!("https://github.com/acme/infra/issues/{number}")
                .parse()
                .unwrap(),
        };

        self.issues.lock().unwrap().push(issue.clone());

        Ok(ApiReply {
            status: StatusCode::CREATED,
            rate: None,
            body: Some(issue),
        })
    }

    async fn edit_issue(
        &self,
        _repo: &Repo,
        number: u64,
        patch: &IssuePatch,
    ) -> Result<ApiReply<Issue>, TrackerError> {
        self.writes.fetch_add(1, Ordering::SeqCst);

        if let Some(status) = *self.write_failure.lock().unwrap() {
            return Ok(Self::failure(status));
        }

        let mut issues = self.issues.lock().unwrap();
        let issue = match issues.iter_mut().find(|issue| issue.number == number) {
            Some(issue) => issue,
            None => return Ok(Self::failure(StatusCode::NOT_FOUND)),
        };

        if let Some(title) = &patch.title {
            issue.title = title.clone();
        }
        if let Some(body) = &patch.body {
            issue.body = Some(body.clone());
        }
        if let Some(labels) = &patch.labels {
            issue.labels = labels
                .iter()
                .map(|name| Label { name: name.clone() })
                .collect();
        }
        if let Some(state) = patch.state {
            if issue.state != state {
                issue.closed_at = match state {
                    IssueState::Closed => "2023-01-02T00:00:00Z".parse().ok(),
                    IssueState::Open => None,
                };
            }
            issue.state = state;
        }

        Ok(Self::ok(issue.clone()))
    }
}
