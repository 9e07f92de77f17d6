//! GitHub api transport
//!
//! The engine talks to the tracker through the [IssueTracker] trait so tests
//! can substitute an in-memory fake. [GitHubClient] is the reqwest-backed
//! implementation, speaking to github.com or an enterprise deployment.
use async_trait::async_trait;
use http::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use super::issue::{Issue, IssuePatch, NewIssue, Repo};
use crate::settings::GitHubSettings;

/// media type enabling text-match metadata on search results
const TEXT_MATCH_MEDIA_TYPE: &str = "application/vnd.github.v3.text-match+json";
/// default media type for api calls
const MEDIA_TYPE: &str = "application/vnd.github.v3+json";

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// transport-level failure, distinct from a non-2xx api reply
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid api url: {0}")]
    Url(#[from] url::ParseError),
}

/// rate-limit headers reported alongside an api reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimit {
    pub limit: i64,
    pub remaining: i64,
    pub reset: i64,
}

impl RateLimit {
    /// parse the `x-ratelimit-*` headers, `None` if any of them is absent or
    /// malformed
    fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let value = |name: &str| -> Option<i64> {
            headers.get(name)?.to_str().ok()?.parse().ok()
        };

        Some(Self {
            limit: value("x-ratelimit-limit")?,
            remaining: value("x-ratelimit-remaining")?,
            reset: value("x-ratelimit-reset")?,
        })
    }
}

/// one api reply: status and rate-limit headers are always available for
/// metrics, the decoded body only on a 2xx status
#[derive(Debug)]
pub struct ApiReply<T> {
    pub status: StatusCode,
    pub rate: Option<RateLimit>,
    pub body: Option<T>,
}

impl<T> ApiReply<T> {
    /// unwrap the decoded body, handing back the status on a non-2xx reply
    pub fn into_body(self) -> Result<T, StatusCode> {
        match self.body {
            Some(body) if self.status.is_success() => Ok(body),
            _ => Err(self.status),
        }
    }
}

#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// full-text issue search, server-side sorted by creation time descending
    async fn search_issues(&self, query: &str) -> Result<ApiReply<Vec<Issue>>, TrackerError>;

    async fn create_issue(
        &self,
        repo: &Repo,
        issue: &NewIssue,
    ) -> Result<ApiReply<Issue>, TrackerError>;

    async fn edit_issue(
        &self,
        repo: &Repo,
        number: u64,
        patch: &IssuePatch,
    ) -> Result<ApiReply<Issue>, TrackerError>;
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    items: Vec<Issue>,
}

/// reqwest-backed [IssueTracker] implementation
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_root: Url,
}

impl GitHubClient {
    pub fn from_settings(settings: &GitHubSettings) -> anyhow::Result<Self> {
        Self::new(settings.api_root.clone(), &settings.token)
    }

    pub fn new(mut api_root: Url, token: &str) -> anyhow::Result<Self> {
        // Url::join treats the last path segment as a file unless the path
        // ends with a slash.
        if !api_root.path().ends_with('/') {
            api_root.set_path(&format!("{}/", api_root.path()));
        }

        let mut headers = HeaderMap::new();
        let mut authorization = HeaderValue::from_str(&format!("token {token}"))?;
        authorization.set_sensitive(true);
        headers.insert(AUTHORIZATION, authorization);
        headers.insert(ACCEPT, HeaderValue::from_static(MEDIA_TYPE));

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self { http, api_root })
    }

    /// split a response into status, rate-limit headers and decoded body
    async fn reply<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<ApiReply<T>, TrackerError> {
        let status = response.status();
        let rate = RateLimit::from_headers(response.headers());

        let body = if status.is_success() {
            Some(response.json().await?)
        } else {
            let text = response.text().await.unwrap_or_default();
            tracing::debug!(status = %status, body = %text, "github api returned an error");
            None
        };

        Ok(ApiReply { status, rate, body })
    }
}

#[async_trait]
impl IssueTracker for GitHubClient {
    async fn search_issues(&self, query: &str) -> Result<ApiReply<Vec<Issue>>, TrackerError> {
        let url = self.api_root.join("search/issues")?;

        let response = self
            .http
            .get(url)
            .header(ACCEPT, TEXT_MATCH_MEDIA_TYPE)
            .query(&[
                ("q", query),
                ("sort", "created"),
                ("order", "desc"),
                ("per_page", "100"),
            ])
            .send()
            .await?;

        let reply = Self::reply::<SearchBody>(response).await?;

        Ok(ApiReply {
            status: reply.status,
            rate: reply.rate,
            body: reply.body.map(|body| body.items),
        })
    }

    async fn create_issue(
        &self,
        repo: &Repo,
        issue: &NewIssue,
    ) -> Result<ApiReply<Issue>, TrackerError> {
        let url = self
            .api_root
            .join(&format!("repos/{}/{}/issues", repo.owner, repo.name))?;

        let response = self.http.post(url).json(issue).send().await?;

        Self::reply(response).await
    }

    async fn edit_issue(
        &self,
        repo: &Repo,
        number: u64,
        patch: &IssuePatch,
    ) -> Result<ApiReply<Issue>, TrackerError> {
        let url = self.api_root.join(&format!(
            "repos/{}/{}/issues/{}",
            repo.owner, repo.name, number
        ))?;

        let response = self.http.patch(url).json(patch).send().await?;

        Self::reply(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::issue::IssueState;

    fn client(server: &mockito::ServerGuard) -> GitHubClient {
        GitHubClient::new(server.url().parse().unwrap(), "secret").unwrap()
    }

    #[tokio::test]
    async fn search_decodes_items_and_rate_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/search/issues")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("q".into(), r#"repo:acme/infra "deadbeef""#.into()),
                mockito::Matcher::UrlEncoded("sort".into(), "created".into()),
                mockito::Matcher::UrlEncoded("order".into(), "desc".into()),
            ]))
            .with_status(200)
            .with_header("x-ratelimit-limit", "30")
            .with_header("x-ratelimit-remaining", "29")
            .with_header("x-ratelimit-reset", "1650000000")
            .with_body(
                serde_json::json!({
                    "total_count": 1,
                    "items": [{
                        "number": 3,
                        "title": "firing: cpu",
                        "state": "open",
                        "created_at": "2022-05-01T12:00:00Z",
                        "html_url": "https://github.com/acme/infra/issues/3"
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let reply = client(&server)
            .search_issues(r#"repo:acme/infra "deadbeef""#)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(
            reply.rate,
            Some(RateLimit {
                limit: 30,
                remaining: 29,
                reset: 1_650_000_000,
            })
        );
        assert_eq!(reply.body.unwrap()[0].number, 3);
    }

    #[tokio::test]
    async fn non_2xx_reply_keeps_status_and_drops_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/search/issues")
            .match_query(mockito::Matcher::Any)
            .with_status(422)
            .with_body(r#"{"message": "Validation Failed"}"#)
            .create_async()
            .await;

        let reply = client(&server).search_issues("repo:a/b \"x\"").await.unwrap();

        assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(reply.body.is_none());
        assert!(reply.into_body().is_err());
    }

    #[tokio::test]
    async fn create_posts_to_the_issues_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/repos/acme/infra/issues")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "title": "firing: cpu",
                "body": "details",
                "labels": ["alert"]
            })))
            .with_status(201)
            .with_body(
                serde_json::json!({
                    "number": 4,
                    "title": "firing: cpu",
                    "state": "open",
                    "created_at": "2022-05-01T12:00:00Z",
                    "html_url": "https://github.com/acme/infra/issues/4"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let issue = client(&server)
            .create_issue(
                &Repo::new("acme", "infra"),
                &NewIssue {
                    title: "firing: cpu".to_string(),
                    body: "details".to_string(),
                    labels: vec!["alert".to_string()],
                },
            )
            .await
            .unwrap()
            .into_body()
            .unwrap();

        mock.assert_async().await;
        assert_eq!(issue.number, 4);
    }

    #[tokio::test]
    async fn edit_patches_the_issue_number() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PATCH", "/repos/acme/infra/issues/4")
            .match_body(mockito::Matcher::Json(
                serde_json::json!({ "state": "closed" }),
            ))
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "number": 4,
                    "title": "firing: cpu",
                    "state": "closed",
                    "created_at": "2022-05-01T12:00:00Z",
                    "closed_at": "2022-05-02T12:00:00Z",
                    "html_url": "https://github.com/acme/infra/issues/4"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let issue = client(&server)
            .edit_issue(
                &Repo::new("acme", "infra"),
                4,
                &IssuePatch {
                    state: Some(IssueState::Closed),
                    ..IssuePatch::default()
                },
            )
            .await
            .unwrap()
            .into_body()
            .unwrap();

        mock.assert_async().await;
        assert_eq!(issue.state, IssueState::Closed);
    }
}
