//! prometheus meters for GitHub api usage

use http::StatusCode;
use prometheus::{opts, IntCounterVec, IntGaugeVec, Registry};

use super::client::RateLimit;

/// label value for calls against the search api
pub const API_SEARCH: &str = "search";
/// label value for calls against the issues api
pub const API_ISSUES: &str = "issues";

#[derive(Debug, Clone)]
/// recorder for api rate-limit gauges and per-(api, status) call counters
///
/// Constructed against an explicit [Registry] so tests can record into a
/// throwaway registry instead of the process-wide default.
pub struct ApiMetrics {
    /// rate limit advertised by the api
    rate_limit: IntGaugeVec,
    /// remaining requests in the current rate-limit window
    rate_remaining: IntGaugeVec,
    /// unix timestamp at which the rate-limit window resets
    rate_reset: IntGaugeVec,
    /// total number of api requests
    requests: IntCounterVec,
}

impl ApiMetrics {
    /// construct the meters and register them with `registry`
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let rate_limit = IntGaugeVec::new(
            opts!("api_rate_limit", "rate limit advertised by the GitHub api"),
            &["api"],
        )?;
        registry.register(Box::new(rate_limit.clone()))?;

        let rate_remaining = IntGaugeVec::new(
            opts!(
                "api_rate_remaining",
                "requests remaining in the current GitHub rate-limit window"
            ),
            &["api"],
        )?;
        registry.register(Box::new(rate_remaining.clone()))?;

        let rate_reset = IntGaugeVec::new(
            opts!(
                "api_rate_reset",
                "unix timestamp at which the GitHub rate-limit window resets"
            ),
            &["api"],
        )?;
        registry.register(Box::new(rate_reset.clone()))?;

        let requests = IntCounterVec::new(
            opts!("api_requests_total", "total number of GitHub api requests"),
            &["api", "status"],
        )?;
        registry.register(Box::new(requests.clone()))?;

        Ok(Self {
            rate_limit,
            rate_remaining,
            rate_reset,
            requests,
        })
    }

    /// record one api call and, when present, the rate-limit headers of its
    /// response
    pub fn record(&self, api: &str, status: StatusCode, rate: Option<&RateLimit>) {
        self.requests.with_label_values(&[api, status.as_str()]).inc();

        if let Some(rate) = rate {
            self.rate_limit.with_label_values(&[api]).set(rate.limit);
            self.rate_remaining
                .with_label_values(&[api])
                .set(rate.remaining);
            self.rate_reset.with_label_values(&[api]).set(rate.reset);
        }
    }
}
