//! GitHub issue tracker: data model, api transport and usage metrics

pub mod client;
pub mod issue;
pub mod metrics;
