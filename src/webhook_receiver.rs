//! alertmanager webhook endpoint driving the reconciliation engine
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, Query},
    http::StatusCode,
    routing::post,
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    alert,
    notifier::{Notifier, NotifyError, RepoParams},
    settings::Settings,
};

#[derive(Debug, Deserialize, Clone)]
pub struct WebhookReceiverSettings {
    pub bind_address: IpAddr,
    pub port: u16,
}

impl WebhookReceiverSettings {
    pub fn global() -> &'static Self {
        &Settings::global().webhook_receiver
    }

    pub fn to_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

struct State {
    notifier: Notifier,
}

/// a delivery the engine rejected before touching the tracker is the
/// caller's fault, everything else is reported as an upstream failure
fn status_for(err: &NotifyError) -> StatusCode {
    match err {
        NotifyError::Resolution(_) | NotifyError::InvalidStatus(_) => StatusCode::BAD_REQUEST,
        NotifyError::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
        NotifyError::Search(_) | NotifyError::Write(_) | NotifyError::Tracker(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}

async fn webhook(
    Extension(state): Extension<Arc<State>>,
    Query(params): Query<RepoParams>,
    payload: Result<Json<alert::Data>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(err) => {
            tracing::debug!("failed to deserialize alert group: {:?}", err);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": err.to_string() })),
            );
        }
    };

    match state.notifier.notify(&payload, &params).await {
        Ok(()) => (StatusCode::OK, Json(json!({}))),
        Err(err) => {
            tracing::error!(group_key = %payload.group_key, "failed to process alert group: {err}");
            (status_for(&err), Json(json!({ "error": err.to_string() })))
        }
    }
}

pub async fn run_webhook_receiver(notifier: Notifier) -> Result<()> {
    let state = Arc::new(State { notifier });
    let addr = WebhookReceiverSettings::global().to_socket_addr();

    let app = Router::new()
        .route("/v1/webhook", post(webhook))
        .layer(Extension(state));

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .context("webhook endpoint crashed")?;

    Ok(())
}
