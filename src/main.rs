//! prometheus alertmanager receiver that mirrors alert groups into GitHub issues
//!
//! Features:
//! - files one issue per alert identity and reopens or closes it as the alert fires and resolves
//! - optional reopen window after which resolved alerts get a fresh issue instead
//! - converges duplicate issues created by races against the search index

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::{
    github::client::GitHubClient,
    notifier::Notifier,
    settings::{RunMode, Settings},
};

mod alert;
mod alert_id;
mod github;
mod log;
mod notifier;
mod renderer;
mod settings;
mod telemetry_endpoint;
#[cfg(test)]
mod test_helpers;
mod webhook_receiver;

/// exit the complete program if one thread panics
fn setup_panic_handler() {
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        default_panic(info);
        std::process::exit(1);
    }));
}

/// the entry point of the program
#[tokio::main]
pub async fn main() -> Result<()> {
    setup_panic_handler();

    if let RunMode::Render(args) = settings::run_mode() {
        return renderer::run_render_command(&args);
    }

    log::setup_logging().context("could not setup logging")?;

    let settings = Settings::global();

    let tracker = GitHubClient::from_settings(&settings.github)
        .context("failed to construct github client")?;
    let notifier = Notifier::from_settings(Arc::new(tracker), settings)
        .context("failed to construct notifier")?;

    tokio::spawn(async move {
        #[allow(clippy::expect_used)]
        webhook_receiver::run_webhook_receiver(notifier)
            .await
            .expect("alertmanager webhook receiver endpoint failed to start or crashed");
    });

    telemetry_endpoint::run_telemetry_endpoint().await;

    Ok(())
}
