//! Renders issue titles, bodies and alert identities via tera templates.
//!
//! The render context carries the webhook payload and, when an issue was
//! abandoned by the reopen-window policy, that issue as `previous_issue`.
//! URL-escaping (`urlencode`), JSON marshaling (`json_encode`) and the
//! current time (`now()`) are available through tera's builtins.

use std::fs;

use anyhow::{Context, Result};
use tera::Tera;

use crate::{
    alert,
    github::issue::Issue,
    settings::{RenderArgs, Settings},
};

/// identity template used when the config does not set one
pub const DEFAULT_ALERT_ID_TEMPLATE: &str = "{{ payload.group_key }}";

const DEFAULT_TITLE_TEMPLATE: &str = include_str!("../templates/title.tera");
const DEFAULT_BODY_TEMPLATE: &str = include_str!("../templates/body.tera");

/// payload used by the `render` subcommand when no payload file is given
const SAMPLE_PAYLOAD: &str = include_str!("../samples/payload.json");
/// previous issue used by the `render` subcommand
const SAMPLE_ISSUE: &str = include_str!("../samples/issue.json");

const ALERT_ID_TEMPLATE: &str = "alert_id";
const TITLE_TEMPLATE: &str = "title";
const BODY_TEMPLATE: &str = "body";

/// template evaluator shared by the reconciler and the alert-id deriver
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    /// compile the configured templates, falling back to the embedded
    /// defaults where no file is configured
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let title = match &settings.templates.title {
            Some(path) => fs::read_to_string(path)
                .with_context(|| format!("could not read title template {}", path.display()))?,
            None => DEFAULT_TITLE_TEMPLATE.to_string(),
        };

        let body = match &settings.templates.body {
            Some(path) => fs::read_to_string(path)
                .with_context(|| format!("could not read body template {}", path.display()))?,
            None => DEFAULT_BODY_TEMPLATE.to_string(),
        };

        Self::new(&settings.alert_id_template, &title, &body)
            .context("failed to compile templates")
    }

    /// renderer over the embedded default templates
    pub fn with_default_templates() -> Result<Self, tera::Error> {
        Self::new(
            DEFAULT_ALERT_ID_TEMPLATE,
            DEFAULT_TITLE_TEMPLATE,
            DEFAULT_BODY_TEMPLATE,
        )
    }

    pub fn new(alert_id: &str, title: &str, body: &str) -> Result<Self, tera::Error> {
        let mut tera = Tera::default();

        tera.add_raw_template(ALERT_ID_TEMPLATE, alert_id)?;
        tera.add_raw_template(TITLE_TEMPLATE, title)?;
        tera.add_raw_template(BODY_TEMPLATE, body)?;

        Ok(Self { tera })
    }

    fn context(
        payload: &alert::Data,
        previous_issue: Option<&Issue>,
    ) -> Result<tera::Context, tera::Error> {
        let mut context = tera::Context::new();

        context.try_insert("payload", payload)?;
        context.try_insert("previous_issue", &previous_issue)?;
        context.try_insert(
            "label_keys_except_common",
            &payload.label_keys_except_common(),
        )?;
        context.try_insert(
            "annotation_keys_except_common",
            &payload.annotation_keys_except_common(),
        )?;

        Ok(context)
    }

    /// render the identity template, a pure function of the payload
    pub fn render_alert_id(&self, payload: &alert::Data) -> Result<String, tera::Error> {
        self.tera
            .render(ALERT_ID_TEMPLATE, &Self::context(payload, None)?)
    }

    pub fn render_title(
        &self,
        payload: &alert::Data,
        previous_issue: Option<&Issue>,
    ) -> Result<String, tera::Error> {
        self.tera
            .render(TITLE_TEMPLATE, &Self::context(payload, previous_issue)?)
    }

    pub fn render_body(
        &self,
        payload: &alert::Data,
        previous_issue: Option<&Issue>,
    ) -> Result<String, tera::Error> {
        self.tera
            .render(BODY_TEMPLATE, &Self::context(payload, previous_issue)?)
    }

    /// one-off render of an arbitrary template source
    pub fn render_str(
        source: &str,
        payload: &alert::Data,
        previous_issue: Option<&Issue>,
    ) -> Result<String, tera::Error> {
        Tera::one_off(source, &Self::context(payload, previous_issue)?, false)
    }
}

/// entry point of the `render` subcommand
pub fn run_render_command(args: &RenderArgs) -> Result<()> {
    let source = fs::read_to_string(&args.template_file).with_context(|| {
        format!(
            "could not read template file {}",
            args.template_file.display()
        )
    })?;

    let payload: alert::Data = match &args.payload_file {
        Some(path) => serde_json::from_str(
            &fs::read_to_string(path)
                .with_context(|| format!("could not read payload file {}", path.display()))?,
        )
        .context("could not parse payload file")?,
        None => serde_json::from_str(SAMPLE_PAYLOAD).context("could not parse sample payload")?,
    };

    let previous_issue: Option<Issue> = if args.no_previous_issue {
        None
    } else {
        Some(serde_json::from_str(SAMPLE_ISSUE).context("could not parse sample issue")?)
    };

    let rendered = Renderer::render_str(&source, &payload, previous_issue.as_ref())
        .context("failed to render template")?;
    println!("{rendered}");

    Ok(())
}
