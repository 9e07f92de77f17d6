use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command as ClapCommand};
use config::Config;
use once_cell::sync::OnceCell;
use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};
use url::Url;

use crate::{
    log::LogSettings, renderer::DEFAULT_ALERT_ID_TEMPLATE,
    telemetry_endpoint::TelemetryEndpointSettings, webhook_receiver::WebhookReceiverSettings,
};

static MATCHES: OnceCell<ArgMatches> = OnceCell::new();
static SETTINGS: OnceCell<Settings> = OnceCell::new();

/// what the process was asked to do on the command line
#[derive(Debug)]
pub enum RunMode {
    /// run the webhook receiver and telemetry endpoint
    Serve,
    /// render a template against a payload file and exit
    Render(RenderArgs),
}

/// arguments of the `render` subcommand
#[derive(Debug)]
pub struct RenderArgs {
    pub template_file: PathBuf,
    pub payload_file: Option<PathBuf>,
    pub no_previous_issue: bool,
}

fn app() -> ClapCommand<'static> {
    ClapCommand::new(clap::crate_name!())
        .version(clap::crate_version!())
        .about(clap::crate_description!())
        .args(&[
            Arg::new("config")
                .help("path of config file")
                .takes_value(true)
                .short('c')
                .long("config")
                .default_value("./config.yaml"),
            Arg::new("level")
                .help("log level")
                .possible_values(["Error", "Warn", "Info", "Debug", "Trace"])
                .ignore_case(true)
                .takes_value(true)
                .long("log"),
        ])
        .subcommand(
            ClapCommand::new("render")
                .about("render a template against a payload file and print the result")
                .args(&[
                    Arg::new("template-file")
                        .help("template file to render")
                        .takes_value(true)
                        .long("template-file")
                        .required(true),
                    Arg::new("payload-file")
                        .help("payload data file, a built-in sample is used when omitted")
                        .takes_value(true)
                        .long("payload-file"),
                    Arg::new("no-previous-issue")
                        .help("render without a previous issue in the context")
                        .long("no-previous-issue"),
                ]),
        )
}

fn matches() -> &'static ArgMatches {
    MATCHES.get_or_init(|| app().get_matches())
}

/// parse the command line once and report the requested run mode
pub fn run_mode() -> RunMode {
    match matches().subcommand() {
        Some(("render", sub)) => RunMode::Render(RenderArgs {
            // required argument, clap already rejected an empty invocation
            template_file: PathBuf::from(sub.value_of("template-file").unwrap_or_default()),
            payload_file: sub.value_of("payload-file").map(PathBuf::from),
            no_previous_issue: sub.is_present("no-previous-issue"),
        }),
        _ => RunMode::Serve,
    }
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub github: GitHubSettings,
    #[serde(default = "default_alert_id_template")]
    pub alert_id_template: String,
    /// labels attached to every issue the receiver files
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default = "default_auto_close")]
    pub auto_close_resolved_issues: bool,
    /// when set, alerts firing after a closed issue aged past this window
    /// create a new issue instead of reopening the old one
    #[serde_as(as = "Option<DurationSeconds<f64>>")]
    #[serde(default)]
    pub reopen_window: Option<Duration>,
    #[serde(default)]
    pub templates: TemplateSettings,
    pub webhook_receiver: WebhookReceiverSettings,
    pub telemetry_endpoint: TelemetryEndpointSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubSettings {
    /// api root, override for GitHub Enterprise deployments
    #[serde(default = "default_api_root")]
    pub api_root: Url,
    pub token: String,
}

/// paths of template files overriding the embedded defaults
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateSettings {
    #[serde(default)]
    pub title: Option<PathBuf>,
    #[serde(default)]
    pub body: Option<PathBuf>,
}

fn default_alert_id_template() -> String {
    DEFAULT_ALERT_ID_TEMPLATE.to_string()
}

fn default_auto_close() -> bool {
    true
}

fn default_api_root() -> Url {
    #[allow(clippy::unwrap_used)]
    let url = Url::parse("https://api.github.com").unwrap();
    url
}

impl Settings {
    pub fn global() -> &'static Self {
        SETTINGS.get_or_init(|| {
            match Self::load().context("failed to load config and command line arguments") {
                Ok(settings) => settings,
                Err(err) => {
                    // tracing wasn't setup yet
                    panic!("{:#?}", err);
                }
            }
        })
    }

    fn load() -> Result<Self> {
        let opts = matches();
        let config_path = opts.value_of("config").unwrap_or("./config.yaml");

        let conf = Config::builder()
            .add_source(config::File::with_name(config_path))
            .add_source(config::Environment::with_prefix("FOGHORN").separator("__"))
            .build()
            .context("can't load config")?;

        let mut settings: Settings = conf.try_deserialize().context("can't load config")?;

        if let Some(level) = opts.value_of("level") {
            settings.log.level = level.to_string();
        }

        Ok(settings)
    }
}
