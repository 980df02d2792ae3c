use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

use crate::domain::layout::LayoutRequestOptions;

/// Command-line arguments for the Pumpkin binary.
#[derive(Debug, Parser)]
#[command(name = "pumpkin", version, about = "Pumpkin rendering host")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PUMPKIN_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the rendering host.
    Serve(Box<ServeArgs>),
    /// Fetch a single layout document and print it as JSON.
    #[command(name = "layout")]
    Layout(LayoutArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct SitecoreOverrides {
    /// Override the default layout service endpoint.
    #[arg(long = "layout-service-uri", value_name = "URL")]
    pub layout_service_uri: Option<String>,

    /// Override the layout service API key.
    #[arg(long = "api-key", env = "PUMPKIN_API_KEY", value_name = "KEY")]
    pub api_key: Option<String>,

    /// Override the default site name.
    #[arg(long = "default-site-name", value_name = "NAME")]
    pub default_site_name: Option<String>,

    /// Override the layout service timeout.
    #[arg(long = "layout-timeout-ms", value_name = "MILLISECONDS")]
    pub layout_timeout_ms: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub sitecore: SitecoreOverrides,

    /// Override the runtime environment (development|production).
    #[arg(long = "environment", value_name = "NAME")]
    pub environment: Option<String>,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Toggle the experience editor endpoint.
    #[arg(
        long = "enable-experience-editor",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub enable_experience_editor: Option<bool>,

    /// Toggle the layout document cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,
}

#[derive(Debug, Args, Clone)]
pub struct LayoutArgs {
    #[command(flatten)]
    pub sitecore: SitecoreOverrides,

    /// Item path to request.
    #[arg(long, default_value = "/", value_name = "PATH")]
    pub path: String,

    /// Language to request; the handler and process defaults apply when omitted.
    #[arg(long, value_name = "LOCALE")]
    pub locale: Option<String>,

    /// Site to request; defaults to the configured default site.
    #[arg(long, value_name = "NAME")]
    pub site: Option<String>,

    /// Named layout handler; the default handler is used when omitted.
    #[arg(long, value_name = "NAME")]
    pub handler: Option<String>,

    /// Request edit-mode layout data.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub edit: bool,
}

impl LayoutArgs {
    /// Per-call overrides. Only flags that were passed are set, so handler
    /// defaults still show through.
    pub fn overrides(&self) -> LayoutRequestOptions {
        let mut overrides = LayoutRequestOptions::new()
            .path(self.path.clone())
            .edit_mode(self.edit);
        overrides.locale = self.locale.clone();
        overrides.site_name = self.site.clone();
        overrides
    }
}
