//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, num::NonZeroUsize, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

mod cli;

pub use cli::{CliArgs, Command, LayoutArgs, ServeArgs, ServeOverrides, SitecoreOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "pumpkin";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_LAYOUT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_MAX_LAYOUT_BYTES: usize = 4 * 1024 * 1024;
const DEFAULT_LOCALE: &str = "en";
const DEFAULT_HANDLER_NAME: &str = "default";
const DEFAULT_EDITOR_ENDPOINT: &str = "/jss-render";
const DEFAULT_CACHE_CAPACITY: usize = 256;
const DEFAULT_CACHE_TTL_SECS: u64 = 30;
const RESERVED_ROUTES: [&str; 2] = ["/error", "/_health"];

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub environment: RuntimeEnvironment,
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub sitecore: SitecoreSettings,
    pub experience_editor: ExperienceEditorSettings,
    pub forwarded_headers: ForwardedHeadersSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEnvironment {
    Development,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_development(self) -> bool {
        matches!(self, RuntimeEnvironment::Development)
    }
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct SitecoreSettings {
    pub default_site_name: Option<String>,
    pub api_key: String,
    pub layout_service_uri: Url,
    pub instance_uri: Url,
    pub rendering_host_uri: Option<Url>,
    pub enable_experience_editor: bool,
    pub layout_timeout: Duration,
    pub max_layout_bytes: usize,
    pub default_locale: String,
    pub supported_locales: Vec<String>,
    pub sites: Vec<SiteBinding>,
    pub handlers: Vec<HandlerSettings>,
}

/// A logical site served by this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteBinding {
    pub name: String,
    pub hosts: Vec<String>,
    pub api_key: Option<String>,
    pub default_locale: Option<String>,
}

/// A named layout service endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerSettings {
    pub name: String,
    pub uri: Url,
    pub site_name: Option<String>,
    pub locale: Option<String>,
    pub timeout: Duration,
    pub default: bool,
}

#[derive(Debug, Clone)]
pub struct ExperienceEditorSettings {
    pub endpoint: String,
    pub editing_secret: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct ForwardedHeadersSettings {
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct CacheSettings {
    pub enabled: bool,
    pub capacity: NonZeroUsize,
    pub ttl: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix("PUMPKIN")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("sitecore.supported_locales"),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Layout(args)) => raw.apply_sitecore_overrides(&args.sitecore),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    environment: Option<String>,
    server: RawServerSettings,
    logging: RawLoggingSettings,
    sitecore: RawSitecoreSettings,
    experience_editor: RawExperienceEditorSettings,
    forwarded_headers: RawForwardedHeadersSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(environment) = overrides.environment.as_ref() {
            self.environment = Some(environment.clone());
        }
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(enabled) = overrides.enable_experience_editor {
            self.sitecore.enable_experience_editor = Some(enabled);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }

        self.apply_sitecore_overrides(&overrides.sitecore);
    }

    fn apply_sitecore_overrides(&mut self, overrides: &SitecoreOverrides) {
        if let Some(uri) = overrides.layout_service_uri.as_ref() {
            self.sitecore.layout_service_uri = Some(uri.clone());
        }
        if let Some(key) = overrides.api_key.as_ref() {
            self.sitecore.api_key = Some(key.clone());
        }
        if let Some(site) = overrides.default_site_name.as_ref() {
            self.sitecore.default_site_name = Some(site.clone());
        }
        if let Some(timeout) = overrides.layout_timeout_ms {
            self.sitecore.layout_timeout_ms = Some(timeout);
        }
    }
}

impl Settings {
    /// Settings from a single TOML document, without environment or CLI layers.
    pub fn from_toml(source: &str) -> Result<Self, LoadError> {
        let raw: RawSettings = Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            environment,
            server,
            logging,
            sitecore,
            experience_editor,
            forwarded_headers,
            cache,
        } = raw;

        let environment = build_environment(environment)?;
        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let sitecore = build_sitecore_settings(sitecore)?;
        let experience_editor = build_experience_editor_settings(experience_editor)?;
        let forwarded_headers = ForwardedHeadersSettings {
            enabled: forwarded_headers.enabled.unwrap_or(true),
        };
        let cache = build_cache_settings(cache)?;

        Ok(Self {
            environment,
            server,
            logging,
            sitecore,
            experience_editor,
            forwarded_headers,
            cache,
        })
    }
}

fn build_environment(raw: Option<String>) -> Result<RuntimeEnvironment, LoadError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(RuntimeEnvironment::Production),
        Some(value) if value.eq_ignore_ascii_case("production") => {
            Ok(RuntimeEnvironment::Production)
        }
        Some(value) if value.eq_ignore_ascii_case("development") => {
            Ok(RuntimeEnvironment::Development)
        }
        Some(other) => Err(LoadError::invalid(
            "environment",
            format!("expected `development` or `production`, got `{other}`"),
        )),
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_sitecore_settings(sitecore: RawSitecoreSettings) -> Result<SitecoreSettings, LoadError> {
    let api_key = non_empty(sitecore.api_key)
        .ok_or_else(|| LoadError::invalid("sitecore.api_key", "must be configured"))?;

    let layout_service_uri = non_empty(sitecore.layout_service_uri)
        .ok_or_else(|| LoadError::invalid("sitecore.layout_service_uri", "must be configured"))
        .and_then(|raw| parse_url("sitecore.layout_service_uri", &raw))?;

    let instance_uri = match non_empty(sitecore.instance_uri) {
        Some(raw) => parse_url("sitecore.instance_uri", &raw)?,
        None => origin_of(&layout_service_uri)
            .map_err(|reason| LoadError::invalid("sitecore.instance_uri", reason))?,
    };

    let rendering_host_uri = non_empty(sitecore.rendering_host_uri)
        .map(|raw| parse_url("sitecore.rendering_host_uri", &raw))
        .transpose()?;

    let timeout_ms = sitecore
        .layout_timeout_ms
        .unwrap_or(DEFAULT_LAYOUT_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(LoadError::invalid(
            "sitecore.layout_timeout_ms",
            "must be greater than zero",
        ));
    }
    let layout_timeout = Duration::from_millis(timeout_ms);

    let max_layout_bytes = sitecore.max_layout_bytes.unwrap_or(DEFAULT_MAX_LAYOUT_BYTES);
    if max_layout_bytes == 0 {
        return Err(LoadError::invalid(
            "sitecore.max_layout_bytes",
            "must be greater than zero",
        ));
    }

    let default_locale =
        non_empty(sitecore.default_locale).unwrap_or_else(|| DEFAULT_LOCALE.to_string());

    let mut supported_locales: Vec<String> = sitecore
        .supported_locales
        .unwrap_or_default()
        .into_iter()
        .filter_map(|locale| non_empty(Some(locale)))
        .collect();
    if !supported_locales
        .iter()
        .any(|locale| locale.eq_ignore_ascii_case(&default_locale))
    {
        supported_locales.insert(0, default_locale.clone());
    }

    let default_site_name = non_empty(sitecore.default_site_name);

    let sites = sitecore
        .sites
        .unwrap_or_default()
        .into_iter()
        .map(build_site_binding)
        .collect::<Result<Vec<_>, _>>()?;

    let mut handlers = vec![HandlerSettings {
        name: DEFAULT_HANDLER_NAME.to_string(),
        uri: layout_service_uri.clone(),
        site_name: None,
        locale: None,
        timeout: layout_timeout,
        default: true,
    }];
    for raw_handler in sitecore.handlers.unwrap_or_default() {
        let handler = build_handler_settings(raw_handler, layout_timeout)?;
        // An entry named like the built-in handler replaces it.
        if handler.name.eq_ignore_ascii_case(DEFAULT_HANDLER_NAME) {
            handlers[0] = HandlerSettings {
                default: true,
                ..handler
            };
        } else {
            handlers.push(handler);
        }
    }
    if handlers.iter().skip(1).any(|handler| handler.default) {
        handlers[0].default = false;
    }

    Ok(SitecoreSettings {
        default_site_name,
        api_key,
        layout_service_uri,
        instance_uri,
        rendering_host_uri,
        enable_experience_editor: sitecore.enable_experience_editor.unwrap_or(false),
        layout_timeout,
        max_layout_bytes,
        default_locale,
        supported_locales,
        sites,
        handlers,
    })
}

fn build_site_binding(raw: RawSiteBinding) -> Result<SiteBinding, LoadError> {
    let name = non_empty(raw.name)
        .ok_or_else(|| LoadError::invalid("sitecore.sites.name", "must not be empty"))?;
    let hosts = raw
        .hosts
        .unwrap_or_default()
        .into_iter()
        .filter_map(|host| non_empty(Some(host)))
        .map(|host| host.to_ascii_lowercase())
        .collect();

    Ok(SiteBinding {
        name,
        hosts,
        api_key: non_empty(raw.api_key),
        default_locale: non_empty(raw.default_locale),
    })
}

fn build_handler_settings(
    raw: RawHandlerSettings,
    default_timeout: Duration,
) -> Result<HandlerSettings, LoadError> {
    let name = non_empty(raw.name)
        .ok_or_else(|| LoadError::invalid("sitecore.handlers.name", "must not be empty"))?;
    let uri = non_empty(raw.uri)
        .ok_or_else(|| LoadError::invalid("sitecore.handlers.uri", "must be configured"))
        .and_then(|value| parse_url("sitecore.handlers.uri", &value))?;
    let timeout = match raw.timeout_ms {
        Some(0) => {
            return Err(LoadError::invalid(
                "sitecore.handlers.timeout_ms",
                "must be greater than zero",
            ));
        }
        Some(ms) => Duration::from_millis(ms),
        None => default_timeout,
    };

    Ok(HandlerSettings {
        name,
        uri,
        site_name: non_empty(raw.site_name),
        locale: non_empty(raw.locale),
        timeout,
        default: raw.default.unwrap_or(false),
    })
}

fn build_experience_editor_settings(
    raw: RawExperienceEditorSettings,
) -> Result<ExperienceEditorSettings, LoadError> {
    let endpoint =
        non_empty(raw.endpoint).unwrap_or_else(|| DEFAULT_EDITOR_ENDPOINT.to_string());
    if !endpoint.starts_with('/') {
        return Err(LoadError::invalid(
            "experience_editor.endpoint",
            "must be an absolute path starting with `/`",
        ));
    }
    if endpoint.contains([':', '*', '{', '}']) {
        return Err(LoadError::invalid(
            "experience_editor.endpoint",
            "must be a literal path without route parameters",
        ));
    }
    if RESERVED_ROUTES
        .iter()
        .any(|reserved| endpoint.trim_end_matches('/').eq_ignore_ascii_case(reserved))
    {
        return Err(LoadError::invalid(
            "experience_editor.endpoint",
            format!("`{endpoint}` is reserved"),
        ));
    }

    Ok(ExperienceEditorSettings {
        endpoint,
        editing_secret: non_empty(raw.editing_secret),
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let capacity_value = cache.capacity.unwrap_or(DEFAULT_CACHE_CAPACITY);
    let capacity = NonZeroUsize::new(capacity_value)
        .ok_or_else(|| LoadError::invalid("cache.capacity", "must be greater than zero"))?;

    let ttl_seconds = cache.ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS);
    if ttl_seconds == 0 {
        return Err(LoadError::invalid(
            "cache.ttl_seconds",
            "must be greater than zero",
        ));
    }

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(false),
        capacity,
        ttl: Duration::from_secs(ttl_seconds),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSitecoreSettings {
    default_site_name: Option<String>,
    api_key: Option<String>,
    layout_service_uri: Option<String>,
    instance_uri: Option<String>,
    rendering_host_uri: Option<String>,
    enable_experience_editor: Option<bool>,
    layout_timeout_ms: Option<u64>,
    max_layout_bytes: Option<usize>,
    default_locale: Option<String>,
    supported_locales: Option<Vec<String>>,
    sites: Option<Vec<RawSiteBinding>>,
    handlers: Option<Vec<RawHandlerSettings>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteBinding {
    name: Option<String>,
    hosts: Option<Vec<String>>,
    api_key: Option<String>,
    default_locale: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawHandlerSettings {
    name: Option<String>,
    uri: Option<String>,
    site_name: Option<String>,
    locale: Option<String>,
    timeout_ms: Option<u64>,
    default: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawExperienceEditorSettings {
    endpoint: Option<String>,
    editing_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawForwardedHeadersSettings {
    enabled: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    capacity: Option<usize>,
    ttl_seconds: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_url(key: &'static str, raw: &str) -> Result<Url, LoadError> {
    let url = Url::parse(raw).map_err(|err| LoadError::invalid(key, format!("{raw}: {err}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(LoadError::invalid(
            key,
            format!("unsupported scheme `{other}`"),
        )),
    }
}

fn origin_of(url: &Url) -> Result<Url, String> {
    let origin = url.origin().ascii_serialization();
    Url::parse(&origin).map_err(|err| format!("cannot derive origin from `{url}`: {err}"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}
