use std::{net::SocketAddr, process, sync::Arc, time::Duration};

use pumpkin::{
    application::{
        error::AppError,
        layout::{ForwardedContext, HandlerRegistry, LayoutClient},
        page::PageService,
        render::{ComponentRegistry, ComponentRenderer},
    },
    cache::LayoutCache,
    config,
    domain::request::RequestSnapshot,
    infra::{
        error::InfraError,
        http::{self, HttpState},
        layout_http::ReqwestLayoutTransport,
        telemetry,
    },
};
use tokio::signal;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Layout(args) => run_layout(settings, args).await,
    }
}

fn build_layout_client(settings: &config::Settings) -> Result<LayoutClient, AppError> {
    let registry = HandlerRegistry::from_settings(&settings.sitecore)?;
    let transport = Arc::new(ReqwestLayoutTransport::new(settings.sitecore.max_layout_bytes)?);
    let client = LayoutClient::new(
        registry,
        transport,
        LayoutClient::process_defaults(&settings.sitecore),
    );

    if settings.cache.enabled {
        Ok(client.with_cache(Arc::new(LayoutCache::new(&settings.cache))))
    } else {
        Ok(client)
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let client = build_layout_client(&settings)?;
    info!(
        target = "pumpkin::startup",
        handlers = ?client.registry().names().collect::<Vec<_>>(),
        default_handler = %client.registry().default_handler().name,
        experience_editor = settings.sitecore.enable_experience_editor,
        cache = settings.cache.enabled,
        "Layout client ready"
    );

    let pages = PageService::new(client, ComponentRenderer::new(ComponentRegistry::standard()));
    let state = HttpState::new(&settings, pages);
    let router = http::build_router(state);

    let addr = settings.server.addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| InfraError::Bind { addr, source })?;
    info!(
        target = "pumpkin::startup",
        addr = %addr,
        "Rendering host listening"
    );

    let grace = settings.server.graceful_shutdown;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(grace))
    .await
    .map_err(InfraError::Serve)?;

    info!(target = "pumpkin::shutdown", "Rendering host stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM. A second wait bounds how long in-flight
/// requests may keep the process alive.
async fn shutdown_signal(grace: Duration) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(target = "pumpkin::shutdown", error = %err, "Ctrl-C handler failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(target = "pumpkin::shutdown", error = %err, "SIGTERM handler failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!(
        target = "pumpkin::shutdown",
        grace_seconds = grace.as_secs(),
        "Shutdown requested; draining connections"
    );
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        warn!(
            target = "pumpkin::shutdown",
            "Graceful shutdown timed out; exiting"
        );
        process::exit(1);
    });
}

async fn run_layout(settings: config::Settings, args: config::LayoutArgs) -> Result<(), AppError> {
    let client = build_layout_client(&settings)?;

    let overrides = args.overrides();
    let snapshot = RequestSnapshot::get(&args.path);
    let forwarded = ForwardedContext::from_request(&snapshot, None, None, None);
    let document = client
        .fetch(args.handler.as_deref(), &overrides, &forwarded)
        .await?;

    let json = serde_json::to_string_pretty(&document)?;
    println!("{json}");
    Ok(())
}
