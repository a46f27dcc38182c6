use std::{future::IntoFuture, process, sync::Arc};

use storefront::{
    application::{
        catalog::CatalogOptions,
        error::AppError,
        report::ErrorSink,
        repos::{ProductsRepo, ProductsWriteRepo},
    },
    cache::{CacheConfig, CacheLayer},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AppState},
        memory::InMemoryProducts,
        sink::TracingErrorSink,
        telemetry,
        upstream::HttpFeedProvider,
    },
};
use tokio::sync::Notify;
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
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::migration(err.to_string())))?;

    info!(target = "storefront::migrate", "Migrations applied");
    Ok(())
}

type Repositories = (Arc<dyn ProductsRepo>, Arc<dyn ProductsWriteRepo>);

async fn init_repositories(settings: &config::Settings) -> Result<Repositories, AppError> {
    let Some(database_url) = settings.database.url.as_ref() else {
        warn!(
            target = "storefront::bootstrap",
            "database url is not configured; products are kept in memory"
        );
        let products = Arc::new(InMemoryProducts::new());
        return Ok((products.clone(), products));
    };

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::migration(err.to_string())))?;

    let repositories = Arc::new(PostgresRepositories::new(pool));
    Ok((repositories.clone(), repositories))
}

fn build_state(
    settings: &config::Settings,
    (reader, writer): Repositories,
) -> Result<AppState, AppError> {
    let cache = CacheLayer::new(CacheConfig::from(&settings.cache));
    let sink: Arc<dyn ErrorSink> = Arc::new(TracingErrorSink);

    let feed = HttpFeedProvider::new(
        settings.upstream.social_feed_url.clone(),
        settings.upstream.timeout,
    )?;

    let options = CatalogOptions::from_cache(&cache.config).with_page_sizes(
        settings.catalog.page_size,
        settings.catalog.max_page_size,
        settings.catalog.homepage_size,
    );

    info!(
        target = "storefront::bootstrap",
        cache_enabled = cache.config.enabled,
        render_cache_enabled = cache.config.render_enabled,
        max_entries = cache.config.max_entries,
        "Cache layer ready"
    );

    Ok(AppState::assemble(
        reader,
        writer,
        Arc::new(feed),
        sink,
        &cache,
        options,
        settings.upstream.feed_ttl_seconds,
    ))
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let state = build_state(&settings, repositories)?;
    serve_http(&settings, state).await
}

async fn serve_http(settings: &config::Settings, state: AppState) -> Result<(), AppError> {
    let router = http::build_router(state);
    let address = settings.server.addr;

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|source| AppError::from(InfraError::Bind { address, source }))?;

    info!(target = "storefront::http", %address, "Listening");

    let drain = Arc::new(Notify::new());
    let drain_trigger = drain.clone();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move { drain_trigger.notified().await })
        .into_future();
    let mut handle = tokio::spawn(server);

    tokio::select! {
        joined = &mut handle => return server_result(joined),
        () = shutdown_signal() => {}
    }

    info!(
        target = "storefront::http",
        grace_seconds = settings.server.graceful_shutdown.as_secs(),
        "Shutdown requested; draining connections"
    );
    drain.notify_one();

    match tokio::time::timeout(settings.server.graceful_shutdown, handle).await {
        Ok(joined) => server_result(joined),
        Err(_) => {
            warn!(
                target = "storefront::http",
                "Graceful shutdown deadline elapsed; dropping open connections"
            );
            Ok(())
        }
    }
}

fn server_result(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::unexpected(format!("server error: {err}"))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target = "storefront::http", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(target = "storefront::http", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
