use std::{io, net::SocketAddr, path::PathBuf, sync::Arc};

use http::{HeaderValue, header};

// :(
use time::Duration;

use clap::Parser;

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware::{Next, from_fn},
    response::Response,
};

use axum_server::Handle;

use hearthstone_tracker::{
    app::{AppState, error::AppErrorKind},
    cli::{self, Args, Command},
    config::{Config, read_config},
    routes,
};

use anyhow::Error;

use sqlx::{
    Connection,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use tokio::{main, select, signal};

use tower::ServiceBuilder;

use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use tower_sessions::{CachingSessionStore, Expiry, SessionManagerLayer, cookie::SameSite};
use tower_sessions_moka_store::MokaStore;
use tower_sessions_sqlx_store::SqliteStore;

use cookie::Key;

use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt,
    prelude::*,
};

#[main]
async fn main() -> Result<(), Error> {
    dotenv::dotenv().ok();

    let registry = tracing_subscriber::registry()
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with(fmt::layer().with_writer(io::stderr));

    #[cfg(feature = "tracy")]
    let registry = registry.with(tracing_tracy::TracyLayer::default());

    registry.init();

    let cli = Args::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => PathBuf::from("config.toml"),
    };

    // Read config file
    let config = read_config(config_path)?;

    // Run any pending commands
    if let Some(command) = cli.command.as_ref() {
        match command {
            Command::CreateUser(create) => {
                // establish connection
                let mut conn = cli::connect(&connect_options(&config)?).await?;

                tracing::info!("creating user {}", create.name);

                let id = cli::create_user(create, config.server.bcrypt_cost, &mut conn).await?;
                println!("{}", id);

                conn.close().await?;
            }
            Command::SetRank(set_rank) => {
                let mut conn = cli::connect(&connect_options(&config)?).await?;
                let mut tx = conn.begin().await?;

                let id = cli::set_rank(set_rank, &mut tx).await?;
                tracing::info!(id, rank = ?set_rank.rank, "set rank");

                tx.commit().await?;
                conn.close().await?;
            }
            Command::GenerateKey(_) => {
                tracing::info!("generated! set ENCRYPTION_KEY or server.encryption_key on boot");

                let key = Key::generate();
                let key = base16::encode_lower(key.master());
                println!("{}", key);
            }
        }

        return Ok(());
    }

    let encryption_key = if let Some(key_str) = config.server.encryption_key.as_ref() {
        if key_str.len() != 128 {
            tracing::error!(
                "encryption key must be 128 hex chars! generate with `hearthstone-tracker generate-key`"
            );
            std::process::exit(1);
        }

        let mut key = [0u8; 64];
        base16::decode_slice(&key_str[..], &mut key)?;

        match Key::try_from(&key[..]) {
            Ok(key) => key,
            Err(err) => {
                tracing::error!("bad encryption key: {}", err);
                std::process::exit(1);
            }
        }
    } else {
        tracing::warn!(
            "generating runtime encryption key! sessions will stop working after restart"
        );
        tracing::warn!("generate a permanent key with `hearthstone-tracker generate-key`");
        Key::generate()
    };

    tracing::info!("establishing connection to database");

    // Connect to sqlite database
    let db = SqlitePoolOptions::new()
        .connect_with(connect_options(&config)?)
        .await?;

    tracing::info!("running migrations");
    sqlx::migrate!().run(&db).await?;

    // Create session management
    let db_session_store = SqliteStore::new(db.clone())
        .with_table_name("_session")
        .map_err(Error::msg)?;
    db_session_store.migrate().await?;

    let caching_session_store = MokaStore::new(Some(2_000));

    let session_expiry = Duration::try_from(config.server.session_expiry)?;

    let session_store = CachingSessionStore::new(caching_session_store, db_session_store);
    let session_layer = SessionManagerLayer::new(session_store)
        .with_name("id")
        .with_expiry(Expiry::OnInactivity(session_expiry))
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_private(encryption_key)
        .with_secure(config.server.secure_sessions);

    let port = config.http.port;

    // Create app state
    let state = AppState::new(db.clone(), config);

    // Finalize router
    let router = Router::new()
        .merge(routes::router(state).layer(from_fn(security_headers)))
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(log_app_errors))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|req: &Request| {
                            let method = req.method();
                            let uri = req.uri();

                            // axum automatically adds this extension.
                            let matched_path = req
                                .extensions()
                                .get::<MatchedPath>()
                                .map(|matched_path| matched_path.as_str());

                            tracing::debug_span!("request", %method, %uri, matched_path)
                        })
                        // By default `TraceLayer` will log 5xx responses but we're doing our specific
                        // logging of errors so disable that
                        .on_failure(()),
                )
                .layer(CompressionLayer::new())
                .layer(session_layer),
        );

    let handle = Handle::new();

    // run shutdown task to detect shutdowns
    tokio::spawn(shutdown_signal(handle.clone()));

    let addr: SocketAddr = ([0, 0, 0, 0], port).into();

    tracing::info!("listening on {} (http)", addr);

    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await?;

    tracing::info!("shutting down");

    db.close().await;

    Ok(())
}

fn connect_options(config: &Config) -> Result<SqliteConnectOptions, Error> {
    let database_url = config
        .server
        .database_url
        .as_deref()
        .ok_or_else(|| Error::msg("No `DATABASE_URL` set!"))?;

    Ok(database_url
        .parse::<SqliteConnectOptions>()?
        .create_if_missing(true))
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut res = next.run(request).await;

    res.headers_mut().extend([
        (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
        (
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("frame-ancestors 'none'"),
        ),
        (
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ),
        (header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY")),
    ]);

    res
}

// Stolen from: https://github.com/tokio-rs/axum/blob/main/examples/error-handling/src/main.rs
async fn log_app_errors(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    // If the response contains an AppErrorKind Extension, log it.
    if let Some(err) = response.extensions().get::<Arc<AppErrorKind>>() {
        tracing::error!(?err, "an unexpected error occurred inside a handler");
    }
    response
}

// Stolen from: https://github.com/maxcountryman/tower-sessions-stores/tree/main/sqlx-store
// Lol
async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    select! {
        _ = ctrl_c => { handle.shutdown() }
        _ = terminate => { handle.shutdown() }
    }
}
