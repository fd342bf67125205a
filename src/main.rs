use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use soundpay::config::Config;
use soundpay::db::{create_pool, init_db, queries, AppState};
use soundpay::email::EmailService;
use soundpay::handlers;

#[derive(Parser, Debug)]
#[command(name = "soundpay")]
#[command(about = "Payment order reconciliation service for a musician storefront")]
struct Cli {
    /// Seed the database with dev data (a demo album with tracks)
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

/// Seeds the catalog read model with a demo album for local testing.
/// Only runs in dev mode and when the catalog is empty.
fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");

    let existing: i64 = conn
        .query_row("SELECT COUNT(*) FROM albums", [], |row| row.get(0))
        .expect("Failed to count albums");
    if existing > 0 {
        tracing::info!("Catalog already has data, skipping seed");
        return;
    }

    let album_id = "sp_alb_00000000000000000000000000000001";
    queries::insert_album(&conn, album_id, "Demo Album", "Demo Artist")
        .expect("Failed to seed album");
    for (position, title) in ["Opening", "Interlude", "Closing"].iter().enumerate() {
        queries::insert_track(&conn, album_id, title, position as i64 + 1)
            .expect("Failed to seed track");
    }

    tracing::info!("Seeded demo album: {}", album_id);
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "soundpay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }
    if config.platform_credentials.is_none() {
        tracing::warn!("No platform provider credentials configured; checkout will fail for sellers without their own config");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let http = reqwest::Client::new();
    let state = AppState {
        db: db_pool,
        http: http.clone(),
        email: EmailService::new(
            http,
            config.resend_api_key.clone(),
            config.email_from.clone(),
            config.site_url.clone(),
        ),
        site_url: config.site_url.clone(),
        provider_api_url: config.provider_api_url.clone(),
        platform_credentials: config.platform_credentials.clone(),
    };

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set SOUNDPAY_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    let app = Router::new()
        .merge(handlers::payments::router())
        .merge(handlers::webhooks::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();

    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("Soundpay server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        }
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
