use marketplace_portal::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    presence::{ONLINE_CHANNEL, PresenceHub},
    repository::{PostgresRepository, RepositoryState},
    storage::{S3StorageClient, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, initialises logging, connects Postgres and storage,
/// opens the presence channel, and serves the router.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast)
    // .env first, so AppConfig::load sees it.
    dotenv::dotenv().ok();
    // Panics on missing production secrets, an unknown APP_ENV or an invalid ROUTE_POLICY.
    let config = AppConfig::load();

    // 2. Logging filter: RUST_LOG wins, otherwise debug for this crate.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "marketplace_portal=debug,tower_http=info".into());

    // 3. Subscriber per environment
    match config.env {
        Env::Local => {
            // LOCAL: pretty, human-readable output.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // PROD: one JSON object per line for the log aggregator.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);
    if config.env == Env::Local {
        tracing::warn!("APP_ENV=local: the x-user-id identity bypass is enabled");
    }
    for (prefix, role) in config.route_policy.rules() {
        tracing::info!(%prefix, %role, "route policy rule");
    }

    // 4. Database (Postgres)
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 5. Storage (MinIO locally, Supabase Storage in production)
    let s3_client = S3StorageClient::new(
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_key,
        &config.s3_secret,
        &config.s3_bucket,
    )
    .await;

    // LOCAL-ONLY: create the MinIO bucket on first run.
    if config.env == Env::Local {
        use marketplace_portal::storage::StorageService;
        s3_client.ensure_bucket_exists().await;
    }

    let storage = Arc::new(s3_client) as StorageState;

    // 6. Presence: the one online channel for the life of the process.
    let hub = PresenceHub::new();
    let presence = Arc::new(
        hub.open(ONLINE_CHANNEL)
            .expect("FATAL: presence channel already open"),
    );

    // 7. State assembly and server startup
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState {
        repo,
        storage,
        presence,
        config,
    };

    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind listener. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    // Runs until ctrl-c; in-flight requests finish before shutdown.
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server error");
    }

    tracing::info!("server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
