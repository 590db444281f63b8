use std::net::SocketAddr;
use std::sync::Arc;

use acemusic_acestep::AceStepApi;
use acemusic_api::config::ServerConfig;
use acemusic_api::router::build_app_router;
use acemusic_api::state::AppState;
use acemusic_api::templates::Templates;
use acemusic_pipeline::GenerationService;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "acemusic_api=debug,acemusic_pipeline=debug,acemusic_acestep=info,tower_http=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env().expect("Invalid configuration");
    tracing::info!(
        host = %config.host,
        port = config.port,
        acestep = %config.acestep_api_url,
        output_dir = %config.output_dir.display(),
        "Loaded server configuration"
    );

    // --- Database ---
    let pool = acemusic_db::create_pool(&config.database_url)
        .await
        .expect("Failed to open database");
    tracing::info!("Database connection pool created");

    acemusic_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    acemusic_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Output directory ---
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .expect("Failed to create output directory");

    // --- ACE-Step client and background polling ---
    let client = AceStepApi::new(&config.acestep_config()).expect("Invalid ACE-Step settings");
    let generation = GenerationService::new(pool.clone(), Arc::new(client), config.poll_settings());

    match generation.resume_unfinished().await {
        Ok(0) => {}
        Ok(resumed) => tracing::info!(resumed, "Resumed polling for unfinished tracks"),
        Err(e) => tracing::error!(error = %e, "Failed to resume unfinished tracks"),
    }

    // --- App state ---
    let templates = Templates::new().expect("Failed to compile templates");
    let state = AppState {
        pool: pool.clone(),
        config: Arc::new(config.clone()),
        generation: generation.clone(),
        templates: Arc::new(templates),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!(
        active_polls = generation.active_polls(),
        "Server stopped accepting connections, cleaning up"
    );

    // Unfinished tracks stay queued/generating and are resumed next start.
    generation.shutdown().await;
    pool.close().await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
