use std::net::SocketAddr;
use std::sync::Arc;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::BookingService;
use doctor_cell::DoctorService;
use notification_cell::messenger_from_config;
use shared_config::AppConfig;
use shared_database::{DocumentStore, MemoryDocumentStore, RedisDocumentStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting hospital appointment API server");

    // Load configuration
    let config = Arc::new(AppConfig::from_env());

    // Document store is built once here and handed to every cell
    let store: Arc<dyn DocumentStore> = if config.redis_url.is_some() {
        Arc::new(RedisDocumentStore::connect(&config).await?)
    } else {
        warn!("Bookings are kept in process memory and will be lost on restart");
        Arc::new(MemoryDocumentStore::new())
    };

    let directory = Arc::new(DoctorService::new(Arc::clone(&store)));
    let bookings = Arc::new(BookingService::new(
        Arc::clone(&store),
        directory,
        messenger_from_config(&config),
        config.slot_transaction_retries,
    ));

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(config.clone(), store, bookings)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
