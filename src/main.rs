use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use lume_matchbot::config::{LoggingSettings, Settings};
use lume_matchbot::core::{
    CandidateDiscoveryEngine, ConversationStateMachine, Dispatcher, RetryExecutor,
};
use lume_matchbot::routes::{self, AppState};
use lume_matchbot::services::{MemoryStore, PersistenceStore, PgStore, VkClient};
use std::io;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST))
            .content_type("application/json")
            .body(serde_json::to_string(self).unwrap_or_default())
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

fn init_logging(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if logging.format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

fn startup_error(context: &str, e: impl std::fmt::Display) -> io::Error {
    error!("{}: {}", context, e);
    io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, e))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = Settings::load().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
    })?;

    init_logging(&settings.logging);
    info!("Starting Lume matchbot...");

    let store: Arc<dyn PersistenceStore> = if settings.database.in_memory {
        info!("Using in-memory store; nothing survives a restart");
        Arc::new(MemoryStore::new())
    } else {
        let store = PgStore::connect(&settings.database)
            .await
            .map_err(|e| startup_error("Failed to connect to PostgreSQL", e))?;
        info!(
            "PostgreSQL store initialized (max: {} connections)",
            settings.database.max_connections
        );
        Arc::new(store)
    };

    let vk = Arc::new(
        VkClient::new(settings.vk.clone())
            .map_err(|e| startup_error("Failed to build VK client", e))?,
    );

    let limiter = Arc::new(
        settings
            .rate_limit
            .build()
            .map_err(|e| startup_error("Invalid rate limit", e))?,
    );
    let retry = RetryExecutor::new(settings.retry.policy());

    let engine = Arc::new(CandidateDiscoveryEngine::new(
        vk.clone(),
        store.clone(),
        limiter,
        retry,
        settings.discovery.to_settings(),
    ));
    let machine = Arc::new(ConversationStateMachine::new(engine, store.clone(), vk));

    let shutdown = CancellationToken::new();
    let dispatcher = Arc::new(Dispatcher::new(machine, shutdown.clone()));

    info!(
        "Discovery ready: {} requests per {}ms, {} attempts",
        settings.rate_limit.max_requests, settings.rate_limit.period_ms, settings.retry.max_attempts
    );

    let app_state = AppState {
        dispatcher,
        store,
        callback: settings.callback.clone(),
    };

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    let result = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await;

    // Abandon handling that has not committed yet
    shutdown.cancel();
    info!("Lume matchbot stopped");
    result
}
