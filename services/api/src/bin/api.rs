//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, MemoryStore, OpenAiAnalysisAdapter},
    analysis::{AnalysisCapability, Analyzer},
    config::Config,
    error::ApiError,
    web::{self, ApiDoc, AppState},
};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use mail_triage_core::ports::{CredentialStore, HistoryStore, SessionStore};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Storage & Run Migrations ---
    let (credential_store, session_store, history_store) = match &config.database_url {
        Some(database_url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            let db_adapter = Arc::new(DbAdapter::new(db_pool));
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            shared_stores(db_adapter)
        }
        None => {
            warn!("DATABASE_URL is not set; using in-memory storage. Nothing will survive a restart.");
            shared_stores(Arc::new(MemoryStore::new()))
        }
    };

    // --- 3. Initialize the Analysis Capability ---
    let capability = match &config.ai {
        Some(settings) => {
            info!("Analysis capability: {:?} model {}", settings.provider, settings.model);
            AnalysisCapability::Available(Arc::new(OpenAiAnalysisAdapter::from_settings(settings)))
        }
        None => {
            warn!("No OPENAI_API_KEY or GEMINI_API_KEY set; emails will be filed with default results.");
            AnalysisCapability::Unavailable {
                reason: "no model credentials configured".to_string(),
            }
        }
    };
    let analyzer = Analyzer::new(capability, config.ai_timeout, config.ai_max_retries);

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(
        config.clone(),
        credential_store,
        session_store,
        history_store,
        analyzer,
    ));

    let purged = app_state.gate.purge_expired().await?;
    info!("Removed {} expired sessions.", purged);
    spawn_session_purger(app_state.clone());

    // --- 5. Create the Web Router ---
    let cors_origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(web::router(app_state).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

type Stores = (
    Arc<dyn CredentialStore>,
    Arc<dyn SessionStore>,
    Arc<dyn HistoryStore>,
);

/// Hands out one backend as all three stores.
fn shared_stores<T>(store: Arc<T>) -> Stores
where
    T: CredentialStore + SessionStore + HistoryStore + 'static,
{
    (store.clone(), store.clone(), store)
}

/// Periodically drops expired auth sessions from the store.
fn spawn_session_purger(app_state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
        // The first tick fires immediately; startup already purged.
        interval.tick().await;
        loop {
            interval.tick().await;
            match app_state.gate.purge_expired().await {
                Ok(0) => {}
                Ok(n) => info!("Removed {} expired sessions.", n),
                Err(e) => error!("Failed to purge expired sessions: {}", e),
            }
        }
    });
}
