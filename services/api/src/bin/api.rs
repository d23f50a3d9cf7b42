//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        GoogleSheetsFeedbackStore, LopdfExtractor, UnconfiguredFeedbackStore,
        YoutubeTranscriptAdapter,
    },
    config::Config,
    error::ApiError,
    web::{router, ApiDoc, AppState, LlmProvider, SessionStore},
};
use axum::http::{header::CONTENT_TYPE, HeaderName, Method};
use axum::Router;
use std::sync::Arc;
use study_kit_core::{FeedbackStore, StudyService};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize Service Adapters ---
    let http = reqwest::Client::new();
    let transcripts = Arc::new(YoutubeTranscriptAdapter::new(http.clone()));
    let documents = Arc::new(LopdfExtractor::new());

    let feedback: Arc<dyn FeedbackStore> = match &config.service_account_json {
        Some(key) => Arc::new(GoogleSheetsFeedbackStore::new(
            http.clone(),
            key,
            config.spreadsheet_name.clone(),
        )?),
        None => {
            warn!("No service account credentials found; feedback will not be saved.");
            Arc::new(UnconfiguredFeedbackStore)
        }
    };

    let llm = LlmProvider::from_config(&config);
    if !llm.has_configured_key() {
        warn!("GOOGLE_API_KEY is not configured; clients must send the x-api-key header.");
    }

    // --- 3. Build the Shared AppState ---
    let study = Arc::new(StudyService::new(
        transcripts,
        documents,
        feedback,
        config.study_settings(),
    ));
    let app_state = Arc::new(AppState {
        config: config.clone(),
        study,
        llm,
        sessions: SessionStore::default(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static("x-api-key")]);

    // --- 4. Create the Web Router ---
    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(router(app_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
