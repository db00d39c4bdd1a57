pub mod analysis;
pub mod chat;
pub mod config;
pub mod encoding;
pub mod groq;
pub mod handlers;
pub mod models;
pub mod queue;
pub mod storage;
pub mod wellness;

pub use analysis::{AnalyzerError, ScalpAnalyzer};
pub use chat::{ChatError, ChatService};
pub use config::{read_api_key, ApiKey, Config, ConfigError, API_KEY_VAR};
pub use encoding::{encode_image, EncodeError};
pub use groq::{GroqClient, GroqError};
pub use handlers::AppState;
pub use models::*;
pub use queue::{AnalysisQueue, QueueError, QueueStats};

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

pub fn build_router(state: AppState) -> Router {
    use handlers::*;

    let body_limit = state.body_limit;

    Router::new()
        // Image analysis
        .route("/analyze", post(submit_analysis))
        .route("/status/:id", get(check_status))
        .route("/results/:id", get(get_results))
        .route("/screen", post(screen_upload))
        .route("/symptoms", post(assess_symptoms))
        // Doc Bot conversations
        .route("/chat/sessions", post(start_chat))
        .route("/chat/sessions/:id", delete(end_chat))
        .route("/chat/sessions/:id/messages", post(send_chat_message))
        .route("/chat/sessions/:id/reset", post(reset_chat))
        // Hair assistant
        .route("/assistant", post(ask_assistant))
        .route("/assistant/diagnosis", post(assistant_diagnosis))
        .route("/assistant/treatment", post(assistant_treatment))
        // Skin wellness
        .route("/wellness/report", post(wellness_report))
        .route("/wellness/measure", post(measure_skin))
        // Health and monitoring
        .route("/health", get(health_check))
        .route("/stats", get(queue_stats))
        .fallback(handle_404)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_request(DefaultOnRequest::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(CorsLayer::permissive()),
        )
}
