use crate::analysis::{AnalyzerError, ScalpAnalyzer, ScreeningResult, SymptomAssessment, SymptomReport};
use crate::chat::{AssistantReply, ChatError, ChatReply, ChatService, FollowUpReply};
use crate::config::Config;
use crate::groq::GroqClient;
use crate::models::{
    AnalysisJob, AnalyzeRequest, ChatMessageRequest, ProcessingStatus,
    StatusResponse, SymptomListRequest,
};
use crate::queue::{AnalysisQueue, QueueError, QueueStats};
use crate::wellness::{self, SkinMetrics, SkinReading, WellnessReport};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Json as JsonExtractor,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Room for the JSON wrapper, the `data:` prefix and questionnaire fields.
const BODY_OVERHEAD_BYTES: usize = 64 * 1024;

/// Largest request body that can still carry a `max_image_bytes` image as base64.
pub fn body_limit_for(max_image_bytes: usize) -> usize {
    base64::encoded_len(max_image_bytes, true)
        .unwrap_or(usize::MAX)
        .saturating_add(BODY_OVERHEAD_BYTES)
}

/// Shared handles for every route.
#[derive(Clone)]
pub struct AppState {
    pub queue: AnalysisQueue,
    pub analyzer: ScalpAnalyzer,
    pub chat: ChatService,
    pub body_limit: usize,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self, AnalyzerError> {
        let analyzer = ScalpAnalyzer::new(config)?;
        let chat = ChatService::new(GroqClient::from_config(config)?, config.chat_history_limit);
        let queue = AnalysisQueue::new(config, analyzer.clone());

        Ok(Self {
            queue,
            analyzer,
            chat,
            body_limit: body_limit_for(config.max_image_bytes),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

type ApiError = (StatusCode, Json<ApiResponse<()>>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ApiResponse::error(message.into())))
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    #[serde(rename = "processing-id")]
    pub processing_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    #[serde(rename = "session-id")]
    pub session_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model: String,
    pub chat_sessions: usize,
    pub queue_stats: QueueStats,
}

fn image_error_status(e: &AnalyzerError) -> StatusCode {
    match e {
        AnalyzerError::Image(crate::encoding::EncodeError::Io { .. }) => StatusCode::NOT_FOUND,
        AnalyzerError::Image(crate::encoding::EncodeError::TooLarge { .. }) => {
            StatusCode::PAYLOAD_TOO_LARGE
        }
        AnalyzerError::Image(_) | AnalyzerError::Storage(_) => StatusCode::BAD_REQUEST,
        AnalyzerError::Groq(_) => StatusCode::BAD_GATEWAY,
        AnalyzerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn chat_error(e: ChatError) -> ApiError {
    match e {
        ChatError::SessionNotFound(_) => api_error(StatusCode::NOT_FOUND, e.to_string()),
        ChatError::EmptyMessage => api_error(StatusCode::BAD_REQUEST, e.to_string()),
        ChatError::Upstream(inner) => {
            error!("Chat model call failed: {}", inner);
            api_error(
                StatusCode::BAD_GATEWAY,
                "Sorry, I encountered an error while processing your request. Please try again.",
            )
        }
    }
}

pub async fn submit_analysis(
    State(state): State<AppState>,
    JsonExtractor(request): JsonExtractor<AnalyzeRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let Some(image) = request.image_source() else {
        warn!("Analysis request missing image");
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "image-path or image-data is required",
        ));
    };

    let job = AnalysisJob::new(image, request.symptoms, request.skip_screening);
    let processing_id = job.processing_id.clone();
    debug!("Received analysis request, assigned ID: {}", processing_id);

    match state.queue.submit(job).await {
        Ok(()) => Ok((
            StatusCode::ACCEPTED,
            Json(SubmitResponse {
                processing_id,
                status: "accepted".to_string(),
            }),
        )),
        Err(QueueError::QueueFull) => {
            warn!("Queue is full, rejecting request: {}", processing_id);
            Err(api_error(
                StatusCode::TOO_MANY_REQUESTS,
                "queue is full, please retry later",
            ))
        }
        Err(QueueError::QueueClosed) => {
            error!("Queue is closed, rejecting request: {}", processing_id);
            Err(api_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "service is shutting down",
            ))
        }
    }
}

pub async fn check_status(
    State(state): State<AppState>,
    Path(processing_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    debug!("Checking status for: {}", processing_id);

    match state.queue.get_status(&processing_id).await {
        ProcessingStatus::NotFound => Err(api_error(
            StatusCode::NOT_FOUND,
            "processing ID not found",
        )),
        status => Ok(Json(StatusResponse {
            processing_id,
            status,
        })),
    }
}

pub async fn get_results(
    State(state): State<AppState>,
    Path(processing_id): Path<String>,
) -> Result<Response, ApiError> {
    debug!("Getting results for: {}", processing_id);

    match state.queue.get_status(&processing_id).await {
        ProcessingStatus::NotFound => Err(api_error(
            StatusCode::NOT_FOUND,
            "processing ID not found",
        )),
        status @ (ProcessingStatus::Accepted | ProcessingStatus::InProgress) => Ok((
            StatusCode::ACCEPTED,
            Json(StatusResponse {
                processing_id,
                status,
            }),
        )
            .into_response()),
        ProcessingStatus::Failed => {
            let reason = state
                .queue
                .get_error(&processing_id)
                .await
                .unwrap_or_else(|| "processing failed".to_string());
            Err(api_error(StatusCode::UNPROCESSABLE_ENTITY, reason))
        }
        ProcessingStatus::Completed => match state.queue.get_result(&processing_id).await {
            Some(result) => Ok(Json(result).into_response()),
            None => {
                error!("Results missing for completed request: {}", processing_id);
                Err(api_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "results not available",
                ))
            }
        },
    }
}

pub async fn screen_upload(
    State(state): State<AppState>,
    JsonExtractor(request): JsonExtractor<AnalyzeRequest>,
) -> Result<Json<ScreeningResult>, ApiError> {
    let Some(image) = request.image_source() else {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "image-path or image-data is required",
        ));
    };

    state
        .analyzer
        .screen(&image)
        .await
        .map(Json)
        .map_err(|e| {
            warn!("Screening failed: {}", e);
            api_error(image_error_status(&e), e.to_string())
        })
}

pub async fn assess_symptoms(
    State(state): State<AppState>,
    JsonExtractor(report): JsonExtractor<SymptomReport>,
) -> Result<Json<SymptomAssessment>, ApiError> {
    if report.symptoms.iter().all(|s| s.trim().is_empty()) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "at least one symptom is required",
        ));
    }

    Ok(Json(state.analyzer.assess_symptoms(&report).await))
}

pub async fn start_chat(State(state): State<AppState>) -> (StatusCode, Json<SessionResponse>) {
    let session_id = state.chat.start_session().await;
    (StatusCode::CREATED, Json(SessionResponse { session_id }))
}

pub async fn send_chat_message(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    JsonExtractor(request): JsonExtractor<ChatMessageRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    state
        .chat
        .send(session_id, &request.message)
        .await
        .map(Json)
        .map_err(chat_error)
}

pub async fn reset_chat(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .chat
        .reset(session_id)
        .await
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(chat_error)
}

pub async fn end_chat(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .chat
        .end(session_id)
        .await
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(chat_error)
}

pub async fn ask_assistant(
    State(state): State<AppState>,
    JsonExtractor(request): JsonExtractor<ChatMessageRequest>,
) -> Result<Json<AssistantReply>, ApiError> {
    state
        .chat
        .ask_assistant(&request.message)
        .await
        .map(Json)
        .map_err(chat_error)
}

pub async fn assistant_diagnosis(
    State(state): State<AppState>,
    JsonExtractor(request): JsonExtractor<SymptomListRequest>,
) -> Result<Json<FollowUpReply>, ApiError> {
    if request.symptoms.iter().all(|s| s.trim().is_empty()) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "at least one symptom is required",
        ));
    }

    Ok(Json(state.chat.preliminary_diagnosis(&request.symptoms).await))
}

pub async fn assistant_treatment(
    State(state): State<AppState>,
    JsonExtractor(request): JsonExtractor<SymptomListRequest>,
) -> Result<Json<FollowUpReply>, ApiError> {
    if request.symptoms.iter().all(|s| s.trim().is_empty()) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "at least one symptom is required",
        ));
    }

    Ok(Json(state.chat.treatment_options(&request.symptoms).await))
}

#[derive(Debug, Default, Deserialize)]
pub struct WellnessRequest {
    #[serde(default)]
    pub samples: Vec<SkinReading>,
}

pub async fn wellness_report(
    JsonExtractor(request): JsonExtractor<WellnessRequest>,
) -> Json<WellnessReport> {
    debug!("Building wellness report from {} samples", request.samples.len());
    Json(wellness::summarize(&request.samples))
}

pub async fn measure_skin(
    State(state): State<AppState>,
    JsonExtractor(request): JsonExtractor<AnalyzeRequest>,
) -> Result<Json<SkinMetrics>, ApiError> {
    let Some(image) = request.image_source() else {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "image-path or image-data is required",
        ));
    };

    match state.analyzer.measure_skin(&image).await {
        Ok(Some(metrics)) => Ok(Json(metrics)),
        Ok(None) => Err(api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "image could not be decoded",
        )),
        Err(e) => {
            warn!("Skin measurement failed: {}", e);
            Err(api_error(image_error_status(&e), e.to_string()))
        }
    }
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    debug!("Health check requested");

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: state.analyzer.client().model().to_string(),
        chat_sessions: state.chat.session_count().await,
        queue_stats: state.queue.get_queue_stats().await,
    })
}

pub async fn queue_stats(State(state): State<AppState>) -> Json<QueueStats> {
    Json(state.queue.get_queue_stats().await)
}

pub async fn handle_404() -> ApiError {
    api_error(StatusCode::NOT_FOUND, "endpoint not found")
}
