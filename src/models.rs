use crate::analysis::report::AnalysisReport;
use crate::analysis::screening::ScreeningResult;
use crate::analysis::symptoms::SymptomReport;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of `POST /analyze` and `POST /screen`.
#[derive(Debug, Deserialize, Clone)]
pub struct AnalyzeRequest {
    #[serde(rename = "image-path")]
    pub image_path: Option<String>,

    /// Base64 image bytes, optionally as a `data:` URL.
    #[serde(rename = "image-data")]
    pub image_data: Option<String>,

    pub symptoms: Option<SymptomReport>,

    #[serde(rename = "skip-screening", default)]
    pub skip_screening: bool,
}

impl AnalyzeRequest {
    pub fn image_source(&self) -> Option<ImageSource> {
        match (&self.image_data, &self.image_path) {
            (Some(data), _) if !data.trim().is_empty() => Some(ImageSource::Inline(data.clone())),
            (_, Some(path)) if !path.trim().is_empty() => Some(ImageSource::Path(path.clone())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    /// Name resolved against the image directory.
    Path(String),
    /// Base64 payload uploaded with the request.
    Inline(String),
}

/// A queued analysis.
#[derive(Debug, Clone)]
pub struct AnalysisJob {
    pub processing_id: String,
    pub image: ImageSource,
    pub symptoms: Option<SymptomReport>,
    pub skip_screening: bool,
}

impl AnalysisJob {
    pub fn new(image: ImageSource, symptoms: Option<SymptomReport>, skip_screening: bool) -> Self {
        Self {
            processing_id: Uuid::new_v4().to_string(),
            image,
            symptoms,
            skip_screening,
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Analyzed,
    Rejected,
}

#[derive(Debug, Serialize, Clone)]
pub struct AnalysisOutcome {
    pub resolution: Resolution,
    pub screening: ScreeningResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<AnalysisReport>,
}

#[derive(Debug, Serialize, Clone)]
pub struct AnalysisResponse {
    #[serde(rename = "processing-id")]
    pub processing_id: String,

    pub results: AnalysisOutcome,
}

#[derive(Debug, Serialize, Clone)]
pub struct StatusResponse {
    #[serde(rename = "processing-id")]
    pub processing_id: String,

    pub status: ProcessingStatus,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Accepted,
    #[serde(rename = "in_progress")]
    InProgress,
    Completed,
    Failed,
    #[serde(rename = "not_found")]
    NotFound,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatMessageRequest {
    pub message: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SymptomListRequest {
    pub symptoms: Vec<String>,
}
