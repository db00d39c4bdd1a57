use crate::analysis::report::{
    fallback_report, fallback_symptom_assessment, parse_model_response, parse_symptom_assessment,
    AnalysisReport, SymptomAssessment,
};
use crate::analysis::screening::{screen_image, ScreeningResult};
use crate::analysis::symptoms::SymptomReport;
use crate::config::Config;
use crate::encoding::{decode_base64, EncodeError, LoadedImage};
use crate::groq::{ChatMessage, CompletionRequest, GroqClient, GroqError};
use crate::models::{AnalysisJob, AnalysisOutcome, ImageSource, Resolution};
use crate::storage::{ImageStore, StorageError};
use crate::wellness::{measure_image, SkinMetrics};

use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("Image error: {0}")]
    Image(#[from] EncodeError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Groq client error: {0}")]
    Groq(#[from] GroqError),
    #[error("Internal error: {0}")]
    Internal(String),
}

const IMAGE_PROMPT: &str = "As a medical AI specialist, analyze this hair/scalp image and provide a comprehensive diagnostic assessment. Include: 1) Primary diagnosis with confidence level, 2) Severity assessment, 3) Contributing factors, 4) Treatment recommendations with timeline, 5) Prognosis.";

const JSON_INSTRUCTIONS: &str = "Respond with a single JSON object using these keys: \
\"primary_diagnosis\" (string), \"confidence\" (0 to 1), \"severity\" (Mild, Moderate or Severe), \
\"stage\" (string), \"description\" (string, include the prognosis), \"treatment_success\" (percent), \
\"contributing_factors\" (array of strings), \
\"treatments\" (array of {\"name\", \"description\", \"priority\"}), \
\"metrics\" ({\"hair_density\", \"scalp_health\", \"progression_risk\"} as percents).";

fn image_prompt(symptoms: Option<&SymptomReport>) -> String {
    match symptoms {
        None => format!("{IMAGE_PROMPT}\n\n{JSON_INSTRUCTIONS}"),
        Some(s) => format!(
            "As a medical AI specialist, analyze this hair/scalp condition using both the uploaded image and these symptoms: {}. \
            Provide a comprehensive diagnostic assessment including: 1) Primary diagnosis with confidence level, \
            2) How symptoms correlate with visual findings, 3) Severity assessment, 4) Contributing factors, \
            5) Treatment recommendations with timeline, 6) Prognosis. \
            Consider the patient's age range: {}, symptom duration: {}, and severity: {}.\n\n{JSON_INSTRUCTIONS}",
            s.joined(),
            s.age_label(),
            s.duration,
            s.severity.label().to_lowercase(),
        ),
    }
}

fn symptom_prompt(symptoms: &SymptomReport) -> String {
    format!(
        "Analyze these hair/scalp symptoms: {} (duration: {}, severity: {}, age range: {}). \
        Provide differential diagnosis, severity assessment, and treatment recommendations. \
        Respond with a JSON object with the keys \"likely_conditions\", \"risk_factors\" and \
        \"recommendations\", each an array of strings.",
        symptoms.joined(),
        symptoms.duration,
        symptoms.severity.label().to_lowercase(),
        symptoms.age_label(),
    )
}

/// Screens scalp photos and asks the vision model for a structured assessment.
#[derive(Debug, Clone)]
pub struct ScalpAnalyzer {
    client: GroqClient,
    store: ImageStore,
    max_image_bytes: usize,
}

impl ScalpAnalyzer {
    pub fn new(config: &Config) -> Result<Self, AnalyzerError> {
        Ok(Self {
            client: GroqClient::from_config(config)?,
            store: config.image_store()?,
            max_image_bytes: config.max_image_bytes,
        })
    }

    pub fn with_client(client: GroqClient, store: ImageStore, max_image_bytes: usize) -> Self {
        Self {
            client,
            store,
            max_image_bytes,
        }
    }

    pub fn client(&self) -> &GroqClient {
        &self.client
    }

    pub fn load(&self, source: &ImageSource) -> Result<LoadedImage, AnalyzerError> {
        match source {
            ImageSource::Path(name) => {
                let path = self.store.resolve(name)?;
                debug!("Loading image from {}", path.display());
                Ok(LoadedImage::read(path, self.max_image_bytes)?)
            }
            ImageSource::Inline(data) => {
                let bytes = decode_base64(data)?;
                Ok(LoadedImage::from_bytes(bytes, self.max_image_bytes)?)
            }
        }
    }

    pub async fn screen(&self, source: &ImageSource) -> Result<ScreeningResult, AnalyzerError> {
        let image = self.load(source)?;
        Self::screen_loaded(image).await
    }

    /// Skin wellness metrics for a face photo; `None` when it cannot be decoded.
    pub async fn measure_skin(&self, source: &ImageSource) -> Result<Option<SkinMetrics>, AnalyzerError> {
        let image = self.load(source)?;
        tokio::task::spawn_blocking(move || measure_image(image.bytes()))
            .await
            .map_err(|e| AnalyzerError::Internal(format!("measurement task failed: {e}")))
    }

    async fn screen_loaded(image: LoadedImage) -> Result<ScreeningResult, AnalyzerError> {
        // Decoding and resizing are CPU bound.
        tokio::task::spawn_blocking(move || screen_image(image.bytes()))
            .await
            .map_err(|e| AnalyzerError::Internal(format!("screening task failed: {e}")))
    }

    pub async fn analyze(&self, job: AnalysisJob) -> Result<AnalysisOutcome, AnalyzerError> {
        info!("Starting analysis for request: {}", job.processing_id);

        let image = self.load(&job.image)?;

        let screening = if job.skip_screening {
            ScreeningResult::skipped()
        } else {
            Self::screen_loaded(image.clone()).await?
        };

        if !screening.is_valid {
            info!(
                "Screening rejected image for {}: {}",
                job.processing_id, screening.reason
            );
            return Ok(AnalysisOutcome {
                resolution: Resolution::Rejected,
                screening,
                report: None,
            });
        }

        let report = self.assess_image(&image, job.symptoms.as_ref()).await;

        Ok(AnalysisOutcome {
            resolution: Resolution::Analyzed,
            screening,
            report: Some(report),
        })
    }

    /// Never fails: any model error yields the local fallback report.
    pub async fn assess_image(
        &self,
        image: &LoadedImage,
        symptoms: Option<&SymptomReport>,
    ) -> AnalysisReport {
        let request = CompletionRequest::new(vec![ChatMessage::user_with_image(
            image_prompt(symptoms),
            image.to_data_url(),
        )])
        .max_tokens(1500)
        .temperature(0.3);

        match self.client.complete(&request).await {
            Ok(answer) => parse_model_response(&answer, symptoms),
            Err(e) => {
                warn!("Image analysis failed, using fallback: {}", e);
                fallback_report(symptoms)
            }
        }
    }

    pub async fn assess_symptoms(&self, symptoms: &SymptomReport) -> SymptomAssessment {
        let request = CompletionRequest::new(vec![ChatMessage::user(symptom_prompt(symptoms))])
            .max_tokens(1000);

        match self.client.complete(&request).await {
            Ok(answer) => parse_symptom_assessment(&answer).unwrap_or_else(|| {
                debug!("Symptom answer had no usable structure, using fallback");
                fallback_symptom_assessment(symptoms)
            }),
            Err(e) => {
                warn!("Symptom analysis failed, using fallback: {}", e);
                fallback_symptom_assessment(symptoms)
            }
        }
    }
}
