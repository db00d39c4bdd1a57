pub mod processor;
pub mod report;
pub mod screening;
pub mod symptoms;

pub use processor::{AnalyzerError, ScalpAnalyzer};
pub use report::{fallback_report, parse_model_response, AnalysisReport, SymptomAssessment};
pub use screening::{screen_image, ScreeningResult};
pub use symptoms::{detect_symptoms, Severity, SymptomDuration, SymptomReport};
