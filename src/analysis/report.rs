use crate::analysis::symptoms::{Severity, SymptomReport};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportSource {
    /// Structured JSON returned by the vision model.
    Model,
    /// Free text returned by the vision model.
    Narrative,
    /// Generated locally because the model was unreachable.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Treatment {
    #[serde(alias = "title", alias = "treatment")]
    pub name: String,
    #[serde(default, alias = "details")]
    pub description: String,
    #[serde(default = "default_priority")]
    pub priority: u8,
}

fn default_priority() -> u8 {
    1
}

impl Treatment {
    fn new(name: impl Into<String>, description: impl Into<String>, priority: u8) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            priority,
        }
    }
}

/// Percent scores shown on the results dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HairMetrics {
    pub hair_density: u8,
    pub scalp_health: u8,
    pub progression_risk: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymptomCorrelation {
    pub matching_symptoms: usize,
    pub duration: String,
    pub age_group: String,
    pub risk_factors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub primary_diagnosis: String,
    pub confidence: f64,
    pub severity: String,
    pub stage: String,
    pub description: String,
    pub treatment_success: u8,
    pub treatments: Vec<Treatment>,
    pub metrics: HairMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symptom_correlation: Option<SymptomCorrelation>,
    pub source: ReportSource,
    pub generated_at: DateTime<Utc>,
}

/// Shape the vision prompt asks for. Every field is optional because models
/// drop or rename keys freely.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ModelAssessment {
    #[serde(alias = "primaryDiagnosis", alias = "diagnosis")]
    primary_diagnosis: Option<String>,
    confidence: Option<f64>,
    severity: Option<String>,
    stage: Option<String>,
    #[serde(alias = "summary")]
    description: Option<String>,
    #[serde(alias = "treatmentSuccess")]
    treatment_success: Option<f64>,
    #[serde(alias = "recommendations")]
    treatments: Option<Vec<TreatmentEntry>>,
    #[serde(alias = "contributingFactors", alias = "risk_factors", alias = "riskFactors")]
    contributing_factors: Option<Vec<String>>,
    metrics: Option<ModelMetrics>,
}

/// Models list treatments either as objects or as bare names.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TreatmentEntry {
    Full(Treatment),
    Name(String),
    Other(serde_json::Value),
}

impl TreatmentEntry {
    fn into_treatment(self, position: usize) -> Option<Treatment> {
        match self {
            TreatmentEntry::Full(treatment) => Some(treatment),
            TreatmentEntry::Name(name) if !name.trim().is_empty() => Some(Treatment::new(
                name.trim(),
                "",
                u8::try_from(position + 1).unwrap_or(u8::MAX),
            )),
            TreatmentEntry::Name(_) => None,
            TreatmentEntry::Other(value) => {
                debug!("Skipping unrecognized treatment entry: {}", value);
                None
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ModelMetrics {
    #[serde(alias = "hairDensity")]
    hair_density: Option<f64>,
    #[serde(alias = "scalpHealth")]
    scalp_health: Option<f64>,
    #[serde(alias = "progressionRisk")]
    progression_risk: Option<f64>,
}

/// Span from the first `{` to the last `}`, which skips code fences and any
/// prose the model wraps around its JSON.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Accepts both 0..1 fractions and 0..100 percentages.
fn normalize_confidence(value: f64) -> f64 {
    let fraction = if value > 1.0 { value / 100.0 } else { value };
    fraction.clamp(0.0, 1.0)
}

fn percent(value: f64) -> u8 {
    let scaled = if value <= 1.0 { value * 100.0 } else { value };
    scaled.round().clamp(0.0, 100.0) as u8
}

fn infer_severity(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    if lower.contains("severe") {
        Some("Severe")
    } else if lower.contains("moderate") {
        Some("Moderate")
    } else if lower.contains("mild") {
        Some("Mild")
    } else {
        None
    }
}

fn treatment_success_for(severity: Severity) -> u8 {
    match severity {
        Severity::Mild => 90,
        Severity::Moderate => 80,
        Severity::Severe => 70,
    }
}

fn density_for(severity: Severity) -> u8 {
    match severity {
        Severity::Mild => 75,
        Severity::Moderate => 60,
        Severity::Severe => 45,
    }
}

fn correlate(symptoms: &SymptomReport, extra_risks: Vec<String>) -> SymptomCorrelation {
    let mut risk_factors = extra_risks;
    if symptoms.has("shedding") {
        risk_factors.push("Telogen Effluvium risk".to_string());
    }

    SymptomCorrelation {
        matching_symptoms: symptoms.symptoms.len(),
        duration: symptoms.duration.to_string(),
        age_group: symptoms.age_label().to_string(),
        risk_factors,
    }
}

fn symptom_treatments(symptoms: &SymptomReport) -> Vec<Treatment> {
    let severity = symptoms.severity.label().to_lowercase();
    let second = if symptoms.has("itching") {
        Treatment::new(
            "Anti-inflammatory Treatment",
            "Address scalp inflammation first before hair growth treatments.",
            2,
        )
    } else {
        Treatment::new(
            "Finasteride (Consult physician)",
            "Daily oral medication for progressive cases. Medical consultation required.",
            2,
        )
    };

    vec![
        Treatment::new(
            "Minoxidil 5% Solution",
            format!(
                "Recommended based on {severity} severity and symptom profile. Apply twice daily."
            ),
            1,
        ),
        second,
        Treatment::new(
            "Lifestyle & Symptom Management",
            format!(
                "Address specific symptoms: {}. Stress management and gentle hair care.",
                symptoms.joined()
            ),
            3,
        ),
    ]
}

fn general_treatments() -> Vec<Treatment> {
    vec![
        Treatment::new(
            "Gentle Hair Care",
            "Use mild shampoos and avoid harsh treatments.",
            1,
        ),
        Treatment::new(
            "Professional Consultation",
            "Recommend consulting a dermatologist for detailed assessment.",
            2,
        ),
    ]
}

/// Turns the vision model's answer into a report, filling gaps from the
/// questionnaire when one was submitted.
pub fn parse_model_response(text: &str, symptoms: Option<&SymptomReport>) -> AnalysisReport {
    let parsed = extract_json_object(text)
        .and_then(|json| match serde_json::from_str::<ModelAssessment>(json) {
            Ok(assessment) => Some(assessment),
            Err(e) => {
                debug!("Model answer is not valid assessment JSON: {}", e);
                None
            }
        })
        .filter(|a| a.primary_diagnosis.is_some() || a.description.is_some());

    match parsed {
        Some(assessment) => from_assessment(assessment, symptoms),
        None => narrative_report(text, symptoms),
    }
}

fn from_assessment(assessment: ModelAssessment, symptoms: Option<&SymptomReport>) -> AnalysisReport {
    let reported = symptoms.map(|s| s.severity).unwrap_or_default();
    let chronic = symptoms.is_some_and(|s| s.duration.is_chronic());
    let metrics = assessment.metrics.unwrap_or_default();

    let severity = assessment
        .severity
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| reported.label().to_string());

    let mut treatments: Vec<Treatment> = assessment
        .treatments
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .filter_map(|(i, entry)| entry.into_treatment(i))
        .collect();
    treatments.sort_by_key(|t| t.priority);

    if treatments.is_empty() {
        treatments = match symptoms {
            Some(s) => symptom_treatments(s),
            None => general_treatments(),
        };
    }

    let contributing = assessment.contributing_factors.unwrap_or_default();

    AnalysisReport {
        primary_diagnosis: assessment
            .primary_diagnosis
            .unwrap_or_else(|| "Unspecified Hair/Scalp Condition".to_string()),
        confidence: assessment.confidence.map(normalize_confidence).unwrap_or(0.75),
        severity,
        stage: assessment.stage.unwrap_or_else(|| {
            if chronic {
                "Progressive Stage".to_string()
            } else {
                "Early Stage".to_string()
            }
        }),
        description: assessment.description.unwrap_or_default(),
        treatment_success: assessment
            .treatment_success
            .map(percent)
            .unwrap_or_else(|| treatment_success_for(reported)),
        treatments,
        metrics: HairMetrics {
            hair_density: metrics
                .hair_density
                .map(percent)
                .unwrap_or_else(|| density_for(reported)),
            scalp_health: metrics.scalp_health.map(percent).unwrap_or(
                if symptoms.is_some_and(|s| s.has("itching")) {
                    60
                } else {
                    80
                },
            ),
            progression_risk: metrics
                .progression_risk
                .map(percent)
                .unwrap_or(if chronic { 65 } else { 40 }),
        },
        symptom_correlation: symptoms.map(|s| correlate(s, contributing)),
        source: ReportSource::Model,
        generated_at: Utc::now(),
    }
}

fn narrative_report(text: &str, symptoms: Option<&SymptomReport>) -> AnalysisReport {
    let severity = infer_severity(text)
        .map(str::to_string)
        .or_else(|| symptoms.map(|s| s.severity.label().to_string()))
        .unwrap_or_else(|| "Undetermined".to_string());

    AnalysisReport {
        primary_diagnosis: "Unstructured Assessment".to_string(),
        confidence: 0.5,
        severity,
        stage: "Undetermined".to_string(),
        description: text.trim().to_string(),
        treatment_success: 70,
        treatments: match symptoms {
            Some(s) => symptom_treatments(s),
            None => general_treatments(),
        },
        metrics: HairMetrics {
            hair_density: 70,
            scalp_health: 75,
            progression_risk: 35,
        },
        symptom_correlation: symptoms.map(|s| correlate(s, Vec::new())),
        source: ReportSource::Narrative,
        generated_at: Utc::now(),
    }
}

/// Local report used whenever the vision model cannot be reached.
pub fn fallback_report(symptoms: Option<&SymptomReport>) -> AnalysisReport {
    match symptoms {
        Some(s) => {
            let first_two = s.symptoms.iter().take(2).cloned().collect::<Vec<_>>();
            let first_two = if first_two.is_empty() {
                "none reported".to_string()
            } else {
                first_two.join(", ")
            };

            AnalysisReport {
                primary_diagnosis: "Hair Loss Pattern (Symptom-based Analysis)".to_string(),
                confidence: 0.70,
                severity: s.severity.label().to_string(),
                stage: if s.duration.is_chronic() {
                    "Chronic Stage".to_string()
                } else {
                    "Recent Onset".to_string()
                },
                description: format!(
                    "Local analysis based on reported symptoms: {}. Professional evaluation recommended for accurate diagnosis.",
                    s.joined()
                ),
                treatment_success: 65,
                treatments: vec![
                    Treatment::new(
                        "Symptom Management",
                        format!("Address primary symptoms: {first_two}."),
                        1,
                    ),
                    Treatment::new(
                        "Professional Consultation",
                        "Comprehensive evaluation by dermatologist recommended.",
                        2,
                    ),
                ],
                metrics: HairMetrics {
                    hair_density: 65,
                    scalp_health: 70,
                    progression_risk: 45,
                },
                symptom_correlation: Some(SymptomCorrelation {
                    matching_symptoms: s.symptoms.len(),
                    duration: s.duration.to_string(),
                    age_group: s.age_label().to_string(),
                    risk_factors: Vec::new(),
                }),
                source: ReportSource::Fallback,
                generated_at: Utc::now(),
            }
        }
        None => AnalysisReport {
            primary_diagnosis: "Hair Thinning (Local Analysis)".to_string(),
            confidence: 0.75,
            severity: "Mild to Moderate".to_string(),
            stage: "Early Stage".to_string(),
            description: "Analysis performed using local algorithms. For comprehensive diagnosis, please consult a healthcare professional.".to_string(),
            treatment_success: 70,
            treatments: general_treatments(),
            metrics: HairMetrics {
                hair_density: 70,
                scalp_health: 75,
                progression_risk: 35,
            },
            symptom_correlation: None,
            source: ReportSource::Fallback,
            generated_at: Utc::now(),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomAssessment {
    #[serde(default, alias = "likelyConditions", alias = "differential_diagnosis")]
    pub likely_conditions: Vec<String>,
    #[serde(default, alias = "riskFactors")]
    pub risk_factors: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(skip_deserializing)]
    pub fallback: bool,
}

pub fn parse_symptom_assessment(text: &str) -> Option<SymptomAssessment> {
    let json = extract_json_object(text)?;
    serde_json::from_str::<SymptomAssessment>(json)
        .ok()
        .filter(|a| !a.likely_conditions.is_empty())
}

pub fn fallback_symptom_assessment(symptoms: &SymptomReport) -> SymptomAssessment {
    let risk = if symptoms.symptoms.len() > 1 {
        "Multiple symptoms present".to_string()
    } else {
        format!("{} severity reported", symptoms.severity)
    };

    SymptomAssessment {
        likely_conditions: vec!["Hair Loss (Symptom-based)".to_string()],
        risk_factors: vec![risk],
        recommendations: vec!["Professional consultation recommended".to_string()],
        fallback: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::symptoms::SymptomDuration;

    fn questionnaire() -> SymptomReport {
        SymptomReport {
            symptoms: vec!["shedding".into(), "itching".into(), "thinning".into()],
            duration: SymptomDuration::MoreThanSixMonths,
            severity: Severity::Severe,
            age: Some("26-35".into()),
        }
    }

    #[test]
    fn test_parse_fenced_json() {
        let answer = r#"Here is the assessment:
```json
{
  "primaryDiagnosis": "Seborrheic Dermatitis",
  "confidence": 82,
  "severity": "Moderate",
  "stage": "Active",
  "description": "Greasy yellow scaling along the part line.",
  "treatments": [
    {"name": "Ketoconazole shampoo", "description": "Twice weekly", "priority": 2},
    {"name": "Zinc pyrithione", "priority": 1}
  ],
  "metrics": {"hairDensity": 0.8, "scalpHealth": 55, "progressionRisk": 20}
}
```
Please see a dermatologist."#;

        let report = parse_model_response(answer, None);

        assert_eq!(report.source, ReportSource::Model);
        assert_eq!(report.primary_diagnosis, "Seborrheic Dermatitis");
        assert!((report.confidence - 0.82).abs() < 1e-9);
        assert_eq!(report.severity, "Moderate");
        assert_eq!(report.treatments[0].name, "Zinc pyrithione");
        assert_eq!(report.metrics.hair_density, 80);
        assert_eq!(report.metrics.scalp_health, 55);
        assert_eq!(report.metrics.progression_risk, 20);
        assert!(report.symptom_correlation.is_none());
    }

    #[test]
    fn test_missing_fields_come_from_symptoms() {
        let answer = r#"{"diagnosis": "Androgenetic Alopecia", "riskFactors": ["family history"]}"#;
        let symptoms = questionnaire();

        let report = parse_model_response(answer, Some(&symptoms));

        assert_eq!(report.source, ReportSource::Model);
        assert_eq!(report.severity, "Severe");
        assert_eq!(report.stage, "Progressive Stage");
        assert_eq!(report.treatment_success, 70);
        assert_eq!(report.metrics.hair_density, 45);
        assert_eq!(report.metrics.scalp_health, 60);
        assert_eq!(report.metrics.progression_risk, 65);
        assert_eq!(report.treatments[1].name, "Anti-inflammatory Treatment");

        let correlation = report.symptom_correlation.unwrap();
        assert_eq!(correlation.matching_symptoms, 3);
        assert_eq!(correlation.duration, ">6months");
        assert_eq!(
            correlation.risk_factors,
            vec!["family history".to_string(), "Telogen Effluvium risk".to_string()]
        );
    }

    #[test]
    fn test_free_text_becomes_narrative() {
        let answer = "The scalp shows moderate diffuse thinning at the crown.";
        let report = parse_model_response(answer, None);

        assert_eq!(report.source, ReportSource::Narrative);
        assert_eq!(report.severity, "Moderate");
        assert_eq!(report.description, answer);
    }

    #[test]
    fn test_treatments_as_plain_names() {
        let answer = r#"{"primary_diagnosis":"Androgenetic Alopecia","treatments":["Minoxidil 5%", "Finasteride", 3]}"#;
        let report = parse_model_response(answer, None);

        assert_eq!(report.source, ReportSource::Model);
        assert_eq!(report.primary_diagnosis, "Androgenetic Alopecia");
        let names: Vec<_> = report.treatments.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["Minoxidil 5%", "Finasteride"]);
        assert_eq!(report.treatments[1].priority, 2);
    }

    #[test]
    fn test_mixed_treatment_entries() {
        let answer = r#"{
            "diagnosis": "Seborrheic Dermatitis",
            "recommendations": [
                {"title": "Ketoconazole shampoo", "details": "Twice weekly", "priority": 3},
                "Gentle cleansing"
            ]
        }"#;
        let report = parse_model_response(answer, None);

        assert_eq!(report.source, ReportSource::Model);
        assert_eq!(report.treatments[0].name, "Gentle cleansing");
        assert_eq!(report.treatments[1].name, "Ketoconazole shampoo");
        assert_eq!(report.treatments[1].description, "Twice weekly");
    }

    #[test]
    fn test_json_without_diagnosis_is_narrative() {
        let report = parse_model_response(r#"{"note": "unable to assess"}"#, None);
        assert_eq!(report.source, ReportSource::Narrative);
        assert_eq!(report.severity, "Undetermined");
    }

    #[test]
    fn test_fallback_reports() {
        let general = fallback_report(None);
        assert_eq!(general.source, ReportSource::Fallback);
        assert_eq!(general.primary_diagnosis, "Hair Thinning (Local Analysis)");
        assert_eq!(general.treatments.len(), 2);

        let symptoms = questionnaire();
        let targeted = fallback_report(Some(&symptoms));
        assert_eq!(targeted.severity, "Severe");
        assert_eq!(targeted.stage, "Chronic Stage");
        assert_eq!(
            targeted.treatments[0].description,
            "Address primary symptoms: shedding, itching."
        );
    }

    #[test]
    fn test_confidence_normalization() {
        assert!((normalize_confidence(0.87) - 0.87).abs() < 1e-9);
        assert!((normalize_confidence(87.0) - 0.87).abs() < 1e-9);
        assert_eq!(normalize_confidence(150.0), 1.0);
        assert_eq!(normalize_confidence(-3.0), 0.0);
    }

    #[test]
    fn test_symptom_assessment_parsing() {
        let answer = r#"{"likelyConditions": ["Telogen Effluvium"], "riskFactors": ["Stress"], "recommendations": ["Consult dermatologist"]}"#;
        let assessment = parse_symptom_assessment(answer).unwrap();
        assert_eq!(assessment.likely_conditions, vec!["Telogen Effluvium"]);
        assert!(!assessment.fallback);

        assert!(parse_symptom_assessment("no structure here").is_none());

        let fallback = fallback_symptom_assessment(&questionnaire());
        assert!(fallback.fallback);
        assert_eq!(fallback.risk_factors, vec!["Multiple symptoms present"]);
    }

    #[test]
    fn test_report_serialization() {
        let json = serde_json::to_value(fallback_report(None)).unwrap();
        assert_eq!(json["source"], "fallback");
        assert_eq!(json["metrics"]["hair_density"], 70);
        assert!(json.get("symptom_correlation").is_none());
    }
}
