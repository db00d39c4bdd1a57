use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Mild,
    #[default]
    Moderate,
    Severe,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Mild => "Mild",
            Severity::Moderate => "Moderate",
            Severity::Severe => "Severe",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SymptomDuration {
    #[serde(rename = "<1month")]
    LessThanMonth,
    #[default]
    #[serde(rename = "1-6months")]
    OneToSixMonths,
    #[serde(rename = ">6months")]
    MoreThanSixMonths,
}

impl SymptomDuration {
    pub fn as_str(self) -> &'static str {
        match self {
            SymptomDuration::LessThanMonth => "<1month",
            SymptomDuration::OneToSixMonths => "1-6months",
            SymptomDuration::MoreThanSixMonths => ">6months",
        }
    }

    pub fn is_chronic(self) -> bool {
        self == SymptomDuration::MoreThanSixMonths
    }
}

impl fmt::Display for SymptomDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the patient filled in on the symptom questionnaire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomReport {
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub duration: SymptomDuration,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub age: Option<String>,
}

impl SymptomReport {
    pub fn has(&self, symptom: &str) -> bool {
        self.symptoms.iter().any(|s| s.eq_ignore_ascii_case(symptom))
    }

    pub fn age_label(&self) -> &str {
        self.age.as_deref().unwrap_or("unspecified")
    }

    pub fn joined(&self) -> String {
        if self.symptoms.is_empty() {
            "none reported".to_string()
        } else {
            self.symptoms.join(", ")
        }
    }
}

const SYMPTOM_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "hair loss",
        &["hair loss", "losing hair", "hair falling", "balding", "bald spots"],
    ),
    (
        "thinning",
        &["thinning", "thin hair", "sparse hair", "less dense"],
    ),
    ("itching", &["itching", "itchy", "scratching", "itch"]),
    (
        "dandruff",
        &["dandruff", "flakes", "flaky scalp", "white flakes"],
    ),
    ("pain", &["pain", "painful", "sore", "tender", "hurts"]),
    ("burning", &["burning", "burns", "burning sensation"]),
    ("oily", &["oily", "greasy", "too much oil", "sebum"]),
    ("dry", &["dry", "dryness", "dehydrated"]),
    ("redness", &["red", "redness", "inflamed", "inflammation"]),
    ("patches", &["patches", "bald patches", "spots", "areas"]),
];

/// Symptoms mentioned in free text, in table order. Matching is substring based,
/// so "bald spots" also reports "patches".
pub fn detect_symptoms(message: &str) -> Vec<&'static str> {
    let lower = message.to_lowercase();

    SYMPTOM_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(symptom, _)| *symptom)
        .collect()
}

pub fn likely_condition(symptom: &str) -> &'static str {
    match symptom.trim().to_lowercase().as_str() {
        "hair loss" => "Androgenetic Alopecia (Male/Female Pattern Baldness)",
        "thinning" => "Telogen Effluvium or Androgenetic Alopecia",
        "itching" => "Seborrheic Dermatitis or Contact Dermatitis",
        "dandruff" => "Seborrheic Dermatitis",
        "patches" => "Alopecia Areata",
        _ => "Hair/Scalp Condition",
    }
}
