use crate::analysis::symptoms::{detect_symptoms, likely_condition};
use crate::groq::{ChatMessage, CompletionRequest, GroqClient, GroqError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

const DOC_BOT_PROMPT: &str = "You are an interactive medical AI assistant named Doc Bot. Your role is to gather information through questions before providing advice. Always ask follow-up questions to better understand the user's situation. For example: ask about symptoms duration, severity, location, what makes it better/worse, medical history, current medications, age range, etc. Only provide comprehensive answers after gathering sufficient information. Keep responses conversational and ask one focused question at a time. Always remind users to consult healthcare professionals for serious concerns.";

const HAIR_ASSISTANT_PROMPT: &str = "You are Dr. AI, a specialized hair health assistant. Provide accurate, helpful medical information while always recommending professional consultation for serious concerns.";

const DIAGNOSIS_PROMPT: &str = "You are a medical AI providing preliminary diagnosis for hair/scalp symptoms. Always emphasize this is not a substitute for professional medical advice.";

const TREATMENT_PROMPT: &str = "You are a medical AI providing treatment recommendations for hair/scalp conditions. Focus on evidence-based treatments and emphasize professional consultation.";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Chat session not found: {0}")]
    SessionNotFound(Uuid),
    #[error("Message must not be empty")]
    EmptyMessage,
    #[error("Model call failed: {0}")]
    Upstream(#[from] GroqError),
}

#[derive(Debug, Clone)]
pub struct ChatSession {
    pub id: Uuid,
    history: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    last_active: tokio::time::Instant,
}

impl ChatSession {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            history: Vec::new(),
            created_at: Utc::now(),
            last_active: tokio::time::Instant::now(),
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Appends a turn and drops the oldest turns beyond `limit`.
    fn push(&mut self, message: ChatMessage, limit: usize) {
        self.history.push(message);
        if self.history.len() > limit {
            let excess = self.history.len() - limit;
            self.history.drain(..excess);
        }
        self.last_active = tokio::time::Instant::now();
    }

    fn request(&self) -> CompletionRequest {
        let mut messages = Vec::with_capacity(self.history.len() + 1);
        messages.push(ChatMessage::system(DOC_BOT_PROMPT));
        messages.extend(self.history.iter().cloned());
        CompletionRequest::new(messages)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub session_id: Uuid,
    pub message: String,
    pub turns: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssistantReply {
    pub message: String,
    pub symptoms_detected: bool,
    pub detected_symptoms: Vec<String>,
    pub fallback: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FollowUpReply {
    pub symptoms: Vec<String>,
    pub message: String,
    pub fallback: bool,
}

/// Doc Bot conversations plus the one-shot hair assistant.
#[derive(Clone)]
pub struct ChatService {
    client: GroqClient,
    sessions: Arc<RwLock<HashMap<Uuid, ChatSession>>>,
    history_limit: usize,
}

impl ChatService {
    pub fn new(client: GroqClient, history_limit: usize) -> Self {
        Self {
            client,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            history_limit: history_limit.max(2),
        }
    }

    pub async fn start_session(&self) -> Uuid {
        let session = ChatSession::new();
        let id = session.id;
        self.sessions.write().await.insert(id, session);
        info!("Started chat session {}", id);
        id
    }

    pub async fn session(&self, id: Uuid) -> Option<ChatSession> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Sends one user turn. On failure the user turn stays in the history and
    /// the error is returned to the caller.
    pub async fn send(&self, id: Uuid, message: &str) -> Result<ChatReply, ChatError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        // The lock is not held across the network call.
        let request = {
            let mut sessions = self.sessions.write().await;
            let session = sessions
                .get_mut(&id)
                .ok_or(ChatError::SessionNotFound(id))?;
            session.push(ChatMessage::user(message), self.history_limit);
            session.request()
        };

        let answer = self.client.complete(&request).await?;

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or(ChatError::SessionNotFound(id))?;
        session.push(ChatMessage::assistant(answer.clone()), self.history_limit);

        Ok(ChatReply {
            session_id: id,
            message: answer,
            turns: session.history.len(),
        })
    }

    pub async fn reset(&self, id: Uuid) -> Result<(), ChatError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or(ChatError::SessionNotFound(id))?;
        session.history.clear();
        session.last_active = tokio::time::Instant::now();
        debug!("Reset chat session {}", id);
        Ok(())
    }

    pub async fn end(&self, id: Uuid) -> Result<(), ChatError> {
        self.sessions
            .write()
            .await
            .remove(&id)
            .map(|_| info!("Ended chat session {}", id))
            .ok_or(ChatError::SessionNotFound(id))
    }

    /// Removes sessions idle for longer than `ttl`, returning how many went.
    pub async fn prune_idle(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.last_active.elapsed() <= ttl);
        let removed = before - sessions.len();
        if removed > 0 {
            info!("Pruned {} idle chat sessions", removed);
        }
        removed
    }

    pub async fn ask_assistant(&self, message: &str) -> Result<AssistantReply, ChatError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let detected: Vec<String> = detect_symptoms(message)
            .into_iter()
            .map(String::from)
            .collect();

        let mut system = HAIR_ASSISTANT_PROMPT.to_string();
        if !detected.is_empty() {
            system.push_str(&format!(
                " The user mentioned these symptoms: {}. Provide a preliminary assessment, ask relevant follow-up questions, and suggest next steps including when to see a specialist.",
                detected.join(", ")
            ));
        }

        let request =
            CompletionRequest::new(vec![ChatMessage::system(system), ChatMessage::user(message)])
                .max_tokens(400)
                .temperature(0.7);

        let (reply, fallback) = match self.client.complete(&request).await {
            Ok(answer) => (answer, false),
            Err(e) => {
                warn!("Assistant call failed, using fallback response: {}", e);
                (assistant_fallback(message, &detected), true)
            }
        };

        Ok(AssistantReply {
            message: reply,
            symptoms_detected: !detected.is_empty(),
            detected_symptoms: detected,
            fallback,
        })
    }

    pub async fn preliminary_diagnosis(&self, symptoms: &[String]) -> FollowUpReply {
        let symptoms = clean_symptoms(symptoms);
        let request = CompletionRequest::new(vec![
            ChatMessage::system(DIAGNOSIS_PROMPT),
            ChatMessage::user(format!(
                "Provide a preliminary diagnosis for these hair/scalp symptoms: {}. Include possible conditions, severity assessment, and when to seek professional help.",
                symptoms.join(", ")
            )),
        ])
        .max_tokens(500)
        .temperature(0.3);

        self.follow_up(request, symptoms, fallback_diagnosis).await
    }

    pub async fn treatment_options(&self, symptoms: &[String]) -> FollowUpReply {
        let symptoms = clean_symptoms(symptoms);
        let request = CompletionRequest::new(vec![
            ChatMessage::system(TREATMENT_PROMPT),
            ChatMessage::user(format!(
                "Recommend treatment options for these hair/scalp symptoms: {}. Include both over-the-counter and professional treatments, with timeline expectations.",
                symptoms.join(", ")
            )),
        ])
        .max_tokens(500)
        .temperature(0.3);

        self.follow_up(request, symptoms, fallback_treatment).await
    }

    async fn follow_up(
        &self,
        request: CompletionRequest,
        symptoms: Vec<String>,
        fallback: fn(&[String]) -> String,
    ) -> FollowUpReply {
        match self.client.complete(&request).await {
            Ok(message) => FollowUpReply {
                symptoms,
                message,
                fallback: false,
            },
            Err(e) => {
                warn!("Follow-up call failed, using fallback: {}", e);
                FollowUpReply {
                    message: fallback(&symptoms),
                    symptoms,
                    fallback: true,
                }
            }
        }
    }
}

fn clean_symptoms(symptoms: &[String]) -> Vec<String> {
    symptoms
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

pub fn assistant_fallback(message: &str, detected: &[String]) -> String {
    if !detected.is_empty() {
        return format!(
            "I understand you're experiencing {}. These symptoms can have various causes including genetics, stress, hormonal changes, or underlying conditions.\n\n\
            Based on what you've described, I'd recommend:\n\
            1. Documenting when these symptoms started\n\
            2. Noting any triggers or patterns\n\
            3. Considering a consultation with a dermatologist\n\n\
            Would you like me to help you find specialists in your area, or do you have other questions about these symptoms?",
            detected.join(", ")
        );
    }

    let lower = message.to_lowercase();
    let reply = if lower.contains("hair loss") || lower.contains("balding") {
        "Hair loss can have various causes including genetics, stress, hormonal changes, and medical conditions. I recommend consulting with a dermatologist for proper evaluation and treatment options."
    } else if lower.contains("dandruff") || lower.contains("itchy scalp") {
        "Dandruff and itchy scalp are often caused by dry skin, seborrheic dermatitis, or fungal infections. Try gentle shampoos and if symptoms persist, consult a healthcare provider."
    } else if lower.contains("treatment") || lower.contains("cure") {
        "Treatment options vary depending on the specific condition. Common treatments include topical medications, lifestyle changes, and in some cases, medical procedures. Always consult with a qualified healthcare provider for personalized treatment plans."
    } else {
        "I'm here to help with hair and scalp health questions. For specific medical concerns, I always recommend consulting with a qualified healthcare professional who can provide personalized advice based on your individual situation."
    };
    reply.to_string()
}

pub fn fallback_diagnosis(symptoms: &[String]) -> String {
    let conditions: Vec<&str> = symptoms.iter().map(|s| likely_condition(s)).collect();
    let severity = if symptoms.len() > 2 {
        "Moderate - Multiple symptoms present"
    } else {
        "Mild to Moderate"
    };

    format!(
        "**Preliminary Assessment:**\n\n\
        Based on your symptoms ({}), possible conditions include:\n\
        • {}\n\n\
        **Severity:** {}\n\n\
        **Recommendation:** I strongly recommend consulting with a dermatologist or trichologist for proper diagnosis and treatment plan. Early intervention often leads to better outcomes.\n\n\
        **When to seek immediate care:** If symptoms worsen rapidly, involve pain, or affect large areas of the scalp.\n\n\
        *This is a preliminary assessment only and should not replace professional medical advice.*",
        symptoms.join(", "),
        conditions.join("\n• "),
        severity
    )
}

pub fn fallback_treatment(symptoms: &[String]) -> String {
    format!(
        "**Treatment Recommendations for {}:**\n\n\
        **Immediate Steps:**\n\
        • Gentle hair care routine (mild shampoos, avoid harsh chemicals)\n\
        • Stress management and adequate sleep\n\
        • Balanced diet with adequate protein and vitamins\n\n\
        **Over-the-Counter Options:**\n\
        • Minoxidil 2-5% (for hair loss/thinning)\n\
        • Anti-dandruff shampoos with ketoconazole or selenium sulfide\n\
        • Gentle moisturizing treatments for dry scalp\n\n\
        **Professional Treatments:**\n\
        • Prescription medications (finasteride, corticosteroids)\n\
        • Professional scalp treatments\n\
        • Hair restoration procedures (for advanced cases)\n\n\
        **Timeline:** Most treatments require 3-6 months to show significant results.\n\n\
        **Important:** Always consult with a healthcare provider before starting any treatment regimen. They can provide personalized recommendations based on your specific condition.\n\n\
        Would you like me to help you find specialists in your area?",
        symptoms.join(", ")
    )
}
