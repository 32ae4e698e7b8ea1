//! Answer generation with language-constrained retries and deterministic
//! fallbacks.
//!
//! The [`GenerationController`] drives a bounded loop around a [`ChatModel`]:
//! each response is validated against the requested answer language, a failed
//! validation triggers one retry at a higher temperature, and a transport
//! failure short-circuits into a deterministic fallback built from the
//! retrieved context. Callers always get an answer back; the
//! [`GenerationOutcome`] tells them how much to trust it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::language::{self, Detection, Language};

/// Errors from talking to a chat completion backend.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The question was empty or whitespace-only
    #[error("Question must not be empty")]
    EmptyPrompt,

    /// The backend could not be reached or returned a transport-level failure
    #[error("Chat model unavailable: {message}")]
    Unavailable { message: String },

    /// The backend answered but the payload was not in the expected shape
    #[error("Unexpected response from chat model: {message}")]
    UnexpectedResponse { message: String },
}

impl GenerationError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        GenerationError::Unavailable {
            message: message.into(),
        }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        GenerationError::UnexpectedResponse {
            message: message.into(),
        }
    }
}

/// A chat completion backend.
///
/// The controller only needs single-turn completions: a system prompt
/// carrying the context and language instruction, and a user prompt carrying
/// the question.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, GenerationError>;

    /// Human-readable backend name for logging.
    fn model_name(&self) -> &str;
}

/// OpenAI-style chat completions over HTTP.
pub struct HttpChatModel {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatRequestMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl HttpChatModel {
    /// Create a client for an OpenAI-compatible endpoint.
    ///
    /// `base_url` is the API root, e.g. `https://api.deepseek.com/v1`; the
    /// `/chat/completions` path is appended per request.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| GenerationError::unavailable(format!("failed to build client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl ChatModel for HttpChatModel {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatRequestMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatRequestMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature,
            max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::unavailable(format!(
                "HTTP {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::unexpected(e.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GenerationError::unexpected("response contained no choices"))?;

        Ok(choice.message.content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// One recorded attempt in the generation loop.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationAttempt {
    pub attempt: usize,
    pub temperature: f32,
    pub detected_language: Language,
    pub confidence: f32,
    pub valid: bool,
}

/// How the final answer was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationOutcome {
    /// A model response passed language validation
    Accepted,
    /// Attempts were exhausted; the closest response is returned as-is
    AcceptedBestEffort,
    /// The backend failed; a deterministic context-based answer is returned
    Fallback,
}

/// The controller's answer plus how it was reached.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    pub answer: String,
    pub outcome: GenerationOutcome,
    pub language: Language,
    pub attempts: Vec<GenerationAttempt>,
}

/// Bounded retry loop around a [`ChatModel`] with language validation.
pub struct GenerationController {
    max_attempts: usize,
    validation_threshold: f32,
    base_temperature: f32,
    max_tokens: u32,
}

const RETRY_TEMPERATURE_STEP: f32 = 0.3;
const MAX_TEMPERATURE: f32 = 1.5;
const FALLBACK_SNIPPET_CHARS: usize = 500;

impl Default for GenerationController {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            validation_threshold: 0.7,
            base_temperature: 0.7,
            max_tokens: 1024,
        }
    }
}

impl GenerationController {
    pub fn new(max_attempts: usize, base_temperature: f32, max_tokens: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_temperature,
            max_tokens,
            ..Self::default()
        }
    }

    pub fn with_validation_threshold(mut self, threshold: f32) -> Self {
        self.validation_threshold = threshold;
        self
    }

    /// Answer `question` from `context`, insisting on `language`.
    ///
    /// `passages` are the raw retrieved chunks, used only to build the
    /// deterministic fallback when the backend is unreachable. This never
    /// surfaces a transport error to the caller; the only error is an empty
    /// question.
    pub async fn answer(
        &self,
        model: &dyn ChatModel,
        question: &str,
        context: &str,
        passages: &[String],
        language: Language,
    ) -> Result<GenerationResult, GenerationError> {
        if question.trim().is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }

        let system_prompt = format!(
            "You are a helpful assistant that answers questions using only the \
             provided document context. If the context does not contain the \
             answer, say that the document does not cover it.\n\n{}",
            language::strict_instruction(language)
        );
        let user_prompt = format!("Context:\n{context}\n\nQuestion: {question}");

        let mut attempts = Vec::new();
        let mut temperature = self.base_temperature;
        // Closest response seen so far: matching language, highest confidence.
        let mut best: Option<(String, f32)> = None;
        let mut last_response: Option<String> = None;

        for attempt in 1..=self.max_attempts {
            debug!(
                "Generation attempt {}/{} via {} at temperature {:.1}",
                attempt,
                self.max_attempts,
                model.model_name(),
                temperature
            );

            let text = match model
                .generate(&system_prompt, &user_prompt, temperature, self.max_tokens)
                .await
            {
                Ok(text) => text,
                Err(err) => {
                    warn!("Chat model failed on attempt {attempt}: {err}");
                    return Ok(self.fallback(passages, language, attempts));
                }
            };

            let Detection {
                language: detected,
                confidence,
            } = language::detect(&text);
            let valid = detected == language && confidence >= self.validation_threshold;

            attempts.push(GenerationAttempt {
                attempt,
                temperature,
                detected_language: detected,
                confidence,
                valid,
            });

            if valid {
                return Ok(GenerationResult {
                    answer: text,
                    outcome: GenerationOutcome::Accepted,
                    language,
                    attempts,
                });
            }

            warn!(
                "Attempt {} failed language validation: wanted {}, got {} ({:.0}%)",
                attempt,
                language,
                detected,
                confidence * 100.0
            );

            if detected == language && best.as_ref().is_none_or(|(_, c)| confidence > *c) {
                best = Some((text.clone(), confidence));
            }
            last_response = Some(text);
            temperature = (temperature + RETRY_TEMPERATURE_STEP).min(MAX_TEMPERATURE);
        }

        // No attempt passed validation. Return the closest response rather
        // than nothing.
        let answer = match (best, last_response) {
            (Some((text, _)), _) => text,
            (None, Some(text)) => text,
            (None, None) => return Ok(self.fallback(passages, language, attempts)),
        };

        Ok(GenerationResult {
            answer,
            outcome: GenerationOutcome::AcceptedBestEffort,
            language,
            attempts,
        })
    }

    fn fallback(
        &self,
        passages: &[String],
        language: Language,
        attempts: Vec<GenerationAttempt>,
    ) -> GenerationResult {
        let answer = match passages.first() {
            Some(passage) => {
                let snippet: String = passage.chars().take(FALLBACK_SNIPPET_CHARS).collect();
                format!("{}{}", fallback_preamble(language), snippet)
            }
            None => insufficient_context_message(language).to_string(),
        };

        GenerationResult {
            answer,
            outcome: GenerationOutcome::Fallback,
            language,
            attempts,
        }
    }
}

fn fallback_preamble(language: Language) -> &'static str {
    match language {
        Language::Hi => "दस्तावेज़ के अनुसार: ",
        Language::Mr => "दस्तऐवजानुसार: ",
        Language::En | Language::Unknown => "Based on the document: ",
    }
}

pub(crate) fn insufficient_context_message(language: Language) -> &'static str {
    match language {
        Language::Hi => "क्षमा करें, दस्तावेज़ में इस प्रश्न का उत्तर देने के लिए पर्याप्त जानकारी नहीं है।",
        Language::Mr => "क्षमस्व, या प्रश्नाचे उत्तर देण्यासाठी दस्तऐवजात पुरेशी माहिती नाही.",
        Language::En | Language::Unknown => {
            "Sorry, the document does not contain enough information to answer this question."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedChatModel;

    const ENGLISH_ANSWER: &str =
        "Artificial intelligence is the simulation of human intelligence by machines.";
    const HINDI_ANSWER: &str = "कृत्रिम बुद्धिमत्ता मशीनों में मानव बुद्धिमत्ता का अनुकरण है।";

    fn passages() -> Vec<String> {
        vec![
            "AI is the simulation of human intelligence.".to_string(),
            "Machine learning is a subset of AI.".to_string(),
        ]
    }

    #[tokio::test]
    async fn test_accepted_on_first_attempt() {
        let model = ScriptedChatModel::new(vec![Ok(ENGLISH_ANSWER.to_string())]);
        let controller = GenerationController::default();

        let result = controller
            .answer(&model, "What is AI?", "context", &passages(), Language::En)
            .await
            .unwrap();

        assert_eq!(result.outcome, GenerationOutcome::Accepted);
        assert_eq!(result.answer, ENGLISH_ANSWER);
        assert_eq!(result.attempts.len(), 1);
        assert!(result.attempts[0].valid);
    }

    #[tokio::test]
    async fn test_retry_raises_temperature_then_accepts() {
        // First response comes back in the wrong language.
        let model = ScriptedChatModel::new(vec![
            Ok(ENGLISH_ANSWER.to_string()),
            Ok(HINDI_ANSWER.to_string()),
        ]);
        let controller = GenerationController::default();

        let result = controller
            .answer(&model, "AI क्या है?", "context", &passages(), Language::Hi)
            .await
            .unwrap();

        assert_eq!(result.outcome, GenerationOutcome::Accepted);
        assert_eq!(result.answer, HINDI_ANSWER);
        assert_eq!(result.attempts.len(), 2);
        assert!(!result.attempts[0].valid);
        assert!(result.attempts[1].valid);

        let calls = model.calls();
        assert_eq!(calls.len(), 2);
        assert!((calls[0].temperature - 0.7).abs() < 1e-6);
        assert!((calls[1].temperature - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_return_best_effort() {
        let model = ScriptedChatModel::new(vec![
            Ok(ENGLISH_ANSWER.to_string()),
            Ok(ENGLISH_ANSWER.to_string()),
        ]);
        let controller = GenerationController::default();

        let result = controller
            .answer(&model, "AI क्या है?", "context", &passages(), Language::Hi)
            .await
            .unwrap();

        assert_eq!(result.outcome, GenerationOutcome::AcceptedBestEffort);
        assert_eq!(result.answer, ENGLISH_ANSWER);
        assert_eq!(result.attempts.len(), 2);
    }

    #[tokio::test]
    async fn test_transport_failure_falls_back_to_context() {
        let model =
            ScriptedChatModel::new(vec![Err(GenerationError::unavailable("connection refused"))]);
        let controller = GenerationController::default();

        let result = controller
            .answer(&model, "What is AI?", "context", &passages(), Language::En)
            .await
            .unwrap();

        assert_eq!(result.outcome, GenerationOutcome::Fallback);
        assert!(result.answer.starts_with("Based on the document: "));
        assert!(result.answer.contains("simulation of human intelligence"));
    }

    #[tokio::test]
    async fn test_fallback_without_context_uses_static_message() {
        let model = ScriptedChatModel::new(vec![Err(GenerationError::unavailable("timeout"))]);
        let controller = GenerationController::default();

        let result = controller
            .answer(&model, "What is AI?", "", &[], Language::En)
            .await
            .unwrap();

        assert_eq!(result.outcome, GenerationOutcome::Fallback);
        assert_eq!(
            result.answer,
            "Sorry, the document does not contain enough information to answer this question."
        );
    }

    #[tokio::test]
    async fn test_fallback_snippet_truncated() {
        let model = ScriptedChatModel::new(vec![Err(GenerationError::unavailable("timeout"))]);
        let controller = GenerationController::default();
        let long_passage = vec!["x".repeat(2000)];

        let result = controller
            .answer(&model, "What is AI?", "context", &long_passage, Language::En)
            .await
            .unwrap();

        let snippet_len = result.answer.chars().count() - "Based on the document: ".chars().count();
        assert_eq!(snippet_len, 500);
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let model = ScriptedChatModel::new(vec![]);
        let controller = GenerationController::default();

        let err = controller
            .answer(&model, "   ", "context", &passages(), Language::En)
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::EmptyPrompt));
    }

    #[tokio::test]
    async fn test_temperature_capped() {
        let controller = GenerationController::new(5, 0.7, 1024);
        let model = ScriptedChatModel::new(vec![
            Ok(ENGLISH_ANSWER.to_string()),
            Ok(ENGLISH_ANSWER.to_string()),
            Ok(ENGLISH_ANSWER.to_string()),
            Ok(ENGLISH_ANSWER.to_string()),
            Ok(ENGLISH_ANSWER.to_string()),
        ]);

        let result = controller
            .answer(&model, "AI क्या है?", "context", &passages(), Language::Hi)
            .await
            .unwrap();

        assert_eq!(result.outcome, GenerationOutcome::AcceptedBestEffort);
        let calls = model.calls();
        assert!((calls[4].temperature - 1.5).abs() < 1e-6);
    }
}
