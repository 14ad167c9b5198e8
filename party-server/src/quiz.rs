use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use party_core::SessionError;
use party_persistence::QuizRepository;
use party_types::{Question, QuizDefinition};

#[derive(Debug, thiserror::Error)]
pub enum QuizGenError {
    #[error("quiz generation request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("quiz generator returned an unusable payload: {0}")]
    BadPayload(String),
}

/// Source of quiz questions, normally an LLM generation endpoint.
#[async_trait]
pub trait QuizSource: Send + Sync {
    async fn generate(
        &self,
        topic: &str,
        question_count: usize,
    ) -> Result<Vec<Question>, QuizGenError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationRequest<'a> {
    topic: &'a str,
    question_count: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedQuestion {
    #[serde(alias = "text")]
    question: String,
    options: Vec<String>,
    correct_index: usize,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    questions: Vec<GeneratedQuestion>,
}

/// HTTP quiz generator client. The payload is model output, so every
/// structural guarantee is checked before a question reaches a room.
pub struct HttpQuizSource {
    client: Client,
    base_url: String,
    request_timeout: std::time::Duration,
}

impl HttpQuizSource {
    pub fn new(base_url: String, request_timeout: std::time::Duration) -> Self {
        Self {
            client: Client::new(),
            base_url,
            request_timeout,
        }
    }

    fn convert(response: GenerationResponse) -> Result<Vec<Question>, QuizGenError> {
        if response.questions.is_empty() {
            return Err(QuizGenError::BadPayload(
                "generator returned no questions".to_string(),
            ));
        }
        response
            .questions
            .into_iter()
            .map(|q| {
                if q.options.len() < 2 {
                    return Err(QuizGenError::BadPayload(format!(
                        "question '{}' has fewer than two options",
                        q.question
                    )));
                }
                if q.correct_index >= q.options.len() {
                    return Err(QuizGenError::BadPayload(format!(
                        "question '{}' marks an option that does not exist",
                        q.question
                    )));
                }
                Ok(Question {
                    text: q.question,
                    options: q.options,
                    correct_index: q.correct_index,
                })
            })
            .collect()
    }
}

#[async_trait]
impl QuizSource for HttpQuizSource {
    async fn generate(
        &self,
        topic: &str,
        question_count: usize,
    ) -> Result<Vec<Question>, QuizGenError> {
        let response = self
            .client
            .post(format!("{}/generate", self.base_url))
            .timeout(self.request_timeout)
            .json(&GenerationRequest {
                topic,
                question_count,
            })
            .send()
            .await?
            .error_for_status()?;
        let parsed: GenerationResponse = response
            .json()
            .await
            .map_err(|e| QuizGenError::BadPayload(e.to_string()))?;
        Self::convert(parsed)
    }
}

/// Deterministic stand-in used when no generator endpoint is configured
/// and by tests. Question `i` marks option `i % 4` as correct.
pub struct SampleQuizSource;

#[async_trait]
impl QuizSource for SampleQuizSource {
    async fn generate(
        &self,
        topic: &str,
        question_count: usize,
    ) -> Result<Vec<Question>, QuizGenError> {
        Ok((0..question_count)
            .map(|i| Question {
                text: format!("Sample question {} about {}", i + 1, topic),
                options: vec![
                    "Option A".to_string(),
                    "Option B".to_string(),
                    "Option C".to_string(),
                    "Option D".to_string(),
                ],
                correct_index: i % 4,
            })
            .collect())
    }
}

/// Generation plus persistence behind the quiz-related commands.
pub struct QuizService {
    source: Arc<dyn QuizSource>,
    repository: Arc<QuizRepository>,
    max_questions: usize,
}

impl QuizService {
    pub fn new(
        source: Arc<dyn QuizSource>,
        repository: Arc<QuizRepository>,
        max_questions: usize,
    ) -> Self {
        Self {
            source,
            repository,
            max_questions,
        }
    }

    pub async fn create_quiz(
        &self,
        topic: &str,
        question_count: usize,
        title: Option<String>,
    ) -> Result<QuizDefinition, SessionError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(SessionError::Validation(
                "topic must not be empty".to_string(),
            ));
        }
        if question_count == 0 || question_count > self.max_questions {
            return Err(SessionError::Validation(format!(
                "questionCount must be between 1 and {}",
                self.max_questions
            )));
        }

        let questions = self
            .source
            .generate(topic, question_count)
            .await
            .map_err(|e| SessionError::ExternalService(e.to_string()))?;

        let quiz = QuizDefinition {
            id: Uuid::new_v4(),
            title: title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| format!("{topic} quiz")),
            topic: topic.to_string(),
            questions,
            created_at: Utc::now().to_rfc3339(),
        };
        self.repository
            .save_quiz(&quiz)
            .await
            .map_err(|e| SessionError::ExternalService(e.to_string()))?;
        info!(
            "Created quiz {} with {} questions",
            quiz.title,
            quiz.questions.len()
        );
        Ok(quiz)
    }

    pub async fn get_quiz(&self, id: &str) -> Result<QuizDefinition, SessionError> {
        self.repository
            .get_quiz(id)
            .await
            .map_err(|e| SessionError::ExternalService(e.to_string()))?
            .ok_or_else(|| SessionError::Validation(format!("quiz {id} not found")))
    }
}
