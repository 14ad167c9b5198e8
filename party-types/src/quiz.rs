use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub text: String,
    pub options: Vec<String>,
    pub correct_index: usize,
}

/// What players get to see of a question. The correct option index
/// stays server-side until the round is scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SafeQuestion {
    pub text: String,
    pub options: Vec<String>,
}

impl From<&Question> for SafeQuestion {
    fn from(question: &Question) -> Self {
        Self {
            text: question.text.clone(),
            options: question.options.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct QuizDefinition {
    pub id: Uuid,
    pub title: String,
    pub topic: String,
    pub questions: Vec<Question>,
    pub created_at: String, // ISO 8601 string
}

/// Client-safe view of a stored quiz.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct QuizView {
    pub id: Uuid,
    pub title: String,
    pub topic: String,
    pub question_count: usize,
    pub questions: Vec<SafeQuestion>,
    pub created_at: String,
}

impl From<&QuizDefinition> for QuizView {
    fn from(quiz: &QuizDefinition) -> Self {
        Self {
            id: quiz.id,
            title: quiz.title.clone(),
            topic: quiz.topic.clone(),
            question_count: quiz.questions.len(),
            questions: quiz.questions.iter().map(SafeQuestion::from).collect(),
            created_at: quiz.created_at.clone(),
        }
    }
}
