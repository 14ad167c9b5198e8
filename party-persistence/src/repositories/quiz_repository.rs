use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;

use party_types::QuizDefinition;

use crate::store::DocumentStore;

const QUIZ_COLLECTION: &str = "quizzes";

pub struct QuizRepository {
    store: Arc<dyn DocumentStore>,
}

impl QuizRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn save_quiz(&self, quiz: &QuizDefinition) -> Result<String> {
        let record = serde_json::to_value(quiz)?;
        let id = self.store.save(QUIZ_COLLECTION, record).await?;
        tracing::info!("Stored quiz {} ({})", quiz.title, id);
        Ok(id)
    }

    pub async fn get_quiz(&self, id: &str) -> Result<Option<QuizDefinition>> {
        match self.store.get(QUIZ_COLLECTION, id).await? {
            Some(record) => Ok(Some(serde_json::from_value(record)?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_topic(&self, topic: &str) -> Result<Vec<QuizDefinition>> {
        let topic_lower = topic.to_lowercase();
        let filter = |record: &Value| {
            record
                .get("topic")
                .and_then(Value::as_str)
                .map(|t| t.to_lowercase() == topic_lower)
                .unwrap_or(false)
        };
        let records = self.store.query(QUIZ_COLLECTION, &filter).await?;
        records
            .into_iter()
            .map(|record| serde_json::from_value(record).map_err(Into::into))
            .collect()
    }
}
