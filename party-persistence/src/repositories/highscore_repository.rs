use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use party_types::Player;

use crate::store::DocumentStore;

const HIGHSCORE_COLLECTION: &str = "highscores";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighscoreEntry {
    pub player_name: String,
    pub score: u32,
    pub quiz_title: String,
    pub recorded_at: String, // ISO 8601 string
}

pub struct HighscoreRepository {
    store: Arc<dyn DocumentStore>,
}

impl HighscoreRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Records one entry per player when a quiz finishes.
    pub async fn record_final_scores(&self, quiz_title: &str, players: &[Player]) -> Result<()> {
        for player in players {
            let entry = HighscoreEntry {
                player_name: player.display_name.clone(),
                score: player.score,
                quiz_title: quiz_title.to_string(),
                recorded_at: chrono::Utc::now().to_rfc3339(),
            };
            self.store
                .save(HIGHSCORE_COLLECTION, serde_json::to_value(&entry)?)
                .await?;
        }
        tracing::info!(
            "Recorded {} highscore entries for {}",
            players.len(),
            quiz_title
        );
        Ok(())
    }

    /// Best scores across all recorded games, highest first.
    pub async fn top(&self, limit: usize) -> Result<Vec<HighscoreEntry>> {
        let records = self
            .store
            .query(HIGHSCORE_COLLECTION, &|_record: &Value| true)
            .await?;
        let mut entries: Vec<HighscoreEntry> = records
            .into_iter()
            .filter_map(|record| serde_json::from_value(record).ok())
            .collect();
        entries.sort_by(|a, b| b.score.cmp(&a.score));
        entries.truncate(limit);
        Ok(entries)
    }
}
