use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::player::{Player, PlayerId};
use crate::quiz::SafeQuestion;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum Phase {
    Waiting,
    RoundActive,
    RoundResults,
    Finished,
}

/// One player's outcome for one category (or quiz question).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEntry {
    pub player_id: PlayerId,
    pub category: String,
    pub submitted_value: Option<String>,
    pub is_valid: bool,
    pub is_unique: bool,
    pub points: u32,
}

/// Category (or question index) -> player -> score entry.
pub type ScoreBoard = HashMap<String, HashMap<PlayerId, ScoreEntry>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RoomConfigView {
    pub time_limit_seconds: u64,
    pub max_players: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_count: Option<usize>,
}

/// Client view of the round in flight. Quiz questions are redacted to
/// `SafeQuestion` so the correct option never crosses the wire early.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoundSnapshot {
    #[serde(rename_all = "camelCase")]
    Letter {
        letter: String,
        categories: Vec<String>,
        ends_at: String, // ISO 8601 string
    },
    #[serde(rename_all = "camelCase")]
    Question {
        index: usize,
        total: usize,
        question: SafeQuestion,
        ends_at: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub id: String,
    pub phase: Phase,
    pub host_id: Option<PlayerId>,
    pub players: Vec<Player>,
    pub ready_count: usize,
    pub config: RoomConfigView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round: Option<RoundSnapshot>,
}
