use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

pub type PlayerId = Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    pub score: u32,
    pub is_host: bool,
    pub is_ready: bool,
    pub has_answered: bool,
}

impl Player {
    pub fn new(display_name: String, is_host: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_name,
            score: 0,
            is_host,
            is_ready: false,
            has_answered: false,
        }
    }
}
