use std::collections::HashMap;

use rand::Rng;

use party_types::{Player, PlayerId, ScoreBoard};

use crate::error::SessionError;
use crate::room::{GameMode, Room, RoundContext, SubmittedAnswer};
use crate::scoring::{self, SemanticVerdicts};

pub const DEFAULT_CATEGORIES: &[&str] = &["Stadt", "Land", "Fluss", "Name", "Tier", "Beruf"];

/// Q, X and Y make for unplayable rounds in most categories.
pub const LETTER_POOL: &[char] = &[
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'R', 'S',
    'T', 'U', 'V', 'W', 'Z',
];

/// Fraction of the configured time limit cut when the round's first
/// answer lands.
pub const FIRST_ANSWER_TIME_CUT: f32 = 0.15;

pub fn default_categories() -> Vec<String> {
    DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect()
}

pub fn random_letter() -> char {
    let mut rng = rand::rng();
    LETTER_POOL[rng.random_range(0..LETTER_POOL.len())]
}

/// The seam between the shared session engine and a concrete game. The
/// engine owns rooms, timers and broadcasts; the rule set decides what a
/// round contains, how it scores and when the game is over.
pub trait GameRules: Send + Sync {
    fn generate_round(&self, room: &Room) -> Result<RoundContext, SessionError>;

    /// Pure scoring over a claimed round. External verdicts are fetched
    /// beforehand; this never blocks.
    fn score_round(
        &self,
        context: &RoundContext,
        answers: &HashMap<PlayerId, SubmittedAnswer>,
        players: &[Player],
        verdicts: &SemanticVerdicts,
    ) -> ScoreBoard;

    /// True when no further round can start.
    fn is_terminal(&self, room: &Room) -> bool;

    fn first_answer_time_cut(&self) -> Option<f32> {
        None
    }

    fn uses_external_validation(&self) -> bool {
        false
    }

    /// Whether advancing a non-terminal game starts the next round right
    /// away instead of returning to the lobby.
    fn advances_immediately(&self) -> bool {
        false
    }
}

pub fn rules_for(mode: &GameMode) -> &'static dyn GameRules {
    match mode {
        GameMode::Letter { .. } => &LetterRules,
        GameMode::Quiz { .. } => &QuizRules,
    }
}

pub struct LetterRules;

impl GameRules for LetterRules {
    fn generate_round(&self, room: &Room) -> Result<RoundContext, SessionError> {
        match &room.mode {
            GameMode::Letter { categories } => Ok(RoundContext::Letter {
                letter: random_letter(),
                categories: categories.clone(),
            }),
            GameMode::Quiz { .. } => Err(SessionError::StateConflict(
                "letter rules applied to a quiz room".to_string(),
            )),
        }
    }

    fn score_round(
        &self,
        context: &RoundContext,
        answers: &HashMap<PlayerId, SubmittedAnswer>,
        players: &[Player],
        verdicts: &SemanticVerdicts,
    ) -> ScoreBoard {
        match context {
            RoundContext::Letter { letter, categories } => {
                scoring::score_letter_round(*letter, categories, answers, players, verdicts)
            }
            RoundContext::Question { .. } => ScoreBoard::new(),
        }
    }

    fn is_terminal(&self, _room: &Room) -> bool {
        // The letter game loops until the lobby disbands.
        false
    }

    fn first_answer_time_cut(&self) -> Option<f32> {
        Some(FIRST_ANSWER_TIME_CUT)
    }

    fn uses_external_validation(&self) -> bool {
        true
    }
}

pub struct QuizRules;

impl GameRules for QuizRules {
    fn generate_round(&self, room: &Room) -> Result<RoundContext, SessionError> {
        match &room.mode {
            GameMode::Quiz { questions, .. } => {
                let index = room.next_question();
                let question = questions.get(index).cloned().ok_or_else(|| {
                    SessionError::StateConflict("no questions left to play".to_string())
                })?;
                Ok(RoundContext::Question { index, question })
            }
            GameMode::Letter { .. } => Err(SessionError::StateConflict(
                "quiz rules applied to a letter room".to_string(),
            )),
        }
    }

    fn score_round(
        &self,
        context: &RoundContext,
        answers: &HashMap<PlayerId, SubmittedAnswer>,
        players: &[Player],
        _verdicts: &SemanticVerdicts,
    ) -> ScoreBoard {
        match context {
            RoundContext::Question { index, question } => {
                scoring::score_quiz_round(*index, question, answers, players)
            }
            RoundContext::Letter { .. } => ScoreBoard::new(),
        }
    }

    fn is_terminal(&self, room: &Room) -> bool {
        match &room.mode {
            GameMode::Quiz { questions, .. } => room.next_question() >= questions.len(),
            GameMode::Letter { .. } => true,
        }
    }

    fn advances_immediately(&self) -> bool {
        true
    }
}
