use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rand::Rng;

use party_types::{
    Phase, Player, PlayerId, Question, RoomConfigView, RoomSnapshot, RoundSnapshot, SafeQuestion,
    ScoreBoard,
};

use crate::error::SessionError;

pub type RoomId = String;

/// Room codes avoid characters that read ambiguously in a lobby screen.
const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPRSTUVWXYZ23456789";
pub const ROOM_CODE_LENGTH: usize = 4;

pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LENGTH)
        .map(|_| ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Which rule set the room runs, plus that rule set's static content.
#[derive(Debug, Clone)]
pub enum GameMode {
    Letter {
        categories: Vec<String>,
    },
    Quiz {
        title: String,
        questions: Vec<Question>,
    },
}

#[derive(Debug, Clone)]
pub struct RoomConfig {
    pub time_limit: Duration,
    pub max_players: usize,
}

/// Content of the round currently in flight.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundContext {
    Letter {
        letter: char,
        categories: Vec<String>,
    },
    Question {
        index: usize,
        question: Question,
    },
}

/// A player's answer as recorded by the engine. First write wins.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmittedAnswer {
    /// Letter mode: category -> word.
    Categories(HashMap<String, String>),
    /// Quiz mode: chosen option index.
    Choice(usize),
}

#[derive(Debug, Clone, Copy)]
pub struct AnswerOutcome {
    /// False when this player already answered and the repeat was dropped.
    pub accepted: bool,
    pub first_in_round: bool,
    pub all_answered: bool,
}

/// Everything the scoring pipeline needs once a round is claimed, so the
/// room lock can be released while the external validator runs.
#[derive(Debug, Clone)]
pub struct RoundClosure {
    pub seq: u64,
    pub context: RoundContext,
    pub answers: HashMap<PlayerId, SubmittedAnswer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Back to the waiting lobby, ready flags cleared.
    Lobby,
    /// Terminal round played; the game is over.
    Finished,
}

#[derive(Debug, Clone)]
pub struct Removal {
    pub removed: Player,
    /// Set when host succession happened; broadcast exactly once.
    pub new_host: Option<Player>,
    pub room_empty: bool,
    /// The departure completed the round: everyone left has answered.
    pub all_answered_now: bool,
}

/// A single game room. All methods are synchronous; callers serialize
/// access through the room store's lock.
#[derive(Debug)]
pub struct Room {
    pub id: RoomId,
    pub mode: GameMode,
    pub config: RoomConfig,
    pub phase: Phase,
    /// Insertion order decides host succession.
    players: Vec<Player>,
    host_id: Option<PlayerId>,
    round: Option<RoundContext>,
    answers: HashMap<PlayerId, SubmittedAnswer>,
    /// Bumped on every round start. Deadline timers carry the value they
    /// were scheduled with and fizzle when it no longer matches.
    round_seq: u64,
    /// Held between the end-round claim and score application so that a
    /// racing trigger becomes a no-op.
    scoring_pending: bool,
    /// Quiz mode: index of the next unplayed question.
    next_question: usize,
    timer_reduced: bool,
    deadline: Option<Instant>,
    ends_at: Option<DateTime<Utc>>,
    last_results: Option<ScoreBoard>,
    last_activity: Instant,
}

impl Room {
    pub fn new(id: RoomId, mode: GameMode, config: RoomConfig) -> Self {
        Self {
            id,
            mode,
            config,
            phase: Phase::Waiting,
            players: Vec::new(),
            host_id: None,
            round: None,
            answers: HashMap::new(),
            round_seq: 0,
            scoring_pending: false,
            next_question: 0,
            timer_reduced: false,
            deadline: None,
            ends_at: None,
            last_results: None,
            last_activity: Instant::now(),
        }
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn host_id(&self) -> Option<PlayerId> {
        self.host_id
    }

    pub fn round_seq(&self) -> u64 {
        self.round_seq
    }

    pub fn scoring_pending(&self) -> bool {
        self.scoring_pending
    }

    pub fn round_context(&self) -> Option<&RoundContext> {
        self.round.as_ref()
    }

    pub fn last_results(&self) -> Option<&ScoreBoard> {
        self.last_results.as_ref()
    }

    pub fn next_question(&self) -> usize {
        self.next_question
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn ends_at(&self) -> Option<DateTime<Utc>> {
        self.ends_at
    }

    pub fn is_member(&self, player_id: PlayerId) -> bool {
        self.players.iter().any(|p| p.id == player_id)
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn ready_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_ready).count()
    }

    /// Ready players needed for a non-host start: everyone when two are in
    /// the room, at least half (rounded up) beyond that.
    pub fn quorum(&self) -> usize {
        match self.players.len() {
            total @ (0 | 1) => total,
            2 => 2,
            total => total.div_ceil(2),
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    pub fn add_player(&mut self, display_name: &str) -> Result<Player, SessionError> {
        if self.phase == Phase::Finished {
            return Err(SessionError::StateConflict(format!(
                "room {} already finished",
                self.id
            )));
        }
        if self.players.len() >= self.config.max_players {
            return Err(SessionError::RoomFull(self.id.clone()));
        }

        let is_host = self.players.is_empty();
        let player = Player::new(display_name.to_string(), is_host);
        if is_host {
            self.host_id = Some(player.id);
        }
        self.players.push(player.clone());
        self.touch();
        Ok(player)
    }

    pub fn set_ready(&mut self, player_id: PlayerId, is_ready: bool) -> Result<(), SessionError> {
        if self.phase != Phase::Waiting {
            return Err(SessionError::StateConflict(
                "ready toggles only apply in the lobby".to_string(),
            ));
        }
        let player = self
            .players
            .iter_mut()
            .find(|p| p.id == player_id)
            .ok_or_else(|| SessionError::Validation("player is not in this room".to_string()))?;
        player.is_ready = is_ready;
        self.touch();
        Ok(())
    }

    /// Start authorization: the host can always start; anyone else needs
    /// the ready quorum behind them.
    pub fn can_start(&self, requester: PlayerId) -> Result<(), SessionError> {
        if self.phase != Phase::Waiting {
            return Err(SessionError::StateConflict(
                "a round is already running".to_string(),
            ));
        }
        if !self.is_member(requester) {
            return Err(SessionError::Validation(
                "player is not in this room".to_string(),
            ));
        }
        if self.host_id == Some(requester) || self.ready_count() >= self.quorum() {
            return Ok(());
        }
        Err(SessionError::NotAuthorized(
            "only the host or a ready quorum can start the round".to_string(),
        ))
    }

    /// Transition into `RoundActive` with fresh per-round bookkeeping.
    pub fn begin_round(&mut self, context: RoundContext) {
        if let RoundContext::Question { index, .. } = &context {
            self.next_question = index + 1;
        }
        self.round = Some(context);
        self.answers.clear();
        for player in &mut self.players {
            player.has_answered = false;
        }
        self.phase = Phase::RoundActive;
        self.round_seq += 1;
        self.scoring_pending = false;
        self.timer_reduced = false;
        self.deadline = Some(Instant::now() + self.config.time_limit);
        self.ends_at = Some(
            Utc::now() + chrono::Duration::milliseconds(self.config.time_limit.as_millis() as i64),
        );
        self.touch();
    }

    pub fn record_answer(
        &mut self,
        player_id: PlayerId,
        answer: SubmittedAnswer,
    ) -> Result<AnswerOutcome, SessionError> {
        if self.phase != Phase::RoundActive {
            return Err(SessionError::StateConflict(
                "no round is accepting answers".to_string(),
            ));
        }
        if !self.is_member(player_id) {
            return Err(SessionError::Validation(
                "player is not in this room".to_string(),
            ));
        }
        match (&self.mode, &answer) {
            (GameMode::Letter { .. }, SubmittedAnswer::Categories(_)) => {}
            (GameMode::Quiz { .. }, SubmittedAnswer::Choice(_)) => {}
            _ => {
                return Err(SessionError::Validation(
                    "answer payload does not match the game mode".to_string(),
                ));
            }
        }

        if self.answers.contains_key(&player_id) {
            // First write wins, repeats are dropped.
            return Ok(AnswerOutcome {
                accepted: false,
                first_in_round: false,
                all_answered: self.all_answered(),
            });
        }

        let first_in_round = self.answers.is_empty();
        self.answers.insert(player_id, answer);
        if let Some(player) = self.players.iter_mut().find(|p| p.id == player_id) {
            player.has_answered = true;
        }
        self.touch();
        Ok(AnswerOutcome {
            accepted: true,
            first_in_round,
            all_answered: self.all_answered(),
        })
    }

    pub fn all_answered(&self) -> bool {
        !self.players.is_empty()
            && self
                .players
                .iter()
                .all(|p| self.answers.contains_key(&p.id))
    }

    /// Pull the remaining round time in by `fraction` of the configured
    /// limit, at most once per round and never past "now". Returns the new
    /// deadline pair for rescheduling, or `None` when nothing changed.
    pub fn apply_timer_reduction(&mut self, fraction: f32) -> Option<(Instant, DateTime<Utc>)> {
        if self.phase != Phase::RoundActive || self.timer_reduced {
            return None;
        }
        let current = self.deadline?;
        let current_ends_at = self.ends_at?;

        let cut = self.config.time_limit.mul_f32(fraction);
        let now = Instant::now();
        let new_deadline = current.checked_sub(cut).unwrap_or(now).max(now);
        let new_ends_at =
            (current_ends_at - chrono::Duration::milliseconds(cut.as_millis() as i64))
                .max(Utc::now());

        self.deadline = Some(new_deadline);
        self.ends_at = Some(new_ends_at);
        self.timer_reduced = true;
        self.touch();
        Some((new_deadline, new_ends_at))
    }

    /// Claim the round for scoring. Exactly one trigger (deadline, last
    /// answer, or a departure completing the round) wins; later ones get a
    /// `StateConflict` and must drop out.
    pub fn begin_scoring(&mut self, seq: u64) -> Result<RoundClosure, SessionError> {
        if seq != self.round_seq {
            return Err(SessionError::StateConflict(format!(
                "stale end-round trigger for round {seq}"
            )));
        }
        if self.phase != Phase::RoundActive {
            return Err(SessionError::StateConflict(
                "round already ended".to_string(),
            ));
        }
        let context = self
            .round
            .clone()
            .ok_or_else(|| SessionError::StateConflict("no round in flight".to_string()))?;

        self.phase = Phase::RoundResults;
        self.scoring_pending = true;
        self.deadline = None;
        self.ends_at = None;
        self.touch();
        Ok(RoundClosure {
            seq,
            context,
            answers: self.answers.clone(),
        })
    }

    /// Apply a scored board to the roster. Rejected when the room moved on
    /// while the validator ran.
    pub fn apply_scores(&mut self, seq: u64, board: ScoreBoard) -> Result<(), SessionError> {
        if seq != self.round_seq || !self.scoring_pending {
            return Err(SessionError::StateConflict(format!(
                "scores arrived for a stale round {seq}"
            )));
        }
        for entries in board.values() {
            for (player_id, entry) in entries {
                if let Some(player) = self.players.iter_mut().find(|p| p.id == *player_id) {
                    player.score += entry.points;
                }
            }
        }
        self.scoring_pending = false;
        self.last_results = Some(board);
        self.touch();
        Ok(())
    }

    /// Host-gated move out of `RoundResults`: to the lobby, or to
    /// `Finished` when the rule set says the game is over.
    pub fn advance(
        &mut self,
        requester: PlayerId,
        terminal: bool,
    ) -> Result<AdvanceOutcome, SessionError> {
        if self.host_id != Some(requester) {
            return Err(SessionError::NotAuthorized(
                "only the host can advance the game".to_string(),
            ));
        }
        if self.phase != Phase::RoundResults || self.scoring_pending {
            return Err(SessionError::StateConflict(
                "no settled round to advance from".to_string(),
            ));
        }

        self.touch();
        if terminal {
            self.phase = Phase::Finished;
            return Ok(AdvanceOutcome::Finished);
        }
        self.phase = Phase::Waiting;
        self.round = None;
        self.answers.clear();
        for player in &mut self.players {
            player.is_ready = false;
            player.has_answered = false;
        }
        Ok(AdvanceOutcome::Lobby)
    }

    /// Remove a player in any phase. Handles host succession and reports
    /// whether the departure emptied the room or completed the round.
    pub fn remove_player(&mut self, player_id: PlayerId) -> Result<Removal, SessionError> {
        let index = self
            .players
            .iter()
            .position(|p| p.id == player_id)
            .ok_or_else(|| SessionError::Validation("player is not in this room".to_string()))?;

        let removed = self.players.remove(index);
        self.answers.remove(&player_id);

        let mut new_host = None;
        if removed.is_host {
            self.host_id = None;
            if let Some(next) = self.players.first_mut() {
                next.is_host = true;
                self.host_id = Some(next.id);
                new_host = Some(next.clone());
            }
        }

        let room_empty = self.players.is_empty();
        let all_answered_now =
            !room_empty && self.phase == Phase::RoundActive && self.all_answered();
        self.touch();
        Ok(Removal {
            removed,
            new_host,
            room_empty,
            all_answered_now,
        })
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        let (categories, question_count) = match &self.mode {
            GameMode::Letter { categories } => (Some(categories.clone()), None),
            GameMode::Quiz { questions, .. } => (None, Some(questions.len())),
        };
        RoomSnapshot {
            id: self.id.clone(),
            phase: self.phase,
            host_id: self.host_id,
            players: self.players.clone(),
            ready_count: self.ready_count(),
            config: RoomConfigView {
                time_limit_seconds: self.config.time_limit.as_secs(),
                max_players: self.config.max_players,
                categories,
                question_count,
            },
            round: self.round_snapshot(),
        }
    }

    pub fn round_snapshot(&self) -> Option<RoundSnapshot> {
        if self.phase != Phase::RoundActive {
            return None;
        }
        let ends_at = self.ends_at?.to_rfc3339();
        match self.round.as_ref()? {
            RoundContext::Letter { letter, categories } => Some(RoundSnapshot::Letter {
                letter: letter.to_string(),
                categories: categories.clone(),
                ends_at,
            }),
            RoundContext::Question { index, question } => Some(RoundSnapshot::Question {
                index: *index,
                total: match &self.mode {
                    GameMode::Quiz { questions, .. } => questions.len(),
                    GameMode::Letter { .. } => 0,
                },
                question: SafeQuestion::from(question),
                ends_at,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letter_room(time_limit: Duration) -> Room {
        Room::new(
            "AB12".to_string(),
            GameMode::Letter {
                categories: vec!["Stadt".to_string(), "Land".to_string()],
            },
            RoomConfig {
                time_limit,
                max_players: 8,
            },
        )
    }

    fn letter_answer(pairs: &[(&str, &str)]) -> SubmittedAnswer {
        SubmittedAnswer::Categories(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn room_with_players(names: &[&str]) -> (Room, Vec<PlayerId>) {
        let mut room = letter_room(Duration::from_secs(60));
        let ids = names
            .iter()
            .map(|name| room.add_player(name).unwrap().id)
            .collect();
        (room, ids)
    }

    #[test]
    fn test_first_joiner_becomes_host() {
        let (room, ids) = room_with_players(&["Alice", "Bob"]);
        assert_eq!(room.host_id(), Some(ids[0]));
        assert!(room.player(ids[0]).unwrap().is_host);
        assert!(!room.player(ids[1]).unwrap().is_host);
        assert_eq!(room.players().iter().filter(|p| p.is_host).count(), 1);
    }

    #[test]
    fn test_join_respects_capacity() {
        let mut room = letter_room(Duration::from_secs(60));
        room.config.max_players = 2;
        room.add_player("Alice").unwrap();
        room.add_player("Bob").unwrap();
        assert!(matches!(
            room.add_player("Carol"),
            Err(SessionError::RoomFull(_))
        ));
    }

    #[test]
    fn test_quorum_law() {
        let mut room = letter_room(Duration::from_secs(60));
        assert_eq!(room.quorum(), 0);
        room.add_player("P1").unwrap();
        assert_eq!(room.quorum(), 1);
        room.add_player("P2").unwrap();
        assert_eq!(room.quorum(), 2);
        room.add_player("P3").unwrap();
        assert_eq!(room.quorum(), 2);
        room.add_player("P4").unwrap();
        assert_eq!(room.quorum(), 2);
        room.add_player("P5").unwrap();
        assert_eq!(room.quorum(), 3);
    }

    #[test]
    fn test_ready_only_in_lobby() {
        let (mut room, ids) = room_with_players(&["Alice", "Bob"]);
        room.set_ready(ids[1], true).unwrap();
        assert_eq!(room.ready_count(), 1);

        room.begin_round(RoundContext::Letter {
            letter: 'B',
            categories: vec!["Stadt".to_string()],
        });
        assert!(matches!(
            room.set_ready(ids[1], false),
            Err(SessionError::StateConflict(_))
        ));
    }

    #[test]
    fn test_start_needs_host_or_quorum() {
        let (mut room, ids) = room_with_players(&["Alice", "Bob", "Carol"]);
        // Host can always start.
        room.can_start(ids[0]).unwrap();
        // A lone non-host cannot.
        assert!(matches!(
            room.can_start(ids[2]),
            Err(SessionError::NotAuthorized(_))
        ));
        // Two of three ready meets the quorum.
        room.set_ready(ids[1], true).unwrap();
        room.set_ready(ids[2], true).unwrap();
        room.can_start(ids[2]).unwrap();
    }

    #[test]
    fn test_begin_round_resets_per_round_state() {
        let (mut room, ids) = room_with_players(&["Alice", "Bob"]);
        room.begin_round(RoundContext::Letter {
            letter: 'B',
            categories: vec!["Stadt".to_string()],
        });
        room.record_answer(ids[0], letter_answer(&[("Stadt", "Berlin")]))
            .unwrap();
        let closure = room.begin_scoring(room.round_seq()).unwrap();
        room.apply_scores(closure.seq, ScoreBoard::new()).unwrap();
        room.advance(ids[0], false).unwrap();

        let seq_before = room.round_seq();
        room.begin_round(RoundContext::Letter {
            letter: 'M',
            categories: vec!["Stadt".to_string()],
        });
        assert_eq!(room.round_seq(), seq_before + 1);
        assert_eq!(room.phase, Phase::RoundActive);
        assert!(room.players().iter().all(|p| !p.has_answered));
        assert!(!room.all_answered());
    }

    #[test]
    fn test_first_answer_wins() {
        let (mut room, ids) = room_with_players(&["Alice", "Bob"]);
        room.begin_round(RoundContext::Letter {
            letter: 'B',
            categories: vec!["Stadt".to_string()],
        });

        let first = room
            .record_answer(ids[0], letter_answer(&[("Stadt", "Berlin")]))
            .unwrap();
        assert!(first.accepted);
        assert!(first.first_in_round);
        assert!(!first.all_answered);

        let repeat = room
            .record_answer(ids[0], letter_answer(&[("Stadt", "Bonn")]))
            .unwrap();
        assert!(!repeat.accepted);

        let last = room
            .record_answer(ids[1], letter_answer(&[("Stadt", "Bremen")]))
            .unwrap();
        assert!(last.accepted);
        assert!(!last.first_in_round);
        assert!(last.all_answered);

        // The original submission survived the repeat.
        match room.begin_scoring(room.round_seq()).unwrap().answers[&ids[0]] {
            SubmittedAnswer::Categories(ref map) => {
                assert_eq!(map.get("Stadt").map(String::as_str), Some("Berlin"));
            }
            ref other => panic!("unexpected answer {other:?}"),
        }
    }

    #[test]
    fn test_answer_kind_must_match_mode() {
        let (mut room, ids) = room_with_players(&["Alice"]);
        room.begin_round(RoundContext::Letter {
            letter: 'B',
            categories: vec!["Stadt".to_string()],
        });
        assert!(matches!(
            room.record_answer(ids[0], SubmittedAnswer::Choice(1)),
            Err(SessionError::Validation(_))
        ));
    }

    #[test]
    fn test_timer_reduction_cuts_fifteen_percent_once() {
        let (mut room, _) = room_with_players(&["Alice", "Bob"]);
        room.begin_round(RoundContext::Letter {
            letter: 'B',
            categories: vec!["Stadt".to_string()],
        });
        let before = room.deadline().unwrap();

        let (after, _) = room.apply_timer_reduction(0.15).unwrap();
        let cut = before.duration_since(after);
        // 15% of 60s, modulo the instants taken during the call.
        assert!(cut >= Duration::from_millis(8900), "cut was {cut:?}");
        assert!(cut <= Duration::from_millis(9100), "cut was {cut:?}");

        assert!(room.apply_timer_reduction(0.15).is_none());
    }

    #[test]
    fn test_timer_reduction_never_moves_deadline_before_now() {
        let (mut room, _) = room_with_players(&["Alice"]);
        room.config.time_limit = Duration::from_millis(10);
        room.begin_round(RoundContext::Letter {
            letter: 'B',
            categories: vec!["Stadt".to_string()],
        });
        let (new_deadline, _) = room.apply_timer_reduction(0.15).unwrap();
        assert!(new_deadline >= Instant::now() - Duration::from_millis(50));
    }

    #[test]
    fn test_end_round_claim_is_exclusive() {
        let (mut room, ids) = room_with_players(&["Alice"]);
        room.begin_round(RoundContext::Letter {
            letter: 'B',
            categories: vec!["Stadt".to_string()],
        });
        let seq = room.round_seq();

        room.begin_scoring(seq).unwrap();
        assert!(matches!(
            room.begin_scoring(seq),
            Err(SessionError::StateConflict(_))
        ));

        // A stale trigger from a previous round also loses.
        assert!(matches!(
            room.begin_scoring(seq - 1),
            Err(SessionError::StateConflict(_))
        ));
        let _ = ids;
    }

    #[test]
    fn test_apply_scores_updates_roster() {
        let (mut room, ids) = room_with_players(&["Alice", "Bob"]);
        room.begin_round(RoundContext::Letter {
            letter: 'B',
            categories: vec!["Stadt".to_string()],
        });
        let closure = room.begin_scoring(room.round_seq()).unwrap();

        let mut entries = HashMap::new();
        entries.insert(
            ids[0],
            party_types::ScoreEntry {
                player_id: ids[0],
                category: "Stadt".to_string(),
                submitted_value: Some("Berlin".to_string()),
                is_valid: true,
                is_unique: true,
                points: 20,
            },
        );
        let mut board = ScoreBoard::new();
        board.insert("Stadt".to_string(), entries);

        room.apply_scores(closure.seq, board).unwrap();
        assert_eq!(room.player(ids[0]).unwrap().score, 20);
        assert_eq!(room.player(ids[1]).unwrap().score, 0);
        assert!(!room.scoring_pending());
        assert!(room.last_results().is_some());
    }

    #[test]
    fn test_advance_is_host_gated_and_resets_lobby() {
        let (mut room, ids) = room_with_players(&["Alice", "Bob"]);
        room.set_ready(ids[1], true).unwrap();
        room.begin_round(RoundContext::Letter {
            letter: 'B',
            categories: vec!["Stadt".to_string()],
        });
        let closure = room.begin_scoring(room.round_seq()).unwrap();
        room.apply_scores(closure.seq, ScoreBoard::new()).unwrap();

        assert!(matches!(
            room.advance(ids[1], false),
            Err(SessionError::NotAuthorized(_))
        ));
        assert_eq!(room.advance(ids[0], false).unwrap(), AdvanceOutcome::Lobby);
        assert_eq!(room.phase, Phase::Waiting);
        assert_eq!(room.ready_count(), 0);

        // Nothing to advance from once back in the lobby.
        assert!(matches!(
            room.advance(ids[0], false),
            Err(SessionError::StateConflict(_))
        ));
    }

    #[test]
    fn test_advance_terminal_finishes_game() {
        let (mut room, ids) = room_with_players(&["Alice"]);
        room.begin_round(RoundContext::Letter {
            letter: 'B',
            categories: vec!["Stadt".to_string()],
        });
        let closure = room.begin_scoring(room.round_seq()).unwrap();
        room.apply_scores(closure.seq, ScoreBoard::new()).unwrap();
        assert_eq!(
            room.advance(ids[0], true).unwrap(),
            AdvanceOutcome::Finished
        );
        assert_eq!(room.phase, Phase::Finished);
        assert!(matches!(
            room.add_player("Late"),
            Err(SessionError::StateConflict(_))
        ));
    }

    #[test]
    fn test_host_removal_promotes_by_insertion_order() {
        let (mut room, ids) = room_with_players(&["Alice", "Bob", "Carol"]);
        let removal = room.remove_player(ids[0]).unwrap();
        let new_host = removal.new_host.expect("succession expected");
        assert_eq!(new_host.id, ids[1]);
        assert_eq!(room.host_id(), Some(ids[1]));
        assert_eq!(room.players().iter().filter(|p| p.is_host).count(), 1);
        assert!(!removal.room_empty);
    }

    #[test]
    fn test_non_host_removal_keeps_host() {
        let (mut room, ids) = room_with_players(&["Alice", "Bob"]);
        let removal = room.remove_player(ids[1]).unwrap();
        assert!(removal.new_host.is_none());
        assert_eq!(room.host_id(), Some(ids[0]));
    }

    #[test]
    fn test_last_leave_reports_empty_room() {
        let (mut room, ids) = room_with_players(&["Alice"]);
        let removal = room.remove_player(ids[0]).unwrap();
        assert!(removal.room_empty);
        assert!(removal.new_host.is_none());
    }

    #[test]
    fn test_mid_round_departure_completes_round() {
        let (mut room, ids) = room_with_players(&["Alice", "Bob", "Carol"]);
        room.begin_round(RoundContext::Letter {
            letter: 'B',
            categories: vec!["Stadt".to_string()],
        });
        room.record_answer(ids[0], letter_answer(&[("Stadt", "Berlin")]))
            .unwrap();
        room.record_answer(ids[1], letter_answer(&[("Stadt", "Bonn")]))
            .unwrap();

        let removal = room.remove_player(ids[2]).unwrap();
        assert!(removal.all_answered_now);

        // The dropped player's (absent) sheet no longer blocks scoring.
        let closure = room.begin_scoring(room.round_seq()).unwrap();
        assert_eq!(closure.answers.len(), 2);
    }

    #[test]
    fn test_snapshot_redacts_quiz_answers() {
        let mut room = Room::new(
            "QZ99".to_string(),
            GameMode::Quiz {
                title: "Arithmetic".to_string(),
                questions: vec![Question {
                    text: "2+2?".to_string(),
                    options: vec!["3".to_string(), "4".to_string()],
                    correct_index: 1,
                }],
            },
            RoomConfig {
                time_limit: Duration::from_secs(30),
                max_players: 8,
            },
        );
        room.add_player("Alice").unwrap();
        let question = match &room.mode {
            GameMode::Quiz { questions, .. } => questions[0].clone(),
            GameMode::Letter { .. } => unreachable!(),
        };
        room.begin_round(RoundContext::Question { index: 0, question });

        let snapshot = room.snapshot();
        assert_eq!(snapshot.config.question_count, Some(1));
        match snapshot.round {
            Some(RoundSnapshot::Question { question, total, .. }) => {
                assert_eq!(total, 1);
                assert_eq!(question.options.len(), 2);
            }
            other => panic!("unexpected round snapshot {other:?}"),
        }
        assert_eq!(room.next_question(), 1);
    }

    #[test]
    fn test_room_codes_use_safe_alphabet() {
        for _ in 0..50 {
            let code = generate_room_code();
            assert_eq!(code.len(), ROOM_CODE_LENGTH);
            assert!(code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b)));
        }
    }
}
