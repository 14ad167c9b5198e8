use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use party_core::{
    AdvanceOutcome, GameMode, Room, RoomConfig, RoomId, RoomStore, RoundClosure, RoundContext,
    SemanticVerdicts, SessionError, SubmittedAnswer, default_categories, generate_room_code,
    rules_for,
};
use party_persistence::HighscoreRepository;
use party_types::{Player, PlayerId, QuizDefinition, RoomSnapshot, ServerMessage};

use crate::config::Config;
use crate::validation::{AnswerValidator, collect_verdicts};
use crate::websocket::connection::{ConnectionId, ConnectionManager};

/// Work order for the caller after a round gained a deadline: spawn a
/// sleep task for it and register the handle. Keeping the spawning on the
/// caller's side means the manager never schedules onto itself.
#[derive(Debug, Clone)]
pub struct DeadlineTicket {
    pub room_id: RoomId,
    pub seq: u64,
    pub deadline: Instant,
}

/// What the caller must still do after a submission was recorded.
#[derive(Debug, Clone)]
pub enum SubmitEffect {
    None,
    /// The first answer shortened the round; rearm the deadline timer.
    Reschedule(DeadlineTicket),
    /// Everyone has answered; close the round out of line.
    EndRound { room_id: RoomId, seq: u64 },
}

struct RoundTimer {
    seq: u64,
    handle: JoinHandle<()>,
}

/// Owns the room store and serializes every room mutation through its
/// write lock. Broadcasts are pushed while the lock is held, so each
/// room's clients observe events in mutation order.
pub struct RoomManager {
    store: RwLock<RoomStore>,
    timers: RwLock<HashMap<RoomId, RoundTimer>>,
    connection_manager: Arc<ConnectionManager>,
    validator: Arc<dyn AnswerValidator>,
    highscores: Arc<HighscoreRepository>,
    default_time_limit: Duration,
    max_players: usize,
    validation_ceiling: Duration,
}

impl RoomManager {
    pub fn new(
        store: RoomStore,
        connection_manager: Arc<ConnectionManager>,
        validator: Arc<dyn AnswerValidator>,
        highscores: Arc<HighscoreRepository>,
        config: &Config,
    ) -> Self {
        Self {
            store: RwLock::new(store),
            timers: RwLock::new(HashMap::new()),
            connection_manager,
            validator,
            highscores,
            default_time_limit: Duration::from_secs(config.default_time_limit_seconds),
            max_players: config.max_players_per_room,
            validation_ceiling: Duration::from_secs(config.validator_timeout_seconds),
        }
    }

    /// Join the given room, creating a letter-game room when the id is
    /// unknown or absent. The joiner gets a personal ack, everyone else a
    /// player-joined broadcast.
    pub async fn join_room(
        &self,
        connection_id: ConnectionId,
        room_id: Option<String>,
        player_name: &str,
        time_limit: Option<u64>,
    ) -> Result<Player, SessionError> {
        let name = player_name.trim();
        if name.is_empty() {
            return Err(SessionError::Validation(
                "playerName must not be empty".to_string(),
            ));
        }
        if let Some(limit) = time_limit {
            if limit == 0 || limit > 600 {
                return Err(SessionError::Validation(
                    "timeLimit must be between 1 and 600 seconds".to_string(),
                ));
            }
        }

        self.release_previous_seat(connection_id).await;

        let mut store = self.store.write().await;
        let target = match room_id
            .map(|id| id.trim().to_uppercase())
            .filter(|id| !id.is_empty())
        {
            Some(id) if store.contains(&id) => id,
            Some(id) => {
                store.insert(self.new_letter_room(id.clone(), time_limit))?;
                info!("Created room {}", id);
                id
            }
            None => {
                let id = unused_room_code(&store);
                store.insert(self.new_letter_room(id.clone(), time_limit))?;
                info!("Created room {}", id);
                id
            }
        };

        let room = store.get_mut(&target)?;
        let player = room.add_player(name)?;
        let snapshot = room.snapshot();
        self.connection_manager
            .bind_to_room(connection_id, target.clone(), player.id)
            .await;
        let _ = self
            .connection_manager
            .send_to_connection(
                connection_id,
                ServerMessage::Joined {
                    player: player.clone(),
                    room: snapshot.clone(),
                },
            )
            .await;
        self.connection_manager
            .send_to_room_except(
                &target,
                connection_id,
                ServerMessage::PlayerJoined {
                    player: player.clone(),
                    room: snapshot,
                },
            )
            .await;
        info!(
            "Player {} joined room {} ({} players)",
            player.display_name,
            target,
            room.players().len()
        );
        Ok(player)
    }

    /// Create a quiz room seeded with the given quiz; the creator joins
    /// as host.
    pub async fn create_quiz_room(
        &self,
        connection_id: ConnectionId,
        quiz: &QuizDefinition,
        player_name: &str,
    ) -> Result<Player, SessionError> {
        let name = player_name.trim();
        if name.is_empty() {
            return Err(SessionError::Validation(
                "playerName must not be empty".to_string(),
            ));
        }

        self.release_previous_seat(connection_id).await;

        let mut store = self.store.write().await;
        let room_id = unused_room_code(&store);
        let mut room = Room::new(
            room_id.clone(),
            GameMode::Quiz {
                title: quiz.title.clone(),
                questions: quiz.questions.clone(),
            },
            RoomConfig {
                time_limit: self.default_time_limit,
                max_players: self.max_players,
            },
        );
        let player = room.add_player(name)?;
        let snapshot = room.snapshot();
        store.insert(room)?;
        self.connection_manager
            .bind_to_room(connection_id, room_id.clone(), player.id)
            .await;
        let _ = self
            .connection_manager
            .send_to_connection(
                connection_id,
                ServerMessage::Joined {
                    player: player.clone(),
                    room: snapshot,
                },
            )
            .await;
        info!("Created quiz room {} for quiz {}", room_id, quiz.title);
        Ok(player)
    }

    pub async fn set_ready(
        &self,
        connection_id: ConnectionId,
        is_ready: bool,
    ) -> Result<(), SessionError> {
        let (room_id, player_id) = self.require_binding(connection_id).await?;

        let mut store = self.store.write().await;
        let room = store.get_mut(&room_id)?;
        room.set_ready(player_id, is_ready)?;
        self.connection_manager
            .send_to_room(&room_id, ServerMessage::SessionUpdate { room: room.snapshot() })
            .await;
        Ok(())
    }

    /// Start a round when the requester is host or the ready quorum is
    /// met. Returns the deadline ticket for the round timer.
    pub async fn start_round(
        &self,
        connection_id: ConnectionId,
    ) -> Result<Option<DeadlineTicket>, SessionError> {
        let (room_id, player_id) = self.require_binding(connection_id).await?;

        let mut store = self.store.write().await;
        let room = store.get_mut(&room_id)?;
        room.can_start(player_id)?;
        let rules = rules_for(&room.mode);
        let context = rules.generate_round(room)?;
        room.begin_round(context);

        if let Some(round) = room.round_snapshot() {
            self.connection_manager
                .send_to_room(&room_id, ServerMessage::RoundStarted { round })
                .await;
        }
        info!("Round {} started in room {}", room.round_seq(), room_id);
        Ok(room.deadline().map(|deadline| DeadlineTicket {
            room_id: room_id.clone(),
            seq: room.round_seq(),
            deadline,
        }))
    }

    /// Record an answer. First write per player wins; the round's first
    /// answer may shorten the deadline; the last missing answer ends the
    /// round.
    pub async fn submit_answer(
        &self,
        connection_id: ConnectionId,
        answer: SubmittedAnswer,
    ) -> Result<SubmitEffect, SessionError> {
        let (room_id, player_id) = self.require_binding(connection_id).await?;

        let mut store = self.store.write().await;
        let room = store.get_mut(&room_id)?;
        let outcome = room.record_answer(player_id, answer)?;
        if !outcome.accepted {
            debug!(
                "Dropped repeat answer from {} in room {}",
                player_id, room_id
            );
            return Ok(SubmitEffect::None);
        }

        let mut effect = SubmitEffect::None;
        let rules = rules_for(&room.mode);
        if outcome.first_in_round {
            if let Some(cut) = rules.first_answer_time_cut() {
                if let Some((deadline, ends_at)) = room.apply_timer_reduction(cut) {
                    self.connection_manager
                        .send_to_room(
                            &room_id,
                            ServerMessage::TimerReduced {
                                ends_at: ends_at.to_rfc3339(),
                            },
                        )
                        .await;
                    effect = SubmitEffect::Reschedule(DeadlineTicket {
                        room_id: room_id.clone(),
                        seq: room.round_seq(),
                        deadline,
                    });
                }
            }
        }

        self.connection_manager
            .send_to_room(&room_id, ServerMessage::SessionUpdate { room: room.snapshot() })
            .await;

        if outcome.all_answered {
            effect = SubmitEffect::EndRound {
                room_id: room_id.clone(),
                seq: room.round_seq(),
            };
        }
        Ok(effect)
    }

    /// Entry point for fired deadline timers. Stale firings lose the
    /// scoring claim and fall through as logged no-ops.
    pub async fn handle_deadline(&self, room_id: &str, seq: u64) {
        debug!("Deadline elapsed for round {} in room {}", seq, room_id);
        self.end_round(room_id, seq).await;
    }

    /// Close a round at most once: claim it under the lock, fetch external
    /// verdicts with no lock held, then re-check and apply.
    pub async fn end_round(&self, room_id: &str, seq: u64) {
        let (closure, rules) = {
            let mut store = self.store.write().await;
            let room = match store.get_mut(room_id) {
                Ok(room) => room,
                Err(_) => {
                    debug!("Round {} ended for missing room {}", seq, room_id);
                    return;
                }
            };
            match room.begin_scoring(seq) {
                Ok(closure) => (closure, rules_for(&room.mode)),
                Err(e) => {
                    debug!("End-round trigger for room {} lost the race: {}", room_id, e);
                    return;
                }
            }
        };
        self.clear_round_timer(room_id, seq).await;

        let verdicts = if rules.uses_external_validation() {
            self.fetch_verdicts(&closure).await
        } else {
            SemanticVerdicts::default()
        };

        let mut store = self.store.write().await;
        let room = match store.get_mut(room_id) {
            Ok(room) => room,
            Err(_) => {
                debug!("Room {} disappeared while round {} was scored", room_id, seq);
                return;
            }
        };
        let board = rules.score_round(&closure.context, &closure.answers, room.players(), &verdicts);
        if let Err(e) = room.apply_scores(seq, board.clone()) {
            debug!("Discarding scores for room {}: {}", room_id, e);
            return;
        }
        self.connection_manager
            .send_to_room(
                room_id,
                ServerMessage::RoundResults {
                    results: board,
                    players: room.players().to_vec(),
                    degraded: verdicts.is_degraded(),
                },
            )
            .await;
        info!(
            "Round {} in room {} scored{}",
            seq,
            room_id,
            if verdicts.is_degraded() { " (degraded)" } else { "" }
        );
    }

    /// Host-gated advance out of round results: back to the lobby for the
    /// letter game, straight into the next question or the final scores
    /// for the quiz.
    pub async fn next_round(
        &self,
        connection_id: ConnectionId,
    ) -> Result<Option<DeadlineTicket>, SessionError> {
        let (room_id, player_id) = self.require_binding(connection_id).await?;

        let mut finished: Option<(String, Vec<Player>)> = None;
        let ticket = {
            let mut store = self.store.write().await;
            let room = store.get_mut(&room_id)?;
            let rules = rules_for(&room.mode);
            let terminal = rules.is_terminal(room);
            match room.advance(player_id, terminal)? {
                AdvanceOutcome::Finished => {
                    let mut final_scores = room.players().to_vec();
                    final_scores.sort_by(|a, b| b.score.cmp(&a.score));
                    let winner = final_scores.first().cloned();
                    self.connection_manager
                        .send_to_room(
                            &room_id,
                            ServerMessage::GameFinished {
                                final_scores: final_scores.clone(),
                                winner,
                            },
                        )
                        .await;
                    if let GameMode::Quiz { title, .. } = &room.mode {
                        finished = Some((title.clone(), final_scores));
                    }
                    info!("Game finished in room {}", room_id);
                    None
                }
                AdvanceOutcome::Lobby if rules.advances_immediately() => {
                    let context = rules.generate_round(room)?;
                    room.begin_round(context);
                    if let Some(round) = room.round_snapshot() {
                        self.connection_manager
                            .send_to_room(&room_id, ServerMessage::RoundStarted { round })
                            .await;
                    }
                    room.deadline().map(|deadline| DeadlineTicket {
                        room_id: room_id.clone(),
                        seq: room.round_seq(),
                        deadline,
                    })
                }
                AdvanceOutcome::Lobby => {
                    self.connection_manager
                        .send_to_room(&room_id, ServerMessage::SessionUpdate { room: room.snapshot() })
                        .await;
                    None
                }
            }
        };

        if let Some((title, scores)) = finished {
            if let Err(e) = self.highscores.record_final_scores(&title, &scores).await {
                warn!("Failed to record highscores for room {}: {}", room_id, e);
            }
        }
        Ok(ticket)
    }

    /// Leave on explicit request. Leaving while in no room is a no-op.
    pub async fn leave_room(&self, connection_id: ConnectionId) {
        if let Some((room_id, player_id)) = self.connection_manager.get_binding(connection_id).await
        {
            self.connection_manager.clear_binding(connection_id).await;
            self.remove_from_room(&room_id, player_id).await;
        }
    }

    /// A closed socket removes its player immediately; there is no
    /// reconnect token that could reclaim the seat.
    pub async fn handle_disconnect(&self, connection_id: ConnectionId) {
        if let Some((room_id, player_id)) = self
            .connection_manager
            .remove_connection(connection_id)
            .await
        {
            self.remove_from_room(&room_id, player_id).await;
        }
    }

    /// Remove a player in any phase: host succession with a single
    /// host-change broadcast, teardown when the room empties, and an early
    /// round end when the departure completes the answer set.
    async fn remove_from_room(&self, room_id: &str, player_id: PlayerId) {
        let mut end_seq = None;
        let mut torn_down = false;
        {
            let mut store = self.store.write().await;
            let room = match store.get_mut(room_id) {
                Ok(room) => room,
                Err(_) => return,
            };
            let removal = match room.remove_player(player_id) {
                Ok(removal) => removal,
                Err(e) => {
                    debug!("Removing {} from room {}: {}", player_id, room_id, e);
                    return;
                }
            };
            info!(
                "Player {} left room {}",
                removal.removed.display_name, room_id
            );

            if removal.room_empty {
                store.remove(room_id);
                info!("Room {} is empty, tearing it down", room_id);
                torn_down = true;
            } else {
                if removal.all_answered_now {
                    end_seq = Some(room.round_seq());
                }
                self.connection_manager
                    .send_to_room(
                        room_id,
                        ServerMessage::PlayerLeft {
                            player_id,
                            player_name: removal.removed.display_name.clone(),
                            room: room.snapshot(),
                        },
                    )
                    .await;
                if let Some(new_host) = removal.new_host {
                    info!(
                        "Player {} now hosts room {}",
                        new_host.display_name, room_id
                    );
                    self.connection_manager
                        .send_to_room(
                            room_id,
                            ServerMessage::HostChanged {
                                host_id: new_host.id,
                                host_name: new_host.display_name,
                            },
                        )
                        .await;
                }
            }
        }

        if torn_down {
            self.teardown_room(room_id).await;
        }
        if let Some(seq) = end_seq {
            self.end_round(room_id, seq).await;
        }
    }

    /// Track the sleep task for a round's deadline. A replaced entry is a
    /// stale sleeper and gets aborted.
    pub async fn register_round_timer(&self, room_id: RoomId, seq: u64, handle: JoinHandle<()>) {
        let mut timers = self.timers.write().await;
        if let Some(old) = timers.insert(room_id, RoundTimer { seq, handle }) {
            old.handle.abort();
        }
    }

    /// Drop the timer entry for a settled round without aborting: the
    /// handle may be the task running this very call, and a sleeper that
    /// fires anyway loses the scoring claim.
    async fn clear_round_timer(&self, room_id: &str, seq: u64) {
        let mut timers = self.timers.write().await;
        if timers.get(room_id).is_some_and(|timer| timer.seq == seq) {
            timers.remove(room_id);
        }
    }

    async fn teardown_room(&self, room_id: &str) {
        {
            let mut timers = self.timers.write().await;
            if let Some(timer) = timers.remove(room_id) {
                timer.handle.abort();
            }
        }
        self.connection_manager.clear_room(room_id).await;
    }

    /// Disconnect connections that went quiet, releasing their room seats.
    pub async fn cleanup_stale_connections(&self, timeout: Duration) {
        let stale = self.connection_manager.inactive_connections(timeout).await;
        for connection_id in stale {
            info!("Removing inactive connection: {}", connection_id);
            self.handle_disconnect(connection_id).await;
        }
    }

    pub async fn cleanup_idle_rooms(&self, max_idle: Duration) {
        let idle = {
            let store = self.store.read().await;
            store.idle_room_ids(max_idle)
        };

        for room_id in idle {
            {
                let mut store = self.store.write().await;
                // Re-check under the write lock; the room may have woken up.
                if !store
                    .get(&room_id)
                    .is_ok_and(|room| room.idle_for() > max_idle)
                {
                    continue;
                }
                store.remove(&room_id);
            }
            info!("Removed idle room {}", room_id);
            self.teardown_room(&room_id).await;
        }
    }

    pub async fn room_snapshot(&self, room_id: &str) -> Option<RoomSnapshot> {
        let store = self.store.read().await;
        store.get(room_id).ok().map(|room| room.snapshot())
    }

    pub async fn room_count(&self) -> usize {
        let store = self.store.read().await;
        store.len()
    }

    /// Run every answer sheet past the validator concurrently, under the
    /// overall ceiling and with no room lock held. Any failure degrades
    /// instead of blocking the round.
    async fn fetch_verdicts(&self, closure: &RoundClosure) -> SemanticVerdicts {
        let (letter, categories) = match &closure.context {
            RoundContext::Letter { letter, categories } => (*letter, categories.clone()),
            RoundContext::Question { .. } => return SemanticVerdicts::default(),
        };

        let validator = &self.validator;
        let checks = closure.answers.iter().filter_map(|(player_id, answer)| {
            let sheet = match answer {
                SubmittedAnswer::Categories(sheet) => sheet,
                SubmittedAnswer::Choice(_) => return None,
            };
            let player_id = *player_id;
            Some(async move { (player_id, validator.validate(letter, sheet).await) })
        });

        match tokio::time::timeout(self.validation_ceiling, join_all(checks)).await {
            Ok(sheets) => collect_verdicts(sheets, &categories),
            Err(_) => {
                warn!(
                    "Validator exceeded the {}s ceiling, scoring degraded",
                    self.validation_ceiling.as_secs()
                );
                SemanticVerdicts::degraded()
            }
        }
    }

    async fn require_binding(
        &self,
        connection_id: ConnectionId,
    ) -> Result<(RoomId, PlayerId), SessionError> {
        self.connection_manager
            .get_binding(connection_id)
            .await
            .ok_or_else(|| {
                SessionError::Validation("join a room before sending game commands".to_string())
            })
    }

    /// A connection holds one seat at a time; joining again releases the
    /// previous one first.
    async fn release_previous_seat(&self, connection_id: ConnectionId) {
        if let Some((room_id, player_id)) = self.connection_manager.get_binding(connection_id).await
        {
            self.connection_manager.clear_binding(connection_id).await;
            self.remove_from_room(&room_id, player_id).await;
        }
    }

    fn new_letter_room(&self, id: RoomId, time_limit: Option<u64>) -> Room {
        Room::new(
            id,
            GameMode::Letter {
                categories: default_categories(),
            },
            RoomConfig {
                time_limit: time_limit
                    .map(Duration::from_secs)
                    .unwrap_or(self.default_time_limit),
                max_players: self.max_players,
            },
        )
    }
}

fn unused_room_code(store: &RoomStore) -> RoomId {
    loop {
        let code = generate_room_code();
        if !store.contains(&code) {
            return code;
        }
    }
}
