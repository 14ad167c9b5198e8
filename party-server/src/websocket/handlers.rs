use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use party_core::{SessionError, SubmittedAnswer};
use party_types::{ClientMessage, QuizView, ServerMessage};

use crate::quiz::QuizService;
use crate::room_manager::{DeadlineTicket, RoomManager, SubmitEffect};
use crate::websocket::connection::{ConnectionId, ConnectionManager};

#[derive(Clone)]
pub struct MessageHandler {
    connection_id: ConnectionId,
    connection_manager: Arc<ConnectionManager>,
    room_manager: Arc<RoomManager>,
    quiz_service: Arc<QuizService>,
}

impl MessageHandler {
    pub fn new(
        connection_id: ConnectionId,
        connection_manager: Arc<ConnectionManager>,
        room_manager: Arc<RoomManager>,
        quiz_service: Arc<QuizService>,
    ) -> Self {
        Self {
            connection_id,
            connection_manager,
            room_manager,
            quiz_service,
        }
    }

    pub async fn handle_message(&self, message: ClientMessage) {
        // Any parseable message counts as activity
        self.connection_manager
            .update_activity(self.connection_id)
            .await;

        let result = match message {
            ClientMessage::JoinRoom {
                room_id,
                player_name,
                time_limit,
            } => self.handle_join(room_id, player_name, time_limit).await,
            ClientMessage::PlayerReady { is_ready } => {
                self.room_manager
                    .set_ready(self.connection_id, is_ready)
                    .await
            }
            ClientMessage::StartRound => self.handle_start_round().await,
            ClientMessage::SubmitAnswer {
                answer_index,
                answers,
            } => self.handle_submit_answer(answer_index, answers).await,
            ClientMessage::NextRound => self.handle_next_round().await,
            ClientMessage::LeaveRoom => {
                info!("Connection {} leaving its room", self.connection_id);
                self.room_manager.leave_room(self.connection_id).await;
                Ok(())
            }
            ClientMessage::CreateQuiz {
                topic,
                question_count,
                title,
            } => self.handle_create_quiz(topic, question_count, title).await,
            ClientMessage::CreateTournament {
                topic,
                question_count,
                title,
                player_name,
            } => {
                self.handle_create_tournament(topic, question_count, title, player_name)
                    .await
            }
            ClientMessage::GetQuiz { quiz_id } => self.handle_get_quiz(quiz_id).await,
            ClientMessage::Heartbeat => Ok(()),
        };

        if let Err(e) = result {
            self.report_error(e).await;
        }
    }

    pub async fn handle_disconnect(&self) {
        info!("Handling disconnect for connection {}", self.connection_id);
        self.room_manager.handle_disconnect(self.connection_id).await;
    }

    async fn handle_join(
        &self,
        room_id: Option<String>,
        player_name: String,
        time_limit: Option<u64>,
    ) -> Result<(), SessionError> {
        info!(
            "Connection {} joining room {}",
            self.connection_id,
            room_id.as_deref().unwrap_or("<new>")
        );
        self.room_manager
            .join_room(self.connection_id, room_id, &player_name, time_limit)
            .await?;
        Ok(())
    }

    async fn handle_start_round(&self) -> Result<(), SessionError> {
        if let Some(ticket) = self.room_manager.start_round(self.connection_id).await? {
            self.arm_deadline(ticket).await;
        }
        Ok(())
    }

    async fn handle_submit_answer(
        &self,
        answer_index: Option<usize>,
        answers: Option<HashMap<String, String>>,
    ) -> Result<(), SessionError> {
        let answer = match (answer_index, answers) {
            (Some(index), None) => SubmittedAnswer::Choice(index),
            (None, Some(sheet)) => SubmittedAnswer::Categories(sheet),
            _ => {
                return Err(SessionError::Validation(
                    "submit either answerIndex or answers".to_string(),
                ));
            }
        };

        match self
            .room_manager
            .submit_answer(self.connection_id, answer)
            .await?
        {
            SubmitEffect::Reschedule(ticket) => self.arm_deadline(ticket).await,
            SubmitEffect::EndRound { room_id, seq } => {
                // Close the round off the socket loop so a slow validator
                // never stalls this client's inbound messages.
                let manager = Arc::clone(&self.room_manager);
                tokio::spawn(async move {
                    manager.end_round(&room_id, seq).await;
                });
            }
            SubmitEffect::None => {}
        }
        Ok(())
    }

    async fn handle_next_round(&self) -> Result<(), SessionError> {
        if let Some(ticket) = self.room_manager.next_round(self.connection_id).await? {
            self.arm_deadline(ticket).await;
        }
        Ok(())
    }

    async fn handle_create_quiz(
        &self,
        topic: String,
        question_count: usize,
        title: Option<String>,
    ) -> Result<(), SessionError> {
        info!(
            "Connection {} creating a quiz about {}",
            self.connection_id, topic
        );
        let quiz = self
            .quiz_service
            .create_quiz(&topic, question_count, title)
            .await?;
        let _ = self
            .connection_manager
            .send_to_connection(
                self.connection_id,
                ServerMessage::QuizCreated {
                    quiz: QuizView::from(&quiz),
                },
            )
            .await;
        Ok(())
    }

    async fn handle_create_tournament(
        &self,
        topic: String,
        question_count: usize,
        title: Option<String>,
        player_name: String,
    ) -> Result<(), SessionError> {
        info!(
            "Connection {} creating a tournament about {}",
            self.connection_id, topic
        );
        let quiz = self
            .quiz_service
            .create_quiz(&topic, question_count, title)
            .await?;
        let _ = self
            .connection_manager
            .send_to_connection(
                self.connection_id,
                ServerMessage::QuizCreated {
                    quiz: QuizView::from(&quiz),
                },
            )
            .await;
        self.room_manager
            .create_quiz_room(self.connection_id, &quiz, &player_name)
            .await?;
        Ok(())
    }

    async fn handle_get_quiz(&self, quiz_id: String) -> Result<(), SessionError> {
        let quiz = self.quiz_service.get_quiz(&quiz_id).await?;
        let _ = self
            .connection_manager
            .send_to_connection(
                self.connection_id,
                ServerMessage::QuizData {
                    quiz: QuizView::from(&quiz),
                },
            )
            .await;
        Ok(())
    }

    /// Rejections reach the offending client; state conflicts are logged
    /// no-ops and stay server-side.
    async fn report_error(&self, error: SessionError) {
        if error.is_silent() {
            debug!(
                "Ignored command on connection {}: {}",
                self.connection_id, error
            );
            return;
        }
        warn!(
            "Rejected command on connection {}: {}",
            self.connection_id, error
        );
        let _ = self
            .connection_manager
            .send_to_connection(
                self.connection_id,
                ServerMessage::Error {
                    message: error.to_string(),
                },
            )
            .await;
    }

    /// Spawn the sleep task for a round deadline and register its handle
    /// so an early round end or a reschedule can replace it.
    async fn arm_deadline(&self, ticket: DeadlineTicket) {
        let manager = Arc::clone(&self.room_manager);
        let room_id = ticket.room_id.clone();
        let seq = ticket.seq;
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(tokio::time::Instant::from_std(ticket.deadline)).await;
            manager.handle_deadline(&ticket.room_id, ticket.seq).await;
        });
        self.room_manager
            .register_round_timer(room_id, seq, handle)
            .await;
    }
}
