use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::player::{Player, PlayerId};
use crate::quiz::QuizView;
use crate::room::{RoomSnapshot, RoundSnapshot, ScoreBoard};

/// Messages clients send over the WebSocket, discriminated by the JSON
/// `type` field. Canonical names are snake_case; the aliases accept the
/// vocabularies of both original clients (camelCase letter game,
/// snake_case quiz game).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Join the room with the given id, creating it when unknown or absent.
    #[serde(alias = "joinRoom", alias = "join_session", alias = "joinSession")]
    JoinRoom {
        room_id: Option<String>,
        player_name: String,
        /// Round time limit in seconds, only honored by the room creator.
        time_limit: Option<u64>,
    },
    #[serde(alias = "playerReady")]
    PlayerReady { is_ready: bool },
    #[serde(alias = "startRound", alias = "start_quiz", alias = "startQuiz")]
    StartRound,
    #[serde(alias = "submitAnswer", alias = "submit_answers", alias = "submitAnswers")]
    SubmitAnswer {
        /// Quiz mode: index of the chosen option.
        answer_index: Option<usize>,
        /// Letter mode: category -> submitted word.
        answers: Option<HashMap<String, String>>,
    },
    #[serde(
        alias = "nextRound",
        alias = "next_question",
        alias = "nextQuestion",
        alias = "leaveLobby",
        alias = "leave_lobby"
    )]
    NextRound,
    #[serde(alias = "leaveRoom")]
    LeaveRoom,
    #[serde(alias = "createQuiz")]
    CreateQuiz {
        topic: String,
        question_count: usize,
        title: Option<String>,
    },
    #[serde(alias = "createTournament")]
    CreateTournament {
        topic: String,
        question_count: usize,
        title: Option<String>,
        player_name: String,
    },
    #[serde(alias = "getQuiz")]
    GetQuiz { quiz_id: String },
    Heartbeat,
}

/// Messages the server pushes to clients. `Error` only ever goes to the
/// sender that caused it; the rest are room broadcasts or personal acks.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Personal ack after a join, telling the client its assigned player id.
    Joined { player: Player, room: RoomSnapshot },
    SessionUpdate { room: RoomSnapshot },
    PlayerJoined { player: Player, room: RoomSnapshot },
    PlayerLeft {
        player_id: PlayerId,
        player_name: String,
        room: RoomSnapshot,
    },
    HostChanged { host_id: PlayerId, host_name: String },
    RoundStarted { round: RoundSnapshot },
    TimerReduced { ends_at: String },
    RoundResults {
        results: ScoreBoard,
        players: Vec<Player>,
        degraded: bool,
    },
    GameFinished {
        final_scores: Vec<Player>,
        winner: Option<Player>,
    },
    QuizCreated { quiz: QuizView },
    QuizData { quiz: QuizView },
    Error { message: String },
}
