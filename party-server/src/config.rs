use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_players_per_room: usize,
    pub default_time_limit_seconds: u64,
    pub room_idle_timeout_minutes: u64,
    pub connection_timeout_seconds: u64,
    /// Semantic answer validator endpoint. Unset means rule-only scoring.
    pub validator_url: Option<String>,
    pub validator_poll_interval_ms: u64,
    pub validator_max_polls: u32,
    pub validator_timeout_seconds: u64,
    /// Quiz generation endpoint. Unset means the built-in sample bank.
    pub quizgen_url: Option<String>,
    pub max_quiz_questions: usize,
}

impl Config {
    pub fn new() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("Invalid PORT"),
            max_players_per_room: env::var("MAX_PLAYERS_PER_ROOM")
                .unwrap_or_else(|_| "8".to_string())
                .parse()
                .expect("Invalid MAX_PLAYERS_PER_ROOM"),
            default_time_limit_seconds: env::var("DEFAULT_TIME_LIMIT_SECONDS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .expect("Invalid DEFAULT_TIME_LIMIT_SECONDS"),
            room_idle_timeout_minutes: env::var("ROOM_IDLE_TIMEOUT_MINUTES")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .expect("Invalid ROOM_IDLE_TIMEOUT_MINUTES"),
            connection_timeout_seconds: env::var("CONNECTION_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .expect("Invalid CONNECTION_TIMEOUT_SECONDS"),
            validator_url: env::var("VALIDATOR_URL").ok(),
            validator_poll_interval_ms: env::var("VALIDATOR_POLL_INTERVAL_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .expect("Invalid VALIDATOR_POLL_INTERVAL_MS"),
            validator_max_polls: env::var("VALIDATOR_MAX_POLLS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .expect("Invalid VALIDATOR_MAX_POLLS"),
            validator_timeout_seconds: env::var("VALIDATOR_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "45".to_string())
                .parse()
                .expect("Invalid VALIDATOR_TIMEOUT_SECONDS"),
            quizgen_url: env::var("QUIZGEN_URL").ok(),
            max_quiz_questions: env::var("MAX_QUIZ_QUESTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .expect("Invalid MAX_QUIZ_QUESTIONS"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
