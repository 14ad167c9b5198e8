use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

use party_core::store::RoomStore;
use party_persistence::repositories::{HighscoreRepository, QuizRepository};
use party_persistence::store::MemoryStore;
use party_server::{
    config::Config,
    create_routes,
    quiz::{HttpQuizSource, QuizService, QuizSource, SampleQuizSource},
    room_manager::RoomManager,
    validation::{AnswerValidator, HttpValidator, RuleOnlyValidator},
    websocket::ConnectionManager,
};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting party game server...");

    // Initialize application state
    let config = Config::new();
    let connection_manager = Arc::new(ConnectionManager::new());

    let documents = Arc::new(MemoryStore::new());
    let quiz_repository = Arc::new(QuizRepository::new(documents.clone()));
    let highscores = Arc::new(HighscoreRepository::new(documents));

    // Semantic checks need an external validator; without one, rounds are
    // scored on format rules alone.
    let validator: Arc<dyn AnswerValidator> = match &config.validator_url {
        Some(url) => {
            info!("Using answer validator at {}", url);
            Arc::new(HttpValidator::new(
                url.clone(),
                Duration::from_millis(config.validator_poll_interval_ms),
                config.validator_max_polls,
            ))
        }
        None => {
            info!("VALIDATOR_URL not set - answers are checked by format rules only");
            Arc::new(RuleOnlyValidator)
        }
    };

    let quiz_source: Arc<dyn QuizSource> = match &config.quizgen_url {
        Some(url) => {
            info!("Using quiz generator at {}", url);
            Arc::new(HttpQuizSource::new(
                url.clone(),
                Duration::from_secs(config.validator_timeout_seconds),
            ))
        }
        None => {
            info!("QUIZGEN_URL not set - serving quizzes from the built-in sample bank");
            Arc::new(SampleQuizSource)
        }
    };

    let room_manager = Arc::new(RoomManager::new(
        RoomStore::new(),
        connection_manager.clone(),
        validator,
        highscores.clone(),
        &config,
    ));
    let quiz_service = Arc::new(QuizService::new(
        quiz_source,
        quiz_repository,
        config.max_quiz_questions,
    ));

    let routes = create_routes(
        connection_manager.clone(),
        room_manager.clone(),
        quiz_service,
        highscores,
    );

    // Start cleanup task
    let cleanup_room_manager = room_manager.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));
        loop {
            interval.tick().await;
            let connection_timeout = Duration::from_secs(config.connection_timeout_seconds);
            let room_timeout = Duration::from_secs(config.room_idle_timeout_minutes * 60);

            cleanup_room_manager
                .cleanup_stale_connections(connection_timeout)
                .await;
            cleanup_room_manager.cleanup_idle_rooms(room_timeout).await;
        }
    });

    info!("Server starting on {}:{}", config.host, config.port);

    let addr = (
        config.host.parse::<std::net::IpAddr>().unwrap(),
        config.port,
    );

    let (addr, server) = warp::serve(routes).bind_with_graceful_shutdown(addr, async {
        // Wait for SIGINT (Ctrl+C) or SIGTERM
        #[cfg(unix)]
        {
            let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt()).unwrap();
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate()).unwrap();

            tokio::select! {
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully...");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            signal::ctrl_c().await.expect("Failed to listen for ctrl+c");
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    });

    info!(
        "Server started successfully on {}. Press Ctrl+C to stop.",
        addr
    );
    server.await;
    info!("Server shutdown complete.");
}
