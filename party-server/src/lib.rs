use serde::Deserialize;
use std::sync::Arc;
use warp::Filter;

use crate::quiz::QuizService;
use crate::room_manager::RoomManager;
use crate::websocket::ConnectionManager;
use party_persistence::repositories::HighscoreRepository;

#[derive(Deserialize)]
struct HighscoreQuery {
    limit: Option<usize>,
}

pub mod config;
pub mod quiz;
pub mod room_manager;
pub mod validation;
pub mod websocket;

pub fn create_routes(
    connection_manager: Arc<ConnectionManager>,
    room_manager: Arc<RoomManager>,
    quiz_service: Arc<QuizService>,
    highscores: Arc<HighscoreRepository>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    // Clone for filters
    let connection_manager_filter = warp::any().map({
        let connection_manager = connection_manager.clone();
        move || connection_manager.clone()
    });

    let room_manager_filter = warp::any().map({
        let room_manager = room_manager.clone();
        move || room_manager.clone()
    });

    let quiz_service_filter = warp::any().map({
        let quiz_service = quiz_service.clone();
        move || quiz_service.clone()
    });

    let highscores_filter = warp::any().map({
        let highscores = highscores.clone();
        move || highscores.clone()
    });

    // WebSocket endpoint
    let websocket = warp::path("ws")
        .and(warp::ws())
        .and(connection_manager_filter.clone())
        .and(room_manager_filter.clone())
        .and(quiz_service_filter.clone())
        .map(|ws: warp::ws::Ws, conn_mgr, room_mgr, quiz_svc| {
            ws.on_upgrade(move |socket| {
                websocket::handle_connection(socket, conn_mgr, room_mgr, quiz_svc)
            })
        });

    // Health check endpoint
    let health = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::with_status("OK", warp::http::StatusCode::OK));

    // Highscore endpoint
    let highscores_route = warp::path("highscores")
        .and(warp::get())
        .and(warp::query::<HighscoreQuery>())
        .and(highscores_filter.clone())
        .and_then(handle_highscores_request);

    // CORS configuration
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET", "POST"]);

    websocket
        .or(health)
        .or(highscores_route)
        .with(cors)
        .with(warp::log("party_server"))
}

async fn handle_highscores_request(
    query: HighscoreQuery,
    highscores: Arc<HighscoreRepository>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let limit = query.limit.unwrap_or(10).min(100); // Default 10, max 100

    match highscores.top(limit).await {
        Ok(entries) => Ok(warp::reply::with_status(
            warp::reply::json(&entries),
            warp::http::StatusCode::OK,
        )),
        Err(err) => {
            tracing::error!("Failed to fetch highscores: {}", err);
            Ok(warp::reply::with_status(
                warp::reply::json(&serde_json::json!({
                    "error": "Failed to fetch highscores"
                })),
                warp::http::StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}
