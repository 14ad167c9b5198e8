use std::time::Duration;

use party_core::{GameMode, Room, RoomConfig, SubmittedAnswer};
use party_types::{PlayerId, Question};

/// Creates a letter room with the given categories and a 60s limit.
pub fn create_letter_room(id: &str, categories: &[&str]) -> Room {
    Room::new(
        id.to_string(),
        GameMode::Letter {
            categories: categories.iter().map(|c| c.to_string()).collect(),
        },
        RoomConfig {
            time_limit: Duration::from_secs(60),
            max_players: 8,
        },
    )
}

/// Creates a quiz room with simple numbered questions; option 0 is always
/// correct.
pub fn create_quiz_room(id: &str, question_count: usize) -> Room {
    let questions = (0..question_count)
        .map(|i| Question {
            text: format!("Question {i}"),
            options: vec!["right".to_string(), "wrong".to_string()],
            correct_index: 0,
        })
        .collect();
    Room::new(
        id.to_string(),
        GameMode::Quiz {
            title: format!("Quiz {id}"),
            questions,
        },
        RoomConfig {
            time_limit: Duration::from_secs(30),
            max_players: 8,
        },
    )
}

/// Adds players and returns their ids in join order.
pub fn join_players(room: &mut Room, names: &[&str]) -> Vec<PlayerId> {
    names
        .iter()
        .map(|name| room.add_player(name).expect("join failed").id)
        .collect()
}

pub fn category_sheet(pairs: &[(&str, &str)]) -> SubmittedAnswer {
    SubmittedAnswer::Categories(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

pub fn choice(index: usize) -> SubmittedAnswer {
    SubmittedAnswer::Choice(index)
}

/// Total points a player earned on a scored board.
pub fn points_for(board: &party_types::ScoreBoard, player_id: PlayerId) -> u32 {
    board
        .values()
        .filter_map(|entries| entries.get(&player_id))
        .map(|entry| entry.points)
        .sum()
}
