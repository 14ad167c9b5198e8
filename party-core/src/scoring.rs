use std::collections::{HashMap, HashSet};

use party_types::{Player, PlayerId, Question, ScoreBoard, ScoreEntry};

use crate::room::SubmittedAnswer;

pub const UNIQUE_ANSWER_POINTS: u32 = 20;
pub const SHARED_ANSWER_POINTS: u32 = 10;
pub const QUIZ_ANSWER_POINTS: u32 = 100;

/// Outcome of the external semantic checks for one round. Only rejections
/// are stored: a player the validator never reached is accepted wholesale,
/// which is exactly the degraded behavior the rules ask for.
#[derive(Debug, Clone, Default)]
pub struct SemanticVerdicts {
    rejected: HashMap<PlayerId, HashSet<String>>,
    degraded: bool,
}

impl SemanticVerdicts {
    /// No semantic information at all; every answer passes rule-only
    /// scoring and the results are flagged degraded.
    pub fn degraded() -> Self {
        Self {
            rejected: HashMap::new(),
            degraded: true,
        }
    }

    pub fn reject(&mut self, player_id: PlayerId, category: &str) {
        self.rejected
            .entry(player_id)
            .or_default()
            .insert(category.to_string());
    }

    /// Marks this round's verdicts as partially missing (the validator
    /// failed for at least one sheet).
    pub fn mark_degraded(&mut self) {
        self.degraded = true;
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn accepts(&self, player_id: PlayerId, category: &str) -> bool {
        !self
            .rejected
            .get(&player_id)
            .is_some_and(|categories| categories.contains(category))
    }
}

/// Letter-game scoring. An answer is valid when it is non-empty, starts
/// with the round letter (case-insensitive) and passed the semantic check.
/// Valid answers score 20 when unique among that category's valid answers
/// and 10 when two or more players wrote the same word (case-insensitive).
/// Everyone gets an entry for every category, missing sheets included.
pub fn score_letter_round(
    letter: char,
    categories: &[String],
    answers: &HashMap<PlayerId, SubmittedAnswer>,
    players: &[Player],
    verdicts: &SemanticVerdicts,
) -> ScoreBoard {
    let mut board = ScoreBoard::new();

    for category in categories {
        let mut submitted: HashMap<PlayerId, String> = HashMap::new();
        for player in players {
            if let Some(SubmittedAnswer::Categories(sheet)) = answers.get(&player.id) {
                if let Some(value) = sheet.get(category) {
                    let trimmed = value.trim();
                    if !trimmed.is_empty() {
                        submitted.insert(player.id, trimmed.to_string());
                    }
                }
            }
        }

        // Lowercase form of every valid answer, for duplicate grouping.
        let mut valid: HashMap<PlayerId, String> = HashMap::new();
        for (player_id, value) in &submitted {
            let starts_with_letter = value
                .chars()
                .next()
                .map(|c| c.eq_ignore_ascii_case(&letter))
                .unwrap_or(false);
            if starts_with_letter && verdicts.accepts(*player_id, category) {
                valid.insert(*player_id, value.to_lowercase());
            }
        }

        let mut occurrences: HashMap<&String, usize> = HashMap::new();
        for value in valid.values() {
            *occurrences.entry(value).or_insert(0) += 1;
        }

        let mut entries = HashMap::new();
        for player in players {
            let is_valid = valid.contains_key(&player.id);
            let is_unique = is_valid
                && occurrences
                    .get(&valid[&player.id])
                    .copied()
                    .unwrap_or(0)
                    == 1;
            let points = match (is_valid, is_unique) {
                (false, _) => 0,
                (true, true) => UNIQUE_ANSWER_POINTS,
                (true, false) => SHARED_ANSWER_POINTS,
            };
            entries.insert(
                player.id,
                ScoreEntry {
                    player_id: player.id,
                    category: category.clone(),
                    submitted_value: submitted.get(&player.id).cloned(),
                    is_valid,
                    is_unique,
                    points,
                },
            );
        }
        board.insert(category.clone(), entries);
    }

    board
}

/// Quiz scoring: the correct option index is worth a flat 100 points,
/// uniqueness never applies. The board is keyed by the question index.
pub fn score_quiz_round(
    index: usize,
    question: &Question,
    answers: &HashMap<PlayerId, SubmittedAnswer>,
    players: &[Player],
) -> ScoreBoard {
    let key = index.to_string();
    let mut entries = HashMap::new();

    for player in players {
        let choice = match answers.get(&player.id) {
            Some(SubmittedAnswer::Choice(i)) => Some(*i),
            _ => None,
        };
        let submitted_value = choice.map(|i| {
            question
                .options
                .get(i)
                .cloned()
                .unwrap_or_else(|| i.to_string())
        });
        let is_valid = choice == Some(question.correct_index);
        entries.insert(
            player.id,
            ScoreEntry {
                player_id: player.id,
                category: key.clone(),
                submitted_value,
                is_valid,
                is_unique: false,
                points: if is_valid { QUIZ_ANSWER_POINTS } else { 0 },
            },
        );
    }

    let mut board = ScoreBoard::new();
    board.insert(key, entries);
    board
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players(names: &[&str]) -> Vec<Player> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| Player::new(name.to_string(), i == 0))
            .collect()
    }

    fn sheet(pairs: &[(&str, &str)]) -> SubmittedAnswer {
        SubmittedAnswer::Categories(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn categories(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_unique_valid_answer_scores_twenty() {
        let roster = players(&["Alice", "Bob"]);
        let mut answers = HashMap::new();
        answers.insert(roster[0].id, sheet(&[("Stadt", "Berlin")]));
        answers.insert(roster[1].id, sheet(&[("Stadt", "Bonn")]));

        let board = score_letter_round(
            'B',
            &categories(&["Stadt"]),
            &answers,
            &roster,
            &SemanticVerdicts::default(),
        );

        let entry = &board["Stadt"][&roster[0].id];
        assert!(entry.is_valid);
        assert!(entry.is_unique);
        assert_eq!(entry.points, 20);
        assert_eq!(board["Stadt"][&roster[1].id].points, 20);
    }

    #[test]
    fn test_case_insensitive_duplicates_score_ten_each() {
        let roster = players(&["Alice", "Bob", "Carol"]);
        let mut answers = HashMap::new();
        answers.insert(roster[0].id, sheet(&[("Stadt", "Berlin")]));
        answers.insert(roster[1].id, sheet(&[("Stadt", "berlin")]));
        answers.insert(roster[2].id, sheet(&[("Stadt", "Bochum")]));

        let board = score_letter_round(
            'B',
            &categories(&["Stadt"]),
            &answers,
            &roster,
            &SemanticVerdicts::default(),
        );

        assert_eq!(board["Stadt"][&roster[0].id].points, 10);
        assert!(!board["Stadt"][&roster[0].id].is_unique);
        assert_eq!(board["Stadt"][&roster[1].id].points, 10);
        assert_eq!(board["Stadt"][&roster[2].id].points, 20);
    }

    #[test]
    fn test_wrong_letter_and_empty_answers_score_zero() {
        let roster = players(&["Alice", "Bob", "Carol"]);
        let mut answers = HashMap::new();
        answers.insert(roster[0].id, sheet(&[("Stadt", "München")]));
        answers.insert(roster[1].id, sheet(&[("Stadt", "   ")]));
        // Carol never submitted at all.

        let board = score_letter_round(
            'B',
            &categories(&["Stadt"]),
            &answers,
            &roster,
            &SemanticVerdicts::default(),
        );

        for player in &roster {
            let entry = &board["Stadt"][&player.id];
            assert!(!entry.is_valid);
            assert_eq!(entry.points, 0);
        }
        assert_eq!(
            board["Stadt"][&roster[0].id].submitted_value.as_deref(),
            Some("München")
        );
        assert!(board["Stadt"][&roster[1].id].submitted_value.is_none());
        assert!(board["Stadt"][&roster[2].id].submitted_value.is_none());
    }

    #[test]
    fn test_leading_whitespace_is_trimmed_before_letter_check() {
        let roster = players(&["Alice"]);
        let mut answers = HashMap::new();
        answers.insert(roster[0].id, sheet(&[("Stadt", "  Berlin  ")]));

        let board = score_letter_round(
            'B',
            &categories(&["Stadt"]),
            &answers,
            &roster,
            &SemanticVerdicts::default(),
        );

        let entry = &board["Stadt"][&roster[0].id];
        assert!(entry.is_valid);
        assert_eq!(entry.submitted_value.as_deref(), Some("Berlin"));
    }

    #[test]
    fn test_semantic_rejection_invalidates_answer() {
        let roster = players(&["Alice", "Bob"]);
        let mut answers = HashMap::new();
        answers.insert(roster[0].id, sheet(&[("Stadt", "Blubberhausen")]));
        answers.insert(roster[1].id, sheet(&[("Stadt", "Bremen")]));

        let mut verdicts = SemanticVerdicts::default();
        verdicts.reject(roster[0].id, "Stadt");

        let board = score_letter_round('B', &categories(&["Stadt"]), &answers, &roster, &verdicts);
        assert_eq!(board["Stadt"][&roster[0].id].points, 0);
        assert!(!board["Stadt"][&roster[0].id].is_valid);
        assert_eq!(board["Stadt"][&roster[1].id].points, 20);
    }

    #[test]
    fn test_degraded_mode_waives_semantic_check() {
        let roster = players(&["Alice"]);
        let mut answers = HashMap::new();
        answers.insert(roster[0].id, sheet(&[("Stadt", "Bxyzzy")]));

        let verdicts = SemanticVerdicts::degraded();
        assert!(verdicts.is_degraded());

        let board = score_letter_round('B', &categories(&["Stadt"]), &answers, &roster, &verdicts);
        // Letter rule still applies; semantic nonsense passes.
        assert_eq!(board["Stadt"][&roster[0].id].points, 20);
    }

    #[test]
    fn test_rejected_duplicate_leaves_survivor_unique() {
        let roster = players(&["Alice", "Bob"]);
        let mut answers = HashMap::new();
        answers.insert(roster[0].id, sheet(&[("Stadt", "Berlin")]));
        answers.insert(roster[1].id, sheet(&[("Stadt", "berlin")]));

        let mut verdicts = SemanticVerdicts::default();
        verdicts.reject(roster[1].id, "Stadt");

        let board = score_letter_round('B', &categories(&["Stadt"]), &answers, &roster, &verdicts);
        assert_eq!(board["Stadt"][&roster[0].id].points, 20);
        assert!(board["Stadt"][&roster[0].id].is_unique);
        assert_eq!(board["Stadt"][&roster[1].id].points, 0);
    }

    #[test]
    fn test_every_player_and_category_gets_an_entry() {
        let roster = players(&["Alice", "Bob", "Carol"]);
        let answers = HashMap::new();
        let cats = categories(&["Stadt", "Land", "Fluss"]);

        let board = score_letter_round('B', &cats, &answers, &roster, &SemanticVerdicts::default());
        assert_eq!(board.len(), 3);
        for category in &cats {
            assert_eq!(board[category].len(), 3);
        }
    }

    #[test]
    fn test_quiz_correct_choice_scores_flat_hundred() {
        let roster = players(&["Alice", "Bob", "Carol"]);
        let question = Question {
            text: "Largest planet?".to_string(),
            options: vec![
                "Mars".to_string(),
                "Jupiter".to_string(),
                "Venus".to_string(),
            ],
            correct_index: 1,
        };
        let mut answers = HashMap::new();
        answers.insert(roster[0].id, SubmittedAnswer::Choice(1));
        answers.insert(roster[1].id, SubmittedAnswer::Choice(0));
        // Carol never answered.

        let board = score_quiz_round(2, &question, &answers, &roster);
        let entries = &board["2"];
        assert_eq!(entries[&roster[0].id].points, 100);
        assert!(entries[&roster[0].id].is_valid);
        assert!(!entries[&roster[0].id].is_unique);
        assert_eq!(
            entries[&roster[0].id].submitted_value.as_deref(),
            Some("Jupiter")
        );
        assert_eq!(entries[&roster[1].id].points, 0);
        assert_eq!(entries[&roster[2].id].points, 0);
        assert!(entries[&roster[2].id].submitted_value.is_none());
    }

    #[test]
    fn test_quiz_out_of_range_choice_is_invalid() {
        let roster = players(&["Alice"]);
        let question = Question {
            text: "2+2?".to_string(),
            options: vec!["3".to_string(), "4".to_string()],
            correct_index: 1,
        };
        let mut answers = HashMap::new();
        answers.insert(roster[0].id, SubmittedAnswer::Choice(7));

        let board = score_quiz_round(0, &question, &answers, &roster);
        let entry = &board["0"][&roster[0].id];
        assert!(!entry.is_valid);
        assert_eq!(entry.points, 0);
        assert_eq!(entry.submitted_value.as_deref(), Some("7"));
    }
}
