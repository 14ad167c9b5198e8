use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use party_core::SemanticVerdicts;
use party_types::PlayerId;

/// One player's sheet sent for semantic checking.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationRequest<'a> {
    pub letter: String,
    pub answers: &'a HashMap<String, String>,
}

/// What the validator answers per sheet. `errors` lists the categories
/// whose answers it rejected; `suggestions` and `explanations` are
/// passthrough material for clients and are not interpreted here.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationResponse {
    pub valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub suggestions: HashMap<String, String>,
    #[serde(default)]
    pub explanations: HashMap<String, String>,
}

impl ValidationResponse {
    pub fn category_ok(&self, category: &str) -> bool {
        self.valid || !self.errors.iter().any(|c| c == category)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidatorError {
    #[error("validator request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("validator returned an unusable payload: {0}")]
    BadPayload(String),
    #[error("validator did not answer within the allowed polls")]
    Exhausted,
}

/// Seam to the external semantic validator. An `Err` means the sheet
/// could not be checked; the round then scores that sheet in degraded
/// mode instead of blocking.
#[async_trait]
pub trait AnswerValidator: Send + Sync {
    async fn validate(
        &self,
        letter: char,
        answers: &HashMap<String, String>,
    ) -> Result<ValidationResponse, ValidatorError>;
}

/// HTTP validator client. The service is allowed to be slow and flaky,
/// so each sheet is retried on a fixed interval up to a bounded number
/// of attempts, with the whole exchange sitting under one overall
/// timeout enforced by the caller.
pub struct HttpValidator {
    client: Client,
    base_url: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl HttpValidator {
    pub fn new(base_url: String, poll_interval: Duration, max_polls: u32) -> Self {
        Self {
            client: Client::new(),
            base_url,
            poll_interval,
            max_polls,
        }
    }

    async fn attempt(
        &self,
        request: &ValidationRequest<'_>,
    ) -> Result<ValidationResponse, ValidatorError> {
        let response = self
            .client
            .post(format!("{}/validate", self.base_url))
            .timeout(self.poll_interval)
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        let parsed: ValidationResponse = response
            .json()
            .await
            .map_err(|e| ValidatorError::BadPayload(e.to_string()))?;
        Ok(parsed)
    }
}

#[async_trait]
impl AnswerValidator for HttpValidator {
    async fn validate(
        &self,
        letter: char,
        answers: &HashMap<String, String>,
    ) -> Result<ValidationResponse, ValidatorError> {
        let request = ValidationRequest {
            letter: letter.to_string(),
            answers,
        };

        for attempt in 1..=self.max_polls {
            match self.attempt(&request).await {
                Ok(response) => {
                    debug!("Validator answered on attempt {}", attempt);
                    return Ok(response);
                }
                Err(e) => {
                    warn!("Validator attempt {}/{} failed: {}", attempt, self.max_polls, e);
                    if attempt < self.max_polls {
                        tokio::time::sleep(self.poll_interval).await;
                    }
                }
            }
        }
        Err(ValidatorError::Exhausted)
    }
}

/// Accepts every sheet. Used when no validator endpoint is configured
/// and by tests; scoring then runs on the structural rules alone.
pub struct RuleOnlyValidator;

#[async_trait]
impl AnswerValidator for RuleOnlyValidator {
    async fn validate(
        &self,
        _letter: char,
        _answers: &HashMap<String, String>,
    ) -> Result<ValidationResponse, ValidatorError> {
        Ok(ValidationResponse {
            valid: true,
            errors: Vec::new(),
            suggestions: HashMap::new(),
            explanations: HashMap::new(),
        })
    }
}

/// Folds per-sheet validator responses into round verdicts. A missing or
/// failed sheet leaves that player accepted and marks the round degraded.
pub fn collect_verdicts(
    sheets: Vec<(PlayerId, Result<ValidationResponse, ValidatorError>)>,
    categories: &[String],
) -> SemanticVerdicts {
    let mut verdicts = SemanticVerdicts::default();
    for (player_id, outcome) in sheets {
        match outcome {
            Ok(response) => {
                for category in categories {
                    if !response.category_ok(category) {
                        verdicts.reject(player_id, category);
                    }
                }
            }
            Err(e) => {
                warn!("Scoring player {} without semantic checks: {}", player_id, e);
                verdicts.mark_degraded();
            }
        }
    }
    verdicts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(valid: bool, errors: &[&str]) -> ValidationResponse {
        ValidationResponse {
            valid,
            errors: errors.iter().map(|e| e.to_string()).collect(),
            suggestions: HashMap::new(),
            explanations: HashMap::new(),
        }
    }

    #[test]
    fn test_category_ok_consults_error_list() {
        let resp = response(false, &["Stadt"]);
        assert!(!resp.category_ok("Stadt"));
        assert!(resp.category_ok("Land"));

        // A globally valid sheet overrides the error list.
        let resp = response(true, &["Stadt"]);
        assert!(resp.category_ok("Stadt"));
    }

    #[test]
    fn test_collect_verdicts_rejects_flagged_categories() {
        let alice = uuid::Uuid::new_v4();
        let bob = uuid::Uuid::new_v4();
        let categories = vec!["Stadt".to_string(), "Land".to_string()];

        let verdicts = collect_verdicts(
            vec![
                (alice, Ok(response(false, &["Stadt"]))),
                (bob, Ok(response(true, &[]))),
            ],
            &categories,
        );

        assert!(!verdicts.accepts(alice, "Stadt"));
        assert!(verdicts.accepts(alice, "Land"));
        assert!(verdicts.accepts(bob, "Stadt"));
        assert!(!verdicts.is_degraded());
    }

    #[test]
    fn test_collect_verdicts_degrades_on_failure() {
        let alice = uuid::Uuid::new_v4();
        let categories = vec!["Stadt".to_string()];

        let verdicts = collect_verdicts(
            vec![(alice, Err(ValidatorError::Exhausted))],
            &categories,
        );

        // The unreachable sheet passes rule-only, flagged degraded.
        assert!(verdicts.accepts(alice, "Stadt"));
        assert!(verdicts.is_degraded());
    }

    #[tokio::test]
    async fn test_rule_only_validator_accepts_everything() {
        let validator = RuleOnlyValidator;
        let mut answers = HashMap::new();
        answers.insert("Stadt".to_string(), "Xyzzy".to_string());

        let response = validator.validate('B', &answers).await.unwrap();
        assert!(response.valid);
        assert!(response.errors.is_empty());
    }
}
