use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use validator::Validate;

use crate::dao::models::{GameEntity, TeamRef, Teams};

/// Team reference supplied when scheduling a game.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct TeamInput {
    #[validate(length(min = 1, message = "team id is required"))]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl From<TeamInput> for TeamRef {
    fn from(value: TeamInput) -> Self {
        Self {
            id: value.id,
            name: value.name,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct TeamsInput {
    #[validate(nested)]
    pub visited: TeamInput,
    #[validate(nested)]
    pub visitor: TeamInput,
}

impl From<TeamsInput> for Teams {
    fn from(value: TeamsInput) -> Self {
        Self {
            visited: value.visited.into(),
            visitor: value.visitor.into(),
        }
    }
}

/// Payload used to schedule a new game.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateGameRequest {
    #[validate(nested)]
    pub teams: TeamsInput,
    /// Kickoff instant (RFC 3339).
    pub date: Option<DateTime<Utc>>,
    /// Season reference; defaults to the current `month/year`.
    #[serde(default)]
    pub reference: Option<String>,
}

/// Score submitted for a running game. Non-numeric values are rejected on parse.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema, Validate)]
pub struct ScoreInput {
    #[validate(range(min = 0, message = "score must be non-negative"))]
    pub visited: i64,
    #[validate(range(min = 0, message = "score must be non-negative"))]
    pub visitor: i64,
}

/// Raw patch body; keys are filtered through the game allow-list.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct GamePatchRequest(pub Map<String, Value>);

/// Write acknowledgement returned by score and patch endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct AckResponse {
    pub acknowledged: bool,
    /// Complete post-state of the game.
    pub game: GameEntity,
}

/// Outcome of retiring a game: deletion before kickoff, cancellation after.
#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum RetireResponse {
    Deleted { deleted: bool },
    Canceled { acknowledged: bool, game: GameEntity },
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn non_numeric_scores_fail_to_parse() {
        assert!(serde_json::from_value::<ScoreInput>(json!({ "visited": "2", "visitor": 1 })).is_err());
        assert!(serde_json::from_value::<ScoreInput>(json!({ "visited": 2 })).is_err());
    }

    #[test]
    fn negative_scores_fail_validation() {
        let score: ScoreInput =
            serde_json::from_value(json!({ "visited": -1, "visitor": 0 })).unwrap();
        assert!(score.validate().is_err());
    }

    #[test]
    fn blank_team_ids_fail_validation() {
        let request: CreateGameRequest = serde_json::from_value(json!({
            "teams": { "visited": { "id": "A" }, "visitor": { "id": "" } },
            "date": "2024-05-01T18:00:00Z"
        }))
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn retire_response_shapes() {
        assert_eq!(
            serde_json::to_value(RetireResponse::Deleted { deleted: true }).unwrap(),
            json!({ "deleted": true })
        );
    }
}
