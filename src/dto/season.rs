use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dao::models::SeasonEntity;

/// Payload opening a season.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct CreateSeasonRequest {
    /// Season reference; defaults to the current `month/year`.
    #[serde(default)]
    #[validate(length(min = 1))]
    pub id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SeasonCreatedResponse {
    pub acknowledged: bool,
    pub season: SeasonEntity,
}
