use chrono::{DateTime, Datelike, Utc};
use tracing::{info, warn};

use crate::{
    dao::models::SeasonEntity,
    dto::season::{CreateSeasonRequest, SeasonCreatedResponse},
    error::ServiceError,
    services::sse_events,
    state::{
        SharedState,
        expiry::{self, RecordKind},
    },
};

/// Reference of the season running at `now`: `month/year`, month 1-based.
pub fn current_reference(now: DateTime<Utc>) -> String {
    format!("{}/{}", now.month(), now.year())
}

/// Open a season with an empty balance and the configured ticket price.
pub async fn create_season(
    state: &SharedState,
    request: CreateSeasonRequest,
) -> Result<SeasonCreatedResponse, ServiceError> {
    let store = state.require_store().await?;
    let now = Utc::now();
    let id = request.id.unwrap_or_else(|| current_reference(now));

    if store.find_season(id.clone()).await?.is_some() {
        return Err(ServiceError::InvalidInput(format!(
            "season `{id}` already exists"
        )));
    }

    let season = SeasonEntity {
        id,
        running: true,
        amount: 0.0,
        ticket: state.config().ticket,
        expire_at: expiry::expire_at(RecordKind::Season, now),
    };
    let outcome = store.insert_season(season.clone()).await?;
    if !outcome.acknowledged {
        return Err(ServiceError::NotAcknowledged(format!(
            "insert of season `{}`",
            season.id
        )));
    }

    info!(season = %season.id, ticket = season.ticket, "season opened");
    Ok(SeasonCreatedResponse {
        acknowledged: true,
        season,
    })
}

pub async fn get_season(state: &SharedState, id: &str) -> Result<SeasonEntity, ServiceError> {
    let store = state.require_store().await?;
    store
        .find_season(id.to_string())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("season `{id}`")))
}

/// Atomically add `delta` to the season balance. Returns whether the season existed.
///
/// Not idempotent: each call posts once.
pub async fn increment(state: &SharedState, id: &str, delta: f64) -> Result<bool, ServiceError> {
    let store = state.require_store().await?;
    let outcome = store.increment_season_amount(id.to_string(), delta).await?;
    if !outcome.acknowledged {
        return Err(ServiceError::NotAcknowledged(format!(
            "balance increment of season `{id}`"
        )));
    }
    if outcome.matched_count == 0 {
        warn!(season = id, delta, "balance increment matched no season");
        return Ok(false);
    }

    info!(season = id, delta, "season balance posted");
    sse_events::broadcast_season_balance(state, id, delta);
    Ok(true)
}
