use serde::Serialize;
use tracing::warn;

use crate::{
    dao::models::{GameEntity, PaymentEntity},
    dto::{
        payment::BalancePost,
        sse::{PaymentVerifiedEvent, SeasonBalanceEvent, ServerEvent, SystemStatus},
    },
    state::SharedState,
};

pub const EVENT_INSERT_GAME: &str = "insert-game";
pub const EVENT_UPDATE_GAME: &str = "update-game";
pub const EVENT_DELETE_GAME: &str = "delete-game";
pub const EVENT_VERIFY_PAYMENT: &str = "verify-payment";
pub const EVENT_UPDATE_SEASON: &str = "update-season";
pub const EVENT_SYSTEM_STATUS: &str = "system_status";

/// Broadcast a freshly scheduled game.
pub fn broadcast_game_inserted(state: &SharedState, game: &GameEntity) {
    publish(state, EVENT_INSERT_GAME, game);
}

/// Broadcast the complete post-state of an updated game.
pub fn broadcast_game_updated(state: &SharedState, game: &GameEntity) {
    publish(state, EVENT_UPDATE_GAME, game);
}

/// Broadcast the pre-deletion snapshot of a removed game.
pub fn broadcast_game_deleted(state: &SharedState, snapshot: &GameEntity) {
    publish(state, EVENT_DELETE_GAME, snapshot);
}

/// Broadcast a verified payment together with its effect on the season balance.
pub fn broadcast_payment_verified(state: &SharedState, payment: PaymentEntity, balance: BalancePost) {
    publish(
        state,
        EVENT_VERIFY_PAYMENT,
        &PaymentVerifiedEvent { payment, balance },
    );
}

/// Broadcast an acknowledged season balance increment.
pub fn broadcast_season_balance(state: &SharedState, id: &str, delta: f64) {
    publish(
        state,
        EVENT_UPDATE_SEASON,
        &SeasonBalanceEvent {
            id: id.to_string(),
            delta,
        },
    );
}

/// Broadcast the degraded flag to stream subscribers.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    publish(state, EVENT_SYSTEM_STATUS, &SystemStatus { degraded });
}

fn publish(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.broadcaster().publish(event),
        Err(err) => warn!(event, error = %err, "failed to serialize event payload"),
    }
}
