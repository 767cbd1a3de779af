use axum::Router;

use crate::state::SharedState;

pub mod admin_games;
pub mod admin_payments;
pub mod admin_seasons;
pub mod docs;
pub mod health;
pub mod sse;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(sse::router())
        .merge(admin_games::router())
        .merge(admin_payments::router())
        .merge(admin_seasons::router())
        .merge(docs::router())
        .with_state(state)
}
