/// OpenAPI documentation generation.
pub mod documentation;
/// Game scheduling and lifecycle actions.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Payment ledger and verification reconciliation.
pub mod payment_service;
/// Season records and balance increments.
pub mod season_service;
/// Typed lifecycle and ledger event publication.
pub mod sse_events;
/// Server-Sent Events streaming service.
pub mod sse_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;

#[cfg(test)]
pub(crate) mod test_support;
