use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, patch, post},
};
use axum_valid::Valid;

use crate::{
    dao::models::GameEntity,
    dto::game::{AckResponse, CreateGameRequest, GamePatchRequest, RetireResponse, ScoreInput},
    error::AppError,
    services::game_service,
    state::SharedState,
};

/// Administrative game lifecycle endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/admin/games", post(create_game))
        .route(
            "/admin/games/{id}",
            get(get_game)
                .patch(patch_game)
                .delete(retire_game),
        )
        .route("/admin/games/{id}/score", patch(record_score))
        .route("/admin/games/{id}/close", patch(close_game))
}

/// Schedule a new game.
#[utoipa::path(
    post,
    path = "/admin/games",
    tag = "games",
    request_body = CreateGameRequest,
    responses(
        (status = 200, description = "Game scheduled", body = AckResponse),
        (status = 400, description = "Missing team or date"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateGameRequest>>,
) -> Result<Json<AckResponse>, AppError> {
    Ok(Json(game_service::create_game(&state, payload).await?))
}

/// Retrieve a game by its identifier.
#[utoipa::path(
    get,
    path = "/admin/games/{id}",
    tag = "games",
    params(("id" = String, Path, description = "Identifier of the game")),
    responses(
        (status = 200, description = "Game", body = GameEntity),
        (status = 404, description = "Unknown or expired game")
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<GameEntity>, AppError> {
    Ok(Json(game_service::get_game(&state, &id).await?))
}

/// Patch allow-listed fields of a game that is not closed or canceled.
#[utoipa::path(
    patch,
    path = "/admin/games/{id}",
    tag = "games",
    params(("id" = String, Path, description = "Identifier of the game")),
    request_body = GamePatchRequest,
    responses(
        (status = 200, description = "Game patched", body = AckResponse),
        (status = 400, description = "Protected or no accepted field"),
        (status = 409, description = "Game is closed or canceled")
    )
)]
pub async fn patch_game(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<GamePatchRequest>,
) -> Result<Json<AckResponse>, AppError> {
    Ok(Json(game_service::patch_game(&state, &id, payload).await?))
}

/// Delete a game before kickoff, cancel it afterwards.
#[utoipa::path(
    delete,
    path = "/admin/games/{id}",
    tag = "games",
    params(("id" = String, Path, description = "Identifier of the game")),
    responses(
        (status = 200, description = "Game deleted or canceled", body = RetireResponse),
        (status = 409, description = "Game is closed or canceled")
    )
)]
pub async fn retire_game(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<RetireResponse>, AppError> {
    Ok(Json(game_service::retire_game(&state, &id).await?))
}

/// Overwrite the live score of a running game.
#[utoipa::path(
    patch,
    path = "/admin/games/{id}/score",
    tag = "games",
    params(("id" = String, Path, description = "Identifier of the game")),
    request_body = ScoreInput,
    responses(
        (status = 200, description = "Score recorded", body = AckResponse),
        (status = 409, description = "Game is not running")
    )
)]
pub async fn record_score(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Valid(Json(score)): Valid<Json<ScoreInput>>,
) -> Result<Json<AckResponse>, AppError> {
    Ok(Json(game_service::record_score(&state, &id, score).await?))
}

/// Record the final score and close a running game.
#[utoipa::path(
    patch,
    path = "/admin/games/{id}/close",
    tag = "games",
    params(("id" = String, Path, description = "Identifier of the game")),
    request_body = ScoreInput,
    responses(
        (status = 200, description = "Game closed", body = AckResponse),
        (status = 409, description = "Game is not running")
    )
)]
pub async fn close_game(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Valid(Json(score)): Valid<Json<ScoreInput>>,
) -> Result<Json<AckResponse>, AppError> {
    Ok(Json(game_service::close_game(&state, &id, score).await?))
}
