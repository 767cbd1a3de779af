use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dao::models::SeasonEntity,
    dto::season::{CreateSeasonRequest, SeasonCreatedResponse},
    error::AppError,
    services::season_service,
    state::SharedState,
};

/// Administrative season endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/admin/seasons", post(create_season))
        .route("/admin/seasons/{id}", get(get_season))
}

/// Open a season with the configured ticket price.
#[utoipa::path(
    post,
    path = "/admin/seasons",
    tag = "seasons",
    request_body = CreateSeasonRequest,
    responses(
        (status = 200, description = "Season opened", body = SeasonCreatedResponse),
        (status = 400, description = "Season already exists")
    )
)]
pub async fn create_season(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateSeasonRequest>>,
) -> Result<Json<SeasonCreatedResponse>, AppError> {
    Ok(Json(season_service::create_season(&state, payload).await?))
}

/// Retrieve a season and its running balance. Ids contain a slash and must be URL-encoded.
#[utoipa::path(
    get,
    path = "/admin/seasons/{id}",
    tag = "seasons",
    params(("id" = String, Path, description = "Season reference, e.g. `5%2F2024`")),
    responses(
        (status = 200, description = "Season", body = SeasonEntity),
        (status = 404, description = "Unknown or expired season")
    )
)]
pub async fn get_season(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SeasonEntity>, AppError> {
    Ok(Json(season_service::get_season(&state, &id).await?))
}
