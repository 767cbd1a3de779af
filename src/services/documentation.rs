use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the sports pool admin backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::event_stream,
        crate::routes::admin_games::create_game,
        crate::routes::admin_games::get_game,
        crate::routes::admin_games::patch_game,
        crate::routes::admin_games::retire_game,
        crate::routes::admin_games::record_score,
        crate::routes::admin_games::close_game,
        crate::routes::admin_payments::list_payments,
        crate::routes::admin_payments::insert_payment,
        crate::routes::admin_payments::insert_award_payments,
        crate::routes::admin_payments::update_payment,
        crate::routes::admin_payments::delete_payment,
        crate::routes::admin_seasons::create_season,
        crate::routes::admin_seasons::get_season,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::PaymentVerifiedEvent,
            crate::dto::sse::SeasonBalanceEvent,
            crate::dto::payment::BalancePost,
            crate::dto::game::GamePatchRequest,
            crate::dto::payment::UpdatePaymentRequest,
            crate::dto::payment::AwardPaymentsRequest,
            crate::dao::models::GameEntity,
            crate::dao::models::GameStatus,
            crate::dao::models::PaymentEntity,
            crate::dao::models::SeasonEntity,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events stream"),
        (name = "games", description = "Game scheduling and lifecycle"),
        (name = "payments", description = "Payment ledger and verification"),
        (name = "seasons", description = "Seasons and their balances"),
    )
)]
pub struct ApiDoc;
