use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, patch, post},
};
use axum_valid::Valid;

use crate::{
    dao::models::PaymentEntity,
    dto::payment::{
        AwardPaymentsRequest, CreatePaymentRequest, PaymentDeletedResponse,
        PaymentUpdatedResponse, PaymentsInsertedResponse, UpdatePaymentRequest,
    },
    error::AppError,
    services::payment_service,
    state::SharedState,
};

/// Administrative payment ledger endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/admin/payments", get(list_payments).post(insert_payment))
        .route("/admin/payments/awards", post(insert_award_payments))
        .route(
            "/admin/payments/{id}",
            patch(update_payment).delete(delete_payment),
        )
}

#[utoipa::path(
    get,
    path = "/admin/payments",
    tag = "payments",
    responses((status = 200, description = "Every live payment", body = [PaymentEntity]))
)]
pub async fn list_payments(
    State(state): State<SharedState>,
) -> Result<Json<Vec<PaymentEntity>>, AppError> {
    Ok(Json(payment_service::list_payments(&state).await?))
}

/// Record an unverified payment.
#[utoipa::path(
    post,
    path = "/admin/payments",
    tag = "payments",
    request_body = CreatePaymentRequest,
    responses(
        (status = 200, description = "Payment recorded", body = PaymentsInsertedResponse),
        (status = 400, description = "Invalid or duplicate payment")
    )
)]
pub async fn insert_payment(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreatePaymentRequest>>,
) -> Result<Json<PaymentsInsertedResponse>, AppError> {
    Ok(Json(payment_service::insert_payment(&state, payload).await?))
}

/// Generate outgoing payouts for winners.
#[utoipa::path(
    post,
    path = "/admin/payments/awards",
    tag = "payments",
    request_body = AwardPaymentsRequest,
    responses((status = 200, description = "Payouts recorded", body = PaymentsInsertedResponse))
)]
pub async fn insert_award_payments(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<AwardPaymentsRequest>>,
) -> Result<Json<PaymentsInsertedResponse>, AppError> {
    Ok(Json(
        payment_service::insert_award_payments(&state, payload).await?,
    ))
}

/// Patch a payment; `{"props": {"verified": true}}` verifies it and posts its value
/// to the current season.
#[utoipa::path(
    patch,
    path = "/admin/payments/{id}",
    tag = "payments",
    params(("id" = String, Path, description = "Identifier of the payment")),
    request_body = UpdatePaymentRequest,
    responses(
        (status = 200, description = "Payment updated", body = PaymentUpdatedResponse),
        (status = 400, description = "Missing reference or no accepted field"),
        (status = 500, description = "Write not acknowledged")
    )
)]
pub async fn update_payment(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdatePaymentRequest>,
) -> Result<Json<PaymentUpdatedResponse>, AppError> {
    Ok(Json(
        payment_service::update_payment(&state, &id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/admin/payments/{id}",
    tag = "payments",
    params(("id" = String, Path, description = "Identifier of the payment")),
    responses((status = 200, description = "Deletion result", body = PaymentDeletedResponse))
)]
pub async fn delete_payment(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<PaymentDeletedResponse>, AppError> {
    Ok(Json(payment_service::delete_payment(&state, &id).await?))
}
