use chrono::Utc;
use serde_json::Map;
use tracing::{error, info, warn};

use crate::{
    dao::models::{PaymentEntity, PaymentGuard, PaymentType, PaymentUpdate},
    dto::payment::{
        AwardPaymentsRequest, BalancePost, CreatePaymentRequest, PaymentDeletedResponse,
        PaymentUpdatedResponse, PaymentsInsertedResponse, UpdatePaymentRequest,
    },
    error::ServiceError,
    services::{season_service, sse_events},
    state::{
        SharedState,
        expiry::{self, RecordKind},
        fields,
        ledger::{self, VerificationPlan},
    },
};

pub async fn list_payments(state: &SharedState) -> Result<Vec<PaymentEntity>, ServiceError> {
    let store = state.require_store().await?;
    Ok(store.list_payments().await?)
}

/// Record a new, unverified payment; its expiry follows the billing-day snap.
pub async fn insert_payment(
    state: &SharedState,
    request: CreatePaymentRequest,
) -> Result<PaymentsInsertedResponse, ServiceError> {
    let store = state.require_store().await?;
    if store.find_payment(request.id.clone()).await?.is_some() {
        return Err(ServiceError::InvalidInput(format!(
            "payment `{}` already exists",
            request.id
        )));
    }

    let payment = PaymentEntity {
        kind: PaymentType::from_value(request.value),
        id: request.id,
        reference: request.reference,
        value: request.value,
        verified: false,
        expire_at: expiry::expire_at(RecordKind::Payment, Utc::now()),
        props: Map::new(),
    };
    insert(state, vec![payment]).await
}

/// Generate one outgoing payout per winner, with ids `<prefix><n>` counted from 1.
pub async fn insert_award_payments(
    state: &SharedState,
    request: AwardPaymentsRequest,
) -> Result<PaymentsInsertedResponse, ServiceError> {
    let expire_at = expiry::expire_at(RecordKind::AwardPayment, Utc::now());
    let payments = request
        .winners
        .into_iter()
        .enumerate()
        .map(|(position, winner)| PaymentEntity {
            id: format!("{}{}", request.prefix, position + 1),
            reference: winner.id,
            value: -winner.award,
            kind: PaymentType::Send,
            verified: false,
            expire_at,
            props: Map::new(),
        })
        .collect::<Vec<_>>();
    if payments.is_empty() {
        return Err(ServiceError::InvalidInput("no winners supplied".into()));
    }
    insert(state, payments).await
}

async fn insert(
    state: &SharedState,
    payments: Vec<PaymentEntity>,
) -> Result<PaymentsInsertedResponse, ServiceError> {
    let store = state.require_store().await?;
    let outcome = store.insert_payments(payments.clone()).await?;
    if !outcome.acknowledged {
        return Err(ServiceError::NotAcknowledged("payment insert".into()));
    }
    info!(count = outcome.inserted_count, "payments recorded");
    Ok(PaymentsInsertedResponse {
        acknowledged: true,
        inserted_count: outcome.inserted_count,
        payments,
    })
}

/// Mark a payment verified: the full reconciliation with `{verified: true}` as props.
pub async fn verify_payment(
    state: &SharedState,
    payment_id: &str,
    reference: &str,
) -> Result<PaymentUpdatedResponse, ServiceError> {
    let mut props = serde_json::Map::new();
    props.insert("verified".into(), true.into());
    update_payment(
        state,
        payment_id,
        UpdatePaymentRequest {
            reference: Some(reference.to_string()),
            props,
        },
    )
    .await
}

/// Patch allow-listed payment fields. Setting `verified` to `true` chains the expiry
/// behind the reference's verified payments and posts the value to the current season.
pub async fn update_payment(
    state: &SharedState,
    payment_id: &str,
    request: UpdatePaymentRequest,
) -> Result<PaymentUpdatedResponse, ServiceError> {
    let reference = request
        .reference
        .filter(|reference| !reference.trim().is_empty())
        .ok_or_else(|| ServiceError::InvalidInput("reference is required".into()))?;
    if payment_id.trim().is_empty() {
        return Err(ServiceError::InvalidInput("payment id is required".into()));
    }
    let mut update = fields::payment_update(&state.config().fields.payment, &request.props)?;
    if update.verified == Some(false) {
        return Err(ServiceError::InvalidInput(
            "a payment verification cannot be revoked".into(),
        ));
    }

    let store = state.require_store().await?;
    let verifying = update.verified == Some(true);
    let mut plan = None;
    if verifying {
        let chain = store.list_payments_by_reference(reference.clone()).await?;
        let computed = ledger::plan_verification(payment_id, &chain);
        update.expire_at = computed.expire_at;
        plan = Some(computed);
    }

    // Verification and amount changes only match a payment that is not verified yet:
    // a payment posts to a balance at most once, and only with its final amount.
    let guard = if verifying || update.value.is_some() {
        PaymentGuard::Unverified
    } else {
        PaymentGuard::Any
    };
    let outcome = store
        .update_payment(payment_id.to_string(), guard, update.clone())
        .await?;
    if !outcome.acknowledged {
        return Err(ServiceError::NotAcknowledged(format!(
            "update of payment `{payment_id}`"
        )));
    }

    let balance = match plan {
        Some(plan) if outcome.matched_count > 0 => {
            post_balance(state, payment_id, plan, &update).await?
        }
        Some(_) => {
            warn!(
                payment_id,
                reference = %reference,
                "verification matched no unverified payment; balance untouched"
            );
            BalancePost::NotApplicable
        }
        None if update.value.is_some() && outcome.matched_count == 0 => {
            return Err(match store.find_payment(payment_id.to_string()).await? {
                None => ServiceError::NotFound(format!("payment `{payment_id}`")),
                Some(_) => ServiceError::InvalidInput(format!(
                    "payment `{payment_id}` is verified; its value cannot change"
                )),
            });
        }
        None => BalancePost::NotApplicable,
    };

    Ok(PaymentUpdatedResponse {
        acknowledged: true,
        modified_count: outcome.modified_count,
        balance,
    })
}

async fn post_balance(
    state: &SharedState,
    payment_id: &str,
    plan: VerificationPlan,
    update: &PaymentUpdate,
) -> Result<BalancePost, ServiceError> {
    let Some(mut payment) = plan.payment else {
        warn!(payment_id, "verified payment missing from pre-fetched chain; balance post skipped");
        announce_skipped(state, payment_id).await;
        return Ok(BalancePost::Skipped);
    };
    update.apply_to(&mut payment);

    let season = season_service::current_reference(Utc::now());
    let balance = match season_service::increment(state, &season, payment.value).await {
        Ok(true) => BalancePost::Posted {
            season,
            delta: payment.value,
        },
        Ok(false) => BalancePost::SeasonMissing { season },
        Err(err) => {
            error!(
                payment_id,
                season = %season,
                delta = payment.value,
                error = %err,
                "payment verified but balance post failed"
            );
            return Err(err);
        }
    };

    info!(payment_id, ?balance, "payment verified");
    sse_events::broadcast_payment_verified(state, payment, balance.clone());
    Ok(balance)
}

/// The verification is committed even when no balance was posted; subscribers get
/// the stored payment.
async fn announce_skipped(state: &SharedState, payment_id: &str) {
    let stored = match state.require_store().await {
        Ok(store) => store.find_payment(payment_id.to_string()).await.map_err(ServiceError::from),
        Err(err) => Err(err),
    };
    match stored {
        Ok(Some(payment)) => {
            sse_events::broadcast_payment_verified(state, payment, BalancePost::Skipped)
        }
        Ok(None) => warn!(payment_id, "verified payment vanished before announcement"),
        Err(err) => warn!(payment_id, error = %err, "failed to re-read verified payment"),
    }
}

pub async fn delete_payment(
    state: &SharedState,
    payment_id: &str,
) -> Result<PaymentDeletedResponse, ServiceError> {
    let store = state.require_store().await?;
    let outcome = store.delete_payment(payment_id.to_string()).await?;
    if !outcome.acknowledged {
        return Err(ServiceError::NotAcknowledged(format!(
            "deletion of payment `{payment_id}`"
        )));
    }
    Ok(PaymentDeletedResponse {
        payment_id: payment_id.to_string(),
        deleted: outcome.deleted_count > 0,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Months};
    use serde_json::json;

    use super::*;
    use crate::{
        dao::pool_store::PoolStore,
        dto::{payment::AwardWinner, season::CreateSeasonRequest},
        config::AppConfig,
        services::test_support::{Harness, harness, harness_with},
        state::fields::FieldKind,
    };

    async fn open_current_season(h: &Harness) -> String {
        season_service::create_season(&h.state, CreateSeasonRequest::default())
            .await
            .unwrap()
            .season
            .id
    }

    fn new_payment(id: &str, reference: &str, value: f64) -> CreatePaymentRequest {
        CreatePaymentRequest {
            id: id.into(),
            reference: reference.into(),
            value,
        }
    }

    async fn seed(h: &Harness, id: &str, verified: bool, expire_at: DateTime<Utc>) {
        h.store
            .insert_payments(vec![PaymentEntity {
                id: id.into(),
                reference: "R".into(),
                value: 10.0,
                kind: PaymentType::Receive,
                verified,
                expire_at,
                props: serde_json::Map::new(),
            }])
            .await
            .unwrap();
    }

    async fn stored(h: &Harness, id: &str) -> PaymentEntity {
        h.store.find_payment(id.into()).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn verifying_a_lone_payment_posts_its_value() {
        let h = harness().await;
        let season = open_current_season(&h).await;
        let inserted = insert_payment(&h.state, new_payment("pay1", "client-1", 50.0))
            .await
            .unwrap();
        let created = inserted.payments[0].clone();
        assert_eq!(created.kind, PaymentType::Receive);
        assert!(!created.verified);

        let result = verify_payment(&h.state, "pay1", "client-1").await.unwrap();
        assert_eq!(result.modified_count, 1);
        assert_eq!(
            result.balance,
            BalancePost::Posted {
                season: season.clone(),
                delta: 50.0
            }
        );

        let verified = stored(&h, "pay1").await;
        assert!(verified.verified);
        assert_eq!(verified.expire_at, created.expire_at);
        assert_eq!(
            season_service::get_season(&h.state, &season).await.unwrap().amount,
            50.0
        );
        assert_eq!(h.events.names(), vec!["update-season", "verify-payment"]);
    }

    #[tokio::test]
    async fn verification_queues_behind_the_chain() {
        let h = harness().await;
        open_current_season(&h).await;
        let t1 = Utc::now() + Duration::days(3);
        let t2 = Utc::now() + Duration::days(20);
        seed(&h, "P1", true, t1).await;
        seed(&h, "P2", true, t2).await;
        seed(&h, "P3", false, Utc::now() + Duration::days(40)).await;

        verify_payment(&h.state, "P3", "R").await.unwrap();
        assert_eq!(
            stored(&h, "P3").await.expire_at,
            t2.checked_add_months(Months::new(1)).unwrap()
        );
    }

    #[tokio::test]
    async fn second_verification_posts_nothing() {
        let h = harness().await;
        let season = open_current_season(&h).await;
        insert_payment(&h.state, new_payment("pay1", "client-1", 50.0))
            .await
            .unwrap();

        verify_payment(&h.state, "pay1", "client-1").await.unwrap();
        let again = verify_payment(&h.state, "pay1", "client-1").await.unwrap();
        assert_eq!(again.balance, BalancePost::NotApplicable);
        assert_eq!(again.modified_count, 0);
        assert_eq!(
            season_service::get_season(&h.state, &season).await.unwrap().amount,
            50.0
        );
    }

    #[tokio::test]
    async fn verification_under_the_wrong_reference_is_skipped() {
        let h = harness().await;
        open_current_season(&h).await;
        insert_payment(&h.state, new_payment("pay1", "client-1", 50.0))
            .await
            .unwrap();

        h.events.clear();

        let result = verify_payment(&h.state, "pay1", "someone-else").await.unwrap();
        assert_eq!(result.balance, BalancePost::Skipped);
        assert!(stored(&h, "pay1").await.verified);

        assert_eq!(h.events.names(), vec!["verify-payment"]);
        let event = h.events.last("verify-payment").unwrap();
        assert_eq!(event["payment"]["id"], "pay1");
        assert_eq!(event["payment"]["verified"], true);
        assert_eq!(event["balance"]["outcome"], "skipped");
    }

    #[tokio::test]
    async fn verification_without_a_season_is_reported() {
        let h = harness().await;
        insert_payment(&h.state, new_payment("pay1", "client-1", 5.0))
            .await
            .unwrap();
        let result = verify_payment(&h.state, "pay1", "client-1").await.unwrap();
        assert!(matches!(result.balance, BalancePost::SeasonMissing { .. }));
    }

    #[tokio::test]
    async fn unacknowledged_verification_posts_nothing() {
        let h = harness().await;
        let season = open_current_season(&h).await;
        insert_payment(&h.state, new_payment("pay1", "client-1", 50.0))
            .await
            .unwrap();
        h.events.clear();
        h.store.set_unacknowledged(true);

        assert!(matches!(
            verify_payment(&h.state, "pay1", "client-1").await,
            Err(ServiceError::NotAcknowledged(_))
        ));
        h.store.set_unacknowledged(false);
        assert_eq!(
            season_service::get_season(&h.state, &season).await.unwrap().amount,
            0.0
        );
        assert!(h.events.names().is_empty());
    }

    #[tokio::test]
    async fn update_requires_reference_and_accepted_fields() {
        let h = harness().await;
        let missing_reference = UpdatePaymentRequest {
            reference: None,
            props: serde_json::from_value(json!({ "verified": true })).unwrap(),
        };
        assert!(matches!(
            update_payment(&h.state, "pay1", missing_reference).await,
            Err(ServiceError::InvalidInput(_))
        ));

        let nothing_accepted = UpdatePaymentRequest {
            reference: Some("R".into()),
            props: serde_json::from_value(json!({ "value": 1000 })).unwrap(),
        };
        assert!(matches!(
            update_payment(&h.state, "pay1", nothing_accepted).await,
            Err(ServiceError::InvalidInput(_))
        ));

        let revoke = UpdatePaymentRequest {
            reference: Some("R".into()),
            props: serde_json::from_value(json!({ "verified": false })).unwrap(),
        };
        assert!(matches!(
            update_payment(&h.state, "pay1", revoke).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn award_payments_are_outgoing_and_numbered() {
        let h = harness().await;
        let inserted = insert_award_payments(
            &h.state,
            AwardPaymentsRequest {
                prefix: "award-5-2024-".into(),
                winners: vec![
                    AwardWinner {
                        id: "client-1".into(),
                        award: 30.0,
                    },
                    AwardWinner {
                        id: "client-2".into(),
                        award: 12.5,
                    },
                ],
            },
        )
        .await
        .unwrap();
        assert_eq!(inserted.inserted_count, 2);

        let second = stored(&h, "award-5-2024-2").await;
        assert_eq!(second.value, -12.5);
        assert_eq!(second.kind, PaymentType::Send);
        assert_eq!(second.reference, "client-2");
        assert_eq!(list_payments(&h.state).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn delete_reports_whether_anything_was_removed() {
        let h = harness().await;
        insert_payment(&h.state, new_payment("pay1", "client-1", 1.0))
            .await
            .unwrap();
        assert!(delete_payment(&h.state, "pay1").await.unwrap().deleted);
        assert!(!delete_payment(&h.state, "pay1").await.unwrap().deleted);
    }

    #[tokio::test]
    async fn duplicate_payment_ids_are_rejected() {
        let h = harness().await;
        insert_payment(&h.state, new_payment("pay1", "client-1", 1.0))
            .await
            .unwrap();
        assert!(matches!(
            insert_payment(&h.state, new_payment("pay1", "client-1", 1.0)).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    fn ledger_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.fields.payment.insert("value".into(), FieldKind::Number);
        config.fields.payment.insert("memo".into(), FieldKind::String);
        config
    }

    fn patch(reference: &str, props: serde_json::Value) -> UpdatePaymentRequest {
        UpdatePaymentRequest {
            reference: Some(reference.into()),
            props: serde_json::from_value(props).unwrap(),
        }
    }

    #[tokio::test]
    async fn configured_fields_are_written() {
        let h = harness_with(ledger_config()).await;
        insert_payment(&h.state, new_payment("pay1", "client-1", 50.0))
            .await
            .unwrap();

        let result = update_payment(
            &h.state,
            "pay1",
            patch("client-1", json!({ "value": 12, "memo": "cash at the gate" })),
        )
        .await
        .unwrap();
        assert_eq!(result.modified_count, 1);
        assert_eq!(result.balance, BalancePost::NotApplicable);

        let payment = stored(&h, "pay1").await;
        assert_eq!(payment.value, 12.0);
        assert_eq!(payment.kind, PaymentType::Receive);
        assert_eq!(payment.props["memo"], "cash at the gate");
    }

    #[tokio::test]
    async fn amount_corrected_while_verifying_is_the_one_posted() {
        let h = harness_with(ledger_config()).await;
        let season = open_current_season(&h).await;
        insert_payment(&h.state, new_payment("pay1", "client-1", 50.0))
            .await
            .unwrap();

        let result = update_payment(
            &h.state,
            "pay1",
            patch("client-1", json!({ "verified": true, "value": 45 })),
        )
        .await
        .unwrap();
        assert_eq!(
            result.balance,
            BalancePost::Posted {
                season: season.clone(),
                delta: 45.0
            }
        );
        assert_eq!(
            season_service::get_season(&h.state, &season).await.unwrap().amount,
            45.0
        );
        assert_eq!(h.events.last("verify-payment").unwrap()["payment"]["value"], 45.0);
    }

    #[tokio::test]
    async fn verified_amounts_are_frozen() {
        let h = harness_with(ledger_config()).await;
        insert_payment(&h.state, new_payment("pay1", "client-1", 50.0))
            .await
            .unwrap();
        verify_payment(&h.state, "pay1", "client-1").await.unwrap();

        assert!(matches!(
            update_payment(&h.state, "pay1", patch("client-1", json!({ "value": 1 }))).await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            update_payment(&h.state, "ghost", patch("client-1", json!({ "value": 1 }))).await,
            Err(ServiceError::NotFound(_))
        ));
        assert_eq!(stored(&h, "pay1").await.value, 50.0);

        let memo = update_payment(&h.state, "pay1", patch("client-1", json!({ "memo": "late" })))
            .await
            .unwrap();
        assert_eq!(memo.modified_count, 1);
    }

    #[tokio::test]
    async fn racing_duplicate_inserts_are_invalid_input() {
        let h = harness().await;
        seed(&h, "pay1", false, Utc::now() + Duration::days(1)).await;

        let racing = PaymentEntity {
            value: 1.0,
            ..stored(&h, "pay1").await
        };
        assert!(matches!(
            insert(&h.state, vec![racing]).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }
}
