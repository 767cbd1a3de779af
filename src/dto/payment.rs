use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use validator::Validate;

use crate::dao::models::PaymentEntity;

/// Payload recording a new payment.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreatePaymentRequest {
    #[validate(length(min = 1))]
    pub id: String,
    #[validate(length(min = 1))]
    pub reference: String,
    /// Signed amount; positive is incoming.
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct AwardWinner {
    /// Winner identifier, used as the payment reference.
    #[validate(length(min = 1))]
    pub id: String,
    #[validate(range(min = 0.0))]
    pub award: f64,
}

/// Payload generating outgoing payouts for a list of winners.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AwardPaymentsRequest {
    /// Prefix of the generated payment ids (`<prefix><n>`, 1-based).
    #[validate(length(min = 1))]
    pub prefix: String,
    #[validate(nested, length(min = 1))]
    pub winners: Vec<AwardWinner>,
}

/// Generic payment patch; `reference` selects the chain, `props` go through the
/// payment allow-list.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePaymentRequest {
    pub reference: Option<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub props: Map<String, Value>,
}

/// Effect of a payment update on the season balance.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum BalancePost {
    /// `delta` was added to the season `season`.
    Posted { season: String, delta: f64 },
    /// The verified payment was missing from the pre-fetched chain.
    Skipped,
    /// No season `season` exists to receive the value.
    SeasonMissing { season: String },
    /// The update did not verify anything.
    NotApplicable,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentsInsertedResponse {
    pub acknowledged: bool,
    pub inserted_count: u64,
    pub payments: Vec<PaymentEntity>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentUpdatedResponse {
    pub acknowledged: bool,
    pub modified_count: u64,
    pub balance: BalancePost,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDeletedResponse {
    pub payment_id: String,
    pub deleted: bool,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn update_request_carries_reference_and_props() {
        let request: UpdatePaymentRequest =
            serde_json::from_value(json!({ "reference": "R", "props": { "verified": true } }))
                .unwrap();
        assert_eq!(request.reference.as_deref(), Some("R"));
        assert_eq!(request.props.get("verified"), Some(&json!(true)));
    }

    #[test]
    fn balance_post_is_tagged() {
        let posted = BalancePost::Posted {
            season: "5/2024".into(),
            delta: 50.0,
        };
        assert_eq!(
            serde_json::to_value(posted).unwrap(),
            json!({ "outcome": "posted", "season": "5/2024", "delta": 50.0 })
        );
        assert_eq!(
            serde_json::to_value(BalancePost::Skipped).unwrap(),
            json!({ "outcome": "skipped" })
        );
    }

    #[test]
    fn awards_need_winners() {
        let request: AwardPaymentsRequest =
            serde_json::from_value(json!({ "prefix": "award-", "winners": [] })).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn winners_are_validated_one_by_one() {
        let request: AwardPaymentsRequest = serde_json::from_value(json!({
            "prefix": "award-",
            "winners": [{ "id": "client-1", "award": 10.0 }, { "id": "", "award": -1.0 }]
        }))
        .unwrap();
        assert!(request.validate().is_err());

        let request: AwardPaymentsRequest = serde_json::from_value(json!({
            "prefix": "award-",
            "winners": [{ "id": "client-1", "award": 10.0 }]
        }))
        .unwrap();
        assert!(request.validate().is_ok());
    }
}
