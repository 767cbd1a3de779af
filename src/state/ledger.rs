//! Verification reconciliation over a payment chain.
//!
//! Payments sharing a `reference` form a chain. A payment verified behind earlier
//! verified entries expires one month after the tail of that chain instead of one
//! month after its own creation, so the chain expires in sequence.

use chrono::{DateTime, Utc};

use crate::{dao::models::PaymentEntity, state::expiry};

/// What a verification must write, computed from a snapshot of the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationPlan {
    /// New expiry for the verified payment; `None` keeps the stored one.
    pub expire_at: Option<DateTime<Utc>>,
    /// The verified payment as seen in the snapshot; its value is what gets
    /// posted to the season balance. `None` when it was missing from the snapshot.
    pub payment: Option<PaymentEntity>,
}

/// Plan the verification of `payment_id` given every payment sharing its reference.
pub fn plan_verification(payment_id: &str, chain: &[PaymentEntity]) -> VerificationPlan {
    let mut prior: Vec<&PaymentEntity> = chain
        .iter()
        .filter(|payment| payment.id != payment_id && payment.verified)
        .collect();
    prior.sort_by_key(|payment| payment.expire_at);

    VerificationPlan {
        expire_at: prior
            .last()
            .map(|tail| expiry::chained_payment_expiry(tail.expire_at)),
        payment: chain
            .iter()
            .find(|payment| payment.id == payment_id)
            .cloned(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::dao::models::PaymentType;

    fn at(month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, month, day, 12, 0, 0).unwrap()
    }

    fn payment(id: &str, verified: bool, expire_at: DateTime<Utc>) -> PaymentEntity {
        PaymentEntity {
            id: id.into(),
            reference: "R".into(),
            value: 10.0,
            kind: PaymentType::Receive,
            verified,
            expire_at,
            props: serde_json::Map::new(),
        }
    }

    #[test]
    fn queues_behind_the_latest_verified_payment() {
        // Unsorted on purpose: the store gives no ordering guarantee.
        let chain = vec![
            payment("P2", true, at(3, 10)),
            payment("P3", false, at(2, 1)),
            payment("P1", true, at(2, 10)),
        ];
        let plan = plan_verification("P3", &chain);
        assert_eq!(plan.expire_at, Some(at(4, 10)));
        assert_eq!(plan.payment.map(|p| p.id), Some("P3".to_string()));
    }

    #[test]
    fn single_prior_payment_anchors_the_chain() {
        let chain = vec![payment("P1", true, at(2, 10)), payment("P2", false, at(6, 1))];
        assert_eq!(plan_verification("P2", &chain).expire_at, Some(at(3, 10)));
    }

    #[test]
    fn unverified_siblings_and_the_target_itself_are_ignored() {
        let chain = vec![
            payment("P1", false, at(5, 1)),
            payment("P2", true, at(9, 1)),
        ];
        let plan = plan_verification("P2", &chain);
        assert_eq!(plan.expire_at, None);
        assert!(plan.payment.is_some());
    }

    #[test]
    fn missing_target_is_reported() {
        let chain = vec![payment("P1", true, at(2, 10))];
        let plan = plan_verification("gone", &chain);
        assert_eq!(plan.expire_at, Some(at(3, 10)));
        assert!(plan.payment.is_none());
    }
}
