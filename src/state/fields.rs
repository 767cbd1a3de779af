//! Declared allow-lists for caller-supplied patch bodies.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::dao::models::{FieldValue, GameUpdate, PaymentUpdate, PropsUpdate};

/// JSON kind a declared field must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    /// RFC 3339 timestamp string.
    Date,
}

impl FieldKind {
    /// Read `value` as this kind, `None` when it has another shape.
    pub fn parse(self, value: &Value) -> Option<FieldValue> {
        match self {
            FieldKind::String => value.as_str().map(|raw| FieldValue::String(raw.to_owned())),
            FieldKind::Number => value.as_f64().map(FieldValue::Number),
            FieldKind::Boolean => value.as_bool().map(FieldValue::Boolean),
            FieldKind::Date => value.as_str().and_then(parse_date).map(FieldValue::Date),
        }
    }
}

/// `{fieldName: kind}` table for one entity.
pub type FieldTable = BTreeMap<String, FieldKind>;

/// Allow-lists per patchable entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldAllowLists {
    #[serde(default = "default_game_fields")]
    pub game: FieldTable,
    #[serde(default = "default_payment_fields")]
    pub payment: FieldTable,
}

impl Default for FieldAllowLists {
    fn default() -> Self {
        Self {
            game: default_game_fields(),
            payment: default_payment_fields(),
        }
    }
}

impl FieldAllowLists {
    /// Refuse tables that would let a patch reach a protected field, shadow a column
    /// with the wrong kind, or write a malformed document key.
    pub fn check(&self) -> Result<(), FieldError> {
        check_table("game", &self.game, &PROTECTED_GAME_FIELDS, &GAME_COLUMNS)?;
        check_table(
            "payment",
            &self.payment,
            &PROTECTED_PAYMENT_FIELDS,
            &PAYMENT_COLUMNS,
        )
    }
}

fn default_game_fields() -> FieldTable {
    FieldTable::from([("date".to_string(), FieldKind::Date)])
}

fn default_payment_fields() -> FieldTable {
    FieldTable::from([("verified".to_string(), FieldKind::Boolean)])
}

/// Game fields only the lifecycle actions may write.
const PROTECTED_GAME_FIELDS: [&str; 8] = [
    "status",
    "score",
    "teams",
    "reference",
    "id",
    "expireAt",
    "entries",
    "props",
];
/// Payment fields owned by insertion and the verification chain.
const PROTECTED_PAYMENT_FIELDS: [&str; 5] = ["id", "reference", "type", "expireAt", "props"];

/// Dedicated game columns reachable by a patch; any other declared field lands in `props`.
const GAME_COLUMNS: [(&str, FieldKind); 1] = [("date", FieldKind::Date)];
const PAYMENT_COLUMNS: [(&str, FieldKind); 2] = [
    ("verified", FieldKind::Boolean),
    ("value", FieldKind::Number),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    /// The patch names a field only dedicated actions may write.
    #[error("field `{0}` cannot be patched directly")]
    Protected(String),
    /// No key survived the allow-list.
    #[error("no accepted field in patch")]
    NothingAccepted,
    /// An allow-list entry is unusable.
    #[error("{entity} allow-list entry `{field}` is invalid: {reason}")]
    Misdeclared {
        entity: &'static str,
        field: String,
        reason: &'static str,
    },
}

fn check_table(
    entity: &'static str,
    table: &FieldTable,
    protected: &[&str],
    columns: &[(&str, FieldKind)],
) -> Result<(), FieldError> {
    for (field, kind) in table {
        let misdeclared = |reason| FieldError::Misdeclared {
            entity,
            field: field.clone(),
            reason,
        };
        if field.is_empty() || field.contains('.') || field.starts_with('$') {
            return Err(misdeclared("not a plain document key"));
        }
        if protected.contains(&field.as_str()) {
            return Err(misdeclared("protected field"));
        }
        if let Some((_, expected)) = columns.iter().find(|(column, _)| column == field) {
            if expected != kind {
                return Err(misdeclared("kind differs from the stored column"));
            }
        }
    }
    Ok(())
}

/// Keep only the declared fields whose value has the declared kind.
pub fn accept_fields(table: &FieldTable, props: &Map<String, Value>) -> PropsUpdate {
    props
        .iter()
        .filter_map(|(name, value)| {
            let kind = table.get(name)?;
            Some((name.clone(), kind.parse(value)?))
        })
        .collect()
}

/// Turn a generic game patch into a store update.
pub fn game_update(
    table: &FieldTable,
    props: &Map<String, Value>,
) -> Result<GameUpdate, FieldError> {
    if let Some(name) = props
        .keys()
        .find(|name| is_protected(&PROTECTED_GAME_FIELDS, name))
    {
        return Err(FieldError::Protected(name.clone()));
    }

    let mut update = GameUpdate::default();
    for (name, value) in accept_fields(table, props) {
        match (name.as_str(), value) {
            ("date", FieldValue::Date(date)) => update.date = Some(date),
            (_, value) => {
                update.props.insert(name, value);
            }
        }
    }
    if update.is_empty() {
        return Err(FieldError::NothingAccepted);
    }
    Ok(update)
}

/// Turn a generic payment patch into a store update.
pub fn payment_update(
    table: &FieldTable,
    props: &Map<String, Value>,
) -> Result<PaymentUpdate, FieldError> {
    if let Some(name) = props
        .keys()
        .find(|name| is_protected(&PROTECTED_PAYMENT_FIELDS, name))
    {
        return Err(FieldError::Protected(name.clone()));
    }

    let mut update = PaymentUpdate::default();
    for (name, value) in accept_fields(table, props) {
        match (name.as_str(), value) {
            ("verified", FieldValue::Boolean(verified)) => update.verified = Some(verified),
            ("value", FieldValue::Number(value)) => update.value = Some(value),
            (_, value) => {
                update.props.insert(name, value);
            }
        }
    }
    if update.is_empty() {
        return Err(FieldError::NothingAccepted);
    }
    Ok(update)
}

fn is_protected(protected: &[&str], name: &str) -> bool {
    let root = name.split('.').next().unwrap_or(name);
    protected.contains(&root)
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn props(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    #[test]
    fn drops_undeclared_and_mistyped_fields() {
        let table = FieldTable::from([
            ("name".to_string(), FieldKind::String),
            ("limit".to_string(), FieldKind::Number),
        ]);
        let accepted = accept_fields(
            &table,
            &props(json!({ "name": "Final", "limit": "ten", "extra": true })),
        );
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted["name"], FieldValue::String("Final".into()));
    }

    #[test]
    fn game_patch_accepts_a_reschedule() {
        let update = game_update(
            &FieldAllowLists::default().game,
            &props(json!({ "date": "2024-05-02T20:00:00Z" })),
        )
        .unwrap();
        assert_eq!(
            update.date,
            Some(Utc.with_ymd_and_hms(2024, 5, 2, 20, 0, 0).unwrap())
        );
        assert!(update.status.is_none());
    }

    #[test]
    fn game_patch_refuses_protected_fields() {
        let table = FieldAllowLists::default().game;
        for body in [
            json!({ "status": "closed" }),
            json!({ "score.visited": 3 }),
            json!({ "teams": { "visited": { "id": "C" } } }),
            json!({ "reference": "1/2020", "date": "2024-05-02T20:00:00Z" }),
        ] {
            assert!(matches!(
                game_update(&table, &props(body)),
                Err(FieldError::Protected(_))
            ));
        }
    }

    #[test]
    fn empty_patches_are_rejected() {
        let lists = FieldAllowLists::default();
        assert_eq!(
            game_update(&lists.game, &props(json!({ "date": "tomorrow" }))),
            Err(FieldError::NothingAccepted)
        );
        assert_eq!(
            payment_update(&lists.payment, &props(json!({ "verified": "yes" }))),
            Err(FieldError::NothingAccepted)
        );
    }

    #[test]
    fn payment_patch_reads_verified() {
        let update = payment_update(
            &FieldAllowLists::default().payment,
            &props(json!({ "verified": true, "value": 1000 })),
        )
        .unwrap();
        assert_eq!(update.verified, Some(true));
        assert_eq!(update.value, None);
        assert_eq!(update.expire_at, None);
    }

    #[test]
    fn configured_fields_reach_the_update() {
        let mut lists = FieldAllowLists::default();
        lists.game.insert("venue".into(), FieldKind::String);
        lists.payment.insert("value".into(), FieldKind::Number);
        lists.payment.insert("memo".into(), FieldKind::String);
        lists.check().unwrap();

        let game = game_update(&lists.game, &props(json!({ "venue": "Maracana" }))).unwrap();
        assert_eq!(
            game.props["venue"],
            FieldValue::String("Maracana".into())
        );
        assert_eq!(game.date, None);

        let payment =
            payment_update(&lists.payment, &props(json!({ "value": 12, "memo": "cash" })))
                .unwrap();
        assert_eq!(payment.value, Some(12.0));
        assert_eq!(payment.props["memo"], FieldValue::String("cash".into()));
        assert!(!payment.props.contains_key("value"));
    }

    #[test]
    fn misdeclared_tables_are_refused() {
        for (field, kind) in [
            ("status", FieldKind::String),
            ("date", FieldKind::String),
            ("score.visited", FieldKind::Number),
            ("$where", FieldKind::String),
        ] {
            let mut lists = FieldAllowLists::default();
            lists.game.insert(field.into(), kind);
            assert!(
                matches!(lists.check(), Err(FieldError::Misdeclared { .. })),
                "{field}"
            );
        }

        let mut lists = FieldAllowLists::default();
        lists.payment.insert("reference".into(), FieldKind::String);
        assert!(lists.check().is_err());
        assert!(FieldAllowLists::default().check().is_ok());
    }

    #[test]
    fn payment_patch_refuses_chain_fields() {
        assert_eq!(
            payment_update(
                &FieldAllowLists::default().payment,
                &props(json!({ "expireAt": "2030-01-01T00:00:00Z" }))
            ),
            Err(FieldError::Protected("expireAt".into()))
        );
    }

    #[test]
    fn tables_deserialize_with_defaults() {
        let lists: FieldAllowLists =
            serde_json::from_value(json!({ "game": { "date": "date", "venue": "string" } }))
                .unwrap();
        assert_eq!(lists.game["venue"], FieldKind::String);
        assert_eq!(lists.payment, FieldAllowLists::default().payment);
    }
}
