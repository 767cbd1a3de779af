use chrono::Utc;
use mongodb::bson::{Bson, DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dao::models::{
    FieldValue, GameEntity, GameEntry, GameStatus, GameUpdate, PaymentEntity, PaymentGuard,
    PaymentType, PaymentUpdate, PropsUpdate, Score, SeasonEntity, Teams,
};

pub fn to_bson_time(value: chrono::DateTime<Utc>) -> DateTime {
    DateTime::from_millis(value.timestamp_millis())
}

pub fn from_bson_time(value: DateTime) -> chrono::DateTime<Utc> {
    chrono::DateTime::<Utc>::from_timestamp_millis(value.timestamp_millis())
        .unwrap_or(chrono::DateTime::<Utc>::MAX_UTC)
}

fn field_to_bson(value: &FieldValue) -> Bson {
    match value {
        FieldValue::String(value) => Bson::String(value.clone()),
        FieldValue::Number(value) => Bson::Double(*value),
        FieldValue::Boolean(value) => Bson::Boolean(*value),
        FieldValue::Date(value) => Bson::DateTime(to_bson_time(*value)),
    }
}

/// Scalar `props` only; patches never write anything else there.
fn props_to_document(props: Map<String, Value>) -> Document {
    props
        .into_iter()
        .filter_map(|(name, value)| {
            let value = match value {
                Value::String(value) => Bson::String(value),
                Value::Bool(value) => Bson::Boolean(value),
                Value::Number(number) => match number.as_i64() {
                    Some(value) => Bson::Int64(value),
                    None => Bson::Double(number.as_f64()?),
                },
                _ => return None,
            };
            Some((name, value))
        })
        .collect()
}

fn props_from_document(document: Document) -> Map<String, Value> {
    document
        .into_iter()
        .filter_map(|(name, value)| {
            let value = match value {
                Bson::String(value) => Value::from(value),
                Bson::Boolean(value) => Value::from(value),
                Bson::Double(value) => Value::from(value),
                Bson::Int32(value) => Value::from(value),
                Bson::Int64(value) => Value::from(value),
                Bson::DateTime(value) => FieldValue::Date(from_bson_time(value)).to_json(),
                _ => return None,
            };
            Some((name, value))
        })
        .collect()
}

fn set_props(set: &mut Document, props: &PropsUpdate) {
    for (name, value) in props {
        set.insert(format!("props.{name}"), field_to_bson(value));
    }
}

/// Filter matching a document by its application id, hiding expired records.
pub fn by_id(id: &str) -> Document {
    doc! { "id": id, "expireAt": { "$gt": DateTime::now() } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoGameDocument {
    id: String,
    status: GameStatus,
    teams: Teams,
    score: Score,
    date: DateTime,
    reference: String,
    expire_at: DateTime,
    #[serde(default)]
    entries: Vec<GameEntry>,
    #[serde(default)]
    props: Document,
}

impl From<GameEntity> for MongoGameDocument {
    fn from(value: GameEntity) -> Self {
        Self {
            id: value.id,
            status: value.status,
            teams: value.teams,
            score: value.score,
            date: to_bson_time(value.date),
            reference: value.reference,
            expire_at: to_bson_time(value.expire_at),
            entries: value.entries,
            props: props_to_document(value.props),
        }
    }
}

impl From<MongoGameDocument> for GameEntity {
    fn from(value: MongoGameDocument) -> Self {
        Self {
            id: value.id,
            status: value.status,
            teams: value.teams,
            score: value.score,
            date: from_bson_time(value.date),
            reference: value.reference,
            expire_at: from_bson_time(value.expire_at),
            entries: value.entries,
            props: props_from_document(value.props),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoPaymentDocument {
    id: String,
    reference: String,
    value: f64,
    #[serde(rename = "type")]
    kind: PaymentType,
    verified: bool,
    expire_at: DateTime,
    #[serde(default)]
    props: Document,
}

impl From<PaymentEntity> for MongoPaymentDocument {
    fn from(value: PaymentEntity) -> Self {
        Self {
            id: value.id,
            reference: value.reference,
            value: value.value,
            kind: value.kind,
            verified: value.verified,
            expire_at: to_bson_time(value.expire_at),
            props: props_to_document(value.props),
        }
    }
}

impl From<MongoPaymentDocument> for PaymentEntity {
    fn from(value: MongoPaymentDocument) -> Self {
        Self {
            id: value.id,
            reference: value.reference,
            value: value.value,
            kind: value.kind,
            verified: value.verified,
            expire_at: from_bson_time(value.expire_at),
            props: props_from_document(value.props),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoSeasonDocument {
    id: String,
    running: bool,
    #[serde(default)]
    amount: f64,
    ticket: f64,
    expire_at: DateTime,
}

impl From<SeasonEntity> for MongoSeasonDocument {
    fn from(value: SeasonEntity) -> Self {
        Self {
            id: value.id,
            running: value.running,
            amount: value.amount,
            ticket: value.ticket,
            expire_at: to_bson_time(value.expire_at),
        }
    }
}

impl From<MongoSeasonDocument> for SeasonEntity {
    fn from(value: MongoSeasonDocument) -> Self {
        Self {
            id: value.id,
            running: value.running,
            amount: value.amount,
            ticket: value.ticket,
            expire_at: from_bson_time(value.expire_at),
        }
    }
}

/// Filter guarding a game write on the status the decision was taken against.
pub fn game_guard(id: &str, expected: GameStatus) -> Document {
    let mut filter = by_id(id);
    filter.insert("status", expected.as_str());
    filter
}

/// Filter guarding a payment write.
pub fn payment_guard(id: &str, guard: PaymentGuard) -> Document {
    let mut filter = by_id(id);
    if guard == PaymentGuard::Unverified {
        filter.insert("verified", doc! { "$ne": true });
    }
    filter
}

pub fn game_set(update: &GameUpdate) -> Document {
    let mut set = Document::new();
    if let Some(status) = update.status {
        set.insert("status", status.as_str());
    }
    if let Some(score) = update.score {
        set.insert("score.visited", i64::from(score.visited));
        set.insert("score.visitor", i64::from(score.visitor));
    }
    if let Some(date) = update.date {
        set.insert("date", to_bson_time(date));
    }
    set_props(&mut set, &update.props);
    doc! { "$set": set }
}

pub fn payment_set(update: &PaymentUpdate) -> Document {
    let mut set = Document::new();
    if let Some(verified) = update.verified {
        set.insert("verified", verified);
    }
    if let Some(expire_at) = update.expire_at {
        set.insert("expireAt", to_bson_time(expire_at));
    }
    if let Some(value) = update.value {
        set.insert("value", value);
        set.insert("type", PaymentType::from_value(value).as_str());
    }
    set_props(&mut set, &update.props);
    doc! { "$set": set }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn close_update_sets_status_and_both_scores() {
        let update = GameUpdate {
            status: Some(GameStatus::Closed),
            score: Some(Score {
                visited: 2,
                visitor: 1,
            }),
            ..GameUpdate::default()
        };
        let set = game_set(&update);
        let fields = set.get_document("$set").unwrap();
        assert_eq!(fields.get_str("status").unwrap(), "closed");
        assert_eq!(fields.get_i64("score.visited").unwrap(), 2);
        assert_eq!(fields.get_i64("score.visitor").unwrap(), 1);
        assert!(fields.get("date").is_none());
    }

    #[test]
    fn patched_props_land_under_props() {
        let kickoff = Utc.with_ymd_and_hms(2024, 5, 28, 20, 0, 0).unwrap();
        let update = GameUpdate {
            props: PropsUpdate::from([
                ("venue".to_string(), FieldValue::String("Maracana".into())),
                ("reopens".to_string(), FieldValue::Date(kickoff)),
            ]),
            ..GameUpdate::default()
        };
        let set = game_set(&update);
        let fields = set.get_document("$set").unwrap();
        assert_eq!(fields.get_str("props.venue").unwrap(), "Maracana");
        assert!(fields.get_datetime("props.reopens").is_ok());

        let payment = payment_set(&PaymentUpdate {
            value: Some(-5.0),
            ..PaymentUpdate::default()
        });
        let fields = payment.get_document("$set").unwrap();
        assert_eq!(fields.get_f64("value").unwrap(), -5.0);
        assert_eq!(fields.get_str("type").unwrap(), "send");
    }

    #[test]
    fn props_survive_the_document_round_trip() {
        let mut props = Map::new();
        props.insert("venue".into(), Value::from("Maracana"));
        props.insert("capacity".into(), Value::from(78_000));
        let document = props_to_document(props.clone());
        assert_eq!(props_from_document(document), props);
    }

    #[test]
    fn unverified_guard_excludes_verified_payments() {
        let filter = payment_guard("pay1", PaymentGuard::Unverified);
        assert_eq!(filter.get_str("id").unwrap(), "pay1");
        assert!(filter.get_document("verified").is_ok());
        assert!(
            payment_guard("pay1", PaymentGuard::Any)
                .get("verified")
                .is_none()
        );
    }

    #[test]
    fn bson_time_keeps_millisecond_precision() {
        let instant = Utc.with_ymd_and_hms(2024, 5, 28, 12, 30, 0).unwrap();
        assert_eq!(from_bson_time(to_bson_time(instant)), instant);
    }
}
