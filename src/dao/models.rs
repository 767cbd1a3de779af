use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Lifecycle status of a scheduled game, persisted under `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    /// Scheduled, no kickoff yet.
    Opened,
    /// Kicked off; scores may be recorded.
    Running,
    /// Final score recorded (terminal).
    Closed,
    /// Abandoned after kickoff (terminal).
    Canceled,
}

impl GameStatus {
    /// Whether no further transition is legal from this status.
    pub fn is_terminal(self) -> bool {
        matches!(self, GameStatus::Closed | GameStatus::Canceled)
    }

    /// Wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            GameStatus::Opened => "opened",
            GameStatus::Running => "running",
            GameStatus::Closed => "closed",
            GameStatus::Canceled => "canceled",
        }
    }
}

/// Reference to a team taking part in a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TeamRef {
    /// Team identifier.
    pub id: String,
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Home (`visited`) and away (`visitor`) teams of a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Teams {
    pub visited: TeamRef,
    pub visitor: TeamRef,
}

/// Goals scored by each side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Score {
    pub visited: u32,
    pub visitor: u32,
}

/// A pool participant's prediction for a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GameEntry {
    /// Client identifier of the participant.
    pub id: String,
    pub visited: u32,
    pub visitor: u32,
}

/// Scheduled game persisted by the storage layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameEntity {
    /// Identifier derived from the team identifiers.
    pub id: String,
    pub status: GameStatus,
    pub teams: Teams,
    pub score: Score,
    /// Scheduled kickoff instant.
    pub date: DateTime<Utc>,
    /// Season reference (`month/year`).
    pub reference: String,
    /// Retention timestamp; the store purges the record once reached.
    pub expire_at: DateTime<Utc>,
    #[serde(default)]
    pub entries: Vec<GameEntry>,
    /// Allow-listed fields without a dedicated column, set through generic patches.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    #[schema(value_type = Object)]
    pub props: Map<String, Value>,
}

/// Direction of a payment, derived from the sign of its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    /// Incoming money (`value > 0`).
    Receive,
    /// Outgoing money (`value <= 0`).
    Send,
}

impl PaymentType {
    /// Derive the type from a signed amount.
    pub fn from_value(value: f64) -> Self {
        if value > 0.0 {
            PaymentType::Receive
        } else {
            PaymentType::Send
        }
    }

    /// Wire name of the type.
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentType::Receive => "receive",
            PaymentType::Send => "send",
        }
    }
}

/// Ledger entry settling against a season, client or game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEntity {
    pub id: String,
    /// Identifier of what this payment settles against; groups the chain.
    pub reference: String,
    /// Signed amount; positive is incoming.
    pub value: f64,
    #[serde(rename = "type")]
    pub kind: PaymentType,
    pub verified: bool,
    pub expire_at: DateTime<Utc>,
    /// Allow-listed fields without a dedicated column, set through generic patches.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    #[schema(value_type = Object)]
    pub props: Map<String, Value>,
}

/// Season record holding the running balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SeasonEntity {
    pub id: String,
    pub running: bool,
    /// Running total of verified payment values.
    pub amount: f64,
    /// Entry fee.
    pub ticket: f64,
    pub expire_at: DateTime<Utc>,
}

/// Value of an allow-listed patch field, typed by its declared kind.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Declared `string`.
    String(String),
    /// Declared `number`.
    Number(f64),
    /// Declared `boolean`.
    Boolean(bool),
    /// Declared `date`, parsed from RFC 3339.
    Date(DateTime<Utc>),
}

impl FieldValue {
    /// JSON form kept in an entity's `props`; dates are RFC 3339 strings.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::String(value) => Value::from(value.as_str()),
            FieldValue::Number(value) => Value::from(*value),
            FieldValue::Boolean(value) => Value::from(*value),
            FieldValue::Date(value) => {
                Value::from(value.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
        }
    }
}

/// Free-form fields written under `props.<name>`.
pub type PropsUpdate = BTreeMap<String, FieldValue>;

fn apply_props(props: &PropsUpdate, target: &mut Map<String, Value>) {
    for (name, value) in props {
        target.insert(name.clone(), value.to_json());
    }
}

/// Field changes applied to a game in a single write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameUpdate {
    pub status: Option<GameStatus>,
    pub score: Option<Score>,
    pub date: Option<DateTime<Utc>>,
    pub props: PropsUpdate,
}

impl GameUpdate {
    /// Whether the update would not touch any field.
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.score.is_none() && self.date.is_none() && self.props.is_empty()
    }

    /// Apply the update to an in-memory snapshot.
    pub fn apply_to(&self, game: &mut GameEntity) {
        if let Some(status) = self.status {
            game.status = status;
        }
        if let Some(score) = self.score {
            game.score = score;
        }
        if let Some(date) = self.date {
            game.date = date;
        }
        apply_props(&self.props, &mut game.props);
    }
}

/// Field changes applied to a payment in a single write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentUpdate {
    pub verified: Option<bool>,
    pub expire_at: Option<DateTime<Utc>>,
    /// New amount; the payment type follows its sign.
    pub value: Option<f64>,
    pub props: PropsUpdate,
}

impl PaymentUpdate {
    /// Whether the update would not touch any field.
    pub fn is_empty(&self) -> bool {
        self.verified.is_none()
            && self.expire_at.is_none()
            && self.value.is_none()
            && self.props.is_empty()
    }

    /// Apply the update to an in-memory snapshot.
    pub fn apply_to(&self, payment: &mut PaymentEntity) {
        if let Some(verified) = self.verified {
            payment.verified = verified;
        }
        if let Some(expire_at) = self.expire_at {
            payment.expire_at = expire_at;
        }
        if let Some(value) = self.value {
            payment.value = value;
            payment.kind = PaymentType::from_value(value);
        }
        apply_props(&self.props, &mut payment.props);
    }
}

/// Extra condition a payment must satisfy for an update to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentGuard {
    /// Match on id only.
    Any,
    /// Match only while the payment is not yet verified.
    Unverified,
}

impl PaymentGuard {
    /// Evaluate the guard against a snapshot.
    pub fn admits(self, payment: &PaymentEntity) -> bool {
        match self {
            PaymentGuard::Any => true,
            PaymentGuard::Unverified => !payment.verified,
        }
    }
}
