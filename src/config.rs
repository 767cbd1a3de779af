//! Application-level configuration loading: season ticket price, event hub sizing and
//! the declared patch allow-lists.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::fields::FieldAllowLists;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "SPORTS_POOL_BACK_CONFIG_PATH";
/// Environment variable overriding the season ticket price at load time.
const TICKET_ENV: &str = "APP_TICKET";
const DEFAULT_TICKET: f64 = 3.5;
const DEFAULT_EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Entry fee stamped on every season created.
    pub ticket: f64,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
    /// Fields accepted by generic patches, per entity.
    pub fields: FieldAllowLists,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        ticket = app_config.ticket,
                        "loaded application config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };
        config.with_ticket_override(env::var(TICKET_ENV).ok().as_deref())
    }

    /// Apply the `APP_TICKET` override when it holds a usable price.
    fn with_ticket_override(mut self, raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
            return self;
        };
        match raw.parse::<f64>() {
            Ok(ticket) if ticket.is_finite() && ticket >= 0.0 => {
                info!(ticket, "season ticket overridden from environment");
                self.ticket = ticket;
            }
            _ => warn!(value = raw, "ignoring invalid APP_TICKET value"),
        }
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ticket: DEFAULT_TICKET,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            fields: FieldAllowLists::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    ticket: Option<f64>,
    #[serde(default)]
    event_capacity: Option<usize>,
    #[serde(default)]
    fields: FieldAllowLists,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            ticket: value.ticket.unwrap_or(DEFAULT_TICKET),
            event_capacity: value
                .event_capacity
                .filter(|capacity| *capacity > 0)
                .unwrap_or(DEFAULT_EVENT_CAPACITY),
            fields: checked_fields(value.fields),
        }
    }
}

/// Keep the declared allow-lists unless an entry is unusable, in which case the
/// built-in tables apply.
fn checked_fields(fields: FieldAllowLists) -> FieldAllowLists {
    match fields.check() {
        Ok(()) => fields,
        Err(err) => {
            warn!(error = %err, "ignoring configured field allow-lists");
            FieldAllowLists::default()
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::fields::FieldKind;

    #[test]
    fn partial_file_keeps_defaults() {
        let raw: RawConfig = serde_json::from_str(r#"{ "ticket": 5.0 }"#).unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.ticket, 5.0);
        assert_eq!(config.event_capacity, DEFAULT_EVENT_CAPACITY);
        assert_eq!(config.fields, FieldAllowLists::default());
    }

    #[test]
    fn declared_fields_are_read() {
        let raw: RawConfig = serde_json::from_str(
            r#"{ "event_capacity": 8, "fields": { "payment": { "verified": "boolean", "note": "string" } } }"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.event_capacity, 8);
        assert_eq!(config.fields.payment["note"], FieldKind::String);
        assert_eq!(config.fields.game, FieldAllowLists::default().game);
    }

    #[test]
    fn unusable_allow_lists_fall_back_to_defaults() {
        let raw: RawConfig = serde_json::from_str(
            r#"{ "fields": { "game": { "date": "date", "status": "string" } } }"#,
        )
        .unwrap();
        assert_eq!(AppConfig::from(raw).fields, FieldAllowLists::default());
    }

    #[test]
    fn ticket_override_accepts_prices_only() {
        assert_eq!(
            AppConfig::default().with_ticket_override(Some("4.25")).ticket,
            4.25
        );
        assert_eq!(
            AppConfig::default().with_ticket_override(Some("free")).ticket,
            DEFAULT_TICKET
        );
        assert_eq!(
            AppConfig::default().with_ticket_override(Some("-1")).ticket,
            DEFAULT_TICKET
        );
        assert_eq!(AppConfig::default().with_ticket_override(None).ticket, DEFAULT_TICKET);
    }
}
