use serde::Serialize;
use utoipa::ToSchema;

/// Body of `GET /healthcheck`.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok` while a storage backend answers, `degraded` otherwise.
    pub status: String,
}

impl HealthResponse {
    /// Storage installed and healthy; admin operations are served.
    pub fn ok() -> Self {
        Self { status: "ok".into() }
    }

    /// No usable storage; admin operations answer 503.
    pub fn degraded() -> Self {
        Self {
            status: "degraded".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_the_only_field() {
        assert_eq!(
            serde_json::to_value(HealthResponse::degraded()).unwrap(),
            serde_json::json!({ "status": "degraded" })
        );
    }
}
