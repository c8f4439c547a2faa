//! Shaping heterogeneous backend results into one outward response contract.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};

/// Closed set of result shapes a backend call can produce. Every reachable
/// backend body maps to exactly one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendResult {
    Entity(Value),
    Collection(Vec<Value>),
    ErrorPayload { status: u16, message: String },
    Empty,
}

impl BackendResult {
    /// Classify a successful response body.
    ///
    /// Arrays become collections, objects carrying an embedded `status >= 400`
    /// become error payloads, any other object or scalar is a single entity,
    /// and an empty body is empty. Non-JSON text is folded into a string
    /// entity so classification stays total.
    #[must_use]
    pub fn from_body(body: &str) -> Self {
        if body.trim().is_empty() {
            return Self::Empty;
        }

        match serde_json::from_str::<Value>(body) {
            Ok(value) => Self::from_value(value),
            Err(_) => Self::Entity(Value::String(body.to_string())),
        }
    }

    fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Self::Empty,
            Value::Array(items) => Self::Collection(items),
            Value::Object(map) => {
                let embedded_status = map.get("status").and_then(Value::as_u64);

                match embedded_status {
                    Some(status) if status >= 400 => Self::ErrorPayload {
                        status: u16::try_from(status).unwrap_or(500),
                        message: map
                            .get("message")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                    },
                    _ => Self::Entity(Value::Object(map)),
                }
            }
            other => Self::Entity(other),
        }
    }
}

/// The single response contract handed back to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutwardResponse {
    Error { status: u16, message: String },
    Collection(Vec<Value>),
    Item(Value),
    NoContent,
}

/// Shape a backend result for the outward caller, applying the per-entity
/// transformer to items and collections.
///
/// The match is exhaustive over the closed variant, so normalization is total
/// by construction; there is no fallback arm to reach.
pub fn normalize<F>(result: BackendResult, transform: F) -> OutwardResponse
where
    F: Fn(&Value) -> Value,
{
    match result {
        BackendResult::ErrorPayload { status, message } => {
            OutwardResponse::Error { status, message }
        }
        BackendResult::Collection(items) => {
            OutwardResponse::Collection(items.iter().map(transform).collect())
        }
        BackendResult::Entity(entity) => OutwardResponse::Item(transform(&entity)),
        BackendResult::Empty => OutwardResponse::NoContent,
    }
}

impl IntoResponse for OutwardResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Error { status, message } => (
                StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                Json(json!({ "message": message, "status": status })),
            )
                .into_response(),
            Self::Collection(items) => Json(json!({ "data": items })).into_response(),
            Self::Item(item) => Json(json!({ "data": item })).into_response(),
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(value: &Value) -> Value {
        value.clone()
    }

    #[test]
    fn from_body_classifies_collection() {
        let result = BackendResult::from_body(r#"[{"id": 1}, {"id": 2}]"#);

        assert_eq!(
            result,
            BackendResult::Collection(vec![json!({"id": 1}), json!({"id": 2})])
        );
    }

    #[test]
    fn from_body_classifies_entity() {
        let result = BackendResult::from_body(r#"{"id": 1, "email": "a@example.com"}"#);

        assert_eq!(
            result,
            BackendResult::Entity(json!({"id": 1, "email": "a@example.com"}))
        );
    }

    #[test]
    fn from_body_classifies_error_payload() {
        let result = BackendResult::from_body(r#"{"status": 404, "message": "Not found"}"#);

        assert_eq!(
            result,
            BackendResult::ErrorPayload {
                status: 404,
                message: "Not found".to_string()
            }
        );
    }

    #[test]
    fn from_body_treats_sub_400_status_as_entity() {
        let result = BackendResult::from_body(r#"{"status": 200, "message": "ok"}"#);

        assert_eq!(
            result,
            BackendResult::Entity(json!({"status": 200, "message": "ok"}))
        );
    }

    #[test]
    fn from_body_classifies_empty() {
        assert_eq!(BackendResult::from_body(""), BackendResult::Empty);
        assert_eq!(BackendResult::from_body("  "), BackendResult::Empty);
        assert_eq!(BackendResult::from_body("null"), BackendResult::Empty);
    }

    #[test]
    fn from_body_folds_non_json_into_entity() {
        assert_eq!(
            BackendResult::from_body("plain text"),
            BackendResult::Entity(Value::String("plain text".to_string()))
        );
    }

    #[test]
    fn normalize_covers_all_four_outcomes() {
        assert_eq!(
            normalize(
                BackendResult::ErrorPayload {
                    status: 422,
                    message: "bad".to_string()
                },
                identity
            ),
            OutwardResponse::Error {
                status: 422,
                message: "bad".to_string()
            }
        );

        assert_eq!(
            normalize(BackendResult::Collection(vec![json!(1)]), identity),
            OutwardResponse::Collection(vec![json!(1)])
        );

        assert_eq!(
            normalize(BackendResult::Entity(json!({"id": 1})), identity),
            OutwardResponse::Item(json!({"id": 1}))
        );

        assert_eq!(
            normalize(BackendResult::Empty, identity),
            OutwardResponse::NoContent
        );
    }

    #[test]
    fn normalize_applies_per_entity_transform() {
        let strip = |value: &Value| {
            let mut out = value.clone();
            if let Some(map) = out.as_object_mut() {
                map.remove("api_token");
            }
            out
        };

        let result = normalize(
            BackendResult::Collection(vec![json!({"id": 1, "api_token": "digest"})]),
            strip,
        );

        assert_eq!(
            result,
            OutwardResponse::Collection(vec![json!({"id": 1})])
        );
    }
}
