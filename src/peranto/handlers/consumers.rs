//! Credential-issuance endpoints: registration, activation, verification and
//! the reset flow.

use super::valid_email;
use crate::consumer::ConsumerStore;
use crate::peranto::email::EmailSender;
use crate::token::codec::{self, TokenStatus};
use crate::token::TokenLifecycle;
use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterResponse {
    pub id: i64,
    pub email: String,
    /// The valid (submittable) token, shown exactly once.
    pub token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ActivateRequest {
    pub token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyRequest {
    pub token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResetKeyRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RefreshTokenRequest {
    pub email: String,
    pub reset_key: String,
}

/// Register a consumer and hand out its token, shown exactly once.
#[utoipa::path(
    post,
    path = "/v1/consumers",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Consumer created, token shown once", body = RegisterResponse),
        (status = 400, description = "Missing or invalid email", body = String),
        (status = 409, description = "Email already registered", body = String),
    ),
    tag = "consumers"
)]
pub async fn register<S: ConsumerStore + 'static>(
    lifecycle: Extension<Arc<TokenLifecycle<S>>>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let request: RegisterRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = request.email.trim().to_lowercase();
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }

    let starter_token = codec::generate_starter_token();

    match lifecycle.store().create(&email, &starter_token).await {
        Ok(Some(consumer)) => {
            let token = lifecycle.generate_valid_token(&consumer);

            info!(consumer_id = consumer.id, "consumer registered");

            (
                StatusCode::CREATED,
                Json(RegisterResponse {
                    id: consumer.id,
                    email: consumer.email,
                    token,
                }),
            )
                .into_response()
        }
        Ok(None) => (
            StatusCode::CONFLICT,
            "Email already registered".to_string(),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to create consumer: {err}");

            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Registration failed".to_string(),
            )
                .into_response()
        }
    }
}

/// Activate a submitted valid token: hash it and persist the digest.
///
/// The consumer id is re-derived from the token itself; a malformed
/// submission is reported to the end user here, unlike on verification paths.
#[utoipa::path(
    post,
    path = "/v1/consumers/activate",
    request_body = ActivateRequest,
    responses(
        (status = 204, description = "Token activated"),
        (status = 400, description = "Malformed or mismatched token", body = String),
        (status = 404, description = "Unknown consumer", body = String),
    ),
    tag = "consumers"
)]
pub async fn activate<S: ConsumerStore + 'static>(
    lifecycle: Extension<Arc<TokenLifecycle<S>>>,
    payload: Option<Json<ActivateRequest>>,
) -> impl IntoResponse {
    let request: ActivateRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let token = request.token.trim();
    if token.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing token".to_string()).into_response();
    }

    let parts = match codec::parse(token) {
        Ok(parts) => parts,
        Err(_) => {
            return (StatusCode::BAD_REQUEST, "Malformed token".to_string()).into_response()
        }
    };

    let consumer = match lifecycle.resolve_consumer(token).await {
        Ok(Some(consumer)) => consumer,
        Ok(None) => {
            return (StatusCode::NOT_FOUND, "Unknown consumer".to_string()).into_response()
        }
        Err(err) => {
            error!("Failed to resolve consumer: {err}");

            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Activation failed".to_string(),
            )
                .into_response();
        }
    };

    // The stored field must still hold the starter this submission was
    // derived from; anything else is not an activatable state.
    let stored_starter = consumer
        .api_token
        .as_deref()
        .filter(|stored| codec::classify(stored) == TokenStatus::Starter);
    if stored_starter != Some(parts.starter_token.as_str()) {
        return (
            StatusCode::BAD_REQUEST,
            "Invalid activation token".to_string(),
        )
            .into_response();
    }

    let digest = match lifecycle.activate(token) {
        Ok(digest) => digest,
        Err(err) => {
            error!("Failed to hash token: {err}");

            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Activation failed".to_string(),
            )
                .into_response();
        }
    };

    if let Err(err) = lifecycle.store().update_token(consumer.id, &digest).await {
        error!("Failed to persist active token: {err}");

        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Activation failed".to_string(),
        )
            .into_response();
    }

    info!(consumer_id = consumer.id, "token activated");

    StatusCode::NO_CONTENT.into_response()
}

/// Admission check for the direct-API channel: 202 when the token verifies.
#[utoipa::path(
    post,
    path = "/v1/consumers/verify",
    request_body = VerifyRequest,
    responses(
        (status = 202, description = "Token is valid"),
        (status = 401, description = "Token is invalid"),
    ),
    tag = "consumers"
)]
pub async fn verify<S: ConsumerStore + 'static>(
    lifecycle: Extension<Arc<TokenLifecycle<S>>>,
    payload: Option<Json<VerifyRequest>>,
) -> impl IntoResponse {
    let request: VerifyRequest = match payload {
        Some(Json(payload)) => payload,
        None => return StatusCode::UNAUTHORIZED,
    };

    if lifecycle.verify(request.token.trim()).await {
        StatusCode::ACCEPTED
    } else {
        StatusCode::UNAUTHORIZED
    }
}

/// Generate a reset key and hand it to the email collaborator.
///
/// Always responds 204 so the endpoint cannot be used to probe for accounts;
/// the key itself is never persisted.
#[utoipa::path(
    post,
    path = "/v1/consumers/reset-key",
    request_body = ResetKeyRequest,
    responses(
        (status = 204, description = "Reset key generated and delivered out-of-band"),
        (status = 400, description = "Missing payload", body = String),
    ),
    tag = "consumers"
)]
pub async fn reset_key<S: ConsumerStore + 'static>(
    lifecycle: Extension<Arc<TokenLifecycle<S>>>,
    email_sender: Extension<Arc<dyn EmailSender>>,
    payload: Option<Json<ResetKeyRequest>>,
) -> impl IntoResponse {
    let request: ResetKeyRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = request.email.trim().to_lowercase();

    match lifecycle.store().find_by_email(&email).await {
        Ok(Some(consumer)) => {
            let key = codec::generate_reset_key();

            if let Err(err) = email_sender.send(
                &consumer.email,
                "Your API token reset key",
                &format!("Reset key: {key}"),
            ) {
                error!("Failed to deliver reset key: {err}");
            }
        }
        Ok(None) => {}
        Err(err) => {
            error!("Failed to lookup consumer for reset key: {err}");
        }
    }

    StatusCode::NO_CONTENT.into_response()
}

/// Replace the stored token with a fresh starter and return the new valid
/// token. The prior active token stops verifying immediately.
#[utoipa::path(
    post,
    path = "/v1/consumers/refresh-token",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Fresh token issued, shown once", body = RegisterResponse),
        (status = 400, description = "Missing reset key", body = String),
        (status = 404, description = "Unknown consumer", body = String),
    ),
    tag = "consumers"
)]
pub async fn refresh_token<S: ConsumerStore + 'static>(
    lifecycle: Extension<Arc<TokenLifecycle<S>>>,
    payload: Option<Json<RefreshTokenRequest>>,
) -> impl IntoResponse {
    let request: RefreshTokenRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    if request.reset_key.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing reset key".to_string()).into_response();
    }

    let email = request.email.trim().to_lowercase();

    let consumer = match lifecycle.store().find_by_email(&email).await {
        Ok(Some(consumer)) => consumer,
        Ok(None) => {
            return (StatusCode::NOT_FOUND, "Unknown consumer".to_string()).into_response()
        }
        Err(err) => {
            error!("Failed to lookup consumer for refresh: {err}");

            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Refresh failed".to_string(),
            )
                .into_response();
        }
    };

    let starter_token = codec::generate_starter_token();

    if let Err(err) = lifecycle
        .store()
        .update_token(consumer.id, &starter_token)
        .await
    {
        error!("Failed to persist fresh starter token: {err}");

        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Refresh failed".to_string(),
        )
            .into_response();
    }

    let refreshed = crate::consumer::Consumer {
        api_token: Some(starter_token),
        ..consumer
    };
    let token = lifecycle.generate_valid_token(&refreshed);

    info!(consumer_id = refreshed.id, "token refreshed");

    (
        StatusCode::OK,
        Json(RegisterResponse {
            id: refreshed.id,
            email: refreshed.email,
            token,
        }),
    )
        .into_response()
}
