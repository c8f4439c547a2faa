//! Browser-facing routes: session login/logout and actions proxied to the
//! backend API on the consumer's behalf.

use super::SharedLifecycle;
use crate::gateway::{
    normalize, Audience, CredentialMode, GatewayError, OutwardResponse, RequestDispatcher,
};
use crate::session::{SessionStore, CONSUMER_TOKEN_KEY};
use crate::token::{RequestContext, RequestOrigin};
use axum::{
    extract::{Extension, Path},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;
use ulid::Ulid;
use utoipa::ToSchema;

const SESSION_COOKIE_NAME: &str = "peranto_session";

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub token: String,
}

fn extract_session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|cookies| {
            cookies.split(';').map(str::trim).find_map(|cookie| {
                cookie
                    .strip_prefix(SESSION_COOKIE_NAME)
                    .and_then(|rest| rest.strip_prefix('='))
                    .map(str::to_string)
            })
        })
}

/// Strip the stored token field before an entity leaves the service.
fn consumer_public(entity: &Value) -> Value {
    let mut out = entity.clone();

    if let Some(map) = out.as_object_mut() {
        map.remove("api_token");
    }

    out
}

/// Resolve the caller's token through the web-app channel: session state,
/// re-verified since this channel bypasses the API admission check.
async fn web_token(
    headers: &HeaderMap,
    sessions: &Arc<dyn SessionStore>,
    lifecycle: &SharedLifecycle,
) -> Option<String> {
    let sid = extract_session_id(headers)?;
    let ctx = RequestContext {
        session_token: sessions.get(&sid, CONSUMER_TOKEN_KEY).await,
        query_token: None,
    };

    lifecycle.extract_token(RequestOrigin::WebApp, &ctx).await
}

/// One backend call, shaped for the browser. Failures arrive as uniform
/// gateway errors and leave as the error branch of the outward contract.
async fn proxy(
    dispatcher: &RequestDispatcher,
    session_token: Option<&str>,
    method: Method,
    path: &str,
    body: Option<&Value>,
    audience: Audience,
    mode: CredentialMode,
) -> Response {
    match dispatcher
        .send(method, path, body, audience, mode, session_token)
        .await
    {
        Ok(result) => normalize(result, consumer_public).into_response(),
        Err(GatewayError { status, message }) => {
            OutwardResponse::Error { status, message }.into_response()
        }
    }
}

/// Log a consumer in to the web app by verifying the submitted token and
/// keeping it in session state.
pub async fn login(
    lifecycle: Extension<SharedLifecycle>,
    sessions: Extension<Arc<dyn SessionStore>>,
    payload: Option<Json<LoginRequest>>,
) -> Response {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let token = request.token.trim().to_string();

    if !lifecycle.verify(&token).await {
        return (StatusCode::UNAUTHORIZED, "Invalid token".to_string()).into_response();
    }

    let sid = Ulid::new().to_string();
    sessions.set(&sid, CONSUMER_TOKEN_KEY, token).await;

    info!("consumer logged in to web app");

    let cookie = format!("{SESSION_COOKIE_NAME}={sid}; Path=/; HttpOnly; SameSite=Strict");

    (StatusCode::NO_CONTENT, [(SET_COOKIE, cookie)]).into_response()
}

/// Log the consumer out and expire the session cookie.
pub async fn logout(
    sessions: Extension<Arc<dyn SessionStore>>,
    headers: HeaderMap,
) -> Response {
    if let Some(sid) = extract_session_id(&headers) {
        sessions.clear(&sid, CONSUMER_TOKEN_KEY).await;
    }

    let cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; Max-Age=0");

    (StatusCode::NO_CONTENT, [(SET_COOKIE, cookie)]).into_response()
}

/// Proxy consumer registration submitted from the web app.
pub async fn store_consumer(
    lifecycle: Extension<SharedLifecycle>,
    sessions: Extension<Arc<dyn SessionStore>>,
    dispatcher: Extension<Arc<RequestDispatcher>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let session_token = web_token(&headers, &sessions, &lifecycle).await;

    proxy(
        &dispatcher,
        session_token.as_deref(),
        Method::POST,
        "/consumers",
        Some(&body),
        Audience::Consumer,
        CredentialMode::QueryParam,
    )
    .await
}

/// Display a consumer's settings data.
pub async fn show(
    lifecycle: Extension<SharedLifecycle>,
    sessions: Extension<Arc<dyn SessionStore>>,
    dispatcher: Extension<Arc<RequestDispatcher>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    let session_token = web_token(&headers, &sessions, &lifecycle).await;

    proxy(
        &dispatcher,
        session_token.as_deref(),
        Method::GET,
        &format!("/consumers/{id}"),
        None,
        Audience::Consumer,
        CredentialMode::QueryParam,
    )
    .await
}

/// Update a consumer on the backend.
pub async fn update(
    lifecycle: Extension<SharedLifecycle>,
    sessions: Extension<Arc<dyn SessionStore>>,
    dispatcher: Extension<Arc<RequestDispatcher>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    let session_token = web_token(&headers, &sessions, &lifecycle).await;

    proxy(
        &dispatcher,
        session_token.as_deref(),
        Method::PUT,
        &format!("/consumers/{id}"),
        Some(&body),
        Audience::Consumer,
        CredentialMode::QueryParam,
    )
    .await
}

/// Delete a consumer on the backend.
pub async fn destroy(
    lifecycle: Extension<SharedLifecycle>,
    sessions: Extension<Arc<dyn SessionStore>>,
    dispatcher: Extension<Arc<RequestDispatcher>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    let session_token = web_token(&headers, &sessions, &lifecycle).await;

    proxy(
        &dispatcher,
        session_token.as_deref(),
        Method::DELETE,
        &format!("/consumers/{id}"),
        None,
        Audience::Consumer,
        CredentialMode::QueryParam,
    )
    .await
}

/// Administrative listing; always acts with the fixed admin credential over
/// the elevated API version, regardless of the caller's session.
pub async fn admin_index(dispatcher: Extension<Arc<RequestDispatcher>>) -> Response {
    proxy(
        &dispatcher,
        None,
        Method::GET,
        "/consumers",
        None,
        Audience::Admin,
        CredentialMode::Header,
    )
    .await
}
