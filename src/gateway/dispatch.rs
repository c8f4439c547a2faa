//! Outgoing calls to the versioned backend API.
//!
//! Every transport or backend-signaled failure is caught here and converted
//! into a uniform `GatewayError`; raw failures never reach the outward caller
//! and nothing is retried.

use super::credentials::{Audience, CredentialSelector};
use super::normalize::BackendResult;
use crate::cli::globals::Config;
use crate::peranto::APP_USER_AGENT;
use anyhow::{Context, Result};
use reqwest::{header::AUTHORIZATION, Client, Method, StatusCode};
use secrecy::ExposeSecret;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, instrument};

/// How the selected credential travels with the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialMode {
    /// `?api_access_token=<token>` appended to the path.
    QueryParam,
    /// `Authorization: Bearer <token>` header.
    Header,
}

/// Uniform failure shape for backend calls: the backend's status and message
/// when it answered, a gateway-level status when transport itself failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("backend call failed: {status} {message}")]
pub struct GatewayError {
    pub status: u16,
    pub message: String,
}

/// Issues GET/POST/PUT/DELETE calls to the backend API with the credential
/// resolved per call by the selector.
#[derive(Debug, Clone)]
pub struct RequestDispatcher {
    client: Client,
    backend_url: String,
    selector: CredentialSelector,
}

impl RequestDispatcher {
    /// # Errors
    /// Returns an error if the backend URL is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let backend_url = url::Url::parse(&config.backend_url)
            .with_context(|| format!("invalid backend URL: {}", config.backend_url))?;

        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()
            .context("failed to build backend HTTP client")?;

        Ok(Self {
            client,
            backend_url: backend_url.as_str().trim_end_matches('/').to_string(),
            selector: CredentialSelector::new(config),
        })
    }

    fn endpoint_url(&self, audience: Audience, path: &str) -> String {
        let version = audience.version().as_str();
        let path = path.strip_prefix('/').unwrap_or(path);

        format!("{}/{version}/{path}", self.backend_url)
    }

    /// Issue one backend call and decode the result.
    ///
    /// # Errors
    /// Returns a `GatewayError` carrying the backend's status and message when
    /// the backend answered with an error, or a 502-shaped error when the
    /// transport itself failed. Never retried.
    #[instrument(skip(self, body))]
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        audience: Audience,
        mode: CredentialMode,
        session_token: Option<&str>,
    ) -> Result<BackendResult, GatewayError> {
        let credential = self.selector.select(audience, session_token);
        let url = self.endpoint_url(audience, path);

        debug!("dispatching {} {}", method, url);

        let mut request = self.client.request(method, &url);

        request = match mode {
            CredentialMode::QueryParam => {
                request.query(&[("api_access_token", credential.expose_secret())])
            }
            CredentialMode::Header => request.header(
                AUTHORIZATION,
                format!("Bearer {}", credential.expose_secret()),
            ),
        };

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|err| {
            error!("backend transport failure: {err}");

            GatewayError {
                status: err.status().map_or(502, |status| status.as_u16()),
                message: "backend unreachable".to_string(),
            }
        })?;

        let status = response.status();

        if !status.is_success() {
            let message = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|json| {
                    json.get("message")
                        .and_then(Value::as_str)
                        .map(ToString::to_string)
                })
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("backend call failed")
                        .to_string()
                });

            return Err(GatewayError {
                status: status.as_u16(),
                message,
            });
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(BackendResult::Empty);
        }

        let body = response.text().await.map_err(|err| {
            error!("failed to read backend response body: {err}");

            GatewayError {
                status: 502,
                message: "unreadable backend response".to_string(),
            }
        })?;

        Ok(BackendResult::from_body(&body))
    }
}
