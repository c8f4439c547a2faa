pub mod email;
pub mod handlers;

use crate::cli::globals::Config;
use crate::consumer::PgConsumerStore;
use crate::gateway::RequestDispatcher;
use crate::session::{MemorySessionStore, SessionStore};
use crate::token::TokenLifecycle;
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    routing::{get, post},
    Extension, Router,
};
use email::{EmailSender, LogEmailSender};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: String, config: Config) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let lifecycle = Arc::new(TokenLifecycle::new(
        PgConsumerStore::new(pool.clone()),
        config.admin_email.clone(),
    ));
    let dispatcher = Arc::new(RequestDispatcher::new(&config)?);
    let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let email_sender: Arc<dyn EmailSender> = Arc::new(LogEmailSender);

    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/v1/consumers", post(handlers::register::<PgConsumerStore>))
        .route(
            "/v1/consumers/activate",
            post(handlers::activate::<PgConsumerStore>),
        )
        .route(
            "/v1/consumers/verify",
            post(handlers::verify::<PgConsumerStore>),
        )
        .route(
            "/v1/consumers/reset-key",
            post(handlers::reset_key::<PgConsumerStore>),
        )
        .route(
            "/v1/consumers/refresh-token",
            post(handlers::refresh_token::<PgConsumerStore>),
        )
        .route("/app/login", post(handlers::login))
        .route("/app/logout", post(handlers::logout))
        .route("/app/consumers", post(handlers::store_consumer))
        .route(
            "/app/consumers/:id",
            get(handlers::show)
                .put(handlers::update)
                .delete(handlers::destroy),
        )
        .route("/app/admin/consumers", get(handlers::admin_index))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &Request<Body>| {
                        HeaderValue::from_str(Ulid::new().to_string().as_str()).ok()
                    },
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(lifecycle))
                .layer(Extension(dispatcher))
                .layer(Extension(sessions))
                .layer(Extension(email_sender)),
        );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
