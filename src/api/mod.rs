use crate::{cli::telemetry, handshake::Handshake};
use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    routing::{get, post},
};
use std::{fmt, str::FromStr, sync::Arc};
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, debug_span, error, info};
use ulid::Ulid;
use url::form_urlencoded;

pub mod handlers;
mod openapi;

pub use self::openapi::openapi;

const REQUEST_ID: &str = "x-request-id";

/// How the callback redirect target is written into `Location`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RedirectEncoding {
    /// Percent-encode the whole target once more with the `encodeURIComponent`
    /// character set, the way existing client integrations expect it.
    #[default]
    Component,
    /// Use the target as-is.
    None,
}

impl RedirectEncoding {
    #[must_use]
    pub fn apply(self, target: &str) -> String {
        match self {
            // `byte_serialize` writes spaces as `+` and escapes `!'()~`. A literal
            // `+` or `%` in the input is already `%2B` or `%25`, so neither
            // substitution can touch it.
            Self::Component => form_urlencoded::byte_serialize(target.as_bytes())
                .collect::<String>()
                .replace('+', "%20")
                .replace("%21", "!")
                .replace("%27", "'")
                .replace("%28", "(")
                .replace("%29", ")")
                .replace("%7E", "~"),
            Self::None => target.to_string(),
        }
    }
}

impl FromStr for RedirectEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "component" => Ok(Self::Component),
            "none" => Ok(Self::None),
            other => Err(format!(
                "invalid redirect encoding '{other}', expected 'component' or 'none'"
            )),
        }
    }
}

impl fmt::Display for RedirectEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Component => "component",
            Self::None => "none",
        })
    }
}

/// Build the relay router with request-id and tracing layers.
#[must_use]
pub fn router(handshake: Arc<Handshake>, redirect_encoding: RedirectEncoding) -> Router {
    Router::new()
        .route("/start-auth", post(handlers::start_auth))
        .route("/callback", post(handlers::callback))
        .route("/health", get(handlers::health).options(handlers::health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static(REQUEST_ID),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    REQUEST_ID,
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(handshake))
                .layer(Extension(redirect_encoding)),
        )
}

/// Serve the relay until SIGINT or SIGTERM.
/// # Errors
/// Returns an error if the listener cannot be bound or the server fails
pub async fn new(
    port: u16,
    handshake: Arc<Handshake>,
    redirect_encoding: RedirectEncoding,
) -> Result<()> {
    let app = router(handshake, redirect_encoding);

    let listener = TcpListener::bind(format!("::0:{port}"))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    telemetry::shutdown_tracer();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let headers = request.headers();
    let method = request.method().as_str();
    let path = request.uri().path();
    let request_id = headers
        .get(REQUEST_ID)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", method, path, request_id)
}
