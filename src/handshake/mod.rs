//! Handshake orchestration between the client, the relay and the provider.
//!
//! One attempt moves `INITIATED -> IDP_ACCEPTED -> STORED` during start-auth and
//! `CALLBACK_RECEIVED -> DATA_FETCHED -> REDIRECTED` during the callback. A
//! provider refusal at start ends in `REJECTED`; any other failure in `ABORTED`.
//! Nothing is rolled back: a record written before a failure simply expires.

mod error;
pub mod hasher;

pub use self::error::Error;
pub use self::hasher::{IntegrityHasher, hash};

use crate::{
    correlation::CorrelationStore,
    hoda::{CallbackPayload, CallbackRequest, HodaClient, HodaError, StartAuthResult, VerifiedData},
};
use std::{fmt, sync::Arc, time::Duration};
use tracing::{Span, debug, error, info, instrument, warn};
use url::{Url, form_urlencoded};
use uuid::Uuid;

const DEFAULT_CORRELATION_TTL_SECONDS: u64 = 5 * 60;
const CALLBACK_PATH: &str = "/callback";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Initiated,
    IdpAccepted,
    Stored,
    CallbackReceived,
    DataFetched,
    Redirected,
    Rejected,
    Aborted,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Initiated => "INITIATED",
            Self::IdpAccepted => "IDP_ACCEPTED",
            Self::Stored => "STORED",
            Self::CallbackReceived => "CALLBACK_RECEIVED",
            Self::DataFetched => "DATA_FETCHED",
            Self::Redirected => "REDIRECTED",
            Self::Rejected => "REJECTED",
            Self::Aborted => "ABORTED",
        })
    }
}

#[derive(Clone, Debug)]
pub struct HandshakeConfig {
    relay_base_url: String,
    sp_rest_id: String,
    service_id: u64,
    correlation_ttl: Duration,
}

impl HandshakeConfig {
    #[must_use]
    pub fn new(relay_base_url: String, sp_rest_id: String, service_id: u64) -> Self {
        Self {
            relay_base_url,
            sp_rest_id,
            service_id,
            correlation_ttl: Duration::from_secs(DEFAULT_CORRELATION_TTL_SECONDS),
        }
    }

    #[must_use]
    pub fn with_correlation_ttl(mut self, ttl: Duration) -> Self {
        self.correlation_ttl = ttl;
        self
    }

    #[must_use]
    pub fn relay_base_url(&self) -> &str {
        &self.relay_base_url
    }

    #[must_use]
    pub fn correlation_ttl(&self) -> Duration {
        self.correlation_ttl
    }
}

/// Where the end user goes once the callback succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackOutcome {
    pub redirect_url: String,
}

pub struct Handshake {
    config: HandshakeConfig,
    hasher: IntegrityHasher,
    hoda: HodaClient,
    store: Arc<dyn CorrelationStore>,
}

impl Handshake {
    #[must_use]
    pub fn new(
        config: HandshakeConfig,
        hasher: IntegrityHasher,
        hoda: HodaClient,
        store: Arc<dyn CorrelationStore>,
    ) -> Self {
        Self {
            config,
            hasher,
            hoda,
            store,
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn CorrelationStore> {
        &self.store
    }

    /// Register a session with the provider and remember the client's callback.
    ///
    /// A provider refusal is returned as `Ok` with the provider's status, so the
    /// client sees it verbatim.
    ///
    /// # Errors
    /// Returns an error for an unusable callback URL or when the provider
    /// cannot be reached or answers with something unparseable.
    #[instrument(skip(self), fields(session_id = tracing::field::Empty))]
    pub async fn start_auth(&self, client_callback_url: &str) -> Result<StartAuthResult, Error> {
        let client_callback_url = validate_client_callback_url(client_callback_url)?;

        let session_id = new_session_id();
        Span::current().record("session_id", session_id.as_str());

        let callback_url = relay_callback_url(self.config.relay_base_url());
        let hashed_data = self.hasher.digest(&[session_id.as_str()]);

        debug!(state = %State::Initiated, %callback_url, "sending start-auth");

        let mut result = self
            .hoda
            .start_auth(
                &self.config.sp_rest_id,
                &session_id,
                &callback_url,
                self.config.service_id,
                &hashed_data,
            )
            .await
            .inspect_err(|err| error!(state = %State::Aborted, "start-auth failed: {err}"))?;

        if !result.status.is_ok() {
            warn!(
                state = %State::Rejected,
                status = %result.status,
                errors = ?result.errors,
                "provider rejected start-auth"
            );
            return Ok(result);
        }

        let Some(payload) = result.payload.as_ref() else {
            error!(state = %State::Aborted, "start-auth accepted without payload");
            return Err(HodaError::MissingPayload("start-auth payload").into());
        };

        let session_id = match payload.sp_req_id.as_deref() {
            Some(echoed) if echoed != session_id => {
                warn!(echoed, "provider echoed a different spReqId");
                echoed.to_string()
            }
            Some(echoed) => echoed.to_string(),
            None => session_id,
        };

        let gateway_hash = self
            .hasher
            .digest(&[payload.ref_id.as_str(), session_id.as_str()]);
        let redirect_url = gateway_redirect_url(
            &self.hoda.config().auth_gateway_url(),
            &gateway_hash,
            &payload.ref_id,
        );

        info!(state = %State::IdpAccepted, ref_id = %payload.ref_id, "provider accepted start-auth");

        // The redirect is returned even if the record is lost; the callback for
        // this session will then end in a correlation miss.
        match self
            .store
            .put(
                &session_id,
                client_callback_url.as_str(),
                self.config.correlation_ttl,
            )
            .await
        {
            Ok(()) => {
                info!(state = %State::Stored, "correlation record stored");
            }
            Err(err) => {
                error!(
                    event = "correlation_persist_failed",
                    %session_id,
                    "Failed to store correlation record: {err}"
                );
            }
        }

        result.redirect_url = Some(redirect_url);

        Ok(result)
    }

    /// Resolve a provider callback into the client redirect target.
    ///
    /// # Errors
    /// Returns an error if the callback is not OK, its payload is unusable, the
    /// provider refuses get-data, or no live correlation record exists.
    #[instrument(skip(self, request), fields(session_id = tracing::field::Empty))]
    pub async fn callback(&self, request: &CallbackRequest) -> Result<CallbackOutcome, Error> {
        if !request.status.is_ok() {
            warn!(
                state = %State::Aborted,
                status = %request.status,
                errors = ?request.errors,
                "callback with non-OK status"
            );
            return Err(Error::InboundRejected(request.status.clone()));
        }

        let payload = CallbackPayload::parse(request.payload.as_deref()).map_err(|reason| {
            warn!(
                state = %State::Aborted,
                raw_payload = ?request.payload,
                "Invalid callback payload: {reason}"
            );
            Error::InvalidPayload(reason)
        })?;

        Span::current().record("session_id", payload.sp_req_id.as_str());
        debug!(state = %State::CallbackReceived, ref_id = %payload.ref_id, "callback received");

        let hashed_data = self
            .hasher
            .digest(&[payload.ref_id.as_str(), payload.sp_req_id.as_str()]);
        let data = self
            .hoda
            .get_data(&payload.auth_assertion, &payload.ref_id, &hashed_data)
            .await
            .inspect_err(|err| error!(state = %State::Aborted, "get-data failed: {err}"))?;

        if !data.status.is_ok() {
            warn!(
                state = %State::Aborted,
                status = %data.status,
                errors = ?data.errors,
                "provider rejected get-data"
            );
            return Err(Error::UpstreamRejected {
                step: "get-data",
                status: data.status,
            });
        }

        let Some(verified) = data.payload else {
            error!(state = %State::Aborted, "get-data accepted without payload");
            return Err(HodaError::MissingPayload("get-data payload").into());
        };

        debug!(state = %State::DataFetched, "verified data fetched");

        let Some(client_callback_url) = self
            .store
            .take(&payload.sp_req_id)
            .await
            .inspect_err(|err| error!(state = %State::Aborted, "Correlation lookup failed: {err}"))?
        else {
            error!(
                event = "correlation_miss",
                state = %State::Aborted,
                session_id = %payload.sp_req_id,
                "No live correlation record for callback"
            );
            return Err(Error::CorrelationMiss(payload.sp_req_id));
        };

        let redirect_url = client_redirect_url(&client_callback_url, &verified);

        info!(state = %State::Redirected, "redirecting to client");

        Ok(CallbackOutcome { redirect_url })
    }
}

/// Random session id (`spReqId`), UUID v4.
#[must_use]
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// The relay's callback URL in the provider's form-field convention, which
/// writes `://` as `_//`.
#[must_use]
pub fn relay_callback_url(relay_base_url: &str) -> String {
    format!("{}{CALLBACK_PATH}", relay_base_url.trim_end_matches('/')).replacen("://", "_//", 1)
}

/// Gateway URL the end user is sent to after a successful start-auth.
#[must_use]
pub fn gateway_redirect_url(auth_gateway_url: &str, hashed_data: &str, ref_id: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("hashedData", hashed_data)
        .append_pair("refId", ref_id)
        .finish();

    format!("{auth_gateway_url}?{query}")
}

/// Client callback URL with the public verified fields added to its query.
///
/// Fields go before any fragment and after any existing query parameters.
#[must_use]
pub fn client_redirect_url(client_callback_url: &str, data: &VerifiedData) -> String {
    let fields = data.public_fields();
    if fields.is_empty() {
        return client_callback_url.to_string();
    }

    match Url::parse(client_callback_url) {
        Ok(mut url) => {
            url.query_pairs_mut().extend_pairs(fields);
            url.into()
        }
        Err(err) => {
            // Records are written from a parsed URL, so this only happens for
            // values put into the store by something else.
            warn!("Stored callback URL does not parse: {err}");
            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(fields)
                .finish();
            let separator = if client_callback_url.contains('?') {
                '&'
            } else {
                '?'
            };
            format!("{client_callback_url}{separator}{query}")
        }
    }
}

/// Accept only absolute `http`/`https` URLs with a host.
///
/// The parsed URL is returned so callers keep its normalized form; the parser
/// strips surrounding whitespace along with any tab or newline inside.
///
/// # Errors
/// Returns [`Error::InvalidCallbackUrl`] otherwise.
pub fn validate_client_callback_url(candidate: &str) -> Result<Url, Error> {
    let url = Url::parse(candidate.trim())
        .map_err(|err| Error::InvalidCallbackUrl(format!("{candidate}: {err}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidCallbackUrl(format!(
            "{candidate}: unsupported scheme {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(Error::InvalidCallbackUrl(format!("{candidate}: missing host")));
    }

    Ok(url)
}
