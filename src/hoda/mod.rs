//! Typed client for the two Hoda REST operations the relay uses.

pub mod types;

pub use types::{
    CallbackPayload, CallbackRequest, GetDataResult, StartAuthPayload, StartAuthResult, Status,
    VerifiedData,
};

use crate::APP_USER_AGENT;
use reqwest::{
    Client,
    header::{ACCEPT, HeaderMap, HeaderValue},
};
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, instrument};
use types::{GetDataForm, StartAuthForm};

const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

#[derive(Debug, Error)]
pub enum HodaError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected response from {url} (HTTP {status}): {source}")]
    Decode {
        url: String,
        status: u16,
        #[source]
        source: serde_json::Error,
    },
    #[error("provider accepted the request but sent no {0}")]
    MissingPayload(&'static str),
}

/// Provider endpoints. Paths are appended verbatim to the base URL.
#[derive(Clone, Debug)]
pub struct HodaConfig {
    base_url: String,
    start_auth_path: String,
    auth_gateway_path: String,
    get_data_path: String,
    timeout: Duration,
}

impl HodaConfig {
    #[must_use]
    pub fn new(
        base_url: String,
        start_auth_path: String,
        auth_gateway_path: String,
        get_data_path: String,
    ) -> Self {
        Self {
            base_url,
            start_auth_path,
            auth_gateway_path,
            get_data_path,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn start_auth_url(&self) -> String {
        format!("{}{}", self.base_url, self.start_auth_path)
    }

    #[must_use]
    pub fn auth_gateway_url(&self) -> String {
        format!("{}{}", self.base_url, self.auth_gateway_path)
    }

    #[must_use]
    pub fn get_data_url(&self) -> String {
        format!("{}{}", self.base_url, self.get_data_path)
    }
}

#[derive(Clone, Debug)]
pub struct HodaClient {
    client: Client,
    config: HodaConfig,
}

impl HodaClient {
    /// Build the client. Every request is bounded by the configured timeout.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: HodaConfig) -> Result<Self, HodaError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/plain;charset=utf-8"));

        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .default_headers(headers)
            .timeout(config.timeout())
            .build()
            .map_err(HodaError::Client)?;

        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &HodaConfig {
        &self.config
    }

    /// Register a new authentication session with the provider.
    ///
    /// # Errors
    /// Returns an error on transport failure or an unparseable response. A
    /// non-OK provider status is not an error here.
    #[instrument(skip(self, hashed_data))]
    pub async fn start_auth(
        &self,
        sp_rest_id: &str,
        sp_req_id: &str,
        callback_url: &str,
        service_id: u64,
        hashed_data: &str,
    ) -> Result<StartAuthResult, HodaError> {
        let form = StartAuthForm {
            sp_rest_id,
            sp_req_id,
            callback_url,
            service_id,
            hashed_data,
        };

        self.post_form(&self.config.start_auth_url(), &form).await
    }

    /// Exchange an authentication assertion for the verified data.
    ///
    /// # Errors
    /// Returns an error on transport failure or an unparseable response.
    #[instrument(skip(self, auth_assertion, hashed_data))]
    pub async fn get_data(
        &self,
        auth_assertion: &str,
        ref_id: &str,
        hashed_data: &str,
    ) -> Result<GetDataResult, HodaError> {
        let form = GetDataForm {
            auth_assertion,
            ref_id,
            hashed_data,
        };

        self.post_form(&self.config.get_data_url(), &form).await
    }

    async fn post_form<F, R>(&self, url: &str, form: &F) -> Result<R, HodaError>
    where
        F: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let transport = |source| HodaError::Transport {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let body = response.text().await.map_err(transport)?;

        debug!(%url, http.status = status.as_u16(), "provider responded");

        // The provider reports failures in the body, whatever the HTTP status.
        serde_json::from_str(&body).map_err(|source| {
            error!(%url, http.status = status.as_u16(), body = %body, "Unparseable provider response");
            HodaError::Decode {
                url: url.to_string(),
                status: status.as_u16(),
                source,
            }
        })
    }
}
