use crate::{correlation::StoreError, hoda::HodaError, hoda::Status};
use thiserror::Error;

/// Every way a handshake step can end the attempt.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid callback URL: {0}")]
    InvalidCallbackUrl(String),
    #[error("invalid request: {0}")]
    InvalidPayload(String),
    #[error("provider reported {0} on callback")]
    InboundRejected(Status),
    #[error("provider rejected {step}: {status}")]
    UpstreamRejected { step: &'static str, status: Status },
    #[error("no correlation record for session {0}")]
    CorrelationMiss(String),
    #[error(transparent)]
    Idp(#[from] HodaError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    /// Stable identifier used in logs and error bodies.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidCallbackUrl(_) | Self::InvalidPayload(_) => "validation_failed",
            Self::InboundRejected(_) | Self::UpstreamRejected { .. } => "upstream_rejected",
            Self::CorrelationMiss(_) => "correlation_miss",
            Self::Idp(_) | Self::Store(_) => "transport_failure",
        }
    }
}
