use crate::handshake::Error;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ErrorBody {
    #[schema(example = "validation_failed")]
    pub error: String,
    pub message: String,
}

impl ErrorBody {
    pub fn response(status: StatusCode, kind: &str, message: impl Into<String>) -> Response {
        (
            status,
            Json(Self {
                error: kind.to_string(),
                message: message.into(),
            }),
        )
            .into_response()
    }
}

impl Error {
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidCallbackUrl(_) | Self::InvalidPayload(_) | Self::UpstreamRejected { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::InboundRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::CorrelationMiss(_) | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Idp(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Transport details stay in the logs.
        let message = match &self {
            Self::Idp(_) => "identity provider unavailable".to_string(),
            Self::Store(_) => "correlation store unavailable".to_string(),
            Self::CorrelationMiss(_) => "unknown or expired session".to_string(),
            _ => self.to_string(),
        };

        ErrorBody::response(status, self.kind(), message)
    }
}
