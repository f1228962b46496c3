use super::ErrorBody;
use crate::{
    api::RedirectEncoding,
    handshake::{Error, Handshake},
    hoda::CallbackRequest,
};
use axum::{
    extract::{Extension, Form},
    http::{HeaderValue, StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, error};

#[utoipa::path(
    post,
    path = "/callback",
    request_body(content = CallbackRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 302, description = "Redirect to the client callback with the verified fields"),
        (status = 400, description = "Malformed callback or provider refused get-data", body = ErrorBody),
        (status = 422, description = "Provider reported a non-OK status", body = ErrorBody),
        (status = 500, description = "Unknown, expired or replayed session", body = ErrorBody),
        (status = 502, description = "Provider unreachable", body = ErrorBody),
    ),
    tag = "hoda"
)]
/// Provider callback after the end user finished at the gateway.
pub async fn callback(
    Extension(handshake): Extension<Arc<Handshake>>,
    Extension(encoding): Extension<RedirectEncoding>,
    form: Option<Form<CallbackRequest>>,
) -> Response {
    let Some(Form(request)) = form else {
        debug!("Missing or malformed callback form");
        return Error::InvalidPayload("expected form body with status".to_string())
            .into_response();
    };

    let outcome = match handshake.callback(&request).await {
        Ok(outcome) => outcome,
        Err(err) => return err.into_response(),
    };

    let location = encoding.apply(&outcome.redirect_url);

    match HeaderValue::from_str(&location) {
        Ok(value) => (StatusCode::FOUND, [(LOCATION, value)]).into_response(),
        Err(err) => {
            error!(%encoding, "Redirect target is not a valid header value: {err}");
            ErrorBody::response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "transport_failure",
                "redirect target could not be encoded",
            )
        }
    }
}
