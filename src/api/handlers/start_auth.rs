use super::ErrorBody;
use crate::{
    handshake::{Error, Handshake},
    hoda::StartAuthResult,
};
use axum::{extract::Extension, response::Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StartAuthInput {
    /// Where the end user is sent with the verified data.
    #[schema(example = "https://client.example/done")]
    pub call_back_url: String,
}

#[utoipa::path(
    post,
    path = "/start-auth",
    request_body = StartAuthInput,
    responses(
        (status = 200, description = "Provider outcome, with `redirectUrl` when accepted", body = StartAuthResult),
        (status = 400, description = "Invalid body or callback URL", body = ErrorBody),
        (status = 502, description = "Provider unreachable or answered garbage", body = ErrorBody),
    ),
    tag = "hoda"
)]
/// Start a verification session for the client.
///
/// A provider refusal is not an error here: its status and errors come back
/// in the 200 body unchanged.
pub async fn start_auth(
    Extension(handshake): Extension<Arc<Handshake>>,
    payload: Option<Json<StartAuthInput>>,
) -> Result<Json<StartAuthResult>, Error> {
    let Some(Json(input)) = payload else {
        debug!("Missing or malformed start-auth body");
        return Err(Error::InvalidPayload(
            "expected JSON body with callBackUrl".to_string(),
        ));
    };

    let result = handshake.start_auth(&input.call_back_url).await?;

    Ok(Json(result))
}
