#![allow(clippy::needless_for_each)]

use crate::{
    api::handlers::{
        ErrorBody,
        callback::__path_callback,
        health::{Health, __path_health},
        start_auth::{StartAuthInput, __path_start_auth},
    },
    hoda::{CallbackRequest, StartAuthPayload, StartAuthResult, VerifiedData},
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(start_auth, callback, health),
    components(
        schemas(
            StartAuthInput,
            StartAuthResult,
            StartAuthPayload,
            CallbackRequest,
            VerifiedData,
            ErrorBody,
            Health
        )
    ),
    tags(
        (name = "hoda", description = "Hoda identity verification relay"),
        (name = "health", description = "Service health"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
