//! Wire types exchanged with the Hoda provider.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use utoipa::ToSchema;

/// Provider status codes.
///
/// Anything the provider sends outside the documented set is kept verbatim in
/// [`Status::Other`] so it can be passed back to the client unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Ok,
    Unauthorized,
    ValidationException,
    WrongCredentials,
    AccessDenied,
    Exception,
    NotFound,
    Disactive,
    Used,
    Repeatly,
    InternalError,
    InvalidValue,
    Expire,
    #[serde(untagged)]
    Other(String),
}

impl Status {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ok => "OK",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::ValidationException => "VALIDATION_EXCEPTION",
            Self::WrongCredentials => "WRONG_CREDENTIALS",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::Exception => "EXCEPTION",
            Self::NotFound => "NOT_FOUND",
            Self::Disactive => "DISACTIVE",
            Self::Used => "USED",
            Self::Repeatly => "REPEATLY",
            Self::InternalError => "INTERNAL_ERROR",
            Self::InvalidValue => "INVALID_VALUE",
            Self::Expire => "EXPIRE",
            Self::Other(status) => status,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Form body of the provider's start-auth operation.
#[derive(Debug, Serialize)]
pub(crate) struct StartAuthForm<'a> {
    #[serde(rename = "spRestId")]
    pub sp_rest_id: &'a str,
    #[serde(rename = "spReqId")]
    pub sp_req_id: &'a str,
    #[serde(rename = "callBackUrl")]
    pub callback_url: &'a str,
    #[serde(rename = "serviceId")]
    pub service_id: u64,
    #[serde(rename = "hashedData")]
    pub hashed_data: &'a str,
}

/// Form body of the provider's get-data operation.
#[derive(Debug, Serialize)]
pub(crate) struct GetDataForm<'a> {
    #[serde(rename = "authAssertion")]
    pub auth_assertion: &'a str,
    #[serde(rename = "refId")]
    pub ref_id: &'a str,
    #[serde(rename = "hashedData")]
    pub hashed_data: &'a str,
}

#[derive(ToSchema, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAuthPayload {
    pub ref_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sp_req_id: Option<String>,
}

/// Outcome of start-auth, returned to the client as-is plus `redirectUrl`.
#[derive(ToSchema, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAuthResult {
    #[schema(value_type = String, example = "OK")]
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub errors: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<StartAuthPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

/// Verified personal data returned by get-data.
///
/// Only the public fields are modelled; provider-internal fields such as the
/// identity assertion are dropped on deserialization and never forwarded.
#[derive(ToSchema, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedData {
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub name: Option<Value>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub family: Option<Value>,
    #[serde(default, alias = "nin")]
    #[schema(value_type = Option<String>)]
    pub national_id: Option<Value>,
    #[serde(default, alias = "birthdate")]
    #[schema(value_type = Option<String>)]
    pub birth_date: Option<Value>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub mobile: Option<Value>,
}

impl VerifiedData {
    /// The fields handed to the client, in protocol order, skipping absent ones.
    #[must_use]
    pub fn public_fields(&self) -> Vec<(&'static str, String)> {
        [
            ("name", &self.name),
            ("family", &self.family),
            ("nationalId", &self.national_id),
            ("birthDate", &self.birth_date),
            ("mobile", &self.mobile),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_ref().and_then(render).map(|value| (key, value)))
        .collect()
    }
}

fn render(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

#[derive(ToSchema, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetDataResult {
    #[schema(value_type = String, example = "OK")]
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub errors: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<VerifiedData>,
}

/// Form body the provider posts to the relay's callback endpoint.
#[derive(ToSchema, Debug, Clone, Serialize, Deserialize)]
pub struct CallbackRequest {
    #[schema(value_type = String, example = "OK")]
    pub status: Status,
    #[serde(default)]
    pub errors: Option<String>,
    /// JSON document encoding [`CallbackPayload`].
    #[serde(default)]
    pub payload: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackPayload {
    pub auth_assertion: String,
    pub ref_id: String,
    #[serde(alias = "sessionId")]
    pub sp_req_id: String,
}

impl CallbackPayload {
    /// Parse the callback's embedded JSON payload.
    ///
    /// # Errors
    /// Returns a message describing why the payload is unusable.
    pub fn parse(raw: Option<&str>) -> Result<Self, String> {
        let raw = raw
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .ok_or_else(|| "missing payload".to_string())?;

        let payload: Self =
            serde_json::from_str(raw).map_err(|err| format!("malformed payload: {err}"))?;

        for (field, value) in [
            ("authAssertion", &payload.auth_assertion),
            ("refId", &payload.ref_id),
            ("spReqId", &payload.sp_req_id),
        ] {
            if value.trim().is_empty() {
                return Err(format!("empty field: {field}"));
            }
        }

        Ok(payload)
    }
}
