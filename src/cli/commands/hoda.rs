use anyhow::Context;
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_HODA_BASE_URL: &str = "hoda-base-url";
pub const ARG_HODA_WS_PASSWORD: &str = "hoda-ws-password";
pub const ARG_HODA_SP_REST_ID: &str = "hoda-sp-rest-id";
pub const ARG_HODA_SERVICE_ID: &str = "hoda-service-id";
pub const ARG_HODA_URL_START_AUTH: &str = "hoda-url-start-auth";
pub const ARG_HODA_URL_AUTH_GATEWAY: &str = "hoda-url-auth-gateway";
pub const ARG_HODA_URL_GET_DATA: &str = "hoda-url-get-data";
pub const ARG_HODA_TIMEOUT_SECONDS: &str = "hoda-timeout-seconds";

#[derive(Debug, Clone)]
pub struct Options {
    pub base_url: String,
    pub ws_password: SecretString,
    pub sp_rest_id: String,
    pub service_id: u64,
    pub url_start_auth: String,
    pub url_auth_gateway: String,
    pub url_get_data: String,
    pub timeout_seconds: u64,
}

impl Options {
    /// Parse provider arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a required argument is missing or empty.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        // clap lets "" through when the env var is set but empty
        let required = |id: &str| -> anyhow::Result<String> {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("missing required argument: --{id}"))
        };

        Ok(Self {
            base_url: required(ARG_HODA_BASE_URL)?,
            ws_password: SecretString::from(required(ARG_HODA_WS_PASSWORD)?),
            sp_rest_id: required(ARG_HODA_SP_REST_ID)?,
            service_id: matches
                .get_one::<u64>(ARG_HODA_SERVICE_ID)
                .copied()
                .with_context(|| format!("missing required argument: --{ARG_HODA_SERVICE_ID}"))?,
            url_start_auth: required(ARG_HODA_URL_START_AUTH)?,
            url_auth_gateway: required(ARG_HODA_URL_AUTH_GATEWAY)?,
            url_get_data: required(ARG_HODA_URL_GET_DATA)?,
            timeout_seconds: matches
                .get_one::<u64>(ARG_HODA_TIMEOUT_SECONDS)
                .copied()
                .unwrap_or(10),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_HODA_BASE_URL)
                .long(ARG_HODA_BASE_URL)
                .help("Hoda provider base URL, example: https://hoda.tld")
                .env("HODA_BASE_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_HODA_WS_PASSWORD)
                .long(ARG_HODA_WS_PASSWORD)
                .help("Shared password used to compute hashedData")
                .env("HODA_WS_PASSWORD")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_HODA_SP_REST_ID)
                .long(ARG_HODA_SP_REST_ID)
                .help("Service provider id registered with Hoda (spRestId)")
                .env("HODA_SP_REST_ID")
                .required(true),
        )
        .arg(
            Arg::new(ARG_HODA_SERVICE_ID)
                .long(ARG_HODA_SERVICE_ID)
                .help("Hoda service id")
                .env("HODA_SERVICE_ID")
                .required(true)
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_HODA_URL_START_AUTH)
                .long(ARG_HODA_URL_START_AUTH)
                .help("Path of the start-auth operation, appended to the base URL")
                .env("HODA_URL_START_AUTH")
                .required(true),
        )
        .arg(
            Arg::new(ARG_HODA_URL_AUTH_GATEWAY)
                .long(ARG_HODA_URL_AUTH_GATEWAY)
                .help("Path of the authentication gateway the end user is sent to")
                .env("HODA_URL_AUTH_GATEWAY")
                .required(true),
        )
        .arg(
            Arg::new(ARG_HODA_URL_GET_DATA)
                .long(ARG_HODA_URL_GET_DATA)
                .help("Path of the get-data operation, appended to the base URL")
                .env("HODA_URL_GSB_GET_DATA")
                .required(true),
        )
        .arg(
            Arg::new(ARG_HODA_TIMEOUT_SECONDS)
                .long(ARG_HODA_TIMEOUT_SECONDS)
                .help("Timeout for each provider request, in seconds")
                .env("HODA_TIMEOUT_SECONDS")
                .default_value("10")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
