use crate::{
    api::RedirectEncoding,
    cli::{
        actions::{Action, server::Args},
        commands::{self, correlation, hoda, redis},
    },
};
use anyhow::{Context, Result};

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches
        .get_one::<u16>(commands::ARG_PORT)
        .copied()
        .unwrap_or(8080);

    let relay_base_url = matches
        .get_one::<String>(commands::ARG_RELAY_BASE_URL)
        .cloned()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| format!("http://localhost:{port}"));

    url::Url::parse(&relay_base_url).context("invalid HODA_RELAY_BASE_URL")?;

    let redirect_encoding = matches
        .get_one::<RedirectEncoding>(commands::ARG_REDIRECT_ENCODING)
        .copied()
        .unwrap_or_default();

    Ok(Action::Server(Args {
        port,
        relay_base_url,
        redirect_encoding,
        hoda: hoda::Options::parse(matches)?,
        correlation: correlation::Options::parse(matches)?,
        redis: redis::Options::parse(matches),
    }))
}
