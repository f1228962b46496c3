use anyhow::{Context, anyhow};
use clap::{Arg, ArgMatches, Command, builder::PossibleValuesParser};
use std::{fmt, str::FromStr};

pub const ARG_CORRELATION_BACKEND: &str = "correlation-backend";
pub const ARG_CORRELATION_TTL_SECONDS: &str = "correlation-ttl-seconds";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Redis,
    Memory,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow!("unknown correlation backend: {other}")),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Redis => "redis",
            Self::Memory => "memory",
        })
    }
}

#[derive(Debug, Clone)]
pub struct Options {
    pub backend: Backend,
    pub ttl_seconds: u64,
}

impl Options {
    /// Parse correlation store arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the backend name is unknown.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let backend = matches
            .get_one::<String>(ARG_CORRELATION_BACKEND)
            .map_or("redis", String::as_str)
            .parse::<Backend>()
            .context("invalid HODA_RELAY_CORRELATION_BACKEND")?;

        Ok(Self {
            backend,
            ttl_seconds: matches
                .get_one::<u64>(ARG_CORRELATION_TTL_SECONDS)
                .copied()
                .unwrap_or(300),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_CORRELATION_BACKEND)
                .long(ARG_CORRELATION_BACKEND)
                .help("Where correlation records are kept")
                .long_help(
                    "Where correlation records are kept.\n\n`redis` is shared between replicas and survives restarts. `memory` is for single-instance\nor development setups only.",
                )
                .env("HODA_RELAY_CORRELATION_BACKEND")
                .default_value("redis")
                .value_parser(PossibleValuesParser::new(["redis", "memory"])),
        )
        .arg(
            Arg::new(ARG_CORRELATION_TTL_SECONDS)
                .long(ARG_CORRELATION_TTL_SECONDS)
                .help("Seconds a pending handshake stays valid")
                .env("HODA_RELAY_CORRELATION_TTL")
                .default_value("300")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
