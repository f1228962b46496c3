use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_REDIS_HOST: &str = "redis-host";
pub const ARG_REDIS_PORT: &str = "redis-port";
pub const ARG_REDIS_PASSWORD: &str = "redis-password";
pub const ARG_REDIS_DB: &str = "redis-db";
pub const ARG_REDIS_POOL_SIZE: &str = "redis-pool-size";
pub const ARG_REDIS_TIMEOUT_MS: &str = "redis-timeout-ms";
pub const ARG_REDIS_KEY_PREFIX: &str = "redis-key-prefix";

#[derive(Debug, Clone)]
pub struct Options {
    pub host: String,
    pub port: u16,
    pub password: Option<SecretString>,
    pub db: i64,
    pub pool_size: usize,
    pub timeout_ms: u64,
    pub key_prefix: String,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            host: matches
                .get_one::<String>(ARG_REDIS_HOST)
                .cloned()
                .unwrap_or_else(|| "localhost".to_string()),
            port: matches.get_one::<u16>(ARG_REDIS_PORT).copied().unwrap_or(6379),
            password: matches
                .get_one::<String>(ARG_REDIS_PASSWORD)
                .filter(|v| !v.is_empty())
                .cloned()
                .map(SecretString::from),
            db: matches.get_one::<i64>(ARG_REDIS_DB).copied().unwrap_or(0),
            pool_size: matches
                .get_one::<usize>(ARG_REDIS_POOL_SIZE)
                .copied()
                .unwrap_or(16),
            timeout_ms: matches
                .get_one::<u64>(ARG_REDIS_TIMEOUT_MS)
                .copied()
                .unwrap_or(2_000),
            key_prefix: matches
                .get_one::<String>(ARG_REDIS_KEY_PREFIX)
                .cloned()
                .unwrap_or_else(|| "hoda:".to_string()),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_REDIS_HOST)
                .long(ARG_REDIS_HOST)
                .help("Redis host")
                .env("REDIS_HOST")
                .default_value("localhost"),
        )
        .arg(
            Arg::new(ARG_REDIS_PORT)
                .long(ARG_REDIS_PORT)
                .help("Redis port")
                .env("REDIS_PORT")
                .default_value("6379")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_REDIS_PASSWORD)
                .long(ARG_REDIS_PASSWORD)
                .help("Redis password")
                .env("REDIS_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_REDIS_DB)
                .long(ARG_REDIS_DB)
                .help("Redis database index")
                .env("REDIS_DB")
                .default_value("0")
                .value_parser(clap::value_parser!(i64).range(0..)),
        )
        .arg(
            Arg::new(ARG_REDIS_POOL_SIZE)
                .long(ARG_REDIS_POOL_SIZE)
                .help("Maximum number of pooled Redis connections")
                .env("REDIS_POOL_SIZE")
                .default_value("16")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_REDIS_TIMEOUT_MS)
                .long(ARG_REDIS_TIMEOUT_MS)
                .help("Timeout for each Redis operation, in milliseconds")
                .env("REDIS_TIMEOUT_MS")
                .default_value("2000")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_REDIS_KEY_PREFIX)
                .long(ARG_REDIS_KEY_PREFIX)
                .help("Prefix for correlation keys")
                .env("REDIS_KEY_PREFIX")
                .default_value("hoda:"),
        )
}
