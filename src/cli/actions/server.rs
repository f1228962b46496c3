use crate::{
    api::{self, RedirectEncoding},
    cli::commands::{
        correlation::{self, Backend},
        hoda, redis,
    },
    correlation::{CorrelationStore, MemoryStore, RedisConfig, RedisStore},
    handshake::{Handshake, HandshakeConfig, IntegrityHasher},
    hoda::{HodaClient, HodaConfig},
};
use anyhow::{Context, Result};
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub relay_base_url: String,
    pub redirect_encoding: RedirectEncoding,
    pub hoda: hoda::Options,
    pub correlation: correlation::Options,
    pub redis: redis::Options,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the provider client or correlation store cannot be
/// configured, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let handshake = Arc::new(build_handshake(&args)?);

    if let Err(err) = handshake.store().ping().await {
        // Not fatal: /health reports it and requests fail until it recovers.
        warn!("Correlation store is not reachable yet: {err}");
    }

    api::new(args.port, handshake, args.redirect_encoding).await
}

fn build_handshake(args: &Args) -> Result<Handshake> {
    let hoda_config = HodaConfig::new(
        args.hoda.base_url.clone(),
        args.hoda.url_start_auth.clone(),
        args.hoda.url_auth_gateway.clone(),
        args.hoda.url_get_data.clone(),
    )
    .with_timeout(Duration::from_secs(args.hoda.timeout_seconds));

    let hoda = HodaClient::new(hoda_config).context("Failed to build Hoda client")?;

    let store: Arc<dyn CorrelationStore> = match args.correlation.backend {
        Backend::Redis => {
            let config = redis_config(&args.redis);
            Arc::new(RedisStore::connect(&config).context("Failed to configure Redis")?)
        }
        Backend::Memory => {
            warn!("Using in-memory correlation store; records are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let config = HandshakeConfig::new(
        args.relay_base_url.clone(),
        args.hoda.sp_rest_id.clone(),
        args.hoda.service_id,
    )
    .with_correlation_ttl(Duration::from_secs(args.correlation.ttl_seconds));

    Ok(Handshake::new(
        config,
        IntegrityHasher::new(args.hoda.ws_password.clone()),
        hoda,
        store,
    ))
}

fn redis_config(options: &redis::Options) -> RedisConfig {
    RedisConfig::new(options.host.clone(), options.port)
        .with_password(options.password.clone())
        .with_db(options.db)
        .with_pool_size(options.pool_size)
        .with_timeout(Duration::from_millis(options.timeout_ms))
        .with_key_prefix(options.key_prefix.clone())
}

fn log_startup_args(args: &Args) {
    let mut entries = vec![
        ("listen", format!("tcp:{}", args.port)),
        ("relay_base_url", args.relay_base_url.clone()),
        ("redirect_encoding", args.redirect_encoding.to_string()),
        ("hoda_base_url", args.hoda.base_url.clone()),
        ("hoda_sp_rest_id", args.hoda.sp_rest_id.clone()),
        ("hoda_service_id", args.hoda.service_id.to_string()),
        ("hoda_timeout", format!("{}s", args.hoda.timeout_seconds)),
        ("correlation_backend", args.correlation.backend.to_string()),
        ("correlation_ttl", format!("{}s", args.correlation.ttl_seconds)),
    ];

    if args.correlation.backend == Backend::Redis {
        entries.extend([
            (
                "redis",
                format!(
                    "{}:{}/{}",
                    args.redis.host, args.redis.port, args.redis.db
                ),
            ),
            ("redis_password_set", args.redis.password.is_some().to_string()),
            ("redis_key_prefix", args.redis.key_prefix.clone()),
        ]);
    }

    log_entries("Startup configuration", &entries);
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\n{title}:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn short_commit(hash: &str) -> String {
    let trimmed = hash.trim();
    if trimmed.len() > 7 {
        trimmed[..7].to_string()
    } else {
        trimmed.to_string()
    }
}
