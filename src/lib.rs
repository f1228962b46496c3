//! # Hoda Relay (Identity Verification Broker)
//!
//! `hoda-relay` brokers the Hoda identity-verification handshake on behalf of a
//! client application. The client never talks to the provider directly; it asks
//! the relay to start a session and later receives the verified person's data as
//! query parameters on its own callback URL.
//!
//! ## Handshake
//!
//! 1. **Start:** `POST /start-auth` registers a fresh session (`spReqId`) with the
//!    provider and returns the gateway `redirectUrl` the end user must visit.
//!    The client's callback URL is kept in the correlation store with a short TTL.
//! 2. **Callback:** the provider posts the outcome to `POST /callback`. The relay
//!    exchanges the assertion for verified data, resolves the stored client URL
//!    and redirects the end user there.
//!
//! ## Integrity Hashes
//!
//! Every request to the provider carries `hashedData`, a hex SHA3-512 digest of
//! the shared password followed by request fields. The provider recomputes the
//! digest, so the concatenation order is part of the protocol.
//!
//! ## Correlation Store
//!
//! Records live in Redis (or in-process for single-instance setups) and are
//! consumed on first use; a replayed callback finds nothing and fails closed.

pub mod api;
pub mod cli;
pub mod correlation;
pub mod handshake;
pub mod hoda;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
