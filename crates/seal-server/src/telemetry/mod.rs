//! Tracing setup: structured JSON logs, plus OTLP span export when an
//! endpoint is configured.
//!
//! # Telemetry invariants
//!
//! - **No secrets, keys or plaintext** may appear in any span attribute or log
//!   field. Crypto failures record algorithm, context label, size and error
//!   kind only.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`); `RUST_LOG`
//!   takes precedence.

pub mod init;

pub use init::init_telemetry;
