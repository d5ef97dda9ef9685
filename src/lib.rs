//! speedtest-mqtt: one-shot internet speed measurement published to MQTT
//!
//! A run connects to the broker, announces Home Assistant sensors, picks a
//! speedtest.net server, measures ping, download and upload, and publishes
//! the result as a single JSON message. Every failure maps to its own exit
//! status.
//!
//! ## Modules
//!
//! * `config`: Settings resolved from environment variables and validated
//!   with the `validator` crate.
//!
//! * `core`: The pipeline:
//!   - speedtest.net directory client, endpoint selection and HTTP phases
//!   - result validation
//!   - discovery and result publishing behind the `Publisher` trait
//!   - the one-shot `Executor`
//!   - the broker session wrapped around a run
//!
//! * `error`: `RunError` and its exit-status mapping.
//!
//! * `logger`: `tracing` subscriber setup (compact, pretty or JSON console
//!   output).

pub mod config;
pub mod core;
pub mod error;
pub mod logger;
