//! Measurement pipeline and the broker session it runs in.

pub mod discovery;
pub mod executor;
pub mod report;
pub mod session;
pub mod speedtest;
pub mod validation;
