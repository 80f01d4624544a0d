//! Telemetry initialization
//!
//! Structured logging through `tracing`; the output format is chosen at startup.

mod init_basic;

pub use init_basic::init_telemetry;
