//! Pixdrop API Library
//!
//! This crate provides the HTTP handlers, the client-IP extractor, error rendering and
//! application setup. Decisions and storage effects live in pixdrop-services.

mod handlers;
mod utils;

pub mod error;
pub mod setup;
pub mod state;

pub use error::HttpAppError;
pub use state::{system_clock, AppState, Clock};
pub use utils::client_ip;
