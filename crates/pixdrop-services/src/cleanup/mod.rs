mod service;

pub use service::{LifecycleSweeper, SweepReport};
