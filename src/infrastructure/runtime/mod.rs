//! Runtime infrastructure - Tokio runtime bridge for async operations

mod bridge;
mod worker;

pub use bridge::{
    RuntimeBridge, RuntimeCommand, RuntimeEvent, WorkerSettings, DEFAULT_DECODE_CONCURRENCY,
    DEFAULT_POLL_INTERVAL,
};
