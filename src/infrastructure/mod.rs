//! Infrastructure layer - External service integrations
//!
//! This layer contains:
//! - Alloy-based Ethereum providers and the `ChainReader` built on them
//! - Tokio runtime bridge that runs the block pipeline off the UI thread

pub mod ethereum;
pub mod runtime;
