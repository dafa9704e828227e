//! Failures local to a single log or receipt

use alloy::primitives::{Address, B256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("log {log_index} in {transaction_hash} matches {signature} but has {topics} topics")]
    ClassificationAmbiguous {
        transaction_hash: B256,
        log_index: u64,
        signature: &'static str,
        topics: usize,
    },

    #[error("token metadata unavailable for {address}: {reason}")]
    MetadataUnavailable { address: Address, reason: String },

    #[error("bytecode lookup failed for {address}: {reason}")]
    BytecodeLookupFailed { address: Address, reason: String },

    #[error("malformed {what} payload in log {log_index} of {transaction_hash}")]
    MalformedPayload {
        transaction_hash: B256,
        log_index: u64,
        what: &'static str,
    },

    #[error("RPC error: {0}")]
    Rpc(String),
}
