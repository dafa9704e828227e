//! Per-block classification and decoding
//!
//! Logs are classified in chain order, decoded with bounded concurrency,
//! and returned in (tx index, log index) order regardless of which lookup
//! finishes first.

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use super::classifier::{classify, LogClass};
use super::decoder::{decode, ChainReader};
use super::{ChainLog, DecodedEvent, ReceiptInfo};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BlockStats {
    pub logs: usize,
    pub matched: usize,
    pub decoded: usize,
    pub dropped: usize,
}

/// Classify and decode every log of a block.
///
/// `concurrency` bounds in-flight decodes; `1` decodes strictly one log at a time.
pub async fn decode_block(
    block_number: u64,
    receipts: &[ReceiptInfo],
    reader: &dyn ChainReader,
    concurrency: usize,
) -> (Vec<DecodedEvent>, BlockStats) {
    let mut stats = BlockStats::default();
    let mut candidates: Vec<(LogClass, &ChainLog, &ReceiptInfo)> = Vec::new();

    let mut ordered: Vec<&ReceiptInfo> = receipts.iter().collect();
    ordered.sort_by_key(|receipt| receipt.transaction_index);

    for receipt in ordered {
        let mut logs: Vec<&ChainLog> = receipt.logs.iter().collect();
        logs.sort_by_key(|log| log.log_index);
        for log in logs {
            stats.logs += 1;
            if let Some(class) = classify(log, receipt) {
                candidates.push((class, log, receipt));
            }
        }
    }
    stats.matched = candidates.len();

    let results: Vec<_> = stream::iter(candidates)
        .map(|(class, log, receipt)| decode(class, log, receipt, block_number, reader))
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut events = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(event) => events.push(event),
            Err(err) => {
                stats.dropped += 1;
                warn!(block = block_number, error = %err, "dropping event");
            }
        }
    }
    stats.decoded = events.len();

    debug!(
        block = block_number,
        logs = stats.logs,
        matched = stats.matched,
        decoded = stats.decoded,
        dropped = stats.dropped,
        "block decoded"
    );
    (events, stats)
}
