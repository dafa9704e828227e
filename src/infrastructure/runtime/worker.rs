//! Async worker - follows the chain head and decodes every new block

use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use tokio::sync::mpsc as tokio_mpsc;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::domain::event::{decode_block, PipelineError, ReceiptInfo};
use crate::infrastructure::ethereum::{
    create_provider, EthereumProvider, ProviderConfig, ProviderReader,
};
use crate::infrastructure::runtime::bridge::{RuntimeCommand, RuntimeEvent, WorkerSettings};

/// Blocks further behind the head than this are skipped after a stall
const MAX_BACKFILL: u64 = 64;

/// Last block delivered, kept across sessions so a reconnect resumes
/// instead of replaying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Progress {
    chain_id: Option<u64>,
    last_block: u64,
}

struct Session {
    provider: Arc<dyn EthereumProvider>,
    reader: ProviderReader,
    heads: Option<tokio_mpsc::Receiver<u64>>,
    chain_id: Option<u64>,
    last_block: u64,
    /// Cleared once the node rejects `eth_getBlockReceipts`
    block_receipts: bool,
}

/// Run the async worker loop
pub async fn run_async_worker(
    endpoints: Vec<ProviderConfig>,
    settings: WorkerSettings,
    cmd_rx: Receiver<RuntimeCommand>,
    evt_tx: Sender<RuntimeEvent>,
) -> Result<()> {
    if endpoints.is_empty() {
        anyhow::bail!("No endpoints configured");
    }

    let mut endpoint_index = 0usize;
    let mut session: Option<Session> = None;
    let mut progress: Option<Progress> = None;
    let mut poll_interval = interval(settings.poll_interval);

    loop {
        while let Ok(cmd) = cmd_rx.try_recv() {
            match cmd {
                RuntimeCommand::Shutdown => {
                    info!("worker shutting down");
                    return Ok(());
                }
                RuntimeCommand::SwitchEndpoint { index } => {
                    if index >= endpoints.len() {
                        let _ = evt_tx.send(RuntimeEvent::Error {
                            message: format!(
                                "Invalid endpoint index {} ({} total)",
                                index,
                                endpoints.len()
                            ),
                        });
                        continue;
                    }
                    info!(endpoint = %endpoints[index].display(), "switching endpoint");
                    endpoint_index = index;
                    session = None;
                }
            }
        }

        if session.is_none() {
            let config = endpoints[endpoint_index].clone();
            match connect_to_endpoint(config.clone(), progress, &evt_tx).await {
                Ok(s) => session = Some(s),
                Err(err) => {
                    warn!(endpoint = %config.display(), error = %format!("{err:#}"), "connection failed");
                    let _ = evt_tx.send(RuntimeEvent::Error {
                        message: format!("Connection failed ({}): {:#}", config.display(), err),
                    });
                    if endpoints.len() > 1 {
                        endpoint_index = (endpoint_index + 1) % endpoints.len();
                    }
                    tokio::time::sleep(Duration::from_millis(900)).await;
                    continue;
                }
            }
        }

        let Some(s) = session.as_mut() else {
            continue;
        };

        let head = match next_head(s, &mut poll_interval, settings.poll_interval).await {
            Ok(head) => head,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "lost connection");
                let _ = evt_tx.send(RuntimeEvent::Error {
                    message: format!("RPC error: {:#}", err),
                });
                session = None;
                if endpoints.len() > 1 {
                    endpoint_index = (endpoint_index + 1) % endpoints.len();
                }
                continue;
            }
        };

        if let Some(head) = head {
            if let Err(err) = follow(s, head, settings.decode_concurrency, &evt_tx).await {
                warn!(error = %format!("{err:#}"), "block fetch failed");
                let _ = evt_tx.send(RuntimeEvent::Error {
                    message: format!("RPC error: {:#}", err),
                });
            }
            progress = Some(s.progress());
        }
    }
}

async fn connect_to_endpoint(
    config: ProviderConfig,
    previous: Option<Progress>,
    evt_tx: &Sender<RuntimeEvent>,
) -> Result<Session> {
    let provider: Arc<dyn EthereumProvider> = Arc::from(create_provider(config).await?);
    open_session(provider, previous, evt_tx).await
}

/// Start a session on a connected provider. On the chain the previous
/// session followed, blocks up to its last one are not delivered again;
/// otherwise the current head is the first block decoded.
async fn open_session(
    provider: Arc<dyn EthereumProvider>,
    previous: Option<Progress>,
    evt_tx: &Sender<RuntimeEvent>,
) -> Result<Session> {
    let head = provider
        .block_number()
        .await
        .context("Failed to get block number")?;
    let chain_id = provider.chain_id().await.ok();

    let heads = if provider.supports_subscriptions() {
        Some(provider.subscribe_blocks().await?)
    } else {
        None
    };

    let last_block = match previous {
        Some(progress) if progress.chain_id == chain_id => {
            debug!(from = progress.last_block + 1, head, "resuming");
            progress.last_block
        }
        _ => head.saturating_sub(1),
    };

    info!(endpoint = %provider.endpoint_name(), ?chain_id, head, "connected");
    let _ = evt_tx.send(RuntimeEvent::Connected {
        endpoint: provider.endpoint_name(),
        chain_id,
        head,
    });

    Ok(Session {
        reader: ProviderReader::new(Arc::clone(&provider)),
        provider,
        heads,
        chain_id,
        last_block,
        block_receipts: true,
    })
}

impl Session {
    fn progress(&self) -> Progress {
        Progress {
            chain_id: self.chain_id,
            last_block: self.last_block,
        }
    }
}

/// Wait for the next head number. `Ok(None)` means nothing new this round.
async fn next_head(
    session: &mut Session,
    poll_interval: &mut tokio::time::Interval,
    wait: Duration,
) -> Result<Option<u64>> {
    if let Some(heads) = session.heads.as_mut() {
        match tokio::time::timeout(wait, heads.recv()).await {
            Ok(Some(number)) => return Ok(Some(number)),
            Ok(None) => anyhow::bail!("block subscription closed"),
            // quiet subscription: fall through to a head check
            Err(_) => {}
        }
    } else {
        poll_interval.tick().await;
    }

    let head = session.provider.block_number().await?;
    Ok((head > session.last_block).then_some(head))
}

/// Process every block after `last_block` up to `head`, in order
async fn follow(
    session: &mut Session,
    head: u64,
    concurrency: usize,
    evt_tx: &Sender<RuntimeEvent>,
) -> Result<()> {
    if head <= session.last_block {
        return Ok(());
    }

    let mut from = session.last_block + 1;
    if head - session.last_block > MAX_BACKFILL {
        from = head + 1 - MAX_BACKFILL;
        warn!(skipped = from - session.last_block - 1, from, "head moved too far, skipping blocks");
    }

    for number in from..=head {
        if !process_block(session, number, concurrency, evt_tx).await? {
            // not served yet; retry on the next round
            break;
        }
        session.last_block = number;
    }
    Ok(())
}

/// Fetch, classify and decode one block. Returns `false` if the node
/// doesn't have the block yet.
async fn process_block(
    session: &mut Session,
    number: u64,
    concurrency: usize,
    evt_tx: &Sender<RuntimeEvent>,
) -> Result<bool> {
    let Some(block) = session.provider.get_block(number).await? else {
        return Ok(false);
    };
    let _ = evt_tx.send(RuntimeEvent::NewHeader {
        number: block.number,
        timestamp: block.timestamp,
    });

    let receipts = fetch_receipts(session, number, &block.transactions, concurrency).await;
    let (events, stats) =
        decode_block(number, &receipts, &session.reader, concurrency).await;

    debug!(block = number, txs = block.transactions.len(), events = events.len(), "block processed");
    let _ = evt_tx.send(RuntimeEvent::Events {
        block: number,
        events,
        stats,
    });
    Ok(true)
}

/// All receipts of a block. Falls back to one request per transaction;
/// a receipt that fails to load is skipped.
async fn fetch_receipts(
    session: &mut Session,
    number: u64,
    transactions: &[alloy::primitives::B256],
    concurrency: usize,
) -> Vec<ReceiptInfo> {
    if session.block_receipts {
        match session.provider.get_block_receipts(number).await {
            Ok(Some(receipts)) => return receipts,
            Ok(None) => {}
            Err(err) => {
                debug!(error = %format!("{err:#}"), "eth_getBlockReceipts unavailable, using per-tx receipts");
                session.block_receipts = false;
            }
        }
    }

    let provider = &session.provider;
    stream::iter(transactions.iter().copied())
        .map(|hash| async move { (hash, provider.get_receipt(hash).await) })
        .buffered(concurrency.max(1))
        .filter_map(|(hash, result)| async move {
            match result {
                Ok(Some(receipt)) => Some(receipt),
                Ok(None) => {
                    warn!(block = number, tx = %hash, "receipt not found");
                    None
                }
                Err(err) => {
                    let err = PipelineError::Rpc(format!("{err:#}"));
                    warn!(block = number, tx = %hash, error = %err, "receipt fetch failed");
                    None
                }
            }
        })
        .collect()
        .await
}
