//! Ethereum provider abstraction and Alloy implementations
//!
//! Blocks and receipts are fetched with raw JSON requests and parsed by hand
//! so that L2s with non-standard transaction types decode the same way as
//! mainnet.

use std::path::PathBuf;

use alloy::network::Ethereum;
use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::{
    fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller},
    Identity, Provider, ProviderBuilder, RootProvider,
};
use alloy::rpc::types::TransactionRequest;
use anyhow::{Context, Result};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::warn;

use crate::domain::event::{ChainLog, ReceiptInfo};

/// Block header fields plus transaction hashes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    pub number: u64,
    pub hash: B256,
    pub timestamp: u64,
    pub transactions: Vec<B256>,
}

/// Provider configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderConfig {
    /// HTTP JSON-RPC endpoint
    Http(String),
    /// WebSocket endpoint
    WebSocket(String),
    /// IPC socket path (Unix only)
    #[cfg(unix)]
    Ipc(PathBuf),
}

impl ProviderConfig {
    pub fn display(&self) -> String {
        match self {
            ProviderConfig::Http(url) => url.clone(),
            ProviderConfig::WebSocket(url) => url.clone(),
            #[cfg(unix)]
            ProviderConfig::Ipc(path) => path.display().to_string(),
        }
    }
}

/// The chain queries the event feed needs, over any Alloy transport
#[async_trait::async_trait]
pub trait EthereumProvider: Send + Sync + 'static {
    async fn block_number(&self) -> Result<u64>;

    async fn chain_id(&self) -> Result<u64>;

    /// Header and transaction hashes of a block, `None` if the node doesn't have it yet
    async fn get_block(&self, number: u64) -> Result<Option<RawBlock>>;

    /// All receipts of a block in one call (`eth_getBlockReceipts`)
    async fn get_block_receipts(&self, number: u64) -> Result<Option<Vec<ReceiptInfo>>>;

    async fn get_receipt(&self, hash: B256) -> Result<Option<ReceiptInfo>>;

    async fn get_code(&self, address: Address) -> Result<Bytes>;

    /// `eth_call` against the latest block
    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes>;

    /// Stream of new head numbers (WebSocket/IPC only)
    async fn subscribe_blocks(&self) -> Result<mpsc::Receiver<u64>>;

    fn supports_subscriptions(&self) -> bool;

    fn endpoint_name(&self) -> String;
}

type FilledProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider,
    Ethereum,
>;

/// Enum-based provider that stores the concrete type for each transport
pub enum AlloyProvider {
    Http {
        provider: FilledProvider,
        endpoint: String,
    },
    WebSocket {
        provider: FilledProvider,
        endpoint: String,
    },
    #[cfg(unix)]
    Ipc {
        provider: FilledProvider,
        endpoint: String,
    },
}

/// Create a provider from configuration
pub async fn create_provider(config: ProviderConfig) -> Result<Box<dyn EthereumProvider>> {
    match config {
        ProviderConfig::Http(url) => {
            let rpc_url = url.parse().context("Invalid HTTP URL")?;
            let provider = ProviderBuilder::new().connect_http(rpc_url);
            Ok(Box::new(AlloyProvider::Http {
                provider,
                endpoint: url,
            }))
        }
        ProviderConfig::WebSocket(url) => {
            let provider = ProviderBuilder::new()
                .connect(&url)
                .await
                .context("Failed to create WebSocket provider")?;
            Ok(Box::new(AlloyProvider::WebSocket {
                provider,
                endpoint: url,
            }))
        }
        #[cfg(unix)]
        ProviderConfig::Ipc(path) => {
            use alloy::providers::IpcConnect;
            let ipc = IpcConnect::new(path.to_string_lossy().to_string());
            let provider = ProviderBuilder::new()
                .connect_ipc(ipc)
                .await
                .context("Failed to create IPC provider")?;
            Ok(Box::new(AlloyProvider::Ipc {
                provider,
                endpoint: path.display().to_string(),
            }))
        }
    }
}

macro_rules! impl_provider_method {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            AlloyProvider::Http { provider, .. } => provider.$method($($arg),*).await,
            AlloyProvider::WebSocket { provider, .. } => provider.$method($($arg),*).await,
            #[cfg(unix)]
            AlloyProvider::Ipc { provider, .. } => provider.$method($($arg),*).await,
        }
    };
}

macro_rules! raw_json_request {
    ($self:ident, $method:literal, $params:expr) => {
        match $self {
            AlloyProvider::Http { provider, .. } => {
                provider
                    .raw_request::<_, serde_json::Value>($method.into(), $params)
                    .await
            }
            AlloyProvider::WebSocket { provider, .. } => {
                provider
                    .raw_request::<_, serde_json::Value>($method.into(), $params)
                    .await
            }
            #[cfg(unix)]
            AlloyProvider::Ipc { provider, .. } => {
                provider
                    .raw_request::<_, serde_json::Value>($method.into(), $params)
                    .await
            }
        }
    };
}

/// Forward head numbers from a pubsub subscription into a channel
macro_rules! forward_heads {
    ($provider:expr) => {{
        let sub = $provider.subscribe_blocks().await?;
        let (tx, rx) = mpsc::channel(100);
        tokio::spawn(async move {
            let mut stream = sub.into_stream();
            while let Some(header) = stream.next().await {
                if tx.send(header.number).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }};
}

#[async_trait::async_trait]
impl EthereumProvider for AlloyProvider {
    async fn block_number(&self) -> Result<u64> {
        Ok(impl_provider_method!(self, get_block_number)?)
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(impl_provider_method!(self, get_chain_id)?)
    }

    async fn get_block(&self, number: u64) -> Result<Option<RawBlock>> {
        let json = raw_json_request!(self, "eth_getBlockByNumber", (hex_quantity(number), false))?;
        if json.is_null() {
            return Ok(None);
        }
        Ok(Some(parse_raw_block(&json)?))
    }

    async fn get_block_receipts(&self, number: u64) -> Result<Option<Vec<ReceiptInfo>>> {
        let json = raw_json_request!(self, "eth_getBlockReceipts", (hex_quantity(number),))?;
        let Some(items) = json.as_array() else {
            return Ok(None);
        };
        items
            .iter()
            .map(parse_receipt)
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    async fn get_receipt(&self, hash: B256) -> Result<Option<ReceiptInfo>> {
        let json = raw_json_request!(self, "eth_getTransactionReceipt", (hash,))?;
        if json.is_null() {
            return Ok(None);
        }
        Ok(Some(parse_receipt(&json)?))
    }

    async fn get_code(&self, address: Address) -> Result<Bytes> {
        Ok(impl_provider_method!(self, get_code_at, address)?)
    }

    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes> {
        let request = TransactionRequest::default().to(to).input(input.into());
        Ok(impl_provider_method!(self, call, request)?)
    }

    async fn subscribe_blocks(&self) -> Result<mpsc::Receiver<u64>> {
        match self {
            AlloyProvider::Http { .. } => {
                // HTTP has no subscriptions; hand back a closed channel
                let (_, rx) = mpsc::channel(1);
                Ok(rx)
            }
            AlloyProvider::WebSocket { provider, .. } => forward_heads!(provider),
            #[cfg(unix)]
            AlloyProvider::Ipc { provider, .. } => forward_heads!(provider),
        }
    }

    fn supports_subscriptions(&self) -> bool {
        match self {
            AlloyProvider::Http { .. } => false,
            AlloyProvider::WebSocket { .. } => true,
            #[cfg(unix)]
            AlloyProvider::Ipc { .. } => true,
        }
    }

    fn endpoint_name(&self) -> String {
        match self {
            AlloyProvider::Http { endpoint, .. } => endpoint.clone(),
            AlloyProvider::WebSocket { endpoint, .. } => endpoint.clone(),
            #[cfg(unix)]
            AlloyProvider::Ipc { endpoint, .. } => endpoint.clone(),
        }
    }
}

fn hex_quantity(number: u64) -> String {
    format!("0x{:x}", number)
}

/// Parse a block returned with `full_transactions = false`
fn parse_raw_block(json: &serde_json::Value) -> Result<RawBlock> {
    let number = parse_hex_u64(str_field(json, "number")?)?;
    let hash = str_field(json, "hash")?
        .parse::<B256>()
        .context("Invalid block hash")?;
    let timestamp = parse_hex_u64(str_field(json, "timestamp")?)?;

    let transactions = json
        .get("transactions")
        .and_then(|v| v.as_array())
        .map(|txs| {
            txs.iter()
                .filter_map(|tx| match tx {
                    serde_json::Value::String(hash) => hash.parse::<B256>().ok(),
                    // some nodes ignore the flag and send full objects
                    other => other.get("hash")?.as_str()?.parse::<B256>().ok(),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(RawBlock {
        number,
        hash,
        timestamp,
        transactions,
    })
}

/// Parse a receipt, keeping only what log classification needs
fn parse_receipt(json: &serde_json::Value) -> Result<ReceiptInfo> {
    let transaction_hash = str_field(json, "transactionHash")?
        .parse::<B256>()
        .context("Invalid transaction hash")?;
    let transaction_index = json
        .get("transactionIndex")
        .and_then(|v| v.as_str())
        .map(parse_hex_u64)
        .transpose()?
        .unwrap_or(0);
    let contract_address = json
        .get("contractAddress")
        .and_then(|v| v.as_str())
        .map(|s| s.parse::<Address>())
        .transpose()
        .context("Invalid contract address")?;

    let mut logs = Vec::new();
    if let Some(items) = json.get("logs").and_then(|v| v.as_array()) {
        for item in items {
            if item.get("removed").and_then(|v| v.as_bool()) == Some(true) {
                continue;
            }
            match parse_log(item, transaction_hash) {
                Ok(log) => logs.push(log),
                Err(err) => warn!(tx = %transaction_hash, error = %err, "skipping malformed log"),
            }
        }
    }

    Ok(ReceiptInfo {
        transaction_hash,
        transaction_index,
        contract_address,
        logs,
    })
}

fn parse_log(json: &serde_json::Value, transaction_hash: B256) -> Result<ChainLog> {
    let address = str_field(json, "address")?
        .parse::<Address>()
        .context("Invalid log address")?;
    let topics = json
        .get("topics")
        .and_then(|v| v.as_array())
        .map(|topics| {
            topics
                .iter()
                .map(|t| {
                    t.as_str()
                        .context("Topic is not a string")?
                        .parse::<B256>()
                        .context("Invalid topic")
                })
                .collect::<Result<Vec<_>>>()
        })
        .transpose()?
        .unwrap_or_default();
    let data = parse_hex_bytes(json.get("data").and_then(|v| v.as_str()).unwrap_or("0x"))?;
    let log_index = parse_hex_u64(str_field(json, "logIndex")?)?;

    Ok(ChainLog {
        address,
        topics,
        data,
        transaction_hash,
        log_index,
    })
}

fn str_field<'a>(json: &'a serde_json::Value, key: &str) -> Result<&'a str> {
    json.get(key)
        .and_then(|v| v.as_str())
        .with_context(|| format!("Missing field `{key}`"))
}

fn parse_hex_u64(s: &str) -> Result<u64> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).context("Failed to parse hex u64")
}

fn parse_hex_bytes(s: &str) -> Result<Bytes> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    Ok(Bytes::from(hex::decode(s).context("Failed to decode hex")?))
}
