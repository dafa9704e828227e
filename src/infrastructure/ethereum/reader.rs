//! `ChainReader` over an Alloy provider
//!
//! Token name and symbol come from `eth_call`; successful lookups are cached
//! for the life of the connection, up to `METADATA_CACHE_CAPACITY` tokens.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, Bytes};
use alloy_dyn_abi::{DynSolType, DynSolValue};
use anyhow::{bail, Context, Result};
use tracing::trace;

use super::EthereumProvider;
use crate::domain::event::{ChainReader, TokenMetadata};

/// `name()`
const NAME_SELECTOR: [u8; 4] = [0x06, 0xfd, 0xde, 0x03];
/// `symbol()`
const SYMBOL_SELECTOR: [u8; 4] = [0x95, 0xd8, 0x9b, 0x41];

/// Tokens remembered per connection before the oldest lookups are dropped
const METADATA_CACHE_CAPACITY: usize = 4096;

/// Insertion-ordered cache; the oldest entry goes first once full
struct MetadataCache {
    entries: HashMap<Address, TokenMetadata>,
    order: VecDeque<Address>,
    capacity: usize,
}

impl MetadataCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    fn get(&self, token: &Address) -> Option<TokenMetadata> {
        self.entries.get(token).cloned()
    }

    fn insert(&mut self, token: Address, metadata: TokenMetadata) {
        if self.entries.insert(token, metadata).is_some() {
            return;
        }
        self.order.push_back(token);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

pub struct ProviderReader {
    provider: Arc<dyn EthereumProvider>,
    metadata: Mutex<MetadataCache>,
}

impl ProviderReader {
    pub fn new(provider: Arc<dyn EthereumProvider>) -> Self {
        Self {
            provider,
            metadata: Mutex::new(MetadataCache::new(METADATA_CACHE_CAPACITY)),
        }
    }

    fn cached(&self, token: Address) -> Option<TokenMetadata> {
        self.metadata
            .lock()
            .ok()
            .and_then(|cache| cache.get(&token))
    }

    async fn call_string(&self, token: Address, selector: [u8; 4]) -> Result<String> {
        let output = self
            .provider
            .call(token, Bytes::copy_from_slice(&selector))
            .await?;
        decode_string_return(&output)
    }
}

#[async_trait::async_trait]
impl ChainReader for ProviderReader {
    async fn token_metadata(&self, token: Address) -> Result<TokenMetadata> {
        if let Some(hit) = self.cached(token) {
            return Ok(hit);
        }

        let (name, symbol) = futures::try_join!(
            self.call_string(token, NAME_SELECTOR),
            self.call_string(token, SYMBOL_SELECTOR),
        )
        .with_context(|| format!("name()/symbol() on {token}"))?;

        let metadata = TokenMetadata { name, symbol };
        trace!(%token, name = %metadata.name, symbol = %metadata.symbol, "token metadata");
        if let Ok(mut cache) = self.metadata.lock() {
            cache.insert(token, metadata.clone());
        }
        Ok(metadata)
    }

    async fn get_code(&self, address: Address) -> Result<Bytes> {
        self.provider.get_code(address).await
    }
}

/// Decode a `string` return value. Tokens that predate the standard return
/// a zero-padded `bytes32` instead; both are accepted.
fn decode_string_return(output: &[u8]) -> Result<String> {
    if output.is_empty() {
        bail!("empty return data");
    }
    if output.len() == 32 {
        let end = output.iter().position(|b| *b == 0).unwrap_or(32);
        return Ok(String::from_utf8_lossy(&output[..end]).into_owned());
    }
    match DynSolType::String.abi_decode(output)? {
        DynSolValue::String(s) => Ok(s),
        other => bail!("unexpected return type {:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::keccak256;

    use super::*;

    #[test]
    fn test_selectors() {
        assert_eq!(keccak256("name()")[..4], NAME_SELECTOR);
        assert_eq!(keccak256("symbol()")[..4], SYMBOL_SELECTOR);
    }

    #[test]
    fn test_decode_abi_string() {
        let encoded = DynSolValue::String("Wrapped Ether".to_string()).abi_encode();
        assert_eq!(decode_string_return(&encoded).unwrap(), "Wrapped Ether");
    }

    #[test]
    fn test_decode_bytes32_string() {
        let mut word = [0u8; 32];
        word[..3].copy_from_slice(b"MKR");
        assert_eq!(decode_string_return(&word).unwrap(), "MKR");
    }

    fn metadata(symbol: &str) -> TokenMetadata {
        TokenMetadata {
            name: format!("{symbol} Token"),
            symbol: symbol.to_string(),
        }
    }

    #[test]
    fn test_cache_evicts_oldest_token() {
        let mut cache = MetadataCache::new(2);
        cache.insert(Address::repeat_byte(1), metadata("A"));
        cache.insert(Address::repeat_byte(2), metadata("B"));
        cache.insert(Address::repeat_byte(3), metadata("C"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&Address::repeat_byte(1)).is_none());
        assert_eq!(cache.get(&Address::repeat_byte(3)).unwrap().symbol, "C");
    }

    #[test]
    fn test_cache_refresh_does_not_grow() {
        let mut cache = MetadataCache::new(2);
        cache.insert(Address::repeat_byte(1), metadata("A"));
        cache.insert(Address::repeat_byte(1), metadata("A2"));
        cache.insert(Address::repeat_byte(2), metadata("B"));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&Address::repeat_byte(1)).unwrap().symbol, "A2");
    }

    #[test]
    fn test_decode_empty_return_fails() {
        assert!(decode_string_return(&[]).is_err());
    }
}
