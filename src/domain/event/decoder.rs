//! Payload decoding
//!
//! Turns a classified log into a [`DecodedEvent`]: settles the creation kind
//! from bytecode, extracts addresses and amounts from topics and ABI-encoded
//! data, and attaches token name/symbol from the chain.

use alloy::primitives::{Address, Bytes, U256};
use alloy_dyn_abi::{DynSolType, DynSolValue};
use tracing::warn;

use super::classifier::{creation_kind, LEGACY_TRANSFER_SINGLE_LEN};
use super::{
    ChainLog, DecodedEvent, EventFields, EventKind, KindCategory, LogClass, PipelineError,
    ReceiptInfo, TokenMetadata, TokenStandard,
};

/// Read-only chain queries the decoder depends on
#[async_trait::async_trait]
pub trait ChainReader: Send + Sync {
    /// `name()` and `symbol()` of a token contract
    async fn token_metadata(&self, token: Address) -> anyhow::Result<TokenMetadata>;

    /// Runtime bytecode at an address
    async fn get_code(&self, address: Address) -> anyhow::Result<Bytes>;
}

/// Decode one classified log.
///
/// A failed bytecode lookup falls back to [`EventKind::NewErc20Contract`];
/// a failed metadata lookup or an undecodable payload is returned as an error
/// and the caller drops the event.
pub async fn decode(
    class: LogClass,
    log: &ChainLog,
    receipt: &ReceiptInfo,
    block_number: u64,
    reader: &dyn ChainReader,
) -> Result<DecodedEvent, PipelineError> {
    let kind = match class {
        LogClass::Event(kind) => kind,
        LogClass::NewContract => resolve_creation_kind(log.address, reader).await,
    };

    let fields = decode_fields(kind, log)?;

    let metadata = reader
        .token_metadata(log.address)
        .await
        .map_err(|err| PipelineError::MetadataUnavailable {
            address: log.address,
            reason: format!("{err:#}"),
        })?;

    DecodedEvent::new(
        kind,
        metadata,
        receipt.transaction_hash,
        block_number,
        log.log_index,
        fields,
    )
    .ok_or(PipelineError::MalformedPayload {
        transaction_hash: log.transaction_hash,
        log_index: log.log_index,
        what: kind.label(),
    })
}

async fn resolve_creation_kind(address: Address, reader: &dyn ChainReader) -> EventKind {
    match reader.get_code(address).await {
        Ok(code) => creation_kind(&code),
        Err(err) => {
            let err = PipelineError::BytecodeLookupFailed {
                address,
                reason: format!("{err:#}"),
            };
            warn!(error = %err, "defaulting new contract to ERC-20");
            EventKind::NewErc20Contract
        }
    }
}

/// Extract kind-specific fields from topics and data
pub fn decode_fields(kind: EventKind, log: &ChainLog) -> Result<EventFields, PipelineError> {
    let malformed = || PipelineError::MalformedPayload {
        transaction_hash: log.transaction_hash,
        log_index: log.log_index,
        what: kind.label(),
    };

    if kind.category() == KindCategory::Creation {
        return Ok(EventFields::Creation {
            contract_address: log.address,
        });
    }

    match kind.standard() {
        TokenStandard::Erc20 => {
            if log.topics.len() != 3 {
                return Err(malformed());
            }
            let values = abi_decode(&[DynSolType::Uint(256)], &log.data).ok_or_else(malformed)?;
            Ok(EventFields::Transfer {
                from: Address::from_word(log.topics[1]),
                to: Address::from_word(log.topics[2]),
                amount: as_uint(&values[0]).ok_or_else(malformed)?,
                token_id: None,
            })
        }
        TokenStandard::Erc721 => {
            if log.topics.len() != 4 {
                return Err(malformed());
            }
            Ok(EventFields::Transfer {
                from: Address::from_word(log.topics[1]),
                to: Address::from_word(log.topics[2]),
                amount: U256::from(1u64),
                token_id: Some(U256::from_be_slice(log.topics[3].as_slice())),
            })
        }
        TokenStandard::Erc1155 => decode_transfer_single(log).ok_or_else(malformed),
    }
}

fn decode_transfer_single(log: &ChainLog) -> Option<EventFields> {
    match log.topics.len() {
        4 => {
            let values = abi_decode(&[DynSolType::Uint(256), DynSolType::Uint(256)], &log.data)?;
            Some(EventFields::Transfer {
                from: Address::from_word(log.topics[2]),
                to: Address::from_word(log.topics[3]),
                amount: as_uint(&values[1])?,
                token_id: Some(as_uint(&values[0])?),
            })
        }
        1 if log.data.len() >= LEGACY_TRANSFER_SINGLE_LEN => {
            let values = abi_decode(
                &[
                    DynSolType::Address,
                    DynSolType::Address,
                    DynSolType::Address,
                    DynSolType::Uint(256),
                    DynSolType::Uint(256),
                ],
                &log.data,
            )?;
            Some(EventFields::Transfer {
                from: as_address(&values[1])?,
                to: as_address(&values[2])?,
                amount: as_uint(&values[4])?,
                token_id: Some(as_uint(&values[3])?),
            })
        }
        _ => None,
    }
}

/// ABI-decode a static tuple, returning exactly `types.len()` values
fn abi_decode(types: &[DynSolType], data: &[u8]) -> Option<Vec<DynSolValue>> {
    if data.len() < types.len() * 32 {
        return None;
    }
    let decoded = DynSolType::Tuple(types.to_vec()).abi_decode(data).ok()?;
    match decoded {
        DynSolValue::Tuple(values) if values.len() == types.len() => Some(values),
        _ => None,
    }
}

fn as_uint(value: &DynSolValue) -> Option<U256> {
    match value {
        DynSolValue::Uint(value, _) => Some(*value),
        _ => None,
    }
}

fn as_address(value: &DynSolValue) -> Option<Address> {
    match value {
        DynSolValue::Address(address) => Some(*address),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use alloy::primitives::B256;

    use super::*;
    use crate::domain::event::classifier::{
        ERC1155_INTERFACE_ID, TRANSFER_SINGLE_TOPIC, TRANSFER_TOPIC,
    };

    /// In-memory chain double
    #[derive(Default)]
    pub struct StaticReader {
        pub metadata: HashMap<Address, TokenMetadata>,
        pub code: HashMap<Address, Bytes>,
    }

    impl StaticReader {
        pub fn with_token(mut self, address: Address, name: &str, symbol: &str) -> Self {
            self.metadata.insert(
                address,
                TokenMetadata {
                    name: name.to_string(),
                    symbol: symbol.to_string(),
                },
            );
            self
        }

        pub fn with_code(mut self, address: Address, code: Vec<u8>) -> Self {
            self.code.insert(address, Bytes::from(code));
            self
        }
    }

    #[async_trait::async_trait]
    impl ChainReader for StaticReader {
        async fn token_metadata(&self, token: Address) -> anyhow::Result<TokenMetadata> {
            self.metadata
                .get(&token)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("execution reverted"))
        }

        async fn get_code(&self, address: Address) -> anyhow::Result<Bytes> {
            self.code
                .get(&address)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("connection reset"))
        }
    }

    fn receipt(contract_address: Option<Address>) -> ReceiptInfo {
        ReceiptInfo {
            transaction_hash: B256::repeat_byte(0xaa),
            transaction_index: 0,
            contract_address,
            logs: Vec::new(),
        }
    }

    fn log(address: Address, topics: Vec<B256>, data: Vec<u8>) -> ChainLog {
        ChainLog {
            address,
            topics,
            data: Bytes::from(data),
            transaction_hash: B256::repeat_byte(0xaa),
            log_index: 3,
        }
    }

    fn token() -> Address {
        Address::repeat_byte(0x42)
    }

    #[tokio::test]
    async fn test_decode_erc20_transfer() {
        let reader = StaticReader::default().with_token(token(), "Dai", "DAI");
        let amount = U256::from(10u64).pow(U256::from(30u64));
        let log = log(
            token(),
            vec![
                TRANSFER_TOPIC,
                Address::repeat_byte(1).into_word(),
                Address::repeat_byte(2).into_word(),
            ],
            amount.to_be_bytes_vec(),
        );

        let event = decode(
            LogClass::Event(EventKind::Erc20Transfer),
            &log,
            &receipt(None),
            77,
            &reader,
        )
        .await
        .expect("decodes");

        assert_eq!(event.kind(), EventKind::Erc20Transfer);
        assert_eq!(event.token_label(), "Dai (DAI)");
        assert_eq!(event.block_number, 77);
        assert_eq!(event.log_index, 3);
        assert_eq!(event.value_display(), "1000000000000000000000000000000");
        assert_eq!(
            event.fields(),
            &EventFields::Transfer {
                from: Address::repeat_byte(1),
                to: Address::repeat_byte(2),
                amount,
                token_id: None,
            }
        );
    }

    #[tokio::test]
    async fn test_decode_erc721_uses_indexed_token_id() {
        let reader = StaticReader::default().with_token(token(), "Punks", "PNK");
        let log = log(
            token(),
            vec![
                TRANSFER_TOPIC,
                Address::ZERO.into_word(),
                Address::repeat_byte(2).into_word(),
                B256::from(U256::from(1234u64)),
            ],
            Vec::new(),
        );
        let event = decode(
            LogClass::Event(EventKind::Erc721Mint),
            &log,
            &receipt(None),
            1,
            &reader,
        )
        .await
        .expect("decodes");
        assert_eq!(event.value_display(), "#1234");
        assert!(matches!(
            event.fields(),
            EventFields::Transfer { amount, .. } if *amount == U256::from(1u64)
        ));
    }

    #[tokio::test]
    async fn test_decode_erc1155_keeps_id_and_value() {
        let reader = StaticReader::default().with_token(token(), "Items", "ITM");
        let log = log(
            token(),
            vec![
                TRANSFER_SINGLE_TOPIC,
                Address::repeat_byte(9).into_word(),
                Address::repeat_byte(1).into_word(),
                Address::repeat_byte(2).into_word(),
            ],
            [
                U256::from(5u64).to_be_bytes_vec(),
                U256::from(40u64).to_be_bytes_vec(),
            ]
            .concat(),
        );
        let event = decode(
            LogClass::Event(EventKind::Erc1155Transfer),
            &log,
            &receipt(None),
            1,
            &reader,
        )
        .await
        .expect("decodes");
        assert_eq!(
            event.fields(),
            &EventFields::Transfer {
                from: Address::repeat_byte(1),
                to: Address::repeat_byte(2),
                amount: U256::from(40u64),
                token_id: Some(U256::from(5u64)),
            }
        );
    }

    #[tokio::test]
    async fn test_missing_metadata_drops_event() {
        let reader = StaticReader::default();
        let log = log(
            token(),
            vec![
                TRANSFER_TOPIC,
                Address::repeat_byte(1).into_word(),
                Address::repeat_byte(2).into_word(),
            ],
            U256::from(1u64).to_be_bytes_vec(),
        );
        let err = decode(
            LogClass::Event(EventKind::Erc20Transfer),
            &log,
            &receipt(None),
            1,
            &reader,
        )
        .await
        .expect_err("no metadata");
        assert!(matches!(err, PipelineError::MetadataUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_short_erc20_data_is_malformed() {
        let reader = StaticReader::default().with_token(token(), "Dai", "DAI");
        let log = log(
            token(),
            vec![
                TRANSFER_TOPIC,
                Address::repeat_byte(1).into_word(),
                Address::repeat_byte(2).into_word(),
            ],
            vec![0x01],
        );
        let err = decode(
            LogClass::Event(EventKind::Erc20Transfer),
            &log,
            &receipt(None),
            1,
            &reader,
        )
        .await
        .expect_err("short data");
        assert!(matches!(err, PipelineError::MalformedPayload { .. }));
    }

    #[tokio::test]
    async fn test_new_contract_kind_from_bytecode() {
        let mut code = vec![0x60, 0x80];
        code.extend_from_slice(&ERC1155_INTERFACE_ID);
        let reader = StaticReader::default()
            .with_token(token(), "Items", "ITM")
            .with_code(token(), code);
        let log = log(token(), vec![B256::repeat_byte(0x77)], Vec::new());

        let event = decode(
            LogClass::NewContract,
            &log,
            &receipt(Some(token())),
            1,
            &reader,
        )
        .await
        .expect("decodes");
        assert_eq!(event.kind(), EventKind::NewErc1155Contract);
        assert_eq!(
            event.fields(),
            &EventFields::Creation {
                contract_address: token()
            }
        );
    }

    #[tokio::test]
    async fn test_bytecode_failure_falls_back_to_erc20() {
        let reader = StaticReader::default().with_token(token(), "Coin", "CN");
        let log = log(token(), vec![B256::repeat_byte(0x77)], Vec::new());
        let event = decode(
            LogClass::NewContract,
            &log,
            &receipt(Some(token())),
            1,
            &reader,
        )
        .await
        .expect("decodes");
        assert_eq!(event.kind(), EventKind::NewErc20Contract);
    }
}
