//! Raw chain inputs and decoded event records

use alloy::primitives::{Address, Bytes, B256, U256};

use super::{EventKind, KindCategory};

/// A log as emitted by a contract, independent of the RPC transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub transaction_hash: B256,
    pub log_index: u64,
}

/// The parts of a transaction receipt the pipeline needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptInfo {
    pub transaction_hash: B256,
    pub transaction_index: u64,
    /// Address created by this transaction, if it deployed a contract
    pub contract_address: Option<Address>,
    pub logs: Vec<ChainLog>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventFields {
    Transfer {
        from: Address,
        to: Address,
        amount: U256,
        /// Token id for ERC-721 and ERC-1155 transfers
        token_id: Option<U256>,
    },
    Creation {
        contract_address: Address,
    },
}

impl EventFields {
    pub fn category(&self) -> KindCategory {
        match self {
            EventFields::Transfer { .. } => KindCategory::Transfer,
            EventFields::Creation { .. } => KindCategory::Creation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEvent {
    kind: EventKind,
    pub token_name: String,
    pub token_symbol: String,
    pub transaction_hash: B256,
    pub block_number: u64,
    pub log_index: u64,
    fields: EventFields,
}

impl DecodedEvent {
    /// Build an event, rejecting field layouts that do not belong to `kind`.
    pub fn new(
        kind: EventKind,
        metadata: TokenMetadata,
        transaction_hash: B256,
        block_number: u64,
        log_index: u64,
        fields: EventFields,
    ) -> Option<Self> {
        if kind.category() != fields.category() {
            return None;
        }
        Some(Self {
            kind,
            token_name: metadata.name,
            token_symbol: metadata.symbol,
            transaction_hash,
            block_number,
            log_index,
            fields,
        })
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn fields(&self) -> &EventFields {
        &self.fields
    }

    /// "Name (SYM)" as shown in the token column
    pub fn token_label(&self) -> String {
        format!("{} ({})", self.token_name, self.token_symbol)
    }

    /// Value column text: decimal amount, `#id` for NFTs, `id × amount` for ERC-1155
    pub fn value_display(&self) -> String {
        match &self.fields {
            EventFields::Transfer {
                amount,
                token_id: Some(id),
                ..
            } => match self.kind {
                EventKind::Erc1155Transfer | EventKind::Erc1155Mint => {
                    format!("#{id} × {amount}")
                }
                _ => format!("#{id}"),
            },
            EventFields::Transfer { amount, .. } => amount.to_string(),
            EventFields::Creation { .. } => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> TokenMetadata {
        TokenMetadata {
            name: "Token".to_string(),
            symbol: "TKN".to_string(),
        }
    }

    #[test]
    fn test_fields_must_match_kind() {
        let creation = EventFields::Creation {
            contract_address: Address::repeat_byte(0x11),
        };
        assert!(
            DecodedEvent::new(EventKind::Erc20Transfer, meta(), B256::ZERO, 1, 0, creation.clone())
                .is_none()
        );
        assert!(
            DecodedEvent::new(EventKind::NewErc20Contract, meta(), B256::ZERO, 1, 0, creation)
                .is_some()
        );
    }

    #[test]
    fn test_value_display() {
        let transfer = |kind, token_id| {
            DecodedEvent::new(
                kind,
                meta(),
                B256::ZERO,
                1,
                0,
                EventFields::Transfer {
                    from: Address::ZERO,
                    to: Address::repeat_byte(0x22),
                    amount: U256::from(5u64),
                    token_id,
                },
            )
            .expect("transfer fields")
        };
        assert_eq!(transfer(EventKind::Erc20Mint, None).value_display(), "5");
        assert_eq!(
            transfer(EventKind::Erc721Mint, Some(U256::from(7u64))).value_display(),
            "#7"
        );
        assert_eq!(
            transfer(EventKind::Erc1155Transfer, Some(U256::from(7u64))).value_display(),
            "#7 × 5"
        );
        assert_eq!(
            transfer(EventKind::Erc20Mint, None).token_label(),
            "Token (TKN)"
        );
    }
}
