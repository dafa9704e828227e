//! Log classification
//!
//! Maps a raw log to a token event kind by its signature topic and topic
//! layout. Pure: no I/O, no state. Contract-creation logs are only flagged
//! here; their token standard is settled from bytecode by the decoder.

use alloy::primitives::{b256, Address, B256};
use tracing::debug;

use super::{ChainLog, EventKind, PipelineError, ReceiptInfo, TokenStandard};

/// keccak256("Transfer(address,address,uint256)")
pub const TRANSFER_TOPIC: B256 =
    b256!("0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");

/// keccak256("TransferSingle(address,address,address,uint256,uint256)")
pub const TRANSFER_SINGLE_TOPIC: B256 =
    b256!("0xc3d58168c5ae7397731d063d5bbf3d657854427343f4c083240f7aacaa2d0f62");

/// ERC-165 interface id of ERC-721
pub const ERC721_INTERFACE_ID: [u8; 4] = [0x80, 0xac, 0x58, 0xcd];

/// ERC-165 interface id of ERC-1155
pub const ERC1155_INTERFACE_ID: [u8; 4] = [0xd9, 0xb6, 0x7a, 0x26];

/// Size of the legacy TransferSingle payload with every field in data
pub(crate) const LEGACY_TRANSFER_SINGLE_LEN: usize = 5 * 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogClass {
    Event(EventKind),
    /// Log emitted by the contract this transaction deployed
    NewContract,
}

/// Classify a log. A signature match with a broken topic layout degrades
/// to "no match" and is logged at debug level.
pub fn classify(log: &ChainLog, receipt: &ReceiptInfo) -> Option<LogClass> {
    match match_layout(log, receipt) {
        Ok(class) => class,
        Err(err) => {
            debug!(error = %err, "ignoring log");
            None
        }
    }
}

fn match_layout(log: &ChainLog, receipt: &ReceiptInfo) -> Result<Option<LogClass>, PipelineError> {
    match log.topics.first() {
        Some(sig) if *sig == TRANSFER_TOPIC => {
            let standard = match log.topics.len() {
                3 => TokenStandard::Erc20,
                4 => TokenStandard::Erc721,
                n => return Err(ambiguous(log, "Transfer", n)),
            };
            let from = Address::from_word(log.topics[1]);
            Ok(Some(LogClass::Event(EventKind::transfer(
                standard,
                from.is_zero(),
            ))))
        }
        Some(sig) if *sig == TRANSFER_SINGLE_TOPIC => {
            let from = transfer_single_from(log)
                .ok_or_else(|| ambiguous(log, "TransferSingle", log.topics.len()))?;
            Ok(Some(LogClass::Event(EventKind::transfer(
                TokenStandard::Erc1155,
                from.is_zero(),
            ))))
        }
        _ => {
            if receipt.contract_address == Some(log.address) {
                Ok(Some(LogClass::NewContract))
            } else {
                Ok(None)
            }
        }
    }
}

/// Pick the creation kind from runtime bytecode. ERC-721 wins when both
/// interface ids appear; neither means ERC-20.
pub fn creation_kind(code: &[u8]) -> EventKind {
    let standard = if contains_selector(code, &ERC721_INTERFACE_ID) {
        TokenStandard::Erc721
    } else if contains_selector(code, &ERC1155_INTERFACE_ID) {
        TokenStandard::Erc1155
    } else {
        TokenStandard::Erc20
    };
    EventKind::new_contract(standard)
}

/// Sender of a TransferSingle: indexed (operator, from, to) or, for the
/// legacy layout, the second data word.
pub(crate) fn transfer_single_from(log: &ChainLog) -> Option<Address> {
    match log.topics.len() {
        4 => Some(Address::from_word(log.topics[2])),
        1 if log.data.len() >= LEGACY_TRANSFER_SINGLE_LEN => {
            Some(Address::from_slice(&log.data[32 + 12..64]))
        }
        _ => None,
    }
}

fn contains_selector(code: &[u8], selector: &[u8; 4]) -> bool {
    code.windows(selector.len()).any(|window| window == selector)
}

fn ambiguous(log: &ChainLog, signature: &'static str, topics: usize) -> PipelineError {
    PipelineError::ClassificationAmbiguous {
        transaction_hash: log.transaction_hash,
        log_index: log.log_index,
        signature,
        topics,
    }
}
