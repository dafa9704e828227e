//! Ethereum infrastructure - Alloy provider implementations

mod provider;
mod reader;

pub use provider::{create_provider, EthereumProvider, ProviderConfig};
#[cfg(test)]
pub(crate) use provider::RawBlock;
pub use reader::ProviderReader;
