//! Token event classification and decoding

pub mod classifier;
pub mod decoder;
mod error;
mod kind;
mod model;
pub mod pipeline;

pub use classifier::LogClass;
pub use decoder::ChainReader;
pub use error::PipelineError;
pub use kind::{EventKind, KindCategory, TokenStandard};
pub use model::{ChainLog, DecodedEvent, EventFields, ReceiptInfo, TokenMetadata};
pub use pipeline::{decode_block, BlockStats};
