//! The per-chain header capability the assembler pulls blocks from.

use async_trait::async_trait;

use crate::types::{BlockHash, BlockNumber, Header};

/// Errors raised while talking to a chain's node.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status code {0}")]
    Status(u16),

    #[error("node returned error (code {code}): {message}")]
    Rpc { code: i64, message: String },

    #[error("node returned malformed data: {0}")]
    BadNodeData(String),
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Read access to the headers of one chain.
///
/// `Ok(None)` means the node answered but does not know the block.
#[async_trait]
pub trait HeaderSource: Send + Sync {
    /// Height of the chain's current head.
    async fn current_height(&self) -> SourceResult<BlockNumber>;

    async fn header_by_number(&self, number: BlockNumber) -> SourceResult<Option<Header>>;

    async fn header_by_hash(&self, hash: &BlockHash) -> SourceResult<Option<Header>>;
}
