use std::path::PathBuf;

use crate::source::SourceError;
use crate::types::{BlockHash, BlockNumber};

pub type Result<T> = std::result::Result<T, VisualizerError>;

#[derive(Debug, thiserror::Error)]
pub enum VisualizerError {
    /// Classification was asked for a header that does not exist.
    #[error("no header provided for difficulty classification")]
    MissingHeader,

    #[error("header {0} does not satisfy the difficulty target of any level")]
    NoQualifyingLevel(BlockHash),

    /// A header required by the range walk could not be fetched. Fatal.
    #[error("failed to fetch header {height} from {chain}: {reason}")]
    HeaderFetchFailure {
        chain: String,
        height: BlockNumber,
        reason: String,
    },

    /// A coincidence probe found nothing. Absorbed by the assembler.
    #[error("header {hash} not present on {chain}")]
    HeaderProbeMiss { chain: String, hash: BlockHash },

    #[error("failed to read current height of {chain}: {source}")]
    HeightUnavailable {
        chain: String,
        #[source]
        source: SourceError,
    },

    #[error("invalid topology: {0}")]
    Topology(String),

    #[error("failed to write graph to {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
