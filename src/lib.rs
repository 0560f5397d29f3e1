//! Renders the recent blocks of a Prime/Region/Zone chain hierarchy, and the
//! coincident blocks that tie the chains together, as a Graphviz DOT graph.

pub mod config;
pub mod difficulty;
pub mod dot;
pub mod error;
pub mod graph;
pub mod hierarchy;
pub mod rpc;
pub mod source;
pub mod types;

pub use config::{Args, Config};
pub use error::{Result, VisualizerError};
pub use graph::{Edge, EdgeKind, GraphSession};
pub use hierarchy::{BlockRecord, ChainForest, ChainNode, ChainSpec, ScanRange, Topology};
pub use source::{HeaderSource, SourceError, SourceResult};
pub use types::{BlockHash, BlockNumber, ChainId, Header, Level, NodeKey, U256};
