use std::fmt;
use uint::construct_uint;

construct_uint! {
    pub struct U256(4);
}

construct_uint! {
    pub struct U512(8);
}

/// Size in bytes of a block hash.
pub const HASH_BYTES_LENGTH: usize = 32;

/// Number of hex characters kept in a short hash.
pub const SHORT_HASH_LENGTH: usize = 10;

/// Index of a chain inside a [`crate::hierarchy::ChainForest`].
pub type ChainId = usize;

pub type BlockNumber = u64;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockHash(pub [u8; HASH_BYTES_LENGTH]);

impl BlockHash {
    pub fn as_bytes(&self) -> &[u8; HASH_BYTES_LENGTH] {
        &self.0
    }

    /// The compact node key used in the graph.
    pub fn short(&self) -> ShortHash {
        let mut full = hex::encode(self.0);
        full.truncate(SHORT_HASH_LENGTH);
        ShortHash(full)
    }

    pub fn from_hex(input: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; HASH_BYTES_LENGTH];
        hex::decode_to_slice(input.trim_start_matches("0x"), &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShortHash(String);

impl ShortHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShortHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position of a chain in the Prime → Region → Zone hierarchy.
///
/// Lower orders are more selective: a Prime block is also valid in the Region
/// and Zone below it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Level {
    Prime,
    Region,
    Zone,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Prime, Level::Region, Level::Zone];

    pub fn order(self) -> usize {
        match self {
            Level::Prime => 0,
            Level::Region => 1,
            Level::Zone => 2,
        }
    }

    pub fn from_order(order: usize) -> Option<Level> {
        Level::ALL.get(order).copied()
    }

    /// The next level down the hierarchy, `None` for Zone.
    pub fn below(self) -> Option<Level> {
        Level::from_order(self.order() + 1)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Prime => "prime",
            Level::Region => "region",
            Level::Zone => "zone",
        };
        f.write_str(name)
    }
}

/// A block header as served by a node of any chain in the hierarchy.
///
/// Per-level fields hold one entry per [`Level`], indexed by `Level::order`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Header {
    pub hash: BlockHash,
    pub parent_hash: Vec<BlockHash>,
    pub state_root: Vec<BlockHash>,
    pub tx_root: Vec<BlockHash>,
    pub receipt_root: Vec<BlockHash>,
    pub bloom: Vec<Vec<u8>>,
    pub difficulty: Vec<U256>,
    pub number: Vec<BlockNumber>,
    pub gas_limit: Vec<u64>,
    pub gas_used: Vec<u64>,
    pub base_fee: Option<Vec<U256>>,
    pub time: u64,
    pub extra: Vec<u8>,
    pub location: Vec<u8>,
    pub nonce: u64,
}

impl Header {
    /// The height of this header on the chain of the given level.
    pub fn number_at(&self, level: Level) -> Option<BlockNumber> {
        self.number.get(level.order()).copied()
    }

    pub fn difficulty_at(&self, level: Level) -> Option<U256> {
        self.difficulty.get(level.order()).copied()
    }
}

/// Graph identity of a block as seen from one level.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    pub level: Level,
    pub short: ShortHash,
}

impl NodeKey {
    pub fn new(level: Level, hash: &BlockHash) -> Self {
        Self {
            level,
            short: hash.short(),
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.level.order(), self.short)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_hash_keeps_ten_hex_chars() {
        let hash = BlockHash::from_hex(
            "0xabcdef0123456789000000000000000000000000000000000000000000000001",
        )
        .unwrap();
        assert_eq!(hash.short().as_str(), "abcdef0123");
        assert_eq!(NodeKey::new(Level::Region, &hash).to_string(), "1abcdef0123");
    }

    #[test]
    fn levels_walk_down_the_hierarchy() {
        assert_eq!(Level::Prime.below(), Some(Level::Region));
        assert_eq!(Level::Region.below(), Some(Level::Zone));
        assert_eq!(Level::Zone.below(), None);
        assert!(Level::Prime < Level::Zone);
        assert_eq!(Level::from_order(3), None);
    }

    #[test]
    fn malformed_hash_is_rejected() {
        assert!(BlockHash::from_hex("0x1234").is_err());
    }
}
