//! The Prime → Region → Zone chain tree and the blocks collected per chain.

use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::error::{Result, VisualizerError};
use crate::source::HeaderSource;
use crate::types::{BlockHash, BlockNumber, ChainId, Level, NodeKey, ShortHash};

/// Declarative description of one chain and the chains below it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainSpec {
    /// Cluster label, e.g. `Region2`.
    pub name: String,
    /// Code accepted by `--include`, e.g. `p`.
    pub code: String,
    pub endpoint: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub children: Vec<ChainSpec>,
}

impl ChainSpec {
    fn new(name: &str, code: &str, port: u16, color: &str, children: Vec<ChainSpec>) -> Self {
        Self {
            name: name.to_string(),
            code: code.to_string(),
            endpoint: format!("http://127.0.0.1:{port}"),
            color: Some(color.to_string()),
            children,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub root: ChainSpec,
}

impl Default for Topology {
    /// One Prime, three Regions, three Zones per Region, on the default local ports.
    fn default() -> Self {
        let zone = |name, code, port, color| ChainSpec::new(name, code, port, color, vec![]);
        let region1 = ChainSpec::new(
            "Region1",
            "c",
            8578,
            "green",
            vec![
                zone("Zone11", "c1", 8610, "lawngreen"),
                zone("Zone12", "c2", 8642, "limegreen"),
                zone("Zone13", "c3", 8674, "mediumspringgreen"),
            ],
        );
        let region2 = ChainSpec::new(
            "Region2",
            "p",
            8580,
            "dodgerblue",
            vec![
                zone("Zone21", "p1", 8612, "aqua"),
                zone("Zone22", "p2", 8644, "blue"),
                zone("Zone23", "p3", 8676, "#8a4cee"),
            ],
        );
        let region3 = ChainSpec::new(
            "Region3",
            "h",
            8582,
            "orange",
            vec![
                zone("Zone31", "h1", 8614, "darkorange1"),
                zone("Zone32", "h2", 8646, "orangered2"),
                zone("Zone33", "h3", 8678, "#c55200"),
            ],
        );

        Topology {
            root: ChainSpec::new("Prime", "prime", 8546, "red", vec![region1, region2, region3]),
        }
    }
}

impl Topology {
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| VisualizerError::Topology(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| VisualizerError::Topology(format!("{}: {e}", path.display())))?;
        Self::from_toml(&contents)
    }
}

/// Inclusive window of heights to walk on one chain. Empty when `start > end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanRange {
    pub start: BlockNumber,
    pub end: BlockNumber,
}

impl Default for ScanRange {
    /// Empty until the chain height is known.
    fn default() -> Self {
        Self { start: 1, end: 0 }
    }
}

impl ScanRange {
    pub fn new(start: BlockNumber, end: BlockNumber) -> Self {
        Self { start, end }
    }

    /// The window for a chain whose head is at `height`.
    ///
    /// A zero `start` means "the last `range` blocks"; the start never drops
    /// below 1 and the end never passes the head.
    pub fn window(start: BlockNumber, range: u64, height: BlockNumber) -> Self {
        if start == 0 {
            Self {
                start: height.saturating_sub(range).max(1),
                end: height,
            }
        } else {
            Self {
                start,
                end: start.saturating_add(range).min(height),
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn widen_to(&mut self, number: BlockNumber) {
        if self.is_empty() {
            *self = Self::new(number, number);
            return;
        }
        if number < self.start {
            self.start = number;
        }
        if number > self.end {
            self.end = number;
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockRecord {
    pub hash: BlockHash,
    pub number: BlockNumber,
}

impl BlockRecord {
    pub fn key(&self, level: Level) -> NodeKey {
        NodeKey::new(level, &self.hash)
    }
}

/// Insertion-ordered blocks of one chain, unique by short hash.
#[derive(Clone, Debug, Default)]
pub struct BlockSet {
    records: Vec<BlockRecord>,
    keys: HashSet<ShortHash>,
}

impl BlockSet {
    /// Returns false when a block with the same short hash is already present.
    pub fn insert(&mut self, record: BlockRecord) -> bool {
        if !self.keys.insert(record.hash.short()) {
            return false;
        }
        self.records.push(record);
        true
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockRecord> {
        self.records.iter()
    }

    pub fn as_slice(&self) -> &[BlockRecord] {
        &self.records
    }

    /// Stable sort by number, so equal numbers keep their insertion order.
    pub fn sort_by_number(&mut self) {
        self.records.sort_by_key(|record| record.number);
    }
}

pub struct ChainNode {
    pub name: String,
    pub code: String,
    pub endpoint: String,
    pub color: String,
    pub level: Level,
    pub children: Vec<ChainId>,
    pub scan: ScanRange,
    pub blocks: BlockSet,
    source: Arc<dyn HeaderSource>,
}

impl ChainNode {
    pub fn source(&self) -> &Arc<dyn HeaderSource> {
        &self.source
    }

    /// Adds a block to this chain unless its short hash is already known.
    pub fn register(&mut self, hash: BlockHash, number: BlockNumber) -> bool {
        self.blocks.insert(BlockRecord { hash, number })
    }
}

fn default_color(level: Level) -> &'static str {
    match level {
        Level::Prime => "red",
        Level::Region => "green",
        Level::Zone => "lawngreen",
    }
}

/// All chains of one run. Chain ids are assigned breadth first, so the root
/// is always id 0, followed by every Region and then every Zone.
pub struct ChainForest {
    chains: Vec<ChainNode>,
    walk_order: Vec<ChainId>,
}

impl ChainForest {
    /// Builds the chain tree, asking `connect` for the header source of every node.
    pub fn build<F>(topology: &Topology, mut connect: F) -> Result<Self>
    where
        F: FnMut(&ChainSpec) -> Result<Arc<dyn HeaderSource>>,
    {
        let mut chains: Vec<ChainNode> = Vec::new();
        let mut codes = HashSet::new();
        let mut queue: VecDeque<(&ChainSpec, Option<ChainId>, usize)> = VecDeque::new();
        queue.push_back((&topology.root, None, 0));

        while let Some((spec, parent, depth)) = queue.pop_front() {
            let level = Level::from_order(depth).ok_or_else(|| {
                VisualizerError::Topology(format!(
                    "{} is nested deeper than the zone level",
                    spec.name
                ))
            })?;
            if !codes.insert(spec.code.clone()) {
                return Err(VisualizerError::Topology(format!(
                    "duplicate chain code {:?}",
                    spec.code
                )));
            }

            let id = chains.len();
            if let Some(parent) = parent {
                chains[parent].children.push(id);
            }
            chains.push(ChainNode {
                name: spec.name.clone(),
                code: spec.code.clone(),
                endpoint: spec.endpoint.clone(),
                color: spec
                    .color
                    .clone()
                    .unwrap_or_else(|| default_color(level).to_string()),
                level,
                children: Vec::new(),
                scan: ScanRange::default(),
                blocks: BlockSet::default(),
                source: connect(spec)?,
            });

            for child in &spec.children {
                queue.push_back((child, Some(id), depth + 1));
            }
        }

        let walk_order = (0..chains.len()).collect();
        Ok(Self { chains, walk_order })
    }

    /// Restricts the walked and rendered chains to `codes`, in the given order.
    /// An empty list keeps every chain.
    pub fn include(&mut self, codes: &[String]) -> Result<()> {
        if codes.is_empty() {
            self.walk_order = (0..self.chains.len()).collect();
            return Ok(());
        }

        let mut walk_order = Vec::with_capacity(codes.len());
        for code in codes {
            let id = self
                .chains
                .iter()
                .position(|chain| &chain.code == code)
                .ok_or_else(|| VisualizerError::Topology(format!("unknown chain code {code:?}")))?;
            if !walk_order.contains(&id) {
                walk_order.push(id);
            }
        }
        self.walk_order = walk_order;
        Ok(())
    }

    /// Sets every walked chain's scan range from its current height.
    pub async fn init_scan_ranges(&mut self, start: BlockNumber, range: u64) -> Result<()> {
        for id in self.walk_order.clone() {
            let chain = &mut self.chains[id];
            let height = chain.source.current_height().await.map_err(|source| {
                VisualizerError::HeightUnavailable {
                    chain: chain.name.clone(),
                    source,
                }
            })?;
            chain.scan = ScanRange::window(start, range, height);
            info!(
                chain = %chain.name,
                endpoint = %chain.endpoint,
                height,
                start = chain.scan.start,
                end = chain.scan.end,
                "scan range set"
            );
        }
        Ok(())
    }

    pub const fn root(&self) -> ChainId {
        0
    }

    pub fn walk_order(&self) -> &[ChainId] {
        &self.walk_order
    }

    pub fn is_included(&self, id: ChainId) -> bool {
        self.walk_order.contains(&id)
    }

    /// Children of `id` that take part in this run.
    pub fn included_children(&self, id: ChainId) -> Vec<ChainId> {
        self.chains[id]
            .children
            .iter()
            .copied()
            .filter(|child| self.is_included(*child))
            .collect()
    }

    pub fn find(&self, code: &str) -> Option<ChainId> {
        self.chains.iter().position(|chain| chain.code == code)
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    pub fn chain(&self, id: ChainId) -> &ChainNode {
        &self.chains[id]
    }

    pub fn chain_mut(&mut self, id: ChainId) -> &mut ChainNode {
        &mut self.chains[id]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceResult;
    use crate::types::Header;
    use async_trait::async_trait;

    struct Idle;

    #[async_trait]
    impl HeaderSource for Idle {
        async fn current_height(&self) -> SourceResult<BlockNumber> {
            Ok(50)
        }
        async fn header_by_number(&self, _: BlockNumber) -> SourceResult<Option<Header>> {
            Ok(None)
        }
        async fn header_by_hash(&self, _: &BlockHash) -> SourceResult<Option<Header>> {
            Ok(None)
        }
    }

    fn idle_forest(topology: &Topology) -> Result<ChainForest> {
        ChainForest::build(topology, |_| Ok(Arc::new(Idle) as Arc<dyn HeaderSource>))
    }

    #[test]
    fn default_topology_has_thirteen_chains() {
        let forest = idle_forest(&Topology::default()).unwrap();
        assert_eq!(forest.len(), 13);
        assert_eq!(forest.chain(forest.root()).level, Level::Prime);
        assert_eq!(forest.chain(forest.root()).children, vec![1, 2, 3]);
        assert_eq!(forest.chain(2).children, vec![7, 8, 9]);

        let zones = (0..forest.len())
            .filter(|id| forest.chain(*id).level == Level::Zone)
            .count();
        assert_eq!(zones, 9);
        assert_eq!(forest.chain(9).name, "Zone23");
        assert_eq!(forest.chain(9).color, "#8a4cee");
    }

    #[test]
    fn include_follows_requested_order() {
        let mut forest = idle_forest(&Topology::default()).unwrap();
        forest
            .include(&["c1".to_string(), "prime".to_string(), "c1".to_string()])
            .unwrap();
        assert_eq!(forest.walk_order(), &[4, 0]);
        assert!(forest.included_children(0).is_empty());

        let err = forest.include(&["x9".to_string()]).unwrap_err();
        assert!(matches!(err, VisualizerError::Topology(_)));
    }

    #[test]
    fn window_is_clamped_to_chain_height() {
        assert_eq!(ScanRange::window(0, 100, 50), ScanRange::new(1, 50));
        assert_eq!(ScanRange::window(0, 10, 50), ScanRange::new(40, 50));
        assert_eq!(ScanRange::window(45, 10, 50), ScanRange::new(45, 50));
        assert_eq!(ScanRange::window(20, 10, 50), ScanRange::new(20, 30));
        assert!(ScanRange::window(0, 100, 0).is_empty());
    }

    #[test]
    fn unset_range_is_empty() {
        assert!(ScanRange::default().is_empty());
    }

    #[test]
    fn widening_only_grows() {
        let mut scan = ScanRange::new(10, 20);
        scan.widen_to(15);
        assert_eq!(scan, ScanRange::new(10, 20));
        scan.widen_to(4);
        scan.widen_to(30);
        assert_eq!(scan, ScanRange::new(4, 30));

        let mut unset = ScanRange::default();
        unset.widen_to(7);
        assert_eq!(unset, ScanRange::new(7, 7));
    }

    #[test]
    fn block_set_rejects_duplicate_short_hashes() {
        let mut blocks = BlockSet::default();
        let hash = BlockHash([3; 32]);
        assert!(blocks.insert(BlockRecord { hash, number: 1 }));
        assert!(!blocks.insert(BlockRecord { hash, number: 2 }));
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks.as_slice()[0].number, 1);
    }

    #[test]
    fn topology_parses_from_toml() {
        let topology = Topology::from_toml(
            r#"
            [root]
            name = "Prime"
            code = "prime"
            endpoint = "http://10.0.0.1:8546"

            [[root.children]]
            name = "Region1"
            code = "c"
            endpoint = "http://10.0.0.1:8578"
            color = "green"
            "#,
        )
        .unwrap();
        let forest = idle_forest(&topology).unwrap();
        assert_eq!(forest.len(), 2);
        assert_eq!(forest.chain(0).color, "red");
        assert_eq!(forest.chain(1).level, Level::Region);
    }

    #[test]
    fn topology_deeper_than_zone_is_rejected() {
        let leaf = |name: &str, children| ChainSpec::new(name, name, 1, "red", children);
        let topology = Topology {
            root: leaf("a", vec![leaf("b", vec![leaf("c", vec![leaf("d", vec![])])])]),
        };
        assert!(matches!(
            idle_forest(&topology),
            Err(VisualizerError::Topology(_))
        ));
    }

    #[test]
    fn duplicate_codes_are_rejected() {
        let mut topology = Topology::default();
        topology.root.children[1].code = "c".to_string();
        assert!(matches!(
            idle_forest(&topology),
            Err(VisualizerError::Topology(_))
        ));
    }

    #[tokio::test]
    async fn scan_ranges_follow_current_height() {
        let mut forest = idle_forest(&Topology::default()).unwrap();
        forest.init_scan_ranges(0, 100).await.unwrap();
        assert_eq!(forest.chain(5).scan, ScanRange::new(1, 50));
    }
}
