//! Graph assembly over a [`ChainForest`]: range walks, coincidence probing,
//! difficulty promotion and timeline ordering.

use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::difficulty::classify;
use crate::error::{Result, VisualizerError};
use crate::hierarchy::ChainForest;
use crate::types::{BlockHash, BlockNumber, ChainId, Header, Level, NodeKey};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Consecutive heights of one chain.
    Next,
    /// The same block seen from two adjacent levels. Undirected.
    Coincident,
    /// Consecutive blocks of a chain after ordering.
    Timeline,
}

impl EdgeKind {
    pub fn is_directed(self) -> bool {
        !matches!(self, EdgeKind::Coincident)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edge {
    pub from: NodeKey,
    pub to: NodeKey,
    pub kind: EdgeKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct EdgeKey {
    directed: bool,
    from: NodeKey,
    to: NodeKey,
}

/// Mutable state of one visualisation run: the edge list plus the memoised
/// results of hash lookups against each chain.
#[derive(Debug, Default)]
pub struct GraphSession {
    compressed: bool,
    edges: Vec<Edge>,
    edge_keys: HashSet<EdgeKey>,
    probes: HashMap<(ChainId, BlockHash), Option<Header>>,
}

impl GraphSession {
    /// `compressed` keeps scan ranges fixed when coincident blocks fall outside them.
    pub fn new(compressed: bool) -> Self {
        Self {
            compressed,
            ..Self::default()
        }
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Appends an edge unless one with the same direction and endpoints exists.
    pub fn add_edge(&mut self, from: NodeKey, to: NodeKey, kind: EdgeKind) -> bool {
        let key = EdgeKey {
            directed: kind.is_directed(),
            from: from.clone(),
            to: to.clone(),
        };
        if !self.edge_keys.insert(key) {
            return false;
        }
        self.edges.push(Edge { from, to, kind });
        true
    }

    pub fn has_edge(&self, from: &NodeKey, to: &NodeKey, directed: bool) -> bool {
        self.edge_keys.contains(&EdgeKey {
            directed,
            from: from.clone(),
            to: to.clone(),
        })
    }

    /// Links the representation of `hash` at `upper` with the one a level below.
    fn link_levels(&mut self, hash: &BlockHash, upper: Level) {
        if let Some(lower) = upper.below() {
            self.add_edge(
                NodeKey::new(upper, hash),
                NodeKey::new(lower, hash),
                EdgeKind::Coincident,
            );
        }
    }

    /// Runs every pass in order: assembly, promotion, ordering.
    pub async fn run(&mut self, forest: &mut ChainForest) -> Result<()> {
        self.assemble(forest).await?;
        self.promote(forest).await?;
        self.order_chains(forest);
        info!(edges = self.edges.len(), "graph assembled");
        Ok(())
    }

    async fn fetch(forest: &ChainForest, id: ChainId, height: BlockNumber) -> Result<Header> {
        let chain = forest.chain(id);
        let failure = |reason: String| VisualizerError::HeaderFetchFailure {
            chain: chain.name.clone(),
            height,
            reason,
        };
        match chain.source().header_by_number(height).await {
            Ok(Some(header)) => Ok(header),
            Ok(None) => Err(failure("not found".to_string())),
            Err(e) => Err(failure(e.to_string())),
        }
    }

    /// Looks `hash` up on chain `id`, at most once per session.
    async fn probe(
        &mut self,
        forest: &ChainForest,
        id: ChainId,
        hash: &BlockHash,
    ) -> Result<Header> {
        let chain = forest.chain(id);
        if !self.probes.contains_key(&(id, *hash)) {
            let found = match chain.source().header_by_hash(hash).await {
                Ok(found) => found,
                Err(e) => {
                    debug!(chain = %chain.name, %hash, error = %e, "probe failed");
                    None
                }
            };
            self.probes.insert((id, *hash), found);
        }

        match self.probes.get(&(id, *hash)) {
            Some(Some(header)) => Ok(header.clone()),
            _ => Err(VisualizerError::HeaderProbeMiss {
                chain: chain.name.clone(),
                hash: *hash,
            }),
        }
    }

    /// Walks every included chain's scan range, adding its blocks, its `Next`
    /// spine and the coincident copies of Prime and Region blocks.
    pub async fn assemble(&mut self, forest: &mut ChainForest) -> Result<()> {
        for id in forest.walk_order().to_vec() {
            let level = forest.chain(id).level;
            let mut height = forest.chain(id).scan.start;
            let mut current: Option<Header> = None;
            info!(chain = %forest.chain(id).name, scan = ?forest.chain(id).scan, "walking chain");

            while height <= forest.chain(id).scan.end {
                let header = match current.take() {
                    Some(header) => header,
                    None => Self::fetch(forest, id, height).await?,
                };
                forest.chain_mut(id).register(header.hash, height);

                if height != forest.chain(id).scan.end {
                    let next = Self::fetch(forest, id, height + 1).await?;
                    self.add_edge(
                        NodeKey::new(level, &header.hash),
                        NodeKey::new(level, &next.hash),
                        EdgeKind::Next,
                    );
                    current = Some(next);
                }

                if level < Level::Zone {
                    self.find_coincident(forest, id, header.hash).await;
                }
                height += 1;
            }
        }
        Ok(())
    }

    /// Probes other chains for `hash`, which was found on `origin`, and links
    /// every hit to the hierarchy level above or below it.
    async fn find_coincident(&mut self, forest: &mut ChainForest, origin: ChainId, hash: BlockHash) {
        let first_round: Vec<ChainId> = forest
            .walk_order()
            .iter()
            .copied()
            .filter(|id| *id != origin)
            .collect();
        let mut pending = vec![(origin, first_round)];

        while let Some((from, candidates)) = pending.pop() {
            let from_level = forest.chain(from).level;
            for target in candidates {
                let header = match self.probe(forest, target, &hash).await {
                    Ok(header) => header,
                    Err(e) => {
                        debug!(error = %e, "not coincident");
                        continue;
                    }
                };

                let chain = forest.chain_mut(target);
                let Some(number) = header.number_at(chain.level) else {
                    warn!(chain = %chain.name, %hash, "header has no number for this level");
                    continue;
                };
                if chain.register(hash, number) {
                    debug!(chain = %chain.name, %hash, number, "coincident block");
                }
                if !self.compressed {
                    chain.scan.widen_to(number);
                }

                let target_level = chain.level;
                // Same-level hits carry no hierarchy link.
                if target_level != from_level {
                    self.link_levels(&hash, from_level.min(target_level));
                }
                if target_level < Level::Zone {
                    pending.push((target, forest.included_children(target)));
                }
            }
        }
    }

    /// Number of included chains that know `hash`.
    async fn locate(&mut self, forest: &ChainForest, hash: &BlockHash) -> usize {
        let mut found = 0;
        for id in forest.walk_order().to_vec() {
            if self.probe(forest, id, hash).await.is_ok() {
                found += 1;
            }
        }
        found
    }

    /// Adds the coincidence edges implied by each block's proof-of-work when it
    /// qualifies above its own chain and no other chain was found to hold it.
    pub async fn promote(&mut self, forest: &mut ChainForest) -> Result<()> {
        for id in forest.walk_order().to_vec() {
            let level = forest.chain(id).level;
            let scan = forest.chain(id).scan;
            if scan.is_empty() {
                continue;
            }

            for height in (scan.start..=scan.end).rev() {
                let header = Self::fetch(forest, id, height).await?;
                forest.chain_mut(id).register(header.hash, height);

                let qualified = match classify(Some(&header)) {
                    Ok(qualified) => qualified,
                    Err(e) => {
                        warn!(chain = %forest.chain(id).name, height, error = %e, "skipping promotion");
                        continue;
                    }
                };
                if qualified >= level {
                    continue;
                }
                if self.locate(forest, &header.hash).await > 1 {
                    continue;
                }

                for order in (qualified.order() + 1..=level.order()).rev() {
                    if let Some(upper) = Level::from_order(order - 1) {
                        self.link_levels(&header.hash, upper);
                    }
                }
            }
        }
        Ok(())
    }

    /// Sorts every chain's blocks by number and threads each non-root chain
    /// with `Timeline` edges.
    pub fn order_chains(&mut self, forest: &mut ChainForest) {
        for id in forest.walk_order().to_vec() {
            forest.chain_mut(id).blocks.sort_by_number();
        }

        for id in forest.walk_order().to_vec() {
            if id == forest.root() {
                continue;
            }
            let chain = forest.chain(id);
            let keys: Vec<NodeKey> = chain.blocks.iter().map(|b| b.key(chain.level)).collect();
            for pair in keys.windows(2) {
                self.add_edge(pair[0].clone(), pair[1].clone(), EdgeKind::Timeline);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(level: Level, byte: u8) -> NodeKey {
        NodeKey::new(level, &BlockHash([byte; 32]))
    }

    #[test]
    fn duplicate_edges_are_ignored() {
        let mut session = GraphSession::new(true);
        let (a, b) = (key(Level::Zone, 1), key(Level::Zone, 2));

        assert!(session.add_edge(a.clone(), b.clone(), EdgeKind::Next));
        assert!(!session.add_edge(a.clone(), b.clone(), EdgeKind::Next));
        assert!(!session.add_edge(a.clone(), b.clone(), EdgeKind::Timeline));
        assert_eq!(session.edges().len(), 1);

        assert!(session.add_edge(b.clone(), a.clone(), EdgeKind::Next));
        assert!(session.add_edge(a.clone(), b.clone(), EdgeKind::Coincident));
        assert_eq!(session.edges().len(), 3);
        assert!(session.has_edge(&a, &b, false));
    }

    #[test]
    fn level_links_stop_at_zone() {
        let mut session = GraphSession::new(true);
        let hash = BlockHash([5; 32]);
        session.link_levels(&hash, Level::Prime);
        session.link_levels(&hash, Level::Zone);

        assert_eq!(
            session.edges(),
            &[Edge {
                from: NodeKey::new(Level::Prime, &hash),
                to: NodeKey::new(Level::Region, &hash),
                kind: EdgeKind::Coincident,
            }]
        );
    }
}
