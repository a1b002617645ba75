/*!
Partitions a similarity graph into molecule families with a bounded bidding scheme.

Every node walks up to `max_steps` edges and places a bid on each node it reaches, weighted by `size(bidder)^(1/steps) / size(target)`.
Nodes then accept their best qualifying bid in node order, which rewires them to point only at the bidder.
Centroids never accept bids and are cut apart from each other.
Finally, connected components of the pruned graph become families.

# Example usage
```rust
use seqfam::config::NetworkConfig;
use seqfam::partition::{Partitioner, SimilarityGraph};

// a node of 10 reads with two single-read neighbors
let graph = SimilarityGraph::from_edges(3, &[(0, 1), (0, 2)]);
let sizes = [10, 1, 1];
let partition = Partitioner::new(graph, &sizes, 0, NetworkConfig::default())
    .unwrap()
    .run();
assert_eq!(partition.families().len(), 1);
assert_eq!(partition.families()[0].members(), &[0, 1, 2]);
assert_eq!(partition.merges().len(), 2);
```
*/

use itertools::Itertools;
use log::{debug, trace};
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use std::collections::VecDeque;

use crate::config::NetworkConfig;
use crate::errors::DedupError;

/// Adjacency sets over dense node indices
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SimilarityGraph {
    adjacency: Vec<HashSet<usize>>
}

impl SimilarityGraph {
    /// Creates a graph with `node_count` nodes and no edges
    pub fn new(node_count: usize) -> SimilarityGraph {
        SimilarityGraph {
            adjacency: vec![HashSet::default(); node_count]
        }
    }

    /// Creates a graph from a list of undirected edges.
    /// # Arguments
    /// * `node_count` - the number of nodes
    /// * `edges` - pairs of node indices, self-loops are ignored
    /// # Panics
    /// * if an edge refers to a node outside of `0..node_count`
    pub fn from_edges(node_count: usize, edges: &[(usize, usize)]) -> SimilarityGraph {
        let mut graph = SimilarityGraph::new(node_count);
        for &(a, b) in edges.iter() {
            graph.add_edge(a, b);
        }
        graph
    }

    /// Adds an undirected edge, ignoring self-loops
    pub fn add_edge(&mut self, a: usize, b: usize) {
        if a != b {
            self.adjacency[a].insert(b);
            self.adjacency[b].insert(a);
        }
    }

    /// Neighbors of a node
    pub fn neighbors(&self, node: usize) -> &HashSet<usize> {
        &self.adjacency[node]
    }

    /// Neighbors of a node in ascending order
    pub fn sorted_neighbors(&self, node: usize) -> Vec<usize> {
        self.adjacency[node].iter().copied().sorted_unstable().collect()
    }

    /// Number of undirected edges
    pub fn edge_count(&self) -> usize {
        let directed: usize = self.adjacency.iter().map(|a| a.len()).sum();
        directed / 2
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }
}

/// An offer from one node to absorb another
#[derive(Clone, Debug, PartialEq)]
pub struct Bid {
    /// The node placing the bid
    pub bidder: usize,
    /// The node being bid on
    pub target: usize,
    /// Number of edges walked from bidder to target
    pub steps: usize,
    /// `size(bidder)^(1/steps) / size(target)`
    pub weight: f64
}

/// An accepted bid: `node` merged into `parent`
#[derive(Clone, Debug, PartialEq)]
pub struct Merge {
    pub node: usize,
    pub parent: usize,
    pub weight: f64
}

/// A connected component of the pruned graph
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Family {
    /// The first node of the family in node order, which is also its largest
    head: usize,
    /// All nodes of the family in ascending order, including the head
    members: Vec<usize>
}

impl Family {
    /// Constructor, `members` is sorted on creation
    pub fn new(head: usize, mut members: Vec<usize>) -> Family {
        members.sort_unstable();
        Family { head, members }
    }

    // getters
    pub fn head(&self) -> usize {
        self.head
    }

    pub fn members(&self) -> &[usize] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Result of a partitioning run
#[derive(Clone, Debug, PartialEq)]
pub struct Partition {
    /// Families in order of their head node
    families: Vec<Family>,
    /// Accepted bids in the order they were accepted
    merges: Vec<Merge>,
    /// Nodes that were flagged as centroids
    centroids: Vec<usize>
}

impl Partition {
    // getters
    pub fn families(&self) -> &[Family] {
        &self.families
    }

    pub fn merges(&self) -> &[Merge] {
        &self.merges
    }

    pub fn centroids(&self) -> &[usize] {
        &self.centroids
    }
}

/// Owns a copy of the similarity graph and prunes it into families.
/// Node order matters: node `i` is expected to be at least as large as node `i + 1`, and earlier nodes win acceptance ties.
#[derive(Debug)]
pub struct Partitioner<'a> {
    /// The graph being pruned, modified in place
    graph: SimilarityGraph,
    /// Read count of each node
    sizes: &'a [usize],
    /// Flags the nodes that never accept bids
    is_centroid: Vec<bool>,
    /// Walk and acceptance parameters
    config: NetworkConfig
}

impl<'a> Partitioner<'a> {
    /// Creates a new partitioner and flags centroids.
    /// The first `total_centroids` nodes are centroids, except any node with a single read.
    /// # Arguments
    /// * `graph` - the similarity graph, which is consumed
    /// * `sizes` - the read count of each node
    /// * `total_centroids` - the number of leading nodes to treat as real molecules
    /// * `config` - walk and acceptance parameters
    /// # Errors
    /// * if `sizes` does not match the graph, contains a zero, or the config is invalid
    pub fn new(graph: SimilarityGraph, sizes: &'a [usize], total_centroids: usize, config: NetworkConfig) -> Result<Partitioner<'a>, DedupError> {
        config.validate()?;
        if sizes.len() != graph.len() {
            return Err(DedupError::InvalidParameter {
                parameter: "sizes".to_string(),
                reason: format!("expected {} node sizes, got {}", graph.len(), sizes.len())
            });
        }
        if sizes.iter().any(|&s| s == 0) {
            return Err(DedupError::InvalidParameter {
                parameter: "sizes".to_string(),
                reason: "every node must hold at least one read".to_string()
            });
        }

        let is_centroid: Vec<bool> = sizes.iter()
            .enumerate()
            .map(|(i, &size)| i < total_centroids && size > 1)
            .collect();

        Ok(Partitioner {
            graph,
            sizes,
            is_centroid,
            config
        })
    }

    /// Nodes flagged as centroids, in ascending order
    pub fn centroids(&self) -> Vec<usize> {
        self.is_centroid.iter()
            .enumerate()
            .filter_map(|(i, &c)| if c { Some(i) } else { None })
            .collect()
    }

    /// Breadth-first walk from `start` for up to `max_steps` edges.
    /// Nodes larger than `start` are recorded but not walked through.
    /// Returns `(node, steps)` for every reached node other than `start`, ordered by node.
    /// # Arguments
    /// * `start` - the node to walk from
    pub fn walk(&self, start: usize) -> Vec<(usize, usize)> {
        let limit = self.sizes[start];
        let mut steps_to: HashMap<usize, usize> = Default::default();
        let mut frontier: Vec<usize> = self.graph.neighbors(start).iter().copied().collect();

        for step in 1..=self.config.max_steps {
            let level: HashSet<usize> = std::mem::take(&mut frontier).into_iter()
                .filter(|n| *n != start && !steps_to.contains_key(n))
                .collect();
            if level.is_empty() {
                break;
            }

            let mut next: HashSet<usize> = Default::default();
            for &node in level.iter() {
                steps_to.insert(node, step);
                if self.sizes[node] > limit {
                    continue;
                }
                next.extend(self.graph.neighbors(node).iter().filter(|n| !level.contains(*n)));
            }
            frontier = next.into_iter().collect();
        }

        steps_to.into_iter().sorted_unstable().collect()
    }

    /// Walks from every node and gathers the bids placed on each node.
    /// Bids on a node are sorted by weight, highest first, then by bidder.
    pub fn collect_bids(&self) -> Vec<Vec<Bid>> {
        let mut bids: Vec<Vec<Bid>> = vec![vec![]; self.graph.len()];
        for bidder in 0..self.graph.len() {
            let bidder_size = self.sizes[bidder] as f64;
            for (target, steps) in self.walk(bidder) {
                let weight = bidder_size.powf(1.0 / steps as f64) / self.sizes[target] as f64;
                trace!("Bid {bidder} -> {target}: steps = {steps}, weight = {weight}");
                bids[target].push(Bid { bidder, target, steps, weight });
            }
        }

        for offers in bids.iter_mut() {
            offers.sort_by(|a, b| b.weight.total_cmp(&a.weight).then(a.bidder.cmp(&b.bidder)));
        }
        bids
    }

    /// Resolves bids in node order, rewiring the graph for every accepted bid.
    /// A bid is skipped if the bidder has already merged into another node.
    fn accept_bids(&mut self, bids: &[Vec<Bid>]) -> Vec<Merge> {
        let node_count = self.graph.len();
        let mut merged_into: Vec<Option<usize>> = vec![None; node_count];
        let mut merges = vec![];

        for node in 0..node_count {
            if self.is_centroid[node] || bids[node].is_empty() || merged_into[node].is_some() {
                continue;
            }

            let previous_neighbors: Vec<usize> = self.graph.neighbors(node).iter().copied().collect();
            for bid in bids[node].iter() {
                if bid.weight < self.config.min_bidding_ratio {
                    // sorted, nothing after this qualifies
                    break;
                }
                if merged_into[bid.bidder].is_some() {
                    trace!("Node {node} skips bid from {}, which already merged", bid.bidder);
                    continue;
                }

                trace!("Node {node} accepts bid from {} with weight {}", bid.bidder, bid.weight);
                let mut only_bidder: HashSet<usize> = Default::default();
                only_bidder.insert(bid.bidder);
                self.graph.adjacency[node] = only_bidder;
                self.graph.adjacency[bid.bidder].insert(node);
                for &neighbor in previous_neighbors.iter().filter(|&&n| n != bid.bidder) {
                    self.graph.adjacency[neighbor].remove(&node);
                }

                merged_into[node] = Some(bid.bidder);
                merges.push(Merge { node, parent: bid.bidder, weight: bid.weight });
                break;
            }
        }
        merges
    }

    /// Removes every edge that joins two centroids
    fn separate_centroids(&mut self) {
        for node in 0..self.graph.len() {
            if self.is_centroid[node] {
                let is_centroid = &self.is_centroid;
                self.graph.adjacency[node].retain(|n| !is_centroid[*n]);
            }
        }
    }

    /// Replaces the graph with one that only holds the accepted merge links
    fn keep_merge_links(&mut self, merges: &[Merge]) {
        let mut graph = SimilarityGraph::new(self.graph.len());
        for merge in merges.iter() {
            graph.add_edge(merge.node, merge.parent);
        }
        self.graph = graph;
    }

    /// Collapses the current graph into connected components.
    /// Edges are followed in both directions, so every node lands in exactly one family.
    pub fn collapse(&self) -> Vec<Family> {
        let node_count = self.graph.len();
        let mut undirected: Vec<Vec<usize>> = vec![vec![]; node_count];
        for (node, neighbors) in self.graph.adjacency.iter().enumerate() {
            for &neighbor in neighbors.iter() {
                undirected[node].push(neighbor);
                undirected[neighbor].push(node);
            }
        }

        let mut collapsed = vec![false; node_count];
        let mut families = vec![];
        for seed in 0..node_count {
            if collapsed[seed] {
                continue;
            }

            collapsed[seed] = true;
            let mut members = vec![seed];
            let mut queue: VecDeque<usize> = VecDeque::from([seed]);
            while let Some(node) = queue.pop_front() {
                for &neighbor in undirected[node].iter() {
                    if !collapsed[neighbor] {
                        collapsed[neighbor] = true;
                        members.push(neighbor);
                        queue.push_back(neighbor);
                    }
                }
            }
            families.push(Family::new(seed, members));
        }
        families
    }

    /// Runs bidding, centroid separation, and collapsing.
    pub fn run(mut self) -> Partition {
        let bids = self.collect_bids();
        let merges = self.accept_bids(&bids);
        self.separate_centroids();
        if !self.config.retain_unbid_edges {
            self.keep_merge_links(&merges);
        }

        let families = self.collapse();
        debug!("Partitioned {} nodes into {} families with {} merges", self.graph.len(), families.len(), merges.len());
        Partition {
            families,
            merges,
            centroids: self.centroids()
        }
    }

    /// Read-only view of the graph in its current state
    pub fn graph(&self) -> &SimilarityGraph {
        &self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::NetworkConfigBuilder;

    fn members(partition: &Partition) -> Vec<Vec<usize>> {
        partition.families().iter().map(|f| f.members().to_vec()).collect()
    }

    #[test]
    fn test_walk_respects_size() {
        // 0 (5) - 1 (1) - 2 (1) - 3 (1), and 1 - 4 (9)
        let graph = SimilarityGraph::from_edges(5, &[(0, 1), (1, 2), (2, 3), (1, 4)]);
        let sizes = [5, 1, 1, 1, 9];
        let config = NetworkConfigBuilder::default().max_steps(3).build().unwrap();
        let partitioner = Partitioner::new(graph, &sizes, 0, config).unwrap();

        assert_eq!(partitioner.walk(0), vec![(1, 1), (2, 2), (3, 3), (4, 2)]);
        // 4 is larger than 1, so it is reached but not walked through
        assert_eq!(partitioner.walk(1), vec![(0, 1), (2, 1), (3, 2), (4, 1)]);
        // 0 and 4 are only reached on the last step
        assert_eq!(partitioner.walk(3), vec![(0, 3), (1, 2), (2, 1), (4, 3)]);
    }

    #[test]
    fn test_walk_bounded() {
        let graph = SimilarityGraph::from_edges(4, &[(0, 1), (1, 2), (2, 3)]);
        let sizes = [4, 1, 1, 1];
        let partitioner = Partitioner::new(graph, &sizes, 0, NetworkConfig::default()).unwrap();
        assert_eq!(partitioner.walk(0), vec![(1, 1), (2, 2)]);
    }

    #[test]
    fn test_walk_blocked_by_larger() {
        let graph = SimilarityGraph::from_edges(3, &[(0, 1), (1, 2)]);
        let sizes = [1, 5, 1];
        let partitioner = Partitioner::new(graph, &sizes, 0, NetworkConfig::default()).unwrap();
        // node 1 is larger than node 0, so node 2 is never reached
        assert_eq!(partitioner.walk(0), vec![(1, 1)]);
    }

    #[test]
    fn test_bid_weights() {
        let graph = SimilarityGraph::from_edges(3, &[(0, 1), (1, 2)]);
        let sizes = [9, 1, 1];
        let partitioner = Partitioner::new(graph, &sizes, 0, NetworkConfig::default()).unwrap();
        let bids = partitioner.collect_bids();

        // node 2 gets 9^(1/2) / 1 from node 0 and 1 / 1 from node 1
        assert_eq!(bids[2].len(), 2);
        assert_eq!(bids[2][0].bidder, 0);
        assert_eq!(bids[2][0].steps, 2);
        assert!((bids[2][0].weight - 3.0).abs() < 1e-12);
        assert_eq!(bids[2][1].bidder, 1);
        assert!((bids[2][1].weight - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_merge() {
        // AAAA x2 and AAAT x1
        let graph = SimilarityGraph::from_edges(2, &[(0, 1)]);
        let sizes = [2, 1];
        let partition = Partitioner::new(graph, &sizes, 0, NetworkConfig::default()).unwrap().run();
        assert_eq!(partition.merges(), &[Merge { node: 1, parent: 0, weight: 2.0 }]);
        assert_eq!(members(&partition), vec![vec![0, 1]]);
    }

    #[test]
    fn test_ratio_above_every_weight() {
        let graph = SimilarityGraph::from_edges(4, &[(0, 1), (0, 2), (1, 2), (2, 3)]);
        let sizes = [100, 3, 1, 1];
        let config = NetworkConfigBuilder::default().min_bidding_ratio(1e9).build().unwrap();
        let partition = Partitioner::new(graph, &sizes, 0, config).unwrap().run();
        assert!(partition.merges().is_empty());
        assert_eq!(members(&partition), vec![vec![0], vec![1], vec![2], vec![3]]);
    }

    #[test]
    fn test_retain_unbid_edges() {
        // 5 and 4 never reach a 2:1 ratio, so only kept edges can join them
        let graph = SimilarityGraph::from_edges(2, &[(0, 1)]);
        let sizes = [5, 4];

        let partition = Partitioner::new(graph.clone(), &sizes, 0, NetworkConfig::default()).unwrap().run();
        assert_eq!(members(&partition), vec![vec![0], vec![1]]);

        let config = NetworkConfigBuilder::default().retain_unbid_edges(true).build().unwrap();
        let partition = Partitioner::new(graph, &sizes, 0, config).unwrap().run();
        assert!(partition.merges().is_empty());
        assert_eq!(members(&partition), vec![vec![0, 1]]);
    }

    #[test]
    fn test_centroids_stay_apart() {
        // two large nodes joined by an error between them
        let graph = SimilarityGraph::from_edges(3, &[(0, 1), (0, 2), (1, 2)]);
        let sizes = [20, 18, 1];
        let config = NetworkConfigBuilder::default().retain_unbid_edges(true).build().unwrap();
        let partitioner = Partitioner::new(graph, &sizes, 2, config).unwrap();
        assert_eq!(partitioner.centroids(), vec![0, 1]);

        let partition = partitioner.run();
        // the error accepts node 0 (20 > 18) and drops its edge to node 1
        assert_eq!(partition.merges(), &[Merge { node: 2, parent: 0, weight: 20.0 }]);
        assert_eq!(members(&partition), vec![vec![0, 2], vec![1]]);
    }

    #[test]
    fn test_centroids_never_accept() {
        let graph = SimilarityGraph::from_edges(2, &[(0, 1)]);
        let sizes = [10, 2];
        // node 1 would normally accept node 0 (10 / 2 = 5)
        let partition = Partitioner::new(graph, &sizes, 2, NetworkConfig::default()).unwrap().run();
        assert_eq!(partition.centroids(), &[0, 1]);
        assert!(partition.merges().is_empty());
        assert_eq!(partition.families().len(), 2);
    }

    #[test]
    fn test_singleton_not_centroid() {
        let graph = SimilarityGraph::new(3);
        let sizes = [3, 1, 1];
        let partitioner = Partitioner::new(graph, &sizes, 2, NetworkConfig::default()).unwrap();
        assert_eq!(partitioner.centroids(), vec![0]);
    }

    #[test]
    fn test_merged_bidder_skipped() {
        // chain 0 (16) - 1 (4) - 2 (1), with one step walks
        let graph = SimilarityGraph::from_edges(3, &[(0, 1), (1, 2)]);
        let sizes = [16, 4, 1];
        let config = NetworkConfigBuilder::default().max_steps(1).build().unwrap();
        let partition = Partitioner::new(graph, &sizes, 0, config).unwrap().run();

        // node 1 merges into 0 first, so node 2 cannot accept node 1
        assert_eq!(partition.merges(), &[Merge { node: 1, parent: 0, weight: 4.0 }]);
        assert_eq!(members(&partition), vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn test_covers_every_node_once() {
        let edges = [(0, 1), (0, 2), (1, 3), (2, 3), (3, 4), (5, 6), (6, 7), (4, 7)];
        let sizes = [30, 12, 6, 3, 2, 9, 1, 1];
        for retain in [false, true] {
            let graph = SimilarityGraph::from_edges(8, &edges);
            let config = NetworkConfigBuilder::default().retain_unbid_edges(retain).build().unwrap();
            let partition = Partitioner::new(graph, &sizes, 2, config).unwrap().run();
            let mut all: Vec<usize> = partition.families().iter().flat_map(|f| f.members().iter().copied()).collect();
            all.sort_unstable();
            assert_eq!(all, (0..8).collect::<Vec<usize>>());
            for family in partition.families() {
                assert_eq!(family.head(), family.members()[0]);
            }
        }
    }

    #[test]
    fn test_invalid_sizes() {
        let graph = SimilarityGraph::new(2);
        assert!(Partitioner::new(graph.clone(), &[1], 0, NetworkConfig::default()).is_err());
        assert!(Partitioner::new(graph, &[1, 0], 0, NetworkConfig::default()).is_err());
    }
}
