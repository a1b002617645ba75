/*!
Builds the similarity graph over reads described by one or more sequence dimensions.

Reads with identical values in every dimension share a node.
Two nodes are adjacent when they are within the configured edit distance on every dimension at the same time.
Nodes are ordered by size (largest first), with ties going to the node whose first read was observed first.

# Example usage
```rust
use seqfam::seq_network::SeqNetwork;

let mut network: SeqNetwork<String> = SeqNetwork::default();
for (read_id, umi) in [("r1", "AAAA"), ("r2", "AAAT"), ("r3", "AAAA")] {
    network.add_observation("umi", read_id.to_string(), umi.as_bytes(), 1).unwrap();
    network.add_observation("region", read_id.to_string(), b"TGTGCC", 1).unwrap();
}
network.build_graph().unwrap();
assert_eq!(network.node_count(), 2);

let partition = network.partition().unwrap();
assert_eq!(partition.families().len(), 1);
assert_eq!(network.family_reads(&partition.families()[0]).len(), 3);
```
*/

use log::{debug, info};
use rayon::prelude::*;
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use std::fmt::Display;
use std::hash::Hash;

use crate::bktree::{BkTree, DistanceFn};
use crate::centroids::count_centroids;
use crate::config::NetworkConfig;
use crate::errors::DedupError;
use crate::partition::{Family, Partition, Partitioner, SimilarityGraph};
use crate::sequence_alignment::edit_distance;

/// Observations for one named dimension
#[derive(Clone, Debug)]
struct Dimension<R> {
    /// The dimension name
    name: String,
    /// Maximum edit distance between neighboring values
    max_distance: usize,
    /// Value registered for each read
    values: HashMap<R, Vec<u8>>
}

/// A group of reads that share a value in every dimension
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node<R> {
    /// One value per dimension, in dimension registration order
    values: Vec<Vec<u8>>,
    /// Reads in the order they were first observed
    reads: Vec<R>
}

impl<R> Node<R> {
    // getters
    pub fn values(&self) -> &[Vec<u8>] {
        &self.values
    }

    pub fn reads(&self) -> &[R] {
        &self.reads
    }

    /// Number of reads in the node
    pub fn size(&self) -> usize {
        self.reads.len()
    }
}

/// Statistics on a built graph
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphSummary {
    /// Number of distinct reads across all dimensions
    pub read_count: usize,
    /// Number of distinct values per dimension, in registration order
    pub dimensions: Vec<(String, usize)>,
    /// Number of nodes
    pub node_count: usize,
    /// Number of undirected edges
    pub edge_count: usize,
    /// Number of leading nodes treated as real molecules
    pub total_centroids: usize
}

impl Display for GraphSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Reads: {}", self.read_count)?;
        writeln!(f, "Dimensions: {}", self.dimensions.len())?;
        for (name, distinct) in self.dimensions.iter() {
            writeln!(f, "\t{name}: {distinct} distinct values")?;
        }
        writeln!(f, "Nodes: {}", self.node_count)?;
        writeln!(f, "Edges: {}", self.edge_count)?;
        write!(f, "Centroids: {}", self.total_centroids)
    }
}

/// Collects per-dimension observations and turns them into a similarity graph.
#[derive(Clone, Debug)]
pub struct SeqNetwork<R> {
    /// Bidding and search parameters
    config: NetworkConfig,
    /// Dimensions in registration order
    dimensions: Vec<Dimension<R>>,
    /// Name to index into `dimensions`
    dimension_lookup: HashMap<String, usize>,
    /// Every read, in the order it was first observed in any dimension
    read_order: Vec<R>,
    /// Tracks which reads are already in `read_order`
    known_reads: HashSet<R>,
    /// Nodes, largest first
    nodes: Vec<Node<R>>,
    /// Set once `build_graph()` succeeds
    graph: Option<SimilarityGraph>,
    /// Number of leading nodes treated as real molecules
    total_centroids: usize
}

impl<R> Default for SeqNetwork<R> {
    fn default() -> Self {
        SeqNetwork::with_config(NetworkConfig::default())
    }
}

impl<R> SeqNetwork<R> {
    /// Creates an empty network with the given configuration.
    /// # Arguments
    /// * `config` - bidding and search parameters, checked when the graph is built
    pub fn with_config(config: NetworkConfig) -> SeqNetwork<R> {
        SeqNetwork {
            config,
            dimensions: vec![],
            dimension_lookup: Default::default(),
            read_order: vec![],
            known_reads: Default::default(),
            nodes: vec![],
            graph: None,
            total_centroids: 0
        }
    }

    // getters
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn nodes(&self) -> &[Node<R>] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn total_centroids(&self) -> usize {
        self.total_centroids
    }

    pub fn graph(&self) -> Option<&SimilarityGraph> {
        self.graph.as_ref()
    }

    /// Read count of every node, in node order
    pub fn node_sizes(&self) -> Vec<usize> {
        self.nodes.iter().map(|n| n.size()).collect()
    }

    /// Dimension names in registration order
    pub fn dimension_names(&self) -> Vec<&str> {
        self.dimensions.iter().map(|d| d.name.as_str()).collect()
    }
}

impl<R> SeqNetwork<R>
where
    R: Clone + Eq + Hash + Display
{
    /// Records the value of one dimension for one read.
    /// The dimension is created on first use with `max_distance`; later uses must pass the same distance.
    /// Registering the same value twice is a no-op.
    /// # Arguments
    /// * `dimension` - the dimension name
    /// * `read_id` - the read identifier
    /// * `value` - the read's sequence for this dimension
    /// * `max_distance` - the largest edit distance between neighboring values
    /// # Errors
    /// * if the graph was already built
    /// * if the dimension exists with a different `max_distance`
    /// * if the read already has a different value for this dimension; the existing value is kept
    pub fn add_observation(&mut self, dimension: &str, read_id: R, value: &[u8], max_distance: usize) -> Result<(), DedupError> {
        if self.graph.is_some() {
            return Err(DedupError::NetworkFrozen { dimension: dimension.to_string() });
        }

        let dim_index = match self.dimension_lookup.get(dimension) {
            Some(&index) => {
                let existing = self.dimensions[index].max_distance;
                if existing != max_distance {
                    return Err(DedupError::ConflictingDistance {
                        dimension: dimension.to_string(),
                        existing,
                        rejected: max_distance
                    });
                }
                index
            },
            None => {
                let index = self.dimensions.len();
                self.dimensions.push(Dimension {
                    name: dimension.to_string(),
                    max_distance,
                    values: Default::default()
                });
                self.dimension_lookup.insert(dimension.to_string(), index);
                index
            }
        };

        let values = &mut self.dimensions[dim_index].values;
        if let Some(existing) = values.get(&read_id) {
            if existing.as_slice() == value {
                return Ok(());
            }
            return Err(DedupError::ConflictingValue {
                dimension: dimension.to_string(),
                read_id: read_id.to_string(),
                existing: String::from_utf8_lossy(existing).into_owned(),
                rejected: String::from_utf8_lossy(value).into_owned()
            });
        }
        values.insert(read_id.clone(), value.to_vec());

        if self.known_reads.insert(read_id.clone()) {
            self.read_order.push(read_id);
        }
        Ok(())
    }

    /// Groups reads into nodes, selects centroids, and finds every edge.
    /// Can be called again, in which case the graph is rebuilt from the same observations.
    /// # Errors
    /// * if the configuration is invalid
    /// * if a read is missing a value for any dimension
    /// * if the thread pool cannot be created
    pub fn build_graph(&mut self) -> Result<(), DedupError> {
        self.config.validate()?;
        self.nodes = self.define_nodes()?;
        let sizes = self.node_sizes();
        debug!("Grouped {} reads into {} nodes", self.read_order.len(), self.nodes.len());

        // centroids only depend on node sizes
        self.total_centroids = count_centroids(&sizes);
        debug!("Total centroids: {}", self.total_centroids);

        let value_index = self.index_values();
        let pool = if self.config.threads > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.threads)
                .build()
                .map_err(|e| DedupError::ThreadPool(e.to_string()))?;
            Some(pool)
        } else {
            None
        };

        let neighbor_maps: Vec<HashMap<Vec<u8>, HashSet<usize>>> = self.dimensions.iter()
            .zip(value_index.iter())
            .map(|(dimension, index)| search_dimension(index, dimension.max_distance, pool.as_ref()))
            .collect();

        let mut graph = SimilarityGraph::new(self.nodes.len());
        for (node_index, node) in self.nodes.iter().enumerate() {
            let per_dimension: Vec<&HashSet<usize>> = node.values.iter()
                .zip(neighbor_maps.iter())
                .filter_map(|(value, neighbors)| neighbors.get(value))
                .collect();
            let Some((first, rest)) = per_dimension.split_first() else {
                continue;
            };

            for &other in first.iter() {
                if other != node_index && rest.iter().all(|s| s.contains(&other)) {
                    graph.add_edge(node_index, other);
                }
            }
        }
        debug!("Found {} edges", graph.edge_count());

        self.graph = Some(graph);
        info!("Graph summary:\n{}", self.summary());
        Ok(())
    }

    /// Groups reads by their full value tuple and orders the groups largest first.
    fn define_nodes(&self) -> Result<Vec<Node<R>>, DedupError> {
        let mut tuple_lookup: HashMap<Vec<Vec<u8>>, usize> = Default::default();
        let mut nodes: Vec<Node<R>> = vec![];
        for read_id in self.read_order.iter() {
            let values: Vec<Vec<u8>> = self.dimensions.iter()
                .map(|dimension| {
                    dimension.values.get(read_id)
                        .cloned()
                        .ok_or_else(|| DedupError::MissingDimension {
                            dimension: dimension.name.clone(),
                            read_id: read_id.to_string()
                        })
                })
                .collect::<Result<_, _>>()?;

            match tuple_lookup.get(&values) {
                Some(&index) => nodes[index].reads.push(read_id.clone()),
                None => {
                    tuple_lookup.insert(values.clone(), nodes.len());
                    nodes.push(Node { values, reads: vec![read_id.clone()] });
                }
            }
        }

        // stable, so equal sizes stay in first observation order
        nodes.sort_by(|a, b| b.size().cmp(&a.size()));
        Ok(nodes)
    }

    /// For each dimension, maps every distinct value to the nodes holding it
    fn index_values(&self) -> Vec<HashMap<Vec<u8>, Vec<usize>>> {
        (0..self.dimensions.len())
            .map(|dim_index| {
                let mut index: HashMap<Vec<u8>, Vec<usize>> = Default::default();
                for (node_index, node) in self.nodes.iter().enumerate() {
                    index.entry(node.values[dim_index].clone()).or_default().push(node_index);
                }
                index
            })
            .collect()
    }

    /// Partitions the built graph into families.
    /// The network keeps its own graph, so this can be called repeatedly.
    /// # Errors
    /// * if `build_graph()` has not been called
    pub fn partition(&self) -> Result<Partition, DedupError> {
        let graph = self.graph.clone().ok_or(DedupError::GraphNotBuilt)?;
        let sizes = self.node_sizes();
        let partition = Partitioner::new(graph, &sizes, self.total_centroids, self.config.clone())?.run();
        info!("Collapsed {} nodes into {} families", self.nodes.len(), partition.families().len());
        Ok(partition)
    }

    /// All reads of a family, in node order and then observation order
    pub fn family_reads(&self, family: &Family) -> Vec<R> {
        family.members().iter()
            .flat_map(|&node| self.nodes[node].reads.iter().cloned())
            .collect()
    }

    /// Maps every read to its 1-based family number
    /// # Arguments
    /// * `families` - the families to label, numbered in the given order
    pub fn read_labels(&self, families: &[Family]) -> HashMap<R, usize> {
        let mut labels: HashMap<R, usize> = Default::default();
        for (i, family) in families.iter().enumerate() {
            for read_id in self.family_reads(family) {
                labels.insert(read_id, i + 1);
            }
        }
        labels
    }

    /// Summary statistics; node, edge, and centroid counts are zero before the graph is built
    pub fn summary(&self) -> GraphSummary {
        GraphSummary {
            read_count: self.read_order.len(),
            dimensions: self.dimensions.iter()
                .map(|d| {
                    let distinct: HashSet<&Vec<u8>> = d.values.values().collect();
                    (d.name.clone(), distinct.len())
                })
                .collect(),
            node_count: self.graph.as_ref().map_or(0, |g| g.len()),
            edge_count: self.graph.as_ref().map_or(0, |g| g.edge_count()),
            total_centroids: if self.graph.is_some() { self.total_centroids } else { 0 }
        }
    }
}

/// Finds, for every distinct value of one dimension, the union of nodes holding any value within `max_distance`.
fn search_dimension(
    value_index: &HashMap<Vec<u8>, Vec<usize>>, max_distance: usize, pool: Option<&rayon::ThreadPool>
) -> HashMap<Vec<u8>, HashSet<usize>> {
    let mut values: Vec<&Vec<u8>> = value_index.keys().collect();
    values.sort_unstable();
    let tree = BkTree::from_values(values.iter().map(|v| v.to_vec()), edit_distance as DistanceFn);

    let neighbors_of = |value: &&Vec<u8>| -> (Vec<u8>, HashSet<usize>) {
        let nodes: HashSet<usize> = tree.find(value, max_distance).into_iter()
            .flat_map(|matched| value_index.get(matched).into_iter().flatten().copied())
            .collect();
        ((*value).clone(), nodes)
    };

    match pool {
        Some(pool) => pool.install(|| values.par_iter().map(neighbors_of).collect()),
        None => values.iter().map(neighbors_of).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::NetworkConfigBuilder;

    fn build_network(reads: &[(&str, &str, &str)], umi_distance: usize, config: NetworkConfig) -> SeqNetwork<String> {
        let mut network = SeqNetwork::with_config(config);
        for &(read_id, umi, region) in reads.iter() {
            network.add_observation("umi", read_id.to_string(), umi.as_bytes(), umi_distance).unwrap();
            network.add_observation("region", read_id.to_string(), region.as_bytes(), 1).unwrap();
        }
        network.build_graph().unwrap();
        network
    }

    fn sorted_families(network: &SeqNetwork<String>, partition: &Partition) -> Vec<Vec<String>> {
        let mut families: Vec<Vec<String>> = partition.families().iter()
            .map(|f| {
                let mut reads = network.family_reads(f);
                reads.sort();
                reads
            })
            .collect();
        families.sort();
        families
    }

    #[test]
    fn test_node_order() {
        let reads = [
            ("r1", "CCCC", "TT"),
            ("r2", "AAAA", "TT"),
            ("r3", "AAAA", "TT"),
            ("r4", "GGGG", "TT"),
            ("r5", "CCCC", "TT")
        ];
        let network = build_network(&reads, 0, NetworkConfig::default());
        let nodes = network.nodes();
        assert_eq!(nodes.len(), 3);
        // CCCC and AAAA both hold two reads; CCCC was seen first
        assert_eq!(nodes[0].values()[0], b"CCCC".to_vec());
        assert_eq!(nodes[0].reads(), &["r1".to_string(), "r5".to_string()]);
        assert_eq!(nodes[1].values()[0], b"AAAA".to_vec());
        assert_eq!(nodes[2].values()[0], b"GGGG".to_vec());
        assert_eq!(network.node_sizes(), vec![2, 2, 1]);
    }

    #[test]
    fn test_single_merge() {
        let reads = [("r1", "AAAA", "TGT"), ("r2", "AAAT", "TGT"), ("r3", "AAAA", "TGT")];
        let network = build_network(&reads, 1, NetworkConfig::default());
        assert_eq!(network.node_count(), 2);
        assert_eq!(network.total_centroids(), 0);
        assert_eq!(network.graph().unwrap().edge_count(), 1);
        assert_eq!(network.graph().unwrap().sorted_neighbors(0), vec![1]);

        let partition = network.partition().unwrap();
        assert_eq!(partition.merges().len(), 1);
        assert_eq!(sorted_families(&network, &partition), vec![vec!["r1".to_string(), "r2".to_string(), "r3".to_string()]]);
    }

    #[test]
    fn test_edges_need_every_dimension() {
        // close UMIs but unrelated regions
        let reads = [("r1", "AAAA", "TGTGCC"), ("r2", "AAAA", "TGTGCC"), ("r3", "AAAT", "GGGAAA")];
        let network = build_network(&reads, 1, NetworkConfig::default());
        assert_eq!(network.graph().unwrap().edge_count(), 0);
        assert_eq!(network.partition().unwrap().families().len(), 2);
    }

    #[test]
    fn test_exact_grouping_at_zero_distance() {
        let mut network: SeqNetwork<String> = SeqNetwork::default();
        let reads = [("r1", "AAAA"), ("r2", "AAAT"), ("r3", "AAAA"), ("r4", "AATT"), ("r5", "AAAT")];
        for &(read_id, umi) in reads.iter() {
            network.add_observation("umi", read_id.to_string(), umi.as_bytes(), 0).unwrap();
        }
        network.build_graph().unwrap();
        assert_eq!(network.graph().unwrap().edge_count(), 0);

        let partition = network.partition().unwrap();
        assert_eq!(sorted_families(&network, &partition), vec![
            vec!["r1".to_string(), "r3".to_string()],
            vec!["r2".to_string(), "r5".to_string()],
            vec!["r4".to_string()]
        ]);
    }

    #[test]
    fn test_rebuild_is_stable() {
        let reads = [
            ("r1", "ACGTAC", "TGT"), ("r2", "ACGTAC", "TGT"), ("r3", "ACGTAC", "TGT"),
            ("r4", "ACGTAA", "TGT"), ("r5", "TTTTTT", "TGT"), ("r6", "TTTTTA", "TGA")
        ];
        let mut network = build_network(&reads, 1, NetworkConfig::default());
        let first_centroids = network.total_centroids();
        let first = network.partition().unwrap();

        network.build_graph().unwrap();
        assert_eq!(network.total_centroids(), first_centroids);
        assert_eq!(network.partition().unwrap(), first);
    }

    #[test]
    fn test_threads_match_serial() {
        let reads = [
            ("r1", "ACGTAC", "TGT"), ("r2", "ACGTAC", "TGT"), ("r3", "ACGTAA", "TGT"),
            ("r4", "ACGAAC", "TGA"), ("r5", "TTTTTT", "TGT"), ("r6", "TTTTTA", "TGT"),
            ("r7", "GGGGGG", "CCC"), ("r8", "ACGTAC", "TGT")
        ];
        let serial = build_network(&reads, 1, NetworkConfig::default());
        let config = NetworkConfigBuilder::default().threads(3).build().unwrap();
        let threaded = build_network(&reads, 1, config);
        assert_eq!(serial.graph(), threaded.graph());
        assert_eq!(serial.partition().unwrap(), threaded.partition().unwrap());
    }

    #[test]
    fn test_conflicting_value() {
        let mut network: SeqNetwork<String> = SeqNetwork::default();
        network.add_observation("umi", "r1".to_string(), b"AAAA", 1).unwrap();
        network.add_observation("umi", "r1".to_string(), b"AAAA", 1).unwrap();
        let result = network.add_observation("umi", "r1".to_string(), b"CCCC", 1);
        assert_eq!(result, Err(DedupError::ConflictingValue {
            dimension: "umi".to_string(),
            read_id: "r1".to_string(),
            existing: "AAAA".to_string(),
            rejected: "CCCC".to_string()
        }));

        // the rejected observation leaves the network usable
        network.add_observation("umi", "r2".to_string(), b"AAAT", 1).unwrap();
        network.build_graph().unwrap();
        assert_eq!(network.node_count(), 2);
    }

    #[test]
    fn test_conflicting_distance() {
        let mut network: SeqNetwork<String> = SeqNetwork::default();
        network.add_observation("umi", "r1".to_string(), b"AAAA", 1).unwrap();
        assert!(matches!(
            network.add_observation("umi", "r2".to_string(), b"AAAA", 2),
            Err(DedupError::ConflictingDistance { existing: 1, rejected: 2, .. })
        ));
    }

    #[test]
    fn test_missing_dimension() {
        let mut network: SeqNetwork<String> = SeqNetwork::default();
        network.add_observation("umi", "r1".to_string(), b"AAAA", 1).unwrap();
        network.add_observation("umi", "r2".to_string(), b"AAAA", 1).unwrap();
        network.add_observation("region", "r1".to_string(), b"TGT", 1).unwrap();
        assert_eq!(network.build_graph(), Err(DedupError::MissingDimension {
            dimension: "region".to_string(),
            read_id: "r2".to_string()
        }));
    }

    #[test]
    fn test_frozen_and_unbuilt() {
        let mut network: SeqNetwork<String> = SeqNetwork::default();
        assert_eq!(network.partition(), Err(DedupError::GraphNotBuilt));

        network.add_observation("umi", "r1".to_string(), b"AAAA", 1).unwrap();
        network.build_graph().unwrap();
        assert!(matches!(
            network.add_observation("umi", "r2".to_string(), b"AAAA", 1),
            Err(DedupError::NetworkFrozen { .. })
        ));
    }

    #[test]
    fn test_empty_network() {
        let mut network: SeqNetwork<String> = SeqNetwork::default();
        network.build_graph().unwrap();
        assert_eq!(network.node_count(), 0);
        assert!(network.partition().unwrap().families().is_empty());
    }

    #[test]
    fn test_summary() {
        let reads = [("r1", "AAAA", "TGT"), ("r2", "AAAT", "TGT"), ("r3", "AAAA", "TGT")];
        let network = build_network(&reads, 1, NetworkConfig::default());
        let summary = network.summary();
        assert_eq!(summary, GraphSummary {
            read_count: 3,
            dimensions: vec![("umi".to_string(), 2), ("region".to_string(), 1)],
            node_count: 2,
            edge_count: 1,
            total_centroids: 0
        });
        assert!(summary.to_string().contains("umi: 2 distinct values"));
        assert_eq!(network.dimension_names(), vec!["umi", "region"]);
    }

    #[test]
    fn test_read_labels() {
        let reads = [("r1", "AAAA", "TGT"), ("r2", "AAAT", "TGT"), ("r3", "AAAA", "TGT"), ("r4", "CCCC", "GGG")];
        let network = build_network(&reads, 1, NetworkConfig::default());
        let partition = network.partition().unwrap();
        let labels = network.read_labels(partition.families());
        assert_eq!(labels.len(), 4);
        assert_eq!(labels["r1"], 1);
        assert_eq!(labels["r2"], 1);
        assert_eq!(labels["r3"], 1);
        assert_eq!(labels["r4"], 2);
    }
}
