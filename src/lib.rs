/*!
# seqfam
This library groups sequencing reads into molecule families and calls a quality-aware consensus for each family.

Key benefits:
* Reads are compared on one or more sequence dimensions (e.g. a UMI and a target region), with a separate edit distance tolerance for each
* Neighbor search uses a BK-tree per dimension, so only nearby values are ever compared
* Sequencing errors are absorbed into their source molecule through a bounded bidding scheme, while large distinct molecules stay apart
* Consensus calling combines per-base error probabilities with Fisher's method and reports per-position qualities

Performance notes:
* BK-tree queries degrade towards a linear scan as the allowed edit distance grows relative to the sequence length
* The per-value neighbor search can be spread over a rayon thread pool with `NetworkConfig::threads`

# Example usage
```rust
use seqfam::config::{DedupConfigBuilder, DimensionConfig, TargetConfig};
use seqfam::dedup::{Deduplicator, ReadRecord};

let config = DedupConfigBuilder::default()
    .dimensions(vec![DimensionConfig::new("umi", 1), DimensionConfig::new("region", 1)])
    .targets(vec![TargetConfig::new("region", "region_qual", true)])
    .build()
    .unwrap();

let reads = [
    ("r1", "AAAA", "TGTGCCAGCAGT", "IIIIIIIIIIII"),
    ("r2", "AAAA", "TGTGCCAGCAGT", "IIIIIIIIIIII"),
    ("r3", "AAAT", "TGTGCCAGCAGT", "IIIIIIIIIIII"), // UMI error
    ("r4", "GGGG", "TGTGCCTGGAGC", "IIIIIIIIIIII")
];

let mut dedup = Deduplicator::with_config(config).unwrap();
for (read_id, umi, region, qual) in reads.iter() {
    let read = ReadRecord::new(read_id.to_string())
        .with_field("umi", umi.as_bytes())
        .with_field("region", region.as_bytes())
        .with_quality("region_qual", qual.as_bytes());
    dedup.add_read(read).unwrap();
}

let result = dedup.run().unwrap();
assert_eq!(result.families().len(), 2);
assert_eq!(result.read_labels()["r3"], 1);
assert_eq!(result.families()[0].consensus()[0].translation(), Some("CASS"));
assert_eq!(result.families()[1].consensus()[0].translation(), Some("CAWS"));
```
*/

/// BK-tree index for edit distance range queries
pub mod bktree;
/// Selection of the number of centroid nodes
pub mod centroids;
/// Configuration for graph partitioning, consensus calling, and the dedup driver
pub mod config;
/// Quality-aware consensus for the reads of a family
pub mod consensus;
/// End-to-end pipeline from reads to labeled families with consensus
pub mod dedup;
/// Error types
pub mod errors;
/// Utility for generating simulated reads
pub mod example_gen;
/// Bidding and collapse of the similarity graph into families
pub mod partition;
/// Phred quality and probability utilities
pub mod phred;
/// Similarity graph construction over sequence dimensions
pub mod seq_network;
/// Basic pair-wise alignment utilities
pub mod sequence_alignment;
/// Nucleotide to amino acid translation
pub mod translate;
