/*!
This module provides access to the Deduplicator, which runs the full pipeline: graph construction, partitioning, labeling, and per-family consensus.

Reads carry named sequence fields and named quality fields.
Dimension fields place a read in the similarity graph, and target fields get a consensus for every family.

# Example usage
```rust
use seqfam::config::{DedupConfigBuilder, DimensionConfig, TargetConfig};
use seqfam::dedup::{Deduplicator, ReadRecord};

let config = DedupConfigBuilder::default()
    .dimensions(vec![DimensionConfig::new("umi", 1)])
    .targets(vec![TargetConfig::new("region", "region_qual", true)])
    .build()
    .unwrap();

let mut dedup = Deduplicator::with_config(config).unwrap();
for (read_id, umi) in [("r1", "AAAA"), ("r2", "AAAT"), ("r3", "AAAA")] {
    let read = ReadRecord::new(read_id.to_string())
        .with_field("umi", umi.as_bytes())
        .with_field("region", b"ATGGCT")
        .with_quality("region_qual", b"IIIIII");
    dedup.add_read(read).unwrap();
}

let result = dedup.run().unwrap();
assert_eq!(result.families().len(), 1);
assert_eq!(result.read_labels()["r2"], 1);
let region = &result.families()[0].consensus()[0];
assert_eq!(region.record().sequence(), b"ATGGCT");
assert_eq!(region.translation(), Some("MA"));
```
*/

use log::{debug, info};
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use std::fmt::Display;
use std::hash::Hash;

use crate::config::DedupConfig;
use crate::consensus::{ConsensusRecord, QualityConsensus};
use crate::errors::DedupError;
use crate::seq_network::{GraphSummary, SeqNetwork};
use crate::translate::translate_region;

/// A single read with its named sequence and quality fields
#[derive(Clone, Debug, PartialEq)]
pub struct ReadRecord<R> {
    /// Stable identifier of the read
    id: R,
    /// Sequence fields by name
    fields: HashMap<String, Vec<u8>>,
    /// Quality strings by the name of the field they belong to
    qualities: HashMap<String, Vec<u8>>
}

impl<R> ReadRecord<R> {
    /// Creates a read with no fields
    pub fn new(id: R) -> ReadRecord<R> {
        ReadRecord {
            id,
            fields: Default::default(),
            qualities: Default::default()
        }
    }

    /// Adds or replaces a sequence field
    pub fn with_field(mut self, name: &str, sequence: &[u8]) -> ReadRecord<R> {
        self.fields.insert(name.to_string(), sequence.to_vec());
        self
    }

    /// Adds or replaces a quality string
    pub fn with_quality(mut self, name: &str, qualities: &[u8]) -> ReadRecord<R> {
        self.qualities.insert(name.to_string(), qualities.to_vec());
        self
    }

    // getters
    pub fn id(&self) -> &R {
        &self.id
    }

    pub fn field(&self, name: &str) -> Option<&[u8]> {
        self.fields.get(name).map(|f| f.as_slice())
    }

    pub fn quality(&self, name: &str) -> Option<&[u8]> {
        self.qualities.get(name).map(|q| q.as_slice())
    }
}

/// Consensus of one target field for one family
#[derive(Clone, Debug, PartialEq)]
pub struct TargetConsensus {
    /// The target field name
    target: String,
    /// The consensus call
    record: ConsensusRecord,
    /// Amino acid translation of the consensus, if requested for this target
    translation: Option<String>
}

impl TargetConsensus {
    // getters
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn record(&self) -> &ConsensusRecord {
        &self.record
    }

    pub fn translation(&self) -> Option<&str> {
        self.translation.as_deref()
    }
}

/// One family in the output
#[derive(Clone, Debug, PartialEq)]
pub struct FamilyRecord<R> {
    /// 1-based family number
    family_id: usize,
    /// The reads of the family, largest node first
    reads: Vec<R>,
    /// One consensus per configured target, in configuration order
    consensus: Vec<TargetConsensus>
}

impl<R> FamilyRecord<R> {
    // getters
    pub fn family_id(&self) -> usize {
        self.family_id
    }

    pub fn reads(&self) -> &[R] {
        &self.reads
    }

    pub fn consensus(&self) -> &[TargetConsensus] {
        &self.consensus
    }

    /// Number of reads in the family
    pub fn size(&self) -> usize {
        self.reads.len()
    }
}

/// Output of a dedup run
#[derive(Clone, Debug, PartialEq)]
pub struct DedupResult<R: Eq + Hash> {
    /// Family number for every read
    read_labels: HashMap<R, usize>,
    /// Families in order of their family number
    families: Vec<FamilyRecord<R>>,
    /// Graph statistics
    summary: GraphSummary
}

impl<R: Eq + Hash> DedupResult<R> {
    // getters
    pub fn read_labels(&self) -> &HashMap<R, usize> {
        &self.read_labels
    }

    pub fn families(&self) -> &[FamilyRecord<R>] {
        &self.families
    }

    pub fn summary(&self) -> &GraphSummary {
        &self.summary
    }
}

/// Collects reads and runs the dedup pipeline over them.
#[derive(Debug)]
pub struct Deduplicator<R> {
    /// Dimensions, targets, and algorithm options
    config: DedupConfig,
    /// The graph over dimension values
    network: SeqNetwork<R>,
    /// All accepted reads, in the order they were added
    reads: Vec<ReadRecord<R>>,
    /// Read identifier to index into `reads`
    read_lookup: HashMap<R, usize>
}

impl<R> Deduplicator<R>
where
    R: Clone + Eq + Hash + Display
{
    /// Creates a new deduplicator and checks the configuration.
    /// With no dimensions configured, every read lands in a single family.
    /// # Arguments
    /// * `config` - the full run configuration
    /// # Errors
    /// * if the network options are invalid
    /// * if a dimension or target name is repeated
    pub fn with_config(config: DedupConfig) -> Result<Deduplicator<R>, DedupError> {
        config.network.validate()?;

        let mut dimension_names: HashSet<&str> = Default::default();
        for dimension in config.dimensions.iter() {
            if !dimension_names.insert(dimension.name.as_str()) {
                return Err(DedupError::InvalidParameter {
                    parameter: "dimensions".to_string(),
                    reason: format!("dimension '{}' is listed more than once", dimension.name)
                });
            }
        }

        let mut target_names: HashSet<&str> = Default::default();
        for target in config.targets.iter() {
            if !target_names.insert(target.name.as_str()) {
                return Err(DedupError::InvalidParameter {
                    parameter: "targets".to_string(),
                    reason: format!("target '{}' is listed more than once", target.name)
                });
            }
        }

        let network = SeqNetwork::with_config(config.network.clone());
        Ok(Deduplicator {
            config,
            network,
            reads: vec![],
            read_lookup: Default::default()
        })
    }

    /// Adds a read after checking that every configured field is present.
    /// A rejected read leaves the deduplicator unchanged.
    /// # Arguments
    /// * `read` - the read to add
    /// # Errors
    /// * if the read identifier was already added
    /// * if a dimension field, target field, or target quality is missing
    /// * if a target sequence and its qualities differ in length
    /// * if the graph was already built by `run()`
    pub fn add_read(&mut self, read: ReadRecord<R>) -> Result<(), DedupError> {
        if self.read_lookup.contains_key(&read.id) {
            return Err(DedupError::DuplicateRead { read_id: read.id.to_string() });
        }

        for dimension in self.config.dimensions.iter() {
            if read.field(&dimension.name).is_none() {
                return Err(DedupError::MissingDimension {
                    dimension: dimension.name.clone(),
                    read_id: read.id.to_string()
                });
            }
        }

        for target in self.config.targets.iter() {
            let sequence = read.field(&target.name).ok_or_else(|| DedupError::MissingColumn {
                column: target.name.clone(),
                read_id: read.id.to_string()
            })?;
            let qualities = read.quality(&target.quality_name).ok_or_else(|| DedupError::MissingQuality {
                column: target.quality_name.clone(),
                read_id: read.id.to_string()
            })?;
            if sequence.len() != qualities.len() {
                return Err(DedupError::QualityLengthMismatch {
                    read_id: read.id.to_string(),
                    sequence_len: sequence.len(),
                    quality_len: qualities.len()
                });
            }
        }

        // new read id with every field present, so only a frozen network can reject this
        for dimension in self.config.dimensions.iter() {
            let value = read.field(&dimension.name).unwrap_or_default();
            self.network.add_observation(&dimension.name, read.id.clone(), value, dimension.max_distance)?;
        }

        self.read_lookup.insert(read.id.clone(), self.reads.len());
        self.reads.push(read);
        Ok(())
    }

    /// Builds the graph, partitions it, and calls a consensus per family and target.
    /// # Errors
    /// * if graph construction or partitioning fails
    pub fn run(&mut self) -> Result<DedupResult<R>, DedupError> {
        info!("Running dedup on {} reads with {} dimensions", self.reads.len(), self.config.dimensions.len());

        let family_reads: Vec<Vec<R>> = if self.config.dimensions.is_empty() {
            info!("No dimensions configured, all reads form one family");
            if self.reads.is_empty() {
                vec![]
            } else {
                vec![self.reads.iter().map(|r| r.id.clone()).collect()]
            }
        } else {
            info!("Building similarity graph...");
            self.network.build_graph()?;
            info!("Partitioning graph...");
            let partition = self.network.partition()?;
            partition.families().iter()
                .map(|family| self.network.family_reads(family))
                .collect()
        };

        info!("Calling consensus for {} families...", family_reads.len());
        let mut read_labels: HashMap<R, usize> = Default::default();
        let mut families = Vec::with_capacity(family_reads.len());
        for (i, reads) in family_reads.into_iter().enumerate() {
            let family_id = i + 1;
            for read_id in reads.iter() {
                read_labels.insert(read_id.clone(), family_id);
            }

            let consensus = self.family_consensus(&reads)?;
            debug!("Family {family_id}: {} reads", reads.len());
            families.push(FamilyRecord {
                family_id,
                reads,
                consensus
            });
        }

        Ok(DedupResult {
            read_labels,
            families,
            summary: self.network.summary()
        })
    }

    /// Calls the consensus of every target for one family
    fn family_consensus(&self, reads: &[R]) -> Result<Vec<TargetConsensus>, DedupError> {
        let records: Vec<&ReadRecord<R>> = reads.iter()
            .filter_map(|read_id| self.read_lookup.get(read_id).map(|&index| &self.reads[index]))
            .collect();

        self.config.targets.iter()
            .map(|target| {
                let mut qc = QualityConsensus::with_config(self.config.consensus.clone());
                for read in records.iter() {
                    // presence was checked when the read was added
                    if let (Some(sequence), Some(qualities)) = (read.field(&target.name), read.quality(&target.quality_name)) {
                        qc.add_read(sequence, qualities)?;
                    }
                }

                let record = qc.consensus();
                let translation = if target.translate {
                    Some(translate_region(record.sequence()))
                } else {
                    None
                };
                Ok(TargetConsensus {
                    target: target.name.clone(),
                    record,
                    translation
                })
            })
            .collect()
    }

    // getters
    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    pub fn network(&self) -> &SeqNetwork<R> {
        &self.network
    }

    /// Number of reads added
    pub fn len(&self) -> usize {
        self.reads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }
}
