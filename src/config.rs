/*!
Contains configuration information for graph partitioning, consensus calling, and the dedup driver.
Typical usage is to the use the builders to construct each config, e.g.
```
use seqfam::config::{ConsensusConfigBuilder, NetworkConfig, NetworkConfigBuilder};
let network: NetworkConfig = NetworkConfigBuilder::default()
    .max_steps(3)
    .min_bidding_ratio(1.5)
    .build()
    .unwrap();
let consensus = ConsensusConfigBuilder::default()
    .low_quality_threshold(15)
    .build()
    .unwrap();
assert_eq!(network.max_steps, 3);
assert_eq!(consensus.max_quality, 60);
```
*/

use crate::errors::DedupError;

/// Shared range checks for the bidding parameters
fn check_bidding_params(max_steps: Option<usize>, min_bidding_ratio: Option<f64>) -> Result<(), String> {
    if max_steps == Some(0) {
        return Err("max_steps must be at least 1".to_string());
    }
    if let Some(ratio) = min_bidding_ratio {
        if !(ratio.is_finite() && ratio > 0.0) {
            return Err(format!("min_bidding_ratio must be a positive finite value, got {ratio}"));
        }
    }
    Ok(())
}

/**
Controls how the similarity graph is searched and partitioned into families.
```
use seqfam::config::NetworkConfigBuilder;
// zero steps would never let a node reach a neighbor
assert!(NetworkConfigBuilder::default().max_steps(0).build().is_err());
```
*/
#[derive(derive_builder::Builder, Clone, Debug, PartialEq)]
#[builder(default, build_fn(validate = "Self::validate"))]
pub struct NetworkConfig {
    /// Maximum number of edges a node may walk when placing bids
    pub max_steps: usize,
    /// Minimum bid weight a node needs to see before it merges into the bidder
    pub min_bidding_ratio: f64,
    /// If true, similarity edges that never carried an accepted bid are kept when families are collapsed
    pub retain_unbid_edges: bool,
    /// Number of threads for the per-value edit distance search; 1 keeps everything on the calling thread
    pub threads: usize
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            // two steps lets a second-order error find its source directly
            max_steps: 2,
            // a source needs twice the reads of the error it absorbs
            min_bidding_ratio: 2.0,
            // only accepted merges join nodes into families
            retain_unbid_edges: false,
            threads: 1
        }
    }
}

impl NetworkConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        check_bidding_params(self.max_steps, self.min_bidding_ratio)
    }
}

impl NetworkConfig {
    /// Re-checks the parameters, which may have been modified after building.
    /// # Errors
    /// * if `max_steps` is 0, `min_bidding_ratio` is not positive, or `threads` is 0
    pub fn validate(&self) -> Result<(), DedupError> {
        check_bidding_params(Some(self.max_steps), Some(self.min_bidding_ratio))
            .map_err(|reason| DedupError::InvalidParameter {
                parameter: "network".to_string(),
                reason
            })?;
        if self.threads == 0 {
            return Err(DedupError::InvalidParameter {
                parameter: "threads".to_string(),
                reason: "must be at least 1".to_string()
            });
        }
        Ok(())
    }
}

/// Controls the quality-aware consensus caller.
#[derive(derive_builder::Builder, Clone, Debug, PartialEq)]
#[builder(default)]
pub struct ConsensusConfig {
    /// Positions with a consensus quality at or below this value count as low quality
    pub low_quality_threshold: u8,
    /// ASCII offset of the quality encoding
    pub quality_offset: u8,
    /// Highest quality a consensus position can receive
    pub max_quality: u8,
    /// Quality reported for positions where two or more bases were equally likely
    pub tie_quality: u8,
    /// Fraction of the family one exact sequence needs to short-circuit base calling
    pub majority_fraction: f64,
    /// Minimum family size before the majority short-circuit applies
    pub majority_min_family_size: usize
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            low_quality_threshold: 20,
            // Sanger / Illumina 1.8+
            quality_offset: 33,
            max_quality: 60,
            tie_quality: 2,
            majority_fraction: 0.9,
            majority_min_family_size: 10
        }
    }
}

/// A named dimension used to build the similarity graph.
#[derive(Clone, Debug, PartialEq)]
pub struct DimensionConfig {
    /// Name of the read field holding this dimension
    pub name: String,
    /// Maximum edit distance for two values to be considered neighbors
    pub max_distance: usize
}

impl DimensionConfig {
    /// Constructor
    pub fn new(name: &str, max_distance: usize) -> DimensionConfig {
        DimensionConfig {
            name: name.to_string(),
            max_distance
        }
    }
}

/// A sequence field that gets a consensus per family.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetConfig {
    /// Name of the read field holding the sequence
    pub name: String,
    /// Name of the read field holding the quality string
    pub quality_name: String,
    /// If true, the consensus is also translated to amino acids
    pub translate: bool
}

impl TargetConfig {
    /// Constructor
    pub fn new(name: &str, quality_name: &str, translate: bool) -> TargetConfig {
        TargetConfig {
            name: name.to_string(),
            quality_name: quality_name.to_string(),
            translate
        }
    }
}

/**
Full configuration for a dedup run.
```
use seqfam::config::{DedupConfigBuilder, DimensionConfig, TargetConfig};
let config = DedupConfigBuilder::default()
    .dimensions(vec![DimensionConfig::new("umi", 1), DimensionConfig::new("cdr3", 1)])
    .targets(vec![TargetConfig::new("cdr3", "cdr3_qual", true)])
    .build()
    .unwrap();
assert_eq!(config.dimensions.len(), 2);
```
*/
#[derive(derive_builder::Builder, Clone, Debug, Default, PartialEq)]
#[builder(default)]
pub struct DedupConfig {
    /// The dimensions that define a read's position in the graph
    pub dimensions: Vec<DimensionConfig>,
    /// The fields that get a consensus per family
    pub targets: Vec<TargetConfig>,
    /// Graph partitioning options
    pub network: NetworkConfig,
    /// Consensus calling options
    pub consensus: ConsensusConfig
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_defaults() {
        let config = NetworkConfigBuilder::default().build().unwrap();
        assert_eq!(config, NetworkConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_ratio() {
        assert!(NetworkConfigBuilder::default().min_bidding_ratio(0.0).build().is_err());
        assert!(NetworkConfigBuilder::default().min_bidding_ratio(f64::NAN).build().is_err());

        let config = NetworkConfig { min_bidding_ratio: -1.0, ..Default::default() };
        assert!(matches!(config.validate(), Err(DedupError::InvalidParameter { .. })));
    }

    #[test]
    fn test_zero_threads() {
        let config = NetworkConfig { threads: 0, ..Default::default() };
        assert_eq!(config.validate(), Err(DedupError::InvalidParameter {
            parameter: "threads".to_string(),
            reason: "must be at least 1".to_string()
        }));
    }
}
