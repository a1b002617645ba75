
/*!
This module provides access to the QualityConsensus, which calls a single consensus sequence and quality string for the reads of one family.

Reads whose length differs from the most common length are dropped, and identical sequences are grouped.
Bases are compared case-insensitively and the consensus is reported in upper case.
If one sequence dominates a large family it is returned directly with maximal qualities.
Otherwise every position is called independently: the error probabilities behind each observed base are combined with Fisher's method, and the base with the lowest combined probability wins.

# Example usage
```rust
use seqfam::consensus::QualityConsensus;

let reads: [(&[u8], &[u8]); 3] = [
    (b"ACGT", b"IIII"),
    (b"ACGA", b"IIII"),
    (b"ACGT", b"5555")
];

let mut qc: QualityConsensus = Default::default();
for (sequence, qualities) in reads.iter() {
    qc.add_read(sequence, qualities).unwrap();
}

let consensus = qc.consensus();
assert_eq!(consensus.sequence(), b"ACGT");
assert_eq!(consensus.qualities(), b"]]]Q");
assert_eq!(consensus.min_quality(), 48);
assert_eq!(consensus.family_size(), 3);
```
*/

use log::{debug, trace};
use rustc_hash::FxHashMap as HashMap;
use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::config::ConsensusConfig;
use crate::errors::DedupError;
use crate::phred::{decode_quality, encode_quality, fisher_combined_ln_probability, ln_error_prob_to_phred, ln_probabilities_tied, phred_to_error_prob, PhredScore};

/// Contains a final consensus result
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConsensusRecord {
    /// The consensus sequence
    sequence: Vec<u8>,
    /// The encoded consensus qualities, one per base
    qualities: Vec<u8>,
    /// Lowest Phred score in `qualities`
    min_quality: PhredScore,
    /// Number of positions at or below the low quality threshold
    low_quality_count: usize,
    /// Number of reads in the family, before length filtering
    family_size: usize
}

impl ConsensusRecord {
    /// Constructor
    pub fn new(sequence: Vec<u8>, qualities: Vec<u8>, min_quality: PhredScore, low_quality_count: usize, family_size: usize) -> ConsensusRecord {
        ConsensusRecord {
            sequence,
            qualities,
            min_quality,
            low_quality_count,
            family_size
        }
    }

    // Getters
    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    pub fn qualities(&self) -> &[u8] {
        &self.qualities
    }

    pub fn min_quality(&self) -> PhredScore {
        self.min_quality
    }

    pub fn low_quality_count(&self) -> usize {
        self.low_quality_count
    }

    pub fn family_size(&self) -> usize {
        self.family_size
    }
}

/// Returns the most common length, preferring a multiple of three and then the shorter length on ties.
/// Returns None if there are no lengths.
/// # Arguments
/// * `lengths` - all observed lengths
pub fn most_abundant_length(lengths: &[usize]) -> Option<usize> {
    let mut counts: HashMap<usize, usize> = Default::default();
    for &length in lengths.iter() {
        *counts.entry(length).or_default() += 1;
    }

    counts.into_iter()
        .min_by_key(|&(length, count)| (Reverse(count), length % 3 != 0, length))
        .map(|(length, _count)| length)
}

/// Core utility that calls a quality-aware consensus over the reads of a family.
#[derive(Debug, Default)]
pub struct QualityConsensus<'a> {
    /// All reads added so far, as (sequence, qualities)
    reads: Vec<(&'a [u8], &'a [u8])>,
    /// The config for this consensus run
    config: ConsensusConfig
}

impl<'a> QualityConsensus<'a> {
    /// Creates a new instance of QualityConsensus.
    /// # Arguments
    /// * `config` - quality encoding and thresholds
    pub fn with_config(config: ConsensusConfig) -> QualityConsensus<'a> {
        QualityConsensus {
            reads: vec![],
            config
        }
    }

    /// Adds a read to the family.
    /// # Arguments
    /// * `sequence` - the read sequence
    /// * `qualities` - the encoded qualities, one per base
    /// # Errors
    /// * if `sequence` and `qualities` have different lengths
    pub fn add_read(&mut self, sequence: &'a [u8], qualities: &'a [u8]) -> Result<(), DedupError> {
        if sequence.len() != qualities.len() {
            return Err(DedupError::QualityLengthMismatch {
                read_id: format!("#{}", self.reads.len()),
                sequence_len: sequence.len(),
                quality_len: qualities.len()
            });
        }
        self.reads.push((sequence, qualities));
        Ok(())
    }

    /// Calls the consensus for every read added so far.
    /// An empty family produces an empty record with `min_quality` set to the configured maximum.
    pub fn consensus(&self) -> ConsensusRecord {
        let family_size = self.reads.len();
        let lengths: Vec<usize> = self.reads.iter().map(|(s, _q)| s.len()).collect();
        let Some(length) = most_abundant_length(&lengths) else {
            return self.build_record(vec![], vec![], family_size);
        };

        // group identical sequences in first-seen order
        let mut group_lookup: HashMap<Vec<u8>, usize> = Default::default();
        let mut groups: Vec<(Vec<u8>, Vec<&[u8]>)> = vec![];
        for &(sequence, qualities) in self.reads.iter().filter(|(s, _q)| s.len() == length) {
            let sequence = sequence.to_ascii_uppercase();
            match group_lookup.get(&sequence) {
                Some(&index) => groups[index].1.push(qualities),
                None => {
                    group_lookup.insert(sequence.clone(), groups.len());
                    groups.push((sequence, vec![qualities]));
                }
            }
        }
        debug!("Family of {family_size} reads: length {length} kept {} distinct sequences", groups.len());

        // majority shortcut; the first group wins ties for the largest
        let mut largest: Option<&(Vec<u8>, Vec<&[u8]>)> = None;
        for group in groups.iter() {
            if largest.map_or(true, |l| group.1.len() > l.1.len()) {
                largest = Some(group);
            }
        }
        if let Some((sequence, members)) = largest {
            if family_size >= self.config.majority_min_family_size
                && members.len() as f64 >= self.config.majority_fraction * family_size as f64 {
                trace!("Majority shortcut with {} of {family_size} reads", members.len());
                let qualities = vec![encode_quality(self.config.max_quality, self.config.quality_offset); sequence.len()];
                return ConsensusRecord::new(sequence.clone(), qualities, self.config.max_quality, 0, family_size);
            }
        }

        if family_size == 1 {
            let (sequence, qualities) = self.reads[0];
            return self.build_record(sequence.to_ascii_uppercase(), qualities.to_vec(), family_size);
        }

        let mut sequence = Vec::with_capacity(length);
        let mut qualities = Vec::with_capacity(length);
        for position in 0..length {
            let (base, phred) = self.call_position(&groups, position);
            sequence.push(base);
            qualities.push(encode_quality(phred, self.config.quality_offset));
        }
        self.build_record(sequence, qualities, family_size)
    }

    /// Calls one position from the grouped reads, returns the base and its Phred score.
    fn call_position(&self, groups: &[(Vec<u8>, Vec<&[u8]>)], position: usize) -> (u8, PhredScore) {
        // ordered by base, so the first of any tie is the lexicographically smallest
        let mut evidence: BTreeMap<u8, Vec<f64>> = BTreeMap::new();
        for (sequence, quality_strings) in groups.iter() {
            let probabilities = evidence.entry(sequence[position]).or_default();
            for qualities in quality_strings.iter() {
                let phred = decode_quality(qualities[position], self.config.quality_offset);
                probabilities.push(phred_to_error_prob(phred));
            }
        }

        // (base, ln of the combined probability, coverage)
        let combined: Vec<(u8, f64, usize)> = evidence.iter()
            .map(|(&base, probabilities)| (base, fisher_combined_ln_probability(probabilities), probabilities.len()))
            .collect();
        let best = combined.iter()
            .map(|&(_b, ln_p, _c)| ln_p)
            .fold(f64::INFINITY, f64::min);
        let tied: Vec<&(u8, f64, usize)> = combined.iter()
            .filter(|&&(_b, ln_p, _c)| ln_probabilities_tied(ln_p, best))
            .collect();

        match tied.as_slice() {
            [] => (b'N', 0),
            [(base, ln_p, _c)] => (*base, ln_error_prob_to_phred(*ln_p, self.config.max_quality)),
            _ => {
                let max_coverage = tied.iter().map(|t| t.2).max().unwrap_or(0);
                let base = tied.iter()
                    .find(|t| t.2 == max_coverage)
                    .map_or(b'N', |t| t.0);
                trace!("Position {position}: {} bases tied, picked {}", tied.len(), base as char);
                (base, self.config.tie_quality)
            }
        }
    }

    /// Wraps a sequence and its qualities, filling in the quality summary
    fn build_record(&self, sequence: Vec<u8>, qualities: Vec<u8>, family_size: usize) -> ConsensusRecord {
        let phreds: Vec<PhredScore> = qualities.iter()
            .map(|&q| decode_quality(q, self.config.quality_offset))
            .collect();
        let min_quality = phreds.iter().copied().min().unwrap_or(self.config.max_quality);
        let low_quality_count = phreds.iter().filter(|&&q| q <= self.config.low_quality_threshold).count();
        ConsensusRecord::new(sequence, qualities, min_quality, low_quality_count, family_size)
    }

    // Getters
    pub fn len(&self) -> usize {
        self.reads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }
}
