
use rand::distributions::Uniform;
use rand::{Rng, SeedableRng};

use crate::dedup::ReadRecord;

const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// Quality character for an error-free simulated base (Q40)
const HIGH_QUALITY: u8 = b'I';
/// Quality character for a simulated substitution (Q10)
const LOW_QUALITY: u8 = b'+';

/// A simulated read set with the molecule each read came from
#[derive(Clone, Debug)]
pub struct SimulatedReads {
    /// The reads, with "umi" and "region" fields and matching qualities
    pub reads: Vec<ReadRecord<String>>,
    /// Index of the source molecule for each read
    pub molecules: Vec<usize>
}

/// Creates a test set of reads drawn from random molecules.
/// Each read copies its molecule's UMI and region with independent substitution errors; substituted bases get a low quality.
/// # Arguments
/// * `num_molecules` - the number of distinct source molecules
/// * `umi_len` - the length of each UMI
/// * `region_len` - the length of each region
/// * `reads_per_molecule` - the number of reads sampled from each molecule
/// * `error_rate` - per-base substitution rate
/// * `seed` - seed for the random number generator
pub fn generate_reads(num_molecules: usize, umi_len: usize, region_len: usize, reads_per_molecule: usize, error_rate: f64, seed: u64) -> SimulatedReads {
    assert!((0.0..=1.0).contains(&error_rate));

    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let base_distribution = Uniform::new(0, BASES.len());
    let shift_distribution = Uniform::new(1, BASES.len());
    let error_distribution = Uniform::new(0.0, 1.0);

    let molecules: Vec<(Vec<u8>, Vec<u8>)> = (0..num_molecules)
        .map(|_i| {
            let umi: Vec<u8> = (0..umi_len).map(|_j| BASES[rng.sample(base_distribution)]).collect();
            let region: Vec<u8> = (0..region_len).map(|_j| BASES[rng.sample(base_distribution)]).collect();
            (umi, region)
        })
        .collect();

    // copies a sequence with substitutions, returning (sequence, qualities)
    let mut mutate = |sequence: &[u8]| -> (Vec<u8>, Vec<u8>) {
        sequence.iter()
            .map(|&b| {
                if rng.sample(error_distribution) < error_rate {
                    let index = BASES.iter().position(|&c| c == b).unwrap_or(0);
                    let shift = rng.sample(shift_distribution);
                    (BASES[(index + shift) % BASES.len()], LOW_QUALITY)
                } else {
                    (b, HIGH_QUALITY)
                }
            })
            .unzip()
    };

    let mut reads = vec![];
    let mut sources = vec![];
    for (molecule_index, (umi, region)) in molecules.iter().enumerate() {
        for read_index in 0..reads_per_molecule {
            let (umi_seq, umi_qual) = mutate(umi.as_slice());
            let (region_seq, region_qual) = mutate(region.as_slice());
            let read = ReadRecord::new(format!("m{molecule_index}_r{read_index}"))
                .with_field("umi", &umi_seq)
                .with_quality("umi", &umi_qual)
                .with_field("region", &region_seq)
                .with_quality("region", &region_qual);
            reads.push(read);
            sources.push(molecule_index);
        }
    }

    SimulatedReads {
        reads,
        molecules: sources
    }
}
