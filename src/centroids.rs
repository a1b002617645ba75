/*!
Determines how many of the largest nodes are likely real molecules rather than sequencing errors.

Nodes are ranked by size, and for each prefix of `k` nodes the fraction of all reads they hold is divided by `sqrt(k)`.
The prefix length that maximises this efficiency is the centroid count.
If that count is at least half of all nodes there is no clear separation between large and small nodes, and no centroids are reported.

```rust
use seqfam::centroids::count_centroids;
// two clear molecules and a tail of errors
assert_eq!(count_centroids(&[50, 40, 1, 1, 1, 1, 1, 1]), 2);
// too few nodes to tell anything apart
assert_eq!(count_centroids(&[2, 1]), 0);
```
*/

use itertools::Itertools;

/// One point on the cumulative-coverage efficiency curve
#[derive(Clone, Debug, PartialEq)]
pub struct CoveragePoint {
    /// Number of nodes in this prefix, 1-based
    pub count: usize,
    /// Size of the node added at this point
    pub weight: usize,
    /// Reads covered by the first `count` nodes
    pub cumulative_total: usize,
    /// `cumulative_total` as a fraction of all reads
    pub fraction: f64,
    /// `fraction / sqrt(count)`
    pub efficiency: f64
}

/// Computes the efficiency curve over node sizes, largest first.
/// # Arguments
/// * `sizes` - the read count of every node, in any order
pub fn efficiency_curve(sizes: &[usize]) -> Vec<CoveragePoint> {
    let total: usize = sizes.iter().sum();
    if total == 0 {
        return vec![];
    }

    let mut cumulative_total = 0;
    sizes.iter()
        .copied()
        .sorted_unstable_by(|a, b| b.cmp(a))
        .enumerate()
        .map(|(i, weight)| {
            let count = i + 1;
            cumulative_total += weight;
            let fraction = cumulative_total as f64 / total as f64;
            CoveragePoint {
                count,
                weight,
                cumulative_total,
                fraction,
                efficiency: fraction / (count as f64).sqrt()
            }
        })
        .collect()
}

/// Returns the number of centroids for a set of node sizes, or 0 when there is no clear signal.
/// Ties in efficiency go to the smallest prefix.
/// # Arguments
/// * `sizes` - the read count of every node, in any order
pub fn count_centroids(sizes: &[usize]) -> usize {
    let curve = efficiency_curve(sizes);
    let mut best: Option<&CoveragePoint> = None;
    for point in curve.iter() {
        if best.map_or(true, |b| point.efficiency > b.efficiency) {
            best = Some(point);
        }
    }

    match best {
        Some(point) if (point.count as f64) < 0.5 * sizes.len() as f64 => point.count,
        _ => 0
    }
}
