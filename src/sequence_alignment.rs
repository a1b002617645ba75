
/// Returns the Levenshtein edit distance between two byte strings, computed with a wavefront expansion.
/// Every byte is compared literally, which keeps the result a true metric (required by the BK-tree).
/// # Arguments
/// * `v1` - the first sequence
/// * `v2` - the second sequence
/// # Examples
/// ```rust
/// use seqfam::sequence_alignment::edit_distance;
/// assert_eq!(edit_distance(b"CAT", b"CAT"), 0);
/// assert_eq!(edit_distance(b"CAT", b"CAR"), 1);
/// assert_eq!(edit_distance(b"CAT", b"DOG"), 3);
/// assert_eq!(edit_distance(b"ACGT", b"AGT"), 1);
/// ```
pub fn edit_distance(v1: &[u8], v2: &[u8]) -> usize {
    edit_distance_config(v1, v2, None)
}

/// Returns the edit distance between two byte strings with an optional wildcard that matches any symbol.
/// # Arguments
/// * `v1` - the first sequence
/// * `v2` - the second sequence
/// * `wildcard` - an optional symbol that matches anything, in either sequence
/// # Examples
/// ```rust
/// use seqfam::sequence_alignment::edit_distance_config;
/// assert_eq!(edit_distance_config(b"ACNT", b"ACGT", Some(b'N')), 0);
/// assert_eq!(edit_distance_config(b"ACNT", b"ACGT", None), 1);
/// ```
pub fn edit_distance_config(v1: &[u8], v2: &[u8], wildcard: Option<u8>) -> usize {
    let l1 = v1.len() as isize;
    let l2 = v2.len() as isize;
    let symbols_match = |i: isize, j: isize| {
        let (a, b) = (v1[i as usize], v2[j as usize]);
        a == b || wildcard.map_or(false, |w| a == w || b == w)
    };

    // for each diagonal (j - i), the furthest offset into `v2` reachable with `edits` edits
    // the diagonal for index `k` in the wavefront is `k - edits`
    let mut wavefront: Vec<Option<isize>> = vec![Some(0)];
    let mut edits: isize = 0;

    loop {
        // slide every diagonal as far as the sequences match
        for (k, slot) in wavefront.iter_mut().enumerate() {
            if let Some(j) = slot.as_mut() {
                let diagonal = k as isize - edits;
                let mut i = *j - diagonal;
                while i < l1 && *j < l2 && symbols_match(i, *j) {
                    i += 1;
                    *j += 1;
                }

                if i == l1 && *j == l2 {
                    return edits as usize;
                }
            }
        }

        // one more edit widens the wavefront by a diagonal on each side
        let previous = |diagonal: isize| -> Option<isize> {
            let k = diagonal + edits;
            if k >= 0 && (k as usize) < wavefront.len() {
                wavefront[k as usize]
            } else {
                None
            }
        };

        let next_edits = edits + 1;
        let next: Vec<Option<isize>> = (0..wavefront.len() + 2)
            .map(|k| {
                let diagonal = k as isize - next_edits;
                let candidates = [
                    // mismatch consumes both sequences
                    previous(diagonal).map(|j| j + 1),
                    // insertion consumes only `v2`
                    previous(diagonal - 1).map(|j| j + 1),
                    // deletion consumes only `v1`
                    previous(diagonal + 1)
                ];
                candidates.into_iter()
                    .flatten()
                    .filter(|&j| j <= l2 && j - diagonal >= 0 && j - diagonal <= l1)
                    .max()
            })
            .collect();

        wavefront = next;
        edits = next_edits;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Classic two-row dynamic programming, used as a reference
    fn dp_distance(v1: &[u8], v2: &[u8]) -> usize {
        let mut previous: Vec<usize> = (0..=v2.len()).collect();
        for (i, &a) in v1.iter().enumerate() {
            let mut current = vec![i + 1; v2.len() + 1];
            for (j, &b) in v2.iter().enumerate() {
                let substitution = previous[j] + usize::from(a != b);
                current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
            }
            previous = current;
        }
        previous[v2.len()]
    }

    #[test]
    fn test_empty() {
        assert_eq!(edit_distance(b"", b""), 0);
        assert_eq!(edit_distance(b"", b"ACGT"), 4);
        assert_eq!(edit_distance(b"ACG", b""), 3);
    }

    #[test]
    fn test_indels() {
        assert_eq!(edit_distance(b"ACGTACGT", b"ACGACGT"), 1);
        assert_eq!(edit_distance(b"ACGACGT", b"ACGTACGT"), 1);
        assert_eq!(edit_distance(b"AAAA", b"AAAT"), 1);
        assert_eq!(edit_distance(b"kitten", b"sitting"), 3);
    }

    #[test]
    fn test_symmetric_and_matches_dp() {
        let sequences: [&[u8]; 7] = [b"ACGTTGCA", b"ACGTGCA", b"TTTT", b"ACGGTTGCAA", b"", b"GATTACA", b"CAT"];
        for a in sequences.iter() {
            for b in sequences.iter() {
                let ed = edit_distance(a, b);
                assert_eq!(ed, edit_distance(b, a));
                assert_eq!(ed, dp_distance(a, b), "{:?} v. {:?}", a, b);
            }
        }
    }

    #[test]
    fn test_wildcard() {
        assert_eq!(edit_distance_config(b"ACGT", b"NNNN", Some(b'N')), 0);
        assert_eq!(edit_distance_config(b"ACGT", b"NNN", Some(b'N')), 1);
    }
}
