/*!
Translates nucleotide consensus sequences into amino acids for reporting.

Full codons that are not in the standard table (e.g. anything with an `N`) become `?`, and trailing partial codons become `_`.
Regions whose length is not a multiple of three are translated from both ends and joined with a `_` frameshift marker.

```rust
use seqfam::translate::{translate, translate_region};
assert_eq!(translate(b"ATGGCT"), "MA");
assert_eq!(translate(b"ATGGC"), "M_");
assert_eq!(translate_region(b"TGTGCCAGCAGT"), "CASS");
assert_eq!(translate_region(b"AT"), "_");
```
*/

/// Marker for a partial codon or a frameshift
pub const FRAMESHIFT: char = '_';
/// Marker for a full codon with no translation
pub const UNKNOWN_CODON: char = '?';

/// Translates a single codon with the standard genetic code, `*` marks a stop.
/// Codons shorter than three bases translate to `_`, unrecognized codons to `?`.
/// # Arguments
/// * `codon` - the bases to translate, case insensitive
pub fn translate_codon(codon: &[u8]) -> char {
    if codon.len() < 3 {
        return FRAMESHIFT;
    }
    if codon.len() > 3 {
        return UNKNOWN_CODON;
    }

    let upper = [codon[0].to_ascii_uppercase(), codon[1].to_ascii_uppercase(), codon[2].to_ascii_uppercase()];
    match &upper {
        b"ATA" | b"ATC" | b"ATT" => 'I',
        b"ATG" => 'M',
        b"ACA" | b"ACC" | b"ACG" | b"ACT" => 'T',
        b"AAC" | b"AAT" => 'N',
        b"AAA" | b"AAG" => 'K',
        b"AGC" | b"AGT" | b"TCA" | b"TCC" | b"TCG" | b"TCT" => 'S',
        b"AGA" | b"AGG" | b"CGA" | b"CGC" | b"CGG" | b"CGT" => 'R',
        b"CTA" | b"CTC" | b"CTG" | b"CTT" | b"TTA" | b"TTG" => 'L',
        b"CCA" | b"CCC" | b"CCG" | b"CCT" => 'P',
        b"CAC" | b"CAT" => 'H',
        b"CAA" | b"CAG" => 'Q',
        b"GTA" | b"GTC" | b"GTG" | b"GTT" => 'V',
        b"GCA" | b"GCC" | b"GCG" | b"GCT" => 'A',
        b"GAC" | b"GAT" => 'D',
        b"GAA" | b"GAG" => 'E',
        b"GGA" | b"GGC" | b"GGG" | b"GGT" => 'G',
        b"TTC" | b"TTT" => 'F',
        b"TAC" | b"TAT" => 'Y',
        b"TAA" | b"TAG" | b"TGA" => '*',
        b"TGC" | b"TGT" => 'C',
        b"TGG" => 'W',
        _ => UNKNOWN_CODON
    }
}

/// Translates from the first base in frame 0; a trailing partial codon becomes `_`.
pub fn translate(sequence: &[u8]) -> String {
    sequence.chunks(3).map(translate_codon).collect()
}

/// Translates a sequence whose length is not a multiple of three.
/// The `n` full codons are read forward from the start and backward from the end.
/// The first `(n + 1) / 2` residues come from the forward frame and the rest from the backward frame, with a single `_` between them.
/// # Arguments
/// * `sequence` - the bases to translate
pub fn translate_fuzzy(sequence: &[u8]) -> String {
    let codon_count = sequence.len() / 3;
    let split = (codon_count + 1) / 2;
    let forward = (0..split).map(|i| translate_codon(&sequence[3 * i..3 * i + 3]));

    let end = sequence.len();
    let reverse = (split..codon_count).map(|i| {
        // the i-th codon of the frame that ends at the last base
        let start = end - 3 * (codon_count - i);
        translate_codon(&sequence[start..start + 3])
    });

    forward
        .chain(std::iter::once(FRAMESHIFT))
        .chain(reverse)
        .collect()
}

/// Translates a consensus region: `_` if it is shorter than a codon, in frame if its length is a multiple of three, and fuzzy otherwise.
pub fn translate_region(sequence: &[u8]) -> String {
    if sequence.len() < 3 {
        FRAMESHIFT.to_string()
    } else if sequence.len() % 3 == 0 {
        translate(sequence)
    } else {
        translate_fuzzy(sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_codon() {
        assert_eq!(translate_codon(b"ATG"), 'M');
        assert_eq!(translate_codon(b"tgg"), 'W');
        assert_eq!(translate_codon(b"TAG"), '*');
        assert_eq!(translate_codon(b"ANG"), '?');
        assert_eq!(translate_codon(b"AT"), '_');
    }

    #[test]
    fn test_translate() {
        assert_eq!(translate(b"ATGGCT"), "MA");
        assert_eq!(translate(b""), "");
        assert_eq!(translate(b"TGTGCCTGGAGC"), "CAWS");
        assert_eq!(translate(b"ATGGCTA"), "MA_");
    }

    #[test]
    fn test_fuzzy_marker() {
        let five = translate_region(b"ATGGC");
        assert_eq!(five, "M_");
        assert_eq!(five.matches('_').count(), 1);

        // three full codons: TGT GCC forward, then GCT read back from the end
        assert_eq!(translate_region(b"TGTGCCAGCT"), "CA_A");
    }

    #[test]
    fn test_translate_region() {
        assert_eq!(translate_region(b""), "_");
        assert_eq!(translate_region(b"AT"), "_");
        assert_eq!(translate_region(b"TGTGCCAGCAGT"), "CASS");
        assert_eq!(translate_region(b"TGTAAAAGG"), "CKR");
        // TGT forward, CCA backward
        assert_eq!(translate_region(b"TGTGCCA"), "C_P");
    }
}
