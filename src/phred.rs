//! Phred quality conversions and Fisher's method for combining error probabilities.
//! Combination is done in natural-log space, and every input probability is clamped to `[f64::MIN_POSITIVE, 1]` before a log is taken.
//! Combined values stay in log space for comparison, since well-supported bases underflow an `f64` probability.

use std::f64::consts::LN_10;

/// Phred score type
pub type PhredScore = u8;

/// Relative tolerance when comparing two combined probabilities
pub const PROBABILITY_TOLERANCE: f64 = 1e-9;

/// Converts an encoded quality character to a Phred score; characters below the offset decode to 0.
/// # Arguments
/// * `byte` - the encoded quality character
/// * `offset` - the ASCII offset of the encoding, usually 33
#[inline]
pub fn decode_quality(byte: u8, offset: u8) -> PhredScore {
    byte.saturating_sub(offset)
}

/// Converts a Phred score to its encoded quality character
#[inline]
pub fn encode_quality(phred: PhredScore, offset: u8) -> u8 {
    phred.saturating_add(offset)
}

/// Returns the error probability of a Phred score, `10^(-Q/10)`
/// # Examples
/// ```
/// use seqfam::phred::phred_to_error_prob;
/// assert!((phred_to_error_prob(20) - 0.01).abs() < 1e-12);
/// assert_eq!(phred_to_error_prob(0), 1.0);
/// ```
#[inline]
pub fn phred_to_error_prob(phred: PhredScore) -> f64 {
    (phred_to_ln_error_prob(phred)).exp()
}

/// Returns the natural log of the error probability of a Phred score
#[inline]
pub fn phred_to_ln_error_prob(phred: PhredScore) -> f64 {
    -f64::from(phred) * LN_10 / 10.0
}

/// Clamps a probability into `[f64::MIN_POSITIVE, 1]`; NaN clamps to 1
#[inline]
pub fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() {
        1.0
    } else {
        p.clamp(f64::MIN_POSITIVE, 1.0)
    }
}

/// Converts an error probability to a Phred score with `round(-10 log10(p))`, capped at `max_quality`.
/// # Arguments
/// * `p` - the error probability, clamped before conversion
/// * `max_quality` - the highest score to return
/// # Examples
/// ```
/// use seqfam::phred::error_prob_to_phred;
/// assert_eq!(error_prob_to_phred(0.001, 60), 30);
/// assert_eq!(error_prob_to_phred(0.0, 60), 60);
/// assert_eq!(error_prob_to_phred(1.0, 60), 0);
/// ```
pub fn error_prob_to_phred(p: f64, max_quality: PhredScore) -> PhredScore {
    let phred = (-10.0 * clamp_probability(p).log10()).round();
    phred.clamp(0.0, f64::from(max_quality)) as PhredScore
}

/// Converts a natural-log error probability to a Phred score with `round(-10 log10(p))`, capped at `max_quality`.
/// NaN converts to 0.
pub fn ln_error_prob_to_phred(ln_p: f64, max_quality: PhredScore) -> PhredScore {
    if ln_p.is_nan() {
        return 0;
    }
    let phred = (-10.0 * ln_p / LN_10).round();
    phred.clamp(0.0, f64::from(max_quality)) as PhredScore
}

/// Numerically stable `ln(sum(exp(x)))`
fn ln_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

/// Combines independent error probabilities with Fisher's method and returns the natural log of the result.
/// The statistic `-2 sum(ln p)` follows a chi-squared distribution with `2k` degrees of freedom,
/// so the combined value is its survival function, `exp(-t) * sum_{i<k} t^i / i!` with `t = -sum(ln p)`.
/// The result is not clamped, so it orders combinations far below `f64::MIN_POSITIVE`.
/// An empty input combines to `ln(1) = 0`.
/// # Arguments
/// * `probabilities` - the error probabilities observed for one base at one position
pub fn fisher_combined_ln_probability(probabilities: &[f64]) -> f64 {
    if probabilities.is_empty() {
        return 0.0;
    }

    let t: f64 = -probabilities.iter().map(|&p| clamp_probability(p).ln()).sum::<f64>();
    if t <= 0.0 {
        return 0.0;
    }

    let ln_t = t.ln();
    let mut ln_factorial = 0.0;
    let terms: Vec<f64> = (0..probabilities.len())
        .map(|i| {
            if i > 0 {
                ln_factorial += (i as f64).ln();
            }
            i as f64 * ln_t - ln_factorial
        })
        .collect();

    (-t + ln_sum_exp(&terms)).min(0.0)
}

/// Combines independent error probabilities with Fisher's method, clamped to `[f64::MIN_POSITIVE, 1]`.
/// # Examples
/// ```
/// use seqfam::phred::fisher_combined_probability;
/// // a single probability passes through
/// assert!((fisher_combined_probability(&[0.01]) - 0.01).abs() < 1e-12);
/// // two Q20 observations support each other
/// assert!(fisher_combined_probability(&[0.01, 0.01]) < 0.01);
/// ```
pub fn fisher_combined_probability(probabilities: &[f64]) -> f64 {
    clamp_probability(fisher_combined_ln_probability(probabilities).exp())
}

/// Returns true if two natural-log probabilities are equal within `PROBABILITY_TOLERANCE`.
/// An absolute difference in log space is a relative difference in probability.
#[inline]
pub fn ln_probabilities_tied(a: f64, b: f64) -> bool {
    (a - b).abs() <= PROBABILITY_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_quality() {
        assert_eq!(decode_quality(b'I', 33), 40);
        assert_eq!(decode_quality(b'!', 33), 0);
        assert_eq!(decode_quality(b' ', 33), 0);
        assert_eq!(encode_quality(60, 33), b']');
    }

    #[test]
    fn test_error_prob_to_phred() {
        assert_eq!(error_prob_to_phred(phred_to_error_prob(40), 60), 40);
        assert_eq!(error_prob_to_phred(f64::NAN, 60), 0);
        assert_eq!(error_prob_to_phred(1e-300, 60), 60);
        assert_eq!(error_prob_to_phred(2.0, 60), 0);
    }

    #[test]
    fn test_fisher_two_values() {
        // t = -ln(1e-4 * 1e-2), sf = exp(-t) * (1 + t)
        let t = -(1e-4_f64.ln() + 1e-2_f64.ln());
        let expected = (-t).exp() * (1.0 + t);
        let combined = fisher_combined_probability(&[1e-4, 1e-2]);
        assert!((combined - expected).abs() < 1e-15);
        assert_eq!(error_prob_to_phred(combined, 60), 48);
    }

    #[test]
    fn test_fisher_degenerate() {
        assert_eq!(fisher_combined_probability(&[]), 1.0);
        assert_eq!(fisher_combined_probability(&[1.0, 1.0]), 1.0);
        let tiny = fisher_combined_probability(&[0.0, 0.0, 0.0]);
        assert!(tiny.is_finite() && tiny > 0.0);
    }

    #[test]
    fn test_fisher_below_min_positive() {
        // 200 and 150 Q40 observations both underflow once exponentiated
        let strong = fisher_combined_ln_probability(&[1e-4; 200]);
        let weaker = fisher_combined_ln_probability(&[1e-4; 150]);
        assert!(strong < weaker);
        assert!(weaker < f64::MIN_POSITIVE.ln());
        assert!(!ln_probabilities_tied(strong, weaker));
        assert_eq!(fisher_combined_probability(&[1e-4; 200]), fisher_combined_probability(&[1e-4; 150]));
        assert_eq!(ln_error_prob_to_phred(strong, 60), 60);
    }

    #[test]
    fn test_ln_error_prob_to_phred() {
        assert_eq!(ln_error_prob_to_phred(0.001_f64.ln(), 60), 30);
        assert_eq!(ln_error_prob_to_phred(0.0, 60), 0);
        assert_eq!(ln_error_prob_to_phred(f64::NAN, 60), 0);
        assert_eq!(ln_error_prob_to_phred(f64::NEG_INFINITY, 60), 60);
    }

    #[test]
    fn test_fisher_order_independent() {
        let ln_a = fisher_combined_ln_probability(&[0.001, 0.2, 0.05]);
        let ln_b = fisher_combined_ln_probability(&[0.05, 0.001, 0.2]);
        assert!(ln_probabilities_tied(ln_a, ln_b));
    }
}
