use tracing::debug;

use crate::types::DomainHit;

/// Stand-in for `-ln(significance)` when the significance is missing, zero
/// or otherwise unusable.
pub const MISSING_SIGNIFICANCE_SCORE: f64 = 1_000_000.0;

fn neg_log_significance(significance: Option<f64>) -> f64 {
    match significance {
        Some(value) => {
            let nlog = -value.ln();
            if nlog.is_finite() { nlog } else { MISSING_SIGNIFICANCE_SCORE }
        },
        None => MISSING_SIGNIFICANCE_SCORE,
    }
}

/// `(end - start / protein_length) * -ln(significance)`.  Only `start` is
/// divided by the protein length.
pub fn score_hit(hit: &DomainHit, protein_length: usize) -> f64 {
    let end = hit.end() as f64;
    let start = hit.start() as f64;

    (end - start / protein_length as f64) * neg_log_significance(hit.significance)
}

/// Index (into `hits`) of the best-scoring member of `component`.  The first
/// member starts as the choice and is only displaced by a strictly greater
/// score.  `None` only for an empty component.
pub fn pick_representative(hits: &[DomainHit], component: &[usize], protein_length: usize)
                           -> Option<usize>
{
    let (&first, rest) = component.split_first()?;

    let mut best = first;
    let mut best_score = score_hit(&hits[first], protein_length);

    for &i in rest {
        let score = score_hit(&hits[i], protein_length);
        if score > best_score {
            best = i;
            best_score = score;
        }
    }

    debug!(identity = %hits[best].identity, score = best_score,
           candidates = component.len(), "picked representative");

    Some(best)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(identity: &str, start: usize, end: usize, significance: Option<f64>) -> DomainHit {
        DomainHit::new(identity, start, end, 100).unwrap().with_significance(significance)
    }

    #[test]
    fn test_literal_formula() {
        let h = hit("A", 10, 60, Some((-2.0f64).exp()));
        let expected = (60.0 - 10.0 / 100.0) * 2.0;
        assert!((score_hit(&h, 100) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_unusable_significance() {
        for significance in [None, Some(0.0), Some(-1.0)] {
            let h = hit("A", 10, 60, significance);
            assert_eq!(score_hit(&h, 100), (60.0 - 0.1) * MISSING_SIGNIFICANCE_SCORE);
        }
    }

    #[test]
    fn test_representative_belongs_to_component() {
        let hits = vec![
            hit("A", 1, 50, Some(1e-3)),
            hit("B", 10, 60, Some(1e-10)),
            hit("C", 20, 55, Some(1e-5)),
            hit("D", 200, 250, None),
        ];
        let component = vec![0, 1, 2];
        let rep = pick_representative(&hits, &component, 300).unwrap();
        assert!(component.contains(&rep));
        assert_eq!(hits[rep].identity, "B");
    }

    #[test]
    fn test_ties_keep_first() {
        let hits = vec![hit("A", 1, 50, Some(1e-5)), hit("B", 1, 50, Some(1e-5))];
        assert_eq!(pick_representative(&hits, &[0, 1], 100), Some(0));
        assert_eq!(pick_representative(&hits, &[1, 0], 100), Some(1));
        assert_eq!(pick_representative(&hits, &[], 100), None);
    }
}
