//! Family consensus architecture.
//!
//! Each characteristic identity gets one averaged position per occurrence,
//! expressed as a percentage of protein length.

use std::collections::BTreeMap;

use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::statistics::Statistics;
use tracing::{debug, error};

use crate::error::{ProcessError, Result};
use crate::types::ProteinRecord;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ConsensusEntry {
    pub identity: String,
    /// `"<identity> <index>"` when the identity typically occurs more than
    /// once per protein, otherwise the identity itself.
    pub label: String,
    pub occurrence: Option<usize>,
    pub start_percent: f64,
    pub end_percent: f64,
}

/// Midpoint of the two-sided Student t confidence interval around the mean.
/// A sample with a single distinct value returns that value.
pub fn ci_mean(values: &[f64], confidence_level: f64) -> Result<f64> {
    let first = match values.first() {
        Some(&first) => first,
        None => return Err(ProcessError::Consensus("empty sample".into())),
    };

    if values.iter().all(|&v| v == first) {
        return Ok(first);
    }

    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(ProcessError::Consensus(
            format!("confidence level {} is outside (0, 1)", confidence_level)));
    }

    let mean = values.iter().mean();

    let n = values.len() as f64;
    let std_err = values.iter().std_dev() / n.sqrt();

    let dist = StudentsT::new(mean, std_err, n - 1.0)
        .map_err(|err| ProcessError::Consensus(err.to_string()))?;

    let tail = (1.0 - confidence_level) / 2.0;
    let lower = dist.inverse_cdf(tail);
    let upper = dist.inverse_cdf(1.0 - tail);

    Ok((lower + upper) / 2.0)
}

/// Most common value; ties go to the smallest.
pub fn occurrence_mode<I>(counts: I) -> Option<usize>
    where I: IntoIterator<Item = usize>
{
    let mut tally: BTreeMap<usize, usize> = BTreeMap::new();
    for count in counts {
        *tally.entry(count).or_insert(0) += 1;
    }

    let mut best: Option<(usize, usize)> = None;
    for (value, freq) in tally {
        match best {
            Some((_, best_freq)) if freq <= best_freq => (),
            _ => best = Some((value, freq)),
        }
    }
    best.map(|(value, _)| value)
}

// relative (start, end) of each occurrence of `identity`, in position order
fn relative_positions(protein: &ProteinRecord, identity: &str) -> Vec<(f64, f64)> {
    let length = protein.length as f64;
    protein.domains()
        .filter(|hit| hit.identity == identity)
        .map(|hit| (hit.start() as f64 / length, hit.end() as f64 / length))
        .collect()
}

fn averaged_entry(identity: &str, label: String, occurrence: Option<usize>,
                  positions: &[(f64, f64)], confidence_level: f64) -> Result<ConsensusEntry>
{
    let starts: Vec<f64> = positions.iter().map(|p| p.0).collect();
    let ends: Vec<f64> = positions.iter().map(|p| p.1).collect();

    Ok(ConsensusEntry {
        identity: identity.into(),
        label,
        occurrence,
        start_percent: ci_mean(&starts, confidence_level)? * 100.0,
        end_percent: ci_mean(&ends, confidence_level)? * 100.0,
    })
}

fn identity_entries(identity: &str, mode: usize, matching: &[&Vec<(f64, f64)>],
                    confidence_level: f64) -> Result<Vec<ConsensusEntry>>
{
    if mode == 1 {
        let positions: Vec<(f64, f64)> = matching.iter().map(|p| p[0]).collect();
        return Ok(vec![averaged_entry(identity, identity.into(), None,
                                      &positions, confidence_level)?]);
    }

    (0..mode)
        .map(|index| {
            let positions: Vec<(f64, f64)> = matching.iter().map(|p| p[index]).collect();
            averaged_entry(identity, format!("{} {}", identity, index), Some(index),
                           &positions, confidence_level)
        })
        .collect()
}

/// Consensus positions for each characteristic identity.  Proteins whose
/// occurrence count differs from the modal (non-zero) count are left out of
/// that identity's average.  An identity whose statistics fail is logged and
/// left out.
pub fn build_consensus(proteins: &[ProteinRecord], characteristic: &[String],
                       confidence_level: f64) -> Vec<ConsensusEntry>
{
    let mut entries = vec![];

    for identity in characteristic {
        let per_protein: Vec<Vec<(f64, f64)>> = proteins.iter()
            .map(|protein| relative_positions(protein, identity))
            .filter(|positions| !positions.is_empty())
            .collect();

        let mode = match occurrence_mode(per_protein.iter().map(|p| p.len())) {
            Some(mode) => mode,
            None => continue,
        };

        let matching: Vec<&Vec<(f64, f64)>> = per_protein.iter()
            .filter(|positions| positions.len() == mode)
            .collect();

        debug!(identity = %identity, mode, proteins = matching.len(), "consensus sample");

        match identity_entries(identity, mode, &matching, confidence_level) {
            Ok(found) => entries.extend(found),
            Err(err) => {
                error!(identity = %identity, error = %err, "no consensus for identity");
            }
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawHit;

    fn protein(id: &str, length: usize, hits: &[(&str, usize, usize)]) -> ProteinRecord {
        let raw: Vec<RawHit> = hits.iter()
            .map(|&(identity, start, end)| RawHit {
                identity: identity.into(),
                start,
                end,
                score: None,
                significance: None,
                provenance: None,
            })
            .collect();
        ProteinRecord::new(id, length, "", &raw).unwrap()
    }

    #[test]
    fn test_ci_mean_constant() {
        assert_eq!(ci_mean(&[0.25, 0.25, 0.25], 0.95).unwrap(), 0.25);
        assert_eq!(ci_mean(&[0.4], 0.95).unwrap(), 0.4);
        assert!(ci_mean(&[], 0.95).is_err());
    }

    #[test]
    fn test_ci_mean_symmetric_interval() {
        let value = ci_mean(&[0.1, 0.2, 0.3, 0.6], 0.95).unwrap();
        assert!((value - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_mode() {
        assert_eq!(occurrence_mode(vec![1, 2, 2, 3]), Some(2));
        assert_eq!(occurrence_mode(vec![3, 1, 3, 1]), Some(1));
        assert_eq!(occurrence_mode(Vec::new()), None);
    }

    #[test]
    fn test_constant_positions() {
        let proteins = vec![
            protein("P1", 100, &[("A", 10, 50)]),
            protein("P2", 200, &[("A", 20, 100)]),
            protein("P3", 50, &[("A", 5, 25), ("B", 30, 45)]),
        ];
        let entries = build_consensus(&proteins, &["A".into()], 0.95);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].label, "A");
        assert_eq!(entries[0].occurrence, None);
        assert!((entries[0].start_percent - 10.0).abs() < 1e-9);
        assert!((entries[0].end_percent - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_repeated_identity_splits_by_occurrence() {
        let proteins = vec![
            protein("P1", 100, &[("A", 10, 20), ("A", 60, 70)]),
            protein("P2", 100, &[("A", 10, 20), ("A", 60, 70)]),
            protein("P3", 100, &[("A", 40, 50)]),
            protein("P4", 100, &[("B", 40, 50)]),
        ];
        let entries = build_consensus(&proteins, &["A".into()], 0.95);

        let labels: Vec<&str> = entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["A 0", "A 1"]);
        assert!((entries[0].start_percent - 10.0).abs() < 1e-9);
        assert!((entries[1].end_percent - 70.0).abs() < 1e-9);
        assert_eq!(entries[1].identity, "A");
    }

    #[test]
    fn test_failed_identity_is_skipped() {
        let proteins = vec![
            protein("P1", 100, &[("A", 10, 50), ("B", 60, 70)]),
            protein("P2", 100, &[("A", 10, 50), ("B", 65, 80)]),
            protein("P3", 100, &[("A", 10, 50), ("B", 70, 90)]),
        ];
        // the varying B positions need a valid confidence level; constant A doesn't
        let entries = build_consensus(&proteins, &["A".into(), "B".into()], 1.5);

        let labels: Vec<&str> = entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["A"]);
        assert!(ci_mean(&[0.1, 0.2], 1.5).is_err());
    }
}
