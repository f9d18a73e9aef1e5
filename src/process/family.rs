//! Families of proteins and the per-family resolution pipeline.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use tracing::{error, info, info_span, warn};

use crate::config::ProcessConfig;
use crate::consensus::{build_consensus, ConsensusEntry};
use crate::error::Result;
use crate::holes::{fill_gaps, identify_holes, name_gaps};
use crate::types::{ProteinRecord, RawFamily, RawProtein};
use crate::util::merge_hits;
use crate::voting::{resolve_domains, ConflictSet, VoteTally};

#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct IdentityStatistics {
    pub count: usize,
    pub mean_length: f64,
    /// Mean over the hits that carry a score; `None` when none do.
    pub mean_score: Option<f64>,
    pub proteins: Vec<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct FamilyStatistics {
    pub protein_count: usize,
    pub mean_length: f64,
    pub total_domains: usize,
    pub unique_identities: Vec<String>,
    /// Number of proteins carrying each identity.
    pub identity_frequencies: BTreeMap<String, usize>,
    /// Number of hits of each identity across the family.
    pub occurrence_counts: BTreeMap<String, usize>,
}

impl FamilyStatistics {
    pub fn compute(proteins: &[ProteinRecord]) -> FamilyStatistics {
        if proteins.is_empty() {
            return FamilyStatistics::default();
        }

        let mut identity_frequencies = BTreeMap::new();
        let mut occurrence_counts = BTreeMap::new();
        let mut total_domains = 0;

        for protein in proteins {
            let mut seen = BTreeSet::new();
            for domain in protein.domains() {
                total_domains += 1;
                *occurrence_counts.entry(domain.identity.clone()).or_insert(0) += 1;
                seen.insert(domain.identity.clone());
            }
            for identity in seen {
                *identity_frequencies.entry(identity).or_insert(0) += 1;
            }
        }

        let total_length: usize = proteins.iter().map(|p| p.length).sum();

        FamilyStatistics {
            protein_count: proteins.len(),
            mean_length: total_length as f64 / proteins.len() as f64,
            total_domains,
            unique_identities: identity_frequencies.keys().cloned().collect(),
            identity_frequencies,
            occurrence_counts,
        }
    }

    /// Identities carried by at least `threshold` of the proteins.
    pub fn characteristic_identities(&self, threshold: f64) -> Vec<String> {
        if self.protein_count == 0 {
            return vec![];
        }
        self.identity_frequencies.iter()
            .filter(|(_, &count)| count as f64 / self.protein_count as f64 >= threshold)
            .map(|(identity, _)| identity.clone())
            .collect()
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct FamilyRecord {
    pub family_id: String,
    pub proteins: Vec<ProteinRecord>,
    pub merge_overlapping: bool,
    pub characteristic_identities: Vec<String>,
    pub statistics: FamilyStatistics,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ExcludedProtein {
    pub id: String,
    pub reason: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct FamilyReport {
    #[serde(flatten)]
    pub family: FamilyRecord,
    pub consensus: Vec<ConsensusEntry>,
    pub excluded_proteins: Vec<ExcludedProtein>,
}

fn exclude(excluded: &mut Vec<ExcludedProtein>, id: &str, reason: String) {
    error!(protein = id, reason = %reason, "excluding protein");
    excluded.push(ExcludedProtein { id: id.into(), reason });
}

fn merge_protein(protein: &mut ProteinRecord) {
    let domains: Vec<_> = protein.domains().cloned().collect();
    let merged = merge_hits(&domains, protein.length);
    protein.set_hits(merged);
}

// margin-mode gaps between adjacent domains
fn resolve_direct(protein: &mut ProteinRecord, config: &ProcessConfig) -> Result<()> {
    if config.merge_overlapping {
        merge_protein(protein);
    }
    let (gap_hits, gaps) = identify_holes(protein, config.hole_threshold, config.hole_margin)?;
    let mut hits: Vec<_> = protein.domains().cloned().collect();
    hits.extend(gap_hits);
    protein.set_hits(hits);
    protein.gaps = gaps;
    Ok(())
}

fn first_pass(protein: &mut ProteinRecord, config: &ProcessConfig) -> ConflictSet {
    if config.merge_overlapping {
        merge_protein(protein);
    }
    ConflictSet::build(&protein.id, protein.hits(), protein.length, config.overlap_threshold)
}

fn second_pass(protein: &mut ProteinRecord, set: &ConflictSet, tally: &VoteTally,
               config: &ProcessConfig) -> Result<()>
{
    let resolved = resolve_domains(set, tally, config.overlap_threshold);
    let filled = fill_gaps(&resolved, protein.length)?;
    protein.set_hits(filled);
    protein.gaps = name_gaps(protein, config.hole_threshold, config.hole_margin);
    Ok(())
}

impl FamilyRecord {
    /// Build and resolve a family.  Proteins that can't be constructed or
    /// resolved are dropped and listed in the report; they never stop the
    /// rest of the family.
    pub fn build(family_id: &str, raw_proteins: &[RawProtein], config: &ProcessConfig)
                 -> Result<FamilyReport>
    {
        let span = info_span!("family", family = family_id);
        let _guard = span.enter();

        let mut excluded = vec![];
        let mut proteins = vec![];

        for raw in raw_proteins {
            match raw.to_record() {
                Ok(protein) => proteins.push(protein),
                Err(err) => exclude(&mut excluded, &raw.id, err.to_string()),
            }
        }

        if config.resolve_conflicts {
            let sets: Vec<ConflictSet> = proteins.iter_mut()
                .map(|protein| first_pass(protein, config))
                .collect();

            let tally = VoteTally::collect(&sets);
            info!(proteins = sets.len(), winners = tally.ranking().len(), "votes tallied");

            let mut kept = vec![];
            for (mut protein, set) in proteins.into_iter().zip(sets.iter()) {
                match second_pass(&mut protein, set, &tally, config) {
                    Ok(()) => kept.push(protein),
                    Err(err) => exclude(&mut excluded, &protein.id, err.to_string()),
                }
            }
            proteins = kept;
        } else {
            let mut kept = vec![];
            for mut protein in proteins {
                match resolve_direct(&mut protein, config) {
                    Ok(()) => kept.push(protein),
                    Err(err) => exclude(&mut excluded, &protein.id, err.to_string()),
                }
            }
            proteins = kept;
        }

        let statistics = FamilyStatistics::compute(&proteins);
        let characteristic_identities =
            statistics.characteristic_identities(config.characteristic_threshold);

        let consensus = if proteins.len() >= config.min_consensus_proteins {
            build_consensus(&proteins, &characteristic_identities, config.confidence_level)
        } else {
            info!(proteins = proteins.len(), "too few proteins for a consensus architecture");
            vec![]
        };

        info!(proteins = proteins.len(), excluded = excluded.len(),
              characteristic = characteristic_identities.len(), "family resolved");

        Ok(FamilyReport {
            family: FamilyRecord {
                family_id: family_id.into(),
                proteins,
                merge_overlapping: config.merge_overlapping,
                characteristic_identities,
                statistics,
            },
            consensus,
            excluded_proteins: excluded,
        })
    }

    pub fn protein(&self, id: &str) -> Option<&ProteinRecord> {
        self.proteins.iter().find(|protein| protein.id == id)
    }

    pub fn proteins_with_identity(&self, identity: &str) -> Vec<&ProteinRecord> {
        self.proteins.iter().filter(|protein| protein.has_identity(identity)).collect()
    }

    pub fn identity_statistics(&self) -> BTreeMap<String, IdentityStatistics> {
        let mut stats: BTreeMap<String, IdentityStatistics> = BTreeMap::new();
        let mut length_sums: BTreeMap<String, usize> = BTreeMap::new();
        let mut score_sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();

        for protein in &self.proteins {
            for domain in protein.domains() {
                let entry = stats.entry(domain.identity.clone()).or_default();
                entry.count += 1;
                if !entry.proteins.contains(&protein.id) {
                    entry.proteins.push(protein.id.clone());
                }
                *length_sums.entry(domain.identity.clone()).or_insert(0) += domain.len();
                if let Some(score) = domain.score {
                    let sum = score_sums.entry(domain.identity.clone()).or_insert((0.0, 0));
                    sum.0 += score;
                    sum.1 += 1;
                }
            }
        }

        for (identity, entry) in stats.iter_mut() {
            entry.mean_length = length_sums[identity] as f64 / entry.count as f64;
            entry.mean_score = score_sums.get(identity).map(|&(sum, n)| sum / n as f64);
        }

        stats
    }
}

/// Process every family in turn.  A family that fails is logged and left
/// out; the others are still returned.
pub fn process_families(families: &[RawFamily], config: &ProcessConfig) -> Vec<FamilyReport> {
    let mut reports = vec![];

    for (i, family) in families.iter().enumerate() {
        info!(family = %family.family_id, n = i + 1, of = families.len(), "processing family");

        match FamilyRecord::build(&family.family_id, &family.proteins, config) {
            Ok(report) => reports.push(report),
            Err(err) => {
                warn!(family = %family.family_id, error = %err, "skipping family");
            }
        }
    }

    reports
}

/// Family IDs from a file with one ID per line when `wanted` names a file,
/// otherwise from a comma-separated list.
pub fn read_family_ids(wanted: &str) -> Result<Vec<String>> {
    let path = Path::new(wanted);
    let (text, separator) = if path.is_file() {
        (fs::read_to_string(path)?, '\n')
    } else {
        (wanted.to_owned(), ',')
    };

    Ok(text.split(separator)
       .map(|id| id.trim())
       .filter(|id| !id.is_empty())
       .map(|id| id.to_owned())
       .collect())
}

/// Keep only the families named by `wanted` (see [`read_family_ids`]).
/// `None` or an empty list keeps everything.
pub fn family_filter(families: Vec<RawFamily>, wanted: Option<&str>) -> Result<Vec<RawFamily>> {
    let wanted = match wanted {
        Some(wanted) => read_family_ids(wanted)?,
        None => vec![],
    };

    if wanted.is_empty() {
        return Ok(families);
    }

    Ok(families.into_iter()
       .filter(|family| wanted.contains(&family.family_id))
       .collect())
}
