//! Family-wide conflict resolution.
//!
//! Pass one builds a [`ConflictSet`] for every protein independently.  The
//! sets are then folded into a [`VoteTally`], an immutable snapshot that pass
//! two reads while it re-resolves each protein's domains.

use std::collections::HashMap;

use tracing::debug;

use crate::overlap::{hits_overlap, OverlapGraph};
use crate::score::pick_representative;
use crate::types::{DomainHit, IdentityIndex};

/// Conflict clusters of one protein and the representative chosen for each.
#[derive(Debug, Clone)]
pub struct ConflictSet {
    pub protein_id: String,
    /// Every non-gap hit of the protein; components and representatives
    /// index into this.
    pub pool: Vec<DomainHit>,
    pub components: Vec<Vec<usize>>,
    pub representatives: Vec<usize>,
    index: IdentityIndex,
}

impl ConflictSet {
    pub fn build(protein_id: &str, hits: &[DomainHit], protein_length: usize, threshold: f64)
                 -> ConflictSet
    {
        let pool: Vec<DomainHit> = hits.iter().filter(|hit| !hit.is_gap()).cloned().collect();
        let components = OverlapGraph::build(&pool, threshold).components();
        let representatives = components.iter()
            .filter_map(|component| pick_representative(&pool, component, protein_length))
            .collect();
        let index = IdentityIndex::build(&pool);

        ConflictSet {
            protein_id: protein_id.into(),
            pool,
            components,
            representatives,
            index,
        }
    }

    /// The representatives, one per component, in component order.
    pub fn selected(&self) -> Vec<&DomainHit> {
        self.representatives.iter().map(|&i| &self.pool[i]).collect()
    }

    /// All pool hits carrying `identity`, in start order.
    pub fn alternatives(&self, identity: &str) -> impl Iterator<Item = &DomainHit> {
        self.index.get(identity).iter().map(move |&i| &self.pool[i])
    }

    pub fn has_identity(&self, identity: &str) -> bool {
        self.index.contains(identity)
    }
}

/// Votes and coverage-weighted scores per identity across a family.
#[derive(Debug, Clone, Default)]
pub struct VoteTally {
    votes: HashMap<String, usize>,
    scores: HashMap<String, f64>,
    ranking: Vec<(String, f64)>,
}

impl VoteTally {
    pub fn collect<'a, I>(sets: I) -> VoteTally
        where I: IntoIterator<Item = &'a ConflictSet> + Clone
    {
        let mut votes: HashMap<String, usize> = HashMap::new();
        // first-win order, used to break score ties
        let mut order: Vec<String> = vec![];

        for set in sets.clone() {
            for winner in set.selected() {
                let count = votes.entry(winner.identity.clone()).or_insert(0);
                if *count == 0 {
                    order.push(winner.identity.clone());
                }
                *count += 1;
            }
        }

        let mut scores: HashMap<String, f64> = HashMap::new();
        for set in sets {
            for hit in &set.pool {
                if let Some(&count) = votes.get(&hit.identity) {
                    *scores.entry(hit.identity.clone()).or_insert(0.0) +=
                        count as f64 * hit.coverage;
                }
            }
        }

        let mut ranking: Vec<(String, f64)> = order.into_iter()
            .map(|identity| {
                let score = scores.get(&identity).copied().unwrap_or(0.0);
                (identity, score)
            })
            .collect();
        ranking.sort_by(|a, b| b.1.total_cmp(&a.1));

        VoteTally { votes, scores, ranking }
    }

    pub fn votes(&self, identity: &str) -> usize {
        self.votes.get(identity).copied().unwrap_or(0)
    }

    pub fn score(&self, identity: &str) -> f64 {
        self.scores.get(identity).copied().unwrap_or(0.0)
    }

    /// Identities that won at least one cluster, best first.
    pub fn ranking(&self) -> &[(String, f64)] {
        &self.ranking
    }
}

/// Re-resolve a protein's representatives against the family ranking.  Each
/// representative is replaced by the first overlapping pool hit of the
/// highest-ranked identity that outranks its own; an identity ranked below it
/// is never considered.
pub fn resolve_domains(set: &ConflictSet, tally: &VoteTally, threshold: f64) -> Vec<DomainHit> {
    let mut resolved: Vec<DomainHit> = vec![];

    for domain in set.selected() {
        let mut chosen = domain;

        for (identity, _) in tally.ranking() {
            if *identity == domain.identity {
                break;
            }
            if !set.has_identity(identity) {
                continue;
            }
            if let Some(replacement) = set.alternatives(identity)
                .find(|alt| hits_overlap(domain, alt, threshold))
            {
                debug!(protein = %set.protein_id, from = %domain.identity,
                       to = %replacement.identity, start = replacement.start(),
                       "substituting preferred domain");
                chosen = replacement;
                break;
            }
        }

        if !resolved.contains(chosen) {
            resolved.push(chosen.clone());
        }
    }

    resolved.sort_by_key(|hit| hit.start());
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlap::DEFAULT_MUTUAL_OVERLAP;

    fn hit(identity: &str, start: usize, end: usize, significance: f64) -> DomainHit {
        DomainHit::new(identity, start, end, 200).unwrap()
            .with_significance(Some(significance))
    }

    fn set(id: &str, hits: &[DomainHit]) -> ConflictSet {
        ConflictSet::build(id, hits, 200, DEFAULT_MUTUAL_OVERLAP)
    }

    #[test]
    fn test_conflict_set() {
        let s = set("P1", &[
            hit("A", 1, 80, 1e-20),
            hit("B", 10, 90, 1e-5),
            hit("C", 120, 180, 1e-3),
        ]);
        assert_eq!(s.components, vec![vec![0, 1], vec![2]]);
        let ids: Vec<&str> = s.selected().iter().map(|h| h.identity.as_str()).collect();
        assert_eq!(ids, vec!["A", "C"]);
    }

    #[test]
    fn test_votes_and_ranking() {
        let p1 = set("P1", &[hit("A", 1, 80, 1e-20), hit("B", 10, 90, 1e-5)]);
        let p2 = set("P2", &[hit("A", 5, 85, 1e-30), hit("B", 10, 90, 1e-5)]);
        let tally = VoteTally::collect(&[p1, p2]);

        assert_eq!(tally.votes("A"), 2);
        assert_eq!(tally.votes("B"), 0);
        assert!(tally.score("A") >= tally.score("B"));
        assert_eq!(tally.ranking().len(), 1);
        assert_eq!(tally.ranking()[0].0, "A");

        let expected = 2.0 * (80.0 / 200.0) + 2.0 * (81.0 / 200.0);
        assert!((tally.score("A") - expected).abs() < 1e-12);
    }

    #[test]
    fn test_substitution_by_globally_preferred() {
        // B wins locally in P3 but A is preferred across the family
        let p1 = set("P1", &[hit("A", 1, 80, 1e-20), hit("B", 10, 90, 1e-5)]);
        let p2 = set("P2", &[hit("A", 1, 80, 1e-20), hit("B", 10, 90, 1e-5)]);
        let p3 = set("P3", &[hit("A", 1, 80, 1e-2), hit("B", 10, 90, 1e-40)]);
        let tally = VoteTally::collect(&[p1, p2, p3.clone()]);

        assert_eq!(tally.votes("A"), 2);
        assert_eq!(tally.votes("B"), 1);
        assert_eq!(p3.selected()[0].identity, "B");

        let resolved = resolve_domains(&p3, &tally, DEFAULT_MUTUAL_OVERLAP);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].identity, "A");
    }

    #[test]
    fn test_own_identity_stops_walk() {
        let p1 = set("P1", &[hit("A", 1, 80, 1e-20)]);
        let p2 = set("P2", &[hit("A", 1, 80, 1e-20), hit("C", 150, 190, 1e-3)]);
        let tally = VoteTally::collect(&[p1, p2.clone()]);

        let resolved = resolve_domains(&p2, &tally, DEFAULT_MUTUAL_OVERLAP);
        let ids: Vec<&str> = resolved.iter().map(|h| h.identity.as_str()).collect();
        assert_eq!(ids, vec!["A", "C"]);
    }

    #[test]
    fn test_score_ties_keep_encounter_order() {
        // B and A both win once with equal coverage; B is met first
        let p1 = set("P1", &[hit("B", 101, 150, 1e-5), hit("A", 1, 50, 1e-5),
                             hit("C", 170, 189, 1e-5)]);
        let tally = VoteTally::collect(&[p1]);

        let ranked: Vec<&str> = tally.ranking().iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ranked, vec!["B", "A", "C"]);
        assert_eq!(tally.score("A"), tally.score("B"));
        assert!(tally.score("C") < tally.score("A"));
    }

    #[test]
    fn test_walk_skips_identities_the_protein_lacks() {
        let p1 = set("P1", &[hit("B", 1, 40, 1e-20), hit("D", 61, 200, 1e-20)]);
        let p2 = set("P2", &[hit("B", 1, 40, 1e-20), hit("D", 61, 200, 1e-20)]);
        // C beats B locally; P3 carries no D
        let p3 = set("P3", &[hit("B", 1, 40, 1e-2), hit("C", 5, 45, 1e-40)]);
        let tally = VoteTally::collect(&[p1, p2, p3.clone()]);

        let ranked: Vec<&str> = tally.ranking().iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ranked, vec!["D", "B", "C"]);
        assert_eq!(p3.selected()[0].identity, "C");

        let resolved = resolve_domains(&p3, &tally, DEFAULT_MUTUAL_OVERLAP);
        let ids: Vec<&str> = resolved.iter().map(|h| h.identity.as_str()).collect();
        assert_eq!(ids, vec!["B"]);
    }

    #[test]
    fn test_walk_passes_non_overlapping_higher_identity() {
        let p1 = set("P1", &[hit("B", 1, 40, 1e-20), hit("D", 61, 200, 1e-20)]);
        let p2 = set("P2", &[hit("B", 1, 40, 1e-20), hit("D", 61, 200, 1e-20)]);
        // P3 carries D, but away from its B/C conflict
        let p3 = set("P3", &[hit("B", 1, 40, 1e-2), hit("C", 5, 45, 1e-40),
                             hit("D", 61, 200, 1e-20)]);
        let tally = VoteTally::collect(&[p1, p2, p3.clone()]);

        let ranked: Vec<&str> = tally.ranking().iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ranked, vec!["D", "B", "C"]);

        let resolved = resolve_domains(&p3, &tally, DEFAULT_MUTUAL_OVERLAP);
        let ids: Vec<&str> = resolved.iter().map(|h| h.identity.as_str()).collect();
        assert_eq!(ids, vec!["B", "D"]);
    }

    #[test]
    fn test_empty_family() {
        let tally = VoteTally::collect(&[] as &[ConflictSet]);
        assert!(tally.ranking().is_empty());
        assert_eq!(tally.votes("A"), 0);
    }
}
