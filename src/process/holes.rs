//! Inter-domain gaps ("holes").
//!
//! Three ways to find them:
//!
//! - fill mode covers the protein end to end with gap entries between the
//!   resolved domains
//! - naming mode takes an already filled hit list and labels each long
//!   enough gap from the domains found just outside it
//! - margin mode looks only between adjacent domains, pulling each edge in
//!   by a margin

use tracing::debug;

use crate::error::Result;
use crate::types::{DomainHit, Gap, Location, ProteinRecord};

pub const BEGIN_LABEL: &str = "BEGIN";
pub const END_LABEL: &str = "END";

pub type FlankPair = (Option<DomainHit>, Option<DomainHit>);

fn sorted_domains(hits: &[DomainHit]) -> Vec<&DomainHit> {
    let mut domains: Vec<&DomainHit> = hits.iter().filter(|hit| !hit.is_gap()).collect();
    domains.sort_by_key(|hit| hit.start());
    domains
}

/// Interleave gap entries with the domains of `hits`.  Existing gap entries
/// are discarded first, so filling twice gives the same result.
///
/// The leading gap starts at 0 and the trailing gap stops at
/// `protein_length - 1`.
pub fn fill_gaps(hits: &[DomainHit], protein_length: usize) -> Result<Vec<DomainHit>> {
    let domains = sorted_domains(hits);
    let mut filled = vec![];

    let (first, last) = match (domains.first(), domains.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => {
            if protein_length > 0 {
                filled.push(DomainHit::gap(0, protein_length - 1, protein_length)?);
            }
            return Ok(filled);
        }
    };

    if first.start() > 0 {
        filled.push(DomainHit::gap(0, first.start() - 1, protein_length)?);
    }

    filled.push(first.clone());

    for pair in domains.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if prev.end().saturating_add(1) < next.start() {
            filled.push(DomainHit::gap(prev.end() + 1, next.start() - 1, protein_length)?);
        }
        filled.push(next.clone());
    }

    if last.end().saturating_add(1) < protein_length {
        filled.push(DomainHit::gap(last.end() + 1, protein_length - 1, protein_length)?);
    }

    Ok(filled)
}

/// Domains spanning `left` and domains spanning `right`.
pub fn find_margins(hits: &[DomainHit], left: Option<usize>, right: usize)
                    -> (Vec<&DomainHit>, Vec<&DomainHit>)
{
    let mut left_doms = vec![];
    let mut right_doms = vec![];

    for hit in hits.iter().filter(|hit| !hit.is_gap()) {
        if let Some(left) = left {
            if hit.location.contains(left) {
                left_doms.push(hit);
            }
        }
        if hit.location.contains(right) {
            right_doms.push(hit);
        }
    }

    (left_doms, right_doms)
}

pub fn flank_pairs(left: &[&DomainHit], right: &[&DomainHit]) -> Vec<FlankPair> {
    match (left.is_empty(), right.is_empty()) {
        (true, true) => vec![(None, None)],
        (true, false) => right.iter().map(|r| (None, Some((*r).clone()))).collect(),
        (false, true) => left.iter().map(|l| (Some((*l).clone()), None)).collect(),
        (false, false) => {
            left.iter()
                .flat_map(|l| right.iter().map(move |r| (Some((*l).clone()), Some((*r).clone()))))
                .collect()
        }
    }
}

fn pair_label(left: Option<&DomainHit>, right: Option<&DomainHit>) -> String {
    format!("{} to {}",
            left.map(|d| d.identity.as_str()).unwrap_or(BEGIN_LABEL),
            right.map(|d| d.identity.as_str()).unwrap_or(END_LABEL))
}

/// Distinct candidate labels, in pair order.
pub fn candidate_names(flanks: &[FlankPair]) -> Vec<String> {
    let mut names: Vec<String> = vec![];
    for (left, right) in flanks {
        let name = pair_label(left.as_ref(), right.as_ref());
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

fn highest_scoring<'a, I>(domains: I) -> Option<&'a DomainHit>
    where I: Iterator<Item = &'a DomainHit>
{
    let rank = |d: &DomainHit| d.score.unwrap_or(f64::NEG_INFINITY);

    let mut best: Option<&DomainHit> = None;
    for domain in domains {
        match best {
            Some(current) if rank(domain) <= rank(current) => (),
            _ => best = Some(domain),
        }
    }
    best
}

/// `"<left> to <right>"` from the best-scoring domain on each side, with
/// `BEGIN`/`END` standing in for a missing side.
pub fn best_label(flanks: &[FlankPair]) -> String {
    let left = highest_scoring(flanks.iter().filter_map(|(l, _)| l.as_ref()));
    let right = highest_scoring(flanks.iter().filter_map(|(_, r)| r.as_ref()));
    pair_label(left, right)
}

fn make_gap(protein: &ProteinRecord, position: usize, location: Location,
            flanks: Vec<FlankPair>) -> Gap
{
    let names = candidate_names(&flanks);
    let label = best_label(&flanks);
    debug!(protein = %protein.id, start = location.start, end = location.end,
           label = %label, "named gap");
    Gap {
        position,
        location,
        names,
        flanks,
        label,
        sequence: protein.subsequence(&location),
    }
}

/// Label every gap entry of an already filled protein whose length is at
/// least `threshold`.  Flanks are the domains covering `margin` residues
/// beyond each end of the gap.  `position` counts all gap entries, named or
/// not.
pub fn name_gaps(protein: &ProteinRecord, threshold: usize, margin: usize) -> Vec<Gap> {
    let mut named = vec![];

    for (position, gap) in protein.gap_hits().enumerate() {
        if gap.len() < threshold {
            continue;
        }

        let (left, right) = find_margins(protein.hits(), gap.start().checked_sub(margin),
                                         gap.end().saturating_add(margin));
        let flanks = flank_pairs(&left, &right);
        named.push(make_gap(protein, position, gap.location, flanks));
    }

    named
}

/// Margin mode: a gap `[prev.end + margin, next.start - margin]` between each
/// pair of adjacent domains, kept when it is non-empty and at least
/// `threshold` long.  Returns the gap entries and their labelled records.
pub fn identify_holes(protein: &ProteinRecord, threshold: usize, margin: usize)
                      -> Result<(Vec<DomainHit>, Vec<Gap>)>
{
    let domains = sorted_domains(protein.hits());
    let mut gap_hits = vec![];
    let mut gaps = vec![];

    for pair in domains.windows(2) {
        let (prev, next) = (pair[0], pair[1]);

        let gap_start = match prev.end().checked_add(margin) {
            Some(start) => start,
            None => continue,
        };
        let gap_end = match next.start().checked_sub(margin) {
            Some(end) => end,
            None => continue,
        };

        if gap_end <= gap_start || gap_end - gap_start + 1 < threshold {
            continue;
        }

        let gap_hit = DomainHit::gap(gap_start, gap_end, protein.length)?;
        let flanks = vec![(Some(prev.clone()), Some(next.clone()))];
        gaps.push(make_gap(protein, gaps.len(), gap_hit.location, flanks));
        gap_hits.push(gap_hit);
    }

    Ok((gap_hits, gaps))
}
