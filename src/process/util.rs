use crate::types::DomainHit;

// keep the more significant (smaller) value; a missing or zero value never
// displaces a real one
fn merge_significance(current: Option<f64>, next: Option<f64>) -> Option<f64> {
    let is_real = |value: Option<f64>| matches!(value, Some(v) if v != 0.0);

    match (is_real(current), is_real(next)) {
        (false, true) => next,
        (true, true) => {
            if next < current { next } else { current }
        },
        (false, false) => current.or(next),
        (true, false) => current,
    }
}

fn merge_score(current: Option<f64>, next: Option<f64>) -> Option<f64> {
    match (current, next) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

// merge hits of the same identity that abut or overlap; only neighbours in
// start order are merged, so an interleaved hit of another identity keeps
// two same-identity hits apart
pub fn merge_hits(hits: &[DomainHit], protein_length: usize) -> Vec<DomainHit> {
    let mut sorted: Vec<DomainHit> = hits.to_vec();
    sorted.sort_by_key(|hit| hit.start());

    let mut merged = vec![];
    let mut iter = sorted.into_iter();

    let mut current = match iter.next() {
        Some(hit) => hit,
        None => return merged,
    };

    for next in iter {
        if next.identity == current.identity && next.start() <= current.end().saturating_add(1) {
            if next.end() > current.location.end {
                current.location.end = next.end();
            }
            current.score = merge_score(current.score, next.score);
            current.significance = merge_significance(current.significance, next.significance);
        } else {
            current.recompute_coverage(protein_length);
            merged.push(current);
            current = next;
        }
    }

    current.recompute_coverage(protein_length);
    merged.push(current);

    merged
}
