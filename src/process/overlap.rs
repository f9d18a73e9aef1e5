//! Conflict graph over one protein's domain hits.
//!
//! Hits live in a caller-owned slice (the arena); the graph only stores
//! indices into it.

use crate::types::{DomainHit, Location};

pub const DEFAULT_MUTUAL_OVERLAP: f64 = 0.2;

/// Mutual overlap test.  Both the overlap and the denominator use the
/// exclusive span `end - start`, so a one-residue hit never overlaps.
pub fn is_overlap(a: &Location, b: &Location, threshold: f64) -> bool {
    let overlap_start = a.start.max(b.start);
    let overlap_end = a.end.min(b.end);

    if overlap_end <= overlap_start {
        return false;
    }

    let overlap = (overlap_end - overlap_start) as f64;
    let shorter = a.span().min(b.span()) as f64;

    overlap / shorter >= threshold
}

pub fn hits_overlap(a: &DomainHit, b: &DomainHit, threshold: f64) -> bool {
    is_overlap(&a.location, &b.location, threshold)
}

struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> DisjointSet {
        DisjointSet {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, i: usize) -> usize {
        if self.parent[i] != i {
            let root = self.find(self.parent[i]);
            self.parent[i] = root;
        }
        self.parent[i]
    }

    fn union(&mut self, i: usize, j: usize) {
        let pi = self.find(i);
        let pj = self.find(j);
        if pi == pj {
            return;
        }
        if self.rank[pi] < self.rank[pj] {
            self.parent[pi] = pj;
        } else if self.rank[pi] > self.rank[pj] {
            self.parent[pj] = pi;
        } else {
            self.parent[pj] = pi;
            self.rank[pi] += 1;
        }
    }
}

#[derive(Debug, Clone)]
pub struct OverlapGraph {
    node_count: usize,
    edges: Vec<(usize, usize)>,
    adjacency: Vec<Vec<usize>>,
}

impl OverlapGraph {
    /// One node per hit, one edge per pair passing the mutual-overlap test.
    /// Gap entries are expected to have been filtered out by the caller.
    pub fn build(hits: &[DomainHit], threshold: f64) -> OverlapGraph {
        let n = hits.len();
        let mut edges = vec![];
        let mut adjacency = vec![vec![]; n];

        for i in 0..n {
            for j in (i + 1)..n {
                if hits_overlap(&hits[i], &hits[j], threshold) {
                    edges.push((i, j));
                    adjacency[i].push(j);
                    adjacency[j].push(i);
                }
            }
        }

        OverlapGraph { node_count: n, edges, adjacency }
    }

    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    pub fn neighbours(&self, node: usize) -> &[usize] {
        &self.adjacency[node]
    }

    /// Connected components, each sorted ascending, ordered by their smallest
    /// member.  Singletons are hits with no conflicts.
    pub fn components(&self) -> Vec<Vec<usize>> {
        let mut set = DisjointSet::new(self.node_count);
        for &(i, j) in &self.edges {
            set.union(i, j);
        }

        let mut root_slot: Vec<Option<usize>> = vec![None; self.node_count];
        let mut components: Vec<Vec<usize>> = vec![];

        for node in 0..self.node_count {
            let root = set.find(node);
            match root_slot[root] {
                Some(slot) => components[slot].push(node),
                None => {
                    root_slot[root] = Some(components.len());
                    components.push(vec![node]);
                }
            }
        }

        components
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(start: usize, end: usize) -> Location {
        Location::new(start, end).unwrap()
    }

    fn hit(identity: &str, start: usize, end: usize) -> DomainHit {
        DomainHit::new(identity, start, end, 500).unwrap()
    }

    #[test]
    fn test_is_overlap() {
        assert!(is_overlap(&loc(1, 100), &loc(50, 150), 0.2));
        assert!(!is_overlap(&loc(1, 100), &loc(200, 300), 0.2));
    }

    #[test]
    fn test_touching_is_not_overlap() {
        assert!(!is_overlap(&loc(1, 50), &loc(50, 100), 0.2));
    }

    #[test]
    fn test_exclusive_denominator() {
        // overlap 10 over the shorter span 50 is exactly 0.2
        assert!(is_overlap(&loc(1, 51), &loc(41, 200), 0.2));
        assert!(!is_overlap(&loc(1, 51), &loc(42, 200), 0.2));
    }

    #[test]
    fn test_components() {
        let hits = vec![
            hit("A", 1, 100),
            hit("B", 300, 400),
            hit("C", 50, 150),
            hit("D", 120, 250),
            hit("E", 320, 390),
        ];
        let graph = OverlapGraph::build(&hits, DEFAULT_MUTUAL_OVERLAP);

        assert_eq!(graph.edges(), &[(0, 2), (1, 4), (2, 3)]);
        assert_eq!(graph.neighbours(2), &[0, 3]);
        assert_eq!(graph.components(), vec![vec![0, 2, 3], vec![1, 4]]);
    }

    #[test]
    fn test_singletons() {
        let hits = vec![hit("A", 1, 50), hit("B", 100, 150)];
        let graph = OverlapGraph::build(&hits, DEFAULT_MUTUAL_OVERLAP);
        assert_eq!(graph.components(), vec![vec![0], vec![1]]);
        assert!(OverlapGraph::build(&[], 0.2).components().is_empty());
    }
}
