use std::collections::HashMap;

use tracing::warn;

use crate::error::{ProcessError, Result};

/// Identity used for synthetic gap entries.
pub const GAP_IDENTITY: &str = "-1";

/// A 1-based, inclusive residue range.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location {
    pub start: usize,
    pub end: usize,
}

impl Location {
    /// Fails when `end < start`, or when `end` is so large that the
    /// inclusive length can't be represented.
    pub fn new(start: usize, end: usize) -> Result<Location> {
        if end < start || end.checked_add(1).is_none() {
            return Err(ProcessError::InvalidLocation { start, end });
        }
        Ok(Location { start, end })
    }

    /// Inclusive length: `end - start + 1`.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start).saturating_add(1)
    }

    /// Exclusive span `end - start`, as used by the mutual-overlap test.
    pub fn span(&self) -> usize {
        self.end - self.start
    }

    pub fn contains(&self, pos: usize) -> bool {
        self.start <= pos && pos <= self.end
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HitKind {
    Domain,
    Gap,
}

/// Fraction of the protein covered by `len` residues, clamped to [0, 1].
pub fn coverage(len: usize, protein_length: usize) -> f64 {
    if protein_length == 0 {
        return 0.0;
    }
    let raw = len as f64 / protein_length as f64;
    if !(0.0..=1.0).contains(&raw) {
        warn!(len, protein_length, coverage = raw, "coverage outside [0,1], clamping");
        return raw.clamp(0.0, 1.0);
    }
    raw
}

/// One scored interval asserting a domain identity, or a synthetic gap.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DomainHit {
    pub identity: String,
    #[serde(flatten)]
    pub location: Location,
    pub score: Option<f64>,
    pub significance: Option<f64>,
    pub provenance: Option<i32>,
    pub coverage: f64,
    pub kind: HitKind,
}

impl DomainHit {
    pub fn new(identity: &str, start: usize, end: usize, protein_length: usize)
               -> Result<DomainHit>
    {
        let location = Location::new(start, end)?;
        Ok(DomainHit {
            identity: identity.into(),
            location,
            score: None,
            significance: None,
            provenance: None,
            coverage: coverage(location.len(), protein_length),
            kind: HitKind::Domain,
        })
    }

    pub fn gap(start: usize, end: usize, protein_length: usize) -> Result<DomainHit> {
        let mut hit = DomainHit::new(GAP_IDENTITY, start, end, protein_length)?;
        hit.kind = HitKind::Gap;
        Ok(hit)
    }

    pub fn with_score(mut self, score: Option<f64>) -> DomainHit {
        self.score = score;
        self
    }

    pub fn with_significance(mut self, significance: Option<f64>) -> DomainHit {
        self.significance = significance;
        self
    }

    pub fn with_provenance(mut self, provenance: Option<i32>) -> DomainHit {
        self.provenance = provenance;
        self
    }

    pub fn start(&self) -> usize {
        self.location.start
    }

    pub fn end(&self) -> usize {
        self.location.end
    }

    pub fn len(&self) -> usize {
        self.location.len()
    }

    pub fn is_gap(&self) -> bool {
        self.kind == HitKind::Gap
    }

    /// Recompute coverage against a (possibly different) protein length.
    pub fn recompute_coverage(&mut self, protein_length: usize) {
        self.coverage = coverage(self.len(), protein_length);
    }
}

/// Non-owning lookup from identity to positions in a hit slice.  Must be
/// rebuilt whenever the slice it was built from changes.
#[derive(Debug, Clone, Default)]
pub struct IdentityIndex {
    positions: HashMap<String, Vec<usize>>,
}

impl IdentityIndex {
    pub fn build(hits: &[DomainHit]) -> IdentityIndex {
        let mut positions: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, hit) in hits.iter().enumerate() {
            if hit.is_gap() {
                continue;
            }
            positions.entry(hit.identity.clone()).or_default().push(i);
        }
        IdentityIndex { positions }
    }

    pub fn get(&self, identity: &str) -> &[usize] {
        self.positions.get(identity).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.positions.contains_key(identity)
    }
}

/// An inter-domain region with its flanking domains and resolved label.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Gap {
    pub position: usize,
    #[serde(flatten)]
    pub location: Location,
    pub names: Vec<String>,
    pub flanks: Vec<(Option<DomainHit>, Option<DomainHit>)>,
    pub label: String,
    pub sequence: String,
}

impl Gap {
    pub fn len(&self) -> usize {
        self.location.len()
    }
}

/// Summary of what a protein's hit list is made of.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct DomainComposition {
    pub domain_count: usize,
    pub gap_count: usize,
    pub domain_coverage: f64,
    pub domain_lengths: Vec<usize>,
    pub gap_lengths: Vec<usize>,
}

#[derive(Serialize, Debug, Clone)]
pub struct ProteinRecord {
    pub id: String,
    pub length: usize,
    pub sequence: String,
    hits: Vec<DomainHit>,
    pub gaps: Vec<Gap>,
    #[serde(skip)]
    identity_index: IdentityIndex,
}

impl ProteinRecord {
    /// Build a protein from raw candidate hits.  Hits with `end < start` are
    /// dropped; a zero-length protein is an error.
    pub fn new(id: &str, length: usize, sequence: &str, raw_hits: &[RawHit])
               -> Result<ProteinRecord>
    {
        if length == 0 {
            return Err(ProcessError::EmptyProtein(id.into()));
        }

        let mut hits = vec![];
        for raw in raw_hits {
            match raw.to_hit(length) {
                Ok(hit) => hits.push(hit),
                Err(err) => {
                    warn!(protein = id, identity = %raw.identity, error = %err,
                          "dropping malformed hit");
                }
            }
        }

        let mut protein = ProteinRecord {
            id: id.into(),
            length,
            sequence: sequence.into(),
            hits: vec![],
            gaps: vec![],
            identity_index: IdentityIndex::default(),
        };
        protein.set_hits(hits);
        Ok(protein)
    }

    pub fn hits(&self) -> &[DomainHit] {
        &self.hits
    }

    /// Replace the hit list, keeping it sorted by start and the identity
    /// index current.
    pub fn set_hits(&mut self, mut hits: Vec<DomainHit>) {
        hits.sort_by_key(|hit| hit.start());
        self.identity_index = IdentityIndex::build(&hits);
        self.hits = hits;
    }

    pub fn domains(&self) -> impl Iterator<Item = &DomainHit> {
        self.hits.iter().filter(|hit| !hit.is_gap())
    }

    pub fn gap_hits(&self) -> impl Iterator<Item = &DomainHit> {
        self.hits.iter().filter(|hit| hit.is_gap())
    }

    pub fn hits_of(&self, identity: &str) -> Vec<&DomainHit> {
        self.identity_index.get(identity).iter().map(|&i| &self.hits[i]).collect()
    }

    pub fn has_identity(&self, identity: &str) -> bool {
        self.identity_index.contains(identity)
    }

    pub fn has_any_identity(&self, identities: &[String]) -> bool {
        identities.iter().any(|id| self.has_identity(id))
    }

    /// The residues `[start, end]` (1-based) of the sequence, cut short at
    /// the end of the sequence.  "" when the range starts outside it.
    pub fn subsequence(&self, location: &Location) -> String {
        if location.start == 0 || location.start > self.sequence.len() {
            return "".into();
        }
        let end = location.end.min(self.sequence.len());
        self.sequence
            .get(location.start - 1..end)
            .unwrap_or("")
            .into()
    }

    pub fn domain_composition(&self) -> DomainComposition {
        let mut composition = DomainComposition::default();
        for hit in &self.hits {
            if hit.is_gap() {
                composition.gap_count += 1;
                composition.gap_lengths.push(hit.len());
            } else {
                composition.domain_count += 1;
                composition.domain_lengths.push(hit.len());
                composition.domain_coverage += hit.coverage;
            }
        }
        composition
    }
}

/// A candidate hit as delivered by an input collaborator.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct RawHit {
    pub identity: String,
    pub start: usize,
    pub end: usize,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub significance: Option<f64>,
    #[serde(default)]
    pub provenance: Option<i32>,
}

impl RawHit {
    pub fn to_hit(&self, protein_length: usize) -> Result<DomainHit> {
        Ok(DomainHit::new(&self.identity, self.start, self.end, protein_length)?
           .with_score(self.score)
           .with_significance(self.significance)
           .with_provenance(self.provenance))
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct RawProtein {
    pub id: String,
    #[serde(default)]
    pub length: Option<usize>,
    #[serde(default)]
    pub sequence: Option<String>,
    #[serde(default)]
    pub hits: Vec<RawHit>,
}

impl RawProtein {
    /// The declared length, falling back to the sequence length.
    pub fn resolved_length(&self) -> Result<usize> {
        match (self.length, &self.sequence) {
            (Some(length), _) => Ok(length),
            (None, Some(sequence)) => Ok(sequence.len()),
            (None, None) => Err(ProcessError::UnknownLength(self.id.clone())),
        }
    }

    pub fn to_record(&self) -> Result<ProteinRecord> {
        let length = self.resolved_length()?;
        let sequence = self.sequence.as_deref().unwrap_or("");
        ProteinRecord::new(&self.id, length, sequence, &self.hits)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct RawFamily {
    pub family_id: String,
    #[serde(default)]
    pub proteins: Vec<RawProtein>,
}

/// The family part of a TCDB accession: its first three dotted fields, so
/// `1.A.12.3.1-P0A334` belongs to `1.A.12`.
pub fn family_id_of(accession: &str) -> String {
    accession.split('.').take(3).collect::<Vec<_>>().join(".")
}

/// Group proteins into families by accession, in first-seen order.  Proteins
/// repeated under the same id have their hits combined.
pub fn group_by_family(proteins: Vec<RawProtein>) -> Vec<RawFamily> {
    let mut families: Vec<RawFamily> = vec![];
    let mut family_index: HashMap<String, usize> = HashMap::new();

    for protein in proteins {
        let family_id = family_id_of(&protein.id);
        let idx = *family_index.entry(family_id.clone()).or_insert_with(|| {
            families.push(RawFamily { family_id, proteins: vec![] });
            families.len() - 1
        });
        let family = &mut families[idx];

        match family.proteins.iter_mut().find(|p| p.id == protein.id) {
            Some(existing) => {
                existing.hits.extend(protein.hits);
                if existing.length.is_none() {
                    existing.length = protein.length;
                }
            },
            None => family.proteins.push(protein),
        }
    }

    families
}
