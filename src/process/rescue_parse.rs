//! Reader for `*_rescuedDomains.tsv` files.
//!
//! Summary lines look like:
//!
//! ```text
//! # CDD166458:  DirectHits:  9    Rescued Proteins:  2    Prots with Domain in 1.A.12:  11 (100.0% from a total of 11)
//! ```
//!
//! and each data line carries a protein as `<id>:<length>` in its second
//! column followed by one column per domain:
//! `<domain>|<start>-<end>:<evalue>|...|<RoundType>`.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{ProcessError, Result};
use crate::types::{group_by_family, RawFamily, RawHit, RawProtein};

pub const RESCUE_FILE_SUFFIX: &str = "_rescuedDomains.tsv";

/// Provenance code of a rescue round: 0 for a direct hit, otherwise the round.
pub fn round_provenance(round: &str) -> Option<i32> {
    match round {
        "DirectHit" => Some(0),
        "Rescued1" => Some(1),
        "Rescued2" => Some(2),
        _ => None,
    }
}

// rounds that count towards a domain being found in the family
fn is_significant(round: &str) -> bool {
    round == "DirectHit" || round == "Rescued1"
}

fn parse_error(line: usize, message: String) -> ProcessError {
    ProcessError::Parse { line, message }
}

struct DomainSummary {
    domain: String,
    total: usize,
}

fn parse_location(field: &str, line_no: usize) -> Result<(usize, usize, Option<f64>)> {
    let (pos, evalue) = match field.split_once(':') {
        Some((pos, evalue)) => (pos, evalue.trim().parse::<f64>().ok()),
        None => (field, None),
    };
    let (start, end) = pos.split_once('-')
        .ok_or_else(|| parse_error(line_no, format!("bad location: {}", field)))?;
    let start = start.trim().parse::<usize>()
        .map_err(|err| parse_error(line_no, format!("bad start in {}: {}", field, err)))?;
    let end = end.trim().parse::<usize>()
        .map_err(|err| parse_error(line_no, format!("bad end in {}: {}", field, err)))?;
    Ok((start, end, evalue))
}

/// Parse one rescue file.  Only domains found (by a direct hit or the first
/// rescue round) in at least `min_found_fraction` of the proteins counted in
/// their summary line are kept.
pub fn parse(reader: &mut dyn BufRead, min_found_fraction: f64) -> Result<Vec<RawFamily>> {
    let summary_re = Regex::new(r"^#\s*([^:\s]+):.*\bof\s+(\d+)\)?\s*$")?;

    let mut summaries: Vec<DomainSummary> = vec![];
    let mut found: HashMap<String, usize> = HashMap::new();
    let mut proteins: Vec<RawProtein> = vec![];

    for (i, line_result) in reader.lines().enumerate() {
        let line_no = i + 1;
        let line = line_result?;

        if line.trim().is_empty() {
            continue;
        }

        if line.starts_with('#') {
            let captures = summary_re.captures(&line)
                .ok_or_else(|| parse_error(line_no, format!("unrecognised summary: {}", line)))?;
            let total = captures[2].parse::<usize>()
                .map_err(|err| parse_error(line_no, err.to_string()))?;
            summaries.push(DomainSummary { domain: captures[1].to_owned(), total });
            continue;
        }

        let columns: Vec<&str> = line.split('\t').collect();
        let protein_col = columns.get(1)
            .ok_or_else(|| parse_error(line_no, "missing protein column".into()))?;
        let (protein_id, length) = protein_col.rsplit_once(':')
            .ok_or_else(|| parse_error(line_no, format!("expected <id>:<length>, got {}",
                                                        protein_col)))?;
        let length = length.trim().parse::<usize>()
            .map_err(|err| parse_error(line_no, format!("bad length {}: {}", length, err)))?;

        let mut hits = vec![];

        for domain_col in columns.iter().skip(2) {
            let parts: Vec<&str> = domain_col.split('|').collect();
            // a domain column without locations means no hit
            if parts.len() < 3 {
                continue;
            }
            let domain = parts[0];
            let round = parts[parts.len() - 1];
            let provenance = round_provenance(round);
            if provenance.is_none() {
                warn!(line = line_no, round, "unknown rescue round");
            }

            for field in &parts[1..parts.len() - 1] {
                let (start, end, evalue) = parse_location(field, line_no)?;
                if is_significant(round) {
                    *found.entry(domain.to_owned()).or_insert(0) += 1;
                }
                hits.push(RawHit {
                    identity: domain.to_owned(),
                    start,
                    end,
                    score: None,
                    significance: evalue,
                    provenance,
                });
            }
        }

        proteins.push(RawProtein {
            id: protein_id.to_owned(),
            length: Some(length),
            sequence: None,
            hits,
        });
    }

    let kept: Vec<&str> = summaries.iter()
        .filter(|summary| {
            let n = found.get(&summary.domain).copied().unwrap_or(0);
            let keep = summary.total > 0 &&
                n as f64 / summary.total as f64 >= min_found_fraction;
            debug!(domain = %summary.domain, found = n, total = summary.total, keep,
                   "rescue summary");
            keep
        })
        .map(|summary| summary.domain.as_str())
        .collect();

    for protein in proteins.iter_mut() {
        protein.hits.retain(|hit| kept.contains(&hit.identity.as_str()));
    }

    Ok(group_by_family(proteins))
}

pub fn parse_file(path: &Path, min_found_fraction: f64) -> Result<Vec<RawFamily>> {
    let file = File::open(path)?;
    parse(&mut BufReader::new(file), min_found_fraction)
}

/// Parse every rescue file in `dir`, in file name order.  A file that can't
/// be read or parsed is logged and skipped.
pub fn parse_directory(dir: &Path, min_found_fraction: f64) -> Result<Vec<RawFamily>> {
    let mut paths = vec![];
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_rescue = path.file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.ends_with(RESCUE_FILE_SUFFIX))
            .unwrap_or(false);
        if is_rescue && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut proteins = vec![];
    for path in &paths {
        match parse_file(path, min_found_fraction) {
            Ok(families) => {
                info!(path = %path.display(), families = families.len(), "read rescue file");
                proteins.extend(families.into_iter().flat_map(|family| family.proteins));
            },
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping rescue file");
            }
        }
    }

    Ok(group_by_family(proteins))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESCUE: &str = "\
# CDD1:  DirectHits:  2    Rescued Proteins:  0    Prots with Domain in 1.A.12:  2 (100.0% from a total of 2)
# CDD2:  DirectHits:  1    Rescued Proteins:  0    Prots with Domain in 1.A.12:  1 (50.0% from a total of 2)
1.A.12\t1.A.12.1.1-P1:300\tCDD1|10-90:1e-20|DirectHit\tCDD2|150-200:1e-5|DirectHit
1.A.12\t1.A.12.2.1-P2:280\tCDD1|12-88:1e-10|120-170:2e-3|Rescued1\tCDD2|NoHit
";

    #[test]
    fn test_parse_keeps_found_domains() {
        let families = parse(&mut RESCUE.as_bytes(), 0.8).unwrap();

        assert_eq!(families.len(), 1);
        assert_eq!(families[0].family_id, "1.A.12");

        let proteins = &families[0].proteins;
        assert_eq!(proteins.len(), 2);
        assert_eq!(proteins[0].length, Some(300));
        // CDD2 is found in 1 of 2 proteins and dropped
        assert_eq!(proteins[0].hits.len(), 1);
        assert_eq!(proteins[0].hits[0].identity, "CDD1");
        assert_eq!(proteins[0].hits[0].provenance, Some(0));

        let p2 = &proteins[1].hits;
        assert_eq!(p2.len(), 2);
        assert_eq!((p2[1].start, p2[1].end), (120, 170));
        assert_eq!(p2[1].significance, Some(2e-3));
        assert_eq!(p2[1].provenance, Some(1));
    }

    #[test]
    fn test_parse_lower_threshold_keeps_all() {
        let families = parse(&mut RESCUE.as_bytes(), 0.5).unwrap();
        assert_eq!(families[0].proteins[0].hits.len(), 2);
    }

    #[test]
    fn test_parse_reports_bad_line() {
        let text = "# CDD1: of 1)\nfam\tP1:abc\tCDD1|1-10:1e-3|DirectHit\n";
        match parse(&mut text.as_bytes(), 0.8) {
            Err(ProcessError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_round_provenance() {
        assert_eq!(round_provenance("DirectHit"), Some(0));
        assert_eq!(round_provenance("Rescued2"), Some(2));
        assert_eq!(round_provenance("Other"), None);
    }
}
