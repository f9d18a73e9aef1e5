//! Reader for tabular CDD search output.  Columns are named by the
//! `# Fields:` comment line; other comment lines are ignored.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::info;

use crate::error::{ProcessError, Result};
use crate::types::{group_by_family, RawFamily, RawHit, RawProtein};

const FIELDS_PREFIX: &str = "# Fields:";

struct Columns {
    query: usize,
    subject: usize,
    start: usize,
    end: usize,
    evalue: Option<usize>,
    bit_score: Option<usize>,
}

impl Columns {
    fn from_header(header: &str, line_no: usize) -> Result<Columns> {
        let names: Vec<&str> = header.split(',').map(|name| name.trim()).collect();
        let find = |name: &str| names.iter().position(|n| *n == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| ProcessError::Parse {
                line: line_no,
                message: format!("no \"{}\" column in header", name),
            })
        };

        Ok(Columns {
            query: require("query acc.")?,
            subject: require("subject accs.")?,
            start: require("q. start")?,
            end: require("q. end")?,
            evalue: find("evalue"),
            bit_score: find("bit score"),
        })
    }
}

fn field<'a>(fields: &[&'a str], idx: usize, line_no: usize) -> Result<&'a str> {
    fields.get(idx).copied().ok_or_else(|| ProcessError::Parse {
        line: line_no,
        message: format!("expected at least {} columns, got {}", idx + 1, fields.len()),
    })
}

fn parse_number<T: std::str::FromStr>(value: &str, line_no: usize) -> Result<T>
    where T::Err: std::fmt::Display
{
    value.trim().parse::<T>().map_err(|err| ProcessError::Parse {
        line: line_no,
        message: format!("can't parse \"{}\": {}", value, err),
    })
}

/// Parse CDD output into families.  Protein lengths aren't part of this
/// format, so they stay unset until sequences are attached.
pub fn parse(reader: &mut dyn BufRead) -> Result<Vec<RawFamily>> {
    let mut columns: Option<Columns> = None;
    let mut proteins: Vec<RawProtein> = vec![];

    for (i, line_result) in reader.lines().enumerate() {
        let line_no = i + 1;
        let line = line_result?;

        if let Some(header) = line.strip_prefix(FIELDS_PREFIX) {
            columns = Some(Columns::from_header(header, line_no)?);
            continue;
        }
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }

        let cols = columns.as_ref().ok_or_else(|| ProcessError::Parse {
            line: line_no,
            message: "data before the \"# Fields:\" header".into(),
        })?;

        let fields: Vec<&str> = line.split('\t').collect();

        let evalue = match cols.evalue {
            Some(idx) => Some(parse_number::<f64>(field(&fields, idx, line_no)?, line_no)?),
            None => None,
        };
        let bit_score = match cols.bit_score {
            Some(idx) => Some(parse_number::<f64>(field(&fields, idx, line_no)?, line_no)?),
            None => None,
        };

        let hit = RawHit {
            identity: field(&fields, cols.subject, line_no)?.trim().to_owned(),
            start: parse_number(field(&fields, cols.start, line_no)?, line_no)?,
            end: parse_number(field(&fields, cols.end, line_no)?, line_no)?,
            score: bit_score,
            significance: evalue,
            provenance: None,
        };

        proteins.push(RawProtein {
            id: field(&fields, cols.query, line_no)?.trim().to_owned(),
            length: None,
            sequence: None,
            hits: vec![hit],
        });
    }

    if columns.is_none() {
        return Err(ProcessError::Parse {
            line: 0,
            message: "\"# Fields:\" header not found".into(),
        });
    }

    Ok(group_by_family(proteins))
}

pub fn parse_file(path: &Path) -> Result<Vec<RawFamily>> {
    let file = File::open(path)?;
    let families = parse(&mut BufReader::new(file))?;
    info!(path = %path.display(), families = families.len(), "read CDD file");
    Ok(families)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CDD: &str = "\
# RPSBLAST 2.12.0+
# Query: 1.A.1.1.1-P1
# Fields: query acc., subject accs., evalue, q. start, q. end, bit score
1.A.1.1.1-P1\tCDD100\t1e-30\t5\t95\t120.5
1.A.1.1.1-P1\tCDD200\t2e-4\t110\t160\t35.0
1.A.1.2.1-P2\tCDD100\t3e-25\t8\t99\t110.0
2.A.3.1.1-P9\tCDD300\t1e-8\t1\t40\t50.0
";

    #[test]
    fn test_parse() {
        let families = parse(&mut CDD.as_bytes()).unwrap();

        let ids: Vec<&str> = families.iter().map(|f| f.family_id.as_str()).collect();
        assert_eq!(ids, vec!["1.A.1", "2.A.3"]);

        let p1 = &families[0].proteins[0];
        assert_eq!(p1.id, "1.A.1.1.1-P1");
        assert_eq!(p1.length, None);
        assert_eq!(p1.hits.len(), 2);
        assert_eq!(p1.hits[1].identity, "CDD200");
        assert_eq!((p1.hits[1].start, p1.hits[1].end), (110, 160));
        assert_eq!(p1.hits[1].significance, Some(2e-4));
        assert_eq!(p1.hits[1].score, Some(35.0));
    }

    #[test]
    fn test_missing_header() {
        let text = "1.A.1.1.1-P1\tCDD100\t1e-30\t5\t95\t120.5\n";
        assert!(parse(&mut text.as_bytes()).is_err());
        assert!(parse(&mut "".as_bytes()).is_err());
    }

    #[test]
    fn test_missing_required_column() {
        let text = "# Fields: query acc., evalue, q. start, q. end\n";
        match parse(&mut text.as_bytes()) {
            Err(ProcessError::Parse { line, message }) => {
                assert_eq!(line, 1);
                assert!(message.contains("subject accs."));
            },
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
