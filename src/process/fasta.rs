use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, info};

use crate::error::{ProcessError, Result};
use crate::types::RawFamily;

/// Read protein sequences keyed by the first word of each `>` header.
pub fn parse(reader: &mut dyn BufRead) -> Result<HashMap<String, String>> {
    let mut sequences = HashMap::new();
    let mut current: Option<(String, String)> = None;

    for (i, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let line = line.trim();

        if let Some(header) = line.strip_prefix('>') {
            if let Some((id, seq)) = current.take() {
                sequences.insert(id, seq);
            }
            let id = header.split_whitespace().next()
                .ok_or_else(|| ProcessError::Parse {
                    line: i + 1,
                    message: "empty FASTA header".into(),
                })?;
            current = Some((id.to_owned(), String::new()));
        } else if !line.is_empty() {
            match current {
                Some((_, ref mut seq)) => seq.push_str(line),
                None => {
                    return Err(ProcessError::Parse {
                        line: i + 1,
                        message: "sequence before the first header".into(),
                    });
                }
            }
        }
    }

    if let Some((id, seq)) = current {
        sequences.insert(id, seq);
    }

    Ok(sequences)
}

pub fn parse_file(path: &Path) -> Result<HashMap<String, String>> {
    let file = File::open(path)?;
    let sequences = parse(&mut BufReader::new(file))?;
    info!(path = %path.display(), sequences = sequences.len(), "read sequences");
    Ok(sequences)
}

/// Fill in missing sequences, and lengths taken from them.  Returns the
/// number of proteins updated.
pub fn attach_sequences(families: &mut [RawFamily], sequences: &HashMap<String, String>)
                        -> usize
{
    let mut updated = 0;

    for protein in families.iter_mut().flat_map(|family| family.proteins.iter_mut()) {
        if protein.sequence.is_some() {
            continue;
        }
        if let Some(sequence) = sequences.get(&protein.id) {
            if protein.length.is_none() {
                protein.length = Some(sequence.len());
            }
            protein.sequence = Some(sequence.clone());
            updated += 1;
        } else {
            debug!(protein = %protein.id, "no sequence found");
        }
    }

    updated
}
