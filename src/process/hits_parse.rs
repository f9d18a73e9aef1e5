use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::types::RawFamily;

/// Top level of a JSON hit document.
#[derive(Debug, Deserialize)]
pub struct HitDocument {
    pub families: Vec<RawFamily>,
}

/// Read a hit document.  Proteins are validated later, when the family is
/// built, so a bad protein doesn't reject the whole document.
pub fn parse<R: Read>(reader: R) -> Result<Vec<RawFamily>> {
    let document: HitDocument = serde_json::from_reader(reader)?;
    Ok(document.families)
}

pub fn parse_file(path: &Path) -> Result<Vec<RawFamily>> {
    let file = File::open(path)?;
    let families = parse(BufReader::new(file))?;
    info!(path = %path.display(), families = families.len(), "read hit document");
    Ok(families)
}
