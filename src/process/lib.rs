#[macro_use]
extern crate serde_derive;

pub mod types;
pub mod error;
pub mod config;
pub mod util;
pub mod overlap;
pub mod score;
pub mod voting;
pub mod holes;
pub mod consensus;
pub mod family;
pub mod hits_parse;
pub mod rescue_parse;
pub mod cdd_parse;
pub mod fasta;

pub use config::ProcessConfig;
pub use error::{ProcessError, Result};
pub use family::{process_families, FamilyRecord, FamilyReport};
