//! Processing configuration
//!
//! Settings come from built-in defaults, optionally overridden by `TCDB_*`
//! environment variables or replaced by a JSON file.

use std::env;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

use crate::error::{ProcessError, Result};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ProcessConfig {
    /// Merge same-identity hits that overlap or abut before anything else.
    pub merge_overlapping: bool,
    /// Run graph-based conflict resolution and family voting.  When false,
    /// gaps are found between adjacent domains using the margin rule.
    pub resolve_conflicts: bool,
    pub overlap_threshold: f64,
    pub hole_threshold: usize,
    pub hole_margin: usize,
    pub characteristic_threshold: f64,
    pub confidence_level: f64,
    /// Families smaller than this get no consensus architecture.
    pub min_consensus_proteins: usize,
    pub rescue_min_found_fraction: f64,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        ProcessConfig {
            merge_overlapping: true,
            resolve_conflicts: true,
            overlap_threshold: 0.2,
            hole_threshold: 50,
            hole_margin: 10,
            characteristic_threshold: 0.5,
            confidence_level: 0.95,
            min_consensus_proteins: 3,
            rescue_min_found_fraction: 0.8,
        }
    }
}

fn env_override<T: FromStr>(name: &str, target: &mut T) -> Result<()> {
    if let Ok(value) = env::var(name) {
        *target = value.trim().parse::<T>().map_err(|_| {
            ProcessError::Config(format!("can't parse {}={}", name, value))
        })?;
    }
    Ok(())
}

fn env_flag(name: &str, target: &mut bool) -> Result<()> {
    if let Ok(value) = env::var(name) {
        *target = match value.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            _ => {
                return Err(ProcessError::Config(format!("can't parse {}={}", name, value)));
            }
        };
    }
    Ok(())
}

impl ProcessConfig {
    /// Defaults overridden by any `TCDB_*` variable that is set.
    pub fn from_env() -> Result<ProcessConfig> {
        let mut config = ProcessConfig::default();

        env_flag("TCDB_MERGE_DOMAINS", &mut config.merge_overlapping)?;
        env_flag("TCDB_RESOLVE_CONFLICTS", &mut config.resolve_conflicts)?;
        env_override("TCDB_OVERLAP_THRESHOLD", &mut config.overlap_threshold)?;
        env_override("TCDB_HOLE_THRESHOLD", &mut config.hole_threshold)?;
        env_override("TCDB_HOLE_MARGIN", &mut config.hole_margin)?;
        env_override("TCDB_CHAR_THRESHOLD", &mut config.characteristic_threshold)?;
        env_override("TCDB_CONFIDENCE_LEVEL", &mut config.confidence_level)?;
        env_override("TCDB_MIN_CONSENSUS_PROTEINS", &mut config.min_consensus_proteins)?;
        env_override("TCDB_RESCUE_MIN_FOUND", &mut config.rescue_min_found_fraction)?;

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<ProcessConfig> {
        let reader = BufReader::new(File::open(path)?);
        let config: ProcessConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let fractions = [
            ("overlap_threshold", self.overlap_threshold),
            ("characteristic_threshold", self.characteristic_threshold),
            ("rescue_min_found_fraction", self.rescue_min_found_fraction),
        ];
        for (name, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(ProcessError::Config(format!("{} must be in [0, 1], got {}",
                                                        name, value)));
            }
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(ProcessError::Config(format!("confidence_level must be in (0, 1), got {}",
                                                    self.confidence_level)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = ProcessConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.hole_threshold, 50);
        assert_eq!(config.hole_margin, 10);
        assert_eq!(config.overlap_threshold, 0.2);
    }

    #[test]
    fn test_from_file_fills_missing_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"hole_threshold": 20, "resolve_conflicts": false}}"#).unwrap();

        let config = ProcessConfig::from_file(file.path()).unwrap();
        assert_eq!(config.hole_threshold, 20);
        assert!(!config.resolve_conflicts);
        assert_eq!(config.confidence_level, 0.95);
    }

    #[test]
    fn test_validate_rejects_bad_confidence() {
        let config = ProcessConfig { confidence_level: 1.0, ..ProcessConfig::default() };
        assert!(matches!(config.validate(), Err(ProcessError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let config = ProcessConfig { characteristic_threshold: 1.5, ..ProcessConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_env_overrides() {
        env::set_var("TCDB_HOLE_MARGIN", "4");
        env::set_var("TCDB_RESOLVE_CONFLICTS", "no");
        let config = ProcessConfig::from_env().unwrap();
        assert_eq!(config.hole_margin, 4);
        assert!(!config.resolve_conflicts);
        assert_eq!(config.hole_threshold, 50);

        env::set_var("TCDB_CHAR_THRESHOLD", "half");
        assert!(matches!(ProcessConfig::from_env(), Err(ProcessError::Config(_))));

        env::remove_var("TCDB_HOLE_MARGIN");
        env::remove_var("TCDB_RESOLVE_CONFLICTS");
        env::remove_var("TCDB_CHAR_THRESHOLD");
    }
}
