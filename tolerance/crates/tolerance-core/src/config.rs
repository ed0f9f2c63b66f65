use std::{fs::File, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Parameters of a hammer tolerance campaign.
///
/// Unknown keys are rejected when deserializing. All keys except `fill_local`
/// are required.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CampaignConfig {
    pub verbose: bool,
    /// Name of the row mapping, see [`crate::memory::row_mapping_by_name`].
    pub row_mapping: String,
    /// Row span under test. One fewer rows than this are used as victims.
    pub nr_rows: usize,
    /// Read count added per escalation step.
    pub read_count_step: u64,
    /// Iterations spent at each row position before moving on.
    pub iters_per_row: u64,
    pub max_iteration: u64,
    /// Number of devices sharing the 64-bit data bus.
    pub nr_chips: usize,
    /// Only fill the span of the three rows in play instead of the whole region.
    #[serde(default)]
    pub fill_local: bool,
}

impl CampaignConfig {
    pub fn from_jsonfile<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let reader = BufReader::new(File::open(path)?);
        let config: CampaignConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: CampaignConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values for which the row and step arithmetic is undefined.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nr_rows < 3 {
            return Err(ConfigError::InvalidValue(format!(
                "nr_rows must be at least 3, got {}",
                self.nr_rows
            )));
        }
        if self.iters_per_row == 0 {
            return Err(ConfigError::InvalidValue(
                "iters_per_row must be greater than 0".into(),
            ));
        }
        if self.read_count_step == 0 {
            return Err(ConfigError::InvalidValue(
                "read_count_step must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "verbose": false,
        "row_mapping": "TrivialRowMapping",
        "nr_rows": 10,
        "read_count_step": 1000,
        "iters_per_row": 3,
        "max_iteration": 27,
        "nr_chips": 8
    }"#;

    #[test]
    fn fill_local_defaults_to_false() {
        let c = CampaignConfig::from_json_str(VALID).unwrap();
        assert!(!c.fill_local);
        assert_eq!(c.nr_rows, 10);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let json = VALID.replace("\"verbose\"", "\"refresh\": true, \"verbose\"");
        let err = CampaignConfig::from_json_str(&json).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("refresh"));
    }

    #[test]
    fn missing_key_is_rejected() {
        let json = VALID.replace("\"nr_chips\": 8", "\"fill_local\": true");
        let err = CampaignConfig::from_json_str(&json).unwrap_err();
        assert!(err.to_string().contains("nr_chips"));
    }

    #[test]
    fn degenerate_values_are_rejected() {
        let json = VALID.replace("\"nr_rows\": 10", "\"nr_rows\": 2");
        assert!(matches!(
            CampaignConfig::from_json_str(&json),
            Err(ConfigError::InvalidValue(_))
        ));
        let json = VALID.replace("\"iters_per_row\": 3", "\"iters_per_row\": 0");
        assert!(matches!(
            CampaignConfig::from_json_str(&json),
            Err(ConfigError::InvalidValue(_))
        ));
    }
}
