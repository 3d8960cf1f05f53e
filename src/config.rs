// ⚙️ Pipeline configuration
//
// Everything has a default; a JSON file only needs the keys it changes.

use crate::assembler::{TitleField, DEFAULT_LAYOUT};
use crate::error::{read_json, ConfigError, ConfigResult};
use crate::extract::NumberPolicy;
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Treatment of bare numbers when no `#` number exists
    pub number_policy: NumberPolicy,

    /// Field order of the canonical title
    pub title_layout: Vec<TitleField>,

    /// Raw price replacement, as a fraction of the PSA10 anchor
    pub raw_fraction: f64,

    /// PSA9 price replacement, as a fraction of the PSA10 price
    pub psa9_fraction: f64,

    /// Attempts per duplicate group before giving up on it
    pub merge_max_attempts: u32,

    /// Upper bound for plausible years is current_year + 1 (defaults to the clock)
    pub current_year: Option<i32>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            number_policy: NumberPolicy::default(),
            title_layout: DEFAULT_LAYOUT.to_vec(),
            raw_fraction: 0.3,
            psa9_fraction: 0.7,
            merge_max_attempts: 3,
            current_year: None,
        }
    }
}

impl PipelineConfig {
    /// Load and validate a JSON config file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let config: PipelineConfig = read_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        for (name, value) in [("raw_fraction", self.raw_fraction), ("psa9_fraction", self.psa9_fraction)] {
            if !(value > 0.0 && value < 1.0) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be between 0 and 1 (exclusive), got {}",
                    name, value
                )));
            }
        }
        if self.raw_fraction > self.psa9_fraction {
            return Err(ConfigError::Invalid(format!(
                "raw_fraction ({}) must not exceed psa9_fraction ({})",
                self.raw_fraction, self.psa9_fraction
            )));
        }
        if self.merge_max_attempts == 0 {
            return Err(ConfigError::Invalid("merge_max_attempts must be at least 1".to_string()));
        }
        if self.title_layout.is_empty() {
            return Err(ConfigError::Invalid("title_layout is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for field in &self.title_layout {
            if !seen.insert(field) {
                return Err(ConfigError::Invalid(format!(
                    "title_layout lists {:?} twice",
                    field
                )));
            }
        }

        Ok(())
    }

    pub fn effective_year(&self) -> i32 {
        self.current_year
            .unwrap_or_else(|| chrono::Utc::now().year())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.number_policy, NumberPolicy::GradeContext);
        assert_eq!(config.title_layout.len(), 7);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"number_policy": "hash_only", "current_year": 2025}}"#
        )
        .unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.number_policy, NumberPolicy::HashOnly);
        assert_eq!(config.effective_year(), 2025);
        assert_eq!(config.raw_fraction, 0.3);
        assert_eq!(config.merge_max_attempts, 3);
    }

    #[test]
    fn test_layout_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"title_layout": ["year", "brand_set", "card_number", "player"]}}"#
        )
        .unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.title_layout[2], TitleField::CardNumber);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = PipelineConfig {
            raw_fraction: 1.5,
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = PipelineConfig {
            raw_fraction: 0.8,
            psa9_fraction: 0.7,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            merge_max_attempts: 0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            title_layout: vec![TitleField::Player, TitleField::Player],
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_json_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        assert!(matches!(
            PipelineConfig::from_file(file.path()),
            Err(ConfigError::Json { .. })
        ));
    }
}
