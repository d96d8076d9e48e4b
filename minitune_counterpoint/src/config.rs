// Analysis configuration, loaded from JSON.
//
// Every field has a default, so an empty object (or no file at all) gives
// the standard behavior: all implemented rules, lenient about dropped input.
//
// Example:
//   { "rules": ["harmonic_consonance", "parallel_fifths_octaves"], "strict": true }

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::rules::{RuleId, RuleSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Rules to evaluate, in order. Naming an unimplemented rule is an error
    /// when the rule set is built.
    pub rules: Vec<RuleId>,
    /// Fail with `AnalysisError::DataLoss` instead of warning when notes or
    /// countermelody chords would be dropped.
    pub strict: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            rules: RuleId::IMPLEMENTED.to_vec(),
            strict: false,
        }
    }
}

impl AnalysisConfig {
    pub fn load(path: &Path) -> Result<Self, AnalysisError> {
        let data = std::fs::read_to_string(path)?;
        AnalysisConfig::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self, AnalysisError> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn rule_set(&self) -> Result<RuleSet, AnalysisError> {
        RuleSet::from_ids(&self.rules)
    }
}
