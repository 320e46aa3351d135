//! Free-text sheet labels to canonical test identifiers
//!
//! Client sheets carry human-written labels such as `"VO2 max (ml/kg/min)"`.
//! Matching is data: an ordered list of prefix rules compiled once into a
//! [`LabelTable`], evaluated case-insensitively against the trimmed label.

use serde::{Deserialize, Serialize};

/// One matching rule. `test: None` recognises a label but ignores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRule {
    pub prefixes: Vec<String>,
    #[serde(default)]
    pub test: Option<String>,
}

impl LabelRule {
    #[must_use]
    pub fn maps(prefixes: &[&str], test: &str) -> Self {
        Self {
            prefixes: prefixes.iter().map(|p| (*p).to_string()).collect(),
            test: Some(test.to_string()),
        }
    }

    #[must_use]
    pub fn ignores(prefixes: &[&str]) -> Self {
        Self {
            prefixes: prefixes.iter().map(|p| (*p).to_string()).collect(),
            test: None,
        }
    }
}

/// The label set used by the intake workbook template
#[must_use]
pub fn default_label_rules() -> Vec<LabelRule> {
    vec![
        LabelRule::maps(&["vo2 max"], "VO2 max"),
        LabelRule::maps(&["fev1"], "FEV1"),
        LabelRule::maps(&["grip strength"], "Grip Strength"),
        LabelRule::maps(&["sts power"], "STS Power"),
        LabelRule::maps(&["vertical jump"], "Vertical Jump"),
        LabelRule::maps(&["body fat"], "Body Fat %"),
        LabelRule::maps(&["waist to height ratio"], "Waist to Height Ratio"),
        LabelRule::ignores(&["fasting glucose"]),
        LabelRule::maps(&["hba1c"], "HbA1c"),
        LabelRule::maps(&["homa ir", "homa-ir"], "HOMA-IR"),
        LabelRule::maps(&["apob"], "ApoB"),
        LabelRule::maps(&["hscrp"], "hsCRP"),
        LabelRule::maps(&["gait speed"], "Gait Speed"),
        LabelRule::maps(&["timed up and go"], "Timed Up and Go"),
        LabelRule::maps(&["single leg stance"], "Single Leg Stance"),
        LabelRule::maps(&["sit and reach"], "Sit and Reach"),
        LabelRule::maps(&["processing speed"], "Processing Speed"),
        LabelRule::maps(&["working memory"], "Working Memory"),
    ]
}

/// Compiled, lower-cased rule list. First matching prefix wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    entries: Vec<(String, Option<String>)>,
}

impl Default for LabelTable {
    fn default() -> Self {
        Self::compile(&default_label_rules())
    }
}

impl LabelTable {
    #[must_use]
    pub fn compile(rules: &[LabelRule]) -> Self {
        let entries = rules
            .iter()
            .flat_map(|rule| {
                rule.prefixes
                    .iter()
                    .map(|prefix| (prefix.trim().to_lowercase(), rule.test.clone()))
            })
            .filter(|(prefix, _)| !prefix.is_empty())
            .collect();
        Self { entries }
    }

    /// Canonical test for a sheet label, or `None` if it is unrecognised or
    /// deliberately ignored
    #[must_use]
    pub fn resolve(&self, label: &str) -> Option<&str> {
        let label = label.trim().to_lowercase();
        self.entries
            .iter()
            .find(|(prefix, _)| label.starts_with(prefix.as_str()))
            .and_then(|(_, test)| test.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_prefix_matching() {
        let table = LabelTable::default();
        assert_eq!(table.resolve("VO2 Max (ml/kg/min)"), Some("VO2 max"));
        assert_eq!(table.resolve("  grip strength - left"), Some("Grip Strength"));
        assert_eq!(table.resolve("HOMA-IR"), Some("HOMA-IR"));
        assert_eq!(table.resolve("homa ir score"), Some("HOMA-IR"));
        assert_eq!(table.resolve("Body Fat"), Some("Body Fat %"));
    }

    #[test]
    fn test_ignored_and_unknown_labels() {
        let table = LabelTable::default();
        assert_eq!(table.resolve("Fasting Glucose (mmol/L)"), None);
        assert_eq!(table.resolve("Favourite colour"), None);
        assert_eq!(table.resolve(""), None);
    }

    #[test]
    fn test_first_rule_wins() {
        let table = LabelTable::compile(&[
            LabelRule::ignores(&["vo2 max estimated"]),
            LabelRule::maps(&["vo2 max"], "VO2 max"),
        ]);
        assert_eq!(table.resolve("VO2 max estimated"), None);
        assert_eq!(table.resolve("VO2 max measured"), Some("VO2 max"));
    }
}
