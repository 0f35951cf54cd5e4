//! Keyword rules for the section classifier.
//!
//! Rules are plain data: build them with [`ClassificationRules::default`], tweak fields,
//! or load them from JSON, then pass them to [`classify`](crate::classify::classify).
//! Nothing here is global state.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    classify::SectionMarker,
    error::{FilingError, Result},
};

/// Lowercases and removes all whitespace, folding typographic apostrophes to `'`.
///
/// Keyword matching compares normalized text on both sides.
#[must_use]
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == '\u{2019}' { '\'' } else { c })
        .flat_map(char::to_lowercase)
        .collect()
}

/// Normalized words of `text`, split on anything but letters, digits and apostrophes.
fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '\u{2019}'))
        .filter(|word| !word.is_empty())
        .map(normalize)
        .collect()
}

/// Substring rule: the label must contain one of `any_of` and none of `none_of`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRule {
    /// Keywords, any of which selects the row.
    pub any_of: Vec<String>,
    /// Keywords that veto the row even when `any_of` matches.
    #[serde(default)]
    pub none_of: Vec<String>,
    /// Whether the row must carry at least one value.
    #[serde(default)]
    pub requires_data: bool,
}

impl MatchRule {
    /// Creates a rule from keywords.
    #[must_use]
    pub fn new<I, S>(any_of: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            any_of: any_of.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Adds exclusion keywords.
    #[must_use]
    pub fn excluding<I, S>(mut self, none_of: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.none_of.extend(none_of.into_iter().map(Into::into));
        self
    }

    /// Requires the matched row to be data-bearing.
    #[must_use]
    pub const fn with_data(mut self) -> Self {
        self.requires_data = true;
        self
    }

    /// Returns true if `text` contains a keyword and no exclusion.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        let text = normalize(text);
        let hit = |keyword: &String| text.contains(&normalize(keyword));
        self.any_of.iter().any(hit) && !self.none_of.iter().any(hit)
    }

    /// Returns true if the row satisfies both the keywords and the data requirement.
    #[must_use]
    pub fn accepts(&self, label: &str, data_bearing: bool) -> bool {
        (data_bearing || !self.requires_data) && self.matches(label)
    }
}

/// Ordered phrase rule: every phrase must appear as whole words, in order, without
/// overlapping.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedRule {
    /// Phrases that must appear left to right.
    pub phrases: Vec<String>,
    /// Whether the row must carry at least one value.
    #[serde(default)]
    pub requires_data: bool,
}

impl OrderedRule {
    /// Creates a rule from phrases.
    #[must_use]
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            phrases: phrases.into_iter().map(Into::into).collect(),
            requires_data: false,
        }
    }

    /// Requires the matched row to be data-bearing.
    #[must_use]
    pub const fn with_data(mut self) -> Self {
        self.requires_data = true;
        self
    }

    /// Returns true if the phrases occur in order in `text`.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        let text = words(text);
        let mut rest = text.as_slice();
        for phrase in &self.phrases {
            let phrase = words(phrase);
            if phrase.is_empty() {
                continue;
            }
            match rest
                .windows(phrase.len())
                .position(|window| window == phrase.as_slice())
            {
                Some(at) => rest = &rest[at + phrase.len()..],
                None => return false,
            }
        }
        true
    }

    /// Returns true if the row satisfies both the phrases and the data requirement.
    #[must_use]
    pub fn accepts(&self, label: &str, data_bearing: bool) -> bool {
        (data_bearing || !self.requires_data) && self.matches(label)
    }
}

/// The complete rule set for balance sheet section markers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRules {
    /// Heading of the current assets block.
    pub current_assets: MatchRule,
    /// Total current assets.
    pub total_current_assets: MatchRule,
    /// Total assets.
    pub total_assets: MatchRule,
    /// Heading of the current liabilities block.
    pub current_liabilities: MatchRule,
    /// Total current liabilities.
    pub total_current_liabilities: MatchRule,
    /// Total liabilities.
    pub total_liabilities: MatchRule,
    /// Heading of the equity block.
    pub stockholders_equity: MatchRule,
    /// Total stockholders' equity.
    pub total_stockholders_equity: MatchRule,
    /// Grand total of liabilities and equity.
    pub total_liabilities_and_equity: OrderedRule,
}

/// Words that keep investment lines out of the equity markers.
const EQUITY_GUARD: [&str; 3] = ["Investment", "marketable", "securities"];

impl Default for ClassificationRules {
    fn default() -> Self {
        Self {
            current_assets: MatchRule::new(["Current Assets"]),
            total_current_assets: MatchRule::new(["Total Current Assets"]).with_data(),
            total_assets: MatchRule::new(["Total Assets"]).with_data(),
            current_liabilities: MatchRule::new(["Current Liabilities"]),
            total_current_liabilities: MatchRule::new(["Total Current Liabilities"]).with_data(),
            total_liabilities: MatchRule::new(["Total Liabilities"]).with_data(),
            // "Equity" alone is a catch-all; the guard list is known to be incomplete
            // (e.g. "Equity Method Investments" is only excluded via "Investment").
            stockholders_equity: MatchRule::new([
                "Stockholders' Equity",
                "Shareholders' Equity",
                "Shareowners' Equity",
                "Equity",
            ])
            .excluding(EQUITY_GUARD),
            total_stockholders_equity: MatchRule::new([
                "Total Stockholders' Equity",
                "Total Shareholders' Equity",
                "Total Shareowners' Equity",
                "Total Equity",
            ])
            .excluding(EQUITY_GUARD)
            .with_data(),
            total_liabilities_and_equity: OrderedRule::new(["Total Liabilities", "and", "Equity"])
                .with_data(),
        }
    }
}

impl ClassificationRules {
    /// Parses rules from JSON.
    ///
    /// # Errors
    /// Returns [`FilingError::Parse`] if the JSON does not describe a rule set.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| FilingError::Parse(format!("Failed to parse classification rules: {}", e)))
    }

    /// Reads rules from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            FilingError::InvalidParameter(format!("Cannot read rules {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Returns true if a row qualifies for `marker`.
    #[must_use]
    pub fn accepts(&self, marker: SectionMarker, label: &str, data_bearing: bool) -> bool {
        match marker {
            SectionMarker::CurrentAssets => self.current_assets.accepts(label, data_bearing),
            SectionMarker::TotalCurrentAssets => {
                self.total_current_assets.accepts(label, data_bearing)
            }
            SectionMarker::TotalAssets => self.total_assets.accepts(label, data_bearing),
            SectionMarker::CurrentLiabilities => {
                self.current_liabilities.accepts(label, data_bearing)
            }
            SectionMarker::TotalCurrentLiabilities => {
                self.total_current_liabilities.accepts(label, data_bearing)
            }
            SectionMarker::TotalLiabilities => self.total_liabilities.accepts(label, data_bearing),
            SectionMarker::StockholdersEquity => {
                self.stockholders_equity.accepts(label, data_bearing)
            }
            SectionMarker::TotalStockholdersEquity => {
                self.total_stockholders_equity.accepts(label, data_bearing)
            }
            SectionMarker::TotalLiabilitiesAndEquity => {
                self.total_liabilities_and_equity.accepts(label, data_bearing)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Total  Current\tAssets"), "totalcurrentassets");
        assert_eq!(normalize("Stockholders\u{2019} Equity"), "stockholders'equity");
    }

    #[test]
    fn test_match_rule_keywords_and_exclusions() {
        let rules = ClassificationRules::default();
        let equity = &rules.stockholders_equity;
        assert!(equity.matches("STOCKHOLDERS' EQUITY:"));
        assert!(equity.matches("Shareholders’ equity"));
        assert!(!equity.matches("Equity method investments"));
        assert!(!equity.matches("Marketable equity securities"));
    }

    #[test]
    fn test_data_requirement() {
        let rules = ClassificationRules::default();
        assert!(!rules.accepts(SectionMarker::TotalAssets, "Total assets", false));
        assert!(rules.accepts(SectionMarker::TotalAssets, "Total assets", true));
        assert!(rules.accepts(SectionMarker::CurrentAssets, "Current assets:", false));
    }

    #[test]
    fn test_ordered_rule() {
        let rule = OrderedRule::new(["Total Liabilities", "and", "Equity"]);
        assert!(rule.matches("Total liabilities and stockholders' equity"));
        assert!(rule.matches("TOTAL LIABILITIES, REDEEMABLE INTEREST AND EQUITY"));
        assert!(!rule.matches("Total equity and liabilities"));
        assert!(!rule.matches("Total liabilities"));
    }

    #[test]
    fn test_ordered_rule_phrases_do_not_overlap() {
        let rule = OrderedRule::new(["and", "and"]);
        assert!(!rule.matches("land and sea"));
        assert!(rule.matches("land and sea and air"));
    }

    #[test]
    fn test_ordered_rule_matches_whole_words() {
        let rule = OrderedRule::new(["Total Liabilities", "and", "Equity"]);
        assert!(!rule.matches("Total liabilities of land held for equity"));
        assert!(!rule.matches("Total liabilities andequity"));
        assert!(rule.matches("Total liabilities and stockholders\u{2019} equity:"));
        assert!(rule.matches("TOTAL LIABILITIES AND EQUITY"));
    }

    #[test]
    fn test_rules_json_roundtrip() {
        let rules = ClassificationRules::default();
        let json = serde_json::to_string(&rules).unwrap();
        assert_eq!(ClassificationRules::from_json(&json).unwrap(), rules);
    }

    #[test]
    fn test_rules_json_defaults_optional_fields() {
        let mut value = serde_json::to_value(ClassificationRules::default()).unwrap();
        value["total_assets"] = serde_json::json!({ "any_of": ["Assets, total"] });
        let rules = ClassificationRules::from_json(&value.to_string()).unwrap();
        assert!(rules.total_assets.none_of.is_empty());
        assert!(!rules.total_assets.requires_data);
        assert!(rules.total_assets.matches("Assets, Total"));
    }

    #[test]
    fn test_rules_invalid_json() {
        assert!(matches!(
            ClassificationRules::from_json("{\"current_assets\": 3}"),
            Err(FilingError::Parse(_))
        ));
    }
}
