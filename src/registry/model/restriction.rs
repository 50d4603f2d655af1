use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::RecordId;

/// A named, reusable restriction (legend) defined by an issuer.
#[derive(PartialEq, Eq, Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RestrictionTemplate {
    pub code: String,
    pub name: String,
    pub legend: String,
}

/// Binds a template to the shares one holder has of one security.
#[derive(PartialEq, Eq, Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppliedRestriction {
    pub shareholder_id: Option<RecordId>,
    #[serde(skip)]
    pub account_number: String,
    pub cusip: String,
    pub restriction_code: String,
    pub restricted_shares: u64,
}

// Legends for the single-letter codes that predate issuer-defined templates.
const FALLBACK_LEGENDS: [(&str, &str); 5] = [
    ("A", "Restricted securities under Rule 144 of the Securities Act of 1933"),
    ("B", "Control securities held by an affiliate of the issuer"),
    ("C", "Subject to a contractual lock-up agreement"),
    ("D", "Offered under Regulation S; no US transfer during distribution compliance period"),
    ("E", "Stop transfer order on file"),
];

/// Resolves restriction codes to legend text.
///
/// An issuer's own templates shadow the built-in single-letter legends.
pub struct RestrictionCatalog {
    templates: HashMap<String, RestrictionTemplate>,
}

impl RestrictionCatalog {
    pub fn new(templates: &[RestrictionTemplate]) -> RestrictionCatalog {
        RestrictionCatalog {
            templates: templates
                .iter()
                .map(|t| (t.code.trim().to_uppercase(), t.clone()))
                .collect(),
        }
    }

    pub fn legend_for(&self, code: &str) -> Option<String> {
        let key = code.trim().to_uppercase();
        if let Some(t) = self.templates.get(&key) {
            if !t.legend.trim().is_empty() {
                return Some(t.legend.clone());
            }
            if !t.name.trim().is_empty() {
                return Some(t.name.clone());
            }
        }
        FALLBACK_LEGENDS
            .iter()
            .find(|(c, _)| *c == key)
            .map(|(_, legend)| legend.to_string())
    }

    /// Codes referenced by transactions that neither the issuer nor the
    /// fallback table define.
    pub fn unknown_codes<'a, I: IntoIterator<Item = &'a str>>(&self, codes: I) -> Vec<String> {
        let mut unknown: Vec<String> = codes
            .into_iter()
            .filter(|c| !c.trim().is_empty() && self.legend_for(c).is_none())
            .map(|c| c.trim().to_string())
            .collect();
        unknown.sort();
        unknown.dedup();
        unknown
    }
}
