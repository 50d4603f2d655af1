use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{merge_str, RecordId};

/// The tenant company. Every other entity is owned by one issuer.
#[derive(PartialEq, Eq, Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Issuer {
    pub name: String,
    pub display_name: String,
    pub address: String,
    pub telephone: String,
    pub tax_id: String,
    pub incorporation: String,
    pub regulatory_notes: String,
    /// Rows of the issuer sheet we had no column for, kept verbatim.
    pub additional_info: BTreeMap<String, String>,
}

impl Issuer {
    pub fn merge_from(&mut self, other: Issuer) {
        merge_str(&mut self.name, other.name);
        merge_str(&mut self.display_name, other.display_name);
        merge_str(&mut self.address, other.address);
        merge_str(&mut self.telephone, other.telephone);
        merge_str(&mut self.tax_id, other.tax_id);
        merge_str(&mut self.incorporation, other.incorporation);
        merge_str(&mut self.regulatory_notes, other.regulatory_notes);
        self.additional_info.extend(other.additional_info);
    }
}

/// An issuer as it exists in the backend.
#[derive(PartialEq, Eq, Clone, Debug, Serialize, Deserialize)]
pub struct StoredIssuer {
    pub id: RecordId,
    #[serde(flatten)]
    pub issuer: Issuer,
}
