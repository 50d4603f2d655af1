use serde::{Deserialize, Serialize};

use super::merge_str;

/// A holder of record. `account_number` is the natural key within an
/// issuer, and is what transactions refer to before ids exist.
#[derive(PartialEq, Eq, Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Shareholder {
    pub account_number: String,
    /// Registration name, as written on the certificate.
    pub name: String,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub address1: String,
    pub address2: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
    pub tax_id: String,
    pub email: String,
    pub phone: String,
    pub holder_type: String,
    pub ofac_status: String,
}

impl Shareholder {
    pub fn display_name(&self) -> String {
        if !self.name.trim().is_empty() {
            return self.name.trim().to_string();
        }
        [&self.first_name, &self.middle_name, &self.last_name]
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<&str>>()
            .join(" ")
    }

    /// Key used to correlate this holder before the backend assigns an id.
    pub fn natural_key(&self) -> String {
        let acct = self.account_number.trim();
        if acct.is_empty() {
            format!("name:{}", self.display_name().to_lowercase())
        } else {
            acct.to_string()
        }
    }

    pub fn merge_from(&mut self, other: Shareholder) {
        merge_str(&mut self.name, other.name);
        merge_str(&mut self.first_name, other.first_name);
        merge_str(&mut self.middle_name, other.middle_name);
        merge_str(&mut self.last_name, other.last_name);
        merge_str(&mut self.address1, other.address1);
        merge_str(&mut self.address2, other.address2);
        merge_str(&mut self.city, other.city);
        merge_str(&mut self.state, other.state);
        merge_str(&mut self.zip, other.zip);
        merge_str(&mut self.country, other.country);
        merge_str(&mut self.tax_id, other.tax_id);
        merge_str(&mut self.email, other.email);
        merge_str(&mut self.phone, other.phone);
        merge_str(&mut self.holder_type, other.holder_type);
        merge_str(&mut self.ofac_status, other.ofac_status);
    }
}

#[cfg(test)]
mod tests {
    use super::Shareholder;

    #[test]
    fn test_display_name() {
        let sh = Shareholder {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            ..Shareholder::default()
        };
        assert_eq!(sh.display_name(), "Ada Lovelace");

        let sh = Shareholder { name: "Cede & Co".to_string(), ..sh };
        assert_eq!(sh.display_name(), "Cede & Co");
    }

    #[test]
    fn test_natural_key() {
        let sh = Shareholder {
            account_number: " ACC-1 ".to_string(),
            ..Shareholder::default()
        };
        assert_eq!(sh.natural_key(), "ACC-1");

        let sh = Shareholder { name: "Jane Roe".to_string(), ..Shareholder::default() };
        assert_eq!(sh.natural_key(), "name:jane roe");
    }
}
