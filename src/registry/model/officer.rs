use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(PartialEq, Eq, Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Officer {
    pub name: String,
    pub title: String,
    pub email: String,
    pub phone: String,
    /// Percent of the issuer's shares held, to one decimal place.
    pub ownership_percent: Option<Decimal>,
}
