use std::fmt::Display;

use serde::{Deserialize, Serialize};
use time::Date;

use crate::util::basic::fold_str;

use super::RecordId;

/// The kind of transfer-journal entry.
///
/// Direction is a property of the type (see `is_credit`). The explicit
/// credit/debit column found in spreadsheets is only checked against it.
#[derive(PartialEq, Eq, Hash, Clone, Debug, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TxType {
    Ipo,
    DwacDeposit,
    DwacWithdrawal,
    TransferCredit,
    TransferDebit,
    Other(String),
}

impl TxType {
    pub fn parse(s: &str) -> TxType {
        match fold_str(s).as_str() {
            "ipo" => TxType::Ipo,
            "dwac deposit" => TxType::DwacDeposit,
            "dwac withdrawal" => TxType::DwacWithdrawal,
            "transfer credit" => TxType::TransferCredit,
            "transfer debit" => TxType::TransferDebit,
            _ => TxType::Other(s.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TxType::Ipo => "IPO",
            TxType::DwacDeposit => "DWAC Deposit",
            TxType::DwacWithdrawal => "DWAC Withdrawal",
            TxType::TransferCredit => "Transfer Credit",
            TxType::TransferDebit => "Transfer Debit",
            TxType::Other(s) => s.as_str(),
        }
    }

    /// Only withdrawals at the custodian and transfer debits remove shares.
    pub fn is_credit(&self) -> bool {
        !matches!(self, TxType::DwacWithdrawal | TxType::TransferDebit)
    }

    pub fn direction(&self) -> CreditDebit {
        if self.is_credit() {
            CreditDebit::Credit
        } else {
            CreditDebit::Debit
        }
    }
}

impl Default for TxType {
    fn default() -> Self {
        TxType::Other(String::new())
    }
}

impl From<String> for TxType {
    fn from(value: String) -> Self {
        TxType::parse(&value)
    }
}

impl From<TxType> for String {
    fn from(value: TxType) -> Self {
        value.as_str().to_string()
    }
}

impl Display for TxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub enum CreditDebit {
    #[default]
    Credit,
    Debit,
}

impl CreditDebit {
    /// Reads the free-text credit/debit column. None if it says neither.
    pub fn parse(s: &str) -> Option<CreditDebit> {
        match fold_str(s).as_str() {
            "credit" | "cr" | "c" | "+" => Some(CreditDebit::Credit),
            "debit" | "dr" | "d" | "-" => Some(CreditDebit::Debit),
            _ => None,
        }
    }

    pub fn sign(&self) -> i64 {
        match self {
            CreditDebit::Credit => 1,
            CreditDebit::Debit => -1,
        }
    }
}

impl Display for CreditDebit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Where in the workbook an imported row came from.
/// Spreadsheet-style 1-based row number.
#[derive(PartialEq, Eq, Hash, Clone, Debug, Default)]
pub struct SourceRef {
    pub sheet: String,
    pub row: usize,
}

impl Display for SourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}!{}", self.sheet, self.row)
    }
}

/// A transfer-journal entry: shares credited to or debited from one
/// holder, for one security. Never negative; direction comes from the type.
#[derive(PartialEq, Eq, Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferTx {
    pub cusip: String,
    pub issue_name: String,
    pub security_type: String,
    pub issuance_type: String,
    pub ticker: String,
    pub trading_platform: String,

    /// Filled in once the holder has been saved. Until then the holder is
    /// only known by `account_number`.
    pub shareholder_id: Option<RecordId>,
    #[serde(skip)]
    pub account_number: String,
    /// `Shareholder::natural_key` of the holder named on the same row.
    /// Empty if the row named none.
    #[serde(skip)]
    pub holder_key: String,

    pub transaction_type: TxType,
    pub credit_debit: CreditDebit,
    pub quantity: u64,
    #[serde(with = "crate::util::date::ledger_date_opt")]
    pub transaction_date: Option<Date>,
    pub certificate_type: String,
    pub status: String,
    pub notes: String,
    pub restriction_code: String,

    #[serde(skip)]
    pub source: SourceRef,
}

impl TransferTx {
    pub fn is_credit(&self) -> bool {
        self.transaction_type.is_credit()
    }

    /// Key to find the saved holder by. Rows built without a holder key
    /// fall back to the account number.
    pub fn holder_lookup_key(&self) -> &str {
        if self.holder_key.is_empty() {
            self.account_number.trim()
        } else {
            &self.holder_key
        }
    }

    pub fn signed_quantity(&self) -> i64 {
        let qty = i64::try_from(self.quantity).unwrap_or(i64::MAX);
        self.transaction_type.direction().sign() * qty
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::util::date::pub_testlib::ymd;

    use super::{CreditDebit, TransferTx, TxType};

    #[test]
    fn test_tx_type_parse() {
        assert_eq!(TxType::parse(" ipo "), TxType::Ipo);
        assert_eq!(TxType::parse("DWAC WITHDRAWAL"), TxType::DwacWithdrawal);
        assert_eq!(TxType::parse("Transfer Debit"), TxType::TransferDebit);
        assert_eq!(
            TxType::parse("Reverse Split"),
            TxType::Other("Reverse Split".to_string())
        );
    }

    #[test]
    fn test_is_credit() {
        assert!(TxType::Ipo.is_credit());
        assert!(TxType::DwacDeposit.is_credit());
        assert!(TxType::TransferCredit.is_credit());
        assert!(TxType::parse("Cancellation").is_credit());
        assert!(!TxType::DwacWithdrawal.is_credit());
        assert!(!TxType::TransferDebit.is_credit());
    }

    #[test]
    fn test_credit_debit_parse() {
        assert_eq!(CreditDebit::parse("Credit"), Some(CreditDebit::Credit));
        assert_eq!(CreditDebit::parse(" DR "), Some(CreditDebit::Debit));
        assert_eq!(CreditDebit::parse("maybe"), None);
        assert_eq!(CreditDebit::parse(""), None);
    }

    #[test]
    fn test_signed_quantity() {
        let tx = TransferTx {
            transaction_type: TxType::TransferDebit,
            quantity: 30,
            // Ignored. The type decides.
            credit_debit: CreditDebit::Credit,
            ..TransferTx::default()
        };
        assert_eq!(tx.signed_quantity(), -30);

        let tx = TransferTx { transaction_type: TxType::Ipo, quantity: 100, ..tx };
        assert_eq!(tx.signed_quantity(), 100);
    }

    #[test]
    fn test_holder_lookup_key() {
        let tx = TransferTx { account_number: " ACC-1 ".to_string(), ..TransferTx::default() };
        assert_eq!(tx.holder_lookup_key(), "ACC-1");

        let tx = TransferTx { holder_key: "name:jane roe".to_string(), ..TransferTx::default() };
        assert_eq!(tx.holder_lookup_key(), "name:jane roe");
    }

    #[test]
    fn test_serde_shape() {
        let tx = TransferTx {
            cusip: "123456789".to_string(),
            account_number: "ACC-1".to_string(),
            transaction_type: TxType::DwacDeposit,
            credit_debit: CreditDebit::Credit,
            quantity: 5,
            transaction_date: Some(ymd(2024, 1, 2)),
            notes: "NIL".to_string(),
            ..TransferTx::default()
        };
        let v = serde_json::to_value(&tx).unwrap();
        assert_eq!(v["transaction_type"], json!("DWAC Deposit"));
        assert_eq!(v["credit_debit"], json!("Credit"));
        assert_eq!(v["transaction_date"], json!("01/02/2024"));
        assert_eq!(v["shareholder_id"], json!(null));
        assert!(v.get("account_number").is_none());
        assert!(v.get("holder_key").is_none());

        let back: TransferTx = serde_json::from_value(v).unwrap();
        assert_eq!(back.transaction_date, Some(ymd(2024, 1, 2)));
        assert_eq!(back.transaction_type, TxType::DwacDeposit);
        assert_eq!(back.account_number, "");
    }
}
