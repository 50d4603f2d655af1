use serde::{Deserialize, Serialize};
use time::Date;

use super::tx::{SourceRef, TransferTx};

/// A row of a record-keeping book, kept as the book wrote it.
///
/// The same row also yields a `TransferTx` and a `Shareholder`; this copy
/// preserves the denormalized view for the record-keeping summary.
#[derive(PartialEq, Eq, Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordkeepingEntry {
    pub cusip: String,
    pub issue_name: String,
    pub security_type: String,
    pub account_number: String,
    pub shareholder_name: String,
    pub transaction_type: String,
    pub credit_debit: String,
    pub quantity: u64,
    #[serde(with = "crate::util::date::ledger_date_opt")]
    pub transaction_date: Option<Date>,
    pub certificate_type: String,
    pub notes: String,

    #[serde(skip)]
    pub source: SourceRef,
}

impl RecordkeepingEntry {
    pub fn from_tx(tx: &TransferTx, shareholder_name: &str, credit_debit_cell: &str) -> Self {
        RecordkeepingEntry {
            cusip: tx.cusip.clone(),
            issue_name: tx.issue_name.clone(),
            security_type: tx.security_type.clone(),
            account_number: tx.account_number.clone(),
            shareholder_name: shareholder_name.to_string(),
            transaction_type: tx.transaction_type.to_string(),
            credit_debit: if credit_debit_cell.trim().is_empty() {
                tx.credit_debit.to_string()
            } else {
                credit_debit_cell.trim().to_string()
            },
            quantity: tx.quantity,
            transaction_date: tx.transaction_date,
            certificate_type: tx.certificate_type.clone(),
            notes: tx.notes.clone(),
            source: tx.source.clone(),
        }
    }
}
