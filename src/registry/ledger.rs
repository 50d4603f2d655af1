use std::collections::BTreeMap;

use time::Date;

use super::{RecordId, TransferTx};

/// Net movement of one security on one date, for one transaction type.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct LedgerGroup {
    pub cusip: String,
    pub date: Option<Date>,
    pub transaction_type: String,
    /// Sum of signed quantities in the group.
    pub delta: i64,
    pub tx_count: usize,
    /// Outstanding balance of `cusip` after this group is applied. Only
    /// covers transactions that made it through the filter.
    pub running_total: i64,
}

/// Restricts which transactions enter the ledger.
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct LedgerFilter {
    pub cusip: Option<String>,
    /// Inclusive
    pub from: Option<Date>,
    /// Inclusive
    pub to: Option<Date>,
    pub shareholder_id: Option<RecordId>,
}

impl LedgerFilter {
    pub fn matches(&self, tx: &TransferTx) -> bool {
        if let Some(cusip) = &self.cusip {
            if !tx.cusip.trim().eq_ignore_ascii_case(cusip.trim()) {
                return false;
            }
        }
        if let Some(sh) = &self.shareholder_id {
            if tx.shareholder_id.as_ref() != Some(sh) {
                return false;
            }
        }
        if self.from.is_some() || self.to.is_some() {
            // An undated transaction can't be placed inside any range.
            let date = match tx.transaction_date {
                Some(d) => d,
                None => return false,
            };
            if self.from.map_or(false, |from| date < from) {
                return false;
            }
            if self.to.map_or(false, |to| date > to) {
                return false;
            }
        }
        true
    }
}

type GroupKey = (String, Option<Date>, String);

/// Adds a signed share count to a total. Quantities are only bounded by
/// `i64`, so a sum can overflow; it is clamped and logged instead.
pub fn add_shares(total: i64, qty: i64) -> i64 {
    total.checked_add(qty).unwrap_or_else(|| {
        tracing::warn!("Share total overflowed adding {qty} to {total}. Clamping");
        total.saturating_add(qty)
    })
}

/// Groups transactions by (security, date, transaction type), and walks
/// each security's groups in order keeping a running balance.
///
/// Groups are ordered by CUSIP, then date (undated first), then type name,
/// which is a total order, so the output doesn't depend on input order.
pub fn aggregate_ledger(txs: &[TransferTx]) -> Vec<LedgerGroup> {
    let mut sums = BTreeMap::<GroupKey, (i64, usize)>::new();
    for tx in txs {
        let key = (
            tx.cusip.trim().to_string(),
            tx.transaction_date,
            tx.transaction_type.as_str().to_string(),
        );
        let entry = sums.entry(key).or_insert((0, 0));
        entry.0 = add_shares(entry.0, tx.signed_quantity());
        entry.1 += 1;
    }

    let mut groups = Vec::with_capacity(sums.len());
    let mut current_cusip: Option<String> = None;
    let mut running_total: i64 = 0;
    for ((cusip, date, transaction_type), (delta, tx_count)) in sums {
        if current_cusip.as_ref() != Some(&cusip) {
            running_total = 0;
            current_cusip = Some(cusip.clone());
        }
        running_total = add_shares(running_total, delta);
        groups.push(LedgerGroup {
            cusip,
            date,
            transaction_type,
            delta,
            tx_count,
            running_total,
        });
    }
    groups
}

/// Applies `filter` before grouping, so running totals reflect only the
/// filtered subset. Exports rely on the numbers matching what's displayed.
pub fn filtered_ledger(txs: &[TransferTx], filter: &LedgerFilter) -> Vec<LedgerGroup> {
    let selected: Vec<TransferTx> =
        txs.iter().filter(|tx| filter.matches(tx)).cloned().collect();
    aggregate_ledger(&selected)
}

/// Final balance per CUSIP, from a ledger produced by `aggregate_ledger`.
pub fn closing_balances(groups: &[LedgerGroup]) -> BTreeMap<String, i64> {
    let mut balances = BTreeMap::new();
    for g in groups {
        balances.insert(g.cusip.clone(), g.running_total);
    }
    balances
}
