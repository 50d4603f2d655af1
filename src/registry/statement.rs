use std::collections::BTreeMap;

use super::{
    ledger::{add_shares, filtered_ledger, LedgerFilter, LedgerGroup},
    RecordId, Security, TransferTx,
};

/// One line of the control book: how much of a security is authorized
/// versus actually outstanding on the transfer journal.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct ControlBookRow {
    pub cusip: String,
    pub issue_name: String,
    pub authorized: Option<u64>,
    pub outstanding: i64,
    /// None when the authorized count is unknown, or too large to compare.
    pub unissued: Option<i64>,
    pub tx_count: usize,
}

pub fn control_book(securities: &[Security], txs: &[TransferTx]) -> Vec<ControlBookRow> {
    let mut rows = BTreeMap::<String, ControlBookRow>::new();
    for sec in securities {
        let cusip = sec.cusip.trim().to_string();
        rows.insert(
            cusip.clone(),
            ControlBookRow {
                cusip,
                issue_name: sec.issue_name.clone(),
                authorized: sec.total_authorized_shares,
                outstanding: 0,
                unissued: None,
                tx_count: 0,
            },
        );
    }

    for tx in txs {
        let cusip = tx.cusip.trim().to_string();
        let row = rows.entry(cusip.clone()).or_insert_with(|| ControlBookRow {
            cusip,
            issue_name: tx.issue_name.clone(),
            authorized: None,
            outstanding: 0,
            unissued: None,
            tx_count: 0,
        });
        row.outstanding = add_shares(row.outstanding, tx.signed_quantity());
        row.tx_count += 1;
    }

    rows.into_values()
        .map(|mut row| {
            row.unissued = row
                .authorized
                .and_then(|a| i64::try_from(a).ok())
                .and_then(|a| a.checked_sub(row.outstanding));
            row
        })
        .collect()
}

/// Shares one holder has of one security.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Position {
    pub shareholder_id: Option<RecordId>,
    pub cusip: String,
    pub shares: i64,
}

/// Net holdings for every (holder, security) pair seen in `txs`, ordered by
/// holder id then CUSIP. Transactions that never got linked to a holder are
/// reported together under a `None` holder.
pub fn holder_positions(txs: &[TransferTx]) -> Vec<Position> {
    let mut sums = BTreeMap::<(String, String), (Option<RecordId>, i64)>::new();
    for tx in txs {
        let holder_key = tx
            .shareholder_id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_default();
        let entry = sums
            .entry((holder_key, tx.cusip.trim().to_string()))
            .or_insert((tx.shareholder_id.clone(), 0));
        entry.1 = add_shares(entry.1, tx.signed_quantity());
    }
    sums.into_iter()
        .map(|((_, cusip), (shareholder_id, shares))| Position { shareholder_id, cusip, shares })
        .collect()
}

/// Everything a holder statement shows.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Statement {
    pub shareholder_id: RecordId,
    pub positions: Vec<Position>,
    pub ledger: Vec<LedgerGroup>,
}

/// `filter.shareholder_id` is replaced by `shareholder_id`. Positions are
/// computed from the same filtered set as the ledger, so they agree with it.
pub fn shareholder_statement(
    txs: &[TransferTx],
    shareholder_id: &RecordId,
    filter: &LedgerFilter,
) -> Statement {
    let filter = LedgerFilter {
        shareholder_id: Some(shareholder_id.clone()),
        ..filter.clone()
    };
    let selected: Vec<TransferTx> =
        txs.iter().filter(|tx| filter.matches(tx)).cloned().collect();
    Statement {
        shareholder_id: shareholder_id.clone(),
        positions: holder_positions(&selected),
        ledger: filtered_ledger(&selected, &LedgerFilter::default()),
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        registry::{ledger::LedgerFilter, RecordId, Security, TransferTx, TxType},
        util::date::pub_testlib::ymd,
    };

    use super::{control_book, holder_positions, shareholder_statement, ControlBookRow};

    fn tx(cusip: &str, holder: Option<i64>, tt: TxType, qty: u64, day: u8) -> TransferTx {
        TransferTx {
            cusip: cusip.to_string(),
            shareholder_id: holder.map(RecordId::from),
            transaction_type: tt,
            quantity: qty,
            transaction_date: Some(ymd(2024, 1, day)),
            ..TransferTx::default()
        }
    }

    #[test]
    fn test_control_book() {
        let secs = vec![
            Security {
                cusip: "A".to_string(),
                issue_name: "Common".to_string(),
                total_authorized_shares: Some(1000),
                ..Security::default()
            },
            Security { cusip: "Z".to_string(), ..Security::default() },
        ];
        let txs = vec![
            tx("A", Some(1), TxType::Ipo, 300, 1),
            tx("A", Some(1), TxType::TransferDebit, 50, 2),
            tx("B", Some(2), TxType::Ipo, 10, 1),
        ];
        let rows = control_book(&secs, &txs);
        assert_eq!(
            rows,
            vec![
                ControlBookRow {
                    cusip: "A".to_string(),
                    issue_name: "Common".to_string(),
                    authorized: Some(1000),
                    outstanding: 250,
                    unissued: Some(750),
                    tx_count: 2,
                },
                ControlBookRow {
                    cusip: "B".to_string(),
                    issue_name: String::new(),
                    authorized: None,
                    outstanding: 10,
                    unissued: None,
                    tx_count: 1,
                },
                ControlBookRow {
                    cusip: "Z".to_string(),
                    issue_name: String::new(),
                    authorized: None,
                    outstanding: 0,
                    unissued: None,
                    tx_count: 0,
                },
            ]
        );
    }

    #[test]
    fn test_control_book_huge_quantities() {
        let secs = vec![Security {
            cusip: "A".to_string(),
            total_authorized_shares: Some(u64::MAX),
            ..Security::default()
        }];
        let big = 9_000_000_000_000_000;
        let txs = vec![
            tx("A", Some(1), TxType::Ipo, big, 1),
            tx("A", Some(1), TxType::Ipo, big, 2),
            tx("A", Some(2), TxType::TransferDebit, big, 3),
        ];
        let rows = control_book(&secs, &txs);
        assert_eq!(rows[0].outstanding, i64::MAX - big as i64);
        assert_eq!(rows[0].unissued, None);

        let positions = holder_positions(&txs[..2]);
        assert_eq!(positions[0].shares, i64::MAX);
    }

    #[test]
    fn test_holder_positions() {
        let txs = vec![
            tx("A", Some(1), TxType::Ipo, 100, 1),
            tx("A", Some(1), TxType::TransferDebit, 40, 2),
            tx("A", Some(2), TxType::TransferCredit, 40, 2),
            tx("A", None, TxType::Ipo, 5, 3),
        ];
        let positions = holder_positions(&txs);
        assert_eq!(positions.len(), 3);
        assert_eq!(positions[0].shareholder_id, None);
        assert_eq!(positions[0].shares, 5);
        assert_eq!(positions[1].shareholder_id, Some(RecordId::from(1)));
        assert_eq!(positions[1].shares, 60);
        assert_eq!(positions[2].shares, 40);
    }

    #[test]
    fn test_shareholder_statement() {
        let txs = vec![
            tx("A", Some(1), TxType::Ipo, 100, 1),
            tx("B", Some(1), TxType::Ipo, 7, 1),
            tx("A", Some(2), TxType::Ipo, 100, 1),
            tx("A", Some(1), TxType::TransferDebit, 40, 5),
        ];
        let filter = LedgerFilter { cusip: Some("A".to_string()), ..LedgerFilter::default() };
        let st = shareholder_statement(&txs, &RecordId::from(1), &filter);
        assert_eq!(st.positions.len(), 1);
        assert_eq!(st.positions[0].shares, 60);
        assert_eq!(st.ledger.len(), 2);
        assert_eq!(st.ledger[1].running_total, 60);
    }
}
