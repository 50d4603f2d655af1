use crate::util::date::format_ledger_date;

use super::{
    ledger::LedgerGroup,
    statement::{ControlBookRow, Statement},
};

/// A generic table, rendered by any of the output writers.
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct RenderTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub footer: Vec<String>,
    pub notes: Vec<String>,
    pub errors: Vec<String>,
}

fn strs(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

fn opt_date_str(d: &Option<time::Date>) -> String {
    d.as_ref().map(format_ledger_date).unwrap_or_default()
}

pub fn render_ledger_table(groups: &[LedgerGroup]) -> RenderTable {
    let rows = groups
        .iter()
        .map(|g| {
            vec![
                g.cusip.clone(),
                opt_date_str(&g.date),
                g.transaction_type.clone(),
                g.tx_count.to_string(),
                g.delta.to_string(),
                g.running_total.to_string(),
            ]
        })
        .collect();

    let mut notes = Vec::new();
    if groups.iter().any(|g| g.date.is_none()) {
        notes.push("Transactions without a date are listed first.".to_string());
    }

    RenderTable {
        header: strs(&["CUSIP", "Date", "Transaction Type", "Transactions", "Net Shares", "Outstanding"]),
        rows,
        footer: Vec::new(),
        notes,
        errors: Vec::new(),
    }
}

pub fn render_control_book(rows: &[ControlBookRow]) -> RenderTable {
    let opt = |v: Option<i64>| v.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string());
    let mut table = RenderTable {
        header: strs(&["CUSIP", "Issue", "Authorized", "Outstanding", "Unissued", "Transactions"]),
        ..RenderTable::default()
    };
    for r in rows {
        table.rows.push(vec![
            r.cusip.clone(),
            r.issue_name.clone(),
            opt(r.authorized.and_then(|a| i64::try_from(a).ok())),
            r.outstanding.to_string(),
            opt(r.unissued),
            r.tx_count.to_string(),
        ]);
        if r.unissued.map_or(false, |u| u < 0) {
            table.errors.push(format!(
                "{} has more shares outstanding than authorized",
                r.cusip
            ));
        }
    }
    let total: i64 = rows.iter().map(|r| r.outstanding).sum();
    table.footer = vec![
        String::new(),
        String::new(),
        "Total".to_string(),
        total.to_string(),
        String::new(),
        String::new(),
    ];
    table
}

pub fn render_statement_positions(st: &Statement) -> RenderTable {
    RenderTable {
        header: strs(&["CUSIP", "Shares"]),
        rows: st
            .positions
            .iter()
            .map(|p| vec![p.cusip.clone(), p.shares.to_string()])
            .collect(),
        notes: vec![format!("Holder id: {}", st.shareholder_id)],
        ..RenderTable::default()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        registry::{ledger::LedgerGroup, statement::ControlBookRow},
        util::date::pub_testlib::ymd,
    };

    use super::{render_control_book, render_ledger_table};

    #[test]
    fn test_render_ledger_table() {
        let table = render_ledger_table(&[LedgerGroup {
            cusip: "123456789".to_string(),
            date: Some(ymd(2024, 1, 1)),
            transaction_type: "IPO".to_string(),
            delta: 1000,
            tx_count: 1,
            running_total: 1000,
        }]);
        assert_eq!(table.header.len(), 6);
        assert_eq!(
            table.rows,
            vec![vec!["123456789", "01/01/2024", "IPO", "1", "1000", "1000"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<String>>()]
        );
        assert!(table.notes.is_empty());
    }

    #[test]
    fn test_render_control_book_over_issued() {
        let table = render_control_book(&[ControlBookRow {
            cusip: "A".to_string(),
            issue_name: "Common".to_string(),
            authorized: Some(10),
            outstanding: 12,
            unissued: Some(-2),
            tx_count: 3,
        }]);
        assert_eq!(table.rows[0][4], "-2");
        assert_eq!(table.errors.len(), 1);
        assert_eq!(table.footer[3], "12");
    }
}
