use std::collections::{BTreeMap, HashMap};

use crate::registry::{
    ledger::add_shares, AppliedRestriction, Issuer, Officer, RecordkeepingEntry,
    RestrictionCatalog, RestrictionTemplate, Security, Shareholder, TransferTx,
};

use super::{
    classify::{classify_workbook, ClassifyOptions},
    extract::{extract_sheet, SheetExtract, SheetRow},
    DataQualityWarning, SheetParseError, Workbook,
};

/// Everything parsed out of one workbook, independent of how its sheets were
/// laid out.
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct ImportBatch {
    pub issuer: Option<Issuer>,
    /// Unique by CUSIP.
    pub securities: Vec<Security>,
    pub officers: Vec<Officer>,
    /// Not deduplicated. The same account shows up once per sheet it
    /// appears in.
    pub shareholders: Vec<Shareholder>,
    pub transactions: Vec<TransferTx>,
    pub recordkeeping: Vec<RecordkeepingEntry>,
    pub restrictions: Vec<RestrictionTemplate>,
    pub applied_restrictions: Vec<AppliedRestriction>,

    pub warnings: Vec<DataQualityWarning>,
    pub errors: Vec<SheetParseError>,
}

impl ImportBatch {
    pub fn counts(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("Issuer", self.issuer.iter().count()),
            ("Securities", self.securities.len()),
            ("Officers", self.officers.len()),
            ("Shareholders", self.shareholders.len()),
            ("Transactions", self.transactions.len()),
            ("Restrictions", self.restrictions.len()),
            ("Applied Restrictions", self.applied_restrictions.len()),
            ("Record-keeping Entries", self.recordkeeping.len()),
        ]
    }
}

#[derive(Default)]
pub struct BatchBuilder {
    batch: ImportBatch,
    security_index: HashMap<String, usize>,
}

impl BatchBuilder {
    pub fn new() -> BatchBuilder {
        BatchBuilder::default()
    }

    pub fn add_row(&mut self, row: SheetRow) {
        match row {
            SheetRow::Issuer(issuer) => match &mut self.batch.issuer {
                Some(existing) => existing.merge_from(issuer),
                None => self.batch.issuer = Some(issuer),
            },
            SheetRow::Security(sec) => self.add_security(sec),
            SheetRow::Officer(o) => self.batch.officers.push(o),
            SheetRow::Shareholder(sh) => self.batch.shareholders.push(sh),
            SheetRow::Transaction(tx) => self.batch.transactions.push(tx),
            SheetRow::Recordkeeping(e) => self.batch.recordkeeping.push(e),
            SheetRow::Restriction(r) => self.batch.restrictions.push(r),
        }
    }

    /// The first row for a CUSIP fixes its position. Later rows overwrite
    /// whatever fields they fill in.
    fn add_security(&mut self, sec: Security) {
        match self.security_index.get(&sec.cusip) {
            Some(&i) => self.batch.securities[i].merge_from(sec),
            None => {
                self.security_index
                    .insert(sec.cusip.clone(), self.batch.securities.len());
                self.batch.securities.push(sec);
            }
        }
    }

    pub fn add_extract(&mut self, extract: SheetExtract) {
        for row in extract.rows {
            self.add_row(row);
        }
        self.batch.warnings.extend(extract.warnings);
        self.batch.errors.extend(extract.errors);
    }

    pub fn finish(mut self) -> ImportBatch {
        self.batch.applied_restrictions = derive_applied_restrictions(&self.batch.transactions);

        let catalog = RestrictionCatalog::new(&self.batch.restrictions);
        let unknown = catalog.unknown_codes(
            self.batch.transactions.iter().map(|tx| tx.restriction_code.as_str()),
        );
        for code in unknown {
            if let Some(tx) = self
                .batch
                .transactions
                .iter()
                .find(|tx| tx.restriction_code.trim() == code)
            {
                self.batch.warnings.push(DataQualityWarning::new(
                    &tx.source.sheet,
                    tx.source.row,
                    format!("Restriction code {code:?} has no legend"),
                ));
            }
        }
        self.batch
    }
}

/// Restricted shares per (account, CUSIP, code): the net quantity of the
/// transactions that carried the code. Holdings that net to zero or less
/// are no longer restricted.
pub fn derive_applied_restrictions(txs: &[TransferTx]) -> Vec<AppliedRestriction> {
    let mut sums = BTreeMap::<(String, String, String), i64>::new();
    for tx in txs {
        let code = tx.restriction_code.trim();
        if code.is_empty() {
            continue;
        }
        let sum = sums
            .entry((tx.account_number.clone(), tx.cusip.clone(), code.to_string()))
            .or_insert(0);
        *sum = add_shares(*sum, tx.signed_quantity());
    }
    sums.into_iter()
        .filter(|(_, qty)| *qty > 0)
        .map(|((account_number, cusip, restriction_code), qty)| AppliedRestriction {
            shareholder_id: None,
            account_number,
            cusip,
            restriction_code,
            restricted_shares: qty.unsigned_abs(),
        })
        .collect()
}

/// Classifies every sheet and runs each matching extractor over it.
pub fn parse_workbook(wb: &Workbook, opts: &ClassifyOptions) -> ImportBatch {
    let mut builder = BatchBuilder::new();
    for plan in classify_workbook(wb, opts) {
        let sheet = &wb.sheets[plan.sheet_index];
        for category in plan.categories {
            tracing::debug!("Extracting {:?} rows from sheet {:?}", category, sheet.name);
            builder.add_extract(extract_sheet(sheet, category));
        }
    }
    let batch = builder.finish();
    tracing::info!(
        "Parsed {:?}: {}",
        wb.file_name,
        batch
            .counts()
            .iter()
            .map(|(name, n)| format!("{name}={n}"))
            .collect::<Vec<String>>()
            .join(" ")
    );
    batch
}

#[cfg(test)]
mod tests {
    use crate::{
        registry::{Security, Shareholder, TransferTx, TxType},
        testlib::grid,
        util::date::pub_testlib::ymd,
        workbook::{classify::ClassifyOptions, extract::SheetRow, Sheet, Workbook},
    };

    use super::{derive_applied_restrictions, parse_workbook, BatchBuilder};

    fn sheet(name: &str, rows: &[&[&str]]) -> Sheet {
        Sheet::new(name, grid(rows))
    }

    #[test]
    fn test_security_dedup_last_write_wins() {
        let mut b = BatchBuilder::new();
        b.add_row(SheetRow::Security(Security {
            cusip: "123456789".to_string(),
            issue_name: "Common".to_string(),
            ticker: "ACME".to_string(),
            ..Security::default()
        }));
        b.add_row(SheetRow::Security(Security {
            cusip: "999999999".to_string(),
            ..Security::default()
        }));
        b.add_row(SheetRow::Security(Security {
            cusip: "123456789".to_string(),
            issue_name: "Common Stock".to_string(),
            ..Security::default()
        }));
        let batch = b.finish();
        assert_eq!(batch.securities.len(), 2);
        assert_eq!(batch.securities[0].issue_name, "Common Stock");
        assert_eq!(batch.securities[0].ticker, "ACME");
    }

    #[test]
    fn test_shareholders_not_deduped() {
        let mut b = BatchBuilder::new();
        for _ in 0..2 {
            b.add_row(SheetRow::Shareholder(Shareholder {
                account_number: "ACC-1".to_string(),
                ..Shareholder::default()
            }));
        }
        assert_eq!(b.finish().shareholders.len(), 2);
    }

    #[test]
    fn test_applied_restrictions() {
        let tx = |acct: &str, tt: TxType, qty: u64, code: &str| TransferTx {
            account_number: acct.to_string(),
            cusip: "C".to_string(),
            transaction_type: tt,
            quantity: qty,
            restriction_code: code.to_string(),
            ..TransferTx::default()
        };
        let applied = derive_applied_restrictions(&[
            tx("A", TxType::Ipo, 100, "A"),
            tx("A", TxType::TransferDebit, 40, "A"),
            tx("A", TxType::Ipo, 5, ""),
            tx("B", TxType::Ipo, 10, "C"),
            tx("B", TxType::TransferDebit, 10, "C"),
        ]);
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].account_number, "A");
        assert_eq!(applied[0].restricted_shares, 60);
    }

    #[test]
    fn test_parse_two_sheet_workbook() {
        let wb = Workbook {
            file_name: "acme.xlsx".to_string(),
            fingerprint: String::new(),
            sheets: vec![
                sheet("Issuer Info", &[&["Issuer Name", "Acme Corp"]]),
                sheet(
                    "Transfers",
                    &[
                        &[
                            "Cusip", "Transaction Type", "Credit/Debit", "Quantity",
                            "Transaction Date", "Account",
                        ],
                        &["123456789", "IPO", "Credit", "1000", "01/01/2024", "ACC-1"],
                    ],
                ),
            ],
        };
        let batch = parse_workbook(&wb, &ClassifyOptions::default());
        assert_eq!(batch.issuer.as_ref().map(|i| i.name.as_str()), Some("Acme Corp"));
        assert_eq!(batch.securities.len(), 1);
        assert_eq!(batch.securities[0].cusip, "123456789");
        assert_eq!(batch.shareholders.len(), 1);
        assert_eq!(batch.shareholders[0].account_number, "ACC-1");
        assert_eq!(batch.transactions.len(), 1);
        assert_eq!(batch.transactions[0].signed_quantity(), 1000);
        assert_eq!(batch.transactions[0].transaction_date, Some(ymd(2024, 1, 1)));
        assert!(batch.errors.is_empty());
        assert!(batch.warnings.is_empty());
    }

    #[test]
    fn test_unknown_restriction_code_warns() {
        let wb = Workbook {
            sheets: vec![
                sheet("Issuer", &[&["Name", "Acme"]]),
                sheet(
                    "Journal",
                    &[
                        &["Transaction Type", "Quantity", "Account", "Restriction Code"],
                        &["IPO", "10", "A", "A"],
                        &["IPO", "10", "B", "ZZ"],
                    ],
                ),
            ],
            ..Workbook::default()
        };
        let batch = parse_workbook(&wb, &ClassifyOptions::default());
        assert_eq!(batch.warnings.len(), 1);
        assert_eq!(batch.warnings[0].row, 3);
        assert_eq!(batch.applied_restrictions.len(), 2);
    }
}
