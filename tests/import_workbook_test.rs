mod common;

use async_std::task::block_on;
use serde_json::json;

use shareledger::{
    app::{
        approot::{ledger_groups, run_ledger, LedgerQuery},
        outfmt::csv::CsvWriter,
    },
    import::{save_import, FileJobStore, ImportStep, SaveOptions, SourceDocument},
    registry::{ledger::LedgerFilter, RecordId},
    store::{InMemoryRecordStore, Table},
    testlib::{assert_re, minimal_registry_workbook},
    util::rw::WriteHandle,
    workbook::{batch::parse_workbook, classify::ClassifyOptions, excel::load_workbook},
};

use common::{write_xlsx, TestDir};

const JOURNAL_HEADER: &[&str] =
    &["Cusip", "Transaction Type", "Credit/Debit", "Quantity", "Transaction Date", "Account"];

#[test]
fn test_two_sheet_workbook_end_to_end() {
    let dir = TestDir::new();
    let path = dir.path.join("acme.xlsx");
    write_xlsx(
        &path,
        &[
            ("Issuer Info", &[&["Issuer Name", "Acme Corp"]]),
            (
                "Whatever",
                &[
                    JOURNAL_HEADER,
                    &["123456789", "IPO", "Credit", "1000", "01/01/2024", "ACC-1"],
                ],
            ),
        ],
    );

    let wb = load_workbook(&path).unwrap();
    assert_eq!(wb.sheets.len(), 2);
    assert_eq!(wb.fingerprint.len(), 64);

    let batch = parse_workbook(&wb, &ClassifyOptions::default());
    assert!(batch.errors.is_empty(), "{:?}", batch.errors);
    assert_eq!(batch.issuer.as_ref().unwrap().name, "Acme Corp");
    assert_eq!(batch.securities.len(), 1);
    assert_eq!(batch.securities[0].cusip, "123456789");
    assert_eq!(batch.shareholders.len(), 1);
    assert_eq!(batch.shareholders[0].account_number, "ACC-1");
    assert_eq!(batch.transactions.len(), 1);
    assert_eq!(batch.transactions[0].signed_quantity(), 1000);

    let store = InMemoryRecordStore::new();
    let mut jobs = FileJobStore::new(dir.path.join("jobs"));
    let summary = block_on(save_import(
        &store,
        &mut jobs,
        &batch,
        &SourceDocument::from(&wb),
        &SaveOptions::default(),
    ))
    .unwrap();
    assert!(!summary.has_failures());
    assert_eq!(summary.unresolved_transactions, 0);

    let issuers = store.rows(Table::Issuers);
    assert_eq!(issuers.len(), 1);
    assert_eq!(issuers[0]["name"], json!("Acme Corp"));
    let holders = store.rows(Table::Shareholders);
    assert_eq!(holders.len(), 1);
    assert_eq!(holders[0]["account_number"], json!("ACC-1"));
    let holder_id = RecordId::from_row(&holders[0]).unwrap();

    let txs = store.rows(Table::Transactions);
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0]["shareholder_id"], holder_id.0);
    assert_eq!(txs[0]["quantity"], json!(1000));
    assert_eq!(txs[0]["transaction_date"], json!("01/01/2024"));

    let query = LedgerQuery {
        issuer_id: summary.issuer_id.clone().unwrap(),
        account: Some("ACC-1".to_string()),
        filter: LedgerFilter::default(),
    };
    let groups = block_on(ledger_groups(&store, &query)).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].delta, 1000);
    assert_eq!(groups[0].running_total, 1000);
}

#[test]
fn test_positional_fallback_and_date_serials() {
    let dir = TestDir::new();
    let path = dir.path.join("registry.xlsx");
    // The journal's headers are too sparse for the content rule, so the
    // second sheet is taken by position. 45293 is 01/02/2024.
    write_xlsx(
        &path,
        &[
            ("Company", &[&["Issuer Name", "Beta Inc"]]),
            (
                "Data",
                &[
                    &["CUSIP", "Type", "Shares", "Date", "Account"],
                    &["987654321", "IPO", "500", "45293", "B-1"],
                ],
            ),
        ],
    );
    let wb = load_workbook(&path).unwrap();
    let batch = parse_workbook(&wb, &ClassifyOptions { min_tx_score: 10 });
    assert_eq!(batch.transactions.len(), 1);
    let tx = &batch.transactions[0];
    assert_eq!(tx.cusip, "987654321");
    assert_eq!(tx.quantity, 500);
    assert_eq!(
        tx.transaction_date.map(|d| d.to_string()),
        Some("2024-01-02".to_string())
    );
}

#[test]
fn test_journal_below_blank_row() {
    let dir = TestDir::new();
    let path = dir.path.join("offset.xlsx");
    write_xlsx(
        &path,
        &[
            ("Issuer Info", &[&["Issuer Name", "Gamma Ltd"]]),
            (
                "Journal",
                &[
                    &[],
                    &["", "Cusip", "Transaction Type", "Quantity", "Transaction Date", "Account"],
                    &["", "555555555", "IPO", "250", "03/04/2024", "G-1"],
                ],
            ),
        ],
    );
    let wb = load_workbook(&path).unwrap();
    let journal = &wb.sheets[1];
    // Row numbers still match the spreadsheet.
    assert_eq!(journal.rows.len(), 3);
    assert!(journal.rows[0].is_empty());
    assert_eq!(journal.headers()[1], "Cusip");

    let batch = parse_workbook(&wb, &ClassifyOptions::default());
    assert_eq!(batch.transactions.len(), 1);
    let tx = &batch.transactions[0];
    assert_eq!(tx.cusip, "555555555");
    assert_eq!(tx.quantity, 250);
    assert_eq!(tx.account_number, "G-1");
    assert_eq!(tx.source.row, 3);
}

#[test]
fn test_failed_import_resumes_from_job_file() {
    let dir = TestDir::new();
    let wb = minimal_registry_workbook();
    let batch = parse_workbook(&wb, &ClassifyOptions::default());
    let doc = SourceDocument::from(&wb);

    let store = InMemoryRecordStore::new();
    store.reject_where(Table::Securities, "cusip", json!("123456789"), "backend unavailable");
    let job_dir = dir.path.join("jobs");

    let first = {
        let mut jobs = FileJobStore::new(job_dir.clone());
        block_on(save_import(&store, &mut jobs, &batch, &doc, &SaveOptions::default())).unwrap()
    };
    assert_eq!(first.outcome(ImportStep::Securities).unwrap().failed.len(), 1);
    assert!(job_dir.join(format!("{}.json", first.job_id)).exists());

    // A new process picks the job up from disk. The issuer is not reported
    // as a conflict with itself, and nothing is duplicated.
    store.clear_rejections();
    let mut jobs = FileJobStore::new(job_dir);
    let second =
        block_on(save_import(&store, &mut jobs, &batch, &doc, &SaveOptions::default())).unwrap();
    assert_eq!(second.job_id, first.job_id);
    assert_eq!(second.issuer_id, first.issuer_id);
    assert_eq!(second.added(ImportStep::Securities), 1);
    assert_eq!(store.rows(Table::Issuers).len(), 1);
    assert_eq!(store.rows(Table::Shareholders).len(), 1);
    assert_eq!(store.rows(Table::Transactions).len(), 1);
    assert_eq!(store.rows(Table::Securities).len(), 1);
}

#[test]
fn test_ledger_csv_export() {
    let dir = TestDir::new();
    let wb = minimal_registry_workbook();
    let batch = parse_workbook(&wb, &ClassifyOptions::default());
    let store = InMemoryRecordStore::new();
    let mut jobs = shareledger::import::InMemoryJobStore::new();
    let summary = block_on(save_import(
        &store,
        &mut jobs,
        &batch,
        &SourceDocument::from(&wb),
        &SaveOptions::default(),
    ))
    .unwrap();

    let out_dir = dir.path.join("out");
    let mut writer = CsvWriter::new(out_dir.to_str().unwrap(), false).unwrap();
    let (errs, err_buff) = WriteHandle::string_buff_write_handle();
    let query = LedgerQuery {
        issuer_id: summary.issuer_id.unwrap(),
        account: None,
        filter: LedgerFilter::default(),
    };
    block_on(run_ledger(&store, &query, &mut writer, errs)).unwrap();
    assert_eq!(err_buff.borrow().as_str(), "");

    let files: Vec<_> = std::fs::read_dir(&out_dir).unwrap().collect();
    assert_eq!(files.len(), 1);
    let path = files[0].as_ref().unwrap().path();
    let text = std::fs::read_to_string(path).unwrap();
    assert_re(r"^CUSIP,Date,Transaction Type,Transactions,Net Shares,Outstanding\n", &text);
    assert_re(r"123456789,01/01/2024,IPO,1,1000,1000\n", &text);
}
