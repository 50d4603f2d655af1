use itertools::Itertools;

use crate::{
    import::{render_import_summary, save_import, ImportSummary, JobStore, SaveError, SaveOptions, SourceDocument},
    registry::{
        ledger::{filtered_ledger, LedgerFilter, LedgerGroup},
        render::{render_control_book, render_ledger_table, render_statement_positions, RenderTable},
        statement::{control_book, shareholder_statement, ControlBookRow, Statement},
        RecordId, Security, TransferTx,
    },
    store::{find_shareholder_id, load_issuer_rows, RecordStore, Table},
    util::rw::WriteHandle,
    verboseln,
    workbook::{
        batch::{parse_workbook, ImportBatch},
        classify::{classify_workbook, ClassifyOptions},
        Workbook,
    },
    write_errln,
};

use super::outfmt::model::{OutputType, TableWriter};

pub type Error = String;

#[derive(Default)]
pub struct ImportOptions {
    pub classify: ClassifyOptions,
    pub save: SaveOptions,
}

/// Entity counts of a parsed batch. Parse errors and data-quality warnings
/// are the table's errors.
pub fn render_batch_preview(batch: &ImportBatch) -> RenderTable {
    let mut table = RenderTable {
        header: vec!["Entity".to_string(), "Rows".to_string()],
        ..RenderTable::default()
    };
    for (name, count) in batch.counts() {
        table.rows.push(vec![name.to_string(), count.to_string()]);
    }
    table.errors.extend(batch.errors.iter().map(|e| format!("Parse error: {e}")));
    table.errors.extend(batch.warnings.iter().map(|w| format!("Warning: {w}")));
    if let Some(issuer) = &batch.issuer {
        table.notes.push(format!("Issuer: {}", issuer.name));
    }
    table
}

fn narrate_classification(wb: &Workbook, opts: &ClassifyOptions) {
    for plan in classify_workbook(wb, opts) {
        let sheet = &wb.sheets[plan.sheet_index];
        let categories = plan.categories.iter().map(|c| format!("{c:?}")).join(", ");
        match plan.tx_rule {
            Some(rule) => verboseln!(
                "Sheet {:?}: {categories} (transactions located by {rule:?})",
                sheet.name
            ),
            None => verboseln!("Sheet {:?}: {categories}", sheet.name),
        }
    }
}

/// Parses `wb` and saves it through `store`, printing a preview of the
/// batch and then the save summary.
///
/// Returned Err is for exit code determination only.
/// All errors are written to err_printer.
pub async fn run_import(
    wb: &Workbook,
    store: &dyn RecordStore,
    jobs: &mut dyn JobStore,
    opts: &ImportOptions,
    writer: &mut dyn TableWriter,
    mut err_printer: WriteHandle,
) -> Result<ImportSummary, ()> {
    narrate_classification(wb, &opts.classify);
    let batch = parse_workbook(wb, &opts.classify);

    if let Err(e) =
        writer.print_render_table(OutputType::BatchPreview, &wb.file_name, &render_batch_preview(&batch))
    {
        write_errln!(err_printer, "Rendering parsed rows: {e}");
        return Err(());
    }

    let doc = SourceDocument::from(wb);
    let summary = match save_import(store, jobs, &batch, &doc, &opts.save).await {
        Ok(s) => s,
        Err(e @ SaveError::Conflict(_)) => {
            write_errln!(err_printer, "{e}");
            write_errln!(
                err_printer,
                "Nothing was saved. Rerun with --override-issuer to add it as a separate issuer."
            );
            return Err(());
        }
        Err(SaveError::Fatal(e)) => {
            write_errln!(err_printer, "Import failed: {e}");
            return Err(());
        }
    };

    let issuer_name = summary.issuer_name.clone();
    if let Err(e) = writer.print_render_table(
        OutputType::ImportSummary,
        &issuer_name,
        &render_import_summary(&summary),
    ) {
        write_errln!(err_printer, "Rendering import summary: {e}");
        return Err(());
    }
    Ok(summary)
}

async fn load_transactions(
    store: &dyn RecordStore,
    issuer_id: &RecordId,
) -> Result<Vec<TransferTx>, Error> {
    load_issuer_rows::<TransferTx>(store, Table::Transactions, issuer_id, Vec::new())
        .await
        .map_err(|e| format!("Unable to load transactions: {e}"))
}

async fn resolve_account(
    store: &dyn RecordStore,
    issuer_id: &RecordId,
    account: &str,
) -> Result<RecordId, Error> {
    find_shareholder_id(store, issuer_id, account)
        .await
        .map_err(|e| format!("Unable to look up shareholder: {e}"))?
        .ok_or_else(|| format!("Issuer {issuer_id} has no shareholder with account {account}"))
}

/// Which slice of an issuer's transfer journal to show.
#[derive(Clone, Debug)]
pub struct LedgerQuery {
    pub issuer_id: RecordId,
    /// Restricts to one holder, by account number.
    pub account: Option<String>,
    pub filter: LedgerFilter,
}

pub async fn ledger_groups(
    store: &dyn RecordStore,
    query: &LedgerQuery,
) -> Result<Vec<LedgerGroup>, Error> {
    let mut filter = query.filter.clone();
    if let Some(account) = &query.account {
        filter.shareholder_id = Some(resolve_account(store, &query.issuer_id, account).await?);
    }
    let txs = load_transactions(store, &query.issuer_id).await?;
    tracing::debug!("ledger: {} transactions for issuer {}", txs.len(), query.issuer_id);
    Ok(filtered_ledger(&txs, &filter))
}

pub async fn control_book_rows(
    store: &dyn RecordStore,
    issuer_id: &RecordId,
) -> Result<Vec<ControlBookRow>, Error> {
    let securities =
        load_issuer_rows::<Security>(store, Table::Securities, issuer_id, Vec::new())
            .await
            .map_err(|e| format!("Unable to load securities: {e}"))?;
    let txs = load_transactions(store, issuer_id).await?;
    Ok(control_book(&securities, &txs))
}

pub async fn statement_for_account(
    store: &dyn RecordStore,
    issuer_id: &RecordId,
    account: &str,
    filter: &LedgerFilter,
) -> Result<Statement, Error> {
    let holder_id = resolve_account(store, issuer_id, account).await?;
    let txs = load_transactions(store, issuer_id).await?;
    Ok(shareholder_statement(&txs, &holder_id, filter))
}

fn print_tables(
    writer: &mut dyn TableWriter,
    tables: &[(OutputType, String, RenderTable)],
    err_printer: &mut WriteHandle,
) -> Result<(), ()> {
    for (out_type, name, table) in tables {
        if let Err(e) = writer.print_render_table(*out_type, name, table) {
            write_errln!(err_printer, "Rendering {}: {e}", out_type.title(name));
            return Err(());
        }
    }
    Ok(())
}

/// Returned Err is for exit code determination only.
/// All errors are written to err_printer.
pub async fn run_ledger(
    store: &dyn RecordStore,
    query: &LedgerQuery,
    writer: &mut dyn TableWriter,
    mut err_printer: WriteHandle,
) -> Result<(), ()> {
    let groups = ledger_groups(store, query).await.map_err(|e| {
        write_errln!(err_printer, "{e}");
    })?;
    let name = match &query.account {
        Some(acct) => format!("issuer {} account {acct}", query.issuer_id),
        None => format!("issuer {}", query.issuer_id),
    };
    print_tables(
        writer,
        &[(OutputType::Ledger, name, render_ledger_table(&groups))],
        &mut err_printer,
    )
}

pub async fn run_control_book(
    store: &dyn RecordStore,
    issuer_id: &RecordId,
    writer: &mut dyn TableWriter,
    mut err_printer: WriteHandle,
) -> Result<(), ()> {
    let rows = control_book_rows(store, issuer_id).await.map_err(|e| {
        write_errln!(err_printer, "{e}");
    })?;
    print_tables(
        writer,
        &[(OutputType::ControlBook, format!("issuer {issuer_id}"), render_control_book(&rows))],
        &mut err_printer,
    )
}

pub async fn run_statement(
    store: &dyn RecordStore,
    issuer_id: &RecordId,
    account: &str,
    filter: &LedgerFilter,
    writer: &mut dyn TableWriter,
    mut err_printer: WriteHandle,
) -> Result<(), ()> {
    let st = statement_for_account(store, issuer_id, account, filter)
        .await
        .map_err(|e| {
            write_errln!(err_printer, "{e}");
        })?;
    print_tables(
        writer,
        &[
            (OutputType::Positions, account.to_string(), render_statement_positions(&st)),
            (OutputType::Ledger, format!("account {account}"), render_ledger_table(&st.ledger)),
        ],
        &mut err_printer,
    )
}

// MARK: Tests
#[cfg(test)]
mod tests {
    use async_std::task::block_on;

    use crate::{
        app::outfmt::text::TextWriter,
        import::InMemoryJobStore,
        registry::{ledger::LedgerFilter, RecordId},
        store::{InMemoryRecordStore, Table},
        testlib::{assert_re, grid},
        util::{date::pub_testlib::ymd, rw::WriteHandle},
        workbook::{Sheet, Workbook},
    };

    use super::{
        control_book_rows, ledger_groups, run_import, statement_for_account, ImportOptions,
        LedgerQuery,
    };

    fn workbook() -> Workbook {
        Workbook {
            file_name: "acme.xlsx".to_string(),
            fingerprint: "0123abcd".to_string(),
            sheets: vec![
                Sheet::new(
                    "Issuer Info",
                    grid(&[&["Issuer Name", "Acme Corp"], &["Address", "1 Main St"]]),
                ),
                Sheet::new(
                    "Securities",
                    grid(&[
                        &["CUSIP", "Issue Name", "Total Authorized Shares"],
                        &["123456789", "Common", "5000"],
                    ]),
                ),
                Sheet::new(
                    "Journal",
                    grid(&[
                        &["Cusip", "Transaction Type", "Credit/Debit", "Quantity", "Transaction Date", "Account"],
                        &["123456789", "IPO", "Credit", "1000", "01/01/2024", "ACC-1"],
                        &["", "Transfer Credit", "Credit", "50", "01/02/2024", "ACC-2"],
                        &["", "Transfer Debit", "Debit", "30", "01/03/2024", "ACC-1"],
                    ]),
                ),
            ],
        }
    }

    fn import(store: &InMemoryRecordStore) -> (RecordId, String) {
        let mut jobs = InMemoryJobStore::new();
        let (out, buff) = WriteHandle::string_buff_write_handle();
        let (errs, _) = WriteHandle::string_buff_write_handle();
        let mut writer = TextWriter::new(out);
        let summary = block_on(run_import(
            &workbook(),
            store,
            &mut jobs,
            &ImportOptions::default(),
            &mut writer,
            errs,
        ))
        .unwrap();
        let text = buff.borrow().as_str().to_string();
        (summary.issuer_id.unwrap(), text)
    }

    #[test]
    fn test_import_then_report() {
        let store = InMemoryRecordStore::new();
        let (issuer_id, out) = import(&store);
        assert_re(r"Parsed from acme.xlsx", &out);
        assert_re(r"Import of Acme Corp", &out);
        assert_eq!(store.rows(Table::Shareholders).len(), 2);

        let query = LedgerQuery {
            issuer_id: issuer_id.clone(),
            account: None,
            filter: LedgerFilter::default(),
        };
        let groups = block_on(ledger_groups(&store, &query)).unwrap();
        let totals: Vec<i64> = groups.iter().map(|g| g.running_total).collect();
        assert_eq!(totals, vec![1000, 1050, 1020]);

        // The date range applies before the running total.
        let query = LedgerQuery {
            filter: LedgerFilter { from: Some(ymd(2024, 1, 2)), ..LedgerFilter::default() },
            ..query
        };
        let groups = block_on(ledger_groups(&store, &query)).unwrap();
        let totals: Vec<i64> = groups.iter().map(|g| g.running_total).collect();
        assert_eq!(totals, vec![50, 20]);

        let book = block_on(control_book_rows(&store, &issuer_id)).unwrap();
        assert_eq!(book.len(), 1);
        assert_eq!(book[0].outstanding, 1020);
        assert_eq!(book[0].unissued, Some(3980));

        let st = block_on(statement_for_account(&store, &issuer_id, "ACC-1", &LedgerFilter::default()))
            .unwrap();
        assert_eq!(st.positions.len(), 1);
        assert_eq!(st.positions[0].shares, 970);
    }

    #[test]
    fn test_unknown_account() {
        let store = InMemoryRecordStore::new();
        let (issuer_id, _) = import(&store);
        let err = block_on(statement_for_account(&store, &issuer_id, "NOPE", &LedgerFilter::default()))
            .unwrap_err();
        assert_re("no shareholder with account NOPE", &err);
    }

    #[test]
    fn test_import_conflict_message() {
        let store = InMemoryRecordStore::new();
        let _ = import(&store);

        // Same issuer name, different file.
        let mut wb = workbook();
        wb.fingerprint = "ffff".to_string();
        let mut jobs = InMemoryJobStore::new();
        let (out, _) = WriteHandle::string_buff_write_handle();
        let (errs, err_buff) = WriteHandle::string_buff_write_handle();
        let mut writer = TextWriter::new(out);
        let res = block_on(run_import(
            &wb,
            &store,
            &mut jobs,
            &ImportOptions::default(),
            &mut writer,
            errs,
        ));
        assert!(res.is_err());
        assert_re("already exists", err_buff.borrow().as_str());
        assert_re("--override-issuer", err_buff.borrow().as_str());
    }
}
