use std::{io::Write, path::PathBuf, time::Duration};

use async_std::task::block_on;
use clap::{Parser, Subcommand};

use crate::{
    app::{
        approot::{run_control_book, run_import, run_ledger, run_statement, ImportOptions, LedgerQuery},
        outfmt::{csv::CsvWriter, model::TableWriter, text::TextWriter},
        SHARELEDGER_APP_VERSION,
    },
    import::{FileJobStore, InMemoryJobStore, JobStore, SaveOptions},
    registry::{ledger::LedgerFilter, RecordId},
    store::{InMemoryRecordStore, RecordStore, RestRecordStore},
    util::{basic::SError, date::parse_text_date, http::standalone::StandaloneAppRequester, rw::WriteHandle},
    workbook::{
        classify::{ClassifyOptions, DEFAULT_MIN_TX_SCORE},
        excel::load_workbook,
    },
    write_errln,
};

const ABOUT: &str = "Shareholder registry import and reconciliation tool";

fn get_long_about() -> String {
    format!(
        "\
Imports an issuer's shareholder registry workbook (issuer details, securities,
officers, shareholders, restrictions, and the transfer journal) into the
registry backend, and reports on what is saved there.

Sheets may have any names. The transfer journal is found by its header row
(e.g. Cusip, Transaction Type, Credit/Debit, Quantity, Transaction Date,
Account), falling back to the second sheet.

Imports are resumable: running the same import again continues where a failed
run stopped, without duplicating saved rows. Job state is kept in
$HOME/.shareledger/jobs by default.

Diagnostics are written to stderr when TRACE is set (e.g. TRACE=info, or
TRACE=shareledger::import=debug). Version {SHARELEDGER_APP_VERSION}."
    )
}

#[derive(Parser, Debug)]
#[command(version = SHARELEDGER_APP_VERSION, about = ABOUT, long_about = get_long_about())]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Print verbose output
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Base url of the backend's REST interface
    #[arg(long, env = "SHARELEDGER_API_URL", global = true)]
    pub api_url: Option<String>,

    #[arg(long, env = "SHARELEDGER_API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Seconds to wait for each backend request
    #[arg(long, env = "SHARELEDGER_REQUEST_TIMEOUT_SECS", global = true, default_value_t = 30)]
    pub request_timeout_secs: u64,
}

#[derive(clap::Args, Debug)]
pub struct OutputArgs {
    /// Write output as CSV to the specified directory.
    #[arg(short = 'd', long)]
    pub csv_output_dir: Option<String>,

    /// Write CSV without quoting, as older exports did. A value containing
    /// a comma will shift the columns after it.
    #[arg(long, default_value_t = false, requires = "csv_output_dir")]
    pub legacy_csv: bool,

    /// Write every table as a sheet of this xlsx file.
    #[cfg(feature = "xlsx_write")]
    #[arg(long, conflicts_with = "csv_output_dir")]
    pub xlsx_output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct DateRangeArgs {
    /// Only transactions on or after this date (MM/DD/YYYY or YYYY-MM-DD).
    /// The running total covers only the selected transactions.
    #[arg(long)]
    pub from: Option<String>,

    /// Only transactions on or before this date
    #[arg(long)]
    pub to: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse a registry workbook and save it into the backend
    Import {
        workbook: PathBuf,

        /// Save the issuer even if one with the same name already exists
        #[arg(long, default_value_t = false)]
        override_issuer: bool,

        /// Parse and save into memory only. Nothing is sent to the backend.
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// How many transaction headers a sheet needs to be taken as the
        /// transfer journal
        #[arg(long, default_value_t = DEFAULT_MIN_TX_SCORE)]
        transaction_sheet_threshold: usize,

        /// Where import job state is kept
        #[arg(long)]
        job_dir: Option<PathBuf>,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Transfer journal, grouped by date and transaction type, with the
    /// running outstanding balance
    Ledger {
        #[arg(long)]
        issuer_id: String,

        #[arg(long)]
        cusip: Option<String>,

        /// Only this holder's transactions
        #[arg(long)]
        account: Option<String>,

        #[command(flatten)]
        dates: DateRangeArgs,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Authorized, outstanding and unissued shares per security
    ControlBook {
        #[arg(long)]
        issuer_id: String,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// One holder's positions and transactions
    Statement {
        #[arg(long)]
        issuer_id: String,

        #[arg(long)]
        account: String,

        #[arg(long)]
        cusip: Option<String>,

        #[command(flatten)]
        dates: DateRangeArgs,

        #[command(flatten)]
        output: OutputArgs,
    },
}

/// Backend ids are integers or uuids. Numeric ids must be sent back as
/// numbers to compare equal to stored foreign keys.
pub fn parse_record_id(s: &str) -> RecordId {
    let s = s.trim();
    match s.parse::<i64>() {
        Ok(n) => RecordId::from(n),
        Err(_) => RecordId::from(s),
    }
}

fn parse_date_arg(name: &str, value: &Option<String>) -> Result<Option<time::Date>, SError> {
    match value {
        None => Ok(None),
        Some(v) => parse_text_date(v)
            .map(Some)
            .ok_or_else(|| format!("Invalid --{name} date: {v:?}")),
    }
}

fn ledger_filter(cusip: &Option<String>, dates: &DateRangeArgs) -> Result<LedgerFilter, SError> {
    Ok(LedgerFilter {
        cusip: cusip.clone(),
        from: parse_date_arg("from", &dates.from)?,
        to: parse_date_arg("to", &dates.to)?,
        shareholder_id: None,
    })
}

fn make_rest_store(args: &Args) -> Result<RestRecordStore, SError> {
    let url = args
        .api_url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| "No backend configured. Set SHARELEDGER_API_URL or pass --api-url".to_string())?;
    let key = args
        .api_key
        .as_deref()
        .ok_or_else(|| "No api key configured. Set SHARELEDGER_API_KEY or pass --api-key".to_string())?;
    let timeout = Duration::from_secs(args.request_timeout_secs);
    tracing::debug!("Backend {url}, request timeout {timeout:?}");
    Ok(RestRecordStore::new(url, key, StandaloneAppRequester::new_boxed(timeout)))
}

#[cfg(feature = "xlsx_write")]
fn xlsx_writer(output: &OutputArgs) -> Option<Box<dyn TableWriter>> {
    output.xlsx_output.as_ref().map(|path| {
        Box::new(crate::app::outfmt::xlsx::XlsxWriter::new(path.clone())) as Box<dyn TableWriter>
    })
}

#[cfg(not(feature = "xlsx_write"))]
fn xlsx_writer(_output: &OutputArgs) -> Option<Box<dyn TableWriter>> {
    None
}

fn make_writer(output: &OutputArgs) -> Result<Box<dyn TableWriter>, SError> {
    if let Some(w) = xlsx_writer(output) {
        return Ok(w);
    }
    match &output.csv_output_dir {
        Some(dir) => CsvWriter::new(dir, output.legacy_csv)
            .map(|w| Box::new(w) as Box<dyn TableWriter>)
            .map_err(|e| format!("Unable to use {dir}: {e}")),
        None => Ok(Box::new(TextWriter::new(WriteHandle::stdout_write_handle()))),
    }
}

/// Runs `f` against the writer for `output`, then finishes the writer.
fn with_writer<F>(output: &OutputArgs, err_printer: &mut WriteHandle, f: F) -> Result<(), ()>
where
    F: FnOnce(&mut dyn TableWriter) -> Result<(), ()>,
{
    let mut writer = make_writer(output).map_err(|e| {
        write_errln!(err_printer, "{e}");
    })?;
    let res = f(writer.as_mut());
    if let Err(e) = writer.finish() {
        write_errln!(err_printer, "{e}");
        return Err(());
    }
    res
}

fn cmd_import(args: &Args, mut err_printer: WriteHandle) -> Result<(), ()> {
    let Command::Import {
        workbook,
        override_issuer,
        dry_run,
        transaction_sheet_threshold,
        job_dir,
        output,
    } = &args.command
    else {
        return Err(());
    };

    let wb = load_workbook(workbook).map_err(|e| {
        write_errln!(err_printer, "{e}");
    })?;

    let store: Box<dyn RecordStore> = if *dry_run {
        Box::new(InMemoryRecordStore::new())
    } else {
        Box::new(make_rest_store(args).map_err(|e| {
            write_errln!(err_printer, "{e}");
        })?)
    };
    let mut jobs: Box<dyn JobStore> = if *dry_run {
        Box::new(InMemoryJobStore::new())
    } else {
        let dir = match job_dir {
            Some(d) => d.clone(),
            None => FileJobStore::default_dir().map_err(|e| {
                write_errln!(err_printer, "{e}");
            })?,
        };
        Box::new(FileJobStore::new(dir))
    };

    let opts = ImportOptions {
        classify: ClassifyOptions { min_tx_score: *transaction_sheet_threshold },
        save: SaveOptions { override_issuer: *override_issuer },
    };

    let summary_printer = err_printer.clone();
    with_writer(output, &mut err_printer, |writer| {
        let summary = block_on(run_import(
            &wb,
            store.as_ref(),
            jobs.as_mut(),
            &opts,
            writer,
            summary_printer,
        ))?;
        if *dry_run {
            println!("Dry run: nothing was sent to the backend.");
        }
        if summary.has_failures() {
            return Err(());
        }
        Ok(())
    })
}

fn cmd_report(args: &Args, mut err_printer: WriteHandle) -> Result<(), ()> {
    let store = make_rest_store(args).map_err(|e| {
        write_errln!(err_printer, "{e}");
    })?;
    let printer = err_printer.clone();

    match &args.command {
        Command::Import { .. } => Err(()),
        Command::Ledger { issuer_id, cusip, account, dates, output } => {
            let filter = ledger_filter(cusip, dates).map_err(|e| {
                write_errln!(err_printer, "{e}");
            })?;
            let query = LedgerQuery {
                issuer_id: parse_record_id(issuer_id),
                account: account.clone(),
                filter,
            };
            with_writer(output, &mut err_printer, |writer| {
                block_on(run_ledger(&store, &query, writer, printer))
            })
        }
        Command::ControlBook { issuer_id, output } => {
            let issuer_id = parse_record_id(issuer_id);
            with_writer(output, &mut err_printer, |writer| {
                block_on(run_control_book(&store, &issuer_id, writer, printer))
            })
        }
        Command::Statement { issuer_id, account, cusip, dates, output } => {
            let filter = ledger_filter(cusip, dates).map_err(|e| {
                write_errln!(err_printer, "{e}");
            })?;
            let issuer_id = parse_record_id(issuer_id);
            with_writer(output, &mut err_printer, |writer| {
                block_on(run_statement(&store, &issuer_id, account, &filter, writer, printer))
            })
        }
    }
}

/// Returned Err is for exit code determination only.
pub fn command_main() -> Result<(), ()> {
    let args = Args::parse();
    if args.verbose {
        crate::log::set_verbose(true);
        crate::tracing::enable_trace_env("shareledger=info");
    }
    crate::tracing::setup_tracing();

    let err_printer = WriteHandle::stderr_write_handle();
    let res = match &args.command {
        Command::Import { .. } => cmd_import(&args, err_printer),
        _ => cmd_report(&args, err_printer),
    };
    let _ = std::io::stdout().flush();
    res
}
