use std::{
    collections::{HashMap, HashSet},
    fmt::Display,
};

use serde::Serialize;
use serde_json::Value;

use crate::{
    registry::{RecordId, Security, Shareholder, StoredIssuer},
    store::{find_issuer_by_name, to_row, RecordStore, Table},
    workbook::{batch::ImportBatch, Workbook},
};

use super::{
    job::{ImportJob, ImportStep, JobStore},
    summary::{EntityOutcome, ImportSummary, RowFailure},
};

#[derive(PartialEq, Eq, Clone, Debug)]
pub enum SaveError {
    /// An issuer with the same name already exists, and overriding was not
    /// requested. Nothing was saved.
    Conflict(StoredIssuer),
    /// The save could not continue. Steps before the failure stay saved,
    /// and are skipped when the job is run again.
    Fatal(String),
}

impl Display for SaveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveError::Conflict(existing) => write!(
                f,
                "An issuer named {:?} already exists (id {})",
                existing.issuer.name, existing.id
            ),
            SaveError::Fatal(msg) => write!(f, "{msg}"),
        }
    }
}

#[derive(Default)]
pub struct SaveOptions {
    /// Insert the issuer even if one with the same name exists.
    pub override_issuer: bool,
}

/// The uploaded file, recorded as a document of the issuer.
#[derive(PartialEq, Eq, Clone, Debug, Default, Serialize)]
pub struct SourceDocument {
    pub file_name: String,
    pub sha256: String,
    pub document_type: String,
}

impl From<&Workbook> for SourceDocument {
    fn from(wb: &Workbook) -> Self {
        SourceDocument {
            file_name: wb.file_name.clone(),
            sha256: wb.fingerprint.clone(),
            document_type: "registry_import".to_string(),
        }
    }
}

fn fatal<E: Display>(context: &str) -> impl Fn(E) -> SaveError + '_ {
    move |e| SaveError::Fatal(format!("{context}: {e}"))
}

/// Rows to save, each with its natural key.
type KeyedRows = Vec<(String, Result<Value, String>)>;

fn keyed_rows<'a, T: Serialize + 'a, I: IntoIterator<Item = (String, &'a T)>>(
    job: &ImportJob,
    step: ImportStep,
    items: I,
) -> KeyedRows {
    items
        .into_iter()
        .map(|(natural, entity)| {
            let row = to_row(entity, job.issuer_id.as_ref(), &job.import_key(step, &natural));
            (natural, row)
        })
        .collect()
}

/// Saves `rows` as one batch. If the backend refuses the batch, each row is
/// retried alone so the bad ones can be told apart from the good ones.
///
/// Returns the echoed row for each input row, or None where it failed.
async fn insert_keyed(
    store: &dyn RecordStore,
    table: Table,
    step: ImportStep,
    rows: KeyedRows,
) -> (EntityOutcome, Vec<Option<Value>>) {
    let mut outcome = EntityOutcome::default();
    let mut echoed: Vec<Option<Value>> = vec![None; rows.len()];
    if rows.is_empty() {
        return (outcome, echoed);
    }

    // (position in `rows`, natural key, row)
    let mut sendable: Vec<(usize, String, Value)> = Vec::new();
    for (i, (key, row)) in rows.into_iter().enumerate() {
        match row {
            Ok(v) => sendable.push((i, key, v)),
            Err(error) => {
                tracing::warn!("{step}: row {key} could not be serialized: {error}");
                outcome.failed.push(RowFailure { key, error });
            }
        }
    }

    let values: Vec<Value> = sendable.iter().map(|(_, _, v)| v.clone()).collect();
    match store.insert_rows(table, &values).await {
        Ok(returned) => {
            outcome.added = values.len();
            if returned.len() != values.len() {
                tracing::warn!(
                    "{step}: sent {} rows but {} came back",
                    values.len(),
                    returned.len()
                );
            }
            for ((i, _, _), row) in sendable.iter().zip(returned) {
                echoed[*i] = Some(row);
            }
            return (outcome, echoed);
        }
        Err(e) => {
            tracing::info!("{step}: batch insert failed ({e}). Retrying one row at a time");
        }
    }

    for (i, key, value) in sendable {
        match store.insert_rows(table, std::slice::from_ref(&value)).await {
            Ok(mut returned) => {
                outcome.added += 1;
                echoed[i] = returned.pop();
            }
            Err(error) => {
                tracing::warn!("{step}: row {key} failed: {error}");
                outcome.failed.push(RowFailure { key, error });
            }
        }
    }
    (outcome, echoed)
}

fn dedup_securities(securities: &[Security]) -> Vec<Security> {
    let mut index = HashMap::<String, usize>::new();
    let mut out: Vec<Security> = Vec::new();
    for sec in securities {
        let key = sec.cusip.trim().to_uppercase();
        match index.get(&key) {
            Some(&i) => out[i].merge_from(sec.clone()),
            None => {
                index.insert(key, out.len());
                out.push(sec.clone());
            }
        }
    }
    out
}

/// Shareholders with the same natural key are merged into one, later rows
/// filling in fields.
pub fn dedup_shareholders(shareholders: &[Shareholder]) -> Vec<Shareholder> {
    let mut index = HashMap::<String, usize>::new();
    let mut out: Vec<Shareholder> = Vec::new();
    for sh in shareholders {
        let key = sh.natural_key();
        match index.get(&key) {
            Some(&i) => out[i].merge_from(sh.clone()),
            None => {
                index.insert(key, out.len());
                out.push(sh.clone());
            }
        }
    }
    out
}

struct Saver<'a> {
    store: &'a dyn RecordStore,
    jobs: &'a mut dyn JobStore,
    job: ImportJob,
    summary: ImportSummary,
}

impl<'a> Saver<'a> {
    fn persist_job(&mut self) -> Result<(), SaveError> {
        self.jobs
            .save_job(&self.job)
            .map_err(fatal("Unable to save import job"))
    }

    /// Records the outcome of a step that ran. With `hold_open` the step is
    /// not marked done even if every row saved.
    fn finish_step(
        &mut self,
        step: ImportStep,
        outcome: EntityOutcome,
        hold_open: bool,
    ) -> Result<(), SaveError> {
        tracing::info!(
            "{step}: {} added, {} failed, {} skipped",
            outcome.added,
            outcome.failed.len(),
            outcome.skipped
        );
        // A step with failed rows runs again next time. Its saved rows are
        // upserted, so they are not duplicated.
        if outcome.failed.is_empty() {
            if hold_open {
                tracing::info!("{step}: left open until every shareholder is saved");
            } else {
                self.job.mark_done(step);
            }
        }
        self.summary.outcomes.push((step, outcome));
        self.persist_job()
    }

    fn skip_step(&mut self, step: ImportStep, rows: usize) {
        let outcome = EntityOutcome { skipped: rows, ..EntityOutcome::default() };
        self.summary.outcomes.push((step, outcome));
    }

    /// Runs `step` unless an earlier run already did.
    async fn run_step(
        &mut self,
        step: ImportStep,
        table: Table,
        rows: KeyedRows,
        hold_open: bool,
    ) -> Result<(), SaveError> {
        if self.job.is_done(step) {
            self.skip_step(step, rows.len());
            return Ok(());
        }
        let (outcome, _) = insert_keyed(self.store, table, step, rows).await;
        self.finish_step(step, outcome, hold_open)
    }

    /// `key` is a shareholder's natural key.
    fn holder_id(&self, key: &str) -> Option<RecordId> {
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        self.job.shareholder_ids.get(key).cloned()
    }
}

/// Saves a parsed workbook, in dependency order:
///
/// 1. the issuer, stopping on a name conflict unless overridden
/// 2. securities, officers, and restriction templates
/// 3. shareholders, recording each one's id before going on
/// 4. transactions and applied restrictions, linked by those ids
/// 5. record-keeping entries and the source document
///
/// Row failures are collected per entity and never stop the save. Progress
/// is kept in `jobs`, so running the same import again resumes it.
pub async fn save_import(
    store: &dyn RecordStore,
    jobs: &mut dyn JobStore,
    batch: &ImportBatch,
    document: &SourceDocument,
    opts: &SaveOptions,
) -> Result<ImportSummary, SaveError> {
    let issuer = batch
        .issuer
        .as_ref()
        .ok_or_else(|| SaveError::Fatal("No issuer found in the workbook".to_string()))?;

    let job_id = ImportJob::job_id(&document.sha256, &issuer.name);
    let job = match jobs.load_job(&job_id).map_err(fatal("Unable to load import job"))? {
        Some(mut job) => {
            if job.is_complete() {
                tracing::info!("Import job {job_id} already completed. Saving again");
                job.restart();
            } else {
                tracing::info!("Resuming import job {job_id} after {:?}", job.completed);
            }
            job
        }
        None => ImportJob::new(&document.sha256, &issuer.name),
    };

    let mut s = Saver {
        store,
        jobs,
        summary: ImportSummary {
            job_id: job.id.clone(),
            issuer_name: issuer.name.clone(),
            ..ImportSummary::default()
        },
        job,
    };

    // 1. Issuer
    if s.job.is_done(ImportStep::Issuer) {
        s.skip_step(ImportStep::Issuer, 1);
    } else {
        // An issuer this job created earlier is not a conflict.
        if s.job.issuer_id.is_none() {
            let existing = find_issuer_by_name(store, &issuer.name)
                .await
                .map_err(fatal("Unable to look up issuer"))?;
            if let Some(existing) = existing {
                if !opts.override_issuer {
                    return Err(SaveError::Conflict(existing));
                }
                tracing::info!(
                    "Inserting issuer {:?} despite existing id {}",
                    issuer.name, existing.id
                );
            }
        }
        let row = to_row(issuer, None, &s.job.import_key(ImportStep::Issuer, &issuer.name))
            .map_err(fatal("Unable to serialize issuer"))?;
        let returned = store
            .insert_rows(Table::Issuers, &[row])
            .await
            .map_err(fatal("Unable to save issuer"))?;
        let id = returned.first().and_then(RecordId::from_row).ok_or_else(|| {
            SaveError::Fatal("The backend did not return an id for the issuer".to_string())
        })?;
        s.job.issuer_id = Some(id);
        let outcome = EntityOutcome { added: 1, ..EntityOutcome::default() };
        s.finish_step(ImportStep::Issuer, outcome, false)?;
    }
    s.summary.issuer_id = s.job.issuer_id.clone();

    // 2. Securities, officers, restriction templates
    let securities = dedup_securities(&batch.securities);
    let rows = keyed_rows(
        &s.job,
        ImportStep::Securities,
        securities.iter().map(|sec| (sec.cusip.clone(), sec)),
    );
    s.run_step(ImportStep::Securities, Table::Securities, rows, false).await?;

    let rows = keyed_rows(
        &s.job,
        ImportStep::Officers,
        batch
            .officers
            .iter()
            .map(|o| (format!("{}|{}", o.name.to_lowercase(), o.title.to_lowercase()), o)),
    );
    s.run_step(ImportStep::Officers, Table::Officers, rows, false).await?;

    let rows = keyed_rows(
        &s.job,
        ImportStep::Restrictions,
        batch.restrictions.iter().map(|r| (r.code.clone(), r)),
    );
    s.run_step(ImportStep::Restrictions, Table::Restrictions, rows, false).await?;

    // 3. Shareholders. Their ids must be recorded before any transaction
    // is saved.
    let shareholders = dedup_shareholders(&batch.shareholders);
    let rows = keyed_rows(
        &s.job,
        ImportStep::Shareholders,
        shareholders.iter().map(|sh| (sh.natural_key(), sh)),
    );
    if s.job.is_done(ImportStep::Shareholders) {
        s.skip_step(ImportStep::Shareholders, rows.len());
    } else {
        let (mut outcome, echoed) =
            insert_keyed(store, Table::Shareholders, ImportStep::Shareholders, rows).await;
        let refused: HashSet<String> = outcome.failed.iter().map(|f| f.key.clone()).collect();
        for (sh, returned) in shareholders.iter().zip(echoed) {
            let key = sh.natural_key();
            if let Some(id) = returned.as_ref().and_then(RecordId::from_row) {
                s.job.shareholder_ids.insert(key, id);
                continue;
            }
            if refused.contains(&key) {
                continue;
            }
            // Accepted, but with no id to link transactions to.
            let error = match returned {
                Some(_) => "The backend did not return an id",
                None => "The backend did not return the saved row",
            };
            tracing::warn!("{}: row {key}: {error}", ImportStep::Shareholders);
            outcome.added = outcome.added.saturating_sub(1);
            outcome.failed.push(RowFailure { key, error: error.to_string() });
        }
        s.finish_step(ImportStep::Shareholders, outcome, false)?;
    }

    // 4. Transactions and applied restrictions. While any shareholder is
    // unsaved, rows that couldn't be linked keep these steps open, so a
    // later run saves them again with the link.
    let holders_pending = !s.job.is_done(ImportStep::Shareholders);
    let mut transactions = batch.transactions.clone();
    let mut unresolved = 0;
    for tx in transactions.iter_mut() {
        tx.shareholder_id = s.holder_id(tx.holder_lookup_key());
        if tx.shareholder_id.is_none() {
            unresolved += 1;
        }
    }
    if !s.job.is_done(ImportStep::Transactions) {
        s.summary.unresolved_transactions = unresolved;
        if unresolved > 0 {
            tracing::warn!(
                "{unresolved} transactions have no matching shareholder and are saved without one"
            );
        }
    }
    let rows = keyed_rows(
        &s.job,
        ImportStep::Transactions,
        transactions.iter().map(|tx| (tx.source.to_string(), tx)),
    );
    let hold_open = holders_pending && unresolved > 0;
    s.run_step(ImportStep::Transactions, Table::Transactions, rows, hold_open).await?;

    let mut applied = batch.applied_restrictions.clone();
    for a in applied.iter_mut() {
        a.shareholder_id = s.holder_id(&a.account_number);
    }
    let hold_open = holders_pending && applied.iter().any(|a| a.shareholder_id.is_none());
    let rows = keyed_rows(
        &s.job,
        ImportStep::AppliedRestrictions,
        applied
            .iter()
            .map(|a| (format!("{}|{}|{}", a.account_number, a.cusip, a.restriction_code), a)),
    );
    s.run_step(ImportStep::AppliedRestrictions, Table::AppliedRestrictions, rows, hold_open)
        .await?;

    // 5. Record-keeping entries and the document. Nothing depends on these.
    let rows = keyed_rows(
        &s.job,
        ImportStep::Recordkeeping,
        batch.recordkeeping.iter().map(|e| (e.source.to_string(), e)),
    );
    s.run_step(ImportStep::Recordkeeping, Table::Recordkeeping, rows, false).await?;

    let rows = keyed_rows(
        &s.job,
        ImportStep::Document,
        std::iter::once((document.sha256.clone(), document)),
    );
    s.run_step(ImportStep::Document, Table::Documents, rows, false).await?;

    Ok(s.summary)
}
