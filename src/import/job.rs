use std::{collections::BTreeMap, collections::HashMap, fmt::Display, path::PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::registry::RecordId;

use super::Error;

/// Save steps, in the order they run.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ImportStep {
    Issuer,
    Securities,
    Officers,
    Restrictions,
    Shareholders,
    Transactions,
    AppliedRestrictions,
    Recordkeeping,
    Document,
}

impl ImportStep {
    pub const ALL: [ImportStep; 9] = [
        ImportStep::Issuer,
        ImportStep::Securities,
        ImportStep::Officers,
        ImportStep::Restrictions,
        ImportStep::Shareholders,
        ImportStep::Transactions,
        ImportStep::AppliedRestrictions,
        ImportStep::Recordkeeping,
        ImportStep::Document,
    ];

    /// Used in import keys.
    pub fn kind(&self) -> &'static str {
        match self {
            ImportStep::Issuer => "issuer",
            ImportStep::Securities => "security",
            ImportStep::Officers => "officer",
            ImportStep::Restrictions => "restriction",
            ImportStep::Shareholders => "shareholder",
            ImportStep::Transactions => "transaction",
            ImportStep::AppliedRestrictions => "applied_restriction",
            ImportStep::Recordkeeping => "recordkeeping",
            ImportStep::Document => "document",
        }
    }
}

impl Display for ImportStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ImportStep::Issuer => "Issuer",
            ImportStep::Securities => "Securities",
            ImportStep::Officers => "Officers",
            ImportStep::Restrictions => "Restrictions",
            ImportStep::Shareholders => "Shareholders",
            ImportStep::Transactions => "Transactions",
            ImportStep::AppliedRestrictions => "Applied Restrictions",
            ImportStep::Recordkeeping => "Record-keeping",
            ImportStep::Document => "Document",
        };
        write!(f, "{s}")
    }
}

/// Progress of saving one workbook for one issuer.
///
/// Saved after every step. A run that stops part way through is resumed
/// from the first step not in `completed`, with the shareholder ids the
/// earlier run got back.
#[derive(PartialEq, Eq, Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportJob {
    pub id: String,
    pub issuer_name: String,
    pub issuer_id: Option<RecordId>,
    pub completed: Vec<ImportStep>,
    /// Shareholder natural key -> id
    pub shareholder_ids: BTreeMap<String, RecordId>,
}

impl ImportJob {
    /// Same file and issuer name, same job.
    pub fn job_id(fingerprint: &str, issuer_name: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(fingerprint.as_bytes());
        hasher.update(b"\n");
        hasher.update(issuer_name.trim().to_lowercase().as_bytes());
        let hex = format!("{:x}", hasher.finalize());
        hex[..16].to_string()
    }

    pub fn new(fingerprint: &str, issuer_name: &str) -> ImportJob {
        ImportJob {
            id: ImportJob::job_id(fingerprint, issuer_name),
            issuer_name: issuer_name.to_string(),
            ..ImportJob::default()
        }
    }

    pub fn is_done(&self, step: ImportStep) -> bool {
        self.completed.contains(&step)
    }

    pub fn mark_done(&mut self, step: ImportStep) {
        if !self.is_done(step) {
            self.completed.push(step);
        }
    }

    pub fn is_complete(&self) -> bool {
        ImportStep::ALL.iter().all(|s| self.is_done(*s))
    }

    /// Runs every step again, keeping the ids already known. Rows are
    /// upserted on their import keys, so nothing is duplicated.
    pub fn restart(&mut self) {
        self.completed.clear();
    }

    pub fn import_key(&self, step: ImportStep, natural_key: &str) -> String {
        format!("{}:{}:{}", self.id, step.kind(), natural_key)
    }
}

pub trait JobStore {
    fn load_job(&mut self, id: &str) -> Result<Option<ImportJob>, Error>;
    fn save_job(&mut self, job: &ImportJob) -> Result<(), Error>;
}

pub struct InMemoryJobStore {
    pub jobs: HashMap<String, ImportJob>,
}

impl InMemoryJobStore {
    pub fn new() -> InMemoryJobStore {
        InMemoryJobStore { jobs: HashMap::new() }
    }
}

impl JobStore for InMemoryJobStore {
    fn load_job(&mut self, id: &str) -> Result<Option<ImportJob>, Error> {
        Ok(self.jobs.get(id).cloned())
    }

    fn save_job(&mut self, job: &ImportJob) -> Result<(), Error> {
        self.jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }
}

/// One JSON file per job.
pub struct FileJobStore {
    dir: PathBuf,
}

impl FileJobStore {
    pub fn new(dir: PathBuf) -> FileJobStore {
        FileJobStore { dir }
    }

    /// $HOME/.shareledger/jobs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn default_dir() -> Result<PathBuf, Error> {
        crate::util::os::app_dir_path("jobs")
    }

    fn job_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

impl JobStore for FileJobStore {
    fn load_job(&mut self, id: &str) -> Result<Option<ImportJob>, Error> {
        let path = self.job_path(id);
        let text = match std::fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(format!("Unable to read {}: {e}", path.display())),
        };
        let job: ImportJob = serde_json::from_str(&text)
            .map_err(|e| format!("Corrupt import job {}: {e}", path.display()))?;
        Ok(Some(job))
    }

    fn save_job(&mut self, job: &ImportJob) -> Result<(), Error> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| format!("Unable to create {}: {e}", self.dir.display()))?;
        let path = self.job_path(&job.id);
        let text = serde_json::to_string_pretty(job).map_err(|e| format!("{e}"))?;
        std::fs::write(&path, text)
            .map_err(|e| format!("Unable to write {}: {e}", path.display()))?;
        tracing::debug!("Saved import job to {}", path.display());
        Ok(())
    }
}
