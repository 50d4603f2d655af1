use crate::registry::{render::RenderTable, RecordId};

use super::job::ImportStep;

/// A row the backend refused, with what it said.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct RowFailure {
    pub key: String,
    pub error: String,
}

#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct EntityOutcome {
    pub added: usize,
    pub failed: Vec<RowFailure>,
    /// Rows not sent because an earlier run of the job already saved them.
    pub skipped: usize,
}

/// What a save did, per entity.
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct ImportSummary {
    pub job_id: String,
    pub issuer_name: String,
    pub issuer_id: Option<RecordId>,
    pub outcomes: Vec<(ImportStep, EntityOutcome)>,
    /// Transactions saved without a shareholder, because their account
    /// had no saved shareholder.
    pub unresolved_transactions: usize,
}

impl ImportSummary {
    pub fn outcome(&self, step: ImportStep) -> Option<&EntityOutcome> {
        self.outcomes.iter().find(|(s, _)| *s == step).map(|(_, o)| o)
    }

    pub fn added(&self, step: ImportStep) -> usize {
        self.outcome(step).map_or(0, |o| o.added)
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.iter().map(|(_, o)| o.failed.len()).sum()
    }

    pub fn has_failures(&self) -> bool {
        self.failure_count() > 0
    }
}

pub fn render_import_summary(summary: &ImportSummary) -> RenderTable {
    let mut table = RenderTable {
        header: vec!["Entity", "Added", "Failed", "Skipped"]
            .into_iter()
            .map(String::from)
            .collect(),
        ..RenderTable::default()
    };
    for (step, outcome) in &summary.outcomes {
        table.rows.push(vec![
            step.to_string(),
            outcome.added.to_string(),
            outcome.failed.len().to_string(),
            outcome.skipped.to_string(),
        ]);
        for f in &outcome.failed {
            table.errors.push(format!("{step} {}: {}", f.key, f.error));
        }
    }

    let issuer = match &summary.issuer_id {
        Some(id) => format!("{} (id {id})", summary.issuer_name),
        None => summary.issuer_name.clone(),
    };
    table.notes.push(format!("Issuer: {issuer}"));
    table.notes.push(format!("Import job: {}", summary.job_id));
    if summary.unresolved_transactions > 0 {
        table.notes.push(format!(
            "{} transaction(s) saved without a shareholder (account not found)",
            summary.unresolved_transactions
        ));
    }
    if summary.has_failures() {
        table.notes.push(
            "Rerunning the same import retries failed rows without duplicating saved ones"
                .to_string(),
        );
    }
    table
}

#[cfg(test)]
mod tests {
    use crate::{import::job::ImportStep, registry::RecordId};

    use super::{render_import_summary, EntityOutcome, ImportSummary, RowFailure};

    #[test]
    fn test_render_summary() {
        let summary = ImportSummary {
            job_id: "j1".to_string(),
            issuer_name: "Acme".to_string(),
            issuer_id: Some(RecordId::from(1)),
            outcomes: vec![
                (ImportStep::Issuer, EntityOutcome { added: 1, ..EntityOutcome::default() }),
                (
                    ImportStep::Transactions,
                    EntityOutcome {
                        added: 2,
                        failed: vec![RowFailure {
                            key: "Sheet2!4".to_string(),
                            error: "bad cusip".to_string(),
                        }],
                        skipped: 0,
                    },
                ),
            ],
            unresolved_transactions: 1,
        };
        assert!(summary.has_failures());
        assert_eq!(summary.added(ImportStep::Transactions), 2);
        assert_eq!(summary.added(ImportStep::Officers), 0);

        let table = render_import_summary(&summary);
        assert_eq!(table.rows[1], vec!["Transactions", "2", "1", "0"]);
        assert_eq!(table.errors, vec!["Transactions Sheet2!4: bad cusip"]);
        assert_eq!(table.notes[0], "Issuer: Acme (id 1)");
        assert_eq!(table.notes.len(), 4);
    }
}
