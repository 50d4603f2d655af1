use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};

use super::{normalize::find_header_index, Sheet, Workbook};

#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum SheetCategory {
    Issuer,
    Securities,
    Officers,
    Shareholders,
    RecordKeeping,
    Restrictions,
    /// Never assigned by name. See `locate_transaction_sheet`.
    Transactions,
}

fn ci(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .unwrap_or_else(|e| panic!("bad sheet pattern {pattern}: {e}"))
}

lazy_static! {
    static ref NAME_PATTERNS: Vec<(SheetCategory, Regex)> = vec![
        (SheetCategory::Issuer, ci(r"issuer|company")),
        (SheetCategory::Securities, ci(r"securit|cusip")),
        (SheetCategory::Officers, ci(r"officer|director")),
        (SheetCategory::Shareholders, ci(r"holder")),
        (SheetCategory::RecordKeeping, ci(r"record[\s_-]*keeping|record[\s_-]*book")),
        (SheetCategory::Restrictions, ci(r"restrict|legend")),
    ];
}

/// Every category whose pattern matches the sheet name. A name can match
/// several ("Shareholder Recordkeeping Book" is both), and each match gets
/// its own extractor.
pub fn categories_for_name(name: &str) -> Vec<SheetCategory> {
    NAME_PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(name))
        .map(|(cat, _)| *cat)
        .collect()
}

// Each group counts once towards a header row's score.
const TX_HEADER_GROUPS: [&[&str]; 7] = [
    &["transaction type", "trans type", "type of transaction"],
    &["credit/debit", "credit / debit", "debit/credit", "credit_debit", "cr/dr"],
    &["quantity", "qty", "shares"],
    &["transaction date", "credit date", "debit date", "trade date"],
    &["account"],
    &["certificate"],
    &["cusip"],
];

/// How many transaction-specific column groups a header row has. Only
/// counts if the row names a transaction type or a direction, since
/// holder lists also have account and share columns.
pub fn transaction_header_score<S: AsRef<str>>(headers: &[S]) -> usize {
    let has_signal = TX_HEADER_GROUPS[..2]
        .iter()
        .any(|group| find_header_index(headers, group).is_some());
    if !has_signal {
        return 0;
    }
    TX_HEADER_GROUPS
        .iter()
        .filter(|group| find_header_index(headers, group).is_some())
        .count()
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum TxSheetRule {
    /// The header row looked most like a transaction journal.
    Content { score: usize },
    /// Nothing scored well enough, so the second sheet was assumed.
    Positional,
}

pub const DEFAULT_MIN_TX_SCORE: usize = 3;

/// Finds the sheet holding the transfer journal.
///
/// Sheets already read as record-keeping books are skipped, since those
/// produce transactions on their own. Ties go to the earlier sheet. When
/// no sheet reaches `min_score`, falls back to the second sheet, which is
/// where the source spreadsheets conventionally put it.
pub fn locate_transaction_sheet(
    sheets: &[Sheet],
    min_score: usize,
) -> Option<(usize, TxSheetRule)> {
    let is_book = |s: &Sheet| categories_for_name(&s.name).contains(&SheetCategory::RecordKeeping);

    let mut best: Option<(usize, usize)> = None;
    for (i, sheet) in sheets.iter().enumerate() {
        if is_book(sheet) {
            continue;
        }
        let score = transaction_header_score(sheet.headers());
        tracing::debug!("Sheet {:?} transaction score {}", sheet.name, score);
        if score >= min_score && best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((i, score));
        }
    }

    if let Some((i, score)) = best {
        tracing::info!(
            "Reading transactions from sheet {:?} (header match, score {})",
            sheets[i].name, score
        );
        return Some((i, TxSheetRule::Content { score }));
    }

    if sheets.iter().any(is_book) {
        return None;
    }
    match sheets.get(1) {
        Some(sheet) if !sheet.headers().is_empty() => {
            tracing::info!(
                "Reading transactions from sheet {:?} (second sheet fallback; \
                no header scored {} or more)",
                sheet.name, min_score
            );
            Some((1, TxSheetRule::Positional))
        }
        _ => None,
    }
}

/// What to extract from one sheet.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct SheetPlan {
    pub sheet_index: usize,
    pub categories: Vec<SheetCategory>,
    pub tx_rule: Option<TxSheetRule>,
}

pub struct ClassifyOptions {
    pub min_tx_score: usize,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self { min_tx_score: DEFAULT_MIN_TX_SCORE }
    }
}

/// Plans extraction for the whole workbook. Sheets nothing matched are
/// left out.
pub fn classify_workbook(wb: &Workbook, opts: &ClassifyOptions) -> Vec<SheetPlan> {
    let tx_sheet = locate_transaction_sheet(&wb.sheets, opts.min_tx_score);

    let mut plans = Vec::new();
    for (i, sheet) in wb.sheets.iter().enumerate() {
        let mut categories = categories_for_name(&sheet.name);
        let mut tx_rule = None;
        if let Some((tx_i, rule)) = tx_sheet {
            if tx_i == i {
                // The transaction extractor already produces the holders
                // and securities the sheet mentions.
                categories.retain(|c| {
                    !matches!(c, SheetCategory::Shareholders | SheetCategory::Securities)
                });
                categories.push(SheetCategory::Transactions);
                tx_rule = Some(rule);
            }
        }
        if categories.is_empty() {
            tracing::debug!("Ignoring sheet {:?}", sheet.name);
            continue;
        }
        plans.push(SheetPlan { sheet_index: i, categories, tx_rule });
    }
    plans
}
