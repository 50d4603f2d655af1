use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};
use sha2::{Digest, Sha256};

use crate::util::basic::SError;

use super::{Grid, Sheet, Workbook};

pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Cell text the way the rest of the pipeline expects it. Whole numbers
/// lose their ".0" (CUSIPs and share counts are often stored as numbers),
/// and real date cells become their serial so there's one date form to parse.
fn cell_text(d: &Data) -> String {
    match d {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => float_text(*f),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => float_text(dt.as_f64()),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => {
            tracing::debug!("Cell error {e:?} read as empty");
            String::new()
        }
    }
}

fn float_text(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        (f as i64).to_string()
    } else {
        f.to_string()
    }
}

/// Converts a used range to a grid anchored at A1, so row numbers in
/// messages match what a person sees in the spreadsheet.
fn range_to_grid(range: &Range<Data>) -> Grid {
    let (row_off, col_off) = match range.start() {
        Some((r, c)) => (r as usize, c as usize),
        None => return Vec::new(),
    };
    let mut grid: Grid = vec![Vec::new(); row_off];
    for row in range.rows() {
        let mut cells = vec![String::new(); col_off];
        cells.extend(row.iter().map(cell_text));
        grid.push(cells);
    }
    grid
}

/// Reads every sheet of an XLSX/XLS/ODS file into text grids.
///
/// Any failure is reported as a single error and nothing is returned.
pub fn load_workbook(path: &Path) -> Result<Workbook, SError> {
    let bytes = std::fs::read(path)
        .map_err(|e| format!("Unable to read {}: {e}", path.display()))?;
    let fingerprint = fingerprint_bytes(&bytes);

    let mut wb = open_workbook_auto(path)
        .map_err(|e| format!("Unable to open {} as a workbook: {e}", path.display()))?;

    let mut sheets = Vec::new();
    for name in wb.sheet_names() {
        let range = wb
            .worksheet_range(&name)
            .map_err(|e| format!("Unable to read sheet {name:?}: {e}"))?;
        sheets.push(Sheet { rows: range_to_grid(&range), name });
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    tracing::debug!("Loaded {} sheets from {:?} ({})", sheets.len(), file_name, fingerprint);
    Ok(Workbook { file_name, fingerprint, sheets })
}
