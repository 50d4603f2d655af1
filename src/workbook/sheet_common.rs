use std::fmt::Display;

/// A sheet as rows of cell text. Empty cells are "", never missing, so
/// rows may be shorter than the header but every present cell is a str.
pub type Grid = Vec<Vec<String>>;

#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct Sheet {
    pub name: String,
    pub rows: Grid,
}

impl Sheet {
    pub fn new(name: &str, rows: Grid) -> Sheet {
        Sheet { name: name.to_string(), rows }
    }

    /// Index of the header: the first row with anything in it. Sheets are
    /// anchored at A1, so blank rows above a table are kept as empty rows.
    fn header_index(&self) -> Option<usize> {
        self.rows.iter().position(|r| !row_is_empty(r))
    }

    /// Empty if the sheet is.
    pub fn headers(&self) -> &[String] {
        self.header_index()
            .map(|i| self.rows[i].as_slice())
            .unwrap_or(&[])
    }

    /// Rows after the header, with their 1-based spreadsheet row number.
    pub fn data_rows(&self) -> impl Iterator<Item = (usize, &[String])> {
        let start = self.header_index().map_or(self.rows.len(), |i| i + 1);
        self.rows
            .iter()
            .enumerate()
            .skip(start)
            .map(|(i, r)| (i + 1, r.as_slice()))
    }
}

/// Every sheet of an uploaded file, already reduced to text.
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct Workbook {
    pub file_name: String,
    /// Hex SHA-256 of the file bytes.
    pub fingerprint: String,
    pub sheets: Vec<Sheet>,
}

/// Returns the cell at `idx`, or "" when the column wasn't found or the
/// row is short.
pub fn cell(row: &[String], idx: Option<usize>) -> &str {
    idx.and_then(|i| row.get(i)).map(|s| s.as_str()).unwrap_or("")
}

pub fn row_is_empty(row: &[String]) -> bool {
    row.iter().all(|c| c.trim().is_empty())
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct SheetParseError {
    pub sheet: String,
    pub row: usize,
    pub msg: String,
}

impl SheetParseError {
    pub fn new(sheet: &str, row: usize, msg: String) -> Self {
        SheetParseError { sheet: sheet.to_string(), row, msg }
    }
}

impl Display for SheetParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} row {}: {}", self.sheet, self.row, self.msg)
    }
}

/// Something in a row that parsed, but looks wrong. These never stop an
/// import.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct DataQualityWarning {
    pub sheet: String,
    pub row: usize,
    pub msg: String,
}

impl DataQualityWarning {
    pub fn new(sheet: &str, row: usize, msg: String) -> Self {
        tracing::warn!("{sheet} row {row}: {msg}");
        DataQualityWarning { sheet: sheet.to_string(), row, msg }
    }
}

impl Display for DataQualityWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} row {}: {}", self.sheet, self.row, self.msg)
    }
}
