use std::{fs::File, io, path::PathBuf};

use crate::{registry::render::RenderTable, util::os::mk_writable_dir};

use super::model::{Error, OutputType, TableWriter};

/// Writes `table_model` as csv. Notes follow the rows, one per line in the
/// first column.
///
/// With `legacy`, fields are comma-joined and never quoted, matching older
/// exports. A field containing a comma then shifts every column after it.
pub fn write_table_csv<W: io::Write>(
    w: W,
    table_model: &RenderTable,
    legacy: bool,
) -> Result<(), Error> {
    let quote_style = if legacy { csv::QuoteStyle::Never } else { csv::QuoteStyle::Necessary };
    let mut csv_w = csv::WriterBuilder::new()
        .has_headers(true)
        .flexible(true)
        .quote_style(quote_style)
        .from_writer(w);

    csv_w
        .write_record(&table_model.header)
        .map_err(|e| e.to_string())?;
    for row in &table_model.rows {
        csv_w.write_record(row).map_err(|e| e.to_string())?;
    }
    if !table_model.footer.is_empty() {
        csv_w
            .write_record(&table_model.footer)
            .map_err(|e| e.to_string())?;
    }

    let n_cols = table_model.header.len().max(1);
    for note in &table_model.notes {
        let mut note_record = vec![String::new(); n_cols];
        note_record[0] = note.clone();
        csv_w.write_record(note_record).map_err(|e| e.to_string())?;
    }

    csv_w.flush().map_err(|e| e.to_string())
}

/// One csv file per table, in `out_dir`.
pub struct CsvWriter {
    out_dir: PathBuf,
    legacy: bool,
}

impl CsvWriter {
    pub fn new(out_dir: &str, legacy: bool) -> Result<CsvWriter, io::Error> {
        let dir_path = PathBuf::from(out_dir);
        mk_writable_dir(&dir_path)?;
        Ok(CsvWriter { out_dir: dir_path, legacy })
    }
}

impl TableWriter for CsvWriter {
    fn print_render_table(
        &mut self,
        out_type: OutputType,
        name: &str,
        table_model: &RenderTable,
    ) -> Result<(), Error> {
        let file_path = self.out_dir.join(format!("{}.csv", out_type.file_stem(name)));
        let fp = File::create(&file_path)
            .map_err(|e| format!("Failed to create {}: {}", file_path.display(), e))?;
        tracing::debug!("Writing {}", file_path.display());
        write_table_csv(fp, table_model, self.legacy)
    }
}

#[cfg(test)]
mod tests {
    use crate::registry::render::RenderTable;

    use super::write_table_csv;

    fn table() -> RenderTable {
        RenderTable {
            header: vec!["CUSIP".to_string(), "Issue".to_string()],
            rows: vec![vec!["123456789".to_string(), "Common, Class A".to_string()]],
            notes: vec!["1 note".to_string()],
            ..RenderTable::default()
        }
    }

    fn render(legacy: bool) -> String {
        let mut out = Vec::<u8>::new();
        write_table_csv(&mut out, &table(), legacy).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_quoted() {
        assert_eq!(
            render(false),
            "CUSIP,Issue\n123456789,\"Common, Class A\"\n1 note,\n"
        );
    }

    #[test]
    fn test_legacy_unquoted() {
        assert_eq!(render(true), "CUSIP,Issue\n123456789,Common, Class A\n1 note,\n");
    }
}
