use std::path::PathBuf;

use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

use crate::{registry::render::RenderTable, util::date::parse_ledger_date};

use super::model::{Error, OutputType, TableWriter};

// Excel caps sheet names at 31 characters.
const MAX_SHEET_NAME: usize = 31;

/// Collects every table as a sheet of one workbook, saved by `finish`.
pub struct XlsxWriter {
    path: PathBuf,
    wb: Workbook,
}

impl XlsxWriter {
    pub fn new(path: PathBuf) -> XlsxWriter {
        XlsxWriter { path, wb: Workbook::new() }
    }
}

fn sheet_name(out_type: OutputType, name: &str) -> String {
    out_type
        .file_stem(name)
        .chars()
        .take(MAX_SHEET_NAME)
        .collect()
}

impl TableWriter for XlsxWriter {
    fn print_render_table(
        &mut self,
        out_type: OutputType,
        name: &str,
        table_model: &RenderTable,
    ) -> Result<(), Error> {
        let sheet = self.wb.add_worksheet();
        sheet
            .set_name(sheet_name(out_type, name))
            .map_err(|e| e.to_string())?;

        let bold = Format::new().set_bold();
        let date_format = Format::new().set_num_format("mm/dd/yyyy");
        let mut col_widths = vec![0usize; table_model.header.len()];

        let mut lines: Vec<(&Vec<String>, bool)> = vec![(&table_model.header, true)];
        lines.extend(table_model.rows.iter().map(|r| (r, false)));
        if !table_model.footer.is_empty() {
            lines.push((&table_model.footer, true));
        }

        for (r_i, (row, is_bold)) in lines.into_iter().enumerate() {
            let row_i = u32::try_from(r_i).map_err(|e| e.to_string())?;
            for (c_i, cell) in row.iter().enumerate() {
                let col_i = u16::try_from(c_i).map_err(|e| e.to_string())?;
                if c_i < col_widths.len() {
                    col_widths[c_i] = col_widths[c_i].max(cell.len());
                }
                if is_bold {
                    sheet
                        .write_with_format(row_i, col_i, cell.as_str(), &bold)
                        .map_err(|e| e.to_string())?;
                } else if let Ok(date) = parse_ledger_date(cell) {
                    let excel_date =
                        ExcelDateTime::from_ymd(date.year() as u16, date.month().into(), date.day())
                            .map_err(|e| e.to_string())?;
                    sheet
                        .write_with_format(row_i, col_i, &excel_date, &date_format)
                        .map_err(|e| e.to_string())?;
                } else if let Ok(num) = cell.parse::<i64>() {
                    sheet.write(row_i, col_i, num as f64).map_err(|e| e.to_string())?;
                } else {
                    sheet
                        .write(row_i, col_i, cell.as_str())
                        .map_err(|e| e.to_string())?;
                }
            }
        }

        let notes_start = table_model.rows.len() + 3;
        for (i, note) in table_model.notes.iter().enumerate() {
            let row_i = u32::try_from(notes_start + i).map_err(|e| e.to_string())?;
            sheet.write(row_i, 0, note.as_str()).map_err(|e| e.to_string())?;
        }

        for (col, width) in col_widths.into_iter().enumerate() {
            let col_i = u16::try_from(col).map_err(|e| e.to_string())?;
            let _ = sheet.set_column_width(col_i, width.max(8) as f64);
        }
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<(), Error> {
        self.wb
            .save(&self.path)
            .map_err(|e| format!("Unable to write {}: {e}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use crate::app::outfmt::model::OutputType;

    use super::sheet_name;

    #[test]
    fn test_sheet_name_truncated() {
        let name = sheet_name(OutputType::Positions, "a very long account number 1234567890");
        assert_eq!(name.len(), 31);
        assert!(name.starts_with("positions-a-very-long"));
    }
}
