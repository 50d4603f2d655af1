use std::io::Write;

use tabled::settings::{
    object::{Cell, Columns, Rows},
    style::On,
    Alignment, Border,
};

use crate::{registry::render::RenderTable, util::rw::WriteHandle};

use super::model::{Error, OutputType, TableWriter};

/// Renders tables as ascii text, for the terminal.
pub struct TextWriter {
    w: WriteHandle,
}

impl TextWriter {
    pub fn new(w: WriteHandle) -> TextWriter {
        TextWriter { w }
    }
}

fn full_border(edge: char, corner: char) -> Border<On, On, On, On> {
    Border::full(edge, edge, '|', '|', corner, corner, corner, corner)
}

fn blank_border() -> Border<On, On, On, On> {
    Border::full(' ', ' ', ' ', ' ', ' ', ' ', ' ', ' ')
}

/// Columns where every non-empty body cell is an integer.
fn numeric_columns(table_model: &RenderTable) -> Vec<usize> {
    (0..table_model.header.len())
        .filter(|col| {
            let mut cells = table_model
                .rows
                .iter()
                .filter_map(|r| r.get(*col))
                .filter(|c| !c.is_empty())
                .peekable();
            cells.peek().is_some() && cells.all(|c| c.parse::<i64>().is_ok())
        })
        .collect()
}

impl TableWriter for TextWriter {
    fn print_render_table(
        &mut self,
        out_type: OutputType,
        name: &str,
        table_model: &RenderTable,
    ) -> Result<(), Error> {
        let map_write_err = |e| format!("{e}");

        for err in &table_model.errors {
            writeln!(self.w, "[!] {}", err).map_err(map_write_err)?;
        }

        writeln!(self.w, "{}", out_type.title(name)).map_err(map_write_err)?;

        if table_model.header.is_empty() {
            writeln!(self.w).map_err(map_write_err)?;
            return Ok(());
        }

        let mut table_bldr = tabled::builder::Builder::default();
        table_bldr.push_record(
            table_model
                .header
                .iter()
                .map(|h| h.to_uppercase())
                .collect::<Vec<String>>(),
        );
        for row in &table_model.rows {
            table_bldr.push_record(row);
        }

        // The footer sits under the table, after one blank row.
        let footer_sep_row = if table_model.footer.is_empty() {
            None
        } else {
            table_bldr.push_record(vec![String::new(); table_model.footer.len()]);
            table_bldr.push_record(table_model.footer.clone());
            Some(1 + table_model.rows.len())
        };

        let mut table = table_bldr.build();
        table.with(tabled::settings::Style::ascii());
        for col in numeric_columns(table_model) {
            table.modify(Columns::single(col), Alignment::right());
        }
        table.modify(Rows::first(), Alignment::center());

        if let Some(sep_row) = footer_sep_row {
            let footer_row = sep_row + 1;
            table.modify(
                Rows::single(sep_row),
                Border::new().set_left(' ').set_right(' '),
            );
            table.modify(Rows::single(footer_row), blank_border());
            // Only filled footer cells get a box.
            for (col, footer_cell) in table_model.footer.iter().enumerate() {
                if !footer_cell.is_empty() {
                    table.modify(Cell::new(footer_row, col), full_border('-', '+'));
                }
            }
        }

        writeln!(self.w, "{table}").map_err(map_write_err)?;

        for note in &table_model.notes {
            writeln!(self.w, "{note}").map_err(map_write_err)?;
        }

        writeln!(self.w).map_err(map_write_err)?;
        Ok(())
    }
}
