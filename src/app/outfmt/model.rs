use crate::registry::render::RenderTable;

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum OutputType {
    /// What a workbook parsed into, before anything is saved.
    BatchPreview,
    ImportSummary,
    Ledger,
    ControlBook,
    /// A shareholder's positions. The name is the shareholder's account.
    Positions,
}

impl OutputType {
    pub fn title(&self, name: &str) -> String {
        match self {
            OutputType::BatchPreview => format!("Parsed from {name}"),
            OutputType::ImportSummary => format!("Import of {name}"),
            OutputType::Ledger => format!("Transfer Journal for {name}"),
            OutputType::ControlBook => format!("Control Book for {name}"),
            OutputType::Positions => format!("Positions for {name}"),
        }
    }

    /// Base name for files written by the csv and xlsx writers.
    pub fn file_stem(&self, name: &str) -> String {
        let kind = match self {
            OutputType::BatchPreview => "preview",
            OutputType::ImportSummary => "import-summary",
            OutputType::Ledger => "ledger",
            OutputType::ControlBook => "control-book",
            OutputType::Positions => "positions",
        };
        let name: String = name
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        if name.is_empty() {
            kind.to_string()
        } else {
            format!("{kind}-{name}")
        }
    }
}

pub type Error = String;

pub trait TableWriter {
    fn print_render_table(
        &mut self,
        out_type: OutputType,
        name: &str,
        table_model: &RenderTable,
    ) -> Result<(), Error>;

    fn finish(self: Box<Self>) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::OutputType;

    #[test]
    fn test_file_stem() {
        assert_eq!(OutputType::Ledger.file_stem("Acme Corp"), "ledger-acme-corp");
        assert_eq!(OutputType::ControlBook.file_stem(""), "control-book");
        assert_eq!(OutputType::Positions.file_stem("ACC/1"), "positions-acc-1");
    }
}
