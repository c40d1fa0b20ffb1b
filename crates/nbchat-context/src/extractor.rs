use crate::notebook::{Cell, CellKind, Notebook, NotebookSource};

pub const NO_ACTIVE_NOTEBOOK: &str = "No active notebook.";
pub const NOTEBOOK_EMPTY: &str = "Notebook is empty.";

/// Renders notebook cells into the context block prepended to every prompt
#[derive(Debug, Clone, Copy)]
pub struct ContextExtractor {
    number_cells: bool,
}

impl Default for ContextExtractor {
    fn default() -> Self {
        Self { number_cells: true }
    }
}

impl ContextExtractor {
    pub fn new(number_cells: bool) -> Self {
        Self { number_cells }
    }

    /// Render the active notebook of `source`.
    ///
    /// Never fails: a missing notebook, an empty one, and a read error each
    /// come back as a human-readable placeholder.
    pub fn extract(&self, source: &dyn NotebookSource) -> String {
        match source.active_notebook() {
            Ok(Some(notebook)) => self.render(&notebook),
            Ok(None) => NO_ACTIVE_NOTEBOOK.to_string(),
            Err(e) => {
                log::warn!("failed to read notebook: {}", e);
                format!("Error reading notebook: {}", e)
            }
        }
    }

    /// Render cells in document order, skipping blank ones.
    ///
    /// Cell numbers are document positions, so they stay stable when blank
    /// cells are skipped.
    pub fn render(&self, notebook: &Notebook) -> String {
        let blocks: Vec<String> = notebook
            .cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| !cell.is_blank())
            .map(|(idx, cell)| self.render_cell(idx + 1, cell, &notebook.language))
            .collect();

        if blocks.is_empty() {
            NOTEBOOK_EMPTY.to_string()
        } else {
            blocks.join("\n\n")
        }
    }

    fn render_cell(&self, number: usize, cell: &Cell, notebook_language: &str) -> String {
        let source = cell.source.trim_end();
        match cell.kind {
            CellKind::Code => {
                let language = cell.language.as_deref().unwrap_or(notebook_language);
                format!(
                    "{} ({}):\n```{}\n{}\n```",
                    self.tag("Code", number),
                    language,
                    language,
                    source
                )
            }
            CellKind::Markdown => format!("{}:\n{}", self.tag("Markdown", number), source),
            CellKind::Raw => format!("{}:\n{}", self.tag("Raw", number), source),
        }
    }

    fn tag(&self, label: &str, number: usize) -> String {
        if self.number_cells {
            format!("{} Cell {}", label, number)
        } else {
            format!("{} Cell", label)
        }
    }
}

/// Extract with cell numbering on
pub fn extract_context(source: &dyn NotebookSource) -> String {
    ContextExtractor::default().extract(source)
}
