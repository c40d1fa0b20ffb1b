//! Notebook reading and the flat text rendering sent along with every prompt.

pub mod extractor;
pub mod notebook;

pub use extractor::{extract_context, ContextExtractor, NOTEBOOK_EMPTY, NO_ACTIVE_NOTEBOOK};
pub use notebook::{
    Cell, CellKind, IpynbFile, NoNotebook, Notebook, NotebookError, NotebookSource,
    StaticNotebook, DEFAULT_LANGUAGE,
};
