use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Language assumed when the notebook metadata names none
pub const DEFAULT_LANGUAGE: &str = "python";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Code,
    Markdown,
    Raw,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub kind: CellKind,
    pub source: String,
    /// Per-cell language; falls back to the notebook language when absent
    pub language: Option<String>,
}

impl Cell {
    pub fn code(source: impl Into<String>) -> Self {
        Self {
            kind: CellKind::Code,
            source: source.into(),
            language: None,
        }
    }

    pub fn markdown(source: impl Into<String>) -> Self {
        Self {
            kind: CellKind::Markdown,
            source: source.into(),
            language: None,
        }
    }

    pub fn raw(source: impl Into<String>) -> Self {
        Self {
            kind: CellKind::Raw,
            source: source.into(),
            language: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn is_blank(&self) -> bool {
        self.source.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notebook {
    pub language: String,
    pub cells: Vec<Cell>,
}

impl Notebook {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            cells,
        }
    }

    /// Parse an nbformat 4 document
    pub fn from_ipynb(json: &str) -> Result<Self, NotebookError> {
        let raw: RawNotebook =
            serde_json::from_str(json).map_err(|e| NotebookError::Parse(e.to_string()))?;

        let language = raw
            .metadata
            .and_then(|m| {
                m.language_info
                    .and_then(|info| info.name)
                    .or_else(|| m.kernelspec.and_then(|spec| spec.language))
            })
            .filter(|lang| !lang.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        let cells = raw
            .cells
            .ok_or_else(|| NotebookError::Format("document has no `cells` array".to_string()))?
            .into_iter()
            .map(RawCell::into_cell)
            .collect();

        Ok(Self { language, cells })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotebookError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Parse(String),

    #[error("not a notebook: {0}")]
    Format(String),
}

/// Where the "currently open" notebook comes from
pub trait NotebookSource: Send + Sync {
    /// `Ok(None)` when no notebook is open
    fn active_notebook(&self) -> Result<Option<Notebook>, NotebookError>;
}

/// Reads an `.ipynb` file from disk on every call, so edits show up on the next query
#[derive(Debug, Clone)]
pub struct IpynbFile {
    path: PathBuf,
}

impl IpynbFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NotebookSource for IpynbFile {
    fn active_notebook(&self) -> Result<Option<Notebook>, NotebookError> {
        let json = fs::read_to_string(&self.path).map_err(|source| NotebookError::Io {
            path: self.path.clone(),
            source,
        })?;
        Notebook::from_ipynb(&json).map(Some)
    }
}

/// No notebook is open
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNotebook;

impl NotebookSource for NoNotebook {
    fn active_notebook(&self) -> Result<Option<Notebook>, NotebookError> {
        Ok(None)
    }
}

/// A fixed in-memory notebook
#[derive(Debug, Clone, Default)]
pub struct StaticNotebook(pub Option<Notebook>);

impl NotebookSource for StaticNotebook {
    fn active_notebook(&self) -> Result<Option<Notebook>, NotebookError> {
        Ok(self.0.clone())
    }
}

#[derive(Deserialize)]
struct RawNotebook {
    cells: Option<Vec<RawCell>>,
    metadata: Option<RawMetadata>,
}

#[derive(Deserialize)]
struct RawMetadata {
    language_info: Option<LanguageInfo>,
    kernelspec: Option<KernelSpec>,
}

#[derive(Deserialize)]
struct LanguageInfo {
    name: Option<String>,
}

#[derive(Deserialize)]
struct KernelSpec {
    language: Option<String>,
}

#[derive(Deserialize)]
struct RawCell {
    cell_type: Option<String>,
    source: Option<CellSource>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CellSource {
    Text(String),
    Lines(Vec<String>),
}

impl RawCell {
    fn into_cell(self) -> Cell {
        let source = match self.source {
            Some(CellSource::Text(text)) => text,
            // nbformat keeps the line endings inside each element
            Some(CellSource::Lines(lines)) => lines.concat(),
            None => String::new(),
        };
        let kind = match self.cell_type.as_deref() {
            Some("code") => CellKind::Code,
            Some("markdown") => CellKind::Markdown,
            _ => CellKind::Raw,
        };
        Cell {
            kind,
            source,
            language: None,
        }
    }
}
