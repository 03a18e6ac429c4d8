use anyhow::{Context as AnyhowContext, Result};
use nbflow_analyzer::Fragment;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct Notebook {
    #[serde(default)]
    nbformat: Option<u32>,

    #[serde(default)]
    cells: Vec<Cell>,
}

#[derive(Debug, Deserialize)]
struct Cell {
    cell_type: String,

    #[serde(default)]
    source: CellSource,

    #[serde(default)]
    metadata: Map<String, Value>,

    /// Top-level cell id (nbformat >= 4.5)
    #[serde(default)]
    id: Option<String>,
}

/// nbformat allows a cell source to be one string or a list of lines
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CellSource {
    Text(String),
    Lines(Vec<String>),
}

impl Default for CellSource {
    fn default() -> Self {
        CellSource::Text(String::new())
    }
}

impl CellSource {
    fn into_text(self) -> String {
        match self {
            CellSource::Text(text) => text,
            CellSource::Lines(lines) => lines.concat(),
        }
    }
}

/// Read a `.ipynb` file into ordered code fragments
pub fn load_notebook(path: &Path) -> Result<Vec<Fragment>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read notebook {}", path.display()))?;
    parse_notebook(&raw).with_context(|| format!("Invalid notebook {}", path.display()))
}

/// Extract non-blank code cells from notebook JSON.
///
/// The fragment id is `metadata.id`, then the cell `id`, then `cell_{index}`
/// where index counts all cells. Repeated ids get the index appended.
pub fn parse_notebook(raw: &str) -> Result<Vec<Fragment>> {
    let notebook: Notebook = serde_json::from_str(raw).context("Failed to parse notebook JSON")?;

    if let Some(version) = notebook.nbformat.filter(|&v| v < 4) {
        log::warn!("nbformat {version} notebook; only version 4 is fully supported");
    }

    let mut seen = HashSet::new();
    let mut fragments = Vec::new();

    for (index, cell) in notebook.cells.into_iter().enumerate() {
        if cell.cell_type != "code" {
            continue;
        }

        let text = cell.source.into_text();
        if text.trim().is_empty() {
            continue;
        }

        let mut id = cell
            .metadata
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or(cell.id)
            .unwrap_or_else(|| format!("cell_{index}"));

        if !seen.insert(id.clone()) {
            let mut renamed = format!("{id}_{index}");
            let mut attempt = 1;
            while seen.contains(&renamed) {
                renamed = format!("{id}_{index}_{attempt}");
                attempt += 1;
            }
            log::warn!("Duplicate cell id `{id}`; using `{renamed}`");
            seen.insert(renamed.clone());
            id = renamed;
        }

        fragments.push(Fragment::new(id, text));
    }

    log::debug!("Loaded {} code cells", fragments.len());
    Ok(fragments)
}
