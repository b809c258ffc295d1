//! Input discovery: expand `-i` patterns into a list of documents.

use std::collections::HashSet;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, warn};

use crate::errors::CliError;

/// Kind of input, decided by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Needs an Inkscape conversion first
    Pdf,
    /// Already a drawing
    Svg,
}

impl InputKind {
    pub fn of(path: &Utf8Path) -> Option<Self> {
        match path.extension()?.to_ascii_lowercase().as_str() {
            "pdf" => Some(InputKind::Pdf),
            "svg" => Some(InputKind::Svg),
            _ => None,
        }
    }
}

/// A pattern that does not already name PDFs or SVGs is a directory: look for
/// PDFs directly inside it.
pub fn normalize_pattern(pattern: &str) -> String {
    let lower = pattern.to_ascii_lowercase();
    if lower.ends_with(".pdf") || lower.ends_with(".svg") {
        pattern.to_string()
    } else {
        format!("{}/*.pdf", pattern.trim_end_matches(['/', '\\']))
    }
}

/// Expand every pattern, keeping PDF and SVG files in first-seen order.
///
/// A PDF's cached conversion (`x.pdf.svg`) is never listed as an input of its own
/// when the PDF itself is among the inputs.
pub fn expand_inputs(patterns: &[String]) -> Result<Vec<Utf8PathBuf>, CliError> {
    let mut found: Vec<Utf8PathBuf> = Vec::new();

    for raw in patterns {
        let pattern = normalize_pattern(raw);
        let matches = glob::glob(&pattern).map_err(|source| CliError::Pattern {
            pattern: pattern.clone(),
            source,
        })?;

        let before = found.len();
        for entry in matches {
            let path = match entry {
                Ok(path) => path,
                Err(err) => {
                    warn!(%err, "skipping unreadable path");
                    continue;
                }
            };
            let Ok(path) = Utf8PathBuf::from_path_buf(path) else {
                warn!("skipping non UTF-8 path");
                continue;
            };
            if path.is_file() && InputKind::of(&path).is_some() && !found.contains(&path) {
                found.push(path);
            }
        }
        debug!(%pattern, matched = found.len() - before, "expanded input pattern");
    }

    let pdfs: Vec<Utf8PathBuf> = found
        .iter()
        .filter(|p| InputKind::of(p) == Some(InputKind::Pdf))
        .map(|p| Utf8PathBuf::from(format!("{p}.svg")))
        .collect();
    found.retain(|p| !pdfs.contains(p));

    Ok(found)
}

/// Document id: the file name without `.svg` and `.pdf` suffixes
pub fn document_id(path: &Utf8Path) -> String {
    let name = path.file_name().unwrap_or(path.as_str());
    let mut id = name;
    for ext in [".svg", ".pdf"] {
        let tail = id.len().saturating_sub(ext.len());
        if tail > 0 && id.get(tail..).is_some_and(|t| t.eq_ignore_ascii_case(ext)) {
            id = &id[..tail];
        }
    }
    id.to_string()
}

/// Output-safe ids for a batch, in input order.
///
/// Inputs from different directories can share a stem; the first keeps it and
/// later ones get `_2`, `_3`, ... skipping any id another input already owns.
pub fn document_ids(paths: &[Utf8PathBuf]) -> Vec<String> {
    let stems: Vec<String> = paths.iter().map(|p| document_id(p)).collect();
    let owned: HashSet<&str> = stems.iter().map(String::as_str).collect();
    let mut used: HashSet<String> = HashSet::with_capacity(stems.len());

    paths
        .iter()
        .zip(&stems)
        .map(|(path, stem)| {
            if used.insert(stem.clone()) {
                return stem.clone();
            }
            let id = (2..)
                .map(|n| format!("{stem}_{n}"))
                .find(|id| !owned.contains(id.as_str()) && !used.contains(id))
                .unwrap_or_else(|| stem.clone());
            warn!(%path, %id, "document id already taken, renamed");
            used.insert(id.clone());
            id
        })
        .collect()
}
