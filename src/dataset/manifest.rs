//! Manifest loading for labeled datasets.
//!
//! Two layouts are supported: a delimited table with one `(identifier, label, ...)`
//! record per line, and an image tree where every immediate subdirectory of the
//! root is a class.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::{DEFAULT_LABEL_FIELD, Dataset, Item};

/// Image extensions picked up by [`load_image_folder`] (case-insensitive).
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "tif", "tiff", "webp"];

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("manifest has no `{0}` column")]
    MissingIdentifierField(String),
    #[error("line {line}: expected {expected} columns, found {found}")]
    ColumnCount {
        line: u64,
        expected: usize,
        found: usize,
    },
    #[error("line {line}: empty identifier")]
    EmptyIdentifier { line: u64 },
    #[error("line {line}: duplicate identifier `{identifier}`")]
    DuplicateIdentifier { line: u64, identifier: String },
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),
}

/// How a delimited manifest is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestOptions {
    /// Column holding the item identifier.
    pub identifier_field: String,
    /// Field delimiter byte.
    pub delimiter: u8,
    /// Whether the first record names the columns.
    ///
    /// Headerless manifests must have exactly two columns: identifier then label.
    pub has_headers: bool,
}

impl Default for ManifestOptions {
    fn default() -> Self {
        Self {
            identifier_field: "path".to_string(),
            delimiter: b',',
            has_headers: true,
        }
    }
}

/// Load a delimited manifest file into a dataset.
pub fn load_manifest(path: &Path, options: &ManifestOptions) -> Result<Dataset, ManifestError> {
    let file = File::open(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let dataset = parse_manifest(file, options)?;
    tracing::info!(
        items = dataset.len(),
        "Loaded manifest {}",
        path.display()
    );
    Ok(dataset)
}

/// Parse a delimited manifest from any reader.
///
/// The dataset schema holds every column except the identifier column. Blank
/// lines and lines starting with `#` are skipped.
pub fn parse_manifest<R: Read>(
    reader: R,
    options: &ManifestOptions,
) -> Result<Dataset, ManifestError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(options.has_headers)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader);

    let columns: Vec<String> = if options.has_headers {
        reader.headers()?.iter().map(str::to_string).collect()
    } else {
        vec![
            options.identifier_field.clone(),
            DEFAULT_LABEL_FIELD.to_string(),
        ]
    };
    let id_index = columns
        .iter()
        .position(|name| name == &options.identifier_field)
        .ok_or_else(|| ManifestError::MissingIdentifierField(options.identifier_field.clone()))?;

    let mut seen = HashSet::new();
    let mut items = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|pos| pos.line()).unwrap_or_default();
        if record.len() != columns.len() {
            return Err(ManifestError::ColumnCount {
                line,
                expected: columns.len(),
                found: record.len(),
            });
        }
        let identifier = record.get(id_index).unwrap_or_default();
        if identifier.is_empty() {
            return Err(ManifestError::EmptyIdentifier { line });
        }
        if !seen.insert(identifier.to_string()) {
            return Err(ManifestError::DuplicateIdentifier {
                line,
                identifier: identifier.to_string(),
            });
        }
        let attributes = columns
            .iter()
            .zip(record.iter())
            .enumerate()
            .filter(|(idx, _)| *idx != id_index)
            .map(|(_, (name, value))| (name.clone(), value.to_string()))
            .collect();
        items.push(Item::new(identifier, attributes));
    }

    let schema = columns
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| *idx != id_index)
        .map(|(_, name)| name)
        .collect();
    Ok(Dataset::new(schema, items))
}

/// Build a dataset from a class-per-folder image tree.
///
/// Identifiers are `<class>/<file name>` relative to `root`; the folder name is
/// stored as the `label` attribute. Hidden folders and non-image files are
/// skipped, and items come out sorted by class then file name.
pub fn load_image_folder(root: &Path) -> Result<Dataset, ManifestError> {
    if !root.is_dir() {
        return Err(ManifestError::NotADirectory(root.to_path_buf()));
    }
    let mut items = Vec::new();
    for class_dir in sorted_entries(root, |path| path.is_dir())? {
        let Some(label) = class_dir.file_name().and_then(|name| name.to_str()) else {
            tracing::warn!("Skipping non UTF-8 class folder {}", class_dir.display());
            continue;
        };
        if label.starts_with('.') {
            continue;
        }
        let mut class_items = 0usize;
        for file in sorted_entries(&class_dir, |path| path.is_file() && is_image(path))? {
            let Some(file_name) = file.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            items.push(Item::labeled(format!("{label}/{file_name}"), label));
            class_items += 1;
        }
        tracing::debug!(label, items = class_items, "Scanned class folder");
    }
    tracing::info!(
        items = items.len(),
        "Loaded image folder {}",
        root.display()
    );
    Ok(Dataset::new(vec![DEFAULT_LABEL_FIELD.to_string()], items))
}

fn sorted_entries(
    dir: &Path,
    keep: impl Fn(&Path) -> bool,
) -> Result<Vec<PathBuf>, ManifestError> {
    let io_err = |source| ManifestError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if keep(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
