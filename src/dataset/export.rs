//! Persist a computed split for training pipelines and read it back.
//!
//! An export directory holds `manifest.json` (ratios, seed, counts) and
//! `samples.jsonl` with one record per item in train, val, test order.

use std::collections::BTreeMap;
use std::fs::{File, create_dir_all};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Item;
use super::split::{Split, SplitCounts, SplitKind, SplitRatios, class_counts, subset_counts};

const EXPORT_FORMAT_VERSION: i64 = 1;
const SAMPLES_FILE_NAME: &str = "samples.jsonl";
const MANIFEST_FILE_NAME: &str = "manifest.json";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported export format version {0}")]
    UnsupportedVersion(i64),
    #[error("invalid samples.jsonl: {0}")]
    InvalidSamples(String),
    #[error("sample counts do not match manifest (manifest {expected:?}, found {found:?})")]
    CountMismatch {
        expected: SplitCounts,
        found: SplitCounts,
    },
}

/// Provenance recorded alongside an exported split.
#[derive(Debug, Clone)]
pub struct ExportMetadata {
    pub label_field: String,
    pub seed: Option<String>,
    pub ratios: SplitRatios,
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub out_dir: PathBuf,
    pub total_exported: usize,
    pub counts: SplitCounts,
    pub class_counts: BTreeMap<String, SplitCounts>,
}

/// Parsed contents of `manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitManifest {
    pub format_version: i64,
    pub label_field: String,
    #[serde(default)]
    pub seed: Option<String>,
    pub ratios: RatioRecord,
    pub counts: SplitCounts,
    #[serde(default)]
    pub classes: BTreeMap<String, SplitCounts>,
    pub files: ManifestFiles,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatioRecord {
    pub train: f64,
    pub val: f64,
    pub test: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestFiles {
    pub samples: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SampleRecord {
    identifier: String,
    split: SplitKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(default)]
    attributes: BTreeMap<String, String>,
}

/// A split loaded back from an export directory.
#[derive(Debug, Clone)]
pub struct LoadedSplit {
    pub manifest: SplitManifest,
    pub split: Split,
}

/// Write `split` into `out_dir` (created if missing).
pub fn export_split(
    split: &Split,
    out_dir: &Path,
    meta: &ExportMetadata,
) -> Result<ExportSummary, ExportError> {
    create_dir_all(out_dir).map_err(|source| io_error(out_dir, source))?;

    let samples_path = out_dir.join(SAMPLES_FILE_NAME);
    let file = File::create(&samples_path).map_err(|source| io_error(&samples_path, source))?;
    let mut writer = BufWriter::new(file);
    for (kind, item) in split.iter() {
        let record = SampleRecord {
            identifier: item.identifier().to_string(),
            split: kind,
            label: item.attribute(&meta.label_field).map(str::to_string),
            attributes: item.attributes().clone(),
        };
        serde_json::to_writer(&mut writer, &record)?;
        writer
            .write_all(b"\n")
            .map_err(|source| io_error(&samples_path, source))?;
    }
    writer
        .flush()
        .map_err(|source| io_error(&samples_path, source))?;

    let counts = subset_counts(split);
    let classes = class_counts(split, &meta.label_field);
    let manifest = SplitManifest {
        format_version: EXPORT_FORMAT_VERSION,
        label_field: meta.label_field.clone(),
        seed: meta.seed.clone(),
        ratios: RatioRecord {
            train: meta.ratios.train(),
            val: meta.ratios.val(),
            test: meta.ratios.test(),
        },
        counts,
        classes: classes.clone(),
        files: ManifestFiles {
            samples: SAMPLES_FILE_NAME.to_string(),
        },
    };
    let manifest_path = out_dir.join(MANIFEST_FILE_NAME);
    let file = File::create(&manifest_path).map_err(|source| io_error(&manifest_path, source))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &manifest)?;
    writer
        .flush()
        .map_err(|source| io_error(&manifest_path, source))?;

    tracing::info!(
        total = counts.total(),
        "Exported split to {}",
        out_dir.display()
    );
    Ok(ExportSummary {
        out_dir: out_dir.to_path_buf(),
        total_exported: counts.total(),
        counts,
        class_counts: classes,
    })
}

/// Load an export directory written by [`export_split`].
pub fn load_split_export(dir: &Path) -> Result<LoadedSplit, ExportError> {
    let manifest_path = dir.join(MANIFEST_FILE_NAME);
    let file = File::open(&manifest_path).map_err(|source| io_error(&manifest_path, source))?;
    let manifest: SplitManifest = serde_json::from_reader(BufReader::new(file))?;
    if manifest.format_version != EXPORT_FORMAT_VERSION {
        return Err(ExportError::UnsupportedVersion(manifest.format_version));
    }

    let samples_path = dir.join(&manifest.files.samples);
    let file = File::open(&samples_path).map_err(|source| io_error(&samples_path, source))?;
    let mut split = Split::default();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| io_error(&samples_path, source))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: SampleRecord = serde_json::from_str(&line)
            .map_err(|err| ExportError::InvalidSamples(format!("line {}: {err}", idx + 1)))?;
        split.push(record.split, Item::new(record.identifier, record.attributes));
    }

    let found = subset_counts(&split);
    if found != manifest.counts {
        return Err(ExportError::CountMismatch {
            expected: manifest.counts,
            found,
        });
    }
    Ok(LoadedSplit { manifest, split })
}

fn io_error(path: &Path, source: std::io::Error) -> ExportError {
    ExportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::split::{rng_from_seed, split};
    use crate::dataset::{DEFAULT_LABEL_FIELD, Dataset};
    use tempfile::tempdir;

    fn sample_split() -> Split {
        let pairs = (0..12).map(|i| (format!("img/{i}.jpg"), if i % 2 == 0 { "wren" } else { "finch" }));
        let dataset = Dataset::from_labeled(pairs);
        split(
            &dataset,
            DEFAULT_LABEL_FIELD,
            &SplitRatios::default(),
            &mut rng_from_seed("export"),
        )
        .unwrap()
    }

    fn meta() -> ExportMetadata {
        ExportMetadata {
            label_field: DEFAULT_LABEL_FIELD.to_string(),
            seed: Some("export".to_string()),
            ratios: SplitRatios::default(),
        }
    }

    #[test]
    fn export_then_load_preserves_subsets() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("nested/out");
        let split = sample_split();
        let summary = export_split(&split, &out, &meta()).unwrap();
        assert_eq!(summary.total_exported, 12);
        assert_eq!(summary.class_counts.len(), 2);

        let loaded = load_split_export(&out).unwrap();
        assert_eq!(loaded.split, split);
        assert_eq!(loaded.manifest.seed.as_deref(), Some("export"));
        assert_eq!(loaded.manifest.counts, summary.counts);
    }

    #[test]
    fn samples_file_lists_train_first() {
        let dir = tempdir().unwrap();
        let split = sample_split();
        export_split(&split, dir.path(), &meta()).unwrap();
        let text = std::fs::read_to_string(dir.path().join(SAMPLES_FILE_NAME)).unwrap();
        let first: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(first["split"], "train");
        assert!(first["label"].is_string());
    }

    #[test]
    fn rejects_unknown_format_version() {
        let dir = tempdir().unwrap();
        export_split(&sample_split(), dir.path(), &meta()).unwrap();
        let manifest_path = dir.path().join(MANIFEST_FILE_NAME);
        let text = std::fs::read_to_string(&manifest_path).unwrap();
        std::fs::write(
            &manifest_path,
            text.replace("\"format_version\": 1", "\"format_version\": 9"),
        )
        .unwrap();
        let err = load_split_export(dir.path()).unwrap_err();
        assert!(matches!(err, ExportError::UnsupportedVersion(9)));
    }

    #[test]
    fn detects_truncated_samples() {
        let dir = tempdir().unwrap();
        export_split(&sample_split(), dir.path(), &meta()).unwrap();
        let samples_path = dir.path().join(SAMPLES_FILE_NAME);
        let text = std::fs::read_to_string(&samples_path).unwrap();
        let truncated: Vec<_> = text.lines().skip(1).collect();
        std::fs::write(&samples_path, truncated.join("\n")).unwrap();
        let err = load_split_export(dir.path()).unwrap_err();
        assert!(matches!(err, ExportError::CountMismatch { .. }));
    }
}
