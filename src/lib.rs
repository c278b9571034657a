//! Stratified train/validation/test splitting for labeled datasets.
/// Application directory resolution.
pub mod app_dirs;
/// Persisted split and manifest settings.
pub mod config;
/// Labeled items, manifest loading, splitting and export.
pub mod dataset;
/// Tracing subscriber setup.
pub mod logging;
