//! Split a labeled manifest or class-per-folder image tree into stratified
//! train/val/test subsets and export them for training.

use std::path::PathBuf;

use stratify::config::{self, AppConfig};
use stratify::dataset::export::{ExportMetadata, export_split};
use stratify::dataset::manifest::{load_image_folder, load_manifest};
use stratify::dataset::split::{rng_from_seed, split};
use stratify::logging;

fn main() {
    if let Err(err) = run() {
        tracing::error!("{err}");
        eprintln!("{err}");
        std::process::exit(1);
    }
}

const VALUE_FLAGS: &[&str] = &[
    "--manifest",
    "--image-root",
    "--out",
    "--config",
    "--label-field",
    "--id-field",
    "--delimiter",
    "--seed",
    "--train",
    "--val",
    "--test",
];

#[derive(Debug)]
enum Source {
    Manifest(PathBuf),
    ImageRoot(PathBuf),
}

#[derive(Debug, Default)]
struct CliOptions {
    source: Option<Source>,
    out_dir: Option<PathBuf>,
    config_path: Option<PathBuf>,
    label_field: Option<String>,
    identifier_field: Option<String>,
    delimiter: Option<char>,
    no_headers: bool,
    seed: Option<String>,
    train: Option<f64>,
    val: Option<f64>,
    test: Option<f64>,
}

fn run() -> Result<(), String> {
    let Some(cli) = parse_args(std::env::args().skip(1).collect())? else {
        return Ok(());
    };
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }

    let mut config = match &cli.config_path {
        Some(path) => config::load_from(path),
        None => config::load_or_default(),
    }
    .map_err(|err| err.to_string())?;
    apply_overrides(&mut config, &cli);

    let ratios = config.split.ratios().map_err(|err| err.to_string())?;
    let dataset = match cli.source.as_ref().ok_or("--manifest or --image-root is required")? {
        Source::Manifest(path) => {
            let options = config.manifest.options().map_err(|err| err.to_string())?;
            load_manifest(path, &options)
        }
        Source::ImageRoot(root) => load_image_folder(root),
    }
    .map_err(|err| err.to_string())?;

    let label_field = config.split.label_field.as_str();
    tracing::info!(
        items = dataset.len(),
        classes = dataset.label_counts(label_field).len(),
        "Splitting by `{label_field}`"
    );
    let mut rng = rng_from_seed(&config.split.seed);
    let split = split(&dataset, label_field, &ratios, &mut rng).map_err(|err| err.to_string())?;

    let out_dir = cli.out_dir.as_ref().ok_or("--out is required")?;
    let meta = ExportMetadata {
        label_field: label_field.to_string(),
        seed: Some(config.split.seed.clone()),
        ratios,
    };
    let summary = export_split(&split, out_dir, &meta).map_err(|err| err.to_string())?;

    println!(
        "Split {} items into train={} val={} test={} ({})",
        summary.total_exported,
        summary.counts.train,
        summary.counts.validation,
        summary.counts.test,
        summary.out_dir.display()
    );
    println!("Per-class counts (train/val/test):");
    for (label, counts) in &summary.class_counts {
        println!(
            "  {label}: {}/{}/{}",
            counts.train, counts.validation, counts.test
        );
    }
    Ok(())
}

fn apply_overrides(config: &mut AppConfig, cli: &CliOptions) {
    if let Some(field) = &cli.label_field {
        config.split.label_field = field.clone();
    }
    if let Some(field) = &cli.identifier_field {
        config.manifest.identifier_field = field.clone();
    }
    if let Some(delimiter) = cli.delimiter {
        config.manifest.delimiter = delimiter;
    }
    if cli.no_headers {
        config.manifest.has_headers = false;
    }
    if let Some(seed) = &cli.seed {
        config.split.seed = seed.clone();
    }
    if let Some(train) = cli.train {
        config.split.train_ratio = train;
    }
    if let Some(val) = cli.val {
        config.split.val_ratio = val;
    }
    if let Some(test) = cli.test {
        config.split.test_ratio = test;
    }
}

fn parse_args(args: Vec<String>) -> Result<Option<CliOptions>, String> {
    let mut options = CliOptions::default();

    let mut idx = 0usize;
    while idx < args.len() {
        let flag = args[idx].as_str();
        if matches!(flag, "-h" | "--help") {
            println!("{}", help_text());
            return Ok(None);
        }
        if flag == "--no-headers" {
            options.no_headers = true;
            idx += 1;
            continue;
        }
        if !VALUE_FLAGS.contains(&flag) {
            return Err(format!("Unknown argument: {flag}\n\n{}", help_text()));
        }
        idx += 1;
        let value = args
            .get(idx)
            .ok_or_else(|| format!("{flag} requires a value"))?
            .as_str();
        match flag {
            "--manifest" | "--image-root" => {
                if options.source.is_some() {
                    return Err("Pass only one of --manifest or --image-root".to_string());
                }
                let path = PathBuf::from(value);
                options.source = Some(if flag == "--manifest" {
                    Source::Manifest(path)
                } else {
                    Source::ImageRoot(path)
                });
            }
            "--out" => options.out_dir = Some(PathBuf::from(value)),
            "--config" => options.config_path = Some(PathBuf::from(value)),
            "--label-field" => options.label_field = Some(value.to_string()),
            "--id-field" => options.identifier_field = Some(value.to_string()),
            "--delimiter" => options.delimiter = Some(parse_delimiter(value)?),
            "--seed" => options.seed = Some(value.to_string()),
            "--train" => options.train = Some(parse_ratio(flag, value)?),
            "--val" => options.val = Some(parse_ratio(flag, value)?),
            "--test" => options.test = Some(parse_ratio(flag, value)?),
            unknown => {
                return Err(format!("Unknown argument: {unknown}\n\n{}", help_text()));
            }
        }
        idx += 1;
    }

    if options.source.is_none() {
        return Err("--manifest or --image-root is required".to_string());
    }
    if options.out_dir.is_none() {
        return Err("--out is required".to_string());
    }
    Ok(Some(options))
}

fn parse_ratio(flag: &str, value: &str) -> Result<f64, String> {
    value
        .parse::<f64>()
        .map_err(|_| format!("Invalid {flag} value: {value}"))
}

fn parse_delimiter(value: &str) -> Result<char, String> {
    match value {
        "\\t" | "tab" => Ok('\t'),
        _ => {
            let mut chars = value.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(c),
                _ => Err(format!("Invalid --delimiter value: {value}")),
            }
        }
    }
}

fn help_text() -> String {
    [
        "stratify-split",
        "",
        "Splits labeled items into class-stratified train/val/test subsets.",
        "",
        "Usage:",
        "  stratify-split (--manifest <file> | --image-root <dir>) --out <dir> [options]",
        "",
        "Options:",
        "  --manifest <file>      Delimited manifest with identifier and label columns.",
        "  --image-root <dir>     Image tree with one subdirectory per class.",
        "  --out <dir>            Output directory for manifest.json + samples.jsonl (required).",
        "  --config <path>        Settings file (defaults to .stratify/config.toml).",
        "  --label-field <name>   Column used for stratification (default: label).",
        "  --id-field <name>      Identifier column (default: path).",
        "  --delimiter <char>     Manifest field delimiter, `tab` for tabs (default: ,).",
        "  --no-headers           Manifest has no header row (identifier, label).",
        "  --seed <string>        Seed for a reproducible split (default: stratify-v1).",
        "  --train <f64>          Train fraction (default: 0.7).",
        "  --val <f64>            Validation fraction (default: 0.2).",
        "  --test <f64>           Test fraction (default: 0.1).",
    ]
    .join("\n")
}
