mod support;

use std::collections::BTreeSet;

use support::{images::write_image_tree, stratify_env::StratifyEnvGuard};

use stratify::config::{self, AppConfig};
use stratify::dataset::export::{ExportMetadata, export_split, load_split_export};
use stratify::dataset::manifest::{ManifestOptions, load_image_folder, load_manifest};
use stratify::dataset::split::{SplitError, SplitKind, class_counts, rng_from_seed, split};
use stratify::dataset::{DEFAULT_LABEL_FIELD, Item};

#[test]
fn image_tree_split_survives_export() {
    let temp = tempfile::tempdir().expect("tempdir");
    let images = temp.path().join("images");
    write_image_tree(
        &images,
        &[("cardinal", 40), ("heron", 12), ("kingfisher", 7), ("owl", 3)],
    );

    let dataset = load_image_folder(&images).expect("load images");
    assert_eq!(dataset.len(), 62);

    let config = AppConfig::default();
    let ratios = config.split.ratios().expect("default ratios");
    let split = split(
        &dataset,
        DEFAULT_LABEL_FIELD,
        &ratios,
        &mut rng_from_seed(&config.split.seed),
    )
    .expect("split");

    for (label, counts) in class_counts(&split, DEFAULT_LABEL_FIELD) {
        assert!(
            counts.train > 0 && counts.validation > 0 && counts.test > 0,
            "{label} not in every subset: {counts:?}"
        );
    }
    let cardinal = class_counts(&split, DEFAULT_LABEL_FIELD)["cardinal"];
    assert_eq!((cardinal.train, cardinal.validation, cardinal.test), (28, 8, 4));

    let out = temp.path().join("split");
    let meta = ExportMetadata {
        label_field: DEFAULT_LABEL_FIELD.to_string(),
        seed: Some(config.split.seed.clone()),
        ratios,
    };
    export_split(&split, &out, &meta).expect("export");
    let loaded = load_split_export(&out).expect("load export");
    assert_eq!(loaded.split, split);

    let mut seen = BTreeSet::new();
    for kind in SplitKind::ALL {
        for id in loaded.split.identifiers(kind) {
            assert!(seen.insert(id.to_string()), "{id} exported twice");
        }
    }
    let expected: BTreeSet<_> = dataset
        .items()
        .iter()
        .map(|item| item.identifier().to_string())
        .collect();
    assert_eq!(seen, expected);
}

#[test]
fn manifest_with_custom_label_column() {
    let temp = tempfile::tempdir().expect("tempdir");
    let manifest = temp.path().join("birds.tsv");
    let mut text = String::from("file\tspecies\tsource\n");
    for idx in 0..10 {
        text.push_str(&format!("a/{idx}.jpg\tA\tcam1\n"));
        text.push_str(&format!("b/{idx}.jpg\tB\tcam2\n"));
    }
    std::fs::write(&manifest, text).expect("write manifest");

    let options = ManifestOptions {
        identifier_field: "file".to_string(),
        delimiter: b'\t',
        has_headers: true,
    };
    let dataset = load_manifest(&manifest, &options).expect("load manifest");
    let ratios = AppConfig::default().split.ratios().expect("ratios");

    let err = split(&dataset, DEFAULT_LABEL_FIELD, &ratios, &mut rng_from_seed("x"))
        .expect_err("label column is named species");
    assert_eq!(err, SplitError::UnknownLabelField("label".to_string()));

    let split = split(&dataset, "species", &ratios, &mut rng_from_seed("x")).expect("split");
    assert_eq!(
        (split.train.len(), split.validation.len(), split.test.len()),
        (14, 4, 2)
    );
    assert!(
        split
            .test
            .iter()
            .all(|item: &Item| item.attribute("source").is_some())
    );
}

#[test]
fn config_home_override_is_used_for_settings() {
    let temp = tempfile::tempdir().expect("tempdir");
    let _env = StratifyEnvGuard::set_config_home(temp.path().to_path_buf());

    assert_eq!(config::load_or_default().expect("defaults"), AppConfig::default());

    let mut settings = AppConfig::default();
    settings.split.seed = "field-season-2".to_string();
    config::save(&settings).expect("save");
    assert!(temp.path().join(".stratify").join(config::CONFIG_FILE_NAME).is_file());
    assert_eq!(config::load_or_default().expect("reload"), settings);
}
