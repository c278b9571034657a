//! Stratified train/validation/test splitting.
//!
//! Items are grouped by a label attribute and every group is divided on its own,
//! so each class keeps its proportions in every subset even when class sizes are
//! small or uneven.

mod stats;

use std::collections::BTreeMap;
use std::fmt;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Dataset, Item};

pub use stats::{SplitCounts, class_counts, subset_counts};

/// Allowed drift of the ratio sum away from `1.0`.
pub const RATIO_TOLERANCE: f64 = 1e-6;

/// Which subset of a split an item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SplitKind {
    #[serde(rename = "train")]
    Train,
    #[serde(rename = "val")]
    Validation,
    #[serde(rename = "test")]
    Test,
}

impl SplitKind {
    /// All subsets in export order.
    pub const ALL: [SplitKind; 3] = [SplitKind::Train, SplitKind::Validation, SplitKind::Test];

    /// Stable name used in exports (`train`, `val`, `test`).
    pub fn as_str(self) -> &'static str {
        match self {
            SplitKind::Train => "train",
            SplitKind::Validation => "val",
            SplitKind::Test => "test",
        }
    }
}

impl fmt::Display for SplitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SplitError {
    #[error(
        "invalid split ratios train={train} val={val} test={test} (expected non-negative values summing to 1.0 with train > 0)"
    )]
    InvalidRatio { train: f64, val: f64, test: f64 },
    #[error("cannot split an empty dataset")]
    EmptyDataset,
    #[error("unknown label field `{0}`")]
    UnknownLabelField(String),
}

/// Train/validation/test fractions, validated to sum to `1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitRatios {
    train: f64,
    val: f64,
    test: f64,
}

impl SplitRatios {
    pub fn new(train: f64, val: f64, test: f64) -> Result<Self, SplitError> {
        let ratios = Self { train, val, test };
        ratios.validate()?;
        Ok(ratios)
    }

    /// Build ratios from held-out fractions, giving the remainder to train.
    pub fn from_holdout(val_fraction: f64, test_fraction: f64) -> Result<Self, SplitError> {
        Self::new(1.0 - val_fraction - test_fraction, val_fraction, test_fraction)
    }

    pub fn train(&self) -> f64 {
        self.train
    }

    pub fn val(&self) -> f64 {
        self.val
    }

    pub fn test(&self) -> f64 {
        self.test
    }

    fn validate(&self) -> Result<(), SplitError> {
        let values = [self.train, self.val, self.test];
        let in_range = values.iter().all(|v| v.is_finite() && *v >= 0.0);
        let sum: f64 = values.iter().sum();
        if !in_range || self.train <= 0.0 || (sum - 1.0).abs() > RATIO_TOLERANCE {
            return Err(SplitError::InvalidRatio {
                train: self.train,
                val: self.val,
                test: self.test,
            });
        }
        Ok(())
    }
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: 0.7,
            val: 0.2,
            test: 0.1,
        }
    }
}

/// A dataset partitioned into three disjoint subsets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<Item>,
    pub validation: Vec<Item>,
    pub test: Vec<Item>,
}

impl Split {
    pub fn subset(&self, kind: SplitKind) -> &[Item] {
        match kind {
            SplitKind::Train => &self.train,
            SplitKind::Validation => &self.validation,
            SplitKind::Test => &self.test,
        }
    }

    fn subset_mut(&mut self, kind: SplitKind) -> &mut Vec<Item> {
        match kind {
            SplitKind::Train => &mut self.train,
            SplitKind::Validation => &mut self.validation,
            SplitKind::Test => &mut self.test,
        }
    }

    /// Total number of items across all subsets.
    pub fn len(&self) -> usize {
        self.train.len() + self.validation.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate every item tagged with its subset, train first.
    pub fn iter(&self) -> impl Iterator<Item = (SplitKind, &Item)> {
        SplitKind::ALL
            .into_iter()
            .flat_map(move |kind| self.subset(kind).iter().map(move |item| (kind, item)))
    }

    pub fn identifiers(&self, kind: SplitKind) -> Vec<&str> {
        self.subset(kind).iter().map(Item::identifier).collect()
    }

    pub(crate) fn push(&mut self, kind: SplitKind, item: Item) {
        self.subset_mut(kind).push(item);
    }
}

/// Build a reproducible RNG from a human-readable seed string.
pub fn rng_from_seed(seed: &str) -> StdRng {
    let hash = blake3::hash(format!("stratify|{seed}").as_bytes());
    StdRng::from_seed(*hash.as_bytes())
}

/// Number of items each subset receives from a class of `n` items.
///
/// Train takes `round(n * train)`, test takes `round(rest * test / (val + test))`
/// of what is left, and validation absorbs the remainder. A subset with a
/// positive ratio is never left empty while the class still has an item for
/// every positive-ratio subset.
pub fn allocate_counts(n: usize, ratios: &SplitRatios) -> SplitCounts {
    let wants_val = ratios.val > 0.0;
    let wants_test = ratios.test > 0.0;
    let reserved = usize::from(wants_val) + usize::from(wants_test);

    let mut train = (((n as f64) * ratios.train).round() as usize).min(n);
    if n > reserved {
        train = train.clamp(1, n - reserved);
    } else {
        train = n.min(1);
    }

    let rest = n - train;
    let holdout = ratios.val + ratios.test;
    let mut test = if holdout > 0.0 {
        (((rest as f64) * (ratios.test / holdout)).round() as usize).min(rest)
    } else {
        0
    };
    if wants_test && test == 0 && rest > usize::from(wants_val) {
        test = 1;
    }
    if wants_val && test == rest && rest > usize::from(wants_test) {
        test -= 1;
    }

    SplitCounts {
        train,
        validation: rest - test,
        test,
    }
}

/// Partition `dataset` into class-stratified train/validation/test subsets.
///
/// Each label group is shuffled and drawn from without replacement (train, then
/// test, then validation), the groups are concatenated, and each resulting subset
/// is shuffled again so no subset keeps long runs of a single class.
pub fn split<R>(
    dataset: &Dataset,
    label_field: &str,
    ratios: &SplitRatios,
    rng: &mut R,
) -> Result<Split, SplitError>
where
    R: Rng + ?Sized,
{
    ratios.validate()?;
    if dataset.is_empty() {
        return Err(SplitError::EmptyDataset);
    }
    if !dataset.has_field(label_field) {
        return Err(SplitError::UnknownLabelField(label_field.to_string()));
    }

    let mut groups: BTreeMap<&str, Vec<&Item>> = BTreeMap::new();
    for item in dataset.items() {
        let label = item
            .attribute(label_field)
            .ok_or_else(|| SplitError::UnknownLabelField(label_field.to_string()))?;
        groups.entry(label).or_default().push(item);
    }

    let mut out = Split::default();
    for (label, mut members) in groups {
        let counts = allocate_counts(members.len(), ratios);
        tracing::debug!(
            label,
            train = counts.train,
            val = counts.validation,
            test = counts.test,
            "Allocated class"
        );
        members.shuffle(rng);
        let mut drawn = members.into_iter().cloned();
        for (kind, take) in [
            (SplitKind::Train, counts.train),
            (SplitKind::Test, counts.test),
        ] {
            for item in drawn.by_ref().take(take) {
                out.push(kind, item);
            }
        }
        out.validation.extend(drawn);
    }

    for kind in SplitKind::ALL {
        out.subset_mut(kind).shuffle(rng);
    }
    tracing::info!(
        train = out.train.len(),
        val = out.validation.len(),
        test = out.test.len(),
        "Split dataset by `{label_field}`"
    );
    Ok(out)
}
