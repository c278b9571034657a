use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Split, SplitKind};

/// Item counts per subset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitCounts {
    pub train: usize,
    #[serde(rename = "val")]
    pub validation: usize,
    pub test: usize,
}

impl SplitCounts {
    pub fn total(&self) -> usize {
        self.train + self.validation + self.test
    }

    fn bump(&mut self, kind: SplitKind) {
        let slot = match kind {
            SplitKind::Train => &mut self.train,
            SplitKind::Validation => &mut self.validation,
            SplitKind::Test => &mut self.test,
        };
        *slot += 1;
    }
}

pub fn subset_counts(split: &Split) -> SplitCounts {
    SplitCounts {
        train: split.train.len(),
        validation: split.validation.len(),
        test: split.test.len(),
    }
}

/// Per-label subset counts, keyed by the value of `label_field`.
///
/// Items without the attribute are counted under an empty label.
pub fn class_counts(split: &Split, label_field: &str) -> BTreeMap<String, SplitCounts> {
    let mut out: BTreeMap<String, SplitCounts> = BTreeMap::new();
    for (kind, item) in split.iter() {
        let label = item.attribute(label_field).unwrap_or_default();
        out.entry(label.to_string()).or_default().bump(kind);
    }
    out
}
