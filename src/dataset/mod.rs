//! Labeled dataset model plus loading, splitting and export helpers.

use std::collections::BTreeMap;

pub mod export;
pub mod manifest;
pub mod split;

/// Attribute name used for labels derived from class folders.
pub const DEFAULT_LABEL_FIELD: &str = "label";

/// One labeled example.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    identifier: String,
    attributes: BTreeMap<String, String>,
}

impl Item {
    /// Create an item from its identifier and named attributes.
    pub fn new(identifier: impl Into<String>, attributes: BTreeMap<String, String>) -> Self {
        Self {
            identifier: identifier.into(),
            attributes,
        }
    }

    /// Shorthand for an item carrying a single `label` attribute.
    pub fn labeled(identifier: impl Into<String>, label: impl Into<String>) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert(DEFAULT_LABEL_FIELD.to_string(), label.into());
        Self::new(identifier, attributes)
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Look up a named attribute.
    pub fn attribute(&self, field: &str) -> Option<&str> {
        self.attributes.get(field).map(String::as_str)
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }
}

/// Ordered items sharing a common schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    schema: Vec<String>,
    items: Vec<Item>,
}

impl Dataset {
    /// Build a dataset from a schema (attribute names) and its items.
    pub fn new(schema: Vec<String>, items: Vec<Item>) -> Self {
        Self { schema, items }
    }

    /// Build a dataset from `(identifier, label)` pairs.
    pub fn from_labeled<I, S, L>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, L)>,
        S: Into<String>,
        L: Into<String>,
    {
        let items = pairs
            .into_iter()
            .map(|(identifier, label)| Item::labeled(identifier, label))
            .collect();
        Self::new(vec![DEFAULT_LABEL_FIELD.to_string()], items)
    }

    pub fn schema(&self) -> &[String] {
        &self.schema
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.schema.iter().any(|name| name == field)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Count items per value of `field`, in deterministic order.
    ///
    /// Items lacking the attribute are skipped.
    pub fn label_counts(&self, field: &str) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for item in &self.items {
            if let Some(label) = item.attribute(field) {
                *counts.entry(label.to_string()).or_insert(0) += 1;
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_counts_are_grouped_and_sorted() {
        let dataset = Dataset::from_labeled([("a", "wren"), ("b", "finch"), ("c", "wren")]);
        let counts = dataset.label_counts(DEFAULT_LABEL_FIELD);
        assert_eq!(
            counts.into_iter().collect::<Vec<_>>(),
            vec![("finch".to_string(), 1), ("wren".to_string(), 2)]
        );
    }

    #[test]
    fn labeled_items_expose_label_attribute() {
        let item = Item::labeled("birds/wren/1.jpg", "wren");
        assert_eq!(item.identifier(), "birds/wren/1.jpg");
        assert_eq!(item.attribute("label"), Some("wren"));
        assert_eq!(item.attribute("species"), None);
    }
}
