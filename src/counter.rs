use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Shared two-level tally: attribute -> value -> occurrence count.
///
/// Mutation is additive only and goes through [`AttributeCounter::record`].
/// Inner maps are created on the first occurrence of an attribute, so an
/// attribute key never maps to an empty set of values.
#[derive(Debug, Default)]
pub struct AttributeCounter {
    attributes: DashMap<String, DashMap<String, u64>>,
}

impl AttributeCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the count for `(attribute, value)`, creating either level on first use.
    pub fn record(&self, attribute: &str, value: &str) {
        // Fast path holds only a shared lock on the outer shard.
        if let Some(values) = self.attributes.get(attribute) {
            *values.entry(value.to_owned()).or_insert(0) += 1;
            return;
        }
        let values = self.attributes.entry(attribute.to_owned()).or_default();
        *values.entry(value.to_owned()).or_insert(0) += 1;
    }

    /// Freeze the counter once every writer is gone.
    ///
    /// Hands the counter back while another handle to it is still alive,
    /// which is the case until every extraction task has been joined.
    pub fn freeze(counter: Arc<Self>) -> Result<FrozenCounts, Arc<Self>> {
        Arc::try_unwrap(counter).map(|counter| FrozenCounts {
            attributes: counter.attributes,
        })
    }

    /// Copy of the counts recorded so far. Later records are not reflected.
    pub fn copy_counts(&self) -> FrozenCounts {
        FrozenCounts {
            attributes: self.attributes.clone(),
        }
    }
}

/// Read-only view of the counts after the extraction barrier.
#[derive(Debug, Default)]
pub struct FrozenCounts {
    attributes: DashMap<String, DashMap<String, u64>>,
}

impl FrozenCounts {
    pub fn count(&self, attribute: &str, value: &str) -> u64 {
        self.attributes
            .get(attribute)
            .and_then(|values| values.get(value).map(|count| *count))
            .unwrap_or(0)
    }

    /// Attribute names with at least one recorded value, sorted.
    pub fn attributes(&self) -> Vec<String> {
        let mut names: Vec<String> = self.attributes.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn values(&self, attribute: &str) -> Option<HashMap<String, u64>> {
        self.attributes.get(attribute).map(|values| {
            values
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect()
        })
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn total_occurrences(&self) -> u64 {
        self.attributes
            .iter()
            .map(|values| values.iter().map(|e| *e.value()).sum::<u64>())
            .sum()
    }

    /// Deterministically ordered copy of every count.
    pub fn snapshot(&self) -> BTreeMap<String, BTreeMap<String, u64>> {
        self.attributes
            .iter()
            .map(|values| {
                let inner: BTreeMap<String, u64> = values
                    .iter()
                    .map(|e| (e.key().clone(), *e.value()))
                    .collect();
                (values.key().clone(), inner)
            })
            .collect()
    }
}
