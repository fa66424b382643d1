//! # Collect-Then-Fail Accumulation
//!
//! Resolution and validation never stop at the first problem. Every offending
//! item is recorded in a [`Findings`] accumulator, grouped under a key (a gap
//! kind, a platform version, ...), and the caller fails once at the end with
//! the complete list.
//!
//! ```
//! use bundle_reconcile::report::Findings;
//!
//! let mut findings: Findings<&str> = Findings::new();
//! findings.track("v4.18");
//! assert!(findings.is_empty());
//!
//! findings.record("v4.19", "rhods-operator.2.10.0");
//! assert_eq!(findings.len(), 1);
//! assert!(findings.into_result(|f| f.len()).is_err());
//! ```

use std::collections::BTreeMap;
use std::fmt;

/// Ordered accumulator of offending items, grouped by key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Findings<K: Ord> {
    groups: BTreeMap<K, Vec<String>>,
}

impl<K: Ord> Default for Findings<K> {
    fn default() -> Self {
        Self {
            groups: BTreeMap::new(),
        }
    }
}

impl<K: Ord> Findings<K> {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a key without items so it shows up when iterating.
    pub fn track(&mut self, key: K) {
        self.groups.entry(key).or_default();
    }

    /// Record one offending item under `key`.
    pub fn record(&mut self, key: K, item: impl Into<String>) {
        self.groups.entry(key).or_default().push(item.into());
    }

    /// Fold another accumulator into this one, keeping item order.
    pub fn merge(&mut self, other: Findings<K>) {
        for (key, items) in other.groups {
            self.groups.entry(key).or_default().extend(items);
        }
    }

    /// Items recorded under `key` (empty if none).
    pub fn items(&self, key: &K) -> &[String] {
        self.groups.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True when no item has been recorded under any key.
    pub fn is_empty(&self) -> bool {
        self.groups.values().all(Vec::is_empty)
    }

    /// Total number of recorded items across all keys.
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Iterate over every tracked key with its items, in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &[String])> {
        self.groups.iter().map(|(key, items)| (key, items.as_slice()))
    }

    /// `Ok(())` when empty, otherwise the error built from the findings.
    pub fn into_result<E>(self, to_error: impl FnOnce(Self) -> E) -> Result<(), E> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(to_error(self))
        }
    }
}

impl<K: Ord + fmt::Display> fmt::Display for Findings<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, items) in &self.groups {
            if items.is_empty() {
                continue;
            }
            if !first {
                writeln!(f)?;
            }
            first = false;
            write!(f, "  {}: {}", key, items.join(", "))?;
        }
        Ok(())
    }
}
