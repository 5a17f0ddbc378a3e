// 🧭 Dependency Index - fixed sampling orders for one full dataset
//
// Three ordered key sequences, computed once per full dataset:
//   primary order        - person keys
//   orphan bank order    - banks no person and no transaction points at
//   orphan source order  - sources no person points at
//
// Every subset takes a prefix of each sequence. A larger fraction always takes
// a longer prefix of the same sequence, which is what makes subsets nest.

use crate::config::{OrderStrategy, Schema};
use crate::error::SubsetResult;
use crate::table::{Dataset, Table};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Rounding rule used for every prefix length. Recorded in manifests.
pub const ROUNDING_RULE: &str = "half-to-even";

/// Number of keys a fraction selects from a sequence of `len` keys.
///
/// `round_half_to_even(len * fraction)`, clamped to `len`. Monotonic in
/// `fraction`, so prefixes for growing fractions nest.
pub fn take_count(len: usize, fraction: f64) -> usize {
    let k = (len as f64 * fraction).round_ties_even();
    if k <= 0.0 {
        0
    } else {
        (k as usize).min(len)
    }
}

// ============================================================================
// KEY ORDER
// ============================================================================

/// An ordered key sequence sampled by prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyOrder(Vec<String>);

impl KeyOrder {
    pub fn new(keys: Vec<String>) -> Self {
        KeyOrder(keys)
    }

    /// Apply an ordering strategy to keys given in file order.
    pub fn arranged(keys: Vec<String>, strategy: &OrderStrategy) -> Self {
        match strategy {
            OrderStrategy::File => KeyOrder(keys),
            OrderStrategy::Seeded { seed } => {
                let mut ranked: Vec<(String, usize, String)> = keys
                    .into_iter()
                    .enumerate()
                    .map(|(pos, key)| (seeded_rank(*seed, &key), pos, key))
                    .collect();
                ranked.sort();
                KeyOrder(ranked.into_iter().map(|(_, _, key)| key).collect())
            }
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The first `take_count(len, fraction)` keys.
    pub fn prefix(&self, fraction: f64) -> &[String] {
        &self.0[..take_count(self.0.len(), fraction)]
    }

    pub fn prefix_set(&self, fraction: f64) -> HashSet<String> {
        self.prefix(fraction).iter().cloned().collect()
    }
}

fn seeded_rank(seed: u64, key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}", seed, key));
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// DEPENDENCY INDEX
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyIndex {
    pub primary_order: KeyOrder,
    pub orphan_bank_order: KeyOrder,
    pub orphan_source_order: KeyOrder,
}

impl DependencyIndex {
    /// Pure function of the full dataset.
    pub fn build(dataset: &Dataset, schema: &Schema, strategy: &OrderStrategy) -> SubsetResult<Self> {
        let persons = &dataset.persons;
        let primary: Vec<String> = persons
            .column_values(&schema.persons.key)?
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut used_banks = persons.non_empty_values(&schema.persons.bank)?;
        if dataset.transactions.has_column(&schema.transactions.deriving_bank) {
            used_banks.extend(
                dataset
                    .transactions
                    .non_empty_values(&schema.transactions.deriving_bank)?,
            );
        }
        let orphan_banks = unreferenced_keys(&dataset.banks, &schema.banks.key, &used_banks)?;

        let used_sources = persons.non_empty_values(&schema.persons.source)?;
        let orphan_sources = unreferenced_keys(&dataset.sources, &schema.sources.key, &used_sources)?;

        tracing::debug!(
            persons = primary.len(),
            orphan_banks = orphan_banks.len(),
            orphan_sources = orphan_sources.len(),
            order = %strategy,
            "dependency index built"
        );

        Ok(DependencyIndex {
            primary_order: KeyOrder::arranged(primary, strategy),
            orphan_bank_order: KeyOrder::arranged(orphan_banks, strategy),
            orphan_source_order: KeyOrder::arranged(orphan_sources, strategy),
        })
    }
}

/// Keys of `table` not in `used`, in file order.
fn unreferenced_keys(table: &Table, key: &str, used: &HashSet<String>) -> SubsetResult<Vec<String>> {
    Ok(table
        .column_values(key)?
        .into_iter()
        .filter(|k| !used.contains(*k))
        .map(str::to_string)
        .collect())
}
