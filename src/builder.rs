// ✂️ Subset Builder - one consistent sub-database per fraction
//
// Pipeline per fraction (all reads, no mutation of the full tables):
//   1. people    = prefix of the primary order
//   2. persons   = rows keyed by people
//   3. documents = rows whose owner is in people
//   4. transactions = rows admitted by the inclusion policy
//   5. banks     = referenced by persons + derived by transactions + orphan prefix
//   6. sources   = referenced by persons + orphan prefix
//   7. columns follow the full table's order

use crate::config::{validate_fraction, OrderStrategy, Schema};
use crate::error::{SubsetError, SubsetResult};
use crate::index::DependencyIndex;
use crate::table::{Dataset, Table};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ============================================================================
// INCLUSION POLICY
// ============================================================================

/// Which transactions survive, given sender/recipient membership.
///
/// Volumes are ordered: `both` ⊆ `src`, `dest` ⊆ `any`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum InclusionPolicy {
    /// Sender OR recipient selected
    #[default]
    Any,

    /// Sender AND recipient selected
    Both,

    /// Sender selected
    Src,

    /// Recipient selected
    Dest,
}

impl InclusionPolicy {
    pub const ALL: [InclusionPolicy; 4] = [
        InclusionPolicy::Any,
        InclusionPolicy::Both,
        InclusionPolicy::Src,
        InclusionPolicy::Dest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InclusionPolicy::Any => "any",
            InclusionPolicy::Both => "both",
            InclusionPolicy::Src => "src",
            InclusionPolicy::Dest => "dest",
        }
    }

    pub fn admits(&self, sender_selected: bool, recipient_selected: bool) -> bool {
        match self {
            InclusionPolicy::Any => sender_selected || recipient_selected,
            InclusionPolicy::Both => sender_selected && recipient_selected,
            InclusionPolicy::Src => sender_selected,
            InclusionPolicy::Dest => recipient_selected,
        }
    }
}

impl std::fmt::Display for InclusionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InclusionPolicy {
    type Err = SubsetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "any" => Ok(InclusionPolicy::Any),
            "both" => Ok(InclusionPolicy::Both),
            "src" => Ok(InclusionPolicy::Src),
            "dest" => Ok(InclusionPolicy::Dest),
            _ => Err(SubsetError::UnsupportedPolicy(s.to_string())),
        }
    }
}

impl TryFrom<String> for InclusionPolicy {
    type Error = SubsetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InclusionPolicy> for String {
    fn from(policy: InclusionPolicy) -> Self {
        policy.as_str().to_string()
    }
}

// ============================================================================
// SUBSET
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Subset {
    pub fraction: f64,
    pub policy: InclusionPolicy,
    pub tables: Dataset,
}

impl Subset {
    pub fn summary(&self) -> String {
        format!(
            "fraction {} ({}): {}",
            self.fraction,
            self.policy,
            self.tables.summary()
        )
    }
}

// ============================================================================
// SUBSET BUILDER
// ============================================================================

/// Derives subsets from one loaded full dataset. Load once, derive many.
pub struct SubsetBuilder<'a> {
    dataset: &'a Dataset,
    schema: &'a Schema,
    index: DependencyIndex,
}

impl<'a> SubsetBuilder<'a> {
    pub fn new(dataset: &'a Dataset, schema: &'a Schema, order: &OrderStrategy) -> SubsetResult<Self> {
        let index = DependencyIndex::build(dataset, schema, order)?;
        Ok(SubsetBuilder {
            dataset,
            schema,
            index,
        })
    }

    pub fn index(&self) -> &DependencyIndex {
        &self.index
    }

    pub fn build_subset(&self, fraction: f64, policy: InclusionPolicy) -> SubsetResult<Subset> {
        validate_fraction(fraction)?;

        let full = self.dataset;
        let schema = self.schema;

        let people = self.index.primary_order.prefix_set(fraction);

        let persons = full.persons.select_by_key(&schema.persons.key, &people)?;

        let owner = full.documents.require_column(&schema.documents.person)?;
        let documents = full.documents.filter_rows(|row| people.contains(&row[owner]));

        let transactions = select_transactions(&full.transactions, schema, &people, policy)?;

        let mut bank_ids = persons.non_empty_values(&schema.persons.bank)?;
        if transactions.has_column(&schema.transactions.deriving_bank) {
            bank_ids.extend(transactions.non_empty_values(&schema.transactions.deriving_bank)?);
        }
        bank_ids.extend(self.index.orphan_bank_order.prefix(fraction).iter().cloned());
        let banks = full.banks.select_by_key(&schema.banks.key, &bank_ids)?;

        let mut source_ids = persons.non_empty_values(&schema.persons.source)?;
        source_ids.extend(self.index.orphan_source_order.prefix(fraction).iter().cloned());
        let sources = full.sources.select_by_key(&schema.sources.key, &source_ids)?;

        let tables = Dataset {
            persons: persons.reorder_like(&full.persons),
            documents: documents.reorder_like(&full.documents),
            banks: banks.reorder_like(&full.banks),
            sources: sources.reorder_like(&full.sources),
            transactions: transactions.reorder_like(&full.transactions),
        };

        tracing::debug!(fraction, %policy, "built subset: {}", tables.summary());

        Ok(Subset {
            fraction,
            policy,
            tables,
        })
    }
}

/// Transactions admitted by `policy` for the selected people.
pub fn select_transactions(
    transactions: &Table,
    schema: &Schema,
    people: &HashSet<String>,
    policy: InclusionPolicy,
) -> SubsetResult<Table> {
    let sender = transactions.require_column(&schema.transactions.sender)?;
    let recipient = transactions.require_column(&schema.transactions.recipient)?;
    Ok(transactions.filter_rows(|row| {
        policy.admits(people.contains(&row[sender]), people.contains(&row[recipient]))
    }))
}
