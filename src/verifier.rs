// ✅ Subset Verifier - is `small` really nested inside `big`?
//
// Works from directory contents alone (both reloaded from disk), so it also
// catches subsets produced by some other generator. Checks, in order:
//   1. all five tables exist in both directories
//   2. manifests (if both present) agree on the inclusion policy
//   3. key nesting for persons, documents, banks, sources
//   4. row nesting on shared columns for all five tables
// The first failed check fails the whole verification.

use crate::config::Schema;
use crate::error::{SubsetError, SubsetResult};
use crate::loader::{load_dataset, missing_tables, LoadMode};
use crate::manifest::{read_manifest, SubsetManifest};
use crate::table::{Dataset, Table, TableKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyOptions {
    pub skip_keys: bool,
    pub skip_rows: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableComparison {
    pub table: String,
    pub small_rows: usize,
    pub big_rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub small: String,
    pub big: String,
    pub tables: Vec<TableComparison>,
    pub keys_checked: bool,
    pub rows_checked: bool,
}

impl VerificationReport {
    pub fn render(&self) -> String {
        let mut out = format!("Comparing: {} ⊂ {}\n", self.small, self.big);
        out.push_str("---- Row summary ----\n");
        for t in &self.tables {
            out.push_str(&format!("{:<14}{:>8} ⊂ {:<8}\n", t.table, t.small_rows, t.big_rows));
        }
        out.push_str("---------------------\n");
        if self.keys_checked {
            out.push_str("OK keys: persons, documents, banks, sources\n");
        }
        if self.rows_checked {
            out.push_str("OK rows: persons, documents, banks, sources, transactions\n");
        }
        out
    }
}

/// Prove that the subset in `small` is nested in the subset in `big`.
///
/// Violations come back as `NestingViolation`, `RowNestingViolation`,
/// `NoSharedColumns` or `PolicyMismatch`; missing files or columns as
/// `MissingTable` / `MissingColumn`.
pub fn verify_nested(
    small: &Path,
    big: &Path,
    options: VerifyOptions,
    schema: &Schema,
) -> SubsetResult<VerificationReport> {
    let mut missing = missing_tables(small, schema);
    missing.extend(missing_tables(big, schema));
    if !missing.is_empty() {
        return Err(SubsetError::MissingTable { missing });
    }

    check_manifests(small, big)?;

    let small_data = load_dataset(small, schema, LoadMode::Lenient)?;
    let big_data = load_dataset(big, schema, LoadMode::Lenient)?;

    let tables: Vec<TableComparison> = TableKind::ALL
        .iter()
        .map(|&kind| TableComparison {
            table: kind.label().to_string(),
            small_rows: small_data.table(kind).len(),
            big_rows: big_data.table(kind).len(),
        })
        .collect();

    if !options.skip_keys {
        verify_keys(&small_data, &big_data, schema)?;
        tracing::info!("key nesting OK: persons, documents, banks, sources");
    }

    if !options.skip_rows {
        verify_rows(&small_data, &big_data)?;
        tracing::info!("row nesting OK: all five tables");
    }

    Ok(VerificationReport {
        small: small.display().to_string(),
        big: big.display().to_string(),
        tables,
        keys_checked: !options.skip_keys,
        rows_checked: !options.skip_rows,
    })
}

/// A manifest that cannot be parsed is treated like a missing one.
fn usable_manifest(dir: &Path) -> SubsetResult<Option<SubsetManifest>> {
    match read_manifest(dir) {
        Ok(manifest) => Ok(manifest),
        Err(err @ SubsetError::Manifest { .. }) => {
            tracing::warn!(dir = %dir.display(), "ignoring unreadable manifest: {}", err);
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn check_manifests(small: &Path, big: &Path) -> SubsetResult<()> {
    let (small_manifest, big_manifest) = match (usable_manifest(small)?, usable_manifest(big)?) {
        (Some(s), Some(b)) => (s, b),
        _ => {
            tracing::warn!("manifest missing in at least one directory; policy consistency not checked");
            return Ok(());
        }
    };

    if small_manifest.policy != big_manifest.policy {
        return Err(SubsetError::PolicyMismatch {
            small: small_manifest.policy.to_string(),
            big: big_manifest.policy.to_string(),
        });
    }
    if small_manifest.fraction > big_manifest.fraction {
        tracing::warn!(
            small = small_manifest.fraction,
            big = big_manifest.fraction,
            "the 'small' directory was built at a larger fraction"
        );
    }
    Ok(())
}

/// Primary-key sets of keyed tables must nest.
pub fn verify_keys(small: &Dataset, big: &Dataset, schema: &Schema) -> SubsetResult<()> {
    for kind in TableKind::KEYED {
        let column = schema.key_column(kind);
        let small_keys = small.table(kind).column_values(column)?;
        let big_keys: HashSet<&str> = big.table(kind).column_values(column)?.into_iter().collect();

        let mut seen = HashSet::new();
        let missing: Vec<&str> = small_keys
            .into_iter()
            .filter(|k| !big_keys.contains(k) && seen.insert(*k))
            .collect();

        if let Some(example) = missing.first() {
            return Err(SubsetError::NestingViolation {
                table: kind.label().to_string(),
                count: missing.len(),
                example: example.to_string(),
            });
        }
    }
    Ok(())
}

/// Deduplicated rows of `small`, restricted to shared columns, must all appear in `big`.
pub fn verify_rows(small: &Dataset, big: &Dataset) -> SubsetResult<()> {
    for kind in TableKind::ALL {
        verify_table_rows(small.table(kind), big.table(kind))?;
    }
    Ok(())
}

fn verify_table_rows(small: &Table, big: &Table) -> SubsetResult<()> {
    let label = small.kind().label().to_string();
    let shared = small.shared_columns(big);
    if shared.is_empty() {
        return Err(SubsetError::NoSharedColumns { table: label });
    }

    let big_rows: HashSet<Vec<String>> = big.project(&shared)?.into_iter().collect();

    let mut seen = HashSet::new();
    let mut missing = Vec::new();
    for row in small.project(&shared)? {
        if !big_rows.contains(&row) && seen.insert(row.clone()) {
            missing.push(row);
        }
    }

    if let Some(example) = missing.first() {
        return Err(SubsetError::RowNestingViolation {
            table: label,
            count: missing.len(),
            example: format_row(&shared, example),
        });
    }
    Ok(())
}

fn format_row(columns: &[String], row: &[String]) -> String {
    let fields: Vec<String> = columns
        .iter()
        .zip(row)
        .map(|(c, v)| format!("{}={}", c, v))
        .collect();
    format!("{{{}}}", fields.join(", "))
}
