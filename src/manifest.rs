// 🧾 Provenance Manifest - what produced this subset directory
//
// Each subset_<pct>/ carries manifest.json next to its five CSV files:
// fraction, inclusion policy, ordering, rounding rule, row counts and
// SHA-256 digests. The verifier and the audit command read it back without
// re-running the builder.

use crate::builder::{InclusionPolicy, Subset};
use crate::closure::{check_closure, ClosureReport};
use crate::config::{OrderStrategy, Schema};
use crate::error::{SubsetError, SubsetResult};
use crate::index::ROUNDING_RULE;
use crate::loader::{load_dataset, LoadMode};
use crate::table::TableKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableStat {
    pub table: String,
    pub file: String,
    pub rows: usize,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubsetManifest {
    /// Unique per build run
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub source_dir: String,
    pub fraction: f64,
    pub policy: InclusionPolicy,
    pub order: OrderStrategy,
    pub rounding: String,
    pub tables: Vec<TableStat>,
    /// SHA-256 over the table digests; equal for byte-identical rebuilds
    pub content_hash: String,
}

impl SubsetManifest {
    /// Describe a subset already written to `dir`.
    pub fn for_written_subset(
        subset: &Subset,
        dir: &Path,
        source_dir: &Path,
        order: &OrderStrategy,
        schema: &Schema,
    ) -> SubsetResult<Self> {
        let mut tables = Vec::with_capacity(TableKind::ALL.len());
        for kind in TableKind::ALL {
            let file = schema.file_name(kind);
            tables.push(TableStat {
                table: kind.label().to_string(),
                file: file.to_string(),
                rows: subset.tables.table(kind).len(),
                sha256: file_digest(&dir.join(file))?,
            });
        }
        let content_hash = content_hash(&tables);

        Ok(SubsetManifest {
            run_id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            source_dir: source_dir.display().to_string(),
            fraction: subset.fraction,
            policy: subset.policy,
            order: order.clone(),
            rounding: ROUNDING_RULE.to_string(),
            tables,
            content_hash,
        })
    }

    pub fn rows(&self, kind: TableKind) -> Option<usize> {
        self.tables
            .iter()
            .find(|t| t.table == kind.label())
            .map(|t| t.rows)
    }
}

pub fn file_digest(path: &Path) -> SubsetResult<String> {
    let bytes = std::fs::read(path).map_err(|e| SubsetError::io(path, e))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

fn content_hash(tables: &[TableStat]) -> String {
    let mut hasher = Sha256::new();
    for t in tables {
        hasher.update(format!("{}={};", t.file, t.sha256));
    }
    format!("{:x}", hasher.finalize())
}

pub fn write_manifest(dir: &Path, manifest: &SubsetManifest) -> SubsetResult<()> {
    let path = dir.join(MANIFEST_FILE);
    let json = serde_json::to_string_pretty(manifest).map_err(|e| SubsetError::Manifest {
        path: path.clone(),
        source: e,
    })?;
    std::fs::write(&path, json).map_err(|e| SubsetError::io(&path, e))
}

/// `Ok(None)` when the directory has no manifest.
pub fn read_manifest(dir: &Path) -> SubsetResult<Option<SubsetManifest>> {
    let path = dir.join(MANIFEST_FILE);
    if !path.is_file() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(&path).map_err(|e| SubsetError::io(&path, e))?;
    let manifest = serde_json::from_str(&raw).map_err(|e| SubsetError::Manifest { path, source: e })?;
    Ok(Some(manifest))
}

// ============================================================================
// AUDIT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableAudit {
    pub table: String,
    pub file: String,
    pub rows: usize,
    pub sha256: String,
    /// None when there is no manifest to compare against
    pub digest_matches: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub dir: String,
    pub manifest: Option<SubsetManifest>,
    pub tables: Vec<TableAudit>,
    pub closure: ClosureReport,
}

impl AuditReport {
    /// Files whose digest no longer matches the manifest.
    pub fn modified_files(&self) -> Vec<&str> {
        self.tables
            .iter()
            .filter(|t| t.digest_matches == Some(false))
            .map(|t| t.file.as_str())
            .collect()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("📁 {}\n", self.dir));
        match &self.manifest {
            Some(m) => out.push_str(&format!(
                "   fraction {} | policy {} | order {} | rounding {} | run {} at {}\n",
                m.fraction,
                m.policy,
                m.order,
                m.rounding,
                m.run_id,
                m.created_at.to_rfc3339()
            )),
            None => out.push_str("   (no manifest)\n"),
        }
        for t in &self.tables {
            let status = match t.digest_matches {
                Some(true) => "✓",
                Some(false) => "✗ modified",
                None => "-",
            };
            out.push_str(&format!("   {:<14} {:>8} rows  {}\n", t.table, t.rows, status));
        }
        out.push_str(&format!("   closure: {}\n", self.closure.summary()));
        out
    }
}

/// Reload a subset directory and report counts, provenance, digests and closure.
pub fn audit_subset(dir: &Path, schema: &Schema) -> SubsetResult<AuditReport> {
    let dataset = load_dataset(dir, schema, LoadMode::Lenient)?;
    let manifest = read_manifest(dir)?;
    if manifest.is_none() {
        tracing::warn!(dir = %dir.display(), "no manifest found; provenance unknown");
    }

    let mut tables = Vec::new();
    for kind in TableKind::ALL {
        let file = schema.file_name(kind);
        let sha256 = file_digest(&dir.join(file))?;
        let digest_matches = manifest.as_ref().map(|m| {
            m.tables
                .iter()
                .any(|t| t.file == file && t.sha256 == sha256)
        });
        tables.push(TableAudit {
            table: kind.label().to_string(),
            file: file.to_string(),
            rows: dataset.table(kind).len(),
            sha256,
            digest_matches,
        });
    }

    let policy = manifest
        .as_ref()
        .map(|m| m.policy)
        .unwrap_or(InclusionPolicy::Both);
    let closure = check_closure(&dataset, schema, policy)?;

    Ok(AuditReport {
        dir: dir.display().to_string(),
        manifest,
        tables,
        closure,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SubsetBuilder;
    use crate::loader::write_dataset;
    use crate::test_support::sample_dataset;

    fn written_subset(dir: &Path, fraction: f64) -> SubsetManifest {
        let dataset = sample_dataset();
        let schema = Schema::default();
        let builder = SubsetBuilder::new(&dataset, &schema, &OrderStrategy::File).unwrap();
        let subset = builder.build_subset(fraction, InclusionPolicy::Any).unwrap();
        write_dataset(dir, &subset.tables, &schema).unwrap();
        let manifest =
            SubsetManifest::for_written_subset(&subset, dir, Path::new("full"), &OrderStrategy::File, &schema)
                .unwrap();
        write_manifest(dir, &manifest).unwrap();
        manifest
    }

    #[test]
    fn test_manifest_round_trip_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = written_subset(dir.path(), 0.3);

        let reread = read_manifest(dir.path()).unwrap().unwrap();
        assert_eq!(reread, manifest);
        assert_eq!(reread.rounding, "half-to-even");
        assert_eq!(reread.rows(TableKind::Person), Some(3));
        assert_eq!(reread.rows(TableKind::Transaction), Some(4));
        assert_eq!(reread.tables[0].sha256.len(), 64);
    }

    #[test]
    fn test_content_hash_is_stable_across_rebuilds() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();

        let first = written_subset(a.path(), 0.5);
        let second = written_subset(b.path(), 0.5);

        assert_ne!(first.run_id, second.run_id);
        assert_eq!(first.content_hash, second.content_hash);
    }

    #[test]
    fn test_audit_detects_modified_file() {
        let dir = tempfile::tempdir().unwrap();
        written_subset(dir.path(), 0.5);

        let clean = audit_subset(dir.path(), &Schema::default()).unwrap();
        println!("{}", clean.render());
        assert!(clean.modified_files().is_empty());
        assert!(clean.closure.is_closed());

        let path = dir.path().join("fonti.csv");
        let mut text = std::fs::read_to_string(&path).unwrap();
        text.push_str("s99,Nuova,IT,0.1,Fonte\n");
        std::fs::write(&path, text).unwrap();

        let dirty = audit_subset(dir.path(), &Schema::default()).unwrap();
        assert_eq!(dirty.modified_files(), vec!["fonti.csv"]);
    }

    #[test]
    fn test_audit_without_manifest() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), &sample_dataset(), &Schema::default()).unwrap();

        let report = audit_subset(dir.path(), &Schema::default()).unwrap();
        assert!(report.manifest.is_none());
        assert!(report.tables.iter().all(|t| t.digest_matches.is_none()));
        assert!(report.render().contains("no manifest"));
    }
}
