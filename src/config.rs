// ⚙️ Run Configuration - paths, fractions, policy, ordering and table schema
//
// Everything a run needs travels in one value. Defaults match the generator's
// CSV layout (persone.csv, banche.csv, ...), so an empty config file works.

use crate::builder::InclusionPolicy;
use crate::error::{SubsetError, SubsetResult};
use crate::table::TableKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ============================================================================
// ORDER STRATEGY
// ============================================================================

/// How the primary and orphan sequences are ordered before prefix selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum OrderStrategy {
    /// Keys in the order they appear in the source file
    File,

    /// Keys ordered by SHA-256 of `seed:key`, ties broken by file position
    Seeded { seed: u64 },
}

impl Default for OrderStrategy {
    fn default() -> Self {
        OrderStrategy::File
    }
}

impl std::fmt::Display for OrderStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStrategy::File => write!(f, "file"),
            OrderStrategy::Seeded { seed } => write!(f, "seeded({})", seed),
        }
    }
}

// ============================================================================
// TABLE SCHEMA
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonSchema {
    pub file: String,
    pub key: String,
    pub bank: String,
    pub document: String,
    pub source: String,
}

impl Default for PersonSchema {
    fn default() -> Self {
        PersonSchema {
            file: "persone.csv".to_string(),
            key: "matricola:ID".to_string(),
            bank: "id_banca".to_string(),
            document: "id_documento".to_string(),
            source: "id_fonte".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentSchema {
    pub file: String,
    pub key: String,
    /// Back-reference to the owning person
    pub person: String,
}

impl Default for DocumentSchema {
    fn default() -> Self {
        DocumentSchema {
            file: "documenti.csv".to_string(),
            key: "id_documento:ID".to_string(),
            person: "matricola".to_string(),
        }
    }
}

/// Referenced-only tables (banks, sources): a file and a primary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyedSchema {
    pub file: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionSchema {
    pub file: String,
    pub key: String,
    pub sender: String,
    pub recipient: String,
    /// Optional column; absent in older exports
    pub deriving_bank: String,
}

impl Default for TransactionSchema {
    fn default() -> Self {
        TransactionSchema {
            file: "transazioni.csv".to_string(),
            key: "id_transazione:ID".to_string(),
            sender: "matricola".to_string(),
            recipient: "destinatario".to_string(),
            deriving_bank: "id_banca_deriva".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schema {
    pub persons: PersonSchema,
    pub documents: DocumentSchema,
    pub banks: KeyedSchema,
    pub sources: KeyedSchema,
    pub transactions: TransactionSchema,
}

impl Default for Schema {
    fn default() -> Self {
        Schema {
            persons: PersonSchema::default(),
            documents: DocumentSchema::default(),
            banks: KeyedSchema {
                file: "banche.csv".to_string(),
                key: "id_banca:ID".to_string(),
            },
            sources: KeyedSchema {
                file: "fonti.csv".to_string(),
                key: "id_fonte:ID".to_string(),
            },
            transactions: TransactionSchema::default(),
        }
    }
}

impl Schema {
    pub fn file_name(&self, kind: TableKind) -> &str {
        match kind {
            TableKind::Person => &self.persons.file,
            TableKind::Document => &self.documents.file,
            TableKind::Bank => &self.banks.file,
            TableKind::Source => &self.sources.file,
            TableKind::Transaction => &self.transactions.file,
        }
    }

    pub fn key_column(&self, kind: TableKind) -> &str {
        match kind {
            TableKind::Person => &self.persons.key,
            TableKind::Document => &self.documents.key,
            TableKind::Bank => &self.banks.key,
            TableKind::Source => &self.sources.key,
            TableKind::Transaction => &self.transactions.key,
        }
    }

    /// Columns that take part in joins and therefore get normalized.
    /// The transaction id is an identifier but never joined on.
    pub fn join_columns(&self, kind: TableKind) -> Vec<&str> {
        match kind {
            TableKind::Person => vec![
                &self.persons.key,
                &self.persons.bank,
                &self.persons.document,
                &self.persons.source,
            ],
            TableKind::Document => vec![&self.documents.key, &self.documents.person],
            TableKind::Bank => vec![&self.banks.key],
            TableKind::Source => vec![&self.sources.key],
            TableKind::Transaction => vec![
                &self.transactions.sender,
                &self.transactions.recipient,
                &self.transactions.deriving_bank,
            ],
        }
    }

    /// Join columns a table may legitimately lack.
    pub fn is_optional_column(&self, kind: TableKind, column: &str) -> bool {
        kind == TableKind::Transaction && column == self.transactions.deriving_bank
    }
}

// ============================================================================
// SUBSET CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubsetConfig {
    /// Directory holding the full dataset
    pub input_dir: PathBuf,

    /// Where subset_<pct>/ directories are created
    pub output_root: PathBuf,

    pub fractions: Vec<f64>,

    pub policy: InclusionPolicy,

    pub order: OrderStrategy,

    /// Optional SQLite audit ledger
    pub ledger_path: Option<PathBuf>,

    pub schema: Schema,
}

impl Default for SubsetConfig {
    fn default() -> Self {
        SubsetConfig {
            input_dir: PathBuf::from("."),
            output_root: PathBuf::from("."),
            fractions: vec![0.25, 0.50, 0.75],
            policy: InclusionPolicy::Any,
            order: OrderStrategy::File,
            ledger_path: None,
            schema: Schema::default(),
        }
    }
}

impl SubsetConfig {
    /// Load a JSON config file; missing fields fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: SubsetConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Fractions checked, sorted ascending and deduplicated. Distinct
    /// fractions that share a `subset_<pct>` directory are rejected.
    pub fn normalized_fractions(&self) -> SubsetResult<Vec<f64>> {
        let mut fractions = Vec::with_capacity(self.fractions.len());
        for &f in &self.fractions {
            validate_fraction(f)?;
            fractions.push(f);
        }
        fractions.sort_by(|a, b| a.total_cmp(b));
        fractions.dedup();

        for pair in fractions.windows(2) {
            let dir = subset_dir_name(pair[0]);
            if dir == subset_dir_name(pair[1]) {
                return Err(SubsetError::OutputDirCollision {
                    dir,
                    first: pair[0],
                    second: pair[1],
                });
            }
        }
        Ok(fractions)
    }
}

pub fn validate_fraction(fraction: f64) -> SubsetResult<()> {
    if fraction.is_finite() && (0.0..=1.0).contains(&fraction) {
        Ok(())
    } else {
        Err(SubsetError::InvalidFraction(fraction))
    }
}

/// Directory name for one fraction: 0.25 → `subset_25`, 0.125 → `subset_12.5`.
pub fn subset_dir_name(fraction: f64) -> String {
    let pct = fraction * 100.0;
    if (pct - pct.round()).abs() < 1e-9 {
        format!("subset_{}", pct.round() as i64)
    } else {
        let trimmed = format!("{:.4}", pct);
        let trimmed = trimmed.trim_end_matches('0').trim_end_matches('.');
        format!("subset_{}", trimmed)
    }
}
