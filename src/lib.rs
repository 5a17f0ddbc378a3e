// Nested Subsets - Core Library
// Builds and verifies nested, referentially closed subsets of a five-table
// persons/documents/banks/sources/transactions dataset. Used by the CLI and tests.

pub mod error;
pub mod config;
pub mod table;
pub mod loader;
pub mod index;      // Ordering + dependency index
pub mod builder;    // Subset construction per fraction and policy
pub mod closure;    // Referential closure checks
pub mod verifier;   // Nesting verification between two subset dirs
pub mod manifest;   // Provenance + audit
pub mod ledger;     // SQLite build history
pub mod pipeline;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use error::{SubsetError, SubsetResult};
pub use config::{
    OrderStrategy, Schema, SubsetConfig,
    subset_dir_name, validate_fraction,
};
pub use table::{Dataset, Table, TableKind};
pub use loader::{LoadMode, load_dataset, normalize_key, write_dataset};
pub use index::{DependencyIndex, KeyOrder, take_count, ROUNDING_RULE};
pub use builder::{InclusionPolicy, Subset, SubsetBuilder, select_transactions};
pub use closure::{ClosureReport, DanglingReference, check_closure};
pub use verifier::{VerificationReport, VerifyOptions, verify_nested};
pub use manifest::{
    AuditReport, SubsetManifest, TableStat,
    audit_subset, read_manifest, write_manifest, MANIFEST_FILE,
};
pub use ledger::{LedgerEntry, open_ledger, record_subset, list_runs};
pub use pipeline::{BuildOutcome, run_build};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
