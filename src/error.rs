// ⚠️ Error Model - what can go wrong while loading, building and verifying subsets
//
// Two families:
// - "could not run": missing files, missing columns, bad input, I/O
// - "ran and found a violation": nesting and closure failures (verifier only)

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SubsetError {
    #[error("missing table(s): {}", .missing.join(", "))]
    MissingTable { missing: Vec<String> },

    #[error("[{table}] missing column: {column}")]
    MissingColumn { table: String, column: String },

    #[error("[{table}] duplicate primary key after normalization: {key}")]
    DuplicateKey { table: String, key: String },

    #[error("[{table}] key nesting violated: {count} keys missing from the larger subset (example: {example})")]
    NestingViolation {
        table: String,
        count: usize,
        example: String,
    },

    #[error("[{table}] row nesting violated: {count} rows not found in the larger subset (example: {example})")]
    RowNestingViolation {
        table: String,
        count: usize,
        example: String,
    },

    #[error("[{table}] no shared columns to compare rows")]
    NoSharedColumns { table: String },

    #[error("inclusion policy mismatch: small subset built with '{small}', big subset built with '{big}'")]
    PolicyMismatch { small: String, big: String },

    #[error("unsupported inclusion policy '{0}' (expected any | both | src | dest)")]
    UnsupportedPolicy(String),

    #[error("invalid fraction {0}: must be a finite value in [0, 1]")]
    InvalidFraction(f64),

    #[error("fractions {first} and {second} would both be written to {dir}")]
    OutputDirCollision { dir: String, first: f64, second: f64 },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("manifest error in {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl SubsetError {
    /// True when a check ran to completion and found the data inconsistent.
    pub fn is_violation(&self) -> bool {
        matches!(
            self,
            SubsetError::NestingViolation { .. }
                | SubsetError::RowNestingViolation { .. }
                | SubsetError::NoSharedColumns { .. }
                | SubsetError::PolicyMismatch { .. }
        )
    }

    /// True when a required file or column was absent.
    pub fn is_missing_input(&self) -> bool {
        matches!(
            self,
            SubsetError::MissingTable { .. } | SubsetError::MissingColumn { .. }
        )
    }

    /// Process exit status for the CLI: 2 = violation, 3 = missing input, 1 = anything else.
    pub fn exit_code(&self) -> i32 {
        if self.is_violation() {
            2
        } else if self.is_missing_input() {
            3
        } else {
            1
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SubsetError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        SubsetError::Csv {
            path: path.into(),
            source,
        }
    }
}

pub type SubsetResult<T> = std::result::Result<T, SubsetError>;
