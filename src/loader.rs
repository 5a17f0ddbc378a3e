// 📂 Table Loader - CSV → normalized in-memory tables
//
// - UTF-8 first, Windows-1252 fallback for legacy exports
// - Join columns normalized: trim + lowercase (idempotent)
// - Strict mode (builder) vs lenient mode (verifier / audit)

use crate::config::Schema;
use crate::error::{SubsetError, SubsetResult};
use crate::table::{Dataset, Table, TableKind};
use encoding_rs::WINDOWS_1252;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Every join column must exist (except optional ones) and primary keys
    /// must be unique after normalization.
    Strict,

    /// Normalize whatever join columns exist; leave judgement to the checks.
    Lenient,
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Canonical form of a key: surrounding whitespace removed, lowercased.
pub fn normalize_key(value: &str) -> String {
    value.trim().to_lowercase()
}

// ============================================================================
// DECODING
// ============================================================================

/// Decode file contents: UTF-8 (BOM stripped) or, failing that, cp1252.
pub fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => match text.strip_prefix('\u{FEFF}') {
            Some(stripped) => stripped.to_string(),
            None => text,
        },
        Err(err) => {
            tracing::debug!("input is not valid UTF-8, falling back to Windows-1252");
            let (text, _encoding, _had_errors) = WINDOWS_1252.decode(err.as_bytes());
            text.into_owned()
        }
    }
}

// ============================================================================
// READING
// ============================================================================

/// Read one CSV table with a header row; every value is kept as a string.
pub fn read_table(path: &Path, kind: TableKind) -> SubsetResult<Table> {
    let bytes = std::fs::read(path).map_err(|e| SubsetError::io(path, e))?;
    let text = decode_text(bytes);

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| SubsetError::csv(path, e))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| SubsetError::csv(path, e))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(Table::new(kind, headers, rows))
}

/// Table files absent from `dir`, as display paths.
pub fn missing_tables(dir: &Path, schema: &Schema) -> Vec<String> {
    TableKind::ALL
        .iter()
        .map(|&kind| dir.join(schema.file_name(kind)))
        .filter(|path| !path.is_file())
        .map(|path| path.display().to_string())
        .collect()
}

pub fn require_tables(dir: &Path, schema: &Schema) -> SubsetResult<()> {
    let missing = missing_tables(dir, schema);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(SubsetError::MissingTable { missing })
    }
}

/// Load and normalize all five tables from `dir`.
pub fn load_dataset(dir: &Path, schema: &Schema, mode: LoadMode) -> SubsetResult<Dataset> {
    require_tables(dir, schema)?;

    let mut dataset = Dataset {
        persons: read_table(&dir.join(&schema.persons.file), TableKind::Person)?,
        documents: read_table(&dir.join(&schema.documents.file), TableKind::Document)?,
        banks: read_table(&dir.join(&schema.banks.file), TableKind::Bank)?,
        sources: read_table(&dir.join(&schema.sources.file), TableKind::Source)?,
        transactions: read_table(&dir.join(&schema.transactions.file), TableKind::Transaction)?,
    };

    normalize_dataset(&mut dataset, schema, mode)?;

    if mode == LoadMode::Strict {
        check_unique_keys(&dataset, schema)?;
    }

    tracing::debug!(dir = %dir.display(), "loaded {}", dataset.summary());
    Ok(dataset)
}

pub fn normalize_dataset(dataset: &mut Dataset, schema: &Schema, mode: LoadMode) -> SubsetResult<()> {
    for kind in TableKind::ALL {
        let table = dataset.table_mut(kind);
        for column in schema.join_columns(kind) {
            match table.column_index(column) {
                Some(idx) => table.map_column(idx, normalize_key),
                None if mode == LoadMode::Lenient || schema.is_optional_column(kind, column) => {}
                None => {
                    return Err(SubsetError::MissingColumn {
                        table: kind.label().to_string(),
                        column: column.to_string(),
                    })
                }
            }
        }
    }
    Ok(())
}

fn check_unique_keys(dataset: &Dataset, schema: &Schema) -> SubsetResult<()> {
    for kind in TableKind::KEYED {
        let table = dataset.table(kind);
        let mut seen = HashSet::new();
        for key in table.column_values(schema.key_column(kind))? {
            if !seen.insert(key) {
                return Err(SubsetError::DuplicateKey {
                    table: kind.label().to_string(),
                    key: key.to_string(),
                });
            }
        }
    }
    Ok(())
}

// ============================================================================
// WRITING
// ============================================================================

/// Write a table as UTF-8 CSV, creating parent directories as needed.
pub fn write_table(path: &Path, table: &Table) -> SubsetResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| SubsetError::io(parent, e))?;
    }

    let mut wtr = csv::Writer::from_path(path).map_err(|e| SubsetError::csv(path, e))?;
    wtr.write_record(table.headers())
        .map_err(|e| SubsetError::csv(path, e))?;
    for row in table.rows() {
        wtr.write_record(row).map_err(|e| SubsetError::csv(path, e))?;
    }
    wtr.flush().map_err(|e| SubsetError::io(path, e))?;
    Ok(())
}

pub fn write_dataset(dir: &Path, dataset: &Dataset, schema: &Schema) -> SubsetResult<()> {
    for kind in TableKind::ALL {
        write_table(&dir.join(schema.file_name(kind)), dataset.table(kind))?;
    }
    Ok(())
}
