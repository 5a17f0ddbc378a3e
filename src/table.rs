// 📋 Tables - row-oriented string tables with ordered columns
//
// Values stay as strings: typed header suffixes (`:INT`, `:FLOAT`, `:DATE`)
// are carried through untouched. Unknown columns are kept in place.

use crate::error::{SubsetError, SubsetResult};
use std::collections::HashSet;

// ============================================================================
// TABLE KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableKind {
    Person,
    Document,
    Bank,
    Source,
    Transaction,
}

impl TableKind {
    /// All five tables, in load/write order.
    pub const ALL: [TableKind; 5] = [
        TableKind::Person,
        TableKind::Document,
        TableKind::Bank,
        TableKind::Source,
        TableKind::Transaction,
    ];

    /// Tables with a single-column primary key checked by key nesting.
    pub const KEYED: [TableKind; 4] = [
        TableKind::Person,
        TableKind::Document,
        TableKind::Bank,
        TableKind::Source,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TableKind::Person => "persons",
            TableKind::Document => "documents",
            TableKind::Bank => "banks",
            TableKind::Source => "sources",
            TableKind::Transaction => "transactions",
        }
    }
}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// TABLE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    kind: TableKind,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Rows shorter than the header are padded with empty cells.
    pub fn new(kind: TableKind, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                if row.len() < width {
                    row.resize(width, String::new());
                }
                row
            })
            .collect();
        Table {
            kind,
            headers,
            rows,
        }
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    pub fn require_column(&self, column: &str) -> SubsetResult<usize> {
        self.column_index(column)
            .ok_or_else(|| SubsetError::MissingColumn {
                table: self.kind.label().to_string(),
                column: column.to_string(),
            })
    }

    /// Values of one column in row order.
    pub fn column_values(&self, column: &str) -> SubsetResult<Vec<&str>> {
        let idx = self.require_column(column)?;
        Ok(self.rows.iter().map(|row| row[idx].as_str()).collect())
    }

    /// Non-empty values of one column, as an owned set.
    pub fn non_empty_values(&self, column: &str) -> SubsetResult<HashSet<String>> {
        let idx = self.require_column(column)?;
        Ok(self
            .rows
            .iter()
            .map(|row| row[idx].as_str())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Rewrite one column in place. Only used while a freshly loaded table
    /// is being normalized, before anything else can see it.
    pub(crate) fn map_column<F>(&mut self, idx: usize, f: F)
    where
        F: Fn(&str) -> String,
    {
        for row in &mut self.rows {
            row[idx] = f(&row[idx]);
        }
    }

    /// New table with the rows matching `keep`, in original order.
    pub fn filter_rows<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(&[String]) -> bool,
    {
        Table {
            kind: self.kind,
            headers: self.headers.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| keep(row))
                .cloned()
                .collect(),
        }
    }

    /// Rows whose `column` value is in `keys`, first occurrence per value only.
    pub fn select_by_key(&self, column: &str, keys: &HashSet<String>) -> SubsetResult<Table> {
        let idx = self.require_column(column)?;
        let mut seen: HashSet<&str> = HashSet::new();
        let rows = self
            .rows
            .iter()
            .filter(|row| keys.contains(&row[idx]) && seen.insert(row[idx].as_str()))
            .cloned()
            .collect();
        Ok(Table {
            kind: self.kind,
            headers: self.headers.clone(),
            rows,
        })
    }

    /// Reorder columns to follow `reference`; columns it lacks go last.
    pub fn reorder_like(&self, reference: &Table) -> Table {
        let mut order: Vec<usize> = reference
            .headers
            .iter()
            .filter_map(|h| self.column_index(h))
            .collect();
        for (idx, h) in self.headers.iter().enumerate() {
            if !reference.has_column(h) {
                order.push(idx);
            }
        }

        Table {
            kind: self.kind,
            headers: order.iter().map(|&i| self.headers[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| order.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        }
    }

    /// Columns present in both tables, in this table's order.
    pub fn shared_columns(&self, other: &Table) -> Vec<String> {
        self.headers
            .iter()
            .filter(|h| other.has_column(h))
            .cloned()
            .collect()
    }

    /// Rows restricted to `columns`. Columns must exist.
    pub fn project(&self, columns: &[String]) -> SubsetResult<Vec<Vec<String>>> {
        let idx: Vec<usize> = columns
            .iter()
            .map(|c| self.require_column(c))
            .collect::<SubsetResult<_>>()?;
        Ok(self
            .rows
            .iter()
            .map(|row| idx.iter().map(|&i| row[i].clone()).collect())
            .collect())
    }
}

// ============================================================================
// DATASET
// ============================================================================

/// The five tables of one full dataset or one subset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    pub persons: Table,
    pub documents: Table,
    pub banks: Table,
    pub sources: Table,
    pub transactions: Table,
}

impl Dataset {
    pub fn table(&self, kind: TableKind) -> &Table {
        match kind {
            TableKind::Person => &self.persons,
            TableKind::Document => &self.documents,
            TableKind::Bank => &self.banks,
            TableKind::Source => &self.sources,
            TableKind::Transaction => &self.transactions,
        }
    }

    pub(crate) fn table_mut(&mut self, kind: TableKind) -> &mut Table {
        match kind {
            TableKind::Person => &mut self.persons,
            TableKind::Document => &mut self.documents,
            TableKind::Bank => &mut self.banks,
            TableKind::Source => &mut self.sources,
            TableKind::Transaction => &mut self.transactions,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "persons: {}  documents: {}  banks: {}  sources: {}  transactions: {}",
            self.persons.len(),
            self.documents.len(),
            self.banks.len(),
            self.sources.len(),
            self.transactions.len()
        )
    }
}
