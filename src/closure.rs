// 🔗 Referential Closure - every foreign key resolves inside the same dataset
//
// Always required (when the value is non-empty):
//   person.bank → banks, person.source → sources, person.document → documents
//   document.person → persons, transaction.deriving_bank → banks
//
// Transaction → person is scoped by the inclusion policy: under `any`, `src`
// and `dest` one endpoint may sit outside the subset by construction.

use crate::builder::InclusionPolicy;
use crate::config::Schema;
use crate::error::SubsetResult;
use crate::table::{Dataset, Table, TableKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DanglingReference {
    pub table: String,
    /// Key of the offending row (row number for tables without a key column)
    pub row: String,
    pub column: String,
    pub value: String,
}

impl std::fmt::Display for DanglingReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] row {}: {} = '{}' does not resolve",
            self.table, self.row, self.column, self.value
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClosureReport {
    pub checked_references: usize,
    pub dangling: Vec<DanglingReference>,
}

impl ClosureReport {
    pub fn is_closed(&self) -> bool {
        self.dangling.is_empty()
    }

    pub fn summary(&self) -> String {
        if self.is_closed() {
            format!("closed: {} references resolved", self.checked_references)
        } else {
            format!(
                "{} of {} references dangling (first: {})",
                self.dangling.len(),
                self.checked_references,
                self.dangling[0]
            )
        }
    }
}

struct Checker<'a> {
    schema: &'a Schema,
    report: ClosureReport,
}

impl<'a> Checker<'a> {
    fn row_label(&self, table: &Table, row_idx: usize, row: &[String]) -> String {
        match table.column_index(self.schema.key_column(table.kind())) {
            Some(idx) => row[idx].clone(),
            None => format!("#{}", row_idx + 1),
        }
    }

    /// Every non-empty value in `column` must be in `targets`.
    fn require(&mut self, table: &Table, column: &str, targets: &HashSet<String>) -> SubsetResult<()> {
        let idx = table.require_column(column)?;
        for (row_idx, row) in table.rows().iter().enumerate() {
            let value = &row[idx];
            if value.is_empty() {
                continue;
            }
            self.report.checked_references += 1;
            if !targets.contains(value) {
                let label = self.row_label(table, row_idx, row);
                self.report.dangling.push(DanglingReference {
                    table: table.kind().label().to_string(),
                    row: label,
                    column: column.to_string(),
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }

    fn transaction_people(
        &mut self,
        table: &Table,
        persons: &HashSet<String>,
        policy: InclusionPolicy,
    ) -> SubsetResult<()> {
        let schema = self.schema;
        let sender_col = &schema.transactions.sender;
        let recipient_col = &schema.transactions.recipient;
        let sender = table.require_column(sender_col)?;
        let recipient = table.require_column(recipient_col)?;

        for (row_idx, row) in table.rows().iter().enumerate() {
            let sender_ok = persons.contains(&row[sender]);
            let recipient_ok = persons.contains(&row[recipient]);
            self.report.checked_references += 1;
            if policy.admits(sender_ok, recipient_ok) {
                continue;
            }

            // Blame the endpoint the policy needed
            let (column, value) = match policy {
                InclusionPolicy::Dest => (recipient_col, &row[recipient]),
                InclusionPolicy::Both if sender_ok => (recipient_col, &row[recipient]),
                _ => (sender_col, &row[sender]),
            };
            let label = self.row_label(table, row_idx, row);
            self.report.dangling.push(DanglingReference {
                table: TableKind::Transaction.label().to_string(),
                row: label,
                column: column.clone(),
                value: value.clone(),
            });
        }
        Ok(())
    }
}

/// Check every reference of `dataset`. Read-only.
///
/// For a full dataset use `InclusionPolicy::Both`: every transaction endpoint
/// must then resolve.
pub fn check_closure(dataset: &Dataset, schema: &Schema, policy: InclusionPolicy) -> SubsetResult<ClosureReport> {
    let persons = dataset.persons.non_empty_values(&schema.persons.key)?;
    let documents = dataset.documents.non_empty_values(&schema.documents.key)?;
    let banks = dataset.banks.non_empty_values(&schema.banks.key)?;
    let sources = dataset.sources.non_empty_values(&schema.sources.key)?;

    let mut checker = Checker {
        schema,
        report: ClosureReport::default(),
    };

    checker.require(&dataset.persons, &schema.persons.bank, &banks)?;
    checker.require(&dataset.persons, &schema.persons.source, &sources)?;
    checker.require(&dataset.persons, &schema.persons.document, &documents)?;
    checker.require(&dataset.documents, &schema.documents.person, &persons)?;
    if dataset.transactions.has_column(&schema.transactions.deriving_bank) {
        checker.require(&dataset.transactions, &schema.transactions.deriving_bank, &banks)?;
    }
    checker.transaction_people(&dataset.transactions, &persons, policy)?;

    Ok(checker.report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SubsetBuilder;
    use crate::config::OrderStrategy;
    use crate::test_support::sample_dataset;

    #[test]
    fn test_full_sample_is_closed() {
        let report = check_closure(&sample_dataset(), &Schema::default(), InclusionPolicy::Both).unwrap();
        println!("{}", report.summary());
        assert!(report.is_closed());
        // 10 persons x 3 refs + 10 documents + 6 deriving banks + 6 transactions
        assert_eq!(report.checked_references, 52);
    }

    #[test]
    fn test_policy_scopes_transaction_endpoints() {
        let dataset = sample_dataset();
        let schema = Schema::default();
        let builder = SubsetBuilder::new(&dataset, &schema, &OrderStrategy::File).unwrap();
        let subset = builder.build_subset(0.3, InclusionPolicy::Any).unwrap();

        // p3→p9 is fine under `any` ...
        assert!(check_closure(&subset.tables, &schema, InclusionPolicy::Any).unwrap().is_closed());

        // ... but not when every endpoint has to resolve
        let strict = check_closure(&subset.tables, &schema, InclusionPolicy::Both).unwrap();
        assert_eq!(strict.dangling.len(), 2);
        assert_eq!(strict.dangling[0].row, "t2");
        assert_eq!(strict.dangling[0].column, "destinatario");
        assert_eq!(strict.dangling[0].value, "p9");
        assert_eq!(strict.dangling[1].row, "t3");
        assert_eq!(strict.dangling[1].column, "matricola");
    }

    #[test]
    fn test_dangling_bank_is_reported() {
        let mut dataset = sample_dataset();
        let schema = Schema::default();
        let keys: HashSet<String> = ["b2", "b3", "b4", "b5", "b6"].iter().map(|s| s.to_string()).collect();
        dataset.banks = dataset.banks.select_by_key("id_banca:ID", &keys).unwrap();

        let report = check_closure(&dataset, &schema, InclusionPolicy::Both).unwrap();

        assert!(!report.is_closed());
        assert!(report
            .dangling
            .iter()
            .all(|d| d.value == "b1" && (d.table == "persons" || d.table == "transactions")));
        assert_eq!(report.dangling[0].row, "p1");
        assert!(report.summary().contains("dangling"));
    }
}
