// Shared fixtures for unit tests.
//
// Ten persons p1..p10, banks b1..b6 (b4 only derived by a transaction,
// b5/b6 orphans), sources s1..s5 (s4/s5 orphans), one document per person
// and six transactions.

use crate::config::Schema;
use crate::loader::write_dataset;
use crate::table::{Dataset, Table, TableKind};
use std::path::Path;

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Formatting noise on every other join value: uppercase with padding.
fn noisy(value: &str, i: usize, noise: bool) -> String {
    if noise && i % 2 == 0 {
        format!("  {} ", value.to_uppercase())
    } else {
        value.to_string()
    }
}

const PERSONS: [(&str, &str, &str, &str, &str); 10] = [
    ("p1", "Anna", "b1", "d1", "s1"),
    ("p2", "Bruno", "b2", "d2", "s1"),
    ("p3", "Carla", "b1", "d3", "s2"),
    ("p4", "Dario", "b3", "d4", "s2"),
    ("p5", "Elena", "b2", "d5", "s3"),
    ("p6", "Fabio", "b1", "d6", "s1"),
    ("p7", "Giulia", "b3", "d7", "s3"),
    ("p8", "Hugo", "b2", "d8", "s2"),
    ("p9", "Irene", "b1", "d9", "s1"),
    ("p10", "Luca", "b3", "d10", "s3"),
];

const TRANSACTIONS: [(&str, &str, &str, &str); 6] = [
    ("t1", "p1", "p2", "b1"),
    ("t2", "p3", "p9", "b4"),
    ("t3", "p9", "p3", "b1"),
    ("t4", "p8", "p10", "b2"),
    ("t5", "p2", "p1", "b2"),
    ("t6", "p5", "p7", "b2"),
];

fn build(noise: bool) -> Dataset {
    let persons = Table::new(
        TableKind::Person,
        strings(&[
            "matricola:ID",
            "nome",
            "cognome",
            "stipendio:INT",
            "id_banca",
            "id_documento",
            "id_fonte",
            ":LABEL",
        ]),
        PERSONS
            .iter()
            .enumerate()
            .map(|(i, (id, name, bank, doc, source))| {
                vec![
                    noisy(id, i, noise),
                    name.to_string(),
                    "Rossi".to_string(),
                    format!("{}", 20000 + i * 1000),
                    noisy(bank, i, noise),
                    noisy(doc, i, noise),
                    noisy(source, i, noise),
                    "Persona".to_string(),
                ]
            })
            .collect(),
    );

    let documents = Table::new(
        TableKind::Document,
        strings(&[
            "id_documento:ID",
            "nazione",
            "email",
            "scadenza",
            "matricola",
            "num_telefono",
            ":LABEL",
        ]),
        PERSONS
            .iter()
            .enumerate()
            .map(|(i, (id, name, _, doc, _))| {
                vec![
                    noisy(doc, i + 1, noise),
                    "IT".to_string(),
                    format!("{}@example.com", name.to_lowercase()),
                    "2030-01-01".to_string(),
                    noisy(id, i + 1, noise),
                    format!("333{:04}", i),
                    "Documento".to_string(),
                ]
            })
            .collect(),
    );

    let banks = Table::new(
        TableKind::Bank,
        strings(&["id_banca:ID", "nome", "nazione", "max_deposito:INT", ":LABEL"]),
        (1..=6)
            .map(|i| {
                vec![
                    noisy(&format!("b{}", i), i, noise),
                    format!("Banca {}", i),
                    "IT".to_string(),
                    format!("{}", i * 10000),
                    "Banca".to_string(),
                ]
            })
            .collect(),
    );

    let sources = Table::new(
        TableKind::Source,
        strings(&["id_fonte:ID", "nome", "nazione", "affidabilita:FLOAT", ":LABEL"]),
        (1..=5)
            .map(|i| {
                vec![
                    noisy(&format!("s{}", i), i, noise),
                    format!("Fonte {}", i),
                    "FR".to_string(),
                    format!("0.{}", i),
                    "Fonte".to_string(),
                ]
            })
            .collect(),
    );

    let transactions = Table::new(
        TableKind::Transaction,
        strings(&[
            "id_transazione:ID",
            "matricola",
            "importo:INT",
            "destinatario",
            "data:DATE",
            "id_banca_deriva",
            ":LABEL",
        ]),
        TRANSACTIONS
            .iter()
            .enumerate()
            .map(|(i, (id, from, to, bank))| {
                vec![
                    id.to_string(),
                    noisy(from, i, noise),
                    format!("{}", (i + 1) * 100),
                    noisy(to, i + 1, noise),
                    "2024-05-01".to_string(),
                    noisy(bank, i, noise),
                    "Transazione".to_string(),
                ]
            })
            .collect(),
    );

    Dataset {
        persons,
        documents,
        banks,
        sources,
        transactions,
    }
}

/// Sample dataset as it looks after normalization.
pub fn sample_dataset() -> Dataset {
    build(false)
}

/// Same data with formatting noise in join columns.
pub fn raw_sample_dataset() -> Dataset {
    build(true)
}

/// Write the noisy sample as a full dataset directory.
pub fn write_sample_dir(dir: &Path) {
    write_dataset(dir, &raw_sample_dataset(), &Schema::default()).unwrap();
}

/// Generated dataset for property tests. Persons reference `bank % n_banks`
/// and `source % n_sources`; each person owns one document; transactions pick
/// sender/recipient/deriving bank by modulo, with an empty deriving bank when
/// the flag is false.
pub fn synthetic_dataset(
    n_banks: usize,
    n_sources: usize,
    persons: &[(usize, usize)],
    transactions: &[(usize, usize, usize, bool)],
) -> Dataset {
    let sample = sample_dataset();
    let n_persons = persons.len();

    let person_rows = persons
        .iter()
        .enumerate()
        .map(|(i, (bank, source))| {
            vec![
                format!("p{}", i),
                format!("Nome{}", i),
                "Bianchi".to_string(),
                format!("{}", 1000 + i),
                format!("b{}", bank % n_banks),
                format!("d{}", i),
                format!("s{}", source % n_sources),
                "Persona".to_string(),
            ]
        })
        .collect();

    let document_rows = (0..n_persons)
        .map(|i| {
            vec![
                format!("d{}", i),
                "IT".to_string(),
                format!("nome{}@example.com", i),
                "2031-12-31".to_string(),
                format!("p{}", i),
                format!("340{:04}", i),
                "Documento".to_string(),
            ]
        })
        .collect();

    let bank_rows = (0..n_banks)
        .map(|i| {
            vec![
                format!("b{}", i),
                format!("Banca {}", i),
                "IT".to_string(),
                format!("{}", 5000 * (i + 1)),
                "Banca".to_string(),
            ]
        })
        .collect();

    let source_rows = (0..n_sources)
        .map(|i| {
            vec![
                format!("s{}", i),
                format!("Fonte {}", i),
                "DE".to_string(),
                "0.9".to_string(),
                "Fonte".to_string(),
            ]
        })
        .collect();

    let transaction_rows = if n_persons == 0 {
        Vec::new()
    } else {
        transactions
            .iter()
            .enumerate()
            .map(|(i, (from, to, bank, derived))| {
                vec![
                    format!("t{}", i),
                    format!("p{}", from % n_persons),
                    format!("{}", 10 * (i + 1)),
                    format!("p{}", to % n_persons),
                    "2024-01-15".to_string(),
                    if *derived {
                        format!("b{}", bank % n_banks)
                    } else {
                        String::new()
                    },
                    "Transazione".to_string(),
                ]
            })
            .collect()
    };

    Dataset {
        persons: Table::new(TableKind::Person, sample.persons.headers().to_vec(), person_rows),
        documents: Table::new(TableKind::Document, sample.documents.headers().to_vec(), document_rows),
        banks: Table::new(TableKind::Bank, sample.banks.headers().to_vec(), bank_rows),
        sources: Table::new(TableKind::Source, sample.sources.headers().to_vec(), source_rows),
        transactions: Table::new(
            TableKind::Transaction,
            sample.transactions.headers().to_vec(),
            transaction_rows,
        ),
    }
}
