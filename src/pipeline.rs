// 🚚 Build Pipeline - full dataset → one subset directory per fraction
//
// Load once (strict), index once, then derive every configured fraction from
// the same read-only dataset. Any missing table or column aborts before the
// first file is written.

use crate::builder::{InclusionPolicy, SubsetBuilder};
use crate::closure::check_closure;
use crate::config::{subset_dir_name, SubsetConfig};
use crate::ledger::{open_ledger, record_subset};
use crate::loader::{load_dataset, write_dataset, LoadMode};
use crate::manifest::{write_manifest, SubsetManifest};
use anyhow::{Context, Result};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub fraction: f64,
    pub output_dir: PathBuf,
    pub manifest: SubsetManifest,
    /// None when no ledger is configured
    pub recorded: Option<bool>,
    pub dangling_references: usize,
}

impl BuildOutcome {
    pub fn summary(&self) -> String {
        let counts: Vec<String> = self
            .manifest
            .tables
            .iter()
            .map(|t| format!("{}: {}", t.table, t.rows))
            .collect();
        format!(
            "Subset {} saved in {}\n  {}",
            subset_dir_name(self.fraction),
            self.output_dir.display(),
            counts.join("  ")
        )
    }
}

pub fn run_build(config: &SubsetConfig) -> Result<Vec<BuildOutcome>> {
    let fractions = config.normalized_fractions()?;
    let schema = &config.schema;

    let dataset = load_dataset(&config.input_dir, schema, LoadMode::Strict)
        .with_context(|| format!("Failed to load full dataset from {}", config.input_dir.display()))?;
    tracing::info!(input = %config.input_dir.display(), "loaded full dataset: {}", dataset.summary());

    let full_closure = check_closure(&dataset, schema, InclusionPolicy::Both)?;
    if !full_closure.is_closed() {
        tracing::warn!("full dataset is not closed: {}", full_closure.summary());
    }

    let builder = SubsetBuilder::new(&dataset, schema, &config.order)?;

    // Derive everything before writing anything
    let subsets = fractions
        .iter()
        .map(|&f| builder.build_subset(f, config.policy))
        .collect::<Result<Vec<_>, _>>()?;

    let ledger = match &config.ledger_path {
        Some(path) => Some(open_ledger(path)?),
        None => None,
    };

    let mut outcomes = Vec::with_capacity(subsets.len());
    for subset in subsets {
        let out_dir = config.output_root.join(subset_dir_name(subset.fraction));

        write_dataset(&out_dir, &subset.tables, schema)
            .with_context(|| format!("Failed to write subset to {}", out_dir.display()))?;

        let manifest =
            SubsetManifest::for_written_subset(&subset, &out_dir, &config.input_dir, &config.order, schema)?;
        write_manifest(&out_dir, &manifest)?;

        let closure = check_closure(&subset.tables, schema, subset.policy)?;
        if !closure.is_closed() {
            tracing::warn!(fraction = subset.fraction, "subset not closed: {}", closure.summary());
        }

        let recorded = match &ledger {
            Some(conn) => Some(record_subset(conn, &out_dir, &manifest)?),
            None => None,
        };

        tracing::info!(
            fraction = subset.fraction,
            policy = %subset.policy,
            dir = %out_dir.display(),
            "subset written: {}",
            subset.tables.summary()
        );

        outcomes.push(BuildOutcome {
            fraction: subset.fraction,
            output_dir: out_dir,
            manifest,
            recorded,
            dangling_references: closure.dangling.len(),
        });
    }

    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrderStrategy;
    use crate::error::SubsetError;
    use crate::ledger::list_runs;
    use crate::table::TableKind;
    use crate::test_support::write_sample_dir;
    use crate::verifier::{verify_nested, VerifyOptions};

    fn config_for(input: &std::path::Path, output: &std::path::Path) -> SubsetConfig {
        SubsetConfig {
            input_dir: input.to_path_buf(),
            output_root: output.to_path_buf(),
            ..SubsetConfig::default()
        }
    }

    #[test]
    fn test_default_run_writes_nested_subsets() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_sample_dir(input.path());

        let outcomes = run_build(&config_for(input.path(), output.path())).unwrap();

        assert_eq!(outcomes.len(), 3);
        for outcome in &outcomes {
            println!("{}", outcome.summary());
            assert_eq!(outcome.dangling_references, 0);
            assert!(outcome.recorded.is_none());
            assert!(outcome.output_dir.join("manifest.json").is_file());
        }
        assert_eq!(outcomes[0].manifest.rows(TableKind::Person), Some(2));
        assert_eq!(outcomes[1].manifest.rows(TableKind::Person), Some(5));
        assert_eq!(outcomes[2].manifest.rows(TableKind::Person), Some(8));

        let schema = SubsetConfig::default().schema;
        for pair in outcomes.windows(2) {
            verify_nested(&pair[0].output_dir, &pair[1].output_dir, VerifyOptions::default(), &schema)
                .unwrap();
        }
    }

    #[test]
    fn test_rebuild_is_byte_identical_and_deduplicated_in_ledger() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_sample_dir(input.path());

        let config = SubsetConfig {
            fractions: vec![0.5],
            policy: InclusionPolicy::Both,
            order: OrderStrategy::Seeded { seed: 42 },
            ledger_path: Some(output.path().join("ledger.db")),
            ..config_for(input.path(), output.path())
        };

        let first = run_build(&config).unwrap();
        let persons_first = std::fs::read(first[0].output_dir.join("persone.csv")).unwrap();
        let second = run_build(&config).unwrap();
        let persons_second = std::fs::read(second[0].output_dir.join("persone.csv")).unwrap();

        assert_eq!(persons_first, persons_second);
        assert_eq!(first[0].manifest.content_hash, second[0].manifest.content_hash);
        assert_eq!(first[0].recorded, Some(true));
        assert_eq!(second[0].recorded, Some(false));

        let conn = open_ledger(config.ledger_path.as_ref().unwrap()).unwrap();
        let runs = list_runs(&conn).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].policy, "both");
    }

    #[test]
    fn test_missing_table_writes_nothing() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_sample_dir(input.path());
        std::fs::remove_file(input.path().join("documenti.csv")).unwrap();

        let err = run_build(&config_for(input.path(), output.path())).unwrap_err();

        let cause = err.downcast_ref::<SubsetError>().unwrap();
        assert!(matches!(cause, SubsetError::MissingTable { .. }));
        assert_eq!(std::fs::read_dir(output.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_invalid_fraction_fails_before_loading() {
        let output = tempfile::tempdir().unwrap();
        let config = SubsetConfig {
            fractions: vec![0.5, 2.0],
            ..config_for(std::path::Path::new("does-not-exist"), output.path())
        };

        let err = run_build(&config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SubsetError>(),
            Some(SubsetError::InvalidFraction(_))
        ));
    }

    #[test]
    fn test_colliding_fractions_write_nothing() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_sample_dir(input.path());

        let config = SubsetConfig {
            fractions: vec![0.33333301, 0.33333302],
            ..config_for(input.path(), output.path())
        };

        let err = run_build(&config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SubsetError>(),
            Some(SubsetError::OutputDirCollision { .. })
        ));
        assert_eq!(std::fs::read_dir(output.path()).unwrap().count(), 0);
    }
}
