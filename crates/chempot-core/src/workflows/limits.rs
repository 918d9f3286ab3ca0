use crate::core::models::composition::Composition;
use crate::core::models::phase::PhaseTable;
use crate::core::models::system::ChemicalSystem;
use crate::engine::cache::PhaseTableCache;
use crate::engine::config::{LimitsConfig, PhaseSourceConfig};
use crate::engine::error::EngineError;
use crate::engine::extrinsic;
use crate::engine::ingest::CalculationTree;
use crate::engine::limits::{self, ChemicalPotentialLimits};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::source::{PhaseSource, TableSource};
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct LimitsReport {
    /// The phase table the limits were derived from.
    pub table: PhaseTable,
    pub system: ChemicalSystem,
    pub limits: ChemicalPotentialLimits,
}

#[instrument(skip_all, name = "limits_workflow", fields(target = %config.target))]
pub fn run(config: &LimitsConfig, reporter: &ProgressReporter) -> Result<LimitsReport, EngineError> {
    let table = load_phase_table(config, reporter)?;
    let (system, limits) = compute_limits(&table, config, reporter)?;
    info!(
        "Workflow complete: {} limit(s) for {}.",
        limits.len(),
        limits.target
    );
    Ok(LimitsReport {
        table,
        system,
        limits,
    })
}

/// Loads the phase table named by `config.source`, going through the cache
/// when one is configured.
pub fn load_phase_table(
    config: &LimitsConfig,
    reporter: &ProgressReporter,
) -> Result<PhaseTable, EngineError> {
    reporter.report(Progress::PhaseStart {
        name: "Loading Phases",
    });
    let source: Box<dyn PhaseSource> = match &config.source {
        PhaseSourceConfig::Table(path) => Box::new(TableSource::new(path)),
        PhaseSourceConfig::Calculations { root, strict } => {
            Box::new(CalculationTree::new(root, *strict))
        }
    };

    let table = match &config.cache {
        Some(cache) => {
            let cache = PhaseTableCache::new(&cache.path, cache.policy);
            cache.load_or_build(&source.source_files()?, || source.load(reporter))?
        }
        None => source.load(reporter)?,
    };
    reporter.report(Progress::PhaseFinish);
    Ok(table)
}

/// The chemical system of a run: the configured elements, or the target's
/// own elements in formula order, plus the extrinsic species.
pub fn chemical_system(config: &LimitsConfig) -> Result<ChemicalSystem, EngineError> {
    let system = match &config.elements {
        Some(elements) => ChemicalSystem::new(elements.as_slice())?,
        None => {
            let target: Composition = config.target.parse()?;
            ChemicalSystem::from_composition(&target)
        }
    };
    Ok(system.with_extrinsic(config.extrinsic.as_slice())?)
}

/// Solves and extends the limits of `config.target` over an already loaded
/// table.
pub fn compute_limits(
    table: &PhaseTable,
    config: &LimitsConfig,
    reporter: &ProgressReporter,
) -> Result<(ChemicalSystem, ChemicalPotentialLimits), EngineError> {
    let system = chemical_system(config)?;

    reporter.report(Progress::PhaseStart {
        name: "Solving Limits",
    });
    let mut limits = limits::solve(
        &system,
        table,
        &config.target,
        config.dependent_element.as_deref(),
        config.tolerance,
    )?;
    reporter.report(Progress::PhaseFinish);

    if !system.extrinsic().is_empty() {
        reporter.report(Progress::PhaseStart {
            name: "Extrinsic Limits",
        });
        extrinsic::extend(&mut limits, &system, table)?;
        reporter.report(Progress::PhaseFinish);
    }
    Ok((system, limits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::limits_table::LimitsTableFile;
    use crate::core::io::table::{PhaseTableFile, TableError};
    use crate::core::io::traits::TableFile;
    use crate::engine::cache::CachePolicy;
    use crate::engine::config::{CacheConfig, LimitsConfigBuilder};
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    const LMO_TABLE: &str = "\
formula,energy_per_fu,energy,formation_energy
La,-4.9,-19.6,0
Mn,-9.0,-522.0,0
O2,-9.8,-78.4,0
La2O3,-41.2,-82.4,-18.7
MnO,-18.8,-37.6,-3.9
Mn3O4,-56.2,-112.4,-14.4
Mn2O3,-42.6,-170.4,-9.9
MnO2,-23.2,-92.8,-5.4
LaMnO3,-43.2,-172.8,-14.9
SrO,-12.0,-24.0,-6.1
SrMnO3,-40.0,-80.0,-16.5
Sr,-1.6,-1.6,0
";

    fn write_table(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("phases.csv");
        fs::write(&path, LMO_TABLE).unwrap();
        path
    }

    fn config(path: &Path) -> LimitsConfig {
        LimitsConfigBuilder::new()
            .target("LaMnO3")
            .source(PhaseSourceConfig::Table(path.to_path_buf()))
            .build()
            .unwrap()
    }

    #[test]
    fn run_from_table_produces_valid_limits() {
        let dir = tempdir().unwrap();
        let path = write_table(dir.path());
        let report = run(&config(&path), &ProgressReporter::new()).unwrap();

        assert_eq!(report.system.elements(), &["La", "Mn", "O"]);
        assert!(report.limits.len() >= 3);
        assert!(report.limits.extrinsic.is_none());
        for limit in &report.limits.intrinsic {
            let equality = limit.mu[0] + limit.mu[1] + 3.0 * limit.mu[2];
            assert!((equality + 14.9).abs() < 1e-6);
        }
    }

    #[test]
    fn extrinsic_species_are_added_with_same_cardinality() {
        let dir = tempdir().unwrap();
        let path = write_table(dir.path());
        let mut config = config(&path);
        config.extrinsic = vec!["Sr".to_string()];

        let report = run(&config, &ProgressReporter::new()).unwrap();
        let extrinsic = report.limits.extrinsic.as_ref().unwrap();
        assert_eq!(extrinsic.values.len(), report.limits.intrinsic.len());
        assert!(extrinsic.values.iter().all(|v| v[0] <= 0.0));
        assert_eq!(report.limits.species(), vec!["La", "Mn", "O", "Sr"]);
    }

    #[test]
    fn limits_survive_a_table_round_trip() {
        let dir = tempdir().unwrap();
        let path = write_table(dir.path());
        let first = run(&config(&path), &ProgressReporter::new()).unwrap();

        let rewritten = dir.path().join("rewritten.csv");
        PhaseTableFile::write_to_path(&first.table, &rewritten).unwrap();
        let second = run(&config(&rewritten), &ProgressReporter::new()).unwrap();
        assert_eq!(first.limits, second.limits);

        let limits_path = dir.path().join("limits.csv");
        LimitsTableFile::write_to_path(&first.limits.to_table(), &limits_path).unwrap();
        let read_back = LimitsTableFile::read_from_path(&limits_path).unwrap();
        assert_eq!(read_back, first.limits.to_table());
    }

    #[test]
    fn missing_formation_energy_column_fails_before_solving() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("phases.csv");
        fs::write(&path, "formula,energy_per_fu,energy\nCd,-0.9,-1.8\n").unwrap();

        let solving_started = std::sync::Arc::new(std::sync::Mutex::new(false));
        let flag = solving_started.clone();
        let reporter = ProgressReporter::with_callback(Box::new(move |event| {
            if matches!(event, Progress::PhaseStart { name: "Solving Limits" }) {
                *flag.lock().unwrap() = true;
            }
        }));

        let result = run(&config(&path), &reporter);
        assert!(matches!(
            result,
            Err(EngineError::Table(TableError::MissingRequiredField { ref column })) if column == "formation_energy"
        ));
        assert!(!*solving_started.lock().unwrap());
    }

    #[test]
    fn cached_table_is_reused() {
        let dir = tempdir().unwrap();
        let path = write_table(dir.path());
        let cache_path = dir.path().join("cache.csv");
        let mut config = config(&path);
        config.cache = Some(CacheConfig {
            path: cache_path.clone(),
            policy: CachePolicy::Reuse,
        });

        let first = run(&config, &ProgressReporter::new()).unwrap();
        assert!(cache_path.exists());
        fs::remove_file(&path).unwrap();
        let second = run(&config, &ProgressReporter::new()).unwrap();
        assert_eq!(first.limits, second.limits);
    }

    #[test]
    fn explicit_element_list_must_cover_target() {
        let dir = tempdir().unwrap();
        let path = write_table(dir.path());
        let mut config = config(&path);
        config.elements = Some(vec!["La".to_string(), "O".to_string()]);
        assert!(matches!(
            run(&config, &ProgressReporter::new()),
            Err(EngineError::InvalidTarget { .. })
        ));
    }
}
