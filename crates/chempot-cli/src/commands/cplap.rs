use crate::cli::CplapArgs;
use crate::config::builder::build_config;
use crate::config::defaults::DefaultsConfig;
use crate::config::models::OutputConfig;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use chempot::{
    core::io::cplap,
    core::models::{
        phase::{Phase, PhaseTable},
        system::ChemicalSystem,
    },
    engine::{
        config::LimitsConfig, error::EngineError, limits::default_dependent_element,
        progress::ProgressReporter,
    },
    workflows,
};
use std::path::{Path, PathBuf};
use tracing::info;

pub fn run(args: CplapArgs) -> Result<()> {
    let output = OutputConfig {
        cplap: args.output.clone(),
        ..Default::default()
    };
    let app = build_config(&args.solve, &output, None)?;
    let path = app
        .output
        .cplap
        .clone()
        .unwrap_or_else(|| PathBuf::from(DefaultsConfig::default().cplap_file));

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    let table = workflows::limits::load_phase_table(&app.core_config, &reporter)?;
    let system = workflows::limits::chemical_system(&app.core_config)?;
    write_cplap(&table, &system, &app.core_config, &path)?;
    println!("✓ CPLAP input written to: {}", path.display());
    Ok(())
}

/// Writes the CPLAP input for the configured target, bordered by every
/// phase of the intrinsic chemical system.
pub(crate) fn write_cplap(
    table: &PhaseTable,
    system: &ChemicalSystem,
    config: &LimitsConfig,
    path: &Path,
) -> Result<()> {
    let bulk = table
        .get(&config.target)
        .ok_or_else(|| EngineError::TargetNotFound {
            target: config.target.clone(),
        })?;
    let dependent = match &config.dependent_element {
        Some(element) => element.clone(),
        None => system.elements()[default_dependent_element(system, bulk.composition())].clone(),
    };
    let competing: Vec<&Phase> = table.within(system.elements()).collect();

    info!(
        "Writing CPLAP input for {} with {} candidate phase(s) to {:?}",
        bulk.formula(),
        competing.len(),
        path
    );
    cplap::write_input_to_path(path, bulk, &dependent, &competing)
        .map_err(|e| CliError::writing(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chempot::engine::config::{LimitsConfigBuilder, PhaseSourceConfig};
    use std::fs;
    use tempfile::tempdir;

    fn phase(formula: &str, formation_energy: f64) -> Phase {
        Phase::new(formula, formation_energy, formation_energy, formation_energy).unwrap()
    }

    fn config(target: &str) -> LimitsConfig {
        LimitsConfigBuilder::new()
            .target(target)
            .source(PhaseSourceConfig::Table(PathBuf::from("phases.csv")))
            .build()
            .unwrap()
    }

    #[test]
    fn cplap_file_lists_bordering_phases_of_the_system() {
        let table = PhaseTable::from_phases(vec![
            phase("Cd", 0.0),
            phase("Te", 0.0),
            phase("CdTe", -1.2),
            phase("CdTe2", -1.0),
            phase("ZnTe", -1.1),
        ]);
        let system = ChemicalSystem::new(&["Cd", "Te"]).unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("input.dat");

        write_cplap(&table, &system, &config("CdTe"), &path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert!(lines[0].starts_with("2 "));
        assert!(lines[1].starts_with("1 Cd 1 Te -1.200000"));
        assert!(lines[2].starts_with("Te "));
        assert!(lines[3].starts_with("1 "));
        assert!(content.contains("1 Cd 2 Te -1.000000"));
        assert!(!content.contains("Zn"));
    }

    #[test]
    fn missing_target_is_reported() {
        let table = PhaseTable::from_phases(vec![phase("Cd", 0.0), phase("Te", 0.0)]);
        let system = ChemicalSystem::new(&["Cd", "Te"]).unwrap();
        let dir = tempdir().unwrap();
        let result = write_cplap(&table, &system, &config("CdTe"), &dir.path().join("input.dat"));
        assert!(matches!(
            result,
            Err(CliError::Core(EngineError::TargetNotFound { .. }))
        ));
    }
}
