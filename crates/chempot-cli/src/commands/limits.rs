use crate::cli::LimitsArgs;
use crate::commands::cplap::write_cplap;
use crate::config::builder::build_config;
use crate::config::models::OutputConfig;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use chempot::{
    core::io::{limits_table::LimitsTableFile, traits::TableFile},
    engine::{limits::ChemicalPotentialLimits, progress::ProgressReporter},
    workflows,
};
use std::fmt::Write as _;
use tracing::{info, warn};

pub fn run(args: LimitsArgs) -> Result<()> {
    let output = OutputConfig {
        limits: args.output.clone(),
        absolute: args.absolute,
        cplap: args.cplap.clone(),
    };
    let app = build_config(&args.solve, &output, None)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    info!("Invoking the limits workflow...");
    let report = workflows::limits::run(&app.core_config, &reporter)?;
    let limits = &report.limits;

    println!(
        "Found {} chemical potential limit(s) for {} (dependent element: {}):\n",
        limits.len(),
        limits.target,
        limits.dependent_element
    );
    print!("{}", format_limits(limits));

    if let Some(path) = &app.output.limits {
        let table = if app.output.absolute {
            limits.to_absolute_table().ok_or_else(|| {
                CliError::Argument(
                    "Absolute chemical potentials need a reference energy for every species"
                        .to_string(),
                )
            })?
        } else {
            limits.to_table()
        };
        LimitsTableFile::write_to_path(&table, path).map_err(|e| CliError::writing(path, e))?;
        println!("✓ Limits written to: {}", path.display());
    }

    if let Some(path) = &app.output.cplap {
        write_cplap(&report.table, &report.system, &app.core_config, path)?;
        println!("✓ CPLAP input written to: {}", path.display());
    }

    let warnings = progress_handler.warnings();
    if !warnings.is_empty() {
        warn!("{} warning(s) were raised while loading phases.", warnings.len());
    }
    Ok(())
}

/// Plain-text table of Δμ values, one row per limit.
pub(crate) fn format_limits(limits: &ChemicalPotentialLimits) -> String {
    let species = limits.species();
    let label_width = limits
        .intrinsic
        .iter()
        .map(|l| l.label.len())
        .chain(std::iter::once("limit".len()))
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    let _ = write!(out, "{:<width$}", "limit", width = label_width);
    for s in &species {
        let _ = write!(out, "  {:>10}", format!("Δμ_{}", s));
    }
    out.push('\n');

    for (vertex, limit) in limits.intrinsic.iter().enumerate() {
        let _ = write!(out, "{:<width$}", limit.label, width = label_width);
        for s in &species {
            match limits.mu(vertex, s) {
                Some(value) => {
                    let _ = write!(out, "  {:>10.4}", value);
                }
                None => {
                    let _ = write!(out, "  {:>10}", "-");
                }
            }
        }
        out.push('\n');
    }
    out
}
