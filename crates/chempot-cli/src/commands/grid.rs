use crate::cli::GridArgs;
use crate::config::builder::build_config;
use crate::config::models::OutputConfig;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use chempot::{
    core::io::{limits_table::LimitsTableFile, traits::TableFile},
    engine::{grid, progress::ProgressReporter},
    workflows,
};
use tracing::info;

pub fn run(args: GridArgs) -> Result<()> {
    let app = build_config(&args.solve, &OutputConfig::default(), args.points)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    let report = workflows::limits::run(&app.core_config, &reporter)?;
    let grid = match args.between.as_deref() {
        Some([from, to]) => {
            info!(
                "Interpolating {} point(s) from {} to {}.",
                app.grid_points, from, to
            );
            grid::interpolate(&report.limits, from, to, app.grid_points)?
        }
        Some(other) => {
            return Err(CliError::Argument(format!(
                "--between expects two limits, got {}",
                other.len()
            )));
        }
        None => {
            info!(
                "Sampling {} point(s) per axis inside the region of {}.",
                app.grid_points, report.limits.target
            );
            grid::sample(&report.limits, app.grid_points)?
        }
    };

    LimitsTableFile::write_to_path(&grid.to_table(), &args.output)
        .map_err(|e| CliError::writing(&args.output, e))?;
    println!(
        "✓ {} chemical potential point(s) written to: {}",
        grid.len(),
        args.output.display()
    );
    Ok(())
}
