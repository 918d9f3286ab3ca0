use crate::cli::IngestArgs;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use chempot::engine::{
    cache::{CachePolicy, PhaseTableCache},
    ingest::{CalculationTree, IngestReport},
    progress::ProgressReporter,
};
use tracing::info;

pub fn run(args: IngestArgs) -> Result<()> {
    let tree = CalculationTree::new(&args.calculations, args.strict);
    let policy = if args.force {
        CachePolicy::Rebuild
    } else {
        CachePolicy::RefreshIfStale
    };
    let cache = PhaseTableCache::new(&args.output, policy);

    let sources = tree.source_files()?;
    if let Some(table) = cache.load(&sources)? {
        println!(
            "Phase table {} is up to date ({} phase(s)). Use --force to re-parse.",
            args.output.display(),
            table.len()
        );
        return Ok(());
    }

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    info!("Parsing calculations under {:?}", &args.calculations);
    let report = tree.ingest(&reporter)?;
    cache.store(&report.table, &sources)?;

    print!("{}", summarize(&report));
    println!("✓ Phase table written to: {}", args.output.display());
    Ok(())
}

fn summarize(report: &IngestReport) -> String {
    let mut out = format!("Parsed {} phase(s).\n", report.table.len());
    if !report.skipped.is_empty() {
        out.push_str(&format!("Skipped {} calculation(s):\n", report.skipped.len()));
        for skipped in &report.skipped {
            out.push_str(&format!(
                "  {}: {}\n",
                skipped.directory.display(),
                skipped.reason
            ));
        }
    }
    if !report.incomplete.is_empty() {
        out.push_str(&format!(
            "{} calculation(s) are incomplete:\n",
            report.incomplete.len()
        ));
        for incomplete in &report.incomplete {
            out.push_str(&format!(
                "  {} (found: {})\n",
                incomplete.directory.display(),
                incomplete.found.join(", ")
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chempot::engine::ingest::{IncompleteCalculation, SkippedCalculation};
    use std::path::PathBuf;

    #[test]
    fn summary_lists_skipped_and_incomplete_directories() {
        let report = IngestReport {
            skipped: vec![SkippedCalculation {
                directory: PathBuf::from("runs/CdTe2_EaH_0"),
                reason: "structure holds CdTe".to_string(),
            }],
            incomplete: vec![IncompleteCalculation {
                directory: PathBuf::from("runs/Te_EaH_0"),
                found: vec!["INCAR".to_string(), "POSCAR".to_string()],
            }],
            ..Default::default()
        };
        let text = summarize(&report);
        assert!(text.starts_with("Parsed 0 phase(s)."));
        assert!(text.contains("runs/CdTe2_EaH_0: structure holds CdTe"));
        assert!(text.contains("runs/Te_EaH_0 (found: INCAR, POSCAR)"));
    }

    #[test]
    fn clean_summary_has_a_single_line() {
        assert_eq!(summarize(&IngestReport::default()), "Parsed 0 phase(s).\n");
    }
}
