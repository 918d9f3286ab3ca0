//! Builds a phase table from a directory of finished VASP calculations.
//!
//! Each immediate sub-directory of the root is one phase, named
//! `<formula>[_<suffix>]` (`MnO2_EaH_0.012`, `O2_mp-12957`). Its `OUTCAR` and
//! `CONTCAR` (or `POSCAR`) are looked up in the directory itself or in a
//! nested run directory, preferring `vasp_std`.

use super::error::EngineError;
use super::progress::{Progress, ProgressReporter};
use crate::core::io::{outcar, poscar};
use crate::core::models::composition::Composition;
use crate::core::models::phase::{Phase, PhaseTable};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

const OUTCAR: &str = "OUTCAR";
const STRUCTURE_FILES: [&str; 2] = ["CONTCAR", "POSCAR"];
const PREFERRED_RUN_DIR: &str = "vasp_std";

/// One calculation directory with both outputs present.
#[derive(Debug, Clone, PartialEq)]
pub struct CalculationEntry {
    pub directory: PathBuf,
    /// Formula encoded in the directory name.
    pub formula: String,
    pub outcar: PathBuf,
    pub structure: PathBuf,
}

/// A directory that does not yet hold the outputs needed to parse it.
#[derive(Debug, Clone, PartialEq)]
pub struct IncompleteCalculation {
    pub directory: PathBuf,
    /// Every file name that was found, relative to `directory`.
    pub found: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedCalculation {
    pub directory: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub table: PhaseTable,
    pub skipped: Vec<SkippedCalculation>,
    pub incomplete: Vec<IncompleteCalculation>,
}

#[derive(Debug, Clone)]
pub struct CalculationTree {
    root: PathBuf,
    strict: bool,
}

/// Raw per-cell results of one calculation, before formation energies are
/// known.
#[derive(Debug, Clone)]
struct ParsedCalculation {
    formula: String,
    composition: Composition,
    energy: f64,
    energy_per_fu: f64,
}

impl CalculationTree {
    /// With `strict`, a composition or ion count mismatch aborts ingestion;
    /// otherwise the entry is skipped and reported.
    pub fn new(root: impl Into<PathBuf>, strict: bool) -> Self {
        Self {
            root: root.into(),
            strict,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lists complete and incomplete calculation directories, sorted by path.
    pub fn scan(&self) -> Result<(Vec<CalculationEntry>, Vec<IncompleteCalculation>), EngineError> {
        let mut entries = Vec::new();
        let mut incomplete = Vec::new();

        for directory in sorted_subdirectories(&self.root)? {
            let Some(formula) = formula_from_directory(&directory) else {
                debug!("Skipping {}: name does not start with a formula.", directory.display());
                continue;
            };
            match locate_outputs(&directory)? {
                Some((outcar, structure)) => entries.push(CalculationEntry {
                    directory,
                    formula,
                    outcar,
                    structure,
                }),
                None => {
                    let found = list_files(&directory)?;
                    incomplete.push(IncompleteCalculation { directory, found });
                }
            }
        }
        Ok((entries, incomplete))
    }

    /// The output files the table depends on, for cache staleness checks.
    pub fn source_files(&self) -> Result<Vec<PathBuf>, EngineError> {
        let (entries, _) = self.scan()?;
        Ok(entries
            .into_iter()
            .flat_map(|entry| [entry.outcar, entry.structure])
            .collect())
    }

    #[instrument(skip_all, name = "ingest_calculations", fields(root = %self.root.display()))]
    pub fn ingest(&self, reporter: &ProgressReporter) -> Result<IngestReport, EngineError> {
        reporter.report(Progress::PhaseStart {
            name: "Parsing Calculations",
        });
        let (entries, mut incomplete) = self.scan()?;
        info!("Found {} calculation(s) under {}.", entries.len(), self.root.display());

        reporter.report(Progress::TaskStart {
            total_steps: entries.len() as u64,
        });

        #[cfg(not(feature = "parallel"))]
        let iterator = entries.iter();

        #[cfg(feature = "parallel")]
        let iterator = entries.par_iter();

        let results: Vec<Result<ParsedCalculation, EngineError>> = iterator
            .map(|entry| {
                let result = parse_entry(entry);
                reporter.report(Progress::TaskIncrement);
                result
            })
            .collect();
        reporter.report(Progress::TaskFinish);

        let mut parsed = Vec::with_capacity(results.len());
        let mut skipped = Vec::new();
        for (entry, result) in entries.iter().zip(results) {
            match result {
                Ok(calculation) => parsed.push(calculation),
                Err(
                    e @ (EngineError::InconsistentComposition { .. }
                    | EngineError::IonCountMismatch { .. }),
                ) if !self.strict => {
                    warn!("Skipping {}: {}", entry.directory.display(), e);
                    skipped.push(SkippedCalculation {
                        directory: entry.directory.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(EngineError::Outcar {
                    source: outcar::OutcarError::NoEnergy,
                    ..
                }) => {
                    incomplete.push(IncompleteCalculation {
                        directory: entry.directory.clone(),
                        found: list_files(&entry.directory)?,
                    });
                }
                Err(e) => return Err(e),
            }
        }
        reporter.report(Progress::PhaseFinish);

        if !incomplete.is_empty() {
            let summary = incomplete
                .iter()
                .map(|c| format!("{} (found: {})", c.directory.display(), found_summary(&c.found)))
                .collect::<Vec<_>>()
                .join("; ");
            let message = format!(
                "{} calculation(s) have no usable OUTCAR and structure yet and were ignored: {}",
                incomplete.len(),
                summary
            );
            warn!("{}", message);
            reporter.warning(message);
        }

        let table = build_table(parsed)?;
        info!("Ingested {} phase(s).", table.len());
        Ok(IngestReport {
            table,
            skipped,
            incomplete,
        })
    }
}

/// Formation energies from raw energies: the reference of each element is
/// the lowest energy per atom among its elemental phases.
fn build_table(parsed: Vec<ParsedCalculation>) -> Result<PhaseTable, EngineError> {
    let mut references: BTreeMap<String, f64> = BTreeMap::new();
    for calc in parsed.iter().filter(|c| c.composition.is_elemental()) {
        let per_atom = calc.energy_per_fu / calc.composition.num_atoms();
        for element in calc.composition.elements() {
            references
                .entry(element.to_string())
                .and_modify(|e| *e = e.min(per_atom))
                .or_insert(per_atom);
        }
    }

    let mut phases = Vec::with_capacity(parsed.len());
    for calc in parsed {
        let mut reference_energy = 0.0;
        for (element, amount) in calc.composition.iter() {
            let reference = references
                .get(element)
                .ok_or_else(|| EngineError::MissingElementalReference {
                    element: element.to_string(),
                })?;
            reference_energy += amount * reference;
        }
        let phase = Phase::new(
            &calc.formula,
            calc.energy,
            calc.energy_per_fu,
            calc.energy_per_fu - reference_energy,
        )?;
        phases.push(phase);
    }
    Ok(PhaseTable::from_phases(phases))
}

fn parse_entry(entry: &CalculationEntry) -> Result<ParsedCalculation, EngineError> {
    let composition: Composition = entry.formula.parse()?;
    let summary = outcar::read_summary_from_path(&entry.outcar).map_err(|source| EngineError::Outcar {
        path: entry.outcar.clone(),
        source,
    })?;
    let cell = poscar::read_composition_from_path(&entry.structure).map_err(|source| {
        EngineError::Structure {
            path: entry.structure.clone(),
            source,
        }
    })?;

    if !cell.same_stoichiometry(&composition) {
        return Err(EngineError::InconsistentComposition {
            directory: entry.directory.clone(),
            expected: composition.reduced_formula(),
            found: cell.reduced_formula(),
        });
    }
    let structure_atoms = cell.num_atoms().round() as usize;
    if let Some(outcar_ions) = summary.num_ions.filter(|&n| n != structure_atoms) {
        return Err(EngineError::IonCountMismatch {
            directory: entry.directory.clone(),
            outcar_ions,
            structure_atoms,
        });
    }
    if !summary.is_finished {
        warn!(
            "{} has not finished; using the last ionic step energy.",
            entry.outcar.display()
        );
    }

    let formula_units = cell.num_atoms() / composition.num_atoms();
    Ok(ParsedCalculation {
        formula: entry.formula.clone(),
        composition,
        energy: summary.final_energy,
        energy_per_fu: summary.final_energy / formula_units,
    })
}

fn formula_from_directory(directory: &Path) -> Option<String> {
    let name = directory.file_name()?.to_str()?;
    let formula = name.split('_').next()?;
    formula
        .parse::<Composition>()
        .ok()
        .map(|_| formula.to_string())
}

fn sorted_subdirectories(dir: &Path) -> Result<Vec<PathBuf>, EngineError> {
    let io_error = |source: std::io::Error| EngineError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Finds the `OUTCAR` and structure file, first in `directory`, then in its
/// `vasp_std` sub-directory, then in any other sub-directory.
fn locate_outputs(directory: &Path) -> Result<Option<(PathBuf, PathBuf)>, EngineError> {
    let mut candidates = vec![directory.to_path_buf(), directory.join(PREFERRED_RUN_DIR)];
    candidates.extend(
        sorted_subdirectories(directory)?
            .into_iter()
            .filter(|d| d.file_name().is_some_and(|n| n != PREFERRED_RUN_DIR)),
    );

    for dir in candidates {
        let outcar = dir.join(OUTCAR);
        if !outcar.is_file() {
            continue;
        }
        let structure = STRUCTURE_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| fs::metadata(path).is_ok_and(|m| m.is_file() && m.len() > 0));
        if let Some(structure) = structure {
            return Ok(Some((outcar, structure)));
        }
    }
    Ok(None)
}

fn list_files(directory: &Path) -> Result<Vec<String>, EngineError> {
    let mut found = Vec::new();
    collect_files(directory, directory, &mut found)?;
    found.sort();
    Ok(found)
}

fn collect_files(base: &Path, dir: &Path, found: &mut Vec<String>) -> Result<(), EngineError> {
    let io_error = |source: std::io::Error| EngineError::Io {
        path: dir.to_path_buf(),
        source,
    };
    for entry in fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if path.is_dir() {
            collect_files(base, &path, found)?;
        } else if let Ok(relative) = path.strip_prefix(base) {
            found.push(relative.display().to_string());
        }
    }
    Ok(())
}

fn found_summary(found: &[String]) -> String {
    if found.is_empty() {
        "nothing".to_string()
    } else {
        found.join(", ")
    }
}
