use super::error::EngineError;
use super::ingest::CalculationTree;
use super::progress::ProgressReporter;
use crate::core::io::table::PhaseTableFile;
use crate::core::io::traits::TableFile;
use crate::core::models::composition::Composition;
use crate::core::models::phase::PhaseTable;
use crate::core::models::system::ChemicalSystem;
use std::path::PathBuf;
use tracing::{debug, info};

/// Anything that can produce a phase table.
pub trait PhaseSource {
    fn load(&self, reporter: &ProgressReporter) -> Result<PhaseTable, EngineError>;

    /// Files whose modification invalidates a cached copy of the table.
    fn source_files(&self) -> Result<Vec<PathBuf>, EngineError>;
}

/// A previously written phase table.
#[derive(Debug, Clone)]
pub struct TableSource {
    path: PathBuf,
}

impl TableSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PhaseSource for TableSource {
    fn load(&self, _reporter: &ProgressReporter) -> Result<PhaseTable, EngineError> {
        let table = PhaseTableFile::read_from_path(&self.path)?;
        info!("Read {} phase(s) from {}.", table.len(), self.path.display());
        Ok(table)
    }

    fn source_files(&self) -> Result<Vec<PathBuf>, EngineError> {
        Ok(vec![self.path.clone()])
    }
}

impl PhaseSource for CalculationTree {
    fn load(&self, reporter: &ProgressReporter) -> Result<PhaseTable, EngineError> {
        Ok(self.ingest(reporter)?.table)
    }

    fn source_files(&self) -> Result<Vec<PathBuf>, EngineError> {
        CalculationTree::source_files(self)
    }
}

/// A phase as reported by a materials database.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidatePhase {
    pub id: String,
    pub formula: String,
    /// Total energy per formula unit, in eV.
    pub energy: f64,
    pub energy_above_hull: f64,
}

/// Query interface of an external materials database.
pub trait PhaseDatabase {
    fn query(&self, system: &ChemicalSystem) -> Result<Vec<CandidatePhase>, EngineError>;
}

/// Picks the phases worth calculating: those within `e_above_hull` eV/atom of
/// the hull and made only of the system's elements. Sorted by formula, then
/// energy above hull, then id.
pub fn select_candidates(
    database: &dyn PhaseDatabase,
    system: &ChemicalSystem,
    e_above_hull: f64,
) -> Result<Vec<CandidatePhase>, EngineError> {
    let mut selected = Vec::new();
    for candidate in database.query(system)? {
        let composition: Composition = candidate.formula.parse()?;
        if !system.covers(&composition) {
            debug!("Ignoring {}: outside the chemical system.", candidate.formula);
            continue;
        }
        if candidate.energy_above_hull > e_above_hull {
            debug!(
                "Ignoring {} ({}): {:.3} eV/atom above the hull.",
                candidate.formula, candidate.id, candidate.energy_above_hull
            );
            continue;
        }
        selected.push(candidate);
    }
    selected.sort_by(|a, b| {
        a.formula
            .cmp(&b.formula)
            .then(a.energy_above_hull.total_cmp(&b.energy_above_hull))
            .then_with(|| a.id.cmp(&b.id))
    });
    info!(
        "Selected {} candidate phase(s) for {} within {} eV/atom of the hull.",
        selected.len(),
        system.elements().join("-"),
        e_above_hull
    );
    Ok(selected)
}

/// Directory name for a candidate's calculation, in the layout
/// [`CalculationTree`] reads back.
pub fn calculation_directory_name(candidate: &CandidatePhase) -> String {
    format!("{}_EaH_{}", candidate.formula, candidate.energy_above_hull)
}
