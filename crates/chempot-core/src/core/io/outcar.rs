//! Minimal VASP `OUTCAR` reader: only what the phase table needs.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

const ENERGY_MARKER: &str = "energy(sigma->0)";
const NIONS_MARKER: &str = "NIONS =";
const FINISHED_MARKER: &str = "General timing and accounting informations for this job";

#[derive(Debug, Error)]
pub enum OutcarError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("No 'energy(sigma->0)' entry found; the calculation has not completed an ionic step")]
    NoEnergy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutcarSummary {
    /// `energy(sigma->0)` of the last ionic step, in eV per cell.
    pub final_energy: f64,
    pub num_ions: Option<usize>,
    /// Whether VASP wrote its closing timing block.
    pub is_finished: bool,
}

/// Reads the final energy from an `OUTCAR`. Works on incomplete runs as
/// long as at least one ionic step was written.
pub fn read_summary(reader: impl BufRead) -> Result<OutcarSummary, OutcarError> {
    let mut final_energy = None;
    let mut num_ions = None;
    let mut is_finished = false;

    for line in reader.lines() {
        let line = line?;
        if let Some(pos) = line.find(ENERGY_MARKER) {
            if let Some(value) = number_after(&line[pos + ENERGY_MARKER.len()..], "=") {
                final_energy = Some(value);
            }
        } else if num_ions.is_none() && line.contains(NIONS_MARKER) {
            num_ions = line
                .split_whitespace()
                .filter_map(|w| w.parse::<usize>().ok())
                .last();
        } else if line.contains(FINISHED_MARKER) {
            is_finished = true;
        }
    }

    Ok(OutcarSummary {
        final_energy: final_energy.ok_or(OutcarError::NoEnergy)?,
        num_ions,
        is_finished,
    })
}

pub fn read_summary_from_path<P: AsRef<Path>>(path: P) -> Result<OutcarSummary, OutcarError> {
    let file = File::open(path)?;
    read_summary(BufReader::new(file))
}

fn number_after(s: &str, marker: &str) -> Option<f64> {
    let pos = s.find(marker)?;
    s[pos + marker.len()..].split_whitespace().next()?.parse().ok()
}
