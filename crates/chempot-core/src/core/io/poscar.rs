//! Reads the composition of a VASP 5 `POSCAR`/`CONTCAR`.

use crate::core::models::composition::Composition;
use crate::core::models::element;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

const SPECIES_LINE: usize = 5;
const COUNTS_LINE: usize = 6;

#[derive(Debug, Error)]
pub enum PoscarError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("File ends before the species and ion-count lines")]
    Truncated,
    #[error("No species line found (VASP 4 format is not supported)")]
    MissingSpecies,
    #[error("Unknown species label '{0}'")]
    UnknownSpecies(String),
    #[error("Invalid ion count '{0}'")]
    InvalidCount(String),
    #[error("{species} species but {counts} ion counts")]
    CountMismatch { species: usize, counts: usize },
}

/// Returns the cell composition (ion counts per species).
pub fn read_composition(reader: impl BufRead) -> Result<Composition, PoscarError> {
    let lines: Vec<String> = reader
        .lines()
        .take(COUNTS_LINE + 1)
        .collect::<Result<_, _>>()?;
    if lines.len() <= COUNTS_LINE {
        return Err(PoscarError::Truncated);
    }

    let labels: Vec<&str> = lines[SPECIES_LINE].split_whitespace().collect();
    if labels.is_empty() || labels.iter().all(|l| l.parse::<f64>().is_ok()) {
        return Err(PoscarError::MissingSpecies);
    }
    let counts: Vec<&str> = lines[COUNTS_LINE].split_whitespace().collect();
    if labels.len() != counts.len() {
        return Err(PoscarError::CountMismatch {
            species: labels.len(),
            counts: counts.len(),
        });
    }

    let mut composition = Composition::new();
    for (label, count) in labels.iter().zip(counts) {
        let symbol = element::species_symbol(label)
            .ok_or_else(|| PoscarError::UnknownSpecies(label.to_string()))?;
        let count: usize = count
            .parse()
            .map_err(|_| PoscarError::InvalidCount(count.to_string()))?;
        composition.add(symbol, count as f64);
    }
    Ok(composition)
}

pub fn read_composition_from_path<P: AsRef<Path>>(path: P) -> Result<Composition, PoscarError> {
    let file = File::open(path)?;
    read_composition(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    const POSCAR: &str = "\
LaMnO3
1.0
  3.9 0.0 0.0
  0.0 3.9 0.0
  0.0 0.0 3.9
  La_s Mn_pv O
  4 4 12
Direct
";

    #[test]
    fn reads_species_and_counts() {
        let comp = read_composition(POSCAR.as_bytes()).unwrap();
        assert_eq!(comp.get("La"), 4.0);
        assert_eq!(comp.get("Mn"), 4.0);
        assert_eq!(comp.get("O"), 12.0);
        assert_eq!(comp.reduced_formula(), "LaMnO3");
    }

    #[test]
    fn vasp4_format_is_rejected() {
        let vasp4 = POSCAR.replace("  La_s Mn_pv O\n", "");
        let result = read_composition(format!("{}extra\n", vasp4).as_bytes());
        assert!(matches!(result, Err(PoscarError::MissingSpecies)));
    }

    #[test]
    fn mismatched_counts_are_rejected() {
        let bad = POSCAR.replace("4 4 12", "4 4");
        assert!(matches!(
            read_composition(bad.as_bytes()),
            Err(PoscarError::CountMismatch { species: 3, counts: 2 })
        ));
    }

    #[test]
    fn truncated_file_is_rejected() {
        let result = read_composition("LaMnO3\n1.0\n".as_bytes());
        assert!(matches!(result, Err(PoscarError::Truncated)));
    }
}
