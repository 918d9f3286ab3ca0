//! Writer for the plain-text input file of CPLAP (Chemical Potential Limits
//! Analysis Program).
//!
//! CPLAP reads the file positionally and has no error recovery, so every
//! field is written in a fixed order with a fixed float format. The trailing
//! `#` annotations are ignored by CPLAP.

use crate::core::models::composition::Composition;
use crate::core::models::phase::Phase;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CplapError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("CPLAP requires integer stoichiometry, but '{0}' has fractional amounts")]
    NonIntegerStoichiometry(String),
    #[error("Dependent element '{element}' is not part of the bulk compound '{bulk}'")]
    InvalidDependentElement { element: String, bulk: String },
}

fn stoichiometry(phase: &Phase) -> Result<String, CplapError> {
    let composition: &Composition = phase.composition();
    if !composition.has_integer_amounts() {
        return Err(CplapError::NonIntegerStoichiometry(phase.formula().to_string()));
    }
    Ok(composition
        .iter()
        .map(|(el, amount)| format!("{} {}", amount.round() as i64, el))
        .collect::<Vec<_>>()
        .join(" "))
}

/// Writes the CPLAP `input.dat` for `bulk` bordered by `competing` phases.
///
/// Elemental phases and the bulk itself are filtered out of `competing`;
/// the remaining phases are written in the order given.
pub fn write_input(
    writer: &mut impl Write,
    bulk: &Phase,
    dependent_element: &str,
    competing: &[&Phase],
) -> Result<(), CplapError> {
    if !bulk.composition().contains(dependent_element) {
        return Err(CplapError::InvalidDependentElement {
            element: dependent_element.to_string(),
            bulk: bulk.formula().to_string(),
        });
    }

    let bordering: Vec<&Phase> = competing
        .iter()
        .copied()
        .filter(|p| !p.is_elemental() && !p.composition().same_stoichiometry(bulk.composition()))
        .collect();

    writeln!(
        writer,
        "{}  # number of elements in bulk",
        bulk.composition().num_elements()
    )?;
    writeln!(
        writer,
        "{} {:.6}  # number of atoms, element, formation energy (bulk)",
        stoichiometry(bulk)?,
        bulk.formation_energy
    )?;
    writeln!(writer, "{}  # dependent variable (element)", dependent_element)?;
    writeln!(writer, "{}  # number of bordering phases", bordering.len())?;
    for phase in bordering {
        writeln!(
            writer,
            "{}  # number of elements in phase:",
            phase.composition().num_elements()
        )?;
        writeln!(
            writer,
            "{} {:.6}  # number of atoms, element, formation energy",
            stoichiometry(phase)?,
            phase.formation_energy
        )?;
    }
    Ok(())
}

pub fn write_input_to_path<P: AsRef<Path>>(
    path: P,
    bulk: &Phase,
    dependent_element: &str,
    competing: &[&Phase],
) -> Result<(), CplapError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_input(&mut writer, bulk, dependent_element, competing)?;
    writer.flush()?;
    Ok(())
}
