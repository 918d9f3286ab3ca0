use super::traits::TableFile;
use crate::core::models::composition::FormulaError;
use crate::core::models::phase::{Phase, PhaseTable};
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use thiserror::Error;

/// Columns every phase table must provide, in the order they are written.
pub const REQUIRED_COLUMNS: [&str; 4] = ["formula", "energy_per_fu", "energy", "formation_energy"];

pub const ENERGY_ABOVE_HULL_COLUMN: &str = "energy_above_hull";

#[derive(Debug, Error)]
pub enum TableError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Missing required field '{column}' in table header")]
    MissingRequiredField { column: String },
    #[error("Invalid formula on row {row}: {source}")]
    InvalidFormula {
        row: usize,
        #[source]
        source: FormulaError,
    },
    #[error("Malformed limits table: {0}")]
    Malformed(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct PhaseRecord {
    formula: String,
    energy_per_fu: f64,
    energy: f64,
    formation_energy: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    energy_above_hull: Option<f64>,
}

/// Checks that every column in `required` is present in `headers`.
pub(crate) fn check_required_columns(
    headers: &csv::StringRecord,
    required: &[&str],
) -> Result<(), TableError> {
    for column in required {
        if !headers.iter().any(|h| h.trim() == *column) {
            return Err(TableError::MissingRequiredField {
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

/// The persisted phase table: one row per phase with the columns
/// `formula, energy_per_fu, energy, formation_energy` and an optional
/// `energy_above_hull`.
pub struct PhaseTableFile;

impl TableFile for PhaseTableFile {
    type Table = PhaseTable;
    type Error = TableError;

    fn read_from(reader: impl Read) -> Result<PhaseTable, TableError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        check_required_columns(&headers, &REQUIRED_COLUMNS)?;

        let mut table = PhaseTable::new();
        for (idx, result) in reader.deserialize::<PhaseRecord>().enumerate() {
            let record = result?;
            let row = idx + 1;
            let mut phase = Phase::new(
                &record.formula,
                record.energy,
                record.energy_per_fu,
                record.formation_energy,
            )
            .map_err(|source| TableError::InvalidFormula { row, source })?;
            if let Some(e_hull) = record.energy_above_hull {
                phase = phase.with_energy_above_hull(e_hull);
            }
            table.insert(phase);
        }
        Ok(table)
    }

    fn write_to(table: &PhaseTable, writer: impl Write) -> Result<(), TableError> {
        let has_hull = table.iter().any(|p| p.energy_above_hull.is_some());
        let mut writer = csv::Writer::from_writer(writer);

        let mut header: Vec<&str> = REQUIRED_COLUMNS.to_vec();
        if has_hull {
            header.push(ENERGY_ABOVE_HULL_COLUMN);
        }
        writer.write_record(&header)?;

        for phase in table.iter() {
            let mut row = vec![
                phase.formula().to_string(),
                phase.energy_per_fu.to_string(),
                phase.energy.to_string(),
                phase.formation_energy.to_string(),
            ];
            if has_hull {
                row.push(
                    phase
                        .energy_above_hull
                        .map(|e| e.to_string())
                        .unwrap_or_default(),
                );
            }
            writer.write_record(&row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TABLE: &str = "\
formula,energy_per_fu,energy,formation_energy
La,-4.9,-19.6,0.0
Mn,-9.1,-527.8,0.0
O2,-9.86,-19.72,0.0
MnO2,-22.8,-91.2,-4.9
LaMnO3,-43.2,-172.8,-14.1
";

    #[test]
    fn reads_valid_table() {
        let table = PhaseTableFile::read_from(TABLE.as_bytes()).unwrap();
        assert_eq!(table.len(), 5);
        let target = table.get("LaMnO3").unwrap();
        assert_eq!(target.formation_energy, -14.1);
        assert_eq!(target.energy, -172.8);
        assert!(target.energy_above_hull.is_none());
    }

    #[test]
    fn missing_formation_energy_column_is_reported() {
        let content = "formula,energy_per_fu,energy\nLa,-4.9,-19.6\n";
        let result = PhaseTableFile::read_from(content.as_bytes());
        match result {
            Err(TableError::MissingRequiredField { column }) => {
                assert_eq!(column, "formation_energy")
            }
            other => panic!("expected MissingRequiredField, got {:?}", other),
        }
    }

    #[test]
    fn missing_column_is_reported_even_without_rows() {
        let content = "formula,energy,formation_energy\n";
        let result = PhaseTableFile::read_from(content.as_bytes());
        assert!(matches!(
            result,
            Err(TableError::MissingRequiredField { column }) if column == "energy_per_fu"
        ));
    }

    #[test]
    fn invalid_formula_reports_row() {
        let content = "formula,energy_per_fu,energy,formation_energy\nLa,-4.9,-19.6,0\nXq2,-1,-1,-1\n";
        let result = PhaseTableFile::read_from(content.as_bytes());
        assert!(matches!(result, Err(TableError::InvalidFormula { row: 2, .. })));
    }

    #[test]
    fn non_numeric_energy_is_a_csv_error() {
        let content = "formula,energy_per_fu,energy,formation_energy\nLa,abc,-19.6,0\n";
        let result = PhaseTableFile::read_from(content.as_bytes());
        assert!(matches!(result, Err(TableError::Csv(_))));
    }

    #[test]
    fn optional_hull_column_is_kept_through_write_and_read() {
        let content = "formula,energy_per_fu,energy,formation_energy,energy_above_hull\nMnO2,-22.8,-91.2,-4.9,0.012\nMn,-9.1,-9.1,0,\n";
        let table = PhaseTableFile::read_from(content.as_bytes()).unwrap();
        assert_eq!(table.get("MnO2").unwrap().energy_above_hull, Some(0.012));
        assert_eq!(table.get("Mn").unwrap().energy_above_hull, None);

        let mut buffer = Vec::new();
        PhaseTableFile::write_to(&table, &mut buffer).unwrap();
        let reread = PhaseTableFile::read_from(buffer.as_slice()).unwrap();
        assert_eq!(reread, table);
    }

    #[test]
    fn write_to_path_round_trips_exact_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("competing_phases.csv");
        let table = PhaseTableFile::read_from(TABLE.as_bytes()).unwrap();

        PhaseTableFile::write_to_path(&table, &path).unwrap();
        let reread = PhaseTableFile::read_from_path(&path).unwrap();
        assert_eq!(reread, table);

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("formula,energy_per_fu,energy,formation_energy\n"));
    }
}
