use super::table::{TableError, check_required_columns};
use super::traits::TableFile;
use std::io::{Read, Write};

const LIMIT_COLUMN: &str = "limit";
const MU_PREFIX: &str = "mu_";

/// A flat, archivable view of a set of chemical potential limits: one labelled
/// row per vertex, one column per species.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LimitsTable {
    pub species: Vec<String>,
    pub rows: Vec<LimitsRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LimitsRow {
    pub label: String,
    pub values: Vec<f64>,
}

impl LimitsTable {
    pub fn value(&self, label: &str, species: &str) -> Option<f64> {
        let col = self.species.iter().position(|s| s == species)?;
        self.rows
            .iter()
            .find(|row| row.label == label)
            .and_then(|row| row.values.get(col).copied())
    }
}

/// CSV layout: `limit,mu_<El1>,mu_<El2>,...`.
pub struct LimitsTableFile;

impl TableFile for LimitsTableFile {
    type Table = LimitsTable;
    type Error = TableError;

    fn read_from(reader: impl Read) -> Result<LimitsTable, TableError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = reader.headers()?.clone();
        check_required_columns(&headers, &[LIMIT_COLUMN])?;

        let label_col = headers
            .iter()
            .position(|h| h == LIMIT_COLUMN)
            .unwrap_or_default();
        let species_cols: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter_map(|(idx, h)| h.strip_prefix(MU_PREFIX).map(|el| (idx, el.to_string())))
            .collect();
        if species_cols.is_empty() {
            return Err(TableError::Malformed(
                "no chemical potential columns (expected 'mu_<element>')".to_string(),
            ));
        }

        let mut table = LimitsTable {
            species: species_cols.iter().map(|(_, el)| el.clone()).collect(),
            rows: Vec::new(),
        };
        for (row_idx, record) in reader.records().enumerate() {
            let record = record?;
            let label = record.get(label_col).unwrap_or_default().to_string();
            let values = species_cols
                .iter()
                .map(|(col, el)| {
                    let text = record.get(*col).unwrap_or_default();
                    text.parse::<f64>().map_err(|_| {
                        TableError::Malformed(format!(
                            "row {}: invalid value '{}' for mu_{}",
                            row_idx + 1,
                            text,
                            el
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            table.rows.push(LimitsRow { label, values });
        }
        Ok(table)
    }

    fn write_to(table: &LimitsTable, writer: impl Write) -> Result<(), TableError> {
        let mut writer = csv::Writer::from_writer(writer);
        let mut header = vec![LIMIT_COLUMN.to_string()];
        header.extend(table.species.iter().map(|el| format!("{}{}", MU_PREFIX, el)));
        writer.write_record(&header)?;

        for row in &table.rows {
            if row.values.len() != table.species.len() {
                return Err(TableError::Malformed(format!(
                    "limit '{}' has {} values for {} species",
                    row.label,
                    row.values.len(),
                    table.species.len()
                )));
            }
            let mut record = vec![row.label.clone()];
            record.extend(row.values.iter().map(|v| v.to_string()));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}
