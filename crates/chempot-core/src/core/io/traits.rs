use std::error::Error;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Defines the interface for reading and writing the flat tabular files that
/// are the on-disk interchange format of the toolkit.
///
/// Implementors handle the column layout of one kind of table; the path-based
/// helpers are shared.
pub trait TableFile {
    /// The in-memory value the table (de)serializes.
    type Table;

    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads a table from a reader.
    ///
    /// # Errors
    ///
    /// Returns an error if a required column is missing, a row cannot be
    /// parsed, or reading fails.
    fn read_from(reader: impl Read) -> Result<Self::Table, Self::Error>;

    /// Writes a table to a writer. Output is deterministic for a given table.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    fn write_to(table: &Self::Table, writer: impl Write) -> Result<(), Self::Error>;

    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Self::Table, Self::Error> {
        let file = File::open(path)?;
        Self::read_from(BufReader::new(file))
    }

    fn write_to_path<P: AsRef<Path>>(table: &Self::Table, path: P) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(table, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
