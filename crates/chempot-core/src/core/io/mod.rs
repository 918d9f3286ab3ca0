//! Provides input/output for the files the toolkit reads and writes.
//!
//! The flat phase table ([`table`]) is the interchange format between
//! ingestion and solving; [`limits_table`] and [`cplap`] are export formats.
//! [`outcar`] and [`poscar`] read just enough of the VASP outputs to build a
//! phase table from a directory of finished calculations.

pub mod cplap;
pub mod limits_table;
pub mod outcar;
pub mod poscar;
pub mod table;
pub mod traits;
