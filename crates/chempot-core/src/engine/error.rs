use super::config::ConfigError;
use crate::core::io::outcar::OutcarError;
use crate::core::io::poscar::PoscarError;
use crate::core::io::table::TableError;
use crate::core::models::composition::FormulaError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Phase table error: {0}")]
    Table(#[from] TableError),

    #[error("Invalid formula: {0}")]
    Formula(#[from] FormulaError),

    #[error("Failed to read OUTCAR '{path}': {source}", path = path.display())]
    Outcar {
        path: PathBuf,
        #[source]
        source: OutcarError,
    },

    #[error("Failed to read structure '{path}': {source}", path = path.display())]
    Structure {
        path: PathBuf,
        #[source]
        source: PoscarError,
    },

    #[error(
        "Inconsistent composition in '{directory}': the directory name encodes {expected} but the structure contains {found}",
        directory = directory.display()
    )]
    InconsistentComposition {
        directory: PathBuf,
        expected: String,
        found: String,
    },

    #[error(
        "Inconsistent cell in '{directory}': OUTCAR reports {outcar_ions} ions but the structure has {structure_atoms} atoms",
        directory = directory.display()
    )]
    IonCountMismatch {
        directory: PathBuf,
        outcar_ions: usize,
        structure_atoms: usize,
    },

    #[error("No elemental reference phase for '{element}'; add a calculation of the pure element")]
    MissingElementalReference { element: String },

    #[error("Target compound '{target}' is not present in the phase table")]
    TargetNotFound { target: String },

    #[error("Invalid target compound '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("Dependent element '{element}' does not appear in target compound '{target}'")]
    InvalidDependentElement { element: String, target: String },

    #[error(
        "No chemical potential region stabilizes {target}; violated by: {}. The phase set is likely incomplete or contains an erroneous energy",
        violated.join(", ")
    )]
    InfeasibleSystem {
        target: String,
        violated: Vec<String>,
    },

    #[error("Unknown chemical potential limit '{name}'; expected a limit label or '<El>-rich' / '<El>-poor'")]
    UnknownLimit { name: String },

    #[error("Chemical potential grids support 1 or 2 independent variables, not {dimension}")]
    UnsupportedGridDimension { dimension: usize },

    #[error("Cache error for '{path}': {source}", path = path.display())]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error for '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Data source error: {0}")]
    Source(String),
}
