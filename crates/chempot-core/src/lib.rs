//! # Chempot Core Library
//!
//! Chemical potential limits of a compound from the energies of its competing
//! phases, as needed for defect formation energy calculations.
//!
//! ## Architectural Philosophy
//!
//! The library is split into three layers, each depending only on the ones above it:
//!
//! - **[`core`]: The Foundation.** Stateless models (`Composition`, `Phase`,
//!   `PhaseTable`, `ChemicalSystem`) and the file formats: the persisted phase table,
//!   the limits table, CPLAP input and the minimal VASP readers.
//!
//! - **[`engine`]: The Logic Core.** Ingestion and caching of phase tables, the
//!   half-space construction, vertex enumeration, extrinsic bounds and grids.
//!
//! - **[`workflows`]: The Public API.** [`workflows::limits::run`] goes from a
//!   [`engine::config::LimitsConfig`] to a complete set of limits.

pub mod core;
pub mod engine;
pub mod workflows;
