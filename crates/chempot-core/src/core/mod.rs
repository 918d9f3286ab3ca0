//! # Core Module
//!
//! Stateless building blocks for chemical potential limit analysis.
//!
//! - **Data Models** ([`models`]) - Element symbols, compositions, phases, phase tables
//!   and chemical systems
//! - **File I/O** ([`io`]) - The persisted phase table, limits tables, the CPLAP input
//!   format and minimal VASP output readers
//!
//! Nothing in this module solves anything; the stability-region construction
//! lives in [`crate::engine`].

pub mod io;
pub mod models;
