//! # Engine Module
//!
//! Turns a phase table into the stability region of a target compound.
//!
//! ## Overview
//!
//! The engine loads phases ([`source`], [`ingest`], [`cache`]), reduces the
//! stability conditions of the target to half-spaces over the independent
//! chemical potentials ([`constraints`]), enumerates the vertices of the
//! resulting polytope ([`polytope`]) and assembles them into labelled limits
//! ([`limits`]). Extrinsic species are bounded at each vertex afterwards
//! ([`extrinsic`]), and the region can be sampled on a grid ([`grid`]).
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Target, element set, tolerance and phase source
//! - **Error Handling** ([`error`]) - `EngineError`, covering ingestion and solving
//! - **Progress Monitoring** ([`progress`]) - Callbacks for front ends
//!
//! An empty stability region is always reported as
//! [`error::EngineError::InfeasibleSystem`], never as an empty result.

pub mod cache;
pub mod config;
pub(crate) mod constraints;
pub mod error;
pub mod extrinsic;
pub mod grid;
pub mod ingest;
pub mod limits;
pub(crate) mod polytope;
pub mod progress;
pub mod source;
