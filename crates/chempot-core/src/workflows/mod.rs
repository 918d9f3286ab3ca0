//! # Workflows Module
//!
//! High-level entry points that tie the [`crate::core`] models and the
//! [`crate::engine`] together.
//!
//! - **Limits Workflow** ([`limits`]) - Loads phases from a table or a calculation
//!   tree (optionally through a cache), solves for the intrinsic stability region
//!   of the target and extends it with extrinsic species.

pub mod limits;
