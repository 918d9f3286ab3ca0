//! Stateless data models: element symbols, compositions, phases and the
//! chemical system they live in.

pub mod composition;
pub mod element;
pub mod phase;
pub mod system;
