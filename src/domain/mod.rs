//! Domain layer types and invariants.

pub mod aggregate;
pub mod entities;
