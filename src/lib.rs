//! Propstream - relational proposition retrieval for clinical data sources
//!
//! This crate reconstructs typed clinical propositions from relational
//! databases through:
//! - Declarative entity specs mapping proposition types to tables and joins
//! - Compilation of entity sets and filters into dialect-correct SQL
//! - Positional result processing into a merged proposition model
//! - Key-grouped streaming delivery with bounded backpressure

pub mod dataspec;
pub mod db;
pub mod executor;
pub mod results;
pub mod sqlgen;
