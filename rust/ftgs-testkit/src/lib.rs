//! Test utilities for the FTGS crates.
//!
//! - [`data_gen`]: seeded generators of random indexes and group assignments.
//! - [`reference`]: a brute-force, one document at a time FTGS evaluator to check
//!   the real engine against.
//! - [`faults`]: an [`IndexReader`](ftgs_index::IndexReader) wrapper that fails on
//!   demand.

pub mod data_gen;
pub mod faults;
pub mod reference;
