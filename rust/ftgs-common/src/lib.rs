//! Core definitions (error type, result alias and argument checks), relied upon by all
//! ftgs-* crates.

pub mod error;
pub mod result;

pub use result::Result;
