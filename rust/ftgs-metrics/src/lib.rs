//! Composable per-document metric transforms.
//!
//! Every node in this crate implements [`ValueLookup`]: it computes a batch of
//! integer values for a batch of document ids, usually by transforming the values of
//! one or two operand lookups. Trees of nodes turn stored per-document values into
//! derived metrics, which the FTGS iterator aggregates per (term, group).
//!
//! # Numeric semantics
//!
//! Results must be reproducible bit-for-bit, so each node pins down its rounding and
//! overflow behavior:
//!
//! - integer arithmetic saturates at the `i64` bounds and never wraps;
//! - transforms computed in floating point with a scale factor `s` evaluate
//!   `f(v / s) * s` in `f64`, then truncate toward zero and saturate into the
//!   `i32` range, NaN becoming zero (see [`scaled_to_int`]).
//!
//! # Building trees
//!
//! Nodes can be assembled directly, or described by a serializable [`MetricDef`]
//! and built against a [`SharedReader`](ftgs_index::SharedReader).

pub mod binary;
pub mod column;
pub mod constant;
pub mod def;
pub mod log1p_exp;
pub mod unary;

pub use binary::{Binary, BinaryOp};
pub use column::ReaderMetric;
pub use constant::{Constant, Count};
pub use def::MetricDef;
pub use ftgs_index::ValueLookup;
pub use log1p_exp::Log1pExp;
pub use unary::{Unary, UnaryOp};

/// Converts the floating point result of a scaled transform back to an integer.
///
/// Truncates toward zero and saturates into `[i32::MIN, i32::MAX]`; NaN maps to `0`.
#[inline]
pub fn scaled_to_int(value: f64) -> i64 {
    value as i32 as i64
}
