//! Single-operand transforms.

use ftgs_common::{Result, verify_arg};
use ftgs_index::{DocId, ValueLookup};
use serde::{Deserialize, Serialize};

use crate::scaled_to_int;

/// Operation applied by a [`Unary`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    /// `|v|`, saturating (`i64::MIN` maps to `i64::MAX`).
    Abs,
    /// `-v`, saturating.
    Negate,
    /// `trunc(ln(v / s) * s)`, saturated into `i32`. `v == 0` gives `i32::MIN`,
    /// negative `v` gives `0`.
    Log { scale: i32 },
    /// `trunc(exp(v / s) * s)`, saturated into `i32`.
    Exp { scale: i32 },
}

impl UnaryOp {
    #[inline]
    fn apply(self, v: i64) -> i64 {
        match self {
            UnaryOp::Abs => v.saturating_abs(),
            UnaryOp::Negate => v.saturating_neg(),
            UnaryOp::Log { scale } => {
                let scale = scale as f64;
                scaled_to_int((v as f64 / scale).ln() * scale)
            }
            UnaryOp::Exp { scale } => {
                let scale = scale as f64;
                scaled_to_int((v as f64 / scale).exp() * scale)
            }
        }
    }
}

/// Applies a [`UnaryOp`] to each value of its operand.
pub struct Unary {
    op: UnaryOp,
    operand: Box<dyn ValueLookup>,
}

impl Unary {
    pub fn new(op: UnaryOp, operand: Box<dyn ValueLookup>) -> Unary {
        Unary { op, operand }
    }

    pub fn abs(operand: Box<dyn ValueLookup>) -> Unary {
        Unary::new(UnaryOp::Abs, operand)
    }

    pub fn negate(operand: Box<dyn ValueLookup>) -> Unary {
        Unary::new(UnaryOp::Negate, operand)
    }

    pub fn op(&self) -> UnaryOp {
        self.op
    }
}

impl ValueLookup for Unary {
    fn min(&self) -> i64 {
        match self.op {
            UnaryOp::Abs if self.operand.min() >= 0 => self.operand.min(),
            UnaryOp::Abs if self.operand.max() <= 0 => self.operand.max().saturating_abs(),
            UnaryOp::Abs => 0,
            UnaryOp::Negate => self.operand.max().saturating_neg(),
            UnaryOp::Log { .. } | UnaryOp::Exp { .. } => i64::MIN,
        }
    }

    fn max(&self) -> i64 {
        match self.op {
            UnaryOp::Abs => self
                .operand
                .min()
                .saturating_abs()
                .max(self.operand.max().saturating_abs()),
            UnaryOp::Negate => self.operand.min().saturating_neg(),
            UnaryOp::Log { .. } | UnaryOp::Exp { .. } => i64::MAX,
        }
    }

    fn lookup(&mut self, doc_ids: &[DocId], values: &mut [i64]) -> Result<()> {
        verify_arg!(values, values.len() >= doc_ids.len());
        self.operand.lookup(doc_ids, values)?;
        let op = self.op;
        for value in &mut values[..doc_ids.len()] {
            *value = op.apply(*value);
        }
        Ok(())
    }

    fn memory_used(&self) -> u64 {
        self.operand.memory_used()
    }

    fn close(&mut self) {
        self.operand.close();
    }
}
