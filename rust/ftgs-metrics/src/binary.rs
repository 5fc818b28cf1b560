//! Two-operand transforms.

use ftgs_common::{Result, verify_arg};
use ftgs_index::{DocId, ValueLookup};
use serde::{Deserialize, Serialize};

/// Operation applied by a [`Binary`] node to `(left, right)` value pairs.
///
/// Arithmetic saturates at the `i64` bounds. Division and remainder by zero
/// produce `0`. Comparisons produce `1` when the relation holds and `0` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Min,
    Max,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl BinaryOp {
    #[inline]
    fn apply(self, a: i64, b: i64) -> i64 {
        match self {
            BinaryOp::Add => a.saturating_add(b),
            BinaryOp::Sub => a.saturating_sub(b),
            BinaryOp::Mul => a.saturating_mul(b),
            // `checked_*` is `None` for a zero divisor and for `i64::MIN / -1`.
            BinaryOp::Div if b == 0 => 0,
            BinaryOp::Div => a.checked_div(b).unwrap_or(i64::MAX),
            BinaryOp::Mod => a.checked_rem(b).unwrap_or(0),
            BinaryOp::Min => a.min(b),
            BinaryOp::Max => a.max(b),
            BinaryOp::Equal => (a == b) as i64,
            BinaryOp::NotEqual => (a != b) as i64,
            BinaryOp::LessThan => (a < b) as i64,
            BinaryOp::LessThanOrEqual => (a <= b) as i64,
            BinaryOp::GreaterThan => (a > b) as i64,
            BinaryOp::GreaterThanOrEqual => (a >= b) as i64,
        }
    }

    fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::LessThan
                | BinaryOp::LessThanOrEqual
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterThanOrEqual
        )
    }
}

/// Combines the values of two operands with a [`BinaryOp`].
///
/// The left operand writes straight into the output buffer; the right operand uses
/// a scratch buffer owned by the node. The scratch buffer grows to the largest batch
/// seen and is then reused.
pub struct Binary {
    op: BinaryOp,
    left: Box<dyn ValueLookup>,
    right: Box<dyn ValueLookup>,
    scratch: Vec<i64>,
}

impl Binary {
    pub fn new(op: BinaryOp, left: Box<dyn ValueLookup>, right: Box<dyn ValueLookup>) -> Binary {
        Binary {
            op,
            left,
            right,
            scratch: Vec::new(),
        }
    }

    pub fn op(&self) -> BinaryOp {
        self.op
    }
}

impl ValueLookup for Binary {
    fn min(&self) -> i64 {
        let (l, r) = (&self.left, &self.right);
        match self.op {
            BinaryOp::Add => l.min().saturating_add(r.min()),
            BinaryOp::Sub => l.min().saturating_sub(r.max()),
            BinaryOp::Min => l.min().min(r.min()),
            BinaryOp::Max => l.min().max(r.min()),
            op if op.is_comparison() => 0,
            _ => i64::MIN,
        }
    }

    fn max(&self) -> i64 {
        let (l, r) = (&self.left, &self.right);
        match self.op {
            BinaryOp::Add => l.max().saturating_add(r.max()),
            BinaryOp::Sub => l.max().saturating_sub(r.min()),
            BinaryOp::Min => l.max().min(r.max()),
            BinaryOp::Max => l.max().max(r.max()),
            op if op.is_comparison() => 1,
            _ => i64::MAX,
        }
    }

    fn lookup(&mut self, doc_ids: &[DocId], values: &mut [i64]) -> Result<()> {
        verify_arg!(values, values.len() >= doc_ids.len());
        let n = doc_ids.len();
        if self.scratch.len() < n {
            self.scratch.resize(n, 0);
        }
        self.left.lookup(doc_ids, values)?;
        self.right.lookup(doc_ids, &mut self.scratch[..n])?;
        let op = self.op;
        for (a, &b) in values[..n].iter_mut().zip(&self.scratch[..n]) {
            *a = op.apply(*a, b);
        }
        Ok(())
    }

    fn memory_used(&self) -> u64 {
        (self.scratch.capacity() * std::mem::size_of::<i64>()) as u64
            + self.left.memory_used()
            + self.right.memory_used()
    }

    fn close(&mut self) {
        self.left.close();
        self.right.close();
        self.scratch = Vec::new();
    }
}
