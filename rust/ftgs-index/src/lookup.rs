//! Batch-oriented per-document value lookups.

use ftgs_common::Result;

use crate::DocId;

/// A batch function from document ids to integer values.
///
/// Lookups compose into trees: a transform node owns one or more operand lookups
/// and derives its values from theirs. Every node follows the same rules:
///
/// - values are produced for a whole batch at once, in the order of `doc_ids`;
/// - no allocation per call (scratch buffers are grown once and reused);
/// - the result for a given batch depends only on the batch and the reader's
///   immutable data, so looking up the same batch twice gives the same values;
/// - `memory_used` and `close` propagate to operands.
pub trait ValueLookup: Send {
    /// Lower bound of the produced values.
    fn min(&self) -> i64;

    /// Upper bound of the produced values.
    fn max(&self) -> i64;

    /// Fills `values[..doc_ids.len()]` with one value per document id.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `values` is shorter than `doc_ids`, `DataAccess` if an
    /// underlying read fails, `InvalidState` if the lookup was closed.
    fn lookup(&mut self, doc_ids: &[DocId], values: &mut [i64]) -> Result<()>;

    /// Bytes of memory attributable to this node and its operands.
    fn memory_used(&self) -> u64;

    /// Releases operand resources. Never fails; a second call is a no-op.
    fn close(&mut self);
}

impl<T> ValueLookup for Box<T>
where
    T: ValueLookup + ?Sized,
{
    fn min(&self) -> i64 {
        self.as_ref().min()
    }

    fn max(&self) -> i64 {
        self.as_ref().max()
    }

    fn lookup(&mut self, doc_ids: &[DocId], values: &mut [i64]) -> Result<()> {
        self.as_mut().lookup(doc_ids, values)
    }

    fn memory_used(&self) -> u64 {
        self.as_ref().memory_used()
    }

    fn close(&mut self) {
        self.as_mut().close()
    }
}
