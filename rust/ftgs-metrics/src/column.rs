//! Leaf lookups over metrics stored in the reader.

use ftgs_common::{Result, error::Error};
use ftgs_index::{DocId, SharedReader, ValueLookup};

/// Stored per-document values of a reader metric.
///
/// Holds its own [`SharedReader`] clone, so the reader stays alive for as long as
/// the lookup does. Closing the lookup releases the reader-provided lookup first,
/// then the handle clone.
pub struct ReaderMetric {
    field: String,
    lookup: Box<dyn ValueLookup>,
    handle: Option<SharedReader>,
}

impl ReaderMetric {
    /// Opens the metric `field` of the reader behind `handle`.
    pub fn open(handle: &SharedReader, field: &str) -> Result<ReaderMetric> {
        let lookup = handle.reader().metric(field)?;
        Ok(ReaderMetric {
            field: field.to_string(),
            lookup,
            handle: Some(handle.clone()),
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_none()
    }
}

impl ValueLookup for ReaderMetric {
    fn min(&self) -> i64 {
        self.lookup.min()
    }

    fn max(&self) -> i64 {
        self.lookup.max()
    }

    fn lookup(&mut self, doc_ids: &[DocId], values: &mut [i64]) -> Result<()> {
        if self.handle.is_none() {
            return Err(Error::invalid_state(
                format!("lookup of metric '{}'", self.field),
                "closed",
            ));
        }
        self.lookup.lookup(doc_ids, values)
    }

    fn memory_used(&self) -> u64 {
        self.lookup.memory_used()
    }

    fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.lookup.close();
            if let Err(e) = handle.close() {
                log::warn!("failed to release reader of metric '{}': {e}", self.field);
            }
        }
    }
}
