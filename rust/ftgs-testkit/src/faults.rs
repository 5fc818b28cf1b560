//! Fault injection.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use ftgs_common::{Result, error::Error};
use ftgs_index::{
    DocId, IndexReader, IntTermDocIterator, StringTermDocIterator, TermDocCursor, ValueLookup,
};

/// Where a [`FaultyReader`] fails. Every fault surfaces as a `DataAccess` error,
/// except `overfill_docs_at_term`, which breaks the cursor contract instead.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    /// Opening a term iterator over this field fails.
    pub fail_open: Option<String>,
    /// Reading the documents of the term with this index, counted from `0` within
    /// each field, fails.
    pub fail_docs_at_term: Option<usize>,
    /// Reading the documents of the term with this index reports one more doc id
    /// than the buffer holds.
    pub overfill_docs_at_term: Option<usize>,
    /// Metric lookups fail once this many calls succeeded, counted per lookup.
    pub fail_lookup_after: Option<usize>,
    /// Releasing the reader fails, after the wrapped reader was released.
    pub fail_release: bool,
}

/// Wraps a reader and injects the faults of a [`FaultPlan`].
pub struct FaultyReader {
    inner: Box<dyn IndexReader>,
    plan: FaultPlan,
    faults: Arc<AtomicUsize>,
}

impl FaultyReader {
    pub fn new<R: IndexReader>(inner: R, plan: FaultPlan) -> FaultyReader {
        FaultyReader {
            inner: Box::new(inner),
            plan,
            faults: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counter of the faults injected so far; stays valid after the reader is
    /// moved into a handle.
    pub fn fault_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.faults)
    }

    fn verify_open(&self, field: &str) -> Result<()> {
        if self.plan.fail_open.as_deref() == Some(field) {
            self.faults.fetch_add(1, Ordering::Relaxed);
            return Err(injected(format!("open field '{field}'")));
        }
        Ok(())
    }

    fn cursor<C: ?Sized>(&self, inner: Box<C>) -> FaultyCursor<C> {
        FaultyCursor {
            inner,
            term: None,
            fail_at: self.plan.fail_docs_at_term,
            overfill_at: self.plan.overfill_docs_at_term,
            faults: Arc::clone(&self.faults),
        }
    }
}

fn injected(context: String) -> Error {
    Error::data_access(context, "injected fault")
}

impl IndexReader for FaultyReader {
    fn num_docs(&self) -> u32 {
        self.inner.num_docs()
    }

    fn int_fields(&self) -> Vec<String> {
        self.inner.int_fields()
    }

    fn string_fields(&self) -> Vec<String> {
        self.inner.string_fields()
    }

    fn int_term_doc_iterator(&self, field: &str) -> Result<Box<dyn IntTermDocIterator>> {
        self.verify_open(field)?;
        let inner = self.inner.int_term_doc_iterator(field)?;
        Ok(Box::new(self.cursor(inner)))
    }

    fn string_term_doc_iterator(&self, field: &str) -> Result<Box<dyn StringTermDocIterator>> {
        self.verify_open(field)?;
        let inner = self.inner.string_term_doc_iterator(field)?;
        Ok(Box::new(self.cursor(inner)))
    }

    fn metric(&self, field: &str) -> Result<Box<dyn ValueLookup>> {
        let inner = self.inner.metric(field)?;
        Ok(Box::new(FaultyLookup {
            inner,
            calls: 0,
            fail_after: self.plan.fail_lookup_after,
            faults: Arc::clone(&self.faults),
        }))
    }

    fn memory_used(&self) -> u64 {
        self.inner.memory_used()
    }

    fn release(&self) -> Result<()> {
        self.inner.release()?;
        if self.plan.fail_release {
            self.faults.fetch_add(1, Ordering::Relaxed);
            return Err(injected("release reader".to_string()));
        }
        Ok(())
    }
}

struct FaultyCursor<C: ?Sized> {
    inner: Box<C>,
    term: Option<usize>,
    fail_at: Option<usize>,
    overfill_at: Option<usize>,
    faults: Arc<AtomicUsize>,
}

impl<C: TermDocCursor + ?Sized> TermDocCursor for FaultyCursor<C> {
    fn next(&mut self) -> Result<bool> {
        let more = self.inner.next()?;
        if more {
            self.term = Some(self.term.map_or(0, |t| t + 1));
        }
        Ok(more)
    }

    fn doc_freq(&self) -> u32 {
        self.inner.doc_freq()
    }

    fn fill_doc_ids_buffer(&mut self, buffer: &mut [DocId]) -> Result<usize> {
        if self.term.is_some() && self.term == self.fail_at {
            self.faults.fetch_add(1, Ordering::Relaxed);
            return Err(injected(format!("documents of term #{}", self.term.unwrap_or(0))));
        }
        let n = self.inner.fill_doc_ids_buffer(buffer)?;
        if n > 0 && self.term.is_some() && self.term == self.overfill_at {
            self.faults.fetch_add(1, Ordering::Relaxed);
            return Ok(buffer.len() + 1);
        }
        Ok(n)
    }
}

impl IntTermDocIterator for FaultyCursor<dyn IntTermDocIterator> {
    fn term(&self) -> i64 {
        self.inner.term()
    }
}

impl StringTermDocIterator for FaultyCursor<dyn StringTermDocIterator> {
    fn term_string_bytes(&self) -> &[u8] {
        self.inner.term_string_bytes()
    }

    fn term_string_length(&self) -> usize {
        self.inner.term_string_length()
    }
}

struct FaultyLookup {
    inner: Box<dyn ValueLookup>,
    calls: usize,
    fail_after: Option<usize>,
    faults: Arc<AtomicUsize>,
}

impl ValueLookup for FaultyLookup {
    fn min(&self) -> i64 {
        self.inner.min()
    }

    fn max(&self) -> i64 {
        self.inner.max()
    }

    fn lookup(&mut self, doc_ids: &[DocId], values: &mut [i64]) -> Result<()> {
        if self.fail_after.is_some_and(|n| self.calls >= n) {
            self.faults.fetch_add(1, Ordering::Relaxed);
            return Err(injected("metric lookup".to_string()));
        }
        self.calls += 1;
        self.inner.lookup(doc_ids, values)
    }

    fn memory_used(&self) -> u64 {
        self.inner.memory_used()
    }

    fn close(&mut self) {
        self.inner.close()
    }
}

#[cfg(test)]
mod tests {
    use ftgs_index::MemoryIndexBuilder;

    use super::*;

    fn index() -> ftgs_index::MemoryIndex {
        MemoryIndexBuilder::new(3)
            .with_int_field("n", [(1, vec![0]), (2, vec![1, 2])])
            .unwrap()
            .with_string_field("s", [("a", vec![0])])
            .unwrap()
            .with_metric("m", vec![1, 2, 3])
            .unwrap()
            .build()
    }

    #[test]
    fn test_fail_open_and_release() {
        let inner = index();
        let probe = inner.release_probe();
        let reader = FaultyReader::new(
            inner,
            FaultPlan {
                fail_open: Some("s".to_string()),
                fail_release: true,
                ..FaultPlan::default()
            },
        );
        assert!(reader.int_term_doc_iterator("n").is_ok());
        let err = reader.string_term_doc_iterator("s").err().unwrap();
        assert!(err.is_data_access());
        assert!(reader.release().unwrap_err().is_data_access());
        assert_eq!(probe.release_count(), 1);
        assert_eq!(reader.fault_counter().load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_fail_docs_at_term() {
        let reader = FaultyReader::new(
            index(),
            FaultPlan {
                fail_docs_at_term: Some(1),
                ..FaultPlan::default()
            },
        );
        let mut it = reader.int_term_doc_iterator("n").unwrap();
        let mut buf = [0; 4];
        assert!(it.next().unwrap());
        assert_eq!(it.fill_doc_ids_buffer(&mut buf).unwrap(), 1);
        assert!(it.next().unwrap());
        assert_eq!(it.term(), 2);
        assert!(it.fill_doc_ids_buffer(&mut buf).is_err());
    }

    #[test]
    fn test_overfill_docs_at_term() {
        let reader = FaultyReader::new(
            index(),
            FaultPlan {
                overfill_docs_at_term: Some(0),
                ..FaultPlan::default()
            },
        );
        let mut it = reader.int_term_doc_iterator("n").unwrap();
        let mut buf = [0; 4];
        assert!(it.next().unwrap());
        assert_eq!(it.fill_doc_ids_buffer(&mut buf).unwrap(), 5);
        assert!(it.next().unwrap());
        assert_eq!(it.fill_doc_ids_buffer(&mut buf).unwrap(), 2);
        assert_eq!(reader.fault_counter().load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_fail_lookup_after() {
        let reader = FaultyReader::new(
            index(),
            FaultPlan {
                fail_lookup_after: Some(1),
                ..FaultPlan::default()
            },
        );
        let mut lookup = reader.metric("m").unwrap();
        let mut values = [0; 2];
        lookup.lookup(&[2, 0], &mut values).unwrap();
        assert_eq!(values, [3, 1]);
        assert!(lookup.lookup(&[1], &mut values).is_err());
    }
}
