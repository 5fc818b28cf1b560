//! In-memory implementation of [`IndexReader`].
//!
//! Fields are stored as compressed-sparse-row postings: a sorted term array, and
//! for every term a slice into one shared array of document ids. String terms are
//! concatenated into a single byte arena. All field data lives behind `Arc`, so the
//! iterators and lookups handed out by the reader are `'static` and cheap to open.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use ahash::AHashMap;
use ftgs_common::{Result, error::Error, verify_arg};

use crate::{
    DocId, IndexReader,
    lookup::ValueLookup,
    term_iter::{IntTermDocIterator, StringTermDocIterator, TermDocCursor},
};

/// Builder for [`MemoryIndex`].
pub struct MemoryIndexBuilder {
    num_docs: u32,
    int_fields: Vec<(String, Arc<IntFieldData>)>,
    string_fields: Vec<(String, Arc<StringFieldData>)>,
    metrics: AHashMap<String, Arc<MetricColumn>>,
}

impl MemoryIndexBuilder {
    /// Starts an index over documents `[0, num_docs)`.
    pub fn new(num_docs: u32) -> MemoryIndexBuilder {
        MemoryIndexBuilder {
            num_docs,
            int_fields: Vec::new(),
            string_fields: Vec::new(),
            metrics: AHashMap::new(),
        }
    }

    /// Adds an integer field given as `(term, doc ids)` postings.
    ///
    /// Postings may come in any term order; each term's doc ids must be strictly
    /// increasing and below `num_docs`, and terms must be unique.
    pub fn with_int_field<I>(mut self, name: impl Into<String>, postings: I) -> Result<Self>
    where
        I: IntoIterator<Item = (i64, Vec<DocId>)>,
    {
        let name = name.into();
        self.verify_new_field(&name)?;
        let mut postings = postings.into_iter().collect::<Vec<_>>();
        postings.sort_unstable_by_key(|(term, _)| *term);
        verify_arg!(postings, postings.windows(2).all(|w| w[0].0 != w[1].0));

        let mut terms = Vec::with_capacity(postings.len());
        let mut docs = DocPostings::default();
        for (term, doc_ids) in postings {
            docs.push(&doc_ids, self.num_docs)?;
            terms.push(term);
        }
        self.int_fields.push((name, Arc::new(IntFieldData { terms, docs })));
        Ok(self)
    }

    /// Adds a string field given as `(term bytes, doc ids)` postings.
    ///
    /// Terms are ordered byte-lexicographically; the doc id rules of
    /// [`with_int_field`](Self::with_int_field) apply.
    pub fn with_string_field<I, T>(mut self, name: impl Into<String>, postings: I) -> Result<Self>
    where
        I: IntoIterator<Item = (T, Vec<DocId>)>,
        T: Into<Vec<u8>>,
    {
        let name = name.into();
        self.verify_new_field(&name)?;
        let mut postings = postings
            .into_iter()
            .map(|(term, docs)| (term.into(), docs))
            .collect::<Vec<_>>();
        postings.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        verify_arg!(postings, postings.windows(2).all(|w| w[0].0 != w[1].0));

        let mut term_bytes = Vec::new();
        let mut term_offsets = Vec::with_capacity(postings.len() + 1);
        term_offsets.push(0);
        let mut docs = DocPostings::default();
        for (term, doc_ids) in postings {
            docs.push(&doc_ids, self.num_docs)?;
            term_bytes.extend_from_slice(&term);
            term_offsets.push(term_bytes.len());
        }
        self.string_fields.push((
            name,
            Arc::new(StringFieldData {
                term_bytes,
                term_offsets,
                docs,
            }),
        ));
        Ok(self)
    }

    /// Adds a metric column with one value per document.
    pub fn with_metric(mut self, name: impl Into<String>, values: Vec<i64>) -> Result<Self> {
        let name = name.into();
        verify_arg!(values, values.len() == self.num_docs as usize);
        if self.metrics.contains_key(&name) {
            return Err(Error::invalid_arg(
                "metric",
                format!("metric '{name}' already exists"),
            ));
        }
        let min = values.iter().copied().min().unwrap_or(0);
        let max = values.iter().copied().max().unwrap_or(0);
        self.metrics.insert(name, Arc::new(MetricColumn { values, min, max }));
        Ok(self)
    }

    pub fn build(self) -> MemoryIndex {
        MemoryIndex {
            num_docs: self.num_docs,
            int_fields: self.int_fields,
            string_fields: self.string_fields,
            metrics: self.metrics,
            release_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn verify_new_field(&self, name: &str) -> Result<()> {
        let exists = self.int_fields.iter().any(|(n, _)| n == name)
            || self.string_fields.iter().any(|(n, _)| n == name);
        if exists {
            Err(Error::invalid_arg(
                "field",
                format!("field '{name}' already exists"),
            ))
        } else {
            Ok(())
        }
    }
}

/// An [`IndexReader`] holding all of its data in memory.
pub struct MemoryIndex {
    num_docs: u32,
    int_fields: Vec<(String, Arc<IntFieldData>)>,
    string_fields: Vec<(String, Arc<StringFieldData>)>,
    metrics: AHashMap<String, Arc<MetricColumn>>,
    release_count: Arc<AtomicUsize>,
}

impl MemoryIndex {
    /// Returns a probe that observes releases of this index, usable after the index
    /// was moved into a [`SharedReader`](crate::SharedReader).
    pub fn release_probe(&self) -> ReleaseProbe {
        ReleaseProbe(Arc::clone(&self.release_count))
    }

    fn int_field(&self, field: &str) -> Result<&Arc<IntFieldData>> {
        self.int_fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, data)| data)
            .ok_or_else(|| Error::invalid_arg("field", format!("no int field '{field}'")))
    }

    fn string_field(&self, field: &str) -> Result<&Arc<StringFieldData>> {
        self.string_fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, data)| data)
            .ok_or_else(|| Error::invalid_arg("field", format!("no string field '{field}'")))
    }
}

impl IndexReader for MemoryIndex {
    fn num_docs(&self) -> u32 {
        self.num_docs
    }

    fn int_fields(&self) -> Vec<String> {
        self.int_fields.iter().map(|(name, _)| name.clone()).collect()
    }

    fn string_fields(&self) -> Vec<String> {
        self.string_fields
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn int_term_doc_iterator(&self, field: &str) -> Result<Box<dyn IntTermDocIterator>> {
        let data = Arc::clone(self.int_field(field)?);
        Ok(Box::new(MemoryIntTermDocIterator {
            data,
            cursor: PostingsCursor::default(),
        }))
    }

    fn string_term_doc_iterator(&self, field: &str) -> Result<Box<dyn StringTermDocIterator>> {
        let data = Arc::clone(self.string_field(field)?);
        Ok(Box::new(MemoryStringTermDocIterator {
            data,
            cursor: PostingsCursor::default(),
            term_buf: Vec::new(),
            term_len: 0,
        }))
    }

    fn metric(&self, field: &str) -> Result<Box<dyn ValueLookup>> {
        let column = self
            .metrics
            .get(field)
            .ok_or_else(|| Error::invalid_arg("metric", format!("no metric '{field}'")))?;
        Ok(Box::new(MemoryMetricLookup {
            column: Some(Arc::clone(column)),
            min: column.min,
            max: column.max,
        }))
    }

    fn memory_used(&self) -> u64 {
        let ints = self
            .int_fields
            .iter()
            .map(|(_, f)| f.terms.len() * 8 + f.docs.memory_used())
            .sum::<usize>();
        let strings = self
            .string_fields
            .iter()
            .map(|(_, f)| f.term_bytes.len() + f.term_offsets.len() * 8 + f.docs.memory_used())
            .sum::<usize>();
        let metrics = self
            .metrics
            .values()
            .map(|m| m.values.len() * 8)
            .sum::<usize>();
        (ints + strings + metrics) as u64
    }

    fn release(&self) -> Result<()> {
        let prev = self.release_count.fetch_add(1, Ordering::AcqRel);
        if prev != 0 {
            return Err(Error::invalid_state("release", "released"));
        }
        Ok(())
    }
}

/// Observes how many times a [`MemoryIndex`] was released.
#[derive(Clone, Debug)]
pub struct ReleaseProbe(Arc<AtomicUsize>);

impl ReleaseProbe {
    pub fn release_count(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }
}

/// Doc id postings of all terms of a field, concatenated.
#[derive(Default)]
struct DocPostings {
    /// `offsets[i]..offsets[i + 1]` is the range of term `i` within `doc_ids`.
    offsets: Vec<usize>,
    doc_ids: Vec<DocId>,
}

impl DocPostings {
    fn push(&mut self, doc_ids: &[DocId], num_docs: u32) -> Result<()> {
        verify_arg!(doc_ids, doc_ids.windows(2).all(|w| w[0] < w[1]));
        verify_arg!(doc_ids, doc_ids.last().is_none_or(|&d| d < num_docs));
        if self.offsets.is_empty() {
            self.offsets.push(0);
        }
        self.doc_ids.extend_from_slice(doc_ids);
        self.offsets.push(self.doc_ids.len());
        Ok(())
    }

    fn term_count(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    fn memory_used(&self) -> usize {
        self.offsets.len() * 8 + self.doc_ids.len() * 4
    }
}

struct IntFieldData {
    terms: Vec<i64>,
    docs: DocPostings,
}

struct StringFieldData {
    term_bytes: Vec<u8>,
    term_offsets: Vec<usize>,
    docs: DocPostings,
}

impl StringFieldData {
    fn term(&self, index: usize) -> &[u8] {
        &self.term_bytes[self.term_offsets[index]..self.term_offsets[index + 1]]
    }
}

/// Position of a term/document iterator within a field's postings.
#[derive(Default)]
struct PostingsCursor {
    /// Index of the current term, `None` before the first `next()`.
    term: Option<usize>,
    /// Next doc id to hand out, and the end of the current term's doc ids.
    doc_pos: usize,
    doc_end: usize,
    exhausted: bool,
}

impl PostingsCursor {
    fn advance(&mut self, docs: &DocPostings) -> bool {
        if self.exhausted {
            return false;
        }
        let next = self.term.map_or(0, |t| t + 1);
        if next >= docs.term_count() {
            self.exhausted = true;
            self.doc_pos = 0;
            self.doc_end = 0;
            return false;
        }
        self.term = Some(next);
        self.doc_pos = docs.offsets[next];
        self.doc_end = docs.offsets[next + 1];
        true
    }

    fn current(&self) -> Option<usize> {
        if self.exhausted { None } else { self.term }
    }

    fn doc_freq(&self, docs: &DocPostings) -> u32 {
        self.current()
            .map_or(0, |t| (docs.offsets[t + 1] - docs.offsets[t]) as u32)
    }

    fn fill(&mut self, docs: &DocPostings, buffer: &mut [DocId]) -> usize {
        let n = buffer.len().min(self.doc_end - self.doc_pos);
        buffer[..n].copy_from_slice(&docs.doc_ids[self.doc_pos..self.doc_pos + n]);
        self.doc_pos += n;
        n
    }
}

struct MemoryIntTermDocIterator {
    data: Arc<IntFieldData>,
    cursor: PostingsCursor,
}

impl TermDocCursor for MemoryIntTermDocIterator {
    fn next(&mut self) -> Result<bool> {
        Ok(self.cursor.advance(&self.data.docs))
    }

    fn doc_freq(&self) -> u32 {
        self.cursor.doc_freq(&self.data.docs)
    }

    fn fill_doc_ids_buffer(&mut self, buffer: &mut [DocId]) -> Result<usize> {
        Ok(self.cursor.fill(&self.data.docs, buffer))
    }
}

impl IntTermDocIterator for MemoryIntTermDocIterator {
    fn term(&self) -> i64 {
        self.cursor.current().map_or(0, |t| self.data.terms[t])
    }
}

struct MemoryStringTermDocIterator {
    data: Arc<StringFieldData>,
    cursor: PostingsCursor,
    /// Reused across terms; only grows.
    term_buf: Vec<u8>,
    term_len: usize,
}

impl TermDocCursor for MemoryStringTermDocIterator {
    fn next(&mut self) -> Result<bool> {
        if !self.cursor.advance(&self.data.docs) {
            self.term_len = 0;
            return Ok(false);
        }
        let index = self.cursor.term.unwrap_or_default();
        let term = self.data.term(index);
        if self.term_buf.len() < term.len() {
            self.term_buf.resize(term.len(), 0);
        }
        self.term_buf[..term.len()].copy_from_slice(term);
        self.term_len = term.len();
        Ok(true)
    }

    fn doc_freq(&self) -> u32 {
        self.cursor.doc_freq(&self.data.docs)
    }

    fn fill_doc_ids_buffer(&mut self, buffer: &mut [DocId]) -> Result<usize> {
        Ok(self.cursor.fill(&self.data.docs, buffer))
    }
}

impl StringTermDocIterator for MemoryStringTermDocIterator {
    fn term_string_bytes(&self) -> &[u8] {
        &self.term_buf
    }

    fn term_string_length(&self) -> usize {
        self.term_len
    }
}

struct MetricColumn {
    values: Vec<i64>,
    min: i64,
    max: i64,
}

struct MemoryMetricLookup {
    column: Option<Arc<MetricColumn>>,
    min: i64,
    max: i64,
}

impl ValueLookup for MemoryMetricLookup {
    fn min(&self) -> i64 {
        self.min
    }

    fn max(&self) -> i64 {
        self.max
    }

    fn lookup(&mut self, doc_ids: &[DocId], values: &mut [i64]) -> Result<()> {
        verify_arg!(values, values.len() >= doc_ids.len());
        let column = self
            .column
            .as_ref()
            .ok_or_else(|| Error::invalid_state("lookup", "closed"))?;
        for (value, &doc_id) in values.iter_mut().zip(doc_ids) {
            *value = *column.values.get(doc_id as usize).ok_or_else(|| {
                Error::invalid_arg("doc_ids", format!("doc id {doc_id} out of range"))
            })?;
        }
        Ok(())
    }

    fn memory_used(&self) -> u64 {
        self.column
            .as_ref()
            .map_or(0, |c| (c.values.len() * 8) as u64)
    }

    fn close(&mut self) {
        self.column = None;
    }
}
