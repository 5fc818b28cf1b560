//! Seeded random test data.
//!
//! Everything here is driven by an explicit seed, so a failing case can be
//! replayed from the seed printed by the test.

use std::collections::BTreeMap;

use ftgs_common::Result;
use ftgs_index::{DocId, MemoryIndex, MemoryIndexBuilder};

/// Size parameters of a generated index.
#[derive(Debug, Clone)]
pub struct IndexShape {
    pub num_docs: u32,
    pub int_fields: usize,
    pub string_fields: usize,
    /// Upper bound of distinct terms per field.
    pub max_terms: usize,
    pub metrics: usize,
    /// Probability for a document to hold a given term.
    pub density: f64,
}

impl Default for IndexShape {
    fn default() -> Self {
        IndexShape {
            num_docs: 200,
            int_fields: 2,
            string_fields: 2,
            max_terms: 40,
            metrics: 2,
            density: 0.1,
        }
    }
}

/// Postings of a field: term to strictly increasing doc ids, in term order.
pub type Postings<T> = BTreeMap<T, Vec<DocId>>;

/// The plain data of a generated index, kept alongside the built reader so tests
/// can compute expected results independently.
#[derive(Debug, Clone)]
pub struct GeneratedIndex {
    pub num_docs: u32,
    pub int_fields: Vec<(String, Postings<i64>)>,
    pub string_fields: Vec<(String, Postings<Vec<u8>>)>,
    pub metrics: Vec<(String, Vec<i64>)>,
}

impl GeneratedIndex {
    pub fn generate(seed: u64, shape: &IndexShape) -> GeneratedIndex {
        let mut rng = fastrand::Rng::with_seed(seed);
        let int_fields = (0..shape.int_fields)
            .map(|i| {
                let postings = random_postings(&mut rng, shape, |rng| rng.i64(-1000..1000));
                (format!("int{i}"), postings)
            })
            .collect();
        let string_fields = (0..shape.string_fields)
            .map(|i| {
                let postings = random_postings(&mut rng, shape, random_term);
                (format!("str{i}"), postings)
            })
            .collect();
        let metrics = (0..shape.metrics)
            .map(|i| {
                let values = (0..shape.num_docs)
                    .map(|_| rng.i64(-1_000_000..1_000_000))
                    .collect();
                (format!("metric{i}"), values)
            })
            .collect();
        GeneratedIndex {
            num_docs: shape.num_docs,
            int_fields,
            string_fields,
            metrics,
        }
    }

    pub fn build(&self) -> Result<MemoryIndex> {
        let mut builder = MemoryIndexBuilder::new(self.num_docs);
        for (name, postings) in &self.int_fields {
            builder = builder.with_int_field(name.clone(), postings.clone())?;
        }
        for (name, postings) in &self.string_fields {
            builder = builder.with_string_field(name.clone(), postings.clone())?;
        }
        for (name, values) in &self.metrics {
            builder = builder.with_metric(name.clone(), values.clone())?;
        }
        Ok(builder.build())
    }

    pub fn int_field_names(&self) -> Vec<String> {
        self.int_fields.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn string_field_names(&self) -> Vec<String> {
        self.string_fields.iter().map(|(name, _)| name.clone()).collect()
    }
}

fn random_postings<T: Ord>(
    rng: &mut fastrand::Rng,
    shape: &IndexShape,
    mut term: impl FnMut(&mut fastrand::Rng) -> T,
) -> Postings<T> {
    let mut postings = Postings::new();
    for _ in 0..rng.usize(1..=shape.max_terms.max(1)) {
        let docs = (0..shape.num_docs)
            .filter(|_| rng.f64() < shape.density)
            .collect::<Vec<_>>();
        if !docs.is_empty() {
            postings.insert(term(rng), docs);
        }
    }
    postings
}

/// Short terms over a small alphabet, so that terms often share prefixes and
/// shorter terms follow longer ones.
fn random_term(rng: &mut fastrand::Rng) -> Vec<u8> {
    let len = rng.usize(0..10);
    (0..len).map(|_| rng.u8(b'a'..=b'e')).collect()
}

/// A random group per document in `[0, num_groups)`; group `0` included.
pub fn random_groups(seed: u64, num_docs: u32, num_groups: u32) -> Vec<u32> {
    let mut rng = fastrand::Rng::with_seed(seed);
    (0..num_docs).map(|_| rng.u32(0..num_groups.max(1))).collect()
}
