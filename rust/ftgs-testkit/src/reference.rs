//! Brute-force FTGS evaluation.

use std::collections::BTreeMap;

use ftgs_common::Result;
use ftgs_index::{DocId, ValueLookup};

use crate::data_gen::{GeneratedIndex, Postings};

/// A term of either field kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Term {
    Int(i64),
    Str(Vec<u8>),
}

/// One expected (field, term, group, stats) tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedTuple {
    pub field: String,
    pub term: Term,
    pub group: u32,
    pub stats: Vec<i64>,
}

/// Computes the FTGS tuples of `index` straight from its postings.
///
/// Visits `int_fields`, then `string_fields`. Every lookup is called with a single
/// document at a time, and per-group sums saturate.
pub fn expected_tuples(
    index: &GeneratedIndex,
    groups: &[u32],
    int_fields: &[String],
    string_fields: &[String],
    lookups: &mut [Box<dyn ValueLookup>],
) -> Result<Vec<ExpectedTuple>> {
    let mut tuples = Vec::new();
    for name in int_fields {
        if let Some(postings) = find(&index.int_fields, name) {
            for (&term, docs) in postings {
                let stats = group_stats(docs, groups, lookups)?;
                push_term(&mut tuples, name, Term::Int(term), stats);
            }
        }
    }
    for name in string_fields {
        if let Some(postings) = find(&index.string_fields, name) {
            for (term, docs) in postings {
                let stats = group_stats(docs, groups, lookups)?;
                push_term(&mut tuples, name, Term::Str(term.clone()), stats);
            }
        }
    }
    Ok(tuples)
}

fn find<'a, T>(fields: &'a [(String, Postings<T>)], name: &str) -> Option<&'a Postings<T>> {
    fields.iter().find(|(n, _)| n == name).map(|(_, p)| p)
}

fn group_stats(
    docs: &[DocId],
    groups: &[u32],
    lookups: &mut [Box<dyn ValueLookup>],
) -> Result<BTreeMap<u32, Vec<i64>>> {
    let mut stats = BTreeMap::new();
    let mut value = [0i64];
    for &doc in docs {
        let group = groups[doc as usize];
        if group == 0 {
            continue;
        }
        let sums = stats
            .entry(group)
            .or_insert_with(|| vec![0i64; lookups.len()]);
        for (sum, lookup) in sums.iter_mut().zip(lookups.iter_mut()) {
            lookup.lookup(&[doc], &mut value)?;
            *sum = sum.saturating_add(value[0]);
        }
    }
    Ok(stats)
}

fn push_term(
    tuples: &mut Vec<ExpectedTuple>,
    field: &str,
    term: Term,
    stats: BTreeMap<u32, Vec<i64>>,
) {
    tuples.extend(stats.into_iter().map(|(group, stats)| ExpectedTuple {
        field: field.to_string(),
        term: term.clone(),
        group,
        stats,
    }));
}
