use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use ftgs::{
    DocGroups, FtgsFields, FtgsIterator, FtgsOptions, FtgsState, FtgsStream, FtgsTuple,
    GroupAssignment, RawFtgsIterator, TermValue, collect_fields_parallel, collect_tuples,
};
use ftgs_common::{Result, error::Error};
use ftgs_index::{DocId, MemoryIndexBuilder, SharedReader, ValueLookup};
use ftgs_metrics::{BinaryOp, Constant, MetricDef, UnaryOp};
use ftgs_testkit::{
    data_gen::{GeneratedIndex, IndexShape, random_groups},
    faults::{FaultPlan, FaultyReader},
    reference::{ExpectedTuple, Term, expected_tuples},
};
use rayon::prelude::*;

type Calls = Arc<Mutex<Vec<Vec<DocId>>>>;

/// Constant lookup that records the document batches it sees.
struct Recording {
    value: i64,
    calls: Calls,
}

impl ValueLookup for Recording {
    fn min(&self) -> i64 {
        self.value
    }

    fn max(&self) -> i64 {
        self.value
    }

    fn lookup(&mut self, doc_ids: &[DocId], values: &mut [i64]) -> Result<()> {
        self.calls.lock().unwrap().push(doc_ids.to_vec());
        values[..doc_ids.len()].fill(self.value);
        Ok(())
    }

    fn memory_used(&self) -> u64 {
        0
    }

    fn close(&mut self) {}
}

fn to_expected(tuple: FtgsTuple) -> ExpectedTuple {
    ExpectedTuple {
        field: tuple.field,
        term: match tuple.term {
            TermValue::Int(v) => Term::Int(v),
            TermValue::Str(bytes) => Term::Str(bytes),
        },
        group: tuple.group,
        stats: tuple.stats,
    }
}

fn metric_defs() -> Vec<MetricDef> {
    vec![
        MetricDef::Count,
        MetricDef::column("metric0"),
        MetricDef::binary(
            BinaryOp::Mul,
            MetricDef::column("metric1"),
            MetricDef::constant(3),
        ),
        MetricDef::unary(UnaryOp::Abs, MetricDef::column("metric0")),
        MetricDef::log1p_exp(MetricDef::column("metric1"), 100_000),
    ]
}

fn build_all(defs: &[MetricDef], reader: &SharedReader) -> Vec<Box<dyn ValueLookup>> {
    defs.iter().map(|d| d.build(reader).unwrap()).collect()
}

#[test]
fn test_term_groups_and_lookup_batches() {
    let index = MemoryIndexBuilder::new(5)
        .with_int_field("f", [(5, vec![1, 2, 3]), (9, vec![4])])
        .unwrap()
        .build();
    let probe = index.release_probe();
    let reader = SharedReader::new(index);
    let groups = DocGroups::from_vec(vec![0, 1, 1, 2, 1]).unwrap();
    let calls = Calls::default();
    let lookup = Recording {
        value: 7,
        calls: calls.clone(),
    };

    let mut it = FtgsIterator::new(
        reader.clone(),
        &groups,
        &FtgsFields::new().with_int_field("f"),
        vec![Box::new(lookup) as Box<dyn ValueLookup>],
        &FtgsOptions::default(),
    )
    .unwrap();
    let tuples = collect_tuples(&mut it)
        .unwrap()
        .into_iter()
        .map(|t| (t.field, t.term, t.group, t.stats))
        .collect::<Vec<_>>();
    assert_eq!(
        tuples,
        [
            ("f".to_string(), TermValue::Int(5), 1, vec![14]),
            ("f".to_string(), TermValue::Int(5), 2, vec![7]),
            ("f".to_string(), TermValue::Int(9), 1, vec![7]),
        ]
    );
    assert_eq!(*calls.lock().unwrap(), vec![vec![1, 2], vec![3], vec![4]]);
    assert_eq!(it.state(), FtgsState::Exhausted);

    drop(it);
    assert_eq!(probe.release_count(), 0);
    reader.close().unwrap();
    assert_eq!(probe.release_count(), 1);
}

#[test]
fn test_matches_reference_evaluation() {
    let defs = metric_defs();
    for seed in 0..8u64 {
        let shape = IndexShape {
            num_docs: 150 + seed as u32 * 40,
            ..IndexShape::default()
        };
        let generated = GeneratedIndex::generate(seed, &shape);
        let reader = SharedReader::new(generated.build().unwrap());
        let group_ids = random_groups(seed, shape.num_docs, 1 + seed as u32 * 3);
        let groups = DocGroups::from_vec(group_ids.clone()).unwrap();
        let fields = FtgsFields::all(reader.reader());

        let mut reference_lookups = build_all(&defs, &reader);
        let expected = expected_tuples(
            &generated,
            &group_ids,
            &fields.int_fields,
            &fields.string_fields,
            &mut reference_lookups,
        )
        .unwrap();
        reference_lookups.iter_mut().for_each(|l| l.close());

        for batch_size in [1, 3, 64, 4096] {
            let mut it = FtgsIterator::new(
                reader.clone(),
                &groups,
                &fields,
                build_all(&defs, &reader),
                &FtgsOptions::default().with_batch_size(batch_size),
            )
            .unwrap();
            let actual = collect_tuples(&mut it)
                .unwrap()
                .into_iter()
                .map(to_expected)
                .collect::<Vec<_>>();
            assert_eq!(actual, expected, "seed {seed}, batch size {batch_size}");
        }
        assert_eq!(reader.ref_count(), 1, "seed {seed}");
    }
}

#[test]
fn test_emission_order() {
    let generated = GeneratedIndex::generate(99, &IndexShape::default());
    let reader = SharedReader::new(generated.build().unwrap());
    let groups = DocGroups::from_vec(random_groups(99, 200, 9)).unwrap();
    let fields = FtgsFields::new()
        .with_string_field("str1")
        .with_int_field("int1")
        .with_string_field("str0")
        .with_int_field("int0");
    let mut it = FtgsIterator::new(
        reader.clone(),
        &groups,
        &fields,
        vec![],
        &FtgsOptions::default(),
    )
    .unwrap();
    let tuples = collect_tuples(&mut it).unwrap();
    assert!(tuples.iter().all(|t| t.group != 0));

    let field_order = tuples.iter().fold(Vec::<&str>::new(), |mut acc, t| {
        if acc.last() != Some(&t.field.as_str()) {
            acc.push(&t.field);
        }
        acc
    });
    assert_eq!(field_order, ["int1", "int0", "str1", "str0"]);
    for pair in tuples.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if a.field == b.field {
            assert!(a.term <= b.term);
            if a.term == b.term {
                assert!(a.group < b.group);
            }
        }
    }
}

#[test]
fn test_raw_iterator_matches_copying_iterator() {
    let generated = GeneratedIndex::generate(3, &IndexShape::default());
    let reader = SharedReader::new(generated.build().unwrap());
    let groups = DocGroups::new(200);
    let fields = FtgsFields::new().with_string_field("str0");
    let mut it = RawFtgsIterator::new(
        reader.clone(),
        &groups,
        &fields,
        vec![],
        &FtgsOptions::default(),
    )
    .unwrap();
    let expected = generated.string_fields[0].1.keys().cloned().collect::<Vec<_>>();
    let mut terms = Vec::new();
    assert!(it.next_field().unwrap());
    while it.next_term().unwrap() {
        let len = it.term_string_length();
        let raw = it.term_string_bytes()[..len].to_vec();
        assert_eq!(Some(raw.clone()), it.term_string_val());
        terms.push(raw);
    }
    assert_eq!(terms, expected);
    assert!(!it.next_field().unwrap());
}

#[test]
fn test_parallel_equals_sequential() {
    let generated = GeneratedIndex::generate(
        21,
        &IndexShape {
            int_fields: 4,
            string_fields: 4,
            ..IndexShape::default()
        },
    );
    let index = generated.build().unwrap();
    let probe = index.release_probe();
    let reader = SharedReader::new(index);
    let groups = DocGroups::from_vec(random_groups(21, 200, 17)).unwrap();
    let fields = FtgsFields::all(reader.reader());
    let defs = metric_defs();
    let options = FtgsOptions::default().with_batch_size(16);

    let mut it = FtgsIterator::new(
        reader.clone(),
        &groups,
        &fields,
        build_all(&defs, &reader),
        &options,
    )
    .unwrap();
    let sequential = collect_tuples(&mut it).unwrap();
    let parallel = collect_fields_parallel(&reader, &groups, &fields, &defs, &options).unwrap();
    assert_eq!(parallel, sequential);

    assert_eq!(reader.ref_count(), 1);
    reader.close().unwrap();
    assert_eq!(probe.release_count(), 1);
}

#[test]
fn test_parallel_build_error() {
    let index = GeneratedIndex::generate(1, &IndexShape::default());
    let reader = SharedReader::new(index.build().unwrap());
    let groups = DocGroups::new(200);
    let fields = FtgsFields::all(reader.reader());
    let defs = [MetricDef::column("no_such_metric")];
    let options = FtgsOptions::default();
    let result = collect_fields_parallel(&reader, &groups, &fields, &defs, &options);
    assert!(result.is_err());
    assert_eq!(reader.ref_count(), 1);
}

#[test]
fn test_concurrent_iterators_release_once() {
    let generated = GeneratedIndex::generate(8, &IndexShape::default());
    let index = generated.build().unwrap();
    let probe = index.release_probe();
    let reader = SharedReader::new(index);
    let groups = DocGroups::from_vec(random_groups(8, 200, 5)).unwrap();
    let fields = FtgsFields::all(reader.reader());
    let defs = metric_defs();

    let counts = (0..16)
        .into_par_iter()
        .map(|i| {
            let mut it = FtgsIterator::new(
                reader.clone(),
                &groups,
                &fields,
                build_all(&defs, &reader),
                &FtgsOptions::default().with_batch_size(1 + i * 7),
            )
            .unwrap();
            if i % 3 == 0 {
                // Abandon halfway.
                it.next_field().unwrap();
                it.next_term().unwrap();
                it.close();
                None
            } else {
                Some(collect_tuples(&mut it).unwrap().len())
            }
        })
        .collect::<Vec<_>>();
    let complete = counts.iter().flatten().collect::<Vec<_>>();
    assert!(complete.windows(2).all(|w| w[0] == w[1]));

    assert_eq!(probe.release_count(), 0);
    reader.close().unwrap();
    assert_eq!(probe.release_count(), 1);
}

fn faulty_reader(
    plan: FaultPlan,
) -> (SharedReader, ftgs_index::memory::ReleaseProbe, Arc<AtomicUsize>) {
    let index = MemoryIndexBuilder::new(4)
        .with_int_field("a", [(1, vec![0, 1]), (2, vec![2]), (3, vec![3])])
        .unwrap()
        .with_string_field("b", [("x", vec![0, 3])])
        .unwrap()
        .with_metric("m", vec![1, 2, 3, 4])
        .unwrap()
        .build();
    let probe = index.release_probe();
    let reader = FaultyReader::new(index, plan);
    let faults = reader.fault_counter();
    (SharedReader::new(reader), probe, faults)
}

#[test]
fn test_fault_while_reading_term_closes() {
    let (reader, probe, faults) = faulty_reader(FaultPlan {
        fail_docs_at_term: Some(1),
        ..FaultPlan::default()
    });
    let groups = DocGroups::new(4);
    let lookups = vec![MetricDef::column("m").build(&reader).unwrap()];
    let mut it = FtgsIterator::new(
        reader.clone(),
        &groups,
        &FtgsFields::all(reader.reader()),
        lookups,
        &FtgsOptions::default(),
    )
    .unwrap();
    assert_eq!(reader.ref_count(), 3);

    let mut tuples = it.tuples();
    let first = tuples.next().unwrap().unwrap();
    assert_eq!((first.term, first.group, first.stats), (TermValue::Int(1), 1, vec![3]));
    let err = tuples.next().unwrap().unwrap_err();
    assert!(err.is_data_access());
    assert!(tuples.next().is_none());

    assert_eq!(it.state(), FtgsState::Closed);
    assert_eq!(faults.load(Ordering::Relaxed), 1);
    assert_eq!(reader.ref_count(), 1);
    assert!(it.next_term().unwrap_err().is_invalid_state());
    it.close();

    reader.close().unwrap();
    assert_eq!(probe.release_count(), 1);
}

#[test]
fn test_overfilled_doc_buffer_closes() {
    let (reader, probe, faults) = faulty_reader(FaultPlan {
        overfill_docs_at_term: Some(1),
        ..FaultPlan::default()
    });
    let groups = DocGroups::new(4);
    let mut it = FtgsIterator::new(
        reader.clone(),
        &groups,
        &FtgsFields::new().with_int_field("a"),
        vec![Box::new(Constant::new(1)) as Box<dyn ValueLookup>],
        &FtgsOptions::default().with_batch_size(2),
    )
    .unwrap();
    assert!(it.next_field().unwrap());
    assert!(it.next_term().unwrap());
    assert!(it.next_term().unwrap_err().is_data_access());
    assert_eq!(it.state(), FtgsState::Closed);
    assert_eq!(faults.load(Ordering::Relaxed), 1);
    assert_eq!(reader.ref_count(), 1);
    reader.close().unwrap();
    assert_eq!(probe.release_count(), 1);
}

/// Fails the `fail_at`-th call to `fill_groups`, counted from `0`.
struct FailingGroups {
    inner: DocGroups,
    calls: AtomicUsize,
    fail_at: usize,
}

impl GroupAssignment for FailingGroups {
    fn num_groups(&self) -> u32 {
        self.inner.num_groups()
    }

    fn fill_groups(&self, doc_ids: &[DocId], groups: &mut [u32]) -> Result<()> {
        if self.calls.fetch_add(1, Ordering::Relaxed) == self.fail_at {
            return Err(Error::data_access("fill_groups", "group storage unavailable"));
        }
        self.inner.fill_groups(doc_ids, groups)
    }
}

#[test]
fn test_group_assignment_fault_closes() {
    let (reader, probe, _faults) = faulty_reader(FaultPlan::default());
    let groups = FailingGroups {
        inner: DocGroups::new(4),
        calls: AtomicUsize::new(0),
        fail_at: 1,
    };
    let calls = Calls::default();
    let lookup = Recording {
        value: 1,
        calls: calls.clone(),
    };
    let mut it = FtgsIterator::new(
        reader.clone(),
        &groups,
        &FtgsFields::new().with_int_field("a"),
        vec![Box::new(lookup) as Box<dyn ValueLookup>],
        &FtgsOptions::default().with_batch_size(1),
    )
    .unwrap();

    // Term 1 holds docs 0 and 1: the second batch fails.
    let mut tuples = it.tuples();
    let err = tuples.next().unwrap().unwrap_err();
    assert!(err.is_data_access());
    assert!(tuples.next().is_none());

    assert_eq!(it.state(), FtgsState::Closed);
    assert_eq!(it.group(), None);
    assert_eq!(groups.calls.load(Ordering::Relaxed), 2);
    assert_eq!(*calls.lock().unwrap(), [vec![0]]);
    assert_eq!(reader.ref_count(), 1);
    reader.close().unwrap();
    assert_eq!(probe.release_count(), 1);
}

#[test]
fn test_fault_opening_field_closes() {
    let (reader, probe, _faults) = faulty_reader(FaultPlan {
        fail_open: Some("b".to_string()),
        ..FaultPlan::default()
    });
    let groups = DocGroups::new(4);
    let mut it = FtgsIterator::new(
        reader.clone(),
        &groups,
        &FtgsFields::all(reader.reader()),
        vec![Box::new(Constant::new(1)) as Box<dyn ValueLookup>],
        &FtgsOptions::default(),
    )
    .unwrap();
    assert!(it.next_field().unwrap());
    while it.next_term().unwrap() {}
    assert!(it.next_field().unwrap_err().is_data_access());
    assert_eq!(it.state(), FtgsState::Closed);
    drop(it);
    reader.close().unwrap();
    assert_eq!(probe.release_count(), 1);
}

#[test]
fn test_fault_in_lookup_closes() {
    let (reader, _probe, _faults) = faulty_reader(FaultPlan {
        fail_lookup_after: Some(2),
        ..FaultPlan::default()
    });
    let groups = DocGroups::from_vec(vec![1, 2, 1, 2]).unwrap();
    let lookups = vec![MetricDef::column("m").build(&reader).unwrap()];
    let mut it = FtgsIterator::new(
        reader.clone(),
        &groups,
        &FtgsFields::new().with_int_field("a"),
        lookups,
        &FtgsOptions::default(),
    )
    .unwrap();
    // Term 1 holds docs of groups 1 and 2: two lookup calls.
    assert!(it.next_field().unwrap());
    assert!(it.next_term().unwrap());
    assert!(it.next_term().unwrap_err().is_data_access());
    assert_eq!(it.state(), FtgsState::Closed);
    assert_eq!(reader.ref_count(), 1);
}

#[test]
fn test_release_fault_is_not_raised_by_iterator() {
    let (reader, probe, faults) = faulty_reader(FaultPlan {
        fail_release: true,
        ..FaultPlan::default()
    });
    let groups = DocGroups::new(4);
    let mut it = FtgsIterator::new(
        reader.clone(),
        &groups,
        &FtgsFields::all(reader.reader()),
        vec![],
        &FtgsOptions::default(),
    )
    .unwrap();
    // The session gives up its handle first: the iterator holds the last one.
    reader.close().unwrap();
    assert_eq!(collect_tuples(&mut it).unwrap().len(), 4);
    assert_eq!(it.state(), FtgsState::Exhausted);
    assert_eq!(probe.release_count(), 1);
    assert_eq!(faults.load(Ordering::Relaxed), 1);
}
