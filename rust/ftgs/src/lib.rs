//! FTGS (Field, Term, Group, Stats) iteration.
//!
//! An FTGS iteration walks a set of fields of an [`IndexReader`], every term of
//! each field in increasing order, and every group holding documents with that
//! term, producing one statistic per lookup: the sum of the lookup's values over
//! those documents. It is the aggregation primitive behind group-by queries.
//!
//! ```
//! use ftgs::{DocGroups, FtgsFields, FtgsIterator, FtgsOptions, TermValue};
//! use ftgs_index::{MemoryIndexBuilder, SharedReader};
//! use ftgs_metrics::{Constant, ValueLookup};
//!
//! let index = MemoryIndexBuilder::new(5)
//!     .with_int_field("f", [(5, vec![1, 2, 3]), (9, vec![4])])?
//!     .build();
//! let reader = SharedReader::new(index);
//! let groups = DocGroups::from_vec(vec![0, 1, 1, 2, 1])?;
//! let lookups: Vec<Box<dyn ValueLookup>> = vec![Box::new(Constant::new(7))];
//!
//! let mut it = FtgsIterator::new(
//!     reader.clone(),
//!     &groups,
//!     &FtgsFields::new().with_int_field("f"),
//!     lookups,
//!     &FtgsOptions::default(),
//! )?;
//! let tuples = ftgs::collect_tuples(&mut it)?
//!     .into_iter()
//!     .map(|t| (t.term, t.group, t.stats))
//!     .collect::<Vec<_>>();
//! assert_eq!(
//!     tuples,
//!     [
//!         (TermValue::Int(5), 1, vec![14]),
//!         (TermValue::Int(5), 2, vec![7]),
//!         (TermValue::Int(9), 1, vec![7]),
//!     ]
//! );
//! # Ok::<(), ftgs_common::error::Error>(())
//! ```
//!
//! [`IndexReader`]: ftgs_index::IndexReader

pub mod fields;
pub mod groups;
pub mod iterator;
pub mod options;
pub mod parallel;
pub mod raw;
mod stats;
pub mod stream;

pub use fields::FtgsFields;
pub use groups::{DocGroups, GroupAssignment};
pub use iterator::FtgsIterator;
pub use options::FtgsOptions;
pub use parallel::collect_fields_parallel;
pub use raw::RawFtgsIterator;
pub use stream::{FtgsState, FtgsStream, FtgsTuple, FtgsTuples, TermValue, collect_tuples};
