//! Reader-side contracts for the FTGS (Field, Term, Group, Stats) iteration core.
//!
//! This crate defines the boundary between the iteration engine and the storage
//! layer that actually holds inverted fields and per-document metric columns.
//!
//! # Overview
//!
//! - [`IndexReader`]: the field-data reader. Produces term/document iterators per
//!   field and per-document value lookups per metric.
//! - [`term_iter`]: term/document iterator capabilities and the closed
//!   [`TermDocIterator`] variant set (integer vs. string, raw byte access).
//! - [`lookup`]: the batch-oriented [`ValueLookup`] capability that metric trees are
//!   composed from.
//! - [`shared`]: [`SharedReader`], the reference-counted handle that lets many
//!   iterators share one expensive reader and releases it exactly once.
//! - [`memory`]: an in-memory [`IndexReader`] implementation.
//!
//! # Thread Safety
//!
//! Readers are shared across threads through [`SharedReader`] and must tolerate
//! concurrent read access, hence the `Send + Sync + 'static` bound. Iterators and
//! lookups created from a reader are owned by a single thread of control at a time
//! and only require `Send`.

use ftgs_common::Result;

pub mod lookup;
pub mod memory;
pub mod ref_count;
pub mod shared;
pub mod term_iter;

pub use lookup::ValueLookup;
pub use memory::{MemoryIndex, MemoryIndexBuilder};
pub use shared::SharedReader;
pub use term_iter::{IntTermDocIterator, StringTermDocIterator, TermDocCursor, TermDocIterator};

/// Document id, dense within a reader: `[0, num_docs)`.
pub type DocId = u32;

/// A field-data reader over a set of documents.
///
/// `IndexReader` is the storage collaborator of the FTGS engine. For every indexed
/// field it enumerates terms in strictly increasing order (integers numerically,
/// strings byte-lexicographically), each with the ids of the documents holding it.
/// For every metric it provides per-document integer values.
///
/// # Lifetime
///
/// Iterators and lookups returned by a reader are `'static`: implementations share
/// their data with the returned objects (typically through `Arc`) instead of
/// borrowing from the reader. Callers keep the reader itself alive, and decide when
/// it is released, through a [`SharedReader`] handle.
pub trait IndexReader: Send + Sync + 'static {
    /// Number of documents in this reader. Valid document ids are `[0, num_docs)`.
    fn num_docs(&self) -> u32;

    /// Names of the integer-keyed fields.
    fn int_fields(&self) -> Vec<String>;

    /// Names of the string-keyed fields.
    fn string_fields(&self) -> Vec<String>;

    /// Opens a term/document iterator over an integer field.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an unknown field, `DataAccess` if the underlying
    /// storage fails.
    fn int_term_doc_iterator(&self, field: &str) -> Result<Box<dyn IntTermDocIterator>>;

    /// Opens a raw-capable term/document iterator over a string field.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an unknown field, `DataAccess` if the underlying
    /// storage fails.
    fn string_term_doc_iterator(&self, field: &str) -> Result<Box<dyn StringTermDocIterator>>;

    /// Opens a lookup over the stored per-document values of a metric.
    ///
    /// The returned lookup reports the metric's actual value bounds.
    fn metric(&self, field: &str) -> Result<Box<dyn ValueLookup>>;

    /// Bytes of memory currently held by this reader.
    fn memory_used(&self) -> u64;

    /// Releases the resources held by the reader.
    ///
    /// Invoked exactly once by [`SharedReader`], when the last handle is closed.
    fn release(&self) -> Result<()>;
}
