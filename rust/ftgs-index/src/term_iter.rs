//! Term/document iterator capabilities.
//!
//! A term/document iterator walks the terms of a single field in strictly
//! increasing order and, for the current term, streams the ids of the matching
//! documents into caller-owned buffers.
//!
//! The set of iterator kinds is closed: integer fields and string fields, the latter
//! always exposing its term bytes without copying. [`TermDocIterator`] is the tagged
//! union the FTGS engine works with.

use ftgs_common::Result;

use crate::DocId;

/// Operations shared by all term/document iterators.
pub trait TermDocCursor: Send {
    /// Advances to the next term.
    ///
    /// Returns `false` once the field's terms are exhausted; every subsequent call
    /// keeps returning `false`.
    fn next(&mut self) -> Result<bool>;

    /// Number of documents matching the current term.
    fn doc_freq(&self) -> u32;

    /// Writes up to `buffer.len()` document ids of the current term into `buffer`.
    ///
    /// Successive calls continue where the previous call stopped. Returns the number
    /// of ids written, `0` once the current term's documents are exhausted. Ids are
    /// produced in the reader's order; across calls they partition the term's
    /// document set.
    fn fill_doc_ids_buffer(&mut self, buffer: &mut [DocId]) -> Result<usize>;
}

/// Term/document iterator over an integer-keyed field.
pub trait IntTermDocIterator: TermDocCursor {
    /// The current term.
    fn term(&self) -> i64;
}

/// Term/document iterator over a string-keyed field.
///
/// String iterators keep the current term in an internal byte buffer that is reused
/// from term to term. [`term_string_bytes`](Self::term_string_bytes) exposes that
/// backing buffer as is: only its first
/// [`term_string_length`](Self::term_string_length) bytes belong to the current term.
/// The borrow ends at the next call to [`next`](TermDocCursor::next).
pub trait StringTermDocIterator: TermDocCursor {
    /// The backing buffer holding the current term. May be longer than the term.
    fn term_string_bytes(&self) -> &[u8];

    /// Length of the current term within [`term_string_bytes`](Self::term_string_bytes).
    fn term_string_length(&self) -> usize;

    /// The current term bytes, borrowed from the backing buffer.
    fn term_bytes(&self) -> &[u8] {
        &self.term_string_bytes()[..self.term_string_length()]
    }

    /// An owned copy of the current term.
    fn term(&self) -> Vec<u8> {
        self.term_bytes().to_vec()
    }
}

/// A term/document iterator over a field of either kind.
pub enum TermDocIterator {
    /// Iterator over an integer-keyed field.
    Int(Box<dyn IntTermDocIterator>),
    /// Iterator over a string-keyed field.
    Str(Box<dyn StringTermDocIterator>),
}

impl TermDocIterator {
    pub fn is_int(&self) -> bool {
        matches!(self, TermDocIterator::Int(_))
    }

    pub fn next(&mut self) -> Result<bool> {
        match self {
            TermDocIterator::Int(it) => it.next(),
            TermDocIterator::Str(it) => it.next(),
        }
    }

    pub fn doc_freq(&self) -> u32 {
        match self {
            TermDocIterator::Int(it) => it.doc_freq(),
            TermDocIterator::Str(it) => it.doc_freq(),
        }
    }

    pub fn fill_doc_ids_buffer(&mut self, buffer: &mut [DocId]) -> Result<usize> {
        match self {
            TermDocIterator::Int(it) => it.fill_doc_ids_buffer(buffer),
            TermDocIterator::Str(it) => it.fill_doc_ids_buffer(buffer),
        }
    }

    /// The current integer term, `None` for string iterators.
    pub fn int_term(&self) -> Option<i64> {
        match self {
            TermDocIterator::Int(it) => Some(it.term()),
            TermDocIterator::Str(_) => None,
        }
    }

    /// The string iterator, `None` for integer iterators.
    pub fn as_string(&self) -> Option<&dyn StringTermDocIterator> {
        match self {
            TermDocIterator::Int(_) => None,
            TermDocIterator::Str(it) => Some(it.as_ref()),
        }
    }
}
