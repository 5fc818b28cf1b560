//! Zero-copy access to string terms.

use ftgs_common::Result;
use ftgs_index::{SharedReader, ValueLookup};

use crate::{
    FtgsFields, FtgsIterator, FtgsOptions, GroupAssignment,
    stream::{FtgsState, FtgsStream},
};

/// An [`FtgsIterator`] that also exposes the current string term without copying.
///
/// [`term_string_bytes`](Self::term_string_bytes) returns the string iterator's
/// reusable backing buffer; only its first
/// [`term_string_length`](Self::term_string_length) bytes are the current term.
/// The returned slice borrows the iterator, so it cannot outlive the next call to
/// [`next_term`](FtgsStream::next_term) or [`next_field`](FtgsStream::next_field).
pub struct RawFtgsIterator<'g, G: GroupAssignment + ?Sized> {
    inner: FtgsIterator<'g, G>,
}

impl<'g, G: GroupAssignment + ?Sized> RawFtgsIterator<'g, G> {
    pub fn new(
        reader: SharedReader,
        groups: &'g G,
        fields: &FtgsFields,
        lookups: Vec<Box<dyn ValueLookup>>,
        options: &FtgsOptions,
    ) -> Result<RawFtgsIterator<'g, G>> {
        FtgsIterator::new(reader, groups, fields, lookups, options).map(RawFtgsIterator::from)
    }

    /// The backing buffer of the current string term; empty when the iterator is
    /// not positioned on a string term.
    pub fn term_string_bytes(&self) -> &[u8] {
        self.inner
            .current_string_iter()
            .map(|it| it.term_string_bytes())
            .unwrap_or_default()
    }

    /// Length of the current string term within
    /// [`term_string_bytes`](Self::term_string_bytes).
    pub fn term_string_length(&self) -> usize {
        self.inner
            .current_string_iter()
            .map_or(0, |it| it.term_string_length())
    }

    pub fn memory_used(&self) -> u64 {
        self.inner.memory_used()
    }

    pub fn into_inner(self) -> FtgsIterator<'g, G> {
        self.inner
    }
}

impl<'g, G: GroupAssignment + ?Sized> From<FtgsIterator<'g, G>> for RawFtgsIterator<'g, G> {
    fn from(inner: FtgsIterator<'g, G>) -> Self {
        RawFtgsIterator { inner }
    }
}

impl<G: GroupAssignment + ?Sized> FtgsStream for RawFtgsIterator<'_, G> {
    fn state(&self) -> FtgsState {
        self.inner.state()
    }

    fn next_field(&mut self) -> Result<bool> {
        self.inner.next_field()
    }

    fn field_name(&self) -> Option<&str> {
        self.inner.field_name()
    }

    fn field_is_int_type(&self) -> bool {
        self.inner.field_is_int_type()
    }

    fn next_term(&mut self) -> Result<bool> {
        self.inner.next_term()
    }

    fn term_int_val(&self) -> Option<i64> {
        self.inner.term_int_val()
    }

    fn term_string_val(&self) -> Option<Vec<u8>> {
        self.inner.term_string_val()
    }

    fn term_doc_freq(&self) -> u32 {
        self.inner.term_doc_freq()
    }

    fn next_group(&mut self) -> Result<bool> {
        self.inner.next_group()
    }

    fn group(&self) -> Option<u32> {
        self.inner.group()
    }

    fn num_stats(&self) -> usize {
        self.inner.num_stats()
    }

    fn group_stats(&self, stats: &mut [i64]) -> Result<()> {
        self.inner.group_stats(stats)
    }

    fn close(&mut self) {
        self.inner.close()
    }
}
