//! The FTGS iterator.

use ftgs_common::{Result, error::Error, verify_arg};
use ftgs_index::{DocId, SharedReader, StringTermDocIterator, TermDocIterator, ValueLookup};

use crate::{
    FtgsFields, FtgsOptions, GroupAssignment,
    fields::FieldRef,
    stats::TermGroupStats,
    stream::{FtgsState, FtgsStream},
};

/// Streams (field, term, group, stats) tuples over a shared reader.
///
/// For every term, all of its documents are read in batches of
/// [`FtgsOptions::batch_size`], assigned to their groups, and fed to every lookup
/// one group at a time. Each lookup contributes one statistic per group: the
/// saturating sum of its values over the group's documents holding the term.
///
/// The iterator owns a [`SharedReader`] handle clone and its lookups. Both are
/// released exactly once: when the last field is passed, on [`close`], on the
/// first fault, or on drop, whichever comes first. A fault leaves the iterator
/// [`Closed`](FtgsState::Closed) and is returned to the caller; no tuple is emitted
/// for the term being processed.
///
/// [`close`]: FtgsStream::close
pub struct FtgsIterator<'g, G: GroupAssignment + ?Sized> {
    groups: &'g G,
    num_groups: u32,
    reader: Option<SharedReader>,
    lookups: Vec<Box<dyn ValueLookup>>,
    fields: Vec<FieldRef>,
    next_field: usize,
    current_field: Option<usize>,
    term_iter: Option<TermDocIterator>,
    field_done: bool,
    term_doc_freq: u32,
    group_pos: Option<usize>,
    state: FtgsState,
    stats: TermGroupStats,
    doc_buf: Vec<DocId>,
    group_buf: Vec<u32>,
}

impl<'g, G: GroupAssignment + ?Sized> FtgsIterator<'g, G> {
    /// Creates an iterator over `fields` of the reader behind `reader`.
    ///
    /// Takes ownership of the handle clone and of the lookups; on error both are
    /// released before returning.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the options are invalid or a field is missing from the
    /// reader.
    pub fn new(
        reader: SharedReader,
        groups: &'g G,
        fields: &FtgsFields,
        lookups: Vec<Box<dyn ValueLookup>>,
        options: &FtgsOptions,
    ) -> Result<FtgsIterator<'g, G>> {
        if let Err(e) = options
            .validate()
            .and_then(|_| fields.verify(reader.reader()))
        {
            release(Some(reader), lookups);
            return Err(e);
        }

        // Group 0 is valid even for an assignment that reports no groups.
        let num_groups = groups.num_groups().max(1);
        let batch_size = options.batch_size;
        log::debug!(
            "FTGS over {} fields, {} groups, {} stats, batch size {batch_size}",
            fields.len(),
            num_groups,
            lookups.len(),
        );
        Ok(FtgsIterator {
            groups,
            num_groups,
            reader: Some(reader),
            stats: TermGroupStats::new(num_groups, lookups.len(), batch_size),
            lookups,
            fields: fields.to_refs(),
            next_field: 0,
            current_field: None,
            term_iter: None,
            field_done: false,
            term_doc_freq: 0,
            group_pos: None,
            state: FtgsState::Initial,
            doc_buf: vec![0; batch_size],
            group_buf: vec![0; batch_size],
        })
    }

    /// Bytes held by the iterator's buffers and lookups.
    pub fn memory_used(&self) -> u64 {
        let buffers = (self.doc_buf.capacity() * 4 + self.group_buf.capacity() * 4) as u64;
        let lookups: u64 = self.lookups.iter().map(|l| l.memory_used()).sum();
        buffers + lookups + self.stats.memory_used()
    }

    /// The string iterator positioned on the current term.
    pub(crate) fn current_string_iter(&self) -> Option<&dyn StringTermDocIterator> {
        if self.state != FtgsState::IteratingTerm {
            return None;
        }
        self.term_iter.as_ref()?.as_string()
    }

    fn verify_live(&self, operation: &str) -> Result<()> {
        if self.state.is_terminal() {
            Err(Error::invalid_state(operation, self.state.to_string()))
        } else {
            Ok(())
        }
    }

    fn reset_term(&mut self) {
        self.stats.clear_term();
        self.group_pos = None;
        self.term_doc_freq = 0;
    }

    fn open_field(&self, field: &FieldRef) -> Result<TermDocIterator> {
        let reader = self
            .reader
            .as_ref()
            .ok_or_else(|| Error::invalid_state("next_field", self.state.to_string()))?
            .reader();
        if field.is_int {
            reader
                .int_term_doc_iterator(&field.name)
                .map(TermDocIterator::Int)
        } else {
            reader
                .string_term_doc_iterator(&field.name)
                .map(TermDocIterator::Str)
        }
    }

    /// Moves to the next term and aggregates all of its documents.
    fn advance_term(&mut self) -> Result<bool> {
        let num_groups = self.num_groups;
        let iter = self
            .term_iter
            .as_mut()
            .ok_or_else(|| Error::invalid_state("next_term", "no open field"))?;
        if !iter.next()? {
            return Ok(false);
        }
        self.term_doc_freq = iter.doc_freq();
        loop {
            let n = iter.fill_doc_ids_buffer(&mut self.doc_buf)?;
            if n == 0 {
                break;
            }
            if n > self.doc_buf.len() {
                return Err(Error::data_access(
                    "fill_doc_ids_buffer",
                    format!("{n} doc ids reported for a buffer of {}", self.doc_buf.len()),
                ));
            }
            let doc_ids = &self.doc_buf[..n];
            let groups = &mut self.group_buf[..n];
            self.groups.fill_groups(doc_ids, groups)?;
            if let Some(&group) = groups.iter().find(|&&g| g >= num_groups) {
                return Err(Error::invalid_arg(
                    "groups",
                    format!("group {group} is not below the group count {num_groups}"),
                ));
            }
            self.stats.add_batch(doc_ids, groups, &mut self.lookups)?;
        }
        self.stats.finish_term();
        log::trace!(
            "term with {} docs in {} groups",
            self.term_doc_freq,
            self.stats.term_groups().len()
        );
        Ok(true)
    }

    /// Releases everything after a fault and hands the fault back.
    fn fail(&mut self, err: Error) -> Error {
        log::debug!("FTGS iteration failed in state {}: {err}", self.state);
        self.release();
        self.state = FtgsState::Closed;
        err
    }

    fn release(&mut self) {
        self.term_iter = None;
        release(self.reader.take(), std::mem::take(&mut self.lookups));
    }
}

/// Best-effort release of a handle clone and of lookups. Never fails.
fn release(reader: Option<SharedReader>, mut lookups: Vec<Box<dyn ValueLookup>>) {
    for lookup in &mut lookups {
        lookup.close();
    }
    if let Some(reader) = reader {
        if let Err(e) = reader.close() {
            log::warn!("failed to release FTGS reader: {e}");
        }
    }
}

impl<G: GroupAssignment + ?Sized> FtgsStream for FtgsIterator<'_, G> {
    fn state(&self) -> FtgsState {
        self.state
    }

    fn next_field(&mut self) -> Result<bool> {
        self.verify_live("next_field")?;
        self.reset_term();
        self.term_iter = None;
        self.current_field = None;

        let Some(field) = self.fields.get(self.next_field) else {
            log::debug!("FTGS exhausted after {} fields", self.fields.len());
            self.release();
            self.state = FtgsState::Exhausted;
            return Ok(false);
        };
        match self.open_field(field) {
            Ok(iter) => {
                self.term_iter = Some(iter);
                self.current_field = Some(self.next_field);
                self.next_field += 1;
                self.field_done = false;
                self.state = FtgsState::IteratingField;
                Ok(true)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn field_name(&self) -> Option<&str> {
        self.current_field.map(|i| self.fields[i].name.as_str())
    }

    fn field_is_int_type(&self) -> bool {
        self.current_field.is_some_and(|i| self.fields[i].is_int)
    }

    fn next_term(&mut self) -> Result<bool> {
        if !matches!(
            self.state,
            FtgsState::IteratingField | FtgsState::IteratingTerm
        ) {
            return Err(Error::invalid_state("next_term", self.state.to_string()));
        }
        self.reset_term();
        self.state = FtgsState::IteratingField;
        if self.field_done {
            return Ok(false);
        }
        match self.advance_term() {
            Ok(true) => {
                self.state = FtgsState::IteratingTerm;
                Ok(true)
            }
            Ok(false) => {
                self.field_done = true;
                Ok(false)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn term_int_val(&self) -> Option<i64> {
        if self.state != FtgsState::IteratingTerm {
            return None;
        }
        self.term_iter.as_ref()?.int_term()
    }

    fn term_string_val(&self) -> Option<Vec<u8>> {
        self.current_string_iter().map(|it| it.term())
    }

    fn term_doc_freq(&self) -> u32 {
        self.term_doc_freq
    }

    fn next_group(&mut self) -> Result<bool> {
        if self.state != FtgsState::IteratingTerm {
            return Err(Error::invalid_state("next_group", self.state.to_string()));
        }
        let len = self.stats.term_groups().len();
        let next = self.group_pos.map_or(0, |pos| pos + 1).min(len);
        self.group_pos = Some(next);
        Ok(next < len)
    }

    fn group(&self) -> Option<u32> {
        if self.state != FtgsState::IteratingTerm {
            return None;
        }
        self.stats.term_groups().get(self.group_pos?).copied()
    }

    fn num_stats(&self) -> usize {
        self.stats.num_stats()
    }

    fn group_stats(&self, stats: &mut [i64]) -> Result<()> {
        let group = self
            .group()
            .ok_or_else(|| Error::invalid_state("group_stats", "no current group"))?;
        let values = self.stats.group_stats(group);
        verify_arg!(stats, stats.len() >= values.len());
        stats[..values.len()].copy_from_slice(values);
        Ok(())
    }

    fn close(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        log::debug!("FTGS closed in state {}", self.state);
        self.release();
        self.state = FtgsState::Closed;
    }
}

impl<G: GroupAssignment + ?Sized> Drop for FtgsIterator<'_, G> {
    fn drop(&mut self) {
        if !self.state.is_terminal() {
            self.release();
        }
    }
}
