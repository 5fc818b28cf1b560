//! Per-term, per-group statistic accumulation.

use ftgs_common::Result;
use ftgs_index::{DocId, ValueLookup};

/// Accumulates the statistics of one term across all of its document batches.
///
/// Each batch is partitioned by group with a stable counting sort restricted to the
/// groups present in the batch, so every lookup sees the documents of one group
/// at a time, in the reader's order. Per-group results are combined into dense
/// per-group accumulators by saturating addition.
///
/// All buffers are sized once, from the group count and the batch size, and reused
/// for every batch and every term.
pub(crate) struct TermGroupStats {
    num_stats: usize,
    /// `sums[group * num_stats + stat]`.
    sums: Vec<i64>,
    /// Whether the group received documents for the current term.
    touched: Vec<bool>,
    /// Groups of the current term; sorted by [`finish_term`](Self::finish_term).
    term_groups: Vec<u32>,
    /// Per-batch group counts, then write cursors. All zero between batches.
    batch_counts: Vec<u32>,
    batch_groups: Vec<u32>,
    partitioned: Vec<DocId>,
    values: Vec<i64>,
}

impl TermGroupStats {
    pub fn new(num_groups: u32, num_stats: usize, batch_size: usize) -> TermGroupStats {
        let num_groups = num_groups as usize;
        TermGroupStats {
            num_stats,
            sums: vec![0; num_groups * num_stats],
            touched: vec![false; num_groups],
            term_groups: Vec::new(),
            batch_counts: vec![0; num_groups],
            batch_groups: Vec::new(),
            partitioned: vec![0; batch_size],
            values: vec![0; batch_size],
        }
    }

    pub fn num_stats(&self) -> usize {
        self.num_stats
    }

    /// Adds one batch of the current term. `groups[i]` is the group of `doc_ids[i]`
    /// and must be below the group count; group `0` documents are skipped.
    pub fn add_batch(
        &mut self,
        doc_ids: &[DocId],
        groups: &[u32],
        lookups: &mut [Box<dyn ValueLookup>],
    ) -> Result<()> {
        debug_assert_eq!(doc_ids.len(), groups.len());
        debug_assert!(doc_ids.len() <= self.partitioned.len());

        self.batch_groups.clear();
        for &group in groups.iter().filter(|&&g| g != 0) {
            let count = &mut self.batch_counts[group as usize];
            if *count == 0 {
                self.batch_groups.push(group);
            }
            *count += 1;
        }
        self.batch_groups.sort_unstable();

        let mut offset = 0;
        for &group in &self.batch_groups {
            let count = std::mem::replace(&mut self.batch_counts[group as usize], offset);
            offset += count;
        }
        for (&doc_id, &group) in doc_ids.iter().zip(groups) {
            if group != 0 {
                let cursor = &mut self.batch_counts[group as usize];
                self.partitioned[*cursor as usize] = doc_id;
                *cursor += 1;
            }
        }

        // Cursors now hold the end offset of every group slice.
        let batch_groups = std::mem::take(&mut self.batch_groups);
        let mut start = 0;
        let mut result = Ok(());
        for &group in &batch_groups {
            let end = std::mem::take(&mut self.batch_counts[group as usize]) as usize;
            if result.is_ok() {
                if !self.touched[group as usize] {
                    self.touched[group as usize] = true;
                    self.term_groups.push(group);
                }
                result = self.add_group_slice(group, start, end, lookups);
            }
            start = end;
        }
        self.batch_groups = batch_groups;
        result
    }

    fn add_group_slice(
        &mut self,
        group: u32,
        start: usize,
        end: usize,
        lookups: &mut [Box<dyn ValueLookup>],
    ) -> Result<()> {
        let docs = &self.partitioned[start..end];
        let values = &mut self.values[..docs.len()];
        let sums = &mut self.sums[group as usize * self.num_stats..][..self.num_stats];
        for (lookup, sum) in lookups.iter_mut().zip(sums) {
            lookup.lookup(docs, values)?;
            *sum = values.iter().fold(*sum, |acc, &v| acc.saturating_add(v));
        }
        Ok(())
    }

    /// Orders the groups of the current term for emission.
    pub fn finish_term(&mut self) {
        self.term_groups.sort_unstable();
    }

    /// Groups with at least one document for the current term, ascending once the
    /// term is finished.
    pub fn term_groups(&self) -> &[u32] {
        &self.term_groups
    }

    pub fn group_stats(&self, group: u32) -> &[i64] {
        &self.sums[group as usize * self.num_stats..][..self.num_stats]
    }

    /// Resets the accumulators touched by the current term.
    pub fn clear_term(&mut self) {
        for &group in &self.term_groups {
            let group = group as usize;
            self.touched[group] = false;
            self.sums[group * self.num_stats..][..self.num_stats].fill(0);
        }
        self.term_groups.clear();
    }

    pub fn memory_used(&self) -> u64 {
        (self.sums.capacity() * 8
            + self.touched.capacity()
            + self.term_groups.capacity() * 4
            + self.batch_counts.capacity() * 4
            + self.batch_groups.capacity() * 4
            + self.partitioned.capacity() * 4
            + self.values.capacity() * 8) as u64
    }
}
