//! Document to group assignment.

use ftgs_common::{Result, error::Error, verify_arg};
use ftgs_index::DocId;

/// Per-document group assignment, owned and mutated by the calling session.
///
/// Groups are integers in `[0, num_groups)`. Group `0` means the document is
/// filtered out: it takes part in no statistic and is never emitted.
pub trait GroupAssignment {
    /// Exclusive upper bound of the group ids this assignment produces.
    fn num_groups(&self) -> u32;

    /// Writes the group of every document of `doc_ids` into `groups`, in order.
    fn fill_groups(&self, doc_ids: &[DocId], groups: &mut [u32]) -> Result<()>;
}

/// Dense group assignment: one group id per document of the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocGroups {
    groups: Vec<u32>,
    num_groups: u32,
}

impl DocGroups {
    /// Puts all `num_docs` documents in group 1, the usual starting point of a
    /// session.
    pub fn new(num_docs: u32) -> DocGroups {
        DocGroups {
            groups: vec![1; num_docs as usize],
            num_groups: 2,
        }
    }

    /// Uses `groups[doc]` as the group of `doc`.
    ///
    /// Fails if a group is `u32::MAX`, which leaves no room for the group count.
    pub fn from_vec(groups: Vec<u32>) -> Result<DocGroups> {
        let num_groups = group_count(groups.iter().copied().max().unwrap_or(0))?;
        Ok(DocGroups { groups, num_groups })
    }

    pub fn num_docs(&self) -> u32 {
        self.groups.len() as u32
    }

    pub fn get(&self, doc_id: DocId) -> Option<u32> {
        self.groups.get(doc_id as usize).copied()
    }

    /// Moves `doc_id` to `group`.
    pub fn set(&mut self, doc_id: DocId, group: u32) -> Result<()> {
        let slot = self.groups.get_mut(doc_id as usize).ok_or_else(|| {
            Error::invalid_arg("doc_id", format!("doc id {doc_id} out of range"))
        })?;
        let num_groups = group_count(group)?;
        *slot = group;
        self.num_groups = self.num_groups.max(num_groups);
        Ok(())
    }

    /// Reassigns every document through `f(doc_id, current_group)`.
    ///
    /// Nothing changes if `f` yields `u32::MAX` for any document.
    pub fn regroup(&mut self, mut f: impl FnMut(DocId, u32) -> u32) -> Result<()> {
        let groups = self
            .groups
            .iter()
            .enumerate()
            .map(|(doc_id, &group)| f(doc_id as DocId, group))
            .collect::<Vec<_>>();
        self.num_groups = group_count(groups.iter().copied().max().unwrap_or(0))?;
        self.groups = groups;
        Ok(())
    }

    /// Moves every document of `group` to group `0`.
    pub fn filter_out(&mut self, group: u32) {
        self.groups
            .iter_mut()
            .filter(|g| **g == group)
            .for_each(|g| *g = 0);
    }
}

fn group_count(max_group: u32) -> Result<u32> {
    max_group.checked_add(1).ok_or_else(|| {
        Error::invalid_arg(
            "group",
            format!("group {max_group} leaves no room for a group count"),
        )
    })
}

impl GroupAssignment for DocGroups {
    fn num_groups(&self) -> u32 {
        self.num_groups
    }

    fn fill_groups(&self, doc_ids: &[DocId], groups: &mut [u32]) -> Result<()> {
        verify_arg!(groups, groups.len() >= doc_ids.len());
        for (group, &doc_id) in groups.iter_mut().zip(doc_ids) {
            *group = self.get(doc_id).ok_or_else(|| {
                Error::invalid_arg("doc_ids", format!("doc id {doc_id} has no group"))
            })?;
        }
        Ok(())
    }
}
