use ftgs_common::{Result, verify_arg};
use ftgs_index::{DocId, ValueLookup};

/// The same value for every document.
#[derive(Debug, Clone, Copy)]
pub struct Constant {
    value: i64,
}

impl Constant {
    pub fn new(value: i64) -> Constant {
        Constant { value }
    }
}

impl ValueLookup for Constant {
    fn min(&self) -> i64 {
        self.value
    }

    fn max(&self) -> i64 {
        self.value
    }

    fn lookup(&mut self, doc_ids: &[DocId], values: &mut [i64]) -> Result<()> {
        verify_arg!(values, values.len() >= doc_ids.len());
        values[..doc_ids.len()].fill(self.value);
        Ok(())
    }

    fn memory_used(&self) -> u64 {
        0
    }

    fn close(&mut self) {}
}

/// `1` for every document; summed per group it counts documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct Count;

impl ValueLookup for Count {
    fn min(&self) -> i64 {
        1
    }

    fn max(&self) -> i64 {
        1
    }

    fn lookup(&mut self, doc_ids: &[DocId], values: &mut [i64]) -> Result<()> {
        verify_arg!(values, values.len() >= doc_ids.len());
        values[..doc_ids.len()].fill(1);
        Ok(())
    }

    fn memory_used(&self) -> u64 {
        0
    }

    fn close(&mut self) {}
}
