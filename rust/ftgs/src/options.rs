//! Iteration tuning knobs.

use ftgs_common::{Result, verify_arg};
use serde::{Deserialize, Serialize};

/// Batch size used when neither configuration nor caller picks one.
pub const DEFAULT_BATCH_SIZE: usize = 4096;

/// Options of an FTGS iteration.
///
/// Deserializes from configuration with every field optional:
/// `{"batch_size": 1024}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FtgsOptions {
    /// Capacity of the per-batch document, group and value buffers. Bounds the
    /// number of documents handed to a single lookup call.
    pub batch_size: usize,
}

impl FtgsOptions {
    pub fn with_batch_size(mut self, batch_size: usize) -> FtgsOptions {
        self.batch_size = batch_size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        verify_arg!(batch_size, self.batch_size > 0);
        Ok(())
    }
}

impl Default for FtgsOptions {
    fn default() -> Self {
        FtgsOptions {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}
