//! Reference-counted sharing of an [`IndexReader`].

use std::sync::Arc;

use ftgs_common::Result;

use crate::{IndexReader, ref_count::RefCount};

/// A handle to an [`IndexReader`] shared by many iterators and lookups.
///
/// Every handle counts as one holder of the reader. Cloning a handle registers a new
/// holder; closing (or dropping) a handle unregisters it. When the last holder goes
/// away, [`IndexReader::release`] is invoked exactly once.
///
/// Closing consumes the handle, so a handle can neither be closed twice nor be used
/// to reach the reader after it was closed. Dropping an unclosed handle closes it;
/// a release failure on that path is logged rather than raised.
///
/// Handles are `Send + Sync`. The reader is only read through them, and the holder
/// count is atomic, so clones may be closed from any thread in any order.
pub struct SharedReader {
    shared: Arc<Shared>,
    closed: bool,
}

struct Shared {
    refs: RefCount,
    reader: Box<dyn IndexReader>,
}

impl SharedReader {
    /// Wraps `reader` in a new handle. The handle is the reader's only holder.
    pub fn new<R: IndexReader>(reader: R) -> SharedReader {
        SharedReader::from_boxed(Box::new(reader))
    }

    pub fn from_boxed(reader: Box<dyn IndexReader>) -> SharedReader {
        SharedReader {
            shared: Arc::new(Shared {
                refs: RefCount::new(1),
                reader,
            }),
            closed: false,
        }
    }

    /// The shared reader.
    pub fn reader(&self) -> &dyn IndexReader {
        self.shared.reader.as_ref()
    }

    /// Current number of open handles to the reader.
    ///
    /// **Note**: diagnostic only, the value may be outdated under concurrency.
    pub fn ref_count(&self) -> usize {
        self.shared.refs.read()
    }

    /// Returns `true` if both handles refer to the same reader.
    pub fn same_reader(&self, other: &SharedReader) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Closes this handle.
    ///
    /// If it was the last open handle, the reader is released and the outcome of
    /// [`IndexReader::release`] is returned.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.release_ref()
    }

    fn release_ref(&self) -> Result<()> {
        if self.shared.refs.release() {
            log::debug!("last handle closed, releasing reader");
            self.shared.reader.release()
        } else {
            Ok(())
        }
    }
}

impl Clone for SharedReader {
    fn clone(&self) -> Self {
        self.shared.refs.acquire();
        SharedReader {
            shared: Arc::clone(&self.shared),
            closed: false,
        }
    }
}

impl Drop for SharedReader {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            if let Err(e) = self.release_ref() {
                log::warn!("failed to release reader on drop: {e}");
            }
        }
    }
}

impl std::fmt::Debug for SharedReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedReader")
            .field("refs", &self.shared.refs)
            .field("num_docs", &self.shared.reader.num_docs())
            .finish_non_exhaustive()
    }
}
