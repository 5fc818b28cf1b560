//! The FTGS stream protocol and its flattened tuple form.

use std::fmt;

use ftgs_common::Result;

/// Position of an FTGS stream in its traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtgsState {
    /// Created; no field selected yet.
    Initial,
    /// A field is selected, no term yet (or the field's terms are exhausted).
    IteratingField,
    /// A term is selected and its group statistics are computed.
    IteratingTerm,
    /// Every field was visited. Resources are released.
    Exhausted,
    /// Closed by the caller or after a fault. Resources are released.
    Closed,
}

impl FtgsState {
    pub fn is_terminal(self) -> bool {
        matches!(self, FtgsState::Exhausted | FtgsState::Closed)
    }
}

impl fmt::Display for FtgsState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Pull-based traversal over (field, term, group, stats) tuples.
///
/// The caller drives three nested loops:
///
/// ```ignore
/// while stream.next_field()? {
///     while stream.next_term()? {
///         while stream.next_group()? {
///             stream.group_stats(&mut stats)?;
///         }
///     }
/// }
/// ```
///
/// Fields come integer fields first, then string fields, each in the order they
/// were requested. Terms are strictly increasing within a field, groups strictly
/// increasing within a term. Group `0` is never produced.
pub trait FtgsStream {
    fn state(&self) -> FtgsState;

    /// Moves to the next field. Returns `false`, and releases all resources, once
    /// every field was visited.
    fn next_field(&mut self) -> Result<bool>;

    fn field_name(&self) -> Option<&str>;

    fn field_is_int_type(&self) -> bool;

    /// Moves to the next term of the current field and computes its statistics for
    /// every group. Returns `false` at the end of the field.
    fn next_term(&mut self) -> Result<bool>;

    /// The current integer term.
    fn term_int_val(&self) -> Option<i64>;

    /// An owned copy of the current string term.
    fn term_string_val(&self) -> Option<Vec<u8>>;

    /// Number of documents holding the current term, across all groups.
    fn term_doc_freq(&self) -> u32;

    /// Moves to the next group with at least one document for the current term.
    fn next_group(&mut self) -> Result<bool>;

    fn group(&self) -> Option<u32>;

    /// Number of statistics per group, one per lookup.
    fn num_stats(&self) -> usize;

    /// Copies the statistics of the current group into the first
    /// [`num_stats`](Self::num_stats) slots of `stats`.
    fn group_stats(&self, stats: &mut [i64]) -> Result<()>;

    /// Releases all resources. Idempotent.
    fn close(&mut self);

    /// Flattens the remaining traversal into an iterator of tuples.
    fn tuples(&mut self) -> FtgsTuples<'_, Self>
    where
        Self: Sized,
    {
        FtgsTuples::new(self)
    }
}

/// A term value of either field kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TermValue {
    Int(i64),
    Str(Vec<u8>),
}

impl fmt::Display for TermValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TermValue::Int(v) => write!(f, "{v}"),
            TermValue::Str(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
        }
    }
}

/// One emitted (field, term, group, stats) tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtgsTuple {
    pub field: String,
    pub term: TermValue,
    pub term_doc_freq: u32,
    pub group: u32,
    pub stats: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Field,
    Term,
    Group,
    Done,
}

/// Iterator adapter over an [`FtgsStream`], see [`FtgsStream::tuples`].
///
/// Yields each error once, then ends.
pub struct FtgsTuples<'s, S: ?Sized> {
    stream: &'s mut S,
    stage: Stage,
}

impl<'s, S: FtgsStream + ?Sized> FtgsTuples<'s, S> {
    pub fn new(stream: &'s mut S) -> FtgsTuples<'s, S> {
        FtgsTuples {
            stream,
            stage: Stage::Field,
        }
    }

    fn advance(&mut self) -> Result<Option<FtgsTuple>> {
        loop {
            match self.stage {
                Stage::Done => return Ok(None),
                Stage::Field => {
                    self.stage = if self.stream.next_field()? {
                        Stage::Term
                    } else {
                        Stage::Done
                    };
                }
                Stage::Term => {
                    self.stage = if self.stream.next_term()? {
                        Stage::Group
                    } else {
                        Stage::Field
                    };
                }
                Stage::Group => {
                    if self.stream.next_group()? {
                        return self.current_tuple().map(Some);
                    }
                    self.stage = Stage::Term;
                }
            }
        }
    }

    fn current_tuple(&self) -> Result<FtgsTuple> {
        let stream = &*self.stream;
        let term = match stream.term_int_val() {
            Some(v) => TermValue::Int(v),
            None => TermValue::Str(stream.term_string_val().unwrap_or_default()),
        };
        let mut stats = vec![0; stream.num_stats()];
        stream.group_stats(&mut stats)?;
        Ok(FtgsTuple {
            field: stream.field_name().unwrap_or_default().to_string(),
            term,
            term_doc_freq: stream.term_doc_freq(),
            group: stream.group().unwrap_or_default(),
            stats,
        })
    }
}

impl<S: FtgsStream + ?Sized> Iterator for FtgsTuples<'_, S> {
    type Item = Result<FtgsTuple>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(tuple) => tuple.map(Ok),
            Err(e) => {
                self.stage = Stage::Done;
                Some(Err(e))
            }
        }
    }
}

/// Drains `stream` into a vector of tuples, in emission order.
pub fn collect_tuples<S: FtgsStream + ?Sized>(stream: &mut S) -> Result<Vec<FtgsTuple>> {
    FtgsTuples::new(stream).collect()
}
