//! Field-parallel FTGS over a shared reader.

use ftgs_common::Result;
use ftgs_index::{SharedReader, ValueLookup};
use ftgs_metrics::MetricDef;
use rayon::prelude::*;

use crate::{FtgsFields, FtgsIterator, FtgsOptions, FtgsTuple, GroupAssignment, collect_tuples};

/// Runs one [`FtgsIterator`] per field on the rayon pool and concatenates their
/// tuples in field visiting order.
///
/// Every iterator gets its own handle clone and its own lookup trees, built from
/// `metrics`, so iterators never share mutable state. The result is identical to a
/// single sequential iteration over `fields`.
pub fn collect_fields_parallel<G>(
    reader: &SharedReader,
    groups: &G,
    fields: &FtgsFields,
    metrics: &[MetricDef],
    options: &FtgsOptions,
) -> Result<Vec<FtgsTuple>>
where
    G: GroupAssignment + Sync + ?Sized,
{
    let per_field = fields
        .split()
        .into_par_iter()
        .map(|field| {
            let lookups = metrics
                .iter()
                .map(|m| m.build(reader))
                .collect::<Result<Vec<Box<dyn ValueLookup>>>>()?;
            let mut iter = FtgsIterator::new(reader.clone(), groups, &field, lookups, options)?;
            collect_tuples(&mut iter)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(per_field.into_iter().flatten().collect())
}
