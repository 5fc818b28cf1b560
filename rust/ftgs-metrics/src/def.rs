//! Serializable description of a metric tree.

use ftgs_common::{Result, error::Error};
use ftgs_index::{SharedReader, ValueLookup};
use serde::{Deserialize, Serialize};

use crate::{Binary, BinaryOp, Constant, Count, Log1pExp, ReaderMetric, Unary, UnaryOp};

/// Describes a [`ValueLookup`] tree independently of any reader.
///
/// Definitions are plain data: they can be parsed from configuration, cloned, and
/// built any number of times. Every [`build`](MetricDef::build) produces a fresh,
/// independently closable tree, which is what concurrent iterators over the same
/// reader need.
///
/// The JSON form is internally tagged by `"op"`:
///
/// ```
/// use ftgs_metrics::MetricDef;
///
/// let def = MetricDef::from_json(
///     r#"{"op": "log1p_exp", "scale": 1000, "operand": {"op": "column", "field": "score"}}"#,
/// )
/// .unwrap();
/// assert_eq!(def, MetricDef::log1p_exp(MetricDef::column("score"), 1000));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", deny_unknown_fields)]
pub enum MetricDef {
    Constant {
        value: i64,
    },
    Count,
    Column {
        field: String,
    },
    Unary {
        kind: UnaryOp,
        operand: Box<MetricDef>,
    },
    Log1pExp {
        scale: i32,
        operand: Box<MetricDef>,
    },
    Binary {
        kind: BinaryOp,
        left: Box<MetricDef>,
        right: Box<MetricDef>,
    },
}

impl MetricDef {
    pub fn constant(value: i64) -> MetricDef {
        MetricDef::Constant { value }
    }

    pub fn column(field: impl Into<String>) -> MetricDef {
        MetricDef::Column {
            field: field.into(),
        }
    }

    pub fn unary(kind: UnaryOp, operand: MetricDef) -> MetricDef {
        MetricDef::Unary {
            kind,
            operand: Box::new(operand),
        }
    }

    pub fn log1p_exp(operand: MetricDef, scale: i32) -> MetricDef {
        MetricDef::Log1pExp {
            scale,
            operand: Box::new(operand),
        }
    }

    pub fn binary(kind: BinaryOp, left: MetricDef, right: MetricDef) -> MetricDef {
        MetricDef::Binary {
            kind,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn from_json(json: &str) -> Result<MetricDef> {
        serde_json::from_str(json).map_err(|e| Error::invalid_arg("metric", e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::invalid_arg("metric", e.to_string()))
    }

    /// Builds the lookup tree against the reader behind `handle`.
    ///
    /// Every [`Column`](MetricDef::Column) leaf takes its own handle clone. On error,
    /// the parts of the tree built so far are dropped, which releases their clones.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for unknown metrics and zero scale factors.
    pub fn build(&self, handle: &SharedReader) -> Result<Box<dyn ValueLookup>> {
        Ok(match self {
            MetricDef::Constant { value } => Box::new(Constant::new(*value)),
            MetricDef::Count => Box::new(Count),
            MetricDef::Column { field } => Box::new(ReaderMetric::open(handle, field)?),
            MetricDef::Unary { kind, operand } => {
                match kind {
                    UnaryOp::Log { scale } | UnaryOp::Exp { scale } => verify_scale(*scale)?,
                    UnaryOp::Abs | UnaryOp::Negate => (),
                }
                Box::new(Unary::new(*kind, operand.build(handle)?))
            }
            MetricDef::Log1pExp { scale, operand } => {
                verify_scale(*scale)?;
                Box::new(Log1pExp::new(operand.build(handle)?, *scale))
            }
            MetricDef::Binary { kind, left, right } => {
                let left = left.build(handle)?;
                let right = right.build(handle)?;
                Box::new(Binary::new(*kind, left, right))
            }
        })
    }
}

fn verify_scale(scale: i32) -> Result<()> {
    if scale == 0 {
        Err(Error::invalid_arg("scale", "scale factor must be non-zero"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ftgs_index::MemoryIndexBuilder;

    use super::*;
    use crate::test_util::eval;

    fn handle() -> (SharedReader, ftgs_index::memory::ReleaseProbe) {
        let index = MemoryIndexBuilder::new(4)
            .with_metric("clicks", vec![0, 1000, -1000, 50_000])
            .unwrap()
            .with_metric("views", vec![10, 20, 30, 40])
            .unwrap()
            .build();
        let probe = index.release_probe();
        (SharedReader::new(index), probe)
    }

    #[test]
    fn test_json_round_trip_shape() {
        let def = MetricDef::binary(
            BinaryOp::Div,
            MetricDef::unary(UnaryOp::Log { scale: 100 }, MetricDef::column("views")),
            MetricDef::Count,
        );
        let json = def.to_json().unwrap();
        assert_eq!(
            json,
            r#"{"op":"binary","kind":"div","left":{"op":"unary","kind":{"log":{"scale":100}},"operand":{"op":"column","field":"views"}},"right":{"op":"count"}}"#
        );
        assert_eq!(MetricDef::from_json(&json).unwrap(), def);
    }

    #[test]
    fn test_bad_json() {
        assert!(MetricDef::from_json(r#"{"op":"sqrt"}"#).is_err());
        assert!(MetricDef::from_json(r#"{"op":"column"}"#).is_err());
        assert!(MetricDef::from_json(r#"{"op":"column","field":"a","scale":1}"#).is_err());
    }

    #[test]
    fn test_build_and_evaluate() {
        let (handle, probe) = handle();
        let def = MetricDef::log1p_exp(MetricDef::column("clicks"), 1000);
        let mut lookup = def.build(&handle).unwrap();
        assert_eq!(eval(lookup.as_mut(), &[0, 1, 2, 3]), vec![693, 1313, 313, 50_000]);

        let def = MetricDef::binary(
            BinaryOp::Add,
            MetricDef::column("views"),
            MetricDef::unary(UnaryOp::Abs, MetricDef::column("clicks")),
        );
        let mut sum = def.build(&handle).unwrap();
        assert_eq!(handle.ref_count(), 4);
        assert_eq!(eval(sum.as_mut(), &[2, 1]), vec![1030, 1020]);
        assert_eq!((sum.min(), sum.max()), (10, 50_040));

        lookup.close();
        sum.close();
        assert_eq!(handle.ref_count(), 1);
        handle.close().unwrap();
        assert_eq!(probe.release_count(), 1);
    }

    #[test]
    fn test_build_errors_release_partial_tree() {
        let (handle, _probe) = handle();
        let def = MetricDef::binary(
            BinaryOp::Add,
            MetricDef::column("views"),
            MetricDef::column("missing"),
        );
        assert!(def.build(&handle).is_err());
        assert_eq!(handle.ref_count(), 1);

        let def = MetricDef::log1p_exp(MetricDef::column("views"), 0);
        assert!(def.build(&handle).is_err());
        let def = MetricDef::unary(UnaryOp::Exp { scale: 0 }, MetricDef::Count);
        assert!(def.build(&handle).is_err());
        assert_eq!(handle.ref_count(), 1);
    }
}
