//! `log(1 + e^x)` transform.

use ftgs_common::{Result, verify_arg};
use ftgs_index::{DocId, ValueLookup};

use crate::scaled_to_int;

/// Computes `log(1 + e^x)` over a scaled operand (the "softplus" function).
///
/// For an operand value `v` and scale factor `s`, `x = v / s` is evaluated in `f64`
/// and the output is `trunc(log(1 + e^x) * s)`, saturated into the `i32` range.
///
/// Bounds are reported as the full `i64` range.
pub struct Log1pExp {
    operand: Box<dyn ValueLookup>,
    scale_factor: i32,
}

impl Log1pExp {
    pub fn new(operand: Box<dyn ValueLookup>, scale_factor: i32) -> Log1pExp {
        Log1pExp {
            operand,
            scale_factor,
        }
    }
}

/// `log(1 + e^x)` without overflowing `e^x` for large positive `x`.
///
/// For `x > 0` this uses `log(1 + e^x) = x + log(1 + e^-x)`.
#[inline]
pub fn log1p_exp(x: f64) -> f64 {
    if x > 0.0 {
        x + (-x).exp().ln_1p()
    } else {
        x.exp().ln_1p()
    }
}

impl ValueLookup for Log1pExp {
    fn min(&self) -> i64 {
        i64::MIN
    }

    fn max(&self) -> i64 {
        i64::MAX
    }

    fn lookup(&mut self, doc_ids: &[DocId], values: &mut [i64]) -> Result<()> {
        verify_arg!(values, values.len() >= doc_ids.len());
        self.operand.lookup(doc_ids, values)?;
        let scale = self.scale_factor as f64;
        for value in &mut values[..doc_ids.len()] {
            let x = *value as f64 / scale;
            *value = scaled_to_int(log1p_exp(x) * scale);
        }
        Ok(())
    }

    fn memory_used(&self) -> u64 {
        self.operand.memory_used()
    }

    fn close(&mut self) {
        self.operand.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Constant, test_util::eval};

    fn log1p_exp_of(v: i64, scale: i32) -> i64 {
        let mut node = Log1pExp::new(Box::new(Constant::new(v)), scale);
        eval(&mut node, &[0])[0]
    }

    #[test]
    fn test_zero_is_ln2() {
        assert_eq!(log1p_exp_of(0, 1000), 693);
        assert_eq!(log1p_exp_of(0, 1), 0);
    }

    #[test]
    fn test_large_positive_does_not_overflow() {
        assert_eq!(log1p_exp_of(50_000, 1000), 50_000);
        // exp(1000) alone would be infinite.
        assert_eq!(log1p_exp_of(1_000_000, 1000), 1_000_000);
    }

    #[test]
    fn test_large_negative_goes_to_zero() {
        assert_eq!(log1p_exp_of(-50_000, 1000), 0);
        assert_eq!(log1p_exp_of(i64::MIN, 1), 0);
    }

    #[test]
    fn test_output_saturates_to_i32() {
        assert_eq!(log1p_exp_of(10_000_000_000, 1), i32::MAX as i64);
        assert_eq!(log1p_exp_of(i64::MAX, 1000), i32::MAX as i64);
    }

    #[test]
    fn test_truncates_toward_zero() {
        // log(1 + e^1) = 1.3132616875...
        assert_eq!(log1p_exp_of(1000, 1000), 1313);
        // log(1 + e^-1) = 0.3132616875...
        assert_eq!(log1p_exp_of(-1000, 1000), 313);
    }

    #[test]
    fn test_bounds_memory_and_close_delegate() {
        let mut node = Log1pExp::new(crate::test_util::DocIdTimes::boxed(1), 100);
        assert_eq!(node.min(), i64::MIN);
        assert_eq!(node.max(), i64::MAX);
        assert_eq!(node.memory_used(), 16);
        let first = eval(&mut node, &[0, 100, 250]);
        assert_eq!(first, vec![69, 131, 257]);
        assert_eq!(eval(&mut node, &[0, 100, 250]), first);
        node.close();
    }
}
