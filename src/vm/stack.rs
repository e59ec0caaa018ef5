//! Typed pop helpers for the value stack.
//!
//! Underflow is always a compiler bug (the stack discipline is checked
//! per opcode), so it surfaces as `VmError::Internal` rather than a
//! panic.

use super::error::VmError;
use super::value::Value;

pub(crate) trait StackOps {
    fn pop_value(&mut self) -> Result<Value, VmError>;
    fn pop_num(&mut self) -> Result<f64, VmError>;
    /// Pop n values, preserving push order.
    fn pop_n(&mut self, n: usize) -> Result<Vec<Value>, VmError>;
}

impl StackOps for Vec<Value> {
    #[inline]
    fn pop_value(&mut self) -> Result<Value, VmError> {
        self.pop()
            .ok_or_else(|| VmError::Internal("value stack underflow".to_string()))
    }

    #[inline]
    fn pop_num(&mut self) -> Result<f64, VmError> {
        Ok(self.pop_value()?.as_num())
    }

    fn pop_n(&mut self, n: usize) -> Result<Vec<Value>, VmError> {
        if self.len() < n {
            return Err(VmError::Internal("value stack underflow".to_string()));
        }
        Ok(self.split_off(self.len() - n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_n_preserves_order() {
        let mut s = vec![Value::num(1.0), Value::num(2.0), Value::num(3.0)];
        let popped = s.pop_n(2).unwrap();
        assert_eq!(popped, vec![Value::num(2.0), Value::num(3.0)]);
        assert_eq!(s, vec![Value::num(1.0)]);
    }

    #[test]
    fn test_underflow_is_internal_error() {
        let mut s: Vec<Value> = Vec::new();
        assert!(matches!(s.pop_value(), Err(VmError::Internal(_))));
    }
}
