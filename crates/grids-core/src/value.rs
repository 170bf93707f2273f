//! Scalar types that can be stored in a grid.

use bigdecimal::BigDecimal;
use num_traits::{FromPrimitive, NumCast};
use ordered_float::OrderedFloat;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::hash::Hash;

/// A cell value type.
///
/// Implemented for `f64`, `i32` and `bool`. Each type carries a default
/// no-data sentinel and a totally ordered key used to index sparse chunk
/// buckets by value.
pub trait GridValue:
    Copy + PartialEq + PartialOrd + fmt::Debug + fmt::Display + Serialize + DeserializeOwned + 'static
{
    /// Totally ordered, hashable form of a value.
    type Key: Copy + Ord + Hash + fmt::Debug;

    /// Name recorded in grid headers.
    const TYPE_NAME: &'static str;

    /// No-data sentinel used when none is configured.
    const DEFAULT_NO_DATA: Self;

    fn to_key(self) -> Self::Key;

    fn from_key(key: Self::Key) -> Self;

    /// Whether this value may serve as a no-data sentinel.
    fn is_valid_no_data(self) -> bool {
        true
    }

    /// Whether this value can be stored as data. Non-finite floats cannot.
    fn is_finite(self) -> bool {
        true
    }

    fn to_decimal(self) -> BigDecimal;

    fn to_f64(self) -> f64;

    /// Convert an imported or cross-type value, `None` if it does not fit.
    fn from_f64(value: f64) -> Option<Self>;

    /// Arithmetic used by `add_to_cell`.
    fn plus(self, other: Self) -> Self;
}

impl GridValue for f64 {
    type Key = OrderedFloat<f64>;

    const TYPE_NAME: &'static str = "double";
    const DEFAULT_NO_DATA: Self = -f64::MAX;

    fn to_key(self) -> Self::Key {
        OrderedFloat(self)
    }

    fn from_key(key: Self::Key) -> Self {
        key.0
    }

    fn is_valid_no_data(self) -> bool {
        f64::is_finite(self)
    }

    fn is_finite(self) -> bool {
        f64::is_finite(self)
    }

    fn to_decimal(self) -> BigDecimal {
        BigDecimal::from_f64(self).unwrap_or_default()
    }

    fn to_f64(self) -> f64 {
        self
    }

    fn from_f64(value: f64) -> Option<Self> {
        Some(value)
    }

    fn plus(self, other: Self) -> Self {
        self + other
    }
}

impl GridValue for i32 {
    type Key = i32;

    const TYPE_NAME: &'static str = "int";
    const DEFAULT_NO_DATA: Self = i32::MIN;

    fn to_key(self) -> Self::Key {
        self
    }

    fn from_key(key: Self::Key) -> Self {
        key
    }

    fn to_decimal(self) -> BigDecimal {
        BigDecimal::from(self as i64)
    }

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        NumCast::from(value.round())
    }

    /// Saturates one above `i32::MIN`, which is the no-data value.
    fn plus(self, other: Self) -> Self {
        self.saturating_add(other).max(i32::MIN + 1)
    }
}

/// Boolean grids use `false` as no-data, so statistics count `true` cells.
impl GridValue for bool {
    type Key = bool;

    const TYPE_NAME: &'static str = "boolean";
    const DEFAULT_NO_DATA: Self = false;

    fn to_key(self) -> Self::Key {
        self
    }

    fn from_key(key: Self::Key) -> Self {
        key
    }

    fn to_decimal(self) -> BigDecimal {
        BigDecimal::from(self as i64)
    }

    fn to_f64(self) -> f64 {
        if self {
            1.0
        } else {
            0.0
        }
    }

    fn from_f64(value: f64) -> Option<Self> {
        if value.is_nan() {
            return None;
        }
        Some(value != 0.0)
    }

    fn plus(self, other: Self) -> Self {
        self || other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_no_data_validity() {
        assert!(!f64::NAN.is_valid_no_data());
        assert!(!f64::INFINITY.is_valid_no_data());
        assert!(<f64 as GridValue>::DEFAULT_NO_DATA.is_valid_no_data());
        assert!(<f64 as GridValue>::is_finite(1.5));
        assert!(!<f64 as GridValue>::is_finite(f64::NEG_INFINITY));
    }

    #[test]
    fn test_int_from_f64() {
        assert_eq!(<i32 as GridValue>::from_f64(3.0), Some(3));
        assert_eq!(<i32 as GridValue>::from_f64(-2.6), Some(-3));
        assert_eq!(<i32 as GridValue>::from_f64(1e12), None);
        assert_eq!(<i32 as GridValue>::from_f64(f64::NAN), None);
    }

    #[test]
    fn test_int_sum_never_lands_on_no_data() {
        assert_eq!((i32::MIN + 5).plus(-10), i32::MIN + 1);
        assert_eq!((i32::MIN + 1).plus(-1), i32::MIN + 1);
        assert_eq!(i32::MAX.plus(1), i32::MAX);
        assert_eq!(3i32.plus(-5), -2);
    }

    #[test]
    fn test_decimal_conversion() {
        assert_eq!(3.0f64.to_decimal(), BigDecimal::from(3));
        assert_eq!(7i32.to_decimal(), BigDecimal::from(7));
        assert_eq!(true.to_decimal(), BigDecimal::from(1));
    }

    #[test]
    fn test_key_round_trip_orders_floats() {
        let mut keys = vec![2.5f64.to_key(), (-1.0f64).to_key(), 0.0f64.to_key()];
        keys.sort();
        let values: Vec<f64> = keys.into_iter().map(f64::from_key).collect();
        assert_eq!(values, vec![-1.0, 0.0, 2.5]);
    }
}
