//! Capability sets: which value kinds a processor accepts or produces.
//!
//! Chains are validated link by link when they are built: the set a link can produce must
//! intersect the set the next link accepts, otherwise construction fails with
//! [`crate::error::ChainError::Incompatible`].

use std::fmt;
use std::ops::{BitAnd, BitOr};

use crate::types::{DataType, Value};

/// A set of [`DataType`] capability tags.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    /// The empty set.
    pub const NONE: CapabilitySet = CapabilitySet(0);
    /// Whole integers.
    pub const INTEGRAL: CapabilitySet = CapabilitySet::of(DataType::Int64);
    /// Floating point numbers.
    pub const DECIMAL: CapabilitySet = CapabilitySet::of(DataType::Float64);
    /// Any number.
    pub const NUMERIC: CapabilitySet = CapabilitySet(Self::INTEGRAL.0 | Self::DECIMAL.0);
    /// Strings.
    pub const TEXT: CapabilitySet = CapabilitySet::of(DataType::Utf8);
    /// Booleans.
    pub const BOOL: CapabilitySet = CapabilitySet::of(DataType::Bool);
    /// Dates.
    pub const DATE: CapabilitySet = CapabilitySet::of(DataType::Date);
    /// Every data type.
    pub const ANY: CapabilitySet = CapabilitySet(
        Self::NUMERIC.0 | Self::TEXT.0 | Self::BOOL.0 | Self::DATE.0,
    );

    /// Singleton set.
    pub const fn of(data_type: DataType) -> Self {
        CapabilitySet(1 << data_type as u8)
    }

    pub const fn union(self, other: CapabilitySet) -> Self {
        CapabilitySet(self.0 | other.0)
    }

    pub const fn intersection(self, other: CapabilitySet) -> Self {
        CapabilitySet(self.0 & other.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, data_type: DataType) -> bool {
        self.0 & CapabilitySet::of(data_type).0 != 0
    }

    /// Whether this set shares at least one tag with `other`.
    pub const fn intersects(self, other: CapabilitySet) -> bool {
        !self.intersection(other).is_empty()
    }

    /// Whether a runtime value satisfies this set. `Null` satisfies none.
    pub fn admits(self, value: &Value) -> bool {
        value.data_type().is_some_and(|t| self.contains(t))
    }

    /// Iterate the member tags in declaration order.
    pub fn iter(self) -> impl Iterator<Item = DataType> {
        DataType::ALL.into_iter().filter(move |t| self.contains(*t))
    }
}

impl From<DataType> for CapabilitySet {
    fn from(data_type: DataType) -> Self {
        CapabilitySet::of(data_type)
    }
}

impl BitOr for CapabilitySet {
    type Output = CapabilitySet;

    fn bitor(self, rhs: CapabilitySet) -> CapabilitySet {
        self.union(rhs)
    }
}

impl BitAnd for CapabilitySet {
    type Output = CapabilitySet;

    fn bitand(self, rhs: CapabilitySet) -> CapabilitySet {
        self.intersection(rhs)
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == CapabilitySet::ANY {
            return f.write_str("any");
        }
        f.write_str("{")?;
        for (i, t) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(t.name())?;
        }
        f.write_str("}")
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CapabilitySet({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::CapabilitySet;
    use crate::types::{DataType, Value};

    #[test]
    fn numeric_is_integral_plus_decimal() {
        assert_eq!(
            CapabilitySet::NUMERIC,
            CapabilitySet::INTEGRAL | CapabilitySet::DECIMAL
        );
        assert!(CapabilitySet::NUMERIC.contains(DataType::Int64));
        assert!(CapabilitySet::NUMERIC.contains(DataType::Float64));
        assert!(!CapabilitySet::NUMERIC.contains(DataType::Utf8));
    }

    #[test]
    fn intersection_drives_compatibility() {
        assert!(CapabilitySet::ANY.intersects(CapabilitySet::DATE));
        assert!(!CapabilitySet::DATE.intersects(CapabilitySet::NUMERIC));
        assert!((CapabilitySet::TEXT & CapabilitySet::NUMERIC).is_empty());
        assert!(CapabilitySet::NONE.is_empty());
    }

    #[test]
    fn admits_checks_runtime_values() {
        assert!(CapabilitySet::TEXT.admits(&Value::from("x")));
        assert!(!CapabilitySet::TEXT.admits(&Value::Int64(1)));
        assert!(!CapabilitySet::ANY.admits(&Value::Null));
    }

    #[test]
    fn display_lists_members() {
        assert_eq!(CapabilitySet::NUMERIC.to_string(), "{int64, float64}");
        assert_eq!(CapabilitySet::ANY.to_string(), "any");
        assert_eq!(CapabilitySet::NONE.to_string(), "{}");
    }
}
