//! Scalar parameter values.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// A concrete value a parameter can take in a sweep.
///
/// Values are totally ordered so work units can be sorted by their
/// assignments: numbers compare numerically (floats by IEEE total order),
/// then booleans, then strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl ParameterValue {
    fn kind_rank(&self) -> u8 {
        match self {
            Self::Int(_) | Self::Float(_) => 0,
            Self::Bool(_) => 1,
            Self::Text(_) => 2,
        }
    }
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            // Keeps the decimal point, so `1.0` never renders like `1`.
            Self::Float(v) => write!(f, "{v:?}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
        }
    }
}

impl Ord for ParameterValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            // Ints sort before numerically equal floats.
            (Self::Int(a), Self::Float(b)) => (*a as f64).total_cmp(b).then(Ordering::Less),
            (Self::Float(a), Self::Int(b)) => a.total_cmp(&(*b as f64)).then(Ordering::Greater),
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => self.kind_rank().cmp(&other.kind_rank()),
        }
    }
}

impl PartialOrd for ParameterValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ParameterValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ParameterValue {}

impl Hash for ParameterValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Int(v) => v.hash(state),
            Self::Float(v) => v.to_bits().hash(state),
            Self::Bool(v) => v.hash(state),
            Self::Text(v) => v.hash(state),
        }
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ParameterValue {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_plain_text() {
        assert_eq!(ParameterValue::Int(56).to_string(), "56");
        assert_eq!(ParameterValue::Float(0.25).to_string(), "0.25");
        assert_eq!(ParameterValue::Bool(true).to_string(), "true");
        assert_eq!(ParameterValue::from("tm").to_string(), "tm");
    }

    #[test]
    fn integral_floats_keep_their_decimal_point() {
        assert_eq!(ParameterValue::Float(1.0).to_string(), "1.0");
        assert_eq!(ParameterValue::Float(-3.0).to_string(), "-3.0");
        assert_ne!(
            ParameterValue::Float(1.0).to_string(),
            ParameterValue::Int(1).to_string()
        );
    }

    #[test]
    fn numbers_compare_numerically_across_kinds() {
        assert!(ParameterValue::Int(2) < ParameterValue::Float(2.5));
        assert!(ParameterValue::Float(1.5) < ParameterValue::Int(2));
        assert!(ParameterValue::Int(-3) < ParameterValue::Int(1));
        assert!(ParameterValue::Int(1) < ParameterValue::Float(1.0));
        assert_ne!(ParameterValue::Int(1), ParameterValue::Float(1.0));
    }

    #[test]
    fn kinds_are_ranked() {
        assert!(ParameterValue::Float(1e9) < ParameterValue::Bool(false));
        assert!(ParameterValue::Bool(true) < ParameterValue::from("a"));
    }

    #[test]
    fn nan_has_a_place_in_the_order() {
        let nan = ParameterValue::Float(f64::NAN);
        assert_eq!(nan, nan.clone());
        assert!(ParameterValue::Float(f64::INFINITY) < nan);
    }

    #[test]
    fn untagged_deserialization_picks_narrowest_kind() {
        let values: Vec<ParameterValue> =
            serde_json::from_str(r#"[3, 0.5, false, "square"]"#).unwrap();
        assert!(matches!(values[0], ParameterValue::Int(3)));
        assert!(matches!(values[1], ParameterValue::Float(v) if v == 0.5));
        assert!(matches!(values[2], ParameterValue::Bool(false)));
        assert!(matches!(&values[3], ParameterValue::Text(s) if s == "square"));
    }
}
