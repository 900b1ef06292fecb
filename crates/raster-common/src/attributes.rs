//! Scene attribute values.
//!
//! Catalog records carry loosely-typed metadata (platform names, cloud cover
//! percentages, acquisition times, arbitrary extension properties). The
//! attribute model keeps those values typed while giving every field a total
//! order, so collections can sort and group on any attribute.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Named attributes of one scene record.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// A single attribute value.
///
/// `Absent` is the sentinel for a schema key the record has no value for.
/// It orders before every present value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    #[default]
    Absent,
    Bool(bool),
    Integer(i64),
    Number(f64),
    Time(DateTime<Utc>),
    Text(String),
}

impl AttributeValue {
    /// Convert a JSON property value as found in catalog responses.
    ///
    /// Arrays and objects are kept as their compact JSON text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Absent,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => n.as_f64().map(Self::Number).unwrap_or(Self::Absent),
            },
            serde_json::Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Numeric view of integer and floating values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Time view; text values are parsed as ISO 8601.
    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Time(t) => Some(*t),
            Self::Text(s) => crate::time::parse_datetime(s).ok(),
            _ => None,
        }
    }

    /// Rank of the variant family in the total order.
    fn family(&self) -> u8 {
        match self {
            Self::Absent => 0,
            Self::Bool(_) => 1,
            Self::Integer(_) | Self::Number(_) => 2,
            Self::Time(_) => 3,
            Self::Text(_) => 4,
        }
    }
}

impl Ord for AttributeValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            (Self::Time(a), Self::Time(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                _ => self.family().cmp(&other.family()),
            },
        }
    }
}

impl PartialOrd for AttributeValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for AttributeValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for AttributeValue {}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "<absent>"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Number(n) => write!(f, "{}", n),
            Self::Time(t) => write!(f, "{}", t.to_rfc3339()),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<DateTime<Utc>> for AttributeValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Time(value)
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Absent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::parse_datetime;

    #[test]
    fn test_absent_orders_first() {
        let mut values = vec![
            AttributeValue::Number(3.5),
            AttributeValue::Absent,
            AttributeValue::Integer(1),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                AttributeValue::Absent,
                AttributeValue::Integer(1),
                AttributeValue::Number(3.5),
            ]
        );
    }

    #[test]
    fn test_integer_and_number_compare_numerically() {
        assert_eq!(AttributeValue::Integer(2), AttributeValue::Number(2.0));
        assert!(AttributeValue::Integer(2) < AttributeValue::Number(2.5));
    }

    #[test]
    fn test_from_json() {
        let props = serde_json::json!({
            "platform": "sentinel-2a",
            "eo:cloud_cover": 12.5,
            "proj:epsg": 32633,
            "missing": null,
        });
        assert_eq!(
            AttributeValue::from_json(&props["platform"]),
            AttributeValue::from("sentinel-2a")
        );
        assert_eq!(
            AttributeValue::from_json(&props["eo:cloud_cover"]),
            AttributeValue::Number(12.5)
        );
        assert_eq!(
            AttributeValue::from_json(&props["proj:epsg"]),
            AttributeValue::Integer(32633)
        );
        assert!(AttributeValue::from_json(&props["missing"]).is_absent());
    }

    #[test]
    fn test_text_time_view() {
        let value = AttributeValue::from("2021-07-04T10:00:00Z");
        assert_eq!(
            value.as_time(),
            Some(parse_datetime("2021-07-04T10:00:00Z").unwrap())
        );
        assert_eq!(AttributeValue::from(None::<f64>), AttributeValue::Absent);
    }
}
