//! Option-name to value-list mapping.
//!
//! Every option holds one or more scalar values. A single value applies to
//! every resolution level; per-level options otherwise list at least one
//! value per level.

use std::collections::BTreeMap;
use std::fmt;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use crate::error::{RegistrationError, Result};

/// A single option value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl ParameterValue {
    /// Numeric value; text is parsed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Bool(_) => None,
        }
    }

    /// Boolean value; `"true"`/`"false"` text is accepted.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Text(s) => match s.trim() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            Self::Number(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(v) => write!(f, "{}", v),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<usize> for ParameterValue {
    fn from(value: usize) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Ordered option map.
///
/// Serializes as a JSON object whose values are scalars (single value) or
/// arrays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterMap {
    #[serde(serialize_with = "serialize_entries", deserialize_with = "deserialize_entries")]
    entries: BTreeMap<String, Vec<ParameterValue>>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(ParameterValue),
    Many(Vec<ParameterValue>),
}

fn serialize_entries<S: Serializer>(
    entries: &BTreeMap<String, Vec<ParameterValue>>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let raw: BTreeMap<&String, OneOrMany> = entries
        .iter()
        .map(|(k, v)| {
            let value = match v.as_slice() {
                [single] => OneOrMany::One(single.clone()),
                _ => OneOrMany::Many(v.clone()),
            };
            (k, value)
        })
        .collect();
    raw.serialize(serializer)
}

fn deserialize_entries<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, Vec<ParameterValue>>, D::Error> {
    let raw = BTreeMap::<String, OneOrMany>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(k, v)| match v {
            OneOrMany::One(value) => (k, vec![value]),
            OneOrMany::Many(values) => (k, values),
        })
        .collect())
}

impl ParameterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a JSON object.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| RegistrationError::configuration(format!("invalid parameter map: {}", e)))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| RegistrationError::configuration(format!("cannot serialize parameter map: {}", e)))
    }

    /// Set an option to a single value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ParameterValue>) -> &mut Self {
        self.entries.insert(key.into(), vec![value.into()]);
        self
    }

    /// Set an option to a list of values.
    pub fn set_values<V: Into<ParameterValue>>(
        &mut self,
        key: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        self.entries
            .insert(key.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Builder form of [`Self::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Builder form of [`Self::set_values`].
    pub fn with_values<V: Into<ParameterValue>>(
        mut self,
        key: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.set_values(key, values);
        self
    }

    pub fn get(&self, key: &str) -> Option<&[ParameterValue]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<ParameterValue>> {
        self.entries.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ParameterValue])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First value of an option as text.
    pub fn get_str(&self, key: &str) -> Result<Option<String>> {
        match self.first(key) {
            None => Ok(None),
            Some(ParameterValue::Text(s)) => Ok(Some(s.clone())),
            Some(other) => Ok(Some(other.to_string())),
        }
    }

    pub fn get_f64(&self, key: &str) -> Result<Option<f64>> {
        self.first(key).map(|v| number(key, v)).transpose()
    }

    pub fn get_usize(&self, key: &str) -> Result<Option<usize>> {
        self.first(key).map(|v| count(key, v)).transpose()
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        self.first(key).map(|v| boolean(key, v)).transpose()
    }

    /// All values of an option as numbers.
    pub fn get_f64_list(&self, key: &str) -> Result<Option<Vec<f64>>> {
        self.get(key)
            .map(|values| values.iter().map(|v| number(key, v)).collect())
            .transpose()
    }

    pub fn get_usize_list(&self, key: &str) -> Result<Option<Vec<usize>>> {
        self.get(key)
            .map(|values| values.iter().map(|v| count(key, v)).collect())
            .transpose()
    }

    /// One number per level, broadcasting a single value.
    pub fn per_level_f64(&self, key: &str, levels: usize) -> Result<Option<Vec<f64>>> {
        self.per_level(key, levels, number)
    }

    pub fn per_level_usize(&self, key: &str, levels: usize) -> Result<Option<Vec<usize>>> {
        self.per_level(key, levels, count)
    }

    pub fn per_level_bool(&self, key: &str, levels: usize) -> Result<Option<Vec<bool>>> {
        self.per_level(key, levels, boolean)
    }

    fn first(&self, key: &str) -> Option<&ParameterValue> {
        self.entries.get(key).and_then(|v| v.first())
    }

    fn per_level<T: Clone>(
        &self,
        key: &str,
        levels: usize,
        convert: fn(&str, &ParameterValue) -> Result<T>,
    ) -> Result<Option<Vec<T>>> {
        let Some(values) = self.get(key) else {
            return Ok(None);
        };
        match values {
            [] => Err(RegistrationError::configuration(format!("option {} has no value", key))),
            [single] => Ok(Some(vec![convert(key, single)?; levels])),
            _ if values.len() >= levels => values[..levels]
                .iter()
                .map(|v| convert(key, v))
                .collect::<Result<Vec<_>>>()
                .map(Some),
            _ => Err(RegistrationError::configuration(format!(
                "option {} has {} values, expected 1 or at least {}",
                key,
                values.len(),
                levels
            ))),
        }
    }
}

fn number(key: &str, value: &ParameterValue) -> Result<f64> {
    value.as_f64().ok_or_else(|| {
        RegistrationError::configuration(format!("option {} expects a number, got {}", key, value))
    })
}

fn count(key: &str, value: &ParameterValue) -> Result<usize> {
    let v = number(key, value)?;
    if v < 0.0 || v.fract() != 0.0 {
        return Err(RegistrationError::configuration(format!(
            "option {} expects a non-negative integer, got {}",
            key, value
        )));
    }
    Ok(v as usize)
}

fn boolean(key: &str, value: &ParameterValue) -> Result<bool> {
    value.as_bool().ok_or_else(|| {
        RegistrationError::configuration(format!("option {} expects true or false, got {}", key, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_scalars_and_arrays() {
        let map = ParameterMap::from_json(
            r#"{
                "Transform": "EulerTransform",
                "NumberOfResolutions": 2,
                "MaximumNumberOfIterations": [100, 50],
                "WriteResultImage": false
            }"#,
        )
        .unwrap();

        assert_eq!(map.get_str("Transform").unwrap().as_deref(), Some("EulerTransform"));
        assert_eq!(map.get_usize("NumberOfResolutions").unwrap(), Some(2));
        assert_eq!(map.per_level_usize("MaximumNumberOfIterations", 2).unwrap(), Some(vec![100, 50]));
        assert_eq!(map.get_bool("WriteResultImage").unwrap(), Some(false));
        assert_eq!(map.get_f64("Missing").unwrap(), None);
    }

    #[test]
    fn test_text_values_are_parsed() {
        let map = ParameterMap::new()
            .with("SP_A", "20.0")
            .with("UseDirectionCosines", "true");
        assert_eq!(map.get_f64("SP_A").unwrap(), Some(20.0));
        assert_eq!(map.get_bool("UseDirectionCosines").unwrap(), Some(true));
    }

    #[test]
    fn test_per_level_broadcast_and_mismatch() {
        let map = ParameterMap::new()
            .with("NumberOfSpatialSamples", 2048usize)
            .with_values("NumberOfHistogramBins", [16usize, 32, 64]);

        assert_eq!(map.per_level_usize("NumberOfSpatialSamples", 3).unwrap(), Some(vec![2048; 3]));
        assert_eq!(map.per_level_usize("NumberOfHistogramBins", 2).unwrap(), Some(vec![16, 32]));
        assert!(matches!(
            map.per_level_usize("NumberOfHistogramBins", 4),
            Err(RegistrationError::Configuration(_))
        ));
    }

    #[test]
    fn test_type_errors() {
        let map = ParameterMap::new()
            .with("NumberOfResolutions", -1.0)
            .with("ErodeMask", 3.0);
        assert!(map.get_usize("NumberOfResolutions").is_err());
        assert!(map.get_bool("ErodeMask").is_err());
    }

    #[test]
    fn test_json_round_trip_keeps_lists() {
        let map = ParameterMap::new()
            .with("Metric", "AdvancedMattesMutualInformation")
            .with_values("GridSpacingSchedule", [4.0, 2.0, 1.0]);
        let json = map.to_json().unwrap();
        assert!(json.contains("\"Metric\": \"AdvancedMattesMutualInformation\""));
        assert_eq!(ParameterMap::from_json(&json).unwrap(), map);
    }
}
