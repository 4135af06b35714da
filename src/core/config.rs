//! Purpose: Resolved-configuration map with defined merge semantics.
//! Exports: `ConfigMap`, `ConfigValue`, and bed-geometry helpers.
//! Invariants: Keys are unique; later merges overwrite earlier values in place.
//! Invariants: Absent keys are a valid query result, never an error.
//! Invariants: Option values stay opaque serialized strings; no option
//! semantics live here.

use serde_json::{Map, Value, json};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConfigValue {
    Single(String),
    List(Vec<String>),
}

impl ConfigValue {
    pub fn single(value: impl Into<String>) -> Self {
        Self::Single(value.into())
    }

    pub fn list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(values.into_iter().map(Into::into).collect())
    }

    /// Best-effort numeric view. A single value may itself be a
    /// comma-separated per-extruder vector, e.g. `"1.75,1.75"`.
    pub fn floats(&self) -> Vec<f64> {
        let parts: Vec<&str> = match self {
            Self::Single(value) => value.split(',').collect(),
            Self::List(values) => values.iter().map(String::as_str).collect(),
        };
        parts
            .iter()
            .filter_map(|part| part.trim().parse::<f64>().ok())
            .collect()
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Single(value) => json!(value),
            Self::List(values) => json!(values),
        }
    }
}

/// Insertion-ordered key to serialized-value mapping.
#[derive(Clone, Debug, Default)]
pub struct ConfigMap {
    entries: Vec<(String, ConfigValue)>,
}

impl ConfigMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.iter().any(|(name, _)| name == key)
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    pub fn set(&mut self, key: impl Into<String>, value: ConfigValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(name, _)| *name == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Merge `other` into `self`: same keys are overwritten in place, new
    /// keys are appended in `other`'s order.
    pub fn merge(&mut self, other: &ConfigMap) {
        for (key, value) in &other.entries {
            self.set(key.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value))
    }

    /// Per-extruder float lookup. Missing key, unparsable entry, or a vector
    /// shorter than `index + 1` all fall back to `default`.
    pub fn float_at(&self, key: &str, index: usize, default: f64) -> f64 {
        self.get(key)
            .map(ConfigValue::floats)
            .and_then(|values| values.get(index).copied())
            .unwrap_or(default)
    }

    /// Centroid of the configured bed polygon (`printable_area`), serialized
    /// as `"x0xy0,x1xy1,..."` in the engine's point syntax. Absent or
    /// malformed values disable centering rather than failing.
    pub fn bed_center(&self) -> Option<[f64; 2]> {
        let value = self.get("printable_area")?;
        let raw = match value {
            ConfigValue::Single(text) => text.clone(),
            ConfigValue::List(values) => values.join(","),
        };
        let points = parse_points(&raw)?;
        if points.is_empty() {
            return None;
        }
        let mut min = points[0];
        let mut max = points[0];
        for point in &points[1..] {
            min[0] = min[0].min(point[0]);
            min[1] = min[1].min(point[1]);
            max[0] = max[0].max(point[0]);
            max[1] = max[1].max(point[1]);
        }
        Some([(min[0] + max[0]) / 2.0, (min[1] + max[1]) / 2.0])
    }

    /// Stable rendering: keys sorted, single values as strings, multi-values
    /// as arrays.
    pub fn to_json_value(&self) -> Value {
        let mut sorted: Vec<&(String, ConfigValue)> = self.entries.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        let mut map = Map::new();
        for (key, value) in sorted {
            map.insert(key.clone(), value.to_json());
        }
        Value::Object(map)
    }
}

fn parse_points(raw: &str) -> Option<Vec<[f64; 2]>> {
    let mut points = Vec::new();
    for pair in raw.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (x, y) = pair.split_once('x')?;
        let x = x.trim().parse::<f64>().ok()?;
        let y = y.trim().parse::<f64>().ok()?;
        points.push([x, y]);
    }
    Some(points)
}
