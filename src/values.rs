use std::collections::{BTreeMap, HashMap};

use indexmap::IndexMap;

/// Flat, multi-valued form input: key → every value submitted for it.
///
/// Keys keep their insertion order, so warnings come out in a stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormValues {
    entries: IndexMap<String, Vec<String>>,
}

impl FormValues {
    /// Creates an empty input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value` to the values of `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.entries
            .entry(key.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Replaces every value of `key`.
    pub fn set<I, V>(&mut self, key: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.entries
            .insert(key.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Values submitted for `key`.
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no keys at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over keys and their values in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(key, values)| (key.as_str(), values.as_slice()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut values = FormValues::new();
        for (key, value) in iter {
            values.insert(key, value);
        }
        values
    }
}

impl From<HashMap<String, Vec<String>>> for FormValues {
    fn from(map: HashMap<String, Vec<String>>) -> Self {
        FormValues {
            entries: map.into_iter().collect(),
        }
    }
}

impl From<BTreeMap<String, Vec<String>>> for FormValues {
    fn from(map: BTreeMap<String, Vec<String>>) -> Self {
        FormValues {
            entries: map.into_iter().collect(),
        }
    }
}

impl<K, V, const N: usize, const M: usize> From<[(K, [V; N]); M]> for FormValues
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(pairs: [(K, [V; N]); M]) -> Self {
        let mut values = FormValues::new();
        for (key, list) in pairs {
            values.set(key, list);
        }
        values
    }
}

/// Literal input whose keys carry different numbers of values.
impl<K, V, const M: usize> From<[(K, Vec<V>); M]> for FormValues
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(pairs: [(K, Vec<V>); M]) -> Self {
        let mut values = FormValues::new();
        for (key, list) in pairs {
            values.set(key, list);
        }
        values
    }
}
