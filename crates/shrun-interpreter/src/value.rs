//! Variable values

use std::collections::HashMap;

/// How many name references are followed before a lookup gives up
pub const MAX_NAME_REF_DEPTH: usize = 100;

/// The value held by a shell variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Scalar(String),
    /// Dense array; unset slots between assigned ones hold `""`
    Indexed(Vec<String>),
    Assoc(AssocArray),
    /// `declare -n`: the name of the variable this one stands for
    NameRef(String),
}

impl Value {
    #[must_use]
    pub fn scalar(value: impl Into<String>) -> Self {
        Self::Scalar(value.into())
    }

    #[must_use]
    pub fn indexed<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Indexed(items.into_iter().map(Into::into).collect())
    }

    /// Number of elements, as `${#name[@]}` reports it
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Scalar(_) | Self::NameRef(_) => 1,
            Self::Indexed(list) => list.len(),
            Self::Assoc(map) => map.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Scalar(value)
    }
}

/// String-keyed map that remembers the order keys were first inserted in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssocArray {
    keys: Vec<String>,
    vals: HashMap<String, String>,
}

impl AssocArray {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`; a new key goes last, an existing key keeps its place
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if !self.vals.contains_key(&key) {
            self.keys.push(key.clone());
        }
        self.vals.insert(key, value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vals.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let removed = self.vals.remove(key)?;
        self.keys.retain(|k| k != key);
        Some(removed)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// Values in key order
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.keys
            .iter()
            .filter_map(|k| self.vals.get(k).map(String::as_str))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.keys
            .iter()
            .filter_map(|k| self.vals.get(k).map(|v| (k.as_str(), v.as_str())))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AssocArray {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}
