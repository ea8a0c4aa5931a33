//! Case-insensitive, ordered HTTP header map.
//!
//! # Design
//! Entries are kept in insertion order and matched by their ASCII-lowercased
//! name. Each entry remembers the casing of the last `set` (or the first
//! `append`) so the wire form can be reproduced exactly, while lookups never
//! depend on casing. Repeated fields such as `Set-Cookie` keep every value.

use std::borrow::Cow;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    key: String,
    name: String,
    values: Vec<String>,
}

fn normalize(name: &str) -> Cow<'_, str> {
    if name.bytes().any(|b| b.is_ascii_uppercase()) {
        Cow::Owned(name.to_ascii_lowercase())
    } else {
        Cow::Borrowed(name)
    }
}

/// Ordered header fields with case-insensitive lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<Entry>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        let key = normalize(name);
        self.entries.iter().position(|e| e.key == *key)
    }

    /// Value for `name`. Multiple values are joined with `", "`; a single
    /// value is returned verbatim.
    pub fn get(&self, name: &str) -> Option<Cow<'_, str>> {
        let entry = &self.entries[self.position(name)?];
        match entry.values.as_slice() {
            [single] => Some(Cow::Borrowed(single.as_str())),
            many => Some(Cow::Owned(many.join(", "))),
        }
    }

    /// Every value stored for `name`, in the order received.
    pub fn get_all(&self, name: &str) -> &[String] {
        match self.position(name) {
            Some(i) => &self.entries[i].values,
            None => &[],
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Replace any existing values for `name`, adopting this call's casing.
    /// The entry keeps its original position.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(i) => {
                let entry = &mut self.entries[i];
                entry.name = name;
                entry.values = vec![value];
            }
            None => self.entries.push(Entry {
                key: normalize(&name).into_owned(),
                name,
                values: vec![value],
            }),
        }
    }

    /// Add a value for `name`, keeping any existing ones.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(i) => self.entries[i].values.push(value),
            None => self.entries.push(Entry {
                key: normalize(&name).into_owned(),
                name,
                values: vec![value],
            }),
        }
    }

    /// Remove `name` if present; no-op otherwise.
    pub fn delete(&mut self, name: &str) {
        if let Some(i) = self.position(name) {
            self.entries.remove(i);
        }
    }

    /// Number of distinct field names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(name, value)` pairs in wire order, one pair per stored value.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|e| e.values.iter().map(move |v| (e.name.as_str(), v.as_str())))
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.append(name, value);
        }
        headers
    }
}

impl From<HashMap<String, String>> for Headers {
    fn from(map: HashMap<String, String>) -> Self {
        let mut headers = Headers::new();
        for (name, value) in map {
            headers.set(name, value);
        }
        headers
    }
}

impl<K, V> From<Vec<(K, V)>> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(pairs: Vec<(K, V)>) -> Self {
        pairs.into_iter().collect()
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}
