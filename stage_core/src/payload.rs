//! Payload map handed in by the caller.
//!
//! Keys are paths relative to the manifest's directory and are matched
//! byte-for-byte: no case folding, no separator or `./` normalization.

use std::collections::HashMap;

use bytes::Bytes;

/// Relative path → binary payload.
#[derive(Debug, Clone, Default)]
pub struct PayloadMap {
    entries: HashMap<String, Bytes>,
}

impl PayloadMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the payload stored under `path`.
    pub fn insert(&mut self, path: impl Into<String>, payload: impl Into<Bytes>) -> Option<Bytes> {
        self.entries.insert(path.into(), payload.into())
    }

    /// Builder-style insert.
    pub fn with(mut self, path: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        self.insert(path, payload);
        self
    }

    pub fn get(&self, path: &str) -> Option<&Bytes> {
        self.entries.get(path)
    }

    pub fn remove(&mut self, path: &str) -> Option<Bytes> {
        self.entries.remove(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates paths in unspecified order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<Bytes>> FromIterator<(K, V)> for PayloadMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_exact() {
        let payloads = PayloadMap::new().with("Textures/T0.png", Bytes::from_static(b"png"));
        assert!(payloads.contains("Textures/T0.png"));
        assert!(!payloads.contains("textures/t0.png"));
        assert!(!payloads.contains("./Textures/T0.png"));
        assert!(!payloads.contains("Textures\\T0.png"));
    }

    #[test]
    fn collects_from_pairs() {
        let payloads: PayloadMap = vec![("a", b"1".to_vec()), ("b", b"2".to_vec())]
            .into_iter()
            .collect();
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads.get("b").unwrap(), &Bytes::from_static(b"2"));
    }
}
