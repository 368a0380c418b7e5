//! Question key to remote attribute id mapping

use indexmap::IndexMap;

/// Attributes every organization already has
pub const DEFAULT_ATTRIBUTES: [(&str, &str); 5] = [
    ("FullName", "013a31db-fe24-4fad-ab6a-dd9d831e72f9"),
    ("Phone", "7d3466e5-2cee-491e-b3f4-bfea3a4b010a"),
    ("Email", "b687b86e-8fe3-4235-bb78-1919bcca00db"),
    ("RegisteredToVote", "dcfc1fbb-4609-4900-bbb3-1c4afb2a5127"),
    ("PartyAffiliation", "4a320f76-ef7b-4d73-ae2a-8f4ccf5de344"),
];

/// Attribute ids by question key, in insertion order
///
/// Shared across every form of one conversion so a question key is only
/// ever created once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeMap {
    ids: IndexMap<String, String>,
}

impl Default for AttributeMap {
    fn default() -> Self {
        Self {
            ids: DEFAULT_ATTRIBUTES
                .iter()
                .map(|(key, id)| ((*key).to_string(), (*id).to_string()))
                .collect(),
        }
    }
}

impl AttributeMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.ids.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, id: impl Into<String>) {
        self.ids.insert(key.into(), id.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.ids.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_in_order() {
        let map = AttributeMap::new();
        assert_eq!(map.len(), 5);
        assert_eq!(map.get("FullName"), Some("013a31db-fe24-4fad-ab6a-dd9d831e72f9"));
        let keys: Vec<_> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            ["FullName", "Phone", "Email", "RegisteredToVote", "PartyAffiliation"]
        );
    }

    #[test]
    fn created_attributes_append() {
        let mut map = AttributeMap::new();
        map.insert("FavoriteColor", "attr-9");
        assert_eq!(map.iter().last(), Some(("FavoriteColor", "attr-9")));
        assert_eq!(map.get("Unknown"), None);
    }
}
