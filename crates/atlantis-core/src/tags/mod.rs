//! Resource tags and the merge precedence law.
//!
//! Merging is asymmetric: an overlay may add any new key and may replace
//! an existing one, unless that key is in the protected namespace. Once a
//! protected tag is in the base set, the base value always wins.

mod automated;

pub use automated::{automated_tags, generate_tags};

use serde::{Deserialize, Serialize};

/// Key prefixes reserved for tags set by the automated generator.
pub const PROTECTED_PREFIXES: &[&str] = &["atlantis:", "Atlantis"];

/// Whether `key` belongs to the protected namespace (case-sensitive).
pub fn is_protected(key: &str) -> bool {
    PROTECTED_PREFIXES.iter().any(|p| key.starts_with(p))
}

/// A single `(key, value)` resource tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value")]
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Insertion-ordered tags with unique keys.
///
/// Equality ignores order: two sets are equal when they map the same keys
/// to the same values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Tag>", into = "Vec<Tag>")]
pub struct TagSet {
    tags: Vec<Tag>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tag, replacing the value in place if the key exists.
    pub fn insert(&mut self, tag: Tag) {
        match self.tags.iter_mut().find(|t| t.key == tag.key) {
            Some(existing) => existing.value = tag.value,
            None => self.tags.push(tag),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.tags.iter().any(|t| t.key == key)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.tags.iter()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Key to value view, used for comparisons.
    pub fn to_map(&self) -> std::collections::BTreeMap<&str, &str> {
        self.tags
            .iter()
            .map(|t| (t.key.as_str(), t.value.as_str()))
            .collect()
    }
}

impl PartialEq for TagSet {
    fn eq(&self, other: &Self) -> bool {
        self.to_map() == other.to_map()
    }
}

impl Eq for TagSet {}

impl FromIterator<Tag> for TagSet {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        let mut set = TagSet::new();
        for tag in iter {
            set.insert(tag);
        }
        set
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter().map(|(k, v)| Tag::new(k, v)).collect()
    }
}

impl From<Vec<Tag>> for TagSet {
    fn from(tags: Vec<Tag>) -> Self {
        tags.into_iter().collect()
    }
}

impl From<TagSet> for Vec<Tag> {
    fn from(set: TagSet) -> Self {
        set.tags
    }
}

impl IntoIterator for TagSet {
    type Item = Tag;
    type IntoIter = std::vec::IntoIter<Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.into_iter()
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}

/// Merge `overlay` onto `base` under the protected-namespace rule.
///
/// Base order is kept; keys new to the base are appended in overlay order.
pub fn merge(base: &TagSet, overlay: &TagSet) -> TagSet {
    let mut merged = base.clone();
    for tag in overlay {
        if !merged.contains_key(&tag.key) || !is_protected(&tag.key) {
            merged.insert(tag.clone());
        }
    }
    merged
}
