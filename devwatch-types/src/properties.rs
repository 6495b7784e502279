// SPDX-License-Identifier: GPL-3.0-only

//! Ordered property record
//!
//! udev hands out properties as a linked list in its own order. The record
//! keeps that order and keeps valueless properties distinct from empty ones.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Key name under which the device syspath is attached to a record
pub const SYSPATH_KEY: &str = "syspath";

/// Ordered mapping of property names to optional values
///
/// Re-inserting a key replaces its value but keeps the position of the
/// first insertion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyMap {
    entries: Vec<(String, Option<String>)>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Insert a property, returning the previous value if the key existed
    pub fn insert(&mut self, key: impl Into<String>, value: Option<String>) -> Option<Option<String>> {
        let key = key.into();
        match self.entries.iter_mut().find(|(name, _)| *name == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Look up a property.
    ///
    /// The outer `Option` tells whether the key is present, the inner one
    /// whether it carries a value.
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_deref())
    }

    /// Value of a property, flattening "absent" and "valueless" together
    pub fn value(&self, key: &str) -> Option<&str> {
        self.get(key).flatten()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_deref()))
    }
}

impl<K, V> FromIterator<(K, Option<V>)> for PropertyMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, Option<V>)>>(iter: I) -> Self {
        let mut map = PropertyMap::new();
        map.extend(iter);
        map
    }
}

impl<K, V> Extend<(K, Option<V>)> for PropertyMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn extend<I: IntoIterator<Item = (K, Option<V>)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value.map(Into::into));
        }
    }
}

impl IntoIterator for PropertyMap {
    type Item = (String, Option<String>);
    type IntoIter = std::vec::IntoIter<(String, Option<String>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for PropertyMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PropertyMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PropertyMapVisitor;

        impl<'de> Visitor<'de> for PropertyMapVisitor {
            type Value = PropertyMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of property names to strings or null")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<PropertyMap, A::Error> {
                let mut map = PropertyMap::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, Option<String>>()? {
                    map.insert(key, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(PropertyMapVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn duplicate_keys_overwrite_in_place() {
        let map: PropertyMap = [
            ("DEVNAME", Some("/dev/sdb1")),
            ("ID_FS_TYPE", Some("vfat")),
            ("DEVNAME", Some("/dev/sdc1")),
        ]
        .into_iter()
        .collect();

        assert_eq!(map.len(), 2);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["DEVNAME", "ID_FS_TYPE"]);
        assert_eq!(map.value("DEVNAME"), Some("/dev/sdc1"));
    }

    #[test]
    fn null_and_empty_values_stay_distinct() {
        let mut map = PropertyMap::new();
        map.insert("ID_FS_LABEL", Some(String::new()));
        map.insert("ID_PART_ENTRY_NAME", None);

        assert_eq!(map.get("ID_FS_LABEL"), Some(Some("")));
        assert_eq!(map.get("ID_PART_ENTRY_NAME"), Some(None));
        assert_eq!(map.get("MISSING"), None);
    }

    #[test]
    fn serializes_in_insertion_order_with_nulls() {
        let map: PropertyMap = [("ZETA", Some("1")), ("ALPHA", None::<&str>)]
            .into_iter()
            .collect();

        let json = serde_json::to_string(&map).expect("serialize");
        assert_eq!(json, r#"{"ZETA":"1","ALPHA":null}"#);

        let back: PropertyMap = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, map);
    }

    proptest! {
        #[test]
        fn keeps_every_distinct_entry_in_order(
            entries in proptest::collection::vec(
                ("[A-Z_]{1,12}", proptest::option::of("[ -~]{0,16}")),
                0..32,
            )
        ) {
            let mut seen = std::collections::HashSet::new();
            let distinct: Vec<_> = entries
                .into_iter()
                .filter(|(key, _)| seen.insert(key.clone()))
                .collect();

            let map: PropertyMap = distinct.iter().cloned().collect();

            prop_assert_eq!(map.len(), distinct.len());
            for ((key, value), (got_key, got_value)) in distinct.iter().zip(map.iter()) {
                prop_assert_eq!(key.as_str(), got_key);
                prop_assert_eq!(value.as_deref(), got_value);
            }
        }
    }
}
