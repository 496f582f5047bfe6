//! Tag-based categorization of Workshop mods

use super::ModRecord;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

/// One tag bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub mods: Vec<String>,
}

/// Tag name -> mod ids, both in first-seen order.
///
/// Serialized as a JSON object whose key order is the insertion order, so
/// category indices shown to the user stay stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryMap {
    categories: Vec<Category>,
    index: HashMap<String, usize>,
}

impl CategoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Category> {
        self.index.get(name).map(|&i| &self.categories[i])
    }

    pub fn get_index(&self, idx: usize) -> Option<&Category> {
        self.categories.get(idx)
    }

    /// Resolve zero-based indices, silently dropping out-of-range ones.
    pub fn select(&self, indices: &[usize]) -> Vec<&Category> {
        indices.iter().filter_map(|&i| self.get_index(i)).collect()
    }

    /// Bucket for `name`, created at the end when missing.
    fn entry(&mut self, name: &str) -> &mut Category {
        let idx = match self.index.get(name) {
            Some(&idx) => idx,
            None => {
                self.categories.push(Category {
                    name: name.to_string(),
                    mods: Vec::new(),
                });
                let idx = self.categories.len() - 1;
                self.index.insert(name.to_string(), idx);
                idx
            }
        };
        &mut self.categories[idx]
    }
}

/// Every distinct tag across `mods`, sorted.
pub fn extract_tags(mods: &[ModRecord]) -> BTreeSet<String> {
    mods.iter().flat_map(|m| m.tags.iter().cloned()).collect()
}

/// Group mod ids by tag.
///
/// A mod lands in each of its tag buckets once, even when upstream data
/// repeats a tag on the same record.
pub fn build_by_category(mods: &[ModRecord]) -> CategoryMap {
    let mut map = CategoryMap::new();
    let mut seen: HashMap<String, HashSet<String>> = HashMap::new();

    for m in mods {
        for tag in &m.tags {
            let members = seen.entry(tag.clone()).or_default();
            let bucket = map.entry(tag);
            if members.insert(m.id.clone()) {
                bucket.mods.push(m.id.clone());
            }
        }
    }

    tracing::debug!("Built {} categories from {} mods", map.len(), mods.len());
    map
}

impl Serialize for CategoryMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.categories.len()))?;
        for category in &self.categories {
            map.serialize_entry(&category.name, &category.mods)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CategoryMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = CategoryMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of category name to mod id list")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<CategoryMap, A::Error> {
                let mut map = CategoryMap::new();
                while let Some((name, mods)) = access.next_entry::<String, Vec<String>>()? {
                    let bucket = map.entry(&name);
                    for id in mods {
                        if !bucket.mods.contains(&id) {
                            bucket.mods.push(id);
                        }
                    }
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<ModRecord> {
        vec![
            ModRecord::new("10", &["Weapons", "Armor"]),
            ModRecord::new("11", &["Armor", "Armor"]),
            ModRecord::new("12", &[]),
            ModRecord::new("13", &["Maps", "Weapons"]),
            ModRecord::new("10", &["Weapons"]),
        ]
    }

    #[test]
    fn buckets_follow_first_seen_order() {
        let map = build_by_category(&sample());

        assert_eq!(map.names(), vec!["Weapons", "Armor", "Maps"]);
        assert_eq!(map.get("Weapons").unwrap().mods, vec!["10", "13"]);
        assert_eq!(map.get("Armor").unwrap().mods, vec!["10", "11"]);
        assert_eq!(map.get("Maps").unwrap().mods, vec!["13"]);
    }

    #[test]
    fn untagged_mods_join_no_bucket() {
        let map = build_by_category(&sample());
        assert!(map.iter().all(|c| !c.mods.contains(&"12".to_string())));
        assert!(build_by_category(&[ModRecord::new("1", &[])]).is_empty());
    }

    #[test]
    fn extract_tags_is_sorted_and_unique() {
        let tags: Vec<_> = extract_tags(&sample()).into_iter().collect();
        assert_eq!(tags, vec!["Armor", "Maps", "Weapons"]);
    }

    #[test]
    fn select_ignores_out_of_range() {
        let map = build_by_category(&sample());
        let picked: Vec<_> = map.select(&[2, 9, 0]).iter().map(|c| c.name.as_str()).collect();
        assert_eq!(picked, vec!["Maps", "Weapons"]);
    }

    #[test]
    fn json_keeps_category_order() {
        let map = build_by_category(&[
            ModRecord::new("1", &["Zeta"]),
            ModRecord::new("2", &["Alpha"]),
        ]);

        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"Zeta":["1"],"Alpha":["2"]}"#);

        let back: CategoryMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back.names(), vec!["Zeta", "Alpha"]);
        assert_eq!(back, map);
    }
}
