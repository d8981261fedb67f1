//! The ordered member store backing every object.

use crate::avm1::property::Property;
use crate::string_table::{NameId, ObjectUri, ANY_NAMESPACE};
use indexmap::IndexMap;

/// Maps `(name, namespace)` keys to properties, preserving insertion
/// order for enumeration. Namespace 0 is the wildcard: a lookup with it
/// matches the first entry with that name in any namespace, and an entry
/// declared in it is found by lookups from any namespace.
#[derive(Clone, Debug, Default)]
pub struct PropertyMap {
    entries: IndexMap<ObjectUri, Property>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, uri: ObjectUri) -> Option<&Property> {
        if let Some(prop) = self.entries.get(&uri) {
            return Some(prop);
        }
        if uri.ns != ANY_NAMESPACE {
            return self.entries.get(&ObjectUri::new(uri.name));
        }
        // Wildcard query: first insertion-ordered entry with this name.
        self.entries
            .iter()
            .find(|(key, _)| key.name == uri.name)
            .map(|(_, prop)| prop)
    }

    pub fn get_mut(&mut self, uri: ObjectUri) -> Option<&mut Property> {
        let key = self.resolve_key(uri)?;
        self.entries.get_mut(&key)
    }

    pub fn contains_key(&self, uri: ObjectUri) -> bool {
        self.get(uri).is_some()
    }

    pub fn insert(&mut self, uri: ObjectUri, property: Property) {
        self.entries.insert(uri, property);
    }

    /// Remove an entry, keeping the order of the survivors.
    pub fn remove(&mut self, uri: ObjectUri) -> Option<Property> {
        let key = self.resolve_key(uri)?;
        self.entries.shift_remove(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ObjectUri, &Property)> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&ObjectUri, &mut Property)> {
        self.entries.iter_mut()
    }

    pub fn keys(&self) -> impl Iterator<Item = NameId> + '_ {
        self.entries.keys().map(|uri| uri.name)
    }

    fn resolve_key(&self, uri: ObjectUri) -> Option<ObjectUri> {
        if self.entries.contains_key(&uri) {
            return Some(uri);
        }
        if uri.ns != ANY_NAMESPACE {
            let wild = ObjectUri::new(uri.name);
            if self.entries.contains_key(&wild) {
                return Some(wild);
            }
            return None;
        }
        self.entries
            .keys()
            .find(|key| key.name == uri.name)
            .copied()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::avm1::property::Attribute;
    use crate::avm1::Value;

    fn stored(n: f64) -> Property {
        Property::new_stored(Value::Number(n), Attribute::empty())
    }

    #[test]
    fn insertion_order_is_preserved() {
        let mut map = PropertyMap::new();
        for (i, name) in [3u32, 1, 2].iter().enumerate() {
            map.insert(ObjectUri::new(NameId(*name)), stored(i as f64));
        }
        let order: Vec<NameId> = map.keys().collect();
        assert_eq!(order, vec![NameId(3), NameId(1), NameId(2)]);
    }

    #[test]
    fn wildcard_namespace_matches_any() {
        let mut map = PropertyMap::new();
        map.insert(
            ObjectUri::with_namespace(NameId(7), NameId(2)),
            stored(1.0),
        );
        // Wildcard query finds the namespaced entry.
        assert!(map.get(ObjectUri::new(NameId(7))).is_some());
        // A namespaced query falls back to a wildcard declaration.
        let mut map = PropertyMap::new();
        map.insert(ObjectUri::new(NameId(7)), stored(1.0));
        assert!(map
            .get(ObjectUri::with_namespace(NameId(7), NameId(9)))
            .is_some());
    }

    #[test]
    fn remove_keeps_order() {
        let mut map = PropertyMap::new();
        map.insert(ObjectUri::new(NameId(1)), stored(1.0));
        map.insert(ObjectUri::new(NameId(2)), stored(2.0));
        map.insert(ObjectUri::new(NameId(3)), stored(3.0));
        assert!(map.remove(ObjectUri::new(NameId(2))).is_some());
        let order: Vec<NameId> = map.keys().collect();
        assert_eq!(order, vec![NameId(1), NameId(3)]);
    }
}
