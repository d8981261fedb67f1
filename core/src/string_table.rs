//! Interned property names.
//!
//! Names declared by a SWF ≤ 6 movie are looked up case-insensitively;
//! SWF ≥ 7 names are exact. Rather than folding on every lookup, the
//! folding decision is made once at intern time: a folded intern keys all
//! case variants of a name to the same id, so the property maps never have
//! to compare strings again.

use fnv::FnvHashMap;
use std::rc::Rc;

/// An interned name. Id 0 is always the empty string.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NameId(pub u32);

impl NameId {
    pub const EMPTY: NameId = NameId(0);
}

/// The wildcard namespace. Matches any namespace on lookup.
pub const ANY_NAMESPACE: NameId = NameId::EMPTY;

/// Composite key for one object member: an interned name plus a namespace.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectUri {
    pub name: NameId,
    pub ns: NameId,
}

impl ObjectUri {
    pub fn new(name: NameId) -> Self {
        Self {
            name,
            ns: ANY_NAMESPACE,
        }
    }

    pub fn with_namespace(name: NameId, ns: NameId) -> Self {
        Self { name, ns }
    }
}

pub struct StringTable {
    entries: Vec<Rc<str>>,
    exact: FnvHashMap<Rc<str>, NameId>,
    folded: FnvHashMap<String, NameId>,
}

impl StringTable {
    pub fn new() -> Self {
        let empty: Rc<str> = "".into();
        let mut exact = FnvHashMap::default();
        exact.insert(Rc::clone(&empty), NameId::EMPTY);
        let mut folded = FnvHashMap::default();
        folded.insert(String::new(), NameId::EMPTY);
        Self {
            entries: vec![empty],
            exact,
            folded,
        }
    }

    /// Intern a name, returning its id.
    ///
    /// With `fold` set (declaring SWF version ≤ 6), all case variants of
    /// the name share one id; the spelling first seen is the one reported
    /// by [`value`](Self::value).
    pub fn intern(&mut self, name: &str, fold: bool) -> NameId {
        if fold {
            let key = fold_case(name);
            if let Some(&id) = self.folded.get(&key) {
                return id;
            }
            let id = self.push(name);
            self.folded.insert(key, id);
            id
        } else {
            if let Some(&id) = self.exact.get(name) {
                return id;
            }
            let id = self.push(name);
            // Make the exact spelling reachable from folded interns too,
            // unless a folded name already owns it.
            let key = fold_case(name);
            self.folded.entry(key).or_insert(id);
            id
        }
    }

    /// Look up a name without interning it.
    pub fn find(&self, name: &str, fold: bool) -> Option<NameId> {
        if fold {
            self.folded.get(&fold_case(name)).copied()
        } else {
            self.exact.get(name).copied()
        }
    }

    /// The canonical spelling for an id.
    pub fn value(&self, id: NameId) -> &str {
        self.entries
            .get(id.0 as usize)
            .map(|s| &**s)
            .unwrap_or("")
    }

    pub fn value_rc(&self, id: NameId) -> Rc<str> {
        self.entries
            .get(id.0 as usize)
            .cloned()
            .unwrap_or_else(|| "".into())
    }

    fn push(&mut self, name: &str) -> NameId {
        let id = NameId(self.entries.len() as u32);
        let entry: Rc<str> = name.into();
        self.entries.push(Rc::clone(&entry));
        self.exact.insert(entry, id);
        id
    }
}

impl Default for StringTable {
    fn default() -> Self {
        Self::new()
    }
}

fn fold_case(name: &str) -> String {
    name.to_ascii_lowercase()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn folded_interns_share_an_id() {
        let mut st = StringTable::new();
        let a = st.intern("foo", true);
        let b = st.intern("FOO", true);
        let c = st.intern("Foo", true);
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(st.value(a), "foo");
    }

    #[test]
    fn exact_interns_are_distinct() {
        let mut st = StringTable::new();
        let a = st.intern("foo", false);
        let b = st.intern("FOO", false);
        assert_ne!(a, b);
        assert_eq!(st.value(a), "foo");
        assert_eq!(st.value(b), "FOO");
    }

    #[test]
    fn folded_lookup_reaches_exact_interns() {
        let mut st = StringTable::new();
        let a = st.intern("Bar", false);
        assert_eq!(st.find("bAr", true), Some(a));
        assert_eq!(st.find("bAr", false), None);
    }

    #[test]
    fn empty_name_is_id_zero() {
        let mut st = StringTable::new();
        assert_eq!(st.intern("", true), NameId::EMPTY);
        assert_eq!(st.intern("", false), NameId::EMPTY);
    }
}
