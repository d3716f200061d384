//! Bidirectional player id <-> display name index.

use std::collections::HashMap;

use crate::storage::types::PlayerId;

/// Name index maintained as a side effect of every stat write.
///
/// Each id carries at most one name (last write wins). A name may be shared
/// by several ids; resolving such a name yields the id that most recently
/// wrote it.
#[derive(Debug, Clone, Default)]
pub struct NameIndex {
    by_id: HashMap<PlayerId, String>,
    by_name: HashMap<String, PlayerId>,
}

impl NameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `name` with `id`, replacing any previous name of `id`.
    pub fn insert(&mut self, id: PlayerId, name: &str) {
        if let Some(old) = self.by_id.insert(id, name.to_owned())
            && old != name
            && self.by_name.get(&old) == Some(&id)
        {
            // Hand the old name to another holder, if any.
            self.by_name.remove(&old);
            if let Some(other) = self
                .by_id
                .iter()
                .find_map(|(other, n)| (*n == old).then_some(*other))
            {
                self.by_name.insert(old, other);
            }
        }
        self.by_name.insert(name.to_owned(), id);
    }

    pub fn name_of(&self, id: &PlayerId) -> Option<&str> {
        self.by_id.get(id).map(String::as_str)
    }

    /// Resolve a display name to the id that most recently wrote it.
    pub fn resolve(&self, name: &str) -> Option<PlayerId> {
        self.by_name.get(name).copied()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PlayerId, &str)> {
        self.by_id.iter().map(|(id, name)| (id, name.as_str()))
    }
}
