//! Role / Group Capability Checks
//!
//! A typed bidirectional mapping between numeric ids and names, built from
//! the read-only directory tables. The core never evaluates authorization
//! policy; it only answers membership questions for the application layer.

use std::collections::HashMap;

/// A role or group reference, by id or by name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector<'a> {
    Id(i16),
    Name(&'a str),
}

/// Bidirectional id <-> name directory
#[derive(Debug, Clone, Default)]
pub struct Directory {
    by_id: HashMap<i16, String>,
    by_name: HashMap<String, i16>,
}

impl Directory {
    /// Build from `(id, name)` entries
    pub fn from_entries(entries: impl IntoIterator<Item = (i16, String)>) -> Self {
        let mut by_id = HashMap::new();
        let mut by_name = HashMap::new();
        for (id, name) in entries {
            by_name.insert(name.clone(), id);
            by_id.insert(id, name);
        }
        Self { by_id, by_name }
    }

    pub fn name_of(&self, id: i16) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    pub fn id_of(&self, name: &str) -> Option<i16> {
        self.by_name.get(name).copied()
    }

    pub fn contains_id(&self, id: i16) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Check whether an assigned id matches any of the wanted selectors
    ///
    /// An id absent from the directory never matches, whatever the
    /// selectors say; a stale assignment grants nothing.
    pub fn has_any(&self, assigned: i16, wanted: &[Selector<'_>]) -> bool {
        let Some(assigned_name) = self.by_id.get(&assigned) else {
            return false;
        };

        wanted.iter().any(|selector| match selector {
            Selector::Id(id) => *id == assigned,
            Selector::Name(name) => assigned_name == name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> Directory {
        Directory::from_entries([
            (1, "member".to_string()),
            (2, "editor".to_string()),
            (3, "admin".to_string()),
        ])
    }

    #[test]
    fn test_bidirectional_lookup() {
        let dir = directory();
        assert_eq!(dir.name_of(2), Some("editor"));
        assert_eq!(dir.id_of("admin"), Some(3));
        assert_eq!(dir.name_of(9), None);
        assert_eq!(dir.id_of("ghost"), None);
    }

    #[test]
    fn test_has_any_by_id_and_name() {
        let dir = directory();
        assert!(dir.has_any(3, &[Selector::Id(3)]));
        assert!(dir.has_any(3, &[Selector::Name("admin")]));
        assert!(dir.has_any(2, &[Selector::Id(3), Selector::Name("editor")]));
        assert!(!dir.has_any(1, &[Selector::Id(3), Selector::Name("editor")]));
    }

    #[test]
    fn test_unknown_assignment_never_matches() {
        let dir = directory();
        assert!(!dir.has_any(42, &[Selector::Id(42)]));
        assert!(!dir.has_any(42, &[Selector::Name("admin")]));
    }

    #[test]
    fn test_empty_directory() {
        let dir = Directory::default();
        assert!(dir.is_empty());
        assert!(!dir.has_any(1, &[Selector::Id(1)]));
    }
}
