//! Which sections and actions a permission grants.

use std::borrow::Borrow;
use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

use soma_msg::Category;
use soma_msg::proto::PermissionMapping;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionEntry {
    pub id: String,
    pub name: String,
    pub category: Category,
}

type ActionKey = (String, String);

#[derive(Debug, Default)]
pub struct PermissionMap {
    permissions: HashMap<String, PermissionEntry>,
    names: HashMap<(Category, String), String>,
    by_section: HashMap<String, BTreeSet<String>>,
    by_action: HashMap<ActionKey, BTreeSet<String>>,
    sections_of: HashMap<String, BTreeSet<String>>,
    actions_of: HashMap<String, BTreeSet<ActionKey>>,
}

impl PermissionMap {
    pub fn add_permission(&mut self, id: &str, name: &str, category: Category) {
        if let Some(previous) = self.permissions.get(id) {
            let key = (previous.category, previous.name.clone());
            if self.names.get(&key).is_some_and(|v| v == id) {
                self.names.remove(&key);
            }
        }
        self.names
            .insert((category, name.to_owned()), id.to_owned());
        self.permissions.insert(
            id.to_owned(),
            PermissionEntry {
                id: id.to_owned(),
                name: name.to_owned(),
                category,
            },
        );
    }

    /// Removes the permission and every mapping it has.
    pub fn remove_permission(&mut self, id: &str) -> Option<PermissionEntry> {
        let entry = self.permissions.remove(id)?;
        let key = (entry.category, entry.name.clone());
        if self.names.get(&key).is_some_and(|v| v == id) {
            self.names.remove(&key);
        }
        for section in self.sections_of.remove(id).unwrap_or_default() {
            remove_from(&mut self.by_section, &section, id);
        }
        for action in self.actions_of.remove(id).unwrap_or_default() {
            remove_from(&mut self.by_action, &action, id);
        }
        Some(entry)
    }

    /// Returns `false` if the permission is unknown.
    pub fn map_section(&mut self, permission_id: &str, section_id: &str) -> bool {
        if !self.permissions.contains_key(permission_id) {
            return false;
        }
        self.by_section
            .entry(section_id.to_owned())
            .or_default()
            .insert(permission_id.to_owned());
        self.sections_of
            .entry(permission_id.to_owned())
            .or_default()
            .insert(section_id.to_owned());
        true
    }

    /// Returns `false` if the permission is unknown.
    pub fn map_action(&mut self, permission_id: &str, section_id: &str, action_id: &str) -> bool {
        if !self.permissions.contains_key(permission_id) {
            return false;
        }
        let key = (section_id.to_owned(), action_id.to_owned());
        self.by_action
            .entry(key.clone())
            .or_default()
            .insert(permission_id.to_owned());
        self.actions_of
            .entry(permission_id.to_owned())
            .or_default()
            .insert(key);
        true
    }

    pub fn unmap_section(&mut self, permission_id: &str, section_id: &str) {
        remove_from(&mut self.by_section, section_id, permission_id);
        remove_from(&mut self.sections_of, permission_id, section_id);
    }

    pub fn unmap_action(&mut self, permission_id: &str, section_id: &str, action_id: &str) {
        let key = (section_id.to_owned(), action_id.to_owned());
        remove_from(&mut self.by_action, &key, permission_id);
        remove_from(&mut self.actions_of, permission_id, &key);
    }

    /// Drops every permission's mapping of the section, action mappings included.
    pub fn unmap_section_everywhere(&mut self, section_id: &str) {
        for permission_id in self.by_section.remove(section_id).unwrap_or_default() {
            remove_from(&mut self.sections_of, &permission_id, section_id);
        }
        let keys: Vec<ActionKey> = self
            .by_action
            .keys()
            .filter(|(s, _)| s == section_id)
            .cloned()
            .collect();
        for key in keys {
            self.unmap_action_everywhere(&key.0, &key.1);
        }
    }

    /// Drops every permission's mapping of the action.
    pub fn unmap_action_everywhere(&mut self, section_id: &str, action_id: &str) {
        let key = (section_id.to_owned(), action_id.to_owned());
        for permission_id in self.by_action.remove(&key).unwrap_or_default() {
            remove_from(&mut self.actions_of, &permission_id, &key);
        }
    }

    #[must_use]
    pub fn get_section_permission_ids(&self, section_id: &str) -> Vec<String> {
        self.by_section
            .get(section_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn get_action_permission_ids(&self, section_id: &str, action_id: &str) -> Vec<String> {
        self.by_action
            .get(&(section_id.to_owned(), action_id.to_owned()))
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Ids of every permission in `category`, sorted.
    #[must_use]
    pub fn get_category_permission_ids(&self, category: Category) -> Vec<String> {
        let mut ids: Vec<String> = self
            .permissions
            .values()
            .filter(|p| p.category == category)
            .map(|p| p.id.clone())
            .collect();
        ids.sort();
        ids
    }

    #[must_use]
    pub fn get_category(&self, permission_id: &str) -> Option<Category> {
        self.permissions.get(permission_id).map(|p| p.category)
    }

    #[must_use]
    pub fn get_id_by_name(&self, category: Category, name: &str) -> Option<&str> {
        self.names
            .get(&(category, name.to_owned()))
            .map(String::as_str)
    }

    #[must_use]
    pub fn get(&self, permission_id: &str) -> Option<&PermissionEntry> {
        self.permissions.get(permission_id)
    }

    /// Current mappings of a permission, sections first.
    #[must_use]
    pub fn mappings_of(&self, permission_id: &str) -> Vec<PermissionMapping> {
        let sections = self
            .sections_of
            .get(permission_id)
            .into_iter()
            .flatten()
            .map(|s| PermissionMapping {
                section_id: s.clone(),
                action_id: None,
            });
        let actions = self
            .actions_of
            .get(permission_id)
            .into_iter()
            .flatten()
            .map(|(s, a)| PermissionMapping {
                section_id: s.clone(),
                action_id: Some(a.clone()),
            });
        sections.chain(actions).collect()
    }
}

fn remove_from<K, V, Q, R>(map: &mut HashMap<K, BTreeSet<V>>, key: &Q, value: &R)
where
    K: Borrow<Q> + Hash + Eq,
    Q: Hash + Eq + ?Sized,
    V: Borrow<R> + Ord,
    R: Ord + ?Sized,
{
    if let Some(set) = map.get_mut(key) {
        set.remove(value);
        if set.is_empty() {
            map.remove(key);
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn mapping_is_idempotent() {
        let mut map = PermissionMap::default();
        map.add_permission("p1", "bucket.read", Category::Repository);
        assert!(map.map_action("p1", "s-bucket", "a-show"));
        assert!(map.map_action("p1", "s-bucket", "a-show"));
        assert!(map.map_section("p1", "s-cluster"));

        assert_eq!(map.get_action_permission_ids("s-bucket", "a-show"), vec!["p1"]);
        assert_eq!(map.get_section_permission_ids("s-cluster"), vec!["p1"]);
        assert_eq!(map.mappings_of("p1").len(), 2);
    }

    #[test]
    fn unknown_permission_cannot_be_mapped() {
        let mut map = PermissionMap::default();
        assert!(!map.map_section("nope", "s1"));
        assert!(map.get_section_permission_ids("s1").is_empty());
    }

    #[test]
    fn remove_permission_unlinks_all_mappings() {
        let mut map = PermissionMap::default();
        map.add_permission("p1", "bucket.read", Category::Repository);
        map.map_section("p1", "s1");
        map.map_action("p1", "s2", "a2");

        let removed = map.remove_permission("p1").unwrap();
        assert_eq!(removed.name, "bucket.read");
        assert!(map.get_section_permission_ids("s1").is_empty());
        assert!(map.get_action_permission_ids("s2", "a2").is_empty());
        assert!(map.get_id_by_name(Category::Repository, "bucket.read").is_none());
    }

    #[test]
    fn section_removal_drops_action_mappings_too() {
        let mut map = PermissionMap::default();
        map.add_permission("p1", "x", Category::Global);
        map.map_action("p1", "s1", "a1");
        map.map_section("p1", "s1");
        map.unmap_section_everywhere("s1");
        assert!(map.mappings_of("p1").is_empty());
    }

    #[test]
    fn lookup_by_category_and_name() {
        let mut map = PermissionMap::default();
        map.add_permission("sys-repo", "repository", Category::System);
        map.add_permission("p1", "repository", Category::Repository);

        assert_eq!(
            map.get_id_by_name(Category::System, "repository"),
            Some("sys-repo")
        );
        assert_eq!(map.get_category("p1"), Some(Category::Repository));
        assert_eq!(map.get_category_permission_ids(Category::System), vec!["sys-repo"]);
    }
}
