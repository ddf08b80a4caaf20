//! Grant stores.
//!
//! One store per scope. The global store ignores objects; the scoped
//! stores key every grant by the object it applies to. Each store keeps a
//! reverse index from grant id to the full tuple so revocation never scans.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use soma_msg::{Category, SubjectKind};

use super::error::CacheError;

/// Object key used for grants in the global store.
const NO_OBJECT: &str = "";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Repository,
    Team,
    Monitoring,
}

impl Scope {
    pub const ALL: [Self; 4] = [Self::Global, Self::Repository, Self::Team, Self::Monitoring];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Repository => "repository",
            Self::Team => "team",
            Self::Monitoring => "monitoring",
        }
    }

    /// Store that holds grants of a permission category.
    #[must_use]
    pub const fn of_category(category: Category) -> Self {
        match category {
            Category::Repository => Self::Repository,
            Category::Team => Self::Team,
            Category::Monitoring => Self::Monitoring,
            Category::Omnipotence
            | Category::System
            | Category::Global
            | Category::Permission
            | Category::Operation => Self::Global,
        }
    }

    /// Audit key of an assessment in this scope.
    #[must_use]
    pub fn audit_key(self) -> String {
        format!("permCache/grant/{}::assessment", self.as_str())
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one store lookup, named after the branch that decided it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assessment {
    InvalidSubjectType,
    SubjectHasNoGrants,
    SubjectHasNoGrantsInCategory,
    SubjectHasNoGrantsOfPermission,
    SubjectHasNoGrantForPermissionOnObject,
    SuccessFindingGrant,
    SuccessFindingAnyGrant,
}

impl Assessment {
    #[must_use]
    pub const fn is_granted(self) -> bool {
        matches!(self, Self::SuccessFindingGrant | Self::SuccessFindingAnyGrant)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidSubjectType => "InvalidSubjectType",
            Self::SubjectHasNoGrants => "SubjectHasNoGrants",
            Self::SubjectHasNoGrantsInCategory => "SubjectHasNoGrantsInCategory",
            Self::SubjectHasNoGrantsOfPermission => "SubjectHasNoGrantsOfPermission",
            Self::SubjectHasNoGrantForPermissionOnObject => {
                "SubjectHasNoGrantForPermissionOnObject"
            }
            Self::SuccessFindingGrant => "SuccessFindingGrant",
            Self::SuccessFindingAnyGrant => "SuccessFindingAnyGrant",
        }
    }
}

/// Full tuple of a stored grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantRecord {
    pub id: String,
    pub subject_kind: SubjectKind,
    pub subject_id: String,
    pub category: Category,
    pub permission_id: String,
    pub object_id: Option<String>,
}

type SubjectKey = (SubjectKind, String);
type ObjectGrants = BTreeMap<String, String>;
type PermissionGrants = HashMap<String, ObjectGrants>;

#[derive(Debug)]
pub struct GrantStore {
    scope: Scope,
    grants: HashMap<SubjectKey, HashMap<Category, PermissionGrants>>,
    index: HashMap<String, GrantRecord>,
}

impl GrantStore {
    #[must_use]
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            grants: HashMap::new(),
            index: HashMap::new(),
        }
    }

    #[must_use]
    pub const fn scope(&self) -> Scope {
        self.scope
    }

    /// Records a grant. Re-applying the same grant is a no-op; a different
    /// grant id for an existing tuple replaces the old one.
    ///
    /// # Errors
    /// [`CacheError::UnknownSubjectKind`] for an unknown subject kind.
    pub fn grant(
        &mut self,
        subject_kind: &str,
        subject_id: &str,
        category: Category,
        object_id: Option<&str>,
        permission_id: &str,
        grant_id: &str,
    ) -> Result<(), CacheError> {
        let kind: SubjectKind = subject_kind
            .parse()
            .map_err(|_| CacheError::UnknownSubjectKind(subject_kind.to_owned()))?;
        let object_key = self.object_key(object_id).to_owned();

        // A grant id names exactly one tuple.
        if self.index.contains_key(grant_id) {
            self.revoke(grant_id);
        }

        let slot = self
            .grants
            .entry((kind, subject_id.to_owned()))
            .or_default()
            .entry(category)
            .or_default()
            .entry(permission_id.to_owned())
            .or_default();
        if let Some(previous) = slot.insert(object_key.clone(), grant_id.to_owned()) {
            self.index.remove(&previous);
        }

        self.index.insert(
            grant_id.to_owned(),
            GrantRecord {
                id: grant_id.to_owned(),
                subject_kind: kind,
                subject_id: subject_id.to_owned(),
                category,
                permission_id: permission_id.to_owned(),
                object_id: (self.scope != Scope::Global).then_some(object_key),
            },
        );
        Ok(())
    }

    /// Removes a grant. Unknown ids are ignored.
    pub fn revoke(&mut self, grant_id: &str) -> Option<GrantRecord> {
        let record = self.index.remove(grant_id)?;
        let subject = (record.subject_kind, record.subject_id.clone());
        let object_key = record.object_id.as_deref().unwrap_or(NO_OBJECT);

        if let Some(categories) = self.grants.get_mut(&subject) {
            if let Some(permissions) = categories.get_mut(&record.category) {
                if let Some(objects) = permissions.get_mut(&record.permission_id) {
                    if objects.get(object_key).is_some_and(|g| g == grant_id) {
                        objects.remove(object_key);
                    }
                    if objects.is_empty() {
                        permissions.remove(&record.permission_id);
                    }
                }
                if permissions.is_empty() {
                    categories.remove(&record.category);
                }
            }
            if categories.is_empty() {
                self.grants.remove(&subject);
            }
        }
        Some(record)
    }

    /// Checks whether the subject holds the permission. With `any` set a
    /// grant on any object is enough.
    #[must_use]
    pub fn assess(
        &self,
        subject_kind: &str,
        subject_id: &str,
        category: Category,
        object_id: Option<&str>,
        permission_id: &str,
        any: bool,
    ) -> Assessment {
        let Ok(kind) = subject_kind.parse::<SubjectKind>() else {
            return Assessment::InvalidSubjectType;
        };
        let Some(categories) = self.grants.get(&(kind, subject_id.to_owned())) else {
            return Assessment::SubjectHasNoGrants;
        };
        let Some(permissions) = categories.get(&category) else {
            return Assessment::SubjectHasNoGrantsInCategory;
        };
        let Some(objects) = permissions.get(permission_id) else {
            return Assessment::SubjectHasNoGrantsOfPermission;
        };
        if self.scope == Scope::Global {
            return Assessment::SuccessFindingGrant;
        }
        if let Some(object) = object_id
            && objects.contains_key(object)
        {
            return Assessment::SuccessFindingGrant;
        }
        if any && !objects.is_empty() {
            return Assessment::SuccessFindingAnyGrant;
        }
        Assessment::SubjectHasNoGrantForPermissionOnObject
    }

    #[must_use]
    pub fn get(&self, grant_id: &str) -> Option<&GrantRecord> {
        self.index.get(grant_id)
    }

    #[must_use]
    pub fn get_permission_grant_ids(&self, permission_id: &str) -> Vec<String> {
        self.collect_ids(|r| r.permission_id == permission_id)
    }

    #[must_use]
    pub fn get_subject_grant_ids(&self, kind: SubjectKind, subject_id: &str) -> Vec<String> {
        self.collect_ids(|r| r.subject_kind == kind && r.subject_id == subject_id)
    }

    /// Always empty for the global store.
    #[must_use]
    pub fn get_object_grant_ids(&self, object_id: &str) -> Vec<String> {
        self.collect_ids(|r| r.object_id.as_deref() == Some(object_id))
    }

    /// Grants of a permission, sorted by id.
    #[must_use]
    pub fn records_for_permission(&self, permission_id: &str) -> Vec<&GrantRecord> {
        let mut found: Vec<_> = self
            .index
            .values()
            .filter(|r| r.permission_id == permission_id)
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        found
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn object_key<'a>(&self, object_id: Option<&'a str>) -> &'a str {
        match self.scope {
            Scope::Global => NO_OBJECT,
            _ => object_id.unwrap_or(NO_OBJECT),
        }
    }

    fn collect_ids(&self, predicate: impl Fn(&GrantRecord) -> bool) -> Vec<String> {
        let mut ids: Vec<String> = self
            .index
            .values()
            .filter(|r| predicate(r))
            .map(|r| r.id.clone())
            .collect();
        ids.sort();
        ids
    }
}

/// The four stores together.
#[derive(Debug)]
pub struct GrantStores {
    global: GrantStore,
    repository: GrantStore,
    team: GrantStore,
    monitoring: GrantStore,
}

impl Default for GrantStores {
    fn default() -> Self {
        Self {
            global: GrantStore::new(Scope::Global),
            repository: GrantStore::new(Scope::Repository),
            team: GrantStore::new(Scope::Team),
            monitoring: GrantStore::new(Scope::Monitoring),
        }
    }
}

impl GrantStores {
    #[must_use]
    pub const fn store(&self, scope: Scope) -> &GrantStore {
        match scope {
            Scope::Global => &self.global,
            Scope::Repository => &self.repository,
            Scope::Team => &self.team,
            Scope::Monitoring => &self.monitoring,
        }
    }

    pub fn store_mut(&mut self, scope: Scope) -> &mut GrantStore {
        match scope {
            Scope::Global => &mut self.global,
            Scope::Repository => &mut self.repository,
            Scope::Team => &mut self.team,
            Scope::Monitoring => &mut self.monitoring,
        }
    }

    /// Revokes a grant from whichever store holds it.
    pub fn revoke(&mut self, grant_id: &str) -> Option<GrantRecord> {
        Scope::ALL
            .into_iter()
            .find_map(|scope| self.store_mut(scope).revoke(grant_id))
    }

    /// Looks a grant up in every store.
    #[must_use]
    pub fn find(&self, grant_id: &str) -> Option<(Scope, &GrantRecord)> {
        Scope::ALL
            .into_iter()
            .find_map(|scope| self.store(scope).get(grant_id).map(|r| (scope, r)))
    }

    /// Revokes every grant naming the subject, in every store.
    pub fn revoke_subject(&mut self, kind: SubjectKind, subject_id: &str) -> usize {
        let mut revoked = 0;
        for scope in Scope::ALL {
            let store = self.store_mut(scope);
            for id in store.get_subject_grant_ids(kind, subject_id) {
                store.revoke(&id);
                revoked += 1;
            }
        }
        revoked
    }

    /// Revokes every grant of the permission, in every store.
    pub fn revoke_permission(&mut self, permission_id: &str) -> usize {
        let mut revoked = 0;
        for scope in Scope::ALL {
            let store = self.store_mut(scope);
            for id in store.get_permission_grant_ids(permission_id) {
                store.revoke(&id);
                revoked += 1;
            }
        }
        revoked
    }

    /// Revokes every grant bound to the object in one scoped store.
    pub fn revoke_object(&mut self, scope: Scope, object_id: &str) -> usize {
        let store = self.store_mut(scope);
        let ids = store.get_object_grant_ids(object_id);
        for id in &ids {
            store.revoke(id);
        }
        ids.len()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn repo_store_with_bucket_grant() -> GrantStore {
        let mut store = GrantStore::new(Scope::Repository);
        store
            .grant("user", "u2", Category::Repository, Some("b1"), "p-read", "g1")
            .unwrap();
        store
    }

    #[test]
    fn grant_is_idempotent_and_revoke_restores() {
        let mut store = repo_store_with_bucket_grant();
        let before = store.get("g1").cloned();
        store
            .grant("user", "u2", Category::Repository, Some("b1"), "p-read", "g1")
            .unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("g1").cloned(), before);

        store.revoke("g1");
        assert!(store.is_empty());
        assert!(store.grants.is_empty());
        assert!(store.revoke("g1").is_none());
    }

    #[test]
    fn unknown_subject_kind_is_rejected() {
        let mut store = GrantStore::new(Scope::Global);
        let err = store
            .grant("robot", "x", Category::Global, None, "p", "g")
            .unwrap_err();
        assert_eq!(err, CacheError::UnknownSubjectKind("robot".to_owned()));
        assert_eq!(
            store.assess("robot", "x", Category::Global, None, "p", false),
            Assessment::InvalidSubjectType
        );
    }

    #[test]
    fn assessment_names_the_deciding_branch() {
        let store = repo_store_with_bucket_grant();
        let assess = |subject: &str, category, object, perm: &str, any| {
            store.assess("user", subject, category, object, perm, any)
        };

        assert_eq!(
            assess("u9", Category::Repository, Some("b1"), "p-read", false),
            Assessment::SubjectHasNoGrants
        );
        assert_eq!(
            assess("u2", Category::Team, Some("b1"), "p-read", false),
            Assessment::SubjectHasNoGrantsInCategory
        );
        assert_eq!(
            assess("u2", Category::Repository, Some("b1"), "p-write", false),
            Assessment::SubjectHasNoGrantsOfPermission
        );
        assert_eq!(
            assess("u2", Category::Repository, Some("b2"), "p-read", false),
            Assessment::SubjectHasNoGrantForPermissionOnObject
        );
        assert_eq!(
            assess("u2", Category::Repository, Some("b1"), "p-read", false),
            Assessment::SuccessFindingGrant
        );
        assert_eq!(
            assess("u2", Category::Repository, Some("b2"), "p-read", true),
            Assessment::SuccessFindingAnyGrant
        );
    }

    #[test]
    fn any_never_turns_success_into_failure() {
        let store = repo_store_with_bucket_grant();
        for object in [Some("b1"), Some("b2"), None] {
            let strict = store.assess("user", "u2", Category::Repository, object, "p-read", false);
            let loose = store.assess("user", "u2", Category::Repository, object, "p-read", true);
            if strict.is_granted() {
                assert!(loose.is_granted());
            }
        }
    }

    #[test]
    fn global_store_ignores_objects() {
        let mut store = GrantStore::new(Scope::Global);
        store
            .grant("admin", "a1", Category::System, Some("ignored"), "sys-repo", "g1")
            .unwrap();
        assert_eq!(
            store.assess("admin", "a1", Category::System, None, "sys-repo", false),
            Assessment::SuccessFindingGrant
        );
        assert!(store.get("g1").unwrap().object_id.is_none());
        assert!(store.get_object_grant_ids("ignored").is_empty());
    }

    #[test]
    fn new_grant_id_for_same_tuple_replaces_old_one() {
        let mut store = repo_store_with_bucket_grant();
        store
            .grant("user", "u2", Category::Repository, Some("b1"), "p-read", "g2")
            .unwrap();
        assert!(store.get("g1").is_none());
        assert_eq!(store.len(), 1);
        store.revoke("g2");
        assert_eq!(
            store.assess("user", "u2", Category::Repository, Some("b1"), "p-read", false),
            Assessment::SubjectHasNoGrants
        );
    }

    #[test]
    fn stores_cascade_by_subject_permission_and_object() {
        let mut stores = GrantStores::default();
        stores
            .store_mut(Scope::Global)
            .grant("team", "t2", Category::Global, None, "p1", "g1")
            .unwrap();
        stores
            .store_mut(Scope::Repository)
            .grant("team", "t2", Category::Repository, Some("r3"), "p2", "g2")
            .unwrap();
        stores
            .store_mut(Scope::Repository)
            .grant("user", "u1", Category::Repository, Some("r3"), "p2", "g3")
            .unwrap();

        assert_eq!(stores.revoke_subject(SubjectKind::Team, "t2"), 2);
        assert!(stores.find("g1").is_none());
        assert_eq!(stores.find("g3").map(|(s, _)| s), Some(Scope::Repository));

        assert_eq!(stores.revoke_object(Scope::Repository, "r3"), 1);
        assert!(stores.find("g3").is_none());
        assert_eq!(stores.revoke_permission("p2"), 0);
    }
}
