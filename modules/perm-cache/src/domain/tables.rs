//! Identifier lookup tables.
//!
//! Every table maps names to ids and back. `add` overwrites an existing
//! entry with the same id, which is also how updates are applied.

use std::collections::{BTreeSet, HashMap};

use soma_msg::{Category, SubjectKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionEntry {
    pub id: String,
    pub name: String,
    pub category: Category,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionEntry {
    pub id: String,
    pub name: String,
    pub section_id: String,
    pub category: Category,
}

/// Sections and the actions they contain.
#[derive(Debug, Default)]
pub struct SectionTable {
    sections: HashMap<String, SectionEntry>,
    section_names: HashMap<String, String>,
    actions: HashMap<String, ActionEntry>,
    action_names: HashMap<(String, String), String>,
    section_actions: HashMap<String, BTreeSet<String>>,
}

impl SectionTable {
    pub fn add_section(&mut self, entry: SectionEntry) {
        if let Some(previous) = self.sections.get(&entry.id)
            && previous.name != entry.name
        {
            self.section_names.remove(&previous.name);
        }
        self.section_names
            .insert(entry.name.clone(), entry.id.clone());
        self.section_actions.entry(entry.id.clone()).or_default();
        self.sections.insert(entry.id.clone(), entry);
    }

    /// Removes the section and every action it contains. Returns the
    /// removed actions.
    pub fn remove_section(&mut self, id: &str) -> Vec<ActionEntry> {
        let Some(section) = self.sections.remove(id) else {
            return Vec::new();
        };
        if self.section_names.get(&section.name).is_some_and(|v| v == id) {
            self.section_names.remove(&section.name);
        }
        self.section_actions
            .remove(id)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|action_id| self.unlink_action(&action_id))
            .collect()
    }

    #[must_use]
    pub fn get_section_by_name(&self, name: &str) -> Option<&SectionEntry> {
        self.section_names
            .get(name)
            .and_then(|id| self.sections.get(id))
    }

    #[must_use]
    pub fn get_section_by_id(&self, id: &str) -> Option<&SectionEntry> {
        self.sections.get(id)
    }

    /// Sections of `category`, sorted by name.
    #[must_use]
    pub fn get_category(&self, category: Category) -> Vec<&SectionEntry> {
        let mut found: Vec<_> = self
            .sections
            .values()
            .filter(|s| s.category == category)
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found
    }

    /// All sections, sorted by name.
    #[must_use]
    pub fn sections(&self) -> Vec<&SectionEntry> {
        let mut all: Vec<_> = self.sections.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Adds an action. The action inherits the category of its section;
    /// returns `false` if that section is unknown.
    pub fn add_action(&mut self, id: &str, name: &str, section_id: &str) -> bool {
        let Some(category) = self.sections.get(section_id).map(|s| s.category) else {
            return false;
        };
        self.unlink_action(id);
        self.action_names
            .insert((section_id.to_owned(), name.to_owned()), id.to_owned());
        self.section_actions
            .entry(section_id.to_owned())
            .or_default()
            .insert(id.to_owned());
        self.actions.insert(
            id.to_owned(),
            ActionEntry {
                id: id.to_owned(),
                name: name.to_owned(),
                section_id: section_id.to_owned(),
                category,
            },
        );
        true
    }

    pub fn remove_action(&mut self, id: &str) -> Option<ActionEntry> {
        let entry = self.unlink_action(id)?;
        if let Some(set) = self.section_actions.get_mut(&entry.section_id) {
            set.remove(id);
        }
        Some(entry)
    }

    #[must_use]
    pub fn get_action_by_name(&self, section_id: &str, name: &str) -> Option<&ActionEntry> {
        self.action_names
            .get(&(section_id.to_owned(), name.to_owned()))
            .and_then(|id| self.actions.get(id))
    }

    #[must_use]
    pub fn get_action_by_id(&self, id: &str) -> Option<&ActionEntry> {
        self.actions.get(id)
    }

    /// Actions of a section, sorted by name.
    #[must_use]
    pub fn get_actions_by_section_id(&self, section_id: &str) -> Vec<&ActionEntry> {
        let mut found: Vec<_> = self
            .section_actions
            .get(section_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.actions.get(id))
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found
    }

    fn unlink_action(&mut self, id: &str) -> Option<ActionEntry> {
        let entry = self.actions.remove(id)?;
        let key = (entry.section_id.clone(), entry.name.clone());
        if self.action_names.get(&key).is_some_and(|v| v == id) {
            self.action_names.remove(&key);
        }
        Some(entry)
    }
}

/// A login known to the cache: user, admin or tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEntry {
    pub id: String,
    pub name: String,
    pub kind: SubjectKind,
    /// Only users belong to a team.
    pub team_id: Option<String>,
    pub active: bool,
}

#[derive(Debug, Default)]
pub struct UserTable {
    users: HashMap<String, UserEntry>,
    names: HashMap<String, String>,
}

impl UserTable {
    pub fn add(&mut self, entry: UserEntry) {
        if let Some(previous) = self.users.get(&entry.id)
            && previous.name != entry.name
        {
            self.names.remove(&previous.name);
        }
        self.names.insert(entry.name.clone(), entry.id.clone());
        self.users.insert(entry.id.clone(), entry);
    }

    pub fn remove_by_id(&mut self, id: &str) -> Option<UserEntry> {
        let entry = self.users.remove(id)?;
        if self.names.get(&entry.name).is_some_and(|v| v == id) {
            self.names.remove(&entry.name);
        }
        Some(entry)
    }

    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&UserEntry> {
        self.names.get(name).and_then(|id| self.users.get(id))
    }

    #[must_use]
    pub fn get_by_id(&self, id: &str) -> Option<&UserEntry> {
        self.users.get(id)
    }

    /// Entries of one kind, sorted by name.
    #[must_use]
    pub fn get_kind(&self, kind: SubjectKind) -> Vec<&UserEntry> {
        let mut found: Vec<_> = self.users.values().filter(|u| u.kind == kind).collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamEntry {
    pub id: String,
    pub name: String,
    pub members: BTreeSet<String>,
}

#[derive(Debug, Default)]
pub struct TeamTable {
    teams: HashMap<String, TeamEntry>,
    names: HashMap<String, String>,
}

impl TeamTable {
    /// Adds or renames a team. Existing members are kept.
    pub fn add(&mut self, id: &str, name: &str) {
        match self.teams.get_mut(id) {
            Some(team) => {
                if team.name != name {
                    self.names.remove(&team.name);
                    name.clone_into(&mut team.name);
                }
            }
            None => {
                self.teams.insert(
                    id.to_owned(),
                    TeamEntry {
                        id: id.to_owned(),
                        name: name.to_owned(),
                        members: BTreeSet::new(),
                    },
                );
            }
        }
        self.names.insert(name.to_owned(), id.to_owned());
    }

    pub fn remove_by_id(&mut self, id: &str) -> Option<TeamEntry> {
        let entry = self.teams.remove(id)?;
        if self.names.get(&entry.name).is_some_and(|v| v == id) {
            self.names.remove(&entry.name);
        }
        Some(entry)
    }

    /// Returns `false` if the team is unknown.
    pub fn add_member(&mut self, team_id: &str, user_id: &str) -> bool {
        match self.teams.get_mut(team_id) {
            Some(team) => {
                team.members.insert(user_id.to_owned());
                true
            }
            None => false,
        }
    }

    pub fn rm_member(&mut self, team_id: &str, user_id: &str) {
        if let Some(team) = self.teams.get_mut(team_id) {
            team.members.remove(user_id);
        }
    }

    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&TeamEntry> {
        self.names.get(name).and_then(|id| self.teams.get(id))
    }

    #[must_use]
    pub fn get_by_id(&self, id: &str) -> Option<&TeamEntry> {
        self.teams.get(id)
    }

    /// All teams, sorted by name.
    #[must_use]
    pub fn teams(&self) -> Vec<&TeamEntry> {
        let mut all: Vec<_> = self.teams.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Repository,
    Bucket,
    Cluster,
    Group,
    Node,
    Monitoring,
}

impl ObjectKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Repository => "repository",
            Self::Bucket => "bucket",
            Self::Cluster => "cluster",
            Self::Group => "group",
            Self::Node => "node",
            Self::Monitoring => "monitoring",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub id: String,
    pub name: String,
    pub kind: ObjectKind,
    /// Owning team of repositories, nodes and monitoring systems.
    pub team_id: Option<String>,
}

/// Shallow object tree with its two reverse indices.
#[derive(Debug, Default)]
pub struct ObjectTable {
    objects: HashMap<String, ObjectEntry>,
    bucket_repository: HashMap<String, String>,
    repository_buckets: HashMap<String, BTreeSet<String>>,
    member_bucket: HashMap<String, String>,
    bucket_members: HashMap<String, BTreeSet<String>>,
}

impl ObjectTable {
    pub fn add_repository(&mut self, id: &str, name: &str, team_id: &str) {
        self.insert(id, name, ObjectKind::Repository, Some(team_id));
        self.repository_buckets.entry(id.to_owned()).or_default();
    }

    pub fn add_bucket(&mut self, id: &str, name: &str, repository_id: &str) {
        self.insert(id, name, ObjectKind::Bucket, None);
        self.bucket_repository
            .insert(id.to_owned(), repository_id.to_owned());
        self.repository_buckets
            .entry(repository_id.to_owned())
            .or_default()
            .insert(id.to_owned());
        self.bucket_members.entry(id.to_owned()).or_default();
    }

    /// Adds a cluster or group inside a bucket.
    pub fn add_bucket_member(&mut self, id: &str, name: &str, kind: ObjectKind, bucket_id: &str) {
        self.insert(id, name, kind, None);
        self.link_member(id, bucket_id);
    }

    pub fn add_node(&mut self, id: &str, name: &str, team_id: &str) {
        self.insert(id, name, ObjectKind::Node, Some(team_id));
    }

    pub fn add_monitoring(&mut self, id: &str, name: &str, team_id: &str) {
        self.insert(id, name, ObjectKind::Monitoring, Some(team_id));
    }

    /// Places a node into a bucket. Returns `false` if either is unknown.
    pub fn assign_node(&mut self, node_id: &str, bucket_id: &str) -> bool {
        let node_known = self
            .objects
            .get(node_id)
            .is_some_and(|o| o.kind == ObjectKind::Node);
        if !node_known || !self.bucket_repository.contains_key(bucket_id) {
            return false;
        }
        self.unlink_member(node_id);
        self.link_member(node_id, bucket_id);
        true
    }

    pub fn unassign_node(&mut self, node_id: &str) {
        self.unlink_member(node_id);
    }

    /// Removes an object and everything it contains. Returns the ids of
    /// every removed container (the object itself included).
    ///
    /// Nodes assigned to a removed bucket are unassigned, not removed.
    pub fn remove(&mut self, id: &str) -> Vec<String> {
        let Some(entry) = self.objects.remove(id) else {
            return Vec::new();
        };
        let mut removed = vec![entry.id.clone()];
        match entry.kind {
            ObjectKind::Repository => {
                for bucket in self.repository_buckets.remove(id).unwrap_or_default() {
                    removed.extend(self.remove(&bucket));
                }
            }
            ObjectKind::Bucket => {
                if let Some(repo) = self.bucket_repository.remove(id)
                    && let Some(set) = self.repository_buckets.get_mut(&repo)
                {
                    set.remove(id);
                }
                for member in self.bucket_members.remove(id).unwrap_or_default() {
                    self.member_bucket.remove(&member);
                    let is_node = self
                        .objects
                        .get(&member)
                        .is_some_and(|o| o.kind == ObjectKind::Node);
                    if !is_node {
                        removed.extend(self.remove(&member));
                    }
                }
            }
            ObjectKind::Cluster | ObjectKind::Group | ObjectKind::Node => {
                self.unlink_member(id);
            }
            ObjectKind::Monitoring => {}
        }
        removed
    }

    #[must_use]
    pub fn get_by_id(&self, id: &str) -> Option<&ObjectEntry> {
        self.objects.get(id)
    }

    #[must_use]
    pub fn get_bucket_repository(&self, bucket_id: &str) -> Option<&str> {
        self.bucket_repository.get(bucket_id).map(String::as_str)
    }

    /// Bucket a cluster, group or assigned node lives in.
    #[must_use]
    pub fn get_member_bucket(&self, id: &str) -> Option<&str> {
        self.member_bucket.get(id).map(String::as_str)
    }

    #[must_use]
    pub fn get_team(&self, id: &str) -> Option<&str> {
        self.objects.get(id).and_then(|o| o.team_id.as_deref())
    }

    fn insert(&mut self, id: &str, name: &str, kind: ObjectKind, team_id: Option<&str>) {
        self.objects.insert(
            id.to_owned(),
            ObjectEntry {
                id: id.to_owned(),
                name: name.to_owned(),
                kind,
                team_id: team_id.map(str::to_owned),
            },
        );
    }

    fn link_member(&mut self, id: &str, bucket_id: &str) {
        self.member_bucket
            .insert(id.to_owned(), bucket_id.to_owned());
        self.bucket_members
            .entry(bucket_id.to_owned())
            .or_default()
            .insert(id.to_owned());
    }

    fn unlink_member(&mut self, id: &str) {
        if let Some(bucket) = self.member_bucket.remove(id)
            && let Some(set) = self.bucket_members.get_mut(&bucket)
        {
            set.remove(id);
        }
    }
}
