//! Cache contents and the mutation primitives that operate on them.
//!
//! Every `&mut self` method here runs while the caller holds the write lock;
//! the only way to obtain `&mut CacheData` is through
//! [`crate::PermCache::transaction`] or [`crate::PermCache::perform`].
//! The primitives therefore never lock and compose freely.

use soma_msg::proto;
use soma_msg::{Category, SubjectKind};

use super::error::CacheError;
use super::grants::{GrantRecord, GrantStores, Scope};
use super::permission_map::PermissionMap;
use super::tables::{
    ObjectKind, ObjectTable, SectionEntry, SectionTable, TeamTable, UserEntry, UserTable,
};

#[derive(Debug, Default)]
pub struct CacheData {
    sections: SectionTable,
    users: UserTable,
    teams: TeamTable,
    objects: ObjectTable,
    permissions: PermissionMap,
    grants: GrantStores,
}

impl CacheData {
    #[must_use]
    pub const fn sections(&self) -> &SectionTable {
        &self.sections
    }

    #[must_use]
    pub const fn users(&self) -> &UserTable {
        &self.users
    }

    #[must_use]
    pub const fn teams(&self) -> &TeamTable {
        &self.teams
    }

    #[must_use]
    pub const fn objects(&self) -> &ObjectTable {
        &self.objects
    }

    #[must_use]
    pub const fn permissions(&self) -> &PermissionMap {
        &self.permissions
    }

    #[must_use]
    pub const fn grants(&self) -> &GrantStores {
        &self.grants
    }

    // Sections and actions

    pub fn add_section(&mut self, section: &proto::SectionDef) {
        self.sections.add_section(SectionEntry {
            id: section.id.clone(),
            name: section.name.clone(),
            category: section.category,
        });
    }

    /// Removes a section with its actions and every mapping onto either.
    pub fn remove_section(&mut self, section_id: &str) {
        for action in self.sections.remove_section(section_id) {
            self.permissions
                .unmap_action_everywhere(section_id, &action.id);
        }
        self.permissions.unmap_section_everywhere(section_id);
    }

    /// # Errors
    /// [`CacheError::NotFound`] if the parent section is unknown.
    pub fn add_action(&mut self, action: &proto::ActionDef) -> Result<(), CacheError> {
        if self
            .sections
            .add_action(&action.id, &action.name, &action.section_id)
        {
            Ok(())
        } else {
            Err(CacheError::not_found("section", &action.section_id))
        }
    }

    pub fn remove_action(&mut self, action_id: &str) {
        if let Some(action) = self.sections.remove_action(action_id) {
            self.permissions
                .unmap_action_everywhere(&action.section_id, action_id);
        }
    }

    /// Removes every permission of the category and then every section.
    pub fn remove_category(&mut self, category: Category) {
        for permission_id in self.permissions.get_category_permission_ids(category) {
            self.remove_permission(&permission_id);
        }
        let section_ids: Vec<String> = self
            .sections
            .get_category(category)
            .into_iter()
            .map(|s| s.id.clone())
            .collect();
        for section_id in section_ids {
            self.remove_section(&section_id);
        }
    }

    // Permissions

    pub fn add_permission(&mut self, permission: &proto::Permission) {
        self.permissions
            .add_permission(&permission.id, &permission.name, permission.category);
    }

    /// Removes the permission, its mappings and every grant of it.
    pub fn remove_permission(&mut self, permission_id: &str) {
        self.grants.revoke_permission(permission_id);
        self.permissions.remove_permission(permission_id);
    }

    /// # Errors
    /// [`CacheError::NotFound`] if the permission, a section or an action is unknown.
    pub fn map_permission(
        &mut self,
        permission_id: &str,
        mappings: &[proto::PermissionMapping],
    ) -> Result<(), CacheError> {
        if self.permissions.get(permission_id).is_none() {
            return Err(CacheError::not_found("permission", permission_id));
        }
        for mapping in mappings {
            self.check_mapping(mapping)?;
        }
        for mapping in mappings {
            match &mapping.action_id {
                Some(action_id) => {
                    self.permissions
                        .map_action(permission_id, &mapping.section_id, action_id);
                }
                None => {
                    self.permissions
                        .map_section(permission_id, &mapping.section_id);
                }
            }
        }
        Ok(())
    }

    pub fn unmap_permission(&mut self, permission_id: &str, mappings: &[proto::PermissionMapping]) {
        for mapping in mappings {
            match &mapping.action_id {
                Some(action_id) => {
                    self.permissions
                        .unmap_action(permission_id, &mapping.section_id, action_id);
                }
                None => self
                    .permissions
                    .unmap_section(permission_id, &mapping.section_id),
            }
        }
    }

    fn check_mapping(&self, mapping: &proto::PermissionMapping) -> Result<(), CacheError> {
        if self.sections.get_section_by_id(&mapping.section_id).is_none() {
            return Err(CacheError::not_found("section", &mapping.section_id));
        }
        if let Some(action_id) = &mapping.action_id {
            let belongs = self
                .sections
                .get_action_by_id(action_id)
                .is_some_and(|a| a.section_id == mapping.section_id);
            if !belongs {
                return Err(CacheError::not_found("action", action_id));
            }
        }
        Ok(())
    }

    // Rights

    /// Records a grant in the store selected by its category.
    ///
    /// # Errors
    /// [`CacheError::UnknownSubjectKind`] for an unknown recipient type and
    /// [`CacheError::InvalidPayload`] for a scoped grant without object.
    pub fn grant_right(&mut self, grant: &proto::Grant) -> Result<Scope, CacheError> {
        let scope = Scope::of_category(grant.category);
        let object = grant.object_id.as_deref().filter(|o| !o.is_empty());
        if scope != Scope::Global && object.is_none() {
            return Err(CacheError::invalid(
                soma_msg::Section::Right,
                soma_msg::Action::Grant,
                format!("{scope} grants require an object id"),
            ));
        }
        self.grants.store_mut(scope).grant(
            &grant.recipient_type,
            &grant.recipient_id,
            grant.category,
            object,
            &grant.permission_id,
            &grant.id,
        )?;
        Ok(scope)
    }

    pub fn revoke_right(&mut self, grant_id: &str) -> Option<GrantRecord> {
        self.grants.revoke(grant_id)
    }

    // Teams and logins

    pub fn add_team(&mut self, team: &proto::Team) {
        self.teams.add(&team.id, &team.name);
        for member in &team.members {
            self.teams.add_member(&team.id, member);
        }
    }

    /// Removes the team and revokes every grant it holds.
    pub fn remove_team(&mut self, team_id: &str) {
        self.grants.revoke_subject(SubjectKind::Team, team_id);
        self.teams.remove_by_id(team_id);
    }

    /// Adds a user, admin or tool. Users join their team.
    pub fn add_login(&mut self, kind: SubjectKind, user: &proto::User) {
        let team_id = (kind == SubjectKind::User && !user.team_id.is_empty())
            .then(|| user.team_id.clone());
        if let Some(team) = &team_id {
            self.teams.add_member(team, &user.id);
        }
        self.users.add(UserEntry {
            id: user.id.clone(),
            name: user.user_name.clone(),
            kind,
            team_id,
            active: user.is_active,
        });
    }

    /// Applies a user update: team changes move membership, a deleted
    /// flag turns the update into a removal.
    pub fn update_user(&mut self, user: &proto::User) {
        if user.is_deleted {
            self.remove_login(&user.id);
            return;
        }
        let previous_team = self
            .users
            .get_by_id(&user.id)
            .and_then(|u| u.team_id.clone());
        if let Some(previous) = previous_team
            && previous != user.team_id
        {
            self.teams.rm_member(&previous, &user.id);
        }
        self.add_login(SubjectKind::User, user);
    }

    /// Removes a login, its team membership and every grant naming it.
    pub fn remove_login(&mut self, user_id: &str) {
        let Some(entry) = self.users.remove_by_id(user_id) else {
            return;
        };
        if let Some(team) = &entry.team_id {
            self.teams.rm_member(team, user_id);
        }
        self.grants.revoke_subject(entry.kind, user_id);
    }

    // Object tree

    pub fn create_repository(&mut self, repository: &proto::Repository) {
        self.objects
            .add_repository(&repository.id, &repository.name, &repository.team_id);
    }

    /// # Errors
    /// [`CacheError::NotFound`] if the parent repository is unknown.
    pub fn create_bucket(&mut self, bucket: &proto::Bucket) -> Result<(), CacheError> {
        self.require(&bucket.repository_id, ObjectKind::Repository)?;
        self.objects
            .add_bucket(&bucket.id, &bucket.name, &bucket.repository_id);
        Ok(())
    }

    /// Adds a cluster or group.
    ///
    /// # Errors
    /// [`CacheError::NotFound`] if the parent bucket is unknown.
    pub fn create_bucket_member(
        &mut self,
        id: &str,
        name: &str,
        kind: ObjectKind,
        bucket_id: &str,
    ) -> Result<(), CacheError> {
        self.require(bucket_id, ObjectKind::Bucket)?;
        self.objects.add_bucket_member(id, name, kind, bucket_id);
        Ok(())
    }

    /// Removes a container and everything below it, revoking every
    /// repository-scoped grant bound to a removed container.
    pub fn destroy_object(&mut self, object_id: &str) -> Vec<String> {
        let removed = self.objects.remove(object_id);
        for id in &removed {
            self.grants.revoke_object(Scope::Repository, id);
        }
        removed
    }

    pub fn add_node(&mut self, node: &proto::Node) {
        self.objects.add_node(&node.id, &node.name, &node.team_id);
        if let Some(bucket) = &node.bucket_id {
            self.objects.assign_node(&node.id, bucket);
        }
    }

    pub fn remove_node(&mut self, node_id: &str) {
        self.objects.remove(node_id);
    }

    /// # Errors
    /// [`CacheError::NotFound`] if the node or bucket is unknown.
    pub fn assign_node(&mut self, config: &proto::NodeConfig) -> Result<(), CacheError> {
        self.require(&config.node_id, ObjectKind::Node)?;
        self.require(&config.bucket_id, ObjectKind::Bucket)?;
        self.objects.assign_node(&config.node_id, &config.bucket_id);
        Ok(())
    }

    pub fn unassign_node(&mut self, node_id: &str) {
        self.objects.unassign_node(node_id);
    }

    pub fn add_monitoring(&mut self, monitoring: &proto::Monitoring) {
        self.objects
            .add_monitoring(&monitoring.id, &monitoring.name, &monitoring.team_id);
    }

    /// Removes a monitoring system and revokes grants bound to it.
    pub fn remove_monitoring(&mut self, monitoring_id: &str) {
        self.objects.remove(monitoring_id);
        self.grants.revoke_object(Scope::Monitoring, monitoring_id);
    }

    fn require(&self, id: &str, kind: ObjectKind) -> Result<(), CacheError> {
        match self.objects.get_by_id(id) {
            Some(entry) if entry.kind == kind => Ok(()),
            _ => Err(CacheError::not_found(kind.as_str(), id)),
        }
    }
}
