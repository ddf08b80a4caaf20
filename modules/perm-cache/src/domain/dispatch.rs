//! Two-level dispatch of cache update events onto the primitives in
//! [`super::data`].

use soma_msg::{Action, Payload, Section, SubjectKind};

use super::data::CacheData;
use super::error::CacheError;
use super::tables::ObjectKind;

/// Applies one update event. The caller holds the write lock.
///
/// # Errors
/// [`CacheError::Unhandled`] for tuples the cache does not track and
/// [`CacheError::InvalidPayload`] when the payload does not fit the tuple;
/// primitive errors are passed through.
pub fn apply(
    data: &mut CacheData,
    section: Section,
    action: Action,
    payload: &Payload,
) -> Result<(), CacheError> {
    match section {
        Section::Repository
        | Section::Bucket
        | Section::Cluster
        | Section::Group
        | Section::NodeConfig
        | Section::Node
        | Section::Monitoring => apply_tree(data, section, action, payload),
        _ => apply_identity(data, section, action, payload),
    }
}

fn apply_identity(
    data: &mut CacheData,
    section: Section,
    action: Action,
    payload: &Payload,
) -> Result<(), CacheError> {
    let unhandled = || CacheError::Unhandled { section, action };
    let mismatch = || CacheError::invalid(section, action, "payload does not match section");

    match section {
        Section::Section => match (action, payload) {
            (Action::Add, Payload::Section(s)) => data.add_section(s),
            (Action::Remove, Payload::Section(s)) => data.remove_section(&s.id),
            (Action::Add | Action::Remove, _) => return Err(mismatch()),
            _ => return Err(unhandled()),
        },

        Section::Action => match (action, payload) {
            (Action::Add, Payload::Action(a)) => data.add_action(a)?,
            (Action::Remove, Payload::Action(a)) => data.remove_action(&a.id),
            (Action::Add | Action::Remove, _) => return Err(mismatch()),
            _ => return Err(unhandled()),
        },

        Section::Category => match (action, payload) {
            // Categories are a closed set; adding one only acknowledges it.
            (Action::Add, Payload::Category(_)) => {}
            (Action::Remove, Payload::Category(c)) => data.remove_category(c.name),
            (Action::Add | Action::Remove, _) => return Err(mismatch()),
            _ => return Err(unhandled()),
        },

        Section::Permission => match (action, payload) {
            (Action::Add, Payload::Permission(p)) => {
                data.add_permission(p);
                data.map_permission(&p.id, &p.mappings)?;
            }
            (Action::Remove, Payload::Permission(p)) => data.remove_permission(&p.id),
            (Action::Map, Payload::Permission(p)) => data.map_permission(&p.id, &p.mappings)?,
            (Action::Unmap, Payload::Permission(p)) => data.unmap_permission(&p.id, &p.mappings),
            (Action::Add | Action::Remove | Action::Map | Action::Unmap, _) => {
                return Err(mismatch());
            }
            _ => return Err(unhandled()),
        },

        Section::Right => match (action, payload) {
            (Action::Grant, Payload::Grant(g)) => {
                data.grant_right(g)?;
            }
            (Action::Revoke, Payload::Grant(g)) => {
                data.revoke_right(&g.id);
            }
            (Action::Grant | Action::Revoke, _) => return Err(mismatch()),
            _ => return Err(unhandled()),
        },

        Section::Team => match (action, payload) {
            (Action::Add, Payload::Team(t)) => data.add_team(t),
            (Action::Remove, Payload::Team(t)) => data.remove_team(&t.id),
            (Action::Add | Action::Remove, _) => return Err(mismatch()),
            // Team updates have no defined cache semantics.
            _ => return Err(unhandled()),
        },

        Section::User => match (action, payload) {
            (Action::Add, Payload::User(u)) => data.add_login(SubjectKind::User, u),
            (Action::Update, Payload::User(u)) => data.update_user(u),
            (Action::Remove | Action::Purge, Payload::User(u)) => data.remove_login(&u.id),
            (Action::Add | Action::Update | Action::Remove | Action::Purge, _) => {
                return Err(mismatch());
            }
            _ => return Err(unhandled()),
        },

        Section::Admin | Section::Tool => {
            let kind = if section == Section::Admin {
                SubjectKind::Admin
            } else {
                SubjectKind::Tool
            };
            match (action, payload) {
                (Action::Add, Payload::User(u)) => data.add_login(kind, u),
                (Action::Remove, Payload::User(u)) => data.remove_login(&u.id),
                (Action::Add | Action::Remove, _) => return Err(mismatch()),
                _ => return Err(unhandled()),
            }
        }

        _ => return Err(unhandled()),
    }
    Ok(())
}

fn apply_tree(
    data: &mut CacheData,
    section: Section,
    action: Action,
    payload: &Payload,
) -> Result<(), CacheError> {
    let unhandled = || CacheError::Unhandled { section, action };
    let mismatch = || CacheError::invalid(section, action, "payload does not match section");

    match section {
        Section::Repository => match (action, payload) {
            (Action::Create, Payload::Repository(r)) => data.create_repository(r),
            (Action::Destroy, Payload::Repository(r)) => {
                data.destroy_object(&r.id);
            }
            (Action::Create | Action::Destroy, _) => return Err(mismatch()),
            _ => return Err(unhandled()),
        },

        Section::Bucket => match (action, payload) {
            (Action::Create, Payload::Bucket(b)) => data.create_bucket(b)?,
            (Action::Destroy, Payload::Bucket(b)) => {
                data.destroy_object(&b.id);
            }
            (Action::Create | Action::Destroy, _) => return Err(mismatch()),
            _ => return Err(unhandled()),
        },

        Section::Cluster => match (action, payload) {
            (Action::Create, Payload::Cluster(c)) => {
                data.create_bucket_member(&c.id, &c.name, ObjectKind::Cluster, &c.bucket_id)?;
            }
            (Action::Destroy, Payload::Cluster(c)) => {
                data.destroy_object(&c.id);
            }
            (Action::Create | Action::Destroy, _) => return Err(mismatch()),
            _ => return Err(unhandled()),
        },

        Section::Group => match (action, payload) {
            (Action::Create, Payload::Group(g)) => {
                data.create_bucket_member(&g.id, &g.name, ObjectKind::Group, &g.bucket_id)?;
            }
            (Action::Destroy, Payload::Group(g)) => {
                data.destroy_object(&g.id);
            }
            (Action::Create | Action::Destroy, _) => return Err(mismatch()),
            _ => return Err(unhandled()),
        },

        Section::NodeConfig => match (action, payload) {
            (Action::Assign, Payload::NodeConfig(c)) => data.assign_node(c)?,
            (Action::Unassign, Payload::NodeConfig(c)) => data.unassign_node(&c.node_id),
            (Action::Assign | Action::Unassign, _) => return Err(mismatch()),
            _ => return Err(unhandled()),
        },

        Section::Node => match (action, payload) {
            (Action::Add, Payload::Node(n)) => data.add_node(n),
            (Action::Remove, Payload::Node(n)) => data.remove_node(&n.id),
            (Action::Add | Action::Remove, _) => return Err(mismatch()),
            _ => return Err(unhandled()),
        },

        Section::Monitoring => match (action, payload) {
            (Action::Add, Payload::Monitoring(m)) => data.add_monitoring(m),
            (Action::Remove, Payload::Monitoring(m)) => data.remove_monitoring(&m.id),
            (Action::Add | Action::Remove, _) => return Err(mismatch()),
            _ => return Err(unhandled()),
        },

        _ => return Err(unhandled()),
    }
    Ok(())
}
