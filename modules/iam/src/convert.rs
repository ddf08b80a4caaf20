use perm_cache::CacheData;
use perm_cache::domain::grants::GrantRecord;
use perm_cache::domain::tables::{ActionEntry, SectionEntry, TeamEntry, UserEntry};
use soma_msg::proto;

pub fn section(entry: &SectionEntry) -> proto::SectionDef {
    proto::SectionDef {
        id: entry.id.clone(),
        name: entry.name.clone(),
        category: entry.category,
    }
}

pub fn action(entry: &ActionEntry) -> proto::ActionDef {
    proto::ActionDef {
        id: entry.id.clone(),
        name: entry.name.clone(),
        section_id: entry.section_id.clone(),
        category: Some(entry.category),
    }
}

pub fn permission(data: &CacheData, id: &str) -> Option<proto::Permission> {
    let entry = data.permissions().get(id)?;
    Some(proto::Permission {
        id: entry.id.clone(),
        name: entry.name.clone(),
        category: entry.category,
        mappings: data.permissions().mappings_of(id),
    })
}

pub fn grant(record: &GrantRecord) -> proto::Grant {
    proto::Grant {
        id: record.id.clone(),
        recipient_type: record.subject_kind.as_str().to_owned(),
        recipient_id: record.subject_id.clone(),
        permission_id: record.permission_id.clone(),
        category: record.category,
        object_type: None,
        object_id: record.object_id.clone(),
    }
}

pub fn team(entry: &TeamEntry) -> proto::Team {
    proto::Team {
        id: entry.id.clone(),
        name: entry.name.clone(),
        members: entry.members.iter().cloned().collect(),
    }
}

pub fn user(entry: &UserEntry) -> proto::User {
    proto::User {
        id: entry.id.clone(),
        user_name: entry.name.clone(),
        team_id: entry.team_id.clone().unwrap_or_default(),
        is_active: entry.active,
        is_deleted: false,
    }
}
