//! Built-in vocabulary and the start-up replay stream.
//!
//! Sections, actions and the per-category system permissions are fixed;
//! their ids are name-based UUIDs so they stay stable across restarts.

use soma_msg::proto;
use soma_msg::{Action, Category, Payload, Request, Section};
use uuid::Uuid;

use crate::domain::evaluator::OMNIPOTENCE_ID;

/// Sections with their category and the actions they support.
pub const SECTIONS: &[(Section, Category, &[Action])] = &[
    (
        Section::System,
        Category::Operation,
        &[
            Action::StopRepository,
            Action::RebuildRepository,
            Action::RestartRepository,
        ],
    ),
    (
        Section::Category,
        Category::Permission,
        &[Action::List, Action::Show, Action::Add, Action::Remove],
    ),
    (
        Section::Section,
        Category::Permission,
        &[
            Action::List,
            Action::Show,
            Action::Search,
            Action::Add,
            Action::Remove,
        ],
    ),
    (
        Section::Action,
        Category::Permission,
        &[
            Action::List,
            Action::Show,
            Action::Search,
            Action::Add,
            Action::Remove,
        ],
    ),
    (
        Section::Permission,
        Category::Permission,
        &[
            Action::List,
            Action::Show,
            Action::Search,
            Action::Add,
            Action::Remove,
            Action::Map,
            Action::Unmap,
        ],
    ),
    (
        Section::Right,
        Category::Permission,
        &[Action::List, Action::Show, Action::Grant, Action::Revoke],
    ),
    (
        Section::Admin,
        Category::Permission,
        &[Action::List, Action::Show, Action::Add, Action::Remove],
    ),
    (
        Section::Tool,
        Category::Permission,
        &[Action::List, Action::Show, Action::Add, Action::Remove],
    ),
    (
        Section::Team,
        Category::Global,
        &[
            Action::List,
            Action::Show,
            Action::Search,
            Action::Add,
            Action::Remove,
            Action::Update,
        ],
    ),
    (
        Section::User,
        Category::Global,
        &[
            Action::List,
            Action::Show,
            Action::Search,
            Action::Add,
            Action::Remove,
            Action::Purge,
            Action::Update,
        ],
    ),
    (
        Section::Repository,
        Category::Repository,
        &[
            Action::List,
            Action::Show,
            Action::Search,
            Action::Create,
            Action::Destroy,
            Action::Tree,
        ],
    ),
    (
        Section::Bucket,
        Category::Repository,
        &[Action::List, Action::Show, Action::Create, Action::Destroy],
    ),
    (
        Section::Cluster,
        Category::Repository,
        &[Action::List, Action::Show, Action::Create, Action::Destroy],
    ),
    (
        Section::Group,
        Category::Repository,
        &[Action::List, Action::Show, Action::Create, Action::Destroy],
    ),
    (
        Section::NodeConfig,
        Category::Repository,
        &[Action::Assign, Action::Unassign],
    ),
    (
        Section::RepositoryConfig,
        Category::Repository,
        &[Action::List, Action::Show],
    ),
    (
        Section::CheckConfig,
        Category::Repository,
        &[Action::List, Action::Show],
    ),
    (
        Section::Instance,
        Category::Repository,
        &[Action::List, Action::Show],
    ),
    (
        Section::PropertyCustom,
        Category::Repository,
        &[Action::List, Action::Show],
    ),
    (
        Section::TeamRepository,
        Category::Team,
        &[Action::List, Action::Show],
    ),
    (
        Section::Node,
        Category::Team,
        &[
            Action::List,
            Action::Show,
            Action::Search,
            Action::Add,
            Action::Remove,
            Action::Assign,
            Action::Unassign,
        ],
    ),
    (
        Section::PropertyService,
        Category::Team,
        &[Action::List, Action::Show],
    ),
    (
        Section::Monitoring,
        Category::Monitoring,
        &[
            Action::List,
            Action::Show,
            Action::Search,
            Action::Add,
            Action::Remove,
        ],
    ),
    (
        Section::Capability,
        Category::Monitoring,
        &[Action::List, Action::Show],
    ),
    (
        Section::Deployment,
        Category::Monitoring,
        &[Action::List, Action::Show],
    ),
];

fn stable_id(kind: &str, name: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, format!("soma:{kind}:{name}").as_bytes()).to_string()
}

#[must_use]
pub fn section_id(section: Section) -> String {
    stable_id("section", section.as_str())
}

#[must_use]
pub fn action_id(section: Section, action: Action) -> String {
    stable_id("action", &format!("{section}::{action}"))
}

/// Id of the system permission of `category`.
#[must_use]
pub fn system_permission_id(category: Category) -> String {
    stable_id("system-permission", category.as_str())
}

/// Initial owner of the installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootAccount {
    pub user_id: String,
    pub user_name: String,
    pub team_id: String,
    pub team_name: String,
}

/// Update events describing the fixed vocabulary: every section with its
/// actions, one system permission per category and omnipotence.
#[must_use]
pub fn vocabulary() -> Vec<Request> {
    let mut events = Vec::new();
    for (section, category, actions) in SECTIONS {
        let sid = section_id(*section);
        events.push(Request::cache_update(
            Section::Section,
            Action::Add,
            Payload::Section(proto::SectionDef {
                id: sid.clone(),
                name: section.as_str().to_owned(),
                category: *category,
            }),
        ));
        for action in *actions {
            events.push(Request::cache_update(
                Section::Action,
                Action::Add,
                Payload::Action(proto::ActionDef {
                    id: action_id(*section, *action),
                    name: action.as_str().to_owned(),
                    section_id: sid.clone(),
                    category: Some(*category),
                }),
            ));
        }
    }

    for category in Category::ALL {
        events.push(Request::cache_update(
            Section::Permission,
            Action::Add,
            Payload::Permission(proto::Permission {
                id: system_permission_id(*category),
                name: category.as_str().to_owned(),
                category: Category::System,
                mappings: Vec::new(),
            }),
        ));
    }
    events.push(Request::cache_update(
        Section::Permission,
        Action::Add,
        Payload::Permission(proto::Permission {
            id: OMNIPOTENCE_ID.to_owned(),
            name: Category::Omnipotence.as_str().to_owned(),
            category: Category::Omnipotence,
            mappings: Vec::new(),
        }),
    ));
    events
}

/// Update events creating the root team, the root user and its
/// omnipotence grant.
#[must_use]
pub fn root_account(root: &RootAccount) -> Vec<Request> {
    vec![
        Request::cache_update(
            Section::Team,
            Action::Add,
            Payload::Team(proto::Team {
                id: root.team_id.clone(),
                name: root.team_name.clone(),
                members: Vec::new(),
            }),
        ),
        Request::cache_update(
            Section::User,
            Action::Add,
            Payload::User(proto::User {
                id: root.user_id.clone(),
                user_name: root.user_name.clone(),
                team_id: root.team_id.clone(),
                is_active: true,
                is_deleted: false,
            }),
        ),
        Request::cache_update(
            Section::Right,
            Action::Grant,
            Payload::Grant(proto::Grant {
                id: stable_id("grant", &format!("omnipotence:{}", root.user_id)),
                recipient_type: "user".to_owned(),
                recipient_id: root.user_id.clone(),
                permission_id: OMNIPOTENCE_ID.to_owned(),
                category: Category::Omnipotence,
                object_type: None,
                object_id: None,
            }),
        ),
    ]
}

/// Full start-up replay stream.
#[must_use]
pub fn bootstrap(root: &RootAccount) -> Vec<Request> {
    let mut events = vocabulary();
    events.extend(root_account(root));
    events
}
