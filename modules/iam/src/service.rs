//! Request handling for the iam sections.

use std::sync::Arc;

use perm_cache::{CacheData, PermCache, Scope};
use soma_msg::{Action, Body, Category, Payload, Request, Section, SubjectKind, proto};
use tracing::info;
use uuid::Uuid;

use crate::convert;
use crate::error::IamError;

type Outcome = Result<Option<Body>, IamError>;

/// Categories whose permissions are part of the built-in vocabulary.
const RESERVED: [Category; 2] = [Category::System, Category::Omnipotence];

fn fresh_id(id: &str) -> String {
    if id.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        id.to_owned()
    }
}

fn require_name(kind: &str, name: &str) -> Result<(), IamError> {
    if name.trim().is_empty() {
        return Err(IamError::Invalid(format!("{kind} name must not be empty")));
    }
    Ok(())
}

pub struct IamService {
    cache: Arc<PermCache>,
}

impl IamService {
    #[must_use]
    pub const fn new(cache: Arc<PermCache>) -> Self {
        Self { cache }
    }

    /// Serves one iam request.
    ///
    /// # Errors
    /// Returns the [`IamError`] describing why the request was refused.
    pub fn handle(&self, request: &Request) -> Outcome {
        let (section, action, payload) = (request.section, request.action, &request.payload);
        match section {
            Section::Category => self.category(action, payload),
            Section::Section => self.section(action, payload),
            Section::Action => self.action(action, payload),
            Section::Permission => self.permission(action, payload),
            Section::Right => self.right(action, payload),
            Section::Team => self.team(action, payload),
            Section::User => self.user(action, payload),
            Section::Admin | Section::Tool => self.login(section, action, payload),
            _ => Err(IamError::Unhandled { section, action }),
        }
    }

    fn write(&self, section: Section, action: Action, payload: &Payload) -> Result<(), IamError> {
        self.cache.apply(section, action, payload)?;
        info!(%section, %action, "identity change applied");
        Ok(())
    }

    fn read<R>(&self, f: impl FnOnce(&CacheData) -> R) -> R {
        self.cache.read(f)
    }

    fn category(&self, action: Action, payload: &Payload) -> Outcome {
        match (action, payload) {
            (Action::List, _) => Ok(Some(Body::Categories(
                Category::ALL
                    .iter()
                    .map(|name| proto::CategoryDef { name: *name })
                    .collect(),
            ))),
            (Action::Show | Action::Add, Payload::Category(c)) => {
                if action == Action::Add {
                    self.write(Section::Category, action, payload)?;
                }
                Ok(Some(Body::Categories(vec![c.clone()])))
            }
            (Action::Remove, Payload::Category(c)) => {
                if RESERVED.contains(&c.name) {
                    return Err(IamError::Invalid(format!(
                        "category {} is built in",
                        c.name
                    )));
                }
                self.write(Section::Category, action, payload)?;
                Ok(None)
            }
            _ => Err(mismatch(Section::Category, action)),
        }
    }

    fn section(&self, action: Action, payload: &Payload) -> Outcome {
        let wrap = |v: Vec<proto::SectionDef>| Ok(Some(Body::Sections(v)));
        match (action, payload) {
            (Action::List, _) => wrap(self.read(|d| {
                d.sections().sections().into_iter().map(convert::section).collect()
            })),
            (Action::Search, Payload::Filter(f)) => wrap(self.read(|d| {
                d.sections()
                    .sections()
                    .into_iter()
                    .filter(|s| f.matches(&s.name, None))
                    .map(convert::section)
                    .collect()
            })),
            (Action::Show, Payload::Section(s)) => wrap(vec![self.find_section(s)?]),
            (Action::Add, Payload::Section(s)) => {
                require_name("section", &s.name)?;
                if self.read(|d| d.sections().get_section_by_name(&s.name).is_some()) {
                    return Err(IamError::Conflict(format!("section {} already exists", s.name)));
                }
                let created = proto::SectionDef {
                    id: fresh_id(&s.id),
                    ..s.clone()
                };
                self.write(Section::Section, action, &Payload::Section(created.clone()))?;
                wrap(vec![created])
            }
            (Action::Remove, Payload::Section(s)) => {
                let found = self.find_section(s)?;
                self.write(Section::Section, action, &Payload::Section(found))?;
                Ok(None)
            }
            _ => Err(mismatch(Section::Section, action)),
        }
    }

    fn find_section(&self, s: &proto::SectionDef) -> Result<proto::SectionDef, IamError> {
        self.read(|d| {
            let table = d.sections();
            let found = if s.id.is_empty() {
                table.get_section_by_name(&s.name)
            } else {
                table.get_section_by_id(&s.id)
            };
            found.map(convert::section)
        })
        .ok_or_else(|| IamError::not_found("section", if s.id.is_empty() { &s.name } else { &s.id }))
    }

    fn action(&self, action: Action, payload: &Payload) -> Outcome {
        let wrap = |v: Vec<proto::ActionDef>| Ok(Some(Body::Actions(v)));
        let Payload::Action(a) = payload else {
            return Err(mismatch(Section::Action, action));
        };
        let section = self
            .read(|d| d.sections().get_section_by_id(&a.section_id).map(convert::section))
            .ok_or_else(|| IamError::not_found("section", &a.section_id))?;

        match action {
            Action::List | Action::Search => wrap(self.read(|d| {
                d.sections()
                    .get_actions_by_section_id(&section.id)
                    .into_iter()
                    .filter(|e| action == Action::List || a.name.is_empty() || e.name == a.name)
                    .map(convert::action)
                    .collect()
            })),
            Action::Show => wrap(vec![self.find_action(a)?]),
            Action::Add => {
                require_name("action", &a.name)?;
                if self.read(|d| d.sections().get_action_by_name(&section.id, &a.name).is_some()) {
                    return Err(IamError::Conflict(format!(
                        "action {} already exists in section {}",
                        a.name, section.name
                    )));
                }
                let created = proto::ActionDef {
                    id: fresh_id(&a.id),
                    category: Some(section.category),
                    ..a.clone()
                };
                self.write(Section::Action, action, &Payload::Action(created.clone()))?;
                wrap(vec![created])
            }
            Action::Remove => {
                let found = self.find_action(a)?;
                self.write(Section::Action, action, &Payload::Action(found))?;
                Ok(None)
            }
            _ => Err(IamError::Unhandled {
                section: Section::Action,
                action,
            }),
        }
    }

    fn find_action(&self, a: &proto::ActionDef) -> Result<proto::ActionDef, IamError> {
        self.read(|d| {
            let table = d.sections();
            let found = if a.id.is_empty() {
                table.get_action_by_name(&a.section_id, &a.name)
            } else {
                table.get_action_by_id(&a.id)
            };
            found
                .filter(|e| e.section_id == a.section_id)
                .map(convert::action)
        })
        .ok_or_else(|| IamError::not_found("action", if a.id.is_empty() { &a.name } else { &a.id }))
    }

    fn permission(&self, action: Action, payload: &Payload) -> Outcome {
        let wrap = |v: Vec<proto::Permission>| Ok(Some(Body::Permissions(v)));
        let Payload::Permission(p) = payload else {
            return Err(mismatch(Section::Permission, action));
        };
        match action {
            Action::List | Action::Search => wrap(self.read(|d| {
                d.permissions()
                    .get_category_permission_ids(p.category)
                    .iter()
                    .filter_map(|id| convert::permission(d, id))
                    .filter(|found| action == Action::List || p.name.is_empty() || found.name == p.name)
                    .collect()
            })),
            Action::Show => wrap(vec![self.find_permission(p)?]),
            Action::Add => {
                require_name("permission", &p.name)?;
                if RESERVED.contains(&p.category) {
                    return Err(IamError::Invalid(format!(
                        "permissions of category {} are built in",
                        p.category
                    )));
                }
                if self.read(|d| d.permissions().get_id_by_name(p.category, &p.name).is_some()) {
                    return Err(IamError::Conflict(format!(
                        "permission {} already exists in category {}",
                        p.name, p.category
                    )));
                }
                let created = proto::Permission {
                    id: fresh_id(&p.id),
                    ..p.clone()
                };
                self.write(Section::Permission, action, &Payload::Permission(created.clone()))?;
                wrap(vec![created])
            }
            Action::Remove => {
                let found = self.find_permission(p)?;
                if RESERVED.contains(&found.category) {
                    return Err(IamError::Invalid(format!("permission {} is built in", found.name)));
                }
                self.write(Section::Permission, action, &Payload::Permission(found))?;
                Ok(None)
            }
            Action::Map | Action::Unmap => {
                let found = self.find_permission(p)?;
                let change = proto::Permission {
                    mappings: p.mappings.clone(),
                    ..found
                };
                self.write(Section::Permission, action, &Payload::Permission(change))?;
                wrap(vec![self.find_permission(p)?])
            }
            _ => Err(IamError::Unhandled {
                section: Section::Permission,
                action,
            }),
        }
    }

    fn find_permission(&self, p: &proto::Permission) -> Result<proto::Permission, IamError> {
        self.read(|d| {
            let id = if p.id.is_empty() {
                d.permissions().get_id_by_name(p.category, &p.name)?.to_owned()
            } else {
                p.id.clone()
            };
            convert::permission(d, &id)
        })
        .ok_or_else(|| IamError::not_found("permission", if p.id.is_empty() { &p.name } else { &p.id }))
    }

    fn right(&self, action: Action, payload: &Payload) -> Outcome {
        let wrap = |v: Vec<proto::Grant>| Ok(Some(Body::Grants(v)));
        let Payload::Grant(g) = payload else {
            return Err(mismatch(Section::Right, action));
        };
        match action {
            Action::List => {
                let permission = self.find_permission(&proto::Permission {
                    id: g.permission_id.clone(),
                    name: String::new(),
                    category: g.category,
                    mappings: Vec::new(),
                })?;
                wrap(self.read(|d| {
                    d.grants()
                        .store(Scope::of_category(permission.category))
                        .records_for_permission(&permission.id)
                        .into_iter()
                        .map(convert::grant)
                        .collect()
                }))
            }
            Action::Show => wrap(vec![self.find_grant(&g.id)?]),
            Action::Grant => {
                let created = self.check_grant(g)?;
                self.write(Section::Right, action, &Payload::Grant(created.clone()))?;
                wrap(vec![created])
            }
            Action::Revoke => {
                let found = self.find_grant(&g.id)?;
                self.write(Section::Right, action, &Payload::Grant(found))?;
                Ok(None)
            }
            _ => Err(IamError::Unhandled {
                section: Section::Right,
                action,
            }),
        }
    }

    fn find_grant(&self, id: &str) -> Result<proto::Grant, IamError> {
        self.read(|d| d.grants().find(id).map(|(_, record)| convert::grant(record)))
            .ok_or_else(|| IamError::not_found("grant", id))
    }

    /// Validates a new grant against the permission and the recipient.
    fn check_grant(&self, g: &proto::Grant) -> Result<proto::Grant, IamError> {
        let kind: SubjectKind = g
            .recipient_type
            .parse()
            .map_err(|e: soma_msg::ParseNameError| IamError::Invalid(e.to_string()))?;
        self.read(|d| {
            let category = d
                .permissions()
                .get_category(&g.permission_id)
                .ok_or_else(|| IamError::not_found("permission", &g.permission_id))?;
            if category != g.category {
                return Err(IamError::Invalid(format!(
                    "permission {} belongs to category {category}, not {}",
                    g.permission_id, g.category
                )));
            }
            let known = match kind {
                SubjectKind::Team => d.teams().get_by_id(&g.recipient_id).is_some(),
                _ => d
                    .users()
                    .get_by_id(&g.recipient_id)
                    .is_some_and(|u| u.kind == kind),
            };
            if !known {
                return Err(IamError::not_found(kind.as_str(), &g.recipient_id));
            }
            Ok(())
        })?;
        Ok(proto::Grant {
            id: fresh_id(&g.id),
            ..g.clone()
        })
    }

    fn team(&self, action: Action, payload: &Payload) -> Outcome {
        let wrap = |v: Vec<proto::Team>| Ok(Some(Body::Teams(v)));
        match (action, payload) {
            (Action::List, _) => {
                wrap(self.read(|d| d.teams().teams().into_iter().map(convert::team).collect()))
            }
            (Action::Search, Payload::Filter(f)) => wrap(self.read(|d| {
                d.teams()
                    .teams()
                    .into_iter()
                    .filter(|t| f.matches(&t.name, Some(&t.id)))
                    .map(convert::team)
                    .collect()
            })),
            (Action::Show, Payload::Team(t)) => wrap(vec![self.find_team(t)?]),
            (Action::Add, Payload::Team(t)) => {
                require_name("team", &t.name)?;
                if self.read(|d| d.teams().get_by_name(&t.name).is_some()) {
                    return Err(IamError::Conflict(format!("team {} already exists", t.name)));
                }
                let created = proto::Team {
                    id: fresh_id(&t.id),
                    name: t.name.clone(),
                    members: Vec::new(),
                };
                self.write(Section::Team, action, &Payload::Team(created.clone()))?;
                wrap(vec![created])
            }
            (Action::Remove, Payload::Team(t)) => {
                let found = self.find_team(t)?;
                self.write(Section::Team, action, &Payload::Team(found))?;
                Ok(None)
            }
            // Updates are refused by the cache dispatcher.
            (Action::Update, Payload::Team(_)) => {
                self.write(Section::Team, action, payload)?;
                Ok(None)
            }
            _ => Err(mismatch(Section::Team, action)),
        }
    }

    fn find_team(&self, t: &proto::Team) -> Result<proto::Team, IamError> {
        self.read(|d| {
            let found = if t.id.is_empty() {
                d.teams().get_by_name(&t.name)
            } else {
                d.teams().get_by_id(&t.id)
            };
            found.map(convert::team)
        })
        .ok_or_else(|| IamError::not_found("team", if t.id.is_empty() { &t.name } else { &t.id }))
    }

    fn user(&self, action: Action, payload: &Payload) -> Outcome {
        let wrap = |v: Vec<proto::User>| Ok(Some(Body::Users(v)));
        match (action, payload) {
            (Action::List, _) => wrap(self.logins(SubjectKind::User, None)),
            (Action::Search, Payload::Filter(f)) => wrap(self.logins(SubjectKind::User, Some(f))),
            (Action::Show, Payload::User(u)) => wrap(vec![self.find_login(SubjectKind::User, u)?]),
            (Action::Add, Payload::User(u)) => {
                let created = self.check_login(SubjectKind::User, u)?;
                if self.read(|d| d.teams().get_by_id(&created.team_id).is_none()) {
                    return Err(IamError::not_found("team", &created.team_id));
                }
                self.write(Section::User, action, &Payload::User(created.clone()))?;
                wrap(vec![created])
            }
            (Action::Update, Payload::User(u)) => {
                let current = self.find_login(SubjectKind::User, u)?;
                if !u.team_id.is_empty() && self.read(|d| d.teams().get_by_id(&u.team_id).is_none()) {
                    return Err(IamError::not_found("team", &u.team_id));
                }
                let updated = proto::User {
                    id: current.id,
                    user_name: if u.user_name.is_empty() { current.user_name } else { u.user_name.clone() },
                    team_id: if u.team_id.is_empty() { current.team_id } else { u.team_id.clone() },
                    is_active: u.is_active,
                    is_deleted: u.is_deleted,
                };
                self.write(Section::User, action, &Payload::User(updated.clone()))?;
                wrap(vec![updated])
            }
            (Action::Remove | Action::Purge, Payload::User(u)) => {
                let found = self.find_login(SubjectKind::User, u)?;
                self.write(Section::User, action, &Payload::User(found))?;
                Ok(None)
            }
            _ => Err(mismatch(Section::User, action)),
        }
    }

    fn login(&self, section: Section, action: Action, payload: &Payload) -> Outcome {
        let kind = if section == Section::Admin {
            SubjectKind::Admin
        } else {
            SubjectKind::Tool
        };
        let wrap = |v: Vec<proto::User>| Ok(Some(Body::Users(v)));
        match (action, payload) {
            (Action::List, _) => wrap(self.logins(kind, None)),
            (Action::Show, Payload::User(u)) => wrap(vec![self.find_login(kind, u)?]),
            (Action::Add, Payload::User(u)) => {
                let created = proto::User {
                    team_id: String::new(),
                    ..self.check_login(kind, u)?
                };
                self.write(section, action, &Payload::User(created.clone()))?;
                wrap(vec![created])
            }
            (Action::Remove, Payload::User(u)) => {
                let found = self.find_login(kind, u)?;
                self.write(section, action, &Payload::User(found))?;
                Ok(None)
            }
            _ => Err(mismatch(section, action)),
        }
    }

    fn logins(&self, kind: SubjectKind, filter: Option<&proto::Filter>) -> Vec<proto::User> {
        self.read(|d| {
            d.users()
                .get_kind(kind)
                .into_iter()
                .filter(|u| filter.is_none_or(|f| f.matches(&u.name, u.team_id.as_deref())))
                .map(convert::user)
                .collect()
        })
    }

    fn find_login(&self, kind: SubjectKind, u: &proto::User) -> Result<proto::User, IamError> {
        self.read(|d| {
            let found = if u.id.is_empty() {
                d.users().get_by_name(&u.user_name)
            } else {
                d.users().get_by_id(&u.id)
            };
            found.filter(|e| e.kind == kind).map(convert::user)
        })
        .ok_or_else(|| {
            IamError::not_found(kind.as_str(), if u.id.is_empty() { &u.user_name } else { &u.id })
        })
    }

    /// Validates a new login of `kind` and assigns its id.
    fn check_login(&self, kind: SubjectKind, u: &proto::User) -> Result<proto::User, IamError> {
        require_name(kind.as_str(), &u.user_name)?;
        if SubjectKind::from_user_name(&u.user_name) != kind {
            return Err(IamError::Invalid(format!(
                "login name {} does not denote a {kind}",
                u.user_name
            )));
        }
        if self.read(|d| d.users().get_by_name(&u.user_name).is_some()) {
            return Err(IamError::Conflict(format!("login {} already exists", u.user_name)));
        }
        Ok(proto::User {
            id: fresh_id(&u.id),
            is_active: true,
            is_deleted: false,
            ..u.clone()
        })
    }
}

const fn mismatch(section: Section, action: Action) -> IamError {
    IamError::Mismatch { section, action }
}
