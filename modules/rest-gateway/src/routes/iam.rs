//! Identity and permission routes: categories, sections, actions,
//! permissions, grants, teams and logins.

use axum::Router;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use soma_msg::{Action, Category, ObjectIds, Payload, Section, proto};

use crate::adapter::{Call, dispatch};
use crate::context::{Caller, RequestMeta};
use crate::dto::{JsonBody, MappingOperation, require};
use crate::error::RestError;
use crate::state::AppState;
use crate::validate;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/category/", get(list_categories).post(add_category))
        .route("/category/{category}", get(show_category).delete(remove_category))
        .route("/section/", get(list_sections).post(add_section))
        .route("/search/section/", post(search_sections))
        .route("/section/{section}", get(show_section).delete(remove_section))
        .route("/section/{section}/action/", get(list_actions).post(add_action))
        .route(
            "/section/{section}/action/{action}",
            get(show_action).delete(remove_action),
        )
        .route(
            "/category/{category}/permission/",
            get(list_permissions).post(add_permission),
        )
        .route(
            "/category/{category}/permission/{permission}",
            get(show_permission)
                .delete(remove_permission)
                .patch(remap_permission),
        )
        .route(
            "/category/{category}/permission/{permission}/grant/",
            get(list_grants).post(add_grant),
        )
        .route(
            "/category/{category}/permission/{permission}/grant/{grant}",
            get(show_grant).delete(revoke_grant),
        )
        .route("/team/", get(list_teams).post(add_team))
        .route("/search/team/", post(search_teams))
        .route("/team/{team}", get(show_team).put(update_team).delete(remove_team))
        .route("/user/", get(list_users).post(add_user))
        .route("/search/user/", post(search_users))
        .route("/user/{user}", get(show_user).put(update_user).delete(remove_user))
        .route("/admin/", get(list_admins).post(add_admin))
        .route("/admin/{admin}", get(show_admin).delete(remove_admin))
        .route("/tool/", get(list_tools).post(add_tool))
        .route("/tool/{tool}", get(show_tool).delete(remove_tool))
}

/// Runs `call` unless an earlier step already failed.
async fn run(state: &AppState, meta: &RequestMeta, caller: &Caller, call: Result<Call, RestError>) -> Response {
    match call {
        Ok(call) => dispatch(state, meta, caller, call).await,
        Err(err) => err.into_response(),
    }
}

fn team_objects(team: &str) -> ObjectIds {
    ObjectIds {
        team: Some(team.to_owned()),
        ..ObjectIds::default()
    }
}

// category

fn category_def(name: &str) -> Result<proto::CategoryDef, RestError> {
    Ok(proto::CategoryDef { name: name.parse()? })
}

async fn list_categories(State(state): State<AppState>, meta: RequestMeta, caller: Caller) -> Response {
    dispatch(&state, &meta, &caller, Call::new(Section::Category, Action::List)).await
}

async fn add_category(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    JsonBody(body): JsonBody,
) -> Response {
    let call = require(body.category, "category")
        .map(|c| Call::new(Section::Category, Action::Add).payload(Payload::Category(c)));
    run(&state, &meta, &caller, call).await
}

async fn show_category(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(category): Path<String>,
) -> Response {
    let call = category_def(&category)
        .map(|c| Call::new(Section::Category, Action::Show).payload(Payload::Category(c)));
    run(&state, &meta, &caller, call).await
}

async fn remove_category(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(category): Path<String>,
) -> Response {
    let call = category_def(&category)
        .map(|c| Call::new(Section::Category, Action::Remove).payload(Payload::Category(c)));
    run(&state, &meta, &caller, call).await
}

// section

/// Section definitions carry their category, so the cache is asked for
/// the stored record before the request is built.
fn known_section(state: &AppState, section: &str) -> Result<proto::SectionDef, RestError> {
    state
        .cache
        .read(|d| {
            let table = d.sections();
            table
                .get_section_by_id(section)
                .or_else(|| table.get_section_by_name(section))
                .map(|s| proto::SectionDef {
                    id: s.id.clone(),
                    name: s.name.clone(),
                    category: s.category,
                })
        })
        .ok_or_else(|| RestError::not_found("section", section))
}

async fn list_sections(State(state): State<AppState>, meta: RequestMeta, caller: Caller) -> Response {
    dispatch(&state, &meta, &caller, Call::new(Section::Section, Action::List)).await
}

async fn search_sections(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    JsonBody(body): JsonBody,
) -> Response {
    let call = require(body.filter, "filter")
        .map(|f| Call::new(Section::Section, Action::Search).payload(Payload::Filter(f)));
    run(&state, &meta, &caller, call).await
}

async fn add_section(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    JsonBody(body): JsonBody,
) -> Response {
    let call = require(body.section, "section").and_then(|s| {
        validate::name("section", &s.name, validate::MAX_NAME_LEN)?;
        Ok(Call::new(Section::Section, Action::Add).payload(Payload::Section(s)))
    });
    run(&state, &meta, &caller, call).await
}

async fn show_section(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(section): Path<String>,
) -> Response {
    let call = known_section(&state, &section)
        .map(|s| Call::new(Section::Section, Action::Show).payload(Payload::Section(s)));
    run(&state, &meta, &caller, call).await
}

async fn remove_section(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(section): Path<String>,
) -> Response {
    let call = known_section(&state, &section)
        .map(|s| Call::new(Section::Section, Action::Remove).payload(Payload::Section(s)));
    run(&state, &meta, &caller, call).await
}

// action

fn action_def(section_id: String, id: String) -> proto::ActionDef {
    proto::ActionDef {
        id,
        name: String::new(),
        section_id,
        category: None,
    }
}

async fn list_actions(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(section): Path<String>,
) -> Response {
    let payload = Payload::Action(action_def(section, String::new()));
    dispatch(&state, &meta, &caller, Call::new(Section::Action, Action::List).payload(payload)).await
}

async fn add_action(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(section): Path<String>,
    JsonBody(body): JsonBody,
) -> Response {
    let call = require(body.action, "action").and_then(|a| {
        validate::name("action", &a.name, validate::MAX_NAME_LEN)?;
        let a = proto::ActionDef {
            section_id: section,
            ..a
        };
        Ok(Call::new(Section::Action, Action::Add).payload(Payload::Action(a)))
    });
    run(&state, &meta, &caller, call).await
}

async fn show_action(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path((section, action)): Path<(String, String)>,
) -> Response {
    let payload = Payload::Action(action_def(section, action));
    dispatch(&state, &meta, &caller, Call::new(Section::Action, Action::Show).payload(payload)).await
}

async fn remove_action(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path((section, action)): Path<(String, String)>,
) -> Response {
    let payload = Payload::Action(action_def(section, action));
    dispatch(&state, &meta, &caller, Call::new(Section::Action, Action::Remove).payload(payload)).await
}

// permission

fn permission(category: Category, id: String) -> proto::Permission {
    proto::Permission {
        id,
        name: String::new(),
        category,
        mappings: Vec::new(),
    }
}

fn permission_call(action: Action, category: &str, id: String) -> Result<Call, RestError> {
    let category: Category = category.parse()?;
    Ok(Call::new(Section::Permission, action).payload(Payload::Permission(permission(category, id))))
}

async fn list_permissions(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(category): Path<String>,
) -> Response {
    let call = permission_call(Action::List, &category, String::new());
    run(&state, &meta, &caller, call).await
}

async fn add_permission(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(category): Path<String>,
    JsonBody(body): JsonBody,
) -> Response {
    let call = require(body.permission, "permission").and_then(|p| {
        validate::name("permission", &p.name, validate::MAX_NAME_LEN)?;
        let created = proto::Permission {
            id: String::new(),
            name: p.name,
            category: category.parse()?,
            mappings: p.mappings,
        };
        Ok(Call::new(Section::Permission, Action::Add).payload(Payload::Permission(created)))
    });
    run(&state, &meta, &caller, call).await
}

async fn show_permission(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path((category, id)): Path<(String, String)>,
) -> Response {
    let call = permission_call(Action::Show, &category, id);
    run(&state, &meta, &caller, call).await
}

async fn remove_permission(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path((category, id)): Path<(String, String)>,
) -> Response {
    let call = permission_call(Action::Remove, &category, id);
    run(&state, &meta, &caller, call).await
}

/// Maps or unmaps sections and actions, as the body's operation says.
async fn remap_permission(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path((category, id)): Path<(String, String)>,
    JsonBody(body): JsonBody,
) -> Response {
    let call = require(body.mapping, "mapping").and_then(|change| {
        if change.mappings.is_empty() {
            return Err(RestError::Invalid("mapping lists no sections".to_owned()));
        }
        let action = match change.operation {
            MappingOperation::Map => Action::Map,
            MappingOperation::Unmap => Action::Unmap,
        };
        let p = proto::Permission {
            mappings: change.mappings,
            ..permission(category.parse()?, id)
        };
        Ok(Call::new(Section::Permission, action).payload(Payload::Permission(p)))
    });
    run(&state, &meta, &caller, call).await
}

// right

fn grant(category: Category, permission_id: String, id: String) -> proto::Grant {
    proto::Grant {
        id,
        recipient_type: String::new(),
        recipient_id: String::new(),
        permission_id,
        category,
        object_type: None,
        object_id: None,
    }
}

fn grant_call(action: Action, category: &str, permission_id: String, id: String) -> Result<Call, RestError> {
    let category: Category = category.parse()?;
    Ok(Call::new(Section::Right, action).payload(Payload::Grant(grant(category, permission_id, id))))
}

async fn list_grants(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path((category, permission_id)): Path<(String, String)>,
) -> Response {
    let call = grant_call(Action::List, &category, permission_id, String::new());
    run(&state, &meta, &caller, call).await
}

async fn add_grant(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path((category, permission_id)): Path<(String, String)>,
    JsonBody(body): JsonBody,
) -> Response {
    let call = require(body.grant, "grant").and_then(|g| {
        let created = proto::Grant {
            recipient_type: g.recipient_type,
            recipient_id: g.recipient_id,
            object_type: g.object_type,
            object_id: g.object_id,
            ..grant(category.parse()?, permission_id, String::new())
        };
        Ok(Call::new(Section::Right, Action::Grant).payload(Payload::Grant(created)))
    });
    run(&state, &meta, &caller, call).await
}

async fn show_grant(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path((category, permission_id, id)): Path<(String, String, String)>,
) -> Response {
    let call = grant_call(Action::Show, &category, permission_id, id);
    run(&state, &meta, &caller, call).await
}

async fn revoke_grant(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path((category, permission_id, id)): Path<(String, String, String)>,
) -> Response {
    let call = grant_call(Action::Revoke, &category, permission_id, id);
    run(&state, &meta, &caller, call).await
}

// team

fn team(id: String) -> proto::Team {
    proto::Team {
        id,
        ..proto::Team::default()
    }
}

async fn list_teams(State(state): State<AppState>, meta: RequestMeta, caller: Caller) -> Response {
    dispatch(&state, &meta, &caller, Call::new(Section::Team, Action::List)).await
}

async fn search_teams(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    JsonBody(body): JsonBody,
) -> Response {
    let call = require(body.filter, "filter")
        .map(|f| Call::new(Section::Team, Action::Search).payload(Payload::Filter(f)));
    run(&state, &meta, &caller, call).await
}

async fn add_team(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    JsonBody(body): JsonBody,
) -> Response {
    let call = require(body.team, "team").and_then(|t| {
        validate::name("team", &t.name, validate::MAX_NAME_LEN)?;
        Ok(Call::new(Section::Team, Action::Add).payload(Payload::Team(t)))
    });
    run(&state, &meta, &caller, call).await
}

async fn show_team(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(id): Path<String>,
) -> Response {
    let call = Call::new(Section::Team, Action::Show)
        .objects(team_objects(&id))
        .payload(Payload::Team(team(id)));
    dispatch(&state, &meta, &caller, call).await
}

async fn update_team(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(id): Path<String>,
    JsonBody(body): JsonBody,
) -> Response {
    let call = require(body.team, "team").and_then(|t| {
        if !t.id.is_empty() && t.id != id {
            return Err(RestError::Invalid(format!("team id {} does not match the URL", t.id)));
        }
        Ok(Call::new(Section::Team, Action::Update)
            .objects(team_objects(&id))
            .payload(Payload::Team(proto::Team { id, ..t })))
    });
    run(&state, &meta, &caller, call).await
}

async fn remove_team(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(id): Path<String>,
) -> Response {
    let call = Call::new(Section::Team, Action::Remove)
        .objects(team_objects(&id))
        .payload(Payload::Team(team(id)));
    dispatch(&state, &meta, &caller, call).await
}

// user

#[derive(Debug, Default, Deserialize)]
struct RemoveUser {
    #[serde(default)]
    purge: bool,
}

fn login(id: String) -> proto::User {
    proto::User {
        id,
        ..proto::User::default()
    }
}

async fn list_users(State(state): State<AppState>, meta: RequestMeta, caller: Caller) -> Response {
    dispatch(&state, &meta, &caller, Call::new(Section::User, Action::List)).await
}

async fn search_users(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    JsonBody(body): JsonBody,
) -> Response {
    let call = require(body.filter, "filter")
        .map(|f| Call::new(Section::User, Action::Search).payload(Payload::Filter(f)));
    run(&state, &meta, &caller, call).await
}

async fn add_user(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    JsonBody(body): JsonBody,
) -> Response {
    let call = require(body.user, "user").and_then(|u| {
        validate::user_name(&u.user_name)?;
        let objects = team_objects(&u.team_id);
        Ok(Call::new(Section::User, Action::Add)
            .objects(objects)
            .payload(Payload::User(u)))
    });
    run(&state, &meta, &caller, call).await
}

async fn show_user(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(id): Path<String>,
) -> Response {
    let call = Call::new(Section::User, Action::Show).payload(Payload::User(login(id)));
    dispatch(&state, &meta, &caller, call).await
}

async fn update_user(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(id): Path<String>,
    JsonBody(body): JsonBody,
) -> Response {
    let call = require(body.user, "user").and_then(|u| {
        if !u.id.is_empty() && u.id != id {
            return Err(RestError::Invalid(format!("user id {} does not match the URL", u.id)));
        }
        if !u.user_name.is_empty() {
            validate::user_name(&u.user_name)?;
        }
        Ok(Call::new(Section::User, Action::Update).payload(Payload::User(proto::User { id, ..u })))
    });
    run(&state, &meta, &caller, call).await
}

async fn remove_user(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(id): Path<String>,
    query: Result<Query<RemoveUser>, QueryRejection>,
) -> Response {
    let call = query
        .map_err(|rejection| RestError::Malformed(rejection.body_text()))
        .map(|Query(q)| {
            let action = if q.purge { Action::Purge } else { Action::Remove };
            Call::new(Section::User, action).payload(Payload::User(login(id)))
        });
    run(&state, &meta, &caller, call).await
}

// admin and tool

async fn list_logins(state: &AppState, meta: &RequestMeta, caller: &Caller, section: Section) -> Response {
    dispatch(state, meta, caller, Call::new(section, Action::List)).await
}

async fn add_login(
    state: &AppState,
    meta: &RequestMeta,
    caller: &Caller,
    section: Section,
    user: Option<proto::User>,
) -> Response {
    let call = require(user, section.as_str()).and_then(|u| {
        validate::user_name(&u.user_name)?;
        Ok(Call::new(section, Action::Add).payload(Payload::User(u)))
    });
    run(state, meta, caller, call).await
}

async fn login_by_id(
    state: &AppState,
    meta: &RequestMeta,
    caller: &Caller,
    section: Section,
    action: Action,
    id: String,
) -> Response {
    let call = Call::new(section, action).payload(Payload::User(login(id)));
    dispatch(state, meta, caller, call).await
}

async fn list_admins(State(state): State<AppState>, meta: RequestMeta, caller: Caller) -> Response {
    list_logins(&state, &meta, &caller, Section::Admin).await
}

async fn add_admin(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    JsonBody(body): JsonBody,
) -> Response {
    add_login(&state, &meta, &caller, Section::Admin, body.user).await
}

async fn show_admin(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(id): Path<String>,
) -> Response {
    login_by_id(&state, &meta, &caller, Section::Admin, Action::Show, id).await
}

async fn remove_admin(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(id): Path<String>,
) -> Response {
    login_by_id(&state, &meta, &caller, Section::Admin, Action::Remove, id).await
}

async fn list_tools(State(state): State<AppState>, meta: RequestMeta, caller: Caller) -> Response {
    list_logins(&state, &meta, &caller, Section::Tool).await
}

async fn add_tool(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    JsonBody(body): JsonBody,
) -> Response {
    add_login(&state, &meta, &caller, Section::Tool, body.user).await
}

async fn show_tool(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(id): Path<String>,
) -> Response {
    login_by_id(&state, &meta, &caller, Section::Tool, Action::Show, id).await
}

async fn remove_tool(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(id): Path<String>,
) -> Response {
    login_by_id(&state, &meta, &caller, Section::Tool, Action::Remove, id).await
}
