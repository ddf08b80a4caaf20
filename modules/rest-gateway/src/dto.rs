//! Request bodies.
//!
//! Every JSON body decodes into [`RequestBody`], one optional field per
//! entity; each route takes the field it needs. Parent ids come from the
//! URL, never from the body.

use axum::Json;
use axum::extract::{FromRequest, Request};
use serde::Deserialize;
use soma_msg::proto;

use crate::error::RestError;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RequestBody {
    pub category: Option<proto::CategoryDef>,
    pub section: Option<proto::SectionDef>,
    pub action: Option<proto::ActionDef>,
    pub permission: Option<PermissionInput>,
    pub mapping: Option<MappingChange>,
    pub grant: Option<GrantInput>,
    pub team: Option<proto::Team>,
    pub user: Option<proto::User>,
    pub repository: Option<proto::Repository>,
    pub bucket: Option<proto::Bucket>,
    pub cluster: Option<proto::Cluster>,
    pub group: Option<proto::Group>,
    pub node: Option<proto::Node>,
    pub node_config: Option<proto::NodeConfig>,
    pub monitoring: Option<proto::Monitoring>,
    pub system: Option<proto::SystemOperation>,
    pub filter: Option<proto::Filter>,
}

/// A new permission; the category is taken from the URL.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PermissionInput {
    pub name: String,
    #[serde(default)]
    pub mappings: Vec<proto::PermissionMapping>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingOperation {
    Map,
    Unmap,
}

/// Body of `PATCH /category/{category}/permission/{permission}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MappingChange {
    pub operation: MappingOperation,
    pub mappings: Vec<proto::PermissionMapping>,
}

/// A new grant; category and permission are taken from the URL.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GrantInput {
    pub recipient_type: String,
    pub recipient_id: String,
    #[serde(default)]
    pub object_type: Option<String>,
    #[serde(default)]
    pub object_id: Option<String>,
}

/// Takes a required entity out of the body.
///
/// # Errors
/// [`RestError::Malformed`] when the body lacks `field`.
pub fn require<T>(value: Option<T>, field: &str) -> Result<T, RestError> {
    value.ok_or_else(|| RestError::Malformed(format!("request body lacks the {field} field")))
}

/// JSON body extractor answering malformed input with the standard 400
/// envelope.
#[derive(Debug)]
pub struct JsonBody(pub RequestBody);

impl<S: Send + Sync> FromRequest<S> for JsonBody {
    type Rejection = RestError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(body) = Json::<RequestBody>::from_request(req, state)
            .await
            .map_err(|rejection| RestError::Malformed(rejection.body_text()))?;
        Ok(Self(body))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn body_decodes_one_entity() {
        let body: RequestBody = serde_json::from_value(serde_json::json!({
            "bucket": { "name": "alpha-prod", "environment": "production" }
        }))
        .unwrap();
        let bucket = require(body.bucket, "bucket").unwrap();
        assert_eq!(bucket.name, "alpha-prod");
        assert!(bucket.repository_id.is_empty());
        assert!(body.repository.is_none());
    }

    #[test]
    fn unknown_entity_is_rejected() {
        let res = serde_json::from_value::<RequestBody>(serde_json::json!({ "widget": {} }));
        assert!(res.is_err());
    }

    #[test]
    fn missing_entity_names_the_field() {
        let err = require::<proto::Team>(None, "team").unwrap_err();
        assert_eq!(err.to_string(), "malformed request: request body lacks the team field");
    }

    #[test]
    fn mapping_change_reads_the_operation() {
        let body: RequestBody = serde_json::from_value(serde_json::json!({
            "mapping": { "operation": "unmap", "mappings": [{ "sectionId": "s1" }] }
        }))
        .unwrap();
        let change = body.mapping.unwrap();
        assert_eq!(change.operation, MappingOperation::Unmap);
        assert_eq!(change.mappings[0].section_id, "s1");
    }
}
