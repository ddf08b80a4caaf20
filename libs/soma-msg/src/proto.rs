//! Entity records carried in request payloads and reply bodies.
//!
//! All identifiers are opaque strings. The wire format is camelCase JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::section::Category;

/// A permission category as exposed over `/category/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDef {
    pub name: Category,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionDef {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub category: Category,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDef {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub section_id: String,
    /// Inherited from the parent section when absent on the wire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
}

/// Links a permission to a whole section, or to one action of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionMapping {
    pub section_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mappings: Vec<PermissionMapping>,
}

/// A right recorded for a subject, optionally bound to an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grant {
    #[serde(default)]
    pub id: String,
    /// Subject kind as sent by the client; validated when the grant is applied.
    pub recipient_type: String,
    pub recipient_id: String,
    #[serde(default)]
    pub permission_id: String,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
}

/// Users, admins and tools share one record; only users carry a team.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: String,
    pub user_name: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub team_id: String,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub repository_id: String,
    #[serde(default)]
    pub environment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub bucket_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub bucket_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub team_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_id: Option<String>,
}

/// Assignment of a node into a bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    #[serde(default)]
    pub node_id: String,
    pub repository_id: String,
    pub bucket_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Monitoring {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub contact: String,
    pub team_id: String,
}

/// Key exchange record. The client sends its public key and IV; the
/// server answers with its own material, the exchange id and expiry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kex {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub public_key: String,
    pub initialization_vector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemOperation {
    /// Name of the administrative operation, e.g. `stop-repository`.
    pub request: String,
    #[serde(default)]
    pub repository_id: String,
}

/// Nested view of a repository and everything below it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tree {
    pub id: String,
    pub name: String,
    pub object_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Tree>,
}

/// Search criteria; unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
}

impl Filter {
    #[must_use]
    pub fn matches(&self, name: &str, team_id: Option<&str>) -> bool {
        let name_ok = self.name.as_deref().is_none_or(|n| n == name);
        let team_ok = match (self.team_id.as_deref(), team_id) {
            (None, _) => true,
            (Some(wanted), Some(actual)) => wanted == actual,
            (Some(_), None) => false,
        };
        name_ok && team_ok
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn grant_wire_format_is_camel_case() {
        let grant: Grant = serde_json::from_value(serde_json::json!({
            "recipientType": "user",
            "recipientId": "u2",
            "category": "repository",
            "objectType": "bucket",
            "objectId": "b1"
        }))
        .unwrap();
        assert_eq!(grant.recipient_id, "u2");
        assert_eq!(grant.category, Category::Repository);
        assert!(grant.permission_id.is_empty());
        assert_eq!(grant.object_id.as_deref(), Some("b1"));
    }

    #[test]
    fn filter_matches_on_set_fields_only() {
        let any = Filter::default();
        assert!(any.matches("x", None));

        let by_team = Filter {
            name: None,
            team_id: Some("t1".to_owned()),
        };
        assert!(by_team.matches("x", Some("t1")));
        assert!(!by_team.matches("x", Some("t2")));
        assert!(!by_team.matches("x", None));
    }
}
