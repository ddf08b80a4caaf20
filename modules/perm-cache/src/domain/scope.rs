//! Which grant store and object decide a request.
//!
//! Object ids come from the cache's own object tree whenever it knows the
//! object; the ids sent by the caller are only used for objects the tree
//! has not seen yet, such as a bucket that is about to be created.

use soma_msg::{ObjectIds, Section};

use super::data::CacheData;
use super::grants::Scope;

/// Where to look for a grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub scope: Scope,
    pub object: Option<String>,
    /// Object retried when the first one carries no grant: the parent
    /// repository of a bucket.
    pub fallback: Option<String>,
}

impl Target {
    const fn global() -> Self {
        Self {
            scope: Scope::Global,
            object: None,
            fallback: None,
        }
    }
}

#[must_use]
pub fn resolve(data: &CacheData, section: Section, objects: &ObjectIds) -> Target {
    match section {
        Section::Monitoring | Section::Capability | Section::Deployment => Target {
            scope: Scope::Monitoring,
            object: objects.monitoring.clone(),
            fallback: None,
        },

        Section::PropertyService | Section::Node | Section::TeamRepository => Target {
            scope: Scope::Team,
            object: trusted_team(data, objects),
            fallback: None,
        },

        Section::NodeConfig => Target {
            scope: Scope::Repository,
            object: placement_repository(data, objects),
            fallback: None,
        },

        Section::Instance
        | Section::PropertyCustom
        | Section::RepositoryConfig
        | Section::Repository => Target {
            scope: Scope::Repository,
            object: trusted_repository(data, objects),
            fallback: None,
        },

        Section::Bucket | Section::Cluster | Section::CheckConfig | Section::Group => {
            let bucket = trusted_bucket(data, objects);
            let fallback = bucket
                .as_deref()
                .and_then(|b| data.objects().get_bucket_repository(b))
                .map(str::to_owned)
                .or_else(|| objects.repository.clone());
            Target {
                scope: Scope::Repository,
                object: bucket,
                fallback,
            }
        }

        _ => Target::global(),
    }
}

/// Team owning the node or repository in question, else the caller's team id.
fn trusted_team(data: &CacheData, objects: &ObjectIds) -> Option<String> {
    let tree = data.objects();
    objects
        .node
        .as_deref()
        .and_then(|n| tree.get_team(n))
        .or_else(|| {
            objects
                .repository
                .as_deref()
                .and_then(|r| tree.get_team(r))
        })
        .map(str::to_owned)
        .or_else(|| objects.team.clone())
}

/// Repository owning the bucket in question, else the caller's repository id.
fn trusted_repository(data: &CacheData, objects: &ObjectIds) -> Option<String> {
    trusted_bucket(data, objects)
        .as_deref()
        .and_then(|b| data.objects().get_bucket_repository(b))
        .map(str::to_owned)
        .or_else(|| objects.repository.clone())
}

/// Repository of the bucket a node is placed into. The node's current
/// bucket does not count: the placement target is what needs the right.
fn placement_repository(data: &CacheData, objects: &ObjectIds) -> Option<String> {
    objects
        .bucket
        .as_deref()
        .and_then(|b| data.objects().get_bucket_repository(b))
        .map(str::to_owned)
        .or_else(|| objects.repository.clone())
}

/// Bucket containing the cluster, group or node in question, else the
/// caller's bucket id.
fn trusted_bucket(data: &CacheData, objects: &ObjectIds) -> Option<String> {
    let tree = data.objects();
    [&objects.cluster, &objects.group, &objects.node]
        .into_iter()
        .filter_map(Option::as_deref)
        .find_map(|member| tree.get_member_bucket(member))
        .map(str::to_owned)
        .or_else(|| objects.bucket.clone())
}
