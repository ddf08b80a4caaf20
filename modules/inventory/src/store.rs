//! In-memory object tree.
//!
//! Owned by the inventory worker, which processes one request at a time,
//! so checks and writes never interleave.

use std::collections::BTreeMap;

use soma_msg::proto;

/// Everything a removal took with it.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Removed {
    pub buckets: Vec<String>,
    pub members: Vec<String>,
    /// Nodes that lost their bucket assignment.
    pub unassigned: Vec<String>,
}

#[derive(Debug, Default)]
pub struct Inventory {
    repositories: BTreeMap<String, proto::Repository>,
    buckets: BTreeMap<String, proto::Bucket>,
    clusters: BTreeMap<String, proto::Cluster>,
    groups: BTreeMap<String, proto::Group>,
    nodes: BTreeMap<String, proto::Node>,
    monitorings: BTreeMap<String, proto::Monitoring>,
}

fn matching<'a, T: Clone + 'a>(
    items: impl Iterator<Item = &'a T>,
    filter: Option<&proto::Filter>,
    key: impl Fn(&T) -> (&str, Option<&str>),
) -> Vec<T> {
    items
        .filter(|item| {
            let (name, team) = key(item);
            filter.is_none_or(|f| f.matches(name, team))
        })
        .cloned()
        .collect()
}

impl Inventory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // Repositories

    #[must_use]
    pub fn repositories(&self, filter: Option<&proto::Filter>) -> Vec<proto::Repository> {
        matching(self.repositories.values(), filter, |r| {
            (r.name.as_str(), Some(r.team_id.as_str()))
        })
    }

    #[must_use]
    pub fn repository(&self, id: &str) -> Option<&proto::Repository> {
        self.repositories.get(id)
    }

    #[must_use]
    pub fn repository_named(&self, name: &str) -> Option<&proto::Repository> {
        self.repositories.values().find(|r| r.name == name)
    }

    pub fn insert_repository(&mut self, repository: proto::Repository) {
        self.repositories.insert(repository.id.clone(), repository);
    }

    /// Returns `false` for unknown repositories.
    pub fn set_active(&mut self, id: &str, active: bool) -> bool {
        let Some(repository) = self.repositories.get_mut(id) else {
            return false;
        };
        repository.is_active = active;
        true
    }

    pub fn remove_repository(&mut self, id: &str) -> Option<Removed> {
        self.repositories.remove(id)?;
        let buckets: Vec<String> = self
            .buckets
            .values()
            .filter(|b| b.repository_id == id)
            .map(|b| b.id.clone())
            .collect();
        let mut removed = Removed::default();
        for bucket in buckets {
            if let Some(inner) = self.remove_bucket(&bucket) {
                removed.buckets.extend(inner.buckets);
                removed.members.extend(inner.members);
                removed.unassigned.extend(inner.unassigned);
            }
        }
        Some(removed)
    }

    // Buckets

    #[must_use]
    pub fn buckets_of(&self, repository_id: &str) -> Vec<proto::Bucket> {
        self.buckets
            .values()
            .filter(|b| b.repository_id == repository_id)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn bucket(&self, id: &str) -> Option<&proto::Bucket> {
        self.buckets.get(id)
    }

    pub fn insert_bucket(&mut self, bucket: proto::Bucket) {
        self.buckets.insert(bucket.id.clone(), bucket);
    }

    /// Removes the bucket with its clusters and groups and unassigns its
    /// nodes.
    pub fn remove_bucket(&mut self, id: &str) -> Option<Removed> {
        self.buckets.remove(id)?;
        let mut removed = Removed {
            buckets: vec![id.to_owned()],
            ..Removed::default()
        };
        self.clusters.retain(|cid, c| {
            let keep = c.bucket_id != id;
            if !keep {
                removed.members.push(cid.clone());
            }
            keep
        });
        self.groups.retain(|gid, g| {
            let keep = g.bucket_id != id;
            if !keep {
                removed.members.push(gid.clone());
            }
            keep
        });
        for node in self.nodes.values_mut() {
            if node.bucket_id.as_deref() == Some(id) {
                node.bucket_id = None;
                removed.unassigned.push(node.id.clone());
            }
        }
        Some(removed)
    }

    // Clusters and groups

    #[must_use]
    pub fn clusters_of(&self, bucket_id: &str) -> Vec<proto::Cluster> {
        self.clusters
            .values()
            .filter(|c| c.bucket_id == bucket_id)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn cluster(&self, id: &str) -> Option<&proto::Cluster> {
        self.clusters.get(id)
    }

    pub fn insert_cluster(&mut self, cluster: proto::Cluster) {
        self.clusters.insert(cluster.id.clone(), cluster);
    }

    pub fn remove_cluster(&mut self, id: &str) -> Option<proto::Cluster> {
        self.clusters.remove(id)
    }

    #[must_use]
    pub fn groups_of(&self, bucket_id: &str) -> Vec<proto::Group> {
        self.groups
            .values()
            .filter(|g| g.bucket_id == bucket_id)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn group(&self, id: &str) -> Option<&proto::Group> {
        self.groups.get(id)
    }

    pub fn insert_group(&mut self, group: proto::Group) {
        self.groups.insert(group.id.clone(), group);
    }

    pub fn remove_group(&mut self, id: &str) -> Option<proto::Group> {
        self.groups.remove(id)
    }

    // Nodes

    #[must_use]
    pub fn nodes(&self, filter: Option<&proto::Filter>) -> Vec<proto::Node> {
        matching(self.nodes.values(), filter, |n| {
            (n.name.as_str(), Some(n.team_id.as_str()))
        })
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&proto::Node> {
        self.nodes.get(id)
    }

    #[must_use]
    pub fn node_named(&self, name: &str) -> Option<&proto::Node> {
        self.nodes.values().find(|n| n.name == name)
    }

    pub fn insert_node(&mut self, node: proto::Node) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn remove_node(&mut self, id: &str) -> Option<proto::Node> {
        self.nodes.remove(id)
    }

    /// Returns `false` for unknown nodes.
    pub fn place_node(&mut self, node_id: &str, bucket_id: Option<&str>) -> bool {
        let Some(node) = self.nodes.get_mut(node_id) else {
            return false;
        };
        node.bucket_id = bucket_id.map(str::to_owned);
        true
    }

    // Monitoring systems

    #[must_use]
    pub fn monitorings(&self, filter: Option<&proto::Filter>) -> Vec<proto::Monitoring> {
        matching(self.monitorings.values(), filter, |m| {
            (m.name.as_str(), Some(m.team_id.as_str()))
        })
    }

    #[must_use]
    pub fn monitoring(&self, id: &str) -> Option<&proto::Monitoring> {
        self.monitorings.get(id)
    }

    #[must_use]
    pub fn monitoring_named(&self, name: &str) -> Option<&proto::Monitoring> {
        self.monitorings.values().find(|m| m.name == name)
    }

    pub fn insert_monitoring(&mut self, monitoring: proto::Monitoring) {
        self.monitorings.insert(monitoring.id.clone(), monitoring);
    }

    pub fn remove_monitoring(&mut self, id: &str) -> Option<proto::Monitoring> {
        self.monitorings.remove(id)
    }

    /// Nested view of a repository: buckets, their clusters, groups and
    /// assigned nodes.
    #[must_use]
    pub fn tree(&self, repository_id: &str) -> Option<proto::Tree> {
        let repository = self.repositories.get(repository_id)?;
        let leaf = |id: &str, name: &str, kind: &str| proto::Tree {
            id: id.to_owned(),
            name: name.to_owned(),
            object_type: kind.to_owned(),
            children: Vec::new(),
        };

        let children = self
            .buckets
            .values()
            .filter(|b| b.repository_id == repository_id)
            .map(|bucket| {
                let clusters = self
                    .clusters_of(&bucket.id)
                    .into_iter()
                    .map(|c| leaf(&c.id, &c.name, "cluster"));
                let groups = self
                    .groups_of(&bucket.id)
                    .into_iter()
                    .map(|g| leaf(&g.id, &g.name, "group"));
                let nodes = self
                    .nodes
                    .values()
                    .filter(|n| n.bucket_id.as_deref() == Some(bucket.id.as_str()))
                    .map(|n| leaf(&n.id, &n.name, "node"));
                proto::Tree {
                    children: clusters.chain(groups).chain(nodes).collect(),
                    ..leaf(&bucket.id, &bucket.name, "bucket")
                }
            })
            .collect();

        Some(proto::Tree {
            children,
            ..leaf(&repository.id, &repository.name, "repository")
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn seeded() -> Inventory {
        let mut inv = Inventory::new();
        inv.insert_repository(proto::Repository {
            id: "r1".to_owned(),
            name: "alpha".to_owned(),
            team_id: "t1".to_owned(),
            is_active: true,
        });
        inv.insert_bucket(proto::Bucket {
            id: "b1".to_owned(),
            name: "alpha-prod".to_owned(),
            repository_id: "r1".to_owned(),
            environment: "production".to_owned(),
        });
        inv.insert_cluster(proto::Cluster {
            id: "c1".to_owned(),
            name: "web".to_owned(),
            bucket_id: "b1".to_owned(),
        });
        inv.insert_group(proto::Group {
            id: "g1".to_owned(),
            name: "dbs".to_owned(),
            bucket_id: "b1".to_owned(),
        });
        inv.insert_node(proto::Node {
            id: "n1".to_owned(),
            name: "host1".to_owned(),
            team_id: "t1".to_owned(),
            bucket_id: Some("b1".to_owned()),
        });
        inv
    }

    #[test]
    fn removing_a_repository_cascades_and_keeps_nodes() {
        let mut inv = seeded();
        let removed = inv.remove_repository("r1").unwrap();
        assert_eq!(removed.buckets, vec!["b1"]);
        assert_eq!(removed.members, vec!["c1", "g1"]);
        assert_eq!(removed.unassigned, vec!["n1"]);
        assert!(inv.node("n1").unwrap().bucket_id.is_none());
        assert!(inv.cluster("c1").is_none());
        assert!(inv.remove_repository("r1").is_none());
    }

    #[test]
    fn tree_nests_members_under_buckets() {
        let tree = seeded().tree("r1").unwrap();
        assert_eq!(tree.object_type, "repository");
        assert_eq!(tree.children.len(), 1);
        let kinds: Vec<_> = tree.children[0]
            .children
            .iter()
            .map(|c| c.object_type.as_str())
            .collect();
        assert_eq!(kinds, ["cluster", "group", "node"]);
    }

    #[test]
    fn filters_match_name_and_team() {
        let inv = seeded();
        let by_team = proto::Filter {
            team_id: Some("t1".to_owned()),
            ..proto::Filter::default()
        };
        assert_eq!(inv.nodes(Some(&by_team)).len(), 1);
        let by_name = proto::Filter {
            name: Some("beta".to_owned()),
            ..proto::Filter::default()
        };
        assert!(inv.repositories(Some(&by_name)).is_empty());
    }
}
