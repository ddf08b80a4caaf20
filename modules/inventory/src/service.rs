//! Request handling for the inventory sections.

use std::sync::Arc;

use perm_cache::PermCache;
use soma_msg::{Action, Body, Payload, Request, Section, proto};
use tracing::info;
use uuid::Uuid;

use crate::error::InventoryError;
use crate::store::Inventory;

/// Result of a successful request. A job id marks an accepted tree change.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Handled {
    pub body: Option<Body>,
    pub job_id: Option<String>,
}

impl Handled {
    const fn done(body: Option<Body>) -> Self {
        Self { body, job_id: None }
    }
}

type Outcome = Result<Handled, InventoryError>;

fn fresh_id(id: &str) -> String {
    if id.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        id.to_owned()
    }
}

fn require_name(kind: &str, name: &str) -> Result<(), InventoryError> {
    if name.trim().is_empty() {
        return Err(InventoryError::Invalid(format!("{kind} name must not be empty")));
    }
    Ok(())
}

const fn mismatch(section: Section, action: Action) -> InventoryError {
    InventoryError::Mismatch { section, action }
}

pub struct InventoryService {
    inventory: Inventory,
    cache: Arc<PermCache>,
}

impl InventoryService {
    #[must_use]
    pub fn new(cache: Arc<PermCache>) -> Self {
        Self {
            inventory: Inventory::new(),
            cache,
        }
    }

    #[must_use]
    pub const fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    /// Serves one inventory request.
    ///
    /// # Errors
    /// Returns the [`InventoryError`] describing why the request was refused.
    pub fn handle(&mut self, request: &Request) -> Outcome {
        let (section, action, payload) = (request.section, request.action, &request.payload);
        match section {
            Section::System if action.is_system_operation() => self.system(action, payload),
            Section::Repository => self.repository(action, payload),
            Section::Bucket => self.bucket(action, payload),
            Section::Cluster | Section::Group => self.bucket_member(section, action, payload),
            Section::Node => self.node(action, payload),
            Section::NodeConfig => self.node_config(action, payload),
            Section::Monitoring => self.monitoring(action, payload),
            _ => Err(InventoryError::Unhandled { section, action }),
        }
    }

    /// Applies the change to the permission cache before the store, so a
    /// rejected change leaves both untouched.
    fn mirror(&self, section: Section, action: Action, payload: &Payload) -> Result<(), InventoryError> {
        self.cache.apply(section, action, payload)?;
        Ok(())
    }

    fn accepted(section: Section, action: Action, object_id: &str, body: Option<Body>) -> Handled {
        let job_id = Uuid::new_v4().to_string();
        info!(%job_id, %section, %action, object_id, "tree change accepted");
        Handled {
            body,
            job_id: Some(job_id),
        }
    }

    fn team_exists(&self, team_id: &str) -> Result<(), InventoryError> {
        if self.cache.read(|d| d.teams().get_by_id(team_id).is_some()) {
            Ok(())
        } else {
            Err(InventoryError::not_found("team", team_id))
        }
    }

    fn system(&mut self, action: Action, payload: &Payload) -> Outcome {
        let Payload::System(op) = payload else {
            return Err(mismatch(Section::System, action));
        };
        let active = !matches!(action, Action::StopRepository);
        if !self.inventory.set_active(&op.repository_id, active) {
            return Err(InventoryError::not_found("repository", &op.repository_id));
        }
        info!(repository_id = %op.repository_id, operation = %action, "system operation applied");
        Ok(Handled::done(Some(Body::System(vec![proto::SystemOperation {
            request: action.as_str().to_owned(),
            repository_id: op.repository_id.clone(),
        }]))))
    }

    fn repository(&mut self, action: Action, payload: &Payload) -> Outcome {
        let wrap = |v: Vec<proto::Repository>| Some(Body::Repositories(v));
        match (action, payload) {
            (Action::List, _) => Ok(Handled::done(wrap(self.inventory.repositories(None)))),
            (Action::Search, Payload::Filter(f)) => {
                Ok(Handled::done(wrap(self.inventory.repositories(Some(f)))))
            }
            (Action::Show, Payload::Repository(r)) => {
                let found = self
                    .inventory
                    .repository(&r.id)
                    .cloned()
                    .ok_or_else(|| InventoryError::not_found("repository", &r.id))?;
                Ok(Handled::done(wrap(vec![found])))
            }
            (Action::Tree, Payload::Repository(r)) => {
                let tree = self
                    .inventory
                    .tree(&r.id)
                    .ok_or_else(|| InventoryError::not_found("repository", &r.id))?;
                Ok(Handled::done(Some(Body::Tree(tree))))
            }
            (Action::Create, Payload::Repository(r)) => {
                require_name("repository", &r.name)?;
                self.team_exists(&r.team_id)?;
                if self.inventory.repository_named(&r.name).is_some() {
                    return Err(InventoryError::Conflict(format!(
                        "repository {} already exists",
                        r.name
                    )));
                }
                let created = proto::Repository {
                    id: fresh_id(&r.id),
                    is_active: true,
                    ..r.clone()
                };
                self.mirror(Section::Repository, action, &Payload::Repository(created.clone()))?;
                self.inventory.insert_repository(created.clone());
                let id = created.id.clone();
                Ok(Self::accepted(Section::Repository, action, &id, wrap(vec![created])))
            }
            (Action::Destroy, Payload::Repository(r)) => {
                if self.inventory.repository(&r.id).is_none() {
                    return Err(InventoryError::not_found("repository", &r.id));
                }
                self.mirror(Section::Repository, action, payload)?;
                let removed = self.inventory.remove_repository(&r.id);
                info!(repository_id = %r.id, ?removed, "repository destroyed");
                Ok(Handled::done(None))
            }
            _ => Err(mismatch(Section::Repository, action)),
        }
    }

    fn bucket(&mut self, action: Action, payload: &Payload) -> Outcome {
        let Payload::Bucket(b) = payload else {
            return Err(mismatch(Section::Bucket, action));
        };
        let wrap = |v: Vec<proto::Bucket>| Some(Body::Buckets(v));
        let in_repository = |found: &proto::Bucket| {
            b.repository_id.is_empty() || found.repository_id == b.repository_id
        };
        match action {
            Action::List => {
                if self.inventory.repository(&b.repository_id).is_none() {
                    return Err(InventoryError::not_found("repository", &b.repository_id));
                }
                Ok(Handled::done(wrap(self.inventory.buckets_of(&b.repository_id))))
            }
            Action::Show => {
                let found = self
                    .inventory
                    .bucket(&b.id)
                    .filter(|found| in_repository(*found))
                    .cloned()
                    .ok_or_else(|| InventoryError::not_found("bucket", &b.id))?;
                Ok(Handled::done(wrap(vec![found])))
            }
            Action::Create => {
                require_name("bucket", &b.name)?;
                if b.environment.is_empty() {
                    return Err(InventoryError::Invalid("bucket environment must be set".to_owned()));
                }
                if self.inventory.repository(&b.repository_id).is_none() {
                    return Err(InventoryError::not_found("repository", &b.repository_id));
                }
                if self
                    .inventory
                    .buckets_of(&b.repository_id)
                    .iter()
                    .any(|other| other.name == b.name)
                {
                    return Err(InventoryError::Conflict(format!("bucket {} already exists", b.name)));
                }
                let created = proto::Bucket {
                    id: fresh_id(&b.id),
                    ..b.clone()
                };
                self.mirror(Section::Bucket, action, &Payload::Bucket(created.clone()))?;
                self.inventory.insert_bucket(created.clone());
                let id = created.id.clone();
                Ok(Self::accepted(Section::Bucket, action, &id, wrap(vec![created])))
            }
            Action::Destroy => {
                if !self.inventory.bucket(&b.id).is_some_and(in_repository) {
                    return Err(InventoryError::not_found("bucket", &b.id));
                }
                self.mirror(Section::Bucket, action, payload)?;
                self.inventory.remove_bucket(&b.id);
                Ok(Self::accepted(Section::Bucket, action, &b.id, None))
            }
            _ => Err(InventoryError::Unhandled {
                section: Section::Bucket,
                action,
            }),
        }
    }

    /// Clusters and groups: named members of one bucket.
    fn bucket_member(&mut self, section: Section, action: Action, payload: &Payload) -> Outcome {
        let (id, name, bucket_id) = match payload {
            Payload::Cluster(c) if section == Section::Cluster => (&c.id, &c.name, &c.bucket_id),
            Payload::Group(g) if section == Section::Group => (&g.id, &g.name, &g.bucket_id),
            _ => return Err(mismatch(section, action)),
        };
        if self.inventory.bucket(bucket_id).is_none() {
            return Err(InventoryError::not_found("bucket", bucket_id));
        }
        let kind = section.as_str();
        let members = |inv: &Inventory| -> Body {
            if section == Section::Cluster {
                Body::Clusters(inv.clusters_of(bucket_id))
            } else {
                Body::Groups(inv.groups_of(bucket_id))
            }
        };
        let exists = |inv: &Inventory, wanted: &str| match section {
            Section::Cluster => inv.cluster(wanted).is_some_and(|c| &c.bucket_id == bucket_id),
            _ => inv.group(wanted).is_some_and(|g| &g.bucket_id == bucket_id),
        };

        match action {
            Action::List => Ok(Handled::done(Some(members(&self.inventory)))),
            Action::Show => {
                if !exists(&self.inventory, id) {
                    return Err(InventoryError::not_found(kind, id));
                }
                let body = match members(&self.inventory) {
                    Body::Clusters(all) => Body::Clusters(all.into_iter().filter(|c| &c.id == id).collect()),
                    Body::Groups(all) => Body::Groups(all.into_iter().filter(|g| &g.id == id).collect()),
                    other => other,
                };
                Ok(Handled::done(Some(body)))
            }
            Action::Create => {
                require_name(kind, name)?;
                let taken = match members(&self.inventory) {
                    Body::Clusters(all) => all.iter().any(|c| &c.name == name),
                    Body::Groups(all) => all.iter().any(|g| &g.name == name),
                    _ => false,
                };
                if taken {
                    return Err(InventoryError::Conflict(format!("{kind} {name} already exists")));
                }
                self.create_member(section, fresh_id(id), name, bucket_id)
            }
            Action::Destroy => {
                if !exists(&self.inventory, id) {
                    return Err(InventoryError::not_found(kind, id));
                }
                self.mirror(section, action, payload)?;
                if section == Section::Cluster {
                    self.inventory.remove_cluster(id);
                } else {
                    self.inventory.remove_group(id);
                }
                Ok(Self::accepted(section, action, id, None))
            }
            _ => Err(InventoryError::Unhandled { section, action }),
        }
    }

    fn create_member(&mut self, section: Section, id: String, name: &str, bucket_id: &str) -> Outcome {
        let (created, body) = if section == Section::Cluster {
            let c = proto::Cluster {
                id: id.clone(),
                name: name.to_owned(),
                bucket_id: bucket_id.to_owned(),
            };
            (Payload::Cluster(c.clone()), Body::Clusters(vec![c]))
        } else {
            let g = proto::Group {
                id: id.clone(),
                name: name.to_owned(),
                bucket_id: bucket_id.to_owned(),
            };
            (Payload::Group(g.clone()), Body::Groups(vec![g]))
        };
        self.mirror(section, Action::Create, &created)?;
        match created {
            Payload::Cluster(c) => self.inventory.insert_cluster(c),
            Payload::Group(g) => self.inventory.insert_group(g),
            _ => {}
        }
        Ok(Self::accepted(section, Action::Create, &id, Some(body)))
    }

    fn node(&mut self, action: Action, payload: &Payload) -> Outcome {
        let wrap = |v: Vec<proto::Node>| Some(Body::Nodes(v));
        match (action, payload) {
            (Action::List, _) => Ok(Handled::done(wrap(self.inventory.nodes(None)))),
            (Action::Search, Payload::Filter(f)) => {
                Ok(Handled::done(wrap(self.inventory.nodes(Some(f)))))
            }
            (Action::Show, Payload::Node(n)) => {
                let found = self
                    .inventory
                    .node(&n.id)
                    .cloned()
                    .ok_or_else(|| InventoryError::not_found("node", &n.id))?;
                Ok(Handled::done(wrap(vec![found])))
            }
            (Action::Add, Payload::Node(n)) => {
                require_name("node", &n.name)?;
                self.team_exists(&n.team_id)?;
                if self.inventory.node_named(&n.name).is_some() {
                    return Err(InventoryError::Conflict(format!("node {} already exists", n.name)));
                }
                let created = proto::Node {
                    id: fresh_id(&n.id),
                    bucket_id: None,
                    ..n.clone()
                };
                self.mirror(Section::Node, action, &Payload::Node(created.clone()))?;
                self.inventory.insert_node(created.clone());
                let id = created.id.clone();
                Ok(Self::accepted(Section::Node, action, &id, wrap(vec![created])))
            }
            (Action::Remove, Payload::Node(n)) => {
                if self.inventory.node(&n.id).is_none() {
                    return Err(InventoryError::not_found("node", &n.id));
                }
                self.mirror(Section::Node, action, payload)?;
                self.inventory.remove_node(&n.id);
                Ok(Self::accepted(Section::Node, action, &n.id, None))
            }
            _ => Err(mismatch(Section::Node, action)),
        }
    }

    fn node_config(&mut self, action: Action, payload: &Payload) -> Outcome {
        let Payload::NodeConfig(c) = payload else {
            return Err(mismatch(Section::NodeConfig, action));
        };
        let node = self
            .inventory
            .node(&c.node_id)
            .cloned()
            .ok_or_else(|| InventoryError::not_found("node", &c.node_id))?;

        match action {
            Action::Assign => {
                let bucket = self
                    .inventory
                    .bucket(&c.bucket_id)
                    .cloned()
                    .ok_or_else(|| InventoryError::not_found("bucket", &c.bucket_id))?;
                if !c.repository_id.is_empty() && bucket.repository_id != c.repository_id {
                    return Err(InventoryError::Invalid(format!(
                        "bucket {} is not part of repository {}",
                        bucket.id, c.repository_id
                    )));
                }
                if let Some(current) = node.bucket_id.as_deref()
                    && current != bucket.id
                {
                    return Err(InventoryError::Conflict(format!(
                        "node {} is already assigned to bucket {current}",
                        node.id
                    )));
                }
                let config = proto::NodeConfig {
                    node_id: node.id.clone(),
                    repository_id: bucket.repository_id.clone(),
                    bucket_id: bucket.id.clone(),
                };
                self.mirror(Section::NodeConfig, action, &Payload::NodeConfig(config.clone()))?;
                self.inventory.place_node(&node.id, Some(&bucket.id));
                Ok(Self::accepted(Section::NodeConfig, action, &node.id, Some(Body::NodeConfigs(vec![config]))))
            }
            Action::Unassign => {
                let Some(bucket_id) = node.bucket_id.clone() else {
                    return Err(InventoryError::not_found("node-config", &node.id));
                };
                self.mirror(Section::NodeConfig, action, payload)?;
                self.inventory.place_node(&node.id, None);
                let config = proto::NodeConfig {
                    node_id: node.id.clone(),
                    repository_id: self
                        .inventory
                        .bucket(&bucket_id)
                        .map(|b| b.repository_id.clone())
                        .unwrap_or_default(),
                    bucket_id,
                };
                Ok(Self::accepted(Section::NodeConfig, action, &node.id, Some(Body::NodeConfigs(vec![config]))))
            }
            _ => Err(InventoryError::Unhandled {
                section: Section::NodeConfig,
                action,
            }),
        }
    }

    fn monitoring(&mut self, action: Action, payload: &Payload) -> Outcome {
        let wrap = |v: Vec<proto::Monitoring>| Some(Body::Monitorings(v));
        match (action, payload) {
            (Action::List, _) => Ok(Handled::done(wrap(self.inventory.monitorings(None)))),
            (Action::Search, Payload::Filter(f)) => {
                Ok(Handled::done(wrap(self.inventory.monitorings(Some(f)))))
            }
            (Action::Show, Payload::Monitoring(m)) => {
                let found = self
                    .inventory
                    .monitoring(&m.id)
                    .cloned()
                    .ok_or_else(|| InventoryError::not_found("monitoring", &m.id))?;
                Ok(Handled::done(wrap(vec![found])))
            }
            (Action::Add, Payload::Monitoring(m)) => {
                require_name("monitoring", &m.name)?;
                self.team_exists(&m.team_id)?;
                if self.inventory.monitoring_named(&m.name).is_some() {
                    return Err(InventoryError::Conflict(format!(
                        "monitoring system {} already exists",
                        m.name
                    )));
                }
                let created = proto::Monitoring {
                    id: fresh_id(&m.id),
                    ..m.clone()
                };
                self.mirror(Section::Monitoring, action, &Payload::Monitoring(created.clone()))?;
                self.inventory.insert_monitoring(created.clone());
                Ok(Handled::done(wrap(vec![created])))
            }
            (Action::Remove, Payload::Monitoring(m)) => {
                if self.inventory.monitoring(&m.id).is_none() {
                    return Err(InventoryError::not_found("monitoring", &m.id));
                }
                self.mirror(Section::Monitoring, action, payload)?;
                self.inventory.remove_monitoring(&m.id);
                Ok(Handled::done(None))
            }
            _ => Err(mismatch(Section::Monitoring, action)),
        }
    }
}
