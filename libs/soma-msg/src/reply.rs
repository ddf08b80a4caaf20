//! Typed handler results.

use secrecy::SecretString;
use uuid::Uuid;

use crate::proto;
use crate::request::Request;
use crate::section::{Action, Section};

/// Result codes. Numbers match HTTP statuses; the serializer decides what
/// reaches the wire.
pub mod codes {
    pub const OK: u16 = 200;
    pub const ACCEPTED: u16 = 202;
    pub const BAD_REQUEST: u16 = 400;
    pub const UNAUTHORIZED: u16 = 401;
    pub const FORBIDDEN: u16 = 403;
    pub const NOT_FOUND: u16 = 404;
    pub const NOT_ACCEPTABLE: u16 = 406;
    pub const CONFLICT: u16 = 409;
    pub const SERVER_ERROR: u16 = 500;
    pub const NOT_IMPLEMENTED: u16 = 501;
    pub const UNAVAILABLE: u16 = 503;
}

/// Result entities, one variant per section result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Categories(Vec<proto::CategoryDef>),
    Sections(Vec<proto::SectionDef>),
    Actions(Vec<proto::ActionDef>),
    Permissions(Vec<proto::Permission>),
    Grants(Vec<proto::Grant>),
    Teams(Vec<proto::Team>),
    Users(Vec<proto::User>),
    Repositories(Vec<proto::Repository>),
    Buckets(Vec<proto::Bucket>),
    Clusters(Vec<proto::Cluster>),
    Groups(Vec<proto::Group>),
    Nodes(Vec<proto::Node>),
    NodeConfigs(Vec<proto::NodeConfig>),
    Monitorings(Vec<proto::Monitoring>),
    System(Vec<proto::SystemOperation>),
    Tree(proto::Tree),
}

/// Ordered key/value audit fields written while deciding a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditTrail(Vec<(String, String)>);

impl AuditTrail {
    pub fn record(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    /// Last value recorded under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn extend(&mut self, other: AuditTrail) {
        self.0.extend(other.0);
    }
}

/// Supervisor-specific result.
#[derive(Debug, Default)]
pub struct SupervisorReply {
    pub verdict: u16,
    pub kex: Option<proto::Kex>,
    /// Opaque encrypted response body.
    pub data: Vec<u8>,
    /// Login confirmed by a successful basic authentication.
    pub user: Option<String>,
    pub token: Option<SecretString>,
}

/// Reply sent back on the envelope's channel.
#[derive(Debug)]
pub struct Reply {
    pub request_id: Uuid,
    pub section: Section,
    pub action: Action,
    pub code: u16,
    pub error: Option<String>,
    pub body: Option<Body>,
    pub job_id: Option<String>,
    pub supervisor: Option<SupervisorReply>,
    pub audit: AuditTrail,
}

impl Reply {
    /// Empty reply addressed to `request`; defaults to 500 until a result is set.
    #[must_use]
    pub fn for_request(request: &Request) -> Self {
        Self {
            request_id: request.id,
            section: request.section,
            action: request.action,
            code: codes::SERVER_ERROR,
            error: None,
            body: None,
            job_id: None,
            supervisor: None,
            audit: request.audit.clone(),
        }
    }

    #[must_use]
    pub fn ok(mut self, body: Option<Body>) -> Self {
        self.code = codes::OK;
        self.body = body;
        self
    }

    #[must_use]
    pub fn accepted(mut self, job_id: impl Into<String>, body: Option<Body>) -> Self {
        self.code = codes::ACCEPTED;
        self.job_id = Some(job_id.into());
        self.body = body;
        self
    }

    #[must_use]
    pub fn fail(mut self, code: u16, error: impl Into<String>) -> Self {
        self.code = code;
        self.error = Some(error.into());
        self
    }

    #[must_use]
    pub fn bad_request(self, error: impl Into<String>) -> Self {
        self.fail(codes::BAD_REQUEST, error)
    }

    #[must_use]
    pub fn not_found(self, error: impl Into<String>) -> Self {
        self.fail(codes::NOT_FOUND, error)
    }

    #[must_use]
    pub fn server_error(self, error: impl Into<String>) -> Self {
        self.fail(codes::SERVER_ERROR, error)
    }

    #[must_use]
    pub fn not_implemented(self) -> Self {
        let error = format!(
            "section {} does not implement action {}",
            self.section, self.action
        );
        self.fail(codes::NOT_IMPLEMENTED, error)
    }

    #[must_use]
    pub fn with_supervisor(mut self, supervisor: SupervisorReply) -> Self {
        self.code = supervisor.verdict;
        self.supervisor = Some(supervisor);
        self
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, codes::OK | codes::ACCEPTED)
    }
}
