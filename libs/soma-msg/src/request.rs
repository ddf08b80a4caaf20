//! The request envelope and its one-shot reply channel.

use std::fmt;
use std::time::Duration;

use secrecy::SecretString;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::proto;
use crate::reply::{AuditTrail, Reply};
use crate::section::{Action, Section};

/// Typed payload of a request, one variant per entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Payload {
    #[default]
    None,
    Category(proto::CategoryDef),
    Section(proto::SectionDef),
    Action(proto::ActionDef),
    Permission(proto::Permission),
    Grant(proto::Grant),
    Team(proto::Team),
    User(proto::User),
    Repository(proto::Repository),
    Bucket(proto::Bucket),
    Cluster(proto::Cluster),
    Group(proto::Group),
    Node(proto::Node),
    NodeConfig(proto::NodeConfig),
    Monitoring(proto::Monitoring),
    System(proto::SystemOperation),
    Filter(proto::Filter),
}

/// Identifiers of the objects a request touches, as far as they are known.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectIds {
    pub repository: Option<String>,
    pub bucket: Option<String>,
    pub cluster: Option<String>,
    pub group: Option<String>,
    pub node: Option<String>,
    pub team: Option<String>,
    pub monitoring: Option<String>,
}

/// The tuple the authorization evaluator decides on.
///
/// Normally mirrors the envelope; multi-step adapters rewrite it to
/// authorize a related operation first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    pub subject: String,
    pub section: Section,
    pub action: Action,
    pub objects: ObjectIds,
}

/// Sub-task of a request for the supervisor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SupervisorTask {
    #[default]
    None,
    BasicAuth,
    Kex,
    Token,
    Password,
    Activate,
    Invalidate,
}

/// Credential and key exchange material for the supervisor.
#[derive(Default)]
pub struct Supervisor {
    pub task: SupervisorTask,
    pub user: String,
    pub token: Option<SecretString>,
    pub kex_id: String,
    pub kex: Option<proto::Kex>,
    /// Opaque encrypted request body.
    pub data: Vec<u8>,
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("task", &self.task)
            .field("user", &self.user)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("kex_id", &self.kex_id)
            .field("kex", &self.kex)
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// Failure to obtain a reply for a dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReplyError {
    #[error("handler did not reply within {0:?}")]
    Timeout(Duration),
    #[error("handler dropped the request without replying")]
    Dropped,
}

/// Caller side of the reply channel.
#[derive(Debug)]
pub struct Pending {
    rx: oneshot::Receiver<Reply>,
}

impl Pending {
    /// Waits for the handler's reply, at most `deadline`.
    ///
    /// # Errors
    /// [`ReplyError::Timeout`] when the deadline passes first and
    /// [`ReplyError::Dropped`] when the handler discarded the envelope.
    pub async fn wait(self, deadline: Duration) -> Result<Reply, ReplyError> {
        match tokio::time::timeout(deadline, self.rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(ReplyError::Dropped),
            Err(_) => Err(ReplyError::Timeout(deadline)),
        }
    }
}

/// Envelope flowing from the REST boundary through handlers.
#[derive(Debug)]
pub struct Request {
    pub id: Uuid,
    pub section: Section,
    pub action: Action,
    /// Authenticated login name.
    pub author: String,
    pub remote_addr: String,
    pub request_uri: String,
    pub payload: Payload,
    pub auth: Authorization,
    pub supervisor: Supervisor,
    /// How the authorization verdict was reached; copied onto the reply.
    pub audit: AuditTrail,
    /// Audit logger; every handler logs inside this span.
    pub log: tracing::Span,
    reply: Option<oneshot::Sender<Reply>>,
}

impl Request {
    /// Builds an envelope with a fresh reply channel.
    #[must_use]
    pub fn new(id: Uuid, section: Section, action: Action) -> (Self, Pending) {
        let (tx, rx) = oneshot::channel();
        let mut request = Self::detached(section, action, Payload::None);
        request.id = id;
        request.log = request_span(id, section, action);
        request.reply = Some(tx);
        (request, Pending { rx })
    }

    /// Builds an envelope nobody waits for, such as a cache update event.
    #[must_use]
    pub fn detached(section: Section, action: Action, payload: Payload) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            section,
            action,
            author: String::new(),
            remote_addr: String::new(),
            request_uri: String::new(),
            payload,
            auth: Authorization {
                subject: String::new(),
                section,
                action,
                objects: ObjectIds::default(),
            },
            supervisor: Supervisor::default(),
            audit: AuditTrail::default(),
            log: request_span(id, section, action),
            reply: None,
        }
    }

    /// Shorthand for a cache update event.
    #[must_use]
    pub fn cache_update(section: Section, action: Action, payload: Payload) -> Self {
        Self::detached(section, action, payload)
    }

    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self.auth.subject.clone_from(&self.author);
        self.log.record("subject", self.author.as_str());
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    #[must_use]
    pub fn with_objects(mut self, objects: ObjectIds) -> Self {
        self.auth.objects = objects;
        self
    }

    #[must_use]
    pub fn with_origin(mut self, remote_addr: impl Into<String>, uri: impl Into<String>) -> Self {
        self.remote_addr = remote_addr.into();
        self.request_uri = uri.into();
        self
    }

    /// Whether a caller is still waiting for this request.
    #[must_use]
    pub fn expects_reply(&self) -> bool {
        self.reply.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Sends the reply. Never blocks; a caller that walked away is ignored.
    pub fn reply(&mut self, reply: Reply) {
        if let Some(tx) = self.reply.take()
            && tx.send(reply).is_err()
        {
            tracing::debug!(parent: &self.log, "reply receiver gone, dropping reply");
        }
    }
}

fn request_span(id: Uuid, section: Section, action: Action) -> tracing::Span {
    tracing::info_span!(
        "request",
        request_id = %id,
        section = %section,
        action = %action,
        subject = tracing::field::Empty,
    )
}
