//! Service implementation for the static supervisor.

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::{DashMap, DashSet};
use secrecy::{ExposeSecret, SecretString};
use soma_msg::{Request, SupervisorReply, SupervisorTask, codes, proto};
use tracing::{debug, info};
use uuid::Uuid;

use super::credentials::{
    self, Activation, Changed, IssuedToken, PasswordChange, TokenRequest, secrets_match,
};
use super::error::SupervisorError;
use crate::config::SupervisorConfig;

struct Account {
    password: SecretString,
    tokens: Vec<SecretString>,
}

struct Exchange {
    client: proto::Kex,
    valid_until: DateTime<Utc>,
}

/// In-memory credential authority.
pub struct Service {
    accounts: DashMap<String, Account>,
    pending: DashSet<String>,
    exchanges: DashMap<String, Exchange>,
    min_password_length: usize,
    kex_ttl: TimeDelta,
}

impl Service {
    #[must_use]
    pub fn from_config(cfg: &SupervisorConfig) -> Self {
        let accounts = cfg
            .tokens
            .iter()
            .map(|(user, token)| {
                let account = Account {
                    password: SecretString::from(token.expose_secret()),
                    tokens: vec![SecretString::from(token.expose_secret())],
                };
                (user.clone(), account)
            })
            .collect();

        Self {
            accounts,
            pending: cfg.activation.pending.iter().cloned().collect(),
            exchanges: DashMap::new(),
            min_password_length: cfg.activation.min_password_length,
            kex_ttl: TimeDelta::from_std(cfg.kex_ttl).unwrap_or(TimeDelta::MAX),
        }
    }

    /// Runs the supervisor task carried by `request`.
    ///
    /// # Errors
    /// Returns the [`SupervisorError`] describing why the task was refused.
    pub fn handle(&self, request: &Request) -> Result<SupervisorReply, SupervisorError> {
        let sup = &request.supervisor;
        match sup.task {
            SupervisorTask::BasicAuth => {
                let token = sup.token.as_ref().ok_or(SupervisorError::InvalidCredentials)?;
                self.basic_auth(&sup.user, token)?;
                Ok(SupervisorReply {
                    verdict: codes::OK,
                    user: Some(sup.user.clone()),
                    token: Some(SecretString::from(token.expose_secret())),
                    ..SupervisorReply::default()
                })
            }
            SupervisorTask::Kex => {
                let client = sup
                    .kex
                    .as_ref()
                    .ok_or_else(|| SupervisorError::Malformed("missing kex".to_owned()))?;
                Ok(SupervisorReply {
                    verdict: codes::OK,
                    kex: Some(self.open_kex(client)?),
                    ..SupervisorReply::default()
                })
            }
            SupervisorTask::Token => Ok(data_reply(self.issue_token(&sup.kex_id, &sup.data)?)),
            SupervisorTask::Password => {
                Ok(data_reply(self.change_password(&sup.kex_id, &sup.data)?))
            }
            SupervisorTask::Activate => Ok(data_reply(self.activate(&sup.kex_id, &sup.data)?)),
            SupervisorTask::Invalidate => {
                let token = sup.token.as_ref().ok_or(SupervisorError::UnknownToken)?;
                self.invalidate(&sup.user, token)?;
                Ok(SupervisorReply {
                    verdict: codes::OK,
                    ..SupervisorReply::default()
                })
            }
            SupervisorTask::None => Err(SupervisorError::MissingTask),
        }
    }

    /// Verifies that `token` is an active token of `user`.
    ///
    /// # Errors
    /// [`SupervisorError::InvalidCredentials`] for unknown users and tokens.
    pub fn basic_auth(&self, user: &str, token: &SecretString) -> Result<(), SupervisorError> {
        let account = self
            .accounts
            .get(user)
            .ok_or(SupervisorError::InvalidCredentials)?;
        if account.tokens.iter().any(|t| secrets_match(t, token)) {
            Ok(())
        } else {
            info!(user, "basic authentication failed");
            Err(SupervisorError::InvalidCredentials)
        }
    }

    /// Records the client's key material and answers with the server's.
    ///
    /// # Errors
    /// [`SupervisorError::Malformed`] when the client omitted its key or IV.
    pub fn open_kex(&self, client: &proto::Kex) -> Result<proto::Kex, SupervisorError> {
        if client.public_key.is_empty() || client.initialization_vector.is_empty() {
            return Err(SupervisorError::Malformed(
                "kex requires publicKey and initializationVector".to_owned(),
            ));
        }
        let valid_until = Utc::now()
            .checked_add_signed(self.kex_ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let server = proto::Kex {
            id: Uuid::new_v4().to_string(),
            public_key: hex::encode(rand::random::<[u8; 32]>()),
            initialization_vector: hex::encode(rand::random::<[u8; 16]>()),
            valid_until: Some(valid_until),
        };
        self.exchanges.insert(
            server.id.clone(),
            Exchange {
                client: client.clone(),
                valid_until,
            },
        );
        debug!(kex_id = %server.id, "key exchange opened");
        Ok(server)
    }

    /// Consumes a key exchange; each one protects a single payload.
    fn take_kex(&self, kex_id: &str) -> Result<Exchange, SupervisorError> {
        let (_, exchange) = self
            .exchanges
            .remove(kex_id)
            .ok_or_else(|| SupervisorError::UnknownKex(kex_id.to_owned()))?;
        if exchange.valid_until < Utc::now() {
            return Err(SupervisorError::KexExpired(kex_id.to_owned()));
        }
        debug!(kex_id, client_key_len = exchange.client.public_key.len(), "key exchange used");
        Ok(exchange)
    }

    fn issue_token(&self, kex_id: &str, data: &[u8]) -> Result<Vec<u8>, SupervisorError> {
        self.take_kex(kex_id)?;
        let req: TokenRequest = credentials::decode(data)?;
        let mut account = self
            .accounts
            .get_mut(&req.user)
            .ok_or(SupervisorError::InvalidCredentials)?;
        if !secrets_match(&account.password, &req.password) {
            return Err(SupervisorError::InvalidCredentials);
        }
        let token = mint_token();
        account.tokens.push(SecretString::from(token.as_str()));
        info!(user = %req.user, "token issued");
        credentials::encode(&IssuedToken {
            user: req.user,
            token,
        })
    }

    fn change_password(&self, kex_id: &str, data: &[u8]) -> Result<Vec<u8>, SupervisorError> {
        self.take_kex(kex_id)?;
        let req: PasswordChange = credentials::decode(data)?;
        let mut account = self
            .accounts
            .get_mut(&req.user)
            .ok_or(SupervisorError::InvalidCredentials)?;
        if !secrets_match(&account.password, &req.password) {
            return Err(SupervisorError::InvalidCredentials);
        }
        self.check_policy(&req.user, &req.new_password)?;
        account.password = req.new_password;
        info!(user = %req.user, "password changed");
        credentials::encode(&Changed {
            user: req.user,
            changed: true,
        })
    }

    fn activate(&self, kex_id: &str, data: &[u8]) -> Result<Vec<u8>, SupervisorError> {
        self.take_kex(kex_id)?;
        let req: Activation = credentials::decode(data)?;
        if !self.pending.contains(&req.user) {
            return Err(SupervisorError::NotPending(req.user));
        }
        self.check_policy(&req.user, &req.password)?;
        self.pending.remove(&req.user);

        let token = mint_token();
        self.accounts.insert(
            req.user.clone(),
            Account {
                password: req.password,
                tokens: vec![SecretString::from(token.as_str())],
            },
        );
        info!(user = %req.user, "account activated");
        credentials::encode(&IssuedToken {
            user: req.user,
            token,
        })
    }

    /// Drops `token` from the active tokens of `user`.
    ///
    /// # Errors
    /// [`SupervisorError::UnknownToken`] when the token is not active.
    pub fn invalidate(&self, user: &str, token: &SecretString) -> Result<(), SupervisorError> {
        let mut account = self
            .accounts
            .get_mut(user)
            .ok_or(SupervisorError::UnknownToken)?;
        let before = account.tokens.len();
        account.tokens.retain(|t| !secrets_match(t, token));
        if account.tokens.len() == before {
            return Err(SupervisorError::UnknownToken);
        }
        info!(user, "token invalidated");
        Ok(())
    }

    fn check_policy(&self, user: &str, password: &SecretString) -> Result<(), SupervisorError> {
        let secret = password.expose_secret();
        if secret.chars().count() < self.min_password_length {
            return Err(SupervisorError::Policy(format!(
                "password must be at least {} characters long",
                self.min_password_length
            )));
        }
        if !user.is_empty() && secret.contains(user) {
            return Err(SupervisorError::Policy(
                "password must not contain the user name".to_owned(),
            ));
        }
        Ok(())
    }
}

fn mint_token() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}

fn data_reply(data: Vec<u8>) -> SupervisorReply {
    SupervisorReply {
        verdict: codes::OK,
        data,
        ..SupervisorReply::default()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::config::ActivationConfig;
    use soma_msg::{Action, Section};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn service() -> Service {
        let mut tokens = BTreeMap::new();
        tokens.insert("root".to_owned(), SecretString::from("root-token"));
        Service::from_config(&SupervisorConfig {
            tokens,
            activation: ActivationConfig {
                pending: vec!["carol".to_owned()],
                min_password_length: 8,
            },
            kex_ttl: Duration::from_secs(60),
        })
    }

    fn client_kex() -> proto::Kex {
        proto::Kex {
            public_key: "abcd".to_owned(),
            initialization_vector: "0102".to_owned(),
            ..proto::Kex::default()
        }
    }

    #[test]
    fn basic_auth_accepts_configured_token() {
        let svc = service();
        assert!(svc.basic_auth("root", &SecretString::from("root-token")).is_ok());
        assert!(matches!(
            svc.basic_auth("root", &SecretString::from("nope")),
            Err(SupervisorError::InvalidCredentials)
        ));
        assert!(svc.basic_auth("ghost", &SecretString::from("root-token")).is_err());
    }

    #[test]
    fn kex_is_single_use() {
        let svc = service();
        let kex = svc.open_kex(&client_kex()).unwrap();
        assert!(kex.valid_until.is_some());
        assert_eq!(kex.public_key.len(), 64);

        let body = br#"{"user":"root","password":"root-token"}"#;
        let data = svc.issue_token(&kex.id, body).unwrap();
        let issued: IssuedToken = serde_json::from_slice(&data).unwrap();
        assert_eq!(issued.user, "root");
        assert!(svc.basic_auth("root", &SecretString::from(issued.token.as_str())).is_ok());

        assert!(matches!(
            svc.issue_token(&kex.id, body),
            Err(SupervisorError::UnknownKex(_))
        ));
    }

    #[test]
    fn kex_requires_key_material() {
        let err = service().open_kex(&proto::Kex::default()).unwrap_err();
        assert_eq!(err.code(), codes::BAD_REQUEST);
    }

    #[test]
    fn activation_enforces_policy() {
        let svc = service();
        let kex = svc.open_kex(&client_kex()).unwrap();
        let err = svc
            .activate(&kex.id, br#"{"user":"carol","password":"short"}"#)
            .unwrap_err();
        assert_eq!(err.code(), codes::NOT_ACCEPTABLE);
        assert_eq!(err.to_string(), "password must be at least 8 characters long");

        let kex = svc.open_kex(&client_kex()).unwrap();
        let data = svc
            .activate(&kex.id, br#"{"user":"carol","password":"long enough pw"}"#)
            .unwrap();
        let issued: IssuedToken = serde_json::from_slice(&data).unwrap();
        assert!(svc.basic_auth("carol", &SecretString::from(issued.token.as_str())).is_ok());

        let kex = svc.open_kex(&client_kex()).unwrap();
        let err = svc
            .activate(&kex.id, br#"{"user":"carol","password":"long enough pw"}"#)
            .unwrap_err();
        assert_eq!(err.code(), codes::CONFLICT);
    }

    #[test]
    fn password_change_requires_current_password() {
        let svc = service();
        let kex = svc.open_kex(&client_kex()).unwrap();
        let err = svc
            .change_password(
                &kex.id,
                br#"{"user":"root","password":"wrong","newPassword":"brand new secret"}"#,
            )
            .unwrap_err();
        assert_eq!(err.code(), codes::UNAUTHORIZED);

        let kex = svc.open_kex(&client_kex()).unwrap();
        svc.change_password(
            &kex.id,
            br#"{"user":"root","password":"root-token","newPassword":"brand new secret"}"#,
        )
        .unwrap();

        let kex = svc.open_kex(&client_kex()).unwrap();
        assert!(
            svc.issue_token(&kex.id, br#"{"user":"root","password":"brand new secret"}"#)
                .is_ok()
        );
    }

    #[test]
    fn malformed_payload_is_rejected() {
        let svc = service();
        let kex = svc.open_kex(&client_kex()).unwrap();
        let err = svc.issue_token(&kex.id, b"\xff\xfe").unwrap_err();
        assert_eq!(err.code(), codes::BAD_REQUEST);
    }

    #[test]
    fn invalidate_drops_only_the_presented_token() {
        let svc = service();
        let token = SecretString::from("root-token");
        svc.invalidate("root", &token).unwrap();
        assert!(svc.basic_auth("root", &token).is_err());
        assert!(matches!(
            svc.invalidate("root", &token),
            Err(SupervisorError::UnknownToken)
        ));
    }

    #[test]
    fn handle_without_task_is_bad_request() {
        let request = Request::detached(Section::Supervisor, Action::Authenticate, soma_msg::Payload::None);
        let err = service().handle(&request).unwrap_err();
        assert_eq!(err.code(), codes::BAD_REQUEST);
    }
}
