//! Names of everything the fabric routes on.
//!
//! Sections and actions are the two-level name of every operation; both
//! the authorization evaluator and the handler registry key on them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A name that does not belong to one of the closed vocabularies below.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{name}'")]
pub struct ParseNameError {
    pub kind: &'static str,
    pub name: String,
}

macro_rules! named_enum {
    (
        $(#[$meta:meta])*
        pub enum $ty:ident ($kind:literal) {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $ty {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $ty {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ParseNameError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ParseNameError {
                        kind: $kind,
                        name: other.to_owned(),
                    }),
                }
            }
        }
    };
}

named_enum! {
    /// Top-level name of an operation.
    pub enum Section ("section") {
        Supervisor => "supervisor",
        System => "system",
        Category => "category",
        Section => "section",
        Action => "action",
        Permission => "permission",
        Right => "right",
        Team => "team",
        User => "user",
        Admin => "admin",
        Tool => "tool",
        Repository => "repository",
        RepositoryConfig => "repository-config",
        TeamRepository => "team-repository",
        Bucket => "bucket",
        Cluster => "cluster",
        Group => "group",
        Node => "node",
        NodeConfig => "node-config",
        CheckConfig => "check-config",
        Instance => "instance",
        PropertyCustom => "property-custom",
        PropertyService => "property-service",
        Monitoring => "monitoring",
        Capability => "capability",
        Deployment => "deployment",
    }
}

named_enum! {
    /// Second-level name of an operation within a section.
    pub enum Action ("action") {
        List => "list",
        Show => "show",
        Search => "search",
        Add => "add",
        Remove => "remove",
        Create => "create",
        Destroy => "destroy",
        Update => "update",
        Purge => "purge",
        Assign => "assign",
        Unassign => "unassign",
        Grant => "grant",
        Revoke => "revoke",
        Map => "map",
        Unmap => "unmap",
        Tree => "tree",
        Authenticate => "authenticate",
        Kex => "kex",
        Token => "token",
        Password => "password",
        Activate => "activate",
        Invalidate => "invalidate",
        StopRepository => "stop-repository",
        RebuildRepository => "rebuild-repository",
        RestartRepository => "restart-repository",
    }
}

impl Action {
    /// Read-only collection actions. Assessing them accepts a grant on any object.
    #[must_use]
    pub const fn is_collection_read(self) -> bool {
        matches!(self, Self::List | Self::Search)
    }

    /// Administrative operations accepted by the `system` section.
    #[must_use]
    pub const fn is_system_operation(self) -> bool {
        matches!(
            self,
            Self::StopRepository | Self::RebuildRepository | Self::RestartRepository
        )
    }
}

named_enum! {
    /// Authorization domain of a section and of every permission.
    pub enum Category ("category") {
        Omnipotence => "omnipotence",
        System => "system",
        Global => "global",
        Permission => "permission",
        Operation => "operation",
        Repository => "repository",
        Team => "team",
        Monitoring => "monitoring",
    }
}

named_enum! {
    /// Kind of party a grant is recorded for.
    pub enum SubjectKind ("subject kind") {
        User => "user",
        Admin => "admin",
        Tool => "tool",
        Team => "team",
    }
}

impl SubjectKind {
    /// Tags an authenticated login name by its prefix.
    #[must_use]
    pub fn from_user_name(name: &str) -> Self {
        if name.starts_with("admin_") {
            Self::Admin
        } else if name.starts_with("tool_") {
            Self::Tool
        } else {
            Self::User
        }
    }

    /// Only human users inherit the rights of their team.
    #[must_use]
    pub const fn inherits_team_rights(self) -> bool {
        matches!(self, Self::User)
    }
}
