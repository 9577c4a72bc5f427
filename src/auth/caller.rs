//! Caller identity and role.

use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ServiceError;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    AsExpression,
    FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Moderator, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }

    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Moderator | Role::Admin)
    }
}

impl ToSql<Text, Pg> for Role {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for Role {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"user" => Ok(Role::User),
            b"moderator" => Ok(Role::Moderator),
            b"admin" => Ok(Role::Admin),
            _ => Err("Unrecognized role".into()),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            other => Err(ServiceError::Validation(format!("Invalid role: {other}"))),
        }
    }
}

/// An authenticated identity. `role` is always the persisted role, loaded
/// by the caller middleware or the store, never taken from the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub id: Uuid,
    pub role: Role,
}

impl Caller {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }
}

/// Who is performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Anonymous,
    User(Caller),
    /// The back-office process holding the service credential (scrapers,
    /// seeding, operator scripts).
    System,
}

impl Actor {
    pub fn user(id: Uuid, role: Role) -> Self {
        Actor::User(Caller::new(id, role))
    }

    pub fn caller(&self) -> Option<&Caller> {
        match self {
            Actor::User(caller) => Some(caller),
            _ => None,
        }
    }

    pub fn id(&self) -> Option<Uuid> {
        self.caller().map(|c| c.id)
    }

    pub fn role(&self) -> Option<Role> {
        self.caller().map(|c| c.role)
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Actor::System)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role() == Some(role)
    }

    /// Returns the caller identity or an `Unauthenticated` error.
    pub fn require_caller(&self) -> Result<&Caller, ServiceError> {
        self.caller().ok_or(ServiceError::Unauthenticated)
    }

    pub fn label(&self) -> String {
        match self {
            Actor::Anonymous => "anonymous".to_string(),
            Actor::User(c) => format!("{}:{}", c.role, c.id),
            Actor::System => "system".to_string(),
        }
    }
}
