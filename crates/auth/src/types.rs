//! Identity and request types
//!
//! Wire shapes of the admin endpoints and the read-only identity snapshot
//! the session keeps from the last successful identity check.

use serde::{Deserialize, Serialize};

pub const ROLE_USER: &str = "ROLE_USER";
pub const ROLE_ADMIN: &str = "ROLE_ADMIN";

/// Read-only snapshot of the signed-in administrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: i64,
    pub email: String,
    pub display_name: String,
}

/// One granted authority, sent either as a bare string or as an object
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Authority {
    Name(String),
    Granted { authority: String },
}

impl Authority {
    pub fn name(&self) -> &str {
        match self {
            Authority::Name(name) => name,
            Authority::Granted { authority } => authority,
        }
    }
}

/// `GET /admin/info` body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminInfo {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub authorities: Vec<Authority>,
}

impl AdminInfo {
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            email: self.email.clone(),
            display_name: self.name.clone(),
        }
    }

    pub fn authority_names(&self) -> Vec<String> {
        self.authorities
            .iter()
            .map(|a| a.name().to_string())
            .collect()
    }
}

/// Role flags derived from a list of authority names
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RoleSet {
    pub is_user: bool,
    pub is_admin: bool,
}

impl RoleSet {
    pub fn from_authorities<S: AsRef<str>>(authorities: &[S]) -> Self {
        authorities
            .iter()
            .fold(RoleSet::default(), |roles, a| match a.as_ref() {
                ROLE_USER => RoleSet {
                    is_user: true,
                    ..roles
                },
                ROLE_ADMIN => RoleSet {
                    is_admin: true,
                    ..roles
                },
                _ => roles,
            })
    }
}

/// Partial identity update merged before re-validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityPatch {
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl IdentityPatch {
    pub fn apply_to(&self, identity: &mut Identity) {
        if let Some(email) = &self.email {
            identity.email = email.clone();
        }
        if let Some(name) = &self.display_name {
            identity.display_name = name.clone();
        }
    }
}

/// `POST /login` body
#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

impl std::fmt::Debug for LoginRequest<'_> {
    #[mutants::skip] // Debug output only
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// `POST /admin` and `PUT /admin` body
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminForm {
    pub email: String,
    pub name: String,
    pub password: String,
    /// Single authority name, e.g. `ROLE_ADMIN`
    pub authorities: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
}

impl AdminForm {
    /// The identity fields this form changes
    pub fn patch(&self) -> IdentityPatch {
        IdentityPatch {
            email: Some(self.email.clone()),
            display_name: Some(self.name.clone()),
        }
    }
}

impl std::fmt::Debug for AdminForm {
    #[mutants::skip] // Debug output only
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminForm")
            .field("email", &self.email)
            .field("name", &self.name)
            .field("password", &"[REDACTED]")
            .field("authorities", &self.authorities)
            .finish()
    }
}
