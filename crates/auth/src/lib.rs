//! Session management for the Shelfdesk console
//!
//! Decodes issued credentials, runs the login / renewal / logout lifecycle
//! with its expiry countdown, and wraps the admin account endpoints.

mod admin;
mod claims;
mod config;
mod error;
mod jwt;
mod session;
mod state;
mod types;

pub use admin::{AdminApi, ADMIN_INFO_PATH, ADMIN_PATH};
pub use claims::{seconds_until, DecodedToken};
pub use config::SessionConfig;
pub use error::{DecodeError, SessionError};
pub use jwt::{decode_token, extract_issued_token, strip_bearer};
pub use session::{SessionController, SessionState, LOGIN_PATH, REFRESH_PATH};
pub use state::{SessionEvent, SessionGuardContext, SessionPhase, SessionStateMachine};
pub use types::{
    AdminForm, AdminInfo, Authority, Identity, IdentityPatch, LoginRequest, RoleSet, ROLE_ADMIN,
    ROLE_USER,
};
