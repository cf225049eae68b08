//! Session state machine
//!
//! Defines the session phases, the events that move between them and the
//! guard conditions for those moves. The controller owns timers and side
//! effects; this module only decides whether a move is legal.

use serde::{Deserialize, Serialize};
use shelfdesk_common::StateError;

/// Session phases
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    /// Stored credential not yet checked
    #[default]
    Initializing,
    Unauthenticated,
    Authenticated,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initializing => write!(f, "initializing"),
            Self::Unauthenticated => write!(f, "unauthenticated"),
            Self::Authenticated => write!(f, "authenticated"),
        }
    }
}

/// Events that trigger session transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// No credential is stored
    CredentialMissing,
    /// The identity check accepted the credential
    IdentityConfirmed,
    /// The identity check or decoding rejected the credential
    IdentityRejected,
    /// A fresh credential replaced the current one
    Renewed,
    /// The user (or a forced path) ended the session
    LoggedOut,
    /// The countdown reached zero or renewal failed
    Expired,
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CredentialMissing => write!(f, "credential_missing"),
            Self::IdentityConfirmed => write!(f, "identity_confirmed"),
            Self::IdentityRejected => write!(f, "identity_rejected"),
            Self::Renewed => write!(f, "renewed"),
            Self::LoggedOut => write!(f, "logged_out"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// Guard context for session transitions
#[derive(Debug, Clone)]
pub struct SessionGuardContext {
    /// Whether a credential is held at the time of the event
    pub has_credential: bool,
}

/// Session state machine
pub struct SessionStateMachine;

impl SessionStateMachine {
    /// Attempt a transition with guard conditions
    pub fn transition(
        current: SessionPhase,
        event: SessionEvent,
        context: Option<&SessionGuardContext>,
    ) -> Result<SessionPhase, StateError> {
        use SessionEvent as E;
        use SessionPhase as P;

        let next = match (current, event) {
            (P::Initializing | P::Unauthenticated, E::CredentialMissing) => P::Unauthenticated,
            (_, E::IdentityConfirmed) => {
                // Guard: an authenticated session always holds a credential
                if let Some(ctx) = context {
                    if !ctx.has_credential {
                        return Err(StateError::GuardFailed(
                            "Cannot authenticate without a credential".to_string(),
                        ));
                    }
                }
                P::Authenticated
            }
            (_, E::IdentityRejected) => P::Unauthenticated,
            (P::Authenticated, E::Renewed) => P::Authenticated,
            (P::Authenticated, E::LoggedOut | E::Expired) => P::Unauthenticated,

            _ => {
                return Err(StateError::InvalidTransition {
                    from: current.to_string(),
                    event: event.to_string(),
                });
            }
        };

        Ok(next)
    }

    /// Check if a transition is valid without performing it
    pub fn can_transition(
        current: SessionPhase,
        event: SessionEvent,
        context: Option<&SessionGuardContext>,
    ) -> bool {
        Self::transition(current, event, context).is_ok()
    }
}
