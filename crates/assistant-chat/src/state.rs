//! Request state machine.
//!
//! A conversation is either idle or waiting on exactly one backend request:
//! - Idle -> Busy (query or upload submitted)
//! - Busy -> Idle (response applied, or reset)

use std::fmt;

use assistant_core::SessionId;

/// Identifies one outgoing request and the session it was issued under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestTicket {
    pub seq: u64,
    pub session: SessionId,
}

/// Operational state of a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestState {
    /// No request in flight. Input accepted.
    Idle,
    /// One request in flight. New submissions are rejected.
    Busy(RequestTicket),
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestState::Idle => write!(f, "idle"),
            RequestState::Busy(ticket) => write!(f, "busy(#{})", ticket.seq),
        }
    }
}

impl RequestState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &RequestState) -> bool {
        matches!(
            (self, target),
            (RequestState::Idle, RequestState::Busy(_)) | (RequestState::Busy(_), RequestState::Idle)
        )
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, RequestState::Busy(_))
    }

    /// Ticket of the request in flight, if any.
    pub fn ticket(&self) -> Option<&RequestTicket> {
        match self {
            RequestState::Idle => None,
            RequestState::Busy(ticket) => Some(ticket),
        }
    }
}
