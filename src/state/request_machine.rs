use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::lifecycle::Lifecycle;

/// Status of a player's request to join an academy roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// Awaiting a decision from the academy.
    Pending,
    /// The player joined the roster.
    Approved,
    /// The academy declined; the record expires shortly after.
    Rejected,
}

impl RequestStatus {
    /// Canonical wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }
}

impl Lifecycle for RequestStatus {
    const KIND: &'static str = "player request";
    const EDGES: &'static [(Self, Self)] = &[
        (RequestStatus::Pending, RequestStatus::Approved),
        (RequestStatus::Pending, RequestStatus::Rejected),
    ];
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_has_outgoing_edges() {
        assert!(RequestStatus::EDGES
            .iter()
            .all(|(from, _)| *from == RequestStatus::Pending));
        assert_eq!(
            RequestStatus::sources_into(RequestStatus::Approved),
            vec![RequestStatus::Pending]
        );
    }

    #[test]
    fn decisions_cannot_be_revisited() {
        assert!(RequestStatus::check(RequestStatus::Pending, RequestStatus::Rejected).is_ok());
        assert!(RequestStatus::check(RequestStatus::Approved, RequestStatus::Rejected).is_err());
        assert!(RequestStatus::check(RequestStatus::Rejected, RequestStatus::Approved).is_err());
        assert!(RequestStatus::check(RequestStatus::Pending, RequestStatus::Pending).is_err());
    }

    #[test]
    fn error_message_mentions_pending() {
        let err = RequestStatus::check(RequestStatus::Approved, RequestStatus::Rejected).unwrap_err();
        assert_eq!(
            err.to_string(),
            "player request is approved; moving to rejected requires one of [pending]"
        );
    }
}
