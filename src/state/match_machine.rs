use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::lifecycle::Lifecycle;

/// Status of a match negotiated between two academies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    /// Open request waiting for an opponent.
    Requested,
    /// An opponent accepted the request. Older clients and documents call this `accepted`.
    #[serde(alias = "accepted")]
    Confirmed,
    /// The creating academy closed the match; it is now awaiting cleanup.
    Finished,
    /// The request was withdrawn or turned down.
    Rejected,
}

impl MatchStatus {
    /// Canonical wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Requested => "requested",
            MatchStatus::Confirmed => "confirmed",
            MatchStatus::Finished => "finished",
            MatchStatus::Rejected => "rejected",
        }
    }
}

impl Lifecycle for MatchStatus {
    const KIND: &'static str = "match";
    const EDGES: &'static [(Self, Self)] = &[
        (MatchStatus::Requested, MatchStatus::Confirmed),
        (MatchStatus::Confirmed, MatchStatus::Finished),
        (MatchStatus::Requested, MatchStatus::Rejected),
        (MatchStatus::Confirmed, MatchStatus::Rejected),
    ];
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::lifecycle::InvalidTransition;

    const ALL: [MatchStatus; 4] = [
        MatchStatus::Requested,
        MatchStatus::Confirmed,
        MatchStatus::Finished,
        MatchStatus::Rejected,
    ];

    #[test]
    fn edge_table_allows_documented_moves_only() {
        let allowed = [
            (MatchStatus::Requested, MatchStatus::Confirmed),
            (MatchStatus::Confirmed, MatchStatus::Finished),
            (MatchStatus::Requested, MatchStatus::Rejected),
            (MatchStatus::Confirmed, MatchStatus::Rejected),
        ];

        for from in ALL {
            for to in ALL {
                let expected = allowed.contains(&(from, to));
                assert_eq!(
                    MatchStatus::check(from, to).is_ok(),
                    expected,
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn finished_and_rejected_are_terminal() {
        for to in ALL {
            assert!(MatchStatus::check(MatchStatus::Finished, to).is_err());
            assert!(MatchStatus::check(MatchStatus::Rejected, to).is_err());
        }
    }

    #[test]
    fn sources_into_confirmed_is_requested_only() {
        assert_eq!(
            MatchStatus::sources_into(MatchStatus::Confirmed),
            vec![MatchStatus::Requested]
        );
        assert_eq!(
            MatchStatus::sources_into(MatchStatus::Rejected),
            vec![MatchStatus::Requested, MatchStatus::Confirmed]
        );
        assert!(MatchStatus::sources_into(MatchStatus::Requested).is_empty());
    }

    #[test]
    fn invalid_transition_names_required_source() {
        let err = MatchStatus::check(MatchStatus::Requested, MatchStatus::Finished).unwrap_err();
        assert_eq!(
            err,
            InvalidTransition {
                from: MatchStatus::Requested,
                to: MatchStatus::Finished
            }
        );
        assert_eq!(
            err.to_string(),
            "match is requested; moving to finished requires one of [confirmed]"
        );
    }

    #[test]
    fn accepted_is_read_as_confirmed() {
        let status: MatchStatus = serde_json::from_str("\"accepted\"").unwrap();
        assert_eq!(status, MatchStatus::Confirmed);
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"confirmed\"");
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(serde_json::from_str::<MatchStatus>("\"live\"").is_err());
    }
}
