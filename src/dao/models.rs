use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::Role,
    state::{match_machine::MatchStatus, request_machine::RequestStatus},
};

/// Academy as far as the lifecycle engines need it: display fields and the player roster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AcademyEntity {
    /// Primary key of the academy.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Public logo URL.
    pub logo: Option<String>,
    /// Contact phone number.
    pub phone: Option<String>,
    /// Users on the academy roster (no duplicates).
    pub players: Vec<Uuid>,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

/// Registered account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserEntity {
    /// Primary key of the user.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Role granted to the account.
    pub role: Role,
    /// Academy the account manages, for academy accounts.
    pub academy_id: Option<Uuid>,
}

/// Which side hosts the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HomeAway {
    /// Played at the creating academy.
    Home,
    /// Played at the opponent.
    Away,
}

/// Latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPointEntity {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

/// Match persisted by the storage layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEntity {
    /// Primary key of the match.
    pub id: Uuid,
    /// Academy that created the request.
    pub academy: Uuid,
    /// Academy that accepted; unset while requested.
    pub opponent: Option<Uuid>,
    /// User who created the match.
    pub creator_id: Uuid,
    /// Normalized age group label.
    pub age_group: String,
    /// Kick-off time.
    pub date_time: SystemTime,
    /// Which side hosts the match.
    pub home_away: HomeAway,
    /// Free-text venue description.
    pub location_description: String,
    /// Venue coordinates, when known.
    pub location_geo: Option<GeoPointEntity>,
    /// Contact phone for the fixture.
    pub phone: String,
    /// Free-text duration, e.g. `90 minutes`.
    pub duration: Option<String>,
    /// Short description; defaults to `Friendly match`.
    pub description: String,
    /// Current lifecycle status.
    pub status: MatchStatus,
    /// Set when, and only when, the match is finished.
    pub finished_at: Option<SystemTime>,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Refreshed on every write; the sweeper keys on it.
    pub updated_at: SystemTime,
}

/// Fields written by a match status transition.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchChange {
    /// Status after the transition.
    pub status: MatchStatus,
    /// Opponent to record, only when entering `confirmed`.
    pub opponent: Option<Uuid>,
    /// Finish timestamp, only when entering `finished`.
    pub finished_at: Option<SystemTime>,
    /// Write timestamp stored with the change.
    pub updated_at: SystemTime,
}

impl MatchChange {
    /// Apply the change to an in-memory record.
    pub fn apply_to(&self, record: &mut MatchEntity) {
        record.status = self.status;
        if let Some(opponent) = self.opponent {
            record.opponent = Some(opponent);
        }
        if let Some(finished_at) = self.finished_at {
            record.finished_at = Some(finished_at);
        }
        record.updated_at = self.updated_at;
    }
}

/// Ordering applied to match listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchOrder {
    /// Chronological by kick-off, for public and per-academy views.
    #[default]
    DateTimeAsc,
    /// Newest first, for administration.
    CreatedAtDesc,
}

/// Filter and pagination for match listings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchQuery {
    /// Restrict to one status.
    pub status: Option<MatchStatus>,
    /// Restrict to matches created by this academy.
    pub academy: Option<Uuid>,
    /// Restrict to matches where this academy is creator or opponent.
    pub involving: Option<Uuid>,
    /// Sort order of the results.
    pub order: MatchOrder,
    /// Records to skip before the page starts.
    pub skip: u64,
    /// Page size; `None` returns everything.
    pub limit: Option<i64>,
}

impl MatchQuery {
    /// Whether a record passes the filter part of the query.
    pub fn matches(&self, record: &MatchEntity) -> bool {
        self.status.is_none_or(|status| record.status == status)
            && self.academy.is_none_or(|academy| record.academy == academy)
            && self.involving.is_none_or(|academy| {
                record.academy == academy || record.opponent == Some(academy)
            })
    }
}

/// Player request persisted by the storage layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRequestEntity {
    /// Primary key of the request.
    pub id: Uuid,
    /// Requesting user.
    pub user: Uuid,
    /// Target academy.
    pub academy: Uuid,
    /// Requesting user's display name at filing time.
    pub user_name: String,
    /// Requesting user's email at filing time.
    pub user_email: String,
    /// Academy name at filing time.
    pub academy_name: String,
    /// Current lifecycle status.
    pub status: RequestStatus,
    /// Note from the player.
    pub message: Option<String>,
    /// Player age in years.
    pub age: Option<u8>,
    /// Preferred playing position.
    pub position: Option<String>,
    /// Optional note left by the academy when deciding.
    pub response_message: Option<String>,
    /// Set once, on rejection; the record is purged after this instant.
    pub expire_at: Option<SystemTime>,
    /// Filing timestamp.
    pub created_at: SystemTime,
    /// Refreshed on every write.
    pub updated_at: SystemTime,
}

/// Fields written when a pending request is decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestChange {
    /// Status after the decision.
    pub status: RequestStatus,
    /// Expiry to record, only when rejecting.
    pub expire_at: Option<SystemTime>,
    /// Note to store alongside the decision.
    pub response_message: Option<String>,
    /// Write timestamp stored with the change.
    pub updated_at: SystemTime,
}

impl RequestChange {
    /// Apply the change to an in-memory record.
    pub fn apply_to(&self, record: &mut PlayerRequestEntity) {
        record.status = self.status;
        if let Some(expire_at) = self.expire_at {
            record.expire_at = Some(expire_at);
        }
        if self.response_message.is_some() {
            record.response_message = self.response_message.clone();
        }
        record.updated_at = self.updated_at;
    }
}

/// Filter for player request listings; results are newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestQuery {
    /// Restrict to requests filed by this user.
    pub user: Option<Uuid>,
    /// Restrict to requests addressed to this academy.
    pub academy: Option<Uuid>,
}

impl RequestQuery {
    /// Whether a record passes the filter.
    pub fn matches(&self, record: &PlayerRequestEntity) -> bool {
        self.user.is_none_or(|user| record.user == user)
            && self.academy.is_none_or(|academy| record.academy == academy)
    }
}
