use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{AcademyEntity, GeoPointEntity, HomeAway, MatchEntity},
    dto::{format_system_time, validation::validate_rfc3339},
    state::match_machine::MatchStatus,
};

/// Payload used by an academy to open a match request.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMatchRequest {
    /// Comma separated age groups, or `Mixed Ages`.
    #[validate(length(min = 1, message = "ageGroup is required"))]
    pub age_group: String,
    /// Kick-off time (RFC 3339).
    #[validate(custom(function = "validate_rfc3339"))]
    pub date_time: String,
    /// Which side hosts the match.
    pub home_away: HomeAway,
    /// Free-text venue description.
    #[validate(length(min = 1, message = "locationDescription is required"))]
    pub location_description: String,
    /// Venue coordinates.
    #[validate(nested)]
    pub location_geo: Option<GeoPointDto>,
    /// Contact phone for the fixture.
    #[validate(length(min = 1, message = "phone is required"))]
    pub phone: String,
    /// Free-text duration.
    #[serde(default)]
    pub duration: Option<String>,
    /// Defaults to "Friendly match".
    #[serde(default)]
    pub description: Option<String>,
}

/// Latitude/longitude pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, Validate)]
pub struct GeoPointDto {
    /// Latitude in degrees.
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    /// Longitude in degrees.
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,
}

impl From<GeoPointDto> for GeoPointEntity {
    fn from(value: GeoPointDto) -> Self {
        Self {
            lat: value.lat,
            lng: value.lng,
        }
    }
}

impl From<GeoPointEntity> for GeoPointDto {
    fn from(value: GeoPointEntity) -> Self {
        Self {
            lat: value.lat,
            lng: value.lng,
        }
    }
}

/// Body of the generic status transition.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateMatchStatusRequest {
    /// Target status; `accepted` is read as `confirmed`.
    pub status: MatchStatus,
}

/// Filters and pagination for the administrative listing.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AdminMatchListQuery {
    /// Only matches in this status.
    pub status: Option<MatchStatus>,
    /// Creating academy.
    pub academy: Option<Uuid>,
    /// 1-based page number (default 1).
    pub page: Option<u64>,
    /// Page size (default 20, at most 100).
    pub limit: Option<u64>,
}

/// Display fields of an academy attached to a match.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AcademySummary {
    /// Academy id.
    pub id: Uuid,
    /// Missing when the academy record no longer exists.
    pub name: Option<String>,
    /// Public logo URL.
    pub logo: Option<String>,
    /// Contact phone.
    pub phone: Option<String>,
}

impl AcademySummary {
    /// Summary for an academy whose record could not be loaded.
    pub fn unknown(id: Uuid) -> Self {
        Self {
            id,
            name: None,
            logo: None,
            phone: None,
        }
    }
}

impl From<&AcademyEntity> for AcademySummary {
    fn from(value: &AcademyEntity) -> Self {
        Self {
            id: value.id,
            name: Some(value.name.clone()),
            logo: value.logo.clone(),
            phone: value.phone.clone(),
        }
    }
}

/// Match as returned to clients, with academies populated.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchResponse {
    /// Match id.
    pub id: Uuid,
    /// Creating academy.
    pub academy: AcademySummary,
    /// Accepting academy, once confirmed.
    pub opponent: Option<AcademySummary>,
    /// User who created the match.
    pub creator_id: Uuid,
    /// Normalized age groups.
    pub age_group: String,
    /// Kick-off time (RFC 3339).
    pub date_time: String,
    /// Which side hosts the match.
    pub home_away: HomeAway,
    /// Venue description.
    pub location_description: String,
    /// Venue coordinates.
    pub location_geo: Option<GeoPointDto>,
    /// Contact phone.
    pub phone: String,
    /// Free-text duration.
    pub duration: Option<String>,
    /// Short description.
    pub description: String,
    /// Lifecycle status.
    pub status: MatchStatus,
    /// Finish time (RFC 3339), only when finished.
    pub finished_at: Option<String>,
    /// Creation time (RFC 3339).
    pub created_at: String,
    /// Last write (RFC 3339).
    pub updated_at: String,
}

impl MatchResponse {
    /// Build the response; `lookup` resolves academy ids to loaded records.
    pub fn new<'a>(
        record: MatchEntity,
        lookup: impl Fn(Uuid) -> Option<&'a AcademyEntity>,
    ) -> Self {
        let summary =
            |id: Uuid| lookup(id).map_or_else(|| AcademySummary::unknown(id), AcademySummary::from);

        Self {
            id: record.id,
            academy: summary(record.academy),
            opponent: record.opponent.map(&summary),
            creator_id: record.creator_id,
            age_group: record.age_group,
            date_time: format_system_time(record.date_time),
            home_away: record.home_away,
            location_description: record.location_description,
            location_geo: record.location_geo.map(Into::into),
            phone: record.phone,
            duration: record.duration,
            description: record.description,
            status: record.status,
            finished_at: record.finished_at.map(format_system_time),
            created_at: format_system_time(record.created_at),
            updated_at: format_system_time(record.updated_at),
        }
    }
}

/// One page of the administrative listing.
#[derive(Debug, Serialize, ToSchema)]
pub struct MatchPage {
    /// Matches on this page.
    pub items: Vec<MatchResponse>,
    /// Matches passing the filters across all pages.
    pub total: u64,
    /// 1-based page number.
    pub page: u64,
    /// Page size used.
    pub limit: u64,
}

#[cfg(test)]
mod tests {
    use validator::Validate;

    use super::*;

    fn payload(json: &str) -> CreateMatchRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn create_payload_accepts_minimal_body() {
        let request = payload(
            r#"{
                "ageGroup": "2010",
                "dateTime": "2026-05-01T18:30:00Z",
                "homeAway": "home",
                "locationDescription": "Main pitch",
                "phone": "+100"
            }"#,
        );
        assert!(request.validate().is_ok());
        assert!(request.description.is_none());
    }

    #[test]
    fn create_payload_rejects_bad_fields() {
        let request = payload(
            r#"{
                "ageGroup": "",
                "dateTime": "soon",
                "homeAway": "away",
                "locationDescription": "Main pitch",
                "locationGeo": { "lat": 120.0, "lng": 0.0 },
                "phone": "+100"
            }"#,
        );
        let errors = request.validate().unwrap_err();
        let fields = errors.errors();
        assert!(fields.contains_key("age_group"));
        assert!(fields.contains_key("date_time"));
        assert!(fields.contains_key("location_geo"));
    }

    #[test]
    fn status_body_accepts_legacy_alias() {
        let body: UpdateMatchStatusRequest =
            serde_json::from_str(r#"{ "status": "accepted" }"#).unwrap();
        assert_eq!(body.status, MatchStatus::Confirmed);
    }
}
