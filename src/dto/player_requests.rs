use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::PlayerRequestEntity, dto::format_system_time,
    state::request_machine::RequestStatus,
};

/// Payload sent by a user asking to join an academy.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlayerRequest {
    /// Note to the academy.
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub message: Option<String>,
    /// Player age in years.
    #[serde(default)]
    #[validate(range(min = 3, max = 99))]
    pub age: Option<u8>,
    /// Preferred playing position.
    #[serde(default)]
    #[validate(length(max = 100))]
    pub position: Option<String>,
}

/// Academy decision on a pending request.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DecidePlayerRequest {
    /// `approved` or `rejected`.
    pub status: RequestStatus,
    /// Optional note shown to the player.
    #[serde(default, alias = "responseMessage")]
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

/// Player request as returned to clients.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRequestResponse {
    /// Request id.
    pub id: Uuid,
    /// Requesting user.
    pub user: Uuid,
    /// Target academy.
    pub academy: Uuid,
    /// Requesting user's name.
    pub user_name: String,
    /// Requesting user's email.
    pub user_email: String,
    /// Target academy's name.
    pub academy_name: String,
    /// Lifecycle status.
    pub status: RequestStatus,
    /// Note from the player.
    pub message: Option<String>,
    /// Player age in years.
    pub age: Option<u8>,
    /// Preferred playing position.
    pub position: Option<String>,
    /// Note left by the academy.
    pub response_message: Option<String>,
    /// When a rejected request disappears.
    pub expire_at: Option<String>,
    /// Filing time (RFC 3339).
    pub created_at: String,
    /// Last write (RFC 3339).
    pub updated_at: String,
}

impl From<PlayerRequestEntity> for PlayerRequestResponse {
    fn from(value: PlayerRequestEntity) -> Self {
        Self {
            id: value.id,
            user: value.user,
            academy: value.academy,
            user_name: value.user_name,
            user_email: value.user_email,
            academy_name: value.academy_name,
            status: value.status,
            message: value.message,
            age: value.age,
            position: value.position,
            response_message: value.response_message,
            expire_at: value.expire_at.map(format_system_time),
            created_at: format_system_time(value.created_at),
            updated_at: format_system_time(value.updated_at),
        }
    }
}
