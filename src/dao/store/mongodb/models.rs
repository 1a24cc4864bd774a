use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{MongoDaoError, MongoResult};
use crate::{
    auth::Role,
    dao::models::{
        AcademyEntity, GeoPointEntity, HomeAway, MatchEntity, PlayerRequestEntity, UserEntity,
    },
    state::{match_machine::MatchStatus, request_machine::RequestStatus},
};

/// Collection holding academies.
pub const ACADEMY_COLLECTION_NAME: &str = "academies";
/// Collection holding users.
pub const USER_COLLECTION_NAME: &str = "users";
/// Collection holding matches.
pub const MATCH_COLLECTION_NAME: &str = "matches";
/// Collection holding player requests.
pub const REQUEST_COLLECTION_NAME: &str = "playerrequests";

const DEFAULT_DESCRIPTION: &str = "Friendly match";

fn default_description() -> String {
    DEFAULT_DESCRIPTION.to_owned()
}

fn parse_id(collection: &'static str, value: &str) -> MongoResult<Uuid> {
    Uuid::parse_str(value).map_err(|source| MongoDaoError::MalformedId {
        collection,
        value: value.to_owned(),
        source,
    })
}

fn parse_optional_id(collection: &'static str, value: Option<&str>) -> MongoResult<Option<Uuid>> {
    value.map(|raw| parse_id(collection, raw)).transpose()
}

/// Academy document as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoAcademyDocument {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    logo: Option<String>,
    phone: Option<String>,
    #[serde(default)]
    players: Vec<String>,
    created_at: DateTime,
}

impl From<AcademyEntity> for MongoAcademyDocument {
    fn from(value: AcademyEntity) -> Self {
        Self {
            id: value.id.to_string(),
            name: value.name,
            logo: value.logo,
            phone: value.phone,
            players: value.players.iter().map(Uuid::to_string).collect(),
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoAcademyDocument> for AcademyEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoAcademyDocument) -> Result<Self, Self::Error> {
        let players = value
            .players
            .iter()
            .map(|raw| parse_id(ACADEMY_COLLECTION_NAME, raw))
            .collect::<MongoResult<Vec<_>>>()?;

        Ok(Self {
            id: parse_id(ACADEMY_COLLECTION_NAME, &value.id)?,
            name: value.name,
            logo: value.logo,
            phone: value.phone,
            players,
            created_at: value.created_at.to_system_time(),
        })
    }
}

/// User document as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoUserDocument {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    email: String,
    role: Role,
    academy_id: Option<String>,
}

impl From<UserEntity> for MongoUserDocument {
    fn from(value: UserEntity) -> Self {
        Self {
            id: value.id.to_string(),
            name: value.name,
            email: value.email,
            role: value.role,
            academy_id: value.academy_id.map(|id| id.to_string()),
        }
    }
}

impl TryFrom<MongoUserDocument> for UserEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoUserDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_id(USER_COLLECTION_NAME, &value.id)?,
            name: value.name,
            email: value.email,
            role: value.role,
            academy_id: parse_optional_id(USER_COLLECTION_NAME, value.academy_id.as_deref())?,
        })
    }
}

/// Match document as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoMatchDocument {
    #[serde(rename = "_id")]
    id: String,
    academy: String,
    opponent: Option<String>,
    creator_id: String,
    age_group: String,
    date_time: DateTime,
    home_away: HomeAway,
    location_description: String,
    location_geo: Option<GeoPointEntity>,
    phone: String,
    duration: Option<String>,
    #[serde(default = "default_description")]
    description: String,
    status: MatchStatus,
    finished_at: Option<DateTime>,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<MatchEntity> for MongoMatchDocument {
    fn from(value: MatchEntity) -> Self {
        Self {
            id: value.id.to_string(),
            academy: value.academy.to_string(),
            opponent: value.opponent.map(|id| id.to_string()),
            creator_id: value.creator_id.to_string(),
            age_group: value.age_group,
            date_time: DateTime::from_system_time(value.date_time),
            home_away: value.home_away,
            location_description: value.location_description,
            location_geo: value.location_geo,
            phone: value.phone,
            duration: value.duration,
            description: value.description,
            status: value.status,
            finished_at: value.finished_at.map(DateTime::from_system_time),
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl TryFrom<MongoMatchDocument> for MatchEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoMatchDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_id(MATCH_COLLECTION_NAME, &value.id)?,
            academy: parse_id(MATCH_COLLECTION_NAME, &value.academy)?,
            opponent: parse_optional_id(MATCH_COLLECTION_NAME, value.opponent.as_deref())?,
            creator_id: parse_id(MATCH_COLLECTION_NAME, &value.creator_id)?,
            age_group: value.age_group,
            date_time: value.date_time.to_system_time(),
            home_away: value.home_away,
            location_description: value.location_description,
            location_geo: value.location_geo,
            phone: value.phone,
            duration: value.duration,
            description: value.description,
            status: value.status,
            finished_at: value.finished_at.map(DateTime::to_system_time),
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        })
    }
}

/// Player request document as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoPlayerRequestDocument {
    #[serde(rename = "_id")]
    id: String,
    user: String,
    academy: String,
    user_name: String,
    user_email: String,
    academy_name: String,
    status: RequestStatus,
    message: Option<String>,
    age: Option<u8>,
    position: Option<String>,
    response_message: Option<String>,
    expire_at: Option<DateTime>,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<PlayerRequestEntity> for MongoPlayerRequestDocument {
    fn from(value: PlayerRequestEntity) -> Self {
        Self {
            id: value.id.to_string(),
            user: value.user.to_string(),
            academy: value.academy.to_string(),
            user_name: value.user_name,
            user_email: value.user_email,
            academy_name: value.academy_name,
            status: value.status,
            message: value.message,
            age: value.age,
            position: value.position,
            response_message: value.response_message,
            expire_at: value.expire_at.map(DateTime::from_system_time),
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl TryFrom<MongoPlayerRequestDocument> for PlayerRequestEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoPlayerRequestDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_id(REQUEST_COLLECTION_NAME, &value.id)?,
            user: parse_id(REQUEST_COLLECTION_NAME, &value.user)?,
            academy: parse_id(REQUEST_COLLECTION_NAME, &value.academy)?,
            user_name: value.user_name,
            user_email: value.user_email,
            academy_name: value.academy_name,
            status: value.status,
            message: value.message,
            age: value.age,
            position: value.position,
            response_message: value.response_message,
            expire_at: value.expire_at.map(DateTime::to_system_time),
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;

    fn sample_match() -> MatchEntity {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        MatchEntity {
            id: Uuid::new_v4(),
            academy: Uuid::new_v4(),
            opponent: Some(Uuid::new_v4()),
            creator_id: Uuid::new_v4(),
            age_group: "2010, 2011".into(),
            date_time: now,
            home_away: HomeAway::Away,
            location_description: "Main pitch".into(),
            location_geo: Some(GeoPointEntity { lat: 1.5, lng: 2.5 }),
            phone: "+100".into(),
            duration: Some("90".into()),
            description: "Friendly match".into(),
            status: MatchStatus::Finished,
            finished_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn match_document_stores_ids_as_strings() {
        let entity = sample_match();
        let document = MongoMatchDocument::from(entity.clone());
        assert_eq!(document.id, entity.id.to_string());
        assert_eq!(document.opponent, entity.opponent.map(|id| id.to_string()));
        assert_eq!(MatchEntity::try_from(document).unwrap(), entity);
    }

    #[test]
    fn malformed_id_is_reported() {
        let mut document = MongoMatchDocument::from(sample_match());
        document.creator_id = "not-a-uuid".into();
        assert!(matches!(
            MatchEntity::try_from(document),
            Err(MongoDaoError::MalformedId {
                collection: MATCH_COLLECTION_NAME,
                ..
            })
        ));
    }

    #[test]
    fn roster_ids_survive_conversion() {
        let academy = AcademyEntity {
            id: Uuid::new_v4(),
            name: "North FC".into(),
            logo: None,
            phone: Some("+100".into()),
            players: vec![Uuid::new_v4(), Uuid::new_v4()],
            created_at: SystemTime::UNIX_EPOCH,
        };
        let document = MongoAcademyDocument::from(academy.clone());
        assert_eq!(AcademyEntity::try_from(document).unwrap(), academy);
    }
}
