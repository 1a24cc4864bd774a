//! Authorization guard: verifies bearer tokens and exposes the calling [`Principal`].
//!
//! Tokens are issued elsewhere; this module only checks signature and expiry and hands the
//! decoded identity to the services, which perform every role and ownership check.

use std::fmt;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppError, ServiceError},
    state::SharedState,
};

const BEARER_PREFIX: &str = "Bearer ";

/// Role carried by an authenticated account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Player or parent account.
    User,
    /// Account managing one academy.
    Academy,
    /// Platform administrator.
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::User => "user",
            Role::Academy => "academy",
            Role::Admin => "admin",
        })
    }
}

/// JWT claims accepted by the guard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: Uuid,
    /// Role granted by the identity service.
    pub role: Role,
    /// Academy the account manages, for academy accounts.
    #[serde(rename = "academyId", default, skip_serializing_if = "Option::is_none")]
    pub academy_id: Option<Uuid>,
    /// Expiry as seconds since the epoch.
    pub exp: u64,
}

/// Authenticated caller as seen by the lifecycle services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    /// User id taken from the `sub` claim.
    pub id: Uuid,
    /// Role of the caller.
    pub role: Role,
    /// Academy linked to the account, if any.
    pub academy_id: Option<Uuid>,
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            role: claims.role,
            academy_id: claims.academy_id,
        }
    }
}

impl Principal {
    /// Whether the caller is a platform administrator.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Fail with `Forbidden` unless the caller holds `role`.
    pub fn require_role(&self, role: Role) -> Result<(), ServiceError> {
        if self.role == role {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "operation requires the {role} role"
            )))
        }
    }

    /// Academy the caller acts for; requires the academy role and a linked academy.
    pub fn require_academy(&self) -> Result<Uuid, ServiceError> {
        self.require_role(Role::Academy)?;
        self.academy_id.ok_or_else(|| {
            ServiceError::InvalidInput("academy account is not linked to an academy".into())
        })
    }

    /// Whether the caller may manage resources scoped to `academy_id`.
    pub fn manages_academy(&self, academy_id: Uuid) -> bool {
        self.is_admin() || (self.role == Role::Academy && self.academy_id == Some(academy_id))
    }
}

/// Verification material derived from the configured secret.
#[derive(Clone)]
pub struct AuthKeys {
    decoding: DecodingKey,
    validation: Validation,
}

impl AuthKeys {
    /// Build HS256 verification keys from a shared secret.
    pub fn from_secret(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify a raw token and return the principal it names.
    pub fn verify(&self, token: &str) -> Result<Principal, ServiceError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims.into())
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => ServiceError::Unauthenticated("token has expired".into()),
                _ => ServiceError::Unauthenticated(format!("invalid token: {err}")),
            })
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, ServiceError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| ServiceError::Unauthenticated("missing authorization header".into()))?
        .to_str()
        .map_err(|_| ServiceError::Unauthenticated("invalid authorization header".into()))?;

    value
        .strip_prefix(BEARER_PREFIX)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            ServiceError::Unauthenticated("authorization header must use the Bearer scheme".into())
        })
}

impl FromRequestParts<SharedState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        Ok(state.auth().verify(token)?)
    }
}

/// Token minting for tests; production tokens come from the identity service.
#[cfg(test)]
pub(crate) fn sign_for_tests(secret: &str, principal: Principal) -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    use jsonwebtoken::{EncodingKey, Header, encode};

    let exp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() + 3_600)
        .unwrap_or(u64::MAX);
    let claims = Claims {
        sub: principal.id,
        role: principal.role,
        academy_id: principal.academy_id,
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}
