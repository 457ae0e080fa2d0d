use crate::errors::ApiError;
use axum::{extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of an authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Seller,
    Admin,
}

/// Explicit caller identity passed into every service operation.
///
/// Token issuance lives outside this service; we only validate the bearer
/// token and hand the decoded identity to the operation as a plain argument.
/// Nothing in the service layer reads ambient request state.
#[derive(Debug, Clone, Copy)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthContext {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_seller(&self) -> bool {
        self.role == Role::Seller
    }

    /// Owner-or-admin check used by order lifecycle operations
    pub fn can_act_on(&self, owner_id: Uuid) -> bool {
        self.user_id == owner_id || self.is_admin()
    }
}

/// JWT claims carried by the upstream-issued token
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id
    pub sub: Uuid,
    pub role: Role,
    /// Expiry as unix seconds
    pub exp: usize,
}

/// Validates a bearer token and returns the caller identity
pub fn decode_token(token: &str, secret: &str) -> Result<AuthContext, ApiError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized)?;

    Ok(AuthContext::new(data.claims.sub, data.claims.role))
}

/// Creates a signed token for the given identity. Used by tests and tooling;
/// production tokens come from the external identity service.
pub fn encode_token(ctx: &AuthContext, secret: &str, ttl_secs: u64) -> String {
    let claims = Claims {
        sub: ctx.user_id,
        role: ctx.role,
        exp: (chrono::Utc::now().timestamp() as usize) + ttl_secs as usize,
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap_or_default()
}

#[axum::async_trait]
impl FromRequestParts<crate::AppState> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &crate::AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized)?;

        decode_token(token, &state.config.jwt_secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_secret_key_that_is_long_enough_for_validation";

    #[test]
    fn token_round_trip_preserves_identity() {
        let ctx = AuthContext::new(Uuid::new_v4(), Role::Seller);
        let token = encode_token(&ctx, SECRET, 3600);
        let decoded = decode_token(&token, SECRET).expect("token should decode");
        assert_eq!(decoded.user_id, ctx.user_id);
        assert_eq!(decoded.role, Role::Seller);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let ctx = AuthContext::new(Uuid::new_v4(), Role::Customer);
        let token = encode_token(&ctx, SECRET, 3600);
        assert!(decode_token(&token, "another_secret_entirely_that_is_long").is_err());
    }

    #[test]
    fn owner_and_admin_may_act_others_may_not() {
        let owner = Uuid::new_v4();
        assert!(AuthContext::new(owner, Role::Customer).can_act_on(owner));
        assert!(AuthContext::new(Uuid::new_v4(), Role::Admin).can_act_on(owner));
        assert!(!AuthContext::new(Uuid::new_v4(), Role::Customer).can_act_on(owner));
    }
}
