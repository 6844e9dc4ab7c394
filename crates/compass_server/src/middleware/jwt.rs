//! Bearer-token authentication.
//!
//! The token is an HS256 JWT carrying the caller's external `tenant` and a
//! `scope` claim (space separated, or a list). Handlers check scopes on the
//! `Principal` the middleware puts into the request extensions.

use axum::extract::Request;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use axum::Extension;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const SCOPE_DESTINATIONS_SYNC: &str = "destinations:sync";
pub const SCOPE_SENSITIVE_DATA_READ: &str = "destinations_sensitive_data:read";

#[derive(Clone)]
pub struct JwtConfig {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtConfig {
    pub fn from_secret(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // exp is checked when present
        validation.required_spec_claims.clear();
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn decode(&self, token: &str) -> Result<Principal, AppError> {
        let data = decode::<JwtClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AppError::Unauthenticated(format!("invalid bearer token: {e}")))?;
        Ok(Principal::from(data.claims))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ScopeClaim {
    Joined(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JwtClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub tenant: Option<String>,
    #[serde(default)]
    pub scope: Option<ScopeClaim>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: Option<String>,
    /// External tenant ID from the token.
    pub tenant: Option<String>,
    pub scopes: Vec<String>,
}

impl From<JwtClaims> for Principal {
    fn from(claims: JwtClaims) -> Self {
        let scopes = match claims.scope {
            Some(ScopeClaim::Joined(joined)) => joined.split_whitespace().map(str::to_string).collect(),
            Some(ScopeClaim::List(list)) => list,
            None => Vec::new(),
        };
        Self {
            subject: claims.sub,
            tenant: claims.tenant.filter(|t| !t.is_empty()),
            scopes,
        }
    }
}

impl Principal {
    pub fn require_scope(&self, scope: &str) -> Result<(), AppError> {
        if self.scopes.iter().any(|s| s == scope) {
            return Ok(());
        }
        Err(AppError::Forbidden(format!("insufficient scopes provided, {scope} required")))
    }

    pub fn tenant(&self) -> Result<&str, AppError> {
        self.tenant
            .as_deref()
            .ok_or_else(|| AppError::BadRequest("tenant claim is missing from the token".into()))
    }
}

pub async fn jwt_auth(
    Extension(config): Extension<JwtConfig>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthenticated("missing bearer token".into()))?;

    let principal = config.decode(token.trim())?;
    tracing::debug!(subject = ?principal.subject, tenant = ?principal.tenant, "authenticated request");
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    use super::*;

    const SECRET: &[u8] = b"jwt-unit-test-secret";

    fn token(claims: serde_json::Value) -> String {
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    #[test]
    fn joined_scopes_are_split() {
        let principal = JwtConfig::from_secret(SECRET)
            .decode(&token(json!({
                "tenant": "ext-1",
                "scope": "destinations:sync destinations_sensitive_data:read",
            })))
            .unwrap();
        assert_eq!(principal.tenant.as_deref(), Some("ext-1"));
        assert!(principal.require_scope(SCOPE_DESTINATIONS_SYNC).is_ok());
        assert!(principal.require_scope(SCOPE_SENSITIVE_DATA_READ).is_ok());
    }

    #[test]
    fn scope_list_is_accepted() {
        let principal = JwtConfig::from_secret(SECRET)
            .decode(&token(json!({ "scope": ["destinations:sync"] })))
            .unwrap();
        assert!(principal.require_scope(SCOPE_DESTINATIONS_SYNC).is_ok());
        assert!(matches!(
            principal.require_scope(SCOPE_SENSITIVE_DATA_READ),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(principal.tenant(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let forged = encode(
            &Header::default(),
            &json!({ "tenant": "ext-1" }),
            &EncodingKey::from_secret(b"other"),
        )
        .unwrap();
        assert!(matches!(
            JwtConfig::from_secret(SECRET).decode(&forged),
            Err(AppError::Unauthenticated(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let expired = token(json!({ "tenant": "ext-1", "exp": 1_000 }));
        assert!(JwtConfig::from_secret(SECRET).decode(&expired).is_err());
    }
}
