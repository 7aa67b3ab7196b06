use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::{User, UserProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User id
    pub jti: Uuid,
    pub token_type: TokenKind,
    pub iat: i64,
    pub exp: i64,
    pub user: UserProfile,
}

impl Claims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0).single().unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Token is invalid")]
    Invalid,
    #[error("Token is expired")]
    Expired,
    #[error("Token has wrong type")]
    WrongType,
    #[error("Token is blacklisted")]
    Blacklisted,
    #[error("Token could not be signed")]
    Signing,
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub refresh: String,
    pub access: String,
}

/// Issues and verifies HS256 tokens carrying a profile snapshot.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        TokenService {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn issue(&self, user: &User, kind: TokenKind) -> Result<String, TokenError> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            jti: Uuid::new_v4(),
            token_type: kind,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            user: UserProfile::from(user),
        };
        self.sign(&claims)
    }

    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            refresh: self.issue(user, TokenKind::Refresh)?,
            access: self.issue(user, TokenKind::Access)?,
        })
    }

    pub(crate) fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::default(), claims, &self.encoding).map_err(|_| TokenError::Signing)
    }

    /// Verifies signature, expiry and that the token is of the `expected` kind.
    /// Revocation is checked by the caller against the blacklist.
    pub fn decode(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })?;

        if claims.token_type != expected {
            return Err(TokenError::WrongType);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "jdoe".into(),
            email: "jdoe@example.com".into(),
            first_name: "John".into(),
            last_name: "Doe".into(),
            password_hash: String::new(),
            is_staff: true,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn service() -> TokenService {
        TokenService::new("test-secret", Duration::minutes(5), Duration::hours(24))
    }

    #[test]
    fn access_tokens_carry_the_profile_snapshot() {
        let user = user();
        let tokens = service();
        let claims = tokens.decode(&tokens.issue(&user, TokenKind::Access).unwrap(), TokenKind::Access).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.user, UserProfile::from(&user));
        assert!(claims.user.is_staff);
    }

    #[test]
    fn token_kinds_are_not_interchangeable() {
        let pair = service().issue_pair(&user()).unwrap();
        assert_eq!(service().decode(&pair.refresh, TokenKind::Access).unwrap_err(), TokenError::WrongType);
        assert_eq!(service().decode(&pair.access, TokenKind::Refresh).unwrap_err(), TokenError::WrongType);
    }

    #[test]
    fn expired_and_foreign_tokens_are_rejected() {
        let tokens = service();
        let mut claims = tokens
            .decode(&tokens.issue(&user(), TokenKind::Access).unwrap(), TokenKind::Access)
            .unwrap();
        claims.exp = (Utc::now() - Duration::minutes(1)).timestamp();
        let expired = tokens.sign(&claims).unwrap();
        assert_eq!(tokens.decode(&expired, TokenKind::Access).unwrap_err(), TokenError::Expired);

        let other = TokenService::new("other-secret", Duration::minutes(5), Duration::hours(1));
        let foreign = other.issue(&user(), TokenKind::Access).unwrap();
        assert_eq!(tokens.decode(&foreign, TokenKind::Access).unwrap_err(), TokenError::Invalid);
        assert_eq!(tokens.decode("garbage", TokenKind::Access).unwrap_err(), TokenError::Invalid);
    }
}
