use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use quill_types::api::{Claims, TokenType};

/// Issues and verifies the HS256 token pair. Both halves share one claims
/// shape; `token_type` keeps an access token from passing where a refresh
/// token is expected and vice versa.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
}

impl TokenService {
    pub fn new(secret: &str, access_minutes: i64, refresh_days: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_lifetime: Duration::minutes(access_minutes),
            refresh_lifetime: Duration::days(refresh_days),
        }
    }

    /// Issue a single token with a fresh `jti`.
    pub fn issue(&self, user_id: Uuid, username: &str, token_type: TokenType) -> Result<String> {
        let now = Utc::now();
        let lifetime = match token_type {
            TokenType::Access => self.access_lifetime,
            TokenType::Refresh => self.refresh_lifetime,
        };

        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            token_type,
            jti: Uuid::new_v4(),
            exp: (now + lifetime).timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Fresh (refresh, access) pair for a successful login.
    pub fn issue_pair(&self, user_id: Uuid, username: &str) -> Result<(String, String)> {
        let refresh = self.issue(user_id, username, TokenType::Refresh)?;
        let access = self.issue(user_id, username, TokenType::Access)?;
        Ok((refresh, access))
    }

    /// Verify signature and expiry, and require the expected token type.
    /// None for anything invalid; callers map that to their own outcome.
    pub fn verify(&self, token: &str, expected: TokenType) -> Option<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default()).ok()?;
        (data.claims.token_type == expected).then_some(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("test-secret", 15, 7)
    }

    #[test]
    fn issue_and_verify_roundtrip() {
        let svc = service();
        let user_id = Uuid::new_v4();
        let (refresh, access) = svc.issue_pair(user_id, "alice").unwrap();

        let claims = svc.verify(&access, TokenType::Access).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.token_type, TokenType::Access);

        let claims = svc.verify(&refresh, TokenType::Refresh).unwrap();
        assert_eq!(claims.token_type, TokenType::Refresh);
    }

    #[test]
    fn each_token_gets_a_distinct_jti() {
        let svc = service();
        let user_id = Uuid::new_v4();
        let a = svc.issue(user_id, "alice", TokenType::Refresh).unwrap();
        let b = svc.issue(user_id, "alice", TokenType::Refresh).unwrap();

        let a = svc.verify(&a, TokenType::Refresh).unwrap();
        let b = svc.verify(&b, TokenType::Refresh).unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn token_type_is_enforced() {
        let svc = service();
        let (refresh, access) = svc.issue_pair(Uuid::new_v4(), "alice").unwrap();

        assert!(svc.verify(&refresh, TokenType::Access).is_none());
        assert!(svc.verify(&access, TokenType::Refresh).is_none());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = service()
            .issue(Uuid::new_v4(), "alice", TokenType::Access)
            .unwrap();
        let other = TokenService::new("other-secret", 15, 7);
        assert!(other.verify(&token, TokenType::Access).is_none());
    }

    #[test]
    fn expired_token_is_rejected() {
        // Expired well past jsonwebtoken's default leeway
        let svc = TokenService::new("test-secret", -5, 7);
        let token = svc.issue(Uuid::new_v4(), "alice", TokenType::Access).unwrap();
        assert!(svc.verify(&token, TokenType::Access).is_none());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(service().verify("not-a-jwt", TokenType::Access).is_none());
        assert!(service().verify("", TokenType::Refresh).is_none());
    }
}
