use anyhow::anyhow;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::{
    db,
    users::{Role, User},
    AppError, AppResult,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 signing keys for bearer tokens.
#[derive(Clone)]
pub struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: time::Duration,
}

impl Keys {
    pub fn new(secret: &[u8], ttl: time::Duration) -> Self {
        Keys {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn issue(&self, user: &User) -> AppResult<String> {
        let now = db::now();
        let claims = Claims {
            sub: user.id,
            role: user.role,
            iat: now.unix_timestamp(),
            exp: (now + self.ttl).unix_timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|err| AppError::Internal(anyhow!("unable to sign token: {err}")))
    }

    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|err| {
                debug!(%err, "rejected bearer token");
                AppError::Unauthorized
            })
    }
}

#[cfg(test)]
mod tests {
    use sqlx::types::Json;

    use super::*;

    fn user() -> User {
        User {
            id: Uuid::now_v7(),
            username: "ada".into(),
            password_hash: String::new(),
            email: "ada@club.org".into(),
            role: Role::Chair,
            is_committee: true,
            is_executive: false,
            is_representative: false,
            is_developer: false,
            department: None,
            year: None,
            interests: Json(vec![]),
            photo: None,
            created_at: db::now(),
        }
    }

    #[test]
    fn issued_tokens_verify() {
        let keys = Keys::new(b"test-secret", time::Duration::hours(1));
        let user = user();
        let claims = keys.verify(&keys.issue(&user).unwrap()).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, Role::Chair);
    }

    #[test]
    fn foreign_tokens_are_rejected() {
        let ours = Keys::new(b"test-secret", time::Duration::hours(1));
        let theirs = Keys::new(b"other-secret", time::Duration::hours(1));
        let token = theirs.issue(&user()).unwrap();
        assert!(matches!(ours.verify(&token), Err(AppError::Unauthorized)));
        assert!(matches!(ours.verify("not.a.token"), Err(AppError::Unauthorized)));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let keys = Keys::new(b"test-secret", time::Duration::hours(-2));
        let token = keys.issue(&user()).unwrap();
        assert!(matches!(keys.verify(&token), Err(AppError::Unauthorized)));
    }
}
