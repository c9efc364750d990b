use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{Duration, Utc};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, email: String, ttl_hours: i64) -> Self {
        let now = Utc::now();
        let exp = now + Duration::hours(ttl_hours);

        Self {
            sub: user_id.to_string(),
            email,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}

pub fn create_token(
    secret: &str,
    user_id: Uuid,
    email: String,
    ttl_hours: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims::new(user_id, email, ttl_hours);

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

pub fn verify_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_carries_user_id() {
        let id = Uuid::new_v4();
        let token = create_token("secret", id, "ben@innovate.com".into(), 24).unwrap();
        let claims = verify_token("secret", &token).unwrap();
        assert_eq!(claims.user_id(), Some(id));
        assert_eq!(claims.email, "ben@innovate.com");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = create_token("secret", Uuid::new_v4(), "ben@innovate.com".into(), 24).unwrap();
        assert!(verify_token("other", &token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = create_token("secret", Uuid::new_v4(), "ben@innovate.com".into(), -2).unwrap();
        assert!(verify_token("secret", &token).is_err());
    }
}
