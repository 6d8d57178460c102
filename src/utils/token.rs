use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::routes::user::model::User;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub name: String,
    pub given_name: String,
    pub family_name: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
}

/// Sign an HS256 access token for the user with one role claim per role.
///
/// Returns the token and its expiry instant.
pub fn issue_access_token(
    user: &User,
    roles: &[String],
    config: &Config,
) -> Result<(String, DateTime<Utc>), jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let expires_at = now + config.access_token_ttl();

    let claims = Claims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        name: user.full_name(),
        given_name: user.first_name.clone(),
        family_name: user.last_name.clone(),
        roles: roles.to_vec(),
        iss: config.jwt_issuer.clone(),
        aud: config.jwt_audience.clone(),
        exp: expires_at.timestamp(),
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?;

    Ok((token, expires_at))
}

/// Decode and fully check an access token: signature, issuer, audience and
/// expiry, with zero clock-skew tolerance.
pub fn decode_access_token(
    token: &str,
    config: &Config,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_issuer(&[&config.jwt_issuer]);
    validation.set_audience(&[&config.jwt_audience]);

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )?;

    Ok(token_data.claims)
}

/// Any check failure means invalid; there is no partial trust.
pub fn validate_access_token(token: &str, config: &Config) -> bool {
    decode_access_token(token, config).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn test_user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "jane.doe@example.com".into(),
            password_hash: String::new(),
            password_salt: String::new(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            phone: None,
            is_active: true,
            email_confirmed: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn encode_claims(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn issued_token_round_trips() {
        let config = Config::for_tests();
        let user = test_user();
        let roles = vec!["User".to_string(), "Staff".to_string()];

        let (token, expires_at) = issue_access_token(&user, &roles, &config).unwrap();
        assert!(expires_at > Utc::now());

        let claims = decode_access_token(&token, &config).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.name, "Jane Doe");
        assert_eq!(claims.roles, roles);
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = Config::for_tests();
        let user = test_user();
        let past = Utc::now() - Duration::minutes(5);
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            name: user.full_name(),
            given_name: user.first_name.clone(),
            family_name: user.last_name.clone(),
            roles: Vec::new(),
            iss: config.jwt_issuer.clone(),
            aud: config.jwt_audience.clone(),
            exp: past.timestamp(),
            iat: (past - Duration::minutes(60)).timestamp(),
        };
        let token = encode_claims(&claims, &config.jwt_secret);
        assert!(!validate_access_token(&token, &config));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let config = Config::for_tests();
        let (token, _) = issue_access_token(&test_user(), &[], &config).unwrap();

        let mut other = Config::for_tests();
        other.jwt_secret = "a-completely-different-secret".into();
        assert!(!validate_access_token(&token, &other));
        assert!(validate_access_token(&token, &config));
    }

    #[test]
    fn wrong_issuer_or_audience_is_rejected() {
        let config = Config::for_tests();
        let (token, _) = issue_access_token(&test_user(), &[], &config).unwrap();

        let mut other = Config::for_tests();
        other.jwt_issuer = "someone-else".into();
        assert!(!validate_access_token(&token, &other));

        let mut other = Config::for_tests();
        other.jwt_audience = "other-clients".into();
        assert!(!validate_access_token(&token, &other));
    }

    #[test]
    fn garbage_token_is_rejected() {
        let config = Config::for_tests();
        assert!(!validate_access_token("not-a-jwt", &config));
        assert!(!validate_access_token("", &config));
    }
}
