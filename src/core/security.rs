use argon2::password_hash::{self, SaltString};
use argon2::{Algorithm as HashAlgorithm, Argon2, Params, PasswordHash, PasswordHasher};
use argon2::{PasswordVerifier, Version};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

use crate::core::config::Settings;

/// OWASP baseline for argon2id: 19 MiB, two passes, one lane.
const HASH_MEMORY_KIB: u32 = 19_456;
const HASH_PASSES: u32 = 2;
const HASH_LANES: u32 = 1;

#[derive(Debug, Error)]
pub(crate) enum SecurityError {
    #[error("password hashing failed")]
    Hashing,
    #[error("password verification failed")]
    Verification,
    #[error("jwt encoding failed")]
    JwtEncoding,
    #[error("jwt decoding failed")]
    JwtDecoding,
    #[error("unsupported jwt algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

/// Access token payload. `sub` is the user id.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Claims {
    pub(crate) sub: String,
    pub(crate) iat: i64,
    pub(crate) exp: i64,
}

fn argon2id() -> Option<Argon2<'static>> {
    let params = Params::new(HASH_MEMORY_KIB, HASH_PASSES, HASH_LANES, None).ok()?;
    Some(Argon2::new(HashAlgorithm::Argon2id, Version::V0x13, params))
}

pub(crate) fn hash_password(password: &str) -> Result<String, SecurityError> {
    let salt = SaltString::generate(&mut OsRng);
    argon2id()
        .ok_or(SecurityError::Hashing)?
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| SecurityError::Hashing)
}

/// `Ok(false)` means a wrong password; errors are reserved for unusable hashes.
pub(crate) fn verify_password(password: &str, hash: &str) -> Result<bool, SecurityError> {
    let stored = PasswordHash::new(hash).map_err(|_| SecurityError::Verification)?;
    let outcome = argon2id()
        .ok_or(SecurityError::Verification)?
        .verify_password(password.as_bytes(), &stored);

    match outcome {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(_) => Err(SecurityError::Verification),
    }
}

fn jwt_algorithm(name: &str) -> Result<Algorithm, SecurityError> {
    Ok(match name {
        "HS256" => Algorithm::HS256,
        "HS384" => Algorithm::HS384,
        "HS512" => Algorithm::HS512,
        other => return Err(SecurityError::UnsupportedAlgorithm(other.to_string())),
    })
}

/// Issues a token for `user_id`, defaulting to the configured lifetime.
pub(crate) fn create_access_token(
    user_id: &str,
    settings: &Settings,
    lifetime: Option<Duration>,
) -> Result<String, SecurityError> {
    let security = settings.security();
    let algorithm = jwt_algorithm(&security.algorithm)?;
    let lifetime = lifetime
        .unwrap_or_else(|| Duration::minutes(security.access_token_expire_minutes as i64));

    let now = OffsetDateTime::now_utc();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.unix_timestamp(),
        exp: (now + lifetime).unix_timestamp(),
    };
    let key = EncodingKey::from_secret(security.secret_key.as_bytes());

    jsonwebtoken::encode(&Header::new(algorithm), &claims, &key)
        .map_err(|_| SecurityError::JwtEncoding)
}

pub(crate) fn verify_token(token: &str, settings: &Settings) -> Result<Claims, SecurityError> {
    let security = settings.security();
    let mut validation = Validation::new(jwt_algorithm(&security.algorithm)?);
    validation.set_required_spec_claims(&["exp", "sub"]);
    let key = DecodingKey::from_secret(security.secret_key.as_bytes());

    jsonwebtoken::decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|_| SecurityError::JwtDecoding)
}
