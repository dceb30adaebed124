use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString, rand_core::OsRng};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::{path::Path, sync::Arc};

use crate::{
    config::AuthJwtConfig,
    error::{AuthError, CredentialError},
    models::User,
};

/// Claims
///
/// Payload of a session token. `sub` carries the user id as a string, which is
/// what standard JWT tooling expects for the subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's id.
    pub sub: String,
    /// Role id at the time of issuance. Informational; the gate re-reads the role.
    pub role_id: i64,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

impl Claims {
    /// The numeric user id in `sub`. A non-numeric subject is an invalid token.
    pub fn subject_id(&self) -> Result<i64, AuthError> {
        self.sub.parse().map_err(|_| AuthError::InvalidToken)
    }
}

/// TokenService
///
/// Issues and verifies asymmetric-signed session tokens. Built once at startup
/// from the configured PEM files and shared through `AppState`.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    lifetime: Duration,
}

/// The concrete type used to share the token service across the application state.
pub type TokenState = Arc<TokenService>;

impl TokenService {
    /// Loads the key pair named in `config` from disk.
    pub fn from_config(config: &AuthJwtConfig) -> Result<Self, CredentialError> {
        let private_pem = read_key(&config.private_key_path)?;
        let public_pem = read_key(&config.public_key_path)?;
        Self::from_pem(
            &private_pem,
            &public_pem,
            config.algorithm,
            Duration::days(config.access_token_expire_days),
        )
    }

    /// Builds the service from PEM-encoded keys. The key family follows the algorithm.
    pub fn from_pem(
        private_pem: &[u8],
        public_pem: &[u8],
        algorithm: Algorithm,
        lifetime: Duration,
    ) -> Result<Self, CredentialError> {
        let (encoding_key, decoding_key) = match algorithm {
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => (
                EncodingKey::from_rsa_pem(private_pem)?,
                DecodingKey::from_rsa_pem(public_pem)?,
            ),
            Algorithm::ES256 | Algorithm::ES384 => (
                EncodingKey::from_ec_pem(private_pem)?,
                DecodingKey::from_ec_pem(public_pem)?,
            ),
            Algorithm::EdDSA => (
                EncodingKey::from_ed_pem(private_pem)?,
                DecodingKey::from_ed_pem(public_pem)?,
            ),
            other => return Err(CredentialError::UnsupportedAlgorithm(other)),
        };

        Ok(Self {
            encoding_key,
            decoding_key,
            algorithm,
            lifetime,
        })
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// issue_token
    ///
    /// Signs a token for `user` valid for the configured lifetime from now.
    pub fn issue_token(&self, user: &User) -> Result<String, CredentialError> {
        self.issue_token_at(user, Utc::now())
    }

    /// Same as `issue_token` with an explicit issuance instant.
    pub fn issue_token_at(
        &self,
        user: &User,
        issued_at: DateTime<Utc>,
    ) -> Result<String, CredentialError> {
        let claims = Claims {
            sub: user.id.to_string(),
            role_id: user.role_id,
            iat: issued_at.timestamp(),
            exp: (issued_at + self.lifetime).timestamp(),
        };
        Ok(encode(&Header::new(self.algorithm), &claims, &self.encoding_key)?)
    }

    /// decode_token
    ///
    /// Verifies signature, algorithm and expiry. Every failure collapses into
    /// `InvalidToken`; callers never see partially trusted claims.
    pub fn decode_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        // No grace period: a token past `exp` is rejected immediately.
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("token rejected: {:?}", e.kind());
                AuthError::InvalidToken
            })
    }
}

fn read_key(path: &Path) -> Result<Vec<u8>, CredentialError> {
    std::fs::read(path).map_err(|source| CredentialError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// hash_password
///
/// Argon2id with a fresh random salt; the result is a self-describing PHC string.
pub fn hash_password(password: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CredentialError::Hash(e.to_string()))
}

/// verify_password
///
/// Returns false for a wrong password and for a stored hash that cannot be parsed.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        tracing::warn!("stored password hash is not a valid PHC string");
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
