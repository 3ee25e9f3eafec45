use crate::model::user::Username;
use argon2::{
    Argon2, PasswordHasher, PasswordVerifier,
    password_hash::{self, SaltString},
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::{Debug, Formatter};
use thiserror::Error;

pub const PASSWORD_MIN_LEN: usize = 6;
pub const PASSWORD_SALT_LEN: usize = 16;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing password failed: {0}")]
pub struct PasswordHashError(password_hash::Error);

#[derive(Debug, Error)]
#[error("The credential could not be verified: {0}")]
pub struct InvalidCredentialError(jsonwebtoken::errors::Error);

#[derive(Debug, Error)]
#[error("Signing a credential failed: {0}")]
pub struct CredentialIssueError(jsonwebtoken::errors::Error);

/// A plaintext password as received from a client.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct Password(String);

/// An argon2 PHC string.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct PasswordHash(String);

/// The caller resolved from a verified credential.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Identity {
    pub username: Username,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
struct Claims {
    username: Username,
}

impl Password {
    #[must_use]
    pub fn new(password: String) -> Self {
        Self(password)
    }

    #[must_use]
    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }

    pub fn hash(&self) -> Result<PasswordHash, PasswordHashError> {
        let salt = SaltString::encode_b64(&rand::random::<[u8; PASSWORD_SALT_LEN]>())
            .map_err(PasswordHashError)?;
        let hash = Argon2::default()
            .hash_password(self.0.as_bytes(), &salt)
            .map_err(PasswordHashError)?;

        Ok(PasswordHash(hash.to_string()))
    }
}

impl PasswordHash {
    /// Wraps a stored hash without checking it; malformed hashes fail in [`PasswordHash::verify`].
    #[must_use]
    pub fn from_stored(hash: String) -> Self {
        Self(hash)
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    pub fn verify(&self, password: &Password) -> Result<bool, PasswordHashError> {
        let parsed = password_hash::PasswordHash::new(&self.0).map_err(PasswordHashError)?;

        match Argon2::default().verify_password(password.0.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(err) => Err(PasswordHashError(err)),
        }
    }
}

impl<'de> Deserialize<'de> for Password {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self)
    }
}

impl Debug for Password {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Password").field(&"[redacted]").finish()
    }
}

impl Debug for PasswordHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PasswordHash").field(&"[redacted]").finish()
    }
}

/// Signs and verifies bearer credentials with one process-wide HMAC key.
///
/// Credentials are HS256 JWTs whose payload is `{"username": ...}`. No
/// expiration claim is issued or required.
pub struct IdentityVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl IdentityVerifier {
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let secret = secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn issue(&self, username: &Username) -> Result<String, CredentialIssueError> {
        let claims = Claims {
            username: username.clone(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(CredentialIssueError)
    }

    pub fn verify(&self, credential: &str) -> Result<Identity, InvalidCredentialError> {
        let claims =
            jsonwebtoken::decode::<Claims>(credential, &self.decoding_key, &self.validation)
                .map_err(InvalidCredentialError)?
                .claims;

        Ok(Identity {
            username: claims.username,
        })
    }
}

impl Debug for IdentityVerifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityVerifier")
            .field("key", &"[redacted]")
            .finish_non_exhaustive()
    }
}
