use chrono::Utc;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::claims::{validate_claims, JwtClaims, TokenValidationError};
use crate::Principal;

/// Token validation seam.
///
/// The API middleware talks to this trait so tests can substitute a stub
/// and so the signing scheme can change without touching HTTP code.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str) -> Result<Principal, TokenValidationError>;
}

/// HS256 validator backed by a shared secret.
///
/// The claims time window is checked by [`validate_claims`] against our own
/// clock, so jsonwebtoken's built-in exp handling is disabled to keep one
/// source of truth.
pub struct Hs256Validator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl Hs256Validator {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl JwtValidator for Hs256Validator {
    fn validate(&self, token: &str) -> Result<Principal, TokenValidationError> {
        let data = decode::<JwtClaims>(token, &self.decoding_key, &self.validation).map_err(
            |err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    TokenValidationError::InvalidSignature
                }
                _ => TokenValidationError::Malformed(err.to_string()),
            },
        )?;

        validate_claims(&data.claims, Utc::now())?;

        Ok(Principal::new(data.claims.sub, data.claims.role))
    }
}
