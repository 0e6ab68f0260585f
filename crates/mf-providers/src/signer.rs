use std::fmt;

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use mf_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Token lifetime: 30 minutes.
pub const TOKEN_LIFETIME_SECS: i64 = 1800;
/// Tokens become valid slightly in the past to absorb clock skew.
pub const NOT_BEFORE_SKEW_SECS: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerClaims {
    pub iss: String,
    pub exp: i64,
    pub nbf: i64,
}

/// Issues short-lived HS256 bearer tokens. A new token is minted per call.
#[derive(Clone)]
pub struct CredentialSigner {
    issuer: String,
    key: EncodingKey,
}

impl CredentialSigner {
    pub fn new(access_key: &str, secret_key: &str) -> Result<Self> {
        if access_key.trim().is_empty() || secret_key.trim().is_empty() {
            return Err(Error::Configuration("signing access key and secret key must both be set".into()));
        }

        Ok(Self {
            issuer: access_key.to_string(),
            key: EncodingKey::from_secret(secret_key.as_bytes()),
        })
    }

    pub fn sign(&self) -> Result<String> {
        let claims = self.claims_at(Utc::now().timestamp());
        encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(|e| Error::Configuration(format!("failed to sign provider token: {e}")))
    }

    pub fn claims_at(&self, now: i64) -> SignerClaims {
        SignerClaims {
            iss: self.issuer.clone(),
            exp: now + TOKEN_LIFETIME_SECS,
            nbf: now - NOT_BEFORE_SKEW_SECS,
        }
    }
}

impl fmt::Debug for CredentialSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSigner")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation, decode, decode_header};

    #[test]
    fn test_missing_key_material_is_configuration_error() {
        assert!(matches!(CredentialSigner::new("", "secret"), Err(Error::Configuration(_))));
        assert!(matches!(CredentialSigner::new("ak", " "), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_claim_window() {
        let signer = CredentialSigner::new("ak", "sk").unwrap();
        let claims = signer.claims_at(1_000_000);
        assert_eq!(claims.iss, "ak");
        assert_eq!(claims.nbf, 999_995);
        assert_eq!(claims.exp, 1_001_800);
    }

    #[test]
    fn test_token_verifies_with_secret() {
        let signer = CredentialSigner::new("ak", "sk").unwrap();
        let token = signer.sign().unwrap();

        let header = decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::HS256);
        assert_eq!(header.typ.as_deref(), Some("JWT"));

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_nbf = true;
        validation.set_issuer(&["ak"]);
        let data = decode::<SignerClaims>(&token, &DecodingKey::from_secret(b"sk"), &validation).unwrap();
        assert_eq!(data.claims.exp - data.claims.nbf, TOKEN_LIFETIME_SECS + NOT_BEFORE_SKEW_SECS);
    }

    #[test]
    fn test_debug_hides_secret() {
        let signer = CredentialSigner::new("ak", "very-secret").unwrap();
        assert!(!format!("{signer:?}").contains("very-secret"));
    }
}
