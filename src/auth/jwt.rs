//! Identity token issuing and verification.
//!
//! Tokens carry the caller's identity only. The role is always read from the
//! store when the caller context is built.

use jwt_simple::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub username: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub user_id: Uuid,
    pub username: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug)]
pub enum IdentityError {
    InvalidToken(jwt_simple::Error),
    InvalidSubject,
}

impl std::fmt::Display for IdentityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityError::InvalidToken(e) => write!(f, "Invalid identity token: {}", e),
            IdentityError::InvalidSubject => write!(f, "Token subject is not a user id"),
        }
    }
}

impl std::error::Error for IdentityError {}

#[derive(Clone)]
pub struct IdentityVerifier {
    key_pair: Arc<Ed25519KeyPair>,
    public_key: Arc<Ed25519PublicKey>,
    pub token_expiry: i64,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

impl IdentityVerifier {
    /// Expects IDENTITY_PRIVATE_KEY env var (base64-encoded Ed25519 key).
    pub fn from_env(
        token_expiry: i64,
        issuer: Option<String>,
        audience: Option<String>,
    ) -> Result<Self, String> {
        use base64::Engine;

        let private_key_b64 = std::env::var("IDENTITY_PRIVATE_KEY")
            .map_err(|_| "IDENTITY_PRIVATE_KEY must be set".to_string())?;

        let key_bytes = base64::engine::general_purpose::STANDARD
            .decode(&private_key_b64)
            .map_err(|_| "IDENTITY_PRIVATE_KEY must be valid base64".to_string())?;

        let key_pair = Ed25519KeyPair::from_bytes(&key_bytes)
            .map_err(|_| "IDENTITY_PRIVATE_KEY must be a valid Ed25519 key".to_string())?;

        let mut verifier = Self::from_key_pair(key_pair);
        verifier.token_expiry = token_expiry;
        verifier.issuer = issuer;
        verifier.audience = audience;
        Ok(verifier)
    }

    pub fn from_key_pair(key_pair: Ed25519KeyPair) -> Self {
        let public_key = key_pair.public_key();
        Self {
            key_pair: Arc::new(key_pair),
            public_key: Arc::new(public_key),
            token_expiry: 3600,
            issuer: None,
            audience: None,
        }
    }

    pub fn generate_key_pair() -> (String, String) {
        use base64::Engine;

        let key_pair = Ed25519KeyPair::generate();
        let private_b64 = base64::engine::general_purpose::STANDARD.encode(key_pair.to_bytes());
        let public_b64 =
            base64::engine::general_purpose::STANDARD.encode(key_pair.public_key().to_bytes());
        (private_b64, public_b64)
    }

    pub fn issue(&self, user_id: Uuid, username: Option<&str>) -> Result<String, jwt_simple::Error> {
        let custom = IdentityClaims {
            username: username.map(str::to_string),
        };

        let mut claims = Claims::with_custom_claims(
            custom,
            Duration::from_secs(self.token_expiry as u64),
        )
        .with_subject(user_id.to_string());

        if let Some(issuer) = &self.issuer {
            claims = claims.with_issuer(issuer);
        }
        if let Some(audience) = &self.audience {
            claims = claims.with_audience(audience);
        }

        self.key_pair.sign(claims)
    }

    pub fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let mut options = VerificationOptions::default();
        if let Some(issuer) = &self.issuer {
            options.allowed_issuers = Some(std::collections::HashSet::from([issuer.clone()]));
        }
        if let Some(audience) = &self.audience {
            options.allowed_audiences = Some(std::collections::HashSet::from([audience.clone()]));
        }

        let token_data = self
            .public_key
            .verify_token::<IdentityClaims>(token, Some(options))
            .map_err(IdentityError::InvalidToken)?;

        let user_id = token_data
            .subject
            .as_deref()
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or(IdentityError::InvalidSubject)?;

        Ok(VerifiedIdentity {
            user_id,
            username: token_data.custom.username,
            exp: token_data
                .expires_at
                .map(|t| t.as_secs() as i64)
                .unwrap_or(0),
            iat: token_data
                .issued_at
                .map(|t| t.as_secs() as i64)
                .unwrap_or(0),
        })
    }
}
