//! Bearer token verification: turns an `Authorization` header into an [`AuthContext`]
//! or a typed rejection. No mutation of the token and no refresh — this is a pure
//! verify step.

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use secrecy::{ExposeSecret, SecretString};

use crate::identity::{AuthContext, Claims, Role};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing or malformed Authorization header")]
    MissingAuth,
    #[error("Authorization header is not a well-formed bearer token")]
    MalformedAuth,
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token declares an unexpected signing algorithm")]
    AlgorithmMismatch,
    #[error("token has expired")]
    Expired,
    #[error("token is missing required claims: {0}")]
    MalformedClaims(String),
}

/// Small trait-like interface consumed by the admission pipeline; the only
/// capability it needs from whatever verifies tokens.
#[async_trait]
pub trait VerifyToken: Send + Sync {
    async fn verify(&self, authorization_header: &str) -> Result<AuthContext, AuthError>;
}

/// Verifies tokens signed with symmetric HMAC-SHA256 under a configured secret.
pub struct TokenVerifier {
    secret: SecretString,
}

impl TokenVerifier {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Splits `"Bearer <token>"` into the raw token, rejecting anything else.
    ///
    /// The scheme is checked case-sensitively and the header must have exactly
    /// two space-separated parts.
    fn extract_bearer(authorization_header: &str) -> Result<&str, AuthError> {
        let mut parts = authorization_header.splitn(2, ' ');
        let (Some(scheme), Some(token)) = (parts.next(), parts.next()) else {
            return Err(AuthError::MalformedAuth);
        };
        if scheme != "Bearer" || token.is_empty() {
            return Err(AuthError::MalformedAuth);
        }
        Ok(token)
    }
}

#[async_trait]
impl VerifyToken for TokenVerifier {
    async fn verify(&self, authorization_header: &str) -> Result<AuthContext, AuthError> {
        if authorization_header.is_empty() {
            return Err(AuthError::MissingAuth);
        }
        let token = Self::extract_bearer(authorization_header)?;

        let mut validation = Validation::new(Algorithm::HS256);
        // exp is checked ourselves below with a strict `>` so we can return the
        // distinct `Expired` variant instead of a generic decode failure.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let decoding_key = DecodingKey::from_secret(self.secret.expose_secret().as_bytes());
        let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|err| {
            use jsonwebtoken::errors::ErrorKind;
            match err.kind() {
                ErrorKind::InvalidAlgorithm => AuthError::AlgorithmMismatch,
                _ => AuthError::InvalidSignature,
            }
        })?;

        if token_data.header.alg != Algorithm::HS256 {
            return Err(AuthError::AlgorithmMismatch);
        }

        let now = chrono::Utc::now().timestamp();
        if token_data.claims.exp <= now {
            return Err(AuthError::Expired);
        }

        let claims = token_data.claims;
        if claims.sub.is_empty() {
            return Err(AuthError::MalformedClaims("sub".to_owned()));
        }
        if claims.username.is_empty() {
            return Err(AuthError::MalformedClaims("username".to_owned()));
        }
        if claims.tenant_id.is_empty() {
            return Err(AuthError::MalformedClaims("tenant_id".to_owned()));
        }
        let role = Role::parse(&claims.role)
            .map_err(|_| AuthError::MalformedClaims("role".to_owned()))?;

        AuthContext::builder()
            .user_id(claims.sub)
            .username(claims.username)
            .tenant_id(claims.tenant_id)
            .role(role)
            .is_api_key(claims.is_api_key)
            .bearer_token(SecretString::from(token))
            .build()
            .map_err(|_| AuthError::MalformedClaims("incomplete claims".to_owned()))
    }
}
