/// Session token generation and validation
///
/// Session credentials are JWTs signed with HS256. They assert a user id and
/// the role the user signed in under, so one wallet holding both a Client and
/// a Freelancer account gets two distinct, non-interchangeable tokens.
///
/// # Security
///
/// - **Algorithm**: HS256 (HMAC with SHA-256)
/// - **Lifetime**: fixed 7 days from issuance
/// - **Validation**: signature, expiration, not-before and issuer checks
///
/// # Example
///
/// ```
/// use dtask_shared::auth::jwt::TokenIssuer;
/// use dtask_shared::models::user::Role;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let issuer = TokenIssuer::new("your-secret-key-at-least-32-bytes!!");
/// let user_id = Uuid::new_v4();
///
/// let token = issuer.issue(user_id, Role::Freelancer)?;
/// let claims = issuer.decode(&token)?;
/// assert_eq!(claims.sub, user_id);
/// assert_eq!(claims.role, Role::Freelancer);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::Role;

/// Value of the `iss` claim on every token
pub const ISSUER: &str = "dtask";

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Failed to validate token
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Invalid issuer
    #[error("Invalid token issuer")]
    InvalidIssuer,
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - user ID
    pub sub: Uuid,

    /// Role the user authenticated as
    pub role: Role,

    /// Issuer - always "dtask"
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,
}

impl Claims {
    /// Lifetime of every session token
    pub fn lifetime() -> Duration {
        Duration::days(7)
    }

    /// Creates claims valid for the standard 7-day lifetime
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self::with_expiration(user_id, role, Self::lifetime())
    }

    /// Creates claims with a custom expiration
    pub fn with_expiration(user_id: Uuid, role: Role, expires_in: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            role,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
        }
    }

    /// Checks if token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Signs claims into a JWT string
///
/// # Errors
///
/// Returns `JwtError::CreateError` if encoding fails
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Validates a JWT string and extracts its claims
///
/// # Errors
///
/// Returns an error if the signature is invalid, the token has expired, the
/// issuer is not "dtask", or the token is malformed
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = 0;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
        _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
    })?;

    Ok(token_data.claims)
}

/// Issues and decodes session tokens with a fixed signing secret
///
/// Built once from configuration and shared by the account service.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: String,
}

impl TokenIssuer {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Issues a 7-day token for `(user_id, role)`
    pub fn issue(&self, user_id: Uuid, role: Role) -> Result<String, JwtError> {
        create_token(&Claims::new(user_id, role), &self.secret)
    }

    /// Checks signature, issuer and expiry, returning the claims
    ///
    /// This does not consult the credential store; see
    /// `AccountService::verify_token` for the full check.
    pub fn decode(&self, token: &str) -> Result<Claims, JwtError> {
        validate_token(token, &self.secret)
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer").finish_non_exhaustive()
    }
}
