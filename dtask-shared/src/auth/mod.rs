/// Authentication utilities
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and verification
/// - [`jwt`]: Session token generation and validation
/// - [`context`]: Authenticated caller identity carried through request handling
///
/// # Example
///
/// ```no_run
/// use dtask_shared::auth::password::{hash_password, verify_password, HashParams};
/// use dtask_shared::auth::jwt::TokenIssuer;
/// use dtask_shared::models::user::Role;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("user_password", &HashParams::default())?;
/// assert!(verify_password("user_password", &hash)?);
///
/// let token = TokenIssuer::new("secret-key").issue(Uuid::new_v4(), Role::Client)?;
/// # Ok(())
/// # }
/// ```

pub mod context;
pub mod jwt;
pub mod password;
