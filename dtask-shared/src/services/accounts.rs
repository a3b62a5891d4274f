/// Account registration, sign-in and session verification
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use dtask_shared::auth::jwt::TokenIssuer;
/// use dtask_shared::auth::password::HashParams;
/// use dtask_shared::services::accounts::{AccountService, Registration};
/// use dtask_shared::store::memory::MemoryStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let accounts = AccountService::new(
///     Arc::new(MemoryStore::new()),
///     TokenIssuer::new("a-signing-secret-of-at-least-32-bytes"),
///     HashParams::default(),
/// );
///
/// let session = accounts
///     .register(Registration {
///         full_name: "Ada Lovelace".into(),
///         email: "ada@example.com".into(),
///         phone: "555-0100".into(),
///         location: None,
///         password: "hunter22".into(),
///         confirm_password: "hunter22".into(),
///         role: "Client".into(),
///         wallet_address: "0xabc".into(),
///     })
///     .await?;
///
/// let ctx = accounts.verify_token(Some(session.token.as_str())).await?;
/// assert_eq!(ctx.user_id, session.user.id);
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::context::AuthContext;
use crate::auth::jwt::TokenIssuer;
use crate::auth::password::{hash_password, verify_password, HashParams};
use crate::error::{MarketError, MarketResult};
use crate::models::user::{normalize_email, NewUser, Role, User, UserProfile, UserSummary};
use crate::store::{Store, StoreError, UniqueKey};

const MISSING_FIELDS: &str = "Please fill all required fields";
const EMAIL_TAKEN: &str = "Email already registered";
const USER_NOT_FOUND: &str = "User not found";
const USER_NOT_FOUND_FOR_ROLE: &str = "User not found for this role";

/// Registration form, as submitted
///
/// Fields are raw strings; an empty or blank value counts as missing.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub location: Option<String>,
    pub password: String,
    pub confirm_password: String,
    pub role: String,
    pub wallet_address: String,
}

/// Result of a successful register or login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub user: UserSummary,
    pub token: String,
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn wallet_taken(role: Role) -> MarketError {
    MarketError::Conflict(format!("{} already registered with this wallet", role))
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn Store>,
    tokens: TokenIssuer,
    hash_params: HashParams,
}

impl AccountService {
    pub fn new(store: Arc<dyn Store>, tokens: TokenIssuer, hash_params: HashParams) -> Self {
        Self {
            store,
            tokens,
            hash_params,
        }
    }

    /// Creates an account and signs it in
    ///
    /// Checks run in a fixed order and the first failure wins: required
    /// fields, email uniqueness, (wallet, role) uniqueness when the role is
    /// known, password confirmation, then role validity.
    ///
    /// # Errors
    ///
    /// - `Validation`: missing field, password mismatch, unknown role
    /// - `Conflict`: email or (wallet, role) already registered
    pub async fn register(&self, form: Registration) -> MarketResult<AuthSession> {
        let required = [
            &form.full_name,
            &form.email,
            &form.phone,
            &form.password,
            &form.confirm_password,
            &form.role,
            &form.wallet_address,
        ];
        if required.iter().any(|field| blank(field)) {
            return Err(MarketError::validation(MISSING_FIELDS));
        }

        let email = normalize_email(&form.email);
        let wallet_address = form.wallet_address.trim().to_string();
        let role = form.role.trim().parse::<Role>().ok();

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(MarketError::Conflict(EMAIL_TAKEN.to_string()));
        }

        if let Some(role) = role {
            if self
                .store
                .find_user_by_wallet_and_role(&wallet_address, role)
                .await?
                .is_some()
            {
                return Err(wallet_taken(role));
            }
        }

        if form.password != form.confirm_password {
            return Err(MarketError::validation("Passwords do not match"));
        }

        let Some(role) = role else {
            return Err(MarketError::validation("Invalid role selected"));
        };

        let password_hash = self.hash(form.password).await?;

        let user = self
            .store
            .insert_user(NewUser {
                full_name: form.full_name.trim().to_string(),
                email,
                phone: form.phone.trim().to_string(),
                location: form.location.map(|l| l.trim().to_string()).unwrap_or_default(),
                password_hash,
                role,
                wallet_address,
            })
            .await
            .map_err(|e| match e {
                StoreError::Duplicate(UniqueKey::UserEmail) => {
                    MarketError::Conflict(EMAIL_TAKEN.to_string())
                }
                StoreError::Duplicate(UniqueKey::UserWalletRole) => wallet_taken(role),
                other => MarketError::Store(other),
            })?;

        tracing::info!(user_id = %user.id, role = %user.role, "User registered");

        self.session_for(&user)
    }

    /// Signs in with email and password
    ///
    /// # Errors
    ///
    /// - `NotFound` ("User not found") when no account has that email
    /// - `Unauthorized` ("Invalid credentials") on a wrong password
    pub async fn authenticate(&self, email: &str, password: &str) -> MarketResult<AuthSession> {
        if blank(email) || password.is_empty() {
            return Err(MarketError::validation(MISSING_FIELDS));
        }

        let user = self
            .store
            .find_user_by_email(&normalize_email(email))
            .await?
            .ok_or_else(|| MarketError::not_found(USER_NOT_FOUND))?;

        let password = password.to_string();
        let hash = user.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await??;

        if !matches {
            tracing::warn!(user_id = %user.id, "Failed sign-in attempt");
            return Err(MarketError::Unauthorized("Invalid credentials".to_string()));
        }

        tracing::info!(user_id = %user.id, role = %user.role, "User signed in");

        self.session_for(&user)
    }

    pub async fn get_by_id(&self, id: Uuid) -> MarketResult<UserProfile> {
        self.store
            .find_user_by_id(id)
            .await?
            .map(UserProfile::from)
            .ok_or_else(|| MarketError::not_found(USER_NOT_FOUND))
    }

    pub async fn get_by_id_and_role(&self, id: Uuid, role: Role) -> MarketResult<UserProfile> {
        self.store
            .find_user_by_id_and_role(id, role)
            .await?
            .map(UserProfile::from)
            .ok_or_else(|| MarketError::not_found(USER_NOT_FOUND_FOR_ROLE))
    }

    /// Verifies a bearer token and re-resolves its account
    ///
    /// The token must still name an existing account with the same role; an
    /// account that disappeared after issuance no longer authenticates.
    pub async fn verify_token(&self, token: Option<&str>) -> MarketResult<AuthContext> {
        let token = token
            .filter(|t| !blank(t))
            .ok_or_else(|| MarketError::Unauthorized("missing token".to_string()))?;

        let claims = self.tokens.decode(token).map_err(|e| {
            tracing::debug!(error = %e, "Token rejected");
            MarketError::Unauthorized("invalid or expired token".to_string())
        })?;

        let user = self
            .store
            .find_user_by_id_and_role(claims.sub, claims.role)
            .await?
            .ok_or_else(|| MarketError::Unauthorized(USER_NOT_FOUND_FOR_ROLE.to_string()))?;

        Ok(AuthContext::new(user.id, user.role))
    }

    /// Resolves a freelancer by account ID or wallet address
    ///
    /// A UUID is looked up as a Freelancer account ID; anything else as a
    /// wallet registered under the Freelancer role.
    pub async fn resolve_freelancer(&self, identifier: &str) -> MarketResult<User> {
        let identifier = identifier.trim();

        let user = match Uuid::parse_str(identifier) {
            Ok(id) => self.store.find_user_by_id_and_role(id, Role::Freelancer).await?,
            Err(_) => {
                self.store
                    .find_user_by_wallet_and_role(identifier, Role::Freelancer)
                    .await?
            }
        };

        user.ok_or_else(|| MarketError::not_found("Freelancer not found"))
    }

    async fn hash(&self, password: String) -> MarketResult<String> {
        let params = self.hash_params;
        let hash = tokio::task::spawn_blocking(move || hash_password(&password, &params)).await??;
        Ok(hash)
    }

    fn session_for(&self, user: &User) -> MarketResult<AuthSession> {
        let token = self
            .tokens
            .issue(user.id, user.role)
            .map_err(|e| MarketError::Internal(e.to_string()))?;

        Ok(AuthSession {
            user: UserSummary::from(user),
            token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    const SECRET: &str = "test-secret-that-is-long-enough-for-hs256";

    fn service() -> AccountService {
        AccountService::new(
            Arc::new(MemoryStore::new()),
            TokenIssuer::new(SECRET),
            HashParams::insecure_fast(),
        )
    }

    fn registration(email: &str, wallet: &str, role: &str) -> Registration {
        Registration {
            full_name: "Ada Lovelace".to_string(),
            email: email.to_string(),
            phone: "555-0100".to_string(),
            location: Some("London".to_string()),
            password: "correct horse".to_string(),
            confirm_password: "correct horse".to_string(),
            role: role.to_string(),
            wallet_address: wallet.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_and_verify_round_trip() {
        let accounts = service();
        let session = accounts
            .register(registration("ada@example.com", "0xabc", "Client"))
            .await
            .unwrap();

        assert_eq!(session.user.role, Role::Client);
        assert_eq!(session.user.email, "ada@example.com");

        let ctx = accounts.verify_token(Some(session.token.as_str())).await.unwrap();
        assert_eq!(ctx, AuthContext::new(session.user.id, Role::Client));
    }

    #[tokio::test]
    async fn test_register_requires_fields() {
        let accounts = service();
        let mut form = registration("ada@example.com", "0xabc", "Client");
        form.phone = "   ".to_string();

        let err = accounts.register(form).await.unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)));
        assert_eq!(err.to_string(), "Please fill all required fields");
    }

    #[tokio::test]
    async fn test_register_conflicts() {
        let accounts = service();
        accounts
            .register(registration("ada@example.com", "0xabc", "Client"))
            .await
            .unwrap();

        let err = accounts
            .register(registration("ADA@example.com ", "0xdef", "Freelancer"))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Conflict(_)));
        assert_eq!(err.to_string(), "Email already registered");

        let err = accounts
            .register(registration("other@example.com", "0xabc", "Client"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Client already registered with this wallet");

        // Same wallet under the other role
        accounts
            .register(registration("other@example.com", "0xabc", "Freelancer"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_register_check_order() {
        let accounts = service();
        accounts
            .register(registration("ada@example.com", "0xabc", "Client"))
            .await
            .unwrap();

        // Duplicate email beats password mismatch
        let mut form = registration("ada@example.com", "0x1", "Client");
        form.confirm_password = "different".to_string();
        assert_eq!(
            accounts.register(form).await.unwrap_err().to_string(),
            "Email already registered"
        );

        // Password mismatch beats invalid role
        let mut form = registration("new@example.com", "0x2", "Admin");
        form.confirm_password = "different".to_string();
        assert_eq!(
            accounts.register(form).await.unwrap_err().to_string(),
            "Passwords do not match"
        );

        let err = accounts
            .register(registration("new@example.com", "0x2", "Admin"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid role selected");
    }

    #[tokio::test]
    async fn test_authenticate_failure_modes() {
        let accounts = service();
        accounts
            .register(registration("ada@example.com", "0xabc", "Client"))
            .await
            .unwrap();

        let err = accounts
            .authenticate("nobody@example.com", "correct horse")
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::NotFound(_)));
        assert_eq!(err.to_string(), "User not found");

        let err = accounts
            .authenticate("ada@example.com", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Unauthorized(_)));
        assert_eq!(err.to_string(), "Invalid credentials");

        let session = accounts
            .authenticate(" Ada@Example.com", "correct horse")
            .await
            .unwrap();
        assert_eq!(session.user.full_name, "Ada Lovelace");
    }

    #[tokio::test]
    async fn test_verify_token_failures() {
        let accounts = service();

        let err = accounts.verify_token(None).await.unwrap_err();
        assert_eq!(err.to_string(), "missing token");

        let err = accounts.verify_token(Some("not-a-jwt")).await.unwrap_err();
        assert_eq!(err.to_string(), "invalid or expired token");

        // Well-signed token for an account that does not exist
        let orphan = TokenIssuer::new(SECRET).issue(Uuid::new_v4(), Role::Client).unwrap();
        let err = accounts.verify_token(Some(orphan.as_str())).await.unwrap_err();
        assert!(matches!(err, MarketError::Unauthorized(_)));
        assert_eq!(err.to_string(), "User not found for this role");

        // Token signed with another secret
        let foreign = TokenIssuer::new("another-secret-that-is-long-enough!!")
            .issue(Uuid::new_v4(), Role::Client)
            .unwrap();
        let err = accounts.verify_token(Some(foreign.as_str())).await.unwrap_err();
        assert_eq!(err.to_string(), "invalid or expired token");
    }

    #[tokio::test]
    async fn test_token_role_must_match_account() {
        let accounts = service();
        let session = accounts
            .register(registration("ada@example.com", "0xabc", "Client"))
            .await
            .unwrap();

        let forged_role = TokenIssuer::new(SECRET)
            .issue(session.user.id, Role::Freelancer)
            .unwrap();
        let err = accounts.verify_token(Some(forged_role.as_str())).await.unwrap_err();
        assert_eq!(err.to_string(), "User not found for this role");
    }

    #[tokio::test]
    async fn test_profiles() {
        let accounts = service();
        let session = accounts
            .register(registration("ada@example.com", "0xabc", "Client"))
            .await
            .unwrap();

        let profile = accounts.get_by_id(session.user.id).await.unwrap();
        assert_eq!(profile.location, "London");
        assert_eq!(profile.wallet_address, "0xabc");

        let err = accounts
            .get_by_id_and_role(session.user.id, Role::Freelancer)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "User not found for this role");

        let err = accounts.get_by_id(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, MarketError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_resolve_freelancer() {
        let accounts = service();
        let client = accounts
            .register(registration("c@example.com", "0xabc", "Client"))
            .await
            .unwrap();
        let freelancer = accounts
            .register(registration("f@example.com", "0xabc", "Freelancer"))
            .await
            .unwrap();

        let by_wallet = accounts.resolve_freelancer("0xabc").await.unwrap();
        assert_eq!(by_wallet.id, freelancer.user.id);

        let by_id = accounts
            .resolve_freelancer(&freelancer.user.id.to_string())
            .await
            .unwrap();
        assert_eq!(by_id.id, freelancer.user.id);

        // A Client id is not a freelancer
        assert!(accounts
            .resolve_freelancer(&client.user.id.to_string())
            .await
            .is_err());
        assert!(accounts.resolve_freelancer("0xunknown").await.is_err());
    }
}
