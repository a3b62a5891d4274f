/// Authenticated caller identity
///
/// After a bearer token has been verified and re-resolved against the
/// credential store, the API layer inserts an [`AuthContext`] into the request
/// extensions. Handlers extract it with `Extension<AuthContext>`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MarketError, MarketResult};
use crate::models::user::Role;

/// Identity of the caller making a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthContext {
    /// Authenticated user ID
    pub user_id: Uuid,

    /// Role of the account the token was issued for
    pub role: Role,
}

impl AuthContext {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Fails with `Forbidden` unless the caller holds `role`
    pub fn require_role(&self, role: Role) -> MarketResult<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(MarketError::Forbidden(format!(
                "Only {} accounts may perform this action",
                role
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_role() {
        let ctx = AuthContext::new(Uuid::new_v4(), Role::Client);

        assert!(ctx.require_role(Role::Client).is_ok());

        let err = ctx.require_role(Role::Freelancer).unwrap_err();
        assert!(matches!(err, MarketError::Forbidden(_)));
        assert_eq!(err.to_string(), "Only Freelancer accounts may perform this action");
    }
}
