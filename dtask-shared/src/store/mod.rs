/// Persistence interfaces
///
/// Services talk to storage through [`UserStore`] and [`TaskStore`]. Two
/// implementations exist:
///
/// - [`postgres::PgStore`]: production store on top of the sqlx models
/// - [`memory::MemoryStore`]: process-local store for development and tests
///
/// Both enforce the same invariants at the store layer: unique email, unique
/// (wallet, role), and at most one application per (task, freelancer), the
/// latter checked and written as one atomic step.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::applicant::{Applicant, ApplicantStatus, NewApplicant};
use crate::models::task::{NewTask, Task};
use crate::models::user::{NewUser, Role, User};

pub mod memory;
pub mod postgres;

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Uniqueness rules enforced by every store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueKey {
    /// `users.email`
    UserEmail,

    /// `users.(wallet_address, role)`
    UserWalletRole,

    /// `task_applicants.(task_id, freelancer_id)`
    TaskApplicant,
}

impl UniqueKey {
    /// Name of the PostgreSQL constraint backing this rule
    pub fn constraint(&self) -> &'static str {
        match self {
            UniqueKey::UserEmail => "users_email_key",
            UniqueKey::UserWalletRole => "users_wallet_role_key",
            UniqueKey::TaskApplicant => "task_applicants_task_freelancer_key",
        }
    }

    pub fn from_constraint(name: &str) -> Option<Self> {
        [UniqueKey::UserEmail, UniqueKey::UserWalletRole, UniqueKey::TaskApplicant]
            .into_iter()
            .find(|key| key.constraint() == name)
    }
}

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness rule was violated
    #[error("Duplicate value violates {}", .0.constraint())]
    Duplicate(UniqueKey),

    /// Any other database failure
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// The store cannot serve requests
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                if let Some(key) = db_err.constraint().and_then(UniqueKey::from_constraint) {
                    return StoreError::Duplicate(key);
                }
            }
        }

        StoreError::Database(err)
    }
}

/// Result of recording an application
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// The application was recorded
    Applied(Applicant),

    /// The freelancer had already applied; nothing changed
    AlreadyApplied,

    /// No task with that ID
    TaskNotFound,
}

/// Result of moving an applicant towards a review decision
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewOutcome {
    /// Pending applicant moved to the target status
    Updated(Applicant),

    /// Applicant was already in the target status; nothing changed
    Unchanged(Applicant),

    /// Applicant already holds the opposite decision
    Conflicting(Applicant),

    /// No such applicant on the task
    ApplicantNotFound,
}

/// Credential store
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a user, failing with `StoreError::Duplicate` on email or
    /// (wallet, role) collisions
    async fn insert_user(&self, data: NewUser) -> StoreResult<User>;

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn find_user_by_id_and_role(&self, id: Uuid, role: Role) -> StoreResult<Option<User>>;

    /// `email` must already be normalized
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn find_user_by_wallet_and_role(
        &self,
        wallet_address: &str,
        role: Role,
    ) -> StoreResult<Option<User>>;
}

/// Task and application store
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert_task(&self, data: NewTask) -> StoreResult<Task>;

    /// Task with its applicants
    async fn find_task(&self, id: Uuid) -> StoreResult<Option<Task>>;

    /// All tasks, newest first
    async fn list_tasks(&self) -> StoreResult<Vec<Task>>;

    /// Tasks posted by `owner_id`, newest first
    async fn list_tasks_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Task>>;

    /// Returns false if the task did not exist
    async fn delete_task(&self, id: Uuid) -> StoreResult<bool>;

    /// Appends an applicant unless `(task_id, freelancer_id)` already exists,
    /// atomically
    async fn add_applicant(&self, task_id: Uuid, data: NewApplicant) -> StoreResult<ApplyOutcome>;

    /// Moves a pending applicant to `target`; see [`ReviewOutcome`]
    async fn review_applicant(
        &self,
        task_id: Uuid,
        freelancer_id: Uuid,
        target: ApplicantStatus,
    ) -> StoreResult<ReviewOutcome>;
}

/// Full store used by the services
#[async_trait]
pub trait Store: UserStore + TaskStore {
    /// Short backend name for health reporting
    fn backend(&self) -> &'static str;

    /// Verifies the store can serve requests
    async fn ping(&self) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_key_constraint_names_round_trip() {
        for key in [UniqueKey::UserEmail, UniqueKey::UserWalletRole, UniqueKey::TaskApplicant] {
            assert_eq!(UniqueKey::from_constraint(key.constraint()), Some(key));
        }
        assert_eq!(UniqueKey::from_constraint("tasks_pkey"), None);
    }

    #[test]
    fn test_non_database_sqlx_errors_stay_generic() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[test]
    fn test_duplicate_display() {
        let err = StoreError::Duplicate(UniqueKey::UserEmail);
        assert_eq!(err.to_string(), "Duplicate value violates users_email_key");
    }
}
