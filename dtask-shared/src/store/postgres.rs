/// PostgreSQL store
///
/// Thin adapter from the store traits to the sqlx model functions. All
/// invariants are enforced by constraints declared in `migrations/`.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::{ApplyOutcome, ReviewOutcome, Store, StoreError, StoreResult, TaskStore, UserStore};
use crate::db::pool;
use crate::models::applicant::{Applicant, ApplicantStatus, NewApplicant};
use crate::models::task::{NewTask, Task};
use crate::models::user::{NewUser, Role, User};

/// Foreign key from `task_applicants` to `tasks`
const APPLICANT_TASK_FKEY: &str = "task_applicants_task_fkey";

/// Store backed by a PostgreSQL connection pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, data: NewUser) -> StoreResult<User> {
        Ok(User::create(&self.pool, data).await?)
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(User::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_id_and_role(&self, id: Uuid, role: Role) -> StoreResult<Option<User>> {
        Ok(User::find_by_id_and_role(&self.pool, id, role).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(User::find_by_email(&self.pool, email).await?)
    }

    async fn find_user_by_wallet_and_role(
        &self,
        wallet_address: &str,
        role: Role,
    ) -> StoreResult<Option<User>> {
        Ok(User::find_by_wallet_and_role(&self.pool, wallet_address, role).await?)
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn insert_task(&self, data: NewTask) -> StoreResult<Task> {
        Ok(Task::create(&self.pool, data).await?)
    }

    async fn find_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        Ok(Task::find_by_id(&self.pool, id).await?)
    }

    async fn list_tasks(&self) -> StoreResult<Vec<Task>> {
        Ok(Task::list_recent(&self.pool).await?)
    }

    async fn list_tasks_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Task>> {
        Ok(Task::list_by_owner(&self.pool, owner_id).await?)
    }

    async fn delete_task(&self, id: Uuid) -> StoreResult<bool> {
        Ok(Task::delete(&self.pool, id).await?)
    }

    async fn add_applicant(&self, task_id: Uuid, data: NewApplicant) -> StoreResult<ApplyOutcome> {
        match Applicant::insert_if_absent(&self.pool, task_id, data).await {
            Ok(Some(applicant)) => Ok(ApplyOutcome::Applied(applicant)),
            Ok(None) => Ok(ApplyOutcome::AlreadyApplied),
            Err(sqlx::Error::Database(db_err))
                if db_err.is_foreign_key_violation()
                    && db_err.constraint() == Some(APPLICANT_TASK_FKEY) =>
            {
                debug!(task_id = %task_id, "Application rejected, task missing");
                Ok(ApplyOutcome::TaskNotFound)
            }
            Err(e) => Err(StoreError::from(e)),
        }
    }

    async fn review_applicant(
        &self,
        task_id: Uuid,
        freelancer_id: Uuid,
        target: ApplicantStatus,
    ) -> StoreResult<ReviewOutcome> {
        if let Some(updated) =
            Applicant::transition_from_pending(&self.pool, task_id, freelancer_id, target).await?
        {
            return Ok(ReviewOutcome::Updated(updated));
        }

        // Not pending (or missing): a decision can only move away from
        // Pending, so the current row is final.
        let outcome = match Applicant::find(&self.pool, task_id, freelancer_id).await? {
            None => ReviewOutcome::ApplicantNotFound,
            Some(current) if current.status == target => ReviewOutcome::Unchanged(current),
            Some(current) => ReviewOutcome::Conflicting(current),
        };

        Ok(outcome)
    }
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(pool::health_check(&self.pool).await?)
    }
}
