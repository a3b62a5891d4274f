/// Applicant model and database operations
///
/// An applicant is one freelancer's application to one task. Applicants are
/// owned by their task and removed with it.
///
/// # State Machine
///
/// ```text
/// pending → accepted
/// pending → rejected
/// ```
///
/// # Schema
///
/// ```sql
/// CREATE TYPE applicant_status AS ENUM ('Pending', 'Accepted', 'Rejected');
///
/// CREATE TABLE task_applicants (
///     task_id UUID NOT NULL,
///     freelancer_id UUID NOT NULL,
///     name VARCHAR(255) NOT NULL,
///     applied_at TIMESTAMPTZ NOT NULL DEFAULT clock_timestamp(),
///     status applicant_status NOT NULL DEFAULT 'Pending',
///     reviewed_at TIMESTAMPTZ,
///     CONSTRAINT task_applicants_task_freelancer_key UNIQUE (task_id, freelancer_id),
///     CONSTRAINT task_applicants_task_fkey FOREIGN KEY (task_id)
///         REFERENCES tasks(id) ON DELETE CASCADE,
///     CONSTRAINT task_applicants_freelancer_fkey FOREIGN KEY (freelancer_id)
///         REFERENCES users(id) ON DELETE CASCADE
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Review status of an application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "applicant_status")]
pub enum ApplicantStatus {
    /// Waiting for the task owner's review
    Pending,

    /// Accepted by the task owner
    Accepted,

    /// Rejected by the task owner
    Rejected,
}

impl ApplicantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicantStatus::Pending => "Pending",
            ApplicantStatus::Accepted => "Accepted",
            ApplicantStatus::Rejected => "Rejected",
        }
    }

    /// Checks if the owner has already decided
    pub fn is_terminal(&self) -> bool {
        matches!(self, ApplicantStatus::Accepted | ApplicantStatus::Rejected)
    }

    /// Checks if transition to target status is valid
    pub fn can_transition_to(&self, target: ApplicantStatus) -> bool {
        matches!(
            (self, target),
            (ApplicantStatus::Pending, ApplicantStatus::Accepted)
                | (ApplicantStatus::Pending, ApplicantStatus::Rejected)
        )
    }
}

impl fmt::Display for ApplicantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicantStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(ApplicantStatus::Pending),
            "Accepted" => Ok(ApplicantStatus::Accepted),
            "Rejected" => Ok(ApplicantStatus::Rejected),
            other => Err(format!("Unknown applicant status: {}", other)),
        }
    }
}

/// One freelancer's application to one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Applicant {
    pub task_id: Uuid,

    /// Freelancer's user ID
    pub freelancer_id: Uuid,

    /// Display name given when applying
    pub name: String,

    pub applied_at: DateTime<Utc>,

    pub status: ApplicantStatus,

    /// When the owner accepted or rejected the application
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Input for recording an application
#[derive(Debug, Clone)]
pub struct NewApplicant {
    pub freelancer_id: Uuid,
    pub name: String,
}

/// Flattened applicant row for the task owner's review dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantView {
    pub task_id: Uuid,
    pub task_title: String,
    pub freelancer_id: Uuid,
    pub name: String,
    pub applied_at: DateTime<Utc>,
    pub status: ApplicantStatus,
}

impl Applicant {
    /// Records an application unless the freelancer already applied
    ///
    /// The duplicate check and the insert are a single statement, so two
    /// concurrent applications from the same freelancer cannot both succeed.
    ///
    /// # Returns
    ///
    /// The new applicant, or `None` if one already existed for
    /// `(task_id, freelancer_id)`
    ///
    /// # Errors
    ///
    /// Fails with a foreign key violation if the task does not exist
    pub async fn insert_if_absent(
        pool: &PgPool,
        task_id: Uuid,
        data: NewApplicant,
    ) -> Result<Option<Self>, sqlx::Error> {
        let applicant = sqlx::query_as::<_, Applicant>(
            r#"
            INSERT INTO task_applicants (task_id, freelancer_id, name)
            VALUES ($1, $2, $3)
            ON CONFLICT ON CONSTRAINT task_applicants_task_freelancer_key DO NOTHING
            RETURNING task_id, freelancer_id, name, applied_at, status, reviewed_at
            "#,
        )
        .bind(task_id)
        .bind(data.freelancer_id)
        .bind(data.name)
        .fetch_optional(pool)
        .await?;

        Ok(applicant)
    }

    /// Finds one application
    pub async fn find(
        pool: &PgPool,
        task_id: Uuid,
        freelancer_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let applicant = sqlx::query_as::<_, Applicant>(
            r#"
            SELECT task_id, freelancer_id, name, applied_at, status, reviewed_at
            FROM task_applicants
            WHERE task_id = $1 AND freelancer_id = $2
            "#,
        )
        .bind(task_id)
        .bind(freelancer_id)
        .fetch_optional(pool)
        .await?;

        Ok(applicant)
    }

    /// Lists applicants of several tasks, oldest application first
    pub async fn list_for_tasks(pool: &PgPool, task_ids: &[Uuid]) -> Result<Vec<Self>, sqlx::Error> {
        let applicants = sqlx::query_as::<_, Applicant>(
            r#"
            SELECT task_id, freelancer_id, name, applied_at, status, reviewed_at
            FROM task_applicants
            WHERE task_id = ANY($1)
            ORDER BY applied_at ASC
            "#,
        )
        .bind(task_ids)
        .fetch_all(pool)
        .await?;

        Ok(applicants)
    }

    /// Moves a pending applicant to `target`
    ///
    /// Returns `None` if the applicant doesn't exist or is no longer pending.
    pub async fn transition_from_pending(
        pool: &PgPool,
        task_id: Uuid,
        freelancer_id: Uuid,
        target: ApplicantStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        let applicant = sqlx::query_as::<_, Applicant>(
            r#"
            UPDATE task_applicants
            SET status = $3,
                reviewed_at = NOW()
            WHERE task_id = $1 AND freelancer_id = $2 AND status = 'Pending'
            RETURNING task_id, freelancer_id, name, applied_at, status, reviewed_at
            "#,
        )
        .bind(task_id)
        .bind(freelancer_id)
        .bind(target)
        .fetch_optional(pool)
        .await?;

        Ok(applicant)
    }
}
