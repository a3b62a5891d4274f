/// Task model and database operations
///
/// A task is a work posting owned by the Client who created it. Its
/// applicants live in `task_applicants` and are attached after loading.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     owner_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     title VARCHAR(255) NOT NULL,
///     description TEXT NOT NULL DEFAULT '',
///     budget DOUBLE PRECISION NOT NULL CHECK (budget >= 0),
///     deadline VARCHAR(64) NOT NULL,
///     skills TEXT[] NOT NULL DEFAULT '{}',
///     attachment VARCHAR(512),
///     posted_at TIMESTAMPTZ NOT NULL DEFAULT clock_timestamp()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use super::applicant::Applicant;

/// A work posting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,

    /// Client who posted the task
    pub owner_id: Uuid,

    pub title: String,

    pub description: String,

    pub budget: f64,

    /// Free-form deadline as entered by the client
    pub deadline: String,

    /// Skill tags, in the order given
    pub skills: Vec<String>,

    /// Stored filename of the uploaded attachment, served under `/uploads`
    pub attachment: Option<String>,

    pub posted_at: DateTime<Utc>,

    /// Applications, oldest first
    #[sqlx(skip)]
    pub applicants: Vec<Applicant>,
}

/// Input for creating a task
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub budget: f64,
    pub deadline: String,
    pub skills: Vec<String>,
    pub attachment: Option<String>,
}

/// Splits a comma-separated skill list into trimmed tags
///
/// Empty tags are dropped, so `""` and `" , "` both yield no skills.
pub fn parse_skills(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses a budget as a finite, non-negative number
pub fn parse_budget(raw: &str) -> Result<f64, String> {
    let budget: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("Budget must be a number, got '{}'", raw.trim()))?;

    if !budget.is_finite() {
        return Err("Budget must be a finite number".to_string());
    }
    if budget < 0.0 {
        return Err("Budget must not be negative".to_string());
    }

    Ok(budget)
}

impl Task {
    /// Inserts a new task with no applicants
    pub async fn create(pool: &PgPool, data: NewTask) -> Result<Self, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (owner_id, title, description, budget, deadline, skills, attachment)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, owner_id, title, description, budget, deadline, skills,
                      attachment, posted_at
            "#,
        )
        .bind(data.owner_id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.budget)
        .bind(data.deadline)
        .bind(data.skills)
        .bind(data.attachment)
        .fetch_one(pool)
        .await?;

        Ok(task)
    }

    /// Finds a task by ID, with its applicants
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, owner_id, title, description, budget, deadline, skills,
                   attachment, posted_at
            FROM tasks
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        match task {
            Some(task) => {
                let mut tasks = vec![task];
                Self::attach_applicants(pool, &mut tasks).await?;
                Ok(tasks.pop())
            }
            None => Ok(None),
        }
    }

    /// Lists all tasks, newest first, with their applicants
    pub async fn list_recent(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let mut tasks = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, owner_id, title, description, budget, deadline, skills,
                   attachment, posted_at
            FROM tasks
            ORDER BY posted_at DESC, id
            "#,
        )
        .fetch_all(pool)
        .await?;

        Self::attach_applicants(pool, &mut tasks).await?;
        Ok(tasks)
    }

    /// Lists tasks posted by one client, newest first, with their applicants
    pub async fn list_by_owner(pool: &PgPool, owner_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let mut tasks = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, owner_id, title, description, budget, deadline, skills,
                   attachment, posted_at
            FROM tasks
            WHERE owner_id = $1
            ORDER BY posted_at DESC, id
            "#,
        )
        .bind(owner_id)
        .fetch_all(pool)
        .await?;

        Self::attach_applicants(pool, &mut tasks).await?;
        Ok(tasks)
    }

    /// Deletes a task and, by cascade, its applicants
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Loads applicants for every task in one query
    async fn attach_applicants(pool: &PgPool, tasks: &mut [Task]) -> Result<(), sqlx::Error> {
        if tasks.is_empty() {
            return Ok(());
        }

        let ids: Vec<Uuid> = tasks.iter().map(|t| t.id).collect();
        let mut by_task: HashMap<Uuid, Vec<Applicant>> = HashMap::new();
        for applicant in Applicant::list_for_tasks(pool, &ids).await? {
            by_task.entry(applicant.task_id).or_default().push(applicant);
        }

        for task in tasks.iter_mut() {
            task.applicants = by_task.remove(&task.id).unwrap_or_default();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skills_trims_tags() {
        assert_eq!(parse_skills("React, Node"), vec!["React", "Node"]);
        assert_eq!(parse_skills(" Rust ,  SQL,Go "), vec!["Rust", "SQL", "Go"]);
    }

    #[test]
    fn test_parse_skills_drops_empty_tags() {
        assert!(parse_skills("").is_empty());
        assert!(parse_skills(" , ,").is_empty());
        assert_eq!(parse_skills("a,,b"), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_budget() {
        assert_eq!(parse_budget("100").unwrap(), 100.0);
        assert_eq!(parse_budget(" 99.5 ").unwrap(), 99.5);
        assert_eq!(parse_budget("0").unwrap(), 0.0);
    }

    #[test]
    fn test_parse_budget_rejects_bad_values() {
        assert!(parse_budget("abc").is_err());
        assert!(parse_budget("").is_err());
        assert!(parse_budget("-1").is_err());
        assert!(parse_budget("NaN").is_err());
        assert!(parse_budget("inf").is_err());
    }

    #[test]
    fn test_task_serialization() {
        let task = Task {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            title: "Build landing page".to_string(),
            description: String::new(),
            budget: 100.0,
            deadline: "2026-12-01".to_string(),
            skills: vec!["React".to_string()],
            attachment: None,
            posted_at: Utc::now(),
            applicants: Vec::new(),
        };

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["budget"], 100.0);
        assert!(json["postedAt"].is_string());
        assert!(json["ownerId"].is_string());
        assert_eq!(json["applicants"].as_array().unwrap().len(), 0);
    }
}
