/// Task postings and the application workflow
///
/// Clients post tasks and review applicants; freelancers apply. Every
/// operation that changes a task takes the caller's [`AuthContext`] and
/// checks role and ownership here, not in the HTTP layer.

use std::sync::Arc;
use uuid::Uuid;

use super::accounts::AccountService;
use crate::auth::context::AuthContext;
use crate::error::{MarketError, MarketResult};
use crate::models::applicant::{Applicant, ApplicantStatus, ApplicantView, NewApplicant};
use crate::models::task::{parse_budget, parse_skills, NewTask, Task};
use crate::models::user::Role;
use crate::store::{ApplyOutcome, ReviewOutcome, Store};

const TASK_NOT_FOUND: &str = "Task not found";

/// Column widths of `tasks.title` and `tasks.deadline`
pub const MAX_TITLE_LEN: usize = 255;
pub const MAX_DEADLINE_LEN: usize = 64;

/// Raw task form fields, from multipart or JSON
#[derive(Debug, Clone, Default)]
pub struct ListingInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub budget: Option<String>,
    pub deadline: Option<String>,
    /// Comma-separated skill tags
    pub skills: Option<String>,
}

/// A validated task posting, not yet stored
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub title: String,
    pub description: String,
    pub budget: f64,
    pub deadline: String,
    pub skills: Vec<String>,
}

impl Listing {
    /// Validates the raw form
    ///
    /// Title, budget and deadline are required; the budget must be a finite,
    /// non-negative number. Title and deadline lengths are counted in
    /// characters, as Postgres does for `VARCHAR`.
    pub fn parse(input: ListingInput) -> MarketResult<Self> {
        let present = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let (Some(title), Some(budget), Some(deadline)) = (
            present(input.title),
            present(input.budget),
            present(input.deadline),
        ) else {
            return Err(MarketError::validation("Title, budget and deadline are required"));
        };

        if title.chars().count() > MAX_TITLE_LEN {
            return Err(MarketError::Validation(format!(
                "Title must be at most {} characters",
                MAX_TITLE_LEN
            )));
        }
        if deadline.chars().count() > MAX_DEADLINE_LEN {
            return Err(MarketError::Validation(format!(
                "Deadline must be at most {} characters",
                MAX_DEADLINE_LEN
            )));
        }

        let budget = parse_budget(&budget).map_err(MarketError::Validation)?;

        Ok(Self {
            title,
            description: input.description.unwrap_or_default().trim().to_string(),
            budget,
            deadline,
            skills: input.skills.as_deref().map(parse_skills).unwrap_or_default(),
        })
    }
}

/// Optional fields of an application
#[derive(Debug, Clone, Default)]
pub struct ApplicationInput {
    /// Account ID or wallet of the applying freelancer; must be the caller
    pub freelancer_id: Option<String>,

    /// Display name; defaults to the caller's full name
    pub name: Option<String>,
}

#[derive(Clone)]
pub struct MarketplaceService {
    store: Arc<dyn Store>,
    accounts: AccountService,
}

impl MarketplaceService {
    pub fn new(store: Arc<dyn Store>, accounts: AccountService) -> Self {
        Self { store, accounts }
    }

    /// Stores a validated listing owned by the caller
    ///
    /// `attachment` is the stored filename of an already-saved upload.
    ///
    /// # Errors
    ///
    /// `Forbidden` unless the caller is a Client
    pub async fn post_task(
        &self,
        ctx: &AuthContext,
        listing: Listing,
        attachment: Option<String>,
    ) -> MarketResult<Task> {
        ctx.require_role(Role::Client)?;

        let task = self
            .store
            .insert_task(NewTask {
                owner_id: ctx.user_id,
                title: listing.title,
                description: listing.description,
                budget: listing.budget,
                deadline: listing.deadline,
                skills: listing.skills,
                attachment,
            })
            .await?;

        tracing::info!(task_id = %task.id, owner_id = %task.owner_id, "Task posted");

        Ok(task)
    }

    /// All tasks, newest first
    pub async fn list_tasks(&self) -> MarketResult<Vec<Task>> {
        Ok(self.store.list_tasks().await?)
    }

    pub async fn get_task(&self, task_id: Uuid) -> MarketResult<Task> {
        self.store
            .find_task(task_id)
            .await?
            .ok_or_else(|| MarketError::not_found(TASK_NOT_FOUND))
    }

    /// Records the caller's application to a task
    ///
    /// # Errors
    ///
    /// - `Forbidden`: caller is not a Freelancer, or `freelancer_id` names
    ///   someone else
    /// - `NotFound`: no such task
    /// - `Conflict`: the caller already applied
    pub async fn apply_to_task(
        &self,
        task_id: Uuid,
        ctx: &AuthContext,
        input: ApplicationInput,
    ) -> MarketResult<Applicant> {
        ctx.require_role(Role::Freelancer)?;

        if let Some(hint) = input.freelancer_id.as_deref().filter(|h| !h.trim().is_empty()) {
            let named = self.accounts.resolve_freelancer(hint).await?;
            if named.id != ctx.user_id {
                return Err(MarketError::Forbidden(
                    "You can only apply on your own behalf".to_string(),
                ));
            }
        }

        let name = match input.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) {
            Some(name) => name,
            None => self.accounts.get_by_id(ctx.user_id).await?.full_name,
        };

        let outcome = self
            .store
            .add_applicant(
                task_id,
                NewApplicant {
                    freelancer_id: ctx.user_id,
                    name,
                },
            )
            .await?;

        match outcome {
            ApplyOutcome::Applied(applicant) => {
                tracing::info!(
                    task_id = %task_id,
                    freelancer_id = %ctx.user_id,
                    "Application submitted"
                );
                Ok(applicant)
            }
            ApplyOutcome::AlreadyApplied => Err(MarketError::Conflict(
                "You have already applied to this task".to_string(),
            )),
            ApplyOutcome::TaskNotFound => Err(MarketError::not_found(TASK_NOT_FOUND)),
        }
    }

    /// Deletes a task owned by the caller, with its applicants
    pub async fn delete_task(&self, task_id: Uuid, ctx: &AuthContext) -> MarketResult<()> {
        self.owned_task(task_id, ctx, "You can only delete your own tasks")
            .await?;

        if !self.store.delete_task(task_id).await? {
            return Err(MarketError::not_found(TASK_NOT_FOUND));
        }

        tracing::info!(task_id = %task_id, owner_id = %ctx.user_id, "Task deleted");
        Ok(())
    }

    pub async fn accept_applicant(
        &self,
        task_id: Uuid,
        freelancer: &str,
        ctx: &AuthContext,
    ) -> MarketResult<Applicant> {
        self.review_applicant(task_id, freelancer, ctx, ApplicantStatus::Accepted)
            .await
    }

    pub async fn reject_applicant(
        &self,
        task_id: Uuid,
        freelancer: &str,
        ctx: &AuthContext,
    ) -> MarketResult<Applicant> {
        self.review_applicant(task_id, freelancer, ctx, ApplicantStatus::Rejected)
            .await
    }

    /// Moves an applicant to `target` on behalf of the task owner
    ///
    /// `freelancer` is an account ID or a Freelancer wallet. Repeating a
    /// decision is a no-op; reversing one is a `Conflict`.
    pub async fn review_applicant(
        &self,
        task_id: Uuid,
        freelancer: &str,
        ctx: &AuthContext,
        target: ApplicantStatus,
    ) -> MarketResult<Applicant> {
        if !target.is_terminal() {
            return Err(MarketError::validation("Status must be Accepted or Rejected"));
        }

        self.owned_task(task_id, ctx, "Only the task owner can review applicants")
            .await?;

        let freelancer_id = match self.accounts.resolve_freelancer(freelancer).await {
            Ok(user) => user.id,
            Err(MarketError::NotFound(_)) => {
                return Err(MarketError::not_found("Applicant not found"))
            }
            Err(e) => return Err(e),
        };

        match self
            .store
            .review_applicant(task_id, freelancer_id, target)
            .await?
        {
            ReviewOutcome::Updated(applicant) => {
                tracing::info!(
                    task_id = %task_id,
                    freelancer_id = %freelancer_id,
                    status = %applicant.status,
                    "Applicant reviewed"
                );
                Ok(applicant)
            }
            ReviewOutcome::Unchanged(applicant) => Ok(applicant),
            ReviewOutcome::Conflicting(applicant) => Err(MarketError::Conflict(format!(
                "Applicant has already been {}",
                applicant.status.as_str().to_lowercase()
            ))),
            ReviewOutcome::ApplicantNotFound => Err(MarketError::not_found("Applicant not found")),
        }
    }

    /// Review dispatch by status name (`"Accepted"` or `"Rejected"`)
    pub async fn update_applicant_status(
        &self,
        task_id: Uuid,
        freelancer: &str,
        status: &str,
        ctx: &AuthContext,
    ) -> MarketResult<Applicant> {
        let target = status
            .trim()
            .parse::<ApplicantStatus>()
            .map_err(|_| MarketError::validation("Status must be Accepted or Rejected"))?;

        self.review_applicant(task_id, freelancer, ctx, target).await
    }

    /// Applicants across every task the calling Client owns, newest task
    /// first, then by application time
    pub async fn client_applicants(&self, ctx: &AuthContext) -> MarketResult<Vec<ApplicantView>> {
        ctx.require_role(Role::Client)?;

        let tasks = self.store.list_tasks_by_owner(ctx.user_id).await?;

        Ok(tasks
            .into_iter()
            .flat_map(|task| {
                let title = task.title;
                task.applicants.into_iter().map(move |a| ApplicantView {
                    task_id: a.task_id,
                    task_title: title.clone(),
                    freelancer_id: a.freelancer_id,
                    name: a.name,
                    applied_at: a.applied_at,
                    status: a.status,
                })
            })
            .collect())
    }

    async fn owned_task(
        &self,
        task_id: Uuid,
        ctx: &AuthContext,
        forbidden: &str,
    ) -> MarketResult<Task> {
        let task = self
            .store
            .find_task(task_id)
            .await?
            .ok_or_else(|| MarketError::not_found(TASK_NOT_FOUND))?;

        if task.owner_id != ctx.user_id {
            tracing::warn!(
                task_id = %task_id,
                user_id = %ctx.user_id,
                "Rejected action on a task owned by someone else"
            );
            return Err(MarketError::Forbidden(forbidden.to_string()));
        }

        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::TokenIssuer;
    use crate::auth::password::HashParams;
    use crate::services::accounts::{AuthSession, Registration};
    use crate::store::memory::MemoryStore;

    struct Fixture {
        accounts: AccountService,
        market: MarketplaceService,
    }

    impl Fixture {
        fn new() -> Self {
            let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
            let accounts = AccountService::new(
                Arc::clone(&store),
                TokenIssuer::new("test-secret-that-is-long-enough-for-hs256"),
                HashParams::insecure_fast(),
            );
            let market = MarketplaceService::new(store, accounts.clone());
            Self { accounts, market }
        }

        async fn register(&self, email: &str, wallet: &str, role: &str) -> (AuthSession, AuthContext) {
            let session = self
                .accounts
                .register(Registration {
                    full_name: format!("{} user", role),
                    email: email.to_string(),
                    phone: "555-0100".to_string(),
                    location: None,
                    password: "pw".to_string(),
                    confirm_password: "pw".to_string(),
                    role: role.to_string(),
                    wallet_address: wallet.to_string(),
                })
                .await
                .unwrap();
            let ctx = AuthContext::new(session.user.id, session.user.role);
            (session, ctx)
        }

        async fn post(&self, ctx: &AuthContext, title: &str) -> Task {
            let listing = Listing::parse(ListingInput {
                title: Some(title.to_string()),
                budget: Some("100".to_string()),
                deadline: Some("2026-12-01".to_string()),
                skills: Some("React, Node".to_string()),
                ..Default::default()
            })
            .unwrap();
            self.market.post_task(ctx, listing, None).await.unwrap()
        }
    }

    #[test]
    fn test_listing_parse() {
        let listing = Listing::parse(ListingInput {
            title: Some(" Logo ".to_string()),
            description: None,
            budget: Some("12.5".to_string()),
            deadline: Some("next week".to_string()),
            skills: Some("design,, svg ".to_string()),
        })
        .unwrap();

        assert_eq!(listing.title, "Logo");
        assert_eq!(listing.description, "");
        assert_eq!(listing.budget, 12.5);
        assert_eq!(listing.skills, vec!["design", "svg"]);
    }

    #[test]
    fn test_listing_parse_rejects_missing_or_bad_fields() {
        let missing = Listing::parse(ListingInput {
            title: Some("Logo".to_string()),
            budget: Some("  ".to_string()),
            deadline: Some("soon".to_string()),
            ..Default::default()
        });
        assert!(matches!(missing, Err(MarketError::Validation(_))));

        let negative = Listing::parse(ListingInput {
            title: Some("Logo".to_string()),
            budget: Some("-5".to_string()),
            deadline: Some("soon".to_string()),
            ..Default::default()
        });
        assert!(matches!(negative, Err(MarketError::Validation(_))));
    }

    #[test]
    fn test_listing_parse_enforces_column_widths() {
        let input = |title: String, deadline: String| ListingInput {
            title: Some(title),
            budget: Some("10".to_string()),
            deadline: Some(deadline),
            ..Default::default()
        };

        let long_title = Listing::parse(input("t".repeat(MAX_TITLE_LEN + 1), "soon".into()));
        assert_eq!(
            long_title.unwrap_err().to_string(),
            "Title must be at most 255 characters"
        );

        let long_deadline = Listing::parse(input("Logo".into(), "d".repeat(MAX_DEADLINE_LEN + 1)));
        assert_eq!(
            long_deadline.unwrap_err().to_string(),
            "Deadline must be at most 64 characters"
        );

        // Multi-byte characters count once each
        let at_limit = Listing::parse(input("é".repeat(MAX_TITLE_LEN), "d".repeat(MAX_DEADLINE_LEN)));
        assert!(at_limit.is_ok());
    }

    #[tokio::test]
    async fn test_only_clients_post() {
        let fx = Fixture::new();
        let (_, freelancer) = fx.register("f@x.io", "0xf", "Freelancer").await;
        let listing = Listing::parse(ListingInput {
            title: Some("t".to_string()),
            budget: Some("1".to_string()),
            deadline: Some("d".to_string()),
            ..Default::default()
        })
        .unwrap();

        let err = fx.market.post_task(&freelancer, listing, None).await.unwrap_err();
        assert!(matches!(err, MarketError::Forbidden(_)));
        assert!(fx.market.list_tasks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_apply_flow() {
        let fx = Fixture::new();
        let (_, client) = fx.register("c@x.io", "0xc", "Client").await;
        let (_, freelancer) = fx.register("f@x.io", "0xf", "Freelancer").await;
        let task = fx.post(&client, "Landing page").await;

        let applicant = fx
            .market
            .apply_to_task(task.id, &freelancer, ApplicationInput::default())
            .await
            .unwrap();
        assert_eq!(applicant.freelancer_id, freelancer.user_id);
        assert_eq!(applicant.name, "Freelancer user");
        assert_eq!(applicant.status, ApplicantStatus::Pending);

        let err = fx
            .market
            .apply_to_task(task.id, &freelancer, ApplicationInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Conflict(_)));
        assert_eq!(err.to_string(), "You have already applied to this task");

        let stored = fx.market.get_task(task.id).await.unwrap();
        assert_eq!(stored.applicants.len(), 1);
    }

    #[tokio::test]
    async fn test_apply_errors() {
        let fx = Fixture::new();
        let (_, client) = fx.register("c@x.io", "0xc", "Client").await;
        let (_, freelancer) = fx.register("f@x.io", "0xf", "Freelancer").await;
        let (other, _) = fx.register("g@x.io", "0xg", "Freelancer").await;
        let task = fx.post(&client, "t").await;

        let err = fx
            .market
            .apply_to_task(task.id, &client, ApplicationInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Forbidden(_)));

        let err = fx
            .market
            .apply_to_task(Uuid::new_v4(), &freelancer, ApplicationInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::NotFound(_)));

        let err = fx
            .market
            .apply_to_task(
                task.id,
                &freelancer,
                ApplicationInput {
                    freelancer_id: Some(other.user.id.to_string()),
                    name: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Forbidden(_)));

        // Own wallet as identifier is accepted
        let applicant = fx
            .market
            .apply_to_task(
                task.id,
                &freelancer,
                ApplicationInput {
                    freelancer_id: Some("0xf".to_string()),
                    name: Some("Grace".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(applicant.name, "Grace");
    }

    #[tokio::test]
    async fn test_delete_task() {
        let fx = Fixture::new();
        let (_, owner) = fx.register("c@x.io", "0xc", "Client").await;
        let (_, stranger) = fx.register("d@x.io", "0xd", "Client").await;
        let task = fx.post(&owner, "t").await;

        let err = fx.market.delete_task(Uuid::new_v4(), &owner).await.unwrap_err();
        assert!(matches!(err, MarketError::NotFound(_)));
        assert_eq!(fx.market.list_tasks().await.unwrap().len(), 1);

        let err = fx.market.delete_task(task.id, &stranger).await.unwrap_err();
        assert!(matches!(err, MarketError::Forbidden(_)));

        fx.market.delete_task(task.id, &owner).await.unwrap();
        assert!(fx.market.list_tasks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_review_is_idempotent_and_final() {
        let fx = Fixture::new();
        let (_, owner) = fx.register("c@x.io", "0xc", "Client").await;
        let (_, stranger) = fx.register("d@x.io", "0xd", "Client").await;
        let (_, freelancer) = fx.register("f@x.io", "0xf", "Freelancer").await;
        let task = fx.post(&owner, "t").await;
        fx.market
            .apply_to_task(task.id, &freelancer, ApplicationInput::default())
            .await
            .unwrap();
        let id = freelancer.user_id.to_string();

        let err = fx
            .market
            .accept_applicant(task.id, &id, &stranger)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Forbidden(_)));

        let accepted = fx.market.accept_applicant(task.id, &id, &owner).await.unwrap();
        assert_eq!(accepted.status, ApplicantStatus::Accepted);
        assert!(accepted.reviewed_at.is_some());

        let again = fx.market.accept_applicant(task.id, &id, &owner).await.unwrap();
        assert_eq!(again, accepted);

        let err = fx
            .market
            .reject_applicant(task.id, &id, &owner)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Conflict(_)));
        assert_eq!(err.to_string(), "Applicant has already been accepted");

        let err = fx
            .market
            .update_applicant_status(task.id, &id, "Pending", &owner)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)));
    }

    #[tokio::test]
    async fn test_review_missing_applicant() {
        let fx = Fixture::new();
        let (_, owner) = fx.register("c@x.io", "0xc", "Client").await;
        let (_, freelancer) = fx.register("f@x.io", "0xf", "Freelancer").await;
        let task = fx.post(&owner, "t").await;

        let err = fx
            .market
            .update_applicant_status(task.id, "0xf", "Rejected", &owner)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Applicant not found");

        let err = fx
            .market
            .reject_applicant(task.id, &freelancer.user_id.to_string(), &freelancer)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_client_applicants() {
        let fx = Fixture::new();
        let (_, owner) = fx.register("c@x.io", "0xc", "Client").await;
        let (_, other_owner) = fx.register("d@x.io", "0xd", "Client").await;
        let (_, freelancer) = fx.register("f@x.io", "0xf", "Freelancer").await;

        let older = fx.post(&owner, "older").await;
        let newer = fx.post(&owner, "newer").await;
        let foreign = fx.post(&other_owner, "foreign").await;

        for task in [&older, &newer, &foreign] {
            fx.market
                .apply_to_task(task.id, &freelancer, ApplicationInput::default())
                .await
                .unwrap();
        }

        let views = fx.market.client_applicants(&owner).await.unwrap();
        let titles: Vec<_> = views.iter().map(|v| v.task_title.as_str()).collect();
        assert_eq!(titles, vec!["newer", "older"]);
        assert!(views.iter().all(|v| v.status == ApplicantStatus::Pending));

        let err = fx.market.client_applicants(&freelancer).await.unwrap_err();
        assert!(matches!(err, MarketError::Forbidden(_)));
    }
}
