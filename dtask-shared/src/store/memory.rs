/// In-memory store
///
/// Keeps users and tasks behind one mutex, so every check-then-write (user
/// uniqueness, duplicate applications, status transitions) happens under a
/// single lock acquisition. Data is lost when the process exits.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{
    ApplyOutcome, ReviewOutcome, Store, StoreError, StoreResult, TaskStore, UniqueKey, UserStore,
};
use crate::models::applicant::{Applicant, ApplicantStatus, NewApplicant};
use crate::models::task::{NewTask, Task};
use crate::models::user::{NewUser, Role, User};

#[derive(Debug, Default)]
struct State {
    users: HashMap<Uuid, User>,
    tasks: HashMap<Uuid, Task>,
    last_posted_at: Option<DateTime<Utc>>,
}

impl State {
    /// Strictly increasing post timestamps keep newest-first ordering total
    fn next_posted_at(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let posted_at = match self.last_posted_at {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_posted_at = Some(posted_at);
        posted_at
    }

    fn sorted_newest_first(mut tasks: Vec<Task>) -> Vec<Task> {
        tasks.sort_by(|a, b| b.posted_at.cmp(&a.posted_at).then(a.id.cmp(&b.id)));
        tasks
    }
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, data: NewUser) -> StoreResult<User> {
        let mut state = self.lock()?;

        if state.users.values().any(|u| u.email == data.email) {
            return Err(StoreError::Duplicate(UniqueKey::UserEmail));
        }
        if state
            .users
            .values()
            .any(|u| u.wallet_address == data.wallet_address && u.role == data.role)
        {
            return Err(StoreError::Duplicate(UniqueKey::UserWalletRole));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            full_name: data.full_name,
            email: data.email,
            phone: data.phone,
            location: data.location,
            password_hash: data.password_hash,
            role: data.role,
            wallet_address: data.wallet_address,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn find_user_by_id_and_role(&self, id: Uuid, role: Role) -> StoreResult<Option<User>> {
        Ok(self.lock()?.users.get(&id).filter(|u| u.role == role).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.lock()?.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_wallet_and_role(
        &self,
        wallet_address: &str,
        role: Role,
    ) -> StoreResult<Option<User>> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.wallet_address == wallet_address && u.role == role)
            .cloned())
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn insert_task(&self, data: NewTask) -> StoreResult<Task> {
        let mut state = self.lock()?;

        let task = Task {
            id: Uuid::new_v4(),
            owner_id: data.owner_id,
            title: data.title,
            description: data.description,
            budget: data.budget,
            deadline: data.deadline,
            skills: data.skills,
            attachment: data.attachment,
            posted_at: state.next_posted_at(),
            applicants: Vec::new(),
        };
        state.tasks.insert(task.id, task.clone());

        Ok(task)
    }

    async fn find_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        Ok(self.lock()?.tasks.get(&id).cloned())
    }

    async fn list_tasks(&self) -> StoreResult<Vec<Task>> {
        let tasks = self.lock()?.tasks.values().cloned().collect();
        Ok(State::sorted_newest_first(tasks))
    }

    async fn list_tasks_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Task>> {
        let tasks = self
            .lock()?
            .tasks
            .values()
            .filter(|t| t.owner_id == owner_id)
            .cloned()
            .collect();
        Ok(State::sorted_newest_first(tasks))
    }

    async fn delete_task(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.lock()?.tasks.remove(&id).is_some())
    }

    async fn add_applicant(&self, task_id: Uuid, data: NewApplicant) -> StoreResult<ApplyOutcome> {
        let mut state = self.lock()?;

        let Some(task) = state.tasks.get_mut(&task_id) else {
            return Ok(ApplyOutcome::TaskNotFound);
        };
        if task.applicants.iter().any(|a| a.freelancer_id == data.freelancer_id) {
            return Ok(ApplyOutcome::AlreadyApplied);
        }

        let applicant = Applicant {
            task_id,
            freelancer_id: data.freelancer_id,
            name: data.name,
            applied_at: Utc::now(),
            status: ApplicantStatus::Pending,
            reviewed_at: None,
        };
        task.applicants.push(applicant.clone());

        Ok(ApplyOutcome::Applied(applicant))
    }

    async fn review_applicant(
        &self,
        task_id: Uuid,
        freelancer_id: Uuid,
        target: ApplicantStatus,
    ) -> StoreResult<ReviewOutcome> {
        let mut state = self.lock()?;

        let applicant = state
            .tasks
            .get_mut(&task_id)
            .and_then(|t| t.applicants.iter_mut().find(|a| a.freelancer_id == freelancer_id));

        let outcome = match applicant {
            None => ReviewOutcome::ApplicantNotFound,
            Some(a) if a.status.can_transition_to(target) => {
                a.status = target;
                a.reviewed_at = Some(Utc::now());
                ReviewOutcome::Updated(a.clone())
            }
            Some(a) if a.status == target => ReviewOutcome::Unchanged(a.clone()),
            Some(a) => ReviewOutcome::Conflicting(a.clone()),
        };

        Ok(outcome)
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> StoreResult<()> {
        self.lock().map(|_| ())
    }
}
