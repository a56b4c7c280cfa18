//! In-memory task store for unit tests, with gates to hold responses.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::{Notify, Semaphore};

use crate::api::TaskApi;
use crate::error::ApiError;
use crate::fields::Priority;
use crate::task::{Task, TaskDraft, TaskId};

pub(crate) fn created(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap() + Duration::hours(n)
}

pub(crate) fn task(id: TaskId, title: &str, is_completed: bool) -> Task {
    Task {
        id,
        user_id: "user-1".to_string(),
        title: title.to_string(),
        description: None,
        priority: Priority::Medium,
        due_date: None,
        is_completed,
        created_at: created(id),
        updated_at: None,
    }
}

/// Server-side stamp applied on every mutation.
pub(crate) fn server_stamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 2, 2, 2, 2, 2).unwrap()
}

pub(crate) struct FakeStore {
    tasks: Mutex<Vec<Task>>,
    list_calls: AtomicUsize,
    completion_calls: AtomicUsize,
    fail_lists: AtomicBool,
    fail_mutations: AtomicBool,
    hold_lists: AtomicBool,
    list_gate: Semaphore,
    hold_completion: AtomicBool,
    completion_entered: Notify,
    completion_gate: Semaphore,
}

impl FakeStore {
    pub(crate) fn with_tasks(tasks: Vec<Task>) -> Arc<Self> {
        Arc::new(Self {
            tasks: Mutex::new(tasks),
            list_calls: AtomicUsize::new(0),
            completion_calls: AtomicUsize::new(0),
            fail_lists: AtomicBool::new(false),
            fail_mutations: AtomicBool::new(false),
            hold_lists: AtomicBool::new(false),
            list_gate: Semaphore::new(0),
            hold_completion: AtomicBool::new(false),
            completion_entered: Notify::new(),
            completion_gate: Semaphore::new(0),
        })
    }

    pub(crate) fn server_tasks(&self) -> Vec<Task> {
        self.tasks.lock().clone()
    }

    pub(crate) fn set_server_tasks(&self, tasks: Vec<Task>) {
        *self.tasks.lock() = tasks;
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn completion_calls(&self) -> usize {
        self.completion_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_lists(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_mutations(&self, fail: bool) {
        self.fail_mutations.store(fail, Ordering::SeqCst);
    }

    /// Make list calls wait for [`release_list`](Self::release_list).
    pub(crate) fn hold_lists(&self) {
        self.hold_lists.store(true, Ordering::SeqCst);
    }

    pub(crate) fn release_list(&self) {
        self.list_gate.add_permits(1);
    }

    /// Make completion patches wait for [`release_completion`](Self::release_completion).
    pub(crate) fn hold_completion(&self) {
        self.hold_completion.store(true, Ordering::SeqCst);
    }

    pub(crate) fn release_completion(&self) {
        self.completion_gate.add_permits(1);
    }

    /// Resolves once a completion patch has reached the store.
    pub(crate) async fn completion_reached(&self) {
        self.completion_entered.notified().await;
    }

    fn check_mutation(&self) -> Result<(), ApiError> {
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(ApiError::Network {
                message: "connection reset".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TaskApi for FakeStore {
    async fn list_tasks(&self) -> Result<Vec<Task>, ApiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.hold_lists.load(Ordering::SeqCst) {
            if let Ok(permit) = self.list_gate.acquire().await {
                permit.forget();
            }
        }
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(ApiError::Network {
                message: "connection refused".into(),
            });
        }
        Ok(self.tasks.lock().clone())
    }

    async fn create_task(&self, draft: &TaskDraft) -> Result<Task, ApiError> {
        self.check_mutation()?;
        let mut tasks = self.tasks.lock();
        let id = tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        let created = Task {
            id,
            user_id: "user-1".into(),
            title: draft.title.clone(),
            description: draft.description.clone(),
            priority: draft.priority,
            due_date: draft.due_date,
            is_completed: false,
            created_at: server_stamp(),
            updated_at: None,
        };
        tasks.push(created.clone());
        Ok(created)
    }

    async fn update_task(&self, id: TaskId, draft: &TaskDraft) -> Result<Task, ApiError> {
        self.check_mutation()?;
        let mut tasks = self.tasks.lock();
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(ApiError::NotFound { id })?;
        task.title = draft.title.clone();
        task.description = draft.description.clone();
        task.priority = draft.priority;
        task.due_date = draft.due_date;
        task.updated_at = Some(server_stamp());
        Ok(task.clone())
    }

    async fn set_completion(&self, id: TaskId, is_completed: bool) -> Result<Task, ApiError> {
        self.completion_calls.fetch_add(1, Ordering::SeqCst);
        self.completion_entered.notify_one();
        if self.hold_completion.load(Ordering::SeqCst) {
            if let Ok(permit) = self.completion_gate.acquire().await {
                permit.forget();
            }
        }
        self.check_mutation()?;
        let mut tasks = self.tasks.lock();
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(ApiError::NotFound { id })?;
        task.is_completed = is_completed;
        task.updated_at = Some(server_stamp());
        Ok(task.clone())
    }

    async fn delete_task(&self, id: TaskId) -> Result<(), ApiError> {
        self.check_mutation()?;
        let mut tasks = self.tasks.lock();
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() == before {
            return Err(ApiError::NotFound { id });
        }
        Ok(())
    }
}
