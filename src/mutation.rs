//! Task mutations and how they keep the shared cache in step with the server.
//!
//! Completion toggles are optimistic: the cache shows the new state before
//! the server answers, is rolled back if the request fails, and is always
//! reconciled with a fresh fetch once the request settles. Create, update and
//! delete leave the cache alone until they succeed and then invalidate it.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::api::TaskApi;
use crate::cache::{QueryKey, TaskCache};
use crate::error::ApiError;
use crate::task::{Task, TaskDraft, TaskId};

/// Runs task mutations against the remote store and keeps the cache coherent.
#[derive(Clone)]
pub struct MutationCoordinator {
    api: Arc<dyn TaskApi>,
    cache: TaskCache,
}

impl MutationCoordinator {
    pub fn new(api: Arc<dyn TaskApi>, cache: TaskCache) -> Self {
        Self { api, cache }
    }

    pub fn cache(&self) -> &TaskCache {
        &self.cache
    }

    /// Set a task's completion flag with an optimistic cache update.
    ///
    /// On failure the cache is restored to exactly what it held before the
    /// call. Either way the task list is refetched before this returns.
    #[instrument(skip(self), fields(key = %QueryKey::Tasks))]
    pub async fn toggle_completion(&self, id: TaskId, is_completed: bool) -> Result<(), ApiError> {
        let key = QueryKey::Tasks;

        self.cache.cancel_pending(key);
        let snapshot = self.cache.get(key);
        let applied = self
            .cache
            .update(key, |tasks| with_completion(tasks, id, is_completed));
        debug!(applied, "optimistic completion written");

        let outcome = self.api.set_completion(id, is_completed).await.map(drop);

        if let Err(err) = &outcome {
            warn!(error = %err, "completion update failed, rolling back");
            if let Some(previous) = snapshot {
                self.cache.restore(key, previous);
            }
        } else {
            info!("completion updated");
        }

        self.reconcile(key).await;
        outcome
    }

    /// Create a task. The cache is invalidated once the server accepts it.
    #[instrument(skip(self, draft), fields(title = %draft.title))]
    pub async fn create_task(&self, draft: &TaskDraft) -> Result<Task, ApiError> {
        let created = self.api.create_task(draft).await?;
        info!(id = created.id, "task created");
        self.invalidate_in_background(QueryKey::Tasks);
        Ok(created)
    }

    /// Replace a task's editable fields.
    #[instrument(skip(self, draft))]
    pub async fn update_task(&self, id: TaskId, draft: &TaskDraft) -> Result<Task, ApiError> {
        let updated = self.api.update_task(id, draft).await?;
        info!("task updated");
        self.invalidate_in_background(QueryKey::Tasks);
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_task(&self, id: TaskId) -> Result<(), ApiError> {
        self.api.delete_task(id).await?;
        info!("task deleted");
        self.invalidate_in_background(QueryKey::Tasks);
        Ok(())
    }

    /// Replace the cached value with the server's, waiting for the fetch.
    async fn reconcile(&self, key: QueryKey) {
        if let Err(err) = self.cache.invalidate(key).settled().await {
            warn!(%key, error = %err, "reconciliation fetch failed");
        }
    }

    fn invalidate_in_background(&self, key: QueryKey) {
        // Observers pick the result up through their subscription.
        let _refetch = self.cache.invalidate(key);
    }
}

/// The list with task `id` flipped to `is_completed`, or `None` if absent.
fn with_completion(tasks: &[Task], id: TaskId, is_completed: bool) -> Option<Vec<Task>> {
    if !tasks.iter().any(|t| t.id == id) {
        return None;
    }
    Some(
        tasks
            .iter()
            .map(|t| if t.id == id { t.with_completion(is_completed) } else { t.clone() })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Priority;
    use crate::test_support::{server_stamp, task, FakeStore};
    use pretty_assertions::assert_eq;

    async fn loaded(store: &Arc<FakeStore>) -> MutationCoordinator {
        let api = Arc::clone(store) as Arc<dyn TaskApi>;
        let cache = TaskCache::new(Arc::clone(&api));
        cache.load(QueryKey::Tasks).await.unwrap();
        MutationCoordinator::new(api, cache)
    }

    fn two_tasks() -> Vec<Task> {
        vec![task(1, "A", false), task(2, "B", false)]
    }

    #[tokio::test]
    async fn toggle_success_reconciles_with_server_state() {
        let store = FakeStore::with_tasks(two_tasks());
        let coordinator = loaded(&store).await;

        coordinator.toggle_completion(1, true).await.unwrap();

        let mut expected_first = task(1, "A", true);
        expected_first.updated_at = Some(server_stamp());
        let cached = coordinator.cache().get(QueryKey::Tasks).unwrap();
        assert_eq!(*cached, vec![expected_first, task(2, "B", false)]);
        assert_eq!(store.list_calls(), 2);
    }

    #[tokio::test]
    async fn toggle_is_visible_before_the_request_resolves() {
        let store = FakeStore::with_tasks(two_tasks());
        let coordinator = loaded(&store).await;
        store.hold_completion();

        let running = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.toggle_completion(1, true).await }
        });
        store.completion_reached().await;

        let cached = coordinator.cache().get(QueryKey::Tasks).unwrap();
        assert!(cached[0].is_completed);
        assert_eq!(cached[1], task(2, "B", false));

        store.release_completion();
        running.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn failed_toggle_rolls_back_to_exact_snapshot() {
        let store = FakeStore::with_tasks(two_tasks());
        let coordinator = loaded(&store).await;
        let before = coordinator.cache().get(QueryKey::Tasks).unwrap();

        store.fail_mutations(true);
        store.hold_completion();
        store.hold_lists();
        let running = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.toggle_completion(1, true).await }
        });
        store.completion_reached().await;
        assert!(coordinator.cache().get(QueryKey::Tasks).unwrap()[0].is_completed);

        store.release_completion();
        // Wait for the rollback; the reconciliation fetch is still held.
        let mut rx = coordinator.cache().subscribe(QueryKey::Tasks);
        rx.wait_for(|state| state.fetching).await.unwrap();
        let rolled_back = coordinator.cache().get(QueryKey::Tasks).unwrap();
        assert!(Arc::ptr_eq(&before, &rolled_back));
        assert!(!rolled_back[0].is_completed);

        store.release_list();
        let err = running.await.unwrap().unwrap_err();
        assert!(matches!(err, ApiError::Network { .. }));
        assert_eq!(*coordinator.cache().get(QueryKey::Tasks).unwrap(), two_tasks());
    }

    #[tokio::test]
    async fn toggle_of_unknown_task_still_calls_server_and_reports_not_found() {
        let store = FakeStore::with_tasks(two_tasks());
        let coordinator = loaded(&store).await;

        let err = coordinator.toggle_completion(99, true).await.unwrap_err();
        assert_eq!(err, ApiError::NotFound { id: 99 });
        assert_eq!(store.completion_calls(), 1);
        assert_eq!(*coordinator.cache().get(QueryKey::Tasks).unwrap(), two_tasks());
    }

    #[tokio::test]
    async fn toggle_without_loaded_cache_fills_it_on_settle() {
        let store = FakeStore::with_tasks(two_tasks());
        let api = Arc::clone(&store) as Arc<dyn TaskApi>;
        let cache = TaskCache::new(Arc::clone(&api));
        let coordinator = MutationCoordinator::new(api, cache);

        coordinator.toggle_completion(2, true).await.unwrap();
        let cached = coordinator.cache().get(QueryKey::Tasks).unwrap();
        assert!(cached[1].is_completed);
        assert!(!cached[0].is_completed);
    }

    #[tokio::test]
    async fn toggle_cancels_background_refetch() {
        let store = FakeStore::with_tasks(two_tasks());
        let coordinator = loaded(&store).await;

        store.hold_lists();
        let _stale = coordinator.cache().invalidate(QueryKey::Tasks);
        tokio::task::yield_now().await;
        store.hold_completion();
        let running = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.toggle_completion(1, true).await }
        });
        store.completion_reached().await;

        // The old fetch was cancelled, so releasing a list response cannot
        // undo the optimistic write.
        store.release_list();
        tokio::task::yield_now().await;
        assert!(coordinator.cache().get(QueryKey::Tasks).unwrap()[0].is_completed);

        store.release_completion();
        store.release_list();
        running.await.unwrap().unwrap();
        assert!(coordinator.cache().get(QueryKey::Tasks).unwrap()[0].is_completed);
    }

    #[tokio::test]
    async fn cache_matches_server_after_settle_either_way() {
        let store = FakeStore::with_tasks(two_tasks());
        let coordinator = loaded(&store).await;

        coordinator.toggle_completion(2, true).await.unwrap();
        assert_eq!(*coordinator.cache().get(QueryKey::Tasks).unwrap(), store.server_tasks());

        store.fail_mutations(true);
        coordinator.toggle_completion(1, true).await.unwrap_err();
        assert_eq!(*coordinator.cache().get(QueryKey::Tasks).unwrap(), store.server_tasks());
    }

    #[tokio::test]
    async fn create_invalidates_without_touching_cache_first() {
        let store = FakeStore::with_tasks(two_tasks());
        let coordinator = loaded(&store).await;

        let draft = TaskDraft::new("C").with_priority(Priority::High);
        let created = coordinator.create_task(&draft).await.unwrap();
        assert_eq!(created.id, 3);

        let state = coordinator.cache().state(QueryKey::Tasks);
        assert!(state.stale);
        assert_eq!(state.tasks().len(), 2);

        let fresh = coordinator.cache().load(QueryKey::Tasks).await.unwrap();
        assert_eq!(fresh.len(), 3);
        assert_eq!(fresh[2].priority, Priority::High);
    }

    #[tokio::test]
    async fn failed_create_leaves_cache_untouched() {
        let store = FakeStore::with_tasks(two_tasks());
        let coordinator = loaded(&store).await;
        let before = coordinator.cache().get(QueryKey::Tasks).unwrap();

        store.fail_mutations(true);
        let err = coordinator.create_task(&TaskDraft::new("C")).await.unwrap_err();
        assert!(matches!(err, ApiError::Network { .. }));
        assert!(Arc::ptr_eq(&before, &coordinator.cache().get(QueryKey::Tasks).unwrap()));
        assert!(!coordinator.cache().state(QueryKey::Tasks).stale);
    }

    #[tokio::test]
    async fn update_and_delete_refresh_on_next_read() {
        let store = FakeStore::with_tasks(two_tasks());
        let coordinator = loaded(&store).await;

        let draft = TaskDraft::new("A2").with_description(Some("details".into()));
        coordinator.update_task(1, &draft).await.unwrap();
        let fresh = coordinator.cache().load(QueryKey::Tasks).await.unwrap();
        assert_eq!(fresh[0].title, "A2");
        assert_eq!(fresh[0].description.as_deref(), Some("details"));

        coordinator.delete_task(2).await.unwrap();
        let fresh = coordinator.cache().load(QueryKey::Tasks).await.unwrap();
        assert_eq!(fresh.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1]);
    }

    #[tokio::test]
    async fn delete_of_missing_task_propagates_not_found() {
        let store = FakeStore::with_tasks(two_tasks());
        let coordinator = loaded(&store).await;
        let err = coordinator.delete_task(42).await.unwrap_err();
        assert_eq!(err, ApiError::NotFound { id: 42 });
        assert!(!coordinator.cache().state(QueryKey::Tasks).stale);
    }

    #[test]
    fn with_completion_touches_only_the_target() {
        let tasks = two_tasks();
        let next = with_completion(&tasks, 2, true).unwrap();
        assert_eq!(next[0], tasks[0]);
        assert!(next[1].is_completed);
        assert_eq!(next[1].title, "B");
        assert!(with_completion(&tasks, 7, true).is_none());
    }
}
