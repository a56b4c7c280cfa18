//! Shared cache of task lists, addressed by query key.
//!
//! A [`TaskCache`] is a cheap-to-clone handle; every view and the mutation
//! coordinator hold one and see the same state. Each key owns a `watch`
//! channel carrying its [`QueryState`], so observers get every transition
//! and readers never see a half-applied write.
//!
//! Fetches are tagged with a per-key generation. Invalidating or cancelling
//! bumps the generation, and a fetch only writes its result if its
//! generation is still current, so a superseded read can never overwrite a
//! newer value even when the abort arrives after the response.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::api::TaskApi;
use crate::error::ApiError;
use crate::task::Task;

/// Logical identifier of a cached collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// Every task of the signed-in user.
    Tasks,
}

impl QueryKey {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryKey::Tasks => "tasks",
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable task list shared between the cache and its readers.
pub type TaskList = Arc<Vec<Task>>;

/// Observable state of one query key.
#[derive(Debug, Clone, Default)]
pub struct QueryState {
    /// Last known value; `None` until the first successful load or set.
    pub data: Option<TaskList>,
    /// The value is known to be out of date and a refetch is due.
    pub stale: bool,
    /// A fetch is in flight.
    pub fetching: bool,
    /// Error of the most recent failed fetch, cleared when the next one starts.
    pub error: Option<ApiError>,
    /// When `data` was last replaced by a server response.
    pub fetched_at: Option<DateTime<Utc>>,
}

impl QueryState {
    /// Nothing to show yet and a fetch is running.
    pub fn is_loading(&self) -> bool {
        self.data.is_none() && self.fetching
    }

    pub fn tasks(&self) -> &[Task] {
        self.data.as_deref().map(Vec::as_slice).unwrap_or(&[])
    }
}

struct Entry {
    state: watch::Sender<QueryState>,
    generation: u64,
    pending: Option<AbortHandle>,
}

impl Entry {
    fn new() -> Self {
        let (state, _) = watch::channel(QueryState::default());
        Self {
            state,
            generation: 0,
            pending: None,
        }
    }
}

struct Inner {
    api: Arc<dyn TaskApi>,
    entries: Mutex<HashMap<QueryKey, Entry>>,
}

/// Handle to the shared task cache.
#[derive(Clone)]
pub struct TaskCache {
    inner: Arc<Inner>,
}

impl TaskCache {
    /// Create an empty cache that loads data through `api`.
    pub fn new(api: Arc<dyn TaskApi>) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    fn with_entry<R>(&self, key: QueryKey, f: impl FnOnce(&mut Entry) -> R) -> R {
        let mut entries = self.inner.entries.lock();
        f(entries.entry(key).or_insert_with(Entry::new))
    }

    /// Current value for `key`, or `None` when it was never loaded.
    pub fn get(&self, key: QueryKey) -> Option<TaskList> {
        self.with_entry(key, |entry| entry.state.borrow().data.clone())
    }

    /// Full observable state for `key`.
    pub fn state(&self, key: QueryKey) -> QueryState {
        self.with_entry(key, |entry| entry.state.borrow().clone())
    }

    /// Watch every state transition of `key`.
    pub fn subscribe(&self, key: QueryKey) -> watch::Receiver<QueryState> {
        self.with_entry(key, |entry| entry.state.subscribe())
    }

    /// Replace the value for `key`. Last writer wins.
    ///
    /// Entries repeating an earlier id are dropped.
    pub fn set(&self, key: QueryKey, tasks: Vec<Task>) {
        self.set_shared(key, Arc::new(dedupe_by_id(tasks)));
    }

    /// Put back a value previously read with [`get`](Self::get).
    ///
    /// The exact same list is restored, not a copy of it.
    pub fn restore(&self, key: QueryKey, snapshot: TaskList) {
        self.set_shared(key, snapshot);
    }

    fn set_shared(&self, key: QueryKey, list: TaskList) {
        self.with_entry(key, |entry| {
            entry.state.send_modify(|state| state.data = Some(list));
        });
        debug!(%key, "cache value replaced");
    }

    /// Atomically derive a new value from the current one.
    ///
    /// `f` returns `None` to leave the value untouched. Nothing happens when
    /// the key was never loaded. Returns whether a new value was written.
    pub fn update(&self, key: QueryKey, f: impl FnOnce(&[Task]) -> Option<Vec<Task>>) -> bool {
        self.with_entry(key, |entry| {
            let next = {
                let state = entry.state.borrow();
                match state.data.as_deref() {
                    Some(current) => f(current),
                    None => None,
                }
            };
            match next {
                Some(tasks) => {
                    let list = Arc::new(dedupe_by_id(tasks));
                    entry.state.send_modify(|state| state.data = Some(list));
                    true
                }
                None => false,
            }
        })
    }

    /// Mark `key` stale and refetch it in the background.
    ///
    /// The current value stays visible until the fetch resolves. Any fetch
    /// already in flight for the key is superseded. Must be called from
    /// within a tokio runtime.
    pub fn invalidate(&self, key: QueryKey) -> Refetch {
        let mut entries = self.inner.entries.lock();
        let entry = entries.entry(key).or_insert_with(Entry::new);
        if let Some(previous) = entry.pending.take() {
            previous.abort();
        }
        entry.generation += 1;
        let generation = entry.generation;
        // A waiter on this fetch must only see this fetch's outcome.
        entry.state.send_modify(|state| {
            state.stale = true;
            state.fetching = true;
            state.error = None;
        });
        let rx = entry.state.subscribe();

        let cache = self.clone();
        let handle = tokio::spawn(async move {
            let result = cache.fetch(key).await;
            cache.complete_fetch(key, generation, result);
        });
        // The lock is still held, so the fetch cannot complete before this
        // handle is recorded.
        entry.pending = Some(handle.abort_handle());
        debug!(%key, generation, "refetch scheduled");
        Refetch { rx }
    }

    /// Return fresh data, fetching only when the value is missing or stale.
    ///
    /// A fetch already in flight is joined rather than duplicated.
    pub async fn load(&self, key: QueryKey) -> Result<TaskList, ApiError> {
        let state = self.state(key);
        if let (Some(data), false) = (&state.data, state.stale) {
            return Ok(Arc::clone(data));
        }
        if state.fetching {
            return Refetch { rx: self.subscribe(key) }.settled().await;
        }
        self.invalidate(key).settled().await
    }

    /// Cancel any fetch in flight for `key` so it cannot overwrite later writes.
    ///
    /// Returns whether a fetch was cancelled.
    pub fn cancel_pending(&self, key: QueryKey) -> bool {
        self.with_entry(key, |entry| {
            entry.generation += 1;
            match entry.pending.take() {
                Some(handle) => {
                    handle.abort();
                    entry.state.send_modify(|state| state.fetching = false);
                    debug!(%key, "pending fetch cancelled");
                    true
                }
                None => false,
            }
        })
    }

    async fn fetch(&self, key: QueryKey) -> Result<Vec<Task>, ApiError> {
        match key {
            QueryKey::Tasks => self.inner.api.list_tasks().await,
        }
    }

    fn complete_fetch(&self, key: QueryKey, generation: u64, result: Result<Vec<Task>, ApiError>) {
        let mut entries = self.inner.entries.lock();
        let Some(entry) = entries.get_mut(&key) else {
            return;
        };
        if entry.generation != generation {
            debug!(%key, generation, current = entry.generation, "discarding superseded fetch");
            return;
        }
        entry.pending = None;
        match result {
            Ok(tasks) => {
                let list = Arc::new(dedupe_by_id(tasks));
                entry.state.send_modify(|state| {
                    state.data = Some(list);
                    state.stale = false;
                    state.fetching = false;
                    state.error = None;
                    state.fetched_at = Some(Utc::now());
                });
                debug!(%key, "fetch applied");
            }
            Err(err) => {
                warn!(%key, error = %err, "fetch failed");
                entry.state.send_modify(|state| {
                    state.fetching = false;
                    state.error = Some(err);
                });
            }
        }
    }
}

/// A scheduled refetch. Dropping it leaves the fetch running.
#[must_use = "a refetch runs in the background; await `settled` to observe its outcome"]
pub struct Refetch {
    rx: watch::Receiver<QueryState>,
}

impl Refetch {
    /// Wait until no fetch is in flight for the key and report the outcome.
    ///
    /// If the fetch was superseded, this waits for the newer one instead.
    pub async fn settled(mut self) -> Result<TaskList, ApiError> {
        let state = self
            .rx
            .wait_for(|state| !state.fetching)
            .await
            .map_err(|_| ApiError::Cancelled)?
            .clone();
        match (state.error, state.data) {
            (Some(err), _) => Err(err),
            (None, Some(data)) => Ok(data),
            (None, None) => Err(ApiError::Cancelled),
        }
    }
}

fn dedupe_by_id(mut tasks: Vec<Task>) -> Vec<Task> {
    let mut seen = std::collections::HashSet::with_capacity(tasks.len());
    let before = tasks.len();
    tasks.retain(|task| seen.insert(task.id));
    if tasks.len() != before {
        warn!(dropped = before - tasks.len(), "duplicate task ids dropped");
    }
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{task, FakeStore};
    use pretty_assertions::assert_eq;

    fn cache_with(store: &Arc<FakeStore>) -> TaskCache {
        TaskCache::new(Arc::clone(store) as Arc<dyn TaskApi>)
    }

    #[tokio::test]
    async fn unloaded_key_reads_as_none() {
        let store = FakeStore::with_tasks(vec![]);
        let cache = cache_with(&store);
        assert!(cache.get(QueryKey::Tasks).is_none());
        assert!(!cache.state(QueryKey::Tasks).is_loading());
    }

    #[tokio::test]
    async fn load_fetches_once_then_serves_cached() {
        let store = FakeStore::with_tasks(vec![task(1, "A", false), task(2, "B", true)]);
        let cache = cache_with(&store);

        let first = cache.load(QueryKey::Tasks).await.unwrap();
        assert_eq!(first.len(), 2);
        let second = cache.load(QueryKey::Tasks).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.list_calls(), 1);
    }

    #[tokio::test]
    async fn set_overwrites_and_dedupes() {
        let store = FakeStore::with_tasks(vec![]);
        let cache = cache_with(&store);
        cache.set(
            QueryKey::Tasks,
            vec![task(1, "A", false), task(1, "A again", true), task(2, "B", false)],
        );
        let data = cache.get(QueryKey::Tasks).unwrap();
        assert_eq!(data.iter().map(|t| t.title.as_str()).collect::<Vec<_>>(), vec!["A", "B"]);

        cache.set(QueryKey::Tasks, vec![task(3, "C", false)]);
        assert_eq!(cache.get(QueryKey::Tasks).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalidate_keeps_value_until_refetch_lands() {
        let store = FakeStore::with_tasks(vec![task(1, "server", false)]);
        let cache = cache_with(&store);
        cache.set(QueryKey::Tasks, vec![task(1, "local", false)]);

        store.hold_lists();
        let refetch = cache.invalidate(QueryKey::Tasks);
        let state = cache.state(QueryKey::Tasks);
        assert!(state.stale && state.fetching);
        assert_eq!(state.tasks()[0].title, "local");

        store.release_list();
        let data = refetch.settled().await.unwrap();
        assert_eq!(data[0].title, "server");
        let state = cache.state(QueryKey::Tasks);
        assert!(!state.stale && !state.fetching);
        assert!(state.fetched_at.is_some());
    }

    #[tokio::test]
    async fn reconciliation_is_idempotent_when_server_matches() {
        let tasks = vec![task(1, "A", false), task(2, "B", true)];
        let store = FakeStore::with_tasks(tasks.clone());
        let cache = cache_with(&store);
        cache.load(QueryKey::Tasks).await.unwrap();
        let before = cache.get(QueryKey::Tasks).unwrap();

        cache.invalidate(QueryKey::Tasks).settled().await.unwrap();
        let after = cache.get(QueryKey::Tasks).unwrap();
        assert_eq!(*before, *after);
        assert_eq!(*after, tasks);
    }

    #[tokio::test]
    async fn cancelled_fetch_never_overwrites_later_write() {
        let store = FakeStore::with_tasks(vec![task(1, "server", false)]);
        let cache = cache_with(&store);
        cache.set(QueryKey::Tasks, vec![task(1, "before", false)]);

        store.hold_lists();
        let refetch = cache.invalidate(QueryKey::Tasks);
        tokio::task::yield_now().await;
        assert!(cache.cancel_pending(QueryKey::Tasks));
        cache.set(QueryKey::Tasks, vec![task(1, "optimistic", true)]);
        store.release_list();

        let data = refetch.settled().await.unwrap();
        assert_eq!(data[0].title, "optimistic");
        tokio::task::yield_now().await;
        assert_eq!(cache.get(QueryKey::Tasks).unwrap()[0].title, "optimistic");
        assert!(!cache.state(QueryKey::Tasks).fetching);
    }

    #[tokio::test]
    async fn cancelled_fetch_does_not_report_earlier_failure() {
        let store = FakeStore::with_tasks(vec![task(1, "A", false)]);
        let cache = cache_with(&store);
        cache.load(QueryKey::Tasks).await.unwrap();
        store.fail_lists(true);
        assert!(cache.invalidate(QueryKey::Tasks).settled().await.is_err());

        store.fail_lists(false);
        store.hold_lists();
        let refetch = cache.invalidate(QueryKey::Tasks);
        assert!(cache.state(QueryKey::Tasks).error.is_none());
        tokio::task::yield_now().await;
        assert!(cache.cancel_pending(QueryKey::Tasks));

        let data = refetch.settled().await.unwrap();
        assert_eq!(data[0].title, "A");
        store.release_list();
    }

    #[tokio::test]
    async fn cancel_without_pending_fetch_reports_false() {
        let store = FakeStore::with_tasks(vec![]);
        let cache = cache_with(&store);
        assert!(!cache.cancel_pending(QueryKey::Tasks));
    }

    #[tokio::test]
    async fn failed_fetch_keeps_data_and_records_error() {
        let store = FakeStore::with_tasks(vec![task(1, "A", false)]);
        let cache = cache_with(&store);
        cache.load(QueryKey::Tasks).await.unwrap();

        store.fail_lists(true);
        let err = cache.invalidate(QueryKey::Tasks).settled().await.unwrap_err();
        assert!(matches!(err, ApiError::Network { .. }));
        let state = cache.state(QueryKey::Tasks);
        assert_eq!(state.tasks().len(), 1);
        assert!(state.stale);
        assert!(state.error.is_some());

        store.fail_lists(false);
        cache.load(QueryKey::Tasks).await.unwrap();
        assert!(cache.state(QueryKey::Tasks).error.is_none());
    }

    #[tokio::test]
    async fn subscribers_observe_writes() {
        let store = FakeStore::with_tasks(vec![]);
        let cache = cache_with(&store);
        let mut rx = cache.subscribe(QueryKey::Tasks);
        cache.set(QueryKey::Tasks, vec![task(5, "E", false)]);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().tasks()[0].id, 5);
    }

    #[tokio::test]
    async fn update_is_noop_when_unloaded_or_declined() {
        let store = FakeStore::with_tasks(vec![]);
        let cache = cache_with(&store);
        assert!(!cache.update(QueryKey::Tasks, |tasks| Some(tasks.to_vec())));
        cache.set(QueryKey::Tasks, vec![task(1, "A", false)]);
        assert!(!cache.update(QueryKey::Tasks, |_| None));
        assert!(cache.update(QueryKey::Tasks, |tasks| {
            Some(tasks.iter().map(|t| t.with_completion(true)).collect())
        }));
        assert!(cache.get(QueryKey::Tasks).unwrap()[0].is_completed);
    }

    #[tokio::test]
    async fn superseding_invalidate_wins() {
        let store = FakeStore::with_tasks(vec![task(1, "first", false)]);
        let cache = cache_with(&store);
        store.hold_lists();
        let first = cache.invalidate(QueryKey::Tasks);
        tokio::task::yield_now().await;
        store.set_server_tasks(vec![task(1, "second", false)]);
        let second = cache.invalidate(QueryKey::Tasks);
        store.release_list();
        store.release_list();

        assert_eq!(first.settled().await.unwrap()[0].title, "second");
        assert_eq!(second.settled().await.unwrap()[0].title, "second");
    }
}
