//! Loading/data/error bookkeeping for one repeatable async operation.
//!
//! Every [`RequestCoordinator::send`] gets a sequence number. Only the attempt
//! holding the highest number started so far may write the shared state, so a
//! slow response that lands after a newer one is dropped instead of
//! overwriting it. Attempts for a key that is already in flight join that
//! request instead of issuing a second transport call.

use std::{
    collections::HashMap,
    fmt::Debug,
    future::Future,
    hash::Hash,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{watch, Mutex};
use tracing::debug;

use crate::error::{Result, ShelfError};

type SharedFetch<T> = Shared<BoxFuture<'static, Result<T>>>;

/// Snapshot of what a view bound to a coordinator should show.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestState<K, T> {
    /// Key of the most recent send.
    pub key: Option<K>,
    pub loading: bool,
    pub data: Option<T>,
    pub error: Option<ShelfError>,
}

impl<K, T> Default for RequestState<K, T> {
    fn default() -> Self {
        Self {
            key: None,
            loading: false,
            data: None,
            error: None,
        }
    }
}

/// How one `send` ended. The caller always gets its own result back.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt<T> {
    /// The result was written to the coordinator state.
    Applied(Result<T>),
    /// A newer attempt started before this one settled; state was left alone.
    Superseded(Result<T>),
}

impl<T> Attempt<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Attempt::Applied(_))
    }

    pub fn into_result(self) -> Result<T> {
        match self {
            Attempt::Applied(result) | Attempt::Superseded(result) => result,
        }
    }

    /// The result, only if it became the visible state.
    pub fn applied(self) -> Option<Result<T>> {
        match self {
            Attempt::Applied(result) => Some(result),
            Attempt::Superseded(_) => None,
        }
    }
}

struct Inner<K, T> {
    name: &'static str,
    latest: AtomicU64,
    state: watch::Sender<RequestState<K, T>>,
    in_flight: Mutex<HashMap<K, SharedFetch<T>>>,
}

/// Clears `loading` when the newest attempt is dropped before it settles.
struct Unsettled<'a, K, T> {
    inner: &'a Inner<K, T>,
    seq: u64,
    settled: bool,
}

impl<K, T> Drop for Unsettled<'_, K, T> {
    fn drop(&mut self) {
        if self.settled || self.inner.latest.load(Ordering::SeqCst) != self.seq {
            return;
        }
        debug!("{}: #{} dropped before settling", self.inner.name, self.seq);
        self.inner.state.send_if_modified(|state| {
            let was_loading = state.loading;
            state.loading = false;
            was_loading
        });
    }
}

pub struct RequestCoordinator<K, T> {
    inner: Arc<Inner<K, T>>,
}

impl<K, T> Clone for RequestCoordinator<K, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, T> Debug for RequestCoordinator<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCoordinator")
            .field("name", &self.inner.name)
            .field("latest", &self.inner.latest.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl<K, T> RequestCoordinator<K, T>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// `name` only shows up in logs.
    pub fn new(name: &'static str) -> Self {
        let (state, _) = watch::channel(RequestState::default());
        Self {
            inner: Arc::new(Inner {
                name,
                latest: AtomicU64::new(0),
                state,
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn state(&self) -> RequestState<K, T> {
        self.inner.state.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    /// Change feed for hosts that re-render on every state transition.
    pub fn subscribe(&self) -> watch::Receiver<RequestState<K, T>> {
        self.inner.state.subscribe()
    }

    /// Starts a new attempt for `key`.
    ///
    /// `fetch` is only invoked when no request for `key` is currently in
    /// flight; otherwise this attempt waits on the existing one.
    pub async fn send<F, Fut>(&self, key: K, fetch: F) -> Attempt<T>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.dispatch(key, fetch, true).await
    }

    /// Starts a new attempt for `key` that always reaches the transport.
    ///
    /// For reads that must observe a write made after any pending request
    /// for `key` was issued. The new request replaces the pending one for
    /// later joiners; attempts already waiting on the old one keep waiting.
    pub async fn send_fresh<F, Fut>(&self, key: K, fetch: F) -> Attempt<T>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.dispatch(key, fetch, false).await
    }

    async fn dispatch<F, Fut>(&self, key: K, fetch: F, join: bool) -> Attempt<T>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let seq = self.inner.latest.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.state.send_modify(|state| {
            state.loading = true;
            state.key = Some(key.clone());
        });
        let mut guard = Unsettled {
            inner: &self.inner,
            seq,
            settled: false,
        };

        let shared = {
            let mut in_flight = self.inner.in_flight.lock().await;
            match in_flight.get(&key) {
                Some(pending) if join && pending.peek().is_none() => {
                    debug!("{}: #{seq} joins in-flight request for {:?}", self.inner.name, key);
                    pending.clone()
                }
                _ => {
                    debug!("{}: #{seq} fetching {:?}", self.inner.name, key);
                    let fresh = fetch().boxed().shared();
                    in_flight.insert(key.clone(), fresh.clone());
                    fresh
                }
            }
        };

        let result = shared.clone().await;

        {
            let mut in_flight = self.inner.in_flight.lock().await;
            if in_flight
                .get(&key)
                .is_some_and(|pending| pending.ptr_eq(&shared))
            {
                in_flight.remove(&key);
            }
        }

        guard.settled = true;
        let applied = self.inner.state.send_if_modified(|state| {
            if self.inner.latest.load(Ordering::SeqCst) != seq {
                return false;
            }
            state.loading = false;
            match &result {
                Ok(data) => {
                    state.data = Some(data.clone());
                    state.error = None;
                }
                // Prior data stays; callers decide whether to blank the view.
                Err(e) => state.error = Some(e.clone()),
            }
            true
        });

        if applied {
            Attempt::Applied(result)
        } else {
            debug!(
                "{}: dropping superseded response #{seq} for {:?}",
                self.inner.name, key
            );
            Attempt::Superseded(result)
        }
    }

    /// Makes every attempt still in flight stale without starting a new one.
    ///
    /// Requests are not aborted; their results are ignored when they land.
    pub fn supersede(&self) {
        self.inner.latest.fetch_add(1, Ordering::SeqCst);
        self.inner.state.send_if_modified(|state| {
            let was_loading = state.loading;
            state.loading = false;
            was_loading
        });
    }

    /// Blanks data and error, keeping any in-flight attempt relevant.
    pub fn clear(&self) {
        self.inner.state.send_modify(|state| {
            state.data = None;
            state.error = None;
        });
    }

    /// [`supersede`](Self::supersede) plus a return to the initial state.
    pub fn reset(&self) {
        self.inner.latest.fetch_add(1, Ordering::SeqCst);
        self.inner.state.send_replace(RequestState::default());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use futures::poll;
    use tokio::sync::oneshot;

    use super::*;

    type Gate = oneshot::Sender<Result<String>>;

    fn gate() -> (Gate, oneshot::Receiver<Result<String>>) {
        oneshot::channel()
    }

    async fn wait(rx: oneshot::Receiver<Result<String>>) -> Result<String> {
        rx.await
            .unwrap_or_else(|_| Err(ShelfError::Transport("gate dropped".into())))
    }

    #[tokio::test]
    async fn sequential_sends_overwrite_in_order() {
        let coordinator = RequestCoordinator::<u32, String>::new("test");

        for (key, value) in [(1, "first"), (2, "second"), (3, "third")] {
            let attempt = coordinator
                .send(key, move || async move { Ok(value.to_string()) })
                .await;
            assert!(attempt.is_applied());
            assert_eq!(coordinator.state().data.as_deref(), Some(value));
        }
        assert!(!coordinator.is_loading());
    }

    #[tokio::test]
    async fn late_response_from_older_attempt_is_discarded() {
        let coordinator = RequestCoordinator::<u32, String>::new("test");
        let (old_tx, old_rx) = gate();
        let (new_tx, new_rx) = gate();

        let mut old = Box::pin(coordinator.send(5, move || wait(old_rx)));
        assert!(poll!(&mut old).is_pending());
        let mut new = Box::pin(coordinator.send(7, move || wait(new_rx)));
        assert!(poll!(&mut new).is_pending());
        assert!(coordinator.is_loading());

        new_tx.send(Ok("item 7".into())).unwrap();
        assert!(new.await.is_applied());
        assert!(!coordinator.is_loading());

        old_tx.send(Ok("item 5".into())).unwrap();
        assert_eq!(
            old.await,
            Attempt::Superseded(Ok("item 5".to_string()))
        );

        let state = coordinator.state();
        assert_eq!(state.data.as_deref(), Some("item 7"));
        assert_eq!(state.key, Some(7));
        assert!(!state.loading, "stale response must not resurrect loading");
    }

    #[tokio::test]
    async fn loading_holds_until_newest_attempt_settles() {
        let coordinator = RequestCoordinator::<u32, String>::new("test");
        let (old_tx, old_rx) = gate();
        let (new_tx, new_rx) = gate();

        let mut old = Box::pin(coordinator.send(1, move || wait(old_rx)));
        assert!(poll!(&mut old).is_pending());
        let mut new = Box::pin(coordinator.send(2, move || wait(new_rx)));
        assert!(poll!(&mut new).is_pending());

        old_tx.send(Ok("old".into())).unwrap();
        assert!(!old.await.is_applied());
        assert!(coordinator.is_loading());
        assert_eq!(coordinator.state().data, None);

        new_tx.send(Ok("new".into())).unwrap();
        assert!(new.await.is_applied());
        assert!(!coordinator.is_loading());
    }

    #[tokio::test]
    async fn same_key_in_flight_shares_one_fetch() {
        let coordinator = RequestCoordinator::<u32, String>::new("test");
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = gate();

        let first_calls = calls.clone();
        let mut first = Box::pin(coordinator.send(9, move || {
            first_calls.fetch_add(1, Ordering::SeqCst);
            wait(rx)
        }));
        assert!(poll!(&mut first).is_pending());

        let second_calls = calls.clone();
        let mut second = Box::pin(coordinator.send(9, move || {
            second_calls.fetch_add(1, Ordering::SeqCst);
            async { Ok("duplicate".to_string()) }
        }));
        assert!(poll!(&mut second).is_pending());

        tx.send(Ok("shared".into())).unwrap();
        let (first, second) = tokio::join!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.into_result(), Ok("shared".to_string()));
        assert_eq!(second, Attempt::Applied(Ok("shared".to_string())));

        // Once settled, the same key fetches again.
        let third_calls = calls.clone();
        let third = coordinator
            .send(9, move || {
                third_calls.fetch_add(1, Ordering::SeqCst);
                async { Ok("fresh".to_string()) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(third, Attempt::Applied(Ok("fresh".to_string())));
    }

    #[tokio::test]
    async fn failure_keeps_previous_data() {
        let coordinator = RequestCoordinator::<u32, String>::new("test");
        coordinator
            .send(1, || async { Ok("loaded".to_string()) })
            .await;

        let failure = ShelfError::Api {
            code: 500,
            message: "boom".into(),
        };
        let expected = failure.clone();
        let attempt = coordinator.send(1, move || async move { Err(failure) }).await;
        assert_eq!(attempt, Attempt::Applied(Err(expected.clone())));

        let state = coordinator.state();
        assert_eq!(state.data.as_deref(), Some("loaded"));
        assert_eq!(state.error, Some(expected));

        coordinator.send(1, || async { Ok("again".to_string()) }).await;
        assert_eq!(coordinator.state().error, None);
    }

    #[tokio::test]
    async fn supersede_ignores_in_flight_result() {
        let coordinator = RequestCoordinator::<u32, String>::new("test");
        let (tx, rx) = gate();

        let mut pending = Box::pin(coordinator.send(3, move || wait(rx)));
        assert!(poll!(&mut pending).is_pending());

        coordinator.supersede();
        assert!(!coordinator.is_loading());

        tx.send(Ok("late".into())).unwrap();
        assert!(!pending.await.is_applied());
        assert_eq!(coordinator.state().data, None);
        assert!(!coordinator.is_loading());
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let coordinator = RequestCoordinator::<u32, String>::new("test");
        let mut changes = coordinator.subscribe();

        coordinator.send(1, || async { Ok("done".to_string()) }).await;
        assert!(changes.has_changed().unwrap());
        let seen = changes.borrow_and_update().clone();
        assert_eq!(seen.data.as_deref(), Some("done"));
        assert!(!seen.loading);

        coordinator.reset();
        assert_eq!(coordinator.state(), RequestState::default());
    }

    #[tokio::test]
    async fn fresh_send_skips_pending_request_for_same_key() {
        let coordinator = RequestCoordinator::<u32, String>::new("test");
        let calls = Arc::new(AtomicUsize::new(0));
        let (before_tx, before_rx) = gate();

        let mut before = Box::pin(coordinator.send(3, move || wait(before_rx)));
        assert!(poll!(&mut before).is_pending());

        let after_calls = calls.clone();
        let after = coordinator
            .send_fresh(3, move || {
                after_calls.fetch_add(1, Ordering::SeqCst);
                async { Ok("after write".to_string()) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(after, Attempt::Applied(Ok("after write".to_string())));

        before_tx.send(Ok("before write".into())).unwrap();
        assert!(!before.await.is_applied());
        assert_eq!(coordinator.state().data.as_deref(), Some("after write"));
    }

    #[tokio::test]
    async fn dropping_newest_attempt_clears_loading() {
        let coordinator = RequestCoordinator::<u32, String>::new("test");
        let (_tx, rx) = gate();

        let mut pending = Box::pin(coordinator.send(1, move || wait(rx)));
        assert!(poll!(&mut pending).is_pending());
        assert!(coordinator.is_loading());

        drop(pending);
        assert!(!coordinator.is_loading());
    }

    #[tokio::test]
    async fn dropping_stale_attempt_leaves_newer_one_loading() {
        let coordinator = RequestCoordinator::<u32, String>::new("test");
        let (_old_tx, old_rx) = gate();
        let (new_tx, new_rx) = gate();

        let mut old = Box::pin(coordinator.send(1, move || wait(old_rx)));
        assert!(poll!(&mut old).is_pending());
        let mut new = Box::pin(coordinator.send(2, move || wait(new_rx)));
        assert!(poll!(&mut new).is_pending());

        drop(old);
        assert!(coordinator.is_loading());

        new_tx.send(Ok("two".into())).unwrap();
        assert!(new.await.is_applied());
        assert!(!coordinator.is_loading());
    }
}
