//! Favorites engine: identity-driven reloads and optimistic toggles.
//!
//! The engine owns the favorite set. Reads are synchronous snapshots;
//! gateway I/O runs on spawned Tokio tasks and is reconciled when it
//! completes. Every request is tagged with the generation it was issued
//! under, and a response whose generation is no longer current is dropped,
//! so a late answer for a previous user can never reach the next one.

use crate::error::{SyncError, SyncResult};
use crate::gateway::FavoritesGateway;
use crate::identity::IdentityProvider;
use crate::notify::{FavoritesEvent, Notifier, SubscriptionHandle};
use crate::state::{CategoryStatus, FavoriteSet, PendingToggle, SyncState, ToggleFailure};
use chrono::{DateTime, Utc};
use favorites_types::{Category, EntityId, RequestId, UserId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Configuration for the favorites engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Upper bound for a single gateway call (ms). Expiry counts as a failure.
    pub timeout_ms: u64,
}

impl SyncConfig {
    /// The gateway call timeout as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

/// Coarse state of the engine for the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    /// Nobody is signed in.
    Unauthenticated,
    /// At least one category is still loading.
    Loading,
    /// Every category has resolved, successfully or not.
    Ready,
}

/// Final result of a toggle request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The gateway accepted the write; `favorited` is the confirmed membership.
    Confirmed { favorited: bool },
    /// The gateway rejected the write and the optimistic change was undone.
    RolledBack { favorited: bool, error: SyncError },
    /// A toggle for the same pair was already in flight; nothing was sent.
    Coalesced,
    /// The identity changed or favorites were reloaded before the gateway
    /// answered; the answer is ignored.
    Superseded,
}

/// Handle to a toggle request whose network outcome arrives later.
#[derive(Debug)]
pub struct ToggleTicket {
    category: Category,
    entity_id: EntityId,
    request_id: Option<RequestId>,
    favorited: bool,
    rx: Option<oneshot::Receiver<ToggleOutcome>>,
}

impl ToggleTicket {
    pub fn category(&self) -> Category {
        self.category
    }

    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    /// The request id, or `None` if the request was coalesced.
    pub fn request_id(&self) -> Option<RequestId> {
        self.request_id
    }

    /// Membership right after the request was accepted.
    pub fn favorited(&self) -> bool {
        self.favorited
    }

    /// Whether the request was ignored because another was in flight.
    pub fn is_coalesced(&self) -> bool {
        self.rx.is_none()
    }

    /// Waits for the gateway outcome.
    pub async fn outcome(self) -> ToggleOutcome {
        match self.rx {
            None => ToggleOutcome::Coalesced,
            Some(rx) => rx.await.unwrap_or(ToggleOutcome::Superseded),
        }
    }
}

#[derive(Debug, Default)]
struct CategoryState {
    loading: bool,
    /// Identifies the newest load so an older retry cannot overwrite it.
    load_token: u64,
    load_error: Option<String>,
    last_loaded_at: Option<DateTime<Utc>>,
    last_failure: Option<ToggleFailure>,
}

#[derive(Debug, Default)]
struct EngineState {
    user: Option<UserId>,
    generation: u64,
    favorites: FavoriteSet,
    categories: HashMap<Category, CategoryState>,
    pending: HashMap<(Category, EntityId), PendingToggle>,
    waiters: HashMap<RequestId, oneshot::Sender<ToggleOutcome>>,
    next_load_token: u64,
}

impl EngineState {
    fn category(&self, category: Category) -> Option<&CategoryState> {
        self.categories.get(&category)
    }

    fn category_mut(&mut self, category: Category) -> &mut CategoryState {
        self.categories.entry(category).or_default()
    }

    fn pending_in(&self, category: Category) -> usize {
        self.pending.keys().filter(|(c, _)| *c == category).count()
    }

    fn sync_state(&self, category: Category) -> SyncState {
        let cat = self.category(category);
        if cat.is_some_and(|c| c.loading) || self.pending_in(category) > 0 {
            return SyncState::Loading;
        }
        match cat.and_then(|c| c.load_error.clone()) {
            Some(reason) => SyncState::Error(reason),
            None => SyncState::Idle,
        }
    }

    fn status(&self, category: Category) -> CategoryStatus {
        let cat = self.category(category);
        CategoryStatus {
            category,
            favorites: self.favorites.snapshot(category),
            sync_state: self.sync_state(category),
            pending: self.pending_in(category),
            last_loaded_at: cat.and_then(|c| c.last_loaded_at),
            last_failure: cat.and_then(|c| c.last_failure.clone()),
        }
    }

    fn start_load(&mut self, category: Category) -> u64 {
        self.next_load_token += 1;
        let token = self.next_load_token;
        let cat = self.category_mut(category);
        cat.loading = true;
        cat.load_token = token;
        token
    }

    /// Drops every pending toggle and resolves its ticket as superseded.
    fn abandon_pending(&mut self) {
        if !self.pending.is_empty() {
            info!("Abandoning {} pending toggles", self.pending.len());
        }
        self.pending.clear();
        for (_, tx) in self.waiters.drain() {
            let _ = tx.send(ToggleOutcome::Superseded);
        }
    }

    /// Re-applies the target membership of pending toggles in `category`.
    fn overlay_pending(&mut self, category: Category) {
        let targets: Vec<(EntityId, bool)> = self
            .pending
            .values()
            .filter(|p| p.category == category)
            .map(|p| (p.entity_id.clone(), p.target_membership()))
            .collect();
        for (id, favorited) in targets {
            self.favorites.set_membership(category, &id, favorited);
        }
    }
}

struct Shared {
    config: SyncConfig,
    gateway: Arc<dyn FavoritesGateway>,
    state: Mutex<EngineState>,
    notifier: Notifier,
    settled: Notify,
}

impl Shared {
    fn publish(&self) {
        self.notifier.flush();
        self.settled.notify_waiters();
    }

    async fn call<T>(&self, fut: impl Future<Output = SyncResult<T>>) -> SyncResult<T> {
        match tokio::time::timeout(self.config.request_timeout(), fut).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout),
        }
    }
}

/// The favorites engine. Cloning yields another handle to the same engine.
///
/// Must be used from within a Tokio runtime: loads and writes are spawned.
#[derive(Clone)]
pub struct FavoritesEngine {
    shared: Arc<Shared>,
}

impl FavoritesEngine {
    /// Creates an engine with nobody signed in.
    pub fn new(gateway: Arc<dyn FavoritesGateway>, config: SyncConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                gateway,
                state: Mutex::new(EngineState::default()),
                notifier: Notifier::new(),
                settled: Notify::new(),
            }),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.shared.config
    }

    // ── Queries ──────────────────────────────────────────────────

    /// The signed-in user, if any.
    pub fn current_user(&self) -> Option<UserId> {
        self.shared.state.lock().user.clone()
    }

    /// Incremented on every identity change and full reload.
    pub fn generation(&self) -> u64 {
        self.shared.state.lock().generation
    }

    pub fn phase(&self) -> EnginePhase {
        let state = self.shared.state.lock();
        if state.user.is_none() {
            EnginePhase::Unauthenticated
        } else if state.categories.values().any(|c| c.loading) {
            EnginePhase::Loading
        } else {
            EnginePhase::Ready
        }
    }

    pub fn contains(&self, category: Category, id: &EntityId) -> bool {
        self.shared.state.lock().favorites.contains(category, id)
    }

    /// Sorted copy of the favorited ids in `category`.
    pub fn snapshot(&self, category: Category) -> Vec<EntityId> {
        self.shared.state.lock().favorites.snapshot(category)
    }

    pub fn sync_state(&self, category: Category) -> SyncState {
        self.shared.state.lock().sync_state(category)
    }

    pub fn status(&self, category: Category) -> CategoryStatus {
        self.shared.state.lock().status(category)
    }

    /// Whether a toggle for the pair is awaiting acknowledgment.
    pub fn is_pending(&self, category: Category, id: &EntityId) -> bool {
        self.shared
            .state
            .lock()
            .pending
            .contains_key(&(category, id.clone()))
    }

    pub fn pending_count(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    /// The most recent rolled-back toggle in `category`, until the next
    /// toggle or reload of that category.
    pub fn toggle_failure(&self, category: Category) -> Option<ToggleFailure> {
        self.shared
            .state
            .lock()
            .category(category)
            .and_then(|c| c.last_failure.clone())
    }

    /// Resolves once no load and no toggle is outstanding.
    pub async fn settled(&self) {
        loop {
            let notified = self.shared.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let state = self.shared.state.lock();
                if state.pending.is_empty() && !state.categories.values().any(|c| c.loading) {
                    return;
                }
            }
            notified.await;
        }
    }

    // ── Subscriptions ────────────────────────────────────────────

    /// Registers `callback`. It first receives the current status of every
    /// category, then every subsequent event in order.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&FavoritesEvent) + Send + Sync + 'static,
    {
        let handle = {
            let state = self.shared.state.lock();
            let initial = Category::ALL
                .into_iter()
                .map(|c| FavoritesEvent::Updated(state.status(c)))
                .collect();
            self.shared.notifier.register(Arc::new(callback), initial)
        };
        self.shared.notifier.flush();
        handle
    }

    /// Stops notifications for `handle`. Returns false if already removed.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.shared.notifier.unregister(handle)
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.notifier.subscriber_count()
    }

    // ── Identity ─────────────────────────────────────────────────

    /// Applies an identity change. Signing in (or switching user) discards
    /// everything and reloads; signing out clears everything. Re-announcing
    /// the current user is a no-op.
    pub fn set_user(&self, user: Option<UserId>) {
        let mut state = self.shared.state.lock();
        if state.user == user {
            return;
        }
        match user {
            Some(user) => {
                info!("Loading favorites for {}", user);
                state.user = Some(user);
                let loads = self.begin_reload(&mut state);
                drop(state);
                self.shared.publish();
                self.spawn_loads(loads);
            }
            None => {
                info!("Signed out, clearing favorites");
                state.user = None;
                state.generation += 1;
                state.abandon_pending();
                state.favorites.clear();
                state.categories.clear();
                for category in Category::ALL {
                    let status = state.status(category);
                    self.shared.notifier.enqueue(FavoritesEvent::Updated(status));
                }
                drop(state);
                self.shared.publish();
            }
        }
    }

    /// Spawns a task that applies the provider's identity now and on every
    /// change, until the provider goes away.
    pub fn follow_identity(&self, provider: Arc<dyn IdentityProvider>) -> JoinHandle<()> {
        let mut rx = provider.watch();
        self.set_user(provider.current_user());
        let engine = self.clone();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let user = rx.borrow_and_update().clone();
                engine.set_user(user);
            }
            debug!("Identity provider closed");
        })
    }

    // ── Reloads ──────────────────────────────────────────────────

    /// Discards local state and reloads every category.
    pub fn refresh(&self) -> SyncResult<()> {
        let mut state = self.shared.state.lock();
        if state.user.is_none() {
            return Err(SyncError::Unauthorized);
        }
        info!("Refreshing all favorites");
        let loads = self.begin_reload(&mut state);
        drop(state);
        self.shared.publish();
        self.spawn_loads(loads);
        Ok(())
    }

    /// Reloads one category, keeping pending toggles.
    pub fn retry(&self, category: Category) -> SyncResult<()> {
        let mut state = self.shared.state.lock();
        if state.user.is_none() {
            return Err(SyncError::Unauthorized);
        }
        info!("Retrying load of {}", category);
        let token = state.start_load(category);
        let status = state.status(category);
        self.shared.notifier.enqueue(FavoritesEvent::Updated(status));
        let load = Load {
            user: state.user.clone(),
            generation: state.generation,
            category,
            token,
        };
        drop(state);
        self.shared.publish();
        self.spawn_loads(vec![load]);
        Ok(())
    }

    fn begin_reload(&self, state: &mut EngineState) -> Vec<Load> {
        state.generation += 1;
        state.abandon_pending();
        state.favorites.clear();
        let mut loads = Vec::with_capacity(Category::ALL.len());
        for category in Category::ALL {
            let token = state.start_load(category);
            let cat = state.category_mut(category);
            cat.load_error = None;
            cat.last_failure = None;
            let status = state.status(category);
            self.shared.notifier.enqueue(FavoritesEvent::Updated(status));
            loads.push(Load {
                user: state.user.clone(),
                generation: state.generation,
                category,
                token,
            });
        }
        loads
    }

    fn spawn_loads(&self, loads: Vec<Load>) {
        for load in loads {
            let Some(user) = load.user.clone() else {
                continue;
            };
            let shared = self.shared.clone();
            tokio::spawn(async move {
                let result = shared
                    .call(shared.gateway.list_favorites(&user, load.category))
                    .await;
                Self::finish_load(&shared, load, result);
            });
        }
    }

    fn finish_load(shared: &Shared, load: Load, result: SyncResult<Vec<EntityId>>) {
        let mut state = shared.state.lock();
        let current = state.generation == load.generation
            && state
                .category(load.category)
                .is_some_and(|c| c.load_token == load.token);
        if !current {
            debug!(
                "Discarding stale load of {} (generation {})",
                load.category, load.generation
            );
            return;
        }

        let category = load.category;
        state.category_mut(category).loading = false;
        match result {
            Ok(ids) => {
                info!("Loaded {} favorites in {}", ids.len(), category);
                state.favorites.replace(category, ids);
                let cat = state.category_mut(category);
                cat.load_error = None;
                cat.last_loaded_at = Some(Utc::now());
            }
            Err(e) => {
                warn!("Failed to load favorites in {}: {}", category, e);
                state.favorites.clear_category(category);
                state.category_mut(category).load_error = Some(e.to_string());
            }
        }
        state.overlay_pending(category);
        let status = state.status(category);
        shared.notifier.enqueue(FavoritesEvent::Updated(status));
        drop(state);
        shared.publish();
    }

    // ── Toggles ──────────────────────────────────────────────────

    /// Flips the membership of `id` in `category`.
    ///
    /// The change is applied and announced before this returns; the
    /// gateway write completes later and is reported through the ticket.
    /// Fails with `Unauthorized` when nobody is signed in. A request for a
    /// pair that already has a toggle in flight is ignored.
    ///
    /// If another thread is delivering notifications at the time, the
    /// `Updated` event is handed to that thread and may reach subscribers
    /// just after this returns, still in order. The same holds when called
    /// from inside a subscriber callback. The change itself is always
    /// visible through `contains` and `snapshot` on return.
    pub fn toggle_favorite(
        &self,
        category: Category,
        id: impl Into<EntityId>,
    ) -> SyncResult<ToggleTicket> {
        let id = id.into();
        let mut state = self.shared.state.lock();
        let Some(user) = state.user.clone() else {
            debug!("Rejecting toggle of {}/{}: not signed in", category, id);
            return Err(SyncError::Unauthorized);
        };

        let key = (category, id.clone());
        if state.pending.contains_key(&key) {
            debug!("Toggle of {}/{} already in flight, ignoring", category, id);
            let favorited = state.favorites.contains(category, &id);
            return Ok(ToggleTicket {
                category,
                entity_id: id,
                request_id: None,
                favorited,
                rx: None,
            });
        }

        let previous = state.favorites.contains(category, &id);
        let target = !previous;
        let request_id = RequestId::new();
        let generation = state.generation;
        state.pending.insert(
            key,
            PendingToggle {
                category,
                entity_id: id.clone(),
                previous_membership: previous,
                request_id,
                generation,
            },
        );
        state.favorites.set_membership(category, &id, target);
        state.category_mut(category).last_failure = None;
        let (tx, rx) = oneshot::channel();
        state.waiters.insert(request_id, tx);
        let status = state.status(category);
        self.shared.notifier.enqueue(FavoritesEvent::Updated(status));
        drop(state);
        self.shared.publish();

        debug!(
            "Toggled {}/{} to {} (request {})",
            category, id, target, request_id
        );
        let write = Write {
            user,
            generation,
            request_id,
            category,
            id: id.clone(),
            favorite: target,
        };
        let shared = self.shared.clone();
        tokio::spawn(async move {
            let result = shared
                .call(shared.gateway.set_favorite(
                    &write.user,
                    write.category,
                    &write.id,
                    write.favorite,
                ))
                .await;
            Self::finish_write(&shared, write, result);
        });

        Ok(ToggleTicket {
            category,
            entity_id: id,
            request_id: Some(request_id),
            favorited: target,
            rx: Some(rx),
        })
    }

    fn finish_write(shared: &Shared, write: Write, result: SyncResult<()>) {
        let mut state = shared.state.lock();
        let key = (write.category, write.id.clone());
        let current = state.generation == write.generation
            && state.pending.get(&key).is_some_and(|p| {
                p.request_id == write.request_id && p.generation == write.generation
            });
        if !current {
            debug!(
                "Discarding stale acknowledgment for {}/{} (request {})",
                write.category, write.id, write.request_id
            );
            return;
        }

        state.pending.remove(&key);
        let waiter = state.waiters.remove(&write.request_id);
        let mut failure_event = None;
        let outcome = match result {
            Ok(()) => {
                debug!("Confirmed {}/{}", write.category, write.id);
                ToggleOutcome::Confirmed {
                    favorited: write.favorite,
                }
            }
            Err(error) => {
                warn!(
                    "Rolling back {}/{} after gateway error: {}",
                    write.category, write.id, error
                );
                let previous = !write.favorite;
                state
                    .favorites
                    .set_membership(write.category, &write.id, previous);
                let failure = ToggleFailure {
                    category: write.category,
                    entity_id: write.id.clone(),
                    request_id: write.request_id,
                    error: error.clone(),
                    occurred_at: Utc::now(),
                };
                state.category_mut(write.category).last_failure = Some(failure.clone());
                failure_event = Some(FavoritesEvent::ToggleFailed(failure));
                ToggleOutcome::RolledBack {
                    favorited: previous,
                    error,
                }
            }
        };
        let status = state.status(write.category);
        shared.notifier.enqueue(FavoritesEvent::Updated(status));
        if let Some(event) = failure_event {
            shared.notifier.enqueue(event);
        }
        drop(state);
        shared.publish();

        if let Some(tx) = waiter {
            let _ = tx.send(outcome);
        }
    }
}

/// A category read tagged with the generation and token it belongs to.
#[derive(Debug, Clone)]
struct Load {
    user: Option<UserId>,
    generation: u64,
    category: Category,
    token: u64,
}

/// A toggle write tagged with the generation and request it belongs to.
#[derive(Debug, Clone)]
struct Write {
    user: UserId,
    generation: u64,
    request_id: RequestId,
    category: Category,
    id: EntityId,
    favorite: bool,
}
