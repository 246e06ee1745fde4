//! Persistence gateway abstraction.
//!
//! Defines the trait the engine uses to read and write a user's favorites,
//! allowing it to work with any backend (HTTP API, in-memory mock, ...).

use crate::error::SyncResult;
use async_trait::async_trait;
use favorites_types::{Category, EntityId, UserId};

/// Remote store of favorites, addressed by `(user, category, id)`.
#[async_trait]
pub trait FavoritesGateway: Send + Sync {
    /// Returns every id the user has favorited in `category`.
    async fn list_favorites(&self, user: &UserId, category: Category)
    -> SyncResult<Vec<EntityId>>;

    /// Favorites (`favorite == true`) or unfavorites `id`.
    async fn set_favorite(
        &self,
        user: &UserId,
        category: Category,
        id: &EntityId,
        favorite: bool,
    ) -> SyncResult<()>;
}

/// A mock gateway for testing.
pub mod mock {
    use super::*;
    use crate::error::SyncError;
    use parking_lot::Mutex;
    use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    /// A write received by the mock, in arrival order.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct WriteCall {
        pub user: UserId,
        pub category: Category,
        pub id: EntityId,
        pub favorite: bool,
    }

    /// In-memory gateway whose reads and writes can be held in flight,
    /// failed on demand, and inspected afterwards.
    pub struct MockGateway {
        remote: Mutex<HashMap<(UserId, Category), BTreeSet<EntityId>>>,
        list_failures: Mutex<HashMap<Category, SyncError>>,
        write_failures: Mutex<VecDeque<SyncError>>,
        writes: Mutex<Vec<WriteCall>>,
        lists: Mutex<Vec<(UserId, Category)>>,
        answered_lists: AtomicUsize,
        held_lists: Mutex<HashSet<Category>>,
        list_gates: HashMap<Category, Semaphore>,
        hold_writes: Mutex<bool>,
        write_gate: Semaphore,
    }

    impl Default for MockGateway {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockGateway {
        /// Creates an empty gateway that answers immediately.
        pub fn new() -> Self {
            Self {
                remote: Mutex::new(HashMap::new()),
                list_failures: Mutex::new(HashMap::new()),
                write_failures: Mutex::new(VecDeque::new()),
                writes: Mutex::new(Vec::new()),
                lists: Mutex::new(Vec::new()),
                answered_lists: AtomicUsize::new(0),
                held_lists: Mutex::new(HashSet::new()),
                list_gates: Category::ALL
                    .into_iter()
                    .map(|c| (c, Semaphore::new(0)))
                    .collect(),
                hold_writes: Mutex::new(false),
                write_gate: Semaphore::new(0),
            }
        }

        /// Seeds the remote favorites of `user` in `category`.
        pub fn seed<I, S>(&self, user: &UserId, category: Category, ids: I)
        where
            I: IntoIterator<Item = S>,
            S: Into<EntityId>,
        {
            self.remote.lock().insert(
                (user.clone(), category),
                ids.into_iter().map(Into::into).collect(),
            );
        }

        /// The remote favorites of `user` in `category`, sorted.
        pub fn remote(&self, user: &UserId, category: Category) -> Vec<EntityId> {
            self.remote
                .lock()
                .get(&(user.clone(), category))
                .map(|ids| ids.iter().cloned().collect())
                .unwrap_or_default()
        }

        /// Makes every subsequent read of `category` fail with `error`.
        pub fn fail_lists(&self, category: Category, error: SyncError) {
            self.list_failures.lock().insert(category, error);
        }

        /// Lets reads of `category` succeed again.
        pub fn heal_lists(&self, category: Category) {
            self.list_failures.lock().remove(&category);
        }

        /// Queues a failure for the next write to be released.
        pub fn fail_next_write(&self, error: SyncError) {
            self.write_failures.lock().push_back(error);
        }

        /// Holds reads of `category` until released.
        pub fn hold_lists(&self, category: Category) {
            self.held_lists.lock().insert(category);
        }

        /// Lets `n` held reads of `category` complete.
        pub fn release_lists(&self, category: Category, n: usize) {
            if let Some(gate) = self.list_gates.get(&category) {
                gate.add_permits(n);
            }
        }

        /// Holds every write until released.
        pub fn hold_writes(&self) {
            *self.hold_writes.lock() = true;
        }

        /// Lets `n` held writes complete.
        pub fn release_writes(&self, n: usize) {
            self.write_gate.add_permits(n);
        }

        /// Every write received so far.
        pub fn writes(&self) -> Vec<WriteCall> {
            self.writes.lock().clone()
        }

        /// Number of writes received for one `(category, id)` pair.
        pub fn writes_for(&self, category: Category, id: &EntityId) -> usize {
            self.writes
                .lock()
                .iter()
                .filter(|w| w.category == category && &w.id == id)
                .count()
        }

        /// Every read received so far.
        pub fn lists(&self) -> Vec<(UserId, Category)> {
            self.lists.lock().clone()
        }

        /// Number of reads that have produced an answer.
        pub fn answered_lists(&self) -> usize {
            self.answered_lists.load(Ordering::SeqCst)
        }

        async fn pass_gate(gate: &Semaphore) -> SyncResult<()> {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| SyncError::Unreachable("mock gateway closed".into()))?;
            permit.forget();
            Ok(())
        }
    }

    #[async_trait]
    impl FavoritesGateway for MockGateway {
        async fn list_favorites(
            &self,
            user: &UserId,
            category: Category,
        ) -> SyncResult<Vec<EntityId>> {
            self.lists.lock().push((user.clone(), category));

            let held = self.held_lists.lock().contains(&category);
            if held {
                if let Some(gate) = self.list_gates.get(&category) {
                    Self::pass_gate(gate).await?;
                }
            }

            let failure = self.list_failures.lock().get(&category).cloned();
            let result = match failure {
                Some(error) => Err(error),
                None => Ok(self.remote(user, category)),
            };
            self.answered_lists.fetch_add(1, Ordering::SeqCst);
            result
        }

        async fn set_favorite(
            &self,
            user: &UserId,
            category: Category,
            id: &EntityId,
            favorite: bool,
        ) -> SyncResult<()> {
            self.writes.lock().push(WriteCall {
                user: user.clone(),
                category,
                id: id.clone(),
                favorite,
            });

            let held = *self.hold_writes.lock();
            if held {
                Self::pass_gate(&self.write_gate).await?;
            }

            if let Some(error) = self.write_failures.lock().pop_front() {
                return Err(error);
            }

            let mut remote = self.remote.lock();
            let ids = remote.entry((user.clone(), category)).or_default();
            if favorite {
                ids.insert(id.clone());
            } else {
                ids.remove(id);
            }
            Ok(())
        }
    }
}
