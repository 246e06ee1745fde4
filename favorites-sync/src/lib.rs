//! Favorites synchronization engine.
//!
//! Keeps a signed-in user's favorites (items, housing, roommates) in memory
//! for many UI views at once, and in step with a remote store.
//!
//! # Architecture
//!
//! ## Components
//!
//! - **State**: the favorite set and per-category sync state
//! - **Gateway**: abstracts over the remote store (HTTP, mock)
//! - **Identity**: tells the engine who is signed in
//! - **Engine**: reloads on identity change, applies optimistic toggles
//! - **Notify**: delivers ordered change events to subscribers
//!
//! ## Toggle Process
//!
//! 1. **Gate**: reject when signed out, ignore when the pair is in flight
//! 2. **Apply**: flip membership locally and notify subscribers
//! 3. **Write**: send the change to the gateway on a spawned task
//! 4. **Reconcile**: keep the change on success, roll it back on failure
//!
//! Identity changes bump a generation counter; responses tagged with an
//! older generation are dropped.
//!
//! # Example
//!
//! ```
//! use favorites_sync::{FavoritesEngine, SyncConfig};
//! use favorites_sync::gateway::mock::MockGateway;
//! use favorites_types::{Category, UserId};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let gateway = Arc::new(MockGateway::new());
//! let user = UserId::from("alice");
//! gateway.seed(&user, Category::Item, ["1"]);
//!
//! let engine = FavoritesEngine::new(gateway, SyncConfig::default());
//! engine.set_user(Some(user));
//! engine.settled().await;
//! assert_eq!(engine.snapshot(Category::Item), vec!["1".into()]);
//! # });
//! ```

mod engine;
mod error;
pub mod gateway;
pub mod http;
pub mod identity;
mod notify;
pub mod state;

pub use engine::{EnginePhase, FavoritesEngine, SyncConfig, ToggleOutcome, ToggleTicket};
pub use error::{SyncError, SyncResult};
pub use gateway::FavoritesGateway;
pub use http::{HttpGateway, HttpGatewayConfig};
pub use identity::{IdentityProvider, SessionIdentity};
pub use notify::{Callback, FavoritesEvent, SubscriptionHandle};
pub use state::{CategoryStatus, FavoriteSet, PendingToggle, SyncState, ToggleFailure};
