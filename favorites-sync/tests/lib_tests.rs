use favorites_sync::gateway::mock::MockGateway;
use favorites_sync::{EnginePhase, FavoritesEngine, SyncConfig};
use std::sync::Arc;

#[tokio::test]
async fn favorites_engine_creation() {
    let engine = FavoritesEngine::new(Arc::new(MockGateway::new()), SyncConfig::default());

    assert_eq!(engine.phase(), EnginePhase::Unauthenticated);
    assert_eq!(engine.config().timeout_ms, 30_000);
    assert_eq!(engine.subscriber_count(), 0);
}
