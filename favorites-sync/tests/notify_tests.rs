use favorites_sync::gateway::mock::MockGateway;
use favorites_sync::{
    CategoryStatus, FavoritesEngine, FavoritesEvent, SyncConfig, SyncError, SyncState,
    ToggleOutcome,
};
use favorites_types::{Category, EntityId, UserId};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

fn alice() -> UserId {
    UserId::from("alice")
}

fn id(s: &str) -> EntityId {
    EntityId::from(s)
}

fn make_engine() -> (Arc<MockGateway>, FavoritesEngine) {
    let gateway = Arc::new(MockGateway::new());
    let engine = FavoritesEngine::new(gateway.clone(), SyncConfig::default());
    (gateway, engine)
}

type Log = Arc<Mutex<Vec<FavoritesEvent>>>;

fn record(engine: &FavoritesEngine) -> (Log, favorites_sync::SubscriptionHandle) {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    let handle = engine.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
    (log, handle)
}

fn updates(log: &Log) -> Vec<CategoryStatus> {
    log.lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            FavoritesEvent::Updated(status) => Some(status.clone()),
            _ => None,
        })
        .collect()
}

// ── Initial snapshot ────────────────────────────────────────────

#[tokio::test]
async fn new_subscriber_receives_current_snapshot() {
    let (gateway, engine) = make_engine();
    gateway.seed(&alice(), Category::Item, ["1"]);
    engine.set_user(Some(alice()));
    engine.settled().await;

    let (log, _handle) = record(&engine);

    let initial = updates(&log);
    assert_eq!(initial.len(), 3);
    assert_eq!(initial[0].category, Category::Item);
    assert_eq!(initial[0].favorites, vec![id("1")]);
    assert_eq!(initial[0].sync_state, SyncState::Idle);
    assert_eq!(initial[1].category, Category::Housing);
    assert_eq!(initial[2].category, Category::Roommate);
}

#[tokio::test]
async fn subscriber_before_login_sees_load_progress() {
    let (gateway, engine) = make_engine();
    gateway.seed(&alice(), Category::Roommate, ["r1"]);
    let (log, _handle) = record(&engine);
    assert_eq!(updates(&log).len(), 3);

    engine.set_user(Some(alice()));
    let after_login = updates(&log);
    assert_eq!(after_login.len(), 6);
    assert!(after_login[3..].iter().all(|s| s.sync_state == SyncState::Loading));

    engine.settled().await;
    let all = updates(&log);
    assert_eq!(all.len(), 9);
    let roommates = all[6..]
        .iter()
        .find(|s| s.category == Category::Roommate)
        .unwrap();
    assert_eq!(roommates.favorites, vec![id("r1")]);
    assert_eq!(roommates.sync_state, SyncState::Idle);
}

// ── Toggle notifications ────────────────────────────────────────

#[tokio::test]
async fn toggle_notifies_before_network_completes() {
    let (gateway, engine) = make_engine();
    engine.set_user(Some(alice()));
    engine.settled().await;
    gateway.hold_writes();
    let (log, _handle) = record(&engine);
    log.lock().unwrap().clear();

    let ticket = engine.toggle_favorite(Category::Item, "2").unwrap();

    let seen = updates(&log);
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].category, Category::Item);
    assert_eq!(seen[0].favorites, vec![id("2")]);
    assert_eq!(seen[0].sync_state, SyncState::Loading);
    assert_eq!(seen[0].pending, 1);

    gateway.release_writes(1);
    ticket.outcome().await;
    let seen = updates(&log);
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].favorites, vec![id("2")]);
    assert_eq!(seen[1].sync_state, SyncState::Idle);
}

#[tokio::test]
async fn rollback_notifies_update_then_failure() {
    let (gateway, engine) = make_engine();
    engine.set_user(Some(alice()));
    engine.settled().await;
    gateway.fail_next_write(SyncError::server("nope"));
    let (log, _handle) = record(&engine);
    log.lock().unwrap().clear();

    let ticket = engine.toggle_favorite(Category::Housing, "h").unwrap();
    ticket.outcome().await;

    let events = log.lock().unwrap().clone();
    assert_eq!(events.len(), 3);
    match &events[1] {
        FavoritesEvent::Updated(status) => {
            assert_eq!(status.category, Category::Housing);
            assert!(status.favorites.is_empty());
            assert!(status.last_failure.is_some());
        }
        other => panic!("Expected Updated, got {other:?}"),
    }
    match &events[2] {
        FavoritesEvent::ToggleFailed(failure) => {
            assert_eq!(failure.category, Category::Housing);
            assert_eq!(failure.entity_id, id("h"));
            assert_eq!(failure.error, SyncError::server("nope"));
        }
        other => panic!("Expected ToggleFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn notifications_follow_mutation_order() {
    let (gateway, engine) = make_engine();
    engine.set_user(Some(alice()));
    engine.settled().await;
    gateway.hold_writes();
    let (log, _handle) = record(&engine);
    log.lock().unwrap().clear();

    engine.toggle_favorite(Category::Item, "a").unwrap();
    engine.toggle_favorite(Category::Item, "b").unwrap();
    engine.toggle_favorite(Category::Item, "c").unwrap();

    let favorites: Vec<Vec<EntityId>> = updates(&log).into_iter().map(|s| s.favorites).collect();
    assert_eq!(
        favorites,
        vec![
            vec![id("a")],
            vec![id("a"), id("b")],
            vec![id("a"), id("b"), id("c")],
        ]
    );
}

#[tokio::test]
async fn logout_notifies_every_category() {
    let (gateway, engine) = make_engine();
    gateway.seed(&alice(), Category::Item, ["1"]);
    engine.set_user(Some(alice()));
    engine.settled().await;
    let (log, _handle) = record(&engine);
    log.lock().unwrap().clear();

    engine.set_user(None);

    let seen = updates(&log);
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|s| s.favorites.is_empty()));
    assert!(seen.iter().all(|s| s.sync_state == SyncState::Idle));
}

// ── Unsubscribe ─────────────────────────────────────────────────

#[tokio::test]
async fn unsubscribe_is_idempotent_and_stops_delivery() {
    let (_gateway, engine) = make_engine();
    engine.set_user(Some(alice()));
    engine.settled().await;
    let (log, handle) = record(&engine);
    assert_eq!(engine.subscriber_count(), 1);

    assert!(engine.unsubscribe(handle));
    assert!(!engine.unsubscribe(handle));
    assert_eq!(engine.subscriber_count(), 0);

    let before = log.lock().unwrap().len();
    let ticket = engine.toggle_favorite(Category::Item, "1").unwrap();
    ticket.outcome().await;

    assert_eq!(log.lock().unwrap().len(), before);
    assert!(engine.contains(Category::Item, &id("1")));
}

#[tokio::test]
async fn independent_subscribers_each_get_events() {
    let (_gateway, engine) = make_engine();
    engine.set_user(Some(alice()));
    engine.settled().await;
    let (first, _h1) = record(&engine);
    let (second, _h2) = record(&engine);
    first.lock().unwrap().clear();
    second.lock().unwrap().clear();

    engine.toggle_favorite(Category::Roommate, "9").unwrap();

    assert_eq!(updates(&first).len(), 1);
    assert_eq!(updates(&second).len(), 1);
}

#[tokio::test]
async fn late_subscriber_does_not_see_earlier_events() {
    let (_gateway, engine) = make_engine();
    engine.set_user(Some(alice()));
    engine.settled().await;
    engine.toggle_favorite(Category::Item, "x").unwrap();

    let (log, _handle) = record(&engine);

    let seen = updates(&log);
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0].favorites, vec![id("x")]);
}

// ── Re-entrancy ─────────────────────────────────────────────────

#[tokio::test]
async fn callback_can_read_engine() {
    let (_gateway, engine) = make_engine();
    engine.set_user(Some(alice()));
    engine.settled().await;
    let observed: Arc<Mutex<Vec<bool>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = observed.clone();
    let reader = engine.clone();
    engine.subscribe(move |event| {
        if let FavoritesEvent::Updated(status) = event {
            if status.category == Category::Item {
                sink.lock()
                    .unwrap()
                    .push(reader.contains(Category::Item, &EntityId::from("1")));
            }
        }
    });

    engine.toggle_favorite(Category::Item, "1").unwrap();

    assert_eq!(observed.lock().unwrap().clone(), vec![false, true]);
}

#[tokio::test]
async fn callback_can_retry_failed_toggle() {
    let (gateway, engine) = make_engine();
    engine.set_user(Some(alice()));
    engine.settled().await;
    gateway.fail_next_write(SyncError::Unreachable("blip".into()));

    let retried = Arc::new(AtomicBool::new(false));
    let flag = retried.clone();
    let retrier = engine.clone();
    engine.subscribe(move |event| {
        if let FavoritesEvent::ToggleFailed(failure) = event {
            if !flag.swap(true, Ordering::SeqCst) {
                retrier
                    .toggle_favorite(failure.category, failure.entity_id.clone())
                    .unwrap();
            }
        }
    });

    let first = engine.toggle_favorite(Category::Item, "4").unwrap();
    assert!(matches!(
        first.outcome().await,
        ToggleOutcome::RolledBack { .. }
    ));
    engine.settled().await;

    assert!(retried.load(Ordering::SeqCst));
    assert!(engine.contains(Category::Item, &id("4")));
    assert_eq!(gateway.writes_for(Category::Item, &id("4")), 2);
}

#[tokio::test]
async fn toggle_from_callback_is_delivered_after_current_event() {
    let (_gateway, engine) = make_engine();
    engine.set_user(Some(alice()));
    engine.settled().await;

    let trace: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = trace.clone();
    let toggled = Arc::new(AtomicBool::new(false));
    let flag = toggled.clone();
    let toggler = engine.clone();
    engine.subscribe(move |event| {
        let FavoritesEvent::Updated(status) = event else {
            return;
        };
        if status.category != Category::Item {
            return;
        }
        let ids: Vec<&str> = status.favorites.iter().map(|i| i.as_str()).collect();
        sink.lock().unwrap().push(format!("start {}", ids.join(",")));
        if status.favorites == vec![id("1")] && !flag.swap(true, Ordering::SeqCst) {
            toggler.toggle_favorite(Category::Item, "2").unwrap();
            sink.lock().unwrap().push("toggled".to_string());
        }
        sink.lock().unwrap().push("end".to_string());
    });

    engine.toggle_favorite(Category::Item, "1").unwrap();

    assert_eq!(
        trace.lock().unwrap().clone(),
        vec!["start ", "end", "start 1", "toggled", "end", "start 1,2", "end"]
    );
}
