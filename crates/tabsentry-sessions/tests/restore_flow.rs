// Full restart-and-reconcile flow: drain the tracked state of one browser
// run, then recognize the restored window in the next run and carry its tab
// metadata over.

use std::sync::Arc;

use rusqlite::Connection;
use tabsentry_core::types::{SettingKey, SettingValue, Tab, TabOverrides, Window};
use tabsentry_registry::{SystemFlags, TabRegistry};
use tabsentry_sessions::{SessionMatcher, WindowOutcome};
use tabsentry_store::Store;

struct Fixture {
    store: Arc<Store>,
    registry: Arc<TabRegistry>,
    flags: SystemFlags,
    matcher: SessionMatcher,
}

fn fixture() -> Fixture {
    let store = Arc::new(Store::new(Connection::open_in_memory().unwrap()).unwrap());
    let registry = Arc::new(TabRegistry::new(Arc::clone(&store)));
    let flags = SystemFlags::new(Arc::clone(&store));
    let matcher = SessionMatcher::new(Arc::clone(&store), Arc::clone(&registry), flags.clone());
    Fixture {
        store,
        registry,
        flags,
        matcher,
    }
}

fn tab(id: i64, index: i64, window_id: i64, url: &str, last_visited: Option<i64>) -> Tab {
    Tab {
        id,
        index,
        window_id,
        url: url.into(),
        title: format!("tab {id}"),
        favicon_url: None,
        last_visited,
    }
}

fn window(window_id: i64) -> Window {
    Window {
        window_id,
        title: None,
        session_id: None,
    }
}

#[test]
fn restart_reconciles_window_and_inherits_metadata() {
    let f = fixture();

    // Browser run 1: window W1 with two tracked tabs.
    f.registry.add_window(window(1)).unwrap();
    f.registry
        .add_tab(
            tab(11, 0, 1, "https://a.com/?x=1", Some(900)),
            TabOverrides::default(),
        )
        .unwrap();
    f.registry
        .add_tab(
            tab(12, 1, 1, "https://b.com/", Some(500)),
            TabOverrides::default(),
        )
        .unwrap();

    // Browser restarts: the startup handler raises the newSession flag.
    f.flags
        .update(SettingKey::NewSession, Some(SettingValue::Bool(true)))
        .unwrap();

    // Run 2: window W2 opens with the same pages (query strings changed).
    let w2_tabs = vec![
        tab(21, 0, 2, "https://a.com/?x=2", None),
        tab(22, 1, 2, "https://b.com/", None),
    ];
    let outcome = f
        .matcher
        .handle_window_created(&window(2), &w2_tabs)
        .unwrap();

    match outcome {
        WindowOutcome::Restored { match_ratio, .. } => assert_eq!(match_ratio, 1.0),
        other => panic!("expected restore, got {other:?}"),
    }

    // The drained session was consumed and demoted to history.
    assert!(f.store.all_last_sessions().unwrap().is_empty());
    let old = f.store.all_old_sessions().unwrap();
    assert_eq!(old.len(), 1);
    assert_eq!(old[0].tabs_length, 2);
    assert!(!old[0].name.is_empty());

    // Live tabs adopt W2's ids but inherit run 1's lastVisited.
    let restored_a = f.registry.get_tab(21).unwrap().unwrap();
    assert_eq!(restored_a.window_id, 2);
    assert_eq!(restored_a.last_visited, Some(900));
    assert_eq!(restored_a.url, "https://a.com/?x=1"); // session record preserved
    let restored_b = f.registry.get_tab(22).unwrap().unwrap();
    assert_eq!(restored_b.last_visited, Some(500));

    // The old ids are gone and the old window is gone.
    assert!(f.registry.get_tab(11).unwrap().is_none());
    assert!(f.registry.get_window(1).unwrap().is_none());
    assert!(f.registry.get_window(2).unwrap().is_some());

    // Teardown never touched the closed-tabs archive.
    assert!(f.registry.all_closed_tabs().unwrap().is_empty());
}

#[test]
fn unrelated_window_leaves_session_for_later() {
    let f = fixture();

    f.registry.add_window(window(1)).unwrap();
    f.registry
        .add_tab(
            tab(11, 0, 1, "https://a.com/", None),
            TabOverrides::default(),
        )
        .unwrap();
    f.flags
        .update(SettingKey::NewSession, Some(SettingValue::Bool(true)))
        .unwrap();

    // A single-tab window pointing somewhere else entirely.
    let outcome = f
        .matcher
        .handle_window_created(&window(2), &[tab(21, 0, 2, "https://unrelated.com/", None)])
        .unwrap();
    assert_eq!(outcome, WindowOutcome::New);

    // Unmatched session remains a candidate; no history entry yet.
    assert_eq!(f.store.all_last_sessions().unwrap().len(), 1);
    assert!(f.store.all_old_sessions().unwrap().is_empty());

    // A later window with the matching tab still reconciles.
    let outcome = f
        .matcher
        .handle_window_created(&window(3), &[tab(31, 0, 3, "https://a.com/", None)])
        .unwrap();
    assert!(matches!(outcome, WindowOutcome::Restored { .. }));
    assert!(f.store.all_last_sessions().unwrap().is_empty());
}

#[test]
fn multiple_windows_drain_and_reconcile_independently() {
    let f = fixture();

    for w in [1, 2] {
        f.registry.add_window(window(w)).unwrap();
        f.registry
            .add_tab(
                tab(w * 10, 0, w, &format!("https://w{w}.example/"), None),
                TabOverrides::default(),
            )
            .unwrap();
    }
    f.flags
        .update(SettingKey::NewSession, Some(SettingValue::Bool(true)))
        .unwrap();

    // First restored window matches the first drained session.
    let outcome = f
        .matcher
        .handle_window_created(&window(5), &[tab(50, 0, 5, "https://w1.example/", None)])
        .unwrap();
    assert!(matches!(outcome, WindowOutcome::Restored { .. }));

    // Second restored window matches the remaining one.
    let outcome = f
        .matcher
        .handle_window_created(&window(6), &[tab(60, 0, 6, "https://w2.example/", None)])
        .unwrap();
    assert!(matches!(outcome, WindowOutcome::Restored { .. }));

    assert!(f.store.all_last_sessions().unwrap().is_empty());
    assert_eq!(f.store.all_old_sessions().unwrap().len(), 2);
    assert_eq!(f.registry.all_windows().unwrap().len(), 2);
}
