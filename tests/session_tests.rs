// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use aibar::session::{
    group_sessions, ChatRequest, JsonFileStorage, MemoryStorage, RecencyBand, Session,
    SessionStore, DEFAULT_TITLE,
};
use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use tempfile::TempDir;

fn memory_store_with(count: usize) -> SessionStore {
    let mut store = SessionStore::open(Box::new(MemoryStorage::new()), "gpt-4").unwrap();
    for _ in 1..count {
        store.create_new_chat().unwrap();
    }
    store
}

#[test]
fn test_state_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");

    let (first, second) = {
        let mut store = SessionStore::open(Box::new(JsonFileStorage::new(&path)), "gpt-4").unwrap();
        let first = store.current_session_id().unwrap();
        let turn = store
            .begin_turn(&ChatRequest::new("What does Pin guarantee?", "gpt-4"))
            .unwrap()
            .unwrap();
        store
            .complete_turn(&turn, Ok(aibar::llm::AiResponse::new("It never moves.")))
            .unwrap();
        let second = store.create_new_chat().unwrap();
        store.set_selected_model("claude-3-opus").unwrap();
        (first, second)
    };

    let store = SessionStore::open(Box::new(JsonFileStorage::new(&path)), "gpt-4").unwrap();
    assert_eq!(store.sessions().len(), 2);
    assert_eq!(store.current_session_id(), Some(second));
    assert_eq!(store.selected_model(), "claude-3-opus");
    assert!(!store.can_undo());

    let restored = store.session(first).unwrap();
    assert_eq!(restored.title, "What does Pin...");
    assert_eq!(restored.messages.len(), 2);
    assert_eq!(restored.messages[1].text, "It never moves.");
}

#[test]
fn test_corrupt_state_is_backed_up() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, "{ this is not json").unwrap();

    let store = SessionStore::open(Box::new(JsonFileStorage::new(&path)), "gpt-4").unwrap();
    assert_eq!(store.sessions().len(), 1);
    assert_eq!(store.sessions()[0].title, DEFAULT_TITLE);

    let backup = dir.path().join("state.json.bak");
    assert_eq!(std::fs::read_to_string(backup).unwrap(), "{ this is not json");
    assert!(path.exists());
}

#[test]
fn test_unknown_stored_model_falls_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, r#"{"sessions": [], "selectedModel": "gpt-2"}"#).unwrap();

    let store = SessionStore::open(Box::new(JsonFileStorage::new(&path)), "claude-3-haiku").unwrap();
    assert_eq!(store.selected_model(), "claude-3-haiku");
}

#[test]
fn test_delete_undo_redo_cycle() {
    let mut store = memory_store_with(3);
    let ids: Vec<_> = store.sessions().iter().map(|s| s.id).collect();

    assert!(store.delete_session(ids[1]).unwrap());
    assert!(store.can_undo());
    assert_eq!(store.undo_delete().unwrap(), Some(ids[1]));
    assert!(store.can_redo());
    assert_eq!(store.redo_delete().unwrap(), Some(ids[1]));
    assert!(store.session(ids[1]).is_none());
    assert_eq!(store.undo_delete().unwrap(), Some(ids[1]));

    let after: Vec<_> = store.sessions().iter().map(|s| s.id).collect();
    assert_eq!(after, ids);
}

#[test]
fn test_grouping_with_search() {
    let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
    let mut recent = Session::new();
    recent.title = "Borrow checker".to_string();
    recent.last_updated_at = now - Duration::minutes(2);
    let mut old = Session::new();
    old.title = "Async traits".to_string();
    old.last_updated_at = now - Duration::days(40);
    let sessions = vec![old, recent];

    let groups = group_sessions(&sessions, "", now);
    assert_eq!(groups.len(), RecencyBand::ALL.len());
    assert_eq!(groups[0].sessions[0].title, "Borrow checker");
    assert_eq!(groups[RecencyBand::Older as usize].sessions[0].title, "Async traits");

    let filtered = group_sessions(&sessions, "ASYNC", now);
    let total: usize = filtered.iter().map(|g| g.sessions.len()).sum();
    assert_eq!(total, 1);
}

proptest! {
    #[test]
    fn prop_deletes_then_undos_restore_exact_state(
        count in 1usize..8,
        picks in proptest::collection::vec(0usize..8, 1..16),
    ) {
        let mut store = memory_store_with(count);
        let before = store.snapshot();

        // Runs past `count` delete the placeholders that empty stores grow
        for pick in &picks {
            let sessions = store.sessions();
            let id = sessions[pick % sessions.len()].id;
            prop_assert!(store.delete_session(id).unwrap());
        }
        for _ in 0..picks.len() {
            prop_assert!(store.undo_delete().unwrap().is_some());
        }

        prop_assert_eq!(store.snapshot(), before);
        prop_assert!(!store.can_undo());
    }

    #[test]
    fn prop_grouping_partitions_sessions(ages in proptest::collection::vec(0i64..90 * 24 * 60, 0..20)) {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let sessions: Vec<Session> = ages
            .iter()
            .map(|minutes| {
                let mut session = Session::new();
                session.last_updated_at = now - Duration::minutes(*minutes);
                session
            })
            .collect();

        let groups = group_sessions(&sessions, "", now);
        let total: usize = groups.iter().map(|g| g.sessions.len()).sum();
        prop_assert_eq!(total, sessions.len());

        for group in &groups {
            for session in &group.sessions {
                prop_assert_eq!(RecencyBand::for_age(now - session.last_updated_at), group.band);
            }
            for pair in group.sessions.windows(2) {
                prop_assert!(pair[0].last_updated_at >= pair[1].last_updated_at);
            }
        }
    }
}
