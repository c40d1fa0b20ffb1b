use nbchat_chat::{
    JsonFileStore, MemoryStore, SessionStore, StateStore, CURRENT_SESSION_KEY, SESSIONS_KEY,
};
use nbchat_types::Message;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;
use tempfile::TempDir;

fn open(dir: &TempDir) -> SessionStore {
    let storage = JsonFileStore::open(dir.path().join("state.json")).unwrap();
    SessionStore::load(Box::new(storage)).unwrap()
}

#[test]
fn test_persist_load_round_trip() {
    let dir = TempDir::new().unwrap();

    let (sessions, current) = {
        let mut store = open(&dir);
        let first = store.current_id().unwrap();
        store.append_message(first, Message::user("What is df?")).unwrap();
        store.append_message(first, Message::assistant("A DataFrame.")).unwrap();

        let second = store.create_session().unwrap();
        store.append_message(second, Message::user("Plot it")).unwrap();
        store.switch_current(first).unwrap();

        (store.sessions().to_vec(), store.current_id())
    };

    let reloaded = open(&dir);
    assert_eq!(reloaded.sessions(), sessions.as_slice());
    assert_eq!(reloaded.current_id(), current);
    assert_eq!(reloaded.current().unwrap().title, "What is df?");
}

#[test]
fn test_stale_current_id_falls_back_to_first() {
    let mut storage = MemoryStore::new();
    storage
        .set(
            SESSIONS_KEY,
            json!([
                {"id": "6f1c0a52-3c1f-4d7e-9b11-2a3f4c5d6e7f", "title": "Older", "messages": []},
                {"id": "0b8e4f2a-9d6c-4b3a-8e7f-1a2b3c4d5e6f", "title": "Oldest",
                 "messages": [{"text": "hi", "isUser": true}]}
            ]),
        )
        .unwrap();
    storage
        .set(CURRENT_SESSION_KEY, json!("11111111-2222-4333-8444-555555555555"))
        .unwrap();

    let store = SessionStore::load(Box::new(storage)).unwrap();
    assert_eq!(store.sessions().len(), 2);
    assert_eq!(store.current().unwrap().title, "Older");
    assert_eq!(store.history(store.sessions()[1].id), &[Message::user("hi")]);
}

#[test]
fn test_every_mutation_is_written_through() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    let id = store.current_id().unwrap();
    store.append_message(id, Message::user("kept")).unwrap();

    // A second handle sees the write without an explicit persist
    let other = open(&dir);
    assert_eq!(other.history(id), &[Message::user("kept")]);
}

#[derive(Debug, Clone)]
enum Op {
    Create,
    Delete(usize),
    Switch(usize),
    Append(usize),
    Clear(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Create),
        (0usize..8).prop_map(Op::Delete),
        (0usize..8).prop_map(Op::Switch),
        (0usize..8).prop_map(Op::Append),
        (0usize..8).prop_map(Op::Clear),
    ]
}

proptest! {
    #[test]
    fn prop_current_always_names_an_existing_session(ops in prop::collection::vec(op(), 0..40)) {
        let mut store = SessionStore::load(Box::new(MemoryStore::new())).unwrap();

        for op in ops {
            let ids: Vec<_> = store.sessions().iter().map(|s| s.id).collect();
            let pick = |n: usize| ids.get(n % ids.len().max(1)).copied();
            match op {
                Op::Create => { store.create_session().unwrap(); }
                Op::Delete(n) => if let Some(id) = pick(n) { store.delete_session(id).unwrap(); },
                Op::Switch(n) => if let Some(id) = pick(n) { store.switch_current(id).unwrap(); },
                Op::Append(n) => if let Some(id) = pick(n) {
                    store.append_message(id, Message::user("question")).unwrap();
                },
                Op::Clear(n) => if let Some(id) = pick(n) { store.clear_session(id, true).unwrap(); },
            }

            match store.current_id() {
                Some(id) => prop_assert!(store.contains(id)),
                None => prop_assert!(store.sessions().is_empty()),
            }
            let mut unique: Vec<_> = store.sessions().iter().map(|s| s.id).collect();
            unique.sort();
            unique.dedup();
            prop_assert_eq!(unique.len(), store.sessions().len());
        }
    }
}
