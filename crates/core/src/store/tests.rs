use super::*;
use crate::storage::{Error as StorageError, FileStorage, MemoryStorage};

fn persisted(storage: &MemoryStorage) -> Option<Vec<Chat>> {
    storage
        .get(STORAGE_KEY)
        .map(|raw| serde_json::from_str(&raw).unwrap())
}

fn assert_mirrored(store: &ConversationStore, storage: &MemoryStorage) {
    assert_eq!(persisted(storage).as_deref(), Some(store.chats()));
}

fn new_store() -> (ConversationStore, MemoryStorage) {
    let storage = MemoryStorage::new();
    (ConversationStore::load(storage.clone()), storage)
}

fn ids(store: &ConversationStore) -> Vec<String> {
    store.chats().iter().map(|chat| chat.id.clone()).collect()
}

/// Storage whose writes always fail.
struct BrokenStorage;

impl Storage for BrokenStorage {
    fn read(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    fn write(&mut self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::io().with_reason("disk full"))
    }

    fn remove(&mut self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::io())
    }
}

#[test]
fn test_create_names_and_activates() {
    let (mut store, storage) = new_store();
    assert!(store.chats().is_empty());
    assert_eq!(store.active_id(), None);

    store.create_chat();
    store.create_chat();
    let names: Vec<_> = store.chats().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["Chat 1", "Chat 2"]);

    let third = store.create_chat().clone();
    assert_eq!(third.name, "Chat 3");
    assert!(third.messages.is_empty());
    assert_eq!(store.active_id(), Some(third.id.as_str()));
    assert_mirrored(&store, &storage);
}

#[test]
fn test_chat_ids_are_unique() {
    let (mut store, _) = new_store();
    for _ in 0..50 {
        store.create_chat();
    }
    let mut ids = ids(&store);
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 50);
    assert!(ids.iter().all(|id| id.parse::<u64>().is_ok()));
}

#[test]
fn test_rename() {
    let (mut store, storage) = new_store();
    let id = store.create_chat().id.clone();

    assert!(!store.rename_chat(&id, "   \t"));
    assert_eq!(store.chat(&id).unwrap().name, "Chat 1");

    assert!(store.rename_chat(&id, "  Foo  "));
    assert_eq!(store.chat(&id).unwrap().name, "Foo");
    assert_eq!(store.active_chat().unwrap().name, "Foo");
    assert_mirrored(&store, &storage);

    assert!(!store.rename_chat("missing", "Bar"));
}

#[test]
fn test_delete_active_falls_back_to_last() {
    let (mut store, storage) = new_store();
    let a = store.create_chat().id.clone();
    let b = store.create_chat().id.clone();
    let c = store.create_chat().id.clone();

    store.set_active(&b);
    assert!(store.delete_chat(&b));
    assert_eq!(store.active_id(), Some(c.as_str()));
    assert_eq!(ids(&store), [a.clone(), c.clone()]);
    assert_mirrored(&store, &storage);

    assert!(store.delete_chat(&c));
    assert_eq!(store.active_id(), Some(a.as_str()));

    assert!(store.delete_chat(&a));
    assert_eq!(store.active_id(), None);
    // Deleting the last chat saves an empty list, unlike clearing.
    assert_eq!(persisted(&storage), Some(vec![]));
}

#[test]
fn test_delete_inactive_keeps_selection() {
    let (mut store, storage) = new_store();
    let a = store.create_chat().id.clone();
    let b = store.create_chat().id.clone();
    store.create_chat();

    store.set_active(&a);
    assert!(store.delete_chat(&b));
    assert_eq!(store.active_id(), Some(a.as_str()));
    assert_mirrored(&store, &storage);

    assert!(!store.delete_chat(&b));
}

#[test]
fn test_clear_all_removes_entry() {
    let (mut store, storage) = new_store();
    store.create_chat();
    store.create_chat();
    assert!(storage.get(STORAGE_KEY).is_some());

    store.clear_all();
    assert!(store.chats().is_empty());
    assert_eq!(store.active_id(), None);
    assert_eq!(storage.get(STORAGE_KEY), None);

    let reloaded = ConversationStore::load(storage.clone());
    assert!(reloaded.chats().is_empty());
    assert_eq!(reloaded.active_id(), None);
}

#[test]
fn test_set_active() {
    let (mut store, storage) = new_store();
    let a = store.create_chat().id.clone();
    store.create_chat();
    let before = storage.get(STORAGE_KEY);

    assert!(store.set_active(&a));
    assert_eq!(store.active_id(), Some(a.as_str()));
    assert!(!store.set_active("missing"));
    assert_eq!(store.active_id(), Some(a.as_str()));
    assert_eq!(storage.get(STORAGE_KEY), before);
}

#[test]
fn test_load_selects_last_chat() {
    let (mut store, storage) = new_store();
    store.create_chat();
    let last = store.create_chat().id.clone();
    let first = store.chats()[0].id.clone();
    store.set_active(&first);

    let reloaded = ConversationStore::load(storage.clone());
    assert_eq!(reloaded.chats(), store.chats());
    assert_eq!(reloaded.active_id(), Some(last.as_str()));
}

#[test]
fn test_load_malformed_data() {
    let storage = MemoryStorage::new();
    storage.insert(STORAGE_KEY, "{ not json");

    let mut store = ConversationStore::load(storage.clone());
    assert!(store.chats().is_empty());
    assert_eq!(store.active_id(), None);
    // Untouched until the next write.
    assert_eq!(storage.get(STORAGE_KEY).as_deref(), Some("{ not json"));

    store.create_chat();
    assert_mirrored(&store, &storage);
}

#[test]
fn test_load_from_foreign_data() {
    let storage = MemoryStorage::new();
    storage.insert(
        STORAGE_KEY,
        r#"[{"id":"1700000000000","name":"Old","messages":[
            {"id":0,"role":"user","content":"Hi"},
            {"id":2,"role":"assistant","content":"Hello!"}
        ]}]"#,
    );
    let mut store = ConversationStore::load(storage);
    let chat = store.active_chat().unwrap();
    assert_eq!(chat.name, "Old");
    assert_eq!(chat.messages[1].id, 2);

    // Freshly minted ids never collide with loaded ones.
    let id = store.create_chat().id.clone();
    assert_ne!(id, "1700000000000");
}

#[test]
fn test_submit_and_stream() {
    let (mut store, storage) = new_store();
    let chat_id = store.create_chat().id.clone();

    store.set_input("  Hi ");
    let submission = store.submit().unwrap();
    assert_eq!(store.input(), "");
    assert!(store.is_streaming());
    assert_eq!(submission.ticket.chat_id(), chat_id);
    assert_eq!(
        submission.history,
        [Message {
            id: 0,
            role: Role::User,
            content: "Hi".to_owned(),
        }]
    );
    assert_mirrored(&store, &storage);

    let mut seen = vec![];
    for fragment in ["Hel", "lo", "!"] {
        let msg = store.apply_fragment(&submission.ticket, fragment).unwrap();
        seen.push(msg.content.clone());
        assert_mirrored(&store, &storage);
    }
    assert_eq!(seen, ["Hel", "Hello", "Hello!"]);

    assert!(store.complete_stream(&submission.ticket));
    assert!(!store.is_streaming());

    let chat = store.active_chat().unwrap();
    assert_eq!(
        chat.messages,
        [
            Message {
                id: 0,
                role: Role::User,
                content: "Hi".to_owned(),
            },
            Message {
                id: 1,
                role: Role::Assistant,
                content: "Hello!".to_owned(),
            },
        ]
    );

    // The reply is frozen once the stream is over.
    assert!(store.apply_fragment(&submission.ticket, "?").is_none());
    assert!(!store.complete_stream(&submission.ticket));
    assert_eq!(store.active_chat().unwrap().messages[1].content, "Hello!");
}

#[test]
fn test_submit_rejections() {
    let (mut store, _) = new_store();

    // No active chat.
    store.set_input("Hi");
    assert!(store.submit().is_none());
    assert_eq!(store.input(), "Hi");

    let chat_id = store.create_chat().id.clone();

    // Blank input.
    store.set_input("   ");
    assert!(store.submit().is_none());
    assert!(store.chat(&chat_id).unwrap().messages.is_empty());

    // Already streaming.
    store.set_input("first");
    let first = store.submit().unwrap();
    store.set_input("second");
    assert!(store.submit().is_none());
    assert_eq!(store.chat(&chat_id).unwrap().messages.len(), 2);
    assert_eq!(store.input(), "second");

    store.complete_stream(&first.ticket);
    let second = store.submit().unwrap();
    assert_ne!(first.ticket, second.ticket);
    assert_eq!(second.history.len(), 3);
    assert_eq!(
        store.chat(&chat_id).unwrap().messages.iter().map(|m| m.id).collect::<Vec<_>>(),
        [0, 1, 2, 3]
    );
}

#[test]
fn test_stream_follows_its_chat_not_selection() {
    let (mut store, _) = new_store();
    let a = store.create_chat().id.clone();
    store.set_input("Hi");
    let submission = store.submit().unwrap();

    // Creating and selecting another chat mid-stream is allowed.
    let b = store.create_chat().id.clone();
    assert_eq!(store.active_id(), Some(b.as_str()));
    store.apply_fragment(&submission.ticket, "Hello").unwrap();

    assert_eq!(store.chat(&a).unwrap().messages[1].content, "Hello");
    assert!(store.chat(&b).unwrap().messages.is_empty());
}

#[test]
fn test_delete_streaming_chat_drops_fragments() {
    let (mut store, storage) = new_store();
    let a = store.create_chat().id.clone();
    let b = store.create_chat().id.clone();
    store.set_input("Hi");
    let submission = store.submit().unwrap();
    store.apply_fragment(&submission.ticket, "Hel").unwrap();

    store.delete_chat(&b);
    assert!(!store.is_streaming());
    assert!(store.apply_fragment(&submission.ticket, "lo").is_none());
    assert!(!store.complete_stream(&submission.ticket));
    assert!(store.chat(&b).is_none());
    assert_eq!(ids(&store), [a]);
    assert_mirrored(&store, &storage);

    // The slot is free again.
    store.set_input("Again");
    assert!(store.submit().is_some());
}

#[test]
fn test_clear_all_abandons_stream() {
    let (mut store, storage) = new_store();
    store.create_chat();
    store.set_input("Hi");
    let submission = store.submit().unwrap();

    store.clear_all();
    assert!(!store.is_streaming());
    assert!(store.apply_fragment(&submission.ticket, "late").is_none());
    assert_eq!(storage.get(STORAGE_KEY), None);
}

#[test]
fn test_write_failures_are_tolerated() {
    let mut store = ConversationStore::load(BrokenStorage);
    let id = store.create_chat().id.clone();
    assert!(store.rename_chat(&id, "Still works"));
    store.set_input("Hi");
    assert!(store.submit().is_some());
    store.clear_all();
    assert!(store.chats().is_empty());
}

#[test]
fn test_fail_stream_drops_empty_reply() {
    let (mut store, storage) = new_store();
    let chat_id = store.create_chat().id.clone();
    store.set_input("Hi");
    let submission = store.submit().unwrap();

    assert!(store.fail_stream(&submission.ticket));
    assert!(!store.is_streaming());
    assert_eq!(
        store.chat(&chat_id).unwrap().messages,
        [Message {
            id: 0,
            role: Role::User,
            content: "Hi".to_owned(),
        }]
    );
    assert_mirrored(&store, &storage);

    // Stale tickets change nothing.
    assert!(!store.fail_stream(&submission.ticket));
    assert_eq!(store.chat(&chat_id).unwrap().messages.len(), 1);
}

#[test]
fn test_fail_stream_keeps_partial_reply() {
    let (mut store, storage) = new_store();
    store.create_chat();
    store.set_input("Hi");
    let submission = store.submit().unwrap();
    store.apply_fragment(&submission.ticket, "Hel").unwrap();

    assert!(store.fail_stream(&submission.ticket));
    let chat = store.active_chat().unwrap();
    assert_eq!(chat.messages.len(), 2);
    assert_eq!(chat.messages[1].content, "Hel");
    assert_mirrored(&store, &storage);
}

#[test]
fn test_file_storage_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = ConversationStore::load(FileStorage::new(dir.path()));
    assert!(store.chats().is_empty());

    let id = store.create_chat().id.clone();
    store.rename_chat(&id, "Saved");
    store.set_input("Hi");
    let submission = store.submit().unwrap();
    store.apply_fragment(&submission.ticket, "Hello").unwrap();
    store.complete_stream(&submission.ticket);
    store.create_chat();

    let saved = FileStorage::new(dir.path()).read(STORAGE_KEY).unwrap().unwrap();
    let saved: Vec<Chat> = serde_json::from_str(&saved).unwrap();
    assert_eq!(saved, store.chats());

    let reloaded = ConversationStore::load(FileStorage::new(dir.path()));
    assert_eq!(reloaded.chats(), store.chats());
    assert_eq!(reloaded.chat(&id).unwrap().messages[1].content, "Hello");
    assert_eq!(reloaded.active_id(), store.chats().last().map(|c| c.id.as_str()));

    store.clear_all();
    assert!(!dir.path().join("chats.json").exists());
    let reloaded = ConversationStore::load(FileStorage::new(dir.path()));
    assert!(reloaded.chats().is_empty());
    assert_eq!(reloaded.active_id(), None);
}
