//! In-process [`UserStore`].
//!
//! Wraps a `HashMap` behind `Arc<Mutex<..>>` so clones share one table across
//! tool calls. Each record carries an insertion sequence number so `list`
//! returns users oldest first; replacing a record keeps its position.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{User, UserStore};

struct Entry {
    seq: u64,
    user: User,
}

#[derive(Default)]
struct Table {
    next_seq: u64,
    entries: HashMap<String, Entry>,
}

#[derive(Clone, Default)]
pub struct InMemoryUserStore {
    table: Arc<Mutex<Table>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Every mutation is a single map operation; a poisoned table is still consistent.
    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl UserStore for InMemoryUserStore {
    fn get(&self, id: &str) -> Option<User> {
        self.lock().entries.get(id).map(|e| e.user.clone())
    }

    fn put(&self, user: User) {
        let mut table = self.lock();
        if let Some(entry) = table.entries.get_mut(&user.id) {
            entry.user = user;
            return;
        }
        let seq = table.next_seq;
        table.next_seq += 1;
        table.entries.insert(user.id.clone(), Entry { seq, user });
    }

    fn modify(&self, id: &str, change: &mut dyn FnMut(&mut User)) -> Option<User> {
        let mut table = self.lock();
        let entry = table.entries.get_mut(id)?;
        change(&mut entry.user);
        Some(entry.user.clone())
    }

    fn delete(&self, id: &str) -> Option<User> {
        self.lock().entries.remove(id).map(|e| e.user)
    }

    fn list(&self) -> Vec<User> {
        let table = self.lock();
        let mut entries: Vec<&Entry> = table.entries.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries.into_iter().map(|e| e.user.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, name: &str) -> User {
        User {
            id: id.to_string(),
            name: name.to_string(),
            email: format!("{name}@example.com"),
            role: "user".to_string(),
        }
    }

    #[test]
    fn put_then_get() {
        let store = InMemoryUserStore::new();
        store.put(user("u1", "ada"));
        assert_eq!(store.get("u1").unwrap().name, "ada");
        assert!(store.get("u2").is_none());
    }

    #[test]
    fn list_is_insertion_ordered() {
        let store = InMemoryUserStore::new();
        for (id, name) in [("z", "zed"), ("a", "amy"), ("m", "max")] {
            store.put(user(id, name));
        }
        let ids: Vec<String> = store.list().into_iter().map(|u| u.id).collect();
        assert_eq!(ids, vec!["z", "a", "m"]);
    }

    #[test]
    fn replacing_keeps_position() {
        let store = InMemoryUserStore::new();
        store.put(user("first", "a"));
        store.put(user("second", "b"));
        store.put(user("first", "renamed"));

        let listed = store.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, "first");
        assert_eq!(listed[0].name, "renamed");
    }

    #[test]
    fn modify_changes_existing_record_in_place() {
        let store = InMemoryUserStore::new();
        store.put(user("u1", "ada"));
        store.put(user("u2", "bob"));

        let changed = store.modify("u1", &mut |u: &mut User| u.role = "admin".to_string());

        assert_eq!(changed.unwrap().role, "admin");
        let listed = store.list();
        assert_eq!(listed[0].id, "u1");
        assert_eq!(listed[0].role, "admin");
    }

    #[test]
    fn modify_missing_record_inserts_nothing() {
        let store = InMemoryUserStore::new();
        let mut called = false;

        assert!(store.modify("gone", &mut |_: &mut User| called = true).is_none());
        assert!(!called);
        assert!(store.is_empty());
    }

    #[test]
    fn delete_returns_removed() {
        let store = InMemoryUserStore::new();
        store.put(user("u1", "ada"));
        assert_eq!(store.delete("u1").unwrap().id, "u1");
        assert!(store.delete("u1").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn clones_share_state() {
        let store = InMemoryUserStore::new();
        let other = store.clone();
        store.put(user("u1", "ada"));
        assert_eq!(other.len(), 1);
    }
}
