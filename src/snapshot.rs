use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use rust_decimal::Decimal;

use crate::types::{Chat, Order};

/// A record with a stable identity.
pub trait Keyed {
    type Key: Clone + Eq + Hash + std::fmt::Debug;

    fn key(&self) -> Self::Key;
}

impl Keyed for Order {
    type Key = String;

    fn key(&self) -> String {
        self.id.clone()
    }
}

impl Keyed for Chat {
    type Key = u64;

    fn key(&self) -> u64 {
        self.id
    }
}

#[derive(Debug, Clone)]
pub struct Collection<T: Keyed> {
    items: HashMap<T::Key, T>,
}

impl<T: Keyed> Default for Collection<T> {
    fn default() -> Self {
        Self { items: HashMap::new() }
    }
}

impl<T: Keyed + Clone> Collection<T> {
    pub fn get(&self, key: &T::Key) -> Option<&T> {
        self.items.get(key)
    }

    /// Overwrites, returning the previous value.
    pub fn put(&mut self, record: T) -> Option<T> {
        self.items.insert(record.key(), record)
    }

    pub fn keys(&self) -> HashSet<T::Key> {
        self.items.keys().cloned().collect()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    pub orders: Collection<Order>,
    pub chats: Collection<Chat>,
    /// Handled message ids not yet covered by their chat's marker.
    pub seen_messages: HashSet<u64>,
    /// Zero until a real balance has been read.
    pub balance: Decimal,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn orders_sorted(&self) -> Vec<Order> {
        let mut out: Vec<Order> = self.orders.values().cloned().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    pub fn chats_sorted(&self) -> Vec<Chat> {
        let mut out: Vec<Chat> = self.chats.values().cloned().collect();
        out.sort_by_key(|c| c.id);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Profile;
    use rust_decimal_macros::dec;

    fn order(id: &str, status: &str) -> Order {
        Order {
            id: id.to_string(),
            created_at: String::new(),
            buyer: Profile {
                id: 1,
                name: "b".into(),
                avatar: None,
                reputation: None,
                url: "/users/1/".into(),
            },
            status: status.to_string(),
            price: dec!(1),
            quantity: 1,
            description: String::new(),
        }
    }

    #[test]
    fn test_put_overwrites_and_returns_previous() {
        let mut c: Collection<Order> = Collection::default();
        assert!(c.put(order("1", "new")).is_none());
        let prev = c.put(order("1", "paid")).unwrap();
        assert_eq!(prev.status, "new");
        assert_eq!(c.get(&"1".to_string()).unwrap().status, "paid");
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_keys() {
        let mut c: Collection<Order> = Collection::default();
        c.put(order("b", "x"));
        c.put(order("a", "x"));
        let keys = c.keys();
        assert!(keys.contains("a") && keys.contains("b"));
    }

    #[test]
    fn test_new_store_is_empty_with_zero_balance() {
        let s = SnapshotStore::new();
        assert!(s.orders.is_empty());
        assert!(s.chats.is_empty());
        assert_eq!(s.balance, Decimal::ZERO);
    }

    #[test]
    fn test_orders_sorted() {
        let mut s = SnapshotStore::new();
        s.orders.put(order("2", "x"));
        s.orders.put(order("1", "x"));
        let ids: Vec<String> = s.orders_sorted().into_iter().map(|o| o.id).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }
}
