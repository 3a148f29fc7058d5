// Absence from a batch is never a removal.

use rust_decimal::Decimal;

use crate::events::EngineEvent;
use crate::snapshot::SnapshotStore;
use crate::types::{Chat, ChatMessage, Order};

pub fn diff_balance(store: &mut SnapshotStore, new: Decimal) -> Option<EngineEvent> {
    let old = std::mem::replace(&mut store.balance, new);
    (!old.is_zero() && old != new).then_some(EngineEvent::BalanceChanged { old, new })
}

pub fn diff_orders(store: &mut SnapshotStore, batch: Vec<Order>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    for order in batch {
        match store.orders.put(order.clone()) {
            None => events.push(EngineEvent::NewOrder { order }),
            Some(prev) if prev.status != order.status => {
                events.push(EngineEvent::OrderStatusChanged {
                    old: prev.status,
                    new: order.status.clone(),
                    order,
                });
            }
            // price/quantity drift without a status change is absorbed silently
            Some(_) => {}
        }
    }
    events
}

/// Chats from `batch` whose thread needs fetching: unknown ones, and known
/// ones whose latest message or activity stamp moved.
pub fn changed_chats(store: &SnapshotStore, batch: &[Chat]) -> Vec<Chat> {
    batch
        .iter()
        .filter(|c| match store.chats.get(&c.id) {
            None => true,
            Some(prev) => prev.last_message_id != c.last_message_id || prev.last_activity != c.last_activity,
        })
        .cloned()
        .collect()
}

/// Applies one freshly fetched thread.
///
/// A message is reported when its id is unseen and newer than the marker the
/// store held for the chat. Older unseen ids are recorded without an event,
/// which keeps pre-existing history quiet the first time a thread is read.
/// A known chat that never carried a marker reports nothing on that read.
///
/// Seen ids at or below the chat's new marker are dropped afterwards: the
/// marker alone keeps them quiet from then on.
pub fn apply_thread(store: &mut SnapshotStore, chat: Chat, messages: Vec<ChatMessage>) -> Vec<EngineEvent> {
    let marker = store
        .chats
        .get(&chat.id)
        .map(|prev| prev.last_message_id.unwrap_or(u64::MAX));
    let mut ids = Vec::with_capacity(messages.len());
    let mut events = Vec::new();
    for message in messages {
        ids.push(message.id);
        if !store.seen_messages.insert(message.id) {
            continue;
        }
        if marker.map_or(true, |m| message.id > m) {
            events.push(EngineEvent::NewMessage { message });
        }
    }
    if let Some(m) = chat.last_message_id {
        for id in ids.into_iter().filter(|id| *id <= m) {
            store.seen_messages.remove(&id);
        }
    }
    store.chats.put(chat);
    events
}

/// Bootstrap writes: seed without comparing, no events.
pub fn seed_balance(store: &mut SnapshotStore, balance: Decimal) {
    store.balance = balance;
}

pub fn seed_orders(store: &mut SnapshotStore, batch: Vec<Order>) {
    for order in batch {
        store.orders.put(order);
    }
}

pub fn seed_chats(store: &mut SnapshotStore, batch: Vec<Chat>) {
    for chat in batch {
        store.chats.put(chat);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Profile;
    use rust_decimal_macros::dec;

    fn buyer() -> Profile {
        Profile {
            id: 9,
            name: "buyer".into(),
            avatar: None,
            reputation: None,
            url: "/users/9/".into(),
        }
    }

    fn order(id: &str, status: &str) -> Order {
        Order {
            id: id.into(),
            created_at: "now".into(),
            buyer: buyer(),
            status: status.into(),
            price: dec!(10),
            quantity: 1,
            description: String::new(),
        }
    }

    fn chat(id: u64, last: Option<u64>, at: &str) -> Chat {
        Chat {
            id,
            author: None,
            last_activity: at.into(),
            last_message_id: last,
        }
    }

    fn msg(id: u64, chat_id: u64) -> ChatMessage {
        ChatMessage {
            id,
            chat_id,
            author: None,
            text: format!("m{}", id),
            timestamp: String::new(),
        }
    }

    fn seeded() -> SnapshotStore {
        let mut s = SnapshotStore::new();
        seed_orders(&mut s, vec![order("1", "new")]);
        seed_balance(&mut s, dec!(100));
        s
    }

    #[test]
    fn test_bootstrap_seed_emits_nothing_and_fills_store() {
        let s = seeded();
        assert_eq!(s.balance, dec!(100));
        assert_eq!(s.orders.get(&"1".to_string()).unwrap().status, "new");
    }

    #[test]
    fn test_status_change_then_new_order() {
        let mut s = seeded();

        let ev = diff_orders(&mut s, vec![order("1", "paid")]);
        assert_eq!(ev.len(), 1);
        match &ev[0] {
            EngineEvent::OrderStatusChanged { old, new, order } => {
                assert_eq!(old, "new");
                assert_eq!(new, "paid");
                assert_eq!(order.id, "1");
            }
            other => panic!("unexpected {:?}", other),
        }

        let ev = diff_orders(&mut s, vec![order("1", "paid"), order("2", "new")]);
        assert_eq!(ev.len(), 1);
        assert!(matches!(&ev[0], EngineEvent::NewOrder { order } if order.id == "2"));
    }

    #[test]
    fn test_new_order_fires_once() {
        let mut s = SnapshotStore::new();
        let mut fired = 0;
        for _ in 0..3 {
            fired += diff_orders(&mut s, vec![order("7", "new")])
                .iter()
                .filter(|e| matches!(e, EngineEvent::NewOrder { .. }))
                .count();
        }
        assert_eq!(fired, 1);
    }

    #[test]
    fn test_absent_order_is_kept_and_silent() {
        let mut s = seeded();
        assert!(diff_orders(&mut s, vec![]).is_empty());
        assert!(diff_orders(&mut s, vec![order("2", "new")]).len() == 1);
        assert!(s.orders.get(&"1".to_string()).is_some());
    }

    #[test]
    fn test_price_change_is_silent_but_stored() {
        let mut s = seeded();
        let mut repriced = order("1", "new");
        repriced.price = dec!(12.5);
        assert!(diff_orders(&mut s, vec![repriced]).is_empty());
        assert_eq!(s.orders.get(&"1".to_string()).unwrap().price, dec!(12.5));
    }

    #[test]
    fn test_balance_sentinel_suppresses_first_real_read() {
        let mut s = SnapshotStore::new();
        assert!(diff_balance(&mut s, dec!(50)).is_none());
        assert_eq!(s.balance, dec!(50));

        assert!(diff_balance(&mut s, dec!(50)).is_none());
        assert_eq!(
            diff_balance(&mut s, dec!(75)),
            Some(EngineEvent::BalanceChanged { old: dec!(50), new: dec!(75) })
        );
    }

    #[test]
    fn test_balance_back_to_zero_rearms_sentinel() {
        let mut s = SnapshotStore::new();
        seed_balance(&mut s, dec!(20));
        assert!(diff_balance(&mut s, Decimal::ZERO).is_some());
        assert_eq!(s.balance, Decimal::ZERO);
        assert!(diff_balance(&mut s, dec!(30)).is_none());
    }

    #[test]
    fn test_changed_chats() {
        let mut s = SnapshotStore::new();
        seed_chats(&mut s, vec![chat(1, Some(10), "12:00"), chat(2, Some(20), "12:00")]);

        let batch = vec![
            chat(1, Some(10), "12:00"),
            chat(2, Some(21), "12:05"),
            chat(3, Some(30), "12:06"),
        ];
        let ids: Vec<u64> = changed_chats(&s, &batch).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_thread_reports_only_messages_past_marker() {
        let mut s = SnapshotStore::new();
        seed_chats(&mut s, vec![chat(1, Some(10), "12:00")]);

        let ev = apply_thread(&mut s, chat(1, Some(12), "12:01"), vec![msg(9, 1), msg(10, 1), msg(11, 1), msg(12, 1)]);
        let ids: Vec<u64> = ev
            .iter()
            .filter_map(|e| match e {
                EngineEvent::NewMessage { message } => Some(message.id),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec![11, 12]);
        assert_eq!(s.chats.get(&1).unwrap().last_message_id, Some(12));

        // a refetch of the same thread is silent
        let again = apply_thread(&mut s, chat(1, Some(12), "12:02"), vec![msg(11, 1), msg(12, 1)]);
        assert!(again.is_empty());
    }

    #[test]
    fn test_thread_of_unknown_chat_reports_everything() {
        let mut s = SnapshotStore::new();
        let ev = apply_thread(&mut s, chat(5, Some(2), "now"), vec![msg(1, 5), msg(2, 5)]);
        assert_eq!(ev.len(), 2);
        assert!(apply_thread(&mut s, chat(5, Some(2), "later"), vec![msg(1, 5), msg(2, 5)]).is_empty());
    }

    #[test]
    fn test_known_chat_without_marker_keeps_history_quiet() {
        let mut s = SnapshotStore::new();
        seed_chats(&mut s, vec![chat(1, None, "12:00")]);

        let ev = apply_thread(&mut s, chat(1, Some(4), "12:01"), vec![msg(3, 1), msg(4, 1)]);
        assert!(ev.is_empty());
        assert_eq!(s.chats.get(&1).unwrap().last_message_id, Some(4));

        let ev = apply_thread(&mut s, chat(1, Some(5), "12:02"), vec![msg(4, 1), msg(5, 1)]);
        assert_eq!(ev.len(), 1);
        assert!(matches!(&ev[0], EngineEvent::NewMessage { message } if message.id == 5));
    }

    #[test]
    fn test_seen_ids_are_pruned_up_to_marker() {
        let mut s = SnapshotStore::new();
        seed_chats(&mut s, vec![chat(1, Some(10), "12:00")]);

        // the list lags behind the thread: 12 stays tracked until the marker catches up
        let ev = apply_thread(&mut s, chat(1, Some(11), "12:01"), vec![msg(10, 1), msg(11, 1), msg(12, 1)]);
        assert_eq!(ev.len(), 2);
        assert_eq!(s.seen_messages.iter().copied().collect::<Vec<_>>(), vec![12]);

        let ev = apply_thread(&mut s, chat(1, Some(12), "12:02"), vec![msg(11, 1), msg(12, 1)]);
        assert!(ev.is_empty());
        assert!(s.seen_messages.is_empty());
    }
}
