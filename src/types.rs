use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A marketplace user as rendered next to an order or a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub reputation: Option<f32>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    /// Opaque, as rendered by the site.
    pub created_at: String,
    pub buyer: Profile,
    /// Site-defined status token. Not a closed set.
    pub status: String,
    pub price: Decimal,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub description: String,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: u64,
    /// `None` for system/unknown counterparts.
    #[serde(default)]
    pub author: Option<Profile>,
    pub last_activity: String,
    /// Id of the newest message shown in the chat list.
    #[serde(default)]
    pub last_message_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub chat_id: u64,
    #[serde(default)]
    pub author: Option<Profile>,
    #[serde(default)]
    pub text: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Profile,
    Order,
    Chat,
    ChatMessage,
    Balance,
}

/// One structured item pulled out of a raw document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum Record {
    Profile(Profile),
    Order(Order),
    Chat(Chat),
    ChatMessage(ChatMessage),
    Balance(Decimal),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Profile(_) => RecordKind::Profile,
            Record::Order(_) => RecordKind::Order,
            Record::Chat(_) => RecordKind::Chat,
            Record::ChatMessage(_) => RecordKind::ChatMessage,
            Record::Balance(_) => RecordKind::Balance,
        }
    }

    pub fn into_order(self) -> Option<Order> {
        match self {
            Record::Order(o) => Some(o),
            _ => None,
        }
    }

    pub fn into_chat(self) -> Option<Chat> {
        match self {
            Record::Chat(c) => Some(c),
            _ => None,
        }
    }

    pub fn into_message(self) -> Option<ChatMessage> {
        match self {
            Record::ChatMessage(m) => Some(m),
            _ => None,
        }
    }

    pub fn into_balance(self) -> Option<Decimal> {
        match self {
            Record::Balance(b) => Some(b),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_record_kind_and_accessors() {
        let r = Record::Balance(dec!(12.5));
        assert_eq!(r.kind(), RecordKind::Balance);
        assert_eq!(r.clone().into_balance(), Some(dec!(12.5)));
        assert!(r.into_order().is_none());
    }

    #[test]
    fn test_order_quantity_defaults_to_one() {
        let o: Order = serde_json::from_value(serde_json::json!({
            "id": "A1",
            "created_at": "today",
            "buyer": { "id": 7, "name": "bob", "url": "/users/7/" },
            "status": "paid",
            "price": "3.50"
        }))
        .unwrap();
        assert_eq!(o.quantity, 1);
        assert_eq!(o.price, dec!(3.50));
    }
}
