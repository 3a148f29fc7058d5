// List pages are cut into item blocks at a marker tag (`tc-item`,
// `contact-item`, `chat-msg-item`) and each block is read on its own.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

use super::Extractor;
use crate::source::{RawDocument, Resource};
use crate::types::{Chat, ChatMessage, Order, Profile, Record, RecordKind};

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static regex")
}

static ORDER_ITEM: LazyLock<Regex> = LazyLock::new(|| re(r#"<a[^>]*class="tc-item[^"]*"[^>]*>"#));
static ORDER_ID: LazyLock<Regex> = LazyLock::new(|| re(r#"(?s)class="tc-order"[^>]*>\s*#?([A-Za-z0-9]+)\s*<"#));
static ORDER_DATE: LazyLock<Regex> = LazyLock::new(|| re(r#"(?s)class="tc-date-time"[^>]*>(.*?)</div>"#));
static ORDER_DESC: LazyLock<Regex> = LazyLock::new(|| re(r#"(?s)class="order-desc"[^>]*>(.*?)</div>"#));
static ORDER_STATUS: LazyLock<Regex> = LazyLock::new(|| re(r#"(?s)class="tc-status[^"]*"[^>]*>(.*?)</div>"#));
static ORDER_PRICE: LazyLock<Regex> = LazyLock::new(|| re(r#"(?s)class="tc-price[^"]*"[^>]*>(.*?)</div>"#));
static ORDER_AMOUNT: LazyLock<Regex> = LazyLock::new(|| re(r#"(?s)class="tc-amount[^"]*"[^>]*>(.*?)</div>"#));

static CHAT_ITEM: LazyLock<Regex> = LazyLock::new(|| re(r#"<a[^>]*class="contact-item[^"]*"[^>]*>"#));
static CHAT_TIME: LazyLock<Regex> = LazyLock::new(|| re(r#"(?s)class="contact-item-time"[^>]*>(.*?)</div>"#));
static DATA_ID: LazyLock<Regex> = LazyLock::new(|| re(r#"data-id="(\d+)""#));
static DATA_NODE_MSG: LazyLock<Regex> = LazyLock::new(|| re(r#"data-node-msg="(\d+)""#));
static DATA_USER: LazyLock<Regex> = LazyLock::new(|| re(r#"data-user="(\d+)""#));

static MSG_ITEM: LazyLock<Regex> = LazyLock::new(|| re(r#"<div[^>]*class="chat-msg-item[^"]*"[^>]*>"#));
static MSG_ID: LazyLock<Regex> = LazyLock::new(|| re(r#"id="message-(\d+)""#));
static MSG_AUTHOR: LazyLock<Regex> = LazyLock::new(|| re(r#"(?s)(<a[^>]*class="chat-msg-author-link"[^>]*>)(.*?)</a>"#));
static MSG_DATE: LazyLock<Regex> = LazyLock::new(|| re(r#"(?s)class="chat-msg-date"[^>]*>(.*?)</div>"#));
static MSG_TEXT: LazyLock<Regex> = LazyLock::new(|| re(r#"(?s)class="chat-msg-text"[^>]*>(.*?)</div>"#));

static BALANCE: LazyLock<Regex> = LazyLock::new(|| re(r#"(?s)class="balances-value"[^>]*>(.*?)</"#));

static USER_NAME: LazyLock<Regex> = LazyLock::new(|| re(r#"(?s)class="media-user-name"[^>]*>(.*?)</div>"#));
static USER_HREF: LazyLock<Regex> = LazyLock::new(|| re(r#"(?:href|data-href)="([^"]*/users/(\d+)/?)""#));
static AVATAR: LazyLock<Regex> = LazyLock::new(|| re(r#"class="avatar-photo"[^>]*url\(([^)]+)\)"#));
static RATING: LazyLock<Regex> = LazyLock::new(|| re(r#"data-rating="([0-9]+(?:\.[0-9]+)?)""#));
static TAG: LazyLock<Regex> = LazyLock::new(|| re(r"<[^>]*>"));

#[derive(Debug, Clone, Default)]
pub struct HtmlExtractor;

impl HtmlExtractor {
    pub fn new() -> Self {
        Self
    }

    fn orders(&self, body: &str) -> Vec<Record> {
        blocks(body, &ORDER_ITEM)
            .into_iter()
            .filter_map(|b| match parse_order(b) {
                Ok(o) => Some(Record::Order(o)),
                Err(reason) => {
                    tracing::debug!(reason, "skipping order block");
                    None
                }
            })
            .collect()
    }

    fn chats(&self, body: &str) -> Vec<Record> {
        blocks(body, &CHAT_ITEM)
            .into_iter()
            .filter_map(|b| match parse_chat(b) {
                Ok(c) => Some(Record::Chat(c)),
                Err(reason) => {
                    tracing::debug!(reason, "skipping chat block");
                    None
                }
            })
            .collect()
    }

    fn messages(&self, doc: &RawDocument) -> Vec<Record> {
        let chat_id = match doc.resource {
            Resource::ChatThread(id) => id,
            other => {
                tracing::debug!(resource = %other, "messages requested from a non-thread document");
                return vec![];
            }
        };
        blocks(&doc.body, &MSG_ITEM)
            .into_iter()
            .filter_map(|b| match parse_message(chat_id, b) {
                Ok(m) => Some(Record::ChatMessage(m)),
                Err(reason) => {
                    tracing::debug!(chat_id, reason, "skipping message block");
                    None
                }
            })
            .collect()
    }

    fn balance(&self, body: &str) -> Vec<Record> {
        capture(&BALANCE, body)
            .and_then(|raw| parse_money(&text_of(raw)))
            .map(Record::Balance)
            .into_iter()
            .collect()
    }

    fn profiles(&self, body: &str) -> Vec<Record> {
        let mut seen = HashSet::new();
        USER_NAME
            .captures_iter(body)
            .filter_map(|c| c.get(1))
            .filter_map(|m| profile_from(m.as_str(), body_avatar(m.as_str()), None))
            .filter(|p| seen.insert(p.id))
            .map(Record::Profile)
            .collect()
    }
}

impl Extractor for HtmlExtractor {
    fn extract(&self, doc: &RawDocument, kind: RecordKind) -> Vec<Record> {
        match kind {
            RecordKind::Order => self.orders(&doc.body),
            RecordKind::Chat => self.chats(&doc.body),
            RecordKind::ChatMessage => self.messages(doc),
            RecordKind::Balance => self.balance(&doc.body),
            RecordKind::Profile => self.profiles(&doc.body),
        }
    }
}

fn parse_order(block: &str) -> Result<Order, &'static str> {
    let id = capture(&ORDER_ID, block).ok_or("missing order id")?.to_string();
    let status = capture(&ORDER_STATUS, block)
        .map(text_of)
        .filter(|s| !s.is_empty())
        .ok_or("missing status")?;
    let buyer = buyer_of(block).ok_or("missing buyer")?;
    let price = capture(&ORDER_PRICE, block)
        .and_then(|raw| parse_money(&text_of(raw)))
        .ok_or("missing price")?;
    let quantity = capture(&ORDER_AMOUNT, block)
        .and_then(|raw| text_of(raw).split_whitespace().next()?.parse::<u32>().ok())
        .filter(|q| *q > 0)
        .unwrap_or(1);

    Ok(Order {
        id,
        created_at: capture(&ORDER_DATE, block).map(text_of).unwrap_or_default(),
        buyer,
        status,
        price,
        quantity,
        description: capture(&ORDER_DESC, block).map(text_of).unwrap_or_default(),
    })
}

fn buyer_of(block: &str) -> Option<Profile> {
    let inner = capture(&USER_NAME, block)?;
    profile_from(inner, body_avatar(block), capture(&RATING, block).and_then(|r| r.parse().ok()))
}

fn parse_chat(block: &str) -> Result<Chat, &'static str> {
    let tag = CHAT_ITEM.find(block).map(|m| m.as_str()).ok_or("missing chat tag")?;
    let id = capture(&DATA_ID, tag)
        .and_then(|v| v.parse::<u64>().ok())
        .ok_or("missing chat id")?;
    let last_message_id = capture(&DATA_NODE_MSG, tag).and_then(|v| v.parse::<u64>().ok());

    let author = match (
        capture(&DATA_USER, tag).and_then(|v| v.parse::<u64>().ok()),
        capture(&USER_NAME, block).map(text_of).filter(|n| !n.is_empty()),
    ) {
        (Some(user_id), Some(name)) => Some(Profile {
            id: user_id,
            name,
            avatar: body_avatar(block),
            reputation: None,
            url: format!("/users/{}/", user_id),
        }),
        _ => None,
    };

    Ok(Chat {
        id,
        author,
        last_activity: capture(&CHAT_TIME, block).map(text_of).unwrap_or_default(),
        last_message_id,
    })
}

fn parse_message(chat_id: u64, block: &str) -> Result<ChatMessage, &'static str> {
    let tag = MSG_ITEM.find(block).map(|m| m.as_str()).ok_or("missing message tag")?;
    let id = capture(&MSG_ID, tag)
        .and_then(|v| v.parse::<u64>().ok())
        .ok_or("missing message id")?;

    let author = MSG_AUTHOR.captures(block).and_then(|c| {
        let link = c.get(1)?.as_str();
        let name = c.get(2)?.as_str();
        let (url, user_id) = user_link(link)?;
        Some(Profile {
            id: user_id,
            name: text_of(name),
            avatar: body_avatar(block),
            reputation: None,
            url,
        })
    });

    Ok(ChatMessage {
        id,
        chat_id,
        author,
        text: capture(&MSG_TEXT, block).map(text_of).unwrap_or_default(),
        timestamp: capture(&MSG_DATE, block).map(text_of).unwrap_or_default(),
    })
}

fn profile_from(fragment: &str, avatar: Option<String>, reputation: Option<f32>) -> Option<Profile> {
    let (url, id) = user_link(fragment)?;
    let name = text_of(fragment);
    if name.is_empty() {
        return None;
    }
    Some(Profile { id, name, avatar, reputation, url })
}

fn user_link(fragment: &str) -> Option<(String, u64)> {
    let c = USER_HREF.captures(fragment)?;
    let url = c.get(1)?.as_str().to_string();
    let id = c.get(2)?.as_str().parse().ok()?;
    Some((url, id))
}

fn body_avatar(fragment: &str) -> Option<String> {
    capture(&AVATAR, fragment).map(|u| u.trim_matches(|c| c == '\'' || c == '"').to_string())
}

fn blocks<'a>(body: &'a str, marker: &Regex) -> Vec<&'a str> {
    let starts: Vec<usize> = marker.find_iter(body).map(|m| m.start()).collect();
    starts
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let end = starts.get(i + 1).copied().unwrap_or(body.len());
            &body[s..end]
        })
        .collect()
}

fn capture<'a>(re: &Regex, hay: &'a str) -> Option<&'a str> {
    re.captures(hay).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Visible text of a markup fragment, whitespace collapsed.
fn text_of(fragment: &str) -> String {
    let stripped = TAG.replace_all(fragment, " ");
    let decoded = stripped
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&amp;", "&");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// "1 234,50 ₽" -> 1234.50. The last `.` or `,` is the decimal point unless
/// it repeats, in which case it only groups digits. Negative or digit-less
/// input yields `None`.
fn parse_money(text: &str) -> Option<Decimal> {
    if text.contains('-') {
        return None;
    }
    let kept: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    if !kept.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    let point = kept
        .rfind(|c| c == '.' || c == ',')
        .filter(|&i| kept.matches(&kept[i..=i]).count() == 1);
    let normalized: String = kept
        .char_indices()
        .filter_map(|(i, c)| match c {
            '.' | ',' if Some(i) == point => Some('.'),
            '.' | ',' => None,
            _ => Some(c),
        })
        .collect();
    normalized.parse::<Decimal>().ok()
}
