//! Chat platform events consumed by the atlas.
//!
//! Events arrive as JSON, either bare or wrapped in an `{"event": ...}`
//! envelope. Platform timestamps are decimal strings such as
//! `"1700000000.000100"`.

use serde::Deserialize;
use crate::{Error, Result};
use crate::model::SentimentScores;

/// An event the atlas knows how to record
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlatformEvent {
    ReactionAdded(ReactionEvent),
    ReactionRemoved(ReactionEvent),
    EmojiChanged(EmojiChangedEvent),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Incoming {
    Wrapped { event: PlatformEvent },
    Bare(PlatformEvent),
}

impl PlatformEvent {
    /// Parse one event, accepting either the bare event or its envelope
    pub fn from_json(input: &str) -> Result<Self> {
        let incoming: Incoming = serde_json::from_str(input)
            .map_err(|e| Error::Event(format!("unrecognised event: {}", e)))?;
        Ok(match incoming {
            Incoming::Wrapped { event } => event,
            Incoming::Bare(event) => event,
        })
    }
}

/// `reaction_added` / `reaction_removed`
#[derive(Debug, Clone, Deserialize)]
pub struct ReactionEvent {
    /// Emoji name without colons
    pub reaction: String,
    /// Platform id of the reacting user
    pub user: String,
    pub event_ts: String,
    pub item: ReactionItem,
    /// The reacted-to message, when the producer already resolved it
    #[serde(default)]
    pub message: Option<InlineMessage>,
}

impl ReactionEvent {
    pub fn timestamp(&self) -> Result<f64> {
        parse_ts(&self.event_ts)
    }
}

/// What a reaction was attached to
#[derive(Debug, Clone, Deserialize)]
pub struct ReactionItem {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
}

impl ReactionItem {
    /// Channel and timestamp when the item is a message
    pub fn message_ref(&self) -> Option<(&str, &str)> {
        if self.kind != "message" {
            return None;
        }
        Some((self.channel.as_deref()?, self.ts.as_deref()?))
    }
}

/// A message as returned by the platform's history lookup
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlatformMessage {
    /// Platform id of the author
    pub user: String,
    pub text: String,
    pub ts: String,
}

/// A message embedded in an offline event, optionally carrying its score
#[derive(Debug, Clone, Deserialize)]
pub struct InlineMessage {
    #[serde(flatten)]
    pub message: PlatformMessage,
    #[serde(default)]
    pub sentiment: Option<SentimentScores>,
}

/// `emoji_changed`
#[derive(Debug, Clone, Deserialize)]
pub struct EmojiChangedEvent {
    pub subtype: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub old_name: Option<String>,
    #[serde(default)]
    pub new_name: Option<String>,
    #[serde(default)]
    pub event_ts: Option<String>,
}

/// Workspace emoji change, validated from an [`EmojiChangedEvent`]
#[derive(Debug, Clone, PartialEq)]
pub enum EmojiChange {
    Add { name: String, timestamp: f64 },
    Remove { names: Vec<String> },
    Rename { old_name: String, new_name: String },
}

impl EmojiChangedEvent {
    pub fn change(&self) -> Result<EmojiChange> {
        match self.subtype.as_str() {
            "add" => {
                let name = required(&self.name, "name")?;
                let timestamp = parse_ts(required(&self.event_ts, "event_ts")?)?;
                Ok(EmojiChange::Add {
                    name: name.to_string(),
                    timestamp,
                })
            }
            "remove" => Ok(EmojiChange::Remove {
                names: self.names.clone(),
            }),
            "rename" => Ok(EmojiChange::Rename {
                old_name: required(&self.old_name, "old_name")?.to_string(),
                new_name: required(&self.new_name, "new_name")?.to_string(),
            }),
            other => Err(Error::Event(format!("Unhandled emoji_changed subtype: {}", other))),
        }
    }
}

fn required<'a>(field: &'a Option<String>, name: &str) -> Result<&'a str> {
    field
        .as_deref()
        .ok_or_else(|| Error::Event(format!("emoji_changed event missing {}", name)))
}

/// Parse a platform timestamp string into seconds since the epoch
pub fn parse_ts(ts: &str) -> Result<f64> {
    ts.trim()
        .parse::<f64>()
        .map_err(|_| Error::Event(format!("Invalid timestamp: {}", ts)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reaction_envelope() {
        let json = r#"{"event": {"type": "reaction_added", "user": "U1", "reaction": "tada",
            "event_ts": "1700000000.000100",
            "item": {"type": "message", "channel": "C1", "ts": "1699999999.000200"}}}"#;

        let PlatformEvent::ReactionAdded(event) = PlatformEvent::from_json(json).unwrap() else {
            panic!("expected reaction_added");
        };
        assert_eq!(event.reaction, "tada");
        assert_eq!(event.item.message_ref(), Some(("C1", "1699999999.000200")));
        assert!((event.timestamp().unwrap() - 1_700_000_000.0001).abs() < 1e-6);
        assert!(event.message.is_none());
    }

    #[test]
    fn test_parse_inline_message() {
        let json = r#"{"type": "reaction_removed", "user": "U1", "reaction": "eyes",
            "event_ts": "2", "item": {"type": "message", "channel": "C1", "ts": "1"},
            "message": {"user": "U2", "text": "hi", "ts": "1", "sentiment": {"compound": 0.2}}}"#;

        let PlatformEvent::ReactionRemoved(event) = PlatformEvent::from_json(json).unwrap() else {
            panic!("expected reaction_removed");
        };
        let inline = event.message.unwrap();
        assert_eq!(inline.message.text, "hi");
        assert_eq!(inline.sentiment.unwrap().compound, 0.2);
    }

    #[test]
    fn test_non_message_item_has_no_ref() {
        let item = ReactionItem {
            kind: "file".to_string(),
            channel: None,
            ts: None,
        };
        assert_eq!(item.message_ref(), None);
    }

    #[test]
    fn test_emoji_changed_subtypes() {
        let add = r#"{"type": "emoji_changed", "subtype": "add", "name": "shipit", "value": "https://x", "event_ts": "5.5"}"#;
        let PlatformEvent::EmojiChanged(event) = PlatformEvent::from_json(add).unwrap() else {
            panic!("expected emoji_changed");
        };
        assert_eq!(
            event.change().unwrap(),
            EmojiChange::Add {
                name: "shipit".to_string(),
                timestamp: 5.5
            }
        );

        let remove = r#"{"type": "emoji_changed", "subtype": "remove", "names": ["a", "b"]}"#;
        let PlatformEvent::EmojiChanged(event) = PlatformEvent::from_json(remove).unwrap() else {
            panic!("expected emoji_changed");
        };
        assert_eq!(
            event.change().unwrap(),
            EmojiChange::Remove {
                names: vec!["a".to_string(), "b".to_string()]
            }
        );

        let unknown = r#"{"type": "emoji_changed", "subtype": "explode"}"#;
        let PlatformEvent::EmojiChanged(event) = PlatformEvent::from_json(unknown).unwrap() else {
            panic!("expected emoji_changed");
        };
        assert!(matches!(event.change(), Err(Error::Event(_))));
    }

    #[test]
    fn test_unknown_event_type_rejected() {
        assert!(PlatformEvent::from_json(r#"{"type": "app_mention"}"#).is_err());
        assert!(parse_ts("soon").is_err());
    }
}
