//! Block Kit views for the home tab and modals.
//!
//! Leaderboards render as numbered mrkdwn fields; an empty leaderboard
//! renders [`PLACEHOLDER`] instead of an empty section.

use chrono::{DateTime, Local, Utc};
use serde_json::{json, Value};
use crate::atlas::{HomeLeaderboards, TopEmojisQuery};
use crate::model::{EmojiCount, RecentEmoji, Sentiment};

pub const PLACEHOLDER: &str = "Nothing yet!";

pub fn divider() -> Value {
    json!({ "type": "divider" })
}

pub fn mrkdwn(text: &str) -> Value {
    json!({ "type": "mrkdwn", "text": text })
}

pub fn mrkdwn_section(text: &str) -> Value {
    json!({ "type": "section", "text": mrkdwn(text) })
}

fn plain_text(text: &str) -> Value {
    json!({ "type": "plain_text", "text": text })
}

/// Numbered section of entries, or the placeholder when there are none
pub fn leaderboard<T>(entries: &[T], line: impl Fn(usize, &T) -> String) -> Value {
    let mut fields: Vec<Value> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| mrkdwn(&line(i + 1, entry)))
        .collect();
    if fields.is_empty() {
        fields.push(mrkdwn(PLACEHOLDER));
    }
    json!({ "type": "section", "fields": fields })
}

/// `1. :tada: Uses: 3`
pub fn emoji_to_line(word: &str) -> impl Fn(usize, &EmojiCount) -> String + '_ {
    move |num, entry| format!("{}. :{}: {}: {}", num, entry.name, word, entry.count)
}

/// `1. :tada: type with `:tada:``
pub fn emoji_help_line(num: usize, entry: &EmojiCount) -> String {
    format!("{}. :{}: type with `:{}:`", num, entry.name, entry.name)
}

/// `1. :tada: first used: 2023-11-14 22:13:20`
pub fn emoji_added(num: usize, entry: &RecentEmoji) -> String {
    let verb = if entry.first_use { "first used" } else { "added" };
    format!("{}. :{}: {}: {}", num, entry.name, verb, format_timestamp(entry.first_used_at))
}

/// Local wall-clock time for a platform timestamp
pub fn format_timestamp(ts: f64) -> String {
    let secs = ts.trunc() as i64;
    let nanos = (ts.fract() * 1e9).round().clamp(0.0, 999_999_999.0) as u32;
    match DateTime::<Utc>::from_timestamp(secs, nanos) {
        Some(utc) => utc.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
        None => ts.to_string(),
    }
}

/// The home tab with all six leaderboards
pub fn home_view(boards: &HomeLeaderboards) -> Value {
    let uses = emoji_to_line("Uses");
    let removals = emoji_to_line("Removals");
    let blocks = vec![
        json!({
            "type": "header",
            "text": { "type": "plain_text", "text": ":star: Emoji Atlas :star:", "emoji": true },
        }),
        divider(),
        mrkdwn_section("Most used Emoji"),
        leaderboard(&boards.most_used, &uses),
        divider(),
        mrkdwn_section("Most removed Emoji"),
        leaderboard(&boards.most_removed, &removals),
        divider(),
        mrkdwn_section("Most recently added or first used"),
        leaderboard(&boards.recent, emoji_added),
        divider(),
        mrkdwn_section("Top reactions for positive messages"),
        leaderboard(&boards.positive, &uses),
        divider(),
        mrkdwn_section("Top reactions for negative messages"),
        leaderboard(&boards.negative, &uses),
        divider(),
        mrkdwn_section("Top reactions for neutral messages"),
        leaderboard(&boards.neutral, &uses),
    ];
    json!({ "type": "home", "blocks": blocks })
}

/// Modal suggesting reactions for a message of the given sentiment
pub fn emote_modal(sentiment: Sentiment, emojis: &[EmojiCount]) -> Value {
    json!({
        "type": "modal",
        "title": plain_text("Emoji help"),
        "close": plain_text("Close"),
        "blocks": [
            mrkdwn_section(&format!(
                "That message seems to express {} sentiment, one of these emojis would work well as a reaction!",
                sentiment
            )),
            leaderboard(emojis, emoji_help_line),
        ],
    })
}

/// Modal answering `/top-emojis`
pub fn top_emojis_modal(result: Option<(&TopEmojisQuery, &[EmojiCount])>) -> Value {
    let blocks = match result {
        Some((query, emojis)) => {
            let channel_text = query
                .channel
                .as_ref()
                .map(|c| format!(" in <#{}>", c))
                .unwrap_or_default();
            vec![
                mrkdwn_section(&format!("Top Emojis for <@{}>{}", query.user, channel_text)),
                leaderboard(emojis, emoji_to_line("Uses")),
            ]
        }
        None => vec![mrkdwn_section("No user found in command")],
    };
    json!({
        "type": "modal",
        "title": plain_text("Top Emojis"),
        "close": plain_text("Close"),
        "blocks": blocks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_texts(section: &Value) -> Vec<String> {
        section["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["text"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_leaderboard_lines() {
        let entries = vec![EmojiCount::new(3, "😀"), EmojiCount::new(1, "😂")];
        let section = leaderboard(&entries, emoji_to_line("Uses"));
        assert_eq!(field_texts(&section), vec!["1. :😀: Uses: 3", "2. :😂: Uses: 1"]);
    }

    #[test]
    fn test_empty_leaderboard_placeholder() {
        let section = leaderboard::<EmojiCount>(&[], emoji_help_line);
        assert_eq!(field_texts(&section), vec![PLACEHOLDER]);
    }

    #[test]
    fn test_emoji_added_verb() {
        let used = RecentEmoji {
            name: "tada".to_string(),
            first_used_at: 1_700_000_000.0,
            first_use: true,
        };
        assert!(emoji_added(1, &used).starts_with("1. :tada: first used: 20"));

        let added = RecentEmoji { first_use: false, ..used };
        assert!(emoji_added(2, &added).starts_with("2. :tada: added: "));
    }

    #[test]
    fn test_home_view_shape() {
        let view = home_view(&HomeLeaderboards::default());
        assert_eq!(view["type"], "home");
        let blocks = view["blocks"].as_array().unwrap();
        assert_eq!(blocks.len(), 19);
        let placeholders = blocks
            .iter()
            .filter(|b| b["fields"][0]["text"] == PLACEHOLDER)
            .count();
        assert_eq!(placeholders, 6);
    }

    #[test]
    fn test_top_emojis_modal() {
        let query = TopEmojisQuery {
            user: "U1".to_string(),
            channel: Some("C1".to_string()),
        };
        let emojis = vec![EmojiCount::new(2, "wave")];
        let modal = top_emojis_modal(Some((&query, emojis.as_slice())));
        assert_eq!(modal["blocks"][0]["text"]["text"], "Top Emojis for <@U1> in <#C1>");

        let modal = top_emojis_modal(None);
        assert_eq!(modal["blocks"][0]["text"]["text"], "No user found in command");
    }

    #[test]
    fn test_emote_modal_mentions_sentiment() {
        let modal = emote_modal(Sentiment::Negative, &[]);
        let text = modal["blocks"][0]["text"]["text"].as_str().unwrap();
        assert!(text.contains("negative sentiment"));
        assert_eq!(modal["blocks"][1]["fields"][0]["text"], PLACEHOLDER);
    }
}
