//! Event recording and leaderboard lookups on top of the [`Database`] handle.
//!
//! Every write follows find-then-insert, so replaying an event never trips a
//! uniqueness constraint for users, emoji, messages, models or analyses.

use std::sync::OnceLock;
use regex::Regex;
use crate::Result;
use crate::dispatch::Database;
use crate::event::{
    parse_ts, EmojiChange, EmojiChangedEvent, InlineMessage, PlatformEvent, PlatformMessage, ReactionEvent,
};
use crate::model::{EmojiCount, RecentEmoji, Sentiment, SentimentScores};

/// Looks up the message a reaction points at.
///
/// Implemented by the chat platform client (conversation history).
pub trait MessageSource: Send + Sync {
    fn fetch_message(&self, channel: &str, ts: &str) -> Result<Option<PlatformMessage>>;
}

/// Scores message text; implemented by an external lexicon analyzer.
pub trait SentimentAnalyzer: Send + Sync {
    /// Name the analysis rows are stored under
    fn model_name(&self) -> &str;

    /// `None` when the analyzer cannot score this text
    fn polarity_scores(&self, text: &str) -> Option<SentimentScores>;
}

/// Message source for offline ingestion; only inline messages resolve.
pub struct NoHistory;

impl MessageSource for NoHistory {
    fn fetch_message(&self, _channel: &str, _ts: &str) -> Result<Option<PlatformMessage>> {
        Ok(None)
    }
}

/// Analyzer that scores nothing itself; only scores shipped with the event
/// are stored, under `model`.
pub struct PrecomputedSentiment {
    model: String,
}

impl PrecomputedSentiment {
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into() }
    }
}

impl SentimentAnalyzer for PrecomputedSentiment {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn polarity_scores(&self, _text: &str) -> Option<SentimentScores> {
        None
    }
}

/// Parsed `/top-emojis @user #channel` command text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopEmojisQuery {
    pub user: String,
    pub channel: Option<String>,
}

static USER_MENTION: OnceLock<Regex> = OnceLock::new();
static CHANNEL_MENTION: OnceLock<Regex> = OnceLock::new();

/// Parse `<@U123|name> <#C456|channel>`; `None` without a user mention
pub fn parse_top_emojis_command(text: &str) -> Option<TopEmojisQuery> {
    let text = text.trim();
    let user_re = USER_MENTION.get_or_init(|| Regex::new(r"^<@(.*?)[|>]").expect("valid user regex"));
    let channel_re =
        CHANNEL_MENTION.get_or_init(|| Regex::new(r"^<@.*?> <#(.*?)[|>]").expect("valid channel regex"));

    let user = user_re.captures(text)?.get(1)?.as_str().to_string();
    let channel = channel_re
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());
    Some(TopEmojisQuery { user, channel })
}

/// The leaderboards shown on the home tab
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct HomeLeaderboards {
    pub most_used: Vec<EmojiCount>,
    pub most_removed: Vec<EmojiCount>,
    pub recent: Vec<RecentEmoji>,
    pub positive: Vec<EmojiCount>,
    pub negative: Vec<EmojiCount>,
    pub neutral: Vec<EmojiCount>,
}

/// Outcome of recording one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Recorded {
    pub reactions: usize,
    pub messages_attached: usize,
    pub analyses: usize,
    pub emoji_changes: usize,
}

impl std::ops::AddAssign for Recorded {
    fn add_assign(&mut self, other: Self) {
        self.reactions += other.reactions;
        self.messages_attached += other.messages_attached;
        self.analyses += other.analyses;
        self.emoji_changes += other.emoji_changes;
    }
}

pub struct Atlas {
    db: Database,
    messages: Box<dyn MessageSource>,
    analyzer: Box<dyn SentimentAnalyzer>,
}

impl Atlas {
    pub fn new(db: Database, messages: Box<dyn MessageSource>, analyzer: Box<dyn SentimentAnalyzer>) -> Self {
        Self { db, messages, analyzer }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Record any supported platform event
    pub fn handle(&self, event: &PlatformEvent) -> Result<Recorded> {
        match event {
            PlatformEvent::ReactionAdded(reaction) => self.record_reaction(reaction, false),
            PlatformEvent::ReactionRemoved(reaction) => self.record_reaction(reaction, true),
            PlatformEvent::EmojiChanged(change) => self.record_emoji_change(change),
        }
    }

    fn ensure_user(&self, external_id: &str) -> Result<i64> {
        match self.db.find_user_by_external_id(external_id)? {
            Some(id) => Ok(id),
            None => self.db.insert_user(external_id),
        }
    }

    fn ensure_emoji(&self, name: &str, first_used_at: f64) -> Result<i64> {
        match self.db.find_emoji_by_name(name)? {
            Some(id) => Ok(id),
            None => self.db.insert_emoji(name, first_used_at),
        }
    }

    fn ensure_model(&self, name: &str) -> Result<i64> {
        match self.db.find_model_by_name(name)? {
            Some(id) => Ok(id),
            None => self.db.insert_model(name),
        }
    }

    /// Record a reaction add (or removal), then resolve and score its message.
    ///
    /// A message that cannot be fetched leaves the reaction unattached.
    pub fn record_reaction(&self, event: &ReactionEvent, is_removal: bool) -> Result<Recorded> {
        let timestamp = event.timestamp()?;
        tracing::info!("reaction: {} by: {}", event.reaction, event.user);

        let user_id = self.ensure_user(&event.user)?;
        let emoji_id = self.ensure_emoji(&event.reaction, timestamp)?;
        let reaction_id = self.db.insert_reaction(user_id, emoji_id, timestamp, is_removal)?;
        let mut recorded = Recorded {
            reactions: 1,
            ..Recorded::default()
        };

        let Some((channel, message_ts)) = event.item.message_ref() else {
            tracing::info!("Reaction to non-message item ({})", event.item.kind);
            return Ok(recorded);
        };

        let (message, precomputed) = match &event.message {
            Some(InlineMessage { message, sentiment }) => (Some(message.clone()), *sentiment),
            None => match self.messages.fetch_message(channel, message_ts) {
                Ok(message) => (message, None),
                Err(err) => {
                    tracing::warn!("Couldn't retrieve message for reaction: {}", err);
                    (None, None)
                }
            },
        };
        let Some(message) = message else {
            tracing::debug!("No message found for reaction {} in {}", reaction_id, channel);
            return Ok(recorded);
        };

        let message_id = self.resolve_message(channel, &message)?;
        self.db.attach_reaction_to_message(reaction_id, message_id)?;
        recorded.messages_attached = 1;

        if self.analyze_message(message_id, precomputed)? {
            recorded.analyses = 1;
        }
        Ok(recorded)
    }

    /// Find or insert a message by its (author, text, timestamp) identity
    fn resolve_message(&self, channel: &str, message: &PlatformMessage) -> Result<i64> {
        let author_id = self.ensure_user(&message.user)?;
        let ts = parse_ts(&message.ts)?;
        match self.db.find_message(author_id, &message.text, ts)? {
            Some(id) => Ok(id),
            None => self.db.insert_message(author_id, channel, &message.text, ts),
        }
    }

    /// Score a message once per model. Returns whether an analysis was stored.
    ///
    /// `precomputed` scores take precedence over the analyzer.
    pub fn analyze_message(&self, message_id: i64, precomputed: Option<SentimentScores>) -> Result<bool> {
        let model_id = self.ensure_model(self.analyzer.model_name())?;
        if self.db.find_analysis(message_id, model_id)?.is_some() {
            return Ok(false);
        }

        let scores = match precomputed {
            Some(scores) => Some(scores),
            None => match self.db.get_message_text(message_id)? {
                Some(text) => self.analyzer.polarity_scores(&text),
                None => None,
            },
        };
        let Some(scores) = scores else {
            return Ok(false);
        };

        self.db.insert_analysis(message_id, model_id, &scores.to_json()?)?;
        Ok(true)
    }

    /// Apply a workspace emoji add / remove / rename
    pub fn record_emoji_change(&self, event: &EmojiChangedEvent) -> Result<Recorded> {
        let changed = match event.change()? {
            EmojiChange::Add { name, timestamp } => {
                if self.db.find_emoji_by_name(&name)?.is_some() {
                    0
                } else {
                    self.db.insert_emoji(&name, timestamp)?;
                    1
                }
            }
            EmojiChange::Remove { names } => self.db.delete_emojis_by_names(&names)?,
            EmojiChange::Rename { old_name, new_name } => self.db.rename_emoji(&old_name, &new_name)?,
        };
        tracing::info!("emoji_changed ({}): {} rows", event.subtype, changed);
        Ok(Recorded {
            emoji_changes: changed,
            ..Recorded::default()
        })
    }

    /// Emoji suggestions for a message with the given compound score
    pub fn suggest_for(&self, compound: f64, n: usize) -> Result<(Sentiment, Vec<EmojiCount>)> {
        let sentiment = Sentiment::from_compound(compound);
        let emojis = self.db.top_n_by_sentiment(n, sentiment, false)?;
        Ok((sentiment, emojis))
    }

    /// Answer a `/top-emojis` command; `None` when no user was mentioned
    pub fn user_top_emojis(&self, command_text: &str, n: usize) -> Result<Option<(TopEmojisQuery, Vec<EmojiCount>)>> {
        let Some(query) = parse_top_emojis_command(command_text) else {
            return Ok(None);
        };
        let emojis = self.top_emojis_for(&query, n)?;
        Ok(Some((query, emojis)))
    }

    pub fn top_emojis_for(&self, query: &TopEmojisQuery, n: usize) -> Result<Vec<EmojiCount>> {
        self.db
            .top_n_emojis_by_user(n, &query.user, false, query.channel.as_deref())
    }

    pub fn home_leaderboards(&self, n: usize) -> Result<HomeLeaderboards> {
        Ok(HomeLeaderboards {
            most_used: self.db.top_n_emojis(n, false)?,
            most_removed: self.db.top_n_emojis(n, true)?,
            recent: self.db.top_n_recent(n)?,
            positive: self.db.top_n_positive_emojis(n, false)?,
            negative: self.db.top_n_negative_emojis(n, false)?,
            neutral: self.db.top_n_neutral_emojis(n, false)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use crate::Error;
    use crate::dispatch::Dispatcher;
    use crate::event::ReactionItem;
    use crate::storage::AtlasStore;

    struct FixedHistory(HashMap<(String, String), PlatformMessage>);

    impl MessageSource for FixedHistory {
        fn fetch_message(&self, channel: &str, ts: &str) -> Result<Option<PlatformMessage>> {
            Ok(self.0.get(&(channel.to_string(), ts.to_string())).cloned())
        }
    }

    struct FailingHistory;

    impl MessageSource for FailingHistory {
        fn fetch_message(&self, _channel: &str, _ts: &str) -> Result<Option<PlatformMessage>> {
            Err(Error::Event("history unavailable".to_string()))
        }
    }

    /// Scores by keyword: "great" positive, "awful" negative, else neutral
    struct KeywordAnalyzer;

    impl SentimentAnalyzer for KeywordAnalyzer {
        fn model_name(&self) -> &str {
            "keywords"
        }

        fn polarity_scores(&self, text: &str) -> Option<SentimentScores> {
            let compound = if text.contains("great") {
                0.6
            } else if text.contains("awful") {
                -0.6
            } else {
                0.0
            };
            Some(SentimentScores::from_compound(compound))
        }
    }

    fn message(user: &str, text: &str, ts: &str) -> PlatformMessage {
        PlatformMessage {
            user: user.to_string(),
            text: text.to_string(),
            ts: ts.to_string(),
        }
    }

    fn reaction(emoji: &str, user: &str, event_ts: &str, channel: &str, ts: &str) -> ReactionEvent {
        ReactionEvent {
            reaction: emoji.to_string(),
            user: user.to_string(),
            event_ts: event_ts.to_string(),
            item: ReactionItem {
                kind: "message".to_string(),
                channel: Some(channel.to_string()),
                ts: Some(ts.to_string()),
            },
            message: None,
        }
    }

    fn atlas_with(history: Box<dyn MessageSource>) -> (Dispatcher, Atlas) {
        let dispatcher = Dispatcher::spawn(AtlasStore::open_in_memory().unwrap()).unwrap();
        let atlas = Atlas::new(dispatcher.database(), history, Box::new(KeywordAnalyzer));
        (dispatcher, atlas)
    }

    fn history() -> Box<dyn MessageSource> {
        let mut messages = HashMap::new();
        messages.insert(("C1".to_string(), "100.0".to_string()), message("A", "great release", "100.0"));
        messages.insert(("C1".to_string(), "200.0".to_string()), message("B", "awful outage", "200.0"));
        messages.insert(("C2".to_string(), "300.0".to_string()), message("A", "lunch?", "300.0"));
        Box::new(FixedHistory(messages))
    }

    #[test]
    fn test_record_reaction_resolves_and_scores_message() {
        let (_dispatcher, atlas) = atlas_with(history());

        let recorded = atlas
            .record_reaction(&reaction("tada", "U1", "101.0", "C1", "100.0"), false)
            .unwrap();
        assert_eq!(
            recorded,
            Recorded {
                reactions: 1,
                messages_attached: 1,
                analyses: 1,
                emoji_changes: 0
            }
        );

        // A second reaction on the same message reuses message and analysis
        let recorded = atlas
            .record_reaction(&reaction("heart", "U2", "102.0", "C1", "100.0"), false)
            .unwrap();
        assert_eq!(recorded.analyses, 0);

        let stats = atlas.database().stats().unwrap();
        assert_eq!(stats.messages, 1);
        assert_eq!(stats.analyses, 1);
        assert_eq!(stats.users, 3);
        assert_eq!(stats.unattached_reactions, 0);

        let (sentiment, suggestions) = atlas.suggest_for(0.9, 4).unwrap();
        assert_eq!(sentiment, Sentiment::Positive);
        assert_eq!(suggestions, vec![EmojiCount::new(1, "heart"), EmojiCount::new(1, "tada")]);
    }

    #[test]
    fn test_unfetchable_message_leaves_reaction_unattached() {
        let (_dispatcher, atlas) = atlas_with(Box::new(FailingHistory));

        let recorded = atlas
            .record_reaction(&reaction("eyes", "U1", "10.0", "C1", "9.0"), false)
            .unwrap();
        assert_eq!(recorded.messages_attached, 0);
        assert_eq!(atlas.database().stats().unwrap().unattached_reactions, 1);
        assert_eq!(atlas.database().top_n_emojis(5, false).unwrap(), vec![EmojiCount::new(1, "eyes")]);
    }

    #[test]
    fn test_inline_message_with_precomputed_sentiment() {
        let dispatcher = Dispatcher::spawn(AtlasStore::open_in_memory().unwrap()).unwrap();
        let atlas = Atlas::new(
            dispatcher.database(),
            Box::new(NoHistory),
            Box::new(PrecomputedSentiment::new("vader")),
        );

        let mut event = reaction("sob", "U1", "50.0", "C1", "40.0");
        event.message = Some(InlineMessage {
            message: message("U2", "my build", "40.0"),
            sentiment: Some(SentimentScores::from_compound(-0.4)),
        });
        let recorded = atlas.record_reaction(&event, false).unwrap();
        assert_eq!(recorded.analyses, 1);

        let boards = atlas.home_leaderboards(10).unwrap();
        assert_eq!(boards.negative, vec![EmojiCount::new(1, "sob")]);
        assert!(boards.positive.is_empty());
        assert!(boards.most_removed.is_empty());
        assert_eq!(boards.recent.len(), 1);
        assert!(boards.recent[0].first_use);
    }

    #[test]
    fn test_emoji_change_flow() {
        let (_dispatcher, atlas) = atlas_with(history());
        let add = EmojiChangedEvent {
            subtype: "add".to_string(),
            name: Some("shipit".to_string()),
            names: vec![],
            old_name: None,
            new_name: None,
            event_ts: Some("5.0".to_string()),
        };
        assert_eq!(atlas.record_emoji_change(&add).unwrap().emoji_changes, 1);
        // Replayed add is a no-op rather than a constraint violation
        assert_eq!(atlas.record_emoji_change(&add).unwrap().emoji_changes, 0);

        atlas
            .record_reaction(&reaction("shipit", "U1", "301.0", "C2", "300.0"), false)
            .unwrap();

        let rename = EmojiChangedEvent {
            subtype: "rename".to_string(),
            old_name: Some("shipit".to_string()),
            new_name: Some("ship_it".to_string()),
            ..add.clone()
        };
        assert_eq!(atlas.record_emoji_change(&rename).unwrap().emoji_changes, 1);

        let remove = EmojiChangedEvent {
            subtype: "remove".to_string(),
            names: vec!["ship_it".to_string()],
            ..add.clone()
        };
        assert_eq!(atlas.record_emoji_change(&remove).unwrap().emoji_changes, 2);
        assert!(atlas.home_leaderboards(10).unwrap().most_used.is_empty());
    }

    #[test]
    fn test_user_top_emojis_command() {
        let (_dispatcher, atlas) = atlas_with(history());
        atlas.record_reaction(&reaction("wave", "U1", "1.0", "C1", "100.0"), false).unwrap();
        atlas.record_reaction(&reaction("wave", "U1", "2.0", "C2", "300.0"), false).unwrap();
        atlas.record_reaction(&reaction("fire", "U1", "3.0", "C2", "300.0"), false).unwrap();

        let (query, all) = atlas.user_top_emojis("<@U1|alice>", 10).unwrap().unwrap();
        assert_eq!(query.channel, None);
        assert_eq!(all, vec![EmojiCount::new(2, "wave"), EmojiCount::new(1, "fire")]);

        let (query, in_c1) = atlas.user_top_emojis("<@U1|alice> <#C1|general>", 10).unwrap().unwrap();
        assert_eq!(query.channel.as_deref(), Some("C1"));
        assert_eq!(in_c1, vec![EmojiCount::new(1, "wave")]);

        assert!(atlas.user_top_emojis("nobody", 10).unwrap().is_none());

        let by_id = TopEmojisQuery {
            user: "U1".to_string(),
            channel: Some("C2".to_string()),
        };
        assert_eq!(
            atlas.top_emojis_for(&by_id, 10).unwrap(),
            vec![EmojiCount::new(1, "fire"), EmojiCount::new(1, "wave")]
        );
        let empty_channel = TopEmojisQuery {
            channel: Some(String::new()),
            ..by_id
        };
        assert_eq!(atlas.top_emojis_for(&empty_channel, 10).unwrap(), all);
    }

    #[test]
    fn test_recorded_totals_add_up() {
        let mut total = Recorded::default();
        total += Recorded {
            reactions: 1,
            messages_attached: 1,
            ..Recorded::default()
        };
        total += Recorded {
            emoji_changes: 2,
            ..Recorded::default()
        };
        assert_eq!(
            total,
            Recorded {
                reactions: 1,
                messages_attached: 1,
                analyses: 0,
                emoji_changes: 2
            }
        );
    }

    #[test]
    fn test_parse_top_emojis_command() {
        assert_eq!(
            parse_top_emojis_command("  <@U123> <#C9>  "),
            Some(TopEmojisQuery {
                user: "U123".to_string(),
                channel: Some("C9".to_string())
            })
        );
        assert_eq!(
            parse_top_emojis_command("<@U123|bob>"),
            Some(TopEmojisQuery {
                user: "U123".to_string(),
                channel: None
            })
        );
        assert_eq!(parse_top_emojis_command("#C9 <@U123>"), None);
    }
}
