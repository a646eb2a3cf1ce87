//! Client handle used by any number of threads to reach the dispatcher.

use crossbeam::channel::{self, Sender};
use crate::{Error, Result};
use crate::model::{AtlasStats, EmojiCount, RecentEmoji, Sentiment};
use super::command::{Command, Responder};
use super::worker::{DispatcherState, StateFlag};

/// Cloneable, thread-safe handle onto the single-writer store.
///
/// Each call submits one command and blocks until that command's own
/// response slot is filled, so concurrent callers never see each other's
/// results.
#[derive(Clone)]
pub struct Database {
    requests: Sender<Command>,
    state: StateFlag,
}

impl Database {
    pub(crate) fn new(requests: Sender<Command>, state: StateFlag) -> Self {
        Self { requests, state }
    }

    pub fn state(&self) -> DispatcherState {
        self.state.get()
    }

    /// Submit a command built around a fresh response slot and wait for it
    fn call<T>(&self, build: impl FnOnce(Responder<T>) -> Command) -> Result<T> {
        let (respond, response) = channel::bounded(1);
        let command = build(respond);
        tracing::debug!("Calling {}", command.name());
        self.requests.send(command).map_err(|_| Error::DispatcherClosed)?;
        response.recv().map_err(|_| Error::DispatcherClosed)?
    }

    // ========== Users ==========

    pub fn find_user_by_external_id(&self, external_id: &str) -> Result<Option<i64>> {
        self.call(|respond| Command::FindUserByExternalId {
            external_id: external_id.to_string(),
            respond,
        })
    }

    pub fn insert_user(&self, external_id: &str) -> Result<i64> {
        self.call(|respond| Command::InsertUser {
            external_id: external_id.to_string(),
            respond,
        })
    }

    // ========== Emoji ==========

    pub fn find_emoji_by_name(&self, name: &str) -> Result<Option<i64>> {
        self.call(|respond| Command::FindEmojiByName {
            name: name.to_string(),
            respond,
        })
    }

    pub fn insert_emoji(&self, name: &str, first_used_at: f64) -> Result<i64> {
        self.call(|respond| Command::InsertEmoji {
            name: name.to_string(),
            first_used_at,
            respond,
        })
    }

    pub fn rename_emoji(&self, old_name: &str, new_name: &str) -> Result<usize> {
        self.call(|respond| Command::RenameEmoji {
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
            respond,
        })
    }

    pub fn delete_emojis_by_names(&self, names: &[String]) -> Result<usize> {
        self.call(|respond| Command::DeleteEmojisByNames {
            names: names.to_vec(),
            respond,
        })
    }

    // ========== Messages ==========

    pub fn find_message(&self, user_id: i64, text: &str, timestamp: f64) -> Result<Option<i64>> {
        self.call(|respond| Command::FindMessage {
            user_id,
            text: text.to_string(),
            timestamp,
            respond,
        })
    }

    pub fn get_message_text(&self, message_id: i64) -> Result<Option<String>> {
        self.call(|respond| Command::GetMessageText { message_id, respond })
    }

    pub fn insert_message(&self, user_id: i64, channel: &str, text: &str, timestamp: f64) -> Result<i64> {
        self.call(|respond| Command::InsertMessage {
            user_id,
            channel: channel.to_string(),
            text: text.to_string(),
            timestamp,
            respond,
        })
    }

    // ========== Reactions ==========

    pub fn insert_reaction(&self, user_id: i64, emoji_id: i64, timestamp: f64, is_removal: bool) -> Result<i64> {
        self.call(|respond| Command::InsertReaction {
            user_id,
            emoji_id,
            timestamp,
            is_removal,
            respond,
        })
    }

    pub fn attach_reaction_to_message(&self, reaction_id: i64, message_id: i64) -> Result<usize> {
        self.call(|respond| Command::AttachReactionToMessage {
            reaction_id,
            message_id,
            respond,
        })
    }

    // ========== Models & Analyses ==========

    pub fn find_model_by_name(&self, name: &str) -> Result<Option<i64>> {
        self.call(|respond| Command::FindModelByName {
            name: name.to_string(),
            respond,
        })
    }

    pub fn insert_model(&self, name: &str) -> Result<i64> {
        self.call(|respond| Command::InsertModel {
            name: name.to_string(),
            respond,
        })
    }

    pub fn find_analysis(&self, message_id: i64, model_id: i64) -> Result<Option<i64>> {
        self.call(|respond| Command::FindAnalysis {
            message_id,
            model_id,
            respond,
        })
    }

    pub fn insert_analysis(&self, message_id: i64, model_id: i64, result: &str) -> Result<i64> {
        self.call(|respond| Command::InsertAnalysis {
            message_id,
            model_id,
            result: result.to_string(),
            respond,
        })
    }

    // ========== Rankings ==========

    pub fn top_n_emojis(&self, n: usize, is_removal: bool) -> Result<Vec<EmojiCount>> {
        self.call(|respond| Command::TopNEmojis { n, is_removal, respond })
    }

    pub fn top_n_recent(&self, n: usize) -> Result<Vec<RecentEmoji>> {
        self.call(|respond| Command::TopNRecent { n, respond })
    }

    pub fn top_n_by_sentiment(&self, n: usize, sentiment: Sentiment, is_removal: bool) -> Result<Vec<EmojiCount>> {
        self.call(|respond| Command::TopNBySentiment {
            n,
            sentiment,
            is_removal,
            respond,
        })
    }

    pub fn top_n_positive_emojis(&self, n: usize, is_removal: bool) -> Result<Vec<EmojiCount>> {
        self.top_n_by_sentiment(n, Sentiment::Positive, is_removal)
    }

    pub fn top_n_neutral_emojis(&self, n: usize, is_removal: bool) -> Result<Vec<EmojiCount>> {
        self.top_n_by_sentiment(n, Sentiment::Neutral, is_removal)
    }

    pub fn top_n_negative_emojis(&self, n: usize, is_removal: bool) -> Result<Vec<EmojiCount>> {
        self.top_n_by_sentiment(n, Sentiment::Negative, is_removal)
    }

    pub fn top_n_emojis_by_user(
        &self,
        n: usize,
        external_user_id: &str,
        is_removal: bool,
        channel: Option<&str>,
    ) -> Result<Vec<EmojiCount>> {
        self.call(|respond| Command::TopNEmojisByUser {
            n,
            external_user_id: external_user_id.to_string(),
            is_removal,
            channel: channel.map(str::to_string),
            respond,
        })
    }

    pub fn stats(&self) -> Result<AtlasStats> {
        self.call(|respond| Command::Stats { respond })
    }

    /// Close the connection and stop the dispatcher.
    ///
    /// Issue this once; every later call fails with
    /// [`Error::DispatcherClosed`].
    pub fn close(&self) -> Result<()> {
        self.call(|respond| Command::Close { respond })
    }
}
