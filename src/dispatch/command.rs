//! The closed set of commands the dispatcher accepts.
//!
//! Every variant carries its typed arguments and the sending half of a
//! one-shot response channel owned by the submitting call.

use crossbeam::channel::Sender;
use crate::Result;
use crate::model::{AtlasStats, EmojiCount, RecentEmoji, Sentiment};
use crate::storage::AtlasStore;

/// Response slot for a single command
pub type Responder<T> = Sender<Result<T>>;

pub enum Command {
    FindUserByExternalId {
        external_id: String,
        respond: Responder<Option<i64>>,
    },
    InsertUser {
        external_id: String,
        respond: Responder<i64>,
    },
    FindEmojiByName {
        name: String,
        respond: Responder<Option<i64>>,
    },
    InsertEmoji {
        name: String,
        first_used_at: f64,
        respond: Responder<i64>,
    },
    RenameEmoji {
        old_name: String,
        new_name: String,
        respond: Responder<usize>,
    },
    DeleteEmojisByNames {
        names: Vec<String>,
        respond: Responder<usize>,
    },
    FindMessage {
        user_id: i64,
        text: String,
        timestamp: f64,
        respond: Responder<Option<i64>>,
    },
    GetMessageText {
        message_id: i64,
        respond: Responder<Option<String>>,
    },
    InsertMessage {
        user_id: i64,
        channel: String,
        text: String,
        timestamp: f64,
        respond: Responder<i64>,
    },
    InsertReaction {
        user_id: i64,
        emoji_id: i64,
        timestamp: f64,
        is_removal: bool,
        respond: Responder<i64>,
    },
    AttachReactionToMessage {
        reaction_id: i64,
        message_id: i64,
        respond: Responder<usize>,
    },
    FindModelByName {
        name: String,
        respond: Responder<Option<i64>>,
    },
    InsertModel {
        name: String,
        respond: Responder<i64>,
    },
    FindAnalysis {
        message_id: i64,
        model_id: i64,
        respond: Responder<Option<i64>>,
    },
    InsertAnalysis {
        message_id: i64,
        model_id: i64,
        result: String,
        respond: Responder<i64>,
    },
    TopNEmojis {
        n: usize,
        is_removal: bool,
        respond: Responder<Vec<EmojiCount>>,
    },
    TopNRecent {
        n: usize,
        respond: Responder<Vec<RecentEmoji>>,
    },
    /// Backs `top_n_positive_emojis`, `top_n_neutral_emojis` and
    /// `top_n_negative_emojis`
    TopNBySentiment {
        n: usize,
        sentiment: Sentiment,
        is_removal: bool,
        respond: Responder<Vec<EmojiCount>>,
    },
    TopNEmojisByUser {
        n: usize,
        external_user_id: String,
        is_removal: bool,
        channel: Option<String>,
        respond: Responder<Vec<EmojiCount>>,
    },
    Stats {
        respond: Responder<AtlasStats>,
    },
    /// Close the connection and stop the dispatcher after answering
    Close {
        respond: Responder<()>,
    },
}

impl Command {
    /// Catalog name of the operation, used for logging
    pub fn name(&self) -> &'static str {
        match self {
            Command::FindUserByExternalId { .. } => "find_user_by_external_id",
            Command::InsertUser { .. } => "insert_user",
            Command::FindEmojiByName { .. } => "find_emoji_by_name",
            Command::InsertEmoji { .. } => "insert_emoji",
            Command::RenameEmoji { .. } => "rename_emoji",
            Command::DeleteEmojisByNames { .. } => "delete_emojis_by_names",
            Command::FindMessage { .. } => "find_message",
            Command::GetMessageText { .. } => "get_message_text",
            Command::InsertMessage { .. } => "insert_message",
            Command::InsertReaction { .. } => "insert_reaction",
            Command::AttachReactionToMessage { .. } => "attach_reaction_to_message",
            Command::FindModelByName { .. } => "find_model_by_name",
            Command::InsertModel { .. } => "insert_model",
            Command::FindAnalysis { .. } => "find_analysis",
            Command::InsertAnalysis { .. } => "insert_analysis",
            Command::TopNEmojis { .. } => "top_n_emojis",
            Command::TopNRecent { .. } => "top_n_recent",
            Command::TopNBySentiment { sentiment, .. } => match sentiment {
                Sentiment::Positive => "top_n_positive_emojis",
                Sentiment::Neutral => "top_n_neutral_emojis",
                Sentiment::Negative => "top_n_negative_emojis",
            },
            Command::TopNEmojisByUser { .. } => "top_n_emojis_by_user",
            Command::Stats { .. } => "stats",
            Command::Close { .. } => "close",
        }
    }

    /// Run the command against the store and answer on its response slot.
    ///
    /// `Close` is handled by the worker loop itself since it consumes the
    /// store; reaching it here answers with an error.
    pub(crate) fn execute(self, store: &mut AtlasStore) {
        match self {
            Command::FindUserByExternalId { external_id, respond } => {
                reply(respond, store.find_user_by_external_id(&external_id))
            }
            Command::InsertUser { external_id, respond } => {
                reply(respond, store.insert_user(&external_id))
            }
            Command::FindEmojiByName { name, respond } => {
                reply(respond, store.find_emoji_by_name(&name))
            }
            Command::InsertEmoji { name, first_used_at, respond } => {
                reply(respond, store.insert_emoji(&name, first_used_at))
            }
            Command::RenameEmoji { old_name, new_name, respond } => {
                reply(respond, store.rename_emoji(&old_name, &new_name))
            }
            Command::DeleteEmojisByNames { names, respond } => {
                reply(respond, store.delete_emojis_by_names(&names))
            }
            Command::FindMessage { user_id, text, timestamp, respond } => {
                reply(respond, store.find_message(user_id, &text, timestamp))
            }
            Command::GetMessageText { message_id, respond } => {
                reply(respond, store.get_message_text(message_id))
            }
            Command::InsertMessage { user_id, channel, text, timestamp, respond } => {
                reply(respond, store.insert_message(user_id, &channel, &text, timestamp))
            }
            Command::InsertReaction { user_id, emoji_id, timestamp, is_removal, respond } => {
                reply(respond, store.insert_reaction(user_id, emoji_id, timestamp, is_removal))
            }
            Command::AttachReactionToMessage { reaction_id, message_id, respond } => {
                reply(respond, store.attach_reaction_to_message(reaction_id, message_id))
            }
            Command::FindModelByName { name, respond } => {
                reply(respond, store.find_model_by_name(&name))
            }
            Command::InsertModel { name, respond } => reply(respond, store.insert_model(&name)),
            Command::FindAnalysis { message_id, model_id, respond } => {
                reply(respond, store.find_analysis(message_id, model_id))
            }
            Command::InsertAnalysis { message_id, model_id, result, respond } => {
                reply(respond, store.insert_analysis(message_id, model_id, &result))
            }
            Command::TopNEmojis { n, is_removal, respond } => {
                reply(respond, store.top_n_emojis(n, is_removal))
            }
            Command::TopNRecent { n, respond } => reply(respond, store.top_n_recent(n)),
            Command::TopNBySentiment { n, sentiment, is_removal, respond } => {
                reply(respond, store.top_n_by_sentiment(n, sentiment, is_removal))
            }
            Command::TopNEmojisByUser { n, external_user_id, is_removal, channel, respond } => reply(
                respond,
                store.top_n_emojis_by_user(n, &external_user_id, is_removal, channel.as_deref()),
            ),
            Command::Stats { respond } => reply(respond, store.stats()),
            Command::Close { respond } => reply(respond, Err(crate::Error::DispatcherClosed)),
        }
    }
}

/// Send a result back to the caller that submitted the command
pub(crate) fn reply<T>(respond: Responder<T>, result: Result<T>) {
    if let Err(err) = &result {
        tracing::warn!("Command failed: {}", err);
    }
    // The caller may have gone away; nothing is waiting on the slot then.
    if respond.send(result).is_err() {
        tracing::debug!("Dropped response for a departed caller");
    }
}
