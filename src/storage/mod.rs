//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with tables:
//! - slack_user(slack_user_id)
//! - emoji(name, first_used_created)
//! - message(user_id, channel, m_text, timestamp)
//! - reaction(user_id, message_id, emoji_id, timestamp, remove)
//! - model(name, description)
//! - analysis(message_id, model_id, result)

pub mod schema;
pub mod sqlite;

pub use sqlite::AtlasStore;
