//! Database schema definitions

/// SQL to create the slack_user table
pub const CREATE_USER_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS slack_user (
    id INTEGER PRIMARY KEY,
    slack_user_id TEXT NOT NULL UNIQUE
)
"#;

/// SQL to create the emoji table
///
/// `first_used_created` is the platform timestamp of the first recorded use
/// (or of the "emoji added" event) and is never updated.
pub const CREATE_EMOJI_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS emoji (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    first_used_created REAL NOT NULL
)
"#;

/// SQL to create the message table
pub const CREATE_MESSAGE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS message (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    channel TEXT,
    m_text TEXT,
    timestamp REAL,
    FOREIGN KEY (user_id) REFERENCES slack_user(id)
)
"#;

/// SQL to create the reaction table
/// `message_id` stays NULL until the reacted-to message has been resolved
pub const CREATE_REACTION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS reaction (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    message_id INTEGER,
    emoji_id INTEGER NOT NULL,
    timestamp REAL,
    remove INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (user_id) REFERENCES slack_user(id),
    FOREIGN KEY (message_id) REFERENCES message(id),
    FOREIGN KEY (emoji_id) REFERENCES emoji(id)
)
"#;

/// SQL to create the model table
pub const CREATE_MODEL_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS model (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT
)
"#;

/// SQL to create the analysis table
pub const CREATE_ANALYSIS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS analysis (
    id INTEGER PRIMARY KEY,
    message_id INTEGER NOT NULL,
    model_id INTEGER NOT NULL,
    result JSON,
    FOREIGN KEY (message_id) REFERENCES message(id),
    FOREIGN KEY (model_id) REFERENCES model(id)
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_message_identity ON message(user_id, m_text, timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_reaction_emoji ON reaction(emoji_id)",
    "CREATE INDEX IF NOT EXISTS idx_reaction_message ON reaction(message_id)",
    "CREATE INDEX IF NOT EXISTS idx_reaction_user ON reaction(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_analysis_message_model ON analysis(message_id, model_id)",
];

/// Connection-level settings applied before the schema.
pub const PRAGMAS: &str = "PRAGMA foreign_keys = ON;\nPRAGMA journal_mode = WAL;";

/// All schema creation statements, in dependency order
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_USER_TABLE,
        CREATE_EMOJI_TABLE,
        CREATE_MESSAGE_TABLE,
        CREATE_REACTION_TABLE,
        CREATE_MODEL_TABLE,
        CREATE_ANALYSIS_TABLE,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}

/// Names of the tables created by [`all_schema_statements`]
pub const TABLES: &[&str] = &["slack_user", "emoji", "message", "reaction", "model", "analysis"];
