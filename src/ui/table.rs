use tabled::{settings::Style, Table, Tabled};
use crate::model::{AtlasStats, EmojiCount, RecentEmoji};

#[derive(Tabled)]
struct StatRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "#")]
    rank: usize,
    #[tabled(rename = "Emoji")]
    name: String,
    #[tabled(rename = "Count")]
    count: i64,
}

#[derive(Tabled)]
struct RecentRow {
    #[tabled(rename = "#")]
    rank: usize,
    #[tabled(rename = "Emoji")]
    name: String,
    #[tabled(rename = "How")]
    how: &'static str,
    #[tabled(rename = "When")]
    when: String,
}

/// Ranked table of emoji counts; empty string when there are no rows
pub fn leaderboard_table(entries: &[EmojiCount]) -> String {
    if entries.is_empty() {
        return String::new();
    }
    let rows: Vec<CountRow> = entries
        .iter()
        .enumerate()
        .map(|(i, e)| CountRow {
            rank: i + 1,
            name: format!(":{}:", e.name),
            count: e.count,
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn recent_table(entries: &[RecentEmoji]) -> String {
    if entries.is_empty() {
        return String::new();
    }
    let rows: Vec<RecentRow> = entries
        .iter()
        .enumerate()
        .map(|(i, e)| RecentRow {
            rank: i + 1,
            name: format!(":{}:", e.name),
            how: if e.first_use { "first used" } else { "added" },
            when: crate::view::format_timestamp(e.first_used_at),
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn stats_table(stats: &AtlasStats) -> String {
    let rows = vec![
        ("Users", stats.users),
        ("Emoji", stats.emojis),
        ("Messages", stats.messages),
        ("Reactions", stats.reactions),
        ("Unattached reactions", stats.unattached_reactions),
        ("Models", stats.models),
        ("Analyses", stats.analyses),
    ]
    .into_iter()
    .map(|(label, value)| StatRow {
        metric: label.to_string(),
        value: value.to_string(),
    })
    .collect::<Vec<_>>();
    Table::new(rows).with(Style::rounded()).to_string()
}
