pub mod icons;
pub mod output;
pub mod progress;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{header, info, nothing_yet, section, success, summary_row, warn};
pub use progress::Spinner;
pub use table::{leaderboard_table, recent_table, stats_table};
pub use theme::{theme, Theme};
