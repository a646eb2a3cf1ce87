pub struct Icons;

impl Icons {
    pub const CHECK: &str = "✅";
    pub const WARN: &str = "⚠️";
    pub const INFO: &str = "ℹ️";
    pub const DATABASE: &str = "🗄️";
    pub const CLOCK: &str = "⏱️";
    pub const PERSON: &str = "👤";
    pub const STAR: &str = "⭐";
    pub const SPARKLE: &str = "✨";
    pub const TROPHY: &str = "🏆";
    pub const EMPTY: &str = "∅";
}
