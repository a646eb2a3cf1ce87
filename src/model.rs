//! Row types returned by the reaction store and the sentiment buckets used
//! to slice rankings.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One leaderboard entry: how many reactions used an emoji.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmojiCount {
    pub count: i64,
    pub name: String,
}

impl EmojiCount {
    pub fn new(count: i64, name: impl Into<String>) -> Self {
        Self {
            count,
            name: name.into(),
        }
    }
}

/// A recently introduced emoji.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentEmoji {
    pub name: String,
    /// Platform timestamp (seconds since the epoch) of creation
    pub first_used_at: f64,
    /// True when the emoji entered the store through a reaction rather than
    /// an "emoji added" event
    pub first_use: bool,
}

/// Sentiment bucket of a message, derived from the analyzer's compound score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    /// Compound scores at or beyond +/- this value are polar.
    pub const THRESHOLD: f64 = 0.05;

    /// Bucket a compound score in [-1, 1].
    pub fn from_compound(compound: f64) -> Self {
        if compound >= Self::THRESHOLD {
            Sentiment::Positive
        } else if compound <= -Self::THRESHOLD {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        }
    }

    /// SQL predicate over `analysis.result` selecting this bucket
    pub(crate) fn compound_predicate(&self) -> &'static str {
        match self {
            Sentiment::Positive => "json_extract(analysis.result, '$.compound') >= 0.05",
            Sentiment::Neutral => {
                "json_extract(analysis.result, '$.compound') < 0.05 \
                 AND json_extract(analysis.result, '$.compound') > -0.05"
            }
            Sentiment::Negative => "json_extract(analysis.result, '$.compound') <= -0.05",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }

    pub fn all() -> &'static [Sentiment] {
        &[Sentiment::Positive, Sentiment::Neutral, Sentiment::Negative]
    }
}

impl FromStr for Sentiment {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "positive" | "pos" => Ok(Sentiment::Positive),
            "neutral" | "neu" => Ok(Sentiment::Neutral),
            "negative" | "neg" => Ok(Sentiment::Negative),
            _ => Err(crate::Error::Config(format!("Unknown sentiment: {}", s))),
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Polarity scores in the shape produced by lexicon analyzers such as VADER.
///
/// Stored as the JSON `result` of an analysis row; rankings only read
/// `compound`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SentimentScores {
    #[serde(default)]
    pub neg: f64,
    #[serde(default)]
    pub neu: f64,
    #[serde(default)]
    pub pos: f64,
    pub compound: f64,
}

impl SentimentScores {
    pub fn from_compound(compound: f64) -> Self {
        Self {
            compound,
            ..Self::default()
        }
    }

    pub fn sentiment(&self) -> Sentiment {
        Sentiment::from_compound(self.compound)
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Row counts per table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AtlasStats {
    pub users: usize,
    pub emojis: usize,
    pub messages: usize,
    pub reactions: usize,
    pub unattached_reactions: usize,
    pub models: usize,
    pub analyses: usize,
}

impl std::fmt::Display for AtlasStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Users: {}", self.users)?;
        writeln!(f, "  Emojis: {}", self.emojis)?;
        writeln!(f, "  Messages: {}", self.messages)?;
        writeln!(f, "  Reactions: {} ({} unattached)", self.reactions, self.unattached_reactions)?;
        writeln!(f, "  Models: {}", self.models)?;
        writeln!(f, "  Analyses: {}", self.analyses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentiment_thresholds() {
        assert_eq!(Sentiment::from_compound(0.05), Sentiment::Positive);
        assert_eq!(Sentiment::from_compound(0.5), Sentiment::Positive);
        assert_eq!(Sentiment::from_compound(0.0), Sentiment::Neutral);
        assert_eq!(Sentiment::from_compound(0.049), Sentiment::Neutral);
        assert_eq!(Sentiment::from_compound(-0.049), Sentiment::Neutral);
        assert_eq!(Sentiment::from_compound(-0.05), Sentiment::Negative);
        assert_eq!(Sentiment::from_compound(-1.0), Sentiment::Negative);
    }

    #[test]
    fn test_sentiment_from_str() {
        assert_eq!("Positive".parse::<Sentiment>().unwrap(), Sentiment::Positive);
        assert_eq!("neg".parse::<Sentiment>().unwrap(), Sentiment::Negative);
        assert!("angry".parse::<Sentiment>().is_err());
    }

    #[test]
    fn test_scores_json_shape() {
        let scores = SentimentScores {
            neg: 0.0,
            neu: 0.4,
            pos: 0.6,
            compound: 0.7,
        };
        let json: serde_json::Value = serde_json::from_str(&scores.to_json().unwrap()).unwrap();
        assert_eq!(json["compound"], 0.7);

        let parsed: SentimentScores = serde_json::from_str(r#"{"compound": -0.3}"#).unwrap();
        assert_eq!(parsed.sentiment(), Sentiment::Negative);
    }
}
