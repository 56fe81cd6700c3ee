use serde::{Deserialize, Serialize};

// Discord external identity = 64-bit snowflake
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Snowflake(pub u64);

impl Snowflake {
    /// SQLite has no unsigned 64-bit column type, so snowflakes are stored
    /// as `INTEGER` via a bit-preserving cast.
    pub fn as_i64(self) -> i64 {
        self.0 as i64
    }

    pub fn from_i64(raw: i64) -> Self {
        Self(raw as u64)
    }

    /// Parse a snowflake from a bare number or a Discord mention
    /// (`<@123>`, `<@!123>`, `<#123>`).
    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s
            .trim()
            .trim_start_matches("<@!")
            .trim_start_matches("<@")
            .trim_start_matches("<#")
            .trim_end_matches('>');
        trimmed.parse::<u64>().ok().map(Self)
    }
}

impl std::fmt::Display for Snowflake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
