use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Oracle classification of one tested snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Good,
    Bad,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Good => write!(f, "good"),
            Verdict::Bad => write!(f, "bad"),
        }
    }
}

impl FromStr for Verdict {
    type Err = String;

    /// Accepts exactly `good` or `bad`, ignoring case and surrounding blanks.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "good" => Ok(Verdict::Good),
            "bad" => Ok(Verdict::Bad),
            other => Err(format!("expected 'good' or 'bad', got '{other}'")),
        }
    }
}
