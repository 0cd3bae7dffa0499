//! Player identities.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque external-user identifier.
///
/// Chat-platform users map onto non-negative ids; bot-controlled stand-ins
/// (NPCs) are allocated from the negative range so the two never collide and
/// can be told apart without a separate tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub i64);

impl PlayerId {
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// True for NPC identities.
    #[must_use]
    pub const fn is_synthetic(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_synthetic() {
            write!(f, "npc:{}", self.0)
        } else {
            write!(f, "user:{}", self.0)
        }
    }
}

impl From<i64> for PlayerId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl FromStr for PlayerId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let raw = trimmed
            .strip_prefix("npc:")
            .or_else(|| trimmed.strip_prefix("user:"))
            .unwrap_or(trimmed);
        raw.parse::<i64>().map(Self)
    }
}

/// Identity plus moderator standing of whoever issued a managing action.
///
/// Moderator status is a chat-platform permission lookup; the command layer
/// resolves it and hands the core a plain flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Requester {
    pub id: PlayerId,
    pub moderator: bool,
}

impl Requester {
    /// A requester without moderator standing.
    #[must_use]
    pub const fn player(id: PlayerId) -> Self {
        Self {
            id,
            moderator: false,
        }
    }

    /// A requester holding moderator standing.
    #[must_use]
    pub const fn moderator(id: PlayerId) -> Self {
        Self {
            id,
            moderator: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_ids_are_negative() {
        assert!(PlayerId(-1).is_synthetic());
        assert!(!PlayerId(0).is_synthetic());
        assert!(!PlayerId(42).is_synthetic());
    }

    #[test]
    fn display_and_parse_agree() {
        for raw in [-7, 0, 1_234_567_890] {
            let id = PlayerId(raw);
            assert_eq!(id.to_string().parse::<PlayerId>().unwrap(), id);
        }
        assert_eq!("  99 ".parse::<PlayerId>().unwrap(), PlayerId(99));
        assert!("alice".parse::<PlayerId>().is_err());
    }

    #[test]
    fn serializes_as_bare_integer() {
        assert_eq!(serde_json::to_string(&PlayerId(-3)).unwrap(), "-3");
    }
}
