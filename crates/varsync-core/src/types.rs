//! Identity types shared across the engine

use serde::{Deserialize, Serialize};

/// Profile kind the player is logged into. Each kind keeps its own baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProfileType {
    Standard,
    Beta,
    QuestSpeedrunning,
    Deadman,
    PvpArena,
    Tournament,
    Seasonal,
}

impl ProfileType {
    /// Wire name, as carried in the `profile` field of a submission
    pub fn name(self) -> &'static str {
        match self {
            ProfileType::Standard => "STANDARD",
            ProfileType::Beta => "BETA",
            ProfileType::QuestSpeedrunning => "QUEST_SPEEDRUNNING",
            ProfileType::Deadman => "DEADMAN",
            ProfileType::PvpArena => "PVP_ARENA",
            ProfileType::Tournament => "TOURNAMENT",
            ProfileType::Seasonal => "SEASONAL",
        }
    }
}

impl std::fmt::Display for ProfileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Baseline key: one tracked entity per player name and profile kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    pub profile: ProfileType,
}

impl Identity {
    pub fn new(username: impl Into<String>, profile: ProfileType) -> Self {
        Self {
            username: username.into(),
            profile,
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.username, self.profile)
    }
}

/// A fully logged-in player as reported by the value source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSession {
    pub identity: Identity,

    /// Account discriminator used to name the local log file
    pub account_hash: i64,
}

impl PlayerSession {
    pub fn new(identity: Identity, account_hash: i64) -> Self {
        Self {
            identity,
            account_hash,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_identity_structural_equality() {
        let a = Identity::new("Zezima", ProfileType::Standard);
        let b = Identity::new("Zezima", ProfileType::Standard);
        let c = Identity::new("Zezima", ProfileType::Seasonal);

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_profile_wire_name() {
        assert_eq!(ProfileType::QuestSpeedrunning.name(), "QUEST_SPEEDRUNNING");
        let json = serde_json::to_string(&ProfileType::PvpArena).unwrap();
        assert_eq!(json, "\"PVP_ARENA\"");
    }
}
